//! File-backed note collection store.
//!
//! This library keeps a user's notes durable as individual JSON record
//! files in a backup directory and exposes an in-memory, sorted, filterable
//! view of the collection. State changes are announced as full-state
//! snapshots on a broadcast channel.

mod attachments;
mod errors;
mod events;
mod note;
mod records;
mod settings;
mod store;

// Re-export key components
pub use attachments::*;
pub use errors::*;
pub use events::*;
pub use note::*;
pub use records::*;
pub use settings::*;
pub use store::*;
