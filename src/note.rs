//! Core data structures for the notevault store.
//!
//! This module contains the primary types persisted to record files:
//! Note, Category and Attachment.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Current time as a millisecond timestamp, the store's identity currency.
pub fn now_millis() -> i64 {
    Utc::now().timestamp_millis()
}

/// Represents a single note in the collection.
///
/// `creation` doubles as the note's identity and its on-disk filename stem.
/// User-facing fields (title, content, ...) are not modeled explicitly; they
/// live in `extra` and the store only ever touches them as sort keys.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Note {
    /// Millisecond timestamp assigned on first save; immutable afterwards.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub creation: Option<i64>,

    /// Updated on every persisted write unless the caller suppresses it.
    #[serde(rename = "lastModification", skip_serializing_if = "Option::is_none")]
    pub last_modification: Option<i64>,

    /// Denormalized embedded copy of the note's category, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category: Option<Category>,

    #[serde(default)]
    pub archived: bool,

    #[serde(default)]
    pub trashed: bool,

    /// Attachments currently linked to the note.
    #[serde(
        rename = "attachmentsList",
        default,
        skip_serializing_if = "Vec::is_empty"
    )]
    pub attachments_list: Vec<Attachment>,

    /// Attachments detached during the current edit. Drives cleanup of their
    /// backing files and is always stripped at serialization time.
    #[serde(rename = "attachmentsListOld", default, skip_serializing)]
    pub attachments_list_old: Vec<Attachment>,

    /// Opaque user fields carried through serialization untouched.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Note {
    /// The id of the embedded category, if the note carries one.
    pub fn category_id(&self) -> Option<i64> {
        self.category.as_ref().and_then(|category| category.id)
    }

    /// Looks up an opaque user field by name.
    pub fn field(&self, name: &str) -> Option<&Value> {
        self.extra.get(name)
    }
}

/// A note category. Descriptive fields (name, color) are opaque to the
/// store and live in `extra`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Category {
    /// Millisecond timestamp assigned on first save; stable identity.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<i64>,

    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// A file attachment. The record stores only the path, not the content.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Attachment {
    /// Millisecond timestamp assigned at ingestion.
    pub id: i64,

    /// Original file name of the ingested source.
    pub name: String,

    /// Destination path: attachments root + id + original extension.
    #[serde(rename = "uriPath")]
    pub uri_path: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub mime_type: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub size: Option<u64>,
}
