//! Attachment ingestion and cleanup.
//!
//! Attachments live as flat files under a dedicated folder, one file per
//! attachment named `<id>.<ext>`. Ingestion is a plain blocking copy;
//! cleanup of detached attachments is best-effort and never fails the
//! surrounding save.

use std::{fs, path::Path};

use log::{debug, error};
use mime_guess::MimeGuess;

use crate::{now_millis, Attachment, Result};

/// Copies `source` into `attachments_root` under a fresh id and returns the
/// descriptor. A copy failure is fatal to the caller; there is no partial
/// recovery.
pub fn create_new_attachment(source: &Path, attachments_root: &Path) -> Result<Attachment> {
    let id = now_millis();
    let name = source
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();

    let file_name = match source.extension() {
        Some(ext) => format!("{}.{}", id, ext.to_string_lossy()),
        None => id.to_string(),
    };

    if !attachments_root.exists() {
        fs::create_dir_all(attachments_root)?;
    }
    let destination = attachments_root.join(&file_name);
    fs::copy(source, &destination)?;

    let size = fs::metadata(&destination).ok().map(|meta| meta.len());
    let mime_type = MimeGuess::from_path(source)
        .first()
        .map(|mime| mime.essence_str().to_string());

    debug!("Ingested attachment {} -> {}", name, destination.display());

    Ok(Attachment {
        id,
        name,
        uri_path: destination.to_string_lossy().into_owned(),
        mime_type,
        size,
    })
}

/// Deletes the files behind detached attachments, resolved by the last path
/// segment of their stored `uriPath`. Failures are logged and swallowed.
pub fn clean_removed_attachments(attachments_folder: &Path, removed: &[Attachment]) {
    for attachment in removed {
        let Some(file_name) = Path::new(&attachment.uri_path).file_name() else {
            continue;
        };
        let path = attachments_folder.join(file_name);
        match fs::remove_file(&path) {
            Ok(()) => debug!("Removed detached attachment: {}", path.display()),
            Err(e) => error!(
                "Failed to remove detached attachment {}: {}",
                path.display(),
                e
            ),
        }
    }
}
