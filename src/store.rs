//! The note store: in-memory sorted note sequence, category index, and the
//! single save path every mutation flows through.
//!
//! The store exclusively owns its collections; callers hold it directly or
//! behind whatever shared handle suits them. In-memory mutations complete
//! before the corresponding disk write, and a write failure leaves the
//! mutation in place without its durable counterpart.

use std::{
    cmp::Ordering,
    collections::HashMap,
    path::{Path, PathBuf},
};

use log::{debug, error, info, warn};
use serde_json::Value;
use tokio::sync::broadcast;

use crate::{
    attachments, now_millis, records, settings::SettingsStore, Attachment, Category, EventBus,
    Note, Result, StoreError, StoreEvent, ATTACHMENTS_FOLDER_KEY, BACKUP_FOLDER_KEY,
    SORT_DIRECTION_KEY, SORT_PREDICATE_KEY,
};

/// Sort direction for the note sequence. Anything that is not `DESC` parses
/// as ascending.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortDirection {
    #[default]
    Asc,
    Desc,
}

impl SortDirection {
    pub fn parse(value: &str) -> Self {
        if value.eq_ignore_ascii_case("DESC") {
            SortDirection::Desc
        } else {
            SortDirection::Asc
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SortDirection::Asc => "ASC",
            SortDirection::Desc => "DESC",
        }
    }
}

/// Outcome of loading a backup directory. Per-file failures degrade the
/// load to a partial result instead of stalling it.
#[derive(Debug, Clone)]
pub struct LoadSummary {
    /// Number of notes appended to the collection.
    pub loaded: usize,
    /// Record files that could not be read or parsed, with the reason.
    pub failed: Vec<(PathBuf, String)>,
}

/// Owns the in-memory set of notes and categories, the sort order, and
/// orchestrates loading, mutation, and attachment cleanup.
pub struct NoteStore {
    settings: Box<dyn SettingsStore>,
    notes: Vec<Note>,
    categories: HashMap<i64, Category>,
    sort_predicate: String,
    sort_direction: SortDirection,
    backup_folder: Option<PathBuf>,
    events: EventBus,
}

impl NoteStore {
    /// Creates a store, restoring the sort settings and backup folder path
    /// persisted in the settings store.
    pub fn new(settings: Box<dyn SettingsStore>) -> Self {
        let sort_predicate = settings
            .get(SORT_PREDICATE_KEY)
            .unwrap_or_else(|| "title".to_string());
        let sort_direction = settings
            .get(SORT_DIRECTION_KEY)
            .map(|value| SortDirection::parse(&value))
            .unwrap_or_default();
        let backup_folder = settings.get(BACKUP_FOLDER_KEY).map(PathBuf::from);

        Self {
            settings,
            notes: Vec::new(),
            categories: HashMap::new(),
            sort_predicate,
            sort_direction,
            backup_folder,
            events: EventBus::default(),
        }
    }

    /// Subscribes to the store's event stream.
    pub fn subscribe(&self) -> broadcast::Receiver<StoreEvent> {
        self.events.subscribe()
    }

    /// Populates the collections from a backup directory.
    ///
    /// The chosen path is persisted first, then every record file is read
    /// concurrently (one task per file). Unreadable or unparseable files
    /// are dropped from the result, logged, and reported in the summary;
    /// the loaded event still fires exactly once with whatever parsed.
    pub async fn load_notes(&mut self, backup_folder: &Path) -> Result<LoadSummary> {
        info!("Loading notes from {}", backup_folder.display());
        self.settings
            .put(BACKUP_FOLDER_KEY, &backup_folder.to_string_lossy())?;
        self.backup_folder = Some(backup_folder.to_path_buf());

        let files = records::list_record_files(backup_folder)?;
        debug!("Found {} record files", files.len());

        let mut handles = Vec::with_capacity(files.len());
        for path in files {
            handles.push(tokio::spawn(async move {
                let result = records::read_record(&path).await;
                (path, result)
            }));
        }

        self.notes.clear();
        self.categories.clear();
        let mut failed = Vec::new();

        for handle in handles {
            let (path, result) = handle.await?;
            match result {
                Ok(note) => {
                    // Last write wins on category id collisions.
                    if let Some(category) = &note.category {
                        if let Some(id) = category.id {
                            self.categories.insert(id, category.clone());
                        }
                    }
                    self.notes.push(note);
                }
                Err(e) => {
                    warn!("Skipping record file {}: {}", path.display(), e);
                    failed.push((path, e.to_string()));
                }
            }
        }

        self.apply_sorting();
        let loaded = self.notes.len();
        if !failed.is_empty() {
            error!(
                "Failed to load {} of {} record files",
                failed.len(),
                loaded + failed.len()
            );
        }

        self.events
            .publish(StoreEvent::NotesLoaded(self.notes.clone()));
        info!("Loaded {} notes", loaded);
        Ok(LoadSummary { loaded, failed })
    }

    /// The current note sequence, always in sort order.
    pub fn notes(&self) -> &[Note] {
        &self.notes
    }

    /// The id-to-category index.
    pub fn categories(&self) -> &HashMap<i64, Category> {
        &self.categories
    }

    pub fn sort_predicate(&self) -> &str {
        &self.sort_predicate
    }

    pub fn sort_direction(&self) -> SortDirection {
        self.sort_direction
    }

    /// The backup folder the store persists records under, if one has been
    /// chosen.
    pub fn backup_folder(&self) -> Option<&Path> {
        self.backup_folder.as_deref()
    }

    /// Evaluates `predicate` over every note and publishes the matching
    /// subset. Store state is not touched.
    pub fn filter_notes<F>(&self, predicate: F) -> Vec<Note>
    where
        F: Fn(&Note) -> bool,
    {
        let filtered: Vec<Note> = self
            .notes
            .iter()
            .filter(|note| predicate(note))
            .cloned()
            .collect();
        debug!("Filter matched {} of {} notes", filtered.len(), self.notes.len());
        self.events
            .publish(StoreEvent::NotesFiltered(filtered.clone()));
        filtered
    }

    /// Saves a single note: the choke point every mutation flows through.
    ///
    /// If `update_last_modification` is set the modification timestamp is
    /// forcibly bumped; otherwise an existing value is preserved and only a
    /// missing one is defaulted to now. A note carrying a `creation` value
    /// replaces its existing entry; a note without one is assigned a fresh
    /// unique creation and appended. The sequence is re-sorted, the record
    /// written atomically, and detached attachments cleaned up best-effort.
    /// With `emit_event` set, a modified event carrying the full sequence
    /// fires after a successful write; bulk operations pass `false` and
    /// emit one aggregate event instead.
    pub fn save_note(
        &mut self,
        mut note: Note,
        update_last_modification: bool,
        emit_event: bool,
    ) -> Result<Note> {
        let now = now_millis();
        note.last_modification = if update_last_modification {
            Some(now)
        } else {
            note.last_modification.or(Some(now))
        };

        // The detached attachments never reach memory or disk; they only
        // drive cleanup below.
        let removed_attachments = std::mem::take(&mut note.attachments_list_old);

        let creation = match note.creation {
            Some(creation) => creation,
            None => {
                let creation = self.fresh_creation(now);
                note.creation = Some(creation);
                creation
            }
        };

        match self
            .notes
            .iter_mut()
            .find(|existing| existing.creation == Some(creation))
        {
            Some(existing) => *existing = note.clone(),
            None => self.notes.push(note.clone()),
        }
        self.apply_sorting();

        let write_result = self.write_note_record(&note, creation);
        self.clean_removed_attachments(&removed_attachments);
        write_result?;

        if emit_event {
            self.events
                .publish(StoreEvent::NoteModified(self.notes.clone()));
        }
        Ok(note)
    }

    /// Saves a batch of notes and emits one aggregate modified event.
    pub fn save_notes(
        &mut self,
        notes: Vec<Note>,
        update_last_modification: bool,
    ) -> Result<Vec<Note>> {
        let mut saved = Vec::with_capacity(notes.len());
        for note in notes {
            saved.push(self.save_note(note, update_last_modification, false)?);
        }
        self.events
            .publish(StoreEvent::NoteModified(self.notes.clone()));
        Ok(saved)
    }

    /// Sets the archived flag on a batch of notes.
    pub fn archive_notes(&mut self, notes: Vec<Note>, archived: bool) -> Result<Vec<Note>> {
        let mut saved = Vec::with_capacity(notes.len());
        for mut note in notes {
            note.archived = archived;
            saved.push(self.save_note(note, false, false)?);
        }
        self.events
            .publish(StoreEvent::NoteModified(self.notes.clone()));
        Ok(saved)
    }

    /// Sets the trashed flag on a batch of notes. Trashing is the only
    /// deletion this store knows; records are never removed from disk.
    pub fn trash_notes(&mut self, notes: Vec<Note>, trashed: bool) -> Result<Vec<Note>> {
        let mut saved = Vec::with_capacity(notes.len());
        for mut note in notes {
            note.trashed = trashed;
            saved.push(self.save_note(note, false, false)?);
        }
        self.events
            .publish(StoreEvent::NoteModified(self.notes.clone()));
        Ok(saved)
    }

    /// Assigns or clears the category on a batch of notes.
    pub fn set_category(
        &mut self,
        notes: Vec<Note>,
        category: Option<Category>,
    ) -> Result<Vec<Note>> {
        let mut saved = Vec::with_capacity(notes.len());
        for mut note in notes {
            note.category = category.clone();
            saved.push(self.save_note(note, false, false)?);
        }
        self.events
            .publish(StoreEvent::NoteModified(self.notes.clone()));
        Ok(saved)
    }

    /// Upserts a category and propagates the new embedded copy to every
    /// note referencing its id. No note observes a stale copy once this
    /// returns.
    pub fn save_category(&mut self, mut category: Category) -> Result<Category> {
        let id = match category.id {
            Some(id) => id,
            None => {
                let id = now_millis();
                category.id = Some(id);
                id
            }
        };
        self.categories.insert(id, category.clone());

        let referencing: Vec<Note> = self
            .notes
            .iter()
            .filter(|note| note.category_id() == Some(id))
            .cloned()
            .collect();
        debug!("Propagating category {} to {} notes", id, referencing.len());
        for mut note in referencing {
            note.category = Some(category.clone());
            self.save_note(note, false, false)?;
        }

        self.events
            .publish(StoreEvent::CategoryModified(self.categories.clone()));
        Ok(category)
    }

    /// Removes a category from the index and strips the embedded copy from
    /// every note that referenced it. Notes with a different category are
    /// left untouched.
    pub fn delete_category(&mut self, category: &Category) -> Result<()> {
        if let Some(id) = category.id {
            let referencing: Vec<Note> = self
                .notes
                .iter()
                .filter(|note| note.category_id() == Some(id))
                .cloned()
                .collect();
            info!(
                "Deleting category {}; clearing it from {} notes",
                id,
                referencing.len()
            );
            for mut note in referencing {
                note.category = None;
                self.save_note(note, false, false)?;
            }
            self.categories.remove(&id);
        }

        self.events
            .publish(StoreEvent::CategoryModified(self.categories.clone()));
        Ok(())
    }

    /// Changes the sort order. A call with the current predicate and
    /// direction is a no-op: nothing is persisted, re-sorted or emitted.
    pub fn sort_notes(&mut self, predicate: &str, direction: SortDirection) -> Result<()> {
        if predicate == self.sort_predicate && direction == self.sort_direction {
            debug!("Sort settings unchanged; nothing to do");
            return Ok(());
        }

        self.sort_predicate = predicate.to_string();
        self.settings.put(SORT_PREDICATE_KEY, predicate)?;
        self.sort_direction = direction;
        self.settings.put(SORT_DIRECTION_KEY, direction.as_str())?;

        self.apply_sorting();
        self.events
            .publish(StoreEvent::NotesSorted(self.notes.clone()));
        Ok(())
    }

    /// Ingests a file into the attachments folder and returns the
    /// descriptor. The copy is synchronous and a failure propagates.
    pub fn create_new_attachment(&self, source: &Path) -> Result<Attachment> {
        let root = self
            .attachments_folder()
            .ok_or(StoreError::BackupFolderNotSet)?;
        attachments::create_new_attachment(source, &root)
    }

    /// The attachments folder: the configured setting, or `attachments/`
    /// under the backup folder.
    pub fn attachments_folder(&self) -> Option<PathBuf> {
        if let Some(folder) = self.settings.get(ATTACHMENTS_FOLDER_KEY) {
            return Some(PathBuf::from(folder));
        }
        self.backup_folder
            .as_ref()
            .map(|folder| folder.join("attachments"))
    }

    fn write_note_record(&self, note: &Note, creation: i64) -> Result<()> {
        let folder = self
            .backup_folder
            .as_ref()
            .ok_or(StoreError::BackupFolderNotSet)?;
        records::write_record(folder, creation, note)
    }

    fn clean_removed_attachments(&self, removed: &[Attachment]) {
        if removed.is_empty() {
            return;
        }
        match self.attachments_folder() {
            Some(folder) => attachments::clean_removed_attachments(&folder, removed),
            None => warn!(
                "No attachments folder configured; leaving {} detached files behind",
                removed.len()
            ),
        }
    }

    /// A creation timestamp not yet taken by any note in the store.
    fn fresh_creation(&self, now: i64) -> i64 {
        let mut candidate = now;
        while self
            .notes
            .iter()
            .any(|note| note.creation == Some(candidate))
        {
            candidate += 1;
        }
        candidate
    }

    /// Re-sorts the full sequence under the current predicate/direction.
    /// `sort_by` is stable, so equal keys keep their relative order;
    /// descending is the exact reverse of the ascending result.
    fn apply_sorting(&mut self) {
        let predicate = self.sort_predicate.clone();
        self.notes
            .sort_by(|a, b| sort_key(a, &predicate).compare(&sort_key(b, &predicate)));
        if self.sort_direction == SortDirection::Desc {
            self.notes.reverse();
        }
    }
}

/// Comparison key for one note under a sort predicate. Missing values sort
/// first, then booleans, numbers and text; text compares case-insensitively.
enum SortKey {
    Missing,
    Bool(bool),
    Number(f64),
    Text(String),
}

impl SortKey {
    fn rank(&self) -> u8 {
        match self {
            SortKey::Missing => 0,
            SortKey::Bool(_) => 1,
            SortKey::Number(_) => 2,
            SortKey::Text(_) => 3,
        }
    }

    fn compare(&self, other: &SortKey) -> Ordering {
        match (self, other) {
            (SortKey::Bool(a), SortKey::Bool(b)) => a.cmp(b),
            (SortKey::Number(a), SortKey::Number(b)) => {
                a.partial_cmp(b).unwrap_or(Ordering::Equal)
            }
            (SortKey::Text(a), SortKey::Text(b)) => a.cmp(b),
            _ => self.rank().cmp(&other.rank()),
        }
    }
}

fn sort_key(note: &Note, predicate: &str) -> SortKey {
    match predicate {
        "creation" => note
            .creation
            .map_or(SortKey::Missing, |v| SortKey::Number(v as f64)),
        "lastModification" => note
            .last_modification
            .map_or(SortKey::Missing, |v| SortKey::Number(v as f64)),
        "archived" => SortKey::Bool(note.archived),
        "trashed" => SortKey::Bool(note.trashed),
        _ => match note.extra.get(predicate) {
            Some(Value::String(s)) => SortKey::Text(s.to_lowercase()),
            Some(Value::Number(n)) => n.as_f64().map_or(SortKey::Missing, SortKey::Number),
            Some(Value::Bool(b)) => SortKey::Bool(*b),
            _ => SortKey::Missing,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{MemorySettings, SettingsStore};
    use std::fs;
    use tempfile::TempDir;
    use tokio::sync::broadcast::error::TryRecvError;

    fn store_with_backup(dir: &Path) -> NoteStore {
        let mut settings = MemorySettings::default();
        settings
            .put(BACKUP_FOLDER_KEY, &dir.to_string_lossy())
            .unwrap();
        NoteStore::new(Box::new(settings))
    }

    fn note_with_title(title: &str) -> Note {
        let mut note = Note::default();
        note.extra
            .insert("title".to_string(), Value::String(title.to_string()));
        note
    }

    fn titles(notes: &[Note]) -> Vec<String> {
        notes
            .iter()
            .map(|n| {
                n.field("title")
                    .and_then(Value::as_str)
                    .unwrap_or_default()
                    .to_string()
            })
            .collect()
    }

    fn drain_note_modified(rx: &mut broadcast::Receiver<StoreEvent>) -> usize {
        let mut count = 0;
        loop {
            match rx.try_recv() {
                Ok(StoreEvent::NoteModified(_)) => count += 1,
                Ok(_) => {}
                Err(TryRecvError::Empty) => break,
                Err(e) => panic!("unexpected receive error: {e}"),
            }
        }
        count
    }

    #[tokio::test]
    async fn loading_fires_one_event_with_every_record_file() {
        let dir = TempDir::new().unwrap();
        fs::write(
            dir.path().join("1690000000001.json"),
            r#"{"creation":1690000000001,"title":"first"}"#,
        )
        .unwrap();
        fs::write(
            dir.path().join("1690000000002.json"),
            r#"{"creation":1690000000002,"title":"second"}"#,
        )
        .unwrap();
        fs::write(dir.path().join("readme.txt"), "not a record").unwrap();
        fs::write(dir.path().join("42.json"), "{}").unwrap();

        let mut store = store_with_backup(dir.path());
        let mut rx = store.subscribe();

        let summary = store.load_notes(dir.path()).await.unwrap();
        assert_eq!(summary.loaded, 2);
        assert!(summary.failed.is_empty());
        assert_eq!(store.notes().len(), 2);

        match rx.try_recv().unwrap() {
            StoreEvent::NotesLoaded(notes) => assert_eq!(notes.len(), 2),
            other => panic!("expected NotesLoaded, got {other:?}"),
        }
        assert!(matches!(rx.try_recv(), Err(TryRecvError::Empty)));
    }

    #[tokio::test]
    async fn load_reports_broken_files_instead_of_stalling() {
        let dir = TempDir::new().unwrap();
        fs::write(
            dir.path().join("1690000000001.json"),
            r#"{"creation":1690000000001,"title":"good"}"#,
        )
        .unwrap();
        fs::write(dir.path().join("1690000000002.json"), "{ not json").unwrap();

        let mut store = store_with_backup(dir.path());
        let mut rx = store.subscribe();

        let summary = store.load_notes(dir.path()).await.unwrap();
        assert_eq!(summary.loaded, 1);
        assert_eq!(summary.failed.len(), 1);
        assert!(summary.failed[0]
            .0
            .ends_with("1690000000002.json"));

        match rx.try_recv().unwrap() {
            StoreEvent::NotesLoaded(notes) => assert_eq!(notes.len(), 1),
            other => panic!("expected NotesLoaded, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn load_of_an_unreadable_directory_fails_without_an_event() {
        let dir = TempDir::new().unwrap();
        let mut store = store_with_backup(dir.path());
        let mut rx = store.subscribe();

        let result = store.load_notes(&dir.path().join("absent")).await;
        assert!(matches!(result, Err(StoreError::DirectoryError { .. })));
        assert!(matches!(rx.try_recv(), Err(TryRecvError::Empty)));
    }

    #[tokio::test]
    async fn load_replaces_the_previous_collection() {
        let dir = TempDir::new().unwrap();
        fs::write(
            dir.path().join("1690000000001.json"),
            r#"{"creation":1690000000001,"title":"only"}"#,
        )
        .unwrap();

        let mut store = store_with_backup(dir.path());
        store.load_notes(dir.path()).await.unwrap();
        store.load_notes(dir.path()).await.unwrap();
        assert_eq!(store.notes().len(), 1);
    }

    #[tokio::test]
    async fn load_indexes_embedded_categories_last_write_wins() {
        let dir = TempDir::new().unwrap();
        fs::write(
            dir.path().join("1690000000001.json"),
            r#"{"creation":1690000000001,"category":{"id":5,"name":"work"}}"#,
        )
        .unwrap();
        fs::write(
            dir.path().join("1690000000002.json"),
            r#"{"creation":1690000000002,"category":{"id":7,"name":"home"}}"#,
        )
        .unwrap();

        let mut store = store_with_backup(dir.path());
        store.load_notes(dir.path()).await.unwrap();
        assert_eq!(store.categories().len(), 2);
        assert!(store.categories().contains_key(&5));
        assert!(store.categories().contains_key(&7));
    }

    #[test]
    fn first_save_assigns_a_creation_and_writes_the_record() {
        let dir = TempDir::new().unwrap();
        let mut store = store_with_backup(dir.path());

        let saved = store
            .save_note(note_with_title("x"), true, true)
            .unwrap();
        let creation = saved.creation.expect("creation assigned");
        assert!(saved.last_modification.is_some());
        assert_eq!(store.notes().len(), 1);
        assert!(records::record_path(dir.path(), creation).exists());
    }

    #[test]
    fn resaving_a_note_replaces_instead_of_duplicating() {
        let dir = TempDir::new().unwrap();
        let mut store = store_with_backup(dir.path());

        let mut saved = store
            .save_note(note_with_title("before"), true, true)
            .unwrap();
        saved
            .extra
            .insert("title".to_string(), Value::String("after".to_string()));
        store.save_note(saved, true, true).unwrap();

        assert_eq!(store.notes().len(), 1);
        assert_eq!(titles(store.notes()), vec!["after"]);
    }

    #[test]
    fn suppressed_timestamp_update_preserves_an_existing_value() {
        let dir = TempDir::new().unwrap();
        let mut store = store_with_backup(dir.path());

        let mut note = note_with_title("old");
        note.last_modification = Some(1);
        let saved = store.save_note(note, false, false).unwrap();
        assert_eq!(saved.last_modification, Some(1));

        // Forced update bumps it.
        let bumped = store.save_note(saved, true, false).unwrap();
        assert_ne!(bumped.last_modification, Some(1));

        // Missing value defaults to now even when not forced.
        let defaulted = store
            .save_note(note_with_title("fresh"), false, false)
            .unwrap();
        assert!(defaulted.last_modification.is_some());
    }

    #[test]
    fn save_without_a_backup_folder_fails_but_keeps_the_mutation() {
        let mut store = NoteStore::new(Box::new(MemorySettings::default()));
        let result = store.save_note(note_with_title("x"), true, true);
        assert!(matches!(result, Err(StoreError::BackupFolderNotSet)));
        // No rollback: the in-memory mutation stays visible.
        assert_eq!(store.notes().len(), 1);
    }

    #[test]
    fn ascending_sort_is_case_insensitive_and_desc_is_its_reverse() {
        let dir = TempDir::new().unwrap();
        let mut store = store_with_backup(dir.path());
        for title in ["banana", "Apple", "cherry"] {
            store.save_note(note_with_title(title), true, false).unwrap();
        }
        assert_eq!(titles(store.notes()), vec!["Apple", "banana", "cherry"]);

        store.sort_notes("title", SortDirection::Desc).unwrap();
        assert_eq!(titles(store.notes()), vec!["cherry", "banana", "Apple"]);
    }

    #[test]
    fn equal_sort_keys_keep_their_relative_order() {
        let dir = TempDir::new().unwrap();
        let mut store = store_with_backup(dir.path());
        for content in ["one", "two", "three"] {
            let mut note = note_with_title("same");
            note.extra
                .insert("content".to_string(), Value::String(content.to_string()));
            store.save_note(note, true, false).unwrap();
        }

        let contents: Vec<_> = store
            .notes()
            .iter()
            .map(|n| n.field("content").and_then(Value::as_str).unwrap().to_string())
            .collect();
        assert_eq!(contents, vec!["one", "two", "three"]);
    }

    #[test]
    fn sorting_by_a_numeric_field_uses_natural_order() {
        let dir = TempDir::new().unwrap();
        let mut store = store_with_backup(dir.path());
        let mut first = note_with_title("a");
        first.creation = Some(1690000000002);
        let mut second = note_with_title("b");
        second.creation = Some(1690000000001);
        store.save_note(first, true, false).unwrap();
        store.save_note(second, true, false).unwrap();

        store.sort_notes("creation", SortDirection::Asc).unwrap();
        let creations: Vec<_> = store.notes().iter().map(|n| n.creation.unwrap()).collect();
        assert_eq!(creations, vec![1690000000001, 1690000000002]);
    }

    #[test]
    fn sort_notes_with_unchanged_settings_emits_nothing() {
        let dir = TempDir::new().unwrap();
        let mut store = store_with_backup(dir.path());
        let mut rx = store.subscribe();

        store.sort_notes("title", SortDirection::Desc).unwrap();
        assert!(matches!(
            rx.try_recv().unwrap(),
            StoreEvent::NotesSorted(_)
        ));

        store.sort_notes("title", SortDirection::Desc).unwrap();
        assert!(matches!(rx.try_recv(), Err(TryRecvError::Empty)));
    }

    #[test]
    fn sort_settings_are_persisted_and_restored() {
        let dir = TempDir::new().unwrap();
        let mut settings = MemorySettings::default();
        settings
            .put(BACKUP_FOLDER_KEY, &dir.path().to_string_lossy())
            .unwrap();
        settings.put(SORT_PREDICATE_KEY, "creation").unwrap();
        settings.put(SORT_DIRECTION_KEY, "DESC").unwrap();

        let store = NoteStore::new(Box::new(settings));
        assert_eq!(store.sort_predicate(), "creation");
        assert_eq!(store.sort_direction(), SortDirection::Desc);
    }

    #[test]
    fn unknown_sort_direction_strings_parse_as_ascending() {
        assert_eq!(SortDirection::parse("DESC"), SortDirection::Desc);
        assert_eq!(SortDirection::parse("desc"), SortDirection::Desc);
        assert_eq!(SortDirection::parse("ASC"), SortDirection::Asc);
        assert_eq!(SortDirection::parse("sideways"), SortDirection::Asc);
    }

    #[test]
    fn filtering_publishes_the_subset_without_mutating() {
        let dir = TempDir::new().unwrap();
        let mut store = store_with_backup(dir.path());
        store.save_note(note_with_title("keep"), true, false).unwrap();
        let mut trashed = note_with_title("drop");
        trashed.trashed = true;
        store.save_note(trashed, true, false).unwrap();

        let mut rx = store.subscribe();
        let filtered = store.filter_notes(|note| !note.trashed);
        assert_eq!(titles(&filtered), vec!["keep"]);
        assert_eq!(store.notes().len(), 2);
        match rx.try_recv().unwrap() {
            StoreEvent::NotesFiltered(notes) => assert_eq!(notes.len(), 1),
            other => panic!("expected NotesFiltered, got {other:?}"),
        }
    }

    #[test]
    fn bulk_operations_emit_exactly_one_event() {
        let dir = TempDir::new().unwrap();
        let mut store = store_with_backup(dir.path());
        let a = store.save_note(note_with_title("a"), true, false).unwrap();
        let b = store.save_note(note_with_title("b"), true, false).unwrap();

        let mut rx = store.subscribe();
        let archived = store.archive_notes(vec![a, b], true).unwrap();
        assert!(archived.iter().all(|note| note.archived));
        assert_eq!(drain_note_modified(&mut rx), 1);

        let trashed = store.trash_notes(archived, true).unwrap();
        assert!(trashed.iter().all(|note| note.trashed));
        assert_eq!(drain_note_modified(&mut rx), 1);
    }

    #[test]
    fn set_category_assigns_and_clears_on_the_batch() {
        let dir = TempDir::new().unwrap();
        let mut store = store_with_backup(dir.path());
        let note = store.save_note(note_with_title("a"), true, false).unwrap();

        let category = Category {
            id: Some(5),
            ..Default::default()
        };
        let tagged = store
            .set_category(vec![note], Some(category))
            .unwrap();
        assert_eq!(tagged[0].category_id(), Some(5));

        let cleared = store.set_category(tagged, None).unwrap();
        assert!(cleared[0].category.is_none());
    }

    #[test]
    fn saving_a_category_propagates_only_to_matching_notes() {
        let dir = TempDir::new().unwrap();
        let mut store = store_with_backup(dir.path());

        let mut work = Category::default();
        work.id = Some(5);
        work.extra
            .insert("name".to_string(), Value::String("work".to_string()));
        let mut home = Category::default();
        home.id = Some(7);
        home.extra
            .insert("name".to_string(), Value::String("home".to_string()));

        let mut a = note_with_title("a");
        a.category = Some(work.clone());
        let mut b = note_with_title("b");
        b.category = Some(work.clone());
        let mut c = note_with_title("c");
        c.category = Some(home.clone());
        for note in [a, b, c] {
            store.save_note(note, true, false).unwrap();
        }

        let mut renamed = work.clone();
        renamed
            .extra
            .insert("name".to_string(), Value::String("office".to_string()));
        store.save_category(renamed).unwrap();

        for note in store.notes() {
            let name = note
                .category
                .as_ref()
                .and_then(|c| c.extra.get("name"))
                .and_then(Value::as_str)
                .unwrap();
            match note.category_id() {
                Some(5) => assert_eq!(name, "office"),
                Some(7) => assert_eq!(name, "home"),
                other => panic!("unexpected category {other:?}"),
            }
        }
        assert_eq!(
            store.categories()[&5]
                .extra
                .get("name")
                .and_then(Value::as_str),
            Some("office")
        );
    }

    #[test]
    fn saving_a_category_without_an_id_assigns_one() {
        let dir = TempDir::new().unwrap();
        let mut store = store_with_backup(dir.path());
        let saved = store.save_category(Category::default()).unwrap();
        let id = saved.id.expect("id assigned");
        assert!(store.categories().contains_key(&id));
    }

    #[test]
    fn deleting_a_category_strips_it_from_referencing_notes_only() {
        let dir = TempDir::new().unwrap();
        let mut store = store_with_backup(dir.path());

        let work = Category {
            id: Some(5),
            ..Default::default()
        };
        let home = Category {
            id: Some(7),
            ..Default::default()
        };
        let mut a = note_with_title("a");
        a.category = Some(work.clone());
        let mut b = note_with_title("b");
        b.category = Some(home.clone());
        store.save_note(a, true, false).unwrap();
        store.save_note(b, true, false).unwrap();
        store.categories.insert(5, work.clone());
        store.categories.insert(7, home);

        let mut rx = store.subscribe();
        store.delete_category(&work).unwrap();

        assert!(!store.categories().contains_key(&5));
        assert!(store.categories().contains_key(&7));
        for note in store.notes() {
            match titles(std::slice::from_ref(note)).pop().unwrap().as_str() {
                "a" => assert!(note.category.is_none()),
                "b" => assert_eq!(note.category_id(), Some(7)),
                other => panic!("unexpected note {other}"),
            }
        }
        assert!(matches!(
            rx.try_recv().unwrap(),
            StoreEvent::CategoryModified(_)
        ));
    }

    #[test]
    fn saving_drains_detached_attachments_and_removes_their_files() {
        let dir = TempDir::new().unwrap();
        let mut store = store_with_backup(dir.path());
        let attachments_dir = store.attachments_folder().unwrap();
        fs::create_dir_all(&attachments_dir).unwrap();
        fs::write(attachments_dir.join("123.png"), b"x").unwrap();

        let mut note = note_with_title("a");
        note.attachments_list_old = vec![Attachment {
            id: 123,
            name: "old.png".to_string(),
            uri_path: "/elsewhere/123.png".to_string(),
            mime_type: None,
            size: None,
        }];
        let saved = store.save_note(note, true, false).unwrap();

        assert!(saved.attachments_list_old.is_empty());
        assert!(!attachments_dir.join("123.png").exists());
        // The persisted record carries no trace of the detached list.
        let record =
            fs::read_to_string(records::record_path(dir.path(), saved.creation.unwrap()))
                .unwrap();
        assert!(!record.contains("attachmentsListOld"));
    }
}
