//! Shared state of the write form the book search feeds into.
//!
//! The results list only ever writes the title field, and only through the
//! [`FormStore`] it was handed. [`WriteStore`] is the in-process store the CLI
//! uses; it also carries the selected book and the body text so a draft can
//! be saved and resumed.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::models::BookRecord;

/// Text fields of the write form
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WriteField {
    Title,
    Body,
}

impl WriteField {
    pub fn name(&self) -> &'static str {
        match self {
            WriteField::Title => "title",
            WriteField::Body => "body",
        }
    }
}

impl fmt::Display for WriteField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Store errors
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid draft: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// Write access to the form, shared between the search view and its host
pub trait FormStore: Send + Sync + fmt::Debug {
    /// Set `field` to `value`. A read right after sees the new value.
    fn post_data(&self, field: WriteField, value: String);

    /// Current value of `field`
    fn get(&self, field: WriteField) -> String;

    fn post_title(&self, title: &str) {
        self.post_data(WriteField::Title, title.to_string());
    }

    fn title(&self) -> String {
        self.get(WriteField::Title)
    }
}

/// Contents of the write form
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WriteForm {
    #[serde(default)]
    pub title: String,

    /// Book picked from the search results
    #[serde(default)]
    pub book: Option<BookRecord>,

    #[serde(default)]
    pub body: String,
}

impl WriteForm {
    fn field_mut(&mut self, field: WriteField) -> &mut String {
        match field {
            WriteField::Title => &mut self.title,
            WriteField::Body => &mut self.body,
        }
    }

    fn field(&self, field: WriteField) -> &str {
        match field {
            WriteField::Title => &self.title,
            WriteField::Body => &self.body,
        }
    }
}

/// Cloneable handle to one shared [`WriteForm`]
#[derive(Debug, Clone, Default)]
pub struct WriteStore {
    form: Arc<RwLock<WriteForm>>,
}

impl WriteStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_form(form: WriteForm) -> Self {
        Self {
            form: Arc::new(RwLock::new(form)),
        }
    }

    fn read(&self) -> RwLockReadGuard<'_, WriteForm> {
        self.form.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, WriteForm> {
        self.form.write().unwrap_or_else(|e| e.into_inner())
    }

    /// Remember `book` as the selection and use its title for the form
    pub fn select_book(&self, book: BookRecord) {
        let mut form = self.write();
        form.title = book.title.clone();
        form.book = Some(book);
    }

    pub fn selected_book(&self) -> Option<BookRecord> {
        self.read().book.clone()
    }

    /// Copy of the current form
    pub fn snapshot(&self) -> WriteForm {
        self.read().clone()
    }

    /// Write the form as pretty JSON to `path`
    pub fn save_draft(&self, path: &Path) -> Result<(), StoreError> {
        let json = serde_json::to_string_pretty(&*self.read())?;
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, json)?;
        tracing::debug!("Saved draft to {}", path.display());
        Ok(())
    }

    /// Load a draft written by [`WriteStore::save_draft`]
    pub fn load_draft(path: &Path) -> Result<Self, StoreError> {
        let content = std::fs::read_to_string(path)?;
        let form: WriteForm = serde_json::from_str(&content)?;
        Ok(Self::from_form(form))
    }

    /// Load the draft at `path`, or start an empty form if there is none
    pub fn open_draft(path: &Path) -> Result<Self, StoreError> {
        if path.exists() {
            Self::load_draft(path)
        } else {
            Ok(Self::new())
        }
    }
}

impl FormStore for WriteStore {
    fn post_data(&self, field: WriteField, value: String) {
        tracing::debug!("Posting {} = {:?}", field, value);
        *self.write().field_mut(field) = value;
    }

    fn get(&self, field: WriteField) -> String {
        self.read().field(field).to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sources::mock::make_book;
    use tempfile::tempdir;

    #[test]
    fn test_post_data_is_visible_immediately() {
        let store = WriteStore::new();
        store.post_data(WriteField::Title, "Dune".to_string());
        assert_eq!(store.title(), "Dune");

        store.post_title("Emma");
        assert_eq!(store.get(WriteField::Title), "Emma");
        assert_eq!(store.get(WriteField::Body), "");
    }

    #[test]
    fn test_clones_share_the_form() {
        let store = WriteStore::new();
        let host = store.clone();
        store.post_data(WriteField::Body, "Notes".to_string());
        assert_eq!(host.snapshot().body, "Notes");
    }

    #[test]
    fn test_select_book_sets_title() {
        let store = WriteStore::new();
        store.select_book(make_book("9780441013593", "Dune"));

        let form = store.snapshot();
        assert_eq!(form.title, "Dune");
        assert_eq!(form.book.map(|b| b.id), Some("9780441013593".to_string()));
    }

    #[test]
    fn test_draft_save_and_load() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("drafts").join("review.json");

        let store = WriteStore::new();
        store.select_book(make_book("1", "Dune"));
        store.post_data(WriteField::Body, "Spice.".to_string());
        store.save_draft(&path).unwrap();

        let loaded = WriteStore::load_draft(&path).unwrap();
        assert_eq!(loaded.snapshot(), store.snapshot());
    }

    #[test]
    fn test_open_missing_draft_is_empty() {
        let dir = tempdir().unwrap();
        let store = WriteStore::open_draft(&dir.path().join("none.json")).unwrap();
        assert_eq!(store.snapshot(), WriteForm::default());
    }

    #[test]
    fn test_invalid_draft() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("bad.json");
        std::fs::write(&path, "not json").unwrap();
        assert!(matches!(
            WriteStore::load_draft(&path),
            Err(StoreError::Serialize(_))
        ));
    }
}
