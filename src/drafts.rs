use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::LedgerLeafError;
use crate::model::Invoice;

/// A snapshot of an invoice kept in the drafts file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SavedInvoice {
    pub id: String,
    pub saved_at: DateTime<Utc>,
    pub invoice: Invoice,
}

impl SavedInvoice {
    /// Client name, else `Invoice #<number>`, else "Untitled Draft".
    pub fn display_label(&self) -> String {
        let client = self.invoice.to.name.trim();
        if !client.is_empty() {
            return client.to_string();
        }
        let number = self.invoice.number.trim();
        if !number.is_empty() {
            return format!("Invoice #{number}");
        }
        "Untitled Draft".to_string()
    }
}

/// Drafts persisted as one JSON array, newest first.
#[derive(Debug)]
pub struct DraftStore {
    path: PathBuf,
    drafts: Vec<SavedInvoice>,
}

impl DraftStore {
    /// Loads the drafts file. A missing file is an empty store; an unreadable
    /// one is discarded.
    pub fn open(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let drafts = match std::fs::read(&path) {
            Ok(bytes) => match serde_json::from_slice::<Vec<SavedInvoice>>(&bytes) {
                Ok(drafts) => drafts,
                Err(err) => {
                    tracing::warn!(path = %path.display(), error = %err, "discarding corrupt drafts file");
                    if let Err(err) = std::fs::remove_file(&path) {
                        tracing::warn!(path = %path.display(), error = %err, "could not remove drafts file");
                    }
                    Vec::new()
                }
            },
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Vec::new(),
            Err(err) => {
                tracing::warn!(path = %path.display(), error = %err, "drafts file unreadable");
                Vec::new()
            }
        };
        tracing::debug!(path = %path.display(), drafts = drafts.len(), "drafts loaded");
        Self { path, drafts }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn list(&self) -> &[SavedInvoice] {
        &self.drafts
    }

    pub fn len(&self) -> usize {
        self.drafts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.drafts.is_empty()
    }

    pub fn get(&self, id: &str) -> Option<&SavedInvoice> {
        self.drafts.iter().find(|draft| draft.id == id)
    }

    /// Stores a copy of `invoice` at the front of the list.
    pub fn save(&mut self, invoice: &Invoice) -> &SavedInvoice {
        let draft = SavedInvoice {
            id: uuid::Uuid::new_v4().to_string(),
            saved_at: Utc::now(),
            invoice: invoice.clone(),
        };
        self.drafts.insert(0, draft);
        self.persist_logged();
        &self.drafts[0]
    }

    pub fn delete(&mut self, id: &str) -> bool {
        let before = self.drafts.len();
        self.drafts.retain(|draft| draft.id != id);
        let removed = self.drafts.len() != before;
        if removed {
            self.persist_logged();
        }
        removed
    }

    fn persist_logged(&self) {
        if let Err(err) = self.persist() {
            tracing::warn!(path = %self.path.display(), error = %err, "drafts not persisted");
        }
    }

    fn persist(&self) -> Result<(), LedgerLeafError> {
        let json = serde_json::to_vec(&self.drafts)
            .map_err(|e| LedgerLeafError::Draft(format!("serialize drafts: {e}")))?;
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(&self.path, json)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn invoice(client: &str, number: &str) -> Invoice {
        let mut invoice = Invoice::default();
        invoice.to.name = client.to_string();
        invoice.number = number.to_string();
        invoice
    }

    #[test]
    fn missing_file_opens_empty() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = DraftStore::open(dir.path().join("drafts.json"));
        assert!(store.is_empty());
    }

    #[test]
    fn save_prepends_and_persists() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("nested").join("drafts.json");
        let mut store = DraftStore::open(&path);
        let first = store.save(&invoice("Acme", "1")).id.clone();
        let second = store.save(&invoice("Globex", "2")).id.clone();
        assert_eq!(store.list()[0].id, second);
        assert_eq!(store.list()[1].id, first);

        let reopened = DraftStore::open(&path);
        assert_eq!(reopened.len(), 2);
        assert_eq!(reopened.list()[0].invoice.to.name, "Globex");
        assert_eq!(reopened.get(&first).map(|d| d.invoice.number.as_str()), Some("1"));
    }

    #[test]
    fn saved_draft_is_a_snapshot() {
        let dir = tempfile::tempdir().expect("tempdir");
        let mut store = DraftStore::open(dir.path().join("drafts.json"));
        let mut live = invoice("Acme", "1");
        let id = store.save(&live).id.clone();
        live.to.name = "Changed".to_string();
        assert_eq!(store.get(&id).map(|d| d.invoice.to.name.as_str()), Some("Acme"));
    }

    #[test]
    fn delete_filters_and_persists() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("drafts.json");
        let mut store = DraftStore::open(&path);
        let id = store.save(&invoice("", "")).id.clone();
        store.save(&invoice("Keep", ""));
        assert!(store.delete(&id));
        assert!(!store.delete(&id));
        let reopened = DraftStore::open(&path);
        assert_eq!(reopened.len(), 1);
        assert_eq!(reopened.list()[0].invoice.to.name, "Keep");
    }

    #[test]
    fn corrupt_file_is_discarded() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("drafts.json");
        std::fs::write(&path, b"{not json").expect("write");
        let store = DraftStore::open(&path);
        assert!(store.is_empty());
        assert!(!path.exists());
    }

    #[test]
    fn persisted_layout_is_camel_case() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("drafts.json");
        let mut store = DraftStore::open(&path);
        store.save(&invoice("Acme", "7"));
        let value: serde_json::Value =
            serde_json::from_slice(&std::fs::read(&path).expect("read")).expect("json");
        let entry = &value[0];
        assert!(entry["savedAt"].is_string());
        assert_eq!(entry["invoice"]["to"]["name"], "Acme");
        assert!(entry["invoice"]["bankDetails"].is_object());
    }

    #[test]
    fn display_label_fallbacks() {
        let draft = |client: &str, number: &str| SavedInvoice {
            id: "x".to_string(),
            saved_at: Utc::now(),
            invoice: invoice(client, number),
        };
        assert_eq!(draft("Acme", "9").display_label(), "Acme");
        assert_eq!(draft("", "9").display_label(), "Invoice #9");
        assert_eq!(draft(" ", "").display_label(), "Untitled Draft");
    }
}
