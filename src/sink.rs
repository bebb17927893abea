//! Where finished PDFs go: a saved file, or an in-memory blob referenced by
//! a revocable URL for the preview viewer.

use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use serde::{Deserialize, Serialize};

use crate::error::LedgerLeafError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputAction {
    Download,
    Preview,
}

impl OutputAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            OutputAction::Download => "download",
            OutputAction::Preview => "preview",
        }
    }
}

pub const PREVIEW_DOWNLOAD_NAME: &str = "invoice.pdf";

/// `invoice-<number>.pdf`, with `download` standing in for an empty number.
/// The number is used as typed, whitespace included.
pub fn download_filename(invoice_number: &str) -> String {
    let number = if invoice_number.is_empty() {
        "download"
    } else {
        invoice_number
    };
    format!("invoice-{}.pdf", number)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SavedFile {
    pub filename: String,
    pub location: PathBuf,
    pub bytes: usize,
}

/// Receives finished downloads.
pub trait SaveTarget: Send + Sync {
    fn save(&self, filename: &str, bytes: &[u8]) -> Result<SavedFile, LedgerLeafError>;
}

/// Saves into a directory, creating it on first use.
#[derive(Debug, Clone)]
pub struct DirectoryTarget {
    dir: PathBuf,
}

impl DirectoryTarget {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }
}

impl SaveTarget for DirectoryTarget {
    fn save(&self, filename: &str, bytes: &[u8]) -> Result<SavedFile, LedgerLeafError> {
        // Only the final component is honored so a number like "../x" cannot
        // escape the target directory.
        let name = Path::new(filename)
            .file_name()
            .ok_or_else(|| LedgerLeafError::Sink(format!("unusable file name {filename:?}")))?;
        std::fs::create_dir_all(&self.dir)
            .map_err(|e| LedgerLeafError::Sink(format!("{}: {e}", self.dir.display())))?;
        let location = self.dir.join(name);
        std::fs::write(&location, bytes)
            .map_err(|e| LedgerLeafError::Sink(format!("{}: {e}", location.display())))?;
        tracing::info!(path = %location.display(), bytes = bytes.len(), "file saved");
        Ok(SavedFile {
            filename: filename.to_string(),
            location,
            bytes: bytes.len(),
        })
    }
}

/// Locally scoped reference to bytes held by a `BlobStore`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct BlobUrl(String);

impl BlobUrl {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for BlobUrl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, Default)]
pub struct BlobStore {
    entries: Arc<Mutex<HashMap<BlobUrl, Arc<Vec<u8>>>>>,
}

impl BlobStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn create(&self, bytes: Vec<u8>) -> Result<BlobUrl, LedgerLeafError> {
        let url = BlobUrl(format!("blob:ledgerleaf/{}", uuid::Uuid::new_v4()));
        let mut entries = self
            .entries
            .lock()
            .map_err(|_| LedgerLeafError::Sink("blob store poisoned".to_string()))?;
        entries.insert(url.clone(), Arc::new(bytes));
        Ok(url)
    }

    /// Releases the bytes behind `url`. Returns whether it was still live.
    pub fn revoke(&self, url: &BlobUrl) -> bool {
        let removed = self
            .entries
            .lock()
            .map(|mut entries| entries.remove(url).is_some())
            .unwrap_or(false);
        if removed {
            tracing::debug!(url = %url, "blob revoked");
        }
        removed
    }

    pub fn get(&self, url: &BlobUrl) -> Option<Arc<Vec<u8>>> {
        self.entries.lock().ok()?.get(url).cloned()
    }

    pub fn len(&self) -> usize {
        self.entries.lock().map(|e| e.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// What the preview viewer shows. At most one URL is live at a time.
#[derive(Debug, Default)]
pub struct PreviewState {
    url: Option<BlobUrl>,
    open: bool,
}

impl PreviewState {
    pub fn url(&self) -> Option<&BlobUrl> {
        self.url.as_ref()
    }

    pub fn is_open(&self) -> bool {
        self.open
    }

    /// Shows `url`, revoking whatever was shown before.
    pub fn present(&mut self, blobs: &BlobStore, url: BlobUrl) {
        if let Some(previous) = self.url.replace(url) {
            blobs.revoke(&previous);
        }
        self.open = true;
    }

    /// Hides the viewer and releases its URL.
    pub fn close(&mut self, blobs: &BlobStore) -> bool {
        let was_open = self.open;
        self.open = false;
        if let Some(url) = self.url.take() {
            blobs.revoke(&url);
        }
        was_open
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn filename_uses_number_verbatim() {
        assert_eq!(download_filename("INV-001"), "invoice-INV-001.pdf");
        assert_eq!(download_filename(" 7 "), "invoice- 7 .pdf");
        assert_eq!(download_filename(""), "invoice-download.pdf");
        assert_eq!(download_filename("   "), "invoice-   .pdf");
    }

    #[test]
    fn directory_target_writes_bytes() {
        let dir = tempfile::tempdir().expect("tempdir");
        let target = DirectoryTarget::new(dir.path().join("out"));
        let saved = target.save("invoice-1.pdf", b"%PDF").expect("save");
        assert_eq!(saved.bytes, 4);
        assert_eq!(std::fs::read(&saved.location).expect("read"), b"%PDF");
        assert!(saved.location.starts_with(target.dir()));
    }

    #[test]
    fn directory_target_keeps_files_inside_dir() {
        let dir = tempfile::tempdir().expect("tempdir");
        let target = DirectoryTarget::new(dir.path());
        let saved = target.save("../invoice-x.pdf", b"1").expect("save");
        assert_eq!(saved.location, dir.path().join("invoice-x.pdf"));
        assert!(target.save("..", b"1").is_err());
    }

    #[test]
    fn blob_store_create_and_revoke() {
        let blobs = BlobStore::new();
        let url = blobs.create(vec![1, 2, 3]).expect("blob");
        assert!(url.as_str().starts_with("blob:ledgerleaf/"));
        assert_eq!(blobs.get(&url).map(|b| b.len()), Some(3));
        assert!(blobs.revoke(&url));
        assert!(!blobs.revoke(&url));
        assert!(blobs.get(&url).is_none());
        assert!(blobs.is_empty());
    }

    #[test]
    fn presenting_again_revokes_previous_url() {
        let blobs = BlobStore::new();
        let mut preview = PreviewState::default();
        let first = blobs.create(vec![1]).expect("blob");
        preview.present(&blobs, first.clone());
        let second = blobs.create(vec![2]).expect("blob");
        preview.present(&blobs, second.clone());
        assert!(blobs.get(&first).is_none());
        assert_eq!(preview.url(), Some(&second));
        assert_eq!(blobs.len(), 1);

        assert!(preview.close(&blobs));
        assert!(!preview.is_open());
        assert!(preview.url().is_none());
        assert!(blobs.is_empty());
        assert!(!preview.close(&blobs));
    }
}
