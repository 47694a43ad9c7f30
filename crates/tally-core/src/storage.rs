//! Upload storage for receipt images, PDFs and imported CSV files
//!
//! Files live flat in one directory under generated names of the form
//! `<unix millis>-<random>.<ext>`. Receipts store only that name, so a
//! stored name is never allowed to contain a path separator.

use std::fs;
use std::path::{Path, PathBuf};

use chrono::Utc;
use rand::Rng;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::{Error, Result};

/// MIME types accepted for upload. CSV files are also accepted by extension.
pub const ALLOWED_TYPES: &[&str] = &[
    "image/jpeg",
    "image/png",
    "application/pdf",
    "text/csv",
    "application/csv",
    "application/vnd.ms-excel",
    "text/plain",
];

/// Reference to a stored file, as recorded on a receipt
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredFile {
    /// Generated file name inside the upload directory
    pub file_path: String,
    pub file_type: String,
}

/// Strip parameters such as `; charset=utf-8` and lower-case
fn base_mime(content_type: &str) -> String {
    content_type
        .split(';')
        .next()
        .unwrap_or("")
        .trim()
        .to_lowercase()
}

fn is_csv_name(original_name: &str) -> bool {
    original_name.to_lowercase().ends_with(".csv")
}

/// Whether an upload with this type and client-side name may be stored
pub fn is_allowed(content_type: &str, original_name: &str) -> bool {
    ALLOWED_TYPES.contains(&base_mime(content_type).as_str()) || is_csv_name(original_name)
}

/// Extension of the client-side name, including the dot, if it looks sane
fn extension(original_name: &str) -> String {
    Path::new(original_name)
        .extension()
        .and_then(|e| e.to_str())
        .filter(|e| !e.is_empty() && e.len() <= 10 && e.chars().all(|c| c.is_ascii_alphanumeric()))
        .map(|e| format!(".{}", e))
        .unwrap_or_default()
}

/// Collision-resistant name for a new upload
pub fn generate_name(original_name: &str) -> String {
    let suffix: u32 = rand::thread_rng().gen_range(0..1_000_000_000);
    format!(
        "{}-{}{}",
        Utc::now().timestamp_millis(),
        suffix,
        extension(original_name)
    )
}

/// Directory-backed file store
#[derive(Debug, Clone)]
pub struct UploadStore {
    dir: PathBuf,
}

impl UploadStore {
    /// Open the store, creating the directory if needed
    pub fn new(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir)?;
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Save an upload under a generated name
    pub fn store(&self, original_name: &str, content_type: &str, bytes: &[u8]) -> Result<StoredFile> {
        if !is_allowed(content_type, original_name) {
            return Err(Error::Storage(format!(
                "File type not allowed: {}",
                if content_type.is_empty() { original_name } else { content_type }
            )));
        }

        let mut file_type = base_mime(content_type);
        if file_type.is_empty() || file_type == "application/octet-stream" {
            file_type = if is_csv_name(original_name) {
                "text/csv".to_string()
            } else {
                "application/octet-stream".to_string()
            };
        }

        let name = generate_name(original_name);
        fs::write(self.dir.join(&name), bytes)?;
        debug!(file = %name, size = bytes.len(), "Stored upload");

        Ok(StoredFile {
            file_path: name,
            file_type,
        })
    }

    /// Full path of a stored file. None for names that could escape the directory.
    pub fn resolve(&self, name: &str) -> Option<PathBuf> {
        let valid = !name.is_empty()
            && name != "."
            && name != ".."
            && !name.contains(['/', '\\'])
            && !name.contains("..");
        valid.then(|| self.dir.join(name))
    }

    pub fn exists(&self, name: &str) -> bool {
        self.resolve(name).is_some_and(|p| p.is_file())
    }

    /// Remove a stored file. Returns false when it was already gone.
    pub fn delete(&self, name: &str) -> Result<bool> {
        let path = self
            .resolve(name)
            .ok_or_else(|| Error::Storage(format!("Invalid stored file name: {}", name)))?;

        match fs::remove_file(&path) {
            Ok(()) => {
                debug!(file = %name, "Deleted upload");
                Ok(true)
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    /// Best-effort removal for cleanup paths; failures are logged, not returned
    pub fn remove_quietly(&self, name: &str) {
        if let Err(e) = self.delete(name) {
            warn!(file = %name, error = %e, "Failed to delete upload");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_allowed_types() {
        assert!(is_allowed("image/jpeg", "r.jpg"));
        assert!(is_allowed("text/csv; charset=utf-8", "export.csv"));
        assert!(is_allowed("application/octet-stream", "Export.CSV"));
        assert!(!is_allowed("application/zip", "bundle.zip"));
        assert!(!is_allowed("", "script.sh"));
    }

    #[test]
    fn test_generated_names_keep_extension() {
        let name = generate_name("receipt photo.JPG");
        assert!(name.ends_with(".JPG"));
        let (millis, rest) = name.split_once('-').unwrap();
        assert!(millis.parse::<i64>().is_ok());
        assert!(rest.trim_end_matches(".JPG").parse::<u32>().is_ok());

        assert!(!generate_name("noext").contains('.'));
        assert!(!generate_name("evil.p/h").contains('/'));
    }

    #[test]
    fn test_store_and_delete() {
        let dir = TempDir::new().unwrap();
        let store = UploadStore::new(dir.path().join("uploads")).unwrap();

        let stored = store
            .store("items.csv", "application/octet-stream", b"Item,Qty\nBolt,2\n")
            .unwrap();
        assert_eq!(stored.file_type, "text/csv");
        assert!(store.exists(&stored.file_path));

        assert!(store.delete(&stored.file_path).unwrap());
        assert!(!store.exists(&stored.file_path));
        assert!(!store.delete(&stored.file_path).unwrap());
    }

    #[test]
    fn test_store_rejects_disallowed_type() {
        let dir = TempDir::new().unwrap();
        let store = UploadStore::new(dir.path()).unwrap();
        let result = store.store("payload.exe", "application/x-msdownload", b"MZ");
        assert!(matches!(result, Err(Error::Storage(_))));
    }

    #[test]
    fn test_resolve_rejects_traversal() {
        let dir = TempDir::new().unwrap();
        let store = UploadStore::new(dir.path()).unwrap();
        assert!(store.resolve("../tally.db").is_none());
        assert!(store.resolve("a/b.png").is_none());
        assert!(store.resolve("..").is_none());
        assert!(store.resolve("").is_none());
        assert!(store.resolve("1700000000000-5.png").is_some());
        assert!(store.delete("../../etc/passwd").is_err());
    }
}
