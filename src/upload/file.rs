//! The file handed to the upload controller.
//!
//! Contents are only read to be forwarded; they are never parsed locally.

use std::path::{Path, PathBuf};

/// Required filename suffix. Case-sensitive.
pub const CSV_EXTENSION: &str = ".csv";

#[derive(Debug, Clone)]
enum Source {
    Disk(PathBuf),
    Memory(Vec<u8>),
}

/// A user-selected file: a display name plus where its bytes come from.
#[derive(Debug, Clone)]
pub struct UploadFile {
    name: String,
    source: Source,
}

impl UploadFile {
    /// A file on disk. The name is the final path component.
    pub fn from_path(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();

        Self {
            name,
            source: Source::Disk(path),
        }
    }

    /// A file already held in memory.
    #[allow(dead_code)] // In-memory callers and tests
    pub fn from_bytes(name: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            name: name.into(),
            source: Source::Memory(bytes),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Path on disk, if the file is backed by one.
    pub fn path(&self) -> Option<&Path> {
        match &self.source {
            Source::Disk(path) => Some(path),
            Source::Memory(_) => None,
        }
    }

    /// Whether the name ends in the literal `.csv` suffix.
    pub fn has_csv_extension(&self) -> bool {
        self.name.ends_with(CSV_EXTENSION)
    }

    /// Load the bytes to forward.
    pub async fn read(&self) -> std::io::Result<Vec<u8>> {
        match &self.source {
            Source::Disk(path) => tokio::fs::read(path).await,
            Source::Memory(bytes) => Ok(bytes.clone()),
        }
    }
}
