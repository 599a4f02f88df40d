//! Value-typed virtual filesystem snapshots.
//!
//! A pipeline stage receives an [`FsSnapshot`] by value and hands a new one
//! to the next stage. File bodies are reference counted and never mutated in
//! place: replacing a file swaps the entry, so cloning a cached base image is
//! cheap and cannot leak one request's writes into another request.

use chrono::{DateTime, TimeZone, Utc};
use flate2::read::GzDecoder;
use std::collections::BTreeMap;
use std::io::{self, Read};
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;

#[derive(Debug, Clone, PartialEq)]
pub enum FileContent {
    Text(String),
    Binary(Arc<[u8]>),
}

impl FileContent {
    pub fn as_bytes(&self) -> &[u8] {
        match self {
            FileContent::Text(text) => text.as_bytes(),
            FileContent::Binary(bytes) => bytes,
        }
    }

    pub fn len(&self) -> usize {
        self.as_bytes().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct FsEntry {
    pub content: FileContent,
    pub modified: DateTime<Utc>,
}

impl FsEntry {
    fn now(content: FileContent) -> Self {
        Self {
            content,
            modified: Utc::now(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct FsSnapshot {
    entries: BTreeMap<String, FsEntry>,
}

/// Converts archive or host paths to the absolute, forward-slash form used as
/// snapshot keys.
pub fn normalize_path(input: &str) -> String {
    let converted = input.replace('\\', "/");
    let trimmed = converted.trim_start_matches("./");
    if trimmed.starts_with('/') {
        trimmed.to_string()
    } else {
        format!("/{}", trimmed)
    }
}

impl FsSnapshot {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, path: &str) -> Option<&FsEntry> {
        self.entries.get(&normalize_path(path))
    }

    pub fn contains(&self, path: &str) -> bool {
        self.get(path).is_some()
    }

    pub fn insert(&mut self, path: &str, content: FileContent) {
        self.entries
            .insert(normalize_path(path), FsEntry::now(content));
    }

    pub fn with_text(mut self, path: &str, content: impl Into<String>) -> Self {
        self.insert(path, FileContent::Text(content.into()));
        self
    }

    pub fn with_binary(mut self, path: &str, content: impl Into<Arc<[u8]>>) -> Self {
        self.insert(path, FileContent::Binary(content.into()));
        self
    }

    /// Layers `top` over `self`; files present in both take `top`'s version.
    pub fn overlay(mut self, top: FsSnapshot) -> Self {
        self.entries.extend(top.entries);
        self
    }

    /// Unpacks a gzip-compressed tar archive. Directories, links and other
    /// non-regular entries are skipped.
    pub fn from_tar_gz(data: &[u8]) -> io::Result<Self> {
        let mut archive = tar::Archive::new(GzDecoder::new(data));
        let mut snapshot = FsSnapshot::new();

        for entry in archive.entries()? {
            let mut entry = entry?;
            if !entry.header().entry_type().is_file() {
                continue;
            }

            let path = normalize_path(&entry.path()?.to_string_lossy());
            let modified = entry
                .header()
                .mtime()
                .ok()
                .and_then(|secs| Utc.timestamp_opt(secs as i64, 0).single())
                .unwrap_or_else(Utc::now);

            let mut content = Vec::new();
            entry.read_to_end(&mut content)?;

            snapshot.entries.insert(
                path,
                FsEntry {
                    content: FileContent::Binary(content.into()),
                    modified,
                },
            );
        }

        log::debug!("Unpacked {} files from tar.gz archive", snapshot.len());
        Ok(snapshot)
    }

    /// Writes every file under `root`, treating `root` as the guest's `/`.
    pub fn write_to_dir(&self, root: &Path) -> io::Result<()> {
        for (path, entry) in &self.entries {
            let host_path = host_path_for(root, path)?;
            if let Some(parent) = host_path.parent() {
                std::fs::create_dir_all(parent)?;
            }
            std::fs::write(&host_path, entry.content.as_bytes())?;
        }
        Ok(())
    }

    /// Reads a host directory back into a snapshot rooted at `/`.
    pub fn read_from_dir(root: &Path) -> io::Result<Self> {
        let mut snapshot = FsSnapshot::new();
        let mut pending = vec![root.to_path_buf()];

        while let Some(dir) = pending.pop() {
            for entry in std::fs::read_dir(&dir)? {
                let entry = entry?;
                let file_type = entry.file_type()?;
                let host_path = entry.path();
                if file_type.is_dir() {
                    pending.push(host_path);
                    continue;
                }
                if !file_type.is_file() {
                    continue;
                }

                let relative = host_path
                    .strip_prefix(root)
                    .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e.to_string()))?;
                let modified = entry
                    .metadata()?
                    .modified()
                    .map(DateTime::<Utc>::from)
                    .unwrap_or_else(|_| Utc::now());
                let content = std::fs::read(&host_path)?;

                snapshot.entries.insert(
                    normalize_path(&relative.to_string_lossy()),
                    FsEntry {
                        content: FileContent::Binary(content.into()),
                        modified,
                    },
                );
            }
        }

        Ok(snapshot)
    }
}

fn host_path_for(root: &Path, guest_path: &str) -> io::Result<PathBuf> {
    let relative = Path::new(guest_path.trim_start_matches('/'));
    if relative
        .components()
        .any(|c| !matches!(c, Component::Normal(_)))
    {
        return Err(io::Error::new(
            io::ErrorKind::InvalidInput,
            format!("refusing to materialize path outside the sandbox: {}", guest_path),
        ));
    }
    Ok(root.join(relative))
}
