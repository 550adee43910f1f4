use std::io::{Cursor, Read};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::SystemTime;

use ::resource::{Resource, ResourceError, Result};
use url::Url;

use super::entry_index::{normalize_path, EntryInfo};
use super::ArchiveInner;

/// An entry (file or directory) inside an open zip archive
///
/// Entry paths with `.`/`..` or empty segments are looked up in normalized
/// form and flagged as aliases of that form.
#[derive(Debug)]
pub struct ArchiveResource {
    uri: Url,
    path: String,
    alias: Option<PathBuf>,
    archive: Arc<ArchiveInner>,
}

impl ArchiveResource {
    pub(crate) fn new(uri: Url, entry: &str, archive: Arc<ArchiveInner>) -> Self {
        let path = normalize_path(entry);
        let literal = format!("/{}", entry.strip_suffix('/').unwrap_or(entry));
        let alias = (literal != path).then(|| PathBuf::from(&path));

        Self {
            uri,
            path,
            alias,
            archive,
        }
    }

    /// The normalized entry path, `/` for the archive root
    pub fn entry_path(&self) -> &str {
        &self.path
    }

    fn entry(&self) -> Result<EntryInfo> {
        self.archive.ensure_open()?;
        self.archive
            .index
            .get(&self.path)
            .ok_or_else(|| ResourceError::NotFound(self.uri.to_string()))
    }
}

impl Resource for ArchiveResource {
    fn uri(&self) -> &Url {
        &self.uri
    }

    fn name(&self) -> String {
        self.uri.to_string()
    }

    fn exists(&self) -> Result<bool> {
        self.archive.ensure_open()?;
        Ok(self.archive.index.get(&self.path).is_some())
    }

    fn is_directory(&self) -> Result<bool> {
        self.archive.ensure_open()?;
        Ok(self
            .archive
            .index
            .get(&self.path)
            .is_some_and(|entry| entry.is_dir))
    }

    fn length(&self) -> Result<u64> {
        Ok(self.entry()?.size)
    }

    fn last_modified(&self) -> Result<Option<SystemTime>> {
        self.entry()?;
        Ok(self.archive.modified)
    }

    fn open(&self) -> Result<Box<dyn Read + Send>> {
        let entry = self.entry()?;
        let index = match entry {
            EntryInfo { is_dir: true, .. } => {
                return Err(ResourceError::IsADirectory(self.name()))
            }
            EntryInfo {
                index: Some(index), ..
            } => index,
            EntryInfo { index: None, .. } => {
                return Err(ResourceError::NotFound(self.name()))
            }
        };

        let data = self.archive.read(&self.path, index)?;
        Ok(Box::new(Cursor::new(data)))
    }

    fn list(&self) -> Result<Vec<String>> {
        if !self.entry()?.is_dir {
            return Err(ResourceError::NotADirectory(self.name()));
        }
        Ok(self.archive.index.list(&self.path))
    }

    fn alias(&self) -> Option<&Path> {
        self.alias.as_deref()
    }
}
