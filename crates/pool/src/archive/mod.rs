//! Built-in provider for zip-format archives (`jar:` and `zip:` URIs)
//!
//! URIs take the form `jar:file:///srv/app.zip!/static/site.css`. The archive
//! path is canonicalized, so every spelling of one archive maps to the same
//! root URI `jar:file:///srv/app.zip!/`.

mod cache;
mod entry_index;
mod resource;

pub use self::resource::ArchiveResource;

use std::collections::HashMap;
use std::fmt;
use std::fs::{self, File};
use std::io::Read;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};
use std::time::SystemTime;

use ::resource::uri::{self, CONTAINER_SEPARATOR};
use ::resource::{Resource, ResourceError};
use bytes::Bytes;
use parking_lot::Mutex;
use url::Url;
use zip::ZipArchive;

use self::cache::EntryCache;
use self::entry_index::EntryIndex;
use crate::config::{EntryCacheConfig, PoolConfig};
use crate::error::ProviderError;
use crate::provider::{FileSystemProvider, MountedFileSystem};

/// Opens zip archives addressed by archive-style URIs
#[derive(Debug)]
pub struct ZipProvider {
    schemes: Vec<String>,
    cache_config: EntryCacheConfig,
    open: Mutex<HashMap<Url, Weak<ZipFileSystem>>>,
}

impl ZipProvider {
    pub fn new(schemes: Vec<String>, cache_config: EntryCacheConfig) -> Self {
        Self {
            schemes: schemes
                .into_iter()
                .map(|scheme| scheme.to_ascii_lowercase())
                .collect(),
            cache_config,
            open: Mutex::new(HashMap::new()),
        }
    }

    pub fn from_config(config: &PoolConfig) -> Self {
        Self::new(config.archive_schemes.clone(), config.entry_cache.clone())
    }
}

impl FileSystemProvider for ZipProvider {
    fn schemes(&self) -> Vec<String> {
        self.schemes.clone()
    }

    fn new_file_system(&self, uri: &Url) -> Result<Arc<dyn MountedFileSystem>, ProviderError> {
        let (root, path) = archive_root(uri)?;

        let mut open = self.open.lock();
        open.retain(|_, fs| fs.upgrade().is_some_and(|fs| fs.is_open()));
        if open.contains_key(&root) {
            return Err(ProviderError::AlreadyExists);
        }

        let fs = Arc::new(ZipFileSystem::open(root.clone(), path, &self.cache_config)?);
        open.insert(root, Arc::downgrade(&fs));
        Ok(fs)
    }

    fn get_file_system(&self, uri: &Url) -> Result<Arc<dyn MountedFileSystem>, ProviderError> {
        let (root, _) = archive_root(uri)?;

        match self.open.lock().get(&root).and_then(Weak::upgrade) {
            Some(fs) if fs.is_open() => Ok(fs),
            _ => Err(ProviderError::NotFound),
        }
    }
}

/// The canonical root URI and on-disk path of the archive `uri` points into
fn archive_root(uri: &Url) -> Result<(Url, PathBuf), ProviderError> {
    let unsupported = |reason: &str| ProviderError::Unsupported {
        uri: uri.to_string(),
        reason: reason.to_string(),
    };

    let container = uri::unwrap_container(uri)
        .filter(|container| container.scheme() == "file")
        .ok_or_else(|| unsupported("container is not a file uri"))?;
    let path = container
        .to_file_path()
        .map_err(|_| unsupported("container is not a local path"))?;
    let path = fs::canonicalize(&path)?;

    let container = Url::from_file_path(&path).map_err(|_| unsupported("container path is not absolute"))?;
    let root = Url::parse(&format!("{}:{}{}", uri.scheme(), container, CONTAINER_SEPARATOR))
        .map_err(|e| unsupported(&e.to_string()))?;
    Ok((root, path))
}

/// An open zip archive
#[derive(Debug)]
pub struct ZipFileSystem {
    inner: Arc<ArchiveInner>,
}

pub(crate) struct ArchiveInner {
    root: Url,
    path: PathBuf,
    archive: Mutex<Option<ZipArchive<File>>>,
    closed: AtomicBool,
    index: EntryIndex,
    cache: EntryCache,
    modified: Option<SystemTime>,
}

impl ZipFileSystem {
    fn open(root: Url, path: PathBuf, cache_config: &EntryCacheConfig) -> Result<Self, ProviderError> {
        let unsupported = |e: zip::result::ZipError| ProviderError::Unsupported {
            uri: root.to_string(),
            reason: e.to_string(),
        };

        let file = File::open(&path)?;
        let modified = file.metadata()?.modified().ok();
        let mut archive = ZipArchive::new(file).map_err(unsupported)?;

        let mut index = EntryIndex::new();
        for i in 0..archive.len() {
            let entry = archive.by_index_raw(i).map_err(unsupported)?;
            index.insert(entry.name(), i, entry.is_dir(), entry.size());
        }

        tracing::debug!(
            root = %root,
            entries = index.len(),
            "opened zip archive"
        );

        Ok(Self {
            inner: Arc::new(ArchiveInner {
                root,
                path,
                archive: Mutex::new(Some(archive)),
                closed: AtomicBool::new(false),
                index,
                cache: EntryCache::new(cache_config.clone()),
                modified,
            }),
        })
    }

    /// The canonical path of the archive file
    pub fn path(&self) -> &Path {
        &self.inner.path
    }
}

impl MountedFileSystem for ZipFileSystem {
    fn root_uri(&self) -> &Url {
        &self.inner.root
    }

    fn resource(&self, uri: &Url) -> ::resource::Result<Arc<dyn Resource>> {
        self.inner.ensure_open()?;

        let (root, _) = archive_root(uri).map_err(|e| {
            ResourceError::InvalidArgument(format!("unable to resolve {uri}: {e}"))
        })?;
        if root != self.inner.root {
            return Err(ResourceError::InvalidArgument(format!(
                "{uri} is outside of {}",
                self.inner.root
            )));
        }

        let entry = uri::container_entry(uri);
        Ok(Arc::new(ArchiveResource::new(
            uri.clone(),
            &entry,
            self.inner.clone(),
        )))
    }

    fn is_open(&self) -> bool {
        !self.inner.closed.load(Ordering::SeqCst)
    }

    fn close(&self) {
        if !self.inner.closed.swap(true, Ordering::SeqCst) {
            self.inner.archive.lock().take();
            self.inner.cache.invalidate_all();
            tracing::debug!(root = %self.inner.root, "closed zip archive");
        }
    }
}

impl ArchiveInner {
    fn ensure_open(&self) -> ::resource::Result<()> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(ResourceError::StaleMount(self.root.to_string()));
        }
        Ok(())
    }

    /// Decompressed content of the entry at `index`, cached by `path`
    fn read(&self, path: &str, index: usize) -> ::resource::Result<Bytes> {
        if let Some(hit) = self.cache.get(path) {
            return Ok(hit);
        }

        let mut guard = self.archive.lock();
        let archive = guard
            .as_mut()
            .ok_or_else(|| ResourceError::StaleMount(self.root.to_string()))?;
        let mut file = archive
            .by_index(index)
            .map_err(|e| ResourceError::Io(e.into()))?;

        let mut data = Vec::with_capacity(usize::try_from(file.size()).unwrap_or(0));
        file.read_to_end(&mut data)?;
        drop(file);
        drop(guard);

        let data = Bytes::from(data);
        self.cache.put(path, data.clone());
        Ok(data)
    }
}

impl fmt::Debug for ArchiveInner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ArchiveInner")
            .field("root", &self.root)
            .field("path", &self.path)
            .field("closed", &self.closed.load(Ordering::SeqCst))
            .field("cache", &self.cache)
            .finish()
    }
}
