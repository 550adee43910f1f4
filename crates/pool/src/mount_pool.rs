use std::collections::HashMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, OnceLock};
use std::time::SystemTime;

use parking_lot::Mutex;
use serde::Serialize;
use url::Url;

use resource::uri;

use crate::archive::ZipProvider;
use crate::config::PoolConfig;
use crate::error::{MountError, ProviderError, Result};
use crate::handle::MountHandle;
use crate::provider::{FileSystemProvider, MountedFileSystem, ProviderRegistry};
use crate::sweep::SweepScheduler;

static GLOBAL: OnceLock<MountPool> = OnceLock::new();

/// Registry of live mounts, shared by every clone
#[derive(Debug, Clone)]
pub struct MountPool {
    inner: Arc<PoolInner>,
}

#[derive(Debug)]
struct PoolInner {
    config: PoolConfig,
    providers: ProviderRegistry,
    mounts: Mutex<HashMap<Url, Arc<MountRecord>>>,
}

/// One open filesystem and the references held on it
#[derive(Debug)]
pub(crate) struct MountRecord {
    key: Url,
    fs: Arc<dyn MountedFileSystem>,
    references: AtomicUsize,
    backing: Option<BackingFile>,
    defunct: AtomicBool,
}

/// The on-disk container of a mount, as it was when the mount was created
#[derive(Debug, Clone)]
pub(crate) struct BackingFile {
    pub(crate) path: PathBuf,
    pub(crate) snapshot: FileSnapshot,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct FileSnapshot {
    pub(crate) len: u64,
    pub(crate) modified: Option<SystemTime>,
}

impl FileSnapshot {
    pub(crate) fn capture(path: &Path) -> io::Result<Self> {
        let metadata = fs::metadata(path)?;
        Ok(Self {
            len: metadata.len(),
            modified: metadata.modified().ok(),
        })
    }
}

impl MountRecord {
    fn new(key: Url, fs: Arc<dyn MountedFileSystem>) -> Self {
        let backing = uri::backing_file(&key).and_then(|path| {
            match FileSnapshot::capture(&path) {
                Ok(snapshot) => Some(BackingFile { path, snapshot }),
                Err(e) => {
                    tracing::debug!(
                        key = %key,
                        path = %path.display(),
                        error = %e,
                        "unable to snapshot backing file, staleness tracking disabled"
                    );
                    None
                }
            }
        });

        Self {
            key,
            fs,
            references: AtomicUsize::new(1),
            backing,
            defunct: AtomicBool::new(false),
        }
    }

    pub(crate) fn key(&self) -> &Url {
        &self.key
    }

    pub(crate) fn fs(&self) -> &Arc<dyn MountedFileSystem> {
        &self.fs
    }

    pub(crate) fn backing(&self) -> Option<&BackingFile> {
        self.backing.as_ref()
    }

    pub(crate) fn references(&self) -> usize {
        self.references.load(Ordering::SeqCst)
    }

    pub(crate) fn is_defunct(&self) -> bool {
        self.defunct.load(Ordering::SeqCst)
    }

    /// Mark the record defunct and close its filesystem, once
    ///
    /// Must be called with the pool lock held, right after removal.
    pub(crate) fn retire(&self) {
        if !self.defunct.swap(true, Ordering::SeqCst) {
            self.fs.close();
        }
    }
}

/// Point-in-time view of one mount
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MountInfo {
    pub key: Url,
    pub references: usize,
    pub backing_file: Option<PathBuf>,
}

impl MountPool {
    /// An empty pool without any providers
    pub fn new(config: PoolConfig) -> Self {
        Self {
            inner: Arc::new(PoolInner {
                config,
                providers: ProviderRegistry::new(),
                mounts: Mutex::new(HashMap::new()),
            }),
        }
    }

    /// A pool with the built-in zip provider registered for the configured
    /// archive schemes
    pub fn with_default_providers(config: PoolConfig) -> Result<Self> {
        let pool = Self::new(config);
        pool.install_default_providers()?;
        Ok(pool)
    }

    /// The process-wide pool, built on first use with the default config
    pub fn global() -> &'static MountPool {
        GLOBAL.get_or_init(|| {
            let pool = MountPool::new(PoolConfig::default());
            if let Err(e) = pool.install_default_providers() {
                tracing::warn!(error = %e, "unable to register default providers");
            }
            pool
        })
    }

    fn install_default_providers(&self) -> Result<()> {
        if self.inner.config.archive_schemes.is_empty() {
            return Ok(());
        }
        self.register_provider(Arc::new(ZipProvider::from_config(&self.inner.config)))
    }

    pub fn config(&self) -> &PoolConfig {
        &self.inner.config
    }

    pub fn register_provider(&self, provider: Arc<dyn FileSystemProvider>) -> Result<()> {
        for scheme in provider.schemes() {
            if self.inner.config.is_direct_scheme(&scheme) {
                return Err(MountError::InvalidArgument(format!(
                    "scheme {scheme} addresses the host filesystem directly"
                )));
            }
        }
        self.inner.providers.register(provider)
    }

    pub fn providers(&self) -> &ProviderRegistry {
        &self.inner.providers
    }

    /// Mount the filesystem addressed by `input` and take a reference on it
    ///
    /// `input` must be an absolute URI with an archive-style scheme, and may
    /// point at an entry inside the archive. The pool key is the opened
    /// filesystem's root URI, so every entry URI into one archive shares one
    /// mount.
    pub fn acquire(&self, input: &str) -> Result<MountHandle> {
        let uri = uri::parse_absolute(input).map_err(MountError::from_resource)?;
        if self.inner.config.is_direct_scheme(uri.scheme()) {
            return Err(MountError::InvalidArgument(format!(
                "not an allowed scheme: {input}"
            )));
        }
        let provider = self.inner.providers.get(uri.scheme()).ok_or_else(|| {
            MountError::InvalidArgument(format!(
                "unable to mount filesystem from unsupported uri: {input}"
            ))
        })?;

        let mut mounts = self.inner.mounts.lock();

        let (fs, opened) = match provider.new_file_system(&uri) {
            Ok(fs) => {
                tracing::debug!(uri = %uri, "mounted new filesystem");
                (fs, true)
            }
            Err(ProviderError::AlreadyExists) => {
                let fs = provider
                    .get_file_system(&uri)
                    .map_err(|source| MountError::Open {
                        uri: input.to_string(),
                        source,
                    })?;
                tracing::debug!(uri = %uri, "using existing filesystem");
                (fs, false)
            }
            Err(source) => {
                return Err(MountError::Open {
                    uri: input.to_string(),
                    source,
                })
            }
        };

        let key = fs.root_uri().clone();
        let existing = mounts.get(&key).cloned();
        let fs = match &existing {
            Some(record) if !same_fs(record.fs(), &fs) => {
                if opened {
                    fs.close();
                }
                record.fs().clone()
            }
            _ => fs,
        };

        if existing.is_none() && !fs.is_open() {
            return Err(MountError::Open {
                uri: input.to_string(),
                source: ProviderError::NotFound,
            });
        }

        let root = match fs.resource(&uri) {
            Ok(root) => root,
            Err(e) => {
                if opened && existing.is_none() {
                    fs.close();
                }
                return Err(MountError::from_resource(e));
            }
        };

        let record = match existing {
            Some(record) => {
                let count = record.references.fetch_add(1, Ordering::SeqCst) + 1;
                tracing::debug!(key = %key, references = count, "incremented mount reference count");
                record
            }
            None => {
                let record = Arc::new(MountRecord::new(key.clone(), fs));
                tracing::debug!(key = %key, "pooling new mount");
                mounts.insert(key, record.clone());
                record
            }
        };
        drop(mounts);

        Ok(MountHandle::new(self.clone(), record, root))
    }

    /// Release one reference on `record`
    ///
    /// Records that were evicted, or replaced by a fresh mount of the same
    /// key, are left alone.
    pub(crate) fn release(&self, record: &Arc<MountRecord>) {
        let mut mounts = self.inner.mounts.lock();
        match mounts.get(record.key()) {
            Some(current) if Arc::ptr_eq(current, record) => {}
            _ => {
                tracing::debug!(key = %record.key(), "released mount is no longer pooled");
                return;
            }
        }

        let remaining = record.references.fetch_sub(1, Ordering::SeqCst) - 1;
        if remaining == 0 {
            mounts.remove(record.key());
            record.retire();
            tracing::debug!(key = %record.key(), "reference count reached 0, closed filesystem");
        } else {
            tracing::debug!(key = %record.key(), references = remaining, "decremented mount reference count");
        }
    }

    /// Remove `record` regardless of its references, if it is still pooled
    pub(crate) fn evict(&self, record: &Arc<MountRecord>) -> bool {
        let mut mounts = self.inner.mounts.lock();
        match mounts.get(record.key()) {
            Some(current) if Arc::ptr_eq(current, record) => {}
            _ => return false,
        }

        mounts.remove(record.key());
        record.retire();
        true
    }

    /// Current records, copied out under the lock
    pub(crate) fn records(&self) -> Vec<Arc<MountRecord>> {
        self.inner.mounts.lock().values().cloned().collect()
    }

    /// Snapshot of the live mounts, sorted by key
    ///
    /// Reads only the in-memory records and never stats a backing file. It
    /// does share the pool lock with [`acquire`](Self::acquire), which opens
    /// and indexes archives while holding it, so a call made during a slow
    /// open waits for that open to finish.
    pub fn list_mounts(&self) -> Vec<MountInfo> {
        let mut mounts: Vec<MountInfo> = self
            .inner
            .mounts
            .lock()
            .values()
            .map(|record| MountInfo {
                key: record.key().clone(),
                references: record.references(),
                backing_file: record.backing().map(|backing| backing.path.clone()),
            })
            .collect();
        mounts.sort_by(|a, b| a.key.as_str().cmp(b.key.as_str()));
        mounts
    }

    /// Spawn the background sweeper if `sweep_interval_secs` is configured
    pub fn start_sweeper(&self) -> io::Result<Option<SweepScheduler>> {
        match self.inner.config.sweep_interval() {
            Some(interval) => SweepScheduler::spawn(self.clone(), interval).map(Some),
            None => Ok(None),
        }
    }
}

fn same_fs(a: &Arc<dyn MountedFileSystem>, b: &Arc<dyn MountedFileSystem>) -> bool {
    std::ptr::addr_eq(Arc::as_ptr(a), Arc::as_ptr(b))
}
