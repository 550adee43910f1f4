use std::fmt;
use std::io::Read;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::SystemTime;

use url::Url;

use resource::{uri, Resource, ResourceError};

use crate::error::{MountError, Result};
use crate::mount_pool::{MountPool, MountRecord};

/// One acquired reference on a pooled mount
///
/// Closing (or dropping) the handle releases the reference. Once the mount is
/// evicted or its last reference is released, every resource obtained through
/// the handle fails with [`ResourceError::StaleMount`].
#[derive(Debug)]
pub struct MountHandle {
    pool: MountPool,
    record: Arc<MountRecord>,
    root: Arc<dyn Resource>,
    released: AtomicBool,
}

impl MountHandle {
    pub(crate) fn new(pool: MountPool, record: Arc<MountRecord>, root: Arc<dyn Resource>) -> Self {
        let root: Arc<dyn Resource> = Arc::new(PooledResource {
            inner: root,
            record: record.clone(),
        });
        Self {
            pool,
            record,
            root,
            released: AtomicBool::new(false),
        }
    }

    /// The canonical root URI of the mounted filesystem
    pub fn key(&self) -> &Url {
        self.record.key()
    }

    /// The resource for the URI this mount was acquired with
    pub fn root(&self) -> Result<Arc<dyn Resource>> {
        self.ensure_live()?;
        Ok(self.root.clone())
    }

    /// Resolve an entry path relative to the mount root
    pub fn resource(&self, entry: &str) -> Result<Arc<dyn Resource>> {
        self.ensure_live()?;

        let mut literal = self.key().to_string();
        if !literal.ends_with('/') {
            literal.push('/');
        }
        let segments: Vec<String> = entry
            .split('/')
            .filter(|segment| !segment.is_empty())
            .map(uri::encode_segment)
            .collect();
        literal.push_str(&segments.join("/"));
        if entry.ends_with('/') && !segments.is_empty() {
            literal.push('/');
        }

        let target = uri::parse_absolute(&literal).map_err(MountError::from_resource)?;
        let inner = self.record.fs().resource(&target)?;
        Ok(Arc::new(PooledResource {
            inner,
            record: self.record.clone(),
        }))
    }

    /// Whether this handle was released or its mount evicted
    pub fn is_stale(&self) -> bool {
        self.released.load(Ordering::SeqCst) || self.record.is_defunct()
    }

    /// Release this handle's reference; later calls do nothing
    pub fn close(&self) {
        if !self.released.swap(true, Ordering::SeqCst) {
            self.pool.release(&self.record);
        }
    }

    fn ensure_live(&self) -> Result<()> {
        if self.is_stale() {
            return Err(MountError::Stale(self.key().to_string()));
        }
        Ok(())
    }
}

impl Drop for MountHandle {
    fn drop(&mut self) {
        self.close();
    }
}

impl fmt::Display for MountHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "MountHandle[key={}, root={}]", self.key(), self.root.uri())
    }
}

/// A provider resource that stops working once its mount is retired
#[derive(Debug)]
struct PooledResource {
    inner: Arc<dyn Resource>,
    record: Arc<MountRecord>,
}

impl PooledResource {
    fn ensure_live(&self) -> resource::Result<()> {
        if self.record.is_defunct() {
            return Err(ResourceError::StaleMount(self.record.key().to_string()));
        }
        Ok(())
    }
}

impl Resource for PooledResource {
    fn uri(&self) -> &Url {
        self.inner.uri()
    }

    fn name(&self) -> String {
        self.inner.name()
    }

    fn exists(&self) -> resource::Result<bool> {
        self.ensure_live()?;
        self.inner.exists()
    }

    fn is_directory(&self) -> resource::Result<bool> {
        self.ensure_live()?;
        self.inner.is_directory()
    }

    fn length(&self) -> resource::Result<u64> {
        self.ensure_live()?;
        self.inner.length()
    }

    fn last_modified(&self) -> resource::Result<Option<SystemTime>> {
        self.ensure_live()?;
        self.inner.last_modified()
    }

    fn open(&self) -> resource::Result<Box<dyn Read + Send>> {
        self.ensure_live()?;
        self.inner.open()
    }

    fn list(&self) -> resource::Result<Vec<String>> {
        self.ensure_live()?;
        self.inner.list()
    }

    fn alias(&self) -> Option<&Path> {
        self.inner.alias()
    }
}
