//! Shared fixtures for pool integration tests
#![allow(dead_code)]

use std::collections::HashMap;
use std::fs::File;
use std::io::{Cursor, Read, Write};
use std::path::Path;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::SystemTime;

use parking_lot::Mutex;
use url::Url;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

use pool::{FileSystemProvider, MountedFileSystem, ProviderError};
use resource::{Resource, ResourceError};

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// Write a zip archive; names ending in `/` become directory entries
pub fn write_zip(path: &Path, entries: &[(&str, &[u8])]) {
    let file = File::create(path).unwrap();
    let mut zip = ZipWriter::new(file);
    let options = SimpleFileOptions::default().compression_method(CompressionMethod::Stored);

    for (name, data) in entries {
        if name.ends_with('/') {
            zip.add_directory(*name, options).unwrap();
        } else {
            zip.start_file(*name, options).unwrap();
            zip.write_all(data).unwrap();
        }
    }
    zip.finish().unwrap();
}

/// `jar:` URI for an entry of the archive at `path`
pub fn jar_uri(path: &Path, entry: &str) -> String {
    format!("jar:{}!/{}", Url::from_file_path(path).unwrap(), entry)
}

/// In-memory provider for `mem:` URIs that counts opens and closes
///
/// Filesystems are keyed by everything up to and including `!/`, and are
/// never backed by a file.
#[derive(Debug, Default)]
pub struct MemProvider {
    opened: AtomicUsize,
    closed: Arc<AtomicUsize>,
    fail_open: AtomicBool,
    open: Mutex<HashMap<Url, Arc<MemFileSystem>>>,
}

impl MemProvider {
    pub fn opened(&self) -> usize {
        self.opened.load(Ordering::SeqCst)
    }

    pub fn closed(&self) -> usize {
        self.closed.load(Ordering::SeqCst)
    }

    pub fn fail_next_opens(&self, fail: bool) {
        self.fail_open.store(fail, Ordering::SeqCst);
    }

    fn root_of(uri: &Url) -> Url {
        let literal = uri.as_str();
        let root = match literal.find("!/") {
            Some(sep) => literal[..sep + 2].to_string(),
            None => format!("{literal}!/"),
        };
        Url::parse(&root).unwrap()
    }
}

impl FileSystemProvider for MemProvider {
    fn schemes(&self) -> Vec<String> {
        vec!["mem".to_string()]
    }

    fn new_file_system(&self, uri: &Url) -> Result<Arc<dyn MountedFileSystem>, ProviderError> {
        if self.fail_open.load(Ordering::SeqCst) {
            return Err(ProviderError::Unsupported {
                uri: uri.to_string(),
                reason: "corrupt bundle".to_string(),
            });
        }

        let root = Self::root_of(uri);
        let mut open = self.open.lock();
        if open.get(&root).is_some_and(|fs| fs.is_open()) {
            return Err(ProviderError::AlreadyExists);
        }

        let fs = Arc::new(MemFileSystem {
            root: root.clone(),
            closed: AtomicBool::new(false),
            close_count: self.closed.clone(),
        });
        self.opened.fetch_add(1, Ordering::SeqCst);
        open.insert(root, fs.clone());
        Ok(fs)
    }

    fn get_file_system(&self, uri: &Url) -> Result<Arc<dyn MountedFileSystem>, ProviderError> {
        self.open
            .lock()
            .get(&Self::root_of(uri))
            .filter(|fs| fs.is_open())
            .cloned()
            .map(|fs| fs as Arc<dyn MountedFileSystem>)
            .ok_or(ProviderError::NotFound)
    }
}

#[derive(Debug)]
pub struct MemFileSystem {
    root: Url,
    closed: AtomicBool,
    close_count: Arc<AtomicUsize>,
}

impl MountedFileSystem for MemFileSystem {
    fn root_uri(&self) -> &Url {
        &self.root
    }

    fn resource(&self, uri: &Url) -> resource::Result<Arc<dyn Resource>> {
        if !self.is_open() {
            return Err(ResourceError::StaleMount(self.root.to_string()));
        }
        Ok(Arc::new(MemResource { uri: uri.clone() }))
    }

    fn is_open(&self) -> bool {
        !self.closed.load(Ordering::SeqCst)
    }

    fn close(&self) {
        if !self.closed.swap(true, Ordering::SeqCst) {
            self.close_count.fetch_add(1, Ordering::SeqCst);
        }
    }
}

/// Every entry of a mem filesystem reads as `hello`
#[derive(Debug)]
pub struct MemResource {
    uri: Url,
}

impl Resource for MemResource {
    fn uri(&self) -> &Url {
        &self.uri
    }

    fn name(&self) -> String {
        self.uri.to_string()
    }

    fn exists(&self) -> resource::Result<bool> {
        Ok(true)
    }

    fn is_directory(&self) -> resource::Result<bool> {
        Ok(false)
    }

    fn length(&self) -> resource::Result<u64> {
        Ok(5)
    }

    fn last_modified(&self) -> resource::Result<Option<SystemTime>> {
        Ok(None)
    }

    fn open(&self) -> resource::Result<Box<dyn Read + Send>> {
        Ok(Box::new(Cursor::new(b"hello".to_vec())))
    }

    fn list(&self) -> resource::Result<Vec<String>> {
        Err(ResourceError::NotADirectory(self.name()))
    }

    fn alias(&self) -> Option<&Path> {
        None
    }
}
