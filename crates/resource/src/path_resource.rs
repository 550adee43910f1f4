//! Resources addressed by `file:` URIs
//!
//! A [`PathResource`] resolves its URI once, at construction, through a
//! [`PathResolver`]. The canonical path and alias never change afterwards,
//! even if the filesystem does.

use std::fs::{self, File};
use std::io::{self, Read};
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use url::Url;

use crate::alias::PathResolver;
use crate::error::{ResourceError, Result};
use crate::resource::{Resource, DIR_SUFFIX};
use crate::uri;

/// A resource on the host filesystem
#[derive(Debug, Clone)]
pub struct PathResource {
    uri: Url,
    literal: String,
    path: PathBuf,
    alias: Option<PathBuf>,
    resolver: PathResolver,
}

impl PathResource {
    /// Create a resource from an absolute `file:` URI using the host platform
    pub fn new(input: &str) -> Result<Self> {
        Self::with_resolver(PathResolver::new(), input)
    }

    pub fn with_resolver(resolver: PathResolver, input: &str) -> Result<Self> {
        let parsed = uri::parse_absolute(input)?;
        if !uri::is_direct_scheme(parsed.scheme()) {
            return Err(ResourceError::InvalidArgument(format!(
                "not an allowed scheme: {input}"
            )));
        }

        let (path, alias) = resolver.resolve_uri(input)?.into_parts();
        Ok(Self {
            uri: parsed,
            literal: input.to_string(),
            path,
            alias,
            resolver,
        })
    }

    /// Create a resource for a host path
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let resolver = PathResolver::new();
        let (path, alias) = resolver.resolve_path(path)?.into_parts();
        let uri = Url::from_file_path(&path).map_err(|_| {
            ResourceError::InvalidArgument(format!("unable to build uri from: {}", path.display()))
        })?;
        Ok(Self {
            literal: uri.to_string(),
            uri,
            path,
            alias,
            resolver,
        })
    }

    /// The canonical, absolute path
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append a client-supplied sub-path and resolve the result
    ///
    /// Segments are appended literally (after percent-encoding), so `..` in
    /// `sub_path` surfaces as a normalization alias on the new resource.
    pub fn resolve(&self, sub_path: &str) -> Result<Self> {
        let mut literal = self.literal.trim_end_matches('/').to_string();
        for segment in sub_path.split('/').filter(|segment| !segment.is_empty()) {
            literal.push('/');
            literal.push_str(&uri::encode_segment(segment));
        }
        if sub_path.ends_with('/') {
            literal.push('/');
        }

        Self::with_resolver(self.resolver.clone(), &literal)
    }

    /// Whether this resource's canonical path lies under `other`'s
    ///
    /// Both sides are compared by segment after folding `.`/`..`, using the
    /// alias where there is one. A side that cannot be made absolute is never
    /// contained and contains nothing.
    pub fn is_contained_in(&self, other: &PathResource) -> bool {
        match (self.target(), other.target()) {
            (Some(inner), Some(outer)) => inner.starts_with(outer),
            _ => false,
        }
    }

    /// The normalized path this resource actually reaches
    fn target(&self) -> Option<PathBuf> {
        let path = self.alias.as_deref().unwrap_or(&self.path);
        let normal = self.resolver.platform().normalize(path);
        normal.is_absolute().then_some(normal)
    }

    fn metadata(&self) -> Result<fs::Metadata> {
        fs::metadata(&self.path).map_err(|e| self.map_io(e))
    }

    fn map_io(&self, e: io::Error) -> ResourceError {
        match e.kind() {
            io::ErrorKind::NotFound => ResourceError::NotFound(self.path.display().to_string()),
            _ => ResourceError::Io(e),
        }
    }
}

impl PartialEq for PathResource {
    fn eq(&self, other: &Self) -> bool {
        self.path == other.path
    }
}

impl Eq for PathResource {}

impl std::fmt::Display for PathResource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.literal)
    }
}

impl Resource for PathResource {
    fn uri(&self) -> &Url {
        &self.uri
    }

    fn name(&self) -> String {
        self.path.display().to_string()
    }

    fn exists(&self) -> Result<bool> {
        match fs::symlink_metadata(&self.path) {
            Ok(_) => Ok(true),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(ResourceError::Io(e)),
        }
    }

    fn is_directory(&self) -> Result<bool> {
        match fs::metadata(&self.path) {
            Ok(metadata) => Ok(metadata.is_dir()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(ResourceError::Io(e)),
        }
    }

    fn length(&self) -> Result<u64> {
        let metadata = self.metadata()?;
        Ok(if metadata.is_dir() { 0 } else { metadata.len() })
    }

    fn last_modified(&self) -> Result<Option<SystemTime>> {
        Ok(self.metadata()?.modified().ok())
    }

    fn open(&self) -> Result<Box<dyn Read + Send>> {
        if self.metadata()?.is_dir() {
            return Err(ResourceError::IsADirectory(self.name()));
        }
        let file = File::open(&self.path).map_err(|e| self.map_io(e))?;
        Ok(Box::new(file))
    }

    fn list(&self) -> Result<Vec<String>> {
        if !self.metadata()?.is_dir() {
            return Err(ResourceError::NotADirectory(self.name()));
        }

        let mut names = Vec::new();
        for entry in fs::read_dir(&self.path).map_err(|e| self.map_io(e))? {
            let entry = entry?;
            let mut name = entry.file_name().to_string_lossy().into_owned();
            if entry.path().is_dir() {
                name.push(DIR_SUFFIX);
            }
            names.push(name);
        }
        names.sort();
        Ok(names)
    }

    fn alias(&self) -> Option<&Path> {
        self.alias.as_deref()
    }
}
