use std::io;

use resource::ResourceError;

/// Failures reported by a [`FileSystemProvider`](crate::FileSystemProvider)
#[derive(Debug, thiserror::Error)]
pub enum ProviderError {
    /// A filesystem for this URI is already open; fetch it instead
    #[error("filesystem already exists")]
    AlreadyExists,
    #[error("filesystem not found")]
    NotFound,
    /// The container could not be read as a filesystem (corrupt, wrong format)
    #[error("unsupported filesystem {uri}: {reason}")]
    Unsupported { uri: String, reason: String },
    #[error("io error: {0}")]
    Io(#[from] io::Error),
}

#[derive(Debug, thiserror::Error)]
pub enum MountError {
    /// Relative URI, direct scheme or a scheme without a provider
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
    /// The provider could not open a filesystem for a new key
    #[error("unable to mount {uri}: {source}")]
    Open {
        uri: String,
        #[source]
        source: ProviderError,
    },
    /// The mount was evicted or released
    #[error("mount {0} is no longer valid")]
    Stale(String),
    #[error(transparent)]
    Resource(#[from] ResourceError),
    #[error("a provider is already registered for scheme {0}")]
    DuplicateProvider(String),
}

impl MountError {
    pub(crate) fn from_resource(err: ResourceError) -> Self {
        match err {
            ResourceError::InvalidArgument(message) => MountError::InvalidArgument(message),
            other => MountError::Resource(other),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("unable to read config: {0}")]
    Io(#[from] io::Error),
    #[error("invalid config: {0}")]
    Parse(#[from] toml::de::Error),
}

pub type Result<T, E = MountError> = std::result::Result<T, E>;
