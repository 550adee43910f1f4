//! Reference-counted mounts of archive-backed filesystems
//!
//! Many request threads may need the contents of the same archive at once.
//! The [`MountPool`] keeps at most one open filesystem per canonical root
//! URI and hands out [`MountHandle`]s; the filesystem is closed when the last
//! handle is released, or earlier if the staleness sweep finds that the
//! backing file changed on disk.
//!
//! # Architecture
//!
//! - [`MountPool`]: registry of live mounts, keyed by the filesystem's own
//!   root URI
//! - [`MountHandle`]: single-release capability for one acquired reference
//! - [`FileSystemProvider`]: opens filesystems for a URI scheme
//! - [`ZipProvider`]: built-in provider for `jar:` and `zip:` URIs
//! - [`SweepScheduler`]: optional background thread running
//!   [`MountPool::sweep`]

mod archive;
mod config;
mod error;
mod handle;
mod mount_pool;
mod provider;
mod sweep;

pub use archive::{ArchiveResource, ZipFileSystem, ZipProvider};
pub use config::{EntryCacheConfig, PoolConfig};
pub use error::{ConfigError, MountError, ProviderError, Result};
pub use handle::MountHandle;
pub use mount_pool::{MountInfo, MountPool};
pub use provider::{FileSystemProvider, MountedFileSystem, ProviderRegistry};
pub use sweep::{SweepReport, SweepScheduler};
