use std::fmt::Debug;
use std::io::Read;
use std::path::Path;
use std::time::SystemTime;

use url::Url;

use crate::error::Result;

/// Suffix marking directory names in a [`Resource::list`] result
pub const DIR_SUFFIX: char = '/';

/// A readable, listable resource served by the HTTP layer
///
/// Implementations are shared across request threads. Every call that has to
/// touch the backing store returns a `Result` so that resources whose mount
/// has gone away can fail loudly instead of serving stale content.
pub trait Resource: Send + Sync + Debug {
    /// The URI this resource was created from
    fn uri(&self) -> &Url;

    /// A human-readable name, usually the absolute path
    fn name(&self) -> String;

    /// Whether the resource exists (symlinks are not followed)
    fn exists(&self) -> Result<bool>;

    /// Whether the resource is a directory
    fn is_directory(&self) -> Result<bool>;

    /// Length in bytes, `0` for directories
    fn length(&self) -> Result<u64>;

    /// Last modification time, if the backing store records one
    fn last_modified(&self) -> Result<Option<SystemTime>>;

    /// Open the resource's content for reading
    fn open(&self) -> Result<Box<dyn Read + Send>>;

    /// Names of the entries of a directory resource, sorted
    ///
    /// Directory entries carry a trailing [`DIR_SUFFIX`].
    fn list(&self) -> Result<Vec<String>>;

    /// The alias path, if the OS could reach this resource through a
    /// textually different path
    fn alias(&self) -> Option<&Path>;

    /// Whether [`alias`](Resource::alias) is set
    fn is_alias(&self) -> bool {
        self.alias().is_some()
    }
}
