//! Path index over the entries of a zip archive
//!
//! Zip archives list entries by name only and frequently omit directory
//! entries, so parents are synthesized while indexing. Paths are kept in a
//! normalized `/a/b` form with `.`/`..` folded.

use std::collections::{BTreeSet, HashMap};

use resource::DIR_SUFFIX;

/// One file or directory in the archive
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct EntryInfo {
    /// Position in the central directory, `None` for synthesized directories
    pub(crate) index: Option<usize>,
    pub(crate) is_dir: bool,
    pub(crate) size: u64,
}

impl EntryInfo {
    const DIRECTORY: EntryInfo = EntryInfo {
        index: None,
        is_dir: true,
        size: 0,
    };
}

#[derive(Debug)]
pub(crate) struct EntryIndex {
    entries: HashMap<String, EntryInfo>,
    children: HashMap<String, BTreeSet<String>>,
}

impl Default for EntryIndex {
    fn default() -> Self {
        Self::new()
    }
}

impl EntryIndex {
    pub(crate) const ROOT: &'static str = "/";

    /// Create an index containing only the root directory
    pub(crate) fn new() -> Self {
        let mut entries = HashMap::new();
        entries.insert(Self::ROOT.to_string(), EntryInfo::DIRECTORY);
        Self {
            entries,
            children: HashMap::new(),
        }
    }

    /// Record an archive entry and any missing parent directories
    pub(crate) fn insert(&mut self, name: &str, index: usize, is_dir: bool, size: u64) {
        let path = normalize_path(name);
        if path == Self::ROOT {
            return;
        }

        let info = EntryInfo {
            index: Some(index),
            is_dir,
            size: if is_dir { 0 } else { size },
        };
        match self.entries.get(&path) {
            // A real entry never loses to a synthesized directory
            Some(existing) if existing.index.is_some() => return,
            _ => {
                self.entries.insert(path.clone(), info);
            }
        }

        let mut child = path;
        loop {
            let parent = parent_path(&child);
            self.children
                .entry(parent.clone())
                .or_default()
                .insert(filename(&child).to_string());
            if self.entries.contains_key(&parent) {
                break;
            }
            self.entries.insert(parent.clone(), EntryInfo::DIRECTORY);
            child = parent;
        }
    }

    pub(crate) fn get(&self, path: &str) -> Option<EntryInfo> {
        self.entries.get(&normalize_path(path)).copied()
    }

    /// Sorted names of a directory's children, directories suffixed
    pub(crate) fn list(&self, path: &str) -> Vec<String> {
        let path = normalize_path(path);
        let Some(children) = self.children.get(&path) else {
            return Vec::new();
        };

        let mut names: Vec<String> = children
            .iter()
            .map(|name| {
                let child = join(&path, name);
                let mut name = name.clone();
                if self.entries.get(&child).is_some_and(|info| info.is_dir) {
                    name.push(DIR_SUFFIX);
                }
                name
            })
            .collect();
        names.sort();
        names
    }

    pub(crate) fn len(&self) -> usize {
        self.entries.len()
    }
}

/// Normalize an entry path to `/a/b`, folding `.` and `..` segments
///
/// `..` never climbs above the root.
pub(crate) fn normalize_path(path: &str) -> String {
    let mut segments: Vec<&str> = Vec::new();
    for segment in path.trim().split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                segments.pop();
            }
            segment => segments.push(segment),
        }
    }
    format!("/{}", segments.join("/"))
}

/// Get the parent path of a normalized path
pub(crate) fn parent_path(path: &str) -> String {
    let normalized = normalize_path(path);
    match normalized.rfind('/') {
        Some(0) | None => EntryIndex::ROOT.to_string(),
        Some(pos) => normalized[..pos].to_string(),
    }
}

/// Get the filename component of a path
pub(crate) fn filename(path: &str) -> &str {
    let trimmed = path.trim().trim_end_matches('/');
    match trimmed.rfind('/') {
        Some(pos) => &trimmed[pos + 1..],
        None => trimmed,
    }
}

fn join(dir: &str, name: &str) -> String {
    if dir == EntryIndex::ROOT {
        format!("/{name}")
    } else {
        format!("{dir}/{name}")
    }
}
