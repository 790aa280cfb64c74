//! Access to a plugin's compiled class units.

use std::collections::HashMap;
use std::io;

/// Read-only store of class unit bytes addressed by relative path
/// (e.g. `dev/dsf/bpe/PingTask.class`).
pub trait ClassSource: Send + Sync {
    /// Human readable location, used in logs.
    fn describe(&self) -> String;

    /// Returns the bytes stored at `path`, or `None` if there is no such entry.
    ///
    /// # Errors
    ///
    /// Returns an I/O error if the entry exists but cannot be read.
    fn read(&self, path: &str) -> io::Result<Option<Vec<u8>>>;

    /// Paths of all entries, if the source can enumerate them.
    fn entries(&self) -> Vec<String> {
        Vec::new()
    }
}

/// [`ClassSource`] backed by an in-memory map.
#[derive(Debug, Clone, Default)]
pub struct MemoryClassSource {
    label: String,
    entries: HashMap<String, Vec<u8>>,
}

impl MemoryClassSource {
    #[must_use]
    pub fn new(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            entries: HashMap::new(),
        }
    }

    #[must_use]
    pub fn with_entry(mut self, path: impl Into<String>, bytes: Vec<u8>) -> Self {
        self.insert(path, bytes);
        self
    }

    pub fn insert(&mut self, path: impl Into<String>, bytes: Vec<u8>) {
        self.entries.insert(path.into(), bytes);
    }
}

impl ClassSource for MemoryClassSource {
    fn describe(&self) -> String {
        format!("memory:{}", self.label)
    }

    fn read(&self, path: &str) -> io::Result<Option<Vec<u8>>> {
        Ok(self.entries.get(path).cloned())
    }

    fn entries(&self) -> Vec<String> {
        let mut paths: Vec<String> = self.entries.keys().cloned().collect();
        paths.sort();
        paths
    }
}
