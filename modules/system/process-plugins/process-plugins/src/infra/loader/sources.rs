//! File-backed class sources.

use std::fs::File;
use std::io::{self, Read};
use std::path::{Component, Path, PathBuf};

use parking_lot::Mutex;
use process_plugins_sdk::ClassSource;
use zip::ZipArchive;
use zip::result::ZipError;

/// Class units packed into a zip archive.
pub struct ArchiveClassSource {
    path: PathBuf,
    archive: Mutex<ZipArchive<File>>,
}

impl ArchiveClassSource {
    /// Opens the archive at `path`.
    ///
    /// # Errors
    ///
    /// Returns an I/O error if the file cannot be opened or is not a zip archive.
    pub fn open(path: impl Into<PathBuf>) -> io::Result<Self> {
        let path = path.into();
        let file = File::open(&path)?;
        let archive = ZipArchive::new(file).map_err(zip_to_io)?;
        Ok(Self {
            path,
            archive: Mutex::new(archive),
        })
    }
}

impl ClassSource for ArchiveClassSource {
    fn describe(&self) -> String {
        format!("archive:{}", self.path.display())
    }

    fn read(&self, path: &str) -> io::Result<Option<Vec<u8>>> {
        let mut archive = self.archive.lock();
        let mut entry = match archive.by_name(path) {
            Ok(entry) => entry,
            Err(ZipError::FileNotFound) => return Ok(None),
            Err(e) => return Err(zip_to_io(e)),
        };
        let mut bytes = Vec::new();
        entry.read_to_end(&mut bytes)?;
        Ok(Some(bytes))
    }

    fn entries(&self) -> Vec<String> {
        let archive = self.archive.lock();
        let mut names: Vec<String> = archive
            .file_names()
            .filter(|name| !name.ends_with('/'))
            .map(str::to_owned)
            .collect();
        names.sort();
        names
    }
}

fn zip_to_io(e: ZipError) -> io::Error {
    match e {
        ZipError::Io(e) => e,
        other => io::Error::new(io::ErrorKind::InvalidData, other),
    }
}

/// Class units laid out as files below a root directory.
pub struct DirectoryClassSource {
    root: PathBuf,
}

impl DirectoryClassSource {
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn resolve(&self, path: &str) -> Option<PathBuf> {
        let relative = Path::new(path);
        let safe = relative
            .components()
            .all(|c| matches!(c, Component::Normal(_)));
        safe.then(|| self.root.join(relative))
    }
}

impl ClassSource for DirectoryClassSource {
    fn describe(&self) -> String {
        format!("dir:{}", self.root.display())
    }

    fn read(&self, path: &str) -> io::Result<Option<Vec<u8>>> {
        let Some(full) = self.resolve(path) else {
            return Ok(None);
        };
        match std::fs::read(full) {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e),
        }
    }

    fn entries(&self) -> Vec<String> {
        let mut names: Vec<String> = walkdir::WalkDir::new(&self.root)
            .into_iter()
            .filter_map(Result::ok)
            .filter(|e| e.file_type().is_file())
            .filter_map(|e| {
                let relative = e.path().strip_prefix(&self.root).ok()?;
                let parts: Vec<String> = relative
                    .components()
                    .map(|c| c.as_os_str().to_string_lossy().into_owned())
                    .collect();
                Some(parts.join("/"))
            })
            .collect();
        names.sort();
        names
    }
}
