// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! File system access.
//!
//! Everything dbiwatch reads or writes goes through the [`FileSystem`] trait,
//! so the pipeline can run against the real disk through [`LocalFs`], or
//! against an in-memory fake through [`MemoryFs`].
//!
//! # Atomic Writes
//!
//! Every write is a whole-file replacement. Contents are first written to a
//! temporary file that lives in the same directory as the target, then the
//! temporary file is renamed over the target. Since a rename within one file
//! system is atomic, readers only ever observe the old file or the new file,
//! never a truncated mix of the two.

use std::{
    collections::BTreeMap,
    fs::{create_dir_all, read},
    io::{Error as IoError, ErrorKind, Result as IoResult, Write},
    path::{Path, PathBuf},
    sync::{Mutex, PoisonError},
};
use tempfile::NamedTempFile;
use tracing::{debug, instrument};

/// Layer of indirection for file system access.
pub trait FileSystem: Send + Sync {
    /// Read entire file.
    ///
    /// Yields `None` if the file does not exist.
    fn read(&self, path: &Path) -> IoResult<Option<Vec<u8>>>;

    /// Replace entire file atomically.
    ///
    /// Creates missing parent directories.
    fn write_atomic(&self, path: &Path, contents: &[u8]) -> IoResult<()>;
}

impl<T> FileSystem for &T
where
    T: FileSystem + ?Sized,
{
    fn read(&self, path: &Path) -> IoResult<Option<Vec<u8>>> {
        (**self).read(path)
    }

    fn write_atomic(&self, path: &Path, contents: &[u8]) -> IoResult<()> {
        (**self).write_atomic(path, contents)
    }
}

/// File system access through the local disk.
#[derive(Debug, Default, Clone, Copy)]
pub struct LocalFs;

impl LocalFs {
    /// Construct new local file system handle.
    pub fn new() -> Self {
        Self
    }

    /// Write contents into a temporary file next to target path.
    ///
    /// Nothing happens to the target until [`StagedWrite::commit`] is called.
    /// Dropping the staged write removes the temporary file.
    pub fn stage(&self, path: &Path, contents: &[u8]) -> IoResult<StagedWrite> {
        let parent = match path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        };
        create_dir_all(&parent)?;

        let mut file = NamedTempFile::new_in(&parent)?;
        file.write_all(contents)?;
        file.as_file().sync_all()?;

        Ok(StagedWrite {
            file,
            target: path.to_path_buf(),
        })
    }
}

impl FileSystem for LocalFs {
    fn read(&self, path: &Path) -> IoResult<Option<Vec<u8>>> {
        match read(path) {
            Ok(bytes) => Ok(Some(bytes)),
            Err(error) if error.kind() == ErrorKind::NotFound => Ok(None),
            Err(error) => Err(error),
        }
    }

    #[instrument(skip(self, contents), level = "debug")]
    fn write_atomic(&self, path: &Path, contents: &[u8]) -> IoResult<()> {
        debug!("write {} bytes to {}", contents.len(), path.display());
        self.stage(path, contents)?.commit()
    }
}

/// Temporary file waiting to replace its target.
#[derive(Debug)]
pub struct StagedWrite {
    file: NamedTempFile,
    target: PathBuf,
}

impl StagedWrite {
    /// Path of temporary file holding staged contents.
    pub fn temp_path(&self) -> &Path {
        self.file.path()
    }

    /// Rename temporary file over target.
    pub fn commit(self) -> IoResult<()> {
        self.file
            .persist(&self.target)
            .map(|_| ())
            .map_err(|error| error.error)
    }
}

/// In-memory file system.
///
/// Keeps every file in a map, and logs the path of each completed write so
/// callers can check exactly what a run touched.
#[derive(Debug, Default)]
pub struct MemoryFs {
    inner: Mutex<MemoryFsInner>,
}

#[derive(Debug, Default)]
struct MemoryFsInner {
    files: BTreeMap<PathBuf, Vec<u8>>,
    writes: Vec<PathBuf>,
    interrupt: bool,
}

impl MemoryFs {
    /// Construct new empty in-memory file system.
    pub fn new() -> Self {
        Self::default()
    }

    /// Place file without logging it as a write.
    pub fn insert(&self, path: impl Into<PathBuf>, contents: impl Into<Vec<u8>>) {
        self.lock().files.insert(path.into(), contents.into());
    }

    /// Current contents of file, if any.
    pub fn get(&self, path: impl AsRef<Path>) -> Option<Vec<u8>> {
        self.lock().files.get(path.as_ref()).cloned()
    }

    /// All paths currently present.
    pub fn paths(&self) -> Vec<PathBuf> {
        self.lock().files.keys().cloned().collect()
    }

    /// Paths of every completed atomic write, in order.
    pub fn writes(&self) -> Vec<PathBuf> {
        self.lock().writes.clone()
    }

    /// Simulate interruption between temporary write and final replace.
    ///
    /// While set, atomic writes leave their temporary file behind, do not
    /// touch the target, and fail.
    pub fn interrupt_before_replace(&self, interrupt: bool) {
        self.lock().interrupt = interrupt;
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, MemoryFsInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl FileSystem for MemoryFs {
    fn read(&self, path: &Path) -> IoResult<Option<Vec<u8>>> {
        Ok(self.get(path))
    }

    fn write_atomic(&self, path: &Path, contents: &[u8]) -> IoResult<()> {
        let mut inner = self.lock();
        let mut temp = path.as_os_str().to_owned();
        temp.push(".tmp");
        let temp = PathBuf::from(temp);
        inner.files.insert(temp.clone(), contents.to_vec());

        if inner.interrupt {
            return Err(IoError::new(
                ErrorKind::Interrupted,
                format!("interrupted before replacing {}", path.display()),
            ));
        }

        // INVARIANT: Rename consumes temporary entry.
        let staged = inner.files.remove(&temp).unwrap_or_default();
        inner.files.insert(path.to_path_buf(), staged);
        inner.writes.push(path.to_path_buf());

        Ok(())
    }
}
