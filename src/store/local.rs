use crate::store::{FileHandle, FileOptions, OpenMode, Store, StoreError};
use std::fs::{File, OpenOptions};
use std::io::{ErrorKind, Read, Write};
use std::path::PathBuf;
use tempfile::TempDir;
use tracing::trace;

/// Store backed by a local directory. Store paths are resolved below `root`.
pub struct LocalStore {
    root: PathBuf,
    _dir: Option<TempDir>,
}

impl LocalStore {
    pub fn new(root: Option<&str>) -> Result<Self, StoreError> {
        match root {
            Some(r) => Ok(LocalStore { root: PathBuf::from(r), _dir: None }),
            None => {
                let dir = TempDir::new()?;
                Ok(LocalStore { root: dir.path().to_path_buf(), _dir: Some(dir) })
            }
        }
    }

    fn resolve(&self, path: &str) -> PathBuf {
        self.root.join(path.trim_start_matches('/'))
    }
}

fn not_found(path: &str, e: std::io::Error) -> StoreError {
    if e.kind() == ErrorKind::NotFound {
        StoreError::NotFound(path.to_owned())
    } else {
        StoreError::Io(e)
    }
}

impl Store for LocalStore {
    fn init(&self) -> Result<(), StoreError> {
        std::fs::create_dir_all(&self.root)?;
        Ok(())
    }

    fn open_file(&self, path: &str, options: FileOptions) -> Result<Box<dyn FileHandle>, StoreError> {
        let full = self.resolve(path);
        trace!(path = %full.display(), mode = ?options.mode, replica = ?options.replica, "open");
        let file = match options.mode {
            OpenMode::WriteTruncate => {
                if let Some(parent) = full.parent() {
                    std::fs::create_dir_all(parent)?;
                }
                let mut opts = OpenOptions::new();
                opts.write(true).create(true).truncate(true);
                #[cfg(unix)]
                {
                    use std::os::unix::fs::OpenOptionsExt;
                    opts.mode(options.permissions);
                }
                opts.open(&full)?
            }
            OpenMode::ReadOnly => File::open(&full).map_err(|e| not_found(path, e))?,
        };
        Ok(Box::new(LocalFile { path: path.to_owned(), file, mode: options.mode }))
    }

    fn delete_file(&self, path: &str) -> Result<(), StoreError> {
        std::fs::remove_file(self.resolve(path)).map_err(|e| not_found(path, e))
    }
}

struct LocalFile {
    path: String,
    file: File,
    mode: OpenMode,
}

impl FileHandle for LocalFile {
    fn write(&mut self, buf: &[u8]) -> Result<usize, StoreError> {
        if self.mode != OpenMode::WriteTruncate {
            return Err(StoreError::WrongMode { path: self.path.clone(), op: "write" });
        }
        self.file.write_all(buf)?;
        Ok(buf.len())
    }

    fn read(&mut self, buf: &mut [u8]) -> Result<usize, StoreError> {
        if self.mode != OpenMode::ReadOnly {
            return Err(StoreError::WrongMode { path: self.path.clone(), op: "read" });
        }
        Ok(self.file.read(buf)?)
    }

    fn close(mut self: Box<Self>) -> Result<(), StoreError> {
        if self.mode == OpenMode::WriteTruncate {
            self.file.flush()?;
        }
        Ok(())
    }
}
