mod local;
mod mem;
mod redb;

use crate::StoreType;
use crate::store::local::LocalStore;
use crate::store::redb::RedbStore;
use std::sync::Arc;

pub use crate::store::mem::MemStore;

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum OpenMode {
    WriteTruncate,
    ReadOnly,
}

/// How a file is opened. `replica` is a hint for stores that replicate;
/// `None` leaves the choice to the store.
#[derive(Copy, Clone, Debug)]
pub struct FileOptions {
    pub mode: OpenMode,
    pub permissions: u32,
    pub replica: Option<u32>,
}

impl FileOptions {
    pub fn write() -> Self {
        FileOptions { mode: OpenMode::WriteTruncate, permissions: 0o664, replica: None }
    }

    pub fn read() -> Self {
        FileOptions { mode: OpenMode::ReadOnly, permissions: 0, replica: None }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("no such file: {0}")]
    NotFound(String),
    #[error("handle for {path} is not open for {op}")]
    WrongMode { path: String, op: &'static str },
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error("backend error: {0}")]
    Backend(String),
}

pub(crate) fn backend(e: impl std::fmt::Display) -> StoreError {
    StoreError::Backend(e.to_string())
}

/// Client side of the file store under test.
pub trait Store: Send + Sync {
    fn init(&self) -> Result<(), StoreError>;
    fn open_file(&self, path: &str, options: FileOptions) -> Result<Box<dyn FileHandle>, StoreError>;
    fn delete_file(&self, path: &str) -> Result<(), StoreError>;
}

/// An open file. Reads return `Ok(0)` at end of stream.
pub trait FileHandle: Send {
    fn write(&mut self, buf: &[u8]) -> Result<usize, StoreError>;
    fn read(&mut self, buf: &mut [u8]) -> Result<usize, StoreError>;
    fn close(self: Box<Self>) -> Result<(), StoreError>;
}

pub fn open_store(store: StoreType, address: Option<&str>) -> Result<Arc<dyn Store>, StoreError> {
    let s: Arc<dyn Store> = match store {
        StoreType::Mem => Arc::new(MemStore::default()),
        StoreType::Local => Arc::new(LocalStore::new(address)?),
        StoreType::Redb => Arc::new(RedbStore::new(address)?),
    };
    s.init()?;
    Ok(s)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write_file(store: &dyn Store, path: &str, chunks: &[&[u8]]) {
        let mut f = store.open_file(path, FileOptions::write()).unwrap();
        for c in chunks {
            assert_eq!(f.write(c).unwrap(), c.len());
        }
        f.close().unwrap();
    }

    fn read_file(store: &dyn Store, path: &str) -> Vec<u8> {
        let mut f = store.open_file(path, FileOptions::read()).unwrap();
        let mut out = Vec::new();
        let mut buf = [0u8; 3];
        loop {
            let n = f.read(&mut buf).unwrap();
            if n == 0 {
                break;
            }
            out.extend_from_slice(&buf[..n]);
        }
        f.close().unwrap();
        out
    }

    fn exercise(store: &dyn Store) {
        store.init().unwrap();
        write_file(store, "/0/0", &[b"hello ", b"world"]);
        assert_eq!(read_file(store, "/0/0"), b"hello world");

        // truncating open replaces the previous contents
        write_file(store, "/0/0", &[b"bye"]);
        assert_eq!(read_file(store, "/0/0"), b"bye");

        let mut r = store.open_file("/0/0", FileOptions::read()).unwrap();
        assert!(matches!(r.write(b"x"), Err(StoreError::WrongMode { .. })));

        assert!(store.open_file("/0/1", FileOptions::read()).is_err());
        store.delete_file("/0/0").unwrap();
        assert!(store.open_file("/0/0", FileOptions::read()).is_err());
        assert!(store.delete_file("/0/0").is_err());
    }

    #[test]
    fn mem_store() {
        exercise(&MemStore::default());
    }

    #[test]
    fn local_store() {
        let dir = tempfile::tempdir().unwrap();
        exercise(&LocalStore::new(dir.path().to_str()).unwrap());
        exercise(&LocalStore::new(None).unwrap());
    }

    #[test]
    fn redb_store() {
        exercise(&RedbStore::new(None).unwrap());
    }

    #[test]
    fn redb_store_persists_across_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("files.redb");
        let path = path.to_str().unwrap();
        {
            let s = open_store(StoreType::Redb, Some(path)).unwrap();
            write_file(s.as_ref(), "/3/7", &[b"persisted"]);
        }
        let s = open_store(StoreType::Redb, Some(path)).unwrap();
        assert_eq!(read_file(s.as_ref(), "/3/7"), b"persisted");
    }
}
