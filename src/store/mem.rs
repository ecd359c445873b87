use crate::store::{FileHandle, FileOptions, OpenMode, Store, StoreError};
use std::collections::BTreeMap;
use std::sync::{Arc, RwLock};

type Files = Arc<RwLock<BTreeMap<String, Arc<Vec<u8>>>>>;

/// Store kept in process memory. A written file becomes visible when its
/// handle is closed.
#[derive(Default)]
pub struct MemStore {
    files: Files,
}

impl MemStore {
    #[cfg(test)]
    pub fn get(&self, path: &str) -> Option<Arc<Vec<u8>>> {
        self.files.read().unwrap_or_else(|e| e.into_inner()).get(path).cloned()
    }

    #[cfg(test)]
    pub fn paths(&self) -> Vec<String> {
        self.files.read().unwrap_or_else(|e| e.into_inner()).keys().cloned().collect()
    }
}

impl Store for MemStore {
    fn init(&self) -> Result<(), StoreError> {
        Ok(())
    }

    fn open_file(&self, path: &str, options: FileOptions) -> Result<Box<dyn FileHandle>, StoreError> {
        match options.mode {
            OpenMode::WriteTruncate => Ok(Box::new(MemWriter {
                path: path.to_owned(),
                data: Vec::new(),
                files: self.files.clone(),
            })),
            OpenMode::ReadOnly => {
                let data = self
                    .files
                    .read()
                    .unwrap_or_else(|e| e.into_inner())
                    .get(path)
                    .cloned()
                    .ok_or_else(|| StoreError::NotFound(path.to_owned()))?;
                Ok(Box::new(MemReader { path: path.to_owned(), data, pos: 0 }))
            }
        }
    }

    fn delete_file(&self, path: &str) -> Result<(), StoreError> {
        self.files
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .remove(path)
            .map(|_| ())
            .ok_or_else(|| StoreError::NotFound(path.to_owned()))
    }
}

struct MemWriter {
    path: String,
    data: Vec<u8>,
    files: Files,
}

impl FileHandle for MemWriter {
    fn write(&mut self, buf: &[u8]) -> Result<usize, StoreError> {
        self.data.extend_from_slice(buf);
        Ok(buf.len())
    }

    fn read(&mut self, _buf: &mut [u8]) -> Result<usize, StoreError> {
        Err(StoreError::WrongMode { path: self.path.clone(), op: "read" })
    }

    fn close(self: Box<Self>) -> Result<(), StoreError> {
        let MemWriter { path, data, files } = *self;
        files.write().unwrap_or_else(|e| e.into_inner()).insert(path, Arc::new(data));
        Ok(())
    }
}

struct MemReader {
    path: String,
    data: Arc<Vec<u8>>,
    pos: usize,
}

impl FileHandle for MemReader {
    fn write(&mut self, _buf: &[u8]) -> Result<usize, StoreError> {
        Err(StoreError::WrongMode { path: self.path.clone(), op: "write" })
    }

    fn read(&mut self, buf: &mut [u8]) -> Result<usize, StoreError> {
        let rest = &self.data[self.pos..];
        let n = rest.len().min(buf.len());
        buf[..n].copy_from_slice(&rest[..n]);
        self.pos += n;
        Ok(n)
    }

    fn close(self: Box<Self>) -> Result<(), StoreError> {
        Ok(())
    }
}
