use crate::store::{FileHandle, FileOptions, OpenMode, Store, StoreError, backend};
use redb::{Database, ReadableDatabase, ReadableTable, TableDefinition};
use std::sync::Arc;
use tempfile::NamedTempFile;

static FILES: TableDefinition<&str, &[u8]> = TableDefinition::new("files");

/// Store kept in a single redb database file, one row per store path.
pub struct RedbStore {
    _f: Option<NamedTempFile>,
    db: Arc<Database>,
}

impl RedbStore {
    pub fn new(path: Option<&str>) -> Result<Self, StoreError> {
        let (f, db) = match path {
            Some(p) => (None, Database::create(p).map_err(backend)?),
            None => {
                let f = NamedTempFile::new()?;
                let db = Database::create(f.path()).map_err(backend)?;
                (Some(f), db)
            }
        };
        Ok(RedbStore { _f: f, db: Arc::new(db) })
    }
}

impl Store for RedbStore {
    fn init(&self) -> Result<(), StoreError> {
        let tx = self.db.begin_write().map_err(backend)?;
        {
            let _ = tx.open_table(FILES).map_err(backend)?;
        }
        tx.commit().map_err(backend)?;
        Ok(())
    }

    fn open_file(&self, path: &str, options: FileOptions) -> Result<Box<dyn FileHandle>, StoreError> {
        match options.mode {
            OpenMode::WriteTruncate => Ok(Box::new(RedbWriter {
                path: path.to_owned(),
                data: Vec::new(),
                db: self.db.clone(),
            })),
            OpenMode::ReadOnly => {
                let tx = self.db.begin_read().map_err(backend)?;
                let t = tx.open_table(FILES).map_err(backend)?;
                let data = t
                    .get(path)
                    .map_err(backend)?
                    .map(|v| v.value().to_vec())
                    .ok_or_else(|| StoreError::NotFound(path.to_owned()))?;
                Ok(Box::new(RedbReader { path: path.to_owned(), data, pos: 0 }))
            }
        }
    }

    fn delete_file(&self, path: &str) -> Result<(), StoreError> {
        let tx = self.db.begin_write().map_err(backend)?;
        let existed = {
            let mut t = tx.open_table(FILES).map_err(backend)?;
            t.remove(path).map_err(backend)?.is_some()
        };
        if !existed {
            tx.abort().map_err(backend)?;
            return Err(StoreError::NotFound(path.to_owned()));
        }
        tx.commit().map_err(backend)?;
        Ok(())
    }
}

struct RedbWriter {
    path: String,
    data: Vec<u8>,
    db: Arc<Database>,
}

impl FileHandle for RedbWriter {
    fn write(&mut self, buf: &[u8]) -> Result<usize, StoreError> {
        self.data.extend_from_slice(buf);
        Ok(buf.len())
    }

    fn read(&mut self, _buf: &mut [u8]) -> Result<usize, StoreError> {
        Err(StoreError::WrongMode { path: self.path.clone(), op: "read" })
    }

    fn close(self: Box<Self>) -> Result<(), StoreError> {
        let tx = self.db.begin_write().map_err(backend)?;
        {
            let mut t = tx.open_table(FILES).map_err(backend)?;
            t.insert(self.path.as_str(), self.data.as_slice()).map_err(backend)?;
        }
        tx.commit().map_err(backend)?;
        Ok(())
    }
}

struct RedbReader {
    path: String,
    data: Vec<u8>,
    pos: usize,
}

impl FileHandle for RedbReader {
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
