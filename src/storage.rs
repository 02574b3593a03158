//! String key-value storage backing the chat transcript

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use log::{debug, trace};

use crate::error::Error;

/// Minimal key-value contract, the shape of browser local storage
pub trait KeyValueStore: Send + Sync
{   fn get(&self, key: &str) -> Result<Option<String>, Error>;
    fn set(&self, key: &str, value: &str) -> Result<(), Error>;
    fn remove(&self, key: &str) -> Result<(), Error>;
}

/// In-process store, lost on exit
#[derive(Debug, Default)]
pub struct MemoryStore
{   entries: Mutex<HashMap<String, String>>
}

impl MemoryStore
{   pub fn new() -> Self
    {   MemoryStore::default()
    }

    fn lock(&self)
      -> Result<std::sync::MutexGuard<'_, HashMap<String, String>>, Error>
    {   self.entries.lock().map_err(|_| {
          Error::Persistence("memory store lock poisoned".to_string())
        })
    }
}

impl KeyValueStore for MemoryStore
{   fn get(&self, key: &str) -> Result<Option<String>, Error>
    {   Ok(self.lock()?.get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<(), Error>
    {   self.lock()?.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), Error>
    {   self.lock()?.remove(key);
        Ok(())
    }
}

/// One file per key inside a directory
#[derive(Debug, Clone)]
pub struct FileStore
{   dir: PathBuf
}

impl FileStore
{   pub fn new(dir: impl Into<PathBuf>) -> Self
    {   FileStore
        {   dir: dir.into()
        }
    }

    pub fn dir(&self) -> &Path
    {   &self.dir
    }

    fn path_for(&self, key: &str) -> PathBuf
    {   let safe: String = key
          .chars()
          .map(|c| {
            if c.is_ascii_alphanumeric() || c == '_' || c == '-'
            {   c
            } else
            {   '_'
            }
          })
          .collect();
        self.dir.join(format!("{}.json", safe))
    }
}

impl KeyValueStore for FileStore
{   fn get(&self, key: &str) -> Result<Option<String>, Error>
    {   let path = self.path_for(key);
        match std::fs::read_to_string(&path)
        {   Ok(text) => {
              trace!("Read {} bytes from {}", text.len(), path.display());
              Ok(Some(text))
            }
          , Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None)
          , Err(e) => Err(Error::Persistence(
              format!("read {}: {}", path.display(), e)
            ))
        }
    }

    fn set(&self, key: &str, value: &str) -> Result<(), Error>
    {   std::fs::create_dir_all(&self.dir).map_err(|e| {
          Error::Persistence(
            format!("create {}: {}", self.dir.display(), e)
          )
        })?;
        let path = self.path_for(key);
        let tmp = path.with_extension("json.tmp");
        std::fs::write(&tmp, value)
          .and_then(|_| std::fs::rename(&tmp, &path))
          .map_err(|e| {
            Error::Persistence(format!("write {}: {}", path.display(), e))
          })?;
        debug!("Persisted {} to {}", key, path.display());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), Error>
    {   let path = self.path_for(key);
        match std::fs::remove_file(&path)
        {   Ok(()) => Ok(())
          , Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(())
          , Err(e) => Err(Error::Persistence(
              format!("remove {}: {}", path.display(), e)
            ))
        }
    }
}
