//! Bounded, persisted chat history

use std::sync::{Arc, Mutex};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use log::{debug, warn};

use crate::config::TranscriptConfig;
use crate::storage::{FileStore, KeyValueStore, MemoryStore};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatEntry
{   pub role: String
  , pub content: String
}

impl ChatEntry
{   pub fn user(content: impl Into<String>) -> Self
    {   ChatEntry
        {   role: "user".to_string()
          , content: content.into()
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self
    {   ChatEntry
        {   role: "assistant".to_string()
          , content: content.into()
        }
    }
}

/// Chat transcript capped at the most recent `max_entries`
///
/// Storage failures never escape: reads degrade to an empty history
/// and writes are logged and dropped. An append whose read fails is
/// skipped rather than overwriting history it could not see. Clones
/// share one write lock, so concurrent appends never lose entries.
#[derive(Clone)]
pub struct TranscriptStore
{   store: Arc<dyn KeyValueStore>
  , key: String
  , max_entries: usize
  , write_lock: Arc<Mutex<()>>
}

impl TranscriptStore
{   pub fn new(
      store: Arc<dyn KeyValueStore>
    , key: impl Into<String>
    , max_entries: usize
    ) -> Self
    {   TranscriptStore
        {   store
          , key: key.into()
          , max_entries: max_entries.max(1)
          , write_lock: Arc::new(Mutex::new(()))
        }
    }

    /// File-backed when `storage_dir` is set, in-memory otherwise
    pub fn from_config(config: &TranscriptConfig) -> Self
    {   let store: Arc<dyn KeyValueStore> = match &config.storage_dir
        {   Some(dir) => Arc::new(FileStore::new(dir.clone()))
          , None => Arc::new(MemoryStore::new())
        };
        TranscriptStore::new(
          store,
          config.storage_key.clone(),
          config.max_entries
        )
    }

    pub fn max_entries(&self) -> usize
    {   self.max_entries
    }

    /// Persisted entries, empty when absent or unreadable
    pub fn load(&self) -> Vec<Value>
    {   match self.read()
        {   Ok(entries) => entries
          , Err(e) => {
              warn!("Chat history unavailable: {}", e);
              vec![]
            }
        }
    }

    // Storage errors propagate; absent or corrupt data reads as empty
    fn read(&self) -> Result<Vec<Value>, crate::error::Error>
    {   let text = match self.store.get(&self.key)?
        {   Some(text) => text
          , None => return Ok(vec![])
        };
        match serde_json::from_str::<Vec<Value>>(&text)
        {   Ok(entries) => Ok(entries)
          , Err(e) => {
              warn!("Discarding corrupt chat history: {}", e);
              Ok(vec![])
            }
        }
    }

    /// Entries that deserialize as `ChatEntry`, others skipped
    pub fn load_entries(&self) -> Vec<ChatEntry>
    {   self.load()
          .into_iter()
          .filter_map(|v| serde_json::from_value(v).ok())
          .collect()
    }

    /// Append one entry, evicting the oldest beyond the cap
    pub fn append<T: Serialize>(&self, entry: &T)
    {   let value = match serde_json::to_value(entry)
        {   Ok(value) => value
          , Err(e) => {
              warn!("Chat entry not serializable: {}", e);
              return;
            }
        };
        let _guard = self.lock_writes();
        let mut entries = match self.read()
        {   Ok(entries) => entries
          , Err(e) => {
              warn!("Chat history unreadable, entry not saved: {}", e);
              return;
            }
        };
        entries.push(value);
        if entries.len() > self.max_entries
        {   let excess = entries.len() - self.max_entries;
            entries.drain(..excess);
        }
        self.persist(&entries);
    }

    pub fn clear(&self)
    {   debug!("Clearing chat history {}", self.key);
        let _guard = self.lock_writes();
        if let Err(e) = self.store.remove(&self.key)
        {   warn!("Failed to clear chat history: {}", e);
        }
    }

    fn lock_writes(&self) -> std::sync::MutexGuard<'_, ()>
    {   self.write_lock
          .lock()
          .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn persist(&self, entries: &[Value])
    {   let text = match serde_json::to_string(entries)
        {   Ok(text) => text
          , Err(e) => {
              warn!("Chat history not serializable: {}", e);
              return;
            }
        };
        if let Err(e) = self.store.set(&self.key, &text)
        {   warn!("Failed to persist chat history: {}", e);
        }
    }
}

#[cfg(test)]
mod tests
{   use super::*;
    use serde_json::json;

    fn memory_transcript(cap: usize) -> (Arc<MemoryStore>, TranscriptStore)
    {   let store = Arc::new(MemoryStore::new());
        let transcript = TranscriptStore::new(
          store.clone(),
          "auction_chat_history",
          cap
        );
        (store, transcript)
    }

    #[test]
    fn keeps_most_recent_entries_in_order()
    {   let (_, transcript) = memory_transcript(50);
        for i in 0..60
        {   transcript.append(&ChatEntry::user(format!("msg {}", i)));
        }
        let entries = transcript.load_entries();
        assert_eq!(entries.len(), 50);
        assert_eq!(entries[0].content, "msg 10");
        assert_eq!(entries[49].content, "msg 59");
    }

    #[test]
    fn corrupt_value_loads_as_empty()
    {   let (store, transcript) = memory_transcript(50);
        store.set("auction_chat_history", "{not json").unwrap();
        assert!(transcript.load().is_empty());

        transcript.append(&ChatEntry::assistant("fresh start"));
        assert_eq!(transcript.load().len(), 1);
    }

    #[test]
    fn opaque_entries_are_kept_verbatim()
    {   let (_, transcript) = memory_transcript(3);
        transcript.append(&json!({"role": "system", "ts": 1}));
        transcript.append(&ChatEntry::user("hi"));
        assert_eq!(transcript.load()[0], json!({"role": "system", "ts": 1}));
        assert_eq!(transcript.load_entries(), vec![ChatEntry::user("hi")]);
    }

    #[test]
    fn clear_removes_history()
    {   let (store, transcript) = memory_transcript(5);
        transcript.append(&ChatEntry::user("hi"));
        transcript.clear();
        assert!(transcript.load().is_empty());
        assert_eq!(store.get("auction_chat_history").unwrap(), None);
    }

    /// Wraps a memory store; reads and writes fail while switched off
    #[derive(Default)]
    struct UnreliableStore
    {   inner: MemoryStore
      , failing: std::sync::atomic::AtomicBool
    }

    impl UnreliableStore
    {   fn set_failing(&self, failing: bool)
        {   self.failing.store(failing, std::sync::atomic::Ordering::SeqCst);
        }

        fn check(&self) -> Result<(), crate::error::Error>
        {   if self.failing.load(std::sync::atomic::Ordering::SeqCst)
            {   Err(crate::error::Error::Persistence("disk unavailable".to_string()))
            } else
            {   Ok(())
            }
        }
    }

    impl KeyValueStore for UnreliableStore
    {   fn get(&self, key: &str) -> Result<Option<String>, crate::error::Error>
        {   self.check()?;
            self.inner.get(key)
        }

        fn set(&self, key: &str, value: &str) -> Result<(), crate::error::Error>
        {   self.check()?;
            self.inner.set(key, value)
        }

        fn remove(&self, key: &str) -> Result<(), crate::error::Error>
        {   self.check()?;
            self.inner.remove(key)
        }
    }

    #[test]
    fn storage_failure_degrades_without_losing_history()
    {   let store = Arc::new(UnreliableStore::default());
        let transcript = TranscriptStore::new(store.clone(), "auction_chat_history", 50);
        for i in 0..10
        {   transcript.append(&ChatEntry::user(format!("msg {}", i)));
        }

        store.set_failing(true);
        assert!(transcript.load().is_empty());
        transcript.append(&ChatEntry::user("during outage"));
        transcript.clear();

        store.set_failing(false);
        let entries = transcript.load_entries();
        assert_eq!(entries.len(), 10);
        assert_eq!(entries[9].content, "msg 9");

        transcript.append(&ChatEntry::assistant("back online"));
        assert_eq!(transcript.load().len(), 11);
    }

    #[test]
    fn concurrent_appends_keep_every_entry()
    {   let (_, transcript) = memory_transcript(10_000);
        let workers: Vec<_> = (0..8)
          .map(|worker| {
            let transcript = transcript.clone();
            std::thread::spawn(move || {
              for i in 0..100
              {   transcript.append(&ChatEntry::user(format!("{}-{}", worker, i)));
              }
            })
          })
          .collect();
        for handle in workers
        {   handle.join().unwrap();
        }

        let entries = transcript.load_entries();
        assert_eq!(entries.len(), 800);
        for worker in 0..8
        {   let mine: Vec<&ChatEntry> = entries
              .iter()
              .filter(|e| e.content.starts_with(&format!("{}-", worker)))
              .collect();
            assert_eq!(mine.len(), 100);
            assert_eq!(mine[99].content, format!("{}-99", worker));
        }
    }
}
