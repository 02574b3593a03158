//! Transient, auto-dismissing notifications

use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::time::Instant;
use log::{error, info};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotificationLevel
{   Success
  , Error
  , Info
}

#[derive(Debug, Clone, PartialEq)]
pub struct Notification
{   pub level: NotificationLevel
  , pub message: String
  , pub expires_at: Instant
}

/// Shared queue of notifications with a fixed time-to-live
#[derive(Debug, Clone)]
pub struct Notifications
{   ttl: Duration
  , items: Arc<Mutex<Vec<Notification>>>
}

impl Notifications
{   pub fn new(ttl: Duration) -> Self
    {   Notifications
        {   ttl
          , items: Arc::new(Mutex::new(vec![]))
        }
    }

    pub fn success(&self, message: impl Into<String>)
    {   self.push(NotificationLevel::Success, message.into());
    }

    pub fn error(&self, message: impl Into<String>)
    {   self.push(NotificationLevel::Error, message.into());
    }

    pub fn info(&self, message: impl Into<String>)
    {   self.push(NotificationLevel::Info, message.into());
    }

    /// Notifications still visible, expired ones dismissed
    pub fn active(&self) -> Vec<Notification>
    {   let now = Instant::now();
        let mut items = self.items
          .lock()
          .unwrap_or_else(|poisoned| poisoned.into_inner());
        items.retain(|n| n.expires_at > now);
        items.clone()
    }

    pub fn dismiss_all(&self)
    {   self.items
          .lock()
          .unwrap_or_else(|poisoned| poisoned.into_inner())
          .clear();
    }

    fn push(&self, level: NotificationLevel, message: String)
    {   match level
        {   NotificationLevel::Error => error!("{}", message)
          , _ => info!("{}", message)
        }
        let now = Instant::now();
        let notification = Notification
        {   level
          , message
          , expires_at: now + self.ttl
        };
        let mut items = self.items
          .lock()
          .unwrap_or_else(|poisoned| poisoned.into_inner());
        // pushes alone must not grow the queue without bound
        items.retain(|n| n.expires_at > now);
        items.push(notification);
    }
}
