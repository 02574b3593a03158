//! View models: per-page state owned by the view, not by globals

use std::sync::{Arc, Mutex};
use std::time::Duration;
use serde_json::Value;
use log::{debug, info};

use crate::api::{normalize_team, AuctionApi, ChatReply, Price};
use crate::error::Error;
use crate::notify::Notifications;
use crate::polling::{FetchResult, PollingSynchronizer, Registration};
use crate::transcript::{ChatEntry, TranscriptStore};

pub const STATE_RESOURCE: &str = "state";
pub const LIVE_RECOMMENDATIONS_RESOURCE: &str = "live_recommendations";

/// Latest known value of one polled resource
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResourceState
{   /// Last successful payload; kept when a later refresh fails
    pub data: Option<Value>
  , /// Message of the most recent failure, cleared on success
    pub error: Option<String>
  , pub updates: u64
  , pub failures: u64
}

impl ResourceState
{   fn apply(&mut self, result: FetchResult)
    {   match result
        {   Ok(value) => {
              self.data = Some(value);
              self.error = None;
              self.updates += 1;
            }
          , Err(e) => {
              self.error = Some(e.message());
              self.failures += 1;
            }
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct LiveSnapshot
{   pub state: ResourceState
  , pub recommendations: ResourceState
}

/// Live auction page: polls state and recommendations, records sales
pub struct LiveAuctionView
{   api: Arc<AuctionApi>
  , poller: PollingSynchronizer
  , snapshot: Arc<Mutex<LiveSnapshot>>
  , notifications: Notifications
  , selected_team: Option<String>
}

impl LiveAuctionView
{   pub fn new(
      api: Arc<AuctionApi>
    , notifications: Notifications
    ) -> Self
    {   LiveAuctionView
        {   api
          , poller: PollingSynchronizer::new()
          , snapshot: Arc::new(Mutex::new(LiveSnapshot::default()))
          , notifications
          , selected_team: None
        }
    }

    /// Begin refreshing; `Ok(false)` when already mounted
    pub fn mount(&mut self, interval: Duration) -> Result<bool, Error>
    {   debug!("Mounting live auction view");
        let registrations = vec![
          self.registration(STATE_RESOURCE, |api| async move {
            api.get_state().await
          }, |snapshot| &mut snapshot.state),
          self.registration(LIVE_RECOMMENDATIONS_RESOURCE, |api| async move {
            api.live_recommendations().await
          }, |snapshot| &mut snapshot.recommendations),
        ];
        self.poller.start(registrations, interval)
    }

    pub fn unmount(&mut self)
    {   debug!("Unmounting live auction view");
        self.poller.stop();
    }

    pub fn is_mounted(&self) -> bool
    {   self.poller.is_running()
    }

    pub fn snapshot(&self) -> LiveSnapshot
    {   self.snapshot
          .lock()
          .unwrap_or_else(|poisoned| poisoned.into_inner())
          .clone()
    }

    pub fn select_team(&mut self, team: &str) -> Result<(), Error>
    {   self.selected_team = Some(normalize_team(team)?);
        Ok(())
    }

    pub fn selected_team(&self) -> Option<&str>
    {   self.selected_team.as_deref()
    }

    pub fn notifications(&self) -> &Notifications
    {   &self.notifications
    }

    /// Record a sale and report the outcome as a notification
    pub async fn sell_player(
      &self
    , player_name: &str
    , team: &str
    , price: impl Into<Price>
    ) -> Result<Value, Error>
    {   let price = price.into();
        match self.api.sell_player(player_name, team, price.clone()).await
        {   Ok(value) => {
              self.notifications.success(format!(
                "{} sold to {} for {}",
                player_name.trim(), team.trim().to_ascii_uppercase(), price
              ));
              Ok(value)
            }
          , Err(e) => {
              self.notifications.error(e.message());
              Err(e)
            }
        }
    }

    fn registration<F, Fut, S>(
      &self
    , key: &str
    , fetch: F
    , slot: S
    ) -> Registration
    where
      F: Fn(Arc<AuctionApi>) -> Fut + Send + Sync + 'static
    , Fut: std::future::Future<Output = FetchResult> + Send + 'static
    , S: Fn(&mut LiveSnapshot) -> &mut ResourceState + Send + Sync + 'static
    {   let api = self.api.clone();
        let snapshot = self.snapshot.clone();
        Registration::new(
          key,
          move || fetch(api.clone()),
          move |result| {
            let mut snapshot = snapshot
              .lock()
              .unwrap_or_else(|poisoned| poisoned.into_inner());
            slot(&mut *snapshot).apply(result);
          }
        )
    }
}

/// Team analysis page: three independent views of one team
#[derive(Debug)]
pub struct TeamAnalysis
{   pub team: String
  , pub matrix: FetchResult
  , pub gaps: FetchResult
  , pub weak_points: FetchResult
}

impl TeamAnalysis
{   /// Fetch all three views concurrently; each may fail on its own
    pub async fn load(api: &AuctionApi, team: &str)
      -> Result<Self, Error>
    {   let team = normalize_team(team)?;
        let (matrix, gaps, weak_points) = futures::join!(
          api.team_matrix(&team),
          api.team_gaps(&team),
          api.team_weak_points(&team)
        );
        Ok(TeamAnalysis
        {   team
          , matrix
          , gaps
          , weak_points
        })
    }
}

/// Chat page: strategist conversation with persisted history
pub struct ChatSession
{   api: Arc<AuctionApi>
  , transcript: TranscriptStore
  , notifications: Notifications
  , team: Option<String>
}

impl ChatSession
{   pub fn new(
      api: Arc<AuctionApi>
    , transcript: TranscriptStore
    , notifications: Notifications
    ) -> Self
    {   ChatSession
        {   api
          , transcript
          , notifications
          , team: None
        }
    }

    pub fn set_team(&mut self, team: Option<&str>) -> Result<(), Error>
    {   self.team = match team
        {   Some(team) => Some(normalize_team(team)?)
          , None => None
        };
        Ok(())
    }

    pub fn history(&self) -> Vec<ChatEntry>
    {   self.transcript.load_entries()
    }

    pub fn clear_history(&self)
    {   info!("Clearing chat history");
        self.transcript.clear();
    }

    /// Send one message; both sides of the exchange are persisted
    pub async fn send(&self, message: &str) -> Result<ChatReply, Error>
    {   self.transcript.append(&ChatEntry::user(message));
        match self.api.chat(message, self.team.as_deref(), None).await
        {   Ok(reply) => {
              self.transcript.append(&ChatEntry::assistant(&reply.text));
              Ok(reply)
            }
          , Err(e) => {
              self.notifications.error(e.message());
              Err(e)
            }
        }
    }
}
