pub mod error;
pub mod config;
pub mod retry;
pub mod request;
pub mod client;
pub mod api;
pub mod polling;
pub mod storage;
pub mod transcript;
pub mod notify;
pub mod view;

use std::sync::Arc;
use std::time::Duration;
use log::debug;

/*

auction-assist: client core of the auction strategist dashboard.

src/
├── error.rs       # Error enum shared by every layer
├── config.rs      # AssistConfig, JSON file + env overrides
├── retry.rs       # RetryPolicy / RetryState, capped backoff
├── request.rs     # RequestDescriptor, body + error normalization
├── client.rs      # ApiClient: timeout, retry, health check
├── api.rs         # AuctionApi: one method per backend endpoint
├── polling.rs     # PollingSynchronizer, fixed-cadence refresh
├── storage.rs     # KeyValueStore: memory and file backends
├── transcript.rs  # capped, persisted chat history
├── notify.rs      # transient notifications
└── view.rs        # view models for the live, team and chat pages

The backend owns every domain decision (demand scores, tags, price
bands, strategist answers); this crate only moves and shapes data.

*/

pub use error::{Error, ErrorKind};
pub use config::AssistConfig;
pub use client::ApiClient;
pub use api::AuctionApi;
pub use polling::{PollingSynchronizer, Registration};
pub use transcript::{ChatEntry, TranscriptStore};
pub use notify::Notifications;

/// Install `env_logger`, `info` unless `RUST_LOG` says otherwise
///
/// Safe to call more than once; later calls are ignored.
pub fn init_logging()
{   let env = env_logger::Env::default().default_filter_or("info");
    let _ = env_logger::Builder::from_env(env)
      .format_timestamp_millis()
      .try_init();
}

/// Components shared by every page, built from one configuration
#[derive(Clone)]
pub struct AuctionAssist
{   config: AssistConfig
  , api: Arc<AuctionApi>
  , notifications: Notifications
  , transcript: TranscriptStore
}

impl AuctionAssist
{   pub fn new(config: AssistConfig) -> Result<Self, Error>
    {   config.validate()?;
        debug!("Building AuctionAssist for {}", config.api.base_url);
        let client = ApiClient::from_config(&config)?;
        let notifications = Notifications::new(
          Duration::from_millis(config.notifications.ttl_ms)
        );
        let transcript = TranscriptStore::from_config(&config.transcript);
        Ok(AuctionAssist
        {   config
          , api: Arc::new(AuctionApi::new(client))
          , notifications
          , transcript
        })
    }

    pub fn config(&self) -> &AssistConfig
    {   &self.config
    }

    pub fn api(&self) -> Arc<AuctionApi>
    {   self.api.clone()
    }

    pub fn notifications(&self) -> &Notifications
    {   &self.notifications
    }

    /// A fresh live page; mount it with the configured interval
    pub fn live_view(&self) -> view::LiveAuctionView
    {   view::LiveAuctionView::new(
          self.api.clone(),
          self.notifications.clone()
        )
    }

    pub fn chat_session(&self) -> view::ChatSession
    {   view::ChatSession::new(
          self.api.clone(),
          self.transcript.clone(),
          self.notifications.clone()
        )
    }

    pub async fn team_analysis(&self, team: &str)
      -> Result<view::TeamAnalysis, Error>
    {   view::TeamAnalysis::load(&self.api, team).await
    }

    pub fn polling_interval(&self) -> Duration
    {   self.config.polling.interval()
    }
}
