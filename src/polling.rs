//! Fixed-cadence refresh of independently fetched resources

use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use futures::future::{join_all, BoxFuture, FutureExt};
use serde_json::Value;
use tokio::sync::mpsc;
use tokio::time::MissedTickBehavior;
use log::{debug, trace, info, warn};

use crate::error::Error;

pub type FetchResult = Result<Value, Error>;
pub type FetchFn
  = Arc<dyn Fn() -> BoxFuture<'static, FetchResult> + Send + Sync>;
pub type RenderFn = Arc<dyn Fn(FetchResult) + Send + Sync>;

/// One polled resource: a key, how to fetch it, where its result goes
#[derive(Clone)]
pub struct Registration
{   pub key: String
  , fetch: FetchFn
  , render: RenderFn
}

impl Registration
{   pub fn new<F, Fut, R>(
      key: impl Into<String>
    , fetch: F
    , render: R
    ) -> Self
    where
      F: Fn() -> Fut + Send + Sync + 'static
    , Fut: Future<Output = FetchResult> + Send + 'static
    , R: Fn(FetchResult) + Send + Sync + 'static
    {   Registration
        {   key: key.into()
          , fetch: Arc::new(move || fetch().boxed())
          , render: Arc::new(render)
        }
    }
}

impl std::fmt::Debug for Registration
{   fn fmt(&self, f: &mut std::fmt::Formatter<'_>)
      -> std::fmt::Result
    {   f.debug_struct("Registration")
          .field("key", &self.key)
          .finish_non_exhaustive()
    }
}

/// Commands accepted by the timer task
enum PollCommand
{   Stop
}

// Delivery gate shared by the timer task, tick tasks and the owner
#[derive(Debug, Default)]
struct Gate
{   running: bool
  , generation: u64
  , ticks: u64
}

type SharedGate = Arc<Mutex<Gate>>;

fn lock_gate(gate: &Mutex<Gate>) -> MutexGuard<'_, Gate>
{   // Gate holds plain counters; a poisoned lock is still consistent
    gate.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

struct ActivePoll
{   stop_tx: mpsc::UnboundedSender<PollCommand>
  , _task: tokio::task::JoinHandle<()>
}

/// Owns the timer for one view; at most one timer per instance
///
/// Every tick fires all fetchers concurrently and routes each result
/// to its own render callback. Ticks follow a fixed cadence measured
/// from tick start, so a hung fetch never delays the next tick.
/// Render callbacks run under the delivery lock and must not call
/// back into the synchronizer.
pub struct PollingSynchronizer
{   gate: SharedGate
  , active: Option<ActivePoll>
}

impl Default for PollingSynchronizer
{   fn default() -> Self
    {   PollingSynchronizer::new()
    }
}

impl PollingSynchronizer
{   pub fn new() -> Self
    {   PollingSynchronizer
        {   gate: Arc::new(Mutex::new(Gate::default()))
          , active: None
        }
    }

    /// Start polling; returns `Ok(false)` when already running
    ///
    /// The first tick fires immediately.
    pub fn start(
      &mut self
    , registrations: Vec<Registration>
    , interval: Duration
    ) -> Result<bool, Error>
    {   if interval.is_zero()
        {   return Err(Error::InvalidConfiguration(
              "polling interval must be positive".to_string()
            ));
        }
        let generation = {
          let mut gate = lock_gate(&self.gate);
          if gate.running
          {   debug!("Polling already running, start ignored");
              return Ok(false);
          }
          gate.running = true;
          gate.generation += 1;
          gate.ticks = 0;
          gate.generation
        };

        info!(
          "Polling {} resources every {}ms",
          registrations.len(), interval.as_millis()
        );
        let (stop_tx, stop_rx) = mpsc::unbounded_channel();
        let gate = self.gate.clone();
        let registrations = Arc::new(registrations);
        let _task = tokio::spawn(async move {
          run_poll_loop(stop_rx, registrations, interval, gate, generation)
            .await
        });
        self.active = Some(ActivePoll { stop_tx, _task });
        Ok(true)
    }

    /// Stop polling; results still in flight are dropped
    pub fn stop(&mut self)
    {   {   let mut gate = lock_gate(&self.gate);
            if gate.running
            {   debug!("Stopping polling after {} ticks", gate.ticks);
            }
            gate.running = false;
            gate.generation += 1;
        }
        if let Some(active) = self.active.take()
        {   let _ = active.stop_tx.send(PollCommand::Stop);
        }
    }

    pub fn is_running(&self) -> bool
    {   lock_gate(&self.gate).running
    }

    /// Ticks started since the last `start`
    pub fn ticks(&self) -> u64
    {   lock_gate(&self.gate).ticks
    }
}

impl Drop for PollingSynchronizer
{   fn drop(&mut self)
    {   self.stop();
    }
}

/// Timer loop: one tick per interval until told to stop
async fn run_poll_loop(
  mut stop_rx: mpsc::UnboundedReceiver<PollCommand>
, registrations: Arc<Vec<Registration>>
, interval: Duration
, gate: SharedGate
, generation: u64
)
{   let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop
    { tokio::select!
      { biased;
        cmd = stop_rx.recv() => {
          match cmd
          {   Some(PollCommand::Stop) | None => {
                debug!("Poll loop {} exiting", generation);
                break;
              }
          }
        }
      , _ = ticker.tick() => {
          let tick = {
            let mut gate = lock_gate(&gate);
            if !gate.running || gate.generation != generation
            {   break;
            }
            gate.ticks += 1;
            gate.ticks
          };
          trace!("Poll tick {} (generation {})", tick, generation);
          tokio::spawn(run_tick(
            registrations.clone(),
            gate.clone(),
            generation
          ));
        }
      }
    }
}

/// Fire every fetcher at once and deliver each result on its own
async fn run_tick(
  registrations: Arc<Vec<Registration>>
, gate: SharedGate
, generation: u64
)
{   let fetches = registrations.iter().map(|registration| {
      let gate = gate.clone();
      async move {
        let result = (registration.fetch)().await;
        deliver(&gate, generation, registration, result);
      }
    });
    join_all(fetches).await;
}

fn deliver(
  gate: &Mutex<Gate>
, generation: u64
, registration: &Registration
, result: FetchResult
)
{   let gate = lock_gate(gate);
    if !gate.running || gate.generation != generation
    {   debug!("Discarding late result for {}", registration.key);
        return;
    }
    if let Err(e) = &result
    {   warn!("Refresh of {} failed: {}", registration.key, e);
    }
    (registration.render)(result);
}
