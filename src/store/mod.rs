//! Client for the external key-value store.
//!
//! A [`StoreClient`] owns one connection and a background task that keeps it
//! alive. The connection lifecycle is published as a [`ConnectionState`]
//! through a watch channel, so callers can poll [`StoreClient::status`] or
//! wait for readiness without blocking each other.

pub mod address;
pub mod connection;
pub mod state;

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use tokio::sync::{Mutex, Notify, watch};
use tracing::{debug, error, info, warn};

use crate::error::StoreError;
use crate::protocol::command::reply;
use crate::protocol::{Command, Value};

pub use address::StoreAddr;
pub use connection::Connection;
pub use state::ConnectionState;

/// Timeouts and retry policy of the store client
#[derive(Debug, Clone, PartialEq)]
pub struct ClientOptions {
  /// Bound on a single connection attempt, handshake included
  pub connect_timeout: Duration,
  /// Bound on a single command round trip
  pub command_timeout: Duration,
  /// Retry delay grows by this much per failed attempt
  pub retry_base: Duration,
  /// Ceiling of the retry delay
  pub retry_max: Duration,
  /// Give up after this many consecutive failed attempts; `None` retries forever
  pub max_attempts: Option<u32>,
  /// PING period while the connection is idle and ready
  pub health_check: Duration,
}

impl Default for ClientOptions {
  fn default() -> Self {
    Self {
      connect_timeout: Duration::from_secs(2),
      command_timeout: Duration::from_secs(5),
      retry_base: Duration::from_millis(50),
      retry_max: Duration::from_secs(2),
      max_attempts: None,
      health_check: Duration::from_secs(5),
    }
  }
}

impl ClientOptions {
  /// Delay before retrying after `attempt` consecutive failures (1-based)
  pub fn retry_delay(&self, attempt: u32) -> Duration {
    self.retry_base.saturating_mul(attempt).min(self.retry_max)
  }
}

pub struct StoreClient {
  addr: StoreAddr,
  options: ClientOptions,
  state: watch::Sender<ConnectionState>,
  conn: Mutex<Option<Connection>>,
  /// Signalled when a live connection is found broken
  lost: Notify,
  /// Set while the background task runs
  running: AtomicBool,
  /// Set when the background task ran out of attempts
  exhausted: AtomicBool,
}

impl StoreClient {
  pub fn new(addr: StoreAddr, options: ClientOptions) -> Self {
    let (state, _) = watch::channel(ConnectionState::Disconnected);
    Self {
      addr,
      options,
      state,
      conn: Mutex::new(None),
      lost: Notify::new(),
      running: AtomicBool::new(false),
      exhausted: AtomicBool::new(false),
    }
  }

  pub fn address(&self) -> &StoreAddr {
    &self.addr
  }

  /// Current connection state; never blocks
  pub fn status(&self) -> ConnectionState {
    *self.state.borrow()
  }

  /// The readiness gate consulted before every data command
  pub fn is_ready(&self) -> bool {
    self.status().is_ready()
  }

  /// Subscribe to state changes
  pub fn subscribe(&self) -> watch::Receiver<ConnectionState> {
    self.state.subscribe()
  }

  /// Start the background connection task.
  ///
  /// A no-op while a task is already running; after the task gave up it
  /// starts a fresh one.
  pub fn connect(self: &Arc<Self>) {
    if self.running.swap(true, Ordering::SeqCst) {
      debug!("Store connection task already running");
      return;
    }
    self.exhausted.store(false, Ordering::SeqCst);

    let client = Arc::clone(self);
    tokio::spawn(async move {
      client.maintain().await;
    });
  }

  /// Wait for the first transition to ready.
  ///
  /// Returns `true` once ready, `false` if `timeout` elapses or the
  /// background task exhausts its attempts first.
  pub async fn wait_ready(&self, timeout: Duration) -> bool {
    let mut rx = self.state.subscribe();
    let settled = rx.wait_for(|state| state.is_ready() || self.exhausted.load(Ordering::SeqCst));
    match tokio::time::timeout(timeout, settled).await {
      Ok(Ok(state)) => state.is_ready(),
      _ => false,
    }
  }

  fn transition(&self, next: ConnectionState) {
    self.state.send_if_modified(|current| {
      if current.can_transition_to(next) {
        debug!("Store connection {} -> {}", current, next);
        *current = next;
        true
      } else {
        warn!("Ignoring store connection transition {} -> {}", current, next);
        false
      }
    });
  }

  /// Connect, wait until the connection breaks, reconnect
  async fn maintain(self: Arc<Self>) {
    let mut failures: u32 = 0;

    loop {
      self.transition(ConnectionState::Connecting);
      info!("Connecting to store at {}", self.addr);

      let attempt = tokio::time::timeout(self.options.connect_timeout, Connection::open(&self.addr));
      let result = match attempt.await {
        Ok(result) => result,
        Err(_) => Err(StoreError::Timeout(self.options.connect_timeout)),
      };

      match result {
        Ok(conn) => {
          *self.conn.lock().await = Some(conn);
          failures = 0;
          self.transition(ConnectionState::Ready);
          info!("Store connection ready at {}", self.addr);

          self.watch_health().await;
          warn!("Store connection lost, reconnecting");
        }
        Err(e) => {
          failures += 1;
          self.transition(ConnectionState::Erroring);

          if let Some(max) = self.options.max_attempts {
            if failures >= max {
              error!(
                "Giving up on store at {} after {} attempts: {}",
                self.addr, failures, e
              );
              self.exhausted.store(true, Ordering::SeqCst);
              self.running.store(false, Ordering::SeqCst);
              // wake waiters even though the state did not change
              self.state.send_modify(|_| {});
              return;
            }
          }

          let delay = self.options.retry_delay(failures);
          warn!(
            "Store connection attempt {} to {} failed: {}; retrying in {:?}",
            failures, self.addr, e, delay
          );
          tokio::time::sleep(delay).await;
        }
      }
    }
  }

  /// Returns once the live connection is known to be broken
  async fn watch_health(&self) {
    loop {
      tokio::select! {
        _ = self.lost.notified() => return,
        _ = tokio::time::sleep(self.options.health_check) => {
          if let Err(e) = self.execute(Command::Ping).await {
            // connection faults also signal `lost`, picked up next turn
            debug!("Store health check failed: {}", e);
          }
        }
      }
    }
  }

  /// Issue one command on the shared connection.
  async fn execute(&self, cmd: Command) -> Result<Value, StoreError> {
    let mut guard = self.conn.lock().await;
    let conn = guard.as_mut().ok_or(StoreError::NotReady)?;

    let result = match tokio::time::timeout(self.options.command_timeout, conn.request(&cmd)).await
    {
      Ok(result) => result,
      Err(_) => Err(StoreError::Timeout(self.options.command_timeout)),
    };

    match result {
      Ok(value) => connection::check_error(value),
      Err(e) => {
        if e.is_connection_fault() {
          // the stream may hold a half-read reply; never reuse it
          guard.take();
          drop(guard);
          error!("{} failed, dropping store connection: {}", cmd.name(), e);
          self.transition(ConnectionState::Erroring);
          self.lost.notify_one();
        }
        Err(e)
      }
    }
  }

  pub async fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
    let reply = self
      .execute(Command::Set {
        key: key.to_string(),
        value: value.to_string(),
      })
      .await?;
    Ok(reply::status("SET", reply)?)
  }

  pub async fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
    let reply = self.execute(Command::Get(key.to_string())).await?;
    Ok(reply::optional_string("GET", reply)?)
  }

  /// Prepend `value`; returns the new list length
  pub async fn lpush(&self, key: &str, value: &str) -> Result<i64, StoreError> {
    let reply = self
      .execute(Command::LPush {
        key: key.to_string(),
        value: value.to_string(),
      })
      .await?;
    Ok(reply::integer("LPUSH", reply)?)
  }

  /// Inclusive range; negative indices count from the tail
  pub async fn lrange(&self, key: &str, start: i64, stop: i64) -> Result<Vec<String>, StoreError> {
    let reply = self
      .execute(Command::LRange {
        key: key.to_string(),
        start,
        stop,
      })
      .await?;
    Ok(reply::strings("LRANGE", reply)?)
  }

  /// Returns the number of keys removed
  pub async fn del(&self, key: &str) -> Result<i64, StoreError> {
    let reply = self.execute(Command::Del(key.to_string())).await?;
    Ok(reply::integer("DEL", reply)?)
  }
}
