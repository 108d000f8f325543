pub mod handlers;

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;

use axum::Router;
use axum::routing::{delete, get, post};
use tokio::net::TcpListener;
use tracing::{info, warn};

use crate::config::Config;
use crate::error::StartupError;
use crate::store::{StoreAddr, StoreClient};
use handlers::AppState;

/// HTTP front end over a shared store client
pub struct Server {
  listener: TcpListener,
  local_addr: SocketAddr,
  store: Arc<StoreClient>,
}

impl Server {
  /// Bring the service up.
  ///
  /// This function:
  /// 1. Waits the configured warm-up interval
  /// 2. Starts the store connection and waits for it to become ready,
  ///    up to the initial connect timeout
  /// 3. Binds the HTTP listener whether or not the store is ready
  pub async fn start(config: &Config) -> Result<Self, StartupError> {
    let addr: StoreAddr = config.redis_url.parse()?;
    let store = Arc::new(StoreClient::new(addr, config.store.client_options()));

    let warmup = config.warmup();
    if !warmup.is_zero() {
      info!("Waiting {:?} before connecting to store", warmup);
      tokio::time::sleep(warmup).await;
    }

    store.connect();
    let timeout = config.store.initial_connect_timeout();
    if store.wait_ready(timeout).await {
      info!("Connected to store at {}", store.address());
    } else {
      warn!(
        "Store at {} not ready after {:?} ({}); serving anyway, data routes return 503 until it connects",
        store.address(),
        timeout,
        store.status()
      );
    }

    Self::bind(&config.listen_addr(), store).await
  }

  /// Bind the HTTP listener for an existing store client
  pub async fn bind(addr: &str, store: Arc<StoreClient>) -> Result<Self, StartupError> {
    let listener = TcpListener::bind(addr)
      .await
      .map_err(|source| StartupError::Bind {
        addr: addr.to_string(),
        source,
      })?;
    let local_addr = listener.local_addr().map_err(|source| StartupError::Bind {
      addr: addr.to_string(),
      source,
    })?;
    info!("HTTP server bound to {}", local_addr);

    Ok(Self {
      listener,
      local_addr,
      store,
    })
  }

  /// Get local listening address
  pub fn local_addr(&self) -> SocketAddr {
    self.local_addr
  }

  pub fn store(&self) -> Arc<StoreClient> {
    Arc::clone(&self.store)
  }

  /// Routes of the service
  pub fn router(store: Arc<StoreClient>) -> Router {
    Router::new()
      .route("/", get(handlers::status))
      .route("/test/set", post(handlers::set_value))
      .route("/test/get/{key}", get(handlers::get_value))
      .route("/test/lpush", post(handlers::push_value))
      .route("/test/lrange/{key}/{start}/{stop}", get(handlers::range_values))
      .route("/test/del/{key}", delete(handlers::delete_key))
      .fallback(handlers::not_found)
      .method_not_allowed_fallback(handlers::method_not_allowed)
      .with_state(AppState { store })
  }

  /// Serve until Ctrl-C
  pub async fn run(self) -> Result<(), StartupError> {
    self.run_until(shutdown_signal()).await
  }

  /// Serve until `shutdown` resolves
  pub async fn run_until<F>(self, shutdown: F) -> Result<(), StartupError>
  where
    F: Future<Output = ()> + Send + 'static,
  {
    info!("Server started, listening on {}", self.local_addr);
    let addr = self.local_addr;
    axum::serve(self.listener, Self::router(self.store))
      .with_graceful_shutdown(shutdown)
      .await
      .map_err(|source| StartupError::Serve { addr, source })?;
    info!("Server on {} stopped", addr);
    Ok(())
  }
}

async fn shutdown_signal() {
  if let Err(e) = tokio::signal::ctrl_c().await {
    warn!("Failed to listen for Ctrl-C: {}", e);
    std::future::pending::<()>().await;
  }
  info!("Shutdown requested");
}
