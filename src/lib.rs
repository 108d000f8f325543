//! kvgate: an HTTP gateway to a Redis store, plus an end-to-end verifier.

pub mod config;
pub mod error;
pub mod logging;
pub mod protocol;
pub mod server;
pub mod store;
pub mod verify;

pub use config::Config;
pub use error::{ApiError, StartupError, StoreError};
pub use server::Server;
pub use store::{ConnectionState, StoreClient};
