use std::fmt;

use serde::Serialize;

/// Lifecycle of the store connection.
///
/// ```text
/// Disconnected -> Connecting -> Ready
///                    |  ^         |
///                    v  |         |
///                  Erroring <-----+
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub enum ConnectionState {
  #[default]
  #[serde(rename = "disconnected")]
  Disconnected,
  #[serde(rename = "connecting")]
  Connecting,
  #[serde(rename = "connected")]
  Ready,
  #[serde(rename = "error")]
  Erroring,
}

impl ConnectionState {
  /// Label reported by the status endpoint
  pub fn label(self) -> &'static str {
    match self {
      ConnectionState::Disconnected => "disconnected",
      ConnectionState::Connecting => "connecting",
      ConnectionState::Ready => "connected",
      ConnectionState::Erroring => "error",
    }
  }

  pub fn is_ready(self) -> bool {
    self == ConnectionState::Ready
  }

  /// Whether `self -> next` is an edge of the state machine
  pub fn can_transition_to(self, next: ConnectionState) -> bool {
    use ConnectionState::*;
    matches!(
      (self, next),
      (Disconnected, Connecting)
        | (Connecting, Ready)
        | (Connecting, Erroring)
        | (Ready, Erroring)
        | (Erroring, Connecting)
    )
  }
}

impl fmt::Display for ConnectionState {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.label())
  }
}
