//! End-to-end verifier for a running service.
//!
//! A run first waits until `GET /` reports a connected store, then executes
//! the scenarios from [`scenario::plan`] in order and returns a [`Tally`].

pub mod scenario;

use std::fmt;
use std::time::Duration;

use serde_json::Value;
use thiserror::Error;
use tracing::{info, warn};

use scenario::{Observed, Request, Scenario};

#[derive(Debug, Error)]
pub enum VerifyError {
  #[error("failed to build HTTP client: {0}")]
  Client(#[from] reqwest::Error),
  #[error("service at {base_url} not ready after {attempts} attempts")]
  NotReady { base_url: String, attempts: u32 },
}

#[derive(Debug, Clone, PartialEq)]
pub struct VerifyOptions {
  pub base_url: String,
  /// Readiness probes before giving up
  pub attempts: u32,
  /// Pause between readiness probes
  pub interval: Duration,
  /// Bound on one readiness probe
  pub probe_timeout: Duration,
  /// Bound on one scenario request
  pub request_timeout: Duration,
}

impl Default for VerifyOptions {
  fn default() -> Self {
    Self {
      base_url: "http://localhost:3000".to_string(),
      attempts: 25,
      interval: Duration::from_secs(2),
      probe_timeout: Duration::from_millis(1900),
      request_timeout: Duration::from_secs(10),
    }
  }
}

/// Scenario counts for one run
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Tally {
  pub tests: u32,
  pub passed: u32,
  /// Names of the failed scenarios, in run order
  pub failures: Vec<String>,
}

impl Tally {
  pub fn record(&mut self, name: &str, passed: bool) {
    self.tests += 1;
    if passed {
      self.passed += 1;
    } else {
      self.failures.push(name.to_string());
    }
  }

  pub fn failed(&self) -> u32 {
    self.tests - self.passed
  }

  pub fn all_passed(&self) -> bool {
    self.failed() == 0
  }

  /// 0 only if every scenario passed
  pub fn exit_code(&self) -> u8 {
    if self.all_passed() { 0 } else { 1 }
  }
}

impl fmt::Display for Tally {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(
      f,
      "Total: {}, Passed: {}, Failed: {}",
      self.tests,
      self.passed,
      self.failed()
    )
  }
}

pub struct Verifier {
  http: reqwest::Client,
  options: VerifyOptions,
}

impl Verifier {
  pub fn new(options: VerifyOptions) -> Result<Self, VerifyError> {
    let http = reqwest::Client::builder()
      .timeout(options.request_timeout)
      .build()?;
    Ok(Self { http, options })
  }

  fn url(&self, path: &str) -> String {
    format!("{}{}", self.options.base_url.trim_end_matches('/'), path)
  }

  /// Poll the status endpoint until the store reports connected.
  ///
  /// Returns the number of probes used. A hung probe only costs its own
  /// timeout, never the whole loop.
  pub async fn wait_for_ready(&self) -> Result<u32, VerifyError> {
    let status_url = self.url("/");

    for attempt in 1..=self.options.attempts {
      let probe = self
        .http
        .get(&status_url)
        .timeout(self.options.probe_timeout)
        .send()
        .await;

      match probe {
        Ok(resp) if resp.status() == reqwest::StatusCode::OK => {
          let body: Value = resp.json().await.unwrap_or(Value::Null);
          if body["redis_status"] == "connected" {
            info!("Service ready after {} attempt(s)", attempt);
            return Ok(attempt);
          }
          info!(
            "Attempt {}/{}: service up, store status {}",
            attempt, self.options.attempts, body["redis_status"]
          );
        }
        Ok(resp) => {
          info!(
            "Attempt {}/{}: status endpoint returned {}",
            attempt,
            self.options.attempts,
            resp.status()
          );
        }
        Err(e) => {
          info!(
            "Attempt {}/{}: service not reachable: {}",
            attempt, self.options.attempts, e
          );
        }
      }

      if attempt < self.options.attempts {
        tokio::time::sleep(self.options.interval).await;
      }
    }

    Err(VerifyError::NotReady {
      base_url: self.options.base_url.clone(),
      attempts: self.options.attempts,
    })
  }

  /// Send one request; never fails, transport errors become status 500
  pub async fn observe(&self, request: &Request) -> Observed {
    let mut builder = self.http.request(request.method.clone(), self.url(&request.path));
    if let Some(body) = &request.body {
      builder = builder.json(body);
    }

    let resp = match builder.send().await {
      Ok(resp) => resp,
      Err(e) => return Observed::transport_failure(e),
    };

    let status = resp.status().as_u16();
    match resp.text().await {
      Ok(text) => Observed {
        status,
        body: serde_json::from_str(&text).unwrap_or(Value::String(text)),
      },
      Err(e) => Observed::transport_failure(e),
    }
  }

  /// Execute scenarios in order, recording each outcome
  pub async fn run_scenarios(&self, scenarios: &[Scenario]) -> Tally {
    let mut tally = Tally::default();

    for scenario in scenarios {
      let observed = self.observe(&scenario.request).await;
      let passed = scenario.passes(&observed);
      if passed {
        info!("PASS {} ({} -> {})", scenario.name, scenario.request, observed.status);
      } else {
        warn!(
          "FAIL {} ({} -> {} {})",
          scenario.name, scenario.request, observed.status, observed.body
        );
      }
      tally.record(&scenario.name, passed);
    }

    tally
  }

  /// Full run: readiness wait, then every scenario of the plan
  pub async fn run(&self, run_id: u64) -> Result<Tally, VerifyError> {
    self.wait_for_ready().await?;
    Ok(self.run_scenarios(&scenario::plan(run_id)).await)
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_tally_counts() {
    let mut tally = Tally::default();
    tally.record("a", true);
    tally.record("b", false);
    tally.record("c", true);

    assert_eq!(tally.tests, 3);
    assert_eq!(tally.passed, 2);
    assert_eq!(tally.failed(), 1);
    assert_eq!(tally.failures, vec!["b".to_string()]);
    assert_eq!(tally.exit_code(), 1);
    assert_eq!(tally.to_string(), "Total: 3, Passed: 2, Failed: 1");
  }

  #[test]
  fn test_empty_tally_passes() {
    assert_eq!(Tally::default().exit_code(), 0);
  }

  #[tokio::test]
  async fn test_wait_for_ready_gives_up_on_unreachable_service() {
    let verifier = Verifier::new(VerifyOptions {
      base_url: "http://127.0.0.1:1".to_string(),
      attempts: 3,
      interval: Duration::from_millis(10),
      probe_timeout: Duration::from_millis(200),
      ..VerifyOptions::default()
    })
    .unwrap();

    let err = verifier.wait_for_ready().await.unwrap_err();
    assert!(matches!(err, VerifyError::NotReady { attempts: 3, .. }));
  }

  #[tokio::test]
  async fn test_wait_for_ready_requires_200() {
    use axum::Json;
    use axum::http::StatusCode;
    use axum::routing::get;
    use serde_json::json;

    let app = axum::Router::new().route(
      "/",
      get(|| async { (StatusCode::ACCEPTED, Json(json!({ "redis_status": "connected" }))) }),
    );
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move { axum::serve(listener, app).await });

    let verifier = Verifier::new(VerifyOptions {
      base_url: format!("http://{}", addr),
      attempts: 2,
      interval: Duration::from_millis(10),
      probe_timeout: Duration::from_millis(500),
      ..VerifyOptions::default()
    })
    .unwrap();

    let err = verifier.wait_for_ready().await.unwrap_err();
    assert!(matches!(err, VerifyError::NotReady { attempts: 2, .. }));
  }

  #[tokio::test]
  async fn test_observe_maps_transport_errors_to_500() {
    let verifier = Verifier::new(VerifyOptions {
      base_url: "http://127.0.0.1:1".to_string(),
      ..VerifyOptions::default()
    })
    .unwrap();

    let observed = verifier.observe(&Request::get("/")).await;
    assert_eq!(observed.status, 500);
    assert!(observed.is_error(500));
  }
}
