mod common;

use std::time::Duration;

use common::{FakeStore, start_gateway, test_config, unused_addr};
use kvgate::verify::scenario::plan;
use kvgate::verify::{VerifyError, VerifyOptions, Verifier};

fn options(base_url: &str) -> VerifyOptions {
  VerifyOptions {
    base_url: base_url.to_string(),
    attempts: 5,
    interval: Duration::from_millis(50),
    probe_timeout: Duration::from_millis(500),
    request_timeout: Duration::from_secs(5),
  }
}

#[tokio::test]
async fn test_full_run_passes_against_live_service() {
  let store = FakeStore::spawn().await;
  let gw = start_gateway(test_config(&store.url())).await;

  let verifier = Verifier::new(options(&gw.base_url)).unwrap();
  let tally = verifier.run(1700000000000).await.unwrap();

  assert_eq!(tally.tests as usize, plan(0).len());
  assert_eq!(tally.failures, Vec::<String>::new());
  assert_eq!(tally.exit_code(), 0);
}

#[tokio::test]
async fn test_repeated_runs_with_distinct_ids_pass() {
  let store = FakeStore::spawn().await;
  let gw = start_gateway(test_config(&store.url())).await;
  let verifier = Verifier::new(options(&gw.base_url)).unwrap();

  for run_id in [1, 2] {
    let tally = verifier.run(run_id).await.unwrap();
    assert!(tally.all_passed(), "run {} failed: {:?}", run_id, tally.failures);
  }
}

#[tokio::test]
async fn test_no_scenarios_run_when_store_never_connects() {
  let addr = unused_addr().await;
  let mut config = test_config(&format!("redis://{}", addr));
  config.store.initial_connect_timeout_ms = 100;
  let gw = start_gateway(config).await;

  let mut opts = options(&gw.base_url);
  opts.attempts = 2;
  let verifier = Verifier::new(opts).unwrap();

  let err = verifier.run(1).await.unwrap_err();
  assert!(matches!(err, VerifyError::NotReady { attempts: 2, .. }));
}

#[tokio::test]
async fn test_failures_are_tallied_not_fatal() {
  let addr = unused_addr().await;
  let mut config = test_config(&format!("redis://{}", addr));
  config.store.initial_connect_timeout_ms = 100;
  let gw = start_gateway(config).await;

  // skip the readiness wait: every data scenario now sees 503
  let verifier = Verifier::new(options(&gw.base_url)).unwrap();
  let scenarios = plan(9);
  let tally = verifier.run_scenarios(&scenarios).await;

  assert_eq!(tally.tests as usize, scenarios.len());
  assert!(tally.failed() > 0);
  assert_eq!(tally.exit_code(), 1);
}
