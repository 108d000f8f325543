use std::fmt;
use std::time::{SystemTime, UNIX_EPOCH};

use reqwest::Method;
use serde_json::{Value, json};

/// One request to send
#[derive(Debug, Clone)]
pub struct Request {
  pub method: Method,
  pub path: String,
  pub body: Option<Value>,
}

impl Request {
  pub fn get(path: impl Into<String>) -> Self {
    Self {
      method: Method::GET,
      path: path.into(),
      body: None,
    }
  }

  pub fn post(path: impl Into<String>, body: Value) -> Self {
    Self {
      method: Method::POST,
      path: path.into(),
      body: Some(body),
    }
  }

  pub fn delete(path: impl Into<String>) -> Self {
    Self {
      method: Method::DELETE,
      path: path.into(),
      body: None,
    }
  }
}

impl fmt::Display for Request {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{} {}", self.method, self.path)
  }
}

/// What came back. Transport failures are recorded as status 500.
#[derive(Debug, Clone, PartialEq)]
pub struct Observed {
  pub status: u16,
  pub body: Value,
}

impl Observed {
  pub fn transport_failure(message: impl fmt::Display) -> Self {
    Self {
      status: 500,
      body: json!({ "error": message.to_string() }),
    }
  }

  pub fn is_success(&self) -> bool {
    self.status == 200 && self.body["success"] == true
  }

  /// Given status with a non-empty `error` field
  pub fn is_error(&self, status: u16) -> bool {
    self.status == status && self.body["error"].as_str().is_some_and(|e| !e.is_empty())
  }

  pub fn values(&self) -> Option<Vec<&str>> {
    self.body["values"]
      .as_array()
      .map(|items| items.iter().filter_map(Value::as_str).collect())
  }
}

type Check = Box<dyn Fn(&Observed) -> bool + Send + Sync>;

/// A request and the predicate its response must satisfy
pub struct Scenario {
  pub name: String,
  pub request: Request,
  check: Check,
}

impl Scenario {
  pub fn new<F>(name: impl Into<String>, request: Request, check: F) -> Self
  where
    F: Fn(&Observed) -> bool + Send + Sync + 'static,
  {
    Self {
      name: name.into(),
      request,
      check: Box::new(check),
    }
  }

  pub fn passes(&self, observed: &Observed) -> bool {
    (self.check)(observed)
  }
}

/// Run identifier: milliseconds since the epoch, keeps keys unique per run
pub fn run_id() -> u64 {
  SystemTime::now()
    .duration_since(UNIX_EPOCH)
    .map(|d| d.as_millis() as u64)
    .unwrap_or_default()
}

/// The fixed, ordered scenario list for one run
pub fn plan(run_id: u64) -> Vec<Scenario> {
  let key = format!("testkey_{}", run_id);
  let value = format!("testvalue_{}", run_id);
  let list = format!("testlist_{}", run_id);
  let missing = format!("missingkey_{}", run_id);

  let expected_value = value.clone();
  let repeated_value = value.clone();

  vec![
    Scenario::new("status reports a connected store", Request::get("/"), |o| {
      o.status == 200 && o.body["hello"] == "world" && o.body["redis_status"] == "connected"
    }),
    Scenario::new(
      "set stores a value",
      Request::post("/test/set", json!({ "key": key, "value": value })),
      Observed::is_success,
    ),
    Scenario::new(
      "get returns the stored value",
      Request::get(format!("/test/get/{}", key)),
      move |o| o.is_success() && o.body["value"] == expected_value.as_str(),
    ),
    Scenario::new(
      "get is repeatable",
      Request::get(format!("/test/get/{}", key)),
      move |o| o.is_success() && o.body["value"] == repeated_value.as_str(),
    ),
    Scenario::new(
      "lpush creates the list",
      Request::post("/test/lpush", json!({ "key": list, "value": "item1" })),
      Observed::is_success,
    ),
    Scenario::new(
      "lpush prepends",
      Request::post("/test/lpush", json!({ "key": list, "value": "item0" })),
      Observed::is_success,
    ),
    Scenario::new(
      "lrange returns the list head first",
      Request::get(format!("/test/lrange/{}/0/-1", list)),
      |o| o.is_success() && o.values() == Some(vec!["item0", "item1"]),
    ),
    Scenario::new(
      "lrange honours inclusive bounds",
      Request::get(format!("/test/lrange/{}/0/0", list)),
      |o| o.is_success() && o.values() == Some(vec!["item0"]),
    ),
    Scenario::new(
      "delete removes the key",
      Request::delete(format!("/test/del/{}", key)),
      |o| {
        o.is_success()
          && o.body["message"]
            .as_str()
            .is_some_and(|m| m.contains("count: 1"))
      },
    ),
    Scenario::new(
      "get after delete is not found",
      Request::get(format!("/test/get/{}", key)),
      |o| o.is_error(404),
    ),
    Scenario::new(
      "delete of a missing key is not found",
      Request::delete(format!("/test/del/{}", key)),
      |o| o.is_error(404),
    ),
    Scenario::new(
      "delete removes the list",
      Request::delete(format!("/test/del/{}", list)),
      Observed::is_success,
    ),
    Scenario::new(
      "lrange on a deleted list is empty",
      Request::get(format!("/test/lrange/{}/0/-1", list)),
      |o| o.is_success() && o.values() == Some(vec![]),
    ),
    Scenario::new(
      "get of a never written key is not found",
      Request::get(format!("/test/get/{}", missing)),
      |o| o.is_error(404),
    ),
    Scenario::new(
      "set without a value is rejected",
      Request::post("/test/set", json!({ "key": missing })),
      |o| o.is_error(400),
    ),
    Scenario::new(
      "lrange with a non-numeric index is rejected",
      Request::get(format!("/test/lrange/{}/0/last", list)),
      |o| o.is_error(400),
    ),
  ]
}
