//! In-process stand-in for the store: speaks RESP over TCP and implements
//! the handful of commands the gateway issues.

#![allow(dead_code)]

use std::collections::{HashMap, VecDeque};
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};

use kvgate::config::Config;
use kvgate::protocol::{Parser, Value};
use kvgate::{Server, StoreClient};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::task::JoinHandle;

enum Entry {
  Text(String),
  List(VecDeque<String>),
}

const WRONGTYPE: &str = "WRONGTYPE Operation against a key holding the wrong kind of value";

#[derive(Default)]
struct Data {
  entries: HashMap<String, Entry>,
}

impl Data {
  fn execute(&mut self, args: &[String]) -> Value {
    let name = args.first().map(|s| s.to_uppercase()).unwrap_or_default();
    match (name.as_str(), &args[1.min(args.len())..]) {
      ("PING", []) => Value::SimpleString("PONG".to_string()),
      ("SELECT", [_]) => Value::ok(),
      ("SET", [key, value]) => {
        self.entries.insert(key.clone(), Entry::Text(value.clone()));
        Value::ok()
      }
      ("GET", [key]) => match self.entries.get(key) {
        Some(Entry::Text(v)) => Value::bulk(v.as_str()),
        Some(Entry::List(_)) => Value::error(WRONGTYPE),
        None => Value::BulkString(None),
      },
      ("LPUSH", [key, value]) => {
        let entry = self
          .entries
          .entry(key.clone())
          .or_insert_with(|| Entry::List(VecDeque::new()));
        match entry {
          Entry::List(list) => {
            list.push_front(value.clone());
            Value::Integer(list.len() as i64)
          }
          Entry::Text(_) => Value::error(WRONGTYPE),
        }
      }
      ("LRANGE", [key, start, stop]) => {
        let (Ok(start), Ok(stop)) = (start.parse::<i64>(), stop.parse::<i64>()) else {
          return Value::error("ERR value is not an integer or out of range");
        };
        match self.entries.get(key) {
          Some(Entry::List(list)) => Value::Array(Some(
            range(list.len() as i64, start, stop)
              .map(|i| Value::bulk(list[i].as_str()))
              .collect(),
          )),
          Some(Entry::Text(_)) => Value::error(WRONGTYPE),
          None => Value::Array(Some(vec![])),
        }
      }
      ("DEL", [key]) => Value::Integer(self.entries.remove(key).is_some() as i64),
      _ => Value::error(format!("ERR unknown command '{}'", name)),
    }
  }
}

/// Indices selected by LRANGE start stop on a list of `len` elements
fn range(len: i64, start: i64, stop: i64) -> std::ops::Range<usize> {
  let start = if start < 0 { (len + start).max(0) } else { start };
  let stop = if stop < 0 { len + stop } else { stop.min(len - 1) };
  if start > stop || start >= len {
    0..0
  } else {
    start as usize..stop as usize + 1
  }
}

fn arguments(value: Value) -> Option<Vec<String>> {
  match value {
    Value::Array(Some(items)) => items
      .into_iter()
      .map(|item| match item {
        Value::BulkString(Some(data)) => Some(String::from_utf8_lossy(&data).into_owned()),
        _ => None,
      })
      .collect(),
    _ => None,
  }
}

async fn handle_connection(mut stream: TcpStream, data: Arc<Mutex<Data>>) {
  let mut buffer = vec![0u8; 8192];
  let mut pending = Vec::new();

  loop {
    let n = match stream.read(&mut buffer).await {
      Ok(0) | Err(_) => return,
      Ok(n) => n,
    };
    pending.extend_from_slice(&buffer[..n]);

    let mut processed = 0;
    while let Ok(Some((value, consumed))) = Parser::parse(&pending[processed..]) {
      processed += consumed;
      let reply = match arguments(value) {
        Some(args) => {
          let mut data = data.lock().unwrap();
          data.execute(&args)
        }
        None => Value::error("ERR protocol error"),
      };
      if stream.write_all(&reply.encode()).await.is_err() {
        return;
      }
    }
    pending.drain(..processed);
  }
}

pub struct FakeStore {
  pub addr: SocketAddr,
  task: JoinHandle<()>,
  connections: Arc<Mutex<Vec<JoinHandle<()>>>>,
}

impl FakeStore {
  pub async fn spawn() -> Self {
    Self::spawn_on("127.0.0.1:0".parse().unwrap()).await
  }

  pub async fn spawn_on(addr: SocketAddr) -> Self {
    let listener = TcpListener::bind(addr).await.unwrap();
    let addr = listener.local_addr().unwrap();
    let data = Arc::new(Mutex::new(Data::default()));
    let connections = Arc::new(Mutex::new(Vec::new()));

    let tracked = Arc::clone(&connections);
    let task = tokio::spawn(async move {
      while let Ok((stream, _)) = listener.accept().await {
        let handle = tokio::spawn(handle_connection(stream, Arc::clone(&data)));
        tracked.lock().unwrap().push(handle);
      }
    });

    Self {
      addr,
      task,
      connections,
    }
  }

  pub fn url(&self) -> String {
    format!("redis://{}", self.addr)
  }

  /// Stop listening and close every open connection. Returns once the
  /// sockets are gone, so the address refuses connections afterwards.
  pub async fn shutdown(mut self) {
    self.task.abort();
    let _ = (&mut self.task).await;

    let connections: Vec<_> = self.connections.lock().unwrap().drain(..).collect();
    for handle in connections {
      handle.abort();
      let _ = handle.await;
    }
  }
}

impl Drop for FakeStore {
  fn drop(&mut self) {
    self.task.abort();
    for handle in self.connections.lock().unwrap().iter() {
      handle.abort();
    }
  }
}

/// An address nothing listens on
pub async fn unused_addr() -> SocketAddr {
  let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
  listener.local_addr().unwrap()
}

pub fn test_config(redis_url: &str) -> Config {
  let mut config = Config {
    host: "127.0.0.1".to_string(),
    port: 0,
    redis_url: redis_url.to_string(),
    warmup_ms: 0,
    ..Config::default()
  };
  config.store.initial_connect_timeout_ms = 2_000;
  config.store.retry_base_ms = 10;
  config.store.retry_max_ms = 100;
  config
}

pub struct Gateway {
  pub base_url: String,
  pub store: Arc<StoreClient>,
}

impl Gateway {
  pub fn url(&self, path: &str) -> String {
    format!("{}{}", self.base_url, path)
  }
}

pub async fn start_gateway(config: Config) -> Gateway {
  let server = Server::start(&config).await.unwrap();
  let base_url = format!("http://{}", server.local_addr());
  let store = server.store();
  tokio::spawn(server.run_until(std::future::pending()));
  Gateway { base_url, store }
}
