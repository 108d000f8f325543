use crate::protocol::resp::Value;

/// Store commands issued by the client
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
  /// PING, used as the connection handshake
  Ping,
  /// SELECT index
  Select(u32),
  /// SET key value
  Set { key: String, value: String },
  /// GET key
  Get(String),
  /// LPUSH key value
  LPush { key: String, value: String },
  /// LRANGE key start stop
  LRange { key: String, start: i64, stop: i64 },
  /// DEL key
  Del(String),
}

impl Command {
  /// Command name as sent on the wire
  pub fn name(&self) -> &'static str {
    match self {
      Command::Ping => "PING",
      Command::Select(_) => "SELECT",
      Command::Set { .. } => "SET",
      Command::Get(_) => "GET",
      Command::LPush { .. } => "LPUSH",
      Command::LRange { .. } => "LRANGE",
      Command::Del(_) => "DEL",
    }
  }

  /// Encode as a RESP request array
  pub fn to_resp(&self) -> Value {
    let name = self.name();
    match self {
      Command::Ping => Value::command([name]),
      Command::Select(index) => Value::command([name.to_string(), index.to_string()]),
      Command::Set { key, value } | Command::LPush { key, value } => {
        Value::command([name, key.as_str(), value.as_str()])
      }
      Command::Get(key) | Command::Del(key) => Value::command([name, key.as_str()]),
      Command::LRange { key, start, stop } => Value::command([
        name.to_string(),
        key.clone(),
        start.to_string(),
        stop.to_string(),
      ]),
    }
  }
}

/// Reply did not have the shape the command promises
#[derive(Debug, Clone, PartialEq)]
pub struct UnexpectedReply {
  pub command: &'static str,
  pub reply: Value,
}

impl std::fmt::Display for UnexpectedReply {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    write!(f, "unexpected {} reply to {}", self.reply.kind(), self.command)
  }
}

fn text(data: Vec<u8>) -> String {
  String::from_utf8_lossy(&data).into_owned()
}

/// Decoders for the non-error replies of each command. Error replies are
/// handled by the caller before these run.
pub mod reply {
  use super::{UnexpectedReply, text};
  use crate::protocol::resp::Value;

  fn unexpected<T>(command: &'static str, reply: Value) -> Result<T, UnexpectedReply> {
    Err(UnexpectedReply { command, reply })
  }

  /// `+OK` / `+PONG`
  pub fn status(command: &'static str, reply: Value) -> Result<(), UnexpectedReply> {
    match reply {
      Value::SimpleString(_) => Ok(()),
      other => unexpected(command, other),
    }
  }

  /// Bulk string or null
  pub fn optional_string(
    command: &'static str,
    reply: Value,
  ) -> Result<Option<String>, UnexpectedReply> {
    match reply {
      Value::BulkString(data) => Ok(data.map(text)),
      other => unexpected(command, other),
    }
  }

  pub fn integer(command: &'static str, reply: Value) -> Result<i64, UnexpectedReply> {
    match reply {
      Value::Integer(n) => Ok(n),
      other => unexpected(command, other),
    }
  }

  /// Array of bulk strings; a null array reads as empty
  pub fn strings(command: &'static str, reply: Value) -> Result<Vec<String>, UnexpectedReply> {
    match reply {
      Value::Array(None) => Ok(Vec::new()),
      Value::Array(Some(items)) => {
        let mut out = Vec::with_capacity(items.len());
        for item in items {
          match item {
            Value::BulkString(Some(data)) => out.push(text(data)),
            Value::SimpleString(s) => out.push(s),
            other => return unexpected(command, other),
          }
        }
        Ok(out)
      }
      other => unexpected(command, other),
    }
  }
}
