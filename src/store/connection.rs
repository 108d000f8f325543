use bytes::{Buf, BytesMut};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tracing::debug;

use crate::error::StoreError;
use crate::protocol::command::reply;
use crate::protocol::{Command, Parser, Value};
use crate::store::address::StoreAddr;

/// A single connection to the store. Requests are strictly sequential:
/// one command is written and its reply fully read before the next.
pub struct Connection {
  stream: TcpStream,
  buffer: BytesMut,
}

impl Connection {
  /// Open a TCP connection and perform the handshake (PING, then SELECT
  /// when the address names a non-zero database).
  pub async fn open(addr: &StoreAddr) -> Result<Self, StoreError> {
    let stream = TcpStream::connect(addr.socket_addr()).await?;
    stream.set_nodelay(true)?;

    let mut conn = Self {
      stream,
      buffer: BytesMut::with_capacity(8192),
    };

    let pong = conn.request(&Command::Ping).await?;
    reply::status("PING", check_error(pong)?)?;

    if addr.db != 0 {
      let selected = conn.request(&Command::Select(addr.db)).await?;
      reply::status("SELECT", check_error(selected)?)?;
    }

    Ok(conn)
  }

  /// Send one command and wait for its reply. Error replies are returned as
  /// `Value::Error`; only transport and framing failures are `Err`.
  pub async fn request(&mut self, cmd: &Command) -> Result<Value, StoreError> {
    debug!("Sending {} to store", cmd.name());
    self.stream.write_all(&cmd.to_resp().encode()).await?;
    self.read_reply().await
  }

  async fn read_reply(&mut self) -> Result<Value, StoreError> {
    loop {
      if let Some((value, consumed)) = Parser::parse(&self.buffer)? {
        self.buffer.advance(consumed);
        return Ok(value);
      }

      if self.stream.read_buf(&mut self.buffer).await? == 0 {
        return Err(StoreError::Closed);
      }
    }
  }
}

/// Turn an error reply into `StoreError::Command`
pub fn check_error(value: Value) -> Result<Value, StoreError> {
  match value {
    Value::Error(msg) => Err(StoreError::Command(msg)),
    other => Ok(other),
  }
}
