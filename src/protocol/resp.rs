use thiserror::Error;

/// RESP (REdis Serialization Protocol) data types
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
  /// Simple strings, used for status replies like "OK"
  SimpleString(String),
  /// Error replies
  Error(String),
  /// Integers
  Integer(i64),
  /// Bulk strings, used for binary-safe strings (can be null)
  BulkString(Option<Vec<u8>>),
  /// Arrays of other values (can be null)
  Array(Option<Vec<Value>>),
}

/// Malformed RESP input. Incomplete input is not an error, see [`Parser::parse`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProtocolError {
  #[error("unknown type byte 0x{0:02x}")]
  UnknownType(u8),
  #[error("invalid length '{0}'")]
  InvalidLength(String),
  #[error("invalid integer '{0}'")]
  InvalidInteger(String),
  #[error("bulk string is not terminated by CRLF")]
  MissingTerminator,
}

impl Value {
  /// Create a simple OK reply
  pub fn ok() -> Self {
    Value::SimpleString("OK".to_string())
  }

  /// Create an error reply
  pub fn error(msg: impl Into<String>) -> Self {
    Value::Error(msg.into())
  }

  /// Create a non-null bulk string
  pub fn bulk(data: impl Into<Vec<u8>>) -> Self {
    Value::BulkString(Some(data.into()))
  }

  /// Build a command request: an array of bulk strings
  pub fn command<I, A>(args: I) -> Self
  where
    I: IntoIterator<Item = A>,
    A: AsRef<[u8]>,
  {
    Value::Array(Some(
      args.into_iter().map(|a| Value::bulk(a.as_ref())).collect(),
    ))
  }

  /// Short type name, used in diagnostics
  pub fn kind(&self) -> &'static str {
    match self {
      Value::SimpleString(_) => "simple string",
      Value::Error(_) => "error",
      Value::Integer(_) => "integer",
      Value::BulkString(None) => "null bulk string",
      Value::BulkString(Some(_)) => "bulk string",
      Value::Array(None) => "null array",
      Value::Array(Some(_)) => "array",
    }
  }

  /// Encode Value to RESP bytes
  pub fn encode(&self) -> Vec<u8> {
    let mut buf = Vec::new();
    self.encode_to(&mut buf);
    buf
  }

  fn encode_to(&self, buf: &mut Vec<u8>) {
    match self {
      Value::SimpleString(s) => {
        buf.push(b'+');
        buf.extend_from_slice(s.as_bytes());
        buf.extend_from_slice(b"\r\n");
      }
      Value::Error(e) => {
        buf.push(b'-');
        buf.extend_from_slice(e.as_bytes());
        buf.extend_from_slice(b"\r\n");
      }
      Value::Integer(i) => {
        buf.push(b':');
        buf.extend_from_slice(i.to_string().as_bytes());
        buf.extend_from_slice(b"\r\n");
      }
      Value::BulkString(None) => {
        buf.extend_from_slice(b"$-1\r\n");
      }
      Value::BulkString(Some(data)) => {
        buf.push(b'$');
        buf.extend_from_slice(data.len().to_string().as_bytes());
        buf.extend_from_slice(b"\r\n");
        buf.extend_from_slice(data);
        buf.extend_from_slice(b"\r\n");
      }
      Value::Array(None) => {
        buf.extend_from_slice(b"*-1\r\n");
      }
      Value::Array(Some(items)) => {
        buf.push(b'*');
        buf.extend_from_slice(items.len().to_string().as_bytes());
        buf.extend_from_slice(b"\r\n");
        for item in items {
          item.encode_to(buf);
        }
      }
    }
  }
}

/// Internal parse outcome: either more bytes are needed or the input is bad.
enum Halt {
  Incomplete,
  Invalid(ProtocolError),
}

impl From<ProtocolError> for Halt {
  fn from(e: ProtocolError) -> Self {
    Halt::Invalid(e)
  }
}

type Step<T> = Result<T, Halt>;

/// Parser for RESP protocol
pub struct Parser;

impl Parser {
  /// Parse one RESP value from the front of `buffer`.
  ///
  /// Returns `Ok(Some((value, consumed)))` for a complete frame, `Ok(None)`
  /// when more bytes are needed, and an error when the bytes can never form
  /// a valid frame.
  pub fn parse(buffer: &[u8]) -> Result<Option<(Value, usize)>, ProtocolError> {
    if buffer.is_empty() {
      return Ok(None);
    }

    let mut pos = 0;
    match Self::parse_value(buffer, &mut pos) {
      Ok(value) => Ok(Some((value, pos))),
      Err(Halt::Incomplete) => Ok(None),
      Err(Halt::Invalid(e)) => Err(e),
    }
  }

  fn parse_value(buffer: &[u8], pos: &mut usize) -> Step<Value> {
    let type_byte = *buffer.get(*pos).ok_or(Halt::Incomplete)?;
    *pos += 1;

    match type_byte {
      b'+' => {
        let line = Self::read_line(buffer, pos)?;
        Ok(Value::SimpleString(String::from_utf8_lossy(line).to_string()))
      }
      b'-' => {
        let line = Self::read_line(buffer, pos)?;
        Ok(Value::Error(String::from_utf8_lossy(line).to_string()))
      }
      b':' => {
        let line = Self::read_line(buffer, pos)?;
        let text = String::from_utf8_lossy(line);
        let num = text
          .parse::<i64>()
          .map_err(|_| ProtocolError::InvalidInteger(text.to_string()))?;
        Ok(Value::Integer(num))
      }
      b'$' => Self::parse_bulk_string(buffer, pos),
      b'*' => Self::parse_array(buffer, pos),
      other => Err(ProtocolError::UnknownType(other).into()),
    }
  }

  /// Reads a length header; `None` means the RESP null marker (-1).
  fn read_length(buffer: &[u8], pos: &mut usize) -> Step<Option<usize>> {
    let line = Self::read_line(buffer, pos)?;
    let text = String::from_utf8_lossy(line);
    match text.parse::<i64>() {
      Ok(-1) => Ok(None),
      Ok(n) if n >= 0 => Ok(Some(n as usize)),
      _ => Err(ProtocolError::InvalidLength(text.to_string()).into()),
    }
  }

  fn parse_bulk_string(buffer: &[u8], pos: &mut usize) -> Step<Value> {
    let len = match Self::read_length(buffer, pos)? {
      Some(len) => len,
      None => return Ok(Value::BulkString(None)),
    };

    // data + \r\n
    if *pos + len + 2 > buffer.len() {
      return Err(Halt::Incomplete);
    }
    if &buffer[*pos + len..*pos + len + 2] != b"\r\n" {
      return Err(ProtocolError::MissingTerminator.into());
    }

    let data = buffer[*pos..*pos + len].to_vec();
    *pos += len + 2;

    Ok(Value::BulkString(Some(data)))
  }

  fn parse_array(buffer: &[u8], pos: &mut usize) -> Step<Value> {
    let count = match Self::read_length(buffer, pos)? {
      Some(count) => count,
      None => return Ok(Value::Array(None)),
    };

    // Do not trust the header for the allocation size
    let mut items = Vec::with_capacity(count.min(1024));
    for _ in 0..count {
      items.push(Self::parse_value(buffer, pos)?);
    }

    Ok(Value::Array(Some(items)))
  }

  fn read_line<'a>(buffer: &'a [u8], pos: &mut usize) -> Step<&'a [u8]> {
    let start = *pos;
    let end = buffer[start..]
      .windows(2)
      .position(|w| w == b"\r\n")
      .ok_or(Halt::Incomplete)?;

    *pos = start + end + 2;
    Ok(&buffer[start..start + end])
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_parse_simple_string() {
    let data = b"+OK\r\n";
    let (value, consumed) = Parser::parse(data).unwrap().unwrap();
    assert_eq!(value, Value::ok());
    assert_eq!(consumed, 5);
  }

  #[test]
  fn test_parse_error_reply() {
    let data = b"-WRONGTYPE Operation against a key holding the wrong kind of value\r\n";
    let (value, _) = Parser::parse(data).unwrap().unwrap();
    assert_eq!(
      value,
      Value::error("WRONGTYPE Operation against a key holding the wrong kind of value")
    );
  }

  #[test]
  fn test_parse_null_bulk_string() {
    let (value, consumed) = Parser::parse(b"$-1\r\n").unwrap().unwrap();
    assert_eq!(value, Value::BulkString(None));
    assert_eq!(consumed, 5);
  }

  #[test]
  fn test_parse_array_of_bulk_strings() {
    let data = b"*2\r\n$5\r\nitem0\r\n$5\r\nitem1\r\n";
    let (value, consumed) = Parser::parse(data).unwrap().unwrap();
    assert_eq!(
      value,
      Value::Array(Some(vec![Value::bulk("item0"), Value::bulk("item1")]))
    );
    assert_eq!(consumed, data.len());
  }

  #[test]
  fn test_parse_empty_array() {
    let (value, _) = Parser::parse(b"*0\r\n").unwrap().unwrap();
    assert_eq!(value, Value::Array(Some(vec![])));
  }

  #[test]
  fn test_parse_incomplete_input() {
    assert_eq!(Parser::parse(b"").unwrap(), None);
    assert_eq!(Parser::parse(b"+OK").unwrap(), None);
    assert_eq!(Parser::parse(b"$5\r\nhel").unwrap(), None);
    assert_eq!(Parser::parse(b"*2\r\n$5\r\nitem0\r\n").unwrap(), None);
  }

  #[test]
  fn test_parse_leaves_trailing_bytes() {
    let data = b":3\r\n+OK\r\n";
    let (value, consumed) = Parser::parse(data).unwrap().unwrap();
    assert_eq!(value, Value::Integer(3));
    assert_eq!(consumed, 4);
  }

  #[test]
  fn test_parse_malformed_input() {
    assert_eq!(Parser::parse(b"?x\r\n"), Err(ProtocolError::UnknownType(b'?')));
    assert_eq!(
      Parser::parse(b":abc\r\n"),
      Err(ProtocolError::InvalidInteger("abc".to_string()))
    );
    assert_eq!(
      Parser::parse(b"$-2\r\n"),
      Err(ProtocolError::InvalidLength("-2".to_string()))
    );
    assert_eq!(
      Parser::parse(b"$2\r\nabcd\r\n"),
      Err(ProtocolError::MissingTerminator)
    );
  }

  #[test]
  fn test_encode_command() {
    let value = Value::command(["SET", "key", "value"]);
    assert_eq!(
      value.encode(),
      b"*3\r\n$3\r\nSET\r\n$3\r\nkey\r\n$5\r\nvalue\r\n"
    );
  }

  #[test]
  fn test_encode_null_and_integer() {
    assert_eq!(Value::BulkString(None).encode(), b"$-1\r\n");
    assert_eq!(Value::Integer(-7).encode(), b":-7\r\n");
  }
}
