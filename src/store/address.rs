use std::fmt;
use std::str::FromStr;

use crate::error::StoreError;

const DEFAULT_PORT: u16 = 6379;
const SCHEME: &str = "redis://";

/// Parsed `redis://host[:port][/db]` address
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreAddr {
  pub host: String,
  pub port: u16,
  pub db: u32,
}

impl StoreAddr {
  /// `host:port` suitable for `TcpStream::connect`
  pub fn socket_addr(&self) -> String {
    if self.host.contains(':') {
      format!("[{}]:{}", self.host, self.port)
    } else {
      format!("{}:{}", self.host, self.port)
    }
  }
}

impl fmt::Display for StoreAddr {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}{}/{}", SCHEME, self.socket_addr(), self.db)
  }
}

impl FromStr for StoreAddr {
  type Err = StoreError;

  fn from_str(address: &str) -> Result<Self, Self::Err> {
    let invalid = |reason: &str| StoreError::InvalidAddress {
      address: address.to_string(),
      reason: reason.to_string(),
    };

    let rest = address
      .strip_prefix(SCHEME)
      .ok_or_else(|| invalid("expected a redis:// URL"))?;

    let (authority, path) = match rest.split_once('/') {
      Some((authority, path)) => (authority, path),
      None => (rest, ""),
    };

    if authority.contains('@') {
      return Err(invalid("credentials are not supported"));
    }

    // [v6]:port, host:port or host
    let (host, port) = if let Some(v6) = authority.strip_prefix('[') {
      let (host, tail) = v6
        .split_once(']')
        .ok_or_else(|| invalid("unterminated IPv6 host"))?;
      match tail.strip_prefix(':') {
        Some(port) => (host, Some(port)),
        None if tail.is_empty() => (host, None),
        None => return Err(invalid("unexpected characters after host")),
      }
    } else {
      match authority.rsplit_once(':') {
        Some((host, port)) => (host, Some(port)),
        None => (authority, None),
      }
    };

    if host.is_empty() {
      return Err(invalid("missing host"));
    }

    let port = match port {
      Some(p) => p.parse::<u16>().map_err(|_| invalid("invalid port"))?,
      None => DEFAULT_PORT,
    };

    let db = match path.trim_end_matches('/') {
      "" => 0,
      db => db.parse::<u32>().map_err(|_| invalid("invalid database index"))?,
    };

    Ok(StoreAddr {
      host: host.to_string(),
      port,
      db,
    })
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_parse_default_address() {
    let addr: StoreAddr = "redis://localhost:6379".parse().unwrap();
    assert_eq!(addr.host, "localhost");
    assert_eq!(addr.port, 6379);
    assert_eq!(addr.db, 0);
    assert_eq!(addr.socket_addr(), "localhost:6379");
  }

  #[test]
  fn test_parse_without_port_with_db() {
    let addr: StoreAddr = "redis://redis/3".parse().unwrap();
    assert_eq!(addr.host, "redis");
    assert_eq!(addr.port, DEFAULT_PORT);
    assert_eq!(addr.db, 3);
    assert_eq!(addr.to_string(), "redis://redis:6379/3");
  }

  #[test]
  fn test_parse_ipv6() {
    let addr: StoreAddr = "redis://[::1]:7000".parse().unwrap();
    assert_eq!(addr.host, "::1");
    assert_eq!(addr.port, 7000);
    assert_eq!(addr.socket_addr(), "[::1]:7000");
  }

  #[test]
  fn test_parse_rejects_bad_addresses() {
    for bad in [
      "localhost:6379",
      "redis://",
      "redis://host:port",
      "redis://host:6379/x",
      "redis://user:pw@host:6379",
      "redis://[::1",
    ] {
      assert!(
        matches!(bad.parse::<StoreAddr>(), Err(StoreError::InvalidAddress { .. })),
        "{bad} should be rejected"
      );
    }
  }
}
