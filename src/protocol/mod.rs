//! Redis protocol implementation
//!
//! This module provides RESP (REdis Serialization Protocol) encoding and
//! decoding, plus the typed commands the store client sends.

pub mod command;
pub mod resp;

pub use command::{Command, UnexpectedReply};
pub use resp::{Parser, ProtocolError, Value};
