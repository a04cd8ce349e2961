//! Script-side value model.
//!
//! The scripting runtime hands the bindings loosely-typed values and expects
//! loosely-typed results back; failures surface as an [`Exception`] that
//! carries the error kind and a human-readable message.

use core::fmt;

use crate::error::{Error, ErrorKind, Result};
use crate::payload::Payload;

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Value {
    #[default]
    None,
    Bool(bool),
    Int(i64),
    Str(String),
    Bytes(Vec<u8>),
    /// Integer sequence, one element per byte on write paths.
    List(Vec<i64>),
}

impl Value {
    pub fn as_int(&self) -> Result<i64> {
        match self {
            Self::Int(v) => Ok(*v),
            Self::Bool(b) => Ok(i64::from(*b)),
            _ => Err(Error::InvalidArgument("expected an integer")),
        }
    }

    pub fn as_str(&self) -> Result<&str> {
        match self {
            Self::Str(s) => Ok(s),
            _ => Err(Error::InvalidArgument("expected a string")),
        }
    }

    /// Borrow as a write payload.  Strings stay text; lists are range
    /// checked when converted to bytes.
    pub fn as_payload(&self) -> Result<Payload<'_>> {
        match self {
            Self::Str(s) => Ok(Payload::Text(s)),
            Self::Bytes(b) => Ok(Payload::Bytes(b)),
            Self::List(v) => Ok(Payload::Values(v)),
            _ => Err(Error::InvalidArgument("expected str, bytes or list")),
        }
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Self::Bool(b)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Self::Int(v)
    }
}

impl From<u8> for Value {
    fn from(v: u8) -> Self {
        Self::Int(i64::from(v))
    }
}

impl From<usize> for Value {
    fn from(v: usize) -> Self {
        Self::Int(i64::try_from(v).unwrap_or(i64::MAX))
    }
}

impl From<()> for Value {
    fn from(_: ()) -> Self {
        Self::None
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Self::Str(s.to_owned())
    }
}

/// Error raised into the script.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Exception {
    pub kind: ErrorKind,
    pub message: String,
}

impl From<Error> for Exception {
    fn from(e: Error) -> Self {
        Self { kind: e.kind(), message: e.to_string() }
    }
}

impl fmt::Display for Exception {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}: {}", self.kind, self.message)
    }
}

impl std::error::Error for Exception {}

pub type CallResult = core::result::Result<Value, Exception>;
