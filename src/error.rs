//! Unified error types for the binding layer.
//!
//! Every precondition violation raised by a pool, registry, ring buffer or
//! peripheral funnels into one `Copy` enum.  Each variant names the kind of
//! failure and carries a static label for the resource involved, which the
//! scripting boundary turns into an exception message.

use core::fmt;

// ---------------------------------------------------------------------------
// Top-level error
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    /// A fixed-capacity pool has no free slot.
    ResourceExhausted(&'static str),
    /// The addressed resource was never created or was already deleted.
    NotFound(&'static str),
    /// The slot is USED (or the interrupt line is bound) but must be free.
    AlreadyInUse(&'static str),
    /// The slot is UNUSED (or the subsystem is off) but must be active.
    InvalidState(&'static str),
    /// Out-of-range id, malformed mode value, malformed address.
    InvalidArgument(&'static str),
    /// Ring buffer overflow.
    BufferFull(&'static str),
    /// Ring buffer underflow.
    BufferEmpty(&'static str),
}

/// Discriminant of [`Error`] without its payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    ResourceExhausted,
    NotFound,
    AlreadyInUse,
    InvalidState,
    InvalidArgument,
    BufferFull,
    BufferEmpty,
}

impl Error {
    pub const fn kind(self) -> ErrorKind {
        match self {
            Self::ResourceExhausted(_) => ErrorKind::ResourceExhausted,
            Self::NotFound(_) => ErrorKind::NotFound,
            Self::AlreadyInUse(_) => ErrorKind::AlreadyInUse,
            Self::InvalidState(_) => ErrorKind::InvalidState,
            Self::InvalidArgument(_) => ErrorKind::InvalidArgument,
            Self::BufferFull(_) => ErrorKind::BufferFull,
            Self::BufferEmpty(_) => ErrorKind::BufferEmpty,
        }
    }

    /// The resource label carried by the variant.
    pub const fn subject(self) -> &'static str {
        match self {
            Self::ResourceExhausted(s)
            | Self::NotFound(s)
            | Self::AlreadyInUse(s)
            | Self::InvalidState(s)
            | Self::InvalidArgument(s)
            | Self::BufferFull(s)
            | Self::BufferEmpty(s) => s,
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ResourceExhausted(what) => write!(f, "{what}: no free slot"),
            Self::NotFound(what) => write!(f, "{what}: not found"),
            Self::AlreadyInUse(what) => write!(f, "{what}: already in use"),
            Self::InvalidState(what) => write!(f, "{what}: invalid state"),
            Self::InvalidArgument(what) => write!(f, "{what}: invalid argument"),
            Self::BufferFull(what) => write!(f, "{what}: buffer full"),
            Self::BufferEmpty(what) => write!(f, "{what}: buffer empty"),
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ResourceExhausted => write!(f, "ResourceExhausted"),
            Self::NotFound => write!(f, "NotFound"),
            Self::AlreadyInUse => write!(f, "AlreadyInUse"),
            Self::InvalidState => write!(f, "InvalidState"),
            Self::InvalidArgument => write!(f, "InvalidArgument"),
            Self::BufferFull => write!(f, "BufferFull"),
            Self::BufferEmpty => write!(f, "BufferEmpty"),
        }
    }
}

impl std::error::Error for Error {}

// ---------------------------------------------------------------------------
// Convenience Result alias
// ---------------------------------------------------------------------------

pub type Result<T> = core::result::Result<T, Error>;
