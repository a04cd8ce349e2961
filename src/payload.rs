//! Write-path payloads.
//!
//! Scripts hand write calls either a string or a sequence of integers.  The
//! two shapes are kept distinct so a zero byte inside binary data is never
//! taken as a terminator, and integer sequences are range-checked instead of
//! silently truncated.

use std::borrow::Cow;

use crate::error::{Error, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Payload<'a> {
    /// Text, sent as its UTF-8 bytes with no terminator.
    Text(&'a str),
    /// Raw bytes with explicit length.
    Bytes(&'a [u8]),
    /// Script integers; each must fit in a byte.
    Values(&'a [i64]),
}

impl<'a> Payload<'a> {
    /// Flatten to bytes.  Borrowed for `Text`/`Bytes`, copied for `Values`.
    pub fn to_bytes(&self) -> Result<Cow<'a, [u8]>> {
        match *self {
            Self::Text(s) => Ok(Cow::Borrowed(s.as_bytes())),
            Self::Bytes(b) => Ok(Cow::Borrowed(b)),
            Self::Values(v) => v
                .iter()
                .map(|&x| u8::try_from(x).map_err(|_| Error::InvalidArgument("byte value")))
                .collect::<Result<Vec<u8>>>()
                .map(Cow::Owned),
        }
    }

    pub fn len(&self) -> usize {
        match self {
            Self::Text(s) => s.len(),
            Self::Bytes(b) => b.len(),
            Self::Values(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<'a> From<&'a str> for Payload<'a> {
    fn from(s: &'a str) -> Self {
        Self::Text(s)
    }
}

impl<'a> From<&'a [u8]> for Payload<'a> {
    fn from(b: &'a [u8]) -> Self {
        Self::Bytes(b)
    }
}

/// Copy at most `max` bytes of `src` onto the end of `out`.  Returns the
/// number appended.
pub(crate) fn append_bounded(out: &mut Vec<u8>, src: &[u8], max: usize) -> usize {
    let n = src.len().min(max);
    out.extend_from_slice(&src[..n]);
    n
}
