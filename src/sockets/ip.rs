//! Dotted-quad parsing for `connect_by_ip`.

use core::net::Ipv4Addr;

use crate::error::{Error, Result};

/// Parse `a.b.c.d` into the big-endian packed form the socket HAL expects
/// (`a << 24 | b << 16 | c << 8 | d`).  Exactly four decimal octets;
/// anything else is `InvalidArgument`.
pub fn parse_ipv4(text: &str) -> Result<u32> {
    text.parse::<Ipv4Addr>()
        .map(u32::from)
        .map_err(|_| Error::InvalidArgument("malformed IPv4 address"))
}
