//! Fuzz target: `parse_ipv4`
//!
//! Arbitrary text must either be rejected or pack to a value that formats
//! back to exactly the same dotted quad.
//!
//! cargo fuzz run fuzz_ip_parse

#![no_main]

use std::net::Ipv4Addr;

use duoport::sockets::parse_ipv4;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let Ok(text) = core::str::from_utf8(data) else {
        return;
    };
    if let Ok(packed) = parse_ipv4(text) {
        assert_eq!(Ipv4Addr::from(packed).to_string(), text);
    }
});
