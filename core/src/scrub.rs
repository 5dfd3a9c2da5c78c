//! Log scrubbing (spec.md §7): substitute a remote peer address with a
//! fixed placeholder before it reaches a log line, so peer IPs never land on
//! disk. Downstream-side errors are local and are not scrubbed.

use std::fmt;
use std::net::SocketAddr;

/// Wraps a remote address so that formatting it always prints the
/// placeholder instead of the real value. Taking the address by value (not
/// just a reference to a formatted string) keeps a caller from logging the
/// raw address by accident elsewhere in the same line.
pub struct Scrubbed(#[allow(dead_code)] SocketAddr);

impl fmt::Display for Scrubbed {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[scrubbed]")
    }
}

pub fn scrub(addr: SocketAddr) -> Scrubbed {
    Scrubbed(addr)
}
