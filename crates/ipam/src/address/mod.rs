//! Address-space utilities
//!
//! Pure functions over address ranges: parsing, comparison, containment,
//! overlap, block size and boundary alignment. Both IPv4 (32-bit) and IPv6
//! (128-bit) ranges are handled with the same `u128` arithmetic.

mod arith;
mod range;

pub use arith::{
    align_to_prefix, block_size, host_span, is_aligned, max_address, range_end, IPV4_WIDTH,
    IPV6_WIDTH,
};
pub use range::{AddressFamily, AddressRange};

use crate::Result;
use std::cmp::Ordering;

/// Parse `"<address>/<prefix_len>"` into a canonical range
pub fn parse(text: &str) -> Result<AddressRange> {
    AddressRange::parse(text)
}

/// Compare two ranges by start address; fails if families differ
pub fn compare(a: &AddressRange, b: &AddressRange) -> Result<Ordering> {
    a.compare(b)
}

/// Whether `address` lies within `container`
pub fn contains(container: &AddressRange, address: std::net::IpAddr) -> bool {
    container.contains_ip(address)
}

/// Whether two ranges share at least one address
pub fn overlaps(a: &AddressRange, b: &AddressRange) -> bool {
    a.overlaps(b)
}

/// Whether two range texts name the same block once canonicalized
pub fn same_block(a: &str, b: &str) -> bool {
    if a == b {
        return true;
    }
    match (AddressRange::parse(a), AddressRange::parse(b)) {
        (Ok(a), Ok(b)) => a == b,
        _ => false,
    }
}
