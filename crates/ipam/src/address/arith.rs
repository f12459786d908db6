//! Wide unsigned arithmetic over address offsets
//!
//! Every address is carried as a `u128` regardless of family, so the same
//! code serves both 32-bit and 128-bit widths without truncation.

/// Width of an IPv4 address in bits
pub const IPV4_WIDTH: u8 = 32;

/// Width of an IPv6 address in bits
pub const IPV6_WIDTH: u8 = 128;

/// Highest address representable in `width` bits
pub fn max_address(width: u8) -> u128 {
    host_span(0, width)
}

/// Host mask of a block, i.e. `block_size - 1`.
///
/// Unlike the block size itself this is representable for every prefix,
/// including `::/0`.
pub fn host_span(prefix_len: u8, width: u8) -> u128 {
    let host_bits = u32::from(width.saturating_sub(prefix_len));
    if host_bits >= u128::BITS {
        u128::MAX
    } else {
        (1u128 << host_bits) - 1
    }
}

/// Number of addresses in a block: `2^(width - prefix_len)`.
///
/// Returns `None` for the single block whose size is `2^128` (`::/0`).
pub fn block_size(prefix_len: u8, width: u8) -> Option<u128> {
    host_span(prefix_len, width).checked_add(1)
}

/// Last address of the block starting at `start`
pub fn range_end(start: u128, prefix_len: u8, width: u8) -> Option<u128> {
    start.checked_add(host_span(prefix_len, width))
}

/// Whether `addr` sits on a `/prefix_len` boundary
pub fn is_aligned(addr: u128, prefix_len: u8, width: u8) -> bool {
    addr & host_span(prefix_len, width) == 0
}

/// Round `addr` up to the next multiple of the block size.
///
/// No-op when already aligned. Returns `None` when the aligned address would
/// not fit in `width` bits.
pub fn align_to_prefix(addr: u128, prefix_len: u8, width: u8) -> Option<u128> {
    let limit = max_address(width);
    if addr > limit {
        return None;
    }

    let span = host_span(prefix_len, width);
    if addr & span == 0 {
        return Some(addr);
    }

    (addr | span)
        .checked_add(1)
        .filter(|aligned| *aligned <= limit)
}
