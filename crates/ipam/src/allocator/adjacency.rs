//! Adjacent placement next to an anchor block
//!
//! Exactly two candidates exist: the aligned block ending right before the
//! anchor and the aligned block starting right after it. There is no
//! search; if neither side works the request fails with a reason per side.

use super::{parsed, Block, Container};
use crate::address::{host_span, is_aligned, max_address, AddressRange};
use crate::error::AdjacencyRejection;
use crate::{Error, Result};

pub(super) fn find_contiguous<B: Block>(
    container: &Container,
    existing: &[B],
    prefix_len: u8,
    anchor: &AddressRange,
) -> Result<AddressRange> {
    let width = anchor.width();
    if prefix_len > width {
        return Err(Error::PrefixTooSpecific {
            requested: prefix_len,
            width,
        });
    }

    // Adjacency is judged among siblings only
    let siblings: Vec<AddressRange> = parsed(existing.iter().filter(|b| b.parent_cidr().is_none()))
        .map(|(range, _)| range)
        .collect();

    let before = match before_candidate(anchor, prefix_len) {
        Ok(candidate) => admit(container, &siblings, candidate),
        Err(reason) => Err(reason),
    };
    let before = match before {
        Ok(found) => return Ok(found),
        Err(reason) => reason,
    };

    let after = match after_candidate(anchor, prefix_len) {
        Ok(candidate) => admit(container, &siblings, candidate),
        Err(reason) => Err(reason),
    };
    match after {
        Ok(found) => Ok(found),
        Err(after) => Err(Error::NoAdjacentSpace {
            prefix_len,
            anchor: *anchor,
            before,
            after,
        }),
    }
}

/// The block whose last address is `anchor.start - 1`
fn before_candidate(
    anchor: &AddressRange,
    prefix_len: u8,
) -> std::result::Result<AddressRange, AdjacencyRejection> {
    let width = anchor.width();
    let span = host_span(prefix_len, width);

    let start = anchor
        .start()
        .checked_sub(span)
        .and_then(|s| s.checked_sub(1))
        .ok_or(AdjacencyRejection::OutsideAddressSpace)?;

    if !is_aligned(anchor.start(), prefix_len, width) {
        return Err(AdjacencyRejection::Misaligned {
            boundary: anchor.network().to_string(),
            prefix_len,
        });
    }

    AddressRange::new(anchor.family(), start, prefix_len)
        .map_err(|_| AdjacencyRejection::OutsideAddressSpace)
}

/// The block whose first address is `anchor.end + 1`
fn after_candidate(
    anchor: &AddressRange,
    prefix_len: u8,
) -> std::result::Result<AddressRange, AdjacencyRejection> {
    let width = anchor.width();

    let start = anchor
        .end()
        .checked_add(1)
        .filter(|next| *next <= max_address(width))
        .ok_or(AdjacencyRejection::OutsideAddressSpace)?;

    if !is_aligned(start, prefix_len, width) {
        let boundary = AddressRange::new(anchor.family(), start, width)
            .map(|r| r.network().to_string())
            .unwrap_or_default();
        return Err(AdjacencyRejection::Misaligned {
            boundary,
            prefix_len,
        });
    }

    AddressRange::new(anchor.family(), start, prefix_len)
        .map_err(|_| AdjacencyRejection::OutsideAddressSpace)
}

fn admit(
    container: &Container,
    siblings: &[AddressRange],
    candidate: AddressRange,
) -> std::result::Result<AddressRange, AdjacencyRejection> {
    if !container.contains(&candidate) {
        return Err(AdjacencyRejection::OutsideContainer { candidate });
    }
    if let Some(existing) = siblings.iter().find(|s| s.overlaps(&candidate)) {
        return Err(AdjacencyRejection::Overlaps {
            candidate,
            existing: *existing,
        });
    }
    Ok(candidate)
}
