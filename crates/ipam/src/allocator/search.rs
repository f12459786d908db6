//! First-fit search for the next free block
//!
//! Existing blocks are sorted by start address and walked once; the
//! candidate jumps to the first aligned boundary past each block it
//! collides with, so the scan is O(n log n) in the number of children.

use super::{parsed, Block, Container};
use crate::address::{align_to_prefix, host_span, AddressRange};
use crate::error::RangeRejection;
use crate::{Error, Result};

pub(super) fn find_next_available<B: Block>(
    container: &Container,
    existing: &[B],
    prefix_len: u8,
) -> Result<AddressRange> {
    match container {
        Container::Block(range) => find_in_range(range, existing, prefix_len),
        Container::Ranges(ranges) => {
            let mut rejections = Vec::with_capacity(ranges.len());
            for range in ranges {
                match find_in_range(range, existing, prefix_len) {
                    Ok(found) => return Ok(found),
                    Err(reason) => rejections.push(RangeRejection::new(*range, reason)),
                }
            }
            Err(Error::PoolExhausted {
                prefix_len,
                rejections,
            })
        }
    }
}

/// Search one aligned container range
fn find_in_range<B: Block>(
    container: &AddressRange,
    existing: &[B],
    prefix_len: u8,
) -> Result<AddressRange> {
    let width = container.width();
    if prefix_len < container.prefix_len() {
        return Err(Error::PrefixTooLarge {
            requested: prefix_len,
            container: *container,
        });
    }
    if prefix_len > width {
        return Err(Error::PrefixTooSpecific {
            requested: prefix_len,
            width,
        });
    }

    let mut occupied: Vec<AddressRange> = parsed(existing)
        .map(|(range, _)| range)
        .filter(|range| container.contains(range))
        .collect();
    occupied.sort_unstable();

    let span = host_span(prefix_len, width);
    let fits = |start: u128| {
        start
            .checked_add(span)
            .is_some_and(|end| container.contains_addr(start) && end <= container.end())
    };

    let mut candidate = align_to_prefix(container.start(), prefix_len, width);
    for block in &occupied {
        let Some(start) = candidate else { break };

        // Strictly below: a candidate ending on the block's first address
        // would share that address with it.
        if let Some(end) = start.checked_add(span) {
            if end < block.start() && fits(start) {
                return AddressRange::new(container.family(), start, prefix_len);
            }
        }

        // Never move backwards past a block already cleared (nested entries)
        candidate = if block.end() < start {
            Some(start)
        } else {
            block
                .end()
                .checked_add(1)
                .and_then(|next| align_to_prefix(next, prefix_len, width))
        };
    }

    match candidate {
        Some(start) if fits(start) => AddressRange::new(container.family(), start, prefix_len),
        _ => Err(Error::NoSpaceAvailable {
            prefix_len,
            container: *container,
        }),
    }
}
