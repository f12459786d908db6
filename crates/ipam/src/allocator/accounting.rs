//! Overlap validation and capacity accounting

use super::{parsed, Block, Container};
use crate::address::AddressRange;
use crate::{Error, Result};

pub(super) fn validate_no_overlap<B: Block>(existing: &[B], candidate: &AddressRange) -> Result<()> {
    match parsed(existing).find(|(range, _)| range.overlaps(candidate)) {
        Some((range, block)) => Err(Error::Overlap {
            candidate: *candidate,
            existing: range,
            name: block.label().to_string(),
        }),
        None => Ok(()),
    }
}

/// Free addresses summed over every container range.
///
/// Only `::/0` holds more addresses than a u128 can count; it saturates
/// at `u128::MAX` while unused.
pub(super) fn available_capacity<B: Block>(container: &Container, existing: &[B]) -> u128 {
    let occupied: Vec<AddressRange> = parsed(existing).map(|(range, _)| range).collect();

    container
        .ranges()
        .iter()
        .map(|range| range_capacity(range, &occupied))
        .fold(0u128, u128::saturating_add)
}

fn range_capacity(range: &AddressRange, occupied: &[AddressRange]) -> u128 {
    // None once the used count passes u128::MAX; the range is then covered
    let used = occupied
        .iter()
        .filter(|block| range.contains(block))
        .try_fold(0u128, |acc, block| {
            block.block_size().and_then(|size| acc.checked_add(size))
        });

    match (range.block_size(), used) {
        (_, None) => 0,
        (Some(total), Some(used)) => total.saturating_sub(used),
        (None, Some(0)) => u128::MAX,
        // Whole IPv6 space: 2^128 - used without overflow
        (None, Some(used)) => (u128::MAX - used) + 1,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Allocation;

    fn range(text: &str) -> AddressRange {
        AddressRange::parse(text).unwrap()
    }

    fn block(text: &str) -> Container {
        Container::Block(range(text))
    }

    #[test]
    fn test_overlap_detected() {
        let existing = vec![
            Allocation::new("a", "10.0.0.0/24", "web"),
            Allocation::new("b", "10.0.1.0/24", "db"),
        ];
        let err = validate_no_overlap(&existing, &range("10.0.1.128/25")).unwrap_err();
        assert_eq!(
            err,
            Error::Overlap {
                candidate: range("10.0.1.128/25"),
                existing: range("10.0.1.0/24"),
                name: "db".to_string(),
            }
        );
    }

    #[test]
    fn test_containing_block_overlaps() {
        let existing = ["10.0.0.0/16"];
        assert!(validate_no_overlap(&existing, &range("10.0.4.0/24")).is_err());
        assert!(validate_no_overlap(&["10.0.4.0/24"], &range("10.0.0.0/16")).is_err());
    }

    #[test]
    fn test_adjacent_blocks_do_not_overlap() {
        let existing = ["10.0.0.0/24", "10.0.2.0/24", "not-a-cidr", "2001:db8::/32"];
        assert!(validate_no_overlap(&existing, &range("10.0.1.0/24")).is_ok());
    }

    #[test]
    fn test_capacity_partial() {
        assert_eq!(available_capacity(&block("10.0.0.0/24"), &["10.0.0.0/25"]), 128);
    }

    #[test]
    fn test_capacity_empty_and_full() {
        assert_eq!(available_capacity(&block("10.0.0.0/24"), &[] as &[&str]), 256);
        assert_eq!(available_capacity(&block("10.0.0.0/24"), &["10.0.0.0/24"]), 0);
        assert_eq!(available_capacity(&block("0.0.0.0/0"), &[] as &[&str]), 1 << 32);
    }

    #[test]
    fn test_capacity_ignores_outside_blocks() {
        let existing = ["10.0.0.0/26", "10.1.0.0/24", "10.0.0.0/8", "junk"];
        assert_eq!(available_capacity(&block("10.0.0.0/24"), &existing), 192);
    }

    #[test]
    fn test_capacity_clamps_overcounting() {
        // Nested entries are both counted; the result never goes negative
        let existing = ["10.0.0.0/24", "10.0.0.0/25"];
        assert_eq!(available_capacity(&block("10.0.0.0/24"), &existing), 0);
    }

    #[test]
    fn test_capacity_across_pool_ranges() {
        let container = Container::Ranges(vec![range("10.0.0.0/24"), range("10.1.0.0/24")]);
        assert_eq!(available_capacity(&container, &["10.1.0.0/25"]), 256 + 128);
    }

    #[test]
    fn test_capacity_whole_ipv6_space() {
        assert_eq!(available_capacity(&block("::/0"), &[] as &[&str]), u128::MAX);
        assert_eq!(available_capacity(&block("::/0"), &["::/1"]), 1u128 << 127);
        assert_eq!(available_capacity(&block("::/0"), &["::/0"]), 0);
        assert_eq!(
            available_capacity(&block("2001:db8::/32"), &["2001:db8::/33"]),
            1u128 << 95
        );
    }
}
