//! Property-based tests for the block allocator

use ipam::address::{block_size, is_aligned, AddressFamily};
use ipam::{AddressRange, Allocator, BlockAllocator, Container};
use proptest::prelude::*;

// Generate an IPv4 container inside 10.0.0.0/8 or an IPv6 one inside 2001:db8::/32
prop_compose! {
    fn arb_container()(
        v6 in any::<bool>(),
        bits in any::<u128>(),
        extra in 0..=16u8
    ) -> AddressRange {
        if v6 {
            let base = 0x2001_0db8u128 << 96;
            let prefix = 32 + extra * 2;
            AddressRange::new(AddressFamily::V6, base | (bits >> 32), prefix).unwrap()
        } else {
            let base = 10u128 << 24;
            let prefix = 8 + extra;
            AddressRange::new(AddressFamily::V4, base | (bits & 0x00ff_ffff), prefix).unwrap()
        }
    }
}

/// A block somewhere inside `container`, at most 8 bits more specific
fn arb_child(container: AddressRange) -> impl Strategy<Value = AddressRange> {
    (any::<u128>(), 0..=8u8).prop_map(move |(offset, extra)| {
        let prefix = (container.prefix_len() + extra).min(container.width());
        let span = block_size(container.prefix_len(), container.width()).unwrap_or(u128::MAX);
        let start = container.start() + offset % span;
        AddressRange::new(container.family(), start, prefix).unwrap()
    })
}

// Generate a container, existing children and a request size
prop_compose! {
    fn arb_request()(container in arb_container())(
        existing in prop::collection::vec(arb_child(container), 0..12),
        extra in 0..=10u8,
        container in Just(container)
    ) -> (AddressRange, Vec<String>, u8) {
        let prefix = (container.prefix_len() + extra).min(container.width());
        let existing = existing.iter().map(ToString::to_string).collect();
        (container, existing, prefix)
    }
}

proptest! {
    #[test]
    fn prop_found_block_is_inside_aligned_and_free((container, existing, prefix) in arb_request()) {
        let allocator = Allocator::new();
        if let Ok(found) = allocator.find_next_available(&Container::Block(container), &existing, prefix) {
            prop_assert!(container.contains(&found));
            prop_assert_eq!(found.prefix_len(), prefix);
            prop_assert!(is_aligned(found.start(), prefix, found.width()));
            for text in &existing {
                let block = AddressRange::parse(text).unwrap();
                prop_assert!(!found.overlaps(&block), "{} overlaps {}", found, block);
            }
        }
    }

    #[test]
    fn prop_search_is_deterministic_and_order_independent((container, existing, prefix) in arb_request()) {
        let allocator = Allocator::new();
        let container = Container::Block(container);
        let first = allocator.find_next_available(&container, &existing, prefix);
        let again = allocator.find_next_available(&container, &existing, prefix);
        prop_assert_eq!(&first, &again);

        let mut reversed = existing.clone();
        reversed.reverse();
        let shuffled = allocator.find_next_available(&container, &reversed, prefix);
        prop_assert_eq!(first, shuffled);
    }

    #[test]
    fn prop_empty_container_always_has_room((container, _existing, prefix) in arb_request()) {
        let found = Allocator::new()
            .find_next_available(&Container::Block(container), &[] as &[&str], prefix);
        prop_assert_eq!(found.map(|r| r.start()), Ok(container.start()));
    }

    #[test]
    fn prop_overlap_check_matches_pairwise_test(
        (container, existing, prefix) in arb_request(),
        candidate_offset in any::<u128>()
    ) {
        let span = block_size(container.prefix_len(), container.width()).unwrap_or(u128::MAX);
        let candidate = AddressRange::new(
            container.family(),
            container.start() + candidate_offset % span,
            prefix,
        ).unwrap();

        let any_overlap = existing
            .iter()
            .any(|text| AddressRange::parse(text).unwrap().overlaps(&candidate));
        let result = Allocator::new().validate_no_overlap(&existing, &candidate);
        prop_assert_eq!(result.is_err(), any_overlap);
    }

    #[test]
    fn prop_capacity_bounds(container in arb_container()) {
        let allocator = Allocator::new();
        let block = Container::Block(container);
        prop_assert_eq!(
            Some(allocator.available_capacity(&block, &[] as &[&str])),
            container.block_size()
        );
        prop_assert_eq!(allocator.available_capacity(&block, &[container.to_string()]), 0);
    }

    #[test]
    fn prop_contiguous_is_immediate_neighbour(
        (container, existing, prefix) in arb_request(),
        anchor_offset in any::<u128>()
    ) {
        let span = block_size(container.prefix_len(), container.width()).unwrap_or(u128::MAX);
        let anchor = AddressRange::new(
            container.family(),
            container.start() + anchor_offset % span,
            prefix,
        ).unwrap();

        let result = Allocator::new().find_contiguous(
            &Container::Block(container),
            &existing,
            prefix,
            &anchor,
        );
        if let Ok(found) = result {
            let before = found.end().checked_add(1) == Some(anchor.start());
            let after = anchor.end().checked_add(1) == Some(found.start());
            prop_assert!(before || after, "{} is not adjacent to {}", found, anchor);
            prop_assert!(container.contains(&found));
        }
    }
}
