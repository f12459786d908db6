//! Block allocation
//!
//! The allocator is pure: it holds no state and every decision is computed
//! from the container and existing blocks handed to it. Identical inputs
//! always produce identical outputs, so a caller that loses an optimistic
//! write can simply recompute on a fresh snapshot.
//!
//! Provides:
//! - first-fit search for the next free aligned block
//! - adjacent ("contiguous") placement next to an anchor block
//! - overlap validation and free capacity accounting

mod accounting;
mod adjacency;
mod search;

use crate::address::AddressRange;
use crate::models::{Allocation, PoolDefinition};
use crate::Result;

/// Anything recorded as an occupied block
pub trait Block {
    /// Block text as stored; may be malformed
    fn cidr(&self) -> &str;

    /// Parent block, if this is a sub-allocation
    fn parent_cidr(&self) -> Option<&str> {
        None
    }

    /// Human-readable label used in error messages
    fn label(&self) -> &str {
        ""
    }
}

impl Block for Allocation {
    fn cidr(&self) -> &str {
        &self.cidr
    }

    fn parent_cidr(&self) -> Option<&str> {
        self.parent_cidr.as_deref()
    }

    fn label(&self) -> &str {
        &self.name
    }
}

impl Block for str {
    fn cidr(&self) -> &str {
        self
    }
}

impl Block for String {
    fn cidr(&self) -> &str {
        self
    }
}

impl<T: Block + ?Sized> Block for &T {
    fn cidr(&self) -> &str {
        (**self).cidr()
    }

    fn parent_cidr(&self) -> Option<&str> {
        (**self).parent_cidr()
    }

    fn label(&self) -> &str {
        (**self).label()
    }
}

/// Where a block is carved from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Container {
    /// A single parent block
    Block(AddressRange),
    /// A pool's ranges, tried in order
    Ranges(Vec<AddressRange>),
}

impl Container {
    /// All ranges of a pool, in declaration order
    pub fn from_pool(pool: &PoolDefinition) -> Result<Self> {
        Ok(Container::Ranges(pool.ranges()?))
    }

    pub fn ranges(&self) -> &[AddressRange] {
        match self {
            Container::Block(range) => std::slice::from_ref(range),
            Container::Ranges(ranges) => ranges,
        }
    }

    /// Whether `range` lies entirely inside one of the container's ranges
    pub fn contains(&self, range: &AddressRange) -> bool {
        self.ranges().iter().any(|r| r.contains(range))
    }
}

impl From<AddressRange> for Container {
    fn from(range: AddressRange) -> Self {
        Container::Block(range)
    }
}

impl From<Vec<AddressRange>> for Container {
    fn from(ranges: Vec<AddressRange>) -> Self {
        Container::Ranges(ranges)
    }
}

/// Trait for block placement decisions
pub trait BlockAllocator: Send + Sync {
    /// First free, aligned `/prefix_len` block inside `container`
    fn find_next_available<B: Block>(
        &self,
        container: &Container,
        existing: &[B],
        prefix_len: u8,
    ) -> Result<AddressRange>;

    /// Block immediately before or after `anchor`, at the sibling level
    fn find_contiguous<B: Block>(
        &self,
        container: &Container,
        existing: &[B],
        prefix_len: u8,
        anchor: &AddressRange,
    ) -> Result<AddressRange>;

    /// Fail if `candidate` overlaps any parsable existing block
    fn validate_no_overlap<B: Block>(&self, existing: &[B], candidate: &AddressRange) -> Result<()>;

    /// Addresses in `container` not covered by existing blocks inside it
    fn available_capacity<B: Block>(&self, container: &Container, existing: &[B]) -> u128;
}

/// Stateless first-fit allocator
#[derive(Debug, Clone, Copy, Default)]
pub struct Allocator;

impl Allocator {
    pub fn new() -> Self {
        Self
    }
}

impl BlockAllocator for Allocator {
    fn find_next_available<B: Block>(
        &self,
        container: &Container,
        existing: &[B],
        prefix_len: u8,
    ) -> Result<AddressRange> {
        search::find_next_available(container, existing, prefix_len)
    }

    fn find_contiguous<B: Block>(
        &self,
        container: &Container,
        existing: &[B],
        prefix_len: u8,
        anchor: &AddressRange,
    ) -> Result<AddressRange> {
        adjacency::find_contiguous(container, existing, prefix_len, anchor)
    }

    fn validate_no_overlap<B: Block>(&self, existing: &[B], candidate: &AddressRange) -> Result<()> {
        accounting::validate_no_overlap(existing, candidate)
    }

    fn available_capacity<B: Block>(&self, container: &Container, existing: &[B]) -> u128 {
        accounting::available_capacity(container, existing)
    }
}

/// Parse the blocks of `existing`, dropping malformed entries
fn parsed<'a, B: Block + 'a>(
    existing: impl IntoIterator<Item = &'a B>,
) -> impl Iterator<Item = (AddressRange, &'a B)> {
    existing.into_iter().filter_map(|block| match AddressRange::parse(block.cidr()) {
        Ok(range) => Some((range, block)),
        Err(_) => {
            tracing::trace!(cidr = block.cidr(), "Skipping unparsable block");
            None
        }
    })
}
