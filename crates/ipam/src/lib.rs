//! Hierarchical IP Address Management
//!
//! Carves non-overlapping CIDR blocks out of named address pools:
//! - Pool catalog (named top-level address spaces, YAML)
//! - Allocation ledger (granted and reserved blocks, JSON)
//! - Pure first-fit and adjacent block allocator for IPv4 and IPv6
//!
//! Features:
//! - Nested sub-allocation from existing blocks
//! - Reservations that hold space but never parent children
//! - Idempotent creation via deterministic allocation ids
//! - Optimistic concurrency with conflict-only retry over a versioned store

pub mod address;
pub mod allocator;
pub mod catalog;
pub mod config;
pub mod error;
pub mod ledger;
pub mod models;
pub mod retry;
pub mod service;
pub mod store;

// Re-export core types
pub use address::{AddressFamily, AddressRange};
pub use allocator::{Allocator, Block, BlockAllocator, Container};
pub use catalog::PoolCatalog;
pub use config::IpamConfig;
pub use error::{AdjacencyRejection, EntityKind, Error, RangeRejection, Result};
pub use ledger::{AllocationUpdate, Ledger, LEDGER_VERSION};
pub use models::{Allocation, AllocationStatus, Metadata, PoolDefinition};
pub use retry::{with_retry, RetryPolicy};
pub use service::{
    AllocationTarget, CreateAllocationRequest, CreatePoolRequest, ImportedAllocation, IpamService,
    PoolUpdate, Snapshot,
};
pub use store::{Commit, InMemoryStore, VersionTag, Versioned, VersionedStore};
