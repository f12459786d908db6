//! Data models for address planning

mod allocation;
mod pool;

pub use allocation::{Allocation, AllocationStatus};
pub use pool::PoolDefinition;

/// Free-form string metadata; ordered so serialized documents are stable
pub type Metadata = std::collections::BTreeMap<String, String>;
