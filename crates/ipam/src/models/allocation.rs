//! Allocation and related models

use super::Metadata;
use crate::address::AddressRange;
use crate::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Whether a block is in use or merely held
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AllocationStatus {
    /// Block is granted and may be subdivided further
    #[default]
    Allocation,
    /// Block is held but unused; it can never parent sub-allocations
    Reservation,
}

impl AllocationStatus {
    pub fn is_reserved(self) -> bool {
        self == AllocationStatus::Reservation
    }
}

impl From<bool> for AllocationStatus {
    fn from(reserved: bool) -> Self {
        if reserved {
            AllocationStatus::Reservation
        } else {
            AllocationStatus::Allocation
        }
    }
}

impl fmt::Display for AllocationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AllocationStatus::Allocation => write!(f, "allocation"),
            AllocationStatus::Reservation => write!(f, "reservation"),
        }
    }
}

/// A granted or reserved block recorded in the ledger.
///
/// Block text is kept as written so that a malformed entry in a stored
/// ledger can still be loaded (and skipped by the allocator) instead of
/// failing the whole document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Allocation {
    /// Granted block, canonical CIDR text
    pub cidr: String,
    /// Stable identifier; doubles as the idempotency key for creation
    pub id: String,
    /// Unique human-readable name
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub name: String,
    /// Parent block for sub-allocations; absent for pool-rooted blocks
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_cidr: Option<String>,
    /// Custom metadata
    #[serde(default, skip_serializing_if = "Metadata::is_empty")]
    pub metadata: Metadata,
    /// Creation timestamp, stamped by the ledger on insert
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
    /// Held-but-unused flag
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub reserved: bool,
    /// Anchor block this one was placed next to, if any
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub contiguous_with: Option<String>,
}

impl Allocation {
    /// Create a top-level allocation
    pub fn new(id: impl Into<String>, cidr: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            cidr: cidr.into(),
            id: id.into(),
            name: name.into(),
            parent_cidr: None,
            metadata: Metadata::new(),
            created_at: None,
            reserved: false,
            contiguous_with: None,
        }
    }

    /// Set the parent block
    pub fn with_parent(mut self, parent_cidr: impl Into<String>) -> Self {
        self.parent_cidr = Some(parent_cidr.into());
        self
    }

    /// Set the status
    pub fn with_status(mut self, status: AllocationStatus) -> Self {
        self.reserved = status.is_reserved();
        self
    }

    /// Set metadata
    pub fn with_metadata(mut self, metadata: Metadata) -> Self {
        self.metadata = metadata;
        self
    }

    /// Record the adjacency anchor
    pub fn with_contiguous_with(mut self, anchor: impl Into<String>) -> Self {
        self.contiguous_with = Some(anchor.into());
        self
    }

    /// Parse the granted block
    pub fn range(&self) -> Result<AddressRange> {
        AddressRange::parse(&self.cidr)
    }

    /// Prefix length of the granted block
    pub fn prefix_len(&self) -> Result<u8> {
        self.range().map(|r| r.prefix_len())
    }

    /// Whether this block sits directly in a pool
    pub fn is_top_level(&self) -> bool {
        self.parent_cidr.is_none()
    }

    pub fn status(&self) -> AllocationStatus {
        AllocationStatus::from(self.reserved)
    }
}
