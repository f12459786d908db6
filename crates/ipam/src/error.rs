//! Error types for address planning

use crate::address::AddressRange;
use std::fmt;
use thiserror::Error;

/// Result type for address planning operations
pub type Result<T> = std::result::Result<T, Error>;

/// Kind of entity named by `NotFound` / `AlreadyExists`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntityKind {
    Pool,
    Allocation,
    Parent,
    Document,
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EntityKind::Pool => write!(f, "Pool"),
            EntityKind::Allocation => write!(f, "Allocation"),
            EntityKind::Parent => write!(f, "Parent block"),
            EntityKind::Document => write!(f, "Document"),
        }
    }
}

/// Why one range of a multi-range pool could not satisfy a request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RangeRejection {
    pub range: AddressRange,
    pub reason: Box<Error>,
}

impl RangeRejection {
    pub fn new(range: AddressRange, reason: Error) -> Self {
        Self {
            range,
            reason: Box::new(reason),
        }
    }

    fn join(rejections: &[RangeRejection]) -> String {
        rejections
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join("; ")
    }
}

impl fmt::Display for RangeRejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.range, self.reason)
    }
}

/// Why one side of an anchor cannot host an adjacent block
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AdjacencyRejection {
    #[error("anchor is too close to the edge of the address space")]
    OutsideAddressSpace,

    #[error("no valid /{prefix_len} boundary at {boundary}")]
    Misaligned { boundary: String, prefix_len: u8 },

    #[error("block {candidate} is outside pool boundaries")]
    OutsideContainer { candidate: AddressRange },

    #[error("block {candidate} overlaps with existing allocation {existing}")]
    Overlaps {
        candidate: AddressRange,
        existing: AddressRange,
    },
}

/// Address planning errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Error {
    // Address errors
    #[error("Invalid CIDR {input:?}: {reason}")]
    InvalidFormat { input: String, reason: String },

    #[error("Address family mismatch: {0} vs {1}")]
    AddressFamilyMismatch(String, String),

    // Allocation errors
    #[error("Requested prefix /{requested} is larger than container {container}")]
    PrefixTooLarge {
        requested: u8,
        container: AddressRange,
    },

    #[error("Requested prefix /{requested} exceeds address size /{width}")]
    PrefixTooSpecific { requested: u8, width: u8 },

    #[error("No available /{prefix_len} block in {container}")]
    NoSpaceAvailable {
        prefix_len: u8,
        container: AddressRange,
    },

    #[error(
        "No available /{prefix_len} block in pool (tried {} ranges): {}",
        .rejections.len(),
        RangeRejection::join(.rejections)
    )]
    PoolExhausted {
        prefix_len: u8,
        rejections: Vec<RangeRejection>,
    },

    #[error("No contiguous /{prefix_len} space adjacent to {anchor}: before: {before}; after: {after}")]
    NoAdjacentSpace {
        prefix_len: u8,
        anchor: AddressRange,
        before: AdjacencyRejection,
        after: AdjacencyRejection,
    },

    #[error("CIDR {candidate} overlaps with existing allocation {existing} ({name})")]
    Overlap {
        candidate: AddressRange,
        existing: AddressRange,
        name: String,
    },

    // Catalog errors
    #[error("Pool {pool_id} has invalid range {range:?}: {reason}")]
    ValidationFailed {
        pool_id: String,
        range: String,
        reason: String,
    },

    #[error("Pool {0} is reserved and cannot hold allocations")]
    PoolReserved(String),

    // Ledger errors
    #[error("{kind} not found: {key}")]
    NotFound { kind: EntityKind, key: String },

    #[error("{kind} already exists: {key}")]
    AlreadyExists { kind: EntityKind, key: String },

    #[error("Cannot change {key}: it has {count} child allocations")]
    HasDependents { key: String, count: usize },

    #[error("Cannot sub-allocate from {0}: parent is a reservation")]
    ParentReserved(String),

    // Store errors
    #[error("Version conflict writing {path}")]
    Conflict { path: String },

    #[error("Exceeded max retries ({attempts} attempts): {last}")]
    RetriesExhausted { attempts: u32, last: Box<Error> },

    #[error("Store error: {0}")]
    Store(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl Error {
    /// Only version conflicts are worth another attempt on a fresh snapshot.
    pub fn is_transient(&self) -> bool {
        matches!(self, Error::Conflict { .. })
    }

    pub(crate) fn not_found(kind: EntityKind, key: impl Into<String>) -> Self {
        Error::NotFound {
            kind,
            key: key.into(),
        }
    }

    pub(crate) fn already_exists(kind: EntityKind, key: impl Into<String>) -> Self {
        Error::AlreadyExists {
            kind,
            key: key.into(),
        }
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Serialization(e.to_string())
    }
}

impl From<serde_yaml::Error> for Error {
    fn from(e: serde_yaml::Error) -> Self {
        Error::Serialization(e.to_string())
    }
}

impl From<std::str::Utf8Error> for Error {
    fn from(e: std::str::Utf8Error) -> Self {
        Error::Serialization(e.to_string())
    }
}
