//! Pool definition model

use super::Metadata;
use crate::address::AddressRange;
use crate::Result;
use serde::{Deserialize, Serialize};

/// A named top-level address space, as written in the pool catalog.
///
/// Range text is kept verbatim; `PoolCatalog::validate` is what guarantees
/// it parses and does not overlap any other pool.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PoolDefinition {
    /// Address ranges, tried in order when allocating
    #[serde(default)]
    pub cidr: Vec<String>,
    /// Human-readable description
    #[serde(default)]
    pub description: String,
    /// Custom metadata
    #[serde(default, skip_serializing_if = "Metadata::is_empty")]
    pub metadata: Metadata,
    /// Reserved pools cannot hold allocations
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub reserved: bool,
}

impl PoolDefinition {
    pub fn new<I, S>(ranges: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            cidr: ranges.into_iter().map(Into::into).collect(),
            ..Self::default()
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_metadata(mut self, metadata: Metadata) -> Self {
        self.metadata = metadata;
        self
    }

    pub fn reserved(mut self) -> Self {
        self.reserved = true;
        self
    }

    /// Parse every range, failing on the first malformed one
    pub fn ranges(&self) -> Result<Vec<AddressRange>> {
        self.cidr.iter().map(|c| AddressRange::parse(c)).collect()
    }
}
