//! Pool catalog
//!
//! Read-mostly registry of named pools, stored as a YAML document:
//!
//! ```yaml
//! pools:
//!   prod:
//!     cidr:
//!       - "10.0.0.0/16"
//!     description: "Production"
//!     metadata:
//!       environment: "production"
//! ```

use crate::address::AddressRange;
use crate::error::EntityKind;
use crate::models::PoolDefinition;
use crate::{Error, Result};
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::BTreeMap;

/// Registry of pools keyed by pool id
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PoolCatalog {
    #[serde(default, deserialize_with = "null_as_empty")]
    pools: BTreeMap<String, PoolDefinition>,
}

fn null_as_empty<'de, D>(deserializer: D) -> std::result::Result<BTreeMap<String, PoolDefinition>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::deserialize(deserializer)?.unwrap_or_default())
}

impl PoolCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or replace a pool, returning the previous definition
    pub fn add_pool(&mut self, id: impl Into<String>, pool: PoolDefinition) -> Option<PoolDefinition> {
        self.pools.insert(id.into(), pool)
    }

    pub fn get_pool(&self, id: &str) -> Option<&PoolDefinition> {
        self.pools.get(id)
    }

    pub fn get_pool_mut(&mut self, id: &str) -> Option<&mut PoolDefinition> {
        self.pools.get_mut(id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.pools.contains_key(id)
    }

    /// Pool ids in ascending order
    pub fn list_ids(&self) -> Vec<&str> {
        self.pools.keys().map(String::as_str).collect()
    }

    pub fn remove_pool(&mut self, id: &str) -> Result<PoolDefinition> {
        self.pools
            .remove(id)
            .ok_or_else(|| Error::not_found(EntityKind::Pool, id))
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &PoolDefinition)> {
        self.pools.iter().map(|(id, pool)| (id.as_str(), pool))
    }

    pub fn len(&self) -> usize {
        self.pools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pools.is_empty()
    }

    /// Every parsable range across all pools, with its owning pool id
    pub fn all_ranges(&self) -> Vec<(&str, AddressRange)> {
        self.iter()
            .flat_map(|(id, pool)| {
                pool.cidr
                    .iter()
                    .filter_map(move |text| AddressRange::parse(text).ok().map(|r| (id, r)))
            })
            .collect()
    }

    /// Check that every pool has at least one range, every range parses with
    /// no host bits set, and no two ranges anywhere in the catalog overlap.
    ///
    /// Reports the first violation found, walking pools in id order.
    pub fn validate(&self) -> Result<()> {
        let mut seen: Vec<(&str, AddressRange)> = Vec::new();

        for (pool_id, pool) in self.iter() {
            if pool.cidr.is_empty() {
                return Err(Error::ValidationFailed {
                    pool_id: pool_id.to_string(),
                    range: String::new(),
                    reason: "pool has no CIDRs defined".to_string(),
                });
            }

            for text in &pool.cidr {
                let failed = |reason: String| Error::ValidationFailed {
                    pool_id: pool_id.to_string(),
                    range: text.clone(),
                    reason,
                };

                let range =
                    AddressRange::parse_network(text).map_err(|e| failed(e.to_string()))?;

                if let Some((other_pool, existing)) = seen.iter().find(|(_, e)| e.overlaps(&range)) {
                    return Err(failed(format!(
                        "overlaps {existing} in pool {other_pool}"
                    )));
                }
                seen.push((pool_id, range));
            }
        }

        Ok(())
    }

    /// Load from YAML; an empty or comment-only document is an empty catalog
    pub fn from_yaml(text: &str) -> Result<Self> {
        let has_content = text
            .lines()
            .map(str::trim)
            .any(|line| !line.is_empty() && !line.starts_with('#'));
        if !has_content {
            return Ok(Self::default());
        }
        Ok(serde_yaml::from_str(text)?)
    }

    pub fn to_yaml(&self) -> Result<String> {
        Ok(serde_yaml::to_string(self)?)
    }
}
