//! Allocation ledger
//!
//! The mutable record of granted and reserved blocks, grouped by pool id.
//! Stored as a JSON document:
//!
//! ```json
//! {
//!   "version": "1.0",
//!   "allocations": {
//!     "prod": [
//!       { "cidr": "10.0.0.0/24", "id": "...", "name": "web" }
//!     ]
//!   }
//! }
//! ```
//!
//! Scans walk pools in ascending id order, then entries in insertion order,
//! so the first match is deterministic even if duplicate names or blocks
//! slipped past validation.

use crate::address::same_block;
use crate::error::EntityKind;
use crate::models::{Allocation, Metadata};
use crate::{Error, Result};
use chrono::Utc;
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::BTreeMap;

/// Document format version written by this crate
pub const LEDGER_VERSION: &str = "1.0";

/// Allocations keyed by owning pool id
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ledger {
    #[serde(default = "default_version")]
    version: String,
    #[serde(default, deserialize_with = "null_as_empty")]
    allocations: BTreeMap<String, Vec<Allocation>>,
}

fn default_version() -> String {
    LEDGER_VERSION.to_string()
}

fn null_as_empty<'de, D>(deserializer: D) -> std::result::Result<BTreeMap<String, Vec<Allocation>>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::deserialize(deserializer)?.unwrap_or_default())
}

impl Default for Ledger {
    fn default() -> Self {
        Self {
            version: default_version(),
            allocations: BTreeMap::new(),
        }
    }
}

/// Post-creation changes; block and parent are immutable
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AllocationUpdate {
    pub name: Option<String>,
    pub metadata: Option<Metadata>,
    pub reserved: Option<bool>,
}

impl Ledger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn version(&self) -> &str {
        &self.version
    }

    /// Append an allocation to a pool.
    ///
    /// The creation timestamp is always overwritten with the current time;
    /// any value supplied by the caller is discarded.
    pub fn add(&mut self, pool_id: impl Into<String>, mut allocation: Allocation) -> &Allocation {
        allocation.created_at = Some(Utc::now());
        let entries = self.allocations.entry(pool_id.into()).or_default();
        entries.push(allocation);
        &entries[entries.len() - 1]
    }

    /// Remove an allocation by id from the given pool
    pub fn remove(&mut self, pool_id: &str, id: &str) -> Result<Allocation> {
        let entries = self
            .allocations
            .get_mut(pool_id)
            .ok_or_else(|| Error::not_found(EntityKind::Pool, pool_id))?;

        let index = entries
            .iter()
            .position(|a| a.id == id)
            .ok_or_else(|| Error::not_found(EntityKind::Allocation, format!("{id} in pool {pool_id}")))?;

        Ok(entries.remove(index))
    }

    fn find(&self, predicate: impl Fn(&Allocation) -> bool) -> Option<(&Allocation, &str)> {
        self.allocations.iter().find_map(|(pool_id, entries)| {
            entries
                .iter()
                .find(|a| predicate(a))
                .map(|a| (a, pool_id.as_str()))
        })
    }

    pub fn find_by_id(&self, id: &str) -> Option<(&Allocation, &str)> {
        self.find(|a| a.id == id)
    }

    /// Find by block; `10.0.0.0/24` and `10.0.0.7/24` name the same block
    pub fn find_by_cidr(&self, cidr: &str) -> Option<(&Allocation, &str)> {
        self.find(|a| same_block(&a.cidr, cidr))
    }

    pub fn find_by_name(&self, name: &str) -> Option<(&Allocation, &str)> {
        self.find(|a| a.name == name)
    }

    /// Entries of one pool; empty for an unknown pool id
    pub fn allocations_for_pool(&self, pool_id: &str) -> &[Allocation] {
        self.allocations
            .get(pool_id)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Every allocation, in any pool, whose parent is exactly `parent_cidr`
    pub fn allocations_for_parent(&self, parent_cidr: &str) -> Vec<&Allocation> {
        self.iter()
            .filter(|(a, _)| {
                a.parent_cidr
                    .as_deref()
                    .is_some_and(|parent| same_block(parent, parent_cidr))
            })
            .map(|(a, _)| a)
            .collect()
    }

    /// Flattened view of every pool's entries
    pub fn all_allocations(&self) -> Vec<&Allocation> {
        self.iter().map(|(a, _)| a).collect()
    }

    /// Every entry paired with its owning pool id
    pub fn iter(&self) -> impl Iterator<Item = (&Allocation, &str)> {
        self.allocations
            .iter()
            .flat_map(|(pool_id, entries)| entries.iter().map(move |a| (a, pool_id.as_str())))
    }

    pub fn pool_ids(&self) -> Vec<&str> {
        self.allocations.keys().map(String::as_str).collect()
    }

    pub fn len(&self) -> usize {
        self.allocations.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Look up the parent of a sub-allocation request.
    ///
    /// The parent must exist and must not be a reservation.
    pub fn resolve_parent(&self, parent_cidr: &str) -> Result<(&Allocation, &str)> {
        let (parent, pool_id) = self
            .find_by_cidr(parent_cidr)
            .ok_or_else(|| Error::not_found(EntityKind::Parent, parent_cidr))?;

        if parent.reserved {
            return Err(Error::ParentReserved(parent_cidr.to_string()));
        }
        Ok((parent, pool_id))
    }

    /// Change name, metadata or reservation status of an allocation
    pub fn update(&mut self, id: &str, update: AllocationUpdate) -> Result<&Allocation> {
        let (current, _) = self
            .find_by_id(id)
            .ok_or_else(|| Error::not_found(EntityKind::Allocation, id))?;

        if let Some(name) = update.name.as_deref() {
            if name != current.name {
                if let Some((other, _)) = self.find_by_name(name) {
                    if other.id != id {
                        return Err(Error::already_exists(EntityKind::Allocation, name));
                    }
                }
            }
        }

        if update.reserved == Some(true) && !current.reserved {
            let children = self.allocations_for_parent(&current.cidr).len();
            if children > 0 {
                return Err(Error::HasDependents {
                    key: current.cidr.clone(),
                    count: children,
                });
            }
        }

        let target = self
            .allocations
            .values_mut()
            .flat_map(|entries| entries.iter_mut())
            .find(|a| a.id == id)
            .ok_or_else(|| Error::not_found(EntityKind::Allocation, id))?;

        if let Some(name) = update.name {
            target.name = name;
        }
        if let Some(metadata) = update.metadata {
            target.metadata = metadata;
        }
        if let Some(reserved) = update.reserved {
            target.reserved = reserved;
        }
        Ok(target)
    }

    /// Entries of one pool that are not nested under a parent
    pub fn top_level_allocations(&self, pool_id: &str) -> Vec<&Allocation> {
        self.allocations_for_pool(pool_id)
            .iter()
            .filter(|a| a.is_top_level())
            .collect()
    }

    pub fn from_json(text: &str) -> Result<Self> {
        if text.trim().is_empty() {
            return Ok(Self::default());
        }
        Ok(serde_json::from_str(text)?)
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}
