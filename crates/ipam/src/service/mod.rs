//! IPAM Service
//!
//! Lifecycle operations over the pool catalog and allocation ledger held in
//! a [`VersionedStore`]:
//! - Allocation create/read/update/delete/import
//! - Pool create/read/update/delete
//! - Next-available and capacity previews
//!
//! Every mutation reads fresh snapshots, plans with the pure allocator and
//! writes back conditioned on the version it read. A lost race surfaces as
//! a conflict and the whole read-plan-write cycle is retried.

mod allocations;
mod pools;

pub use allocations::{AllocationTarget, CreateAllocationRequest, ImportedAllocation};
pub use pools::{CreatePoolRequest, PoolUpdate};

use crate::allocator::Allocator;
use crate::catalog::PoolCatalog;
use crate::config::IpamConfig;
use crate::ledger::Ledger;
use crate::store::{VersionTag, VersionedStore};
use crate::{Error, Result};
use std::sync::Arc;

/// A document as read, with the version to write back against
#[derive(Debug, Clone)]
pub struct Snapshot<T> {
    pub value: T,
    /// `None` when the document does not exist yet
    pub version: Option<VersionTag>,
}

/// IPAM service - pools and allocations over a versioned store
pub struct IpamService<S> {
    store: Arc<S>,
    config: IpamConfig,
    allocator: Allocator,
}

impl<S: VersionedStore> IpamService<S> {
    /// Create a service with default configuration
    pub fn new(store: Arc<S>) -> Self {
        Self::with_config(store, IpamConfig::default())
    }

    /// Create a service with custom configuration
    pub fn with_config(store: Arc<S>, config: IpamConfig) -> Self {
        Self {
            store,
            config,
            allocator: Allocator::new(),
        }
    }

    pub fn config(&self) -> &IpamConfig {
        &self.config
    }

    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    /// Read the pool catalog; a missing document is an empty catalog
    pub async fn load_catalog(&self) -> Result<Snapshot<PoolCatalog>> {
        match self.store.get(&self.config.pools_file).await {
            Ok(doc) => Ok(Snapshot {
                value: PoolCatalog::from_yaml(std::str::from_utf8(&doc.bytes)?)?,
                version: Some(doc.version),
            }),
            Err(Error::NotFound { .. }) => Ok(Snapshot {
                value: PoolCatalog::new(),
                version: None,
            }),
            Err(e) => Err(e),
        }
    }

    /// Read the allocation ledger; a missing document is an empty ledger
    pub async fn load_ledger(&self) -> Result<Snapshot<Ledger>> {
        match self.store.get(&self.config.allocations_file).await {
            Ok(doc) => Ok(Snapshot {
                value: Ledger::from_json(std::str::from_utf8(&doc.bytes)?)?,
                version: Some(doc.version),
            }),
            Err(Error::NotFound { .. }) => Ok(Snapshot {
                value: Ledger::new(),
                version: None,
            }),
            Err(e) => Err(e),
        }
    }

    /// Write the catalog back; it must validate first
    async fn save_catalog(
        &self,
        catalog: &PoolCatalog,
        expected: Option<&str>,
        message: &str,
    ) -> Result<VersionTag> {
        catalog.validate()?;
        let bytes = catalog.to_yaml()?.into_bytes();
        self.store
            .put(&self.config.pools_file, bytes, expected, message)
            .await
    }

    async fn save_ledger(
        &self,
        ledger: &Ledger,
        expected: Option<&str>,
        message: &str,
    ) -> Result<VersionTag> {
        let bytes = ledger.to_json()?.into_bytes();
        self.store
            .put(&self.config.allocations_file, bytes, expected, message)
            .await
    }
}
