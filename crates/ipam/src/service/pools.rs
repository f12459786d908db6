//! Pool lifecycle

use super::{IpamService, Snapshot};
use crate::address::AddressRange;
use crate::allocator::{BlockAllocator, Container};
use crate::error::EntityKind;
use crate::models::{Metadata, PoolDefinition};
use crate::retry::with_retry;
use crate::store::VersionedStore;
use crate::{Error, Result};

/// Request to carve a new pool out of a private range
#[derive(Debug, Clone)]
pub struct CreatePoolRequest {
    /// Pool id
    pub name: String,
    /// Range the pool's block is carved from
    pub private_range: String,
    /// Prefix length of the pool's block
    pub prefix_len: u8,
    /// Description
    pub description: String,
    /// Custom metadata
    pub metadata: Metadata,
}

impl CreatePoolRequest {
    pub fn new(name: impl Into<String>, private_range: impl Into<String>, prefix_len: u8) -> Self {
        Self {
            name: name.into(),
            private_range: private_range.into(),
            prefix_len,
            description: String::new(),
            metadata: Metadata::new(),
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
}

/// Pool changes; ranges are never edited in place
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PoolUpdate {
    pub description: Option<String>,
    pub metadata: Option<Metadata>,
}

impl<S: VersionedStore> IpamService<S> {
    /// Create a pool holding the first free `/prefix_len` block of
    /// `private_range` not covered by any existing pool
    pub async fn create_pool(&self, request: CreatePoolRequest) -> Result<PoolDefinition> {
        let request = &request;
        with_retry(&self.config.retry, |_| self.try_create_pool(request)).await
    }

    async fn try_create_pool(&self, request: &CreatePoolRequest) -> Result<PoolDefinition> {
        let Snapshot {
            value: mut catalog,
            version,
        } = self.load_catalog().await?;

        if catalog.contains(&request.name) {
            return Err(Error::already_exists(EntityKind::Pool, &request.name));
        }

        let private = AddressRange::parse(&request.private_range)?;
        let taken: Vec<AddressRange> = catalog.all_ranges().into_iter().map(|(_, r)| r).collect();

        // A pool covering the whole private range leaves nothing to carve
        if taken.iter().any(|r| r.contains(&private)) {
            return Err(Error::NoSpaceAvailable {
                prefix_len: request.prefix_len,
                container: private,
            });
        }

        let existing: Vec<String> = taken.iter().map(ToString::to_string).collect();
        let block = self.allocator.find_next_available(
            &Container::Block(private),
            &existing,
            request.prefix_len,
        )?;

        let pool = PoolDefinition::new([block.to_string()])
            .with_description(request.description.clone())
            .with_metadata(request.metadata.clone());
        catalog.add_pool(request.name.clone(), pool.clone());

        let message = format!("ipam: create pool {} ({block})", request.name);
        self.save_catalog(&catalog, version.as_deref(), &message).await?;

        tracing::info!(pool_id = %request.name, cidr = %block, "Created pool");
        Ok(pool)
    }

    /// Register a pool with explicit ranges
    pub async fn define_pool(&self, id: &str, pool: PoolDefinition) -> Result<PoolDefinition> {
        let pool = &pool;
        with_retry(&self.config.retry, |_| self.try_define_pool(id, pool)).await
    }

    async fn try_define_pool(&self, id: &str, pool: &PoolDefinition) -> Result<PoolDefinition> {
        let Snapshot {
            value: mut catalog,
            version,
        } = self.load_catalog().await?;

        if catalog.contains(id) {
            return Err(Error::already_exists(EntityKind::Pool, id));
        }
        catalog.add_pool(id, pool.clone());

        let message = format!("ipam: create pool {id} ({})", pool.cidr.join(", "));
        self.save_catalog(&catalog, version.as_deref(), &message).await?;

        tracing::info!(pool_id = %id, ranges = pool.cidr.len(), "Defined pool");
        Ok(pool.clone())
    }

    pub async fn get_pool(&self, id: &str) -> Result<PoolDefinition> {
        let catalog = self.load_catalog().await?.value;
        catalog
            .get_pool(id)
            .cloned()
            .ok_or_else(|| Error::not_found(EntityKind::Pool, id))
    }

    /// Every pool, ordered by id
    pub async fn list_pools(&self) -> Result<Vec<(String, PoolDefinition)>> {
        let catalog = self.load_catalog().await?.value;
        Ok(catalog
            .iter()
            .map(|(id, pool)| (id.to_string(), pool.clone()))
            .collect())
    }

    /// Change description or metadata of a pool
    pub async fn update_pool(&self, id: &str, update: PoolUpdate) -> Result<PoolDefinition> {
        let update = &update;
        with_retry(&self.config.retry, |_| self.try_update_pool(id, update)).await
    }

    async fn try_update_pool(&self, id: &str, update: &PoolUpdate) -> Result<PoolDefinition> {
        let Snapshot {
            value: mut catalog,
            version,
        } = self.load_catalog().await?;

        let pool = catalog
            .get_pool_mut(id)
            .ok_or_else(|| Error::not_found(EntityKind::Pool, id))?;
        if let Some(description) = &update.description {
            pool.description = description.clone();
        }
        if let Some(metadata) = &update.metadata {
            pool.metadata = metadata.clone();
        }
        let updated = pool.clone();

        self.save_catalog(&catalog, version.as_deref(), &format!("ipam: update pool {id}"))
            .await?;

        tracing::info!(pool_id = %id, "Updated pool");
        Ok(updated)
    }

    /// Remove a pool.
    ///
    /// Returns `false` if it was already gone. Fails with `HasDependents`
    /// while the ledger still records allocations in it.
    pub async fn delete_pool(&self, id: &str) -> Result<bool> {
        with_retry(&self.config.retry, |_| self.try_delete_pool(id)).await
    }

    async fn try_delete_pool(&self, id: &str) -> Result<bool> {
        let Snapshot {
            value: mut catalog,
            version,
        } = self.load_catalog().await?;

        if !catalog.contains(id) {
            tracing::debug!(pool_id = %id, "Pool already deleted");
            return Ok(false);
        }

        let ledger = self.load_ledger().await?.value;
        let count = ledger.allocations_for_pool(id).len();
        if count > 0 {
            return Err(Error::HasDependents {
                key: id.to_string(),
                count,
            });
        }

        catalog.remove_pool(id)?;
        self.save_catalog(&catalog, version.as_deref(), &format!("ipam: delete pool {id}"))
            .await?;

        tracing::info!(pool_id = %id, "Deleted pool");
        Ok(true)
    }
}
