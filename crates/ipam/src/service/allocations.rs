//! Allocation lifecycle

use super::{IpamService, Snapshot};
use crate::address::AddressRange;
use crate::allocator::{BlockAllocator, Container};
use crate::catalog::PoolCatalog;
use crate::error::EntityKind;
use crate::ledger::{AllocationUpdate, Ledger};
use crate::models::{Allocation, AllocationStatus, Metadata};
use crate::retry::with_retry;
use crate::store::VersionedStore;
use crate::{Error, Result};
use uuid::Uuid;

/// Where a new block is carved from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AllocationTarget {
    /// Directly from a pool, optionally adjacent to an anchor block
    Pool {
        pool_id: String,
        contiguous_with: Option<String>,
    },
    /// From inside an existing allocation
    Parent { parent_cidr: String },
}

impl AllocationTarget {
    pub fn pool(pool_id: impl Into<String>) -> Self {
        AllocationTarget::Pool {
            pool_id: pool_id.into(),
            contiguous_with: None,
        }
    }

    pub fn parent(parent_cidr: impl Into<String>) -> Self {
        AllocationTarget::Parent {
            parent_cidr: parent_cidr.into(),
        }
    }
}

/// Request to create a new allocation
#[derive(Debug, Clone)]
pub struct CreateAllocationRequest {
    /// Unique allocation name
    pub name: String,
    /// Pool or parent block to carve from
    pub target: AllocationTarget,
    /// Requested prefix length
    pub prefix_len: u8,
    /// Allocation or reservation
    pub status: AllocationStatus,
    /// Custom metadata
    pub metadata: Metadata,
}

impl CreateAllocationRequest {
    pub fn new(name: impl Into<String>, target: AllocationTarget, prefix_len: u8) -> Self {
        Self {
            name: name.into(),
            target,
            prefix_len,
            status: AllocationStatus::Allocation,
            metadata: Metadata::new(),
        }
    }

    pub fn with_status(mut self, status: AllocationStatus) -> Self {
        self.status = status;
        self
    }

    pub fn with_metadata(mut self, metadata: Metadata) -> Self {
        self.metadata = metadata;
        self
    }

    /// Deterministic id derived from target, name and prefix length.
    ///
    /// Replaying the same request yields the same id, which is how a retried
    /// create recognizes that it already succeeded.
    pub fn allocation_id(&self) -> String {
        let input = match &self.target {
            AllocationTarget::Pool { pool_id, .. } => {
                format!("pool:{pool_id}:name:{}:mask:{}", self.name, self.prefix_len)
            }
            AllocationTarget::Parent { parent_cidr } => {
                format!("parent:{parent_cidr}:name:{}:mask:{}", self.name, self.prefix_len)
            }
        };
        Uuid::new_v5(&Uuid::NAMESPACE_DNS, input.as_bytes()).to_string()
    }
}

/// An existing allocation with the request fields reconstructed from it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportedAllocation {
    pub allocation: Allocation,
    pub pool_id: String,
    pub prefix_len: u8,
    pub target: AllocationTarget,
}

/// A planned block and where it will be recorded
struct Planned {
    block: AddressRange,
    pool_id: String,
    parent_cidr: Option<String>,
}

impl<S: VersionedStore> IpamService<S> {
    /// Allocate (or reserve) a new block.
    ///
    /// Idempotent: if an allocation with the request's id already exists it
    /// is returned unchanged.
    pub async fn create_allocation(&self, request: CreateAllocationRequest) -> Result<Allocation> {
        let request = &request;
        with_retry(&self.config.retry, |_| self.try_create_allocation(request)).await
    }

    async fn try_create_allocation(&self, request: &CreateAllocationRequest) -> Result<Allocation> {
        let id = request.allocation_id();
        let catalog = self.load_catalog().await?.value;
        let Snapshot {
            value: mut ledger,
            version,
        } = self.load_ledger().await?;

        if let Some((existing, _)) = ledger.find_by_id(&id) {
            tracing::debug!(
                allocation_id = %id,
                cidr = %existing.cidr,
                "Allocation already exists"
            );
            return Ok(existing.clone());
        }

        if ledger.find_by_name(&request.name).is_some() {
            return Err(Error::already_exists(EntityKind::Allocation, &request.name));
        }

        let planned = self.plan_block(&catalog, &ledger, &request.target, request.prefix_len, true)?;
        tracing::debug!(
            pool_id = %planned.pool_id,
            cidr = %planned.block,
            "Planned block"
        );

        let mut allocation = Allocation::new(id, planned.block.to_string(), request.name.clone())
            .with_status(request.status)
            .with_metadata(request.metadata.clone());
        if let Some(parent) = planned.parent_cidr {
            allocation = allocation.with_parent(parent);
        }
        if let AllocationTarget::Pool {
            contiguous_with: Some(anchor),
            ..
        } = &request.target
        {
            allocation = allocation.with_contiguous_with(anchor.clone());
        }

        let created = ledger.add(planned.pool_id.clone(), allocation).clone();
        let action = if created.reserved { "reserve" } else { "allocate" };
        let message = format!("ipam: {action} {} ({})", created.cidr, created.name);
        self.save_ledger(&ledger, version.as_deref(), &message).await?;

        tracing::info!(
            allocation_id = %created.id,
            cidr = %created.cidr,
            pool_id = %planned.pool_id,
            status = %created.status(),
            "Created allocation"
        );
        Ok(created)
    }

    /// Choose a block for `target` against the given snapshots.
    ///
    /// With `for_create` set, reserved pools and reserved parents are
    /// refused and the result is checked against its siblings.
    fn plan_block(
        &self,
        catalog: &PoolCatalog,
        ledger: &Ledger,
        target: &AllocationTarget,
        prefix_len: u8,
        for_create: bool,
    ) -> Result<Planned> {
        match target {
            AllocationTarget::Pool {
                pool_id,
                contiguous_with,
            } => {
                let pool = catalog
                    .get_pool(pool_id)
                    .ok_or_else(|| Error::not_found(EntityKind::Pool, pool_id))?;
                if for_create && pool.reserved {
                    return Err(Error::PoolReserved(pool_id.clone()));
                }

                let container = Container::from_pool(pool)?;
                let existing = ledger.allocations_for_pool(pool_id);
                let block = match contiguous_with {
                    Some(anchor) => {
                        let anchor = AddressRange::parse(anchor)?;
                        self.allocator
                            .find_contiguous(&container, existing, prefix_len, &anchor)?
                    }
                    None => self
                        .allocator
                        .find_next_available(&container, existing, prefix_len)?,
                };
                if for_create {
                    self.allocator.validate_no_overlap(existing, &block)?;
                }

                Ok(Planned {
                    block,
                    pool_id: pool_id.clone(),
                    parent_cidr: None,
                })
            }
            AllocationTarget::Parent { parent_cidr } => {
                let (parent, pool_id) = if for_create {
                    ledger.resolve_parent(parent_cidr)?
                } else {
                    ledger
                        .find_by_cidr(parent_cidr)
                        .ok_or_else(|| Error::not_found(EntityKind::Parent, parent_cidr))?
                };

                let container = Container::Block(parent.range()?);
                let children = ledger.allocations_for_parent(&parent.cidr);
                let block = self
                    .allocator
                    .find_next_available(&container, &children, prefix_len)?;
                if for_create {
                    self.allocator.validate_no_overlap(&children, &block)?;
                }

                Ok(Planned {
                    block,
                    pool_id: pool_id.to_string(),
                    parent_cidr: Some(parent.cidr.clone()),
                })
            }
        }
    }

    /// Look up an allocation by id
    pub async fn get_allocation(&self, id: &str) -> Result<Allocation> {
        let ledger = self.load_ledger().await?.value;
        ledger
            .find_by_id(id)
            .map(|(allocation, _)| allocation.clone())
            .ok_or_else(|| Error::not_found(EntityKind::Allocation, id))
    }

    /// All allocations recorded under a pool, sub-allocations included
    pub async fn list_pool_allocations(&self, pool_id: &str) -> Result<Vec<Allocation>> {
        let ledger = self.load_ledger().await?.value;
        Ok(ledger.allocations_for_pool(pool_id).to_vec())
    }

    /// Direct children of a parent block
    pub async fn list_child_allocations(&self, parent_cidr: &str) -> Result<Vec<Allocation>> {
        let ledger = self.load_ledger().await?.value;
        Ok(ledger
            .allocations_for_parent(parent_cidr)
            .into_iter()
            .cloned()
            .collect())
    }

    /// Change name, metadata or status; the block itself never moves
    pub async fn update_allocation(&self, id: &str, update: AllocationUpdate) -> Result<Allocation> {
        let update = &update;
        with_retry(&self.config.retry, |_| self.try_update_allocation(id, update)).await
    }

    async fn try_update_allocation(&self, id: &str, update: &AllocationUpdate) -> Result<Allocation> {
        let Snapshot {
            value: mut ledger,
            version,
        } = self.load_ledger().await?;

        let updated = ledger.update(id, update.clone())?.clone();
        let action = if updated.reserved {
            "update reservation"
        } else {
            "update"
        };
        let message = format!("ipam: {action} {} ({})", updated.cidr, updated.name);
        self.save_ledger(&ledger, version.as_deref(), &message).await?;

        tracing::info!(
            allocation_id = %updated.id,
            cidr = %updated.cidr,
            status = %updated.status(),
            "Updated allocation"
        );
        Ok(updated)
    }

    /// Release an allocation.
    ///
    /// Returns `false` if it was already gone. Fails with `HasDependents`
    /// while sub-allocations exist inside it.
    pub async fn delete_allocation(&self, id: &str) -> Result<bool> {
        with_retry(&self.config.retry, |_| self.try_delete_allocation(id)).await
    }

    async fn try_delete_allocation(&self, id: &str) -> Result<bool> {
        let Snapshot {
            value: mut ledger,
            version,
        } = self.load_ledger().await?;

        let Some((allocation, pool_id)) = ledger.find_by_id(id) else {
            tracing::debug!(allocation_id = %id, "Allocation already deleted");
            return Ok(false);
        };
        let (allocation, pool_id) = (allocation.clone(), pool_id.to_string());

        let children = ledger.allocations_for_parent(&allocation.cidr).len();
        if children > 0 {
            return Err(Error::HasDependents {
                key: allocation.cidr,
                count: children,
            });
        }

        ledger.remove(&pool_id, id)?;
        let message = format!("ipam: deallocate {} ({})", allocation.cidr, allocation.name);
        self.save_ledger(&ledger, version.as_deref(), &message).await?;

        tracing::info!(allocation_id = %id, cidr = %allocation.cidr, "Deleted allocation");
        Ok(true)
    }

    /// Adopt an existing allocation, reconstructing how it was requested
    pub async fn import_allocation(&self, id: &str) -> Result<ImportedAllocation> {
        let ledger = self.load_ledger().await?.value;
        let (allocation, pool_id) = ledger
            .find_by_id(id)
            .ok_or_else(|| Error::not_found(EntityKind::Allocation, id))?;

        let prefix_len = allocation.prefix_len()?;
        let target = match &allocation.parent_cidr {
            Some(parent) => AllocationTarget::parent(parent.clone()),
            None => AllocationTarget::Pool {
                pool_id: pool_id.to_string(),
                contiguous_with: allocation.contiguous_with.clone(),
            },
        };

        tracing::info!(
            allocation_id = %id,
            cidr = %allocation.cidr,
            prefix_len,
            "Imported allocation"
        );
        Ok(ImportedAllocation {
            allocation: allocation.clone(),
            pool_id: pool_id.to_string(),
            prefix_len,
            target,
        })
    }

    /// Block a create would currently receive, without recording anything
    pub async fn next_available(&self, target: &AllocationTarget, prefix_len: u8) -> Result<AddressRange> {
        let catalog = self.load_catalog().await?.value;
        let ledger = self.load_ledger().await?.value;
        Ok(self
            .plan_block(&catalog, &ledger, target, prefix_len, false)?
            .block)
    }

    /// Free addresses left in a pool or parent block
    pub async fn capacity(&self, target: &AllocationTarget) -> Result<u128> {
        let ledger = self.load_ledger().await?.value;
        match target {
            AllocationTarget::Pool { pool_id, .. } => {
                let catalog = self.load_catalog().await?.value;
                let pool = catalog
                    .get_pool(pool_id)
                    .ok_or_else(|| Error::not_found(EntityKind::Pool, pool_id))?;
                let container = Container::from_pool(pool)?;
                let top_level = ledger.top_level_allocations(pool_id);
                Ok(self.allocator.available_capacity(&container, &top_level))
            }
            AllocationTarget::Parent { parent_cidr } => {
                let (parent, _) = ledger
                    .find_by_cidr(parent_cidr)
                    .ok_or_else(|| Error::not_found(EntityKind::Parent, parent_cidr))?;
                let container = Container::Block(parent.range()?);
                let children = ledger.allocations_for_parent(&parent.cidr);
                Ok(self.allocator.available_capacity(&container, &children))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_allocation_id_is_deterministic() {
        let a = CreateAllocationRequest::new("web", AllocationTarget::pool("prod"), 24);
        let b = CreateAllocationRequest::new("web", AllocationTarget::pool("prod"), 24)
            .with_status(AllocationStatus::Reservation);
        assert_eq!(a.allocation_id(), b.allocation_id());
        assert!(Uuid::parse_str(&a.allocation_id()).is_ok());
    }

    #[test]
    fn test_allocation_id_depends_on_inputs() {
        let base = CreateAllocationRequest::new("web", AllocationTarget::pool("prod"), 24);
        let other_mask = CreateAllocationRequest::new("web", AllocationTarget::pool("prod"), 25);
        let other_pool = CreateAllocationRequest::new("web", AllocationTarget::pool("dev"), 24);
        let parent = CreateAllocationRequest::new("web", AllocationTarget::parent("10.0.0.0/16"), 24);

        assert_ne!(base.allocation_id(), other_mask.allocation_id());
        assert_ne!(base.allocation_id(), other_pool.allocation_id());
        assert_ne!(base.allocation_id(), parent.allocation_id());
    }

    #[test]
    fn test_allocation_id_matches_known_value() {
        let request = CreateAllocationRequest::new("web", AllocationTarget::pool("prod"), 24);
        let expected = Uuid::new_v5(&Uuid::NAMESPACE_DNS, b"pool:prod:name:web:mask:24");
        assert_eq!(request.allocation_id(), expected.to_string());
    }
}
