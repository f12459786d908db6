//! Versioned document store
//!
//! The catalog and ledger live as whole documents in a store that hands out
//! an opaque version tag with every read. A write names the version it was
//! computed from and is refused with [`Error::Conflict`] if another writer
//! got there first; callers then reload and recompute.

use crate::error::EntityKind;
use crate::{Error, Result};
use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};

/// Opaque version identifier handed out by a store
pub type VersionTag = String;

/// A document together with the version it was read at
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Versioned {
    pub bytes: Vec<u8>,
    pub version: VersionTag,
}

/// Document storage with optimistic concurrency
#[async_trait]
pub trait VersionedStore: Send + Sync {
    /// Read a document; `NotFound` if it has never been written
    async fn get(&self, path: &str) -> Result<Versioned>;

    /// Write a document.
    ///
    /// `expected` is the version the write was computed from, or `None` to
    /// create a document that must not exist yet. Any mismatch fails with
    /// `Conflict` and leaves the stored document untouched.
    async fn put(
        &self,
        path: &str,
        bytes: Vec<u8>,
        expected: Option<&str>,
        message: &str,
    ) -> Result<VersionTag>;
}

/// A committed write, kept for inspection
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Commit {
    pub path: String,
    pub version: VersionTag,
    pub message: String,
}

/// In-process store for tests and embedding
#[derive(Debug, Default)]
pub struct InMemoryStore {
    documents: RwLock<HashMap<String, Versioned>>,
    history: RwLock<Vec<Commit>>,
    next_version: AtomicU64,
    pending_conflicts: AtomicU32,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a document without going through the version check
    pub fn insert(&self, path: impl Into<String>, bytes: impl Into<Vec<u8>>) -> VersionTag {
        let version = self.bump();
        self.documents.write().insert(
            path.into(),
            Versioned {
                bytes: bytes.into(),
                version: version.clone(),
            },
        );
        version
    }

    /// Fail the next `count` writes with `Conflict`, as if another writer
    /// had committed in between
    pub fn inject_conflicts(&self, count: u32) {
        self.pending_conflicts.store(count, Ordering::SeqCst);
    }

    /// Current text of a document, if any
    pub fn read_string(&self, path: &str) -> Option<String> {
        self.documents
            .read()
            .get(path)
            .map(|doc| String::from_utf8_lossy(&doc.bytes).into_owned())
    }

    /// Every committed write, oldest first
    pub fn history(&self) -> Vec<Commit> {
        self.history.read().clone()
    }

    fn bump(&self) -> VersionTag {
        let n = self.next_version.fetch_add(1, Ordering::SeqCst) + 1;
        format!("{n:016x}")
    }

    fn take_injected_conflict(&self) -> bool {
        self.pending_conflicts
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
    }
}

#[async_trait]
impl VersionedStore for InMemoryStore {
    async fn get(&self, path: &str) -> Result<Versioned> {
        self.documents
            .read()
            .get(path)
            .cloned()
            .ok_or_else(|| Error::not_found(EntityKind::Document, path))
    }

    async fn put(
        &self,
        path: &str,
        bytes: Vec<u8>,
        expected: Option<&str>,
        message: &str,
    ) -> Result<VersionTag> {
        if self.take_injected_conflict() {
            return Err(Error::Conflict {
                path: path.to_string(),
            });
        }

        let mut documents = self.documents.write();
        let current = documents.get(path).map(|doc| doc.version.as_str());
        if current != expected {
            return Err(Error::Conflict {
                path: path.to_string(),
            });
        }

        let version = self.bump();
        documents.insert(
            path.to_string(),
            Versioned {
                bytes,
                version: version.clone(),
            },
        );
        drop(documents);

        self.history.write().push(Commit {
            path: path.to_string(),
            version: version.clone(),
            message: message.to_string(),
        });
        Ok(version)
    }
}
