//! The storage capability the transaction layer drives.

use async_trait::async_trait;
use bytes::Bytes;
use burrow_path::Fp;

use crate::{ChildIter, Completion, Data, Encoding, HeadStream, LockSignal, StoreError, TailStream};

/// Name of the reserved child holding a node's own payload.
pub const DEFAULT_DATA_COMPONENT: &str = "~";

/// Components starting with `~` belong to the storage layer: the default payload and the
/// temporaries used while promoting leaves. They are never addressable or listed.
pub fn is_reserved_component(component: &str) -> bool {
    component.starts_with('~')
}

/// What a path resolves to at a given instant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntityType {
    Absent,
    /// Holds a payload directly.
    Leaf,
    /// A container, optionally holding its own default payload.
    Node,
}

/// An ancestor that must exist as a node before a write can proceed, paired with the signal
/// releasing its lock once it does.
#[derive(Debug, Clone)]
pub struct LineageLock {
    pub fp: Fp,
    pub signal: LockSignal,
}

impl LineageLock {
    pub fn new(fp: Fp, signal: LockSignal) -> Self {
        Self { fp, signal }
    }
}

pub(crate) fn release_all(lineage: &[LineageLock]) {
    for lock in lineage {
        lock.signal.fire();
    }
}

/// Path-addressed storage.
///
/// Implementations perform no locking of their own; callers guarantee that conflicting
/// operations are never in flight together.
///
/// # Object Safety
///
/// This trait is object-safe: the transaction layer holds an `Arc<dyn StorageBackend>`.
#[async_trait]
pub trait StorageBackend: Send + Sync {
    /// Classify `fp` as absent, leaf or node.
    async fn entity_type(&self, fp: &Fp) -> Result<EntityType, StoreError>;

    /// Byte length of the payload at `fp`; 0 when there is none.
    async fn data_bytes(&self, fp: &Fp) -> Result<u64, StoreError>;

    /// Turn the leaf at `fp` into a node whose default payload is the leaf's former content.
    ///
    /// At every intermediate step the payload stays reachable.
    async fn promote_leaf_to_node(&self, fp: &Fp) -> Result<(), StoreError>;

    /// Make every path from `starting_from` down to (excluding) `fp` a node.
    async fn ensure_ancestors(&self, fp: &Fp, starting_from: &Fp) -> Result<(), StoreError>;

    /// Materialize each lineage entry as a node, shallowest first, firing each entry's signal
    /// as soon as that entry exists.
    async fn ensure_lineage(&self, lineage: &[LineageLock]) -> Result<(), StoreError>;

    /// Starting at directory `start`, remove directories left empty (an empty default payload
    /// counts as empty), ascending until something non-empty or the store root.
    async fn prune_empty_ancestors(&self, start: &Fp) -> Result<(), StoreError>;

    /// Write `data` as the payload of `fp`.
    ///
    /// Lineage is only materialized when `fp` is absent; otherwise every lineage signal fires
    /// straight away.
    async fn write_data(
        &self,
        lineage: &[LineageLock],
        fp: &Fp,
        data: Bytes,
    ) -> Result<(), StoreError>;

    /// Drop the payload of `fp` (not its children) and prune what that leaves empty.
    async fn remove_data(&self, fp: &Fp) -> Result<(), StoreError>;

    /// Raw payload of `fp`; empty when absent.
    async fn read_data(&self, fp: &Fp) -> Result<Bytes, StoreError>;

    /// Payload of `fp` decoded per `encoding`.
    async fn read_data_as(&self, fp: &Fp, encoding: Encoding) -> Result<Data, StoreError> {
        let bytes = self.read_data(fp).await?;
        Data::decode(bytes, encoding, fp)
    }

    /// Remove `fp` and everything beneath it, then prune emptied ancestors.
    async fn remove_subtree(&self, fp: &Fp) -> Result<(), StoreError>;

    /// Names of the children of `fp`; empty for leaves and absent paths.
    async fn list_children(&self, fp: &Fp) -> Result<Vec<String>, StoreError>;

    /// A sink replacing the payload of `fp`. Lineage is handled as in [`write_data`].
    ///
    /// [`write_data`]: StorageBackend::write_data
    async fn head_stream(
        &self,
        lineage: &[LineageLock],
        fp: &Fp,
    ) -> Result<(HeadStream, Completion), StoreError>;

    /// A source over the current payload of `fp`; empty when there is none.
    async fn tail_stream(&self, fp: &Fp) -> Result<(TailStream, Completion), StoreError>;

    /// Lazily list the children of `fp`, buffering at most `buffer` names ahead.
    async fn child_iter(
        &self,
        fp: &Fp,
        buffer: usize,
    ) -> Result<(ChildIter, Completion), StoreError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reserved_components() {
        assert!(is_reserved_component(DEFAULT_DATA_COMPONENT));
        assert!(is_reserved_component("~a1b2c3d"));
        assert!(!is_reserved_component("a~"));
        assert!(!is_reserved_component("data"));
    }
}
