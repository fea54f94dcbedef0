//! Burrow storage backends.
//!
//! This layer translates path-level operations into filesystem operations. It owns the
//! leaf/node duality of the on-disk layout:
//!
//! - a **leaf** is a plain file holding a payload,
//! - a **node** is a directory; its own payload (if any) lives in the reserved `~` child,
//! - an **absent** path has neither.
//!
//! A leaf becomes a node transparently (see [`StorageBackend::promote_leaf_to_node`]) whenever
//! something is written beneath it, without a reader ever observing the payload as missing.
//!
//! Nothing here serializes concurrent access; that is the job of the transaction layer, which
//! hands lineage locks down so ancestors can be released as soon as they are materialized.

mod backend;
mod config;
mod data;
mod disk;
mod error;
pub mod fs;
mod kids;
pub mod retry;
mod signal;
mod stream;

pub use backend::{
    is_reserved_component, EntityType, LineageLock, StorageBackend, DEFAULT_DATA_COMPONENT,
};
pub use config::DiskConfig;
pub use data::{Data, Encoding};
pub use disk::DiskBackend;
pub use error::StoreError;
pub use fs::{FsError, FsErrorKind};
pub use kids::ChildIter;
pub use retry::RetryPolicy;
pub use signal::{completion, Completer, Completion, LockSignal};
pub use stream::{HeadStream, TailStream};

pub use bytes::Bytes;
