//! Transactions and entity handles for burrow stores.
//!
//! A [`Transaction`] owns a table of path locks over the subtree at its root. Each operation
//! requests a small lock set:
//!
//! - reads take a node-read lock on the target,
//! - writes take node-write locks on every ancestor between the transaction root and the
//!   target, plus one on the target itself,
//! - recursive removal and nested transactions take a subtree-write lock.
//!
//! Ancestor locks are released one by one as the storage backend materializes each ancestor,
//! so deep writes don't hold shallow paths longer than needed.
//!
//! [`Entity`] is the handle most callers use: a path plus the transaction it is reached through.

mod entity;
mod error;
mod held;
mod lock;
mod payload;
mod transaction;

pub use entity::Entity;
pub use error::TxError;
pub use held::{Held, KidIter};
pub use lock::{Lock, LockKind};
pub use payload::Payload;
pub use transaction::{Transaction, DEFAULT_KID_BUFFER};
