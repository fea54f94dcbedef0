//! Burrow: a hierarchical key-value store kept in an ordinary directory tree.
//!
//! Every key is a path ([`Fp`]). A path holding data and nothing beneath it is a plain file;
//! once something is written beneath it, it becomes a directory and keeps its own data in a
//! reserved child. Readers never see that switch.
//!
//! All access goes through a [`Transaction`], which serializes operations whose paths collide
//! and lets everything else run concurrently. Most code works with [`Entity`] handles:
//!
//! ```rust,no_run
//! # async fn demo() -> Result<(), burrow::TxError> {
//! use burrow::{DiskConfig, Encoding};
//!
//! let tx = burrow::open_disk(DiskConfig::new("/var/lib/app/store")).await?;
//! let users = tx.entity().kid("users")?;
//!
//! users.kid("ada")?.set_data(serde_json::json!({ "born": 1815 })).await?;
//! let ada = users.kid("ada")?.get_data(Encoding::Json).await?;
//!
//! for (name, user) in users.get_kids().await? {
//!     println!("{name}: {} bytes", user.get_data_bytes().await?);
//! }
//! # let _ = ada;
//! tx.end().await;
//! # Ok(())
//! # }
//! ```

use std::sync::Arc;

pub use burrow_disk_store::{
    Bytes, ChildIter, Data, DiskBackend, DiskConfig, Encoding, EntityType, FsError, FsErrorKind,
    HeadStream, RetryPolicy, StorageBackend, StoreError, TailStream,
};
pub use burrow_path::{fp, Fp, PathError};
pub use burrow_tx::{
    Entity, Held, KidIter, Lock, LockKind, Payload, Transaction, TxError, DEFAULT_KID_BUFFER,
};

/// Open (creating if needed) a store on the local disk and return its root transaction.
pub async fn open_disk(config: DiskConfig) -> Result<Transaction, TxError> {
    let backend = DiskBackend::open(config).await?;
    tracing::debug!(root = %backend.root().display(), "root transaction ready");
    Ok(Transaction::new(Arc::new(backend), Fp::root()))
}
