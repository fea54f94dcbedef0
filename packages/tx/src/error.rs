//! Errors surfaced by transactions and entity handles.

use burrow_disk_store::StoreError;
use burrow_path::{Fp, PathError};

#[derive(thiserror::Error, Debug)]
pub enum TxError {
    #[error(transparent)]
    Path(#[from] PathError),

    #[error("{path} is not contained within the transaction at {root}")]
    OutsideTransaction { root: Fp, path: Fp },

    #[error("{path} contains reserved component {component:?}")]
    ReservedComponent { path: Fp, component: String },

    /// `par()` was called on an entity sitting at its transaction's root.
    #[error("parent of {path} is outside the transaction")]
    NoParent { path: Fp },

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("failed to serialize payload for {path}")]
    Serialize {
        path: Fp,
        #[source]
        source: serde_json::Error,
    },

    #[error("failed locked op: \"{op}\"")]
    LockedOperationFailed {
        op: &'static str,
        #[source]
        source: Box<TxError>,
    },

    #[error("inactive transaction")]
    InactiveTransaction,

    /// A background task holding locks for a stream, iterator or kid transaction went away
    /// without reporting.
    #[error("locked task was detached before it finished")]
    Detached,
}

impl TxError {
    /// The error beneath any number of [`TxError::LockedOperationFailed`] wrappers.
    pub fn innermost(&self) -> &TxError {
        match self {
            TxError::LockedOperationFailed { source, .. } => source.innermost(),
            other => other,
        }
    }

    /// The storage failure behind this error, if that's what it is.
    pub fn store_error(&self) -> Option<&StoreError> {
        match self.innermost() {
            TxError::Store(err) => Some(err),
            _ => None,
        }
    }

    /// True for the errors raised when a path is illegal, reserved, or outside the
    /// transaction.
    pub fn is_invalid_path(&self) -> bool {
        matches!(
            self.innermost(),
            TxError::Path(_)
                | TxError::OutsideTransaction { .. }
                | TxError::ReservedComponent { .. }
                | TxError::NoParent { .. }
                | TxError::Store(StoreError::Path(_))
        )
    }
}
