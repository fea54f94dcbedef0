//! Error types for the storage layer.

use std::io;
use std::path::PathBuf;

use burrow_path::{Fp, PathError};

use crate::fs::FsError;
use crate::retry::RetryError;

/// Errors raised by a [`StorageBackend`](crate::StorageBackend).
#[derive(thiserror::Error, Debug)]
pub enum StoreError {
    #[error(transparent)]
    Fs(#[from] FsError),

    #[error(transparent)]
    Path(#[from] PathError),

    /// The filesystem holds something that is neither a file nor a directory.
    #[error("unexpected filesystem entity at \"{}\"", .path.display())]
    UnexpectedEntityKind { path: PathBuf },

    /// Structured decoding was requested for bytes that don't parse.
    #[error("payload at {path} is not structured data")]
    NonStructuredPayload {
        path: Fp,
        #[source]
        source: serde_json::Error,
    },

    /// A retryable condition outlasted every retry.
    #[error("transient failure persisted after {attempts} attempts")]
    TransientIo {
        attempts: u32,
        #[source]
        source: FsError,
    },

    /// The stream was cut short, most likely by the consumer going away mid-transfer.
    #[error("broken stream at {path}")]
    BrokenStream {
        path: Fp,
        #[source]
        source: io::Error,
    },

    #[error("stream {op} failed at {path}")]
    Stream {
        op: &'static str,
        path: Fp,
        #[source]
        source: io::Error,
    },

    /// Lineage locks were not ordered shallowest-first along a single branch.
    #[error("invalid lineage: {path} is not within {ancestor}")]
    InvalidLineage { ancestor: Fp, path: Fp },
}

impl StoreError {
    /// Classify an I/O failure on a live stream.
    pub(crate) fn from_stream(op: &'static str, path: &Fp, source: io::Error) -> StoreError {
        match source.kind() {
            io::ErrorKind::BrokenPipe
            | io::ErrorKind::ConnectionReset
            | io::ErrorKind::ConnectionAborted
            | io::ErrorKind::UnexpectedEof => StoreError::BrokenStream {
                path: path.clone(),
                source,
            },
            _ => StoreError::Stream {
                op,
                path: path.clone(),
                source,
            },
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, StoreError::Fs(e) if e.is_not_found())
    }
}

impl From<RetryError<FsError>> for StoreError {
    fn from(err: RetryError<FsError>) -> Self {
        match err {
            RetryError::Exhausted { attempts, last } => StoreError::TransientIo {
                attempts,
                source: last,
            },
            RetryError::Failed(e) => StoreError::Fs(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use burrow_path::fp;
    use std::error::Error as _;

    fn fs_error(kind: io::ErrorKind) -> FsError {
        FsError {
            op: "rmdir",
            path: PathBuf::from("/tmp/x"),
            source: io::Error::new(kind, "boom"),
        }
    }

    #[test]
    fn retry_errors_convert() {
        let err: StoreError = RetryError::Exhausted {
            attempts: 5,
            last: fs_error(io::ErrorKind::PermissionDenied),
        }
        .into();
        assert!(matches!(err, StoreError::TransientIo { attempts: 5, .. }));
        assert!(err.source().is_some());

        let err: StoreError = RetryError::Failed(fs_error(io::ErrorKind::NotFound)).into();
        assert!(err.is_not_found());
    }

    #[test]
    fn stream_errors_classified() {
        let path = fp!("a");
        let broken = StoreError::from_stream(
            "read",
            &path,
            io::Error::new(io::ErrorKind::BrokenPipe, "gone"),
        );
        assert!(matches!(broken, StoreError::BrokenStream { .. }));

        let other =
            StoreError::from_stream("read", &path, io::Error::other("disk on fire"));
        assert!(matches!(other, StoreError::Stream { op: "read", .. }));
        assert!(other.to_string().contains("file://a"));
    }
}
