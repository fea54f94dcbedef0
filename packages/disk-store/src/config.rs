//! Configuration for the filesystem-backed store.

use std::path::PathBuf;

use crate::retry::RetryPolicy;

/// Configuration for a [`DiskBackend`](crate::DiskBackend).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiskConfig {
    /// Directory holding the store; the root path `file://` maps here.
    pub root: PathBuf,

    /// Retry policy for deletions that race with concurrent writers.
    pub retry: RetryPolicy,
}

impl DiskConfig {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            retry: RetryPolicy::default(),
        }
    }

    #[must_use]
    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn defaults_and_overrides() {
        let config = DiskConfig::new("/srv/burrow");
        assert_eq!(config.root, PathBuf::from("/srv/burrow"));
        assert_eq!(config.retry, RetryPolicy::default());

        let config = config.with_retry(RetryPolicy::new(2, Duration::from_millis(5)));
        assert_eq!(config.retry.attempts, 2);
    }
}
