//! The filesystem-backed [`StorageBackend`].

use std::future::Future;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use bytes::Bytes;
use burrow_path::Fp;
use tracing::{debug, trace};

use crate::backend::release_all;
use crate::fs::{self, FsError, FsErrorKind};
use crate::retry::{retry, Attempt, RetryPolicy};
use crate::{
    ChildIter, Completion, DiskConfig, EntityType, HeadStream, LineageLock, StorageBackend,
    StoreError, TailStream, DEFAULT_DATA_COMPONENT,
};

/// A store rooted at a directory on the local disk.
///
/// Leaves are files, nodes are directories, and a node's own payload is its `~` file.
#[derive(Debug, Clone)]
pub struct DiskBackend {
    root: PathBuf,
    config: DiskConfig,
}

impl DiskBackend {
    /// Open a store at `config.root`, creating the directory if needed.
    pub async fn open(config: DiskConfig) -> Result<Self, StoreError> {
        fs::mkdir_all(&config.root).await?;
        let root = fs::canonicalize(&config.root).await?;
        if !fs::stat(&root).await?.is_dir() {
            return Err(StoreError::UnexpectedEntityKind { path: root });
        }
        debug!(root = %root.display(), "opened disk store");
        Ok(Self { root, config })
    }

    /// The canonical directory backing the store root.
    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn config(&self) -> &DiskConfig {
        &self.config
    }

    fn fs_path(&self, fp: &Fp) -> PathBuf {
        fp.to_fs_path(&self.root)
    }

    fn tmp_component() -> String {
        format!("~{:08x}", rand::random::<u32>())
    }

    /// Where the payload of `fp` lives given its current type.
    fn payload_path(&self, fp: &Fp, ty: EntityType) -> PathBuf {
        match ty {
            EntityType::Node => self.fs_path(fp).join(DEFAULT_DATA_COMPONENT),
            _ => self.fs_path(fp),
        }
    }

    /// `stat`, treating anything that makes the path unreachable as absence.
    async fn safe_stat(&self, path: &Path) -> Result<Option<std::fs::Metadata>, StoreError> {
        match fs::stat(path).await {
            Ok(meta) => Ok(Some(meta)),
            Err(e) if matches!(e.kind(), FsErrorKind::NotFound | FsErrorKind::NotADirectory) => {
                Ok(None)
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn materialize_node(&self, fp: &Fp) -> Result<(), StoreError> {
        match self.entity_type(fp).await? {
            EntityType::Node => Ok(()),
            EntityType::Leaf => self.promote_leaf_to_node(fp).await,
            EntityType::Absent => {
                let path = self.fs_path(fp);
                let path = path.as_path();
                self.with_ancestors(fp, || async move {
                    match fs::mkdir(path).await {
                        Err(e) if e.kind() == FsErrorKind::AlreadyExists => Ok(()),
                        other => other,
                    }
                })
                .await
            }
        }
    }

    /// Run `op` on a path directly beneath `fp`'s parent.
    ///
    /// Ancestors released by their lineage locks can be pruned by a concurrent removal of an
    /// unrelated sibling. When `op` fails with NotFound the ancestors are rebuilt and `op` is
    /// tried again, up to the retry policy's attempt count.
    async fn with_ancestors<T, F, Fut>(&self, fp: &Fp, mut op: F) -> Result<T, StoreError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, FsError>>,
    {
        let attempts = self.config.retry.attempts.max(1);
        let mut attempt = 1;
        loop {
            match op().await {
                Err(e) if e.is_not_found() && attempt < attempts => {
                    debug!(%fp, attempt, "ancestors vanished, rebuilding");
                    self.ensure_ancestors(fp, &Fp::root()).await?;
                    attempt += 1;
                }
                other => return Ok(other?),
            }
        }
    }

    /// Resolve the file a write to `fp` lands in, creating whatever structure is missing.
    async fn write_target(&self, lineage: &[LineageLock], fp: &Fp) -> Result<PathBuf, StoreError> {
        let ty = self.entity_type(fp).await?;
        if ty != EntityType::Absent {
            release_all(lineage);
            return Ok(self.payload_path(fp, ty));
        }

        if lineage.is_empty() {
            self.ensure_ancestors(fp, &Fp::root()).await?;
        } else {
            self.ensure_lineage(lineage).await?;
        }
        Ok(self.fs_path(fp))
    }

    async fn rmdir_with_retry(&self, path: &Path) -> Result<bool, StoreError> {
        rmdir_retrying(&self.config.retry, path, |path| async move {
            fs::rmdir(&path).await
        })
        .await
    }

    async fn remove_all_with_retry(&self, path: &Path) -> Result<(), StoreError> {
        retry(&self.config.retry, |_| {
            let path = path.to_path_buf();
            async move {
                match fs::remove_all(&path).await {
                    Ok(()) => Ok(()),
                    Err(e) => match e.kind() {
                        FsErrorKind::NotFound => Ok(()),
                        FsErrorKind::PermissionDenied | FsErrorKind::NotEmpty => {
                            Err(Attempt::Retry(e))
                        }
                        _ => Err(Attempt::Fail(e)),
                    },
                }
            }
        })
        .await?;
        Ok(())
    }

    async fn unlink_if_present(&self, path: &Path) -> Result<(), StoreError> {
        match fs::unlink(path).await {
            Err(e) if e.is_not_found() => Ok(()),
            other => Ok(other?),
        }
    }
}

/// `rmdir` that tolerates a missing directory and retries permission errors, which some
/// platforms report while another handle on the directory is closing.
///
/// Returns `false` when the directory is not empty.
async fn rmdir_retrying<F, Fut>(
    policy: &RetryPolicy,
    path: &Path,
    mut rmdir: F,
) -> Result<bool, StoreError>
where
    F: FnMut(PathBuf) -> Fut,
    Fut: Future<Output = Result<(), FsError>>,
{
    let removed = retry(policy, |_| {
        let attempt = rmdir(path.to_path_buf());
        async move {
            match attempt.await {
                Ok(()) => Ok(true),
                Err(e) => match e.kind() {
                    FsErrorKind::NotFound => Ok(true),
                    FsErrorKind::NotEmpty => Ok(false),
                    FsErrorKind::PermissionDenied => Err(Attempt::Retry(e)),
                    _ => Err(Attempt::Fail(e)),
                },
            }
        }
    })
    .await?;
    Ok(removed)
}

#[async_trait]
impl StorageBackend for DiskBackend {
    async fn entity_type(&self, fp: &Fp) -> Result<EntityType, StoreError> {
        let path = self.fs_path(fp);
        match self.safe_stat(&path).await? {
            None => Ok(EntityType::Absent),
            Some(meta) if meta.is_file() => Ok(EntityType::Leaf),
            Some(meta) if meta.is_dir() => Ok(EntityType::Node),
            Some(_) => Err(StoreError::UnexpectedEntityKind { path }),
        }
    }

    async fn data_bytes(&self, fp: &Fp) -> Result<u64, StoreError> {
        let ty = self.entity_type(fp).await?;
        if ty == EntityType::Absent {
            return Ok(0);
        }
        let meta = self.safe_stat(&self.payload_path(fp, ty)).await?;
        Ok(meta.map_or(0, |m| m.len()))
    }

    async fn promote_leaf_to_node(&self, fp: &Fp) -> Result<(), StoreError> {
        let path = self.fs_path(fp);
        let tmp = self.fs_path(&fp.parent()).join(Self::tmp_component());
        debug!(%fp, "promoting leaf to node");

        fs::rename(&path, &tmp).await?;
        fs::mkdir(&path).await?;
        fs::rename(&tmp, &path.join(DEFAULT_DATA_COMPONENT)).await?;
        Ok(())
    }

    async fn ensure_ancestors(&self, fp: &Fp, starting_from: &Fp) -> Result<(), StoreError> {
        if !starting_from.contains(fp) {
            return Err(StoreError::InvalidLineage {
                ancestor: starting_from.clone(),
                path: fp.clone(),
            });
        }
        for ancestor in starting_from.lineage(fp)? {
            self.materialize_node(&ancestor).await?;
        }
        Ok(())
    }

    async fn ensure_lineage(&self, lineage: &[LineageLock]) -> Result<(), StoreError> {
        let Some(first) = lineage.first() else {
            return Ok(());
        };

        for pair in lineage.windows(2) {
            if !pair[0].fp.contains(&pair[1].fp) {
                return Err(StoreError::InvalidLineage {
                    ancestor: pair[0].fp.clone(),
                    path: pair[1].fp.clone(),
                });
            }
        }

        // Whatever lies above the lineage may have been pruned since the caller last looked.
        self.ensure_ancestors(&first.fp, &Fp::root()).await?;

        for lock in lineage {
            self.materialize_node(&lock.fp).await?;
            lock.signal.fire();
            trace!(fp = %lock.fp, "lineage entry ready");
        }
        Ok(())
    }

    async fn prune_empty_ancestors(&self, start: &Fp) -> Result<(), StoreError> {
        let mut fp = start.clone();
        while !fp.is_root() {
            let path = self.fs_path(&fp);
            let names = match fs::list_dir(&path).await {
                Ok(names) => names,
                Err(e) if e.is_not_found() => Vec::new(),
                Err(e) if e.kind() == FsErrorKind::NotADirectory => break,
                Err(e) => return Err(e.into()),
            };

            match names.as_slice() {
                [] => {}
                [only] if only == DEFAULT_DATA_COMPONENT => {
                    let data = path.join(DEFAULT_DATA_COMPONENT);
                    if self.safe_stat(&data).await?.is_some_and(|m| m.len() > 0) {
                        break;
                    }
                    self.unlink_if_present(&data).await?;
                }
                _ => break,
            }

            if !self.rmdir_with_retry(&path).await? {
                break;
            }
            debug!(%fp, "pruned empty node");
            fp = fp.parent();
        }
        Ok(())
    }

    async fn write_data(
        &self,
        lineage: &[LineageLock],
        fp: &Fp,
        data: Bytes,
    ) -> Result<(), StoreError> {
        let target = self.write_target(lineage, fp).await?;
        match fs::write(&target, &data).await {
            // Whatever held the payload was pruned; write `fp` back as a leaf.
            Err(e) if e.is_not_found() => {
                let leaf = self.fs_path(fp);
                let (leaf, bytes) = (leaf.as_path(), &data[..]);
                self.with_ancestors(fp, || fs::write(leaf, bytes)).await?;
            }
            other => other?,
        }
        trace!(%fp, len = data.len(), "wrote payload");
        Ok(())
    }

    async fn remove_data(&self, fp: &Fp) -> Result<(), StoreError> {
        match self.entity_type(fp).await? {
            EntityType::Absent => Ok(()),
            EntityType::Leaf => {
                self.unlink_if_present(&self.fs_path(fp)).await?;
                self.prune_empty_ancestors(&fp.parent()).await
            }
            EntityType::Node => {
                self.unlink_if_present(&self.payload_path(fp, EntityType::Node))
                    .await?;
                self.prune_empty_ancestors(fp).await
            }
        }
    }

    async fn read_data(&self, fp: &Fp) -> Result<Bytes, StoreError> {
        let ty = self.entity_type(fp).await?;
        if ty == EntityType::Absent {
            return Ok(Bytes::new());
        }
        match fs::read(&self.payload_path(fp, ty)).await {
            Ok(data) => Ok(Bytes::from(data)),
            Err(e) if matches!(e.kind(), FsErrorKind::NotFound | FsErrorKind::NotADirectory) => {
                Ok(Bytes::new())
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn remove_subtree(&self, fp: &Fp) -> Result<(), StoreError> {
        if fp.is_root() {
            let names = match fs::list_dir(&self.root).await {
                Ok(names) => names,
                Err(e) if e.is_not_found() => Vec::new(),
                Err(e) => return Err(e.into()),
            };
            for name in names {
                self.remove_all_with_retry(&self.root.join(name)).await?;
            }
            debug!("cleared store root");
            return Ok(());
        }

        self.remove_all_with_retry(&self.fs_path(fp)).await?;
        debug!(%fp, "removed subtree");
        self.prune_empty_ancestors(&fp.parent()).await
    }

    async fn list_children(&self, fp: &Fp) -> Result<Vec<String>, StoreError> {
        match fs::list_dir(&self.fs_path(fp)).await {
            Ok(mut names) => {
                names.retain(|name| !crate::is_reserved_component(name));
                Ok(names)
            }
            Err(e) if matches!(e.kind(), FsErrorKind::NotFound | FsErrorKind::NotADirectory) => {
                Ok(Vec::new())
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn head_stream(
        &self,
        lineage: &[LineageLock],
        fp: &Fp,
    ) -> Result<(HeadStream, Completion), StoreError> {
        let target = self.write_target(lineage, fp).await?;
        let file = match fs::create_write(&target).await {
            Err(e) if e.is_not_found() => {
                let leaf = self.fs_path(fp);
                let leaf = leaf.as_path();
                self.with_ancestors(fp, || fs::create_write(leaf)).await?
            }
            other => other?,
        };
        Ok(HeadStream::new(fp.clone(), file))
    }

    async fn tail_stream(&self, fp: &Fp) -> Result<(TailStream, Completion), StoreError> {
        let ty = self.entity_type(fp).await?;
        if ty == EntityType::Absent {
            return Ok(TailStream::empty(fp.clone()));
        }
        match fs::open_read(&self.payload_path(fp, ty)).await {
            Ok(file) => Ok(TailStream::new(fp.clone(), file)),
            Err(e) if matches!(e.kind(), FsErrorKind::NotFound | FsErrorKind::NotADirectory) => {
                Ok(TailStream::empty(fp.clone()))
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn child_iter(
        &self,
        fp: &Fp,
        buffer: usize,
    ) -> Result<(ChildIter, Completion), StoreError> {
        let path = self.fs_path(fp);
        match fs::read_dir(&path).await {
            Ok(dir) => Ok(ChildIter::spawn(dir, fp.clone(), path, buffer)),
            Err(e) if matches!(e.kind(), FsErrorKind::NotFound | FsErrorKind::NotADirectory) => {
                Ok(ChildIter::empty(fp.clone()))
            }
            Err(e) => Err(e.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Data, Encoding, LockSignal};
    use burrow_path::fp;
    use tempfile::TempDir;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};

    async fn backend() -> (TempDir, DiskBackend) {
        let dir = tempfile::tempdir().unwrap();
        let backend = DiskBackend::open(DiskConfig::new(dir.path().join("store")))
            .await
            .unwrap();
        (dir, backend)
    }

    fn lineage(fps: &[Fp]) -> Vec<LineageLock> {
        fps.iter()
            .map(|fp| LineageLock::new(fp.clone(), LockSignal::new()))
            .collect()
    }

    #[tokio::test]
    async fn open_creates_root() {
        let (dir, backend) = backend().await;
        assert!(backend.root().is_dir());
        assert!(backend.root().starts_with(dir.path().canonicalize().unwrap()));
        assert_eq!(backend.entity_type(&Fp::root()).await.unwrap(), EntityType::Node);
    }

    #[tokio::test]
    async fn open_rejects_file_root() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("file");
        std::fs::write(&file, b"x").unwrap();
        assert!(DiskBackend::open(DiskConfig::new(file)).await.is_err());
    }

    #[tokio::test]
    async fn write_creates_lineage_and_fires_signals() {
        let (_dir, backend) = backend().await;
        let target = fp!("a/b/c");
        let locks = lineage(&[Fp::root(), fp!("a"), fp!("a/b")]);

        backend
            .write_data(&locks, &target, Bytes::from_static(b"hi"))
            .await
            .unwrap();

        assert!(locks.iter().all(|l| l.signal.is_fired()));
        assert_eq!(backend.entity_type(&fp!("a")).await.unwrap(), EntityType::Node);
        assert_eq!(backend.entity_type(&target).await.unwrap(), EntityType::Leaf);
        assert_eq!(&backend.read_data(&target).await.unwrap()[..], b"hi");
        assert_eq!(backend.data_bytes(&target).await.unwrap(), 2);
    }

    #[tokio::test]
    async fn existing_target_releases_lineage_untouched() {
        let (_dir, backend) = backend().await;
        backend
            .write_data(&[], &fp!("a"), Bytes::from_static(b"1"))
            .await
            .unwrap();

        let locks = lineage(&[Fp::root()]);
        backend
            .write_data(&locks, &fp!("a"), Bytes::from_static(b"2"))
            .await
            .unwrap();
        assert!(locks[0].signal.is_fired());
        assert_eq!(&backend.read_data(&fp!("a")).await.unwrap()[..], b"2");
    }

    #[tokio::test]
    async fn writing_below_leaf_promotes_it() {
        let (_dir, backend) = backend().await;
        backend
            .write_data(&[], &fp!("p"), Bytes::from_static(b"parent"))
            .await
            .unwrap();
        backend
            .write_data(&lineage(&[Fp::root(), fp!("p")]), &fp!("p/k"), Bytes::from_static(b"kid"))
            .await
            .unwrap();

        assert_eq!(backend.entity_type(&fp!("p")).await.unwrap(), EntityType::Node);
        assert_eq!(&backend.read_data(&fp!("p")).await.unwrap()[..], b"parent");
        assert_eq!(&backend.read_data(&fp!("p/k")).await.unwrap()[..], b"kid");
        assert_eq!(backend.list_children(&fp!("p")).await.unwrap(), ["k"]);

        let raw = std::fs::read_dir(backend.root()).unwrap().count();
        assert_eq!(raw, 1, "no temporaries left behind");
    }

    #[tokio::test]
    async fn write_to_node_sets_default_payload() {
        let (_dir, backend) = backend().await;
        backend
            .write_data(&[], &fp!("n/k"), Bytes::from_static(b"kid"))
            .await
            .unwrap();
        backend
            .write_data(&[], &fp!("n"), Bytes::from_static(b"own"))
            .await
            .unwrap();

        assert_eq!(&backend.read_data(&fp!("n")).await.unwrap()[..], b"own");
        assert!(backend.root().join("n").join("~").is_file());
    }

    #[tokio::test]
    async fn pruned_ancestors_are_rebuilt_before_retrying() {
        let (_dir, backend) = backend().await;
        backend
            .write_data(&[], &fp!("a/b/x"), Bytes::from_static(b"x"))
            .await
            .unwrap();
        // A removal elsewhere prunes the whole chain out from under the next step
        std::fs::remove_dir_all(backend.root().join("a")).unwrap();

        let path = backend.fs_path(&fp!("a/b/c"));
        let path = path.as_path();
        backend
            .with_ancestors(&fp!("a/b/c"), || fs::mkdir(path))
            .await
            .unwrap();
        assert_eq!(backend.entity_type(&fp!("a/b/c")).await.unwrap(), EntityType::Node);
    }

    fn denied(path: PathBuf) -> FsError {
        FsError {
            op: "rmdir",
            path,
            source: std::io::Error::from(std::io::ErrorKind::PermissionDenied),
        }
    }

    #[tokio::test]
    async fn rmdir_retries_permission_errors() {
        use std::sync::atomic::{AtomicU32, Ordering};
        use std::time::Duration;

        let (_dir, backend) = backend().await;
        let policy = RetryPolicy::new(3, Duration::from_millis(1));
        let target = backend.root().join("busy");
        std::fs::create_dir(&target).unwrap();

        let calls = AtomicU32::new(0);
        let removed = rmdir_retrying(&policy, &target, |path| {
            let n = calls.fetch_add(1, Ordering::SeqCst);
            async move {
                if n < 2 {
                    Err(denied(path))
                } else {
                    fs::rmdir(&path).await
                }
            }
        })
        .await
        .unwrap();
        assert!(removed);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        assert!(!target.exists());

        let err = rmdir_retrying(&policy, &target, |path| async move { Err(denied(path)) })
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::TransientIo { attempts: 3, .. }));
    }

    #[tokio::test]
    async fn rmdir_reports_non_empty_and_tolerates_missing() {
        let (_dir, backend) = backend().await;
        backend
            .write_data(&[], &fp!("full/kid"), Bytes::from_static(b"x"))
            .await
            .unwrap();
        assert!(!backend.rmdir_with_retry(&backend.fs_path(&fp!("full"))).await.unwrap());
        assert!(backend.rmdir_with_retry(&backend.fs_path(&fp!("never"))).await.unwrap());
    }

    #[tokio::test]
    async fn invalid_lineage_is_rejected() {
        let (_dir, backend) = backend().await;
        let locks = lineage(&[fp!("a"), fp!("b")]);
        let err = backend.ensure_lineage(&locks).await.unwrap_err();
        assert!(matches!(err, StoreError::InvalidLineage { .. }));

        let err = backend
            .ensure_ancestors(&fp!("x"), &fp!("y"))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::InvalidLineage { .. }));
    }

    #[tokio::test]
    async fn remove_data_prunes_empty_ancestors() {
        let (_dir, backend) = backend().await;
        backend
            .write_data(&[], &fp!("a/b/c/d"), Bytes::from_static(b"x"))
            .await
            .unwrap();
        backend
            .write_data(&[], &fp!("a/keep"), Bytes::from_static(b"y"))
            .await
            .unwrap();

        backend.remove_data(&fp!("a/b/c/d")).await.unwrap();
        assert_eq!(backend.entity_type(&fp!("a/b")).await.unwrap(), EntityType::Absent);
        assert_eq!(backend.entity_type(&fp!("a")).await.unwrap(), EntityType::Node);

        backend.remove_data(&fp!("a/keep")).await.unwrap();
        assert_eq!(backend.entity_type(&fp!("a")).await.unwrap(), EntityType::Absent);
        assert!(backend.root().is_dir());
    }

    #[tokio::test]
    async fn prune_stops_at_non_empty_default_payload() {
        let (_dir, backend) = backend().await;
        backend
            .write_data(&[], &fp!("p"), Bytes::from_static(b"keep"))
            .await
            .unwrap();
        backend
            .write_data(&[], &fp!("p/k"), Bytes::from_static(b"x"))
            .await
            .unwrap();

        backend.remove_data(&fp!("p/k")).await.unwrap();
        assert_eq!(backend.entity_type(&fp!("p")).await.unwrap(), EntityType::Node);
        assert_eq!(&backend.read_data(&fp!("p")).await.unwrap()[..], b"keep");

        backend.remove_data(&fp!("p")).await.unwrap();
        assert_eq!(backend.entity_type(&fp!("p")).await.unwrap(), EntityType::Absent);
    }

    #[tokio::test]
    async fn remove_subtree_and_root() {
        let (_dir, backend) = backend().await;
        for path in ["t/a/1", "t/a/2", "t/b", "u"] {
            backend
                .write_data(&[], &Fp::parse(path).unwrap(), Bytes::from_static(b"x"))
                .await
                .unwrap();
        }

        backend.remove_subtree(&fp!("t/a")).await.unwrap();
        assert_eq!(backend.list_children(&fp!("t")).await.unwrap(), ["b"]);

        backend.remove_subtree(&fp!("missing")).await.unwrap();

        backend.remove_subtree(&Fp::root()).await.unwrap();
        assert!(backend.root().is_dir());
        assert!(backend.list_children(&Fp::root()).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn listing_absent_and_leaf_is_empty() {
        let (_dir, backend) = backend().await;
        backend
            .write_data(&[], &fp!("leaf"), Bytes::from_static(b"x"))
            .await
            .unwrap();
        assert!(backend.list_children(&fp!("leaf")).await.unwrap().is_empty());
        assert!(backend.list_children(&fp!("nope")).await.unwrap().is_empty());
        assert_eq!(backend.entity_type(&fp!("leaf/below")).await.unwrap(), EntityType::Absent);
    }

    #[tokio::test]
    async fn decodes_per_encoding() {
        let (_dir, backend) = backend().await;
        backend
            .write_data(&[], &fp!("j"), Bytes::from_static(br#"[1,2]"#))
            .await
            .unwrap();
        let data = backend.read_data_as(&fp!("j"), Encoding::Json).await.unwrap();
        assert_eq!(data, Data::Json(Some(serde_json::json!([1, 2]))));

        let data = backend.read_data_as(&fp!("none"), Encoding::Json).await.unwrap();
        assert_eq!(data, Data::Json(None));
    }

    #[tokio::test]
    async fn streams_round_trip() {
        let (_dir, backend) = backend().await;
        let (mut head, done) = backend
            .head_stream(&lineage(&[Fp::root(), fp!("s")]), &fp!("s/data"))
            .await
            .unwrap();
        head.write_all(b"111").await.unwrap();
        head.write_all(b"222").await.unwrap();
        head.shutdown().await.unwrap();
        drop(head);
        done.wait().await.unwrap();

        let (mut tail, done) = backend.tail_stream(&fp!("s/data")).await.unwrap();
        let mut out = String::new();
        tail.read_to_string(&mut out).await.unwrap();
        drop(tail);
        done.wait().await.unwrap();
        assert_eq!(out, "111222");

        let (mut tail, done) = backend.tail_stream(&fp!("absent")).await.unwrap();
        let mut out = Vec::new();
        tail.read_to_end(&mut out).await.unwrap();
        assert!(out.is_empty());
        done.wait().await.unwrap();
    }

    #[tokio::test]
    async fn child_iter_hides_default_payload() {
        let (_dir, backend) = backend().await;
        for path in ["n", "n/a", "n/b"] {
            backend
                .write_data(&[], &Fp::parse(path).unwrap(), Bytes::from_static(b"x"))
                .await
                .unwrap();
        }
        let (mut iter, done) = backend.child_iter(&fp!("n"), 1).await.unwrap();
        let mut names = Vec::new();
        while let Some(name) = iter.next().await {
            names.push(name.unwrap());
        }
        names.sort();
        assert_eq!(names, ["a", "b"]);
        done.wait().await.unwrap();

        let (mut iter, _) = backend.child_iter(&fp!("nothing"), 1).await.unwrap();
        assert!(iter.next().await.is_none());
    }
}
