//! Path-scoped transactions serializing colliding operations.

use std::fmt;
use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use burrow_disk_store::{
    is_reserved_component, ChildIter, Data, Encoding, EntityType, HeadStream, LineageLock,
    LockSignal, StorageBackend, TailStream,
};
use burrow_path::Fp;
use tokio::sync::oneshot;
use tracing::{debug, trace, warn};

use crate::lock::{Lock, LockKind};
use crate::{Entity, Held, KidIter, Payload, TxError};

/// How many child names lazy iteration reads ahead by default.
pub const DEFAULT_KID_BUFFER: usize = 150;

type EndFn = Box<dyn FnOnce() + Send>;

/// A lock-owning context over the subtree at its root path.
///
/// Every operation names the locks it needs; operations whose locks collide run strictly in
/// the order they were issued, everything else runs concurrently. Cloning is cheap and clones
/// share the same lock table.
#[derive(Clone)]
pub struct Transaction {
    inner: Arc<TxInner>,
}

struct TxInner {
    root: Fp,
    backend: Arc<dyn StorageBackend>,
    state: Mutex<TxState>,
}

struct TxState {
    active: bool,
    /// Registered locks; released ones are dropped lazily on the next registration.
    locks: Vec<Lock>,
    end_fns: Vec<EndFn>,
}

/// Fires every signal it holds when dropped, so locks are released on every exit path.
struct Release(Vec<LockSignal>);

impl Drop for Release {
    fn drop(&mut self) {
        for signal in &self.0 {
            signal.fire();
        }
    }
}

/// Locks that are registered but possibly still waiting on earlier collisions.
struct Acquired {
    op: &'static str,
    waits: Vec<LockSignal>,
    release: Release,
}

impl Acquired {
    async fn run<T, F>(self, body: F) -> Result<T, TxError>
    where
        F: Future<Output = Result<T, TxError>>,
    {
        let Acquired { op, waits, release } = self;
        for signal in &waits {
            signal.fired().await;
        }
        trace!(op, "locks acquired");

        let result = body.await.map_err(|source| TxError::LockedOperationFailed {
            op,
            source: Box::new(source),
        });
        drop(release);
        trace!(op, "locks released");
        result
    }
}

/// Node-write locks over `lineage` (sharing its signals) plus a `kind` lock on `target`.
fn write_locks(lineage: &[LineageLock], target: &Fp, kind: LockKind) -> Vec<Lock> {
    lineage
        .iter()
        .map(|l| Lock::with_signal(LockKind::NodeWrite, l.fp.clone(), l.signal.clone()))
        .chain(std::iter::once(Lock::new(kind, target.clone())))
        .collect()
}

impl Transaction {
    /// A transaction over the subtree at `root`.
    pub fn new(backend: Arc<dyn StorageBackend>, root: Fp) -> Self {
        Self {
            inner: Arc::new(TxInner {
                root,
                backend,
                state: Mutex::new(TxState {
                    active: true,
                    locks: Vec::new(),
                    end_fns: Vec::new(),
                }),
            }),
        }
    }

    pub fn root(&self) -> &Fp {
        &self.inner.root
    }

    pub fn backend(&self) -> &Arc<dyn StorageBackend> {
        &self.inner.backend
    }

    pub fn is_active(&self) -> bool {
        self.state().active
    }

    /// The entity at this transaction's root.
    pub fn entity(&self) -> Entity {
        Entity::from_parts(self.clone(), self.inner.root.clone())
    }

    fn state(&self) -> MutexGuard<'_, TxState> {
        self.inner
            .state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// Fail unless `fp` is inside this transaction and free of reserved components.
    pub fn check_fp(&self, fp: &Fp) -> Result<(), TxError> {
        if !self.inner.root.contains(fp) {
            return Err(TxError::OutsideTransaction {
                root: self.inner.root.clone(),
                path: fp.clone(),
            });
        }
        if let Some(component) = fp.iter().find(|c| is_reserved_component(c)) {
            return Err(TxError::ReservedComponent {
                path: fp.clone(),
                component: component.clone(),
            });
        }
        Ok(())
    }

    fn lineage_locks(&self, fp: &Fp) -> Result<Vec<LineageLock>, TxError> {
        Ok(self
            .inner
            .root
            .lineage(fp)?
            .map(|ancestor| LineageLock::new(ancestor, LockSignal::new()))
            .collect())
    }

    /// Register `locks` against the lock table in one step, noting which held locks they
    /// must wait for.
    fn acquire(&self, op: &'static str, locks: Vec<Lock>) -> Result<Acquired, TxError> {
        let mut state = self.state();
        if !state.active {
            return Err(TxError::InactiveTransaction);
        }

        state.locks.retain(|held| !held.is_released());
        let waits: Vec<LockSignal> = state
            .locks
            .iter()
            .filter(|held| locks.iter().any(|lock| held.collides_with(lock)))
            .map(|held| held.signal.clone())
            .collect();
        if !waits.is_empty() {
            trace!(op, collisions = waits.len(), "waiting on colliding locks");
        }

        let release = Release(locks.iter().map(|lock| lock.signal.clone()).collect());
        state.locks.extend(locks);
        Ok(Acquired { op, waits, release })
    }

    /// Run `body` once `locks` are held, releasing them however `body` ends.
    ///
    /// Failures from `body` are wrapped in [`TxError::LockedOperationFailed`] naming `op`.
    pub async fn do_locked<T, F>(
        &self,
        op: &'static str,
        locks: Vec<Lock>,
        body: F,
    ) -> Result<T, TxError>
    where
        F: Future<Output = Result<T, TxError>>,
    {
        self.acquire(op, locks)?.run(body).await
    }

    /// Run a locked region in the background, handing its resource out as soon as it exists.
    async fn spawn_held<S, Fut>(
        acquired: Acquired,
        fp: &Fp,
        body: impl FnOnce(oneshot::Sender<S>) -> Fut,
    ) -> Result<Held<S>, TxError>
    where
        S: Send + 'static,
        Fut: Future<Output = Result<(), TxError>> + Send + 'static,
    {
        let (hand, handed) = oneshot::channel();
        let body = body(hand);
        let op = acquired.op;
        let path = fp.clone();
        let task = tokio::spawn(async move {
            let result = acquired.run(body).await;
            if let Err(err) = &result {
                warn!(op, path = %path, error = %err, "locked task failed");
            }
            result
        });

        match handed.await {
            Ok(inner) => Ok(Held::new(inner, task)),
            Err(_) => match task.await {
                Ok(Err(err)) => Err(err),
                _ => Err(TxError::Detached),
            },
        }
    }

    /// Run `op` in a nested transaction rooted at `fp`, holding the whole subtree exclusively.
    ///
    /// The nested transaction is always ended before this returns, and ancestors left empty
    /// are pruned afterwards.
    pub async fn transact<T, F, Fut>(&self, fp: &Fp, op: F) -> Result<T, TxError>
    where
        F: FnOnce(Transaction) -> Fut,
        Fut: Future<Output = Result<T, TxError>>,
    {
        self.check_fp(fp)?;
        let lineage = self.lineage_locks(fp)?;
        let locks = write_locks(&lineage, fp, LockKind::SubtreeWrite);

        let backend = &self.inner.backend;
        self.do_locked("transact", locks, async {
            backend.ensure_lineage(&lineage).await?;

            let nested = Transaction::new(Arc::clone(backend), fp.clone());
            let result = op(nested.clone()).await;
            nested.end().await;

            let value = result?;
            backend.prune_empty_ancestors(&fp.parent()).await?;
            Ok(value)
        })
        .await
    }

    /// Open a long-lived kid transaction over the subtree at `fp`.
    ///
    /// The subtree stays locked in this transaction until the kid is [`end`](Self::end)ed.
    pub async fn kid(&self, fp: &Fp) -> Result<Transaction, TxError> {
        self.check_fp(fp)?;

        let (ready, handed) = oneshot::channel();
        let parent = self.clone();
        let target = fp.clone();
        let task = tokio::spawn(async move {
            let result = parent
                .transact(&target, move |kid| async move {
                    let (ended, on_ended) = oneshot::channel::<()>();
                    kid.on_end(move || {
                        let _ = ended.send(());
                    });
                    if ready.send(kid).is_ok() {
                        let _ = on_ended.await;
                    }
                    Ok(())
                })
                .await;
            if let Err(err) = &result {
                warn!(path = %target, error = %err, "kid transaction failed");
            }
            result
        });

        match handed.await {
            Ok(kid) => {
                debug!(path = %fp, "kid transaction opened");
                Ok(kid)
            }
            Err(_) => match task.await {
                Ok(Err(err)) => Err(err),
                _ => Err(TxError::Detached),
            },
        }
    }

    pub async fn get_type(&self, fp: &Fp) -> Result<EntityType, TxError> {
        self.check_fp(fp)?;
        let backend = &self.inner.backend;
        let locks = vec![Lock::new(LockKind::NodeRead, fp.clone())];
        self.do_locked("get_type", locks, async {
            Ok(backend.entity_type(fp).await?)
        })
        .await
    }

    /// Byte length of the payload at `fp`; 0 when there is none.
    pub async fn get_data_bytes(&self, fp: &Fp) -> Result<u64, TxError> {
        self.check_fp(fp)?;
        let backend = &self.inner.backend;
        let locks = vec![Lock::new(LockKind::NodeRead, fp.clone())];
        self.do_locked("get_data_bytes", locks, async {
            Ok(backend.data_bytes(fp).await?)
        })
        .await
    }

    /// Write the payload at `fp`. Null and empty payloads delete it instead.
    pub async fn set_data(&self, fp: &Fp, payload: impl Into<Payload>) -> Result<(), TxError> {
        self.check_fp(fp)?;
        let backend = &self.inner.backend;

        let Some(data) = payload.into().into_stored(fp)? else {
            let locks = vec![Lock::new(LockKind::NodeWrite, fp.clone())];
            return self
                .do_locked("set_data_empty", locks, async {
                    Ok(backend.remove_data(fp).await?)
                })
                .await;
        };

        let lineage = self.lineage_locks(fp)?;
        let locks = write_locks(&lineage, fp, LockKind::NodeWrite);
        self.do_locked("set_data", locks, async {
            Ok(backend.write_data(&lineage, fp, data).await?)
        })
        .await
    }

    pub async fn get_data(&self, fp: &Fp, encoding: Encoding) -> Result<Data, TxError> {
        self.check_fp(fp)?;
        let backend = &self.inner.backend;
        let locks = vec![Lock::new(LockKind::NodeRead, fp.clone())];
        self.do_locked("get_data", locks, async {
            Ok(backend.read_data_as(fp, encoding).await?)
        })
        .await
    }

    /// A write sink replacing the payload at `fp`.
    ///
    /// The write locks stay held until the stream is shut down (or dropped), so operations
    /// issued afterwards observe the complete payload. A stream closed without writing
    /// anything deletes the payload, like an empty [`set_data`](Self::set_data).
    pub async fn head_stream(&self, fp: &Fp) -> Result<Held<HeadStream>, TxError> {
        self.check_fp(fp)?;
        let lineage = self.lineage_locks(fp)?;
        let locks = write_locks(&lineage, fp, LockKind::NodeWrite);
        let acquired = self.acquire("head_stream", locks)?;

        let backend = Arc::clone(&self.inner.backend);
        let target = fp.clone();
        Self::spawn_held(acquired, fp, move |hand| async move {
            let (stream, done) = backend.head_stream(&lineage, &target).await?;
            let _ = hand.send(stream);
            let streamed = done.wait().await;

            // Nothing written reads as absent, so it is stored as absent too.
            if backend.data_bytes(&target).await? == 0 {
                backend.remove_data(&target).await?;
            }
            Ok(streamed?)
        })
        .await
    }

    /// A read source over the payload at `fp`, holding a read lock until fully read.
    pub async fn tail_stream(&self, fp: &Fp) -> Result<Held<TailStream>, TxError> {
        self.check_fp(fp)?;
        let acquired =
            self.acquire("tail_stream", vec![Lock::new(LockKind::NodeRead, fp.clone())])?;

        let backend = Arc::clone(&self.inner.backend);
        let target = fp.clone();
        Self::spawn_held(acquired, fp, move |hand| async move {
            let (stream, done) = backend.tail_stream(&target).await?;
            let _ = hand.send(stream);
            Ok(done.wait().await?)
        })
        .await
    }

    /// Names of the children of `fp`, in no particular order.
    pub async fn get_kid_names(&self, fp: &Fp) -> Result<Vec<String>, TxError> {
        self.check_fp(fp)?;
        let backend = &self.inner.backend;
        let locks = vec![Lock::new(LockKind::NodeRead, fp.clone())];
        self.do_locked("get_kid_names", locks, async {
            Ok(backend.list_children(fp).await?)
        })
        .await
    }

    /// Remove `fp` and everything beneath it.
    pub async fn rem_subtree(&self, fp: &Fp) -> Result<(), TxError> {
        self.check_fp(fp)?;
        let backend = &self.inner.backend;
        let locks = vec![Lock::new(LockKind::SubtreeWrite, fp.clone())];
        self.do_locked("rem_subtree", locks, async {
            Ok(backend.remove_subtree(fp).await?)
        })
        .await
    }

    /// Lazily iterate the children of `fp`, reading at most `buffer` names ahead.
    pub async fn iterate_node(&self, fp: &Fp, buffer: usize) -> Result<KidIter, TxError> {
        self.check_fp(fp)?;
        let acquired =
            self.acquire("iterate_node", vec![Lock::new(LockKind::NodeRead, fp.clone())])?;

        let backend = Arc::clone(&self.inner.backend);
        let target = fp.clone();
        let held: Held<ChildIter> = Self::spawn_held(acquired, fp, move |hand| async move {
            let (iter, done) = backend.child_iter(&target, buffer).await?;
            let _ = hand.send(iter);
            Ok(done.wait().await?)
        })
        .await?;
        Ok(KidIter::new(self.clone(), fp.clone(), held))
    }

    /// Run `f` once this transaction ends.
    ///
    /// Callbacks registered after [`end`](Self::end) has started never run.
    pub fn on_end(&self, f: impl FnOnce() + Send + 'static) {
        self.state().end_fns.push(Box::new(f));
    }

    /// End the transaction.
    ///
    /// New operations fail with [`TxError::InactiveTransaction`] from here on. Waits for every
    /// operation already issued to release its locks (open streams, iterators and kid
    /// transactions included), then runs the end callbacks. Ending twice is harmless.
    pub async fn end(&self) {
        let (pending, callbacks) = {
            let mut state = self.state();
            state.active = false;
            state.locks.retain(|held| !held.is_released());
            let pending: Vec<LockSignal> =
                state.locks.iter().map(|held| held.signal.clone()).collect();
            (pending, std::mem::take(&mut state.end_fns))
        };

        for signal in &pending {
            signal.fired().await;
        }
        if !callbacks.is_empty() {
            debug!(root = %self.inner.root, "transaction ended");
        }
        for callback in callbacks {
            callback();
        }
    }
}

impl fmt::Display for Transaction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Transaction @ {}", self.inner.root)
    }
}

impl fmt::Debug for Transaction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Transaction")
            .field("root", &self.inner.root)
            .field("active", &self.is_active())
            .finish()
    }
}
