//! Live resources handed out while their locks are still held.

use std::io;
use std::ops::{Deref, DerefMut};
use std::pin::Pin;
use std::task::{Context, Poll};

use burrow_disk_store::ChildIter;
use burrow_path::Fp;
use tokio::io::{AsyncRead, AsyncWrite, ReadBuf};
use tokio::task::JoinHandle;

use crate::{Entity, Transaction, TxError};

/// A stream (or iterator) whose locks stay held until it finishes.
///
/// The locked region runs in a background task that hands `S` out as soon as the locks are
/// acquired, then waits for `S` to complete. [`finish`](Held::finish) drops the resource and
/// reports how that locked region ended.
#[derive(Debug)]
pub struct Held<S> {
    inner: S,
    task: JoinHandle<Result<(), TxError>>,
}

impl<S> Held<S> {
    pub(crate) fn new(inner: S, task: JoinHandle<Result<(), TxError>>) -> Self {
        Self { inner, task }
    }

    /// Release the resource and wait for its locks to be released.
    ///
    /// A head stream that wasn't shut down, or a tail stream that wasn't read to the end,
    /// finishes with a broken-stream error.
    pub async fn finish(self) -> Result<(), TxError> {
        let Held { inner, task } = self;
        drop(inner);
        task.await.unwrap_or(Err(TxError::Detached))
    }
}

impl<S> Deref for Held<S> {
    type Target = S;

    fn deref(&self) -> &S {
        &self.inner
    }
}

impl<S> DerefMut for Held<S> {
    fn deref_mut(&mut self) -> &mut S {
        &mut self.inner
    }
}

impl<S: AsyncRead + Unpin> AsyncRead for Held<S> {
    fn poll_read(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        Pin::new(&mut self.get_mut().inner).poll_read(cx, buf)
    }
}

impl<S: AsyncWrite + Unpin> AsyncWrite for Held<S> {
    fn poll_write(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        Pin::new(&mut self.get_mut().inner).poll_write(cx, buf)
    }

    fn poll_flush(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Pin::new(&mut self.get_mut().inner).poll_flush(cx)
    }

    fn poll_shutdown(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Pin::new(&mut self.get_mut().inner).poll_shutdown(cx)
    }
}

/// Lazy iteration over an entity's children, yielding child entities.
///
/// Must be exhausted or [`close`](KidIter::close)d to release the node's read lock.
#[derive(Debug)]
pub struct KidIter {
    tx: Transaction,
    fp: Fp,
    iter: Held<ChildIter>,
}

impl KidIter {
    pub(crate) fn new(tx: Transaction, fp: Fp, iter: Held<ChildIter>) -> Self {
        Self { tx, fp, iter }
    }

    pub async fn next(&mut self) -> Option<Result<Entity, TxError>> {
        let item = match self.iter.next().await? {
            Ok(name) => self
                .fp
                .child_components([name])
                .map_err(TxError::from)
                .and_then(|fp| Entity::new(self.tx.clone(), fp)),
            Err(err) => Err(err.into()),
        };
        Some(item)
    }

    /// Stop iterating early. Closing more than once is harmless.
    pub async fn close(&mut self) {
        self.iter.close().await;
    }

    /// Close the iterator and wait for its lock to be released.
    pub async fn finish(mut self) -> Result<(), TxError> {
        self.close().await;
        self.iter.finish().await
    }
}
