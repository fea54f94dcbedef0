//! Payload streams handed out to callers.
//!
//! Both stream kinds report their end through a [`Completion`] so the transaction layer can
//! hold its locks for exactly as long as the stream is live.

use std::fmt;
use std::io;
use std::pin::Pin;
use std::task::{ready, Context, Poll};

use burrow_path::Fp;
use tokio::io::{AsyncRead, AsyncWrite, ReadBuf};

use crate::{completion, Completer, Completion, StoreError};

fn copy_io_error(err: &io::Error) -> io::Error {
    io::Error::new(err.kind(), err.to_string())
}

/// A write sink into an entity's payload.
///
/// The payload is final once [`shutdown`](tokio::io::AsyncWriteExt::shutdown) completes.
/// Dropping the stream before that completes it with [`StoreError::BrokenStream`].
pub struct HeadStream {
    fp: Fp,
    inner: Pin<Box<dyn AsyncWrite + Send>>,
    completer: Completer,
}

impl HeadStream {
    pub fn new(fp: Fp, writer: impl AsyncWrite + Send + 'static) -> (Self, Completion) {
        let (completer, completion) = completion();
        let stream = Self {
            fp,
            inner: Box::pin(writer),
            completer,
        };
        (stream, completion)
    }

    pub fn fp(&self) -> &Fp {
        &self.fp
    }

    fn fail(&mut self, op: &'static str, err: &io::Error) {
        let cause = StoreError::from_stream(op, &self.fp, copy_io_error(err));
        self.completer.complete(Err(cause));
    }
}

impl AsyncWrite for HeadStream {
    fn poll_write(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        let this = self.get_mut();
        let result = ready!(this.inner.as_mut().poll_write(cx, buf));
        if let Err(err) = &result {
            this.fail("write", err);
        }
        Poll::Ready(result)
    }

    fn poll_flush(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        let this = self.get_mut();
        let result = ready!(this.inner.as_mut().poll_flush(cx));
        if let Err(err) = &result {
            this.fail("flush", err);
        }
        Poll::Ready(result)
    }

    fn poll_shutdown(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        let this = self.get_mut();
        let result = ready!(this.inner.as_mut().poll_shutdown(cx));
        match &result {
            Ok(()) => this.completer.complete(Ok(())),
            Err(err) => this.fail("shutdown", err),
        }
        Poll::Ready(result)
    }
}

impl Drop for HeadStream {
    fn drop(&mut self) {
        if !self.completer.is_complete() {
            let err = io::Error::new(
                io::ErrorKind::BrokenPipe,
                "head stream dropped before shutdown",
            );
            self.completer.complete(Err(StoreError::BrokenStream {
                path: self.fp.clone(),
                source: err,
            }));
        }
    }
}

impl fmt::Debug for HeadStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HeadStream").field("fp", &self.fp).finish()
    }
}

/// A read source over an entity's payload.
///
/// Reaching end-of-payload completes the stream; dropping it earlier completes it with
/// [`StoreError::BrokenStream`]. A payload that vanished before it could be read is simply
/// empty.
pub struct TailStream {
    fp: Fp,
    inner: Option<Pin<Box<dyn AsyncRead + Send>>>,
    completer: Completer,
}

impl TailStream {
    pub fn new(fp: Fp, reader: impl AsyncRead + Send + 'static) -> (Self, Completion) {
        let (completer, completion) = completion();
        let stream = Self {
            fp,
            inner: Some(Box::pin(reader)),
            completer,
        };
        (stream, completion)
    }

    /// A stream with no data that has already completed.
    pub fn empty(fp: Fp) -> (Self, Completion) {
        let (mut completer, completion) = completion();
        completer.complete(Ok(()));
        let stream = Self {
            fp,
            inner: None,
            completer,
        };
        (stream, completion)
    }

    pub fn fp(&self) -> &Fp {
        &self.fp
    }

    fn finish(&mut self, result: Result<(), StoreError>) {
        self.inner = None;
        self.completer.complete(result);
    }
}

impl AsyncRead for TailStream {
    fn poll_read(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        let this = self.get_mut();
        let Some(inner) = this.inner.as_mut() else {
            this.finish(Ok(()));
            return Poll::Ready(Ok(()));
        };

        let wanted = buf.remaining() > 0;
        let before = buf.filled().len();
        match ready!(inner.as_mut().poll_read(cx, buf)) {
            Ok(()) => {
                if wanted && buf.filled().len() == before {
                    this.finish(Ok(()));
                }
                Poll::Ready(Ok(()))
            }
            Err(err) if err.kind() == io::ErrorKind::NotFound => {
                this.finish(Ok(()));
                Poll::Ready(Ok(()))
            }
            Err(err) => {
                let cause = StoreError::from_stream("read", &this.fp, copy_io_error(&err));
                this.finish(Err(cause));
                Poll::Ready(Err(err))
            }
        }
    }
}

impl Drop for TailStream {
    fn drop(&mut self) {
        if !self.completer.is_complete() {
            let err = io::Error::new(
                io::ErrorKind::BrokenPipe,
                "tail stream dropped before end of payload",
            );
            self.completer.complete(Err(StoreError::BrokenStream {
                path: self.fp.clone(),
                source: err,
            }));
        }
    }
}

impl fmt::Debug for TailStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TailStream")
            .field("fp", &self.fp)
            .field("finished", &self.inner.is_none())
            .finish()
    }
}
