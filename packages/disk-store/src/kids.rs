//! Lazy listing of a node's children.

use std::io;
use std::path::PathBuf;

use burrow_path::Fp;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::backend::is_reserved_component;
use crate::{completion, Completer, Completion, FsError, StoreError};

/// Child names of a node, produced by a background task that stays at most `buffer` names
/// ahead of the consumer.
///
/// The iterator completes when it is exhausted, closed, or dropped.
#[derive(Debug)]
pub struct ChildIter {
    fp: Fp,
    rx: Option<mpsc::Receiver<Result<String, FsError>>>,
    task: Option<JoinHandle<()>>,
    completer: Completer,
}

impl ChildIter {
    pub(crate) fn spawn(
        mut dir: tokio::fs::ReadDir,
        fp: Fp,
        path: PathBuf,
        buffer: usize,
    ) -> (Self, Completion) {
        let (tx, rx) = mpsc::channel(buffer.max(1));
        let task = tokio::spawn(async move {
            loop {
                let item = match dir.next_entry().await {
                    Ok(Some(entry)) => {
                        let name = entry.file_name().to_string_lossy().into_owned();
                        if is_reserved_component(&name) {
                            continue;
                        }
                        Ok(name)
                    }
                    Ok(None) => break,
                    Err(source) => Err(FsError {
                        op: "read_dir",
                        path: path.clone(),
                        source,
                    }),
                };
                let failed = item.is_err();
                if tx.send(item).await.is_err() || failed {
                    break;
                }
            }
        });

        let (completer, completion) = completion();
        let iter = Self {
            fp,
            rx: Some(rx),
            task: Some(task),
            completer,
        };
        (iter, completion)
    }

    /// An iterator with nothing in it.
    pub fn empty(fp: Fp) -> (Self, Completion) {
        let (mut completer, completion) = completion();
        completer.complete(Ok(()));
        let iter = Self {
            fp,
            rx: None,
            task: None,
            completer,
        };
        (iter, completion)
    }

    pub fn fp(&self) -> &Fp {
        &self.fp
    }

    /// The next child name, or `None` once every child has been produced.
    pub async fn next(&mut self) -> Option<Result<String, StoreError>> {
        let rx = self.rx.as_mut()?;
        match rx.recv().await {
            Some(Ok(name)) => Some(Ok(name)),
            Some(Err(err)) => {
                let copy = FsError {
                    op: err.op,
                    path: err.path.clone(),
                    source: io::Error::new(err.source.kind(), err.source.to_string()),
                };
                self.shut(Err(StoreError::Fs(copy)));
                Some(Err(StoreError::Fs(err)))
            }
            None => {
                self.shut(Ok(()));
                None
            }
        }
    }

    /// Stop listing early. Closing twice is harmless.
    pub async fn close(&mut self) {
        self.rx = None;
        if let Some(task) = self.task.take() {
            task.abort();
            let _ = task.await;
        }
        self.completer.complete(Ok(()));
    }

    pub fn is_finished(&self) -> bool {
        self.completer.is_complete()
    }

    fn shut(&mut self, result: Result<(), StoreError>) {
        self.rx = None;
        if let Some(task) = self.task.take() {
            task.abort();
        }
        self.completer.complete(result);
    }
}

impl Drop for ChildIter {
    fn drop(&mut self) {
        self.shut(Ok(()));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use burrow_path::fp;

    #[tokio::test]
    async fn lists_visible_children() {
        let dir = tempfile::tempdir().unwrap();
        for name in ["a", "b", "~", "~tmp"] {
            std::fs::write(dir.path().join(name), b"x").unwrap();
        }
        let read = tokio::fs::read_dir(dir.path()).await.unwrap();
        let (mut iter, done) = ChildIter::spawn(read, fp!("n"), dir.path().to_path_buf(), 1);

        let mut names = Vec::new();
        while let Some(name) = iter.next().await {
            names.push(name.unwrap());
        }
        names.sort();
        assert_eq!(names, ["a", "b"]);
        assert!(iter.is_finished());
        assert!(done.wait().await.is_ok());
    }

    #[tokio::test]
    async fn close_early_completes() {
        let dir = tempfile::tempdir().unwrap();
        for i in 0..20 {
            std::fs::write(dir.path().join(i.to_string()), b"x").unwrap();
        }
        let read = tokio::fs::read_dir(dir.path()).await.unwrap();
        let (mut iter, done) = ChildIter::spawn(read, fp!("n"), dir.path().to_path_buf(), 2);

        assert!(iter.next().await.unwrap().is_ok());
        iter.close().await;
        iter.close().await;
        assert!(iter.next().await.is_none());
        assert!(done.wait().await.is_ok());
    }

    #[tokio::test]
    async fn empty_is_done() {
        let (mut iter, done) = ChildIter::empty(fp!("n"));
        assert!(iter.next().await.is_none());
        assert!(done.wait().await.is_ok());
    }
}
