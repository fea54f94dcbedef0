//! Thin wrapper around `tokio::fs` that annotates every failure with the operation name and
//! the primary path it was called with.

use std::fs::Metadata;
use std::io;
use std::path::{Path, PathBuf};

use tokio::fs;

/// A failed low-level filesystem call.
#[derive(thiserror::Error, Debug)]
#[error("failed low-level {op} on \"{}\": {source}", .path.display())]
pub struct FsError {
    pub op: &'static str,
    pub path: PathBuf,
    #[source]
    pub source: io::Error,
}

/// The handful of error conditions the storage layer reacts to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FsErrorKind {
    NotFound,
    NotADirectory,
    NotEmpty,
    AlreadyExists,
    PermissionDenied,
    Other,
}

impl FsError {
    fn annotate(op: &'static str, path: &Path) -> impl FnOnce(io::Error) -> FsError {
        let path = path.to_path_buf();
        move |source| FsError { op, path, source }
    }

    pub fn kind(&self) -> FsErrorKind {
        match self.source.kind() {
            io::ErrorKind::NotFound => FsErrorKind::NotFound,
            io::ErrorKind::NotADirectory => FsErrorKind::NotADirectory,
            io::ErrorKind::DirectoryNotEmpty => FsErrorKind::NotEmpty,
            io::ErrorKind::AlreadyExists => FsErrorKind::AlreadyExists,
            io::ErrorKind::PermissionDenied => FsErrorKind::PermissionDenied,
            _ => FsErrorKind::Other,
        }
    }

    pub fn is_not_found(&self) -> bool {
        self.kind() == FsErrorKind::NotFound
    }
}

pub async fn stat(path: &Path) -> Result<Metadata, FsError> {
    fs::metadata(path).await.map_err(FsError::annotate("stat", path))
}

pub async fn read(path: &Path) -> Result<Vec<u8>, FsError> {
    fs::read(path).await.map_err(FsError::annotate("read", path))
}

pub async fn write(path: &Path, data: &[u8]) -> Result<(), FsError> {
    fs::write(path, data).await.map_err(FsError::annotate("write", path))
}

pub async fn rename(from: &Path, to: &Path) -> Result<(), FsError> {
    fs::rename(from, to).await.map_err(FsError::annotate("rename", from))
}

pub async fn mkdir(path: &Path) -> Result<(), FsError> {
    fs::create_dir(path).await.map_err(FsError::annotate("mkdir", path))
}

pub async fn mkdir_all(path: &Path) -> Result<(), FsError> {
    fs::create_dir_all(path)
        .await
        .map_err(FsError::annotate("mkdir_all", path))
}

pub async fn rmdir(path: &Path) -> Result<(), FsError> {
    fs::remove_dir(path).await.map_err(FsError::annotate("rmdir", path))
}

pub async fn unlink(path: &Path) -> Result<(), FsError> {
    fs::remove_file(path).await.map_err(FsError::annotate("unlink", path))
}

/// Remove a file, or a directory and everything beneath it.
pub async fn remove_all(path: &Path) -> Result<(), FsError> {
    let meta = fs::symlink_metadata(path)
        .await
        .map_err(FsError::annotate("remove_all", path))?;
    if meta.is_dir() {
        fs::remove_dir_all(path).await.map_err(FsError::annotate("remove_all", path))
    } else {
        fs::remove_file(path).await.map_err(FsError::annotate("remove_all", path))
    }
}

pub async fn canonicalize(path: &Path) -> Result<PathBuf, FsError> {
    fs::canonicalize(path)
        .await
        .map_err(FsError::annotate("canonicalize", path))
}

pub async fn read_dir(path: &Path) -> Result<fs::ReadDir, FsError> {
    fs::read_dir(path).await.map_err(FsError::annotate("read_dir", path))
}

/// Names of every entry in a directory, in no particular order.
pub async fn list_dir(path: &Path) -> Result<Vec<String>, FsError> {
    let mut dir = read_dir(path).await?;
    let mut names = Vec::new();
    while let Some(entry) = dir
        .next_entry()
        .await
        .map_err(FsError::annotate("read_dir", path))?
    {
        names.push(entry.file_name().to_string_lossy().into_owned());
    }
    Ok(names)
}

pub async fn open_read(path: &Path) -> Result<fs::File, FsError> {
    fs::File::open(path)
        .await
        .map_err(FsError::annotate("open", path))
}

pub async fn create_write(path: &Path) -> Result<fs::File, FsError> {
    fs::File::create(path)
        .await
        .map_err(FsError::annotate("create", path))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn errors_carry_op_and_path() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("missing");

        let err = read(&missing).await.unwrap_err();
        assert_eq!(err.op, "read");
        assert_eq!(err.path, missing);
        assert_eq!(err.kind(), FsErrorKind::NotFound);
        assert!(err.to_string().contains("failed low-level read"));
    }

    #[tokio::test]
    async fn classifies_not_a_directory_and_not_empty() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("file");
        write(&file, b"x").await.unwrap();

        let err = list_dir(&file).await.unwrap_err();
        assert_eq!(err.kind(), FsErrorKind::NotADirectory);

        let full = dir.path().join("full");
        mkdir(&full).await.unwrap();
        write(&full.join("kid"), b"x").await.unwrap();
        let err = rmdir(&full).await.unwrap_err();
        assert_eq!(err.kind(), FsErrorKind::NotEmpty);
    }

    #[tokio::test]
    async fn op_names_follow_the_wrapper() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("missing");

        assert_eq!(canonicalize(&missing).await.unwrap_err().op, "canonicalize");
        assert_eq!(open_read(&missing).await.unwrap_err().op, "open");
        assert_eq!(read_dir(&missing).await.unwrap_err().op, "read_dir");
        assert_eq!(remove_all(&missing).await.unwrap_err().op, "remove_all");
        let nested = missing.join("file");
        assert_eq!(create_write(&nested).await.unwrap_err().op, "create");
    }

    #[tokio::test]
    async fn remove_all_handles_files_and_trees() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("file");
        write(&file, b"x").await.unwrap();
        remove_all(&file).await.unwrap();
        assert!(stat(&file).await.unwrap_err().is_not_found());

        let tree = dir.path().join("tree");
        mkdir_all(&tree.join("a/b")).await.unwrap();
        write(&tree.join("a/b/c"), b"x").await.unwrap();
        remove_all(&tree).await.unwrap();
        assert!(stat(&tree).await.unwrap_err().is_not_found());
    }
}
