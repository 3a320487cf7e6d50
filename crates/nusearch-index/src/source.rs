//! Dump reader.
//!
//! Package dumps are newline-delimited JSON files (`*.jsonl`), one package
//! per line. [`DumpReader::packages`] lists the dump files up front and then
//! reads them lazily, one line at a time, so a dump set of any size streams
//! through the indexer in constant memory. The stream is single-pass; call
//! `packages` again to start over.

use std::path::{Path, PathBuf};

use async_walkdir::WalkDir;
use futures::{Stream, StreamExt, TryFutureExt, future, stream};
use nusearch_core::{Error, Package, Result};
use tokio::fs::{self, File};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio_stream::wrappers::LinesStream;
use tracing::debug;

/// Default dump file extension.
pub const DUMP_EXTENSION: &str = "jsonl";

/// Reads packages from a directory of dump files.
#[derive(Debug, Clone)]
pub struct DumpReader {
    root: PathBuf,
    extension: String,
}

impl DumpReader {
    /// Read dumps under `root` (a directory, searched recursively, or a
    /// single dump file).
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            extension: DUMP_EXTENSION.to_string(),
        }
    }

    /// Match files with a different extension (without the dot).
    pub fn with_extension(mut self, extension: impl Into<String>) -> Self {
        self.extension = extension.into();
        self
    }

    /// Dump root.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Dump files in read order (sorted by path).
    pub async fn dump_files(&self) -> Result<Vec<PathBuf>> {
        let metadata = fs::metadata(&self.root)
            .await
            .map_err(|e| Error::io_with_path(e, &self.root))?;
        if metadata.is_file() {
            return Ok(vec![self.root.clone()]);
        }

        let mut files = Vec::new();
        let mut walker = WalkDir::new(&self.root);
        while let Some(entry) = walker.next().await {
            let entry = entry
                .map_err(|e| Error::io_with_path(std::io::Error::other(e), &self.root))?;
            let path = entry.path();
            if path.is_file()
                && path.extension().and_then(|e| e.to_str()) == Some(self.extension.as_str())
            {
                files.push(path);
            }
        }
        files.sort();

        debug!(root = %self.root.display(), files = files.len(), "found dump files");
        Ok(files)
    }

    /// Lazy stream over every package of every dump file.
    ///
    /// Blank lines are skipped. An unreadable file or unparsable line yields
    /// an error item naming the file and line; the stream continues after it,
    /// but the indexer treats it as fatal.
    pub async fn packages(&self) -> Result<impl Stream<Item = Result<Package>> + Send + 'static> {
        let files = self.dump_files().await?;
        Ok(stream::iter(files).flat_map(read_dump_file))
    }
}

fn read_dump_file(path: PathBuf) -> impl Stream<Item = Result<Package>> + Send + 'static {
    let lines_path = path.clone();
    File::open(path.clone())
        .map_err(move |e| Error::io_with_path(e, &path))
        .map_ok(move |file| {
            LinesStream::new(BufReader::new(file).lines())
                .enumerate()
                .filter_map(move |(n, line)| future::ready(parse_line(&lines_path, n + 1, line)))
        })
        .try_flatten_stream()
}

fn parse_line(path: &Path, line_no: usize, line: std::io::Result<String>) -> Option<Result<Package>> {
    let line = match line {
        Ok(line) => line,
        Err(e) => return Some(Err(Error::io_with_path(e, path))),
    };
    if line.trim().is_empty() {
        return None;
    }

    let parsed = serde_json::from_str::<Package>(&line)
        .map(|mut package| {
            package.derive_suggest();
            package
        })
        .map_err(|e| Error::source_error(format!("{}:{}", path.display(), line_no), e.to_string()));
    Some(parsed)
}
