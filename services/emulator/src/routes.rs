// routes: Lazy loader for the on-disk route corpus.
//
// Each descriptor is a self-contained JSON document with at least `name`
// and `coordinates`; extra fields are ignored.  The loader streams one
// descriptor at a time; the corpus is never slurped into memory.
//
// Per-file failures are yielded as skippable errors and the stream keeps
// going; an unreadable directory ends the stream.

use std::path::{Path, PathBuf};

use async_stream::stream;
use futures_util::Stream;
use serde::Deserialize;
use thiserror::Error;

/// Directory the corpus is read from, relative to the working directory.
pub const ROUTES_DIR: &str = "routes";

/// One route from the corpus: a name and an ordered polyline.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Route {
    pub name: String,
    /// `(lat, lng)` pairs, length >= 1.
    pub coordinates: Vec<(f64, f64)>,
}

#[derive(Debug, Error)]
pub enum CorpusError {
    #[error("cannot read route directory {path}: {source}")]
    DirUnreadable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("cannot read route descriptor {path}: {source}")]
    FileUnreadable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("malformed route descriptor {path}: {source}")]
    Malformed {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("route descriptor {path} has no coordinates")]
    EmptyRoute { path: PathBuf },
}

impl CorpusError {
    /// Whether the caller can skip this descriptor and keep loading.
    /// An unreadable directory cannot be skipped.
    pub fn is_skippable(&self) -> bool {
        !matches!(self, CorpusError::DirUnreadable { .. })
    }
}

/// Stream the corpus from `dir`, one descriptor at a time.  Files without a
/// `.json` suffix are skipped; order is unspecified.
pub fn load_routes(dir: impl AsRef<Path>) -> impl Stream<Item = Result<Route, CorpusError>> {
    let dir = dir.as_ref().to_owned();
    stream! {
        let mut entries = match tokio::fs::read_dir(&dir).await {
            Ok(entries) => entries,
            Err(source) => {
                yield Err(CorpusError::DirUnreadable { path: dir.clone(), source });
                return;
            }
        };
        loop {
            let entry = match entries.next_entry().await {
                Ok(Some(entry)) => entry,
                Ok(None) => break,
                Err(source) => {
                    yield Err(CorpusError::DirUnreadable { path: dir.clone(), source });
                    return;
                }
            };
            let path = entry.path();
            if path.extension().and_then(|ext| ext.to_str()) != Some("json") {
                continue;
            }
            let text = match tokio::fs::read_to_string(&path).await {
                Ok(text) => text,
                Err(source) => {
                    yield Err(CorpusError::FileUnreadable { path, source });
                    continue;
                }
            };
            match serde_json::from_str::<Route>(&text) {
                Ok(route) if route.coordinates.is_empty() => {
                    yield Err(CorpusError::EmptyRoute { path });
                }
                Ok(route) => yield Ok(route),
                Err(source) => yield Err(CorpusError::Malformed { path, source }),
            }
        }
    }
}
