//! Reading fragments from a directory of JSON documents.

use std::{
    fs,
    path::{Path, PathBuf},
    sync::mpsc::{self, Receiver},
    thread,
};

use tracing::debug;

use crate::{errors::GraphImportError, fragment::Graph};

pub const FRAGMENT_EXTENSION: &str = "json";

/// Every `*.json` file directly inside `dir`, sorted by file name.
pub fn list_fragments<P: AsRef<Path>>(dir: P) -> Result<Vec<PathBuf>, GraphImportError> {
    let dir = dir.as_ref();
    let entries = fs::read_dir(dir)
        .map_err(|e| GraphImportError::io(format!("{}: {e}", dir.display())))?;
    let mut paths = Vec::new();
    for entry in entries {
        let path = entry
            .map_err(|e| GraphImportError::io(e.to_string()))?
            .path();
        if path.is_file() && path.extension().is_some_and(|ext| ext == FRAGMENT_EXTENSION) {
            paths.push(path);
        }
    }
    paths.sort();
    Ok(paths)
}

pub fn read_fragment<P: AsRef<Path>>(path: P) -> Result<Graph, GraphImportError> {
    let path = path.as_ref();
    let contents = fs::read_to_string(path)
        .map_err(|e| GraphImportError::io(format!("{}: {e}", path.display())))?;
    serde_json::from_str(&contents).map_err(|e| {
        GraphImportError::invalid_input(format!("{}: {e}", path.display()))
    })
}

/// Parses `paths` on a reader thread, at most `depth` fragments ahead of the
/// consumer. Results arrive in input order; dropping the receiver stops the
/// reader.
pub fn prefetch(
    paths: Vec<PathBuf>,
    depth: usize,
) -> Receiver<(PathBuf, Result<Graph, GraphImportError>)> {
    let (sender, receiver) = mpsc::sync_channel(depth.max(1));
    thread::spawn(move || {
        for path in paths {
            let fragment = read_fragment(&path);
            debug!(path = %path.display(), ok = fragment.is_ok(), "fragment read");
            if sender.send((path, fragment)).is_err() {
                break;
            }
        }
    });
    receiver
}
