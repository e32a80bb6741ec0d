use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

/// One unit of input work: a label image awaiting extraction.
///
/// Immutable; consumed by exactly one worker.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Task {
    path: PathBuf,
    identifier: String,
}

impl Task {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let identifier = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());
        Self { path, identifier }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// File name of the image; the key results are reported and sorted by.
    pub fn identifier(&self) -> &str {
        &self.identifier
    }
}
