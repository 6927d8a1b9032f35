// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use {
    serde::Serialize,
    std::path::PathBuf,
    thiserror::Error,
};

/// A step of the import pipeline.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum ImportStage {
    Copy,
    Extract,
    Relocate,
    Catalog,
}

impl std::fmt::Display for ImportStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::Copy => "copy",
            Self::Extract => "extract",
            Self::Relocate => "relocate",
            Self::Catalog => "catalog",
        })
    }
}

/// Errors unpacking an application archive.
#[derive(Debug, Error)]
pub enum ExtractionError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("zip error: {0}")]
    Zip(#[from] zip::result::ZipError),

    #[error("{0} is not a recognized application archive")]
    UnsupportedContainer(PathBuf),

    #[error("archive entry escapes the extraction directory: {0}")]
    UnsafeEntryPath(String),

    #[error("extraction cancelled")]
    Cancelled,
}

/// Errors moving an extracted payload into managed storage.
#[derive(Debug, Error)]
pub enum RelocationError {
    #[error("payload directory not found at {0}")]
    PayloadNotFound(PathBuf),

    #[error("destination {0} already exists")]
    DestinationOccupied(PathBuf),

    #[error("I/O error relocating to {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
}

/// A single shared library could not be installed into a bundle.
#[derive(Debug, Error)]
#[error("failed to install library {library}: {source}")]
pub struct LibraryInjectionError {
    pub library: PathBuf,
    pub source: std::io::Error,
}

/// Errors reading or writing the catalog.
#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON serialization error: {0}")]
    SerdeJson(#[from] serde_json::Error),

    #[error("catalog lock poisoned")]
    Poisoned,
}

/// Stage-tagged failure of an import session.
#[derive(Debug, Error)]
pub enum ImportError {
    #[error("failed to copy {path} into work area: {source}")]
    CopyFailed {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("extraction of {path} failed: {source}")]
    ExtractionFailed {
        path: PathBuf,
        source: ExtractionError,
    },

    #[error("payload directory not found at {0}")]
    PayloadNotFound(PathBuf),

    #[error("relocation failed: {0}")]
    RelocationFailed(#[source] RelocationError),

    #[error("import cancelled during {0} stage")]
    Cancelled(ImportStage),

    #[error("import worker failed: {0}")]
    Worker(String),
}

impl ImportError {
    /// The pipeline stage at which the session failed.
    ///
    /// `None` when the worker running the session itself failed.
    pub fn stage(&self) -> Option<ImportStage> {
        match self {
            Self::CopyFailed { .. } => Some(ImportStage::Copy),
            Self::ExtractionFailed { .. } => Some(ImportStage::Extract),
            Self::PayloadNotFound(_) | Self::RelocationFailed(_) => Some(ImportStage::Relocate),
            Self::Cancelled(stage) => Some(*stage),
            Self::Worker(_) => None,
        }
    }
}

impl From<RelocationError> for ImportError {
    fn from(e: RelocationError) -> Self {
        match e {
            RelocationError::PayloadNotFound(path) => Self::PayloadNotFound(path),
            e => Self::RelocationFailed(e),
        }
    }
}
