// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Import configuration.

use {
    crate::storage::ManagedStorage,
    std::path::{Path, PathBuf},
};

/// Environment variable overriding the managed storage root.
pub const STORAGE_DIR_ENV_VARIABLE: &str = "APP_IMPORT_STORAGE_DIR";

/// Environment variable overriding the root for per-session work areas.
pub const WORK_DIR_ENV_VARIABLE: &str = "APP_IMPORT_WORK_DIR";

/// File name of the JSON lines catalog within the storage root.
pub const CATALOG_FILE_NAME: &str = "catalog.jsonl";

/// Resolve the default managed storage root.
///
/// Honors [STORAGE_DIR_ENV_VARIABLE], then the platform's local data
/// directory, then the process temporary directory.
pub fn default_storage_root() -> PathBuf {
    if let Some(path) = std::env::var_os(STORAGE_DIR_ENV_VARIABLE) {
        PathBuf::from(path)
    } else if let Some(path) = dirs::data_local_dir() {
        path.join("app-import")
    } else {
        std::env::temp_dir().join("app-import")
    }
}

/// Resolve the default root for work areas.
pub fn default_work_root() -> PathBuf {
    std::env::var_os(WORK_DIR_ENV_VARIABLE)
        .map(PathBuf::from)
        .unwrap_or_else(std::env::temp_dir)
}

/// Settings shared by import sessions.
#[derive(Clone, Debug)]
pub struct ImportSettings {
    storage_root: PathBuf,
    work_root: PathBuf,
    inject_libraries: bool,
}

impl ImportSettings {
    /// Construct settings storing imports under `storage_root`.
    ///
    /// Work areas are allocated in the process temporary directory.
    pub fn new(storage_root: impl Into<PathBuf>) -> Self {
        Self {
            storage_root: storage_root.into(),
            work_root: std::env::temp_dir(),
            inject_libraries: true,
        }
    }

    /// Construct settings from the environment.
    pub fn from_env() -> Self {
        Self::new(default_storage_root()).with_work_root(default_work_root())
    }

    /// Allocate work areas under a different root.
    #[must_use]
    pub fn with_work_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.work_root = root.into();
        self
    }

    /// Whether to augment extracted bundles with shared libraries.
    #[must_use]
    pub fn with_library_injection(mut self, enabled: bool) -> Self {
        self.inject_libraries = enabled;
        self
    }

    pub fn work_root(&self) -> &Path {
        &self.work_root
    }

    pub fn inject_libraries(&self) -> bool {
        self.inject_libraries
    }

    /// The managed storage rooted at the configured storage root.
    pub fn storage(&self) -> ManagedStorage {
        ManagedStorage::new(&self.storage_root)
    }

    /// Default location of the JSON lines catalog.
    pub fn catalog_path(&self) -> PathBuf {
        self.storage_root.join(CATALOG_FILE_NAME)
    }
}
