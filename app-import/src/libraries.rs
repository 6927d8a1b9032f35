// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Sources of shared libraries injected into imported bundles.

use std::{
    ffi::OsStr,
    path::{Path, PathBuf},
};

/// A shared library file available for injection.
#[derive(Clone, Debug, Eq, Ord, PartialEq, PartialOrd)]
pub struct SharedLibraryFile {
    path: PathBuf,
}

impl SharedLibraryFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// File name the library is installed under.
    pub fn file_name(&self) -> Option<&OsStr> {
        self.path.file_name()
    }
}

/// Enumerates shared libraries to inject.
pub trait SharedLibrarySource: Send + Sync {
    fn libraries(&self) -> std::io::Result<Vec<SharedLibraryFile>>;
}

impl SharedLibrarySource for Vec<SharedLibraryFile> {
    fn libraries(&self) -> std::io::Result<Vec<SharedLibraryFile>> {
        Ok(self.clone())
    }
}

/// Libraries stored as regular files in a directory.
///
/// Subdirectories are ignored. Files are returned in file name order.
#[derive(Clone, Debug)]
pub struct DirectoryLibrarySource {
    dir: PathBuf,
}

impl DirectoryLibrarySource {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }
}

impl SharedLibrarySource for DirectoryLibrarySource {
    fn libraries(&self) -> std::io::Result<Vec<SharedLibraryFile>> {
        let mut res = vec![];

        for entry in std::fs::read_dir(&self.dir)? {
            let entry = entry?;

            if entry.file_type()?.is_file() {
                res.push(SharedLibraryFile::new(entry.path()));
            }
        }

        res.sort();

        Ok(res)
    }
}
