// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Moving extracted payloads into managed storage.

use {
    crate::{
        error::RelocationError, session::SessionId, storage::ManagedStorage,
        work_area::WorkArea,
    },
    log::{info, warn},
    std::path::{Path, PathBuf},
};

/// Moves a session's payload into its managed storage directory.
#[derive(Clone, Debug)]
pub struct PayloadRelocator {
    storage: ManagedStorage,
}

impl PayloadRelocator {
    pub fn new(storage: ManagedStorage) -> Self {
        Self { storage }
    }

    pub fn storage(&self) -> &ManagedStorage {
        &self.storage
    }

    /// Move `payload_dir` to the storage directory of `session_id`.
    ///
    /// The payload directory itself becomes the session's storage directory,
    /// so the application bundle ends up at `Unsigned/<id>/<Name>.app`.
    /// Once moved, the work area is destroyed on a best-effort basis.
    pub fn relocate(
        &self,
        work_area: &WorkArea,
        payload_dir: &Path,
        session_id: &SessionId,
    ) -> Result<PathBuf, RelocationError> {
        if !payload_dir.is_dir() {
            return Err(RelocationError::PayloadNotFound(payload_dir.to_path_buf()));
        }

        let dest = self.storage.path_for(session_id);
        if dest.symlink_metadata().is_ok() {
            return Err(RelocationError::DestinationOccupied(dest));
        }

        let unsigned_dir = self.storage.unsigned_dir();
        std::fs::create_dir_all(&unsigned_dir).map_err(|source| RelocationError::Io {
            path: unsigned_dir.clone(),
            source,
        })?;

        if let Err(e) = std::fs::rename(payload_dir, &dest) {
            warn!(
                "unable to rename {} to {} ({}); copying instead",
                payload_dir.display(),
                dest.display(),
                e
            );
            move_by_copy(payload_dir, &dest)?;
        }

        info!("relocated payload to {}", dest.display());

        if let Err(e) = work_area.destroy() {
            warn!(
                "unable to remove work area {}: {}",
                work_area.path().display(),
                e
            );
        }

        Ok(dest)
    }
}

/// Copy the tree at `source` to `dest` and then remove `source`.
///
/// A partially written destination is removed on failure. Once the copy is
/// complete the move has succeeded, so failing to remove `source` only
/// logs; the work area's own cleanup gets another chance at it.
fn move_by_copy(source: &Path, dest: &Path) -> Result<(), RelocationError> {
    if let Err(e) = copy_tree(source, dest) {
        if let Err(cleanup) = std::fs::remove_dir_all(dest) {
            warn!(
                "unable to remove partial copy {}: {}",
                dest.display(),
                cleanup
            );
        }

        return Err(e);
    }

    if let Err(e) = std::fs::remove_dir_all(source) {
        warn!(
            "copied {} to {} but unable to remove the original: {}",
            source.display(),
            dest.display(),
            e
        );
    }

    Ok(())
}

fn copy_tree(source: &Path, dest: &Path) -> Result<(), RelocationError> {
    let io_error = |path: &Path, e: std::io::Error| RelocationError::Io {
        path: path.to_path_buf(),
        source: e,
    };

    for entry in walkdir::WalkDir::new(source).sort_by_file_name() {
        let entry = entry.map_err(|e| {
            let path = e.path().unwrap_or(source).to_path_buf();
            RelocationError::Io {
                path,
                source: e.into(),
            }
        })?;

        let relative = entry.path().strip_prefix(source).map_err(|e| {
            io_error(
                entry.path(),
                std::io::Error::new(std::io::ErrorKind::Other, e),
            )
        })?;
        let dest_path = dest.join(relative);
        let file_type = entry.file_type();

        if file_type.is_dir() {
            std::fs::create_dir_all(&dest_path).map_err(|e| io_error(&dest_path, e))?;
        } else if file_type.is_symlink() {
            let target =
                std::fs::read_link(entry.path()).map_err(|e| io_error(entry.path(), e))?;
            copy_symlink(&target, &dest_path).map_err(|e| io_error(&dest_path, e))?;
        } else {
            std::fs::copy(entry.path(), &dest_path).map_err(|e| io_error(&dest_path, e))?;
        }
    }

    Ok(())
}

#[cfg(unix)]
fn copy_symlink(target: &Path, dest_path: &Path) -> std::io::Result<()> {
    std::os::unix::fs::symlink(target, dest_path)
}

#[cfg(not(unix))]
fn copy_symlink(target: &Path, dest_path: &Path) -> std::io::Result<()> {
    warn!(
        "symlinks are not supported on this platform; skipping {} -> {}",
        dest_path.display(),
        target.display()
    );

    Ok(())
}
