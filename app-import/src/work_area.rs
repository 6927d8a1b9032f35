// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Per-session scratch directories.

use {
    crate::session::SessionId,
    log::warn,
    std::path::{Path, PathBuf},
};

/// A single-use scratch directory owned by one import session.
///
/// The directory is removed when the value is dropped.
#[derive(Debug)]
pub struct WorkArea {
    path: PathBuf,
}

impl WorkArea {
    /// Allocate the work area for a session under `root`.
    ///
    /// The directory name embeds the session identifier, so sessions never
    /// share a work area. An already existing directory is reused.
    pub fn create(root: &Path, session_id: &SessionId) -> std::io::Result<Self> {
        let path = root.join(format!("{}.import", session_id));
        std::fs::create_dir_all(&path)?;

        Ok(Self { path })
    }

    /// The work area directory.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Remove the work area directory tree.
    ///
    /// Removing an absent directory is not an error.
    pub fn destroy(&self) -> std::io::Result<()> {
        match std::fs::remove_dir_all(&self.path) {
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            res => res,
        }
    }
}

impl Drop for WorkArea {
    fn drop(&mut self) {
        if let Err(e) = self.destroy() {
            warn!("unable to remove work area {}: {}", self.path.display(), e);
        }
    }
}

#[cfg(test)]
mod test {
    use {super::*, anyhow::Result};

    #[test]
    fn lifecycle() -> Result<()> {
        let td = tempfile::Builder::new().prefix("app-import-").tempdir()?;
        let id = SessionId::new();

        let work_area = WorkArea::create(td.path(), &id)?;
        let path = work_area.path().to_path_buf();
        assert!(path.is_dir());
        assert!(path
            .file_name()
            .map(|name| name.to_string_lossy().contains(&id.to_string()))
            .unwrap_or(false));

        std::fs::write(path.join("file"), b"data")?;

        // Creation is idempotent and keeps existing content.
        let again = WorkArea::create(td.path(), &id)?;
        assert_eq!(again.path(), path);
        assert!(path.join("file").is_file());

        work_area.destroy()?;
        assert!(!path.exists());

        // Destroying an absent directory is fine, including on drop.
        work_area.destroy()?;
        drop(again);

        Ok(())
    }

    #[test]
    fn drop_removes_directory() -> Result<()> {
        let td = tempfile::Builder::new().prefix("app-import-").tempdir()?;

        let path = {
            let work_area = WorkArea::create(td.path(), &SessionId::new())?;
            std::fs::create_dir_all(work_area.path().join("Payload").join("Demo.app"))?;
            work_area.path().to_path_buf()
        };

        assert!(!path.exists());

        Ok(())
    }

    #[test]
    fn distinct_sessions_distinct_directories() -> Result<()> {
        let td = tempfile::Builder::new().prefix("app-import-").tempdir()?;

        let a = WorkArea::create(td.path(), &SessionId::new())?;
        let b = WorkArea::create(td.path(), &SessionId::new())?;
        assert_ne!(a.path(), b.path());

        Ok(())
    }
}
