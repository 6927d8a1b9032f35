// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Managed long-term storage of imported applications.

use {
    crate::session::SessionId,
    std::path::{Path, PathBuf},
};

/// Directory under the storage root holding unsigned applications.
pub const UNSIGNED_DIR_NAME: &str = "Unsigned";

/// Layout of managed storage.
///
/// Each session owns exactly one directory, `<root>/Unsigned/<session id>`,
/// holding the application bundle directly.
#[derive(Clone, Debug)]
pub struct ManagedStorage {
    root: PathBuf,
}

impl ManagedStorage {
    pub fn new(root: impl AsRef<Path>) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
        }
    }

    /// Directory holding all unsigned applications.
    pub fn unsigned_dir(&self) -> PathBuf {
        self.root.join(UNSIGNED_DIR_NAME)
    }

    /// Directory owned by a session.
    pub fn path_for(&self, session_id: &SessionId) -> PathBuf {
        self.unsigned_dir().join(session_id.to_string())
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn layout_is_deterministic() {
        let storage = ManagedStorage::new("/data");
        let id = SessionId::new();

        assert_eq!(storage.path_for(&id), storage.path_for(&id));
        assert_eq!(
            storage.path_for(&id),
            Path::new("/data").join("Unsigned").join(id.to_string())
        );
        assert_ne!(storage.path_for(&id), storage.path_for(&SessionId::new()));
    }
}
