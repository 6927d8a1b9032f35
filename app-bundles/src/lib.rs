// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

/*! Application bundles inside extracted archives.

An application archive (`.ipa`, `.tipa`) is a zip file whose root holds a
`Payload/` directory, which in turn holds exactly one `*.app` bundle
directory. This crate knows how to find that bundle ([find_app_bundle]),
open it ([DirectoryBundle]) and derive descriptive metadata from its
`Info.plist` ([BundleMetadata]).
*/

mod directory_bundle;
pub use directory_bundle::*;
mod metadata;
pub use metadata::*;

use std::path::{Path, PathBuf};

/// Name of the directory at the root of an application archive holding bundles.
pub const PAYLOAD_DIR_NAME: &str = "Payload";

/// Directory name suffix identifying an application bundle.
pub const APP_BUNDLE_SUFFIX: &str = ".app";

/// Find the application bundle directory inside a payload directory.
///
/// Returns the first directory (in file name order) whose name ends with `.app`.
/// `None` is returned if the payload directory can't be read or contains no
/// application bundle.
pub fn find_app_bundle(payload_dir: &Path) -> Option<PathBuf> {
    let entries = match std::fs::read_dir(payload_dir) {
        Ok(entries) => entries,
        Err(e) => {
            log::debug!("unable to read {}: {}", payload_dir.display(), e);
            return None;
        }
    };

    let mut candidates = entries
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|path| {
            path.is_dir()
                && path
                    .file_name()
                    .map(|name| name.to_string_lossy().ends_with(APP_BUNDLE_SUFFIX))
                    .unwrap_or(false)
        })
        .collect::<Vec<_>>();

    candidates.sort();

    if candidates.len() > 1 {
        log::warn!(
            "{} contains {} application bundles; using {}",
            payload_dir.display(),
            candidates.len(),
            candidates[0].display()
        );
    }

    candidates.into_iter().next()
}

#[cfg(test)]
mod test {
    use {super::*, anyhow::Result, std::fs::create_dir_all};

    #[test]
    fn find_app_bundle_in_payload() -> Result<()> {
        let td = tempfile::Builder::new().prefix("app-bundles-").tempdir()?;
        let payload = td.path().join(PAYLOAD_DIR_NAME);

        assert_eq!(find_app_bundle(&payload), None);

        create_dir_all(&payload)?;
        assert_eq!(find_app_bundle(&payload), None);

        std::fs::write(payload.join("Fake.app"), b"not a directory")?;
        create_dir_all(payload.join("Other"))?;
        assert_eq!(find_app_bundle(&payload), None);

        create_dir_all(payload.join("Zed.app"))?;
        create_dir_all(payload.join("Demo.app"))?;
        assert_eq!(find_app_bundle(&payload), Some(payload.join("Demo.app")));

        Ok(())
    }
}
