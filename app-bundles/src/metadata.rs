// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Descriptive bundle metadata.

use {
    crate::DirectoryBundle,
    serde::{Deserialize, Serialize},
    std::path::Path,
};

/// Descriptive metadata of an application bundle.
///
/// Every field is resolved independently. A missing or wrongly typed
/// `Info.plist` key only clears the field it feeds.
#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
pub struct BundleMetadata {
    /// Human readable application name.
    pub name: Option<String>,

    /// Reverse-domain bundle identifier, e.g. `com.example.demo`.
    pub identifier: Option<String>,

    /// User-facing version string.
    pub version: Option<String>,

    /// File name of the primary icon, relative to the bundle root.
    pub icon: Option<String>,
}

impl BundleMetadata {
    /// Derive metadata from an opened bundle.
    pub fn from_bundle(bundle: &DirectoryBundle) -> Self {
        let name = bundle
            .display_name()
            .ok()
            .flatten()
            .or_else(|| bundle.bundle_name().ok().flatten())
            .or_else(|| Some(bundle.stem().to_string()))
            .filter(|name| !name.is_empty());

        let version = bundle
            .short_version()
            .ok()
            .flatten()
            .or_else(|| bundle.version().ok().flatten());

        // The last declared icon file is conventionally the largest.
        let icon = bundle
            .icon_files()
            .ok()
            .flatten()
            .and_then(|files| files.into_iter().last())
            .or_else(|| bundle.icon_file().ok().flatten());

        Self {
            name,
            identifier: bundle.identifier().ok().flatten(),
            version,
            icon,
        }
    }

    /// Read metadata from the bundle rooted at `path`.
    ///
    /// A directory that can't be opened as a bundle yields metadata with
    /// every field absent.
    pub fn read(path: &Path) -> Self {
        match DirectoryBundle::new_from_path(path) {
            Ok(bundle) => Self::from_bundle(&bundle),
            Err(e) => {
                log::warn!("unable to read bundle metadata from {}: {:#}", path.display(), e);
                Self::default()
            }
        }
    }

    /// Whether no field could be resolved.
    pub fn is_empty(&self) -> bool {
        self.name.is_none()
            && self.identifier.is_none()
            && self.version.is_none()
            && self.icon.is_none()
    }
}
