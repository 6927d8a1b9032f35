// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Bundles backed by a directory.

use {
    crate::APP_BUNDLE_SUFFIX,
    anyhow::{anyhow, Context, Result},
    std::path::Path,
};

/// Name of the directory within a bundle holding embedded frameworks and libraries.
pub const FRAMEWORKS_DIR_NAME: &str = "Frameworks";

/// An application bundle backed by a filesystem directory.
///
/// iOS application bundles are *shallow*: `Info.plist` lives at the root of
/// the bundle. macOS bundles keep their content in a `Contents/` directory.
/// Both layouts are accepted.
#[derive(Clone, Debug)]
pub struct DirectoryBundle {
    /// Name of the root directory.
    root_name: String,

    /// Parsed `Info.plist` file.
    info_plist: plist::Dictionary,
}

impl DirectoryBundle {
    /// Open an existing bundle from a filesystem path.
    ///
    /// The specified path should be the root directory of the bundle.
    ///
    /// Validation is limited to locating and parsing an `Info.plist` file
    /// holding a dictionary.
    pub fn new_from_path(directory: &Path) -> Result<Self> {
        if !directory.is_dir() {
            return Err(anyhow!("{} is not a directory", directory.display()));
        }

        let root_name = directory
            .file_name()
            .ok_or_else(|| anyhow!("unable to resolve root directory name"))?
            .to_string_lossy()
            .to_string();

        let contents = directory.join("Contents");
        let info_plist_path = if contents.is_dir() {
            contents.join("Info.plist")
        } else {
            directory.join("Info.plist")
        };

        if !info_plist_path.is_file() {
            return Err(anyhow!("Info.plist not found; not a valid bundle"));
        }

        let info_plist_data = std::fs::read(&info_plist_path)?;
        let cursor = std::io::Cursor::new(info_plist_data);
        let value = plist::Value::from_reader(cursor).context("parsing Info.plist")?;
        let info_plist = value
            .into_dictionary()
            .ok_or_else(|| anyhow!("{} is not a dictionary", info_plist_path.display()))?;

        Ok(Self {
            root_name,
            info_plist,
        })
    }

    /// The on-disk name of this bundle without its `.app` suffix.
    pub fn stem(&self) -> &str {
        self.root_name
            .strip_suffix(APP_BUNDLE_SUFFIX)
            .unwrap_or(&self.root_name)
    }

    /// Obtain an `Info.plist` key as a `String`.
    ///
    /// Will return `None` if the specified key doesn't exist. Errors if the key value
    /// is not a string.
    pub fn info_plist_key_string(&self, key: &str) -> Result<Option<String>> {
        if let Some(value) = self.info_plist.get(key) {
            Ok(Some(
                value
                    .as_string()
                    .ok_or_else(|| anyhow!("key {} is not a string", key))?
                    .to_string(),
            ))
        } else {
            Ok(None)
        }
    }

    /// Obtain the bundle display name.
    ///
    /// This retrieves the value of `CFBundleDisplayName` from the `Info.plist`.
    pub fn display_name(&self) -> Result<Option<String>> {
        self.info_plist_key_string("CFBundleDisplayName")
    }

    /// Obtain the short bundle name (`CFBundleName`).
    pub fn bundle_name(&self) -> Result<Option<String>> {
        self.info_plist_key_string("CFBundleName")
    }

    /// Obtain the bundle identifier.
    ///
    /// This retrieves `CFBundleIdentifier` from the `Info.plist`.
    pub fn identifier(&self) -> Result<Option<String>> {
        self.info_plist_key_string("CFBundleIdentifier")
    }

    /// Obtain the bundle build version string (`CFBundleVersion`).
    pub fn version(&self) -> Result<Option<String>> {
        self.info_plist_key_string("CFBundleVersion")
    }

    /// Obtain the user-facing version string (`CFBundleShortVersionString`).
    pub fn short_version(&self) -> Result<Option<String>> {
        self.info_plist_key_string("CFBundleShortVersionString")
    }

    /// Obtain filenames of the bundle's primary icon files.
    ///
    /// Modern bundles declare icons under `CFBundleIcons` ->
    /// `CFBundlePrimaryIcon` -> `CFBundleIconFiles`. Older bundles use a
    /// top-level `CFBundleIconFiles`. The former takes precedence.
    pub fn icon_files(&self) -> Result<Option<Vec<String>>> {
        let primary = self
            .info_plist
            .get("CFBundleIcons")
            .and_then(|v| v.as_dictionary())
            .and_then(|d| d.get("CFBundlePrimaryIcon"))
            .and_then(|v| v.as_dictionary())
            .and_then(|d| d.get("CFBundleIconFiles"));

        let value = match primary.or_else(|| self.info_plist.get("CFBundleIconFiles")) {
            Some(value) => value,
            None => return Ok(None),
        };

        let values = value
            .as_array()
            .ok_or_else(|| anyhow!("CFBundleIconFiles not an array"))?;

        Ok(Some(
            values
                .iter()
                .map(|x| {
                    Ok(x.as_string()
                        .ok_or_else(|| anyhow!("CFBundleIconFiles value not a string"))?
                        .to_string())
                })
                .collect::<Result<Vec<_>>>()?,
        ))
    }

    /// Obtain the legacy single icon file name (`CFBundleIconFile`).
    pub fn icon_file(&self) -> Result<Option<String>> {
        self.info_plist_key_string("CFBundleIconFile")
    }
}

#[cfg(test)]
mod test {
    use {
        super::*,
        std::{fs::create_dir_all, path::PathBuf},
    };

    fn temp_dir() -> Result<(tempfile::TempDir, PathBuf)> {
        let td = tempfile::Builder::new()
            .prefix("app-bundles-")
            .tempdir()?;
        let path = td.path().to_path_buf();

        Ok((td, path))
    }

    #[test]
    fn shallow_app() -> Result<()> {
        let (_temp, td) = temp_dir()?;

        // Empty directory fails.
        let root = td.join("Demo.app");
        create_dir_all(&root)?;
        assert!(DirectoryBundle::new_from_path(&root).is_err());

        // Empty Info.plist fails.
        let plist_path = root.join("Info.plist");
        std::fs::write(&plist_path, b"")?;
        assert!(DirectoryBundle::new_from_path(&root).is_err());

        // Non-dictionary plist fails.
        plist::Value::from("hello").to_file_xml(&plist_path)?;
        assert!(DirectoryBundle::new_from_path(&root).is_err());

        // Empty plist dictionary works.
        plist::Value::from(plist::Dictionary::new()).to_file_xml(&plist_path)?;
        let bundle = DirectoryBundle::new_from_path(&root)?;

        assert_eq!(bundle.stem(), "Demo");
        assert_eq!(bundle.identifier()?, None);

        Ok(())
    }

    #[test]
    fn deep_bundle() -> Result<()> {
        let (_temp, td) = temp_dir()?;

        let root = td.join("Plugin");
        let contents = root.join("Contents");
        create_dir_all(&contents)?;

        let mut dict = plist::Dictionary::new();
        dict.insert("CFBundleIdentifier".into(), "com.example.plugin".into());
        plist::Value::from(dict).to_file_xml(contents.join("Info.plist"))?;

        // A stray root Info.plist is ignored in favor of Contents/Info.plist.
        plist::Value::from(plist::Dictionary::new()).to_file_xml(root.join("Info.plist"))?;

        let bundle = DirectoryBundle::new_from_path(&root)?;
        assert_eq!(bundle.stem(), "Plugin");
        assert_eq!(bundle.identifier()?, Some("com.example.plugin".into()));

        Ok(())
    }

    #[test]
    fn icon_precedence() -> Result<()> {
        let (_temp, td) = temp_dir()?;
        let root = td.join("Icons.app");
        create_dir_all(&root)?;

        let mut primary = plist::Dictionary::new();
        primary.insert(
            "CFBundleIconFiles".into(),
            plist::Value::Array(vec!["AppIcon20x20".into(), "AppIcon60x60".into()]),
        );
        let mut icons = plist::Dictionary::new();
        icons.insert("CFBundlePrimaryIcon".into(), primary.into());

        let mut dict = plist::Dictionary::new();
        dict.insert("CFBundleIcons".into(), icons.into());
        dict.insert(
            "CFBundleIconFiles".into(),
            plist::Value::Array(vec!["Legacy".into()]),
        );
        plist::Value::from(dict).to_file_xml(root.join("Info.plist"))?;

        let bundle = DirectoryBundle::new_from_path(&root)?;
        assert_eq!(
            bundle.icon_files()?,
            Some(vec!["AppIcon20x20".to_string(), "AppIcon60x60".to_string()])
        );

        Ok(())
    }

    #[test]
    fn wrong_typed_key() -> Result<()> {
        let (_temp, td) = temp_dir()?;
        let root = td.join("Typed.app");
        create_dir_all(&root)?;

        let mut dict = plist::Dictionary::new();
        dict.insert("CFBundleVersion".into(), plist::Value::Integer(42i64.into()));
        dict.insert("CFBundleIconFiles".into(), "not-an-array".into());
        plist::Value::from(dict).to_file_xml(root.join("Info.plist"))?;

        let bundle = DirectoryBundle::new_from_path(&root)?;
        assert!(bundle.version().is_err());
        assert!(bundle.icon_files().is_err());
        assert_eq!(bundle.short_version()?, None);

        Ok(())
    }
}
