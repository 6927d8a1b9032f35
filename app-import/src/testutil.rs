// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use {
    anyhow::Result,
    std::{io::Write, path::Path},
};

/// Serialize an `Info.plist` with the given identifier and version.
pub fn info_plist(identifier: &str, version: &str) -> Result<Vec<u8>> {
    let mut dict = plist::Dictionary::new();
    dict.insert("CFBundleIdentifier".into(), identifier.into());
    dict.insert("CFBundleShortVersionString".into(), version.into());
    dict.insert("CFBundlePackageType".into(), "APPL".into());

    let mut data = vec![];
    plist::Value::Dictionary(dict).to_writer_xml(&mut data)?;

    Ok(data)
}

/// Write a zip archive holding the given `(name, content)` file entries.
///
/// Names ending in `/` become directory entries.
pub fn write_zip(path: &Path, entries: &[(&str, &[u8])]) -> Result<()> {
    let mut zf = zip::ZipWriter::new(std::fs::File::create(path)?);

    for (name, data) in entries {
        if name.ends_with('/') {
            zf.add_directory(*name, zip::write::FileOptions::default())?;
        } else {
            let options = zip::write::FileOptions::default().unix_permissions(0o644);
            zf.start_file(*name, options)?;
            zf.write_all(data)?;
        }
    }

    zf.finish()?;

    Ok(())
}

/// Write a well-formed application archive for `Demo.app`.
pub fn write_demo_archive(path: &Path, identifier: &str, version: &str) -> Result<()> {
    let plist = info_plist(identifier, version)?;

    write_zip(
        path,
        &[
            ("Payload/", b""),
            ("Payload/Demo.app/", b""),
            ("Payload/Demo.app/Info.plist", &plist),
            ("Payload/Demo.app/Demo", b"\xcf\xfa\xed\xfe binary"),
        ],
    )
}
