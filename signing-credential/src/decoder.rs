// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Decoding of signing credential files.

use {
    crate::{CredentialError, ProvisioningProfile, SigningCredential},
    std::path::Path,
};

/// Marks the start of the embedded property list document.
pub const XML_DOCUMENT_MARKER: &[u8] = b"<?xml";

/// Closing tag of the embedded property list document.
const PLIST_END_MARKER: &[u8] = b"</plist>";

/// Uppercase marker searched for in the raw credential bytes.
pub const PPQ_CHECK_MARKER: &[u8] = b"PPQCHECK";

fn find_subslice(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack
        .windows(needle.len())
        .position(|window| window == needle)
}

fn rfind_subslice(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack
        .windows(needle.len())
        .rposition(|window| window == needle)
}

/// Extract the embedded XML document from raw credential bytes.
///
/// The document starts at the first `<?xml`. The CMS signature follows the
/// document, so anything after the last `</plist>` is dropped.
pub fn embedded_document(data: &[u8]) -> Option<&[u8]> {
    let start = find_subslice(data, XML_DOCUMENT_MARKER)?;
    let document = &data[start..];

    Some(match rfind_subslice(document, PLIST_END_MARKER) {
        Some(end) => &document[..end + PLIST_END_MARKER.len()],
        None => document,
    })
}

/// Whether the uppercased raw bytes contain [PPQ_CHECK_MARKER].
///
/// The whole input is scanned, including any binary content preceding
/// the embedded document.
pub fn contains_ppq_marker(data: &[u8]) -> bool {
    find_subslice(&data.to_ascii_uppercase(), PPQ_CHECK_MARKER).is_some()
}

/// Decode raw credential bytes, reporting why decoding failed.
pub fn try_decode_bytes(data: &[u8]) -> Result<SigningCredential, CredentialError> {
    let document = embedded_document(data).ok_or(CredentialError::MissingDocument)?;

    let profile: ProvisioningProfile =
        plist::from_reader_xml(std::io::Cursor::new(document))
            .map_err(CredentialError::PlistParseXml)?;

    let ppq_check = match profile.ppq_check {
        Some(value) => value,
        None => contains_ppq_marker(data),
    };

    Ok(SigningCredential { profile, ppq_check })
}

/// Read and decode a credential file, reporting why decoding failed.
pub fn try_decode(path: impl AsRef<Path>) -> Result<SigningCredential, CredentialError> {
    let data = std::fs::read(path.as_ref())?;

    try_decode_bytes(&data)
}

/// Decode raw credential bytes.
///
/// Returns `None` if the bytes don't hold a decodable credential.
pub fn decode_bytes(data: &[u8]) -> Option<SigningCredential> {
    match try_decode_bytes(data) {
        Ok(credential) => Some(credential),
        Err(e) => {
            log::debug!("unable to decode signing credential: {}", e);
            None
        }
    }
}

/// Read and decode a credential file.
///
/// Returns `None` if the file can't be read or doesn't hold a decodable
/// credential. Callers treat an absent credential as unsigned.
pub fn decode(path: impl AsRef<Path>) -> Option<SigningCredential> {
    let path = path.as_ref();

    match try_decode(path) {
        Ok(credential) => Some(credential),
        Err(e) => {
            log::debug!(
                "unable to decode signing credential {}: {}",
                path.display(),
                e
            );
            None
        }
    }
}
