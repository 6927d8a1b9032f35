// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use thiserror::Error;

/// Reasons a signing credential could not be decoded.
#[derive(Debug, Error)]
pub enum CredentialError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("no embedded XML document found")]
    MissingDocument,

    #[error("error parsing plist XML: {0}")]
    PlistParseXml(plist::Error),
}
