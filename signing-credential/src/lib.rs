// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

/*! Signing credential decoding.

A signing credential (an Apple *provisioning profile*, `.mobileprovision`)
is a CMS signed-data blob whose content is an XML property list. This crate
does not verify the CMS signature. It locates the embedded XML document
by scanning for the `<?xml` declaration, decodes it into a
[ProvisioningProfile] and wraps it in a [SigningCredential] together with
a heuristic flag that is derived from the raw file bytes when the
document does not carry it.

Decoding never fails loudly: [decode] and [decode_bytes] return `None`
for anything that isn't a readable credential. [try_decode_bytes] exposes
the reason for diagnostics.
*/

mod credential;
pub use credential::*;
mod decoder;
pub use decoder::*;
mod error;
pub use error::*;
