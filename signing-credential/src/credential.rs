// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Signing credential records.

use {
    chrono::{DateTime, Utc},
    serde::{Deserialize, Serialize},
    std::time::SystemTime,
};

/// Structured fields of a provisioning profile's embedded property list.
///
/// Every field is optional: profiles issued for different platforms and
/// distribution types omit different keys.
#[derive(Clone, Debug, Default, Deserialize, PartialEq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct ProvisioningProfile {
    #[serde(rename = "AppIDName", default)]
    pub app_id_name: Option<String>,

    #[serde(default)]
    pub application_identifier_prefix: Option<Vec<String>>,

    #[serde(default)]
    pub creation_date: Option<plist::Date>,

    /// DER encoded X.509 certificates allowed to sign with this profile.
    #[serde(default)]
    pub developer_certificates: Option<Vec<plist::Data>>,

    #[serde(default)]
    pub entitlements: Option<plist::Dictionary>,

    #[serde(default)]
    pub expiration_date: Option<plist::Date>,

    #[serde(default)]
    pub is_xcode_managed: Option<bool>,

    #[serde(default)]
    pub name: Option<String>,

    #[serde(default)]
    pub platform: Option<Vec<String>>,

    #[serde(default)]
    pub provisioned_devices: Option<Vec<String>>,

    #[serde(default)]
    pub provisions_all_devices: Option<bool>,

    #[serde(default)]
    pub team_identifier: Option<Vec<String>>,

    #[serde(default)]
    pub team_name: Option<String>,

    /// Validity in days.
    #[serde(default)]
    pub time_to_live: Option<u64>,

    #[serde(rename = "UUID", default)]
    pub uuid: Option<String>,

    #[serde(default)]
    pub version: Option<u64>,

    #[serde(rename = "PPQCheck", default)]
    pub ppq_check: Option<bool>,
}

/// A decoded signing credential.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct SigningCredential {
    /// Fields decoded from the embedded document.
    pub profile: ProvisioningProfile,

    /// Whether the credential is subject to PPQ checks.
    ///
    /// Taken from the document's `PPQCheck` key when present, otherwise
    /// derived from a scan of the raw file.
    pub ppq_check: bool,
}

impl SigningCredential {
    /// The profile's display name.
    pub fn name(&self) -> Option<&str> {
        self.profile.name.as_deref()
    }

    /// The first team identifier in the profile.
    pub fn team_identifier(&self) -> Option<&str> {
        self.profile
            .team_identifier
            .as_ref()
            .and_then(|ids| ids.first())
            .map(|id| id.as_str())
    }

    /// Number of developer certificates embedded in the profile.
    pub fn developer_certificate_count(&self) -> usize {
        self.profile
            .developer_certificates
            .as_ref()
            .map(|certs| certs.len())
            .unwrap_or(0)
    }

    /// Look up an entitlement value by key.
    pub fn entitlement(&self, key: &str) -> Option<&plist::Value> {
        self.profile
            .entitlements
            .as_ref()
            .and_then(|entitlements| entitlements.get(key))
    }

    /// The expiration date as a UTC timestamp.
    pub fn expiration(&self) -> Option<DateTime<Utc>> {
        self.profile
            .expiration_date
            .map(|date| DateTime::<Utc>::from(SystemTime::from(date)))
    }

    /// Whether the profile is expired at `now`.
    ///
    /// A profile without an expiration date never expires.
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.expiration()
            .map(|expiration| expiration <= now)
            .unwrap_or(false)
    }
}
