// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Import session identity and state.

use {
    serde::{Deserialize, Serialize},
    std::{
        path::PathBuf,
        str::FromStr,
        sync::{
            atomic::{AtomicBool, Ordering},
            Arc,
        },
    },
    uuid::Uuid,
};

/// Unique identifier of an import session.
///
/// Names the session's work area and its directory in managed storage.
#[derive(Clone, Copy, Debug, Deserialize, Eq, Hash, Ord, PartialEq, PartialOrd, Serialize)]
#[serde(transparent)]
pub struct SessionId(Uuid);

impl SessionId {
    /// Generate a fresh identifier.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for SessionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0.hyphenated())
    }
}

impl FromStr for SessionId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(Uuid::parse_str(s)?))
    }
}

/// State of a single import.
#[derive(Clone, Debug)]
pub struct ImportSession {
    /// Identifier of this session.
    pub id: SessionId,

    /// The archive being imported.
    pub archive: PathBuf,

    /// Work area directory, once allocated.
    pub work_dir: Option<PathBuf>,

    /// Extracted `Payload` directory, once extraction succeeded.
    pub payload_dir: Option<PathBuf>,

    /// Whether the caller intends to install the application after import.
    pub install: bool,

    /// Download task whose progress display this session feeds.
    pub download_id: Option<String>,
}

impl ImportSession {
    pub fn new(archive: impl Into<PathBuf>) -> Self {
        Self {
            id: SessionId::new(),
            archive: archive.into(),
            work_dir: None,
            payload_dir: None,
            install: false,
            download_id: None,
        }
    }
}

/// Cooperative cancellation signal shared between a session and its caller.
#[derive(Clone, Debug, Default)]
pub struct CancellationFlag(Arc<AtomicBool>);

impl CancellationFlag {
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation.
    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}
