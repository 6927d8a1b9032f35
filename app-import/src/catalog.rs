// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

/*! Persistent records of imported applications.

Every successful import appends one [CatalogEntry]. Entries are never
updated in place, so re-importing an archive yields a second entry under a
new session identifier.
*/

use {
    crate::{error::CatalogError, session::SessionId},
    app_bundles::BundleMetadata,
    chrono::{DateTime, Utc},
    serde::{Deserialize, Serialize},
    std::{
        io::{BufRead, BufReader, Write},
        path::PathBuf,
        sync::Mutex,
    },
};

/// A record describing one imported application.
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub struct CatalogEntry {
    /// Session that produced the entry. Names the managed storage directory.
    pub session_id: SessionId,

    /// Application bundle inside managed storage.
    pub source_path: Option<PathBuf>,

    pub created_at: DateTime<Utc>,

    /// Signing credential associated with the application.
    pub credential: Option<PathBuf>,

    pub name: Option<String>,
    pub identifier: Option<String>,
    pub version: Option<String>,

    /// File name of the application icon within the bundle.
    pub icon: Option<String>,
}

impl CatalogEntry {
    /// Construct an entry timestamped now.
    pub fn new(session_id: SessionId, metadata: &BundleMetadata) -> Self {
        Self {
            session_id,
            source_path: None,
            created_at: Utc::now(),
            credential: None,
            name: metadata.name.clone(),
            identifier: metadata.identifier.clone(),
            version: metadata.version.clone(),
            icon: metadata.icon.clone(),
        }
    }

    #[must_use]
    pub fn with_source_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.source_path = Some(path.into());
        self
    }

    #[must_use]
    pub fn with_credential(mut self, path: impl Into<PathBuf>) -> Self {
        self.credential = Some(path.into());
        self
    }
}

/// Storage of catalog entries.
pub trait Catalog: Send + Sync {
    /// Insert a new entry.
    fn record(&self, entry: &CatalogEntry) -> Result<(), CatalogError>;

    /// All entries in insertion order.
    fn entries(&self) -> Result<Vec<CatalogEntry>, CatalogError>;

    /// The most recently recorded entry.
    fn latest(&self) -> Result<Option<CatalogEntry>, CatalogError> {
        Ok(self.entries()?.pop())
    }
}

/// A catalog held in memory.
#[derive(Debug, Default)]
pub struct MemoryCatalog {
    entries: Mutex<Vec<CatalogEntry>>,
}

impl MemoryCatalog {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Catalog for MemoryCatalog {
    fn record(&self, entry: &CatalogEntry) -> Result<(), CatalogError> {
        self.entries
            .lock()
            .map_err(|_| CatalogError::Poisoned)?
            .push(entry.clone());

        Ok(())
    }

    fn entries(&self) -> Result<Vec<CatalogEntry>, CatalogError> {
        Ok(self
            .entries
            .lock()
            .map_err(|_| CatalogError::Poisoned)?
            .clone())
    }

    fn latest(&self) -> Result<Option<CatalogEntry>, CatalogError> {
        Ok(self
            .entries
            .lock()
            .map_err(|_| CatalogError::Poisoned)?
            .last()
            .cloned())
    }
}

/// A catalog persisted as a file holding one JSON object per line.
#[derive(Debug)]
pub struct JsonLinesCatalog {
    path: PathBuf,
    lock: Mutex<()>,
}

impl JsonLinesCatalog {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Mutex::new(()),
        }
    }
}

impl Catalog for JsonLinesCatalog {
    fn record(&self, entry: &CatalogEntry) -> Result<(), CatalogError> {
        let _guard = self.lock.lock().map_err(|_| CatalogError::Poisoned)?;

        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let mut line = serde_json::to_vec(entry)?;
        line.push(b'\n');

        let mut fh = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        fh.write_all(&line)?;

        Ok(())
    }

    fn entries(&self) -> Result<Vec<CatalogEntry>, CatalogError> {
        let _guard = self.lock.lock().map_err(|_| CatalogError::Poisoned)?;

        let fh = match std::fs::File::open(&self.path) {
            Ok(fh) => fh,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(vec![]),
            Err(e) => return Err(e.into()),
        };

        let mut res = vec![];

        for line in BufReader::new(fh).lines() {
            let line = line?;

            if line.trim().is_empty() {
                continue;
            }

            res.push(serde_json::from_str(&line)?);
        }

        Ok(res)
    }
}

#[cfg(test)]
mod test {
    use {super::*, anyhow::Result};

    fn metadata(identifier: &str) -> BundleMetadata {
        BundleMetadata {
            name: Some("Demo".into()),
            identifier: Some(identifier.into()),
            version: Some("1.0".into()),
            icon: None,
        }
    }

    #[test]
    fn memory_catalog() -> Result<()> {
        let catalog = MemoryCatalog::new();
        assert!(catalog.latest()?.is_none());

        let first = CatalogEntry::new(SessionId::new(), &metadata("com.example.a"));
        let second = CatalogEntry::new(SessionId::new(), &metadata("com.example.b"));
        catalog.record(&first)?;
        catalog.record(&second)?;

        assert_eq!(catalog.entries()?, vec![first, second.clone()]);
        assert_eq!(catalog.latest()?, Some(second));

        Ok(())
    }

    #[test]
    fn json_lines_catalog() -> Result<()> {
        let td = tempfile::Builder::new().prefix("app-import-").tempdir()?;
        let path = td.path().join("nested").join("catalog.jsonl");

        let catalog = JsonLinesCatalog::new(&path);
        assert!(catalog.entries()?.is_empty());
        assert!(catalog.latest()?.is_none());

        let first = CatalogEntry::new(SessionId::new(), &metadata("com.example.a"))
            .with_source_path("/storage/Unsigned/a/Demo.app")
            .with_credential("/profiles/demo.mobileprovision");
        let second = CatalogEntry::new(SessionId::new(), &BundleMetadata::default());
        catalog.record(&first)?;
        catalog.record(&second)?;

        assert_eq!(std::fs::read_to_string(&path)?.lines().count(), 2);

        // A fresh handle sees what the first one wrote.
        let reopened = JsonLinesCatalog::new(&path);
        assert_eq!(reopened.entries()?, vec![first, second.clone()]);
        assert_eq!(reopened.latest()?, Some(second));

        Ok(())
    }

    #[test]
    fn reimport_is_an_insert() -> Result<()> {
        let catalog = MemoryCatalog::new();
        let meta = metadata("com.example.a");

        catalog.record(&CatalogEntry::new(SessionId::new(), &meta))?;
        catalog.record(&CatalogEntry::new(SessionId::new(), &meta))?;

        let entries = catalog.entries()?;
        assert_eq!(entries.len(), 2);
        assert_ne!(entries[0].session_id, entries[1].session_id);

        Ok(())
    }

    #[test]
    fn malformed_line() -> Result<()> {
        let td = tempfile::Builder::new().prefix("app-import-").tempdir()?;
        let path = td.path().join("catalog.jsonl");
        std::fs::write(&path, b"{not json\n")?;

        assert!(matches!(
            JsonLinesCatalog::new(&path).entries(),
            Err(CatalogError::SerdeJson(_))
        ));

        Ok(())
    }
}
