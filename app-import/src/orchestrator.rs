// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

/*! Sequencing of a single import session.

An [ImportOrchestrator] drives one archive through
copy, extraction (including library injection), relocation into managed
storage and cataloging. The session's work area is owned by a guard that
removes it when [ImportOrchestrator::run] returns, whatever the outcome.
*/

use {
    crate::{
        catalog::{Catalog, CatalogEntry},
        error::{ExtractionError, ImportError, ImportStage},
        extractor::ArchiveExtractor,
        injector::InjectionReport,
        libraries::SharedLibrarySource,
        progress::{MonotonicProgress, ProgressSink},
        relocator::PayloadRelocator,
        session::{CancellationFlag, ImportSession, SessionId},
        settings::ImportSettings,
        work_area::WorkArea,
    },
    app_bundles::{find_app_bundle, BundleMetadata},
    log::{debug, error, info, warn},
    std::{
        path::{Path, PathBuf},
        sync::Arc,
    },
};

/// Lifecycle state of an import session.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ImportState {
    Created,
    Copied,
    Extracted,
    Relocated,
    Cataloged,
    /// The session stopped at the given stage.
    Failed(ImportStage),
    /// The work area has been released.
    Cleaned,
}

impl ImportState {
    /// Whether moving from this state to `next` is a legal transition.
    pub fn can_advance_to(&self, next: ImportState) -> bool {
        match (*self, next) {
            (Self::Created, Self::Copied)
            | (Self::Copied, Self::Extracted)
            | (Self::Extracted, Self::Relocated)
            | (Self::Relocated, Self::Cataloged) => true,
            (Self::Cataloged | Self::Failed(_), Self::Cleaned) => true,
            (current, Self::Failed(_)) => !current.is_terminal(),
            _ => false,
        }
    }

    /// Whether the pipeline has stopped and only cleanup remains.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Cataloged | Self::Failed(_) | Self::Cleaned)
    }
}

impl std::fmt::Display for ImportState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Created => f.write_str("created"),
            Self::Copied => f.write_str("copied"),
            Self::Extracted => f.write_str("extracted"),
            Self::Relocated => f.write_str("relocated"),
            Self::Cataloged => f.write_str("cataloged"),
            Self::Failed(stage) => write!(f, "failed during {}", stage),
            Self::Cleaned => f.write_str("cleaned"),
        }
    }
}

/// Result of a completed import.
#[derive(Debug)]
pub struct ImportOutcome {
    pub session: ImportSession,

    /// Managed storage directory holding the payload.
    pub destination: PathBuf,

    /// The application bundle inside [Self::destination].
    pub bundle_path: Option<PathBuf>,

    pub metadata: BundleMetadata,

    /// Outcome of library injection, if it ran.
    pub injection: Option<InjectionReport>,

    /// The recorded catalog entry. `None` if recording failed.
    pub catalog_entry: Option<CatalogEntry>,

    /// Every state the session passed through, in order.
    pub states: Vec<ImportState>,
}

/// Drives a single import session.
pub struct ImportOrchestrator {
    session: ImportSession,
    settings: ImportSettings,
    catalog: Arc<dyn Catalog>,
    libraries: Option<Arc<dyn SharedLibrarySource>>,
    credential: Option<PathBuf>,
    progress: MonotonicProgress,
    cancel: CancellationFlag,
    state: ImportState,
    history: Vec<ImportState>,
}

impl ImportOrchestrator {
    /// Construct a session importing `archive`.
    pub fn new(
        archive: impl Into<PathBuf>,
        settings: ImportSettings,
        catalog: Arc<dyn Catalog>,
    ) -> Self {
        Self {
            session: ImportSession::new(archive),
            settings,
            catalog,
            libraries: None,
            credential: None,
            progress: MonotonicProgress::new(),
            cancel: CancellationFlag::new(),
            state: ImportState::Created,
            history: vec![ImportState::Created],
        }
    }

    /// Inject libraries from `source` into the extracted bundle.
    ///
    /// Ignored when the settings disable injection.
    #[must_use]
    pub fn with_libraries(mut self, source: Arc<dyn SharedLibrarySource>) -> Self {
        self.libraries = Some(source);
        self
    }

    /// Associate a signing credential file with the imported application.
    #[must_use]
    pub fn with_credential(mut self, path: impl Into<PathBuf>) -> Self {
        self.credential = Some(path.into());
        self
    }

    #[must_use]
    pub fn with_install_intent(mut self, install: bool) -> Self {
        self.session.install = install;
        self
    }

    /// Identify the download whose progress display this session feeds.
    #[must_use]
    pub fn with_download_id(mut self, id: impl ToString) -> Self {
        self.session.download_id = Some(id.to_string());
        self
    }

    /// Register an additional progress sink.
    #[must_use]
    pub fn with_progress(mut self, sink: Arc<dyn ProgressSink>) -> Self {
        self.progress.add_sink(sink);
        self
    }

    /// A handle for cancelling the session from another thread.
    pub fn cancellation(&self) -> CancellationFlag {
        self.cancel.clone()
    }

    pub fn session(&self) -> &ImportSession {
        &self.session
    }

    pub fn session_id(&self) -> SessionId {
        self.session.id
    }

    pub fn state(&self) -> ImportState {
        self.state
    }

    /// Run the session to completion.
    ///
    /// The work area is removed before this returns, on success and failure.
    pub fn run(mut self) -> Result<ImportOutcome, ImportError> {
        info!(
            "importing {} as session {}",
            self.session.archive.display(),
            self.session.id
        );

        let mut work_area = None;
        let res = self.run_stages(&mut work_area);

        if let Err(e) = &res {
            warn!("import session {} failed: {}", self.session.id, e);
            if let Some(stage) = e.stage() {
                self.advance(ImportState::Failed(stage));
            }
        }

        drop(work_area);
        self.advance(ImportState::Cleaned);

        let history = std::mem::take(&mut self.history);

        res.map(|mut outcome| {
            outcome.states = history;
            outcome
        })
    }

    fn advance(&mut self, next: ImportState) {
        debug_assert!(
            self.state.can_advance_to(next),
            "illegal transition {} -> {}",
            self.state,
            next
        );
        debug!("session {}: {} -> {}", self.session.id, self.state, next);

        self.state = next;
        self.history.push(next);
    }

    fn check_cancelled(&self, stage: ImportStage) -> Result<(), ImportError> {
        if self.cancel.is_cancelled() {
            Err(ImportError::Cancelled(stage))
        } else {
            Ok(())
        }
    }

    fn run_stages(
        &mut self,
        work_area: &mut Option<WorkArea>,
    ) -> Result<ImportOutcome, ImportError> {
        self.check_cancelled(ImportStage::Copy)?;
        let archive = self.session.archive.clone();

        let work_area = work_area.insert(
            WorkArea::create(self.settings.work_root(), &self.session.id).map_err(|source| {
                ImportError::CopyFailed {
                    path: archive.clone(),
                    source,
                }
            })?,
        );
        self.session.work_dir = Some(work_area.path().to_path_buf());

        let local_archive = copy_archive(&archive, work_area.path())?;
        self.advance(ImportState::Copied);

        self.check_cancelled(ImportStage::Extract)?;
        let mut extractor = ArchiveExtractor::new();
        if self.settings.inject_libraries() {
            if let Some(source) = &self.libraries {
                extractor = extractor.with_libraries(source.clone());
            }
        }

        let payload = extractor
            .extract(&local_archive, work_area, &self.progress, &self.cancel)
            .map_err(|e| match e {
                ExtractionError::Cancelled => ImportError::Cancelled(ImportStage::Extract),
                source => ImportError::ExtractionFailed {
                    path: archive.clone(),
                    source,
                },
            })?;
        self.session.payload_dir = Some(payload.payload_dir.clone());
        self.advance(ImportState::Extracted);

        self.check_cancelled(ImportStage::Relocate)?;
        let destination = PayloadRelocator::new(self.settings.storage()).relocate(
            work_area,
            &payload.payload_dir,
            &self.session.id,
        )?;
        self.advance(ImportState::Relocated);

        let bundle_path = find_app_bundle(&destination);
        let metadata = bundle_path
            .as_deref()
            .map(BundleMetadata::read)
            .unwrap_or_default();
        if metadata.is_empty() {
            warn!(
                "no bundle metadata found under {}; cataloging without it",
                destination.display()
            );
        }

        let catalog_entry = self.record(&destination, bundle_path.as_deref(), &metadata);

        Ok(ImportOutcome {
            session: self.session.clone(),
            destination,
            bundle_path,
            metadata,
            injection: payload.injection,
            catalog_entry,
            states: vec![],
        })
    }

    /// Record the imported application in the catalog.
    ///
    /// Failures are logged and leave the relocated payload in place.
    fn record(
        &mut self,
        destination: &Path,
        bundle_path: Option<&Path>,
        metadata: &BundleMetadata,
    ) -> Option<CatalogEntry> {
        let mut entry = CatalogEntry::new(self.session.id, metadata)
            .with_source_path(bundle_path.unwrap_or(destination));

        if let Some(path) = &self.credential {
            match signing_credential::decode(path) {
                Some(credential) => {
                    info!(
                        "associating signing credential {} ({})",
                        path.display(),
                        credential.name().unwrap_or("unnamed")
                    );
                    entry = entry.with_credential(path);
                }
                None => {
                    warn!(
                        "{} is not a usable signing credential; not associating it",
                        path.display()
                    );
                }
            }
        }

        match self.catalog.record(&entry) {
            Ok(()) => {
                info!(
                    "cataloged {} ({})",
                    entry.identifier.as_deref().unwrap_or("unknown identifier"),
                    entry.version.as_deref().unwrap_or("unknown version")
                );
                self.advance(ImportState::Cataloged);
                Some(entry)
            }
            Err(e) => {
                error!(
                    "unable to record session {} in catalog: {}; payload remains at {}",
                    self.session.id,
                    e,
                    destination.display()
                );
                self.advance(ImportState::Failed(ImportStage::Catalog));
                None
            }
        }
    }
}

/// Copy `archive` into `dir` under its own file name, replacing any existing file.
fn copy_archive(archive: &Path, dir: &Path) -> Result<PathBuf, ImportError> {
    let copy_failed = |source| ImportError::CopyFailed {
        path: archive.to_path_buf(),
        source,
    };

    let file_name = archive.file_name().ok_or_else(|| {
        copy_failed(std::io::Error::new(
            std::io::ErrorKind::InvalidInput,
            "archive path has no file name",
        ))
    })?;

    let dest = dir.join(file_name);
    if dest.exists() {
        std::fs::remove_file(&dest).map_err(copy_failed)?;
    }

    debug!("copying {} to {}", archive.display(), dest.display());
    std::fs::copy(archive, &dest).map_err(copy_failed)?;

    Ok(dest)
}
