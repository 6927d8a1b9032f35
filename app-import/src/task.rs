// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Running import sessions as background tasks.

use {
    crate::{
        error::ImportError,
        orchestrator::{ImportOrchestrator, ImportOutcome},
        progress::ProgressSink,
        session::{CancellationFlag, SessionId},
    },
    std::sync::Arc,
    tokio::{
        sync::mpsc::{unbounded_channel, UnboundedReceiver, UnboundedSender},
        task::JoinHandle,
    },
};

/// A progress update of a background import.
#[derive(Clone, Debug, PartialEq)]
pub struct ImportProgress {
    pub session_id: SessionId,

    /// Download the session belongs to, if any.
    pub download_id: Option<String>,

    /// Completed fraction in `0.0..=1.0`.
    pub fraction: f64,
}

/// Forwards progress into a channel.
struct ChannelProgress {
    session_id: SessionId,
    download_id: Option<String>,
    sender: UnboundedSender<ImportProgress>,
}

impl ProgressSink for ChannelProgress {
    fn report(&self, fraction: f64) {
        // A closed channel means nobody is listening anymore.
        let _ = self.sender.send(ImportProgress {
            session_id: self.session_id,
            download_id: self.download_id.clone(),
            fraction,
        });
    }
}

/// Handle to an import session running on the blocking thread pool.
///
/// Dropping the handle does not stop the session. It runs to completion and
/// cleans up its work area regardless.
pub struct ImportTask {
    session_id: SessionId,
    cancel: CancellationFlag,
    progress: UnboundedReceiver<ImportProgress>,
    handle: JoinHandle<Result<ImportOutcome, ImportError>>,
}

impl ImportOrchestrator {
    /// Run the session on the tokio blocking thread pool.
    ///
    /// Must be called from within a tokio runtime.
    pub fn spawn(self) -> ImportTask {
        let (sender, receiver) = unbounded_channel();

        let session_id = self.session_id();
        let cancel = self.cancellation();
        let download_id = self.session().download_id.clone();

        let orchestrator = self.with_progress(Arc::new(ChannelProgress {
            session_id,
            download_id,
            sender,
        }));

        let handle = tokio::task::spawn_blocking(move || orchestrator.run());

        ImportTask {
            session_id,
            cancel,
            progress: receiver,
            handle,
        }
    }
}

impl ImportTask {
    pub fn session_id(&self) -> SessionId {
        self.session_id
    }

    /// Request cooperative cancellation of the session.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// Wait for the next progress update.
    ///
    /// Returns `None` once the session has finished and all updates were
    /// consumed.
    pub async fn next_progress(&mut self) -> Option<ImportProgress> {
        self.progress.recv().await
    }

    /// Wait for the session to finish.
    pub async fn finish(self) -> Result<ImportOutcome, ImportError> {
        match self.handle.await {
            Ok(res) => res,
            Err(e) => Err(ImportError::Worker(e.to_string())),
        }
    }
}

#[cfg(test)]
mod test {
    use {
        super::*,
        crate::{
            catalog::{Catalog, MemoryCatalog},
            error::ImportStage,
            progress::ProgressFn,
            settings::ImportSettings,
            testutil::*,
        },
        anyhow::Result,
    };

    fn settings(root: &std::path::Path) -> Result<ImportSettings> {
        let work_root = root.join("work");
        std::fs::create_dir_all(&work_root)?;

        Ok(ImportSettings::new(root.join("storage")).with_work_root(work_root))
    }

    #[tokio::test]
    async fn background_import() -> Result<()> {
        let td = tempfile::Builder::new().prefix("app-import-").tempdir()?;
        let archive = td.path().join("app.ipa");
        write_demo_archive(&archive, "com.example.demo", "1.0")?;

        let catalog = Arc::new(MemoryCatalog::new());
        let mut task = ImportOrchestrator::new(&archive, settings(td.path())?, catalog.clone())
            .with_download_id("download-7")
            .spawn();
        let session_id = task.session_id();

        let mut updates = vec![];
        while let Some(update) = task.next_progress().await {
            updates.push(update);
        }

        let outcome = task.finish().await?;
        assert_eq!(outcome.session.id, session_id);
        assert_eq!(catalog.entries()?.len(), 1);

        assert!(!updates.is_empty());
        assert!(updates.iter().all(|u| u.session_id == session_id));
        assert!(updates
            .iter()
            .all(|u| u.download_id.as_deref() == Some("download-7")));
        assert!(updates.windows(2).all(|w| w[0].fraction < w[1].fraction));
        assert_eq!(updates.last().map(|u| u.fraction), Some(1.0));

        assert!(std::fs::read_dir(td.path().join("work"))?.next().is_none());

        Ok(())
    }

    #[tokio::test]
    async fn failure_surfaces_through_finish() -> Result<()> {
        let td = tempfile::Builder::new().prefix("app-import-").tempdir()?;

        let task = ImportOrchestrator::new(
            td.path().join("missing.ipa"),
            settings(td.path())?,
            Arc::new(MemoryCatalog::new()),
        )
        .spawn();

        let err = task.finish().await.err().expect("import should fail");
        assert_eq!(err.stage(), Some(ImportStage::Copy));

        Ok(())
    }

    #[tokio::test]
    async fn cancel_before_worker_starts() -> Result<()> {
        let td = tempfile::Builder::new().prefix("app-import-").tempdir()?;
        let archive = td.path().join("app.ipa");
        write_demo_archive(&archive, "com.example.demo", "1.0")?;

        let orchestrator = ImportOrchestrator::new(
            &archive,
            settings(td.path())?,
            Arc::new(MemoryCatalog::new()),
        );
        // Cancelling through the orchestrator handle is equivalent to
        // cancelling the task, but is guaranteed to precede the worker.
        orchestrator.cancellation().cancel();

        let task = orchestrator.spawn();
        let err = task.finish().await.err().expect("import should fail");
        assert!(matches!(err, ImportError::Cancelled(ImportStage::Copy)));
        assert!(std::fs::read_dir(td.path().join("work"))?.next().is_none());

        Ok(())
    }

    #[tokio::test]
    async fn cancel_during_extraction() -> Result<()> {
        let td = tempfile::Builder::new().prefix("app-import-").tempdir()?;
        let archive = td.path().join("app.ipa");
        write_demo_archive(&archive, "com.example.demo", "1.0")?;

        let settings = settings(td.path())?;
        let catalog = Arc::new(MemoryCatalog::new());
        let orchestrator = ImportOrchestrator::new(&archive, settings.clone(), catalog.clone());
        let session_id = orchestrator.session_id();

        // The first progress update arrives while entries remain.
        let trigger = orchestrator.cancellation();
        let orchestrator =
            orchestrator.with_progress(Arc::new(ProgressFn(move |_| trigger.cancel())));

        let err = orchestrator
            .spawn()
            .finish()
            .await
            .err()
            .expect("import should fail");
        assert!(matches!(err, ImportError::Cancelled(ImportStage::Extract)));

        assert!(std::fs::read_dir(settings.work_root())?.next().is_none());
        assert!(!settings.storage().path_for(&session_id).exists());
        assert!(catalog.entries()?.is_empty());

        Ok(())
    }

    #[tokio::test]
    async fn task_cancel_sets_flag() -> Result<()> {
        let td = tempfile::Builder::new().prefix("app-import-").tempdir()?;
        let archive = td.path().join("app.ipa");
        write_demo_archive(&archive, "com.example.demo", "1.0")?;

        let orchestrator = ImportOrchestrator::new(
            &archive,
            settings(td.path())?,
            Arc::new(MemoryCatalog::new()),
        );
        let flag = orchestrator.cancellation();

        let task = orchestrator.spawn();
        task.cancel();
        assert!(flag.is_cancelled());

        // The worker may finish before it observes the flag.
        match task.finish().await {
            Ok(outcome) => assert_eq!(outcome.metadata.version.as_deref(), Some("1.0")),
            Err(e) => assert!(matches!(e, ImportError::Cancelled(_))),
        }
        assert!(std::fs::read_dir(td.path().join("work"))?.next().is_none());

        Ok(())
    }
}
