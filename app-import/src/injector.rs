// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Best-effort injection of shared libraries into application bundles.

use {
    crate::{error::LibraryInjectionError, libraries::SharedLibraryFile},
    app_bundles::FRAMEWORKS_DIR_NAME,
    log::{info, warn},
    std::path::{Path, PathBuf},
};

/// Outcome of installing one library.
#[derive(Debug)]
pub struct LibraryOutcome {
    pub library: SharedLibraryFile,

    /// Installed path on success.
    pub result: Result<PathBuf, LibraryInjectionError>,
}

/// Per-library outcomes of an injection run.
#[derive(Debug, Default)]
pub struct InjectionReport {
    pub outcomes: Vec<LibraryOutcome>,
}

impl InjectionReport {
    /// Number of libraries installed.
    pub fn success_count(&self) -> usize {
        self.outcomes.iter().filter(|o| o.result.is_ok()).count()
    }

    /// Paths of installed libraries.
    pub fn installed(&self) -> impl Iterator<Item = &Path> {
        self.outcomes
            .iter()
            .filter_map(|o| o.result.as_ref().ok().map(|p| p.as_path()))
    }

    /// Libraries that could not be installed.
    pub fn failures(&self) -> impl Iterator<Item = &LibraryInjectionError> {
        self.outcomes.iter().filter_map(|o| o.result.as_ref().err())
    }
}

/// Copies shared libraries into a bundle's `Frameworks` directory.
///
/// A library failing to install never stops the remaining ones.
#[derive(Clone, Copy, Debug, Default)]
pub struct LibraryInjector;

impl LibraryInjector {
    pub fn new() -> Self {
        Self
    }

    /// Install `libraries` into the bundle rooted at `bundle`.
    pub fn inject(&self, libraries: &[SharedLibraryFile], bundle: &Path) -> InjectionReport {
        if libraries.is_empty() {
            return InjectionReport::default();
        }

        let dest_dir = bundle.join(FRAMEWORKS_DIR_NAME);
        let dir_error = std::fs::create_dir_all(&dest_dir).err();

        let report = libraries
            .iter()
            .fold(InjectionReport::default(), |mut report, library| {
                let result = match &dir_error {
                    Some(e) => Err(LibraryInjectionError {
                        library: library.path().to_path_buf(),
                        source: std::io::Error::new(
                            e.kind(),
                            format!("creating {}: {}", dest_dir.display(), e),
                        ),
                    }),
                    None => install_library(library, &dest_dir),
                };

                if let Err(e) = &result {
                    warn!("{}; continuing", e);
                }

                report.outcomes.push(LibraryOutcome {
                    library: library.clone(),
                    result,
                });

                report
            });

        info!(
            "injected {} of {} libraries into {}",
            report.success_count(),
            libraries.len(),
            bundle.display()
        );

        report
    }
}

fn install_library(
    library: &SharedLibraryFile,
    dest_dir: &Path,
) -> Result<PathBuf, LibraryInjectionError> {
    let to_error = |source| LibraryInjectionError {
        library: library.path().to_path_buf(),
        source,
    };

    let file_name = library.file_name().ok_or_else(|| {
        to_error(std::io::Error::new(
            std::io::ErrorKind::InvalidInput,
            "library path has no file name",
        ))
    })?;

    let dest_path = dest_dir.join(file_name);

    // A stale copy is replaced. Failing to remove it surfaces from the copy.
    let _ = std::fs::remove_file(&dest_path);

    std::fs::copy(library.path(), &dest_path).map_err(to_error)?;

    Ok(dest_path)
}

#[cfg(test)]
mod test {
    use {super::*, anyhow::Result};

    fn fixture() -> Result<(tempfile::TempDir, PathBuf, PathBuf)> {
        let td = tempfile::Builder::new().prefix("app-import-").tempdir()?;
        let libs = td.path().join("libs");
        let bundle = td.path().join("Payload").join("Demo.app");
        std::fs::create_dir_all(&libs)?;
        std::fs::create_dir_all(&bundle)?;

        Ok((td, libs, bundle))
    }

    #[test]
    fn empty_is_noop() -> Result<()> {
        let (_td, _libs, bundle) = fixture()?;

        let report = LibraryInjector::new().inject(&[], &bundle);
        assert_eq!(report.success_count(), 0);
        assert!(!bundle.join(FRAMEWORKS_DIR_NAME).exists());

        Ok(())
    }

    #[test]
    fn one_failure_does_not_abort() -> Result<()> {
        let (_td, libs, bundle) = fixture()?;

        std::fs::write(libs.join("liba.dylib"), b"a")?;
        std::fs::write(libs.join("libc.dylib"), b"c")?;

        let libraries = vec![
            SharedLibraryFile::new(libs.join("liba.dylib")),
            SharedLibraryFile::new(libs.join("libb.dylib")),
            SharedLibraryFile::new(libs.join("libc.dylib")),
        ];

        let report = LibraryInjector::new().inject(&libraries, &bundle);
        assert_eq!(report.outcomes.len(), 3);
        assert_eq!(report.success_count(), 2);

        let failures = report.failures().collect::<Vec<_>>();
        assert_eq!(failures.len(), 1);
        assert_eq!(failures[0].library, libs.join("libb.dylib"));

        let frameworks = bundle.join(FRAMEWORKS_DIR_NAME);
        assert_eq!(std::fs::read(frameworks.join("liba.dylib"))?, b"a");
        assert_eq!(std::fs::read(frameworks.join("libc.dylib"))?, b"c");
        assert!(!frameworks.join("libb.dylib").exists());

        // Sources are copied, not moved.
        assert!(libs.join("liba.dylib").exists());

        Ok(())
    }

    #[test]
    fn replaces_existing() -> Result<()> {
        let (_td, libs, bundle) = fixture()?;

        let frameworks = bundle.join(FRAMEWORKS_DIR_NAME);
        std::fs::create_dir_all(&frameworks)?;
        std::fs::write(frameworks.join("liba.dylib"), b"stale")?;
        std::fs::write(libs.join("liba.dylib"), b"fresh")?;

        let report = LibraryInjector::new()
            .inject(&[SharedLibraryFile::new(libs.join("liba.dylib"))], &bundle);
        assert_eq!(report.success_count(), 1);
        assert_eq!(
            report.installed().collect::<Vec<_>>(),
            vec![frameworks.join("liba.dylib").as_path()]
        );
        assert_eq!(std::fs::read(frameworks.join("liba.dylib"))?, b"fresh");

        Ok(())
    }

    #[test]
    fn uncreatable_frameworks_dir_fails_every_library() -> Result<()> {
        let (_td, libs, bundle) = fixture()?;

        // A file squatting on the directory name prevents its creation.
        std::fs::write(bundle.join(FRAMEWORKS_DIR_NAME), b"")?;
        std::fs::write(libs.join("liba.dylib"), b"a")?;
        std::fs::write(libs.join("libb.dylib"), b"b")?;

        let report = LibraryInjector::new().inject(
            &[
                SharedLibraryFile::new(libs.join("liba.dylib")),
                SharedLibraryFile::new(libs.join("libb.dylib")),
            ],
            &bundle,
        );
        assert_eq!(report.success_count(), 0);
        assert_eq!(report.failures().count(), 2);

        Ok(())
    }
}
