// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

/*! Unpacking of application archives into a work area.

Application archives are zip files. Extraction reports byte-weighted
progress, honors a cooperative cancellation flag and, once the payload is
on disk, optionally augments the application bundle with shared libraries.
*/

use {
    crate::{
        error::ExtractionError,
        injector::{InjectionReport, LibraryInjector},
        libraries::SharedLibrarySource,
        progress::ProgressSink,
        session::CancellationFlag,
        work_area::WorkArea,
    },
    app_bundles::{find_app_bundle, PAYLOAD_DIR_NAME},
    log::{debug, info, warn},
    std::{
        ffi::OsString,
        fs::File,
        io::Read,
        path::{Component, Path, PathBuf},
        sync::Arc,
    },
};

/// Leading bytes of a zip local file header.
const ZIP_MAGIC: &[u8; 4] = b"PK\x03\x04";

/// Upper bound on symlinks followed while resolving one link target.
const MAX_SYMLINK_HOPS: usize = 40;

const PARENT_DIR: &str = "..";

/// Container formats of application archives.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ContainerFormat {
    /// iOS application archive.
    Ipa,
    /// tvOS application archive.
    Tipa,
    /// A zip file with no application specific extension.
    Zip,
}

impl ContainerFormat {
    /// Resolve a format from a file extension, ignoring case.
    pub fn from_extension(extension: &str) -> Option<Self> {
        match extension.to_ascii_lowercase().as_str() {
            "ipa" => Some(Self::Ipa),
            "tipa" => Some(Self::Tipa),
            "zip" => Some(Self::Zip),
            _ => None,
        }
    }

    /// Determine the format of the archive at `path`.
    ///
    /// Files without a recognized extension are sniffed for the zip magic.
    pub fn for_path(path: &Path) -> Result<Self, ExtractionError> {
        if let Some(format) = path
            .extension()
            .and_then(|ext| ext.to_str())
            .and_then(Self::from_extension)
        {
            return Ok(format);
        }

        let mut header = [0u8; 4];
        let mut fh = File::open(path)?;

        match fh.read_exact(&mut header) {
            Ok(()) if &header == ZIP_MAGIC => Ok(Self::Zip),
            Ok(()) => Err(ExtractionError::UnsupportedContainer(path.to_path_buf())),
            Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => {
                Err(ExtractionError::UnsupportedContainer(path.to_path_buf()))
            }
            Err(e) => Err(e.into()),
        }
    }
}

impl std::fmt::Display for ContainerFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::Ipa => "ipa",
            Self::Tipa => "tipa",
            Self::Zip => "zip",
        })
    }
}

/// Result of a successful extraction.
#[derive(Debug)]
pub struct ExtractedPayload {
    pub format: ContainerFormat,

    /// The `Payload` directory within the work area.
    ///
    /// May not exist if the archive lacked one.
    pub payload_dir: PathBuf,

    /// The application bundle found inside the payload directory.
    pub bundle: Option<PathBuf>,

    /// Outcome of library injection, if it ran.
    pub injection: Option<InjectionReport>,

    /// Number of archive entries unpacked.
    pub entry_count: usize,

    /// Sum of uncompressed entry sizes.
    pub total_bytes: u64,
}

/// Unpacks application archives into work areas.
#[derive(Clone, Default)]
pub struct ArchiveExtractor {
    libraries: Option<Arc<dyn SharedLibrarySource>>,
}

impl ArchiveExtractor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inject libraries from `source` into extracted bundles.
    #[must_use]
    pub fn with_libraries(mut self, source: Arc<dyn SharedLibrarySource>) -> Self {
        self.libraries = Some(source);
        self
    }

    /// Extract `archive` into `work_area`.
    ///
    /// The work area is left as is on failure. Cleaning it up is the job of
    /// its owner.
    pub fn extract(
        &self,
        archive: &Path,
        work_area: &WorkArea,
        progress: &dyn ProgressSink,
        cancel: &CancellationFlag,
    ) -> Result<ExtractedPayload, ExtractionError> {
        let format = ContainerFormat::for_path(archive)?;
        info!("extracting {} archive {}", format, archive.display());

        let (entry_count, total_bytes) =
            unpack_zip(archive, work_area.path(), progress, cancel)?;

        let payload_dir = work_area.path().join(PAYLOAD_DIR_NAME);

        let bundle = find_app_bundle(&payload_dir);
        let injection = match &bundle {
            Some(bundle) => self.augment(bundle),
            None => {
                warn!(
                    "no application bundle found in {}; skipping augmentation",
                    payload_dir.display()
                );
                None
            }
        };

        Ok(ExtractedPayload {
            format,
            payload_dir,
            bundle,
            injection,
            entry_count,
            total_bytes,
        })
    }

    fn augment(&self, bundle: &Path) -> Option<InjectionReport> {
        let source = self.libraries.as_ref()?;

        match source.libraries() {
            Ok(libraries) => Some(LibraryInjector::new().inject(&libraries, bundle)),
            Err(e) => {
                warn!("unable to enumerate shared libraries: {}; skipping augmentation", e);
                None
            }
        }
    }
}

/// Unpack a zip archive into `dest_dir`, returning the entry count and total bytes.
fn unpack_zip(
    archive: &Path,
    dest_dir: &Path,
    progress: &dyn ProgressSink,
    cancel: &CancellationFlag,
) -> Result<(usize, u64), ExtractionError> {
    let mut za = zip::ZipArchive::new(File::open(archive)?)?;

    let entry_count = za.len();
    let total_bytes = total_size(
        (0..entry_count)
            .map(|i| za.by_index_raw(i).map(|zf| zf.size()))
            .collect::<Result<Vec<_>, _>>()?,
    );

    let mut done_bytes = 0u64;
    let mut symlinks = vec![];

    for i in 0..entry_count {
        if cancel.is_cancelled() {
            info!("extraction of {} cancelled", archive.display());
            return Err(ExtractionError::Cancelled);
        }

        let mut zf = za.by_index(i)?;

        let relative = zf
            .enclosed_name()
            .map(|p| p.to_path_buf())
            .ok_or_else(|| ExtractionError::UnsafeEntryPath(zf.name().to_string()))?;
        let dest_path = dest_dir.join(&relative);
        ensure_no_symlink_components(dest_dir, &relative)?;

        if zf.is_dir() {
            debug!("creating directory {}", relative.display());
            std::fs::create_dir_all(&dest_path)?;
        } else if is_symlink_mode(zf.unix_mode()) {
            let mut target = String::new();
            zf.read_to_string(&mut target)?;
            write_symlink(dest_dir, &relative, &target)?;
            symlinks.push((relative, target));
        } else {
            debug!("extracting {}", relative.display());
            if let Some(parent) = dest_path.parent() {
                std::fs::create_dir_all(parent)?;
            }

            let mut fh = File::create(&dest_path)?;
            std::io::copy(&mut zf, &mut fh)?;

            if let Some(mode) = zf.unix_mode() {
                set_permissions(&dest_path, mode)?;
            }
        }

        done_bytes = done_bytes.saturating_add(zf.size());

        progress.report(if total_bytes > 0 {
            done_bytes as f64 / total_bytes as f64
        } else {
            (i + 1) as f64 / entry_count as f64
        });
    }

    // Links extracted later can change where earlier ones resolve.
    for (relative, target) in &symlinks {
        if !symlink_is_enclosed(dest_dir, relative, target) {
            return Err(ExtractionError::UnsafeEntryPath(format!(
                "{} -> {}",
                relative.display(),
                target
            )));
        }
    }

    progress.report(1.0);

    Ok((entry_count, total_bytes))
}

/// Sum of entry sizes, saturating instead of overflowing.
fn total_size(sizes: impl IntoIterator<Item = u64>) -> u64 {
    sizes.into_iter().fold(0, u64::saturating_add)
}

fn is_symlink_mode(mode: Option<u32>) -> bool {
    matches!(mode, Some(mode) if mode & 0o170000 == 0o120000)
}

/// Fail if an already extracted path leading to `relative` is a symlink.
///
/// Writing through a symlink could place content outside `dest_dir`.
fn ensure_no_symlink_components(dest_dir: &Path, relative: &Path) -> Result<(), ExtractionError> {
    let mut current = dest_dir.to_path_buf();

    for component in relative.components() {
        current.push(component);

        match std::fs::symlink_metadata(&current) {
            Ok(md) if md.file_type().is_symlink() => {
                return Err(ExtractionError::UnsafeEntryPath(format!(
                    "{} passes through symlink {}",
                    relative.display(),
                    current.display()
                )));
            }
            Ok(_) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => break,
            Err(e) => return Err(e.into()),
        }
    }

    Ok(())
}

/// Whether a symlink at `relative` pointing at `target` stays inside `dest_dir`.
///
/// The target is resolved component by component from the link's parent,
/// following symlinks already extracted under `dest_dir`.
fn symlink_is_enclosed(dest_dir: &Path, relative: &Path, target: &str) -> bool {
    let mut resolved = relative
        .parent()
        .map(|parent| {
            parent
                .components()
                .map(|c| c.as_os_str().to_os_string())
                .collect::<Vec<_>>()
        })
        .unwrap_or_default();

    let mut pending = vec![];
    if !queue_target(&mut pending, Path::new(target)) {
        return false;
    }

    let mut hops = 0;

    while let Some(name) = pending.pop() {
        if name == PARENT_DIR {
            if resolved.pop().is_none() {
                return false;
            }
            continue;
        }

        resolved.push(name);

        let path = resolved
            .iter()
            .fold(dest_dir.to_path_buf(), |path, c| path.join(c));

        if let Ok(link) = std::fs::read_link(&path) {
            hops += 1;
            if hops > MAX_SYMLINK_HOPS {
                return false;
            }

            resolved.pop();
            if !queue_target(&mut pending, &link) {
                return false;
            }
        }
    }

    true
}

/// Queue the components of `target` so the first one is popped first.
///
/// Returns false for absolute targets.
fn queue_target(pending: &mut Vec<OsString>, target: &Path) -> bool {
    let mut components = vec![];

    for component in target.components() {
        match component {
            Component::Normal(name) => components.push(name.to_os_string()),
            Component::ParentDir => components.push(OsString::from(PARENT_DIR)),
            Component::CurDir => {}
            Component::RootDir | Component::Prefix(_) => return false,
        }
    }

    pending.extend(components.into_iter().rev());

    true
}

#[cfg(unix)]
fn write_symlink(dest_dir: &Path, relative: &Path, target: &str) -> Result<(), ExtractionError> {
    if !symlink_is_enclosed(dest_dir, relative, target) {
        return Err(ExtractionError::UnsafeEntryPath(format!(
            "{} -> {}",
            relative.display(),
            target
        )));
    }

    debug!("creating symlink {} -> {}", relative.display(), target);
    let dest_path = dest_dir.join(relative);
    if let Some(parent) = dest_path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::os::unix::fs::symlink(target, &dest_path)?;

    Ok(())
}

#[cfg(not(unix))]
fn write_symlink(dest_dir: &Path, relative: &Path, target: &str) -> Result<(), ExtractionError> {
    if !symlink_is_enclosed(dest_dir, relative, target) {
        return Err(ExtractionError::UnsafeEntryPath(format!(
            "{} -> {}",
            relative.display(),
            target
        )));
    }

    warn!(
        "symlinks are not supported on this platform; skipping {}",
        relative.display()
    );

    Ok(())
}

#[cfg(unix)]
fn set_permissions(path: &Path, mode: u32) -> std::io::Result<()> {
    use std::os::unix::fs::PermissionsExt;

    std::fs::set_permissions(path, std::fs::Permissions::from_mode(mode & 0o7777))
}

#[cfg(not(unix))]
fn set_permissions(_path: &Path, _mode: u32) -> std::io::Result<()> {
    Ok(())
}
