// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

/*! Import signed application archives into managed storage.

An import session takes an application archive (`.ipa`, `.tipa`), unpacks it
into a private work area, optionally injects shared libraries into the
application bundle, moves the extracted `Payload` directory into managed
storage under a fresh identifier and records the application in a catalog.

The main entry point is [ImportOrchestrator]. Sessions can be run
synchronously via [ImportOrchestrator::run] or on a tokio blocking thread
via [ImportOrchestrator::spawn], which streams progress over a channel.

Collaborators are injected as traits:

* [Catalog] receives one [CatalogEntry] per imported application.
  [MemoryCatalog] and [JsonLinesCatalog] are provided.
* [SharedLibrarySource] enumerates libraries to inject.
* [ProgressSink] observes fractional progress.

Signing credentials are decoded by the `signing-credential` crate and
bundle metadata is read by the `app-bundles` crate.
*/

pub mod catalog;
pub use catalog::{Catalog, CatalogEntry, JsonLinesCatalog, MemoryCatalog};
pub mod error;
pub use error::{ImportError, ImportStage};
pub mod extractor;
pub use extractor::{ArchiveExtractor, ContainerFormat, ExtractedPayload};
pub mod injector;
pub use injector::{InjectionReport, LibraryInjector};
pub mod libraries;
pub use libraries::{DirectoryLibrarySource, SharedLibraryFile, SharedLibrarySource};
pub mod orchestrator;
pub use orchestrator::{ImportOrchestrator, ImportOutcome, ImportState};
pub mod progress;
pub use progress::{MonotonicProgress, NoProgress, ProgressFn, ProgressSink};
pub mod relocator;
pub use relocator::PayloadRelocator;
pub mod session;
pub use session::{CancellationFlag, ImportSession, SessionId};
pub mod settings;
pub use settings::ImportSettings;
pub mod storage;
pub use storage::ManagedStorage;
pub mod task;
pub use task::{ImportProgress, ImportTask};
pub mod work_area;
pub use work_area::WorkArea;

#[cfg(test)]
mod testutil;
