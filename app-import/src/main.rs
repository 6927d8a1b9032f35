// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use {
    app_import::{
        catalog::{Catalog, CatalogEntry, JsonLinesCatalog},
        error::{CatalogError, ImportError},
        libraries::DirectoryLibrarySource,
        orchestrator::ImportOrchestrator,
        settings::ImportSettings,
    },
    clap::{Arg, ArgMatches, Command},
    log::{info, warn, LevelFilter},
    signing_credential::CredentialError,
    std::{path::PathBuf, sync::Arc},
    thiserror::Error,
};

const IMPORT_ABOUT: &str = "\
Import an application archive into managed storage.

The archive (typically an .ipa or .tipa file) is unpacked into a private
work area. If a libraries directory is given, every regular file in it is
copied into the application bundle's Frameworks directory. The extracted
Payload directory is then moved to <storage>/Unsigned/<session id> and the
application is recorded in the catalog.

The work area is removed when the import finishes, whether it succeeded
or not. On success, the managed storage directory is printed.
";

const INSPECT_CREDENTIAL_ABOUT: &str = "\
Decode a provisioning profile and print its fields as JSON.

The file is scanned for an embedded XML property list. Trailing signature
data is ignored.
";

#[derive(Debug, Error)]
enum CliError {
    #[error("unknown command")]
    UnknownCommand,

    #[error("bad argument")]
    BadArgument,

    #[error("{0}")]
    Import(#[from] ImportError),

    #[error("catalog error: {0}")]
    Catalog(#[from] CatalogError),

    #[error("{0}")]
    Credential(#[from] CredentialError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    SerdeJson(#[from] serde_json::Error),

    #[error("catalog is empty")]
    EmptyCatalog,
}

fn path_arg(args: &ArgMatches, name: &str) -> Option<PathBuf> {
    args.value_of_os(name).map(PathBuf::from)
}

fn settings_from_args(args: &ArgMatches) -> ImportSettings {
    let mut settings = ImportSettings::from_env();

    if let Some(path) = path_arg(args, "storage_dir") {
        settings = ImportSettings::new(path).with_work_root(settings.work_root());
    }
    if let Some(path) = path_arg(args, "work_dir") {
        settings = settings.with_work_root(path);
    }

    settings
}

fn catalog_from_args(args: &ArgMatches, settings: &ImportSettings) -> JsonLinesCatalog {
    JsonLinesCatalog::new(path_arg(args, "catalog").unwrap_or_else(|| settings.catalog_path()))
}

fn print_entry(entry: &CatalogEntry) {
    println!(
        "{}\t{}\t{}\t{}\t{}",
        entry.session_id,
        entry.created_at.to_rfc3339(),
        entry.identifier.as_deref().unwrap_or("-"),
        entry.version.as_deref().unwrap_or("-"),
        entry.name.as_deref().unwrap_or("-"),
    );
}

fn command_import(args: &ArgMatches) -> Result<(), CliError> {
    let archive = path_arg(args, "archive").ok_or(CliError::BadArgument)?;

    let settings = settings_from_args(args).with_library_injection(!args.is_present("no_inject"));
    let catalog = Arc::new(catalog_from_args(args, &settings));

    let mut orchestrator = ImportOrchestrator::new(archive, settings, catalog)
        .with_install_intent(args.is_present("install"));

    if let Some(dir) = path_arg(args, "libraries_dir") {
        orchestrator = orchestrator.with_libraries(Arc::new(DirectoryLibrarySource::new(dir)));
    }
    if let Some(path) = path_arg(args, "credential") {
        orchestrator = orchestrator.with_credential(path);
    }

    let runtime = tokio::runtime::Builder::new_current_thread().build()?;

    let outcome = runtime.block_on(async move {
        let mut task = orchestrator.spawn();

        let mut last_percent = None;
        while let Some(update) = task.next_progress().await {
            let percent = (update.fraction * 100.0) as u32;
            if last_percent != Some(percent) {
                info!("{}%", percent);
                last_percent = Some(percent);
            }
        }

        task.finish().await
    })?;

    if let Some(injection) = &outcome.injection {
        for path in injection.installed() {
            info!("injected {}", path.display());
        }
        for failure in injection.failures() {
            warn!("{}", failure);
        }
    }

    if outcome.catalog_entry.is_none() {
        warn!("application was imported but could not be cataloged");
    }

    if outcome.session.install {
        info!("install requested for {}", outcome.session.id);
    }

    println!("{}", outcome.destination.display());

    Ok(())
}

fn command_list(args: &ArgMatches) -> Result<(), CliError> {
    let settings = settings_from_args(args);
    let catalog = catalog_from_args(args, &settings);

    for entry in catalog.entries()? {
        print_entry(&entry);
    }

    Ok(())
}

fn command_latest(args: &ArgMatches) -> Result<(), CliError> {
    let settings = settings_from_args(args);
    let catalog = catalog_from_args(args, &settings);

    let entry = catalog.latest()?.ok_or(CliError::EmptyCatalog)?;
    println!("{}", serde_json::to_string_pretty(&entry)?);

    Ok(())
}

fn command_inspect_credential(args: &ArgMatches) -> Result<(), CliError> {
    let path = path_arg(args, "path").ok_or(CliError::BadArgument)?;

    let credential = signing_credential::try_decode(&path)?;

    if let Some(expiration) = credential.expiration() {
        if credential.is_expired_at(chrono::Utc::now()) {
            warn!("credential expired at {}", expiration.to_rfc3339());
        }
    }

    println!("{}", serde_json::to_string_pretty(&credential)?);

    Ok(())
}

fn main_impl() -> Result<(), CliError> {
    let app = Command::new("Import signed application archives")
        .version(env!("CARGO_PKG_VERSION"))
        .author("Gregory Szorc <gregory.szorc@gmail.com>")
        .about("Import application archives into managed storage")
        .arg_required_else_help(true)
        .arg(
            Arg::new("verbose")
                .long("verbose")
                .short('v')
                .global(true)
                .multiple_occurrences(true)
                .help("Increase logging verbosity. Can be specified multiple times."),
        )
        .arg(
            Arg::new("storage_dir")
                .long("storage-dir")
                .global(true)
                .takes_value(true)
                .allow_invalid_utf8(true)
                .help("Root directory of managed storage"),
        )
        .arg(
            Arg::new("work_dir")
                .long("work-dir")
                .global(true)
                .takes_value(true)
                .allow_invalid_utf8(true)
                .help("Directory in which per-import work areas are created"),
        )
        .arg(
            Arg::new("catalog")
                .long("catalog")
                .global(true)
                .takes_value(true)
                .allow_invalid_utf8(true)
                .help("Path of the catalog file (defaults to catalog.jsonl in the storage directory)"),
        );

    let app = app.subcommand(
        Command::new("import")
            .about("Import an application archive")
            .long_about(IMPORT_ABOUT)
            .arg(
                Arg::new("libraries_dir")
                    .long("libraries-dir")
                    .takes_value(true)
                    .allow_invalid_utf8(true)
                    .help("Directory of shared libraries to inject into the application"),
            )
            .arg(
                Arg::new("no_inject")
                    .long("no-inject")
                    .help("Do not inject shared libraries"),
            )
            .arg(
                Arg::new("credential")
                    .long("credential")
                    .takes_value(true)
                    .allow_invalid_utf8(true)
                    .help("Signing credential to associate with the application"),
            )
            .arg(
                Arg::new("install")
                    .long("install")
                    .help("Mark the application for installation after import"),
            )
            .arg(
                Arg::new("archive")
                    .required(true)
                    .allow_invalid_utf8(true)
                    .help("Path to application archive to import"),
            ),
    );

    let app = app.subcommand(Command::new("list").about("Print all catalog entries"));

    let app = app.subcommand(
        Command::new("latest").about("Print the most recently imported application as JSON"),
    );

    let app = app.subcommand(
        Command::new("inspect-credential")
            .about("Decode a signing credential")
            .long_about(INSPECT_CREDENTIAL_ABOUT)
            .arg(
                Arg::new("path")
                    .required(true)
                    .allow_invalid_utf8(true)
                    .help("Path to provisioning profile to decode"),
            ),
    );

    let matches = app.get_matches();

    let log_level = match matches.occurrences_of("verbose") {
        0 => LevelFilter::Info,
        1 => LevelFilter::Debug,
        _ => LevelFilter::Trace,
    };

    let mut builder = env_logger::Builder::from_env(
        env_logger::Env::default().default_filter_or(log_level.as_str()),
    );

    // Disable log context except at higher log levels.
    if log_level <= LevelFilter::Info {
        builder
            .format_timestamp(None)
            .format_level(false)
            .format_target(false);
    }

    builder.init();

    match matches.subcommand() {
        Some(("import", args)) => command_import(args),
        Some(("inspect-credential", args)) => command_inspect_credential(args),
        Some(("latest", args)) => command_latest(args),
        Some(("list", args)) => command_list(args),
        _ => Err(CliError::UnknownCommand),
    }
}

fn main() {
    let exit_code = match main_impl() {
        Ok(()) => 0,
        Err(err) => {
            eprintln!("Error: {}", err);
            1
        }
    };

    std::process::exit(exit_code)
}
