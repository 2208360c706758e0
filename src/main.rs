use std::fs::{File, OpenOptions};
use std::path::Path;

use clap::{crate_description, crate_version, Arg, Command};
use failure::Error;
use log::{error, info, warn};
use simplelog::{
    ColorChoice, CombinedLogger, LevelFilter, SharedLogger, TermLogger, TerminalMode, WriteLogger,
};

use settings::Settings;

use crate::batch::BatchOrchestrator;
use crate::dataset::{DatasetCatalog, GridBoundsReader};
use crate::metadata::{DocumentKind, FieldResolver, Template};
use crate::overrides::OverrideTables;
use crate::storage::{IdentifierIndex, IdentifierRegistry, MetadataStore};

mod batch;
mod dataset;
mod metadata;
mod overrides;
mod settings;
mod storage;
#[cfg(test)]
mod test_utils;

fn main() {
    let matches = Command::new("Survey Metadata Generator")
        .version(crate_version!())
        .about(crate_description!())
        .arg(
            Arg::new("settings")
                .short('s')
                .long("settings")
                .value_name("SETTINGS")
                .help("Specify an additional settings file")
                .takes_value(true),
        )
        .get_matches();

    let settings = match Settings::new(matches.value_of("settings").map(Path::new)) {
        Ok(settings) => settings,
        Err(e) => {
            eprintln!("Unable to use config file: {}", e);
            std::process::exit(1);
        }
    };

    if let Err(e) = initialize_logger(&settings) {
        eprintln!("Unable to initialize logger: {}", e);
        std::process::exit(1);
    }

    let tables = match OverrideTables::from_settings(&settings.overrides) {
        Ok(tables) => tables,
        Err(e) => {
            error!("Unable to load override tables: {}", e);
            return; // stop program
        }
    };
    info!(
        "Loaded {} survey and {} dataset overrides",
        tables.number_of_surveys(),
        tables.number_of_datasets()
    );

    let parent_template = match load_template(DocumentKind::Parent, &settings.templates.parent_file)
    {
        Ok(template) => template,
        Err(e) => {
            error!("Unable to load parent template: {}", e);
            return; // stop program
        }
    };

    let child_template = match load_template(DocumentKind::Child, &settings.templates.child_file) {
        Ok(template) => template,
        Err(e) => {
            error!("Unable to load child template: {}", e);
            return; // stop program
        }
    };

    let store = match MetadataStore::from_settings(&settings.output) {
        Ok(store) => store,
        Err(e) => {
            error!("Unable to open metadata directory: {}", e);
            return; // stop program
        }
    };

    let index = match IdentifierIndex::load(&store.file_path(&settings.output.index_file)) {
        Ok(index) => index,
        Err(e) => {
            error!("Unable to load identifier index: {}", e);
            return; // stop program
        }
    };
    if index.is_empty() {
        info!("No identifier index found, starting a new one");
    } else {
        info!("Loaded {} parent identifiers", index.len());
    }

    let registry = match IdentifierRegistry::new(&store, &parent_template, index) {
        Ok(registry) => registry,
        Err(e) => {
            error!("Unable to create identifier registry: {}", e);
            return; // stop program
        }
    };

    let resolver = match FieldResolver::new(&settings.services, &settings.input.grid_extension) {
        Ok(resolver) => resolver,
        Err(e) => {
            error!("Unable to create field resolver: {}", e);
            return; // stop program
        }
    };

    let bounds_reader = GridBoundsReader::from_settings(&settings.input);
    if !GridBoundsReader::is_supported() {
        warn!("Built without netCDF support; every dataset with a grid file will be skipped");
    }

    let datasets = match DatasetCatalog::from_settings(&settings.input).candidates() {
        Ok(datasets) => datasets,
        Err(e) => {
            error!("Unable to list datasets in {}: {}", settings.input.data_dir, e);
            return; // stop program
        }
    };
    info!("Found {} datasets", datasets.len());

    let mut orchestrator = match BatchOrchestrator::new(
        &tables,
        &resolver,
        &bounds_reader,
        registry,
        &store,
        &child_template,
    ) {
        Ok(orchestrator) => orchestrator,
        Err(e) => {
            error!("Unable to start batch: {}", e);
            return; // stop program
        }
    };

    let summary = orchestrator.run(
        datasets
            .into_iter()
            .skip(
                settings
                    .debug
                    .dataset_start
                    .filter(|_| settings.general.debug)
                    .unwrap_or(std::usize::MIN),
            )
            .take(
                settings
                    .debug
                    .dataset_limit
                    .filter(|_| settings.general.debug)
                    .unwrap_or(std::usize::MAX),
            ),
    );

    info!(
        "Processed {} datasets ({} child records, {} new parent records), skipped {}, failed {}",
        summary.processed(),
        summary.child_records,
        summary.parents_created,
        summary.skipped(),
        summary.failed()
    );

    if summary.has_integrity_errors() {
        error!(
            "Parent records of surveys {:?} are corrupt and need manual repair",
            summary.corrupt_surveys
        );
        std::process::exit(1);
    }
}

fn load_template(kind: DocumentKind, path: &str) -> Result<Template, Error> {
    let template = Template::from_path(kind, Path::new(path))?;

    for placeholder in template.unused_placeholders() {
        warn!("Template {} does not use {}", path, placeholder.token());
    }

    Ok(template)
}

/// Initialize the logger.
fn initialize_logger(settings: &Settings) -> Result<(), Error> {
    let mut loggers: Vec<Box<dyn SharedLogger>> = Vec::new();

    let log_level = if settings.general.debug {
        LevelFilter::Debug
    } else {
        LevelFilter::Info
    };

    loggers.push(TermLogger::new(
        log_level,
        simplelog::Config::default(),
        TerminalMode::Mixed,
        ColorChoice::Auto,
    ));

    if let Ok(file) = File::create(&settings.general.log_file) {
        loggers.push(WriteLogger::new(
            log_level,
            simplelog::Config::default(),
            file,
        ));
    }

    // datasets that were skipped or failed
    if let Some(failure_log_file) = &settings.general.failure_log_file {
        loggers.push(WriteLogger::new(
            LevelFilter::Warn,
            simplelog::Config::default(),
            open_failure_log(Path::new(failure_log_file))?,
        ));
    }

    CombinedLogger::init(loggers)?;

    Ok(())
}

/// The failure log is kept across runs as a list of datasets to retry.
fn open_failure_log(path: &Path) -> Result<File, Error> {
    Ok(OpenOptions::new().create(true).append(true).open(path)?)
}

#[cfg(test)]
mod tests {
    use std::fs;
    use std::io::Write;

    use super::*;

    #[test]
    fn failure_log_keeps_earlier_entries() {
        let dir = test_utils::create_temp_dir();
        let path = dir.path().join("metadata.bad");

        writeln!(open_failure_log(&path).unwrap(), "first run").unwrap();
        writeln!(open_failure_log(&path).unwrap(), "second run").unwrap();

        assert_eq!(fs::read_to_string(&path).unwrap(), "first run\nsecond run\n");
    }
}
