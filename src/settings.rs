use std::path::Path;

use config::builder::DefaultState;
use config::ConfigBuilder;
use config::ConfigError;
use config::File;
use config::FileFormat;
use serde::Deserialize;

#[derive(Debug, Deserialize)]
pub struct GeneralSettings {
    pub log_file: String,
    pub failure_log_file: Option<String>,
    pub debug: bool,
}

/// Where to look for datasets and their grid files.
#[derive(Debug, Deserialize)]
pub struct InputSettings {
    pub data_dir: String,
    pub max_depth: usize,
    pub suffixes: Vec<String>,
    pub excluded_marker: String,
    pub grid_dir: String,
    pub grid_extension: String,
}

#[derive(Debug, Deserialize)]
pub struct OverrideSettings {
    pub survey_file: String,
    pub dataset_file: String,
}

#[derive(Debug, Deserialize)]
pub struct TemplateSettings {
    pub parent_file: String,
    pub child_file: String,
}

#[derive(Debug, Deserialize)]
pub struct OutputSettings {
    pub metadata_dir: String,
    pub index_file: String,
}

/// Base urls of the map and coverage services publishing the grids.
#[derive(Clone, Debug, Deserialize)]
pub struct ServiceSettings {
    pub wms_url: String,
    pub wcs_url: String,
}

#[derive(Debug, Default, Deserialize)]
pub struct DebugSettings {
    pub dataset_start: Option<usize>,
    pub dataset_limit: Option<usize>,
}

/// This struct stores the program settings.
#[derive(Debug, Deserialize)]
pub struct Settings {
    pub general: GeneralSettings,
    pub input: InputSettings,
    pub overrides: OverrideSettings,
    pub templates: TemplateSettings,
    pub output: OutputSettings,
    pub services: ServiceSettings,
    #[serde(default)]
    pub debug: DebugSettings,
}

impl Settings {
    pub fn new(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut s = ConfigBuilder::<DefaultState>::default();
        s = s.add_source(File::new("settings-default.toml", FileFormat::Toml));
        s = s.add_source(File::new("settings.toml", FileFormat::Toml).required(false));
        if let Some(path) = path {
            s = s.add_source(File::from(path));
        }

        let config = s.build()?;

        config.try_deserialize()
    }
}
