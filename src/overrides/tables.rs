use std::collections::HashMap;
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;

use failure::Error;
use log::warn;
use serde::de::DeserializeOwned;
use serde::Deserialize;

use crate::dataset::split_survey_ids;
use crate::settings::OverrideSettings;

/// A row of the survey table. Its values take precedence for parent records.
#[derive(Clone, Debug, Default, Deserialize, PartialEq)]
pub struct SurveyOverride {
    #[serde(rename = "surveyId")]
    pub survey_id: String,
    #[serde(default)]
    pub title: String,
    #[serde(rename = "Beginning Time", default)]
    pub beginning_time: String,
    #[serde(rename = "abstract", default)]
    pub abstract_text: String,
    #[serde(rename = "surveyType", default)]
    pub survey_type: String,
    #[serde(rename = "dataType", default)]
    pub data_type: String,
    #[serde(rename = "northBoundLatitude", default)]
    pub north_bound_latitude: String,
    #[serde(rename = "southBoundLatitude", default)]
    pub south_bound_latitude: String,
    #[serde(rename = "eastBoundLongitude", default)]
    pub east_bound_longitude: String,
    #[serde(rename = "westBoundLongitude", default)]
    pub west_bound_longitude: String,
}

/// A row of the dataset table. Its values take precedence for child records.
#[derive(Clone, Debug, Default, Deserialize, PartialEq)]
pub struct DatasetOverride {
    #[serde(rename = "Filename")]
    pub filename: String,
    #[serde(rename = "LABEL", default)]
    pub label: String,
    #[serde(rename = "DATE", default)]
    pub date: String,
    #[serde(rename = "Theme", default)]
    pub theme: String,
    #[serde(rename = "Datatype", default)]
    pub data_type: String,
    #[serde(rename = "URL", default)]
    pub url: String,
    #[serde(rename = "SurveyID", default)]
    pub survey_id: String,
}

impl DatasetOverride {
    pub fn survey_ids(&self) -> Vec<String> {
        split_survey_ids(&self.survey_id)
    }
}

trait Keyed {
    fn key(&self) -> &str;
}

impl Keyed for SurveyOverride {
    fn key(&self) -> &str {
        &self.survey_id
    }
}

impl Keyed for DatasetOverride {
    fn key(&self) -> &str {
        &self.filename
    }
}

/// The two override tables, loaded once before the batch starts.
#[derive(Debug, Default)]
pub struct OverrideTables {
    surveys: HashMap<String, SurveyOverride>,
    datasets: HashMap<String, DatasetOverride>,
}

impl OverrideTables {
    pub fn new(surveys: Vec<SurveyOverride>, datasets: Vec<DatasetOverride>) -> Self {
        Self {
            surveys: Self::rows_to_map(surveys),
            datasets: Self::rows_to_map(datasets),
        }
    }

    pub fn from_paths(survey_path: &Path, dataset_path: &Path) -> Result<Self, Error> {
        let surveys = Self::read_rows(BufReader::new(File::open(survey_path)?))?;
        let datasets = Self::read_rows(BufReader::new(File::open(dataset_path)?))?;

        Ok(Self::new(surveys, datasets))
    }

    pub fn from_settings(override_settings: &OverrideSettings) -> Result<Self, Error> {
        Self::from_paths(
            Path::new(&override_settings.survey_file),
            Path::new(&override_settings.dataset_file),
        )
    }

    fn read_rows<R: Read, T: DeserializeOwned>(reader: R) -> Result<Vec<T>, Error> {
        let mut csv_reader = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .flexible(true)
            .from_reader(reader);
        let headers = csv_reader.headers()?.clone();

        let mut rows = Vec::new();
        for record in csv_reader.records() {
            match record.and_then(|record| {
                Self::fit_to_headers(&record, headers.len()).deserialize(Some(&headers))
            }) {
                Ok(row) => rows.push(row),
                Err(e) => warn!("Skipping unreadable override row: {}", e),
            }
        }
        Ok(rows)
    }

    /// Ragged rows are cut or padded with empty cells to the header width.
    fn fit_to_headers(record: &csv::StringRecord, width: usize) -> csv::StringRecord {
        record
            .iter()
            .chain(std::iter::repeat(""))
            .take(width)
            .collect()
    }

    /// This function creates a map from key to row. Later rows replace earlier ones.
    fn rows_to_map<T: Keyed>(rows: Vec<T>) -> HashMap<String, T> {
        let mut map = HashMap::with_capacity(rows.len());
        for row in rows {
            if let Some(previous) = map.insert(row.key().to_string(), row) {
                warn!("Duplicate override row for `{}`, using the last one", previous.key());
            }
        }
        map
    }

    pub fn survey(&self, survey_id: &str) -> Option<&SurveyOverride> {
        self.surveys.get(survey_id)
    }

    /// Look up a dataset row by the sidecar's file name, extension included.
    pub fn dataset(&self, file_name: &str) -> Option<&DatasetOverride> {
        self.datasets.get(file_name)
    }

    pub fn number_of_surveys(&self) -> usize {
        self.surveys.len()
    }

    pub fn number_of_datasets(&self) -> usize {
        self.datasets.len()
    }
}
