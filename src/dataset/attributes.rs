use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use failure::Error;

use crate::dataset::{DatasetError, GeoBounds};

pub type AttributeMap = BTreeMap<String, String>;

pub const FILENAME_KEY: &str = "filename";
pub const SURVEY_ID_KEY: &str = "surveyid";

/// The raw description of one dataset, harvested from its sidecar file.
///
/// Keys are lower-cased. The map always holds the `filename` stem and, once
/// `with_bounds` was called, the four grid bounds.
#[derive(Clone, Debug, PartialEq)]
pub struct DatasetAttributes {
    file_name: String,
    values: AttributeMap,
}

impl DatasetAttributes {
    /// Read and parse the sidecar file at `path`.
    pub fn from_path(path: &Path) -> Result<Self, Error> {
        let file_name = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .ok_or_else(|| DatasetError::InvalidPath(path.display().to_string()))?;
        let stem = path
            .file_stem()
            .map(|stem| stem.to_string_lossy().into_owned())
            .ok_or_else(|| DatasetError::InvalidPath(path.display().to_string()))?;

        let bytes = fs::read(path)?;

        Ok(Self::from_text(
            &file_name,
            &stem,
            &String::from_utf8_lossy(&bytes),
        ))
    }

    pub fn from_text(file_name: &str, stem: &str, text: &str) -> Self {
        let mut values = parse_attributes(text);
        values.insert(FILENAME_KEY.into(), stem.into());

        Self {
            file_name: file_name.into(),
            values,
        }
    }

    /// Return a copy augmented with the grid bounds.
    pub fn with_bounds(mut self, bounds: &GeoBounds) -> Self {
        self.values.insert("north".into(), bounds.north.clone());
        self.values.insert("south".into(), bounds.south.clone());
        self.values.insert("east".into(), bounds.east.clone());
        self.values.insert("west".into(), bounds.west.clone());
        self
    }

    /// The base name of the sidecar file, extension included.
    pub fn file_name(&self) -> &str {
        &self.file_name
    }

    /// The file name without its extension.
    pub fn stem(&self) -> &str {
        self.values
            .get(FILENAME_KEY)
            .map(String::as_str)
            .unwrap_or_default()
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.values.get(key).map(String::as_str)
    }

    /// Like `get`, but blank values count as missing.
    pub fn non_blank(&self, key: &str) -> Option<&str> {
        self.get(key).filter(|value| !value.trim().is_empty())
    }

    pub fn values(&self) -> &AttributeMap {
        &self.values
    }

    /// Survey ids declared in the `surveyid` attribute.
    pub fn survey_ids(&self) -> Vec<String> {
        self.get(SURVEY_ID_KEY)
            .map(split_survey_ids)
            .unwrap_or_default()
    }
}

/// Parse `key=value` lines. Keys are trimmed and lower-cased, values are trimmed
/// and stripped of double quotes. Lines without `=` are ignored.
pub fn parse_attributes(text: &str) -> AttributeMap {
    text.lines()
        .filter_map(|line| line.split_once('='))
        .map(|(key, value)| {
            (
                key.trim().to_lowercase(),
                value.trim().replace('"', ""),
            )
        })
        .collect()
}

/// Split an underscore-delimited survey id list, dropping empty and `unknown` tokens.
pub fn split_survey_ids(list: &str) -> Vec<String> {
    list.split('_')
        .map(str::trim)
        .filter(|id| !id.is_empty() && !id.eq_ignore_ascii_case("unknown"))
        .map(String::from)
        .collect()
}

#[cfg(test)]
mod tests {
    use crate::test_utils;

    use super::*;

    const SIDECAR: &str = r#"
        DatasetHeader Begin
        Title = "Radiometric Map of Australia"
        SurveyID = 1234_unknown_5678
        Date="2010_v2"
        Equation = a=b
        no separator here
    "#;

    #[test]
    fn parses_sidecar_lines() {
        let values = parse_attributes(SIDECAR);

        assert_eq!(values.get("title").unwrap(), "Radiometric Map of Australia");
        assert_eq!(values.get("date").unwrap(), "2010_v2");
        assert_eq!(values.get("equation").unwrap(), "a=b");
        assert_eq!(values.len(), 4);
    }

    #[test]
    fn derives_filename_stem() {
        let dir = test_utils::create_temp_dir();
        let path = test_utils::create_file_in(dir.path(), "radmap_doseg.isi", SIDECAR);

        let attributes = DatasetAttributes::from_path(&path).unwrap();

        assert_eq!(attributes.file_name(), "radmap_doseg.isi");
        assert_eq!(attributes.stem(), "radmap_doseg");
        assert_eq!(attributes.get(FILENAME_KEY), Some("radmap_doseg"));
    }

    #[test]
    fn filename_stem_wins_over_parsed_key() {
        let attributes = DatasetAttributes::from_text("a.isi", "a", "filename = other");

        assert_eq!(attributes.stem(), "a");
    }

    #[test]
    fn survey_ids_skip_unknown_and_empty() {
        let attributes = DatasetAttributes::from_text("a.isi", "a", SIDECAR);

        assert_eq!(attributes.survey_ids(), vec!["1234", "5678"]);
        assert_eq!(split_survey_ids("__UNKNOWN_Unknown_"), Vec::<String>::new());
    }

    #[test]
    fn adds_bounds() {
        let bounds = GeoBounds {
            north: "-10.5".into(),
            south: "-43.6".into(),
            east: "153.6".into(),
            west: "112.9".into(),
        };

        let attributes = DatasetAttributes::from_text("a.isi", "a", "").with_bounds(&bounds);

        assert_eq!(attributes.get("north"), Some("-10.5"));
        assert_eq!(attributes.get("west"), Some("112.9"));
        assert_eq!(attributes.values().len(), 5);
    }
}
