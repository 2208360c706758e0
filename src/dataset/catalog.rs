use std::path::{Path, PathBuf};

use failure::Error;
use log::warn;
use walkdir::{DirEntry, WalkDir};

use crate::dataset::DatasetError;
use crate::settings::InputSettings;

/// Finds the survey sidecar files to process.
#[derive(Debug)]
pub struct DatasetCatalog {
    root: PathBuf,
    max_depth: usize,
    suffixes: Vec<String>,
    excluded_marker: String,
}

impl DatasetCatalog {
    pub fn new(root: &Path, max_depth: usize, suffixes: &[String], excluded_marker: &str) -> Self {
        Self {
            root: root.to_path_buf(),
            max_depth,
            suffixes: suffixes.to_vec(),
            excluded_marker: excluded_marker.into(),
        }
    }

    pub fn from_settings(input_settings: &InputSettings) -> Self {
        Self::new(
            Path::new(&input_settings.data_dir),
            input_settings.max_depth,
            &input_settings.suffixes,
            &input_settings.excluded_marker,
        )
    }

    /// List all candidate files, sorted by path.
    pub fn candidates(&self) -> Result<Vec<PathBuf>, Error> {
        if !self.root.is_dir() {
            return Err(DatasetError::NotADirectory(self.root.display().to_string()).into());
        }

        let mut files = Vec::new();

        for entry in WalkDir::new(&self.root).max_depth(self.max_depth) {
            match entry {
                Ok(entry) => {
                    if entry.file_type().is_file() && self.is_candidate(&entry) {
                        files.push(entry.into_path());
                    }
                }
                Err(e) => warn!("Unable to access directory entry: {}", e),
            }
        }

        files.sort();

        Ok(files)
    }

    fn is_candidate(&self, entry: &DirEntry) -> bool {
        let name = entry.file_name().to_string_lossy();

        if !self.suffixes.iter().any(|suffix| name.ends_with(suffix.as_str())) {
            return false;
        }

        let stem = entry
            .path()
            .file_stem()
            .map(|stem| stem.to_string_lossy())
            .unwrap_or_default();

        self.excluded_marker.is_empty() || !stem.contains(self.excluded_marker.as_str())
    }
}

#[cfg(test)]
mod tests {
    use crate::test_utils;

    use super::*;

    fn suffixes() -> Vec<String> {
        vec!["demg.isi".to_string(), "doseg.isi".to_string()]
    }

    #[test]
    fn finds_matching_files_sorted() {
        let dir = test_utils::create_temp_dir();
        test_utils::create_file_in(dir.path(), "b_doseg.isi", "");
        test_utils::create_file_in(dir.path(), "a_demg.isi", "");
        test_utils::create_file_in(dir.path(), "a_demg.ers", "");
        test_utils::create_file_in(dir.path(), "notes.txt", "");

        let catalog = DatasetCatalog::new(dir.path(), 1, &suffixes(), ".ers.");
        let files = catalog.candidates().unwrap();

        assert_eq!(
            files,
            vec![dir.path().join("a_demg.isi"), dir.path().join("b_doseg.isi")]
        );
    }

    #[test]
    fn skips_excluded_marker() {
        let dir = test_utils::create_temp_dir();
        test_utils::create_file_in(dir.path(), "grid.ers.demg.isi", "");
        test_utils::create_file_in(dir.path(), "grid_demg.isi", "");

        let catalog = DatasetCatalog::new(dir.path(), 1, &suffixes(), ".ers.");
        let files = catalog.candidates().unwrap();

        assert_eq!(files, vec![dir.path().join("grid_demg.isi")]);
    }

    #[test]
    fn respects_depth() {
        let dir = test_utils::create_temp_dir();
        test_utils::create_file_in(dir.path(), "top_demg.isi", "");
        test_utils::create_file_in(dir.path(), "sub/nested_demg.isi", "");

        let shallow = DatasetCatalog::new(dir.path(), 1, &suffixes(), ".ers.");
        assert_eq!(shallow.candidates().unwrap().len(), 1);

        let deep = DatasetCatalog::new(dir.path(), 2, &suffixes(), ".ers.");
        assert_eq!(deep.candidates().unwrap().len(), 2);
    }

    #[test]
    fn missing_root_is_an_error() {
        let dir = test_utils::create_temp_dir();
        let catalog = DatasetCatalog::new(&dir.path().join("absent"), 1, &suffixes(), "");

        assert!(catalog.candidates().is_err());
    }
}
