use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use failure::Error;
use tempfile::NamedTempFile;

use crate::settings::OutputSettings;

/// The directory holding generated metadata documents.
#[derive(Debug)]
pub struct MetadataStore {
    dir: PathBuf,
}

impl MetadataStore {
    pub const PARENT_PREFIX: &'static str = "P";
    pub const DOCUMENT_EXTENSION: &'static str = "xml";

    /// Open the store, creating its directory if necessary.
    pub fn new(dir: &Path) -> Result<Self, Error> {
        fs::create_dir_all(dir)?;

        Ok(Self {
            dir: dir.to_path_buf(),
        })
    }

    pub fn from_settings(output_settings: &OutputSettings) -> Result<Self, Error> {
        Self::new(Path::new(&output_settings.metadata_dir))
    }

    pub fn parent_path(&self, survey_id: &str) -> PathBuf {
        self.dir.join(format!(
            "{}{}.{}",
            Self::PARENT_PREFIX,
            survey_id,
            Self::DOCUMENT_EXTENSION
        ))
    }

    /// Path of a child document. Datasets of several surveys get one document
    /// per survey, distinguished by a survey id suffix.
    pub fn child_path(&self, stem: &str, survey_id: Option<&str>) -> PathBuf {
        let name = match survey_id {
            Some(survey_id) => format!("{}-{}.{}", stem, survey_id, Self::DOCUMENT_EXTENSION),
            None => format!("{}.{}", stem, Self::DOCUMENT_EXTENSION),
        };
        self.dir.join(name)
    }

    /// All child documents of the dataset `stem` in the store, whatever survey they belong to.
    ///
    /// A `<stem>-<id>.xml` name only counts when the store holds a parent for `<id>`,
    /// so datasets whose stem starts with `<stem>-` are left alone.
    pub fn child_documents(&self, stem: &str) -> Result<Vec<PathBuf>, Error> {
        let single = format!("{}.{}", stem, Self::DOCUMENT_EXTENSION);
        let prefix = format!("{}-", stem);
        let extension = format!(".{}", Self::DOCUMENT_EXTENSION);

        let mut paths = Vec::new();
        for entry in fs::read_dir(&self.dir)? {
            let entry = entry?;
            let name = entry.file_name().to_string_lossy().into_owned();
            let survey_id = name
                .strip_prefix(&prefix)
                .and_then(|rest| rest.strip_suffix(&extension));
            let is_child = match survey_id {
                Some(survey_id) => self.parent_path(survey_id).is_file(),
                None => name == single,
            };
            if is_child {
                paths.push(entry.path());
            }
        }
        paths.sort();

        Ok(paths)
    }

    pub fn remove(&self, path: &Path) -> Result<(), Error> {
        Ok(fs::remove_file(path)?)
    }

    pub fn file_path(&self, name: &str) -> PathBuf {
        self.dir.join(name)
    }

    /// Replace the file at `path` as a whole. Readers see either the old or the new content.
    pub fn write(&self, path: &Path, contents: &[u8]) -> Result<(), Error> {
        let dir = path.parent().unwrap_or(&self.dir);

        let mut file = NamedTempFile::new_in(dir)?;
        file.write_all(contents)?;
        file.flush()?;
        file.persist(path).map_err(|e| e.error)?;

        Ok(())
    }

    pub fn read(&self, path: &Path) -> Result<String, Error> {
        Ok(fs::read_to_string(path)?)
    }
}
