use std::collections::btree_map::Entry::{Occupied, Vacant};
use std::collections::BTreeMap;
use std::fs::File;
use std::path::{Path, PathBuf};

use failure::Error;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::storage::MetadataStore;

#[derive(Debug, Deserialize, Serialize)]
struct IndexRow {
    #[serde(rename = "surveyId")]
    survey_id: String,
    identifier: Uuid,
}

/// The persisted mapping from survey id to parent identifier.
#[derive(Debug, PartialEq, Eq)]
pub struct IdentifierIndex {
    path: PathBuf,
    survey_to_identifier: BTreeMap<String, Uuid>,
}

impl IdentifierIndex {
    /// Create an empty index that will be saved to `path`.
    pub fn new(path: &Path) -> Self {
        Self {
            path: path.to_path_buf(),
            survey_to_identifier: Default::default(),
        }
    }

    /// Load the index from `path`. A missing file yields an empty index.
    pub fn load(path: &Path) -> Result<Self, Error> {
        let mut index = Self::new(path);

        if !path.exists() {
            return Ok(index);
        }

        let mut reader = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .from_reader(File::open(path)?);
        for row in reader.deserialize() {
            let row: IndexRow = row?;
            index.survey_to_identifier.insert(row.survey_id, row.identifier);
        }

        Ok(index)
    }

    pub fn get(&self, survey_id: &str) -> Option<Uuid> {
        self.survey_to_identifier.get(survey_id).copied()
    }

    /// Record an identifier. An already known survey keeps its identifier, which is returned.
    pub fn insert(&mut self, survey_id: &str, identifier: Uuid) -> Uuid {
        match self.survey_to_identifier.entry(survey_id.into()) {
            Occupied(entry) => *entry.get(),
            Vacant(entry) => *entry.insert(identifier),
        }
    }

    pub fn len(&self) -> usize {
        self.survey_to_identifier.len()
    }

    pub fn is_empty(&self) -> bool {
        self.survey_to_identifier.is_empty()
    }

    /// Write the whole index through the store.
    pub fn save(&self, store: &MetadataStore) -> Result<(), Error> {
        let mut buffer = Vec::new();
        {
            let mut writer = csv::Writer::from_writer(&mut buffer);
            for (survey_id, identifier) in &self.survey_to_identifier {
                writer.serialize(IndexRow {
                    survey_id: survey_id.clone(),
                    identifier: *identifier,
                })?;
            }
            writer.flush()?;
        }

        store.write(&self.path, &buffer)
    }
}
