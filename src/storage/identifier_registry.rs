use std::collections::HashSet;
use std::path::Path;

use failure::Error;
use failure::Fail;
use log::{debug, info, warn};
use uuid::Uuid;

use crate::metadata::{DocumentKind, ResolvedFields, Template};
use crate::storage::{read_file_identifier, IdentifierIndex, MetadataStore};

/// The identifier of a parent record and whether the record was written just now.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ParentIdentifier {
    New(Uuid),
    Existing(Uuid),
}

impl ParentIdentifier {
    pub fn identifier(&self) -> Uuid {
        match *self {
            ParentIdentifier::New(identifier) | ParentIdentifier::Existing(identifier) => identifier,
        }
    }
}

/// Hands out one stable parent identifier per survey id, creating the parent
/// document the first time a survey is seen.
#[derive(Debug)]
pub struct IdentifierRegistry<'s> {
    store: &'s MetadataStore,
    template: &'s Template,
    index: IdentifierIndex,
    corrupt_surveys: HashSet<String>,
}

impl<'s> IdentifierRegistry<'s> {
    pub fn new(
        store: &'s MetadataStore,
        template: &'s Template,
        index: IdentifierIndex,
    ) -> Result<Self, RegistryError> {
        if template.kind() != DocumentKind::Parent {
            return Err(RegistryError::WrongTemplate(template.kind()));
        }

        Ok(Self {
            store,
            template,
            index,
            corrupt_surveys: HashSet::new(),
        })
    }

    /// Return the parent identifier of `survey_id`.
    ///
    /// An existing parent document is never rewritten and `resolve_fields` is
    /// only called when a document has to be built.
    pub fn get_or_create<F>(
        &mut self,
        survey_id: &str,
        resolve_fields: F,
    ) -> Result<ParentIdentifier, Error>
    where
        F: FnOnce() -> ResolvedFields,
    {
        if survey_id.contains(|c: char| std::path::is_separator(c)) || survey_id.contains("..") {
            return Err(RegistryError::InvalidSurveyId(survey_id.into()).into());
        }

        let path = self.store.parent_path(survey_id);

        if self.corrupt_surveys.contains(survey_id) {
            return Err(Self::corrupt(survey_id, &path).into());
        }

        if let Some(identifier) = self.index.get(survey_id) {
            if path.is_file() {
                return Ok(ParentIdentifier::Existing(identifier));
            }

            warn!(
                "Parent document {} of survey {} is missing; rebuilding it",
                path.display(),
                survey_id
            );
            self.write_parent(&path, &identifier, &resolve_fields())?;
            return Ok(ParentIdentifier::New(identifier));
        }

        if path.is_file() {
            let identifier = self.recover_identifier(survey_id, &path)?;
            self.index.insert(survey_id, identifier);
            self.index.save(self.store)?;

            debug!(
                "Recovered identifier {} of survey {} from {}",
                identifier,
                survey_id,
                path.display()
            );
            return Ok(ParentIdentifier::Existing(identifier));
        }

        let identifier = Uuid::new_v4();
        self.write_parent(&path, &identifier, &resolve_fields())?;
        self.index.insert(survey_id, identifier);
        self.index.save(self.store)?;

        info!("Created parent record {} for survey {}", identifier, survey_id);

        Ok(ParentIdentifier::New(identifier))
    }

    fn write_parent(
        &self,
        path: &Path,
        identifier: &Uuid,
        fields: &ResolvedFields,
    ) -> Result<(), Error> {
        let document = self.template.render(&fields.to_parent_fields(identifier))?;
        self.store.write(path, document.as_bytes())
    }

    /// Read the identifier out of a parent document written by an earlier run.
    fn recover_identifier(&mut self, survey_id: &str, path: &Path) -> Result<Uuid, Error> {
        let document = self.store.read(path)?;

        let identifier = read_file_identifier(&document)
            .ok()
            .flatten()
            .and_then(|text| Uuid::parse_str(&text).ok());

        match identifier {
            Some(identifier) => Ok(identifier),
            None => {
                self.corrupt_surveys.insert(survey_id.into());
                Err(Self::corrupt(survey_id, path).into())
            }
        }
    }

    fn corrupt(survey_id: &str, path: &Path) -> RegistryError {
        RegistryError::CorruptParentStore {
            survey_id: survey_id.into(),
            path: path.display().to_string(),
        }
    }
}

#[derive(Debug, Fail)]
pub enum RegistryError {
    /// An existing parent document holds no usable identifier.
    #[fail(
        display = "Parent document {} of survey {} contains no recoverable identifier",
        path, survey_id
    )]
    CorruptParentStore { survey_id: String, path: String },
    #[fail(display = "Survey id `{}` cannot be used as a file name", _0)]
    InvalidSurveyId(String),
    #[fail(display = "Parent records need a parent template, got {:?}", _0)]
    WrongTemplate(DocumentKind),
}
