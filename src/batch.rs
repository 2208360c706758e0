use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use failure::Error;
use log::{debug, error, info, warn};
use uuid::Uuid;

use crate::dataset::{BoundsReader, DatasetAttributes};
use crate::metadata::{DocumentKind, FieldResolver, ResolvedFields, Template, TemplateError};
use crate::overrides::{DatasetOverride, OverrideTables};
use crate::storage::{IdentifierRegistry, MetadataStore, ParentIdentifier, RegistryError};

/// Why a dataset produced no records.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SkipReason {
    /// The grid file derived from the dataset does not exist.
    MissingDerivedFile,
    /// The grid file exists but its bounds could not be read.
    GeospatialReadFailure(String),
    /// Neither the dataset nor the override table names a survey.
    NoSurveyIdentifier,
}

/// A child record written for one survey of a dataset.
#[derive(Clone, Debug, PartialEq)]
pub struct ChildRecord {
    pub survey_id: String,
    pub parent: ParentIdentifier,
    pub identifier: Uuid,
    pub path: PathBuf,
}

#[derive(Debug)]
pub struct SurveyFailure {
    pub survey_id: String,
    pub error: Error,
}

impl SurveyFailure {
    pub fn is_corrupt_parent(&self) -> bool {
        matches!(
            self.error.downcast_ref::<RegistryError>(),
            Some(RegistryError::CorruptParentStore { .. })
        )
    }
}

#[derive(Debug, Default)]
pub struct DatasetReport {
    pub records: Vec<ChildRecord>,
    pub failures: Vec<SurveyFailure>,
}

/// The result of processing one dataset.
#[derive(Debug)]
pub enum DatasetOutcome {
    Processed(DatasetReport),
    Skipped(SkipReason),
    Failed(Error),
}

/// Condensed outcome of one dataset, kept in processing order.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum DatasetStatus {
    Processed { records: usize, failures: usize },
    Skipped(SkipReason),
    Failed,
}

#[derive(Debug, Default)]
pub struct BatchSummary {
    pub statuses: Vec<(PathBuf, DatasetStatus)>,
    pub child_records: usize,
    pub parents_created: usize,
    pub corrupt_surveys: BTreeSet<String>,
}

impl BatchSummary {
    fn record(&mut self, path: &Path, outcome: &DatasetOutcome) {
        let status = match outcome {
            DatasetOutcome::Processed(report) => {
                self.child_records += report.records.len();
                self.parents_created += report
                    .records
                    .iter()
                    .filter(|record| matches!(record.parent, ParentIdentifier::New(_)))
                    .count();
                for failure in report.failures.iter().filter(|f| f.is_corrupt_parent()) {
                    self.corrupt_surveys.insert(failure.survey_id.clone());
                }

                DatasetStatus::Processed {
                    records: report.records.len(),
                    failures: report.failures.len(),
                }
            }
            DatasetOutcome::Skipped(reason) => DatasetStatus::Skipped(reason.clone()),
            DatasetOutcome::Failed(_) => DatasetStatus::Failed,
        };

        self.statuses.push((path.to_path_buf(), status));
    }

    pub fn processed(&self) -> usize {
        self.count(|status| matches!(status, DatasetStatus::Processed { .. }))
    }

    pub fn skipped(&self) -> usize {
        self.count(|status| matches!(status, DatasetStatus::Skipped(_)))
    }

    pub fn failed(&self) -> usize {
        self.count(|status| matches!(status, DatasetStatus::Failed))
    }

    /// Whether a parent document without recoverable identifier was found.
    pub fn has_integrity_errors(&self) -> bool {
        !self.corrupt_surveys.is_empty()
    }

    fn count<F: Fn(&DatasetStatus) -> bool>(&self, predicate: F) -> usize {
        self.statuses
            .iter()
            .filter(|(_, status)| predicate(status))
            .count()
    }
}

/// Runs the record generation for a sequence of datasets, one at a time.
pub struct BatchOrchestrator<'a, B: BoundsReader> {
    tables: &'a OverrideTables,
    resolver: &'a FieldResolver,
    bounds_reader: &'a B,
    registry: IdentifierRegistry<'a>,
    store: &'a MetadataStore,
    child_template: &'a Template,
}

impl<'a, B: BoundsReader> BatchOrchestrator<'a, B> {
    pub fn new(
        tables: &'a OverrideTables,
        resolver: &'a FieldResolver,
        bounds_reader: &'a B,
        registry: IdentifierRegistry<'a>,
        store: &'a MetadataStore,
        child_template: &'a Template,
    ) -> Result<Self, Error> {
        if child_template.kind() != DocumentKind::Child {
            return Err(TemplateError::KindMismatch {
                template: child_template.kind(),
                fields: DocumentKind::Child,
            }
            .into());
        }

        Ok(Self {
            tables,
            resolver,
            bounds_reader,
            registry,
            store,
            child_template,
        })
    }

    /// Process all datasets. A failing dataset never stops the batch.
    pub fn run<I>(&mut self, datasets: I) -> BatchSummary
    where
        I: IntoIterator<Item = PathBuf>,
    {
        let mut summary = BatchSummary::default();

        for path in datasets {
            let outcome = self.process_dataset(&path);
            Self::log_outcome(&path, &outcome);
            summary.record(&path, &outcome);
        }

        summary
    }

    pub fn process_dataset(&mut self, path: &Path) -> DatasetOutcome {
        match self.try_process_dataset(path) {
            Ok(outcome) => outcome,
            Err(e) => DatasetOutcome::Failed(e),
        }
    }

    fn try_process_dataset(&mut self, path: &Path) -> Result<DatasetOutcome, Error> {
        let attributes = DatasetAttributes::from_path(path)?;

        if !self.bounds_reader.has_source(attributes.stem()) {
            return Ok(DatasetOutcome::Skipped(SkipReason::MissingDerivedFile));
        }

        let bounds = match self.bounds_reader.read_bounds(attributes.stem()) {
            Ok(bounds) => bounds,
            Err(e) => {
                return Ok(DatasetOutcome::Skipped(
                    SkipReason::GeospatialReadFailure(e.to_string()),
                ))
            }
        };
        let attributes = attributes.with_bounds(&bounds);

        let dataset_override = self.tables.dataset(attributes.file_name());
        let survey_ids = Self::survey_ids(&attributes, dataset_override);
        if survey_ids.is_empty() {
            return Ok(DatasetOutcome::Skipped(SkipReason::NoSurveyIdentifier));
        }

        let child_fields =
            self.resolver
                .resolve(&attributes, None, dataset_override, DocumentKind::Child);
        let fan_out = survey_ids.len() > 1;
        let current_documents: BTreeSet<PathBuf> = survey_ids
            .iter()
            .map(|survey_id| {
                self.store
                    .child_path(attributes.stem(), Some(survey_id.as_str()).filter(|_| fan_out))
            })
            .collect();

        let mut report = DatasetReport::default();
        for survey_id in survey_ids {
            match self.create_records(&survey_id, &attributes, &child_fields, fan_out) {
                Ok(record) => report.records.push(record),
                Err(error) => report.failures.push(SurveyFailure { survey_id, error }),
            }
        }
        self.remove_stale_documents(attributes.stem(), &current_documents);

        Ok(DatasetOutcome::Processed(report))
    }

    /// Remove child documents an earlier run wrote for surveys the dataset no longer belongs to.
    fn remove_stale_documents(&self, stem: &str, current_documents: &BTreeSet<PathBuf>) {
        let documents = match self.store.child_documents(stem) {
            Ok(documents) => documents,
            Err(e) => {
                warn!("Unable to list earlier child records of {}: {}", stem, e);
                return;
            }
        };

        for path in documents
            .iter()
            .filter(|path| !current_documents.contains(*path))
        {
            match self.store.remove(path) {
                Ok(()) => info!("Removed stale child record {}", path.display()),
                Err(e) => warn!("Unable to remove stale child record {}: {}", path.display(), e),
            }
        }
    }

    /// Survey ids from the dataset's own attributes and from the override table.
    fn survey_ids(
        attributes: &DatasetAttributes,
        dataset_override: Option<&DatasetOverride>,
    ) -> BTreeSet<String> {
        attributes
            .survey_ids()
            .into_iter()
            .chain(dataset_override.map(DatasetOverride::survey_ids).unwrap_or_default())
            .collect()
    }

    fn create_records(
        &mut self,
        survey_id: &str,
        attributes: &DatasetAttributes,
        child_fields: &ResolvedFields,
        fan_out: bool,
    ) -> Result<ChildRecord, Error> {
        let tables = self.tables;
        let resolver = self.resolver;

        let parent = self.registry.get_or_create(survey_id, || {
            resolver.resolve(
                attributes,
                tables.survey(survey_id),
                None,
                DocumentKind::Parent,
            )
        })?;

        let identifier = Uuid::new_v4();
        let document = self
            .child_template
            .render(&child_fields.to_child_fields(&identifier, &parent.identifier()))?;

        let path = self
            .store
            .child_path(attributes.stem(), Some(survey_id).filter(|_| fan_out));
        self.store.write(&path, document.as_bytes())?;

        Ok(ChildRecord {
            survey_id: survey_id.into(),
            parent,
            identifier,
            path,
        })
    }

    fn log_outcome(path: &Path, outcome: &DatasetOutcome) {
        match outcome {
            DatasetOutcome::Processed(report) => {
                for record in &report.records {
                    debug!(
                        "{} - child record {} of survey {} written to {}",
                        path.display(),
                        record.identifier,
                        record.survey_id,
                        record.path.display()
                    );
                }
                for failure in &report.failures {
                    if failure.is_corrupt_parent() {
                        error!(
                            "{} - survey {} has a corrupt parent record: {}",
                            path.display(),
                            failure.survey_id,
                            failure.error
                        );
                    } else {
                        error!(
                            "{} - unable to create records of survey {}: {}",
                            path.display(),
                            failure.survey_id,
                            failure.error
                        );
                    }
                }
                info!(
                    "Processed {} ({} child records)",
                    path.display(),
                    report.records.len()
                );
            }
            DatasetOutcome::Skipped(SkipReason::MissingDerivedFile) => {
                debug!("{} - skipped as grid file does not exist", path.display());
            }
            DatasetOutcome::Skipped(SkipReason::GeospatialReadFailure(e)) => {
                warn!("{} - skipped as grid bounds are unreadable: {}", path.display(), e);
            }
            DatasetOutcome::Skipped(SkipReason::NoSurveyIdentifier) => {
                warn!("{} - skipped as survey id missing", path.display());
            }
            DatasetOutcome::Failed(e) => {
                error!("{} - unable to process dataset: {}", path.display(), e);
                for cause in e.iter_causes() {
                    error!("    caused by: {}", cause);
                }
                debug!("{}", e.backtrace());
            }
        }
    }
}
