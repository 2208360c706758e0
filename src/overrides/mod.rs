mod tables;

pub use self::tables::{DatasetOverride, OverrideTables, SurveyOverride};
