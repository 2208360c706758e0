mod attributes;
mod bounds;
mod catalog;

use failure::Fail;

pub use self::attributes::{split_survey_ids, DatasetAttributes};
pub use self::bounds::{BoundsReader, GeoBounds, GridBoundsReader};
pub use self::catalog::DatasetCatalog;

#[derive(Debug, Fail)]
pub enum DatasetError {
    /// The path does not name a file.
    #[fail(display = "Invalid dataset path: {}", _0)]
    InvalidPath(String),
    #[fail(display = "Not a directory: {}", _0)]
    NotADirectory(String),
    /// The grid file derived from a dataset does not exist.
    #[fail(display = "Grid file {} does not exist", _0)]
    MissingGrid(String),
    /// The grid file lacks a coordinate variable or the variable is empty.
    #[cfg(feature = "netcdf")]
    #[fail(display = "Grid file {} contains no values for `{}`", path, variable)]
    MissingVariable { path: String, variable: String },
    #[cfg(not(feature = "netcdf"))]
    #[fail(
        display = "Unable to read grid file {}: built without netCDF support",
        _0
    )]
    NetCdfSupportDisabled(String),
}
