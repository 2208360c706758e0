use std::path::{Path, PathBuf};

use failure::Error;

use crate::dataset::DatasetError;
use crate::settings::InputSettings;

/// The geographic extent of a grid, as the numeric strings found in the file.
#[derive(Clone, Debug, PartialEq)]
pub struct GeoBounds {
    pub north: String,
    pub south: String,
    pub east: String,
    pub west: String,
}

impl GeoBounds {
    /// Extent covering the whole earth.
    pub fn whole_earth() -> Self {
        Self {
            north: "90".into(),
            south: "-90".into(),
            east: "180".into(),
            west: "-180".into(),
        }
    }

    /// Build bounds from the first and last values of the latitude and longitude axes.
    #[cfg(any(test, feature = "netcdf"))]
    pub fn from_axes(first_lat: f64, last_lat: f64, first_lon: f64, last_lon: f64) -> Self {
        Self {
            north: last_lat.to_string(),
            south: first_lat.to_string(),
            east: last_lon.to_string(),
            west: first_lon.to_string(),
        }
    }
}

/// Source of the geographic extent of a dataset, addressed by file stem.
pub trait BoundsReader {
    /// Whether the derived grid file of a dataset exists.
    fn has_source(&self, stem: &str) -> bool;

    fn read_bounds(&self, stem: &str) -> Result<GeoBounds, Error>;
}

/// Reads bounds from the netCDF grids written next to the survey files.
#[derive(Debug)]
pub struct GridBoundsReader {
    grid_dir: PathBuf,
    extension: String,
}

impl GridBoundsReader {
    #[cfg(feature = "netcdf")]
    pub const LATITUDE_VARIABLE: &'static str = "lat";
    #[cfg(feature = "netcdf")]
    pub const LONGITUDE_VARIABLE: &'static str = "lon";

    pub fn new(grid_dir: &Path, extension: &str) -> Self {
        Self {
            grid_dir: grid_dir.to_path_buf(),
            extension: extension.into(),
        }
    }

    pub fn from_settings(input_settings: &InputSettings) -> Self {
        Self::new(
            Path::new(&input_settings.grid_dir),
            &input_settings.grid_extension,
        )
    }

    pub fn grid_path(&self, stem: &str) -> PathBuf {
        self.grid_dir.join(format!("{}.{}", stem, self.extension))
    }

    /// Whether this build can decode grid files at all.
    pub fn is_supported() -> bool {
        cfg!(feature = "netcdf")
    }

    #[cfg(feature = "netcdf")]
    fn read_axes(path: &Path) -> Result<GeoBounds, Error> {
        let file = netcdf::open(path)?;

        let (first_lat, last_lat) = Self::axis_ends(&file, path, Self::LATITUDE_VARIABLE)?;
        let (first_lon, last_lon) = Self::axis_ends(&file, path, Self::LONGITUDE_VARIABLE)?;

        Ok(GeoBounds::from_axes(first_lat, last_lat, first_lon, last_lon))
    }

    #[cfg(feature = "netcdf")]
    fn axis_ends(file: &netcdf::File, path: &Path, name: &str) -> Result<(f64, f64), Error> {
        let variable = file.variable(name).ok_or_else(|| DatasetError::MissingVariable {
            path: path.display().to_string(),
            variable: name.into(),
        })?;

        let length = variable.len();
        if length == 0 {
            return Err(DatasetError::MissingVariable {
                path: path.display().to_string(),
                variable: name.into(),
            }
            .into());
        }

        let first = variable.get_value::<f64, _>([0usize])?;
        let last = variable.get_value::<f64, _>([length - 1])?;

        Ok((first, last))
    }

    #[cfg(not(feature = "netcdf"))]
    fn read_axes(path: &Path) -> Result<GeoBounds, Error> {
        Err(DatasetError::NetCdfSupportDisabled(path.display().to_string()).into())
    }
}

impl BoundsReader for GridBoundsReader {
    fn has_source(&self, stem: &str) -> bool {
        self.grid_path(stem).is_file()
    }

    fn read_bounds(&self, stem: &str) -> Result<GeoBounds, Error> {
        let path = self.grid_path(stem);
        if !path.is_file() {
            return Err(DatasetError::MissingGrid(path.display().to_string()).into());
        }

        Self::read_axes(&path)
    }
}
