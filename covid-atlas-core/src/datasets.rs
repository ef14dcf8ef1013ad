//! The catalogue of raw datasets, addressed by fixed alias, and loading them from a local
//! directory. Fetching and refreshing the files is left to whatever populates that directory.

use std::{
    collections::HashMap,
    path::{Path, PathBuf},
};

use chrono::{DateTime, Local};
use log::{debug, error, info, warn};
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use strum::IntoEnumIterator;
use strum_macros::{Display, EnumIter, EnumString};

use crate::{
    error::{CovidAtlasError, CovidAtlasResult},
    geo::read_geometries_from_path,
    COL,
};

/// Rows scanned before fixing a CSV column's type. Several sources are blank for their first
/// few hundred rows in some columns.
const INFER_SCHEMA_LENGTH: usize = 10_000;

/// The independent analysis domains.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString, EnumIter,
)]
#[strum(serialize_all = "snake_case", ascii_case_insensitive)]
pub enum Domain {
    World,
    Us,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DatasetKind {
    Table,
    Geometry,
}

/// Every raw input, displayed and parsed as its alias.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString, EnumIter,
)]
#[strum(serialize_all = "snake_case")]
pub enum Dataset {
    WorldCovidData,
    WorldCovidVaccinations,
    WorldPopulation,
    WorldCountriesMap,
    UsCovidData,
    UsCovidVaccinations,
    UsCovidEthnicityDeaths,
    UsCovidAgeDeaths,
    UsPopulation,
    UsStatesMap,
}

impl Dataset {
    pub fn kind(&self) -> DatasetKind {
        match self {
            Dataset::WorldCountriesMap | Dataset::UsStatesMap => DatasetKind::Geometry,
            _ => DatasetKind::Table,
        }
    }

    pub fn domain(&self) -> Domain {
        match self {
            Dataset::WorldCovidData
            | Dataset::WorldCovidVaccinations
            | Dataset::WorldPopulation
            | Dataset::WorldCountriesMap => Domain::World,
            _ => Domain::Us,
        }
    }

    pub fn file_name(&self) -> String {
        match self.kind() {
            DatasetKind::Table => format!("{self}.csv"),
            DatasetKind::Geometry => format!("{self}.geojson"),
        }
    }

    /// Feature property used as the jurisdiction key of a geometry dataset.
    pub fn geometry_key(&self) -> Option<&'static str> {
        match self {
            Dataset::WorldCountriesMap => Some(COL::WORLD_MAP_ISO),
            Dataset::UsStatesMap => Some(COL::US_MAP_STATE),
            _ => None,
        }
    }

    pub fn for_domain(domain: Domain) -> impl Iterator<Item = Dataset> {
        Dataset::iter().filter(move |dataset| dataset.domain() == domain)
    }
}

/// Whether a dataset file is on disk and when it was last written.
#[derive(Debug, Clone)]
pub struct DatasetStatus {
    pub dataset: Dataset,
    pub path: PathBuf,
    pub modified: Option<DateTime<Local>>,
}

impl DatasetStatus {
    pub fn is_present(&self) -> bool {
        self.modified.is_some()
    }
}

/// In-memory mapping from alias to raw table. Geometry datasets are held as
/// `(key, geometry)` frames with WKT geometry. Files that could not be read are kept with their
/// error, which only the owning domain sees.
#[derive(Debug, Default, Clone)]
pub struct Datasets {
    tables: HashMap<Dataset, DataFrame>,
    unreadable: HashMap<Dataset, String>,
}

fn read_csv(path: &Path) -> CovidAtlasResult<DataFrame> {
    Ok(CsvReadOptions::default()
        .with_has_header(true)
        .with_infer_schema_length(Some(INFER_SCHEMA_LENGTH))
        .try_into_reader_with_file_path(Some(path.to_path_buf()))?
        .finish()?)
}

impl Datasets {
    /// Load every dataset file present in `dir`. Absent and unreadable files are skipped so that
    /// a domain whose inputs are complete can still run.
    pub fn load_dir<P: AsRef<Path>>(dir: P) -> CovidAtlasResult<Self> {
        let mut datasets = Self::default();
        for dataset in Dataset::iter() {
            let path = dir.as_ref().join(dataset.file_name());
            if !path.exists() {
                warn!("Dataset `{dataset}` not found at {}, skipping", path.display());
                continue;
            }
            debug!("Reading `{dataset}` from {}", path.display());
            let df = match (dataset.kind(), dataset.geometry_key()) {
                (DatasetKind::Geometry, Some(key)) => read_geometries_from_path(&path, key),
                _ => read_csv(&path),
            };
            match df {
                Ok(df) => {
                    info!("Loaded `{dataset}` with shape: {:?}", df.shape());
                    datasets.tables.insert(dataset, df);
                }
                Err(err) => {
                    error!("Failed to read `{dataset}` from {}: {err}", path.display());
                    datasets.unreadable.insert(dataset, err.to_string());
                }
            }
        }
        Ok(datasets)
    }

    /// Report the on-disk state of every dataset in `dir`.
    pub fn status<P: AsRef<Path>>(dir: P) -> Vec<DatasetStatus> {
        Dataset::iter()
            .map(|dataset| {
                let path = dir.as_ref().join(dataset.file_name());
                let modified = std::fs::metadata(&path)
                    .and_then(|metadata| metadata.modified())
                    .ok()
                    .map(DateTime::<Local>::from);
                DatasetStatus {
                    dataset,
                    path,
                    modified,
                }
            })
            .collect()
    }

    pub fn insert_table(&mut self, dataset: Dataset, df: DataFrame) -> &mut Self {
        self.unreadable.remove(&dataset);
        self.tables.insert(dataset, df);
        self
    }

    pub fn table(&self, dataset: Dataset) -> CovidAtlasResult<&DataFrame> {
        if let Some(reason) = self.unreadable.get(&dataset) {
            return Err(CovidAtlasError::UnreadableDataset {
                dataset: dataset.to_string(),
                reason: reason.clone(),
            });
        }
        self.tables
            .get(&dataset)
            .ok_or_else(|| CovidAtlasError::MissingDataset(dataset.to_string()))
    }

    pub fn contains(&self, dataset: Dataset) -> bool {
        self.tables.contains_key(&dataset)
    }

    /// Aliases of the domain that were not loaded.
    pub fn missing(&self, domain: Domain) -> Vec<Dataset> {
        Dataset::for_domain(domain)
            .filter(|dataset| !self.contains(*dataset))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use std::{io::Write, str::FromStr};

    use super::*;

    #[test]
    fn aliases_should_round_trip_through_strings() {
        assert_eq!(Dataset::UsCovidAgeDeaths.to_string(), "us_covid_age_deaths");
        assert_eq!(
            Dataset::from_str("world_countries_map").unwrap(),
            Dataset::WorldCountriesMap
        );
        assert_eq!(Dataset::UsStatesMap.file_name(), "us_states_map.geojson");
        assert_eq!(Dataset::UsPopulation.file_name(), "us_population.csv");
        assert!(Dataset::from_str("us_covid_hospitalizations").is_err());
    }

    #[test]
    fn datasets_should_split_by_domain() {
        assert_eq!(Dataset::for_domain(Domain::World).count(), 4);
        assert_eq!(Dataset::for_domain(Domain::Us).count(), 6);
        assert_eq!(Domain::from_str("US").unwrap(), Domain::Us);
    }

    #[test]
    fn load_dir_should_skip_missing_files() {
        let dir = tempfile::tempdir().unwrap();
        let mut file = std::fs::File::create(dir.path().join("us_covid_data.csv")).unwrap();
        writeln!(file, "submission_date,state,new_case").unwrap();
        writeln!(file, "01/22/2020,CA,5").unwrap();
        writeln!(file, "01/23/2020,CA,7").unwrap();

        let datasets = Datasets::load_dir(dir.path()).unwrap();
        let cases = datasets.table(Dataset::UsCovidData).unwrap();
        assert_eq!(cases.shape(), (2, 3));
        assert!(matches!(
            datasets.table(Dataset::UsPopulation),
            Err(CovidAtlasError::MissingDataset(alias)) if alias == "us_population"
        ));
        assert_eq!(datasets.missing(Domain::Us).len(), 5);
        assert_eq!(datasets.missing(Domain::World).len(), 4);

        let status = Datasets::status(dir.path());
        assert_eq!(status.iter().filter(|s| s.is_present()).count(), 1);
    }

    #[test]
    fn load_dir_should_set_aside_unreadable_files() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("world_countries_map.geojson"),
            "{\"type\": \"FeatureCollection\",",
        )
        .unwrap();
        std::fs::write(
            dir.path().join("us_covid_data.csv"),
            "submission_date,state,new_case\n01/22/2020,CA,5\n",
        )
        .unwrap();

        let datasets = Datasets::load_dir(dir.path()).unwrap();
        assert_eq!(datasets.table(Dataset::UsCovidData).unwrap().height(), 1);
        assert!(matches!(
            datasets.table(Dataset::WorldCountriesMap),
            Err(CovidAtlasError::UnreadableDataset { dataset, .. }) if dataset == "world_countries_map"
        ));
        assert!(datasets.missing(Domain::World).contains(&Dataset::WorldCountriesMap));
        assert!(!datasets.missing(Domain::Us).contains(&Dataset::UsCovidData));
    }
}
