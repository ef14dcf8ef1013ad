use anyhow::Result;
use datasets::{Datasets, Domain};
use log::debug;
use pipeline::{AllResults, AnalysisResult, ReferenceTables};

use crate::config::Config;

// Re-exports
pub use column_names as COL;

// Modules
pub mod aggregate;
pub mod column_names;
pub mod config;
pub mod datasets;
pub mod dates;
pub mod error;
#[cfg(feature = "formatters")]
pub mod formatters;
pub mod geo;
pub mod identifiers;
pub mod join;
pub mod pipeline;
pub mod population;
pub mod schema;

/// Raw datasets and identifier tables of both domains, ready to be analysed
pub struct CovidAtlas {
    pub datasets: Datasets,
    pub reference: ReferenceTables,
    pub config: Config,
}

impl CovidAtlas {
    /// Setup the CovidAtlas object with default configuration
    pub fn new() -> Result<Self> {
        Self::new_with_config(Config::default())
    }

    /// Setup the CovidAtlas object with custom configuration
    pub fn new_with_config(config: Config) -> Result<Self> {
        debug!("config: {config:?}");
        let datasets = Datasets::load_dir(&config.data_dir)?;
        let reference = ReferenceTables::load(&config)?;
        Ok(Self {
            datasets,
            reference,
            config,
        })
    }

    pub fn world(&self) -> Result<AnalysisResult> {
        self.run(Domain::World)
    }

    pub fn us(&self) -> Result<AnalysisResult> {
        self.run(Domain::Us)
    }

    pub fn run(&self, domain: Domain) -> Result<AnalysisResult> {
        Ok(pipeline::run(
            domain,
            &self.datasets,
            &self.reference,
            &self.config,
        )?)
    }

    /// Run both domains; each result is reported separately
    pub fn run_all(&self) -> AllResults {
        pipeline::run_all(&self.datasets, &self.reference, &self.config)
    }
}

#[cfg(test)]
mod tests {
    use std::fs;

    use polars::prelude::{CsvWriter, SerWriter};

    use super::*;

    #[test]
    fn new_with_config_should_load_from_disk() {
        let dir = tempfile::tempdir().unwrap();
        let data_dir = dir.path().join("datasets");
        fs::create_dir(&data_dir).unwrap();
        fs::write(
            data_dir.join("us_covid_data.csv"),
            "submission_date,state,new_case\n01/01/2021,CA,100\n",
        )
        .unwrap();
        let world_identifiers = dir.path().join("world.csv");
        fs::write(&world_identifiers, "Name,ISO2,Identifier\nFrance,FR,FRA\n").unwrap();
        let state_identifiers = dir.path().join("states.csv");
        fs::write(&state_identifiers, "Name,Identifier\nCalifornia,CA\n").unwrap();

        let config = Config {
            data_dir,
            world_identifiers,
            state_identifiers,
            ..Config::default()
        };
        let atlas = CovidAtlas::new_with_config(config).unwrap();
        assert!(atlas.reference.states.is_canonical("CA"));
        assert_eq!(atlas.datasets.missing(Domain::Us).len(), 5);
        // Both domains lack inputs, and both report it
        let results = atlas.run_all();
        assert!(results.world.is_err());
        assert!(results.us.is_err());
        assert!(atlas.us().is_err());
    }

    #[test]
    fn unreadable_world_file_should_not_block_us() {
        let dir = tempfile::tempdir().unwrap();
        let data_dir = dir.path().join("datasets");
        fs::create_dir(&data_dir).unwrap();
        let fixtures = pipeline::tests::datasets();
        for dataset in datasets::Dataset::for_domain(Domain::Us) {
            if dataset == datasets::Dataset::UsStatesMap {
                continue;
            }
            let mut df = fixtures.table(dataset).unwrap().clone();
            let file = fs::File::create(data_dir.join(dataset.file_name())).unwrap();
            CsvWriter::new(file).finish(&mut df).unwrap();
        }
        fs::write(
            data_dir.join("us_states_map.geojson"),
            r#"{"type": "FeatureCollection", "features": [{"type": "Feature",
                "properties": {"STATE": "CA"},
                "geometry": {"type": "Point", "coordinates": [-119.0, 37.0]}}]}"#,
        )
        .unwrap();
        // Truncated mid-document
        fs::write(
            data_dir.join("world_countries_map.geojson"),
            r#"{"type": "FeatureCollection","#,
        )
        .unwrap();
        let world_identifiers = dir.path().join("world.csv");
        fs::write(&world_identifiers, "Name,ISO2,Identifier\nFrance,FR,FRA\n").unwrap();
        let state_identifiers = dir.path().join("states.csv");
        fs::write(
            &state_identifiers,
            "Name,Identifier\nCalifornia,CA\nNew York,NY\n",
        )
        .unwrap();

        let config = Config {
            data_dir,
            world_identifiers,
            state_identifiers,
            ..Config::default()
        };
        let atlas = CovidAtlas::new_with_config(config).unwrap();
        let us = atlas.us().unwrap();
        assert_eq!(us.by_jurisdiction.height(), 2);
        let results = atlas.run_all();
        assert!(results.us.is_ok());
        assert!(results.world.is_err());
    }

    #[test]
    fn new_with_config_should_fail_without_identifier_tables() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config {
            data_dir: dir.path().to_path_buf(),
            world_identifiers: dir.path().join("absent.csv"),
            ..Config::default()
        };
        assert!(CovidAtlas::new_with_config(config).is_err());
    }
}
