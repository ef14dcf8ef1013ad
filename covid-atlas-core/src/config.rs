use std::path::PathBuf;

use serde::{Deserialize, Serialize};

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct Config {
    /// Directory holding the raw dataset files, one per alias.
    pub data_dir: PathBuf,
    /// Directory the derived tables are written to.
    pub output_dir: PathBuf,
    /// CSV of (Name, ISO2, Identifier) country triples.
    pub world_identifiers: PathBuf,
    /// CSV of (Name, Identifier) state pairs.
    pub state_identifiers: PathBuf,
    pub population: PopulationConfig,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            data_dir: "datasets".into(),
            output_dir: "results".into(),
            world_identifiers: "world_country_identifiers.csv".into(),
            state_identifiers: "us_state_identifiers.csv".into(),
            population: PopulationConfig::default(),
        }
    }
}

/// Which slice of the population sources is used as denominator.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct PopulationConfig {
    pub reference_year: i32,
    /// UN WPP projection variant.
    pub world_variant: String,
    /// The UN publishes thousands of persons.
    pub world_scale: f64,
}

impl Default for PopulationConfig {
    fn default() -> Self {
        PopulationConfig {
            reference_year: 2020,
            world_variant: "Medium".into(),
            world_scale: 1000.0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_config_should_fill_defaults() {
        let config: Config = serde_json::from_str(
            r#"{"data_dir": "/tmp/covid", "population": {"reference_year": 2021}}"#,
        )
        .unwrap();
        assert_eq!(config.data_dir, PathBuf::from("/tmp/covid"));
        assert_eq!(config.output_dir, PathBuf::from("results"));
        assert_eq!(config.population.reference_year, 2021);
        assert_eq!(config.population.world_variant, "Medium");
        assert_eq!(config.population.world_scale, 1000.0);
    }
}
