use covid_atlas_core::error::CovidAtlasError;
use polars::error::PolarsError;

#[derive(thiserror::Error, Debug)]
pub enum CovidAtlasCliError {
    #[error("Anyhow error: {0}")]
    Anyhow(#[from] anyhow::Error),
    #[error("polars error: {0}")]
    PolarsError(#[from] PolarsError),
    #[error("covid-atlas error: {0}")]
    CovidAtlasError(#[from] CovidAtlasError),
    #[error("std IO error: {0}")]
    IOError(#[from] std::io::Error),
    #[error("Invalid TOML in config file: {0}")]
    TomlError(#[from] toml::de::Error),
    #[error("Pipeline task failed to complete: {0}")]
    JoinError(#[from] tokio::task::JoinError),
    #[error("Domain(s) failed: {0}")]
    DomainsFailed(String),
}

pub type CovidAtlasCliResult<T> = Result<T, CovidAtlasCliError>;
