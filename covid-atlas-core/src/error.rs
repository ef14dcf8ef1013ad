//! Error types.

#[derive(thiserror::Error, Debug)]
pub enum CovidAtlasError {
    #[error("Wrapped anyhow error: {0}")]
    AnyhowError(#[from] anyhow::Error),
    #[error("Table `{table}` is missing expected column `{column}`")]
    SchemaMismatch { table: String, column: String },
    #[error("Dataset not loaded: {0}")]
    MissingDataset(String),
    #[error("Dataset `{dataset}` could not be read: {reason}")]
    UnreadableDataset { dataset: String, reason: String },
    #[error("Frame has no `geometry` column; choose a tabular output format")]
    MissingGeometry,
    #[error("Invalid geometry: {0}")]
    InvalidGeometry(String),
    #[error("Wrapped polars error: {0}")]
    PolarsError(#[from] polars::error::PolarsError),
    #[error("Wrapped geojson error: {0}")]
    GeoJsonError(#[from] geojson::Error),
    #[error("Wrapped IO error: {0}")]
    IoError(#[from] std::io::Error),
}

pub type CovidAtlasResult<T> = Result<T, CovidAtlasError>;
