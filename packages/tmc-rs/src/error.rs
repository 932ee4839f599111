use thiserror::Error;

#[derive(Error, Debug)]
pub enum TmcError {
    #[error("Ingestion failed: {0}")]
    IngestionError(String),

    #[error("Query timestamp {query} outside sampled range [{min}, {max}]")]
    OutOfDomainError { query: f64, min: f64, max: f64 },

    #[error("Operation on empty series: {0}")]
    EmptySeriesError(String),

    #[error("Invalid configuration: {0}")]
    ConfigurationError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, TmcError>;
