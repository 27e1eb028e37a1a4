use chrono::NaiveDate;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum MetricsError {
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Input file not found: {path}")]
    MissingInput { path: String },

    #[error("Column '{column}' missing from {source_name}")]
    MissingColumn { column: String, source_name: String },

    #[error("Chunk {chunk} could not be read: {source}")]
    ChunkRead {
        chunk: u64,
        #[source]
        source: csv::Error,
    },

    #[error("Cohort ({acq_date}, {partner}) has no members but retained players")]
    CohortIntegrity { acq_date: NaiveDate, partner: String },

    #[error("Invalid configuration: {reason}")]
    InvalidConfig { reason: String },

    #[error("Stored date '{value}' is not YYYY-MM-DD")]
    InvalidStoredDate { value: String },

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub type MetricsResult<T> = Result<T, MetricsError>;
