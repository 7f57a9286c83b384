use thiserror::Error;

#[derive(Error, Debug)]
pub enum MetricsError {
    #[error("Failed to read snapshot file '{path}': {source}")]
    SnapshotRead {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse snapshot file '{path}': {source}")]
    SnapshotParse {
        path: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("Malformed exchange-rate row at line {line}: {details}")]
    RateRow { line: u64, details: String },

    #[error("Exchange-rate table is empty: at least one dated rate is required")]
    EmptyRateTable,

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, MetricsError>;
