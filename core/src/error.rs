use thiserror::Error;

#[derive(Error, Debug)]
pub enum HealthError {
    #[error("Missing input: table '{table}' has not been produced")]
    MissingInput { table: String },

    #[error("Missing required columns: {}", .0.join(", "))]
    MissingColumns(Vec<String>),

    #[error("Invalid configuration for '{field}': {reason}")]
    InvalidConfig { field: String, reason: String },

    #[error("Invalid invoice record at line {line}: {reason}")]
    InvalidRecord { line: u64, reason: String },

    #[error("Cannot fit decline model: {rows} training rows with {positives} positives")]
    DegenerateTrainingSet { rows: usize, positives: usize },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl HealthError {
    pub fn missing_input(table: &str) -> Self {
        Self::MissingInput { table: table.to_string() }
    }

    pub fn invalid_config(field: &str, reason: impl Into<String>) -> Self {
        Self::InvalidConfig { field: field.to_string(), reason: reason.into() }
    }
}

pub type HealthResult<T> = Result<T, HealthError>;
