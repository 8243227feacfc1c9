use thiserror::Error;

#[derive(Error, Debug)]
pub enum AnalyticsError {
    #[error("LLM error: {0}")]
    Llm(String),

    #[error("Classification error: {0}")]
    Classification(String),

    #[error("Execution error: {0}")]
    Execution(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("SQL error: {0}")]
    Sql(#[from] sqlx::Error),
}

pub type Result<T> = std::result::Result<T, AnalyticsError>;
