use thiserror::Error;

#[derive(Error, Debug)]
pub enum ZillaError {
    #[error("Store error: {0}")]
    StoreError(#[from] crate::store::StoreError),
    #[error("Index error: {0}")]
    IndexError(#[from] crate::index::IndexError),
    #[error("Sync error: {0}")]
    SyncError(#[from] crate::collaborators::SyncError),
    #[error("Data processing error: {0}")]
    DataProcessing(#[from] zilla_data_processing::DataError),
    #[error("Configuration error: {0}")]
    ConfigError(String),
    #[error("Init Logging error: {0}")]
    InitLoggingError(#[from] tracing_subscriber::filter::ParseError),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub type Result<T> = std::result::Result<T, ZillaError>;
