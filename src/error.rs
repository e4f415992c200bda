use thiserror::Error;

/// Why a measurement run did not produce a result.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum TestError {
    /// The server catalog could not be fetched, so no session was established.
    #[error("Failed to retrieve speedtest configuration. Check your internet connection. ({0})")]
    Connection(String),

    #[error("An error occurred: {0}")]
    Other(String),

    #[error("Speed test stopped by the user")]
    Cancelled,

    #[error("A speed test is already running")]
    AlreadyRunning,

    #[error("Speed test timed out after {0} seconds")]
    Timeout(u64),
}

impl From<reqwest::Error> for TestError {
    fn from(err: reqwest::Error) -> Self {
        TestError::Other(err.to_string())
    }
}

impl From<StoreError> for TestError {
    fn from(err: StoreError) -> Self {
        TestError::Other(err.to_string())
    }
}

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("No results yet. Run a speed test first!")]
    NoData,

    #[error("I/O error on {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Malformed history file: {0}")]
    Json(#[from] serde_json::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
}

#[derive(Error, Debug)]
pub enum ShareError {
    #[error("No results yet. Run a speed test first!")]
    NoData,

    #[error("Email is not configured: {0}")]
    NotConfigured(String),

    #[error("Invalid email address: {0}")]
    Address(String),

    #[error("Failed to send email: {0}")]
    Send(String),
}
