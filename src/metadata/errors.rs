/// Errors that cross the pipeline boundary.
#[derive(thiserror::Error, Debug)]
pub enum MetaError {
    #[error("invalid url: {0}")]
    InvalidInput(String),

    #[error("request cancelled")]
    Cancelled,

    #[error("http client error: {0:?}")]
    Client(#[from] reqwest::Error),
}

/// Page fetch failures. Recovered by extracting from empty html.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum FetchFailure {
    #[error("http status {0}")]
    Status(u16),

    #[error("transport: {0}")]
    Transport(String),

    #[error("blocked by url policy: {0}")]
    Policy(String),

    #[error("cancelled")]
    Cancelled,
}

/// A single failed probe. Never surfaced to the caller on its own.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum ProbeFailure {
    #[error("http status {0}")]
    Status(u16),

    #[error("transport: {0}")]
    Transport(String),

    #[error("blocked by url policy: {0}")]
    Policy(String),

    #[error("not an image: {0}")]
    NotAnImage(String),

    #[error("cancelled")]
    Cancelled,
}
