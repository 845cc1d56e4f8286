use thiserror::Error;

pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

#[derive(Error, Debug)]
pub enum FetchError {
    #[error("{0}")]
    Configuration(String),

    #[error("unsupported method {0}")]
    UnsupportedMethod(String),

    /// The cause is kept for logging only; the message names just the URL.
    #[error("error getting response from {url}")]
    Transport {
        url: String,
        #[source]
        source: BoxError,
    },

    #[error("{0}")]
    HttpStatus(String),

    #[error("{0}")]
    Filesystem(std::io::Error),

    #[error("{0}")]
    Decode(#[from] serde_json::Error),

    #[error("unknown query")]
    UnknownSource(String),

    #[error("{0}")]
    Request(String),

    #[error("request to {url} timed out after {secs}s")]
    Timeout { url: String, secs: u64 },

    #[error("instance not found: {0}")]
    InstanceNotFound(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<http::Error> for FetchError {
    fn from(err: http::Error) -> Self {
        FetchError::Request(err.to_string())
    }
}
