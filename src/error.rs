//! Error types for the fridge-thing pipeline.

use thiserror::Error;

/// Convenience alias used throughout the crate.
pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Errors that can occur while selecting, adapting, or displaying an image.
#[derive(Debug, Error)]
pub enum Error {
    /// Network error or non-OK status fetching an image or page
    #[error("fetch failed for {url}: {reason}")]
    Fetch {
        /// URL that was being fetched
        url: String,
        /// Underlying cause (status code or transport error)
        reason: String,
    },

    /// Bytes are not a valid raster image
    #[error("image decode failed: {0}")]
    Decode(String),

    /// The store is unavailable or a query failed
    #[error("persistence error: {0}")]
    Persistence(String),

    /// The device has no network connectivity
    #[error("connectivity error: {0}")]
    Connectivity(String),

    /// The display hardware rejected the frame
    #[error("render error: {0}")]
    Render(String),

    /// Invalid or missing configuration
    #[error("config error: {0}")]
    Config(String),

    /// Filesystem error (agent state files, font loading)
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<reqwest::Error> for Error {
    fn from(err: reqwest::Error) -> Self {
        Error::Fetch {
            url: err
                .url()
                .map(|u| u.to_string())
                .unwrap_or_else(|| "<unknown>".to_string()),
            reason: err.to_string(),
        }
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::Decode(err.to_string())
    }
}

impl From<image::ImageError> for Error {
    fn from(err: image::ImageError) -> Self {
        Error::Decode(err.to_string())
    }
}

impl From<ureq::Error> for Error {
    fn from(err: ureq::Error) -> Self {
        match err {
            ureq::Error::Status(status, response) => Error::Fetch {
                url: response.get_url().to_string(),
                reason: format!("status {status}"),
            },
            ureq::Error::Transport(t) => Error::Connectivity(t.to_string()),
        }
    }
}
