use std::io;

use thiserror::Error;

/// Convenience alias used across the crate.
pub type Result<T> = std::result::Result<T, HistoryError>;

/// Errors surfaced by the fetch layer and the CLI.
///
/// The graph builder itself is total and never produces one of these.
/// Malformed record fields degrade to "absent" and dangling references
/// are dropped silently.
#[derive(Debug, Error)]
pub enum HistoryError {
    /// Request construction or transport failed, including success
    /// responses whose bodies are not JSON.
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),
    /// The primary history endpoint answered with a non-success status.
    #[error("history request failed ({0})")]
    Endpoint(reqwest::StatusCode),
    /// A response decoded as JSON but not into a record list.
    #[error("unexpected response format: {0}")]
    UnexpectedFormat(&'static str),
    /// No document URI was supplied.
    #[error("document uri is required")]
    MissingDocumentUri,
    /// Local file handling failed.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
    /// A local records payload failed to parse.
    #[error("malformed records payload: {0}")]
    Records(#[from] serde_json::Error),
}
