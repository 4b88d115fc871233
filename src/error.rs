//! The errors that can occur.

use std::time::Duration;
use thiserror::Error;

/// A type alias for `Result<T, Error>`.
pub type Result<T> = std::result::Result<T, Error>;

/// The possible errors that can occur.
///
/// Every variant renders as a message that can be shown to the user as-is.
#[derive(Debug, Error)]
pub enum Error {
    /// The video information could not be fetched.
    #[error("Error fetching video info: {0}")]
    MetadataFetchFailed(String),
    /// YouTube answered with a bot-verification challenge.
    #[error(
        "YouTube wants to confirm you're not a bot. Paste cookies from a signed-in browser session and try again."
    )]
    VerificationRequired,
    /// A required external tool could not be found.
    #[error("Required tool not found: {0}")]
    DependencyMissing(String),
    /// The download itself failed.
    #[error("Download failed: {0}")]
    DownloadFailed(String),
    /// The download reported success but left no file behind.
    #[error("Download finished but no output file was produced")]
    FileNotProduced,

    /// A pasted cookie payload was rejected.
    #[error("Invalid cookies: {0}")]
    InvalidCookies(String),
    /// A quality label that is not offered.
    #[error("Unknown quality '{0}', expected one of: highest, 144p, 240p, 360p, 480p, 720p, 1080p, 1440p, 2160p, 4k")]
    InvalidQuality(String),
    /// The configuration file could not be used.
    #[error("Invalid configuration: {0}")]
    Config(String),
    /// Tags could not be written to a saved file.
    #[error("Failed to tag file: {0}")]
    Tag(String),

    /// An error occurred while running a command.
    #[error("Failed to execute command: {0}")]
    Command(String),
    /// An error occurred due to a timeout.
    #[error("Operation timed out after {0:?}")]
    Timeout(Duration),

    /// An error occurred while running the runtime.
    #[error("An error occurred while running the runtime: {0}")]
    Runtime(#[from] tokio::task::JoinError),
    /// An error occurred while interacting with the file system.
    #[error("An IO error occurred: {0}")]
    IO(#[from] std::io::Error),
    /// An error occurred while parsing JSON.
    #[error("An error occurred while parsing JSON: {0}")]
    Serde(#[from] serde_json::Error),
    /// An error occurred while fetching a file.
    #[error("An error occurred while fetching: {0}")]
    Reqwest(#[from] reqwest::Error),
    /// An error occurred while reading or writing audio tags.
    #[error("An error occurred while handling audio tags: {0}")]
    Lofty(#[from] lofty::error::LoftyError),
}
