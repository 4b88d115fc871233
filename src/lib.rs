//! Fetch YouTube video information and download videos or mp3 audio through yt-dlp.
//!
//! yt-dlp does all the talking to YouTube and runs ffmpeg for transcoding; this crate
//! decides what to ask it for, runs it in a throw-away directory and hands back the bytes.
//!
//! ```rust,no_run
//! # use ytdownhub::{DownloadRequest, MediaKind, Orchestrator, QualityLabel, Settings, YtDlp};
//! # use ytdownhub::deps::Libraries;
//! # use ytdownhub::progress::NoProgress;
//! # #[tokio::main]
//! # async fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let settings = Settings::default();
//! let libraries = Libraries::discover(None, None)?;
//! let orchestrator = Orchestrator::new(YtDlp::new(libraries.youtube), libraries.ffmpeg, settings);
//!
//! let request = DownloadRequest {
//!     url: "https://www.youtube.com/watch?v=dQw4w9WgXcQ".to_string(),
//!     media_kind: MediaKind::Audio,
//!     quality: QualityLabel::Highest,
//!     cookies: None,
//! };
//! let result = orchestrator.download(&request, &NoProgress).await?;
//! std::fs::write(&result.filename, &result.bytes)?;
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod cookies;
pub mod deps;
pub mod download;
pub mod error;
pub mod executor;
pub mod metadata;
pub mod progress;
pub mod quality;
pub mod sanitize;
pub mod tagging;
pub mod youtube;

pub use config::Settings;
pub use cookies::CookieJar;
pub use download::{DownloadRequest, DownloadResult, Orchestrator};
pub use error::{Error, Result};
pub use metadata::VideoMetadata;
pub use quality::{FormatPlan, MediaKind, QualityLabel, plan_for};
pub use youtube::{Extractor, YtDlp};
