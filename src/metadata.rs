//! Fetching the information shown before a download.

use crate::cookies::CookieJar;
use crate::error::{Error, Result};
use crate::youtube::{Extractor, FetchOptions, RawVideoInfo, tool_message};
use log::{debug, warn};
use std::time::Duration;

const UNKNOWN: &str = "Unknown";

const THUMBNAIL_HOST: &str = "https://i.ytimg.com/vi";
const JPEG_THUMBNAIL: &str = "hqdefault.jpg";

/// Phrases YouTube uses when it wants the viewer to prove they are human.
const VERIFICATION_MARKERS: [&str; 3] = [
    "confirm you're not a bot",
    "confirm you’re not a bot",
    "sign in to confirm",
];

/// What is known about a video before it is downloaded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VideoMetadata {
    /// The YouTube video id, when the tool reported one.
    pub video_id: Option<String>,
    pub title: String,
    pub author: String,
    pub duration_seconds: u64,
    pub view_count: u64,
    pub thumbnail_url: Option<String>,
}

impl VideoMetadata {
    /// Fills in defaults for whatever the tool did not report.
    pub fn from_raw(raw: RawVideoInfo) -> Self {
        Self {
            video_id: raw.id.filter(|id| !id.is_empty()),
            title: raw.title.unwrap_or_else(|| UNKNOWN.to_string()),
            author: raw.uploader.unwrap_or_else(|| UNKNOWN.to_string()),
            duration_seconds: raw
                .duration
                .filter(|d| d.is_finite() && *d > 0.0)
                .map(|d| d as u64)
                .unwrap_or(0),
            view_count: raw.view_count.unwrap_or(0),
            thumbnail_url: raw.thumbnail.filter(|url| !url.is_empty()),
        }
    }

    /// Where to fetch cover art from: the JPEG thumbnail when the video id is known, else
    /// whatever thumbnail the tool reported.
    pub fn cover_url(&self) -> Option<String> {
        match &self.video_id {
            Some(id) => Some(format!("{}/{}/{}", THUMBNAIL_HOST, id, JPEG_THUMBNAIL)),
            None => self.thumbnail_url.clone(),
        }
    }

    /// The duration as `minutes:seconds`, e.g. `3:07` or `74:05`.
    pub fn duration_display(&self) -> String {
        format!(
            "{}:{:02}",
            self.duration_seconds / 60,
            self.duration_seconds % 60
        )
    }

    /// The view count with thousands separators, e.g. `1,234,567`.
    pub fn views_display(&self) -> String {
        let digits = self.view_count.to_string();
        let mut out = String::with_capacity(digits.len() + digits.len() / 3);
        for (i, c) in digits.chars().enumerate() {
            if i > 0 && (digits.len() - i) % 3 == 0 {
                out.push(',');
            }
            out.push(c);
        }
        out
    }
}

/// Whether the tool's error text is YouTube's bot-verification challenge.
pub fn is_verification_challenge(text: &str) -> bool {
    let text = text.to_lowercase();
    VERIFICATION_MARKERS
        .iter()
        .any(|marker| text.contains(&marker.to_lowercase()))
}

/// Turns an extractor failure into the error shown to the user.
pub fn classify_failure(err: Error) -> Error {
    match err {
        Error::VerificationRequired => Error::VerificationRequired,
        Error::DependencyMissing(tool) => Error::DependencyMissing(tool),
        Error::MetadataFetchFailed(message) => Error::MetadataFetchFailed(message),
        other => {
            let text = other.to_string();
            if is_verification_challenge(&text) {
                return Error::VerificationRequired;
            }

            Error::MetadataFetchFailed(tool_message(&text).unwrap_or(text))
        }
    }
}

/// Fetches the video information without downloading media.
///
/// # Errors
///
/// Returns [`Error::VerificationRequired`] when YouTube asks for a bot check, and
/// [`Error::MetadataFetchFailed`] with the tool's message for any other failure.
pub async fn fetch_metadata<E>(
    extractor: &E,
    url: &str,
    options: &FetchOptions,
) -> Result<VideoMetadata>
where
    E: Extractor + ?Sized,
{
    match extractor.fetch_metadata(url, options).await {
        Ok(raw) => {
            let metadata = VideoMetadata::from_raw(raw);
            debug!("Fetched metadata for {}: {:?}", url, metadata);
            Ok(metadata)
        }
        Err(e) => {
            let err = classify_failure(e);
            warn!("Fetching metadata for {} failed: {}", url, err);
            Err(err)
        }
    }
}

/// Fetches the video information, sending the session cookies along when there are any.
pub async fn lookup<E>(
    extractor: &E,
    url: &str,
    timeout: Duration,
    cookies: Option<&CookieJar>,
) -> Result<VideoMetadata>
where
    E: Extractor + ?Sized,
{
    let cookie_file = match cookies {
        Some(jar) => Some(jar.to_temp_file()?),
        None => None,
    };

    let options = FetchOptions {
        cookies_file: cookie_file.as_ref().map(|file| file.path().to_path_buf()),
        timeout,
    };

    fetch_metadata(extractor, url, &options).await
}
