//! Running one download from request to bytes in memory.

use crate::config::Settings;
use crate::cookies::CookieJar;
use crate::error::{Error, Result};
use crate::metadata::fetch_metadata;
use crate::progress::{ProgressSink, relay_line};
use crate::quality::{MediaKind, QualityLabel, plan_for};
use crate::sanitize::sanitize_filename;
use crate::youtube::{DownloadOptions, Extractor, FetchOptions, tool_message};
use log::{debug, error, info, warn};
use std::path::{Path, PathBuf};

/// Stem used when nothing is left of the title after sanitizing.
const FALLBACK_STEM: &str = "download";

const COOKIES_FILE: &str = "cookies.txt";

/// One download the user asked for.
#[derive(Debug, Clone, PartialEq)]
pub struct DownloadRequest {
    pub url: String,
    pub media_kind: MediaKind,
    pub quality: QualityLabel,
    pub cookies: Option<CookieJar>,
}

/// The downloaded file, fully in memory. Nothing of it is left on disk.
#[derive(Clone, PartialEq, Eq)]
pub struct DownloadResult {
    pub bytes: Vec<u8>,
    pub filename: String,
    pub mime_type: String,
}

impl std::fmt::Debug for DownloadResult {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DownloadResult")
            .field("bytes", &self.bytes.len())
            .field("filename", &self.filename)
            .field("mime_type", &self.mime_type)
            .finish()
    }
}

/// Drives an [`Extractor`] through a complete download.
#[derive(Debug, Clone)]
pub struct Orchestrator<E> {
    extractor: E,
    ffmpeg: Option<PathBuf>,
    settings: Settings,
}

impl<E: Extractor> Orchestrator<E> {
    /// Creates an orchestrator. `ffmpeg` is the transcoder handed to the extractor; plans
    /// that need one are refused when it is `None`.
    pub fn new(extractor: E, ffmpeg: Option<PathBuf>, settings: Settings) -> Self {
        Self {
            extractor,
            ffmpeg,
            settings,
        }
    }

    pub fn extractor(&self) -> &E {
        &self.extractor
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    /// Downloads the requested video or audio and returns the file's contents.
    ///
    /// The work happens in a fresh temporary directory that is removed before this returns,
    /// whatever the outcome, and also when the returned future is dropped.
    ///
    /// # Errors
    ///
    /// - [`Error::DependencyMissing`] if the plan needs ffmpeg and there is none;
    /// - [`Error::VerificationRequired`] or [`Error::MetadataFetchFailed`] if the video
    ///   information cannot be fetched;
    /// - [`Error::DownloadFailed`] if the extractor fails or exits non-zero, or the work
    ///   directory cannot be used;
    /// - [`Error::FileNotProduced`] if it succeeds without leaving a file behind.
    pub async fn download(
        &self,
        request: &DownloadRequest,
        progress: &dyn ProgressSink,
    ) -> Result<DownloadResult> {
        let plan = plan_for(
            request.media_kind,
            request.quality,
            self.settings.audio_bitrate,
        );
        if plan.needs_transcoder() && self.ffmpeg.is_none() {
            return Err(Error::DependencyMissing(format!(
                "ffmpeg (needed for {} {} downloads)",
                request.quality, request.media_kind
            )));
        }

        let workdir = self
            .create_workdir()
            .map_err(|e| io_failure("could not create a work directory", e))?;
        debug!("Working in {}", workdir.path().display());

        let cookies_file = match &request.cookies {
            Some(jar) => {
                let path = workdir.path().join(COOKIES_FILE);
                jar.write_to(&path)
                    .await
                    .map_err(|e| io_failure("could not write the cookie file", e))?;
                Some(path)
            }
            None => None,
        };

        let fetch_options = FetchOptions {
            cookies_file: cookies_file.clone(),
            timeout: self.settings.metadata_timeout(),
        };
        let metadata = fetch_metadata(&self.extractor, &request.url, &fetch_options).await?;
        let stem = filename_stem(&metadata.title);

        let options = DownloadOptions {
            output_template: workdir.path().join(output_template(&stem)),
            plan,
            cookies_file: cookies_file.clone(),
            ffmpeg: self.ffmpeg.clone(),
            timeout: self.settings.download_timeout(),
        };

        info!("Downloading '{}' as {}", metadata.title, request.media_kind);
        let mut on_progress = |line: &str| relay_line(line, progress);
        let output = match self
            .extractor
            .download(&request.url, &options, &mut on_progress)
            .await
        {
            Ok(output) => output,
            Err(e) => {
                error!("Download of {} failed: {}", request.url, e);
                return Err(Error::DownloadFailed(e.to_string()));
            }
        };

        if !output.success() {
            let message = tool_message(&output.stderr)
                .unwrap_or_else(|| format!("yt-dlp exited with code {}", output.code));
            error!("Download of {} failed: {}", request.url, message);
            return Err(Error::DownloadFailed(message));
        }

        let extension = request.media_kind.extension();
        let produced = locate_output(workdir.path(), &stem, extension, cookies_file.as_deref())
            .await
            .map_err(|e| io_failure("could not scan the work directory", e))?
            .ok_or(Error::FileNotProduced)?;
        debug!("Reading {}", produced.display());
        let bytes = tokio::fs::read(&produced)
            .await
            .map_err(|e| io_failure("could not read the downloaded file", e))?;

        if let Err(e) = workdir.close() {
            warn!("Failed to remove temporary directory: {}", e);
        }

        Ok(DownloadResult {
            bytes,
            filename: format!("{}.{}", stem, extension),
            mime_type: request.media_kind.mime_type().to_string(),
        })
    }

    fn create_workdir(&self) -> Result<tempfile::TempDir> {
        let root = self.settings.resolve_temp_root();
        std::fs::create_dir_all(&root)?;

        Ok(tempfile::Builder::new()
            .prefix("ytdownhub-")
            .tempdir_in(root)?)
    }
}

fn io_failure(context: &str, err: impl std::fmt::Display) -> Error {
    Error::DownloadFailed(format!("{}: {}", context, err))
}

/// The file name stem for a video title.
pub fn filename_stem(title: &str) -> String {
    let stem = sanitize_filename(title).trim().to_string();
    if stem.is_empty() {
        FALLBACK_STEM.to_string()
    } else {
        stem
    }
}

/// The yt-dlp output template for a stem; `%` is escaped so titles cannot inject fields.
fn output_template(stem: &str) -> String {
    format!("{}.%(ext)s", stem.replace('%', "%%"))
}

/// Finds the file the extractor produced for `stem`, preferring the expected extension.
async fn locate_output(
    dir: &Path,
    stem: &str,
    extension: &str,
    ignore: Option<&Path>,
) -> Result<Option<PathBuf>> {
    let expected = format!("{}.{}", stem, extension);
    let mut candidates = Vec::new();

    let mut entries = tokio::fs::read_dir(dir).await?;
    while let Some(entry) = entries.next_entry().await? {
        let path = entry.path();
        if Some(path.as_path()) == ignore || !entry.file_type().await?.is_file() {
            continue;
        }

        let name = entry.file_name().to_string_lossy().into_owned();
        if name == expected {
            return Ok(Some(path));
        }
        if name.starts_with(stem) && !name.ends_with(".part") {
            candidates.push(path);
        }
    }

    candidates.sort();
    if let Some(first) = candidates.first() {
        warn!(
            "Expected {} but found {}, using it instead",
            expected,
            first.display()
        );
    }
    Ok(candidates.into_iter().next())
}
