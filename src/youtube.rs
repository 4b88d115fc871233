//! The seam to the extraction tool, and its yt-dlp implementation.

use crate::error::{Error, Result};
use crate::executor::{Executor, ProcessOutput};
use crate::quality::{FormatPlan, PostProcessor};
use async_trait::async_trait;
use log::debug;
use regex::Regex;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;
use std::time::Duration;

/// The template that makes yt-dlp print every progress tick as a JSON object.
pub const PROGRESS_TEMPLATE: &str = "download:%(progress)j";

const YOUTUBE_PATTERNS: [&str; 3] = [
    r"^https?://(www\.|m\.|music\.)?youtube\.com/(watch\?.*v=|shorts/|live/|embed/).+",
    r"^https?://youtu\.be/.+",
    r"^https?://(www\.)?youtube-nocookie\.com/embed/.+",
];

static YOUTUBE_URLS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    YOUTUBE_PATTERNS
        .iter()
        .map(|pattern| Regex::new(pattern).expect("YouTube URL patterns are valid"))
        .collect()
});

/// Whether the URL looks like a single YouTube video.
pub fn is_valid_youtube_url(url: &str) -> bool {
    let url = url.trim();
    YOUTUBE_URLS.iter().any(|re| re.is_match(url))
}

/// The video information as the extraction tool reports it, every field optional.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct RawVideoInfo {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub uploader: Option<String>,
    #[serde(default)]
    pub duration: Option<f64>,
    #[serde(default)]
    pub view_count: Option<u64>,
    #[serde(default)]
    pub thumbnail: Option<String>,
}

/// Options of a metadata-only request.
#[derive(Debug, Clone, PartialEq)]
pub struct FetchOptions {
    /// A Netscape `cookies.txt` to send along.
    pub cookies_file: Option<PathBuf>,
    pub timeout: Duration,
}

/// Options of a download request.
#[derive(Debug, Clone, PartialEq)]
pub struct DownloadOptions {
    /// Output path template, e.g. `/tmp/x/Title.%(ext)s`.
    pub output_template: PathBuf,
    pub plan: FormatPlan,
    /// A Netscape `cookies.txt` to send along.
    pub cookies_file: Option<PathBuf>,
    /// The ffmpeg binary post-processors run through.
    pub ffmpeg: Option<PathBuf>,
    pub timeout: Duration,
}

/// Something that can resolve a video URL into metadata and downloaded files.
#[async_trait]
pub trait Extractor: Send + Sync {
    /// Fetches the video information without downloading any media.
    async fn fetch_metadata(&self, url: &str, options: &FetchOptions) -> Result<RawVideoInfo>;

    /// Downloads the video once, handing every progress line to `on_progress`.
    ///
    /// A non-zero exit code is reported through [`ProcessOutput::code`], not as an error.
    async fn download(
        &self,
        url: &str,
        options: &DownloadOptions,
        on_progress: &mut (dyn for<'a> FnMut(&'a str) + Send),
    ) -> Result<ProcessOutput>;
}

/// An [`Extractor`] backed by the yt-dlp binary.
#[derive(Debug, Clone, PartialEq)]
pub struct YtDlp {
    pub executable: PathBuf,
}

impl YtDlp {
    pub fn new(executable: impl Into<PathBuf>) -> Self {
        Self {
            executable: executable.into(),
        }
    }

    /// Returns the version reported by `yt-dlp --version`.
    pub async fn version(&self, timeout: Duration) -> Result<String> {
        let executor = Executor {
            executable_path: self.executable.clone(),
            timeout,
            args: vec!["--version".to_string()],
        };

        let output = executor.execute().await?;
        Ok(output.stdout.trim().to_string())
    }

    /// The arguments of a metadata-only request.
    pub fn metadata_args(url: &str, options: &FetchOptions) -> Vec<String> {
        let mut args = to_owned([
            "--dump-json",
            "--skip-download",
            "--no-playlist",
            "--no-warnings",
        ]);

        push_cookies(&mut args, options.cookies_file.as_deref());
        push_url(&mut args, url);
        args
    }

    /// The arguments of a download request.
    pub fn download_args(url: &str, options: &DownloadOptions) -> Vec<String> {
        let mut args = to_owned([
            "--no-playlist",
            "--no-warnings",
            "--newline",
            "--progress-template",
            PROGRESS_TEMPLATE,
            "-f",
        ]);
        args.push(options.plan.format_selector.clone());
        args.push("-o".to_string());
        args.push(options.output_template.to_string_lossy().into_owned());

        for post_processor in &options.plan.post_processors {
            match post_processor {
                PostProcessor::ExtractAudio {
                    codec,
                    bitrate_kbps,
                } => {
                    args.extend(to_owned(["-x", "--audio-format", *codec, "--audio-quality"]));
                    args.push(format!("{}K", bitrate_kbps));
                }
                PostProcessor::MergeOutput { container } => {
                    args.extend(to_owned(["--merge-output-format", *container]));
                }
            }
        }

        if let Some(ffmpeg) = &options.ffmpeg {
            args.push("--ffmpeg-location".to_string());
            args.push(ffmpeg.to_string_lossy().into_owned());
        }

        push_cookies(&mut args, options.cookies_file.as_deref());
        push_url(&mut args, url);
        args
    }
}

#[async_trait]
impl Extractor for YtDlp {
    async fn fetch_metadata(&self, url: &str, options: &FetchOptions) -> Result<RawVideoInfo> {
        debug!("Fetching video infos for {}", url);

        let executor = Executor {
            executable_path: self.executable.clone(),
            timeout: options.timeout,
            args: Self::metadata_args(url, options),
        };

        let output = executor.execute().await?;
        parse_video_info(&output.stdout)
    }

    async fn download(
        &self,
        url: &str,
        options: &DownloadOptions,
        on_progress: &mut (dyn for<'a> FnMut(&'a str) + Send),
    ) -> Result<ProcessOutput> {
        debug!("Downloading {} with format {}", url, options.plan.format_selector);

        let executor = Executor {
            executable_path: self.executable.clone(),
            timeout: options.timeout,
            args: Self::download_args(url, options),
        };

        executor.stream(on_progress).await
    }
}

/// Parses the `--dump-json` output, which is one JSON object per line.
pub fn parse_video_info(stdout: &str) -> Result<RawVideoInfo> {
    let line = stdout
        .lines()
        .map(str::trim)
        .find(|line| line.starts_with('{'))
        .ok_or_else(|| Error::Command("yt-dlp printed no video information".to_string()))?;

    Ok(serde_json::from_str(line)?)
}

/// Picks the most useful message out of the tool's error output: its last `ERROR:` line,
/// or the last non-empty line.
pub fn tool_message(text: &str) -> Option<String> {
    let lines: Vec<&str> = text
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .collect();

    lines
        .iter()
        .rev()
        .find_map(|line| line.find("ERROR:").map(|at| line[at + "ERROR:".len()..].trim()))
        .or_else(|| lines.last().copied())
        .map(str::to_string)
}

/// Appends the URL after `--` so user input is never read as an option.
fn push_url(args: &mut Vec<String>, url: &str) {
    args.push("--".to_string());
    args.push(url.to_string());
}

fn push_cookies(args: &mut Vec<String>, cookies_file: Option<&Path>) {
    if let Some(path) = cookies_file {
        args.push("--cookies".to_string());
        args.push(path.to_string_lossy().into_owned());
    }
}

fn to_owned<const N: usize>(args: [&str; N]) -> Vec<String> {
    args.iter().map(|arg| arg.to_string()).collect()
}
