//! The settings every operation is handed explicitly.

use crate::error::{Error, Result};
use crate::quality::{AUDIO_BITRATES, DEFAULT_AUDIO_BITRATE, QualityLabel};
use log::debug;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

const APP_DIR: &str = "YTDownHub";
const CONFIG_FILE: &str = "config.toml";

/// User settings, read from `config.toml` and overridden by command-line flags.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Path to the yt-dlp binary; searched on `PATH` when unset.
    pub yt_dlp_path: Option<PathBuf>,
    /// Path to the ffmpeg binary; searched on `PATH` when unset.
    pub ffmpeg_path: Option<PathBuf>,
    /// Where finished downloads are saved.
    pub output_dir: Option<PathBuf>,
    /// mp3 bitrate in kbps.
    pub audio_bitrate: u32,
    /// Quality used when none is given on the command line.
    pub default_quality: String,
    pub metadata_timeout_secs: u64,
    pub download_timeout_secs: u64,
    /// Where the per-download scratch directories are created.
    pub temp_root: Option<PathBuf>,
    /// Write title, artist and cover art into saved mp3 files.
    pub embed_tags: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            yt_dlp_path: None,
            ffmpeg_path: None,
            output_dir: None,
            audio_bitrate: DEFAULT_AUDIO_BITRATE,
            default_quality: QualityLabel::Highest.to_string(),
            metadata_timeout_secs: 30,
            download_timeout_secs: 3600,
            temp_root: None,
            embed_tags: true,
        }
    }
}

impl Settings {
    /// The default location of the configuration file.
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join(APP_DIR).join(CONFIG_FILE))
    }

    /// Reads settings from a TOML file. A missing or empty file yields the defaults.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] when the file cannot be parsed or holds invalid values.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if !path.is_file() {
            debug!("No config file at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        let content = fs::read_to_string(path)?;
        Self::from_toml(&content).map_err(|e| match e {
            Error::Config(message) => Error::Config(format!("{}: {}", path.display(), message)),
            other => other,
        })
    }

    /// Parses and validates settings from TOML text.
    pub fn from_toml(content: &str) -> Result<Self> {
        let settings: Settings =
            toml::from_str(content).map_err(|e| Error::Config(e.message().to_string()))?;
        settings.validate()?;
        Ok(settings)
    }

    /// Writes the settings as TOML, creating the parent directory if needed.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        fs::write(path, self.to_toml()?)?;
        Ok(())
    }

    pub fn to_toml(&self) -> Result<String> {
        toml::to_string(self).map_err(|e| Error::Config(e.to_string()))
    }

    /// Checks values that the type system does not.
    pub fn validate(&self) -> Result<()> {
        if !AUDIO_BITRATES.contains(&self.audio_bitrate) {
            return Err(Error::Config(format!(
                "audio_bitrate {} is not one of {:?}",
                self.audio_bitrate, AUDIO_BITRATES
            )));
        }
        if self.metadata_timeout_secs == 0 || self.download_timeout_secs == 0 {
            return Err(Error::Config("timeouts must be at least one second".to_string()));
        }
        self.default_quality()
            .map_err(|e| Error::Config(e.to_string()))?;
        Ok(())
    }

    pub fn default_quality(&self) -> Result<QualityLabel> {
        self.default_quality.parse()
    }

    pub fn metadata_timeout(&self) -> Duration {
        Duration::from_secs(self.metadata_timeout_secs)
    }

    pub fn download_timeout(&self) -> Duration {
        Duration::from_secs(self.download_timeout_secs)
    }

    /// Where downloads are saved: the configured directory, else the user's download
    /// directory, else `./downloads`.
    pub fn resolve_output_dir(&self) -> PathBuf {
        self.output_dir
            .clone()
            .or_else(dirs::download_dir)
            .unwrap_or_else(|| PathBuf::from("downloads"))
    }

    /// The parent of the per-download scratch directories.
    pub fn resolve_temp_root(&self) -> PathBuf {
        self.temp_root.clone().unwrap_or_else(std::env::temp_dir)
    }
}
