//! Discovery of the external binaries the downloader drives.
//!
//! Nothing is installed at run time: `yt-dlp` has to be present before anything is
//! attempted, `ffmpeg` only when a download needs transcoding or merging.

use crate::error::{Error, Result};
use log::{debug, warn};
use std::path::{Path, PathBuf};

/// Places package managers commonly drop binaries into, checked after `PATH`.
const COMMON_DIRS: [&str; 3] = ["/opt/homebrew/bin", "/usr/local/bin", "/usr/bin"];

/// The located binaries.
///
/// # Examples
///
/// ```rust,no_run
/// # use ytdownhub::deps::Libraries;
/// let libraries = Libraries::discover(None, None)?;
/// println!("yt-dlp at {}", libraries.youtube.display());
/// # Ok::<(), ytdownhub::error::Error>(())
/// ```
#[derive(Clone, Debug, PartialEq)]
pub struct Libraries {
    /// The path to the yt-dlp binary.
    pub youtube: PathBuf,
    /// The path to the ffmpeg binary, if one was found.
    pub ffmpeg: Option<PathBuf>,
}

impl Libraries {
    pub fn new(youtube: PathBuf, ffmpeg: Option<PathBuf>) -> Self {
        Self { youtube, ffmpeg }
    }

    /// Locates yt-dlp and ffmpeg, preferring the explicitly configured paths.
    ///
    /// # Errors
    ///
    /// Returns [`Error::DependencyMissing`] when yt-dlp cannot be found, or when a configured
    /// yt-dlp path does not exist.
    pub fn discover(yt_dlp: Option<&Path>, ffmpeg: Option<&Path>) -> Result<Self> {
        let youtube = match yt_dlp {
            Some(path) if path.is_file() => path.to_path_buf(),
            Some(path) => {
                return Err(Error::DependencyMissing(format!(
                    "yt-dlp (configured at {})",
                    path.display()
                )));
            }
            None => find_executable("yt-dlp").ok_or_else(|| {
                Error::DependencyMissing(
                    "yt-dlp (install it and make sure it is on your PATH)".to_string(),
                )
            })?,
        };

        let ffmpeg = match ffmpeg {
            Some(path) if path.is_file() => Some(path.to_path_buf()),
            Some(path) => {
                warn!(
                    "Configured ffmpeg {} does not exist, searching PATH instead",
                    path.display()
                );
                find_executable("ffmpeg")
            }
            None => find_executable("ffmpeg"),
        };

        if ffmpeg.is_none() {
            warn!("ffmpeg not found: audio and best-quality downloads will be refused");
        }

        debug!("Using yt-dlp at {:?}, ffmpeg at {:?}", youtube, ffmpeg);
        Ok(Self { youtube, ffmpeg })
    }
}

/// Returns the platform specific file name of an executable.
pub fn executable_name(name: &str) -> String {
    if cfg!(target_os = "windows") {
        format!("{}.exe", name)
    } else {
        name.to_string()
    }
}

/// Searches `PATH`, then the common install directories, for the named executable.
pub fn find_executable(name: &str) -> Option<PathBuf> {
    let from_env = std::env::var_os("PATH")
        .map(|paths| std::env::split_paths(&paths).collect::<Vec<_>>())
        .unwrap_or_default();
    let common = COMMON_DIRS.iter().map(PathBuf::from);

    find_in_dirs(name, from_env.into_iter().chain(common))
}

/// Searches the given directories, in order, for the named executable.
pub fn find_in_dirs(name: &str, dirs: impl IntoIterator<Item = PathBuf>) -> Option<PathBuf> {
    let file_name = executable_name(name);
    dirs.into_iter()
        .map(|dir| dir.join(&file_name))
        .find(|candidate| candidate.is_file())
}
