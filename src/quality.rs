//! Mapping of the user's quality choice to a yt-dlp format selection.

use crate::error::Error;
use std::fmt;
use std::str::FromStr;

/// Audio bitrate used when nothing else is configured, in kbps.
pub const DEFAULT_AUDIO_BITRATE: u32 = 192;

/// Audio bitrates that can be requested from the mp3 encoder, in kbps.
pub const AUDIO_BITRATES: [u32; 7] = [64, 96, 128, 160, 192, 256, 320];

/// Whether a download keeps the video or only its audio.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaKind {
    Video,
    Audio,
}

impl MediaKind {
    /// The extension of the file handed back to the user.
    pub fn extension(self) -> &'static str {
        match self {
            MediaKind::Video => "mp4",
            MediaKind::Audio => "mp3",
        }
    }

    /// The MIME type of the file handed back to the user.
    pub fn mime_type(self) -> &'static str {
        match self {
            MediaKind::Video => "video/mp4",
            MediaKind::Audio => "audio/mp3",
        }
    }
}

impl fmt::Display for MediaKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MediaKind::Video => write!(f, "video"),
            MediaKind::Audio => write!(f, "audio"),
        }
    }
}

/// The quality choices offered to the user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum QualityLabel {
    /// Best video and audio streams, merged.
    Highest,
    P144,
    P240,
    P360,
    P480,
    P720,
    P1080,
    P1440,
    P2160,
    FourK,
}

impl QualityLabel {
    /// Every label, in the order they are offered.
    pub const ALL: [QualityLabel; 10] = [
        QualityLabel::Highest,
        QualityLabel::P144,
        QualityLabel::P240,
        QualityLabel::P360,
        QualityLabel::P480,
        QualityLabel::P720,
        QualityLabel::P1080,
        QualityLabel::P1440,
        QualityLabel::P2160,
        QualityLabel::FourK,
    ];

    /// The maximum vertical resolution the label allows, `None` for [`QualityLabel::Highest`].
    pub fn height_threshold(self) -> Option<u32> {
        match self {
            QualityLabel::Highest => None,
            QualityLabel::P144 => Some(144),
            QualityLabel::P240 => Some(240),
            QualityLabel::P360 => Some(360),
            QualityLabel::P480 => Some(480),
            QualityLabel::P720 => Some(720),
            QualityLabel::P1080 => Some(1080),
            QualityLabel::P1440 => Some(1440),
            QualityLabel::P2160 => Some(2160),
            QualityLabel::FourK => Some(3840),
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            QualityLabel::Highest => "highest",
            QualityLabel::P144 => "144p",
            QualityLabel::P240 => "240p",
            QualityLabel::P360 => "360p",
            QualityLabel::P480 => "480p",
            QualityLabel::P720 => "720p",
            QualityLabel::P1080 => "1080p",
            QualityLabel::P1440 => "1440p",
            QualityLabel::P2160 => "2160p",
            QualityLabel::FourK => "4k",
        }
    }
}

impl fmt::Display for QualityLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for QualityLabel {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let label = s.trim().to_ascii_lowercase();
        match label.as_str() {
            "highest" | "best" => Ok(QualityLabel::Highest),
            "standard" => Ok(QualityLabel::P720),
            other => QualityLabel::ALL
                .into_iter()
                .find(|quality| quality.as_str() == other)
                .ok_or_else(|| Error::InvalidQuality(s.to_string())),
        }
    }
}

/// A step yt-dlp runs through ffmpeg once the streams are downloaded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PostProcessor {
    /// Re-encode the downloaded stream to an audio-only file.
    ExtractAudio { codec: &'static str, bitrate_kbps: u32 },
    /// Merge separately downloaded video and audio into one container.
    MergeOutput { container: &'static str },
}

/// What to ask yt-dlp for: the format selector and the post-processing steps.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FormatPlan {
    pub format_selector: String,
    pub post_processors: Vec<PostProcessor>,
}

impl FormatPlan {
    /// Whether running this plan needs ffmpeg.
    pub fn needs_transcoder(&self) -> bool {
        !self.post_processors.is_empty()
    }
}

/// Derives the format plan for a media kind and quality label.
///
/// The quality label is ignored for audio downloads.
pub fn plan_for(kind: MediaKind, quality: QualityLabel, audio_bitrate_kbps: u32) -> FormatPlan {
    match (kind, quality.height_threshold()) {
        (MediaKind::Audio, _) => FormatPlan {
            format_selector: "bestaudio/best".to_string(),
            post_processors: vec![PostProcessor::ExtractAudio {
                codec: "mp3",
                bitrate_kbps: audio_bitrate_kbps,
            }],
        },
        (MediaKind::Video, None) => FormatPlan {
            format_selector: "bestvideo[ext=mp4]+bestaudio[ext=m4a]/best[ext=mp4]/best".to_string(),
            post_processors: vec![PostProcessor::MergeOutput { container: "mp4" }],
        },
        (MediaKind::Video, Some(height)) => FormatPlan {
            format_selector: format!("best[height<={}][ext=mp4]", height),
            post_processors: Vec::new(),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn video_selectors_carry_the_height_threshold() {
        let expected = [
            (QualityLabel::P144, 144),
            (QualityLabel::P240, 240),
            (QualityLabel::P360, 360),
            (QualityLabel::P480, 480),
            (QualityLabel::P720, 720),
            (QualityLabel::P1080, 1080),
            (QualityLabel::P1440, 1440),
            (QualityLabel::P2160, 2160),
            (QualityLabel::FourK, 3840),
        ];

        for (quality, height) in expected {
            let plan = plan_for(MediaKind::Video, quality, DEFAULT_AUDIO_BITRATE);
            assert_eq!(
                plan.format_selector,
                format!("best[height<={height}][ext=mp4]"),
                "{quality}"
            );
            assert!(!plan.needs_transcoder());
        }
    }

    #[test]
    fn highest_prefers_mp4_and_merges() {
        let plan = plan_for(MediaKind::Video, QualityLabel::Highest, DEFAULT_AUDIO_BITRATE);

        assert_eq!(
            plan.format_selector,
            "bestvideo[ext=mp4]+bestaudio[ext=m4a]/best[ext=mp4]/best"
        );
        assert_eq!(
            plan.post_processors,
            vec![PostProcessor::MergeOutput { container: "mp4" }]
        );
    }

    #[test]
    fn audio_always_extracts_a_single_mp3() {
        for quality in QualityLabel::ALL {
            let plan = plan_for(MediaKind::Audio, quality, 320);

            assert_eq!(plan.format_selector, "bestaudio/best");
            assert_eq!(
                plan.post_processors,
                vec![PostProcessor::ExtractAudio {
                    codec: "mp3",
                    bitrate_kbps: 320
                }]
            );
        }
    }

    #[test]
    fn parses_labels_case_insensitively() {
        assert_eq!("720P".parse::<QualityLabel>().unwrap(), QualityLabel::P720);
        assert_eq!("4K".parse::<QualityLabel>().unwrap(), QualityLabel::FourK);
        assert_eq!(" Highest ".parse::<QualityLabel>().unwrap(), QualityLabel::Highest);
        assert_eq!("standard".parse::<QualityLabel>().unwrap(), QualityLabel::P720);
        assert!(matches!(
            "8k".parse::<QualityLabel>(),
            Err(Error::InvalidQuality(label)) if label == "8k"
        ));
    }

    #[test]
    fn labels_round_trip_through_display() {
        for quality in QualityLabel::ALL {
            assert_eq!(quality.to_string().parse::<QualityLabel>().unwrap(), quality);
        }
    }

    #[test]
    fn output_kind_decides_extension_and_mime() {
        assert_eq!(MediaKind::Audio.extension(), "mp3");
        assert_eq!(MediaKind::Audio.mime_type(), "audio/mp3");
        assert_eq!(MediaKind::Video.extension(), "mp4");
        assert_eq!(MediaKind::Video.mime_type(), "video/mp4");
    }
}
