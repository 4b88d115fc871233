//! Relaying yt-dlp's progress ticks to whatever displays them.
//!
//! yt-dlp is told to print every progress tick as one JSON object per line
//! (`--progress-template "download:%(progress)j"`). Those lines are turned into a
//! percentage here. Anything that does not parse is dropped without a sound.

use serde::Deserialize;

/// The status yt-dlp reports while bytes are being transferred.
pub const STATUS_DOWNLOADING: &str = "downloading";

/// Receives download progress as a whole percentage.
pub trait ProgressSink: Send + Sync {
    fn set_percent(&self, percent: u8);
}

/// A sink that discards every update.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoProgress;

impl ProgressSink for NoProgress {
    fn set_percent(&self, _percent: u8) {}
}

/// One progress tick as printed by yt-dlp.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct ProgressRecord {
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub total_bytes: Option<f64>,
    #[serde(default)]
    pub total_bytes_estimate: Option<f64>,
    #[serde(default)]
    pub downloaded_bytes: Option<f64>,
}

impl ProgressRecord {
    /// The completed percentage, when the record is an in-progress tick with a known total.
    pub fn percent(&self) -> Option<u8> {
        if self.status.as_deref() != Some(STATUS_DOWNLOADING) {
            return None;
        }

        let total = self
            .total_bytes
            .filter(|total| *total > 0.0)
            .or(self.total_bytes_estimate)
            .filter(|total| *total > 0.0)?;
        let downloaded = self.downloaded_bytes.unwrap_or(0.0);

        let percent = (100.0 * downloaded / total).floor();
        if !percent.is_finite() {
            return None;
        }

        // Estimated totals can undershoot the real size.
        Some(percent.clamp(0.0, 100.0) as u8)
    }
}

/// Forwards the record's percentage to the sink, if it has one.
pub fn relay(record: &ProgressRecord, sink: &dyn ProgressSink) {
    if let Some(percent) = record.percent() {
        sink.set_percent(percent);
    }
}

/// Parses one line of yt-dlp output and forwards its percentage to the sink, if it has one.
pub fn relay_line(line: &str, sink: &dyn ProgressSink) {
    let line = line.trim();
    if !line.starts_with('{') {
        return;
    }

    if let Ok(record) = serde_json::from_str::<ProgressRecord>(line) {
        relay(&record, sink);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[derive(Default)]
    struct Recorder(Mutex<Vec<u8>>);

    impl ProgressSink for Recorder {
        fn set_percent(&self, percent: u8) {
            self.0.lock().unwrap().push(percent);
        }
    }

    impl Recorder {
        fn seen(&self) -> Vec<u8> {
            self.0.lock().unwrap().clone()
        }
    }

    #[test]
    fn forwards_the_floored_percentage() {
        let sink = Recorder::default();
        relay_line(
            r#"{"status": "downloading", "total_bytes": 200, "downloaded_bytes": 50}"#,
            &sink,
        );
        relay_line(
            r#"{"status": "downloading", "total_bytes": 3, "downloaded_bytes": 2}"#,
            &sink,
        );

        assert_eq!(sink.seen(), vec![25, 66]);
    }

    #[test]
    fn falls_back_to_the_estimate() {
        let record = ProgressRecord {
            status: Some("downloading".to_string()),
            total_bytes: None,
            total_bytes_estimate: Some(1000.0),
            downloaded_bytes: Some(500.0),
        };

        assert_eq!(record.percent(), Some(50));
    }

    #[test]
    fn clamps_overshooting_estimates() {
        let record = ProgressRecord {
            status: Some("downloading".to_string()),
            total_bytes_estimate: Some(100.0),
            downloaded_bytes: Some(130.0),
            ..Default::default()
        };

        assert_eq!(record.percent(), Some(100));
    }

    #[test]
    fn ignores_other_statuses_and_unknown_totals() {
        let sink = Recorder::default();
        relay_line(r#"{"status": "finished"}"#, &sink);
        relay_line(
            r#"{"status": "finished", "total_bytes": 10, "downloaded_bytes": 10}"#,
            &sink,
        );
        relay_line(r#"{"status": "downloading", "downloaded_bytes": 10}"#, &sink);
        relay_line(
            r#"{"status": "downloading", "total_bytes": 0, "downloaded_bytes": 10}"#,
            &sink,
        );

        assert!(sink.seen().is_empty());
    }

    #[test]
    fn ignores_malformed_lines() {
        let sink = Recorder::default();
        relay_line("[ExtractAudio] Destination: /tmp/x/Song.mp3", &sink);
        relay_line("{not json", &sink);
        relay_line(r#"{"status": 7, "total_bytes": "lots"}"#, &sink);
        relay_line("", &sink);

        assert!(sink.seen().is_empty());
    }

    #[test]
    fn tolerates_extra_fields() {
        let sink = Recorder::default();
        relay_line(
            r#"{"status": "downloading", "total_bytes": null, "total_bytes_estimate": 400.0, "downloaded_bytes": 100, "speed": 12.5, "eta": 3, "_percent_str": " 25.0%"}"#,
            &sink,
        );

        assert_eq!(sink.seen(), vec![25]);
    }
}
