use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use ytdownhub::executor::ProcessOutput;
use ytdownhub::progress::ProgressSink;
use ytdownhub::youtube::{DownloadOptions, FetchOptions, RawVideoInfo};
use ytdownhub::{
    CookieJar, DownloadRequest, Error, Extractor, MediaKind, Orchestrator, QualityLabel, Result,
    Settings,
};

/// Pretends to be yt-dlp: answers with a fixed title and drops a file into the work directory.
struct FakeExtractor {
    title: String,
    metadata_error: Option<&'static str>,
    produced: Option<(&'static str, &'static [u8])>,
    code: i32,
    progress_lines: Vec<&'static str>,
    hang: bool,
    calls: AtomicUsize,
    workdir: Mutex<Option<PathBuf>>,
    format_selector: Mutex<Option<String>>,
    cookies: Mutex<Option<String>>,
}

impl FakeExtractor {
    fn new(title: &str) -> Self {
        Self {
            title: title.to_string(),
            metadata_error: None,
            produced: None,
            code: 0,
            progress_lines: Vec::new(),
            hang: false,
            calls: AtomicUsize::new(0),
            workdir: Mutex::new(None),
            format_selector: Mutex::new(None),
            cookies: Mutex::new(None),
        }
    }

    fn producing(mut self, name: &'static str, bytes: &'static [u8]) -> Self {
        self.produced = Some((name, bytes));
        self
    }

    fn workdir(&self) -> PathBuf {
        self.workdir
            .lock()
            .unwrap()
            .clone()
            .expect("download was never called")
    }
}

#[async_trait]
impl Extractor for FakeExtractor {
    async fn fetch_metadata(&self, _url: &str, _options: &FetchOptions) -> Result<RawVideoInfo> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(message) = self.metadata_error {
            return Err(Error::Command(message.to_string()));
        }

        Ok(RawVideoInfo {
            title: Some(self.title.clone()),
            uploader: Some("Uploader".to_string()),
            duration: Some(61.0),
            ..RawVideoInfo::default()
        })
    }

    async fn download(
        &self,
        _url: &str,
        options: &DownloadOptions,
        on_progress: &mut (dyn for<'a> FnMut(&'a str) + Send),
    ) -> Result<ProcessOutput> {
        self.calls.fetch_add(1, Ordering::SeqCst);

        let dir = options.output_template.parent().unwrap().to_path_buf();
        *self.workdir.lock().unwrap() = Some(dir.clone());
        *self.format_selector.lock().unwrap() = Some(options.plan.format_selector.clone());
        if let Some(path) = &options.cookies_file {
            *self.cookies.lock().unwrap() = Some(std::fs::read_to_string(path)?);
        }

        for line in &self.progress_lines {
            on_progress(*line);
        }
        if let Some((name, bytes)) = self.produced {
            std::fs::write(dir.join(name), bytes)?;
        }
        if self.hang {
            std::future::pending::<()>().await;
        }

        Ok(ProcessOutput {
            stdout: String::new(),
            stderr: if self.code == 0 {
                String::new()
            } else {
                "ERROR: [youtube] abc: Video unavailable\n".to_string()
            },
            code: self.code,
        })
    }
}

#[derive(Default)]
struct Recorder(Mutex<Vec<u8>>);

impl ProgressSink for Recorder {
    fn set_percent(&self, percent: u8) {
        self.0.lock().unwrap().push(percent);
    }
}

fn settings(temp_root: &Path) -> Settings {
    Settings {
        temp_root: Some(temp_root.to_path_buf()),
        ..Settings::default()
    }
}

fn request(media_kind: MediaKind, quality: QualityLabel) -> DownloadRequest {
    DownloadRequest {
        url: "https://www.youtube.com/watch?v=dQw4w9WgXcQ".to_string(),
        media_kind,
        quality,
        cookies: None,
    }
}

fn ffmpeg() -> Option<PathBuf> {
    Some(PathBuf::from("/usr/bin/ffmpeg"))
}

#[tokio::test]
async fn audio_download_returns_mp3_bytes_and_cleans_up() {
    let root = tempfile::tempdir().unwrap();
    let mut extractor = FakeExtractor::new("Song").producing("Song.mp3", b"ID3 fake mp3");
    extractor.progress_lines = vec![
        "[download] Destination: Song.webm",
        r#"{"status": "downloading", "downloaded_bytes": 25, "total_bytes": 100}"#,
        "{not json",
    ];
    let orchestrator = Orchestrator::new(extractor, ffmpeg(), settings(root.path()));
    let recorder = Recorder::default();

    let result = orchestrator
        .download(&request(MediaKind::Audio, QualityLabel::Highest), &recorder)
        .await
        .unwrap();

    assert_eq!(result.filename, "Song.mp3");
    assert_eq!(result.mime_type, "audio/mp3");
    assert_eq!(result.bytes, b"ID3 fake mp3");
    assert_eq!(*recorder.0.lock().unwrap(), vec![25]);
    assert!(!orchestrator.extractor().workdir().exists());
}

#[tokio::test]
async fn video_download_caps_the_height() {
    let root = tempfile::tempdir().unwrap();
    let extractor = FakeExtractor::new("Clip").producing("Clip.mp4", b"mp4");
    let orchestrator = Orchestrator::new(extractor, None, settings(root.path()));

    let result = orchestrator
        .download(&request(MediaKind::Video, QualityLabel::P720), &Recorder::default())
        .await
        .unwrap();

    assert_eq!(result.filename, "Clip.mp4");
    assert_eq!(result.mime_type, "video/mp4");
    let selector = orchestrator
        .extractor()
        .format_selector
        .lock()
        .unwrap()
        .clone()
        .unwrap();
    assert!(selector.contains("height<=720"), "{selector}");
}

#[tokio::test]
async fn failed_runs_report_the_tool_error_and_clean_up() {
    let root = tempfile::tempdir().unwrap();
    let mut extractor = FakeExtractor::new("Song").producing("Song.mp3.part", b"half");
    extractor.code = 1;
    let orchestrator = Orchestrator::new(extractor, ffmpeg(), settings(root.path()));

    let err = orchestrator
        .download(&request(MediaKind::Audio, QualityLabel::Highest), &Recorder::default())
        .await
        .unwrap_err();

    match err {
        Error::DownloadFailed(message) => assert!(message.contains("Video unavailable"), "{message}"),
        other => panic!("unexpected error: {other:?}"),
    }
    assert!(!orchestrator.extractor().workdir().exists());
}

#[tokio::test]
async fn success_without_a_file_is_reported() {
    let root = tempfile::tempdir().unwrap();
    let orchestrator = Orchestrator::new(FakeExtractor::new("Ghost"), ffmpeg(), settings(root.path()));

    let err = orchestrator
        .download(&request(MediaKind::Audio, QualityLabel::Highest), &Recorder::default())
        .await
        .unwrap_err();

    assert!(matches!(err, Error::FileNotProduced), "{err:?}");
    assert!(!orchestrator.extractor().workdir().exists());
}

#[tokio::test]
async fn audio_without_ffmpeg_is_refused_up_front() {
    let root = tempfile::tempdir().unwrap();
    let orchestrator = Orchestrator::new(FakeExtractor::new("Song"), None, settings(root.path()));

    let err = orchestrator
        .download(&request(MediaKind::Audio, QualityLabel::Highest), &Recorder::default())
        .await
        .unwrap_err();

    assert!(matches!(err, Error::DependencyMissing(_)), "{err:?}");
    assert_eq!(orchestrator.extractor().calls.load(Ordering::SeqCst), 0);
    assert_eq!(std::fs::read_dir(root.path()).unwrap().count(), 0);
}

#[tokio::test]
async fn bot_checks_surface_as_verification_required() {
    let root = tempfile::tempdir().unwrap();
    let mut extractor = FakeExtractor::new("Song");
    extractor.metadata_error =
        Some("ERROR: [youtube] abc: Sign in to confirm you're not a bot. Use --cookies");
    let orchestrator = Orchestrator::new(extractor, ffmpeg(), settings(root.path()));

    let err = orchestrator
        .download(&request(MediaKind::Audio, QualityLabel::Highest), &Recorder::default())
        .await
        .unwrap_err();

    assert!(matches!(err, Error::VerificationRequired), "{err:?}");
    assert_eq!(std::fs::read_dir(root.path()).unwrap().count(), 0);
}

#[tokio::test]
async fn titles_are_sanitized_into_filenames() {
    let root = tempfile::tempdir().unwrap();
    let extractor = FakeExtractor::new("My:Video?").producing("MyVideo.mp4", b"mp4");
    let orchestrator = Orchestrator::new(extractor, None, settings(root.path()));

    let result = orchestrator
        .download(&request(MediaKind::Video, QualityLabel::P360), &Recorder::default())
        .await
        .unwrap();

    assert_eq!(result.filename, "MyVideo.mp4");
}

#[tokio::test]
async fn cookies_reach_the_extractor_as_a_file() {
    let root = tempfile::tempdir().unwrap();
    let extractor = FakeExtractor::new("Song").producing("Song.mp3", b"mp3");
    let orchestrator = Orchestrator::new(extractor, ffmpeg(), settings(root.path()));
    let mut request = request(MediaKind::Audio, QualityLabel::Highest);
    request.cookies = Some(
        CookieJar::parse(r#"[{"domain": ".youtube.com", "name": "SID", "value": "secret"}]"#)
            .unwrap(),
    );

    orchestrator.download(&request, &Recorder::default()).await.unwrap();

    let cookies = orchestrator.extractor().cookies.lock().unwrap().clone().unwrap();
    assert!(cookies.starts_with("# Netscape HTTP Cookie File"));
    assert!(cookies.contains("SID\tsecret"));
    assert!(!orchestrator.extractor().workdir().exists());
}

#[tokio::test]
async fn dropping_the_download_removes_the_work_directory() {
    let root = tempfile::tempdir().unwrap();
    let mut extractor = FakeExtractor::new("Song").producing("Song.mp3.part", b"half");
    extractor.hang = true;
    let orchestrator = Orchestrator::new(extractor, ffmpeg(), settings(root.path()));
    let request = request(MediaKind::Audio, QualityLabel::Highest);
    let recorder = Recorder::default();

    let outcome = tokio::time::timeout(
        Duration::from_millis(200),
        orchestrator.download(&request, &recorder),
    )
    .await;

    assert!(outcome.is_err(), "download should still be running");
    assert!(!orchestrator.extractor().workdir().exists());
    assert_eq!(std::fs::read_dir(root.path()).unwrap().count(), 0);
}

#[tokio::test]
async fn unusable_temp_roots_fail_the_download() {
    let root = tempfile::tempdir().unwrap();
    let not_a_dir = root.path().join("scratch");
    std::fs::write(&not_a_dir, b"a file where a directory should be").unwrap();
    let orchestrator = Orchestrator::new(FakeExtractor::new("Song"), ffmpeg(), settings(&not_a_dir));

    let err = orchestrator
        .download(&request(MediaKind::Audio, QualityLabel::Highest), &Recorder::default())
        .await
        .unwrap_err();

    assert!(matches!(err, Error::DownloadFailed(_)), "{err:?}");
    assert_eq!(orchestrator.extractor().calls.load(Ordering::SeqCst), 0);
}
