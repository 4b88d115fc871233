use clap::{Parser, Subcommand, builder::PossibleValuesParser};
use indicatif::{MultiProgress, ProgressBar, ProgressStyle};
use indicatif_log_bridge::LogWrapper;
use log::{LevelFilter, error, info, warn};
use std::io::{IsTerminal, Write};
use std::path::{Path, PathBuf};
use std::time::Duration;
use ytdownhub::deps::Libraries;
use ytdownhub::executor::Executor;
use ytdownhub::metadata;
use ytdownhub::progress::ProgressSink;
use ytdownhub::tagging;
use ytdownhub::youtube::is_valid_youtube_url;
use ytdownhub::{
    CookieJar, DownloadRequest, DownloadResult, Error, MediaKind, Orchestrator, QualityLabel,
    Settings, VideoMetadata, YtDlp,
};

type CliResult<T> = Result<T, Box<dyn std::error::Error + Send + Sync>>;

#[derive(Parser)]
#[command(
    name = "ytdownhub",
    version,
    about = "Download YouTube videos, or just their audio as mp3, through yt-dlp."
)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Use this config file instead of the default one.
    #[arg(long = "config", global = true)]
    config: Option<PathBuf>,

    /// Path to the yt-dlp binary.
    #[arg(long = "yt-dlp", global = true)]
    yt_dlp: Option<PathBuf>,

    /// Path to the ffmpeg binary.
    #[arg(long = "ffmpeg", global = true)]
    ffmpeg: Option<PathBuf>,

    #[arg(
        long = "verbosity",
        short,
        global = true,
        default_value = "info",
        value_parser = PossibleValuesParser::new(["info", "debug", "error", "none", "full"])
    )]
    verbosity: String,
}

#[derive(Subcommand)]
enum Command {
    /// Show title, author, duration and view count of videos.
    Info {
        #[arg(required = true)]
        urls: Vec<String>,

        /// JSON cookie export to send along.
        #[arg(long = "cookies-json")]
        cookies_json: Option<PathBuf>,
    },
    /// Download videos, or only their audio as mp3.
    Download {
        #[arg(required = true)]
        urls: Vec<String>,

        /// Keep only the audio, as mp3.
        #[arg(long = "audio", short)]
        audio: bool,

        /// highest, 144p, 240p, 360p, 480p, 720p, 1080p, 1440p, 2160p or 4k.
        #[arg(long = "quality", short, value_parser = parse_quality)]
        quality: Option<QualityLabel>,

        #[arg(long = "output-dir", short)]
        output_dir: Option<PathBuf>,

        /// mp3 bitrate in kbps.
        #[arg(
            long = "bitrate",
            short,
            value_parser = PossibleValuesParser::new(["64", "96", "128", "160", "192", "256", "320"])
        )]
        bitrate: Option<String>,

        /// JSON cookie export to send along.
        #[arg(long = "cookies-json")]
        cookies_json: Option<PathBuf>,

        /// Do not write title, artist and cover art into mp3 files.
        #[arg(long = "no-tag", action = clap::ArgAction::SetTrue)]
        no_tag: bool,
    },
    /// Show which yt-dlp and ffmpeg would be used.
    Doctor,
    /// Print the effective settings, or write a default config file.
    Config {
        #[arg(long = "init", action = clap::ArgAction::SetTrue)]
        init: bool,
    },
}

fn parse_quality(value: &str) -> Result<QualityLabel, String> {
    value.parse().map_err(|e: Error| e.to_string())
}

struct BarSink(ProgressBar);

impl ProgressSink for BarSink {
    fn set_percent(&self, percent: u8) {
        self.0.set_position(u64::from(percent));
    }
}

/// State kept between the URLs of one invocation.
struct Session {
    cookies: Option<CookieJar>,
}

impl Session {
    fn new(cookies_json: Option<&Path>) -> CliResult<Self> {
        let cookies = cookies_json.map(CookieJar::from_file).transpose()?;
        if let Some(jar) = &cookies {
            info!("Loaded {} cookies", jar.len());
        }

        Ok(Self { cookies })
    }

    /// Asks for cookies after a bot check. Returns whether any were given.
    fn ask_for_cookies(&mut self) -> ytdownhub::Result<bool> {
        match prompt_cookies()? {
            Some(jar) => {
                self.cookies = Some(jar);
                Ok(true)
            }
            None => Ok(false),
        }
    }
}

#[tokio::main]
async fn main() -> CliResult<()> {
    let args = Cli::parse();
    let multi = MultiProgress::new();
    init_logging(&args.verbosity, &multi)?;

    let config_path = args.config.clone().or_else(Settings::default_path);
    let mut settings = load_settings(config_path.as_deref());
    if args.yt_dlp.is_some() {
        settings.yt_dlp_path = args.yt_dlp.clone();
    }
    if args.ffmpeg.is_some() {
        settings.ffmpeg_path = args.ffmpeg.clone();
    }

    match args.command {
        Command::Info { urls, cookies_json } => {
            run_info(&settings, &urls, cookies_json.as_deref()).await
        }
        Command::Download {
            urls,
            audio,
            quality,
            output_dir,
            bitrate,
            cookies_json,
            no_tag,
        } => {
            if output_dir.is_some() {
                settings.output_dir = output_dir;
            }
            if let Some(bitrate) = bitrate {
                settings.audio_bitrate = bitrate.parse()?;
            }
            let quality = match quality {
                Some(quality) => quality,
                None => settings.default_quality()?,
            };
            let media_kind = if audio {
                MediaKind::Audio
            } else {
                MediaKind::Video
            };
            let tag = settings.embed_tags && !no_tag;

            run_download(
                settings,
                &multi,
                &urls,
                media_kind,
                quality,
                cookies_json.as_deref(),
                tag,
            )
            .await
        }
        Command::Doctor => run_doctor(&settings).await,
        Command::Config { init } => run_config(&settings, config_path.as_deref(), init),
    }
}

fn init_logging(verbosity: &str, multi: &MultiProgress) -> CliResult<()> {
    let level = match verbosity {
        "none" => LevelFilter::Off,
        "error" => LevelFilter::Error,
        "debug" => LevelFilter::Debug,
        "full" => LevelFilter::Trace,
        _ => LevelFilter::Info,
    };

    let logger = env_logger::Builder::new()
        .filter_level(level)
        .format_timestamp(None)
        .build();
    let max_level = logger.filter();

    LogWrapper::new(multi.clone(), logger).try_init()?;
    log::set_max_level(max_level);
    Ok(())
}

fn load_settings(path: Option<&Path>) -> Settings {
    let Some(path) = path else {
        return Settings::default();
    };

    match Settings::load(path) {
        Ok(settings) => settings,
        Err(e) => {
            error!("{}", e);
            info!("Ignoring the config file, using default settings");
            Settings::default()
        }
    }
}

fn discover(settings: &Settings) -> ytdownhub::Result<Libraries> {
    Libraries::discover(
        settings.yt_dlp_path.as_deref(),
        settings.ffmpeg_path.as_deref(),
    )
}

async fn run_info(settings: &Settings, urls: &[String], cookies_json: Option<&Path>) -> CliResult<()> {
    let libraries = discover(settings)?;
    let ytdlp = YtDlp::new(libraries.youtube);
    let mut session = Session::new(cookies_json)?;

    let mut failed = 0;
    for url in urls {
        warn_if_not_youtube(url);
        match lookup_with_prompt(&ytdlp, url, settings, &mut session).await {
            Ok(metadata) => print_metadata(&metadata),
            Err(e) => {
                failed += 1;
                eprintln!("{}: {}", url, e);
            }
        }
    }

    finish(failed, urls.len())
}

async fn run_download(
    settings: Settings,
    multi: &MultiProgress,
    urls: &[String],
    media_kind: MediaKind,
    quality: QualityLabel,
    cookies_json: Option<&Path>,
    tag: bool,
) -> CliResult<()> {
    let libraries = discover(&settings)?;
    let output_dir = settings.resolve_output_dir();
    tokio::fs::create_dir_all(&output_dir).await?;

    let orchestrator = Orchestrator::new(
        YtDlp::new(libraries.youtube),
        libraries.ffmpeg,
        settings.clone(),
    );
    let mut session = Session::new(cookies_json)?;

    let mut failed = 0;
    for url in urls {
        warn_if_not_youtube(url);

        let metadata =
            match lookup_with_prompt(orchestrator.extractor(), url, &settings, &mut session).await {
                Ok(metadata) => metadata,
                Err(e) => {
                    failed += 1;
                    eprintln!("{}: {}", url, e);
                    continue;
                }
            };
        print_metadata(&metadata);

        let request = DownloadRequest {
            url: url.clone(),
            media_kind,
            quality,
            cookies: session.cookies.clone(),
        };
        let bar = new_bar(multi, &metadata.title)?;
        let sink = BarSink(bar.clone());

        let outcome = tokio::select! {
            result = orchestrator.download(&request, &sink) => result,
            _ = tokio::signal::ctrl_c() => {
                bar.abandon_with_message("cancelled");
                return Err("Interrupted, temporary files were removed".into());
            }
        };

        match outcome {
            Ok(result) => {
                bar.finish_with_message("done");
                let path = save(&result, &output_dir).await?;
                if media_kind == MediaKind::Audio && tag {
                    tag_saved(&path, &metadata).await;
                }
                println!("Saved {} ({}) to {}", result.filename, result.mime_type, path.display());
            }
            Err(e) => {
                bar.abandon_with_message("failed");
                failed += 1;
                eprintln!("{}: {}", url, e);
            }
        }
    }

    finish(failed, urls.len())
}

async fn run_doctor(settings: &Settings) -> CliResult<()> {
    let libraries = discover(settings)?;
    let timeout = settings.metadata_timeout();

    let version = YtDlp::new(libraries.youtube.clone())
        .version(timeout)
        .await
        .unwrap_or_else(|e| format!("unknown version: {}", e));
    println!("yt-dlp: {} ({})", libraries.youtube.display(), version);

    match &libraries.ffmpeg {
        Some(ffmpeg) => {
            let version = ffmpeg_version(ffmpeg, timeout)
                .await
                .unwrap_or_else(|e| format!("unknown version: {}", e));
            println!("ffmpeg: {} ({})", ffmpeg.display(), version);
        }
        None => println!("ffmpeg: not found, audio and highest-quality downloads are unavailable"),
    }

    println!("output: {}", settings.resolve_output_dir().display());
    Ok(())
}

async fn ffmpeg_version(ffmpeg: &Path, timeout: Duration) -> ytdownhub::Result<String> {
    let executor = Executor {
        executable_path: ffmpeg.to_path_buf(),
        timeout,
        args: vec!["-version".to_string()],
    };

    let output = executor.execute().await?;
    Ok(output.stdout.lines().next().unwrap_or_default().to_string())
}

fn run_config(settings: &Settings, path: Option<&Path>, init: bool) -> CliResult<()> {
    let path = path.ok_or("Could not find a valid config directory.")?;

    if init {
        if path.exists() {
            println!("A config file already exists at {}", path.display());
        } else {
            Settings::default().save(path)?;
            println!("Configuration saved to: {}", path.display());
        }
        return Ok(());
    }

    println!("# {}", path.display());
    print!("{}", settings.to_toml()?);
    Ok(())
}

/// Fetches video information, asking for cookies once if YouTube wants a bot check.
async fn lookup_with_prompt(
    ytdlp: &YtDlp,
    url: &str,
    settings: &Settings,
    session: &mut Session,
) -> ytdownhub::Result<VideoMetadata> {
    let mut asked = false;
    loop {
        let result = metadata::lookup(
            ytdlp,
            url,
            settings.metadata_timeout(),
            session.cookies.as_ref(),
        )
        .await;

        match result {
            Err(Error::VerificationRequired) if !asked => {
                asked = true;
                if !session.ask_for_cookies()? {
                    return Err(Error::VerificationRequired);
                }
            }
            result => return result,
        }
    }
}

fn prompt_cookies() -> ytdownhub::Result<Option<CookieJar>> {
    if !std::io::stdin().is_terminal() {
        warn!("Cannot ask for cookies without a terminal, pass --cookies-json instead");
        return Ok(None);
    }

    println!("YouTube wants to confirm you're not a bot.");
    println!("Export your youtube.com cookies as JSON from a signed-in browser and paste them here.");
    println!("Finish with an empty line, or press Enter right away to skip.");

    loop {
        let payload = read_block()?;
        if payload.trim().is_empty() {
            return Ok(None);
        }

        match CookieJar::parse(&payload) {
            Ok(jar) => {
                println!("Accepted {} cookies.", jar.len());
                return Ok(Some(jar));
            }
            Err(e) => println!("{} Paste them again, or press Enter to skip.", e),
        }
    }
}

/// Reads lines from stdin up to the first empty one.
fn read_block() -> std::io::Result<String> {
    print!("> ");
    std::io::stdout().flush()?;

    let mut payload = String::new();
    loop {
        let mut line = String::new();
        if std::io::stdin().read_line(&mut line)? == 0 || line.trim().is_empty() {
            break;
        }
        payload.push_str(&line);
    }

    Ok(payload)
}

fn new_bar(multi: &MultiProgress, title: &str) -> CliResult<ProgressBar> {
    let bar = multi.add(ProgressBar::new(100));
    bar.set_style(
        ProgressStyle::with_template("{msg:30!} [{bar:40.cyan/blue}] {pos:>3}%")?
            .progress_chars("=> "),
    );
    bar.set_message(title.to_string());
    Ok(bar)
}

async fn save(result: &DownloadResult, output_dir: &Path) -> ytdownhub::Result<PathBuf> {
    let path = output_dir.join(&result.filename);
    tokio::fs::write(&path, &result.bytes).await?;
    Ok(path)
}

async fn tag_saved(path: &Path, metadata: &VideoMetadata) {
    let cover = match metadata.cover_url() {
        Some(url) => match tagging::fetch_cover(&url).await {
            Ok(bytes) => Some(bytes),
            Err(e) => {
                warn!("Could not fetch the thumbnail: {}", e);
                None
            }
        },
        None => None,
    };

    if let Err(e) = tagging::tag_audio(path, metadata, cover) {
        warn!("Could not tag {}: {}", path.display(), e);
    }
}

fn print_metadata(metadata: &VideoMetadata) {
    println!("Title:     {}", metadata.title);
    println!("Author:    {}", metadata.author);
    println!("Duration:  {}", metadata.duration_display());
    println!("Views:     {}", metadata.views_display());
    if let Some(thumbnail) = &metadata.thumbnail_url {
        println!("Thumbnail: {}", thumbnail);
    }
}

fn warn_if_not_youtube(url: &str) {
    if !is_valid_youtube_url(url) {
        warn!("{} does not look like a YouTube video URL, trying anyway", url);
    }
}

fn finish(failed: usize, total: usize) -> CliResult<()> {
    if failed == 0 {
        Ok(())
    } else {
        Err(format!("{} of {} URLs failed", failed, total).into())
    }
}
