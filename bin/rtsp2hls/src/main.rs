use std::{path::PathBuf, process::ExitStatus, time::Duration};

use anyhow::Context;
use clap::Parser;
use rtsp2hls::{Process, TranscodeOptions, Transcoder};
use tokio::process::Child;

/// Time ffmpeg gets to finish the playlist after Ctrl-C.
const SHUTDOWN_GRACE: Duration = Duration::from_secs(5);

#[derive(Parser, Debug, Clone)]
#[clap(version, about)]
pub struct Rtsp2HlsArgs {
    /// Debug output
    #[clap(long, alias = "debug")]
    verbose: bool,

    /// Load options from a TOML file
    ///
    /// Flags given on the command line override values from the file.
    #[clap(short, long)]
    config: Option<PathBuf>,

    /// Keep segments that are no longer listed in the playlist
    #[clap(short, long)]
    keep: bool,

    /// Drop audio from the output
    #[clap(long)]
    no_audio: bool,

    /// Target segment duration in seconds [default: 2]
    #[clap(long)]
    hls_time: Option<u32>,

    /// Number of segments listed in the live playlist [default: 10]
    #[clap(long)]
    hls_list_size: Option<u32>,

    /// ffmpeg executable to run
    #[clap(long, env = "FFMPEG")]
    ffmpeg: Option<PathBuf>,

    /// RTSP stream to read from
    uri: String,

    /// Directory receiving index.m3u8 and the segments
    output_dir: PathBuf,
}

impl Rtsp2HlsArgs {
    fn options(&self) -> anyhow::Result<TranscodeOptions> {
        let mut options = match &self.config {
            Some(path) => {
                let data = std::fs::read_to_string(path)
                    .with_context(|| format!("Failed to read {}", path.display()))?;
                toml::from_str(&data)
                    .with_context(|| format!("Invalid config file {}", path.display()))?
            }
            None => TranscodeOptions::default(),
        };

        if self.keep {
            options.keep_segments = true;
        }
        if self.no_audio {
            options.audio = false;
        }
        if let Some(hls_time) = self.hls_time {
            options.hls_time = hls_time;
        }
        if let Some(hls_list_size) = self.hls_list_size {
            options.hls_list_size = hls_list_size;
        }
        if let Some(ffmpeg) = &self.ffmpeg {
            options.program = ffmpeg.clone();
        }

        Ok(options)
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Rtsp2HlsArgs::parse();

    pretty_env_logger::formatted_builder()
        .filter_level(if args.verbose {
            log::LevelFilter::Debug
        } else {
            log::LevelFilter::Info
        })
        .parse_default_env()
        .init();

    let process = Process::from_options(args.options()?)?;
    let ffmpeg = process.check_executable()?;
    log::debug!("Using transcoder at {}", ffmpeg.display());

    let spawned = process.spawn(&args.output_dir, &args.uri)?;
    let playlist = spawned.playlist().to_path_buf();
    if let Some(log_file) = spawned.log_file() {
        log::info!("Transcoder output goes to {}", log_file.display());
    }

    let mut child = spawned.start()?;
    log::info!("Streaming {} to {}", args.uri, playlist.display());

    let status = tokio::select! {
        status = child.wait() => Some(status?),
        _ = tokio::signal::ctrl_c() => None,
    };

    match status {
        Some(status) if !status.success() => {
            anyhow::bail!("Transcoder exited with {status}");
        }
        Some(_) => log::info!("Transcoder finished."),
        None => {
            log::info!("Ctrl-C received, waiting for transcoder to finish.");
            if stop(&mut child, SHUTDOWN_GRACE).await?.is_none() {
                log::warn!("Transcoder did not exit in time and was killed.");
            }
        }
    }

    Ok(())
}

/// Wait up to `grace` for the child to exit on its own, then kill it.
///
/// The terminal delivers Ctrl-C to ffmpeg as well, which makes it close the
/// playlist. Returns `None` when the child had to be killed.
async fn stop(child: &mut Child, grace: Duration) -> std::io::Result<Option<ExitStatus>> {
    match tokio::time::timeout(grace, child.wait()).await {
        Ok(status) => status.map(Some),
        Err(_) => {
            child.kill().await?;
            Ok(None)
        }
    }
}
