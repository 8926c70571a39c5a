use std::{
    ffi::{OsStr, OsString},
    fmt,
    path::{Path, PathBuf},
    process::Stdio,
};

use tokio::process::{Child, Command};

use crate::{
    config::{ProcessLoggingOptions, TranscodeOptions},
    error::{TranscodeError, TranscodeResult},
    hls::{hls_flags, playlist_path, segment_filename},
    logs::{log_name, ProcessLog},
    Transcoder,
};

/// Builds ffmpeg processes that read one RTSP stream and write a live HLS
/// playlist with its segments into an output directory.
#[derive(Debug, Clone)]
pub struct Process {
    options: TranscodeOptions,
}

impl Process {
    pub fn new(
        keep_segments: bool,
        audio: bool,
        hls_time: u32,
        hls_list_size: u32,
    ) -> TranscodeResult<Self> {
        Self::from_options(TranscodeOptions {
            keep_segments,
            audio,
            hls_time,
            hls_list_size,
            ..Default::default()
        })
    }

    pub fn from_options(options: TranscodeOptions) -> TranscodeResult<Self> {
        options.validate()?;
        Ok(Self { options })
    }

    /// Use another transcoder executable instead of `ffmpeg`.
    pub fn with_program<P>(self, program: P) -> TranscodeResult<Self>
    where
        P: Into<PathBuf>,
    {
        Self::from_options(TranscodeOptions {
            program: program.into(),
            ..self.options
        })
    }

    /// Redirect the output of spawned processes to rotated log files.
    pub fn with_logging(self, logging: ProcessLoggingOptions) -> TranscodeResult<Self> {
        Self::from_options(TranscodeOptions {
            logging,
            ..self.options
        })
    }

    pub fn options(&self) -> &TranscodeOptions {
        &self.options
    }

    /// Look up the transcoder executable in `PATH`.
    ///
    /// [Transcoder::spawn] does not do this, the executable is only
    /// resolved when the caller starts the command.
    pub fn check_executable(&self) -> TranscodeResult<PathBuf> {
        Ok(which::which(&self.options.program)?)
    }

    /// Ordered ffmpeg arguments for one stream.
    ///
    /// ffmpeg options apply to the next input or output file, so the order
    /// here is significant.
    pub fn args(&self, output_dir: &Path, uri: &str) -> Vec<OsString> {
        let mut args: Vec<OsString> = [
            "-y",
            "-fflags",
            "flush_packets+discardcorrupt+nobuffer",
            "-rtsp_transport",
            "tcp",
            "-i",
            uri,
            // silent placeholder so the output always has an audio slot
            "-f",
            "lavfi",
            "-i",
            "anullsrc=channel_layout=stereo:sample_rate=44100",
            "-fps_mode",
            "cfr",
            "-fpsmax",
            "15",
            "-copyts",
            "-vcodec",
            "copy",
            "-movflags",
            "frag_keyframe+empty_moov",
        ]
        .into_iter()
        .map(OsString::from)
        .collect();

        if !self.options.audio {
            args.push("-an".into());
        }

        args.extend(
            [
                "-hls_flags",
                hls_flags(self.options.keep_segments),
                "-f",
                "hls",
                "-segment_list_flags",
                "live",
                "-hls_time",
            ]
            .into_iter()
            .map(OsString::from),
        );
        args.push(self.options.hls_time.to_string().into());
        args.push("-hls_list_size".into());
        args.push(self.options.hls_list_size.to_string().into());
        args.push("-hls_segment_filename".into());
        args.push(segment_filename(output_dir));
        args.push(playlist_path(output_dir));

        args
    }
}

impl Transcoder for Process {
    fn spawn(&self, output_dir: &Path, uri: &str) -> TranscodeResult<TranscodeProcess> {
        if uri.is_empty() {
            return Err(TranscodeError::InvalidConfig(
                "source uri must not be empty".to_string(),
            ));
        }
        if output_dir.as_os_str().is_empty() {
            return Err(TranscodeError::InvalidConfig(
                "output directory must not be empty".to_string(),
            ));
        }

        std::fs::create_dir_all(output_dir).map_err(TranscodeError::unavailable(output_dir))?;

        let log = if self.options.logging.enabled {
            Some(ProcessLog::open(
                &self.options.logging,
                &log_name(output_dir),
            )?)
        } else {
            None
        };

        let process = TranscodeProcess {
            program: self.options.program.clone(),
            args: self.args(output_dir, uri),
            output_dir: output_dir.to_path_buf(),
            playlist: PathBuf::from(playlist_path(output_dir)),
            log,
        };
        log::debug!("{process} command | Process");

        Ok(process)
    }
}

/// A fully configured transcoder invocation that has not been started.
///
/// Starting, watching and stopping the process is up to the owner.
#[derive(Debug)]
pub struct TranscodeProcess {
    program: PathBuf,
    args: Vec<OsString>,
    output_dir: PathBuf,
    playlist: PathBuf,
    log: Option<ProcessLog>,
}

impl TranscodeProcess {
    pub fn program(&self) -> &Path {
        &self.program
    }

    pub fn args(&self) -> &[OsString] {
        &self.args
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    /// Path of the live `index.m3u8`.
    pub fn playlist(&self) -> &Path {
        &self.playlist
    }

    pub fn log_file(&self) -> Option<&Path> {
        self.log.as_ref().map(ProcessLog::path)
    }

    /// Command for this process. With logging enabled its stdout and stderr
    /// are piped, use [TranscodeProcess::start] to have them copied to the log.
    pub fn command(&self) -> Command {
        let mut command = Command::new(&self.program);
        command.args(&self.args);
        if self.log.is_some() {
            command.stdout(Stdio::piped()).stderr(Stdio::piped());
        }
        command
    }

    /// Start the process and forward its output to the log, if any.
    ///
    /// Must be called within a tokio runtime.
    pub fn start(self) -> TranscodeResult<Child> {
        let mut child = self.command().spawn()?;
        if let Some(log) = &self.log {
            log.attach(&mut child);
        }
        Ok(child)
    }
}

impl fmt::Display for TranscodeProcess {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<_> = std::iter::once(self.program.as_os_str())
            .chain(self.args.iter().map(OsString::as_os_str))
            .map(OsStr::to_string_lossy)
            .collect();

        match shlex::try_join(parts.iter().map(|part| &**part)) {
            Ok(line) => f.write_str(&line),
            Err(_) => write!(f, "{parts:?}"),
        }
    }
}
