use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::error::{TranscodeError, TranscodeResult};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TranscodeOptions {
    /// Keep segments that left the playlist window on disk.
    pub keep_segments: bool,
    /// Mux audio into the output. When disabled, audio is dropped with `-an`.
    pub audio: bool,
    /// Target duration of each segment in seconds.
    pub hls_time: u32,
    /// Maximum number of entries kept in the live playlist.
    pub hls_list_size: u32,
    /// Transcoder executable, looked up in `PATH` when started.
    pub program: PathBuf,

    pub logging: ProcessLoggingOptions,
}

impl Default for TranscodeOptions {
    fn default() -> Self {
        Self {
            keep_segments: false,
            audio: true,
            hls_time: 2,
            hls_list_size: 10,
            program: PathBuf::from("ffmpeg"),
            logging: ProcessLoggingOptions::default(),
        }
    }
}

impl TranscodeOptions {
    pub fn validate(&self) -> TranscodeResult<()> {
        if self.hls_time == 0 {
            return Err(TranscodeError::InvalidConfig(
                "hls_time must be a positive number of seconds".to_string(),
            ));
        }
        if self.hls_list_size == 0 {
            return Err(TranscodeError::InvalidConfig(
                "hls_list_size must be positive".to_string(),
            ));
        }
        if self.program.as_os_str().is_empty() {
            return Err(TranscodeError::InvalidConfig(
                "transcoder program must not be empty".to_string(),
            ));
        }

        self.logging.validate()
    }
}

/// Where the stdout and stderr of transcoder processes are written.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProcessLoggingOptions {
    pub enabled: bool,
    pub directory: PathBuf,
    /// Size in megabytes after which a log file is rotated.
    pub max_size: u64,
    /// Maximum number of rotated files to keep. `0` keeps all of them.
    pub max_backups: usize,
    /// Maximum age of a rotated file in days. `0` disables age based removal.
    pub max_age: u64,
    /// Gzip rotated files.
    pub compress: bool,
}

impl Default for ProcessLoggingOptions {
    fn default() -> Self {
        Self {
            enabled: false,
            directory: PathBuf::from("logs"),
            max_size: 500,
            max_backups: 3,
            max_age: 28,
            compress: false,
        }
    }
}

impl ProcessLoggingOptions {
    pub fn max_size_bytes(&self) -> u64 {
        self.max_size.saturating_mul(1024 * 1024)
    }

    fn validate(&self) -> TranscodeResult<()> {
        if !self.enabled {
            return Ok(());
        }

        if self.directory.as_os_str().is_empty() {
            return Err(TranscodeError::InvalidConfig(
                "logging directory must not be empty".to_string(),
            ));
        }
        if self.max_size == 0 {
            return Err(TranscodeError::InvalidConfig(
                "logging max_size must be positive".to_string(),
            ));
        }

        Ok(())
    }
}
