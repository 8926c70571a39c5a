pub mod config;
pub mod error;
pub mod hls;
pub mod logs;
pub mod process;

pub use config::{ProcessLoggingOptions, TranscodeOptions};
pub use error::{TranscodeError, TranscodeResult};
pub use process::{Process, TranscodeProcess};

use std::path::Path;

/// ```text
///                     spawn(output_dir, uri)
/// ┌──────────────┐  ──────────────────────────►  ┌──────────────────┐
/// │    Caller    │                               │    Transcoder    │
/// │              │  ◄──────────────────────────  │                  │
/// └──────┬───────┘       TranscodeProcess        └──────────────────┘
///        │ start()
///        ▼
/// ┌──────────────┐   rtsp://...   ┌─────────────────────────────────┐
/// │    ffmpeg    │ ─────────────► │ <output_dir>/index.m3u8, <N>.ts │
/// └──────────────┘                └─────────────────────────────────┘
/// ```
///
/// A transcoding backend. Implementations prepare the output directory and
/// return an inert process description; the caller owns everything that
/// happens after that, including restarts.
pub trait Transcoder: Send + Sync {
    fn spawn(&self, output_dir: &Path, uri: &str) -> TranscodeResult<TranscodeProcess>;
}
