use std::{
    fs::{File, OpenOptions},
    io::Write,
    path::{Component, Path, PathBuf},
    sync::Arc,
};

use chrono::{Local, NaiveDateTime, TimeDelta};
use flate2::{write::GzEncoder, Compression};
use parking_lot::Mutex;
use tokio::{
    io::{AsyncRead, AsyncReadExt},
    process::Child,
    task::JoinHandle,
};

use crate::{
    config::ProcessLoggingOptions,
    error::{TranscodeError, TranscodeResult},
};

const BACKUP_TIME_FORMAT: &str = "%Y%m%dT%H%M%S%.3f";

/// Log name of the process writing into `output_dir`.
///
/// Every component of the path takes part in the name, so `cam-a/hls` and
/// `cam-b/hls` get different logs.
pub fn log_name(output_dir: &Path) -> String {
    let parts: Vec<_> = output_dir
        .components()
        .filter_map(|component| match component {
            Component::Normal(part) => Some(part.to_string_lossy()),
            Component::ParentDir => Some("..".into()),
            _ => None,
        })
        .collect();

    if parts.is_empty() {
        "ffmpeg".to_string()
    } else {
        parts.join("_")
    }
}

/// Append-only log file that rotates itself once it reaches `max_size`.
#[derive(Debug)]
pub struct RotatingWriter {
    options: ProcessLoggingOptions,
    name: String,
    path: PathBuf,
    file: Option<File>,
    size: u64,
}

impl RotatingWriter {
    /// Open `<directory>/<name>.log` for appending.
    ///
    /// An existing file already larger than `max_size` is rotated first.
    pub fn open(options: &ProcessLoggingOptions, name: &str) -> TranscodeResult<Self> {
        let directory = &options.directory;
        std::fs::create_dir_all(directory).map_err(TranscodeError::unavailable(directory))?;

        let mut writer = Self {
            options: options.clone(),
            name: name.to_string(),
            path: directory.join(format!("{name}.log")),
            file: None,
            size: 0,
        };

        let size = std::fs::metadata(&writer.path).map_or(0, |m| m.len());
        if size >= options.max_size_bytes() {
            writer.rotate()?;
        } else {
            prune_backups(options, name, Local::now().naive_local())?;
            writer.reopen()?;
        }

        Ok(writer)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn reopen(&mut self) -> TranscodeResult<()> {
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .map_err(TranscodeError::unavailable(&self.path))?;
        self.size = file.metadata()?.len();
        self.file = Some(file);
        Ok(())
    }

    /// Move the current file aside and start a new one.
    fn rotate(&mut self) -> TranscodeResult<()> {
        // must be closed before the rename
        if let Some(mut file) = self.file.take() {
            file.flush()?;
        }

        if self.path.exists() {
            let now = Local::now().naive_local();
            let backup = backup_path(&self.options.directory, &self.name, now);
            log::info!("Rotating {} to {}", self.path.display(), backup.display());
            std::fs::rename(&self.path, &backup)
                .map_err(TranscodeError::unavailable(&self.path))?;

            if self.options.compress {
                compress_file(&backup)?;
            }
        }

        prune_backups(&self.options, &self.name, Local::now().naive_local())?;
        self.reopen()
    }
}

impl Write for RotatingWriter {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        let incoming = buf.len() as u64;
        if self.file.is_none()
            || (self.size > 0 && self.size + incoming > self.options.max_size_bytes())
        {
            self.rotate().map_err(std::io::Error::other)?;
        }

        let Some(file) = self.file.as_mut() else {
            return Err(std::io::Error::other("log file is not open"));
        };
        let written = file.write(buf)?;
        self.size += written as u64;
        Ok(written)
    }

    fn flush(&mut self) -> std::io::Result<()> {
        match self.file.as_mut() {
            Some(file) => file.flush(),
            None => Ok(()),
        }
    }
}

/// Log receiving the stdout and stderr of one transcoder process.
#[derive(Debug, Clone)]
pub struct ProcessLog {
    path: PathBuf,
    writer: Arc<Mutex<RotatingWriter>>,
}

impl ProcessLog {
    pub fn open(options: &ProcessLoggingOptions, name: &str) -> TranscodeResult<Self> {
        let writer = RotatingWriter::open(options, name)?;
        Ok(Self {
            path: writer.path().to_path_buf(),
            writer: Arc::new(Mutex::new(writer)),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Copy the piped stdout and stderr of `child` into the log.
    ///
    /// The returned tasks end when the child closes its pipes.
    pub fn attach(&self, child: &mut Child) -> Vec<JoinHandle<()>> {
        let mut tasks = Vec::with_capacity(2);
        if let Some(stdout) = child.stdout.take() {
            tasks.push(tokio::spawn(pump(stdout, self.writer.clone())));
        }
        if let Some(stderr) = child.stderr.take() {
            tasks.push(tokio::spawn(pump(stderr, self.writer.clone())));
        }
        tasks
    }
}

async fn pump<R>(mut reader: R, writer: Arc<Mutex<RotatingWriter>>)
where
    R: AsyncRead + Unpin,
{
    let mut buf = vec![0u8; 8192];
    loop {
        match reader.read(&mut buf).await {
            Ok(0) => break,
            Ok(n) => {
                let mut writer = writer.lock();
                if let Err(e) = writer.write_all(&buf[..n]).and_then(|_| writer.flush()) {
                    log::warn!("Failed to write {}: {e}", writer.path().display());
                }
            }
            Err(e) => {
                log::warn!("Failed to read transcoder output: {e}");
                break;
            }
        }
    }
}

fn backup_path(directory: &Path, name: &str, time: NaiveDateTime) -> PathBuf {
    directory.join(format!("{name}-{}.log", time.format(BACKUP_TIME_FORMAT)))
}

/// Parse the rotation time out of a backup file name that belongs to `name`.
fn backup_time(file_name: &str, name: &str) -> Option<NaiveDateTime> {
    let rest = file_name.strip_prefix(name)?.strip_prefix('-')?;
    let time = rest
        .strip_suffix(".log.gz")
        .or_else(|| rest.strip_suffix(".log"))?;
    NaiveDateTime::parse_from_str(time, BACKUP_TIME_FORMAT).ok()
}

/// Replace `path` with `path.gz`.
fn compress_file(path: &Path) -> TranscodeResult<PathBuf> {
    let mut compressed = path.as_os_str().to_owned();
    compressed.push(".gz");
    let compressed = PathBuf::from(compressed);

    let mut input = File::open(path).map_err(TranscodeError::unavailable(path))?;
    let output = File::create(&compressed).map_err(TranscodeError::unavailable(&compressed))?;
    let mut encoder = GzEncoder::new(output, Compression::default());
    std::io::copy(&mut input, &mut encoder)?;
    encoder.finish()?;

    std::fs::remove_file(path).map_err(TranscodeError::unavailable(path))?;
    Ok(compressed)
}

fn prune_backups(
    options: &ProcessLoggingOptions,
    name: &str,
    now: NaiveDateTime,
) -> TranscodeResult<()> {
    let mut backups = Vec::new();
    for entry in std::fs::read_dir(&options.directory)? {
        let entry = entry?;
        let file_name = entry.file_name();
        let Some(file_name) = file_name.to_str() else {
            continue;
        };
        if let Some(time) = backup_time(file_name, name) {
            backups.push((time, entry.path()));
        }
    }

    // newest first
    backups.sort_by(|a, b| b.0.cmp(&a.0));

    // ages beyond what chrono can represent never expire
    let max_age = (options.max_age > 0)
        .then(|| i64::try_from(options.max_age).ok().and_then(TimeDelta::try_days))
        .flatten();
    for (index, (time, path)) in backups.into_iter().enumerate() {
        let too_many = options.max_backups > 0 && index >= options.max_backups;
        let too_old = max_age.is_some_and(|max_age| now - time > max_age);
        if too_many || too_old {
            log::debug!("Removing old process log {}", path.display());
            if let Err(e) = std::fs::remove_file(&path) {
                log::warn!("Failed to remove {}: {e}", path.display());
            }
        }
    }

    Ok(())
}
