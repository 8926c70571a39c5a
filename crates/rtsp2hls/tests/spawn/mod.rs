use std::{
    path::{Path, PathBuf},
    sync::Arc,
};

use rtsp2hls::{
    Process, TranscodeError, TranscodeOptions, TranscodeProcess, TranscodeResult, Transcoder,
};

use crate::{string_args, value_after, AssertWrapper};

fn path_str(path: &Path) -> &str {
    path.to_str().unwrap()
}

#[test]
fn test_spawn_scenario() {
    let temp = tempfile::tempdir().unwrap();
    let output_dir = temp.path().join("out");

    let process = Process::new(false, true, 4, 5).assert_success();
    let spawned = process.spawn(&output_dir, "rtsp://cam/1").assert_success();
    let args = string_args(&spawned);

    assert_eq!(
        value_after(&args, "-hls_flags"),
        Some("delete_segments+split_by_time+append_list")
    );
    assert!(!args.iter().any(|arg| arg == "-an"));
    assert_eq!(value_after(&args, "-hls_time"), Some("4"));
    assert_eq!(value_after(&args, "-hls_list_size"), Some("5"));
    assert_eq!(
        value_after(&args, "-hls_segment_filename"),
        Some(format!("{}/%d.ts", path_str(&output_dir)).as_str())
    );
    assert_eq!(
        args.last().unwrap(),
        &format!("{}/index.m3u8", path_str(&output_dir))
    );
    assert_eq!(spawned.playlist(), output_dir.join("index.m3u8"));
    assert_eq!(spawned.output_dir(), output_dir);
    assert_eq!(spawned.program(), Path::new("ffmpeg"));
    assert!(spawned.log_file().is_none());
}

#[test]
fn test_spawn_without_audio() {
    let temp = tempfile::tempdir().unwrap();

    let with_audio = Process::new(false, true, 4, 5)
        .assert_success()
        .spawn(temp.path(), "rtsp://cam/1")
        .assert_success();
    let without_audio = Process::new(false, false, 4, 5)
        .assert_success()
        .spawn(temp.path(), "rtsp://cam/1")
        .assert_success();

    let with_audio = string_args(&with_audio);
    let mut without_audio = string_args(&without_audio);

    let an = without_audio
        .iter()
        .position(|arg| arg == "-an")
        .expect("audio should be disabled");
    without_audio.remove(an);
    assert_eq!(without_audio, with_audio);

    // the silent placeholder input is still there
    assert!(with_audio
        .iter()
        .any(|arg| arg == "anullsrc=channel_layout=stereo:sample_rate=44100"));
}

#[test]
fn test_spawn_creates_missing_directory() {
    let temp = tempfile::tempdir().unwrap();
    let output_dir = temp.path().join("a").join("b").join("c");
    assert!(!output_dir.exists());

    Process::new(true, true, 2, 10)
        .assert_success()
        .spawn(&output_dir, "rtsp://cam/1")
        .assert_success();

    assert!(output_dir.is_dir());
}

#[test]
fn test_spawn_is_deterministic() {
    let temp = tempfile::tempdir().unwrap();
    let process = Process::new(false, false, 6, 3).assert_success();

    // the second call finds the directory already there
    let first = process.spawn(temp.path(), "rtsp://cam/1").assert_success();
    let second = process.spawn(temp.path(), "rtsp://cam/1").assert_success();

    assert_eq!(first.args(), second.args());
    assert_eq!(first.to_string(), second.to_string());
}

#[test]
fn test_spawn_trailing_slash() {
    let temp = tempfile::tempdir().unwrap();
    let plain = temp.path().join("out");
    let slashed = PathBuf::from(format!("{}/", path_str(&plain)));

    let process = Process::new(false, true, 4, 5).assert_success();
    let plain = string_args(&process.spawn(&plain, "rtsp://cam/1").assert_success());
    let slashed = string_args(&process.spawn(&slashed, "rtsp://cam/1").assert_success());

    assert_eq!(plain, slashed);
    assert!(!plain.iter().any(|arg| arg.contains("//%d") || arg.contains("//index")));
}

#[test]
fn test_spawn_unavailable_directory() {
    let temp = tempfile::tempdir().unwrap();
    let file = temp.path().join("file");
    std::fs::write(&file, "").unwrap();

    let result = Process::new(false, true, 4, 5)
        .assert_success()
        .spawn(&file.join("out"), "rtsp://cam/1");

    match result {
        Err(TranscodeError::ResourceUnavailable { path, .. }) => {
            assert_eq!(path, file.join("out"));
        }
        other => panic!("unexpected result: {other:?}"),
    }
}

#[test]
fn test_spawn_rejects_empty_input() {
    let temp = tempfile::tempdir().unwrap();
    let process = Process::new(false, true, 4, 5).assert_success();

    assert!(matches!(
        process.spawn(temp.path(), ""),
        Err(TranscodeError::InvalidConfig(_))
    ));
    assert!(matches!(
        process.spawn(Path::new(""), "rtsp://cam/1"),
        Err(TranscodeError::InvalidConfig(_))
    ));
}

#[test]
fn test_command() {
    let temp = tempfile::tempdir().unwrap();
    let process = Process::new(false, true, 4, 5)
        .assert_success()
        .with_program("/opt/ffmpeg/bin/ffmpeg")
        .assert_success();

    let spawned = process.spawn(temp.path(), "rtsp://cam/1").assert_success();
    let args = spawned.args().to_vec();
    let command = spawned.command();

    let command = command.as_std();
    assert_eq!(command.get_program(), "/opt/ffmpeg/bin/ffmpeg");
    assert_eq!(
        command.get_args().collect::<Vec<_>>(),
        args.iter().map(|arg| arg.as_os_str()).collect::<Vec<_>>()
    );
}

#[test]
fn test_concurrent_spawn() {
    let temp = tempfile::tempdir().unwrap();
    let output_dir = temp.path().join("shared");
    let process = Arc::new(Process::new(false, true, 4, 5).assert_success());

    std::thread::scope(|scope| {
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let process = process.clone();
                let output_dir = &output_dir;
                scope.spawn(move || {
                    process
                        .spawn(output_dir, "rtsp://cam/1")
                        .map(|spawned| string_args(&spawned))
                })
            })
            .collect();

        let results: Vec<_> = handles
            .into_iter()
            .map(|handle| handle.join().unwrap().assert_success())
            .collect();
        assert!(results.windows(2).all(|w| w[0] == w[1]));
    });

    assert!(output_dir.is_dir());
}

/// Backend that runs `echo` instead of ffmpeg.
struct EchoTranscoder;

impl Transcoder for EchoTranscoder {
    fn spawn(&self, output_dir: &Path, uri: &str) -> TranscodeResult<TranscodeProcess> {
        Process::from_options(TranscodeOptions {
            program: PathBuf::from("echo"),
            ..Default::default()
        })?
        .spawn(output_dir, uri)
    }
}

#[test]
fn test_backends_are_interchangeable() {
    let temp = tempfile::tempdir().unwrap();
    let backends: Vec<Box<dyn Transcoder>> = vec![
        Box::new(Process::new(false, true, 4, 5).assert_success()),
        Box::new(EchoTranscoder),
    ];

    let programs: Vec<_> = backends
        .iter()
        .map(|backend| {
            backend
                .spawn(temp.path(), "rtsp://cam/1")
                .assert_success()
                .program()
                .to_path_buf()
        })
        .collect();

    assert_eq!(programs, vec![PathBuf::from("ffmpeg"), PathBuf::from("echo")]);
}

#[test]
fn test_check_executable_missing() {
    let process = Process::new(false, true, 4, 5)
        .assert_success()
        .with_program("definitely-not-a-real-binary-xyz")
        .assert_success();

    assert!(matches!(
        process.check_executable(),
        Err(TranscodeError::MissingExecutable(_))
    ));
}

#[cfg(unix)]
#[test]
fn test_check_executable_found() {
    let process = Process::new(false, true, 4, 5)
        .assert_success()
        .with_program("sh")
        .assert_success();

    let path = process.check_executable().assert_success();
    assert!(path.is_absolute());
    assert_eq!(path.file_name().unwrap(), "sh");
}
