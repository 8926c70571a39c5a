use std::{
    ffi::{OsStr, OsString},
    path::Path,
};

/// `-hls_flags` value used when old segments are kept on disk.
pub const KEEP_SEGMENTS_FLAGS: &str = "split_by_time+append_list";

/// `-hls_flags` value used when ffmpeg should remove segments that
/// left the playlist window.
pub const DELETE_SEGMENTS_FLAGS: &str = "delete_segments+split_by_time+append_list";

/// File name pattern of the produced segments, numbered from 0.
pub const SEGMENT_PATTERN: &str = "%d.ts";

/// File name of the live playlist.
pub const PLAYLIST_FILE_NAME: &str = "index.m3u8";

pub fn hls_flags(keep_segments: bool) -> &'static str {
    if keep_segments {
        KEEP_SEGMENTS_FLAGS
    } else {
        DELETE_SEGMENTS_FLAGS
    }
}

/// Join `name` onto `output_dir` with a single `/`.
///
/// The directory is kept exactly as the caller passed it. A separator is
/// only inserted when the directory does not already end with one, so
/// `/tmp/out` and `/tmp/out/` both yield `/tmp/out/<name>`.
pub fn rooted<N>(output_dir: &Path, name: N) -> OsString
where
    N: AsRef<OsStr>,
{
    let mut path = output_dir.as_os_str().to_owned();
    if !output_dir.to_string_lossy().ends_with('/') {
        path.push("/");
    }
    path.push(name);
    path
}

/// `<output_dir>/%d.ts`
pub fn segment_filename(output_dir: &Path) -> OsString {
    rooted(output_dir, SEGMENT_PATTERN)
}

/// `<output_dir>/index.m3u8`
pub fn playlist_path(output_dir: &Path) -> OsString {
    rooted(output_dir, PLAYLIST_FILE_NAME)
}
