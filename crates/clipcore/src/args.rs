//! Pure argv builders for the downloader and the transcoder.
//!
//! No I/O and no subprocess spawning here; everything is deterministic
//! given the request and the resolved tool paths, which keeps the exact
//! CLI contract unit-testable.

use crate::request::{DownloadRequest, TimeRange};
use crate::tools::ToolPaths;
use std::path::Path;

/// Convert whole seconds to zero-padded HH:MM:SS.
pub fn format_timestamp(total_secs: u64) -> String {
    let hours = total_secs / 3600;
    let minutes = (total_secs % 3600) / 60;
    let seconds = total_secs % 60;
    format!("{hours:02}:{minutes:02}:{seconds:02}")
}

/// `--download-sections` value for a time range.
pub fn section_spec(range: &TimeRange) -> String {
    format!(
        "*{}-{}",
        format_timestamp(range.start_secs),
        format_timestamp(range.end_secs)
    )
}

/// Build the fallback-chained video format selector.
///
/// Prefers avc1 (H.264) for editor compatibility, then the broader avc
/// family, then anything but VP9, then best available. Each tier is
/// height-capped when a quality ceiling was requested.
pub fn video_format_selector(max_height: Option<u32>) -> String {
    match max_height {
        Some(h) => format!(
            "bestvideo[vcodec^=avc1][height<={h}]+bestaudio/\
             bestvideo[vcodec^=avc][height<={h}]+bestaudio/\
             bestvideo[vcodec!=vp9][height<={h}]+bestaudio/\
             best[height<={h}]"
        ),
        None => "bestvideo[vcodec^=avc1]+bestaudio/bestvideo[vcodec^=avc]+bestaudio/bestvideo[vcodec!=vp9]+bestaudio/best"
            .to_string(),
    }
}

fn push_format_args(args: &mut Vec<String>, request: &DownloadRequest, for_estimate: bool) {
    if request.selection.is_audio() {
        args.push("-f".into());
        args.push("bestaudio/best".into());
        args.push("-x".into());
        args.push("--audio-format".into());
        args.push(request.audio_container.to_string());
    } else {
        args.push("-f".into());
        args.push(video_format_selector(request.quality.max_height()));
        args.push("--merge-output-format".into());
        args.push("mp4".into());
        if !for_estimate {
            // Force AAC; the downstream editor does not play Opus/Vorbis
            args.push("--audio-format".into());
            args.push("best".into());
            args.push("--postprocessor-args".into());
            args.push("ffmpeg:-c:a aac -b:a 192k".into());
        }
    }
}

fn push_ffmpeg_location(args: &mut Vec<String>, tools: &ToolPaths) {
    if let Some(location) = tools.ffmpeg_location() {
        args.push("--ffmpeg-location".into());
        args.push(location);
    }
}

fn push_section_args(args: &mut Vec<String>, range: Option<&TimeRange>) {
    if let Some(range) = range {
        args.push("--download-sections".into());
        args.push(section_spec(range));
    }
}

/// Full downloader argv for a pipeline run.
pub fn build_download_args(request: &DownloadRequest, tools: &ToolPaths) -> Vec<String> {
    let mut args: Vec<String> = vec![request.url.to_string()];

    push_ffmpeg_location(&mut args, tools);
    push_format_args(&mut args, request, false);

    args.push("--paths".into());
    args.push(request.destination.to_string_lossy().into_owned());
    args.push("-o".into());
    args.push("%(title)s.%(ext)s".into());
    // Portable-safe filenames; still permits non-ASCII
    args.push("--windows-filenames".into());
    args.push("--newline".into());
    args.push("--progress".into());
    args.push("--no-playlist".into());
    // Remote EJS solver scripts for the n-challenge
    args.push("--remote-components".into());
    args.push("ejs:github".into());
    args.push("--embed-metadata".into());
    args.push("--cookies-from-browser".into());
    args.push(request.cookie_browser.clone());
    args.push("--ignore-errors".into());
    // Tolerate intercepting corporate proxies
    args.push("--no-check-certificate".into());

    push_section_args(&mut args, request.time_range.as_ref());

    args
}

/// Downloader argv for the metadata-only size estimation run.
pub fn build_estimate_args(request: &DownloadRequest, tools: &ToolPaths) -> Vec<String> {
    let mut args: Vec<String> = vec![request.url.to_string()];

    push_ffmpeg_location(&mut args, tools);
    push_format_args(&mut args, request, true);

    args.push("--dump-single-json".into());
    args.push("--skip-download".into());
    args.push("--no-playlist".into());
    args.push("--cookies-from-browser".into());
    args.push(request.cookie_browser.clone());
    args.push("--ignore-errors".into());
    args.push("--no-check-certificate".into());

    push_section_args(&mut args, request.time_range.as_ref());

    args
}

/// Transcoder argv for a stream-copy trim (no re-encode).
pub fn build_trim_args(input: &Path, start_secs: u64, end_secs: u64, output: &Path) -> Vec<String> {
    vec![
        "-i".into(),
        input.to_string_lossy().into_owned(),
        "-ss".into(),
        start_secs.to_string(),
        "-t".into(),
        end_secs.saturating_sub(start_secs).to_string(),
        "-c".into(),
        "copy".into(),
        "-y".into(),
        output.to_string_lossy().into_owned(),
    ]
}

/// Transcoder argv for ProRes 422 HQ conversion.
///
/// profile 3 = HQ, apl0 vendor tag and yuv422p10le chroma for editor
/// compatibility, uncompressed 16-bit PCM audio.
pub fn build_prores_args(input: &Path, output: &Path) -> Vec<String> {
    vec![
        "-i".into(),
        input.to_string_lossy().into_owned(),
        "-c:v".into(),
        "prores_ks".into(),
        "-profile:v".into(),
        "3".into(),
        "-vendor".into(),
        "apl0".into(),
        "-pix_fmt".into(),
        "yuv422p10le".into(),
        "-c:a".into(),
        "pcm_s16le".into(),
        "-y".into(),
        output.to_string_lossy().into_owned(),
    ]
}
