//! Optional transcoder stages run after a successful download.
//!
//! Both stages share one policy: a post-processing failure never discards
//! an already-successful download. Callers fall back to the input file on
//! any error here.
//!
//! Trim is a legacy path. Time ranges are normally restricted at download
//! time (`--download-sections`), which is cheaper than fetching the whole
//! asset and cutting it; trim exists for files that are already on disk.

use crate::args;
use crate::pipeline::markers::has_encoder_time_marker;
use crate::progress::{Phase, ProgressEvent, ProgressSender};
use std::path::{Path, PathBuf};
use std::process::Stdio;
use thiserror::Error;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::Command;

/// Errors from the transcoder stages. The pipeline degrades these to the
/// pre-step file; they are never surfaced as run failures.
#[derive(Error, Debug)]
pub enum PostProcessError {
    #[error("ffmpeg failed: {0}")]
    Ffmpeg(String),

    #[error("expected output missing: {}", .0.display())]
    OutputMissing(PathBuf),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Stream-copy trim to `<stem>_trimmed<ext>`.
///
/// Deletes the input on success. No re-encode, so cuts land on the
/// nearest keyframes.
pub async fn trim_stream_copy(
    input: &Path,
    start_secs: u64,
    end_secs: u64,
    ffmpeg: &str,
) -> Result<PathBuf, PostProcessError> {
    let output = sibling_with_suffix(input, "_trimmed");
    let argv = args::build_trim_args(input, start_secs, end_secs, &output);
    log::info!("Trimming {} -> {}", input.display(), output.display());

    let result = Command::new(ffmpeg)
        .args(&argv)
        .stdin(Stdio::null())
        .output()
        .await?;

    if !result.status.success() {
        return Err(PostProcessError::Ffmpeg(
            String::from_utf8_lossy(&result.stderr).trim().to_string(),
        ));
    }
    if !output.exists() {
        return Err(PostProcessError::OutputMissing(output));
    }
    remove_superseded(input);
    Ok(output)
}

/// Re-encode to ProRes 422 HQ in a `.mov` sibling.
///
/// Emits a coarse transcoding progress event on entry and on each encoder
/// time marker, capped below 100 so the final percent stays reserved for
/// pipeline completion. Deletes the input on success.
pub async fn convert_to_prores(
    input: &Path,
    ffmpeg: &str,
    progress: &ProgressSender,
) -> Result<PathBuf, PostProcessError> {
    let output = input.with_extension("mov");
    let argv = args::build_prores_args(input, &output);
    log::info!("Converting to ProRes 422 HQ: {} -> {}", input.display(), output.display());

    let _ = progress.send(ProgressEvent::new(95.0, Phase::Transcoding));

    let mut child = Command::new(ffmpeg)
        .args(&argv)
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .spawn()?;

    let mut stderr_tail: Vec<String> = Vec::new();
    if let Some(stderr) = child.stderr.take() {
        let mut lines = BufReader::new(stderr).lines();
        // The encoder reports position on its diagnostic stream
        while let Ok(Some(line)) = lines.next_line().await {
            log::debug!("ffmpeg: {}", line);
            if has_encoder_time_marker(&line) {
                let _ = progress.send(ProgressEvent::new(96.0, Phase::Transcoding));
            }
            if stderr_tail.len() >= 50 {
                stderr_tail.remove(0);
            }
            stderr_tail.push(line);
        }
    }

    let status = child.wait().await?;
    if !status.success() {
        return Err(PostProcessError::Ffmpeg(stderr_tail.join("\n")));
    }
    if !output.exists() {
        return Err(PostProcessError::OutputMissing(output));
    }
    remove_superseded(input);
    Ok(output)
}

/// Delete a file that a later stage replaced. Failure only logs: the new
/// file is already in place and the run must not fail over cleanup.
fn remove_superseded(path: &Path) {
    if let Err(e) = fs_err::remove_file(path) {
        log::warn!("Failed to delete superseded file {}: {}", path.display(), e);
    }
}

fn sibling_with_suffix(input: &Path, suffix: &str) -> PathBuf {
    let stem = input
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let name = match input.extension() {
        Some(ext) => format!("{stem}{suffix}.{}", ext.to_string_lossy()),
        None => format!("{stem}{suffix}"),
    };
    input.with_file_name(name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use tokio::sync::mpsc;

    #[cfg(unix)]
    fn write_stub(dir: &Path, name: &str, body: &str) -> String {
        use std::os::unix::fs::PermissionsExt;
        let path = dir.join(name);
        std::fs::write(&path, format!("#!/bin/sh\n{body}")).unwrap();
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
        path.to_string_lossy().into_owned()
    }

    #[test]
    fn test_sibling_with_suffix() {
        assert_eq!(
            sibling_with_suffix(Path::new("/tmp/clip.mp4"), "_trimmed"),
            PathBuf::from("/tmp/clip_trimmed.mp4")
        );
        assert_eq!(
            sibling_with_suffix(Path::new("/tmp/noext"), "_trimmed"),
            PathBuf::from("/tmp/noext_trimmed")
        );
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_trim_failure_keeps_input() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("clip.mp4");
        std::fs::write(&input, b"video").unwrap();

        let err = trim_stream_copy(&input, 0, 10, "false").await.unwrap_err();
        assert!(matches!(err, PostProcessError::Ffmpeg(_)));
        assert!(input.exists());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_trim_success_replaces_input() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("clip.mp4");
        std::fs::write(&input, b"video").unwrap();
        // Stub ffmpeg: create the output file (last argument) and exit 0
        let stub = write_stub(dir.path(), "ffmpeg", "for last; do :; done\ntouch \"$last\"\n");

        let trimmed = trim_stream_copy(&input, 30, 90, &stub).await.unwrap();
        assert_eq!(trimmed, dir.path().join("clip_trimmed.mp4"));
        assert!(trimmed.exists());
        assert!(!input.exists());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_prores_failure_keeps_input() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("clip.mp4");
        std::fs::write(&input, b"video").unwrap();
        let (tx, _rx) = mpsc::unbounded_channel();

        let err = convert_to_prores(&input, "false", &tx).await.unwrap_err();
        assert!(matches!(err, PostProcessError::Ffmpeg(_)));
        assert!(input.exists());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_prores_success_emits_progress_and_replaces_input() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("clip.mp4");
        std::fs::write(&input, b"video").unwrap();
        let stub = write_stub(
            dir.path(),
            "ffmpeg",
            concat!(
                "echo 'frame= 10 time=00:00:01.00 bitrate=1000k' 1>&2\n",
                "for last; do :; done\ntouch \"$last\"\n"
            ),
        );
        let (tx, mut rx) = mpsc::unbounded_channel();

        let converted = convert_to_prores(&input, &stub, &tx).await.unwrap();
        assert_eq!(converted, dir.path().join("clip.mov"));
        assert!(!input.exists());

        let mut events = Vec::new();
        while let Ok(event) = rx.try_recv() {
            events.push(event);
        }
        assert!(events.contains(&ProgressEvent::new(95.0, Phase::Transcoding)));
        assert!(events.contains(&ProgressEvent::new(96.0, Phase::Transcoding)));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_prores_missing_output_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("clip.mp4");
        std::fs::write(&input, b"video").unwrap();
        // Exits 0 without producing anything
        let stub = write_stub(dir.path(), "ffmpeg", "exit 0\n");
        let (tx, _rx) = mpsc::unbounded_channel();

        let err = convert_to_prores(&input, &stub, &tx).await.unwrap_err();
        assert!(matches!(err, PostProcessError::OutputMissing(_)));
        assert!(input.exists());
    }
}
