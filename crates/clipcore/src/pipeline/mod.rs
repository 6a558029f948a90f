//! The download orchestrator.
//!
//! Spawns the downloader subprocess, streams its output line by line,
//! refines the output-file hypothesis from markers, and reconciles the
//! final file on exit. One call to [`run`] is one pipeline run: a single
//! subprocess at a time, sequential post-processing, cooperative
//! cancellation through a caller-held token.

pub mod hypothesis;
pub mod markers;
pub mod reconcile;

use crate::args;
use crate::error::{PipelineError, PipelineResult};
use crate::postprocess;
use crate::progress::{Phase, ProgressEvent, ProgressSender};
use crate::request::{CodecTarget, DownloadRequest};
use crate::tools;
use hypothesis::OutputHypothesis;
use markers::Marker;
use std::collections::VecDeque;
use std::path::PathBuf;
use std::process::Stdio;
use std::sync::{Arc, Mutex};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::{Child, Command};
use tokio_util::sync::CancellationToken;

/// Lines of diagnostic output retained for failure messages.
const STDERR_TAIL_LINES: usize = 200;

/// Lifecycle of one run. `Streaming` is re-entered for every output line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display)]
#[strum(serialize_all = "snake_case")]
pub enum RunState {
    Idle,
    Spawned,
    Streaming,
    Succeeded,
    Failed,
    Cancelled,
}

/// Terminal result of a run, consumed once by the caller.
///
/// `file` is None when the downloader succeeded but neither the markers
/// nor the directory scan produced an existing file. That is a valid
/// outcome, not an error.
#[derive(Debug)]
pub struct PipelineOutcome {
    pub file: Option<PathBuf>,
}

/// Run the full download-and-postprocess pipeline for one request.
///
/// Progress events are delivered to `progress`; dropping the receiver
/// only silences them. Cancellation is wired to the downloader
/// subprocess: once post-processing has started it runs to completion.
///
/// # Errors
///
/// Hard failures only: spawn errors, non-zero downloader exit (with the
/// captured diagnostic tail), cancellation, IO. Post-processing failures
/// degrade to the pre-step file and still succeed.
pub async fn run(
    request: &DownloadRequest,
    progress: ProgressSender,
    cancel: CancellationToken,
) -> PipelineResult<PipelineOutcome> {
    fs_err::create_dir_all(&request.destination)?;

    let tools = tools::resolve_tools(&request.overrides);
    let argv = args::build_download_args(request, &tools);
    log::debug!("Downloader argv: {} {}", tools.ytdlp, argv.join(" "));

    let mut command = Command::new(&tools.ytdlp);
    command
        .args(&argv)
        .current_dir(&request.destination)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);
    if let Some(path_var) =
        tools::augment_search_path(std::env::var("PATH").ok().as_deref(), &tools.extra_path_dirs)
    {
        command.env("PATH", path_var);
    }

    log::info!("Starting download: {}", request.url);
    let mut child = command.spawn().map_err(|source| PipelineError::Spawn {
        tool: tools.ytdlp.clone(),
        source,
    })?;
    log::debug!("pipeline state: {}", RunState::Spawned);

    // stderr carries progress chatter for this tool family, not just
    // errors; keep a bounded tail for failure messages only.
    let stderr_tail = Arc::new(Mutex::new(VecDeque::<String>::new()));
    let mut stderr_reader = None;
    if let Some(stderr) = child.stderr.take() {
        let tail = Arc::clone(&stderr_tail);
        stderr_reader = Some(tokio::spawn(async move {
            let mut lines = BufReader::new(stderr).lines();
            while let Ok(Some(line)) = lines.next_line().await {
                log::debug!("yt-dlp stderr: {}", line);
                if let Ok(mut tail) = tail.lock() {
                    if tail.len() >= STDERR_TAIL_LINES {
                        tail.pop_front();
                    }
                    tail.push_back(line);
                }
            }
        }));
    }

    let mut hyp = OutputHypothesis::new();
    if let Some(stdout) = child.stdout.take() {
        let mut lines = BufReader::new(stdout).lines();
        loop {
            let line = tokio::select! {
                _ = cancel.cancelled() => return cancel_run(&mut child).await,
                line = lines.next_line() => line?,
            };
            let Some(line) = line else { break };
            log::debug!("yt-dlp stdout: {}", line);
            for marker in markers::classify(&line) {
                apply_marker(marker, &mut hyp, request, &progress);
            }
        }
    }

    let status = tokio::select! {
        _ = cancel.cancelled() => return cancel_run(&mut child).await,
        status = child.wait() => status?,
    };

    // A kill racing with a normal exit still counts as cancelled
    if cancel.is_cancelled() {
        log::debug!("pipeline state: {}", RunState::Cancelled);
        return Err(PipelineError::Cancelled);
    }

    if !status.success() {
        log::debug!("pipeline state: {}", RunState::Failed);
        // Process exit closes the pipe, so the reader joins promptly;
        // without the join the tail can still be mid-flight here.
        if let Some(reader) = stderr_reader {
            let _ = reader.await;
        }
        let stderr = stderr_tail
            .lock()
            .map(|mut tail| tail.make_contiguous().join("\n"))
            .unwrap_or_default();
        return Err(PipelineError::ToolExit {
            tool: tools.ytdlp.clone(),
            code: status.code(),
            stderr,
        });
    }

    let resolved = reconcile_output(hyp, request);
    let resolved = maybe_transcode(resolved, request, &tools.ffmpeg, &progress).await;

    log::debug!("pipeline state: {}", RunState::Succeeded);
    match &resolved {
        Some(file) => log::info!("Download complete: {}", file.display()),
        None => log::warn!("Download complete but no output file was resolved"),
    }
    Ok(PipelineOutcome { file: resolved })
}

async fn cancel_run(child: &mut Child) -> PipelineResult<PipelineOutcome> {
    log::info!("Download cancelled, terminating subprocess");
    let _ = child.kill().await;
    log::debug!("pipeline state: {}", RunState::Cancelled);
    Err(PipelineError::Cancelled)
}

fn apply_marker(
    marker: Marker,
    hyp: &mut OutputHypothesis,
    request: &DownloadRequest,
    progress: &ProgressSender,
) {
    let dest = &request.destination;
    match marker {
        Marker::Percent(percent) => {
            let _ = progress.send(ProgressEvent::new(percent, Phase::Downloading));
        }
        Marker::MergingFormats => {
            let _ = progress.send(ProgressEvent::new(95.0, Phase::Merging));
        }
        Marker::DeletingOriginal => {
            let _ = progress.send(ProgressEvent::new(98.0, Phase::Finalizing));
        }
        Marker::Destination(raw) => hyp.observe_destination(dest, &raw),
        Marker::MergedInto(raw) => hyp.observe_merged(dest, &raw),
        Marker::ExtractedAudio(raw) => hyp.observe_extracted_audio(dest, &raw),
        Marker::Completed(raw) => hyp.observe_completed(dest, &raw),
    }
}

/// Existence-check the hypothesis, falling back to the directory scan.
fn reconcile_output(hyp: OutputHypothesis, request: &DownloadRequest) -> Option<PathBuf> {
    match hyp.into_inner() {
        Some(path) if path.exists() => Some(path),
        other => {
            if let Some(path) = &other {
                log::warn!(
                    "Captured file missing on disk ({}), scanning directory",
                    path.display()
                );
            } else {
                log::warn!("No output file captured from markers, scanning directory");
            }
            reconcile::find_latest_media_file(&request.destination)
        }
    }
}

/// ProRes conversion for video requests that asked for it; failure keeps
/// the downloaded file.
async fn maybe_transcode(
    resolved: Option<PathBuf>,
    request: &DownloadRequest,
    ffmpeg: &str,
    progress: &ProgressSender,
) -> Option<PathBuf> {
    let Some(file) = resolved else { return None };
    if request.codec != CodecTarget::Prores || request.selection.is_audio() {
        return Some(file);
    }
    match postprocess::convert_to_prores(&file, ffmpeg, progress).await {
        Ok(converted) => Some(converted),
        Err(e) => {
            log::warn!("ProRes conversion failed, keeping original: {}", e);
            Some(file)
        }
    }
}
