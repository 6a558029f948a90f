//! Progress reporting types.
//!
//! Events are emitted to a caller-supplied channel and never stored.
//! Percent values are not guaranteed monotonic: the downloader restarts
//! its counter per stream (video, then audio), and the fixed merge and
//! finalize checkpoints can arrive after a 100% line.

use tokio::sync::mpsc;

/// Pipeline phase attached to each progress event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display)]
#[strum(serialize_all = "snake_case")]
pub enum Phase {
    Downloading,
    Merging,
    Finalizing,
    Transcoding,
}

/// Progress information emitted during a pipeline run.
#[derive(Debug, Clone, PartialEq)]
pub struct ProgressEvent {
    /// Progress percentage (clamped to 0-100)
    pub percent: f32,
    /// Current pipeline phase
    pub phase: Phase,
}

impl ProgressEvent {
    pub fn new(percent: f32, phase: Phase) -> Self {
        Self {
            percent: percent.clamp(0.0, 100.0),
            phase,
        }
    }
}

/// Channel used to deliver progress events to the caller.
pub type ProgressSender = mpsc::UnboundedSender<ProgressEvent>;
