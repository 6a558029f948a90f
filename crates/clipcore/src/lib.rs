//! Core engine for clipdeck: media download and conversion built on
//! external yt-dlp and ffmpeg processes.
//!
//! The entry points are [`pipeline::run`] for a full download and
//! [`estimate::estimate_download_size`] for a metadata-only size probe.
//! Requests are assembled with [`DownloadRequestBuilder`]; progress flows
//! back over an unbounded channel of [`ProgressEvent`]s and a
//! `CancellationToken` aborts an in-flight run.

pub mod args;
pub mod config;
pub mod error;
pub mod estimate;
pub mod pipeline;
pub mod postprocess;
pub mod progress;
pub mod request;
pub mod tools;

pub use error::{PipelineError, PipelineResult};
pub use estimate::{estimate_download_size, SizeEstimate};
pub use pipeline::{run, PipelineOutcome};
pub use progress::{Phase, ProgressEvent, ProgressSender};
pub use request::{
    AudioContainer, CodecTarget, DownloadRequest, DownloadRequestBuilder, MediaSelection,
    QualityTier, TimeRange, ToolOverrides,
};
