//! Line classifier for the downloader's text output.
//!
//! This is the intentionally fragile adapter between yt-dlp's log grammar
//! and the orchestrator. It is kept free of I/O so it can be tested
//! against captured transcripts. Markers are non-exclusive: one line can
//! produce several (a progress line may also announce a destination).

use lazy_regex::{regex, regex_captures};

/// A recognized signal within one line of downloader output.
#[derive(Debug, Clone, PartialEq)]
pub enum Marker {
    /// A bare percentage figure
    Percent(f32),
    /// The merge post-processor started
    MergingFormats,
    /// Intermediate files are being removed
    DeletingOriginal,
    /// `[download] Destination: <path>` — where a stream starts writing
    Destination(String),
    /// `[Merger] Merging formats into "<path>"` — the definitive merged output
    MergedInto(String),
    /// `[ExtractAudio] Destination: <path>` — the definitive audio output
    ExtractedAudio(String),
    /// `[download] <path> has been downloaded` — a completed (possibly cached) file
    Completed(String),
}

/// Scan one line for all markers it carries.
pub fn classify(line: &str) -> Vec<Marker> {
    let mut markers = Vec::new();

    if let Some((_, digits)) = regex_captures!(r"(\d+\.?\d*)%", line) {
        if let Ok(percent) = digits.parse::<f32>() {
            markers.push(Marker::Percent(percent));
        }
    }

    if line.contains("Merging formats") {
        markers.push(Marker::MergingFormats);
    }

    if line.contains("Deleting original file") {
        markers.push(Marker::DeletingOriginal);
    }

    if let Some((_, path)) = regex_captures!(r"\[download\] Destination: (.+)", line) {
        markers.push(Marker::Destination(path.trim().to_string()));
    }

    if let Some((_, path)) = regex_captures!(r#"\[Merger\] Merging formats into "(.+)""#, line) {
        markers.push(Marker::MergedInto(path.to_string()));
    }

    if let Some((_, path)) = regex_captures!(r"\[ExtractAudio\] Destination: (.+)", line) {
        markers.push(Marker::ExtractedAudio(path.trim().to_string()));
    }

    if let Some((_, path)) = regex_captures!(r"\[download\] (.+) has been downloaded", line) {
        markers.push(Marker::Completed(path.trim().to_string()));
    }

    markers
}

/// Whether an ffmpeg diagnostic line carries an encoder time marker
/// (`time=HH:MM:SS`), used for coarse transcode progress.
pub fn has_encoder_time_marker(line: &str) -> bool {
    regex!(r"time=\d{2}:\d{2}:\d{2}").is_match(line)
}
