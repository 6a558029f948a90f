//! The orchestrator's best guess at the produced file.
//!
//! Owned by one in-flight run, never shared. Refined by markers under a
//! specificity rule: a merge or audio-extraction announcement is
//! definitive and overwrites anything, while a plain destination line
//! never displaces an already-known merged (.mp4) result.

use std::path::{Path, PathBuf};

#[derive(Debug, Default)]
pub struct OutputHypothesis {
    current: Option<PathBuf>,
}

impl OutputHypothesis {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn current(&self) -> Option<&Path> {
        self.current.as_deref()
    }

    pub fn into_inner(self) -> Option<PathBuf> {
        self.current
    }

    /// `[download] Destination:` — set unless a merged result is already known.
    pub fn observe_destination(&mut self, destination: &Path, raw: &str) {
        if !self.current_is_merged() {
            self.current = Some(join_basename(destination, raw));
        }
    }

    /// `[Merger] Merging formats into` — definitive, always overwrites.
    pub fn observe_merged(&mut self, destination: &Path, raw: &str) {
        self.current = Some(join_basename(destination, raw));
    }

    /// `[ExtractAudio] Destination:` — definitive for audio runs, always overwrites.
    pub fn observe_extracted_audio(&mut self, destination: &Path, raw: &str) {
        self.current = Some(join_basename(destination, raw));
    }

    /// `has been downloaded` — fills a gap, or upgrades to a merged container.
    pub fn observe_completed(&mut self, destination: &Path, raw: &str) {
        let candidate = join_basename(destination, raw);
        if self.current.is_none() || is_merged_container(&candidate) {
            self.current = Some(candidate);
        }
    }

    fn current_is_merged(&self) -> bool {
        self.current.as_deref().is_some_and(is_merged_container)
    }
}

/// Marker paths may be relative or carry temp subdirectories; only the
/// basename is trusted, joined onto the known destination directory.
fn join_basename(destination: &Path, raw: &str) -> PathBuf {
    match Path::new(raw).file_name() {
        Some(name) => destination.join(name),
        None => destination.join(raw),
    }
}

fn is_merged_container(path: &Path) -> bool {
    path.extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("mp4"))
}
