//! Directory-scan fallback for the final file.
//!
//! When the marker-derived hypothesis does not exist on disk (non-ASCII
//! titles can fail to round-trip through the log text), the newest media
//! file in the destination directory is taken instead.

use std::cmp::Reverse;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

/// Extensions considered when scanning for the produced file.
const MEDIA_EXTENSIONS: &[&str] = &["mp4", "mov", "mkv", "webm", "mp3", "m4a", "wav"];

/// Tie-break for identical modification times: a transcoded .mov beats
/// the merged .mp4 it was derived from, which beats everything else.
fn extension_priority(ext: &str) -> u8 {
    match ext {
        "mov" => 0,
        "mp4" => 1,
        _ => 2,
    }
}

/// Newest media file in `directory`, or None when the scan finds nothing.
pub fn find_latest_media_file(directory: &Path) -> Option<PathBuf> {
    let entries = match fs_err::read_dir(directory) {
        Ok(entries) => entries,
        Err(e) => {
            log::warn!("Reconciliation scan failed: {}", e);
            return None;
        }
    };

    let mut candidates: Vec<(PathBuf, SystemTime, u8)> = Vec::new();
    for entry in entries.flatten() {
        let path = entry.path();
        let Some(ext) = path
            .extension()
            .map(|e| e.to_string_lossy().to_lowercase())
        else {
            continue;
        };
        if !MEDIA_EXTENSIONS.contains(&ext.as_str()) {
            continue;
        }
        let Ok(modified) = entry.metadata().and_then(|m| m.modified()) else {
            continue;
        };
        candidates.push((path, modified, extension_priority(&ext)));
    }

    candidates.sort_by_key(|(_, modified, priority)| (Reverse(*modified), *priority));

    if let Some((path, _, _)) = candidates.first() {
        log::info!("Reconciliation scan selected: {}", path.display());
    } else {
        log::warn!("Reconciliation scan found no media files in {}", directory.display());
    }

    candidates.into_iter().next().map(|(path, _, _)| path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::fs;
    use std::time::Duration;

    // Timestamps are passed in, not computed per file: a tie must be an
    // exact SystemTime match, and two now() calls never are.
    fn create_with_mtime(dir: &Path, name: &str, mtime: SystemTime) -> PathBuf {
        let path = dir.join(name);
        fs::write(&path, b"x").unwrap();
        let file = fs::OpenOptions::new().write(true).open(&path).unwrap();
        file.set_modified(mtime).unwrap();
        path
    }

    fn ago(secs: u64) -> SystemTime {
        SystemTime::now() - Duration::from_secs(secs)
    }

    #[test]
    fn test_newest_file_wins() {
        let dir = tempfile::tempdir().unwrap();
        create_with_mtime(dir.path(), "x.mkv", ago(300));
        create_with_mtime(dir.path(), "y.mov", ago(200));
        let newest = create_with_mtime(dir.path(), "z.mp4", ago(100));
        assert_eq!(find_latest_media_file(dir.path()), Some(newest));
    }

    #[test]
    fn test_mov_wins_tie_break() {
        let dir = tempfile::tempdir().unwrap();
        let shared = ago(100);
        create_with_mtime(dir.path(), "x.mkv", ago(300));
        let mov = create_with_mtime(dir.path(), "y.mov", shared);
        create_with_mtime(dir.path(), "z.mp4", shared);
        assert_eq!(find_latest_media_file(dir.path()), Some(mov));
    }

    #[test]
    fn test_strictly_newer_beats_tie_break() {
        let dir = tempfile::tempdir().unwrap();
        create_with_mtime(dir.path(), "y.mov", ago(200));
        let mp4 = create_with_mtime(dir.path(), "z.mp4", ago(100));
        assert_eq!(find_latest_media_file(dir.path()), Some(mp4));
    }

    #[test]
    fn test_non_media_files_ignored() {
        let dir = tempfile::tempdir().unwrap();
        create_with_mtime(dir.path(), "notes.txt", ago(50));
        create_with_mtime(dir.path(), "clip.part", ago(10));
        let wav = create_with_mtime(dir.path(), "track.wav", ago(100));
        assert_eq!(find_latest_media_file(dir.path()), Some(wav));
    }

    #[test]
    fn test_empty_directory() {
        let dir = tempfile::tempdir().unwrap();
        assert_eq!(find_latest_media_file(dir.path()), None);
    }

    #[test]
    fn test_missing_directory() {
        assert_eq!(find_latest_media_file(Path::new("/no/such/dir")), None);
    }

    #[test]
    fn test_extension_case_insensitive() {
        let dir = tempfile::tempdir().unwrap();
        let upper = create_with_mtime(dir.path(), "CLIP.MP4", ago(100));
        assert_eq!(find_latest_media_file(dir.path()), Some(upper));
    }
}
