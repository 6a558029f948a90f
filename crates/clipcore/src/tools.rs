//! Tool location and subprocess environment preparation.
//!
//! Resolves the yt-dlp and ffmpeg executables with strict priority:
//! explicit override, then the persisted auto-detected config document,
//! then platform well-known install locations, then the bare command name
//! (PATH lookup by the OS). Also computes the extra search-path directories
//! merged into the subprocess environment so yt-dlp can itself locate
//! ffmpeg and the deno JS runtime.
//!
//! Everything here is read-only: existence checks, no writes.

use crate::config;
use crate::request::ToolOverrides;
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Auto-detected tool paths persisted by the installer/settings flow.
///
/// All keys are optional; a missing file parses as the default.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AutoConfig {
    pub yt_dlp_path: Option<String>,
    pub ffmpeg_path: Option<String>,
    pub deno_path: Option<String>,
    pub node_path: Option<String>,
    pub python_path: Option<String>,
}

impl AutoConfig {
    /// Load from a JSON file. Absence or a parse failure is non-fatal and
    /// yields the empty config.
    pub fn load(path: &str) -> Self {
        if !Path::new(path).exists() {
            return Self::default();
        }
        match fs_err::read_to_string(path) {
            Ok(raw) => Self::from_json(&raw),
            Err(e) => {
                log::warn!("Failed to read tools config {}: {}", path, e);
                Self::default()
            }
        }
    }

    pub fn from_json(raw: &str) -> Self {
        serde_json::from_str(raw).unwrap_or_else(|e| {
            log::warn!("Failed to parse tools config: {}", e);
            Self::default()
        })
    }
}

/// Resolved executable references plus the extra search-path directories
/// for the subprocess environment. Computed once per request, never cached
/// across requests (tool locations may change between runs).
#[derive(Debug, Clone)]
pub struct ToolPaths {
    pub ytdlp: String,
    pub ffmpeg: String,
    pub extra_path_dirs: Vec<PathBuf>,
}

impl ToolPaths {
    /// Directory passed to the downloader via `--ffmpeg-location`, when
    /// the ffmpeg reference carries one.
    pub fn ffmpeg_location(&self) -> Option<String> {
        let parent = Path::new(&self.ffmpeg).parent()?;
        let dir = parent.to_string_lossy();
        if dir.is_empty() || dir == "." {
            None
        } else {
            Some(dir.into_owned())
        }
    }
}

/// Resolve both tools and the augmented search path for one request.
pub fn resolve_tools(overrides: &ToolOverrides) -> ToolPaths {
    let auto = AutoConfig::load(&config::TOOLS_CONFIG);
    resolve_tools_with(overrides, &auto)
}

pub fn resolve_tools_with(overrides: &ToolOverrides, auto: &AutoConfig) -> ToolPaths {
    let ytdlp_override = overrides
        .ytdlp
        .as_deref()
        .or(config::YTDLP_OVERRIDE.as_deref());
    let ffmpeg_override = overrides
        .ffmpeg
        .as_deref()
        .or(config::FFMPEG_OVERRIDE.as_deref());
    let deno_override = overrides
        .deno
        .as_deref()
        .or(config::DENO_OVERRIDE.as_deref());

    let ytdlp = resolve_ytdlp(ytdlp_override, auto);
    let ffmpeg = resolve_ffmpeg(ffmpeg_override, auto);
    let extra_path_dirs = candidate_search_dirs(deno_override, auto);

    log::debug!(
        "Resolved tools: yt-dlp={}, ffmpeg={}, extra dirs={}",
        ytdlp,
        ffmpeg,
        extra_path_dirs.len()
    );

    ToolPaths {
        ytdlp,
        ffmpeg,
        extra_path_dirs,
    }
}

/// Resolve the yt-dlp executable reference.
pub fn resolve_ytdlp(override_path: Option<&str>, auto: &AutoConfig) -> String {
    if let Some(p) = non_empty(override_path) {
        return p.to_string();
    }
    if let Some(p) = non_empty(auto.yt_dlp_path.as_deref()) {
        return p.to_string();
    }
    if let Some(p) = first_existing(&well_known_ytdlp_paths()) {
        log::info!("Found yt-dlp at: {}", p);
        return p;
    }
    log::debug!("Using yt-dlp from the system PATH");
    "yt-dlp".to_string()
}

/// Resolve the ffmpeg executable reference, normalizing a configured
/// directory into the contained binary.
pub fn resolve_ffmpeg(override_path: Option<&str>, auto: &AutoConfig) -> String {
    let raw = non_empty(override_path)
        .map(str::to_string)
        .or_else(|| non_empty(auto.ffmpeg_path.as_deref()).map(str::to_string))
        .or_else(|| first_existing(&well_known_ffmpeg_paths()))
        .unwrap_or_else(|| "ffmpeg".to_string());
    normalize_ffmpeg_executable(&raw)
}

/// Accepts either a direct binary path or a directory containing ffmpeg.
pub fn normalize_ffmpeg_executable(value: &str) -> String {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return "ffmpeg".to_string();
    }
    let path = Path::new(trimmed);
    if path.is_dir() {
        return path.join(ffmpeg_binary_name()).to_string_lossy().into_owned();
    }
    trimmed.to_string()
}

fn ffmpeg_binary_name() -> &'static str {
    if cfg!(windows) {
        "ffmpeg.exe"
    } else {
        "ffmpeg"
    }
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

fn first_existing(candidates: &[PathBuf]) -> Option<String> {
    candidates
        .iter()
        .find(|p| p.exists())
        .map(|p| p.to_string_lossy().into_owned())
}

fn expand(path: &str) -> PathBuf {
    PathBuf::from(shellexpand::tilde(path).into_owned())
}

#[cfg(target_os = "macos")]
fn well_known_ytdlp_paths() -> Vec<PathBuf> {
    vec![
        PathBuf::from("/opt/homebrew/bin/yt-dlp"),
        PathBuf::from("/usr/local/bin/yt-dlp"),
        PathBuf::from("/usr/bin/yt-dlp"),
    ]
}

#[cfg(windows)]
fn well_known_ytdlp_paths() -> Vec<PathBuf> {
    let mut paths = Vec::new();
    // Python pip installs land in per-version Scripts directories
    for version in ["314", "313", "312", "311", "310"] {
        paths.push(expand(&format!(
            "~/AppData/Local/Programs/Python/Python{version}/Scripts/yt-dlp.exe"
        )));
    }
    for version in ["314", "313", "312", "311"] {
        paths.push(expand(&format!(
            "~/AppData/Roaming/Python/Python{version}/Scripts/yt-dlp.exe"
        )));
    }
    for version in ["314", "313", "312", "311"] {
        paths.push(PathBuf::from(format!(
            "C:\\Python{version}\\Scripts\\yt-dlp.exe"
        )));
    }
    paths
}

#[cfg(not(any(target_os = "macos", windows)))]
fn well_known_ytdlp_paths() -> Vec<PathBuf> {
    Vec::new()
}

#[cfg(target_os = "macos")]
fn well_known_ffmpeg_paths() -> Vec<PathBuf> {
    vec![
        PathBuf::from("/opt/homebrew/bin/ffmpeg"),
        PathBuf::from("/usr/local/bin/ffmpeg"),
        PathBuf::from("/usr/bin/ffmpeg"),
    ]
}

#[cfg(windows)]
fn well_known_ffmpeg_paths() -> Vec<PathBuf> {
    vec![
        expand("~/multi-downloader-nx/ffmpeg.exe"),
        PathBuf::from("C:\\ffmpeg\\bin\\ffmpeg.exe"),
        PathBuf::from("C:\\Program Files\\ffmpeg\\bin\\ffmpeg.exe"),
        expand("~/AppData/Local/Programs/ffmpeg/bin/ffmpeg.exe"),
    ]
}

#[cfg(not(any(target_os = "macos", windows)))]
fn well_known_ffmpeg_paths() -> Vec<PathBuf> {
    Vec::new()
}

/// Candidate directories for the subprocess search path, filtered to those
/// that exist. An empty result means the inherited environment is used
/// unchanged; never an error.
pub fn candidate_search_dirs(deno_override: Option<&str>, auto: &AutoConfig) -> Vec<PathBuf> {
    let mut candidates: Vec<PathBuf> = Vec::new();

    if let Some(deno) = non_empty(deno_override) {
        if let Some(dir) = Path::new(deno).parent() {
            candidates.push(dir.to_path_buf());
        }
    }

    if cfg!(windows) {
        candidates.push(expand("~/.deno/bin"));
        candidates.push(expand("~/AppData/Local/Microsoft/WindowsApps"));
        candidates.push(expand("~/multi-downloader-nx"));
        candidates.push(PathBuf::from("C:\\Program Files\\ffmpeg\\bin"));
        candidates.push(PathBuf::from("C:\\ffmpeg\\bin"));
        for configured in [&auto.deno_path, &auto.node_path, &auto.python_path] {
            if let Some(p) = non_empty(configured.as_deref()) {
                if let Some(dir) = Path::new(p).parent() {
                    candidates.push(dir.to_path_buf());
                }
            }
        }
    } else {
        candidates.push(PathBuf::from("/opt/homebrew/bin"));
        candidates.push(PathBuf::from("/usr/local/bin"));
        candidates.push(expand("~/.deno/bin"));
        candidates.push(PathBuf::from("/usr/bin"));
        candidates.push(PathBuf::from("/bin"));
        candidates.push(PathBuf::from("/usr/sbin"));
        candidates.push(PathBuf::from("/sbin"));
    }

    candidates.retain(|p| p.is_dir());
    candidates
}

/// Prepend the given directories to an inherited PATH value.
///
/// Pure function: no filesystem access and no mutation of shared state,
/// so concurrent runs each compute their own copy. Returns None when
/// there is nothing to add (pass the environment through unchanged).
pub fn augment_search_path(existing: Option<&str>, dirs: &[PathBuf]) -> Option<String> {
    if dirs.is_empty() {
        return None;
    }
    let separator = if cfg!(windows) { ";" } else { ":" };
    let prefix = dirs
        .iter()
        .map(|p| p.to_string_lossy().into_owned())
        .collect::<Vec<_>>()
        .join(separator);
    match existing {
        Some(path) if !path.is_empty() => Some(format!("{prefix}{separator}{path}")),
        _ => Some(prefix),
    }
}
