//! Configuration read from the environment, once at startup.

use once_cell::sync::Lazy;
use std::env;
use std::path::PathBuf;

/// Explicit yt-dlp binary path
/// Read from CLIPDECK_YTDLP; when unset, resolution falls back to the
/// auto-detected config file and platform well-known locations
pub static YTDLP_OVERRIDE: Lazy<Option<String>> = Lazy::new(|| env::var("CLIPDECK_YTDLP").ok());

/// Explicit ffmpeg binary path (a directory containing ffmpeg also works)
/// Read from CLIPDECK_FFMPEG
pub static FFMPEG_OVERRIDE: Lazy<Option<String>> = Lazy::new(|| env::var("CLIPDECK_FFMPEG").ok());

/// Explicit deno binary path; its directory is added to the subprocess
/// search path so yt-dlp can find the JS runtime for challenge solving
/// Read from CLIPDECK_DENO
pub static DENO_OVERRIDE: Lazy<Option<String>> = Lazy::new(|| env::var("CLIPDECK_DENO").ok());

/// Browser to extract cookies from for authentication
/// Read from CLIPDECK_COOKIE_BROWSER
/// Supported: firefox, chrome, safari, brave, chromium, edge, opera, vivaldi
pub static COOKIE_BROWSER: Lazy<String> =
    Lazy::new(|| env::var("CLIPDECK_COOKIE_BROWSER").unwrap_or_else(|_| "firefox".to_string()));

/// Default download directory when a request does not name one
/// Read from CLIPDECK_DOWNLOAD_DIR, supports tilde (~) expansion
pub static DOWNLOAD_DIR: Lazy<String> = Lazy::new(|| {
    env::var("CLIPDECK_DOWNLOAD_DIR").unwrap_or_else(|_| {
        #[cfg(target_os = "macos")]
        {
            "~/Movies/clipdeck".to_string()
        }
        #[cfg(not(target_os = "macos"))]
        {
            "~/downloads/clipdeck".to_string()
        }
    })
});

/// Path to the auto-detected tool paths document (JSON)
/// Read from CLIPDECK_TOOLS_CONFIG
/// Absence of the file is non-fatal; every key has a fallback
pub static TOOLS_CONFIG: Lazy<String> =
    Lazy::new(|| env::var("CLIPDECK_TOOLS_CONFIG").unwrap_or_else(|_| "config.json".to_string()));

/// Default download directory with tilde expansion applied.
pub fn download_dir() -> PathBuf {
    PathBuf::from(shellexpand::tilde(&*DOWNLOAD_DIR).into_owned())
}
