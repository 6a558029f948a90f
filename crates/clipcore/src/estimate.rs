//! Download size estimation.
//!
//! A read-only variant of the pipeline: the downloader is asked for a
//! single JSON metadata document (`--dump-single-json --skip-download`),
//! no media bytes move. The tool interleaves log lines with the payload,
//! so JSON recovery is deliberately forgiving. An estimate that cannot be
//! derived is reported as unknown, never fabricated.

use crate::args;
use crate::error::{PipelineError, PipelineResult};
use crate::request::{DownloadRequest, TimeRange};
use crate::tools;
use serde_json::Value;
use std::process::Stdio;
use tokio::process::Command;

/// Result of a size estimation run.
///
/// `bytes: None` means the size could not be determined; that is a normal
/// outcome for live or DRM-gated sources.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SizeEstimate {
    pub bytes: Option<u64>,
    pub duration_secs: Option<f64>,
}

/// Estimate the download size for a request without transferring media.
///
/// # Errors
///
/// Only when the downloader itself cannot be spawned or exits non-zero;
/// every parse or extraction failure resolves to an unknown estimate.
pub async fn estimate_download_size(request: &DownloadRequest) -> PipelineResult<SizeEstimate> {
    let tools = tools::resolve_tools(&request.overrides);
    let argv = args::build_estimate_args(request, &tools);
    log::debug!("Estimator argv: {} {}", tools.ytdlp, argv.join(" "));

    let mut command = Command::new(&tools.ytdlp);
    command
        .args(&argv)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped());
    if let Some(path_var) =
        tools::augment_search_path(std::env::var("PATH").ok().as_deref(), &tools.extra_path_dirs)
    {
        command.env("PATH", path_var);
    }

    let output = command.output().await.map_err(|source| PipelineError::Spawn {
        tool: tools.ytdlp.clone(),
        source,
    })?;

    if !output.status.success() {
        return Err(PipelineError::ToolExit {
            tool: tools.ytdlp.clone(),
            code: output.status.code(),
            stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
        });
    }

    let stdout = String::from_utf8_lossy(&output.stdout);
    let Some(info) = parse_metadata_json(&stdout) else {
        log::warn!("No JSON payload recovered from estimator output");
        return Ok(SizeEstimate::default());
    };

    Ok(estimate_from_info(&info, request.time_range.as_ref()))
}

/// Derive the estimate from a recovered metadata document.
pub(crate) fn estimate_from_info(info: &Value, range: Option<&TimeRange>) -> SizeEstimate {
    let duration = info
        .get("duration")
        .and_then(Value::as_f64)
        .filter(|d| d.is_finite() && *d > 0.0);

    let mut bytes = extract_estimated_bytes(info);
    if let (Some(b), Some(d), Some(range)) = (bytes, duration, range) {
        bytes = Some(scale_for_range(b, d, range));
    }

    SizeEstimate {
        bytes: bytes.filter(|b| *b > 0),
        duration_secs: duration,
    }
}

/// Recover a JSON document from output that may interleave log lines.
///
/// Whole-buffer parse first, then the last line that starts with `{`,
/// then the substring between the first `{` and the last `}`.
pub(crate) fn parse_metadata_json(raw: &str) -> Option<Value> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }

    if let Ok(value) = serde_json::from_str(trimmed) {
        return Some(value);
    }

    for line in trimmed.lines().rev() {
        let line = line.trim();
        if !line.starts_with('{') {
            continue;
        }
        if let Ok(value) = serde_json::from_str(line) {
            return Some(value);
        }
    }

    let first = trimmed.find('{')?;
    let last = trimmed.rfind('}')?;
    if last > first {
        serde_json::from_str(&trimmed[first..=last]).ok()
    } else {
        None
    }
}

/// Sum byte sizes over the selected streams.
///
/// `requested_downloads` wins over `requested_formats` wins over the
/// top-level object.
pub(crate) fn extract_estimated_bytes(info: &Value) -> Option<u64> {
    let duration = info.get("duration").and_then(Value::as_f64).unwrap_or(0.0);

    let sum_list = |key: &str| -> u64 {
        info.get(key)
            .and_then(Value::as_array)
            .map(|items| items.iter().map(|item| item_size(item, duration)).sum())
            .unwrap_or(0)
    };

    let mut bytes = sum_list("requested_downloads");
    if bytes == 0 {
        bytes = sum_list("requested_formats");
    }
    if bytes == 0 {
        bytes = item_size(info, duration);
    }
    (bytes > 0).then_some(bytes)
}

/// Direct size field, or a bitrate-derived estimate when only `tbr` is known.
fn item_size(item: &Value, duration: f64) -> u64 {
    let field = |key: &str| {
        item.get(key)
            .and_then(Value::as_f64)
            .filter(|v| v.is_finite() && *v > 0.0)
    };

    if let Some(direct) = field("filesize").or_else(|| field("filesize_approx")) {
        return direct as u64;
    }
    if let Some(tbr) = field("tbr") {
        if duration > 0.0 {
            // tbr is in kbit/s
            return (duration * tbr * 1000.0 / 8.0).round() as u64;
        }
    }
    0
}

/// Scale a full-asset estimate down to the requested sub-range.
pub(crate) fn scale_for_range(bytes: u64, duration: f64, range: &TimeRange) -> u64 {
    let clipped = (duration.min(range.end_secs as f64) - (range.start_secs as f64).max(0.0)).max(0.0);
    if clipped > 0.0 && duration > 0.0 {
        ((bytes as f64) * (clipped / duration)).round() as u64
    } else {
        bytes
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn test_json_recovery_from_interleaved_output() {
        let raw = "Fetching info\n{\"duration\":10,\"filesize\":1000}\nDone";
        let info = parse_metadata_json(raw).unwrap();
        assert_eq!(info["filesize"], 1000);
        assert_eq!(info["duration"], 10);
    }

    #[test]
    fn test_json_recovery_whole_buffer() {
        let info = parse_metadata_json("{\"duration\": 5.5}").unwrap();
        assert_eq!(info["duration"], 5.5);
    }

    #[test]
    fn test_json_recovery_brace_substring() {
        // Payload split across lines, so the line scan fails and the
        // brace substring fallback has to find it
        let raw = "WARNING: slow\n{\n  \"duration\": 10,\n  \"filesize\": 1000\n}";
        let info = parse_metadata_json(raw).unwrap();
        assert_eq!(info["filesize"], 1000);
    }

    #[test]
    fn test_json_recovery_garbage() {
        assert_eq!(parse_metadata_json(""), None);
        assert_eq!(parse_metadata_json("no json here"), None);
        assert_eq!(parse_metadata_json("{broken"), None);
    }

    #[test]
    fn test_requested_downloads_wins() {
        let info = json!({
            "duration": 100.0,
            "filesize": 1,
            "requested_formats": [{"filesize": 2}],
            "requested_downloads": [{"filesize": 500}, {"filesize_approx": 250}]
        });
        assert_eq!(extract_estimated_bytes(&info), Some(750));
    }

    #[test]
    fn test_requested_formats_fallback() {
        let info = json!({
            "duration": 100.0,
            "requested_formats": [{"filesize": 300}, {"filesize": 200}]
        });
        assert_eq!(extract_estimated_bytes(&info), Some(500));
    }

    #[test]
    fn test_top_level_fallback() {
        let info = json!({"filesize_approx": 123456});
        assert_eq!(extract_estimated_bytes(&info), Some(123456));
    }

    #[test]
    fn test_bitrate_derived_size() {
        // 100s at 800 kbit/s = 100 * 800 * 1000 / 8 = 10,000,000 bytes
        let info = json!({"duration": 100.0, "tbr": 800.0});
        assert_eq!(extract_estimated_bytes(&info), Some(10_000_000));
    }

    #[test]
    fn test_no_size_information() {
        let info = json!({"duration": 100.0, "title": "clip"});
        assert_eq!(extract_estimated_bytes(&info), None);
    }

    #[test]
    fn test_scaling_to_sub_range() {
        let range = TimeRange {
            start_secs: 100,
            end_secs: 160,
        };
        assert_eq!(scale_for_range(60_000_000, 600.0, &range), 6_000_000);
    }

    #[test]
    fn test_scaling_clamps_end_to_duration() {
        // Range extends past the asset; only the overlap counts
        let range = TimeRange {
            start_secs: 500,
            end_secs: 900,
        };
        assert_eq!(scale_for_range(60_000_000, 600.0, &range), 10_000_000);
    }

    #[test]
    fn test_scaling_outside_asset_keeps_estimate() {
        let range = TimeRange {
            start_secs: 700,
            end_secs: 800,
        };
        assert_eq!(scale_for_range(60_000_000, 600.0, &range), 60_000_000);
    }

    #[test]
    fn test_estimate_from_info_scales() {
        let info = json!({"duration": 600.0, "filesize": 60_000_000u64});
        let range = TimeRange {
            start_secs: 100,
            end_secs: 160,
        };
        let estimate = estimate_from_info(&info, Some(&range));
        assert_eq!(estimate.bytes, Some(6_000_000));
        assert_eq!(estimate.duration_secs, Some(600.0));
    }

    #[test]
    fn test_estimate_from_info_unknown() {
        let info = json!({"title": "clip"});
        let estimate = estimate_from_info(&info, None);
        assert_eq!(estimate, SizeEstimate::default());
    }

    #[cfg(unix)]
    mod subprocess {
        use super::*;
        use crate::request::{DownloadRequestBuilder, ToolOverrides};
        use pretty_assertions::assert_eq;
        use std::path::Path;
        use url::Url;

        fn write_stub(dir: &Path, body: &str) -> String {
            use std::os::unix::fs::PermissionsExt;
            let path = dir.join("yt-dlp");
            std::fs::write(&path, format!("#!/bin/sh\n{body}")).unwrap();
            std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
            path.to_string_lossy().into_owned()
        }

        fn request(stub: String) -> crate::request::DownloadRequest {
            DownloadRequestBuilder::new(Url::parse("https://youtu.be/abc").unwrap())
                .destination("/tmp")
                .tool_overrides(ToolOverrides {
                    ytdlp: Some(stub),
                    ffmpeg: Some("ffmpeg".into()),
                    deno: None,
                })
                .build()
                .unwrap()
        }

        #[tokio::test]
        async fn test_estimate_happy_path() {
            let dir = tempfile::tempdir().unwrap();
            let stub = write_stub(
                dir.path(),
                "echo 'Fetching info'\necho '{\"duration\":10,\"filesize\":1000}'\necho 'Done'\n",
            );
            let estimate = estimate_download_size(&request(stub)).await.unwrap();
            assert_eq!(estimate.bytes, Some(1000));
            assert_eq!(estimate.duration_secs, Some(10.0));
        }

        #[tokio::test]
        async fn test_estimator_exit_failure_is_hard() {
            let dir = tempfile::tempdir().unwrap();
            let stub = write_stub(dir.path(), "echo 'ERROR: unavailable' 1>&2\nexit 2\n");
            let err = estimate_download_size(&request(stub)).await.unwrap_err();
            match err {
                PipelineError::ToolExit { code, stderr, .. } => {
                    assert_eq!(code, Some(2));
                    assert!(stderr.contains("unavailable"));
                }
                other => panic!("expected ToolExit, got {other:?}"),
            }
        }

        #[tokio::test]
        async fn test_unparseable_output_is_soft() {
            let dir = tempfile::tempdir().unwrap();
            let stub = write_stub(dir.path(), "echo 'not json at all'\n");
            let estimate = estimate_download_size(&request(stub)).await.unwrap();
            assert_eq!(estimate, SizeEstimate::default());
        }
    }
}
