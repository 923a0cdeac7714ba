//! Extraction adapter around the external `yt-dlp` binary
//!
//! The orchestrator only sees the [`Extractor`] trait and a tagged
//! [`ExtractionOutcome`]. Free-text error output is classified here, at the
//! boundary of the external call, and nowhere else.

use async_trait::async_trait;
use serde::Deserialize;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;
use tracing::{debug, info, warn};

use super::types::TargetFormat;
use crate::config::{ExtractorConfig, ManifestVariantPolicy};

/// Classified extraction failure
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    /// Rate-limited by the source platform
    UpstreamThrottled,
    /// Removed, private or region-locked
    VideoUnavailable,
    /// No stream matches the requested format
    NoSuitableStream,
    Unknown,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExtractionOutcome {
    Success {
        title: String,
        produced_path: PathBuf,
        produced_ext: String,
    },
    Failure {
        kind: FailureKind,
        message: String,
    },
}

impl ExtractionOutcome {
    pub fn failure(kind: FailureKind, message: impl Into<String>) -> Self {
        ExtractionOutcome::Failure {
            kind,
            message: message.into(),
        }
    }
}

/// Knobs passed to the external capability for one extraction
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractionOptions {
    pub desired_format: TargetFormat,
    pub audio_bitrate_kbps: u32,
    /// Request identity sent upstream, `User-Agent` first
    pub request_headers: Vec<(String, String)>,
    pub certificate_validation: bool,
    pub manifest_variant_policy: ManifestVariantPolicy,
}

impl ExtractionOptions {
    pub fn for_format(config: &ExtractorConfig, desired_format: TargetFormat) -> Self {
        Self {
            desired_format,
            audio_bitrate_kbps: config.audio_bitrate_kbps,
            request_headers: vec![
                ("User-Agent".to_string(), config.user_agent.clone()),
                ("Accept".to_string(), config.accept.clone()),
                ("Accept-Language".to_string(), config.accept_language.clone()),
            ],
            certificate_validation: config.certificate_validation,
            manifest_variant_policy: config.manifest_variant_policy,
        }
    }
}

/// External download capability
#[async_trait]
pub trait Extractor: Send + Sync {
    fn name(&self) -> &'static str;

    /// Download `url` into `work_dir` in the requested format
    async fn extract(&self, url: &str, format: TargetFormat, work_dir: &Path) -> ExtractionOutcome;
}

/// One JSON object per finished download, printed after the final rename
const PRINT_TEMPLATE: &str = "after_move:%(.{title,filepath})j";

/// [`Extractor`] backed by the `yt-dlp` command line tool
#[derive(Debug, Clone)]
pub struct YtDlpExtractor {
    binary: PathBuf,
    config: ExtractorConfig,
    timeout: Duration,
}

impl YtDlpExtractor {
    pub fn new(binary: PathBuf, config: ExtractorConfig, timeout: Duration) -> Self {
        Self {
            binary,
            config,
            timeout,
        }
    }

    /// Resolve the configured binary through `PATH`.
    ///
    /// A missing binary is not fatal at startup; jobs fail with an unknown
    /// extraction error until it is installed.
    pub fn discover(config: ExtractorConfig, timeout: Duration) -> Self {
        let binary = match which::which(&config.binary) {
            Ok(path) => {
                info!(path = %path.display(), "Using yt-dlp binary");
                path
            }
            Err(error) => {
                warn!(binary = %config.binary, %error, "yt-dlp binary not found in PATH");
                PathBuf::from(&config.binary)
            }
        };

        Self::new(binary, config, timeout)
    }

    pub fn build_args(&self, url: &str, options: &ExtractionOptions, work_dir: &Path) -> Vec<String> {
        let template = work_dir.join("%(title)s.%(ext)s");

        let mut args: Vec<String> = [
            "--no-playlist",
            "--no-warnings",
            "--newline",
            "--print",
            PRINT_TEMPLATE,
            "-o",
        ]
        .into_iter()
        .map(String::from)
        .collect();
        args.push(template.to_string_lossy().into_owned());

        for (name, value) in &options.request_headers {
            if name.eq_ignore_ascii_case("user-agent") {
                args.push("--user-agent".to_string());
                args.push(value.clone());
            } else {
                args.push("--add-header".to_string());
                args.push(format!("{name}:{value}"));
            }
        }

        if !options.certificate_validation {
            args.push("--no-check-certificates".to_string());
        }

        if let Some(skip) = options.manifest_variant_policy.skipped_variants() {
            args.push("--extractor-args".to_string());
            args.push(skip.to_string());
        }

        match options.desired_format {
            TargetFormat::AudioOnly => {
                args.extend(
                    ["-f", "bestaudio/best", "-x", "--audio-format", "mp3", "--audio-quality"]
                        .into_iter()
                        .map(String::from),
                );
                args.push(format!("{}K", options.audio_bitrate_kbps));
            }
            TargetFormat::VideoContainer => {
                // Progressive streams only; a non-mp4 container is rewrapped, never re-muxed
                args.push("-f".to_string());
                args.push(
                    "best[ext=mp4][vcodec!=none][acodec!=none]/best[vcodec!=none][acodec!=none]"
                        .to_string(),
                );
                args.push("--remux-video".to_string());
                args.push("mp4".to_string());
            }
        }

        args.push("--".to_string());
        args.push(url.to_string());
        args
    }
}

#[async_trait]
impl Extractor for YtDlpExtractor {
    fn name(&self) -> &'static str {
        "yt-dlp"
    }

    async fn extract(&self, url: &str, format: TargetFormat, work_dir: &Path) -> ExtractionOutcome {
        let options = ExtractionOptions::for_format(&self.config, format);
        let args = self.build_args(url, &options, work_dir);
        debug!(binary = %self.binary.display(), ?args, "Spawning extractor");

        let mut command = Command::new(&self.binary);
        command.args(&args).stdin(Stdio::null()).kill_on_drop(true);

        let output = match tokio::time::timeout(self.timeout, command.output()).await {
            Err(_) => {
                return ExtractionOutcome::failure(
                    FailureKind::Unknown,
                    format!("extraction timed out after {}s", self.timeout.as_secs()),
                );
            }
            Ok(Err(error)) if error.kind() == ErrorKind::NotFound => {
                return ExtractionOutcome::failure(
                    FailureKind::Unknown,
                    format!("{} is not installed", self.binary.display()),
                );
            }
            Ok(Err(error)) => {
                return ExtractionOutcome::failure(
                    FailureKind::Unknown,
                    format!("failed to run {}: {error}", self.binary.display()),
                );
            }
            Ok(Ok(output)) => output,
        };

        if !output.status.success() {
            let message = error_line(&output.stderr);
            return ExtractionOutcome::failure(classify_failure(&message), message);
        }

        match parse_printed(&output.stdout) {
            Some((title, produced_path)) => {
                let produced_ext = produced_path
                    .extension()
                    .and_then(|ext| ext.to_str())
                    .unwrap_or_default()
                    .to_string();
                ExtractionOutcome::Success {
                    title,
                    produced_path,
                    produced_ext,
                }
            }
            None => ExtractionOutcome::failure(
                FailureKind::Unknown,
                "extractor finished without reporting the downloaded file",
            ),
        }
    }
}

/// Most relevant line of the process's error output
fn error_line(stderr: &[u8]) -> String {
    let text = String::from_utf8_lossy(stderr);
    let lines: Vec<&str> = text.lines().map(str::trim).filter(|l| !l.is_empty()).collect();

    lines
        .iter()
        .rev()
        .find(|line| line.starts_with("ERROR"))
        .or_else(|| lines.last())
        .map(|line| line.to_string())
        .unwrap_or_else(|| "extractor exited without an error message".to_string())
}

/// Map the extractor's error text to a failure kind
pub fn classify_failure(message: &str) -> FailureKind {
    const THROTTLED: &[&str] = &["http error 429", "too many requests", "rate-limit", "rate limit"];
    const NO_STREAM: &[&str] = &[
        "requested format is not available",
        "no video formats found",
        "no suitable formats",
    ];
    const UNAVAILABLE: &[&str] = &[
        "video unavailable",
        "private video",
        "not available",
        "has been removed",
        "members-only",
        "in your country",
        "geo restrict",
        "confirm your age",
    ];

    let lower = message.to_ascii_lowercase();
    let matches = |patterns: &[&str]| patterns.iter().any(|p| lower.contains(p));

    if matches(THROTTLED) {
        FailureKind::UpstreamThrottled
    } else if matches(NO_STREAM) {
        FailureKind::NoSuitableStream
    } else if matches(UNAVAILABLE) {
        FailureKind::VideoUnavailable
    } else {
        FailureKind::Unknown
    }
}

#[derive(Debug, Deserialize)]
struct PrintedInfo {
    #[serde(default)]
    title: Option<String>,
    filepath: PathBuf,
}

/// Title and final path from the last JSON line printed by `--print`.
///
/// A missing or empty title is kept as an empty string; the file is still valid.
fn parse_printed(stdout: &[u8]) -> Option<(String, PathBuf)> {
    let text = String::from_utf8_lossy(stdout);

    text.lines()
        .rev()
        .map(str::trim)
        .filter(|line| line.starts_with('{'))
        .find_map(|line| serde_json::from_str::<PrintedInfo>(line).ok())
        .map(|info| (info.title.unwrap_or_default(), info.filepath))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn extractor() -> YtDlpExtractor {
        YtDlpExtractor::new(
            PathBuf::from("yt-dlp"),
            ExtractorConfig::default(),
            Duration::from_secs(10),
        )
    }

    fn flag_value<'a>(args: &'a [String], flag: &str) -> Option<&'a str> {
        args.iter()
            .position(|a| a == flag)
            .and_then(|i| args.get(i + 1))
            .map(String::as_str)
    }

    #[test]
    fn test_audio_args() {
        let config = ExtractorConfig::default();
        let options = ExtractionOptions::for_format(&config, TargetFormat::AudioOnly);
        let args = extractor().build_args("https://example.com/v", &options, Path::new("/tmp/job"));

        assert!(args.contains(&"-x".to_string()));
        assert_eq!(flag_value(&args, "--audio-format"), Some("mp3"));
        assert_eq!(flag_value(&args, "--audio-quality"), Some("192K"));
        assert_eq!(flag_value(&args, "-o"), Some("/tmp/job/%(title)s.%(ext)s"));
        assert_eq!(args.last().map(String::as_str), Some("https://example.com/v"));
    }

    #[test]
    fn test_video_args_request_progressive_stream() {
        let config = ExtractorConfig::default();
        let options = ExtractionOptions::for_format(&config, TargetFormat::VideoContainer);
        let args = extractor().build_args("https://example.com/v", &options, Path::new("/tmp/job"));

        let selector = flag_value(&args, "-f").unwrap();
        assert!(selector.contains("acodec!=none"));
        assert!(selector.contains("vcodec!=none"));
        assert!(!selector.contains('+'));
        assert!(!args.contains(&"-x".to_string()));
        assert_eq!(flag_value(&args, "--remux-video"), Some("mp4"));
    }

    #[test]
    fn test_audio_args_do_not_remux() {
        let config = ExtractorConfig::default();
        let options = ExtractionOptions::for_format(&config, TargetFormat::AudioOnly);
        let args = extractor().build_args("https://example.com/v", &options, Path::new("/tmp/job"));

        assert!(!args.contains(&"--remux-video".to_string()));
    }

    #[test]
    fn test_prints_single_json_line() {
        let config = ExtractorConfig::default();
        let options = ExtractionOptions::for_format(&config, TargetFormat::VideoContainer);
        let args = extractor().build_args("https://example.com/v", &options, Path::new("/tmp/job"));

        assert_eq!(args.iter().filter(|a| *a == "--print").count(), 1);
        assert_eq!(flag_value(&args, "--print"), Some("after_move:%(.{title,filepath})j"));
    }

    #[test]
    fn test_request_identity_and_safety_flags() {
        let config = ExtractorConfig::default();
        let options = ExtractionOptions::for_format(&config, TargetFormat::AudioOnly);
        let args = extractor().build_args("https://example.com/v", &options, Path::new("/tmp/job"));

        assert_eq!(flag_value(&args, "--user-agent"), Some(config.user_agent.as_str()));
        assert!(args.iter().any(|a| a.starts_with("Accept-Language:")));
        assert!(args.contains(&"--no-check-certificates".to_string()));
        assert_eq!(flag_value(&args, "--extractor-args"), Some("youtube:skip=hls,dash"));
    }

    #[test]
    fn test_strict_options_drop_flags() {
        let config = ExtractorConfig {
            certificate_validation: true,
            manifest_variant_policy: ManifestVariantPolicy::Allow,
            audio_bitrate_kbps: 320,
            ..ExtractorConfig::default()
        };
        let options = ExtractionOptions::for_format(&config, TargetFormat::AudioOnly);
        let args = extractor().build_args("https://example.com/v", &options, Path::new("/tmp/job"));

        assert!(!args.contains(&"--no-check-certificates".to_string()));
        assert!(!args.contains(&"--extractor-args".to_string()));
        assert_eq!(flag_value(&args, "--audio-quality"), Some("320K"));
    }

    #[test]
    fn test_classify_failure() {
        assert_eq!(
            classify_failure("ERROR: [youtube] abc: HTTP Error 429: Too Many Requests"),
            FailureKind::UpstreamThrottled
        );
        assert_eq!(
            classify_failure("ERROR: [youtube] abc: Video unavailable. This video has been removed"),
            FailureKind::VideoUnavailable
        );
        assert_eq!(
            classify_failure("ERROR: [youtube] abc: Private video. Sign in if you've been granted access"),
            FailureKind::VideoUnavailable
        );
        assert_eq!(
            classify_failure("ERROR: [youtube] abc: Requested format is not available."),
            FailureKind::NoSuitableStream
        );
        assert_eq!(
            classify_failure("ERROR: Unable to download webpage: connection reset"),
            FailureKind::Unknown
        );
    }

    #[test]
    fn test_error_line_prefers_error_prefix() {
        let stderr = b"WARNING: something\nERROR: Video unavailable\n[debug] trailing noise\n";
        assert_eq!(error_line(stderr), "ERROR: Video unavailable");
        assert_eq!(error_line(b"just text\n"), "just text");
        assert_eq!(error_line(b""), "extractor exited without an error message");
    }

    #[test]
    fn test_parse_printed() {
        let stdout = br#"[download] 100% of 3.2MiB
{"title": "My Video", "filepath": "/tmp/job/My Video.mp4"}
"#;
        let (title, path) = parse_printed(stdout).unwrap();
        assert_eq!(title, "My Video");
        assert_eq!(path, PathBuf::from("/tmp/job/My Video.mp4"));

        assert!(parse_printed(b"only one line\n").is_none());
        assert!(parse_printed(b"").is_none());
    }

    #[test]
    fn test_parse_printed_empty_title() {
        let (title, path) = parse_printed(br#"{"title": "", "filepath": "/tmp/job/NA.mp3"}"#).unwrap();
        assert_eq!(title, "");
        assert_eq!(path, PathBuf::from("/tmp/job/NA.mp3"));

        let (title, _) = parse_printed(br#"{"title": null, "filepath": "/tmp/job/x.mp3"}"#).unwrap();
        assert_eq!(title, "");
    }

    #[tokio::test]
    async fn test_missing_binary_is_unknown_failure() {
        let extractor = YtDlpExtractor::new(
            PathBuf::from("/nonexistent/yt-dlp-binary"),
            ExtractorConfig::default(),
            Duration::from_secs(5),
        );
        let temp = tempfile::TempDir::new().unwrap();

        let outcome = extractor
            .extract("https://example.com/v", TargetFormat::AudioOnly, temp.path())
            .await;
        assert!(matches!(
            outcome,
            ExtractionOutcome::Failure {
                kind: FailureKind::Unknown,
                ..
            }
        ));
    }
}
