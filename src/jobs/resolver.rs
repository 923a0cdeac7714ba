//! Locate the artifact written by the extraction step
//!
//! The extractor rarely names files exactly as expected: titles get rewritten
//! and intermediate containers (`.webm`, `.m4a`) appear before the final
//! rename. Resolution tries the path the extractor reported, then the name
//! rebuilt from the title, and finally the first file in the job directory
//! carrying the target extension.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

use super::types::TargetFormat;

const ILLEGAL_FILENAME_CHARS: &[char] = &['<', '>', ':', '"', '/', '\\', '|', '?', '*'];
const FALLBACK_TITLE: &str = "download";

/// Strip characters that are illegal in file names.
///
/// Idempotent: sanitizing an already sanitized title returns it unchanged.
pub fn sanitize_title(title: &str) -> String {
    let stripped: String = title
        .chars()
        .filter(|c| !ILLEGAL_FILENAME_CHARS.contains(c) && !c.is_control())
        .collect();

    let trimmed = stripped.trim();
    if trimmed.is_empty() {
        FALLBACK_TITLE.to_string()
    } else {
        trimmed.to_string()
    }
}

/// Find the produced file for `expected_title` inside `work_dir`.
///
/// `reported` is the final path announced by the extractor, if any. It must
/// carry the target extension and live inside `work_dir` to be accepted.
/// `Ok(None)` means nothing matching the format exists.
pub async fn resolve(
    work_dir: &Path,
    reported: Option<&Path>,
    expected_title: &str,
    format: TargetFormat,
) -> std::io::Result<Option<PathBuf>> {
    let canonical_dir = tokio::fs::canonicalize(work_dir).await?;

    if let Some(reported) = reported
        && has_extension(reported, format.extension())
        && let Some(path) = accept_candidate(&canonical_dir, reported).await?
    {
        debug!(path = %path.display(), "Artifact found at reported path");
        return Ok(Some(path));
    }

    let expected = work_dir.join(format!("{}.{}", sanitize_title(expected_title), format.extension()));
    if let Some(path) = accept_candidate(&canonical_dir, &expected).await? {
        debug!(path = %path.display(), "Artifact found at expected path");
        return Ok(Some(path));
    }

    let mut entries = tokio::fs::read_dir(work_dir).await?;
    while let Some(entry) = entries.next_entry().await? {
        let path = entry.path();
        if !has_extension(&path, format.extension()) {
            continue;
        }

        if let Some(path) = accept_candidate(&canonical_dir, &path).await? {
            debug!(path = %path.display(), "Artifact found by extension scan");
            return Ok(Some(path));
        }
    }

    Ok(None)
}

fn has_extension(path: &Path, extension: &str) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case(extension))
}

/// A regular file that canonicalizes to a location inside the job directory
async fn accept_candidate(canonical_dir: &Path, candidate: &Path) -> std::io::Result<Option<PathBuf>> {
    let metadata = match tokio::fs::metadata(candidate).await {
        Ok(metadata) => metadata,
        Err(error) if error.kind() == ErrorKind::NotFound => return Ok(None),
        Err(error) => return Err(error),
    };

    if !metadata.is_file() {
        return Ok(None);
    }

    let canonical = tokio::fs::canonicalize(candidate).await?;
    if !canonical.starts_with(canonical_dir) {
        warn!(path = %canonical.display(), "Ignoring artifact outside the job directory");
        return Ok(None);
    }

    Ok(Some(canonical))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_sanitize_strips_illegal_chars() {
        assert_eq!(sanitize_title(r#"a<b>c:d"e/f\g|h?i*j"#), "abcdefghij");
        assert_eq!(sanitize_title("AC/DC - Thunderstruck"), "ACDC - Thunderstruck");
    }

    #[test]
    fn test_sanitize_is_idempotent() {
        for title in [
            "Plain title",
            r#"What? "Really" <yes>"#,
            "  padded / title  ",
            "???",
            "tab\there",
        ] {
            let once = sanitize_title(title);
            assert_eq!(sanitize_title(&once), once);
            assert!(!once.contains(ILLEGAL_FILENAME_CHARS));
        }
    }

    #[test]
    fn test_sanitize_empty_falls_back() {
        assert_eq!(sanitize_title("***"), "download");
        assert_eq!(sanitize_title("   "), "download");
    }

    #[tokio::test]
    async fn test_resolve_exact_match() {
        let temp = TempDir::new().unwrap();
        std::fs::write(temp.path().join("My Song.mp3"), b"audio").unwrap();
        std::fs::write(temp.path().join("other.mp3"), b"audio").unwrap();

        let path = resolve(temp.path(), None, "My: Song?", TargetFormat::AudioOnly)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(path.file_name().unwrap(), "My Song.mp3");
    }

    #[tokio::test]
    async fn test_resolve_falls_back_to_extension_scan() {
        let temp = TempDir::new().unwrap();
        std::fs::write(temp.path().join("foo.mp4"), b"video").unwrap();

        let path = resolve(temp.path(), None, "Completely different", TargetFormat::VideoContainer)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(path.file_name().unwrap(), "foo.mp4");
    }

    #[tokio::test]
    async fn test_resolve_extension_case_insensitive() {
        let temp = TempDir::new().unwrap();
        std::fs::write(temp.path().join("clip.MP4"), b"video").unwrap();

        let path = resolve(temp.path(), None, "x", TargetFormat::VideoContainer).await.unwrap();
        assert!(path.is_some());
    }

    #[tokio::test]
    async fn test_resolve_ignores_other_formats() {
        let temp = TempDir::new().unwrap();
        std::fs::write(temp.path().join("song.webm"), b"partial").unwrap();
        std::fs::write(temp.path().join("song.mp4"), b"video").unwrap();
        std::fs::create_dir(temp.path().join("dir.mp3")).unwrap();

        let path = resolve(temp.path(), None, "song", TargetFormat::AudioOnly).await.unwrap();
        assert!(path.is_none());
    }

    #[tokio::test]
    async fn test_resolve_prefers_reported_path() {
        let temp = TempDir::new().unwrap();
        std::fs::write(temp.path().join("Title.mp3"), b"title guess").unwrap();
        std::fs::write(temp.path().join("Renamed by extractor.mp3"), b"real").unwrap();

        let reported = temp.path().join("Renamed by extractor.mp3");
        let path = resolve(temp.path(), Some(&reported), "Title", TargetFormat::AudioOnly)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(path.file_name().unwrap(), "Renamed by extractor.mp3");
    }

    #[tokio::test]
    async fn test_resolve_rejects_reported_path_outside_dir() {
        let outer = TempDir::new().unwrap();
        let work_dir = outer.path().join("job");
        std::fs::create_dir(&work_dir).unwrap();
        std::fs::write(outer.path().join("escaped.mp3"), b"outside").unwrap();
        std::fs::write(work_dir.join("inside.mp3"), b"inside").unwrap();

        let reported = work_dir.join("../escaped.mp3");
        let path = resolve(&work_dir, Some(&reported), "x", TargetFormat::AudioOnly)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(path.file_name().unwrap(), "inside.mp3");
    }

    #[tokio::test]
    async fn test_resolve_ignores_reported_path_with_wrong_extension() {
        let temp = TempDir::new().unwrap();
        std::fs::write(temp.path().join("clip.webm"), b"webm").unwrap();

        let reported = temp.path().join("clip.webm");
        let path = resolve(temp.path(), Some(&reported), "clip", TargetFormat::VideoContainer)
            .await
            .unwrap();
        assert!(path.is_none());
    }

    #[tokio::test]
    async fn test_resolve_empty_dir() {
        let temp = TempDir::new().unwrap();
        let path = resolve(temp.path(), None, "anything", TargetFormat::AudioOnly).await.unwrap();
        assert!(path.is_none());
    }

    #[tokio::test]
    async fn test_resolve_missing_dir_is_error() {
        let temp = TempDir::new().unwrap();
        let result = resolve(&temp.path().join("absent"), None, "x", TargetFormat::AudioOnly).await;
        assert!(result.is_err());
    }
}
