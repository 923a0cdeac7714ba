//! API utility functions
//!
//! Pure, stateless helpers for request and response headers.

use crate::api::error::ApiError;

/// Reject bodies explicitly labelled as something other than JSON.
///
/// A missing Content-Type is tolerated; the body is still parsed as JSON.
pub fn ensure_json_content_type(content_type: Option<&str>) -> Result<(), ApiError> {
    let Some(content_type) = content_type else {
        return Ok(());
    };

    let media_type: mime::Mime = content_type
        .parse()
        .map_err(|_| ApiError::InvalidPayload(format!("invalid Content-Type: {content_type}")))?;

    if media_type.type_() != mime::APPLICATION || media_type.subtype() != mime::JSON {
        return Err(ApiError::InvalidPayload(format!(
            "Content-Type must be application/json, got: {}/{}",
            media_type.type_(),
            media_type.subtype()
        )));
    }

    Ok(())
}

/// `attachment; filename="..."`, with an RFC 5987 `filename*` parameter
/// added when the name is not plain ASCII
pub fn content_disposition(filename: &str) -> String {
    let ascii: String = filename
        .chars()
        .map(|c| match c {
            '"' | '\\' => '_',
            c if c.is_ascii() && !c.is_ascii_control() => c,
            _ => '_',
        })
        .collect();

    if ascii == filename {
        format!("attachment; filename=\"{ascii}\"")
    } else {
        format!(
            "attachment; filename=\"{ascii}\"; filename*=UTF-8''{}",
            urlencoding::encode(filename)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_json_content_type_accepted() {
        assert!(ensure_json_content_type(None).is_ok());
        assert!(ensure_json_content_type(Some("application/json")).is_ok());
        assert!(ensure_json_content_type(Some("application/json; charset=utf-8")).is_ok());
    }

    #[test]
    fn test_other_content_types_rejected() {
        assert!(ensure_json_content_type(Some("text/plain")).is_err());
        assert!(ensure_json_content_type(Some("application/x-www-form-urlencoded")).is_err());
        assert!(ensure_json_content_type(Some("invalid")).is_err());
    }

    #[test]
    fn test_content_disposition_ascii() {
        assert_eq!(
            content_disposition("My Song.mp3"),
            "attachment; filename=\"My Song.mp3\""
        );
    }

    #[test]
    fn test_content_disposition_unicode() {
        let value = content_disposition("Café.mp4");
        assert!(value.starts_with("attachment; filename=\"Caf_.mp4\""));
        assert!(value.ends_with("filename*=UTF-8''Caf%C3%A9.mp4"));
        assert!(axum::http::HeaderValue::from_str(&value).is_ok());
    }
}
