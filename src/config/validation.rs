use super::models::Config;
use axum::http::HeaderValue;
use thiserror::Error;

const MIN_AUDIO_BITRATE_KBPS: u32 = 32;
const MAX_AUDIO_BITRATE_KBPS: u32 = 320;

#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("{field} must be positive")]
    ZeroDuration { field: &'static str },

    #[error("audio_bitrate_kbps must be between {min} and {max}, got {actual}")]
    AudioBitrateOutOfRange { actual: u32, min: u32, max: u32 },

    #[error("extractor binary must not be empty")]
    EmptyBinary,

    #[error("staging_dir must not be empty")]
    EmptyStagingDir,

    #[error("extractor header '{header}' is not a valid HTTP header value")]
    InvalidHeaderValue { header: &'static str },

    #[error(
        "artifact_retention_secs ({retention}) must be greater than extraction_timeout_secs ({timeout})"
    )]
    RetentionNotAboveTimeout { retention: u64, timeout: u64 },
}

/// Validate the entire configuration
pub fn validate(config: &Config) -> Result<(), ValidationError> {
    validate_jobs(config)?;
    validate_extractor(config)?;
    Ok(())
}

/// Timeouts and sweep intervals must be non-zero; a zero cooldown is allowed.
///
/// The sweep judges job directories by modification time, so retention must
/// outlast the longest possible extraction.
fn validate_jobs(config: &Config) -> Result<(), ValidationError> {
    let jobs = &config.jobs;

    if jobs.staging_dir.as_os_str().is_empty() {
        return Err(ValidationError::EmptyStagingDir);
    }

    for (field, value) in [
        ("extraction_timeout_secs", jobs.extraction_timeout_secs),
        ("artifact_retention_secs", jobs.artifact_retention_secs),
        ("sweep_interval_secs", jobs.sweep_interval_secs),
    ] {
        if value == 0 {
            return Err(ValidationError::ZeroDuration { field });
        }
    }

    if jobs.artifact_retention_secs <= jobs.extraction_timeout_secs {
        return Err(ValidationError::RetentionNotAboveTimeout {
            retention: jobs.artifact_retention_secs,
            timeout: jobs.extraction_timeout_secs,
        });
    }

    Ok(())
}

fn validate_extractor(config: &Config) -> Result<(), ValidationError> {
    let extractor = &config.extractor;

    if extractor.binary.trim().is_empty() {
        return Err(ValidationError::EmptyBinary);
    }

    if !(MIN_AUDIO_BITRATE_KBPS..=MAX_AUDIO_BITRATE_KBPS).contains(&extractor.audio_bitrate_kbps) {
        return Err(ValidationError::AudioBitrateOutOfRange {
            actual: extractor.audio_bitrate_kbps,
            min: MIN_AUDIO_BITRATE_KBPS,
            max: MAX_AUDIO_BITRATE_KBPS,
        });
    }

    for (header, value) in [
        ("user_agent", &extractor.user_agent),
        ("accept", &extractor.accept),
        ("accept_language", &extractor.accept_language),
    ] {
        if HeaderValue::from_str(value).is_err() {
            return Err(ValidationError::InvalidHeaderValue { header });
        }
    }

    Ok(())
}
