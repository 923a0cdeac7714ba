use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

/// Top-level configuration
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub jobs: JobsConfig,
    #[serde(default)]
    pub extractor: ExtractorConfig,
}

/// HTTP server configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    #[serde(default = "default_bind_addr")]
    pub bind_addr: SocketAddr,
    /// Directory holding `index.html` and other landing page assets
    #[serde(default = "default_static_dir")]
    pub static_dir: PathBuf,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: default_bind_addr(),
            static_dir: default_static_dir(),
        }
    }
}

fn default_bind_addr() -> SocketAddr {
    SocketAddr::from(([0, 0, 0, 0], 5000))
}

fn default_static_dir() -> PathBuf {
    PathBuf::from("static")
}

/// Job orchestration settings
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct JobsConfig {
    /// Minimum gap between two admitted jobs
    #[serde(default = "default_cooldown_secs")]
    pub cooldown_secs: u64,
    /// Staging root; relative paths are resolved next to the executable
    #[serde(default = "default_staging_dir")]
    pub staging_dir: PathBuf,
    #[serde(default = "default_extraction_timeout_secs")]
    pub extraction_timeout_secs: u64,
    /// How long an unconsumed job directory may live before the sweep removes it
    #[serde(default = "default_artifact_retention_secs")]
    pub artifact_retention_secs: u64,
    #[serde(default = "default_sweep_interval_secs")]
    pub sweep_interval_secs: u64,
}

impl JobsConfig {
    pub fn cooldown(&self) -> Duration {
        Duration::from_secs(self.cooldown_secs)
    }

    pub fn extraction_timeout(&self) -> Duration {
        Duration::from_secs(self.extraction_timeout_secs)
    }

    pub fn artifact_retention(&self) -> Duration {
        Duration::from_secs(self.artifact_retention_secs)
    }

    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_secs)
    }
}

impl Default for JobsConfig {
    fn default() -> Self {
        Self {
            cooldown_secs: default_cooldown_secs(),
            staging_dir: default_staging_dir(),
            extraction_timeout_secs: default_extraction_timeout_secs(),
            artifact_retention_secs: default_artifact_retention_secs(),
            sweep_interval_secs: default_sweep_interval_secs(),
        }
    }
}

fn default_cooldown_secs() -> u64 {
    60
}

fn default_staging_dir() -> PathBuf {
    PathBuf::from("downloads")
}

fn default_extraction_timeout_secs() -> u64 {
    600
}

fn default_artifact_retention_secs() -> u64 {
    20 * 60
}

fn default_sweep_interval_secs() -> u64 {
    5 * 60
}

/// Streaming-manifest handling for the extractor
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ManifestVariantPolicy {
    /// Skip HLS/DASH variants, they frequently fail mid-download
    #[default]
    SkipManifests,
    Allow,
}

impl ManifestVariantPolicy {
    /// Extractor argument disabling manifest variants, if any
    pub fn skipped_variants(&self) -> Option<&'static str> {
        match self {
            ManifestVariantPolicy::SkipManifests => Some("youtube:skip=hls,dash"),
            ManifestVariantPolicy::Allow => None,
        }
    }
}

/// External extractor settings
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct ExtractorConfig {
    #[serde(default = "default_binary")]
    pub binary: String,
    #[serde(default = "default_audio_bitrate_kbps")]
    pub audio_bitrate_kbps: u32,
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
    #[serde(default = "default_accept")]
    pub accept: String,
    #[serde(default = "default_accept_language")]
    pub accept_language: String,
    #[serde(default)]
    pub certificate_validation: bool,
    #[serde(default)]
    pub manifest_variant_policy: ManifestVariantPolicy,
}

impl Default for ExtractorConfig {
    fn default() -> Self {
        Self {
            binary: default_binary(),
            audio_bitrate_kbps: default_audio_bitrate_kbps(),
            user_agent: default_user_agent(),
            accept: default_accept(),
            accept_language: default_accept_language(),
            certificate_validation: false,
            manifest_variant_policy: ManifestVariantPolicy::default(),
        }
    }
}

fn default_binary() -> String {
    "yt-dlp".to_string()
}

fn default_audio_bitrate_kbps() -> u32 {
    192
}

fn default_user_agent() -> String {
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36".to_string()
}

fn default_accept() -> String {
    "text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8".to_string()
}

fn default_accept_language() -> String {
    "en-US,en;q=0.9".to_string()
}
