use super::models::Config;
use config::{ConfigError, Environment, File};
use std::env;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};

const CONFIG_ENV_VAR: &str = "MEDIAGRAB_CONFIG";
const DEFAULT_CONFIG_PATH: &str = "config/mediagrab.toml";
const ENV_PREFIX: &str = "MEDIAGRAB";
const ENV_SEPARATOR: &str = "__";
const PORT_ENV_VAR: &str = "PORT";

/// Load configuration from multiple sources with priority:
/// 1. Defaults (embedded in structs)
/// 2. TOML file (if exists)
/// 3. Environment variables from .env file (via dotenvy)
/// 4. System environment variables (highest priority)
///
/// `PORT` overrides the port of `server.bind_addr`, and a relative
/// `jobs.staging_dir` is anchored next to the running executable.
pub fn load(explicit_path: Option<PathBuf>) -> Result<Config, ConfigError> {
    // Missing .env is fine
    let _ = dotenvy::dotenv();

    let config_path = explicit_path
        .or_else(|| env::var(CONFIG_ENV_VAR).ok().map(PathBuf::from))
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH));

    let mut config = load_from_sources(config_path)?;

    if let Ok(port) = env::var(PORT_ENV_VAR) {
        apply_port_override(&mut config, &port)?;
    }

    let exe_dir = env::current_exe()
        .ok()
        .and_then(|exe| exe.parent().map(Path::to_path_buf));
    config.jobs.staging_dir = anchor_staging_dir(&config.jobs.staging_dir, exe_dir.as_deref());

    Ok(config)
}

/// Load configuration from a specific path and environment
/// Useful for testing with custom config files
pub fn load_from_sources(config_path: PathBuf) -> Result<Config, ConfigError> {
    let mut builder = config::Config::builder();

    if config_path.exists() {
        tracing::info!("Loading configuration from: {}", config_path.display());
        builder = builder.add_source(File::from(config_path).required(false));
    } else {
        tracing::warn!(
            "Configuration file not found at {}, using defaults and environment overrides",
            config_path.display()
        );
    }

    // MEDIAGRAB__JOBS__COOLDOWN_SECS -> jobs.cooldown_secs
    builder = builder.add_source(
        Environment::with_prefix(ENV_PREFIX)
            .separator(ENV_SEPARATOR)
            .try_parsing(true),
    );

    let config = builder.build()?;
    config.try_deserialize()
}

fn apply_port_override(config: &mut Config, port: &str) -> Result<(), ConfigError> {
    let port: u16 = port
        .trim()
        .parse()
        .map_err(|_| ConfigError::Message(format!("{PORT_ENV_VAR} must be a port number, got '{port}'")))?;

    config.server.bind_addr = SocketAddr::new(config.server.bind_addr.ip(), port);
    Ok(())
}

fn anchor_staging_dir(staging_dir: &Path, exe_dir: Option<&Path>) -> PathBuf {
    if staging_dir.is_absolute() {
        return staging_dir.to_path_buf();
    }

    match exe_dir {
        Some(dir) => dir.join(staging_dir),
        None => staging_dir.to_path_buf(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_load_defaults_only() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("nonexistent.toml");

        let config = load_from_sources(config_path).unwrap();
        assert_eq!(config.server.bind_addr.to_string(), "0.0.0.0:5000");
        assert_eq!(config.jobs.cooldown_secs, 60);
    }

    #[test]
    fn test_load_from_toml() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("test.toml");

        let toml_content = r#"
[server]
bind_addr = "127.0.0.1:9000"
static_dir = "/srv/www"

[jobs]
cooldown_secs = 30
staging_dir = "/var/lib/mediagrab"
extraction_timeout_secs = 120

[extractor]
binary = "/usr/local/bin/yt-dlp"
audio_bitrate_kbps = 256
certificate_validation = true
        "#;

        fs::write(&config_path, toml_content).unwrap();

        let config = load_from_sources(config_path).unwrap();
        assert_eq!(config.server.bind_addr.to_string(), "127.0.0.1:9000");
        assert_eq!(config.server.static_dir, PathBuf::from("/srv/www"));
        assert_eq!(config.jobs.cooldown_secs, 30);
        assert_eq!(config.jobs.staging_dir, PathBuf::from("/var/lib/mediagrab"));
        assert_eq!(config.jobs.extraction_timeout_secs, 120);
        assert_eq!(config.extractor.binary, "/usr/local/bin/yt-dlp");
        assert_eq!(config.extractor.audio_bitrate_kbps, 256);
        assert!(config.extractor.certificate_validation);
    }

    #[test]
    fn test_malformed_toml_is_error() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("broken.toml");
        fs::write(&config_path, "[jobs\ncooldown_secs = ").unwrap();

        assert!(load_from_sources(config_path).is_err());
    }

    #[test]
    fn test_port_override() {
        let mut config = Config::default();
        apply_port_override(&mut config, "8081").unwrap();
        assert_eq!(config.server.bind_addr.to_string(), "0.0.0.0:8081");

        assert!(apply_port_override(&mut config, "not-a-port").is_err());
        assert!(apply_port_override(&mut config, "70000").is_err());
    }

    #[test]
    fn test_anchor_staging_dir() {
        let exe_dir = Path::new("/opt/mediagrab/bin");

        assert_eq!(
            anchor_staging_dir(Path::new("downloads"), Some(exe_dir)),
            PathBuf::from("/opt/mediagrab/bin/downloads")
        );
        assert_eq!(
            anchor_staging_dir(Path::new("/data/staging"), Some(exe_dir)),
            PathBuf::from("/data/staging")
        );
        assert_eq!(
            anchor_staging_dir(Path::new("downloads"), None),
            PathBuf::from("downloads")
        );
    }
}
