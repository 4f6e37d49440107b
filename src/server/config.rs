use serde::Deserialize;
use std::ffi::OsString;
use std::fs;
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

use crate::alerting::MonitorSettings;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file at {path}: {source}")]
    Read {
        path: String,
        source: std::io::Error,
    },
    #[error("Failed to parse TOML from config file at {path}: {source}")]
    Parse {
        path: String,
        source: toml::de::Error,
    },
    #[error("Failed to load config from environment: {0}")]
    Env(#[from] envy::Error),
    #[error("{0} is required")]
    Missing(&'static str),
    #[error("Invalid value for {field}: {reason}")]
    Invalid { field: &'static str, reason: String },
}

/// SMTP relay settings. Absent when email delivery is not configured.
#[derive(Debug, Clone, PartialEq)]
pub struct SmtpConfig {
    pub host: String,
    pub port: u16,
    pub username: Option<String>,
    pub password: Option<String>,
    pub from: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct EngineConfig {
    pub database_url: String,
    pub metrics_base_url: String,
    pub listen_addr: String,
    pub default_region: String,
    pub poll_interval_seconds: u64,
    pub metrics_timeout_seconds: u64,
    pub webhook_timeout_seconds: u64,
    pub max_concurrent_evaluations: usize,
    pub history_retention_days: u32,
    pub log_dir: String,
    pub smtp: Option<SmtpConfig>,
}

// Partial config for layering
#[derive(Deserialize, Default, Debug)]
struct PartialEngineConfig {
    database_url: Option<String>,
    metrics_base_url: Option<String>,
    listen_addr: Option<String>,
    default_region: Option<String>,
    poll_interval_seconds: Option<u64>,
    metrics_timeout_seconds: Option<u64>,
    webhook_timeout_seconds: Option<u64>,
    max_concurrent_evaluations: Option<usize>,
    history_retention_days: Option<u32>,
    log_dir: Option<String>,
    smtp_host: Option<String>,
    smtp_port: Option<u16>,
    smtp_username: Option<String>,
    smtp_password: Option<String>,
    smtp_from: Option<String>,
}

fn default_listen_addr() -> String {
    "0.0.0.0:8080".to_string()
}

fn default_region() -> String {
    "us-east-1".to_string()
}

fn default_log_dir() -> String {
    "logs".to_string()
}

const DEFAULT_POLL_INTERVAL_SECONDS: u64 = 60;
const DEFAULT_METRICS_TIMEOUT_SECONDS: u64 = 10;
const DEFAULT_WEBHOOK_TIMEOUT_SECONDS: u64 = 5;
const DEFAULT_MAX_CONCURRENT_EVALUATIONS: usize = 8;
const DEFAULT_SMTP_PORT: u16 = 587;

impl EngineConfig {
    /// Loads the optional TOML file, then lets environment variables (and a
    /// `.env` file) override it. Unset optional fields take their defaults.
    pub fn load(config_path: Option<&str>) -> Result<Self, ConfigError> {
        dotenv::dotenv().ok();
        Self::load_from(config_path, utf8_vars(std::env::vars_os()))
    }

    /// Same as [`EngineConfig::load`] with an explicit environment.
    pub fn load_from<I>(config_path: Option<&str>, env: I) -> Result<Self, ConfigError>
    where
        I: IntoIterator<Item = (String, String)>,
    {
        // 1. Load from file (optional)
        let file_config = match config_path {
            Some(path_str) => read_file(Path::new(path_str))?,
            None => PartialEngineConfig::default(),
        };

        // 2. Load from environment variables
        let env_config: PartialEngineConfig = envy::from_iter(env)?;

        // 3. Merge: environment overrides file
        merge(env_config, file_config)
    }

    pub fn monitor_settings(&self) -> MonitorSettings {
        MonitorSettings {
            poll_interval: Duration::from_secs(self.poll_interval_seconds),
            default_region: self.default_region.clone(),
            max_concurrent_evaluations: self.max_concurrent_evaluations,
        }
    }
}

/// Drops variables whose name or value is not valid UTF-8; none of ours are.
fn utf8_vars<I>(vars: I) -> impl Iterator<Item = (String, String)>
where
    I: IntoIterator<Item = (OsString, OsString)>,
{
    vars.into_iter()
        .filter_map(|(k, v)| Some((k.into_string().ok()?, v.into_string().ok()?)))
}

fn read_file(path: &Path) -> Result<PartialEngineConfig, ConfigError> {
    if !path.exists() {
        return Ok(PartialEngineConfig::default());
    }
    let contents = fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.display().to_string(),
        source,
    })?;
    toml::from_str(&contents).map_err(|source| ConfigError::Parse {
        path: path.display().to_string(),
        source,
    })
}

fn merge(env: PartialEngineConfig, file: PartialEngineConfig) -> Result<EngineConfig, ConfigError> {
    let poll_interval_seconds = env
        .poll_interval_seconds
        .or(file.poll_interval_seconds)
        .unwrap_or(DEFAULT_POLL_INTERVAL_SECONDS);
    if poll_interval_seconds == 0 {
        return Err(ConfigError::Invalid {
            field: "POLL_INTERVAL_SECONDS",
            reason: "must be greater than zero".to_string(),
        });
    }
    let max_concurrent_evaluations = env
        .max_concurrent_evaluations
        .or(file.max_concurrent_evaluations)
        .unwrap_or(DEFAULT_MAX_CONCURRENT_EVALUATIONS);
    if max_concurrent_evaluations == 0 {
        return Err(ConfigError::Invalid {
            field: "MAX_CONCURRENT_EVALUATIONS",
            reason: "must be greater than zero".to_string(),
        });
    }

    let smtp = match env.smtp_host.or(file.smtp_host).filter(|h| !h.trim().is_empty()) {
        Some(host) => Some(SmtpConfig {
            port: env.smtp_port.or(file.smtp_port).unwrap_or(DEFAULT_SMTP_PORT),
            username: env.smtp_username.or(file.smtp_username),
            password: env.smtp_password.or(file.smtp_password),
            from: env
                .smtp_from
                .or(file.smtp_from)
                .ok_or(ConfigError::Missing("SMTP_FROM"))?,
            host,
        }),
        None => None,
    };

    Ok(EngineConfig {
        database_url: env
            .database_url
            .or(file.database_url)
            .ok_or(ConfigError::Missing("DATABASE_URL"))?,
        metrics_base_url: env
            .metrics_base_url
            .or(file.metrics_base_url)
            .ok_or(ConfigError::Missing("METRICS_BASE_URL"))?,
        listen_addr: env
            .listen_addr
            .or(file.listen_addr)
            .unwrap_or_else(default_listen_addr),
        default_region: env
            .default_region
            .or(file.default_region)
            .unwrap_or_else(default_region),
        poll_interval_seconds,
        metrics_timeout_seconds: env
            .metrics_timeout_seconds
            .or(file.metrics_timeout_seconds)
            .unwrap_or(DEFAULT_METRICS_TIMEOUT_SECONDS),
        webhook_timeout_seconds: env
            .webhook_timeout_seconds
            .or(file.webhook_timeout_seconds)
            .unwrap_or(DEFAULT_WEBHOOK_TIMEOUT_SECONDS),
        max_concurrent_evaluations,
        history_retention_days: env
            .history_retention_days
            .or(file.history_retention_days)
            .unwrap_or(crate::alerting::retention::DEFAULT_RETENTION_DAYS),
        log_dir: env.log_dir.or(file.log_dir).unwrap_or_else(default_log_dir),
        smtp,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn env(pairs: &[(&str, &str)]) -> Vec<(String, String)> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    fn config_file(contents: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        file
    }

    #[test]
    fn defaults_apply_when_only_required_fields_are_set() {
        let config = EngineConfig::load_from(
            None,
            env(&[
                ("DATABASE_URL", "postgres://localhost/alerts"),
                ("METRICS_BASE_URL", "http://metrics:4000"),
            ]),
        )
        .unwrap();

        assert_eq!(config.listen_addr, "0.0.0.0:8080");
        assert_eq!(config.default_region, "us-east-1");
        assert_eq!(config.poll_interval_seconds, 60);
        assert_eq!(config.metrics_timeout_seconds, 10);
        assert_eq!(config.webhook_timeout_seconds, 5);
        assert_eq!(config.max_concurrent_evaluations, 8);
        assert_eq!(config.history_retention_days, 90);
        assert_eq!(config.log_dir, "logs");
        assert!(config.smtp.is_none());
    }

    #[test]
    fn environment_overrides_file() {
        let file = config_file(
            r#"
            database_url = "postgres://file/alerts"
            metrics_base_url = "http://file-metrics"
            poll_interval_seconds = 30
            default_region = "eu-west-1"
            smtp_host = "smtp.file.example"
            smtp_from = "alerts@example.com"
            "#,
        );
        let config = EngineConfig::load_from(
            file.path().to_str(),
            env(&[("POLL_INTERVAL_SECONDS", "15"), ("SMTP_PORT", "2525")]),
        )
        .unwrap();

        assert_eq!(config.database_url, "postgres://file/alerts");
        assert_eq!(config.default_region, "eu-west-1");
        assert_eq!(config.poll_interval_seconds, 15);
        let smtp = config.smtp.unwrap();
        assert_eq!(smtp.host, "smtp.file.example");
        assert_eq!(smtp.port, 2525);
        assert_eq!(smtp.from, "alerts@example.com");
    }

    #[test]
    fn missing_required_field_is_reported() {
        let err = EngineConfig::load_from(None, env(&[("METRICS_BASE_URL", "http://m")])).unwrap_err();
        assert!(matches!(err, ConfigError::Missing("DATABASE_URL")));
    }

    #[test]
    fn smtp_host_without_sender_is_rejected() {
        let err = EngineConfig::load_from(
            None,
            env(&[
                ("DATABASE_URL", "postgres://db"),
                ("METRICS_BASE_URL", "http://m"),
                ("SMTP_HOST", "smtp.example.com"),
            ]),
        )
        .unwrap_err();
        assert!(matches!(err, ConfigError::Missing("SMTP_FROM")));
    }

    #[test]
    fn zero_interval_is_invalid() {
        let err = EngineConfig::load_from(
            None,
            env(&[
                ("DATABASE_URL", "postgres://db"),
                ("METRICS_BASE_URL", "http://m"),
                ("POLL_INTERVAL_SECONDS", "0"),
            ]),
        )
        .unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { .. }));
    }

    #[test]
    fn malformed_file_is_a_parse_error() {
        let file = config_file("poll_interval_seconds = \"soon\"");
        let err = EngineConfig::load_from(file.path().to_str(), Vec::new()).unwrap_err();
        assert!(matches!(err, ConfigError::Parse { .. }));
    }

    #[test]
    fn monitor_settings_follow_config() {
        let config = EngineConfig::load_from(
            None,
            env(&[
                ("DATABASE_URL", "postgres://db"),
                ("METRICS_BASE_URL", "http://m"),
                ("MAX_CONCURRENT_EVALUATIONS", "3"),
            ]),
        )
        .unwrap();
        let settings = config.monitor_settings();
        assert_eq!(settings.poll_interval, Duration::from_secs(60));
        assert_eq!(settings.max_concurrent_evaluations, 3);
    }

    #[cfg(unix)]
    #[test]
    fn non_utf8_environment_entries_are_ignored() {
        use std::os::unix::ffi::OsStringExt;

        let vars = vec![
            (OsString::from("METRICS_BASE_URL"), OsString::from("http://m")),
            (OsString::from("DATABASE_URL"), OsString::from("postgres://db")),
            (OsString::from("JUNK"), OsString::from_vec(vec![0x66, 0xff, 0x6f])),
            (OsString::from_vec(vec![0xfe]), OsString::from("x")),
        ];
        let kept: Vec<_> = utf8_vars(vars).collect();
        assert_eq!(kept.len(), 2);

        let config = EngineConfig::load_from(None, kept).unwrap();
        assert_eq!(config.metrics_base_url, "http://m");
    }
}
