//! Configuration loader
//!
//! Loads [`FlowConfig`] from a config file and environment variables.
//!
//! ## Loading Strategy
//! 1. Reads a `.env` file into the process environment, if one exists
//! 2. Loads the file named by `FABRICFLOW_CONFIG`, or the first file found by
//!    [`probe_config_paths`], or starts from defaults when there is none
//! 3. Applies `FABRICFLOW_*` environment variables on top; environment
//!    values take precedence over file values
//! 4. Validates the result
//!
//! ## Environment Variables
//! - `FABRICFLOW_API_BASE_URL`, `FABRICFLOW_REQUEST_TIMEOUT_SECS`,
//!   `FABRICFLOW_USER_AGENT`
//! - `FABRICFLOW_TENANT_ID`, `FABRICFLOW_CLIENT_ID`,
//!   `FABRICFLOW_CLIENT_SECRET`: service-principal credentials
//! - `FABRICFLOW_TOKEN`: pre-issued bearer token
//! - `FABRICFLOW_AUTHORITY_URL`, `FABRICFLOW_SCOPE`,
//!   `FABRICFLOW_TOKEN_REFRESH_MARGIN_SECS`
//! - `FABRICFLOW_MAX_RETRIES`, `FABRICFLOW_BASE_BACKOFF_MS`,
//!   `FABRICFLOW_MAX_BACKOFF_SECS`, `FABRICFLOW_RATE_LIMIT_CAP_SECS`
//! - `FABRICFLOW_POLL_INTERVAL_SECS`, `FABRICFLOW_JOB_POLL_INTERVAL_SECS`,
//!   `FABRICFLOW_MAX_WAIT_SECS`, `FABRICFLOW_RETRY_AFTER_CAP_SECS`,
//!   `FABRICFLOW_MAX_CONCURRENCY`, `FABRICFLOW_TREAT_NOT_FOUND_AS_COMPLETED`
//! - `FABRICFLOW_LOG_LEVEL`, `FABRICFLOW_LOG_JSON`
//!
//! ## File Locations
//! The loader probes the following paths (in order):
//! 1. `./fabricflow.{json,toml}` then `./config.{json,toml}`
//! 2. The same names in the parent and grandparent directories
//! 3. The same names next to the executable

use std::path::{Path, PathBuf};
use std::str::FromStr;

use fabricflow_domain::{FlowConfig, FlowError, Result};

use crate::errors::InfraError;

/// Environment variable naming an explicit config file.
pub const CONFIG_PATH_VAR: &str = "FABRICFLOW_CONFIG";

const FILE_NAMES: [&str; 4] = ["fabricflow.json", "fabricflow.toml", "config.json", "config.toml"];

/// Load configuration from file and environment
///
/// # Errors
/// Returns `FlowError::Config` if:
/// - `FABRICFLOW_CONFIG` names a missing or malformed file
/// - A probed file cannot be parsed
/// - An environment variable has an invalid value
/// - The merged configuration fails validation
pub fn load() -> Result<FlowConfig> {
    if let Ok(path) = dotenvy::dotenv() {
        tracing::debug!(path = %path.display(), "Loaded .env file");
    }

    let explicit = std::env::var(CONFIG_PATH_VAR).ok().map(PathBuf::from);
    let mut config = match explicit.or_else(probe_config_paths) {
        Some(path) => read_config(&path)?,
        None => {
            tracing::debug!("No config file found, starting from defaults");
            FlowConfig::default()
        }
    };

    apply_env_overrides(&mut config)?;
    config.validate()?;
    Ok(config)
}

/// Load configuration from environment variables only
///
/// Every variable is optional; unset values keep their defaults.
///
/// # Errors
/// Returns `FlowError::Config` if a variable has an invalid value or the
/// result fails validation.
pub fn load_from_env() -> Result<FlowConfig> {
    let mut config = FlowConfig::default();
    apply_env_overrides(&mut config)?;
    config.validate()?;
    tracing::info!("Configuration loaded from environment variables");
    Ok(config)
}

/// Load configuration from a file
///
/// If `path` is `None`, probes the standard locations. Supports JSON and
/// TOML, detected by file extension.
///
/// # Errors
/// Returns `FlowError::Config` if:
/// - File not found (when path is specified)
/// - No config file found (when path is `None`)
/// - File format is invalid
/// - The configuration fails validation
pub fn load_from_file(path: Option<PathBuf>) -> Result<FlowConfig> {
    let config_path = match path {
        Some(p) => p,
        None => probe_config_paths().ok_or_else(|| {
            FlowError::Config("No config file found in any of the standard locations".to_string())
        })?,
    };

    let config = read_config(&config_path)?;
    config.validate()?;
    Ok(config)
}

fn read_config(path: &Path) -> Result<FlowConfig> {
    if !path.exists() {
        return Err(FlowError::Config(format!("Config file not found: {}", path.display())));
    }

    tracing::info!(path = %path.display(), "Loading configuration from file");

    let contents = std::fs::read_to_string(path)
        .map_err(|e| FlowError::Config(format!("Failed to read config file: {e}")))?;

    parse_config(&contents, path)
}

/// Parse configuration from string content
///
/// Format is detected by file extension (`.json` or `.toml`).
///
/// # Errors
/// Returns `FlowError::Config` if format is invalid or parsing fails.
fn parse_config(contents: &str, path: &Path) -> Result<FlowConfig> {
    let extension = path.extension().and_then(|e| e.to_str()).unwrap_or("json");

    match extension {
        "toml" => toml::from_str(contents).map_err(|e| FlowError::from(InfraError::from(e))),
        "json" => serde_json::from_str(contents)
            .map_err(|e| FlowError::Config(format!("Invalid JSON format: {e}"))),
        _ => Err(FlowError::Config(format!("Unsupported config format: {extension}"))),
    }
}

/// Probe the standard locations for a configuration file
///
/// # Returns
/// The first config file found, or `None` if no file exists.
pub fn probe_config_paths() -> Option<PathBuf> {
    let mut dirs = Vec::new();

    if let Ok(cwd) = std::env::current_dir() {
        dirs.extend([cwd.clone(), cwd.join(".."), cwd.join("../..")]);
    }
    if let Ok(exe_path) = std::env::current_exe() {
        if let Some(exe_dir) = exe_path.parent() {
            dirs.push(exe_dir.to_path_buf());
        }
    }

    dirs.iter()
        .flat_map(|dir| FILE_NAMES.iter().map(move |name| dir.join(name)))
        .find(|path| path.exists())
}

/// Overlay `FABRICFLOW_*` environment variables onto `config`.
///
/// # Errors
/// Returns `FlowError::Config` naming the first variable that fails to parse.
pub fn apply_env_overrides(config: &mut FlowConfig) -> Result<()> {
    let api = &mut config.api;
    if let Some(url) = env_var("FABRICFLOW_API_BASE_URL") {
        api.base_url = url;
    }
    override_parsed(&mut api.request_timeout_secs, "FABRICFLOW_REQUEST_TIMEOUT_SECS")?;
    if let Some(agent) = env_var("FABRICFLOW_USER_AGENT") {
        api.user_agent = Some(agent);
    }

    let auth = &mut config.auth;
    for (slot, key) in [
        (&mut auth.tenant_id, "FABRICFLOW_TENANT_ID"),
        (&mut auth.client_id, "FABRICFLOW_CLIENT_ID"),
        (&mut auth.client_secret, "FABRICFLOW_CLIENT_SECRET"),
        (&mut auth.token, "FABRICFLOW_TOKEN"),
    ] {
        if let Some(value) = env_var(key) {
            *slot = Some(value);
        }
    }
    if let Some(url) = env_var("FABRICFLOW_AUTHORITY_URL") {
        auth.authority_url = url;
    }
    if let Some(scope) = env_var("FABRICFLOW_SCOPE") {
        auth.scope = scope;
    }
    override_parsed(&mut auth.refresh_margin_secs, "FABRICFLOW_TOKEN_REFRESH_MARGIN_SECS")?;

    let retry = &mut config.retry;
    override_parsed(&mut retry.max_retries, "FABRICFLOW_MAX_RETRIES")?;
    override_parsed(&mut retry.base_backoff_ms, "FABRICFLOW_BASE_BACKOFF_MS")?;
    override_parsed(&mut retry.max_backoff_secs, "FABRICFLOW_MAX_BACKOFF_SECS")?;
    override_parsed(&mut retry.rate_limit_cap_secs, "FABRICFLOW_RATE_LIMIT_CAP_SECS")?;

    let polling = &mut config.polling;
    override_parsed(&mut polling.resource_interval_secs, "FABRICFLOW_POLL_INTERVAL_SECS")?;
    override_parsed(&mut polling.job_interval_secs, "FABRICFLOW_JOB_POLL_INTERVAL_SECS")?;
    override_parsed(&mut polling.max_wait_secs, "FABRICFLOW_MAX_WAIT_SECS")?;
    override_parsed(&mut polling.retry_after_cap_secs, "FABRICFLOW_RETRY_AFTER_CAP_SECS")?;
    override_parsed(&mut polling.max_concurrency, "FABRICFLOW_MAX_CONCURRENCY")?;
    polling.treat_not_found_as_completed = env_bool(
        "FABRICFLOW_TREAT_NOT_FOUND_AS_COMPLETED",
        polling.treat_not_found_as_completed,
    );

    if let Some(level) = env_var("FABRICFLOW_LOG_LEVEL") {
        config.logging.level = level;
    }
    config.logging.json = env_bool("FABRICFLOW_LOG_JSON", config.logging.json);

    Ok(())
}

/// Non-empty environment variable
fn env_var(key: &str) -> Option<String> {
    std::env::var(key).ok().map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

fn override_parsed<T>(slot: &mut T, key: &str) -> Result<()>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    if let Some(raw) = env_var(key) {
        *slot = raw.parse().map_err(|e| FlowError::Config(format!("Invalid {key}: {e}")))?;
    }
    Ok(())
}

/// Parse boolean from environment variable
///
/// Accepts: `1`/`0`, `true`/`false`, `yes`/`no`, `on`/`off` (case-insensitive)
///
/// # Returns
/// The parsed boolean value, or `default` if not set.
fn env_bool(key: &str, default: bool) -> bool {
    env_var(key)
        .map(|s| matches!(s.to_ascii_lowercase().as_str(), "1" | "true" | "yes" | "on"))
        .unwrap_or(default)
}

#[cfg(test)]
mod tests {
    use std::io::Write;
    use std::sync::{Mutex, MutexGuard, PoisonError};

    use tempfile::NamedTempFile;

    use super::*;

    static ENV_LOCK: Mutex<()> = Mutex::new(());

    const VARS: [&str; 20] = [
        "FABRICFLOW_API_BASE_URL",
        "FABRICFLOW_REQUEST_TIMEOUT_SECS",
        "FABRICFLOW_USER_AGENT",
        "FABRICFLOW_TENANT_ID",
        "FABRICFLOW_CLIENT_ID",
        "FABRICFLOW_CLIENT_SECRET",
        "FABRICFLOW_TOKEN",
        "FABRICFLOW_AUTHORITY_URL",
        "FABRICFLOW_SCOPE",
        "FABRICFLOW_TOKEN_REFRESH_MARGIN_SECS",
        "FABRICFLOW_MAX_RETRIES",
        "FABRICFLOW_BASE_BACKOFF_MS",
        "FABRICFLOW_MAX_BACKOFF_SECS",
        "FABRICFLOW_RATE_LIMIT_CAP_SECS",
        "FABRICFLOW_POLL_INTERVAL_SECS",
        "FABRICFLOW_JOB_POLL_INTERVAL_SECS",
        "FABRICFLOW_MAX_WAIT_SECS",
        "FABRICFLOW_MAX_CONCURRENCY",
        "FABRICFLOW_LOG_LEVEL",
        "FABRICFLOW_LOG_JSON",
    ];

    fn env_guard() -> MutexGuard<'static, ()> {
        let guard = ENV_LOCK.lock().unwrap_or_else(PoisonError::into_inner);
        for key in VARS {
            std::env::remove_var(key);
        }
        guard
    }

    fn write_temp(contents: &str, extension: &str) -> PathBuf {
        let mut temp_file = NamedTempFile::new().unwrap();
        temp_file.write_all(contents.as_bytes()).unwrap();
        let path = temp_file.path().with_extension(extension);
        std::fs::copy(temp_file.path(), &path).unwrap();
        path
    }

    #[test]
    fn test_env_bool_parsing() {
        let _guard = env_guard();

        for (key, value) in [("TEST_FF_BOOL_1", "1"), ("TEST_FF_BOOL_YES", "YES")] {
            std::env::set_var(key, value);
            assert!(env_bool(key, false));
            std::env::remove_var(key);
        }
        for (key, value) in [("TEST_FF_BOOL_0", "0"), ("TEST_FF_BOOL_OFF", "off")] {
            std::env::set_var(key, value);
            assert!(!env_bool(key, true));
            std::env::remove_var(key);
        }

        assert!(env_bool("TEST_FF_BOOL_MISSING", true));
        assert!(!env_bool("TEST_FF_BOOL_MISSING", false));
    }

    #[test]
    fn test_load_from_env_defaults() {
        let _guard = env_guard();

        let config = load_from_env().expect("defaults load");
        assert_eq!(config, FlowConfig::default());
    }

    #[test]
    fn test_load_from_env_overrides() {
        let _guard = env_guard();

        std::env::set_var("FABRICFLOW_API_BASE_URL", "http://localhost:9000/v1");
        std::env::set_var("FABRICFLOW_TOKEN", "pre-issued");
        std::env::set_var("FABRICFLOW_MAX_RETRIES", "2");
        std::env::set_var("FABRICFLOW_POLL_INTERVAL_SECS", "1");
        std::env::set_var("FABRICFLOW_MAX_CONCURRENCY", "3");
        std::env::set_var("FABRICFLOW_LOG_JSON", "true");

        let config = load_from_env().expect("env load");
        assert_eq!(config.api.base_url, "http://localhost:9000/v1");
        assert_eq!(config.auth.token.as_deref(), Some("pre-issued"));
        assert_eq!(config.retry.max_retries, 2);
        assert_eq!(config.polling.resource_interval_secs, 1);
        assert_eq!(config.polling.max_concurrency, 3);
        assert!(config.logging.json);

        for key in VARS {
            std::env::remove_var(key);
        }
    }

    #[test]
    fn test_load_from_env_invalid_number() {
        let _guard = env_guard();

        std::env::set_var("FABRICFLOW_MAX_RETRIES", "many");

        let err = load_from_env().unwrap_err();
        assert!(
            matches!(&err, FlowError::Config(msg) if msg.contains("FABRICFLOW_MAX_RETRIES")),
            "got {err:?}"
        );

        std::env::remove_var("FABRICFLOW_MAX_RETRIES");
    }

    #[test]
    fn test_load_from_env_runs_validation() {
        let _guard = env_guard();

        std::env::set_var("FABRICFLOW_CLIENT_ID", "app-only");

        let err = load_from_env().unwrap_err();
        assert!(matches!(err, FlowError::Config(_)));

        std::env::remove_var("FABRICFLOW_CLIENT_ID");
    }

    #[test]
    fn test_load_from_file_json() {
        let path = write_temp(
            r#"{
                "api": {"base_url": "https://fabric.test/v1"},
                "retry": {"max_retries": 7},
                "polling": {"job_interval_secs": 30}
            }"#,
            "json",
        );

        let config = load_from_file(Some(path.clone())).expect("json config");
        assert_eq!(config.api.base_url, "https://fabric.test/v1");
        assert_eq!(config.retry.max_retries, 7);
        assert_eq!(config.polling.job_interval_secs, 30);
        assert_eq!(config.polling.resource_interval_secs, 5);

        std::fs::remove_file(path).ok();
    }

    #[test]
    fn test_load_from_file_toml() {
        let path = write_temp(
            r#"
[auth]
tenant_id = "tenant"
client_id = "app"
client_secret = "secret"

[polling]
max_wait_secs = 600
treat_not_found_as_completed = false
"#,
            "toml",
        );

        let config = load_from_file(Some(path.clone())).expect("toml config");
        assert!(config.auth.has_client_credentials());
        assert_eq!(config.polling.max_wait_secs, 600);
        assert!(!config.polling.treat_not_found_as_completed);

        std::fs::remove_file(path).ok();
    }

    #[test]
    fn test_env_takes_precedence_over_file() {
        let _guard = env_guard();

        let path = write_temp("[retry]\nmax_retries = 7\nbase_backoff_ms = 250\n", "toml");
        std::env::set_var(CONFIG_PATH_VAR, &path);
        std::env::set_var("FABRICFLOW_MAX_RETRIES", "1");

        let config = load().expect("merged config");
        assert_eq!(config.retry.max_retries, 1);
        assert_eq!(config.retry.base_backoff_ms, 250);

        std::env::remove_var(CONFIG_PATH_VAR);
        std::env::remove_var("FABRICFLOW_MAX_RETRIES");
        std::fs::remove_file(path).ok();
    }

    #[test]
    fn test_load_from_file_not_found() {
        let err = load_from_file(Some(PathBuf::from("/nonexistent/fabricflow.json"))).unwrap_err();
        assert!(matches!(err, FlowError::Config(_)), "Should be a Config error");
    }

    #[test]
    fn test_load_from_file_invalid_json() {
        let path = write_temp(r#"{ "this is": "not valid json" "#, "json");

        let err = load_from_file(Some(path.clone())).unwrap_err();
        assert!(matches!(err, FlowError::Config(msg) if msg.contains("Invalid JSON")));

        std::fs::remove_file(path).ok();
    }

    #[test]
    fn test_parse_config_toml_error() {
        let err = parse_config("[retry\nmax_retries = 1", Path::new("bad.toml")).unwrap_err();
        assert!(matches!(err, FlowError::Config(msg) if msg.contains("Invalid TOML")));
    }

    #[test]
    fn test_parse_config_unsupported_format() {
        let result = parse_config("some content", Path::new("test.yaml"));
        assert!(result.is_err(), "Should fail with unsupported format");
    }
}
