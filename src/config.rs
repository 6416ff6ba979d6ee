//! Environment-sourced configuration with a secrets-file fallback.
//!
//! Each key is read from the environment first, then from a flat JSON secrets
//! file (for hosts that inject secrets as a mounted file rather than env
//! vars), then from the built-in default. A missing or malformed secrets file
//! is not an error; an unrecognized timezone is.

use std::collections::HashMap;
use std::env;
use std::path::PathBuf;

use chrono_tz::Tz;
use tracing::warn;

use crate::error::{Error, Result};

/// Env var naming the secrets file. Defaults to `./secrets.json`.
const SECRETS_PATH_VAR: &str = "TABLESIDE_SECRETS";

pub const DEFAULT_DB_PATH: &str = "orders.db";
pub const DEFAULT_ADMIN_PASSWORD: &str = "changeme";
pub const DEFAULT_TZ: &str = "Asia/Tokyo";

/// Runtime configuration shared by all handlers.
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// SQLite database file path (`DATABASE_URL`).
    pub db_path: String,
    /// Shared back-office secret (`ADMIN_PASSWORD`). A placeholder gate, not
    /// a security boundary.
    pub admin_password: String,
    /// Display timezone for timestamps and day-granularity filters (`APP_TZ`).
    pub tz: Tz,
    /// Public base URL of the ordering page, used for QR links
    /// (`FRONTEND_URL`).
    pub base_url: String,
}

impl AppConfig {
    /// Build the configuration from the environment and the secrets file.
    pub fn from_env() -> Result<Self> {
        let secrets = load_secrets();

        let db_path = lookup("DATABASE_URL", &secrets, DEFAULT_DB_PATH);
        let admin_password = lookup("ADMIN_PASSWORD", &secrets, DEFAULT_ADMIN_PASSWORD);
        let tz_name = lookup("APP_TZ", &secrets, DEFAULT_TZ);
        let base_url = lookup("FRONTEND_URL", &secrets, "");

        let tz: Tz = tz_name
            .parse()
            .map_err(|_| Error::Config(format!("unrecognized APP_TZ: {tz_name}")))?;

        Ok(AppConfig {
            db_path,
            admin_password,
            tz,
            base_url,
        })
    }
}

/// Read one key: environment first, secrets file second, default last.
/// Empty env values count as unset.
fn lookup(name: &str, secrets: &HashMap<String, String>, default: &str) -> String {
    env::var(name)
        .ok()
        .filter(|v| !v.is_empty())
        .or_else(|| secrets.get(name).cloned())
        .unwrap_or_else(|| default.to_string())
}

/// Load the secrets file as a flat string map. Any failure yields an empty
/// map; the file is a fallback, not a requirement.
fn load_secrets() -> HashMap<String, String> {
    let path = env::var(SECRETS_PATH_VAR)
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("secrets.json"));

    let raw = match std::fs::read_to_string(&path) {
        Ok(s) => s,
        Err(_) => return HashMap::new(),
    };

    match serde_json::from_str::<HashMap<String, String>>(&raw) {
        Ok(map) => map,
        Err(e) => {
            warn!("Ignoring malformed secrets file {}: {e}", path.display());
            HashMap::new()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use std::io::Write;

    const KEYS: &[&str] = &[
        "DATABASE_URL",
        "ADMIN_PASSWORD",
        "APP_TZ",
        "FRONTEND_URL",
        SECRETS_PATH_VAR,
    ];

    fn clear_env() {
        for key in KEYS {
            env::remove_var(key);
        }
    }

    #[test]
    #[serial]
    fn defaults_apply_when_nothing_is_set() {
        clear_env();
        // Point at a secrets file that does not exist so a stray ./secrets.json
        // cannot leak into the test.
        env::set_var(SECRETS_PATH_VAR, "/nonexistent/secrets.json");

        let config = AppConfig::from_env().expect("config");
        assert_eq!(config.db_path, DEFAULT_DB_PATH);
        assert_eq!(config.admin_password, DEFAULT_ADMIN_PASSWORD);
        assert_eq!(config.tz, chrono_tz::Asia::Tokyo);
        assert_eq!(config.base_url, "");
        clear_env();
    }

    #[test]
    #[serial]
    fn environment_beats_secrets_file() {
        clear_env();
        let mut file = tempfile::NamedTempFile::new().expect("temp secrets");
        write!(
            file,
            r#"{{"ADMIN_PASSWORD": "from-secrets", "FRONTEND_URL": "https://secrets.test"}}"#
        )
        .expect("write secrets");
        env::set_var(SECRETS_PATH_VAR, file.path());
        env::set_var("ADMIN_PASSWORD", "from-env");

        let config = AppConfig::from_env().expect("config");
        assert_eq!(config.admin_password, "from-env");
        assert_eq!(config.base_url, "https://secrets.test");
        clear_env();
    }

    #[test]
    #[serial]
    fn malformed_secrets_file_falls_back_to_defaults() {
        clear_env();
        let mut file = tempfile::NamedTempFile::new().expect("temp secrets");
        write!(file, "not json at all").expect("write secrets");
        env::set_var(SECRETS_PATH_VAR, file.path());

        let config = AppConfig::from_env().expect("config");
        assert_eq!(config.admin_password, DEFAULT_ADMIN_PASSWORD);
        clear_env();
    }

    #[test]
    #[serial]
    fn unrecognized_timezone_is_a_config_error() {
        clear_env();
        env::set_var(SECRETS_PATH_VAR, "/nonexistent/secrets.json");
        env::set_var("APP_TZ", "Mars/Olympus_Mons");

        let err = AppConfig::from_env().expect_err("bad tz should fail");
        assert!(matches!(err, Error::Config(_)));
        clear_env();
    }
}
