//! Relay configuration

use serde::{Deserialize, Serialize, Serializer};
use std::fmt;
use std::path::Path;

/// Default listen address
pub const DEFAULT_LISTEN_ADDR: &str = "0.0.0.0:8080";

/// Default request body cap (64 MiB)
pub const DEFAULT_MAX_BODY_BYTES: usize = 64 * 1024 * 1024;

/// Relay configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProxyConfig {
    /// Listen address
    pub listen_addr: String,
    /// Path of the single action endpoint
    #[serde(default = "default_endpoint_path")]
    pub endpoint_path: String,
    /// Largest accepted request body
    #[serde(default = "default_max_body_bytes")]
    pub max_body_bytes: usize,
    /// Drive backend configuration
    pub drive: DriveConfig,
}

fn default_endpoint_path() -> String {
    "/".to_string()
}

fn default_max_body_bytes() -> usize {
    DEFAULT_MAX_BODY_BYTES
}

impl Default for ProxyConfig {
    fn default() -> Self {
        Self {
            listen_addr: DEFAULT_LISTEN_ADDR.to_string(),
            endpoint_path: default_endpoint_path(),
            max_body_bytes: DEFAULT_MAX_BODY_BYTES,
            drive: DriveConfig::default(),
        }
    }
}

impl ProxyConfig {
    /// Create config with a local drive
    pub fn local(path: &str) -> Self {
        Self {
            drive: DriveConfig::Local {
                path: path.to_string(),
            },
            ..Default::default()
        }
    }

    /// Create config with Google Drive
    pub fn google_drive(access_token: &str) -> Self {
        Self {
            drive: DriveConfig::GoogleDrive {
                access_token: Secret::new(access_token),
                api_url: None,
                upload_url: None,
                permanent_delete: false,
                timeout_secs: default_timeout_secs(),
            },
            ..Default::default()
        }
    }

    /// Load from a JSON file
    pub fn from_file(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let raw = std::fs::read(path.as_ref())?;
        Ok(serde_json::from_slice(&raw)?)
    }

    pub fn with_listen_addr(mut self, addr: &str) -> Self {
        self.listen_addr = addr.to_string();
        self
    }

    pub fn with_endpoint_path(mut self, path: &str) -> Self {
        self.endpoint_path = normalize_endpoint_path(path);
        self
    }

    pub fn with_max_body_bytes(mut self, max: usize) -> Self {
        self.max_body_bytes = max;
        self
    }

    /// Apply `RELAY_*` overrides from a variable lookup
    pub fn apply_env<F>(mut self, lookup: F) -> anyhow::Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(addr) = lookup("RELAY_LISTEN_ADDR") {
            self.listen_addr = addr;
        }
        if let Some(path) = lookup("RELAY_ENDPOINT_PATH") {
            self.endpoint_path = normalize_endpoint_path(&path);
        }
        if let Some(max) = lookup("RELAY_MAX_BODY_BYTES") {
            self.max_body_bytes = max
                .parse()
                .map_err(|e| anyhow::anyhow!("RELAY_MAX_BODY_BYTES: {e}"))?;
        }

        if let Some(token) = lookup("RELAY_DRIVE_ACCESS_TOKEN") {
            let timeout_secs = match lookup("RELAY_DRIVE_TIMEOUT_SECS") {
                Some(v) => v
                    .parse()
                    .map_err(|e| anyhow::anyhow!("RELAY_DRIVE_TIMEOUT_SECS: {e}"))?,
                None => default_timeout_secs(),
            };
            self.drive = DriveConfig::GoogleDrive {
                access_token: Secret::new(&token),
                api_url: lookup("RELAY_DRIVE_API_URL"),
                upload_url: lookup("RELAY_DRIVE_UPLOAD_URL"),
                permanent_delete: lookup("RELAY_DRIVE_PERMANENT_DELETE")
                    .map(|v| is_truthy(&v))
                    .unwrap_or(false),
                timeout_secs,
            };
        } else if let Some(path) = lookup("RELAY_DATA_DIR") {
            self.drive = DriveConfig::Local { path };
        }

        Ok(self)
    }

    /// Secrets that must never appear in messages or logs
    pub fn secrets(&self) -> Vec<String> {
        match &self.drive {
            DriveConfig::GoogleDrive { access_token, .. } => {
                vec![access_token.expose().to_string()]
            }
            DriveConfig::Local { .. } => Vec::new(),
        }
    }
}

fn normalize_endpoint_path(path: &str) -> String {
    let trimmed = path.trim();
    if trimmed.starts_with('/') {
        trimmed.to_string()
    } else {
        format!("/{trimmed}")
    }
}

fn is_truthy(value: &str) -> bool {
    matches!(
        value.trim().to_ascii_lowercase().as_str(),
        "1" | "true" | "yes" | "on"
    )
}

fn default_timeout_secs() -> u64 {
    120
}

/// Drive backend configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum DriveConfig {
    /// Local filesystem drive
    #[serde(rename = "local")]
    Local { path: String },
    /// Google Drive account
    #[serde(rename = "google_drive")]
    GoogleDrive {
        access_token: Secret,
        api_url: Option<String>,
        upload_url: Option<String>,
        #[serde(default)]
        permanent_delete: bool,
        #[serde(default = "default_timeout_secs")]
        timeout_secs: u64,
    },
}

impl Default for DriveConfig {
    fn default() -> Self {
        Self::Local {
            path: "/var/lib/backup-relay".to_string(),
        }
    }
}

/// A credential whose `Debug` and serialized forms are masked
#[derive(Clone, PartialEq, Eq, Deserialize)]
#[serde(transparent)]
pub struct Secret(String);

impl Secret {
    pub fn new(value: &str) -> Self {
        Self(value.to_string())
    }

    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Secret(***)")
    }
}

impl Serialize for Secret {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str("***")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_default_config() {
        let config = ProxyConfig::default();
        assert_eq!(config.listen_addr, "0.0.0.0:8080");
        assert_eq!(config.endpoint_path, "/");
        assert_eq!(config.max_body_bytes, DEFAULT_MAX_BODY_BYTES);
        assert!(matches!(config.drive, DriveConfig::Local { .. }));
        assert!(config.secrets().is_empty());
    }

    #[test]
    fn test_local_config() {
        let config = ProxyConfig::local("/data/backups");
        assert!(matches!(config.drive, DriveConfig::Local { path } if path == "/data/backups"));
    }

    #[test]
    fn test_config_builders() {
        let config = ProxyConfig::default()
            .with_listen_addr("127.0.0.1:9000")
            .with_endpoint_path("exec")
            .with_max_body_bytes(1024);

        assert_eq!(config.listen_addr, "127.0.0.1:9000");
        assert_eq!(config.endpoint_path, "/exec");
        assert_eq!(config.max_body_bytes, 1024);
    }

    #[test]
    fn test_env_selects_google_drive() {
        let config = ProxyConfig::default()
            .apply_env(env(&[
                ("RELAY_DRIVE_ACCESS_TOKEN", "ya29.token"),
                ("RELAY_DRIVE_PERMANENT_DELETE", "yes"),
                ("RELAY_DATA_DIR", "/ignored"),
            ]))
            .unwrap();

        match &config.drive {
            DriveConfig::GoogleDrive {
                access_token,
                permanent_delete,
                timeout_secs,
                ..
            } => {
                assert_eq!(access_token.expose(), "ya29.token");
                assert!(*permanent_delete);
                assert_eq!(*timeout_secs, 120);
            }
            other => panic!("Expected Google Drive config, got {other:?}"),
        }
        assert_eq!(config.secrets(), vec!["ya29.token".to_string()]);
    }

    #[test]
    fn test_env_local_and_limits() {
        let config = ProxyConfig::default()
            .apply_env(env(&[
                ("RELAY_DATA_DIR", "/srv/relay"),
                ("RELAY_LISTEN_ADDR", "127.0.0.1:8081"),
                ("RELAY_MAX_BODY_BYTES", "2048"),
            ]))
            .unwrap();

        assert_eq!(config.listen_addr, "127.0.0.1:8081");
        assert_eq!(config.max_body_bytes, 2048);
        assert!(matches!(config.drive, DriveConfig::Local { ref path } if path == "/srv/relay"));
    }

    #[test]
    fn test_env_rejects_bad_numbers() {
        let result = ProxyConfig::default().apply_env(env(&[("RELAY_MAX_BODY_BYTES", "lots")]));
        assert!(result.is_err());
    }

    #[test]
    fn test_secret_masked_in_debug_and_json() {
        let config = ProxyConfig::google_drive("super-secret");
        assert!(!format!("{config:?}").contains("super-secret"));

        let json = serde_json::to_string(&config.drive).unwrap();
        assert!(json.contains("google_drive"));
        assert!(!json.contains("super-secret"));
    }

    #[test]
    fn test_drive_config_from_json() {
        let config: ProxyConfig = serde_json::from_str(
            r#"{
                "listen_addr": "0.0.0.0:9090",
                "drive": {"type": "google_drive", "access_token": "abc", "api_url": null, "upload_url": null}
            }"#,
        )
        .unwrap();

        assert_eq!(config.endpoint_path, "/");
        assert_eq!(config.secrets(), vec!["abc".to_string()]);
    }
}
