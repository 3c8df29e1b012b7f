//! Configuration file support for the LdA relay.
//!
//! Loads settings from `~/.config/lda-relay/config.toml` on Linux
//! (or platform-appropriate location on other OSes). The config is owned
//! by the embedding environment; the pipeline only consumes immutable
//! snapshots of it.

use anyhow::{Context, Result, bail};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Masked password as it arrives from an outer UI layer. Must never be
/// transmitted; a merge substitutes the stored real password.
pub const PASSWORD_PLACEHOLDER: &str = "********";

/// Credentials passed through to LdA with each submission.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Credentials {
    /// LdA account name.
    pub username: String,

    /// LdA account password (the real one, never the placeholder).
    pub password: String,

    /// Station callsign registered with the account.
    pub callsign: String,
}

/// Application configuration loaded from TOML file.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// LdA account name.
    pub username: String,

    /// LdA account password.
    pub password: String,

    /// Station callsign, used as the transmitting call when a record
    /// doesn't carry one.
    pub callsign: String,

    /// Selected logging software; decides the UDP port.
    pub software: String,

    /// Print statistics every N seconds.
    pub stats_interval: u64,

    /// Enable Prometheus metrics HTTP endpoint.
    pub metrics_enabled: bool,

    /// Port for Prometheus metrics HTTP endpoint.
    pub metrics_port: u16,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            username: String::new(),
            password: String::new(),
            callsign: String::new(),
            software: "log4om".to_string(),
            stats_interval: 30,
            metrics_enabled: false,
            metrics_port: 9090,
        }
    }
}

impl Config {
    /// Load configuration from the default config file location.
    ///
    /// Returns default config if the file doesn't exist.
    /// Returns an error if the file exists but is malformed.
    pub fn load() -> Result<Self> {
        match Self::config_path() {
            Some(path) if path.exists() => Self::load_from(&path),
            _ => Ok(Config::default()),
        }
    }

    /// Load configuration from an explicit path.
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        toml::from_str(&content)
            .with_context(|| format!("Invalid TOML in config file: {}", path.display()))
    }

    /// Returns the path to the config file.
    pub fn config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|p| p.join("lda-relay/config.toml"))
    }

    /// Write the configuration to the default location, creating the
    /// directory if needed.
    pub fn save(&self) -> Result<()> {
        let Some(path) = Self::config_path() else {
            bail!("no config directory available on this platform");
        };
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }
        let content = toml::to_string_pretty(self).context("Failed to serialize config")?;
        fs::write(&path, content)
            .with_context(|| format!("Failed to write config file: {}", path.display()))
    }

    /// Check that everything needed for submission is present.
    pub fn validate(&self) -> Result<()> {
        if self.username.trim().is_empty() {
            bail!("username is required");
        }
        if self.password.trim().is_empty() {
            bail!("password is required");
        }
        if self.password == PASSWORD_PLACEHOLDER {
            bail!("password is the masked placeholder; set the real password");
        }
        if self.callsign.trim().is_empty() {
            bail!("callsign is required");
        }
        Ok(())
    }

    /// Apply an update coming from an outer layer.
    ///
    /// A placeholder or empty password in the update keeps the stored
    /// password, so a round-trip through a masked display form never
    /// clobbers the real one.
    pub fn merge_update(&mut self, update: Config) {
        let keep_password =
            update.password.is_empty() || update.password == PASSWORD_PLACEHOLDER;
        let password = if keep_password {
            std::mem::take(&mut self.password)
        } else {
            update.password
        };

        *self = Config { password, ..update };
    }

    /// Copy of the config with the password masked, safe for display
    /// and logging.
    pub fn masked(&self) -> Config {
        Config {
            password: if self.password.is_empty() {
                String::new()
            } else {
                PASSWORD_PLACEHOLDER.to_string()
            },
            ..self.clone()
        }
    }

    /// Credentials snapshot for the submitter.
    pub fn credentials(&self) -> Credentials {
        Credentials {
            username: self.username.clone(),
            password: self.password.clone(),
            callsign: self.callsign.clone(),
        }
    }

    /// UDP port implied by the selected software.
    pub fn udp_port(&self) -> u16 {
        crate::software::port_for(&self.software)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.software, "log4om");
        assert_eq!(config.udp_port(), 2233);
        assert_eq!(config.stats_interval, 30);
        assert!(!config.metrics_enabled);
        assert_eq!(config.metrics_port, 9090);
    }

    #[test]
    fn test_parse_minimal_toml() {
        let toml = r#"
            username = "lu9xyz"
            password = "secret"
            callsign = "LU9XYZ"
        "#;
        let config: Config = toml::from_str(toml).unwrap();
        assert_eq!(config.username, "lu9xyz");
        assert_eq!(config.callsign, "LU9XYZ");
        // Other fields should use defaults
        assert_eq!(config.software, "log4om");
        assert_eq!(config.metrics_port, 9090);
    }

    #[test]
    fn test_parse_full_toml() {
        let toml = r#"
            username = "lu9xyz"
            password = "secret"
            callsign = "LU9XYZ"
            software = "n1mm"
            stats_interval = 60
            metrics_enabled = true
            metrics_port = 9091
        "#;
        let config: Config = toml::from_str(toml).unwrap();
        assert_eq!(config.software, "n1mm");
        assert_eq!(config.udp_port(), 12060);
        assert_eq!(config.stats_interval, 60);
        assert!(config.metrics_enabled);
        assert_eq!(config.metrics_port, 9091);
    }

    #[test]
    fn test_validate_requires_credentials() {
        let mut config = Config::default();
        assert!(config.validate().is_err());

        config.username = "lu9xyz".to_string();
        config.password = "secret".to_string();
        config.callsign = "LU9XYZ".to_string();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_placeholder_password() {
        let config = Config {
            username: "lu9xyz".to_string(),
            password: PASSWORD_PLACEHOLDER.to_string(),
            callsign: "LU9XYZ".to_string(),
            ..Config::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_merge_keeps_password_on_placeholder() {
        let mut config = Config {
            username: "lu9xyz".to_string(),
            password: "secret".to_string(),
            callsign: "LU9XYZ".to_string(),
            ..Config::default()
        };

        let update = Config {
            username: "lu9xyz".to_string(),
            password: PASSWORD_PLACEHOLDER.to_string(),
            callsign: "LU9XYZ".to_string(),
            software: "wsjtx".to_string(),
            ..Config::default()
        };
        config.merge_update(update);

        assert_eq!(config.password, "secret");
        assert_eq!(config.software, "wsjtx");
    }

    #[test]
    fn test_merge_replaces_real_password() {
        let mut config = Config {
            password: "old".to_string(),
            ..Config::default()
        };
        config.merge_update(Config {
            password: "new".to_string(),
            ..Config::default()
        });
        assert_eq!(config.password, "new");
    }

    #[test]
    fn test_masked_hides_password() {
        let config = Config {
            password: "secret".to_string(),
            ..Config::default()
        };
        assert_eq!(config.masked().password, PASSWORD_PLACEHOLDER);
        assert_eq!(Config::default().masked().password, "");
    }

    #[test]
    fn test_credentials_snapshot() {
        let config = Config {
            username: "lu9xyz".to_string(),
            password: "secret".to_string(),
            callsign: "LU9XYZ".to_string(),
            ..Config::default()
        };
        let creds = config.credentials();
        assert_eq!(creds.username, "lu9xyz");
        assert_eq!(creds.password, "secret");
        assert_eq!(creds.callsign, "LU9XYZ");
    }
}
