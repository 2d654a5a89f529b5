use std::collections::HashMap;
use std::{env, fmt, fs, path};

use serde::{Deserialize, Serialize};

use crate::alerting::SenderIdentity;

#[derive(Debug)]
pub enum Error {
    ReadFailed(()),
    WriteFailed(()),
    ParseFailed(()),
    ConfigPathUnavailable,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub http: Http,
    #[serde(default)]
    pub database: Database,
    #[serde(default)]
    pub monitoring: Monitoring,
    #[serde(default)]
    pub alerting: Alerting,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct Http {
    pub bind: String,
    pub port: u16,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct Database {
    pub path: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct Monitoring {
    /// Seconds between check cycles
    pub interval_seconds: u64,
    /// HTTP probe timeout
    pub probe_timeout_seconds: u64,
    /// TCP fallback probe timeout
    pub tcp_timeout_seconds: u64,
    /// Continuous downtime before a down-alert fires
    pub alert_after_minutes: i64,
    /// Retained status changes per monitor
    pub history_cap: usize,
    /// Monitor names checked by an external edge prober instead of the
    /// local loop
    pub edge_monitors: Vec<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct Alerting {
    /// Transactional-email HTTP API endpoint
    pub endpoint: String,
    /// Default from-address
    pub from: String,
    /// Default API credential; empty disables the default sender
    pub token: String,
    /// Per-recipient sender identities (address -> identity)
    #[serde(default)]
    pub senders: HashMap<String, SenderIdentity>,
}

impl Default for Http {
    fn default() -> Self {
        Self { bind: "0.0.0.0".into(), port: 8080 }
    }
}

impl Default for Database {
    fn default() -> Self {
        Self { path: "watchpost.db".into() }
    }
}

impl Default for Monitoring {
    fn default() -> Self {
        Self {
            interval_seconds: 60,
            probe_timeout_seconds: 10,
            tcp_timeout_seconds: 5,
            alert_after_minutes: 2,
            history_cap: 500,
            edge_monitors: Vec::new(),
        }
    }
}

impl Default for Alerting {
    fn default() -> Self {
        Self {
            endpoint: String::new(),
            from: "alerts@localhost".into(),
            token: String::new(),
            senders: HashMap::new(),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            http: Http::default(),
            database: Database::default(),
            monitoring: Monitoring::default(),
            alerting: Alerting::default(),
        }
    }
}

impl Config {
    /// Default sender identity, unless alerting is left unconfigured
    pub fn default_sender(&self) -> Option<SenderIdentity> {
        if self.alerting.token.is_empty() {
            return None;
        }
        Some(SenderIdentity {
            from: self.alerting.from.clone(),
            token: self.alerting.token.clone(),
        })
    }
}

/// Used to ensure we are actually reading a toml file
fn normalize_toml_path(path: &path::Path) -> path::PathBuf {
    let mut path = path.to_path_buf();
    if path.extension().map(|ext| ext != "toml").unwrap_or(true) {
        path.set_extension("toml");
    }
    path
}

/// Get default config path ($XDG_CONFIG_HOME/watchpost/config.toml or
/// $HOME/.config/...)
fn default_config_path() -> Result<path::PathBuf, Error> {
    let path = if let Ok(config_home) = env::var("XDG_CONFIG_HOME") {
        path::PathBuf::from(config_home)
    } else if let Some(home_dir) = env::home_dir() {
        home_dir.join(".config")
    } else {
        return Err(Error::ConfigPathUnavailable);
    };

    Ok(path.join("watchpost/config.toml"))
}

impl fmt::Display for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let write_indented = |level: usize| {
            move |f: &mut fmt::Formatter<'_>, label: &str, value: &dyn fmt::Display| {
                writeln!(f, "  {:indent$}{}: {}", "", label, value, indent = level * 2)
            }
        };
        let write_title_indented = |level: usize| {
            move |f: &mut fmt::Formatter<'_>, label: &str| {
                writeln!(f, "{:indent$}{}", "", label, indent = level * 2)
            }
        };

        let write_title_1 = write_title_indented(1);
        let write_1 = write_indented(1);

        writeln!(f, "Current Internal Configuration State:")?;
        write_title_1(f, "HTTP")?;
        write_1(f, "Bind Address", &self.http.bind)?;
        write_1(f, "Port", &self.http.port)?;
        write_title_1(f, "Database")?;
        write_1(f, "Path", &self.database.path)?;
        write_title_1(f, "Monitoring")?;
        write_1(f, "Check Interval (s)", &self.monitoring.interval_seconds)?;
        write_1(f, "Probe Timeout (s)", &self.monitoring.probe_timeout_seconds)?;
        write_1(f, "Alert Threshold (min)", &self.monitoring.alert_after_minutes)?;
        write_1(f, "History Cap", &self.monitoring.history_cap)?;
        write_1(f, "Edge Monitors", &self.monitoring.edge_monitors.len())?;
        write_title_1(f, "Alerting")?;
        write_1(f, "Endpoint", &self.alerting.endpoint)?;
        write_1(f, "From", &self.alerting.from)?;
        write_1(f, "Per-recipient Senders", &self.alerting.senders.len())?;

        Ok(())
    }
}

impl Config {
    /// Generate Config structure from file
    ///
    /// Creates a default config in ~/.config/watchpost/config.toml
    ///  or the specified path, with the name config.toml if one does not exist
    pub fn from_config(optional_path: Option<impl AsRef<path::Path>>) -> Result<Self, Error> {
        let config_path: path::PathBuf = if let Some(path) = optional_path {
            normalize_toml_path(path.as_ref())
        } else {
            default_config_path()?
        };

        if config_path.exists() {
            let raw_string =
                fs::read_to_string(&config_path).map_err(|_err| Error::ReadFailed(()))?;
            toml::from_str(raw_string.as_str()).map_err(|_err| Error::ParseFailed(()))
        } else {
            let config = Self::default();
            config.write_config(&config_path)?;
            Ok(config)
        }
    }

    /// Serialize and write a config to a file
    pub fn write_config(&self, path: &std::path::Path) -> Result<(), Error> {
        let config_str: String =
            toml::to_string_pretty(self).map_err(|_err| Error::ParseFailed(()))?;

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|_err| Error::WriteFailed(()))?;
        }

        std::fs::write(path, config_str).map_err(|_err| Error::WriteFailed(()))
    }
}
