//! Configuration types for stagecue.
//! Parsed from ~/.stagecue/config.toml.

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

use crate::recurring::WeeklyEntry;
use crate::{ClientError, ConnectionParams};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ClientConfig {
    #[serde(default)]
    pub connection: ConnectionSection,
    #[serde(default)]
    pub session: SessionSection,
    #[serde(default)]
    pub scheduler: SchedulerSection,
}

#[derive(Clone, Serialize, Deserialize)]
pub struct ConnectionSection {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    pub password: Option<String>,
}

impl Default for ConnectionSection {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            password: None,
        }
    }
}

impl std::fmt::Debug for ConnectionSection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionSection")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("password", &self.password.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionSection {
    #[serde(default = "default_10")]
    pub request_timeout_secs: u64,
}

impl Default for SessionSection {
    fn default() -> Self {
        Self {
            request_timeout_secs: 10,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulerSection {
    #[serde(default = "default_30")]
    pub poll_interval_secs: u64,
    #[serde(default)]
    pub entries: Vec<ScheduleEntry>,
}

impl Default for SchedulerSection {
    fn default() -> Self {
        Self {
            poll_interval_secs: 30,
            entries: Vec::new(),
        }
    }
}

/// One weekly start, e.g. `{ day = "wednesday", time = "19:00" }`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScheduleEntry {
    pub day: String,
    pub time: String,
}

// Default value functions
fn default_host() -> String {
    "localhost".into()
}
fn default_port() -> u16 {
    stagecue_protocol::DEFAULT_PORT
}
fn default_10() -> u64 {
    10
}
fn default_30() -> u64 {
    30
}

impl ClientConfig {
    /// Load config from file, or use defaults if missing.
    pub fn load_or_default(path: &Path) -> anyhow::Result<Self> {
        if path.exists() {
            let content = std::fs::read_to_string(path)?;
            let config: ClientConfig = toml::from_str(&content)?;
            Ok(config)
        } else {
            Ok(Self::default())
        }
    }

    /// Command-line values win over the file.
    pub fn with_overrides(
        mut self,
        host: Option<String>,
        port: Option<u16>,
        password: Option<String>,
    ) -> Self {
        if let Some(host) = host {
            self.connection.host = host;
        }
        if let Some(port) = port {
            self.connection.port = port;
        }
        if password.is_some() {
            self.connection.password = password;
        }
        self
    }

    pub fn connection_params(&self) -> ConnectionParams {
        ConnectionParams {
            host: self.connection.host.clone(),
            port: self.connection.port,
            secret: self.connection.password.clone(),
        }
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.session.request_timeout_secs.max(1))
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.scheduler.poll_interval_secs.max(1))
    }

    pub fn weekly_entries(&self) -> Result<Vec<WeeklyEntry>, ClientError> {
        self.scheduler
            .entries
            .iter()
            .map(|entry| WeeklyEntry::parse(&entry.day, &entry.time))
            .collect()
    }
}
