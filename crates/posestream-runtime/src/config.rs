//! File configuration for the server and viewer binaries
//!
//! JSON, every field optional. Durations are humantime strings (`"50ms"`,
//! `"2s"`).
//!
//! ```json
//! {
//!   "server": { "listen_addr": "127.0.0.1:5001", "send_interval": "50ms",
//!               "joints": ["left_shoulder", "left_elbow"] },
//!   "client": { "server_addr": "127.0.0.1:5001", "stale_after": "500ms" },
//!   "logging": { "level": "info", "json": false }
//! }
//! ```

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use posestream_core::{JointId, JointSet, PoseError, PoseResult};
use posestream_transport::{ClientConfig, ServerConfig};

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FileConfig {
    pub server: ServerSection,
    pub client: ClientSection,
    pub logging: LoggingConfig,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ServerSection {
    pub listen_addr: String,
    #[serde(with = "duration_str")]
    pub send_interval: Duration,
    #[serde(with = "duration_str")]
    pub send_timeout: Duration,
    /// Valid joint names; empty means every joint
    pub joints: Vec<String>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ClientSection {
    pub server_addr: String,
    #[serde(with = "duration_str")]
    pub connect_timeout: Duration,
    #[serde(with = "duration_str")]
    pub stale_after: Duration,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LoggingConfig {
    /// Default filter when `RUST_LOG` is unset
    pub level: String,
    /// One JSON object per line instead of human-readable output
    pub json: bool,
}

impl Default for ServerSection {
    fn default() -> Self {
        let d = ServerConfig::default();
        ServerSection {
            listen_addr: d.listen_addr,
            send_interval: d.send_interval,
            send_timeout: d.send_timeout,
            joints: Vec::new(),
        }
    }
}

impl Default for ClientSection {
    fn default() -> Self {
        let d = ClientConfig::default();
        ClientSection {
            server_addr: d.server_addr,
            connect_timeout: d.connect_timeout,
            stale_after: d.stale_after,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        LoggingConfig {
            level: "info".to_string(),
            json: false,
        }
    }
}

impl FileConfig {
    pub fn from_json_str(s: &str) -> PoseResult<Self> {
        serde_json::from_str(s).map_err(|e| PoseError::Config(e.to_string()))
    }

    pub fn load(path: impl AsRef<Path>) -> PoseResult<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)
            .map_err(|e| PoseError::Config(format!("{}: {}", path.display(), e)))?;
        Self::from_json_str(&raw)
    }

    /// Load `path` if given, defaults otherwise
    pub fn load_or_default(path: Option<&Path>) -> PoseResult<Self> {
        match path {
            Some(p) => Self::load(p),
            None => Ok(Self::default()),
        }
    }

    pub fn server_config(&self) -> PoseResult<ServerConfig> {
        let s = &self.server;
        let joints = if s.joints.is_empty() {
            JointSet::all()
        } else {
            JointSet::from_names(&s.joints)?
        };
        let config = ServerConfig {
            listen_addr: s.listen_addr.clone(),
            send_interval: s.send_interval,
            send_timeout: s.send_timeout,
            joints,
        };
        config.validate()?;
        Ok(config)
    }

    pub fn client_config(&self) -> ClientConfig {
        ClientConfig {
            server_addr: self.client.server_addr.clone(),
            connect_timeout: self.client.connect_timeout,
            stale_after: self.client.stale_after,
        }
    }
}

/// Names of every joint, for config templates
pub fn all_joint_names() -> Vec<String> {
    JointId::ALL.iter().map(|j| j.as_str().to_string()).collect()
}

mod duration_str {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(&humantime::format_duration(*d).to_string())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        let raw = String::deserialize(d)?;
        humantime::parse_duration(&raw).map_err(serde::de::Error::custom)
    }
}
