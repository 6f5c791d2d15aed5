//! Link configuration
//!
//! All timings are stored in milliseconds so the yaml file stays readable:
//!
//! ```yaml
//! drone_addr: "192.168.10.1:8889"
//! control_bind: "0.0.0.0:8889"
//! telemetry_bind: "0.0.0.0:8890"
//! video_bind: "0.0.0.0:11111"
//! telemetry_probe_ms: 2000
//! keep_alive_period_ms: 10000
//! idle_threshold_ms: 13000
//! keep_alive_timeout_ms: 3000
//! handshake_timeout_ms: 5000
//! command_timeout_ms: 20000
//! ```

use serde::{Deserialize, Serialize};
use std::{fs, net::SocketAddr, path::Path, time::Duration};

use crate::{Result, TelloError};

pub const SDK_PORT: u16 = 8889;
pub const TELEMETRY_PORT: u16 = 8890;
pub const VIDEO_PORT: u16 = 11111;

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct LinkConfig {
    /// address of the drone's command port
    pub drone_addr: SocketAddr,
    /// local address of the control socket, replies arrive here
    pub control_bind: SocketAddr,
    pub telemetry_bind: SocketAddr,
    pub video_bind: SocketAddr,

    /// how long connect() listens for telemetry before falling back to the handshake
    pub telemetry_probe_ms: u64,
    pub keep_alive_period_ms: u64,
    /// a keep-alive is only sent when no command went out for longer than this
    pub idle_threshold_ms: u64,
    pub keep_alive_timeout_ms: u64,
    pub handshake_timeout_ms: u64,
    /// timeout for commands without a distance based timeout (takeoff, land, flip, ...)
    pub command_timeout_ms: u64,
}

impl Default for LinkConfig {
    fn default() -> Self {
        Self {
            drone_addr: SocketAddr::from(([192, 168, 10, 1], SDK_PORT)),
            control_bind: SocketAddr::from(([0, 0, 0, 0], SDK_PORT)),
            telemetry_bind: SocketAddr::from(([0, 0, 0, 0], TELEMETRY_PORT)),
            video_bind: SocketAddr::from(([0, 0, 0, 0], VIDEO_PORT)),
            telemetry_probe_ms: 2_000,
            keep_alive_period_ms: 10_000,
            idle_threshold_ms: 13_000,
            keep_alive_timeout_ms: 3_000,
            handshake_timeout_ms: 5_000,
            command_timeout_ms: 20_000,
        }
    }
}

impl LinkConfig {
    pub fn from_yaml_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path)
            .map_err(|e| TelloError::Config(format!("Failed to read {}: {}", path.display(), e)))?;
        Self::from_yaml_str(&contents)
    }

    pub fn from_yaml_str(contents: &str) -> Result<Self> {
        let config: LinkConfig = serde_yaml::from_str(contents)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.keep_alive_period_ms == 0 {
            return Err(TelloError::Config("keep_alive_period_ms must be positive".into()));
        }
        if self.handshake_timeout_ms == 0 || self.command_timeout_ms == 0 {
            return Err(TelloError::Config("command timeouts must be positive".into()));
        }
        Ok(())
    }

    pub fn telemetry_probe(&self) -> Duration {
        Duration::from_millis(self.telemetry_probe_ms)
    }
    pub fn keep_alive_period(&self) -> Duration {
        Duration::from_millis(self.keep_alive_period_ms)
    }
    pub fn idle_threshold(&self) -> Duration {
        Duration::from_millis(self.idle_threshold_ms)
    }
    pub fn keep_alive_timeout(&self) -> Duration {
        Duration::from_millis(self.keep_alive_timeout_ms)
    }
    pub fn handshake_timeout(&self) -> Duration {
        Duration::from_millis(self.handshake_timeout_ms)
    }
    pub fn command_timeout(&self) -> Duration {
        Duration::from_millis(self.command_timeout_ms)
    }
}
