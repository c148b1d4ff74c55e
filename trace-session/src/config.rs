// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::env;
use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use trace_view::DEFAULT_INSTRUCTION_UNIT_SIZE;

/// Environment variable naming a JSON controller config file.
pub const CONFIG_ENV_VAR: &str = "TRACE_SESSION_CONFIG";

const DEFAULT_SAMPLING_INTERVAL_MS: u64 = 250;
const DEFAULT_SPEED_KHZ: u32 = 20000;
const DEFAULT_PORT_MASK: u32 = 0x1;
const DEFAULT_PORT_WIDTH: u32 = 4;

#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(default)]
pub struct ControllerConfig {
    /// Period of the counter refresh while the target runs.
    pub sampling_interval_ms: u64,

    /// Probe speed used when the session does not set one.
    pub default_speed_khz: u32,

    /// Trace port pins to enable.
    pub port_mask: u32,

    /// Trace port width in bits.
    pub port_width: u32,

    /// Bytes covered by one counter slot.
    pub instruction_unit_size: u32,

    /// Session server types served by the hardware probe backend.
    pub server_types: Vec<String>,

    /// Debugger types whose sessions are followed. Sessions without a type are always followed.
    pub debuggers: Vec<String>,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            sampling_interval_ms: DEFAULT_SAMPLING_INTERVAL_MS,
            default_speed_khz: DEFAULT_SPEED_KHZ,
            port_mask: DEFAULT_PORT_MASK,
            port_width: DEFAULT_PORT_WIDTH,
            instruction_unit_size: DEFAULT_INSTRUCTION_UNIT_SIZE,
            server_types: vec!["jlink".to_owned()],
            debuggers: vec!["cortex-debug".to_owned()],
        }
    }
}

impl ControllerConfig {
    pub fn new(data: &[u8]) -> Result<Self> {
        let config: Self = serde_json::from_slice(data)?;
        config.validate()?;
        Ok(config)
    }

    pub async fn from_file(config_path: impl AsRef<Path>) -> Result<Self> {
        let config_path = config_path.as_ref();
        let data = tokio::fs::read(config_path)
            .await
            .with_context(|| format!("unable to read config file: {}", config_path.display()))?;

        Self::new(&data)
            .with_context(|| format!("invalid config file: {}", config_path.display()))
    }

    /// Load from the file named by `TRACE_SESSION_CONFIG`, or use defaults if it is unset.
    pub async fn from_env() -> Result<Self> {
        match env::var_os(CONFIG_ENV_VAR) {
            Some(path) => Self::from_file(path).await,
            None => {
                debug!("{} not set, using default controller config", CONFIG_ENV_VAR);
                Ok(Self::default())
            }
        }
    }

    pub fn sampling_interval(&self) -> Duration {
        Duration::from_millis(self.sampling_interval_ms)
    }

    /// Whether sessions of `server_type` get the hardware probe backend.
    pub fn is_probe_server(&self, server_type: &str) -> bool {
        self.server_types
            .iter()
            .any(|s| s.eq_ignore_ascii_case(server_type))
    }

    /// Whether sessions of the given debugger type are followed.
    pub fn follows(&self, debugger: Option<&str>) -> bool {
        match debugger {
            Some(debugger) => self.debuggers.iter().any(|d| d == debugger),
            None => true,
        }
    }

    fn validate(&self) -> Result<()> {
        if self.sampling_interval_ms == 0 {
            anyhow::bail!("sampling_interval_ms must be non-zero");
        }

        if self.instruction_unit_size == 0 {
            anyhow::bail!("instruction_unit_size must be non-zero");
        }

        if self.port_width == 0 {
            anyhow::bail!("port_width must be non-zero");
        }

        Ok(())
    }
}
