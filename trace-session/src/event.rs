// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::fmt;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

/// Debug session lifecycle notification.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum LifecycleEvent {
    /// A session is starting. `None` if no launch configuration is available.
    Initializing(Option<SessionConfig>),
    Running,
    Stopped,
    Terminated,
}

impl fmt::Display for LifecycleEvent {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let s = match self {
            Self::Initializing(..) => "LifecycleEvent::Initializing",
            Self::Running => "LifecycleEvent::Running",
            Self::Stopped => "LifecycleEvent::Stopped",
            Self::Terminated => "LifecycleEvent::Terminated",
        };
        write!(f, "{}", s)
    }
}

/// The subset of a debug session's launch configuration used for tracing.
#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionConfig {
    /// Debugger type of the session, e.g. `cortex-debug`.
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub debugger: Option<String>,

    /// GDB server flavor, which selects the trace backend.
    #[serde(alias = "servertype", default)]
    pub server_type: String,

    #[serde(default)]
    pub executable: String,

    /// Target device name as known to the probe vendor.
    #[serde(default)]
    pub device: String,

    /// Probe interface, e.g. `swd` or `jtag`.
    #[serde(default)]
    pub interface: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub toolchain_path: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub trace_source: Option<String>,

    /// Probe speed in kHz.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub speed: Option<u32>,
}

impl SessionConfig {
    /// Parse a launch configuration, ignoring keys unrelated to tracing.
    ///
    /// The configuration must be a JSON object.
    pub fn from_launch_config(data: &[u8]) -> Result<Self> {
        let value: serde_json::Value =
            serde_json::from_slice(data).context("invalid launch configuration")?;

        if !value.is_object() {
            anyhow::bail!("launch configuration is not an object");
        }

        serde_json::from_value(value).context("invalid launch configuration")
    }
}
