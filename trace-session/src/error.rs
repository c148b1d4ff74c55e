// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum TraceError {
    #[error("invalid trace configuration for device `{device}`: {reason}")]
    Configuration { device: String, reason: String },

    #[error("unable to connect to trace probe for device `{device}` over {interface}")]
    Connection {
        device: String,
        interface: String,

        #[source]
        source: anyhow::Error,
    },

    #[error("unable to resolve symbols of `{function}`")]
    SymbolResolution {
        function: String,

        #[source]
        source: anyhow::Error,
    },
}

impl TraceError {
    /// Whether restarting the debug session can fix the error.
    pub fn is_recoverable(&self) -> bool {
        !matches!(self, TraceError::Configuration { .. })
    }
}
