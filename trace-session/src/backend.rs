// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::sync::Arc;

use anyhow::{format_err, Result};
use trace_view::{aggregate, CounterBuffer, MemoryMap, SymbolTable, TraceSample};

use crate::config::ControllerConfig;
use crate::error::TraceError;
use crate::event::SessionConfig;
use crate::probe::{ConnectOptions, IProbe, InterfaceId, TraceSource};
use crate::symbols::{ISymbolProvider, SymbolLoader};

/// The one trace backend of a session.
pub enum Backend {
    JTrace(JTrace),
    Null(NullBackend),
}

impl Backend {
    pub fn null() -> Self {
        Backend::Null(NullBackend)
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::JTrace(..) => "jtrace",
            Self::Null(..) => "null",
        }
    }

    /// Connect and start tracing. Succeeds at once if already connected.
    pub fn connect(&mut self) -> Result<(), TraceError> {
        match self {
            Self::JTrace(b) => b.connect(),
            Self::Null(..) => Ok(()),
        }
    }

    pub fn start(&mut self) {
        if let Self::JTrace(b) = self {
            b.start();
        }
    }

    pub fn stop(&mut self) {
        if let Self::JTrace(b) = self {
            b.stop();
        }
    }

    /// Current non-zero counts, or nothing if the backend is not connected.
    pub fn read_counts(&mut self) -> Vec<TraceSample> {
        match self {
            Self::JTrace(b) => b.read_counts(),
            Self::Null(..) => vec![],
        }
    }

    pub fn teardown(&mut self) {
        if let Self::JTrace(b) = self {
            b.teardown();
        }
    }

    pub fn is_connected(&self) -> bool {
        match self {
            Self::JTrace(b) => b.is_connected(),
            Self::Null(..) => false,
        }
    }

    /// Whether a connection attempt has failed. Cleared only by a new backend.
    pub fn connect_failed(&self) -> bool {
        match self {
            Self::JTrace(b) => b.connect_failed(),
            Self::Null(..) => false,
        }
    }
}

impl Default for Backend {
    fn default() -> Self {
        Self::null()
    }
}

impl From<JTrace> for Backend {
    fn from(backend: JTrace) -> Self {
        Backend::JTrace(backend)
    }
}

/// Backend for sessions without trace hardware.
#[derive(Clone, Copy, Debug, Default)]
pub struct NullBackend;

/// Backend driving a J-Trace probe.
pub struct JTrace {
    probe: Box<dyn IProbe>,
    device: String,
    options: ConnectOptions,
    memory_map: MemoryMap,
    counters: CounterBuffer,
    symbols: SymbolTable,
    provider: Option<Arc<dyn ISymbolProvider>>,
    loader: Option<SymbolLoader>,
    resolution_requested: bool,
    connected: bool,
    connect_failed: bool,
    released: bool,
}

impl JTrace {
    /// Select the session's device on `probe` and size the counters to its first memory region.
    ///
    /// On failure the probe is released before returning.
    pub fn new(
        mut probe: Box<dyn IProbe>,
        session: &SessionConfig,
        config: &ControllerConfig,
        provider: Option<Arc<dyn ISymbolProvider>>,
    ) -> Result<Self, TraceError> {
        let device = session.device.clone();

        let regions = match probe.set_and_get_memory_map(&device) {
            Ok(regions) => regions,
            Err(err) => {
                probe.deinit();
                return Err(TraceError::Configuration {
                    device,
                    reason: format!("unable to read memory map: {}", err),
                });
            }
        };

        let memory_map = match regions.first() {
            Some(region) if region.size > 0 => *region,
            _ => {
                probe.deinit();
                return Err(TraceError::Configuration {
                    device,
                    reason: "device has no traceable memory region".to_owned(),
                });
            }
        };

        if regions.len() > 1 {
            warn!(
                "tracing only the first of {} memory regions: {}",
                regions.len(),
                memory_map
            );
        }

        let unit = config.instruction_unit_size;

        let trace_source = session
            .trace_source
            .as_deref()
            .map(TraceSource::parse)
            .unwrap_or_default();

        let options = ConnectOptions {
            interface: InterfaceId::parse(&session.interface),
            speed_khz: session.speed.unwrap_or(config.default_speed_khz),
            port_mask: config.port_mask,
            port_width: config.port_width,
            trace_source,
        };

        let counters = CounterBuffer::new(&memory_map, unit);
        let symbols = SymbolTable::new(&memory_map, unit);

        info!(
            "trace backend for {}: region {}, {} counter slots, {:?}",
            device,
            memory_map,
            counters.len(),
            options
        );

        Ok(Self {
            probe,
            device,
            options,
            memory_map,
            counters,
            symbols,
            provider,
            loader: None,
            resolution_requested: false,
            connected: false,
            connect_failed: false,
            released: false,
        })
    }

    pub fn device(&self) -> &str {
        &self.device
    }

    pub fn options(&self) -> &ConnectOptions {
        &self.options
    }

    pub fn memory_map(&self) -> &MemoryMap {
        &self.memory_map
    }

    pub fn counters(&self) -> &CounterBuffer {
        &self.counters
    }

    pub fn symbols(&self) -> &SymbolTable {
        &self.symbols
    }

    pub fn is_connected(&self) -> bool {
        self.connected
    }

    pub fn connect_failed(&self) -> bool {
        self.connect_failed
    }

    /// Initialize the probe, connect and start tracing.
    ///
    /// The probe is only ever initialized once. After a failure every later call fails without
    /// touching the probe.
    pub fn connect(&mut self) -> Result<(), TraceError> {
        if self.connected {
            return Ok(());
        }

        let result = if self.released {
            Err(format_err!("trace probe already released"))
        } else if self.connect_failed {
            Err(format_err!("an earlier connection attempt failed"))
        } else {
            let result = self.try_connect();
            self.connect_failed = result.is_err();
            result
        };

        if let Err(source) = result {
            let err = TraceError::Connection {
                device: self.device.clone(),
                interface: self.options.interface.to_string(),
                source,
            };
            error!("{:?}", err);

            return Err(err);
        }

        info!(
            "tracing {} over {} at {} kHz",
            self.device, self.options.interface, self.options.speed_khz
        );
        self.connected = true;

        Ok(())
    }

    fn try_connect(&mut self) -> Result<()> {
        self.probe.init()?;
        self.probe.connect(&self.options)?;
        self.probe.start()?;

        Ok(())
    }

    pub fn start(&mut self) {
        if !self.connected {
            return;
        }

        if let Err(err) = self.probe.start() {
            warn!("unable to restart trace: {:?}", err);
        }
    }

    /// Stop collecting. Safe to call when the target has already stopped the trace.
    pub fn stop(&mut self) {
        if !self.connected {
            return;
        }

        if let Err(err) = self.probe.stop() {
            debug!("trace stop failed: {:?}", err);
        }
    }

    pub fn read_counts(&mut self) -> Vec<TraceSample> {
        if !self.connected {
            return vec![];
        }

        if let Err(err) = self.probe.get_inst_stats(0, self.counters.as_mut_slice()) {
            debug!("skipping counter read: {:?}", err);
            return vec![];
        }

        trace!(
            "{} of {} counter slots hit",
            self.counters.hit(),
            self.counters.len()
        );

        self.request_symbols();

        if let Some(loader) = &mut self.loader {
            let applied = loader.drain_into(&mut self.symbols);

            if applied > 0 {
                debug!(
                    "symbol table: {} of {} slots resolved",
                    self.symbols.resolved(),
                    self.symbols.len()
                );
            }
        }

        aggregate(self.counters.as_slice(), self.symbols.entries())
    }

    // At most once per backend, and only while a debug session can answer.
    fn request_symbols(&mut self) {
        if self.resolution_requested {
            return;
        }

        let provider = match &self.provider {
            Some(provider) if provider.is_session_active() => provider.clone(),
            _ => return,
        };

        self.resolution_requested = true;
        self.loader = Some(SymbolLoader::spawn(provider));
    }

    /// Stop and disconnect if connected, then release the probe.
    ///
    /// Later calls do nothing.
    pub fn teardown(&mut self) {
        if self.released {
            return;
        }

        if self.connected {
            self.stop();
            self.connected = false;
        }

        if let Some(mut loader) = self.loader.take() {
            loader.cancel();
        }
        self.provider = None;

        self.probe.deinit();
        self.released = true;

        info!("released trace probe for {}", self.device);
    }
}

impl Drop for JTrace {
    fn drop(&mut self) {
        if !self.released {
            warn!("trace backend for {} dropped without teardown", self.device);
            self.teardown();
        }
    }
}
