// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::fmt;

use anyhow::Result;
use downcast_rs::Downcast;
use trace_view::MemoryMap;

/// Debug interface between probe and target, as encoded by the probe library.
#[derive(Clone, Copy, Debug, Default, Eq, Hash, PartialEq)]
#[repr(u32)]
pub enum InterfaceId {
    #[default]
    Jtag = 0,
    Swd = 1,
    CJtag = 7,
}

impl InterfaceId {
    /// Case-insensitive parse. Unknown names fall back to JTAG.
    pub fn parse(name: &str) -> Self {
        match name.to_ascii_lowercase().as_str() {
            "swd" => Self::Swd,
            "cjtag" => Self::CJtag,
            "jtag" => Self::Jtag,
            _ => Self::default(),
        }
    }

    pub fn code(self) -> u32 {
        self as u32
    }
}

impl fmt::Display for InterfaceId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let s = match self {
            Self::Jtag => "JTAG",
            Self::Swd => "SWD",
            Self::CJtag => "cJTAG",
        };
        write!(f, "{}", s)
    }
}

/// Source of trace data, as encoded by the probe library.
#[derive(Clone, Copy, Debug, Default, Eq, Hash, PartialEq)]
#[repr(u32)]
pub enum TraceSource {
    #[default]
    Etb = 0,
    Etm = 1,
    Mtb = 2,
    Swo = 3,
}

impl TraceSource {
    /// Case-insensitive parse. Unknown names fall back to ETB.
    pub fn parse(name: &str) -> Self {
        match name.to_ascii_lowercase().as_str() {
            "etm" => Self::Etm,
            "mtb" => Self::Mtb,
            "swo" => Self::Swo,
            "etb" => Self::Etb,
            _ => Self::default(),
        }
    }

    pub fn code(self) -> u32 {
        self as u32
    }
}

impl fmt::Display for TraceSource {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let s = match self {
            Self::Etb => "ETB",
            Self::Etm => "ETM",
            Self::Mtb => "MTB",
            Self::Swo => "SWO",
        };
        write!(f, "{}", s)
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct ConnectOptions {
    pub interface: InterfaceId,
    pub speed_khz: u32,
    pub port_mask: u32,
    pub port_width: u32,
    pub trace_source: TraceSource,
}

/// Binding to the vendor trace probe library.
///
/// Calls are synchronous and may block briefly on USB traffic.
pub trait IProbe: Downcast + Send {
    /// Select the target device and return its traceable memory regions.
    fn set_and_get_memory_map(&mut self, device: &str) -> Result<Vec<MemoryMap>>;

    fn init(&mut self) -> Result<()>;

    fn connect(&mut self, options: &ConnectOptions) -> Result<()>;

    fn start(&mut self) -> Result<()>;

    fn stop(&mut self) -> Result<()>;

    /// Release the library handle. Must be safe to call without a prior `init()`.
    fn deinit(&mut self);

    /// Copy the cumulative execution counters of memory region `region` into `counters`.
    fn get_inst_stats(&mut self, region: usize, counters: &mut [u64]) -> Result<()>;
}

impl_downcast!(IProbe);

/// Opens the probe library for a new hardware backend.
pub trait IProbeLoader: Downcast + Send {
    fn load(&mut self) -> Result<Box<dyn IProbe>>;
}

impl_downcast!(IProbeLoader);

#[cfg(test)]
pub mod double;
