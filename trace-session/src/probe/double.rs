// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::sync::{Arc, Mutex};

use super::*;

#[derive(Clone, Debug, Eq, PartialEq)]
pub enum ProbeCall {
    SetAndGetMemoryMap(String),
    Init,
    Connect(ConnectOptions),
    Start,
    Stop,
    Deinit,
    GetInstStats(usize),
}

/// Calls made on one probe. Shared so it outlives the backend that owns the probe.
#[derive(Clone, Debug, Default)]
pub struct CallLog(Arc<Mutex<Vec<ProbeCall>>>);

impl CallLog {
    pub fn push(&self, call: ProbeCall) {
        self.0.lock().unwrap().push(call);
    }

    pub fn calls(&self) -> Vec<ProbeCall> {
        self.0.lock().unwrap().clone()
    }

    pub fn count(&self, call: &ProbeCall) -> usize {
        self.0.lock().unwrap().iter().filter(|c| *c == call).count()
    }

    pub fn reads(&self) -> usize {
        self.0
            .lock()
            .unwrap()
            .iter()
            .filter(|c| matches!(c, ProbeCall::GetInstStats(..)))
            .count()
    }
}

#[derive(Clone, Debug, Default)]
pub struct ProbeDouble {
    pub memory_map: Vec<MemoryMap>,
    pub fail_init: bool,
    pub fail_connect: bool,
    pub fail_read: bool,

    /// Counter values reported by every read. Shared between clones.
    pub counters: Arc<Mutex<Vec<u64>>>,

    pub log: CallLog,
}

impl ProbeDouble {
    pub fn with_region(address: u32, size: u32) -> Self {
        Self {
            memory_map: vec![MemoryMap::new(address, size)],
            ..Self::default()
        }
    }

    pub fn set_counters(&self, counters: &[u64]) {
        *self.counters.lock().unwrap() = counters.to_vec();
    }
}

impl IProbe for ProbeDouble {
    fn set_and_get_memory_map(&mut self, device: &str) -> Result<Vec<MemoryMap>> {
        self.log.push(ProbeCall::SetAndGetMemoryMap(device.to_owned()));
        Ok(self.memory_map.clone())
    }

    fn init(&mut self) -> Result<()> {
        self.log.push(ProbeCall::Init);

        if self.fail_init {
            anyhow::bail!("probe init failed");
        }

        Ok(())
    }

    fn connect(&mut self, options: &ConnectOptions) -> Result<()> {
        self.log.push(ProbeCall::Connect(*options));

        if self.fail_connect {
            anyhow::bail!("no probe attached");
        }

        Ok(())
    }

    fn start(&mut self) -> Result<()> {
        self.log.push(ProbeCall::Start);
        Ok(())
    }

    fn stop(&mut self) -> Result<()> {
        self.log.push(ProbeCall::Stop);
        Ok(())
    }

    fn deinit(&mut self) {
        self.log.push(ProbeCall::Deinit);
    }

    fn get_inst_stats(&mut self, region: usize, counters: &mut [u64]) -> Result<()> {
        self.log.push(ProbeCall::GetInstStats(region));

        if self.fail_read {
            anyhow::bail!("probe disconnected");
        }

        let values = self.counters.lock().unwrap();
        let n = usize::min(values.len(), counters.len());
        counters[..n].copy_from_slice(&values[..n]);

        Ok(())
    }
}

#[derive(Clone, Debug, Default)]
pub struct ProbeLoaderDouble {
    /// Every loaded probe is a clone of this one with a fresh call log.
    pub template: ProbeDouble,

    pub fail: bool,

    /// Call logs of loaded probes, in load order. Shared between clones.
    pub loaded: Arc<Mutex<Vec<CallLog>>>,
}

impl ProbeLoaderDouble {
    pub fn new(template: ProbeDouble) -> Self {
        Self {
            template,
            ..Self::default()
        }
    }

    pub fn loaded(&self) -> Vec<CallLog> {
        self.loaded.lock().unwrap().clone()
    }
}

impl IProbeLoader for ProbeLoaderDouble {
    fn load(&mut self) -> Result<Box<dyn IProbe>> {
        if self.fail {
            anyhow::bail!("probe library not found");
        }

        let probe = ProbeDouble {
            log: CallLog::default(),
            ..self.template.clone()
        };
        self.loaded.lock().unwrap().push(probe.log.clone());

        Ok(Box::new(probe))
    }
}
