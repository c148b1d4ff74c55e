// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use tokio::sync::Semaphore;

use super::*;

pub struct SymbolProviderDouble {
    pub active: bool,
    pub functions: Vec<FunctionSymbol>,
    pub instructions: HashMap<String, Vec<Instruction>>,

    /// Functions whose disassembly fails.
    pub failing: HashSet<String>,

    /// When set, each `disassemble()` waits for a permit before answering.
    pub gate: Option<Arc<Semaphore>>,

    /// Number of `functions()` requests received.
    pub listed: AtomicUsize,
}

impl Default for SymbolProviderDouble {
    fn default() -> Self {
        Self {
            active: true,
            functions: vec![],
            instructions: HashMap::new(),
            failing: HashSet::new(),
            gate: None,
            listed: AtomicUsize::new(0),
        }
    }
}

impl SymbolProviderDouble {
    pub fn with_function(mut self, name: &str, file: &str, instructions: &[Instruction]) -> Self {
        self.functions.push(FunctionSymbol::new(name, file));
        self.instructions
            .insert(name.to_owned(), instructions.to_vec());
        self
    }

    pub fn gated(mut self) -> (Self, Arc<Semaphore>) {
        let gate = Arc::new(Semaphore::new(0));
        self.gate = Some(gate.clone());
        (self, gate)
    }

    pub fn listed(&self) -> usize {
        self.listed.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ISymbolProvider for SymbolProviderDouble {
    fn is_session_active(&self) -> bool {
        self.active
    }

    async fn functions(&self) -> Result<Vec<FunctionSymbol>> {
        self.listed.fetch_add(1, Ordering::SeqCst);
        Ok(self.functions.clone())
    }

    async fn disassemble(&self, function: &FunctionSymbol) -> Result<Vec<Instruction>> {
        if let Some(gate) = &self.gate {
            let _permit = gate.acquire().await?;
        }

        if self.failing.contains(&function.name) {
            anyhow::bail!("disassemble request failed");
        }

        self.instructions
            .get(&function.name)
            .cloned()
            .ok_or_else(|| format_err!("unknown function: {}", function.name))
    }
}

/// Hands out providers by executable and records each request.
#[derive(Clone, Default)]
pub struct SymbolProviderFactoryDouble {
    pub providers: HashMap<String, Arc<dyn ISymbolProvider>>,

    /// Executables requested, in order. Shared between clones.
    pub requested: Arc<Mutex<Vec<String>>>,
}

impl SymbolProviderFactoryDouble {
    pub fn with_provider(mut self, executable: &str, provider: Arc<dyn ISymbolProvider>) -> Self {
        self.providers.insert(executable.to_owned(), provider);
        self
    }

    pub fn requested(&self) -> Vec<String> {
        self.requested.lock().unwrap().clone()
    }
}

impl ISymbolProviderFactory for SymbolProviderFactoryDouble {
    fn for_session(&mut self, session: &SessionConfig) -> Option<Arc<dyn ISymbolProvider>> {
        self.requested
            .lock()
            .unwrap()
            .push(session.executable.clone());

        self.providers.get(&session.executable).cloned()
    }
}
