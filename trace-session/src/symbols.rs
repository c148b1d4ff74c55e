// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{format_err, Result};
use downcast_rs::Downcast;
use futures::stream::{FuturesUnordered, StreamExt};
use tokio::sync::{mpsc, OnceCell};
use tokio::{task, task::JoinHandle};
use trace_view::{elf::LineTable, FunctionSymbol, Instruction, SymbolTable};

use crate::error::TraceError;
use crate::event::SessionConfig;

/// Source of function symbols and per-instruction line info for the current executable.
#[async_trait]
pub trait ISymbolProvider: Send + Sync {
    /// Whether a debug session is available to answer requests.
    fn is_session_active(&self) -> bool;

    async fn functions(&self) -> Result<Vec<FunctionSymbol>>;

    async fn disassemble(&self, function: &FunctionSymbol) -> Result<Vec<Instruction>>;
}

/// Disassembly of one function, ready to be ingested.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Resolved {
    pub function: FunctionSymbol,
    pub instructions: Vec<Instruction>,
}

/// Background symbol resolution feeding one `SymbolTable`.
///
/// The task only sends results. They are applied to the table by `drain_into()` on the owner's
/// timeline, so the table is never shared. Dropping the loader aborts the task and discards any
/// results not yet drained.
pub struct SymbolLoader {
    receiver: mpsc::UnboundedReceiver<Resolved>,
    task: JoinHandle<()>,
}

impl SymbolLoader {
    /// Start resolving every function known to `provider`.
    ///
    /// Must be called from within a tokio runtime.
    pub fn spawn(provider: Arc<dyn ISymbolProvider>) -> Self {
        let (sender, receiver) = mpsc::unbounded_channel();
        let task = task::spawn(resolve_all(provider, sender));

        Self { receiver, task }
    }

    /// Ingest every result received so far, without waiting for more.
    ///
    /// Returns the number of functions applied.
    pub fn drain_into(&mut self, table: &mut SymbolTable) -> usize {
        let mut applied = 0;

        while let Ok(resolved) = self.receiver.try_recv() {
            table.ingest(
                &resolved.function.name,
                &resolved.function.file,
                &resolved.instructions,
            );
            applied += 1;
        }

        applied
    }

    /// Stop resolving and discard anything not yet drained.
    pub fn cancel(&mut self) {
        self.task.abort();
        self.receiver.close();

        while self.receiver.try_recv().is_ok() {}
    }
}

impl Drop for SymbolLoader {
    fn drop(&mut self) {
        self.cancel();
    }
}

async fn resolve_all(provider: Arc<dyn ISymbolProvider>, sender: mpsc::UnboundedSender<Resolved>) {
    let functions = match provider.functions().await {
        Ok(functions) => functions,
        Err(err) => {
            warn!("unable to list function symbols: {:?}", err);
            return;
        }
    };

    info!("resolving lines of {} functions", functions.len());

    let mut pending: FuturesUnordered<_> = functions
        .into_iter()
        .map(|function| {
            let provider = provider.clone();
            async move {
                let result = provider.disassemble(&function).await;
                (function, result)
            }
        })
        .collect();

    while let Some((function, result)) = pending.next().await {
        match result {
            Ok(instructions) => {
                let resolved = Resolved {
                    function,
                    instructions,
                };

                if sender.send(resolved).is_err() {
                    debug!("symbol table discarded, abandoning resolution");
                    return;
                }
            }
            Err(source) => {
                let err = TraceError::SymbolResolution {
                    function: function.name,
                    source,
                };
                warn!("{:?}", err);
            }
        }
    }

    debug!("symbol resolution finished");
}

/// Chooses the symbol source for each new debug session.
pub trait ISymbolProviderFactory: Downcast + Send {
    /// Symbols for `session`, or `None` if it has no usable source.
    fn for_session(&mut self, session: &SessionConfig) -> Option<Arc<dyn ISymbolProvider>>;
}

impl_downcast!(ISymbolProviderFactory);

/// Hands every session the same provider, e.g. the debug adapter's disassembler.
pub struct SharedSymbolProvider {
    provider: Arc<dyn ISymbolProvider>,
}

impl SharedSymbolProvider {
    pub fn new(provider: Arc<dyn ISymbolProvider>) -> Self {
        Self { provider }
    }
}

impl ISymbolProviderFactory for SharedSymbolProvider {
    fn for_session(&mut self, _session: &SessionConfig) -> Option<Arc<dyn ISymbolProvider>> {
        Some(self.provider.clone())
    }
}

/// Gives each session an `ElfSymbolProvider` for its own executable.
pub struct ElfSymbolProviderFactory {
    unit: u32,
}

impl ElfSymbolProviderFactory {
    pub fn new(unit: u32) -> Self {
        Self { unit }
    }
}

impl ISymbolProviderFactory for ElfSymbolProviderFactory {
    fn for_session(&mut self, session: &SessionConfig) -> Option<Arc<dyn ISymbolProvider>> {
        if session.executable.is_empty() {
            debug!("session has no executable, symbols unavailable");
            return None;
        }

        let provider = ElfSymbolProvider::from_executable(&session.executable, self.unit);
        Some(Arc::new(provider))
    }
}

/// Resolves symbols from the executable's own ELF symbol table and DWARF line info.
///
/// The executable is read on the first request, off the async threads.
pub struct ElfSymbolProvider {
    executable: PathBuf,
    table: OnceCell<LineTable>,
    unit: u32,
}

impl ElfSymbolProvider {
    pub fn new(table: LineTable, unit: u32) -> Self {
        Self {
            executable: PathBuf::new(),
            table: OnceCell::new_with(Some(table)),
            unit,
        }
    }

    pub fn from_executable(executable: impl Into<PathBuf>, unit: u32) -> Self {
        Self {
            executable: executable.into(),
            table: OnceCell::new(),
            unit,
        }
    }

    /// Read the executable now rather than on first use.
    pub async fn load(executable: impl Into<PathBuf>, unit: u32) -> Result<Self> {
        let provider = Self::from_executable(executable, unit);
        provider.table().await?;

        Ok(provider)
    }

    pub fn executable(&self) -> &Path {
        &self.executable
    }

    async fn table(&self) -> Result<&LineTable> {
        self.table
            .get_or_try_init(|| async {
                let executable = self.executable.clone();
                info!("loading symbols from {}", executable.display());

                let table = task::spawn_blocking(move || LineTable::load(executable)).await??;
                Ok::<_, anyhow::Error>(table)
            })
            .await
    }
}

#[async_trait]
impl ISymbolProvider for ElfSymbolProvider {
    fn is_session_active(&self) -> bool {
        true
    }

    async fn functions(&self) -> Result<Vec<FunctionSymbol>> {
        Ok(self.table().await?.functions())
    }

    async fn disassemble(&self, function: &FunctionSymbol) -> Result<Vec<Instruction>> {
        self.table()
            .await?
            .instructions(&function.name, self.unit)
            .ok_or_else(|| format_err!("unknown function: {}", function.name))
    }
}

#[cfg(test)]
pub mod double;
