// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::mem;

use futures::future;
use tokio::sync::mpsc;

use crate::backend::{Backend, JTrace};
use crate::config::ControllerConfig;
use crate::error::TraceError;
use crate::event::{LifecycleEvent, SessionConfig};
use crate::present::{present, IPresenter};
use crate::probe::IProbeLoader;
use crate::session::*;
use crate::symbols::ISymbolProviderFactory;

/// Follows debug session lifecycle events and keeps the editor's execution counts current.
///
/// Owns the one live trace backend. A new session's backend is only built after the previous
/// one has been torn down.
pub struct TraceSessionController {
    config: ControllerConfig,
    loader: Box<dyn IProbeLoader>,
    symbols: Option<Box<dyn ISymbolProviderFactory>>,
    presenter: Box<dyn IPresenter>,
    session: Session,
}

impl TraceSessionController {
    pub fn new(
        config: ControllerConfig,
        loader: Box<dyn IProbeLoader>,
        symbols: Option<Box<dyn ISymbolProviderFactory>>,
        presenter: Box<dyn IPresenter>,
    ) -> Self {
        Self {
            config,
            loader,
            symbols,
            presenter,
            session: Session::new(),
        }
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn presenter(&self) -> &dyn IPresenter {
        self.presenter.as_ref()
    }

    /// Process events until the sender is dropped, then release the backend.
    pub async fn run(&mut self, events: &mut mpsc::Receiver<LifecycleEvent>) {
        loop {
            tokio::select! {
                biased;

                event = events.recv() => match event {
                    Some(event) => self.handle_event(event),
                    None => break,
                },
                _ = self.next_tick() => self.tick(),
            }
        }

        debug!("event feed closed, shutting down trace session");
        self.handle_event(LifecycleEvent::Terminated);
    }

    /// Must be called from within a tokio runtime: `Running` arms the sampling timer.
    pub fn handle_event(&mut self, event: LifecycleEvent) {
        info!("{} in {}", event, self.session);

        let last = mem::take(&mut self.session);

        let next = match event {
            LifecycleEvent::Initializing(session) => self.initializing(last, session),
            LifecycleEvent::Running => self.running(last),
            LifecycleEvent::Stopped => self.stopped(last),
            LifecycleEvent::Terminated => last.terminate().into(),
        };

        debug!("now in {} with {} backend", next, next.backend().name());
        self.session = next;
    }

    /// Resolves at the next sampling period. Never resolves unless sampling.
    pub async fn next_tick(&mut self) {
        match &mut self.session {
            Session::Sampling(state) => state.tick().await,
            _ => future::pending().await,
        }
    }

    /// Periodic refresh. Does nothing unless sampling from a connected backend.
    ///
    /// Must be called from within a tokio runtime, since reading may start symbol resolution.
    pub fn tick(&mut self) {
        if !self.session.is_sampling() || !self.session.backend().is_connected() {
            return;
        }

        self.refresh();
    }

    /// Read the current counts and render them into every visible file.
    ///
    /// Must be called from within a tokio runtime.
    pub fn refresh(&mut self) {
        render(self.session.backend_mut(), self.presenter.as_mut());
    }

    /// The set of visible editors changed.
    pub fn editors_changed(&mut self) {
        self.refresh();
    }

    fn initializing(&mut self, last: Session, session: Option<SessionConfig>) -> Session {
        // Release the previous probe before opening another.
        let idle = last.terminate();

        let backend = self.create_backend(session);
        info!("using {} trace backend", backend.name());

        idle.configure(backend).into()
    }

    fn create_backend(&mut self, session: Option<SessionConfig>) -> Backend {
        let session = match session {
            Some(session) => session,
            None => {
                info!("no session configuration, tracing disabled");
                return Backend::null();
            }
        };

        if !self.config.follows(session.debugger.as_deref()) {
            info!("not tracing {:?} session", session.debugger);
            return Backend::null();
        }

        if !self.config.is_probe_server(&session.server_type) {
            info!("no trace backend for server type `{}`", session.server_type);
            return Backend::null();
        }

        let probe = match self.loader.load() {
            Ok(probe) => probe,
            Err(err) => {
                error!("unable to load trace probe: {:?}", err);
                self.presenter
                    .show_error(&format!("unable to load trace probe: {}", err));
                return Backend::null();
            }
        };

        let provider = self
            .symbols
            .as_mut()
            .and_then(|symbols| symbols.for_session(&session));

        match JTrace::new(probe, &session, &self.config, provider) {
            Ok(backend) => backend.into(),
            Err(err) => {
                error!("{:?}", err);
                self.notify(&err);
                Backend::null()
            }
        }
    }

    fn notify(&mut self, err: &TraceError) {
        let message = if err.is_recoverable() {
            format!("{}; restart the debug session to retry", err)
        } else {
            err.to_string()
        };

        self.presenter.show_error(&message);
    }

    fn running(&mut self, last: Session) -> Session {
        let period = self.config.sampling_interval();

        // One report per probe. A failed backend waits for the next session.
        if last.backend().connect_failed() {
            debug!("trace probe connection failed earlier, not sampling");
            return last;
        }

        match last {
            Session::Configured(state) => match state.run(period) {
                Armed::Sampling(state) => state.into(),
                Armed::Failed(state, err) => {
                    self.notify(&err);
                    state.into()
                }
            },
            Session::Halted(state) => match state.resume(period) {
                Armed::Sampling(state) => state.into(),
                Armed::Failed(state, err) => {
                    self.notify(&err);
                    state.into()
                }
            },
            other => {
                debug!("ignoring {} in {}", LifecycleEvent::Running, other);
                other
            }
        }
    }

    fn stopped(&mut self, last: Session) -> Session {
        match last {
            Session::Sampling(state) => {
                let mut halted = state.halt();
                render(halted.backend_mut(), self.presenter.as_mut());
                halted.into()
            }
            other => {
                debug!("ignoring {} in {}", LifecycleEvent::Stopped, other);
                other
            }
        }
    }
}

fn render(backend: &mut Backend, presenter: &mut dyn IPresenter) {
    let samples = backend.read_counts();
    present(&samples, presenter);
}
