// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::fmt;
use std::time::Duration;

use tokio::time::{self, Instant, Interval, MissedTickBehavior};

use crate::backend::Backend;
use crate::error::TraceError;

pub enum Session {
    Idle(State<Idle>),
    Configured(State<Configured>),
    Sampling(State<Sampling>),
    Halted(State<Halted>),
}

impl fmt::Display for Session {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let s = match self {
            Self::Idle(..) => "Session::Idle",
            Self::Configured(..) => "Session::Configured",
            Self::Sampling(..) => "Session::Sampling",
            Self::Halted(..) => "Session::Halted",
        };
        write!(f, "{}", s)
    }
}

impl Session {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn backend(&self) -> &Backend {
        match self {
            Self::Idle(s) => s.backend(),
            Self::Configured(s) => s.backend(),
            Self::Sampling(s) => s.backend(),
            Self::Halted(s) => s.backend(),
        }
    }

    pub fn backend_mut(&mut self) -> &mut Backend {
        match self {
            Self::Idle(s) => s.backend_mut(),
            Self::Configured(s) => s.backend_mut(),
            Self::Sampling(s) => s.backend_mut(),
            Self::Halted(s) => s.backend_mut(),
        }
    }

    pub fn is_sampling(&self) -> bool {
        matches!(self, Self::Sampling(..))
    }

    /// Disarm the timer and tear down the backend, from any state.
    pub fn terminate(self) -> State<Idle> {
        match self {
            Self::Idle(s) => s.terminate(),
            Self::Configured(s) => s.terminate(),
            Self::Sampling(s) => s.terminate(),
            Self::Halted(s) => s.terminate(),
        }
    }
}

impl Default for Session {
    fn default() -> Self {
        let state = State {
            ctx: Idle {
                backend: Backend::null(),
            },
        };
        state.into()
    }
}

/// No active trace. Holds the last backend, already torn down.
pub struct Idle {
    backend: Backend,
}

/// Backend built for the session, not yet connected.
pub struct Configured {
    backend: Backend,
}

/// Connected, with counts refreshed on every timer tick.
pub struct Sampling {
    backend: Backend,
    timer: Interval,
}

/// Connected, with the timer disarmed while the target is stopped.
pub struct Halted {
    backend: Backend,
}

pub trait Context {
    fn backend(&self) -> &Backend;

    fn backend_mut(&mut self) -> &mut Backend;

    fn into_backend(self) -> Backend;
}

macro_rules! impl_context {
    ($Context: ident) => {
        impl Context for $Context {
            fn backend(&self) -> &Backend {
                &self.backend
            }

            fn backend_mut(&mut self) -> &mut Backend {
                &mut self.backend
            }

            fn into_backend(self) -> Backend {
                self.backend
            }
        }
    };
}

impl_context!(Idle);
impl_context!(Configured);
impl_context!(Sampling);
impl_context!(Halted);

pub struct State<C: Context> {
    ctx: C,
}

macro_rules! impl_from_state_for_session {
    ($Context: ident) => {
        impl From<State<$Context>> for Session {
            fn from(state: State<$Context>) -> Self {
                Session::$Context(state)
            }
        }
    };
}

impl_from_state_for_session!(Idle);
impl_from_state_for_session!(Configured);
impl_from_state_for_session!(Sampling);
impl_from_state_for_session!(Halted);

impl<C: Context> From<C> for State<C> {
    fn from(ctx: C) -> Self {
        State { ctx }
    }
}

impl<C: Context> State<C> {
    pub fn backend(&self) -> &Backend {
        self.ctx.backend()
    }

    pub fn backend_mut(&mut self) -> &mut Backend {
        self.ctx.backend_mut()
    }

    pub fn terminate(self) -> State<Idle> {
        let mut backend = self.ctx.into_backend();
        backend.teardown();

        let ctx = Idle { backend };
        ctx.into()
    }
}

/// Outcome of connecting a backend so sampling can begin.
pub enum Armed<C: Context> {
    Sampling(State<Sampling>),

    /// Connection failed. The state is unchanged.
    Failed(State<C>, TraceError),
}

impl State<Idle> {
    /// Replace the torn-down backend with the one for a new session.
    pub fn configure(self, backend: Backend) -> State<Configured> {
        let ctx = Configured { backend };
        ctx.into()
    }
}

impl State<Configured> {
    /// Connect and start sampling. Must be called from within a tokio runtime.
    pub fn run(mut self, period: Duration) -> Armed<Configured> {
        if let Err(err) = self.ctx.backend.connect() {
            return Armed::Failed(self, err);
        }

        let ctx = Sampling {
            backend: self.ctx.backend,
            timer: sampling_timer(period),
        };
        Armed::Sampling(ctx.into())
    }
}

impl State<Sampling> {
    /// Wait for the next sampling period.
    pub async fn tick(&mut self) {
        self.ctx.timer.tick().await;
    }

    pub fn halt(self) -> State<Halted> {
        let mut backend = self.ctx.backend;
        backend.stop();

        let ctx = Halted { backend };
        ctx.into()
    }
}

impl State<Halted> {
    /// Must be called from within a tokio runtime.
    pub fn resume(mut self, period: Duration) -> Armed<Halted> {
        if let Err(err) = self.ctx.backend.connect() {
            return Armed::Failed(self, err);
        }

        self.ctx.backend.start();

        let ctx = Sampling {
            backend: self.ctx.backend,
            timer: sampling_timer(period),
        };
        Armed::Sampling(ctx.into())
    }
}

// First tick one period from now. Ticks missed while a refresh runs long are dropped.
fn sampling_timer(period: Duration) -> Interval {
    let mut timer = time::interval_at(Instant::now() + period, period);
    timer.set_missed_tick_behavior(MissedTickBehavior::Skip);
    timer
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::backend::JTrace;
    use crate::config::ControllerConfig;
    use crate::event::SessionConfig;
    use crate::probe::double::*;

    const PERIOD: Duration = Duration::from_millis(250);

    fn jtrace(probe: ProbeDouble) -> Backend {
        let session = SessionConfig {
            device: "nRF52840_xxAA".to_owned(),
            ..SessionConfig::default()
        };

        JTrace::new(Box::new(probe), &session, &ControllerConfig::default(), None)
            .unwrap()
            .into()
    }

    fn configured(backend: Backend) -> State<Configured> {
        Session::new().terminate().configure(backend)
    }

    #[test]
    fn test_default_is_idle() {
        let session = Session::new();

        assert_eq!(session.to_string(), "Session::Idle");
        assert_eq!(session.backend().name(), "null");
        assert!(!session.is_sampling());
    }

    #[tokio::test]
    async fn test_lifecycle() {
        let probe = ProbeDouble::with_region(0x0, 8);
        let log = probe.log.clone();

        let state = configured(jtrace(probe));
        assert_eq!(Session::from(configured(Backend::null())).to_string(), "Session::Configured");

        let sampling = match state.run(PERIOD) {
            Armed::Sampling(s) => s,
            Armed::Failed(..) => panic!("expected sampling"),
        };
        assert!(sampling.backend().is_connected());

        let halted = sampling.halt();
        assert_eq!(log.count(&ProbeCall::Stop), 1);

        let sampling = match halted.resume(PERIOD) {
            Armed::Sampling(s) => s,
            Armed::Failed(..) => panic!("expected sampling"),
        };
        assert_eq!(log.count(&ProbeCall::Start), 2);
        assert_eq!(log.count(&ProbeCall::Init), 1);

        let idle = sampling.terminate();
        assert!(!idle.backend().is_connected());
        assert_eq!(log.count(&ProbeCall::Deinit), 1);

        let session: Session = idle.into();
        assert_eq!(session.to_string(), "Session::Idle");
        assert_eq!(session.backend().name(), "jtrace");

        drop(session);
        assert_eq!(log.count(&ProbeCall::Deinit), 1);
    }

    #[tokio::test]
    async fn test_connect_failure_keeps_state() {
        let mut probe = ProbeDouble::with_region(0x0, 8);
        probe.fail_init = true;

        match configured(jtrace(probe)).run(PERIOD) {
            Armed::Failed(state, err) => {
                assert!(!state.backend().is_connected());
                assert!(matches!(err, TraceError::Connection { .. }));
            }
            Armed::Sampling(..) => panic!("expected failure"),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_first_tick_after_one_period() {
        let mut sampling = match configured(Backend::null()).run(PERIOD) {
            Armed::Sampling(s) => s,
            Armed::Failed(..) => panic!("expected sampling"),
        };

        let early = time::timeout(PERIOD - Duration::from_millis(1), sampling.tick()).await;
        assert!(early.is_err());

        let start = Instant::now();
        sampling.tick().await;
        assert!(Instant::now() - start <= Duration::from_millis(1));
    }
}
