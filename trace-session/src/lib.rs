// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Drives a hardware trace probe from debug session lifecycle events and pushes per-line
//! execution counts to an editor.
//!
//! The `TraceSessionController` owns exactly one `Backend` at a time and moves it through the
//! `Session` states as `LifecycleEvent`s arrive. While the target runs, a sampling timer reads the
//! probe's counters, merges them with the symbol table via `trace_view::aggregate`, and hands the
//! result to an `IPresenter`.

#[macro_use]
extern crate async_trait;
#[macro_use]
extern crate downcast_rs;
#[macro_use]
extern crate log;

pub mod backend;
pub mod config;
pub mod controller;
pub mod error;
pub mod event;
pub mod present;
pub mod probe;
pub mod session;
pub mod symbols;

pub use backend::Backend;
pub use config::ControllerConfig;
pub use controller::TraceSessionController;
pub use error::TraceError;
pub use event::{LifecycleEvent, SessionConfig};
