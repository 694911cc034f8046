//! Host/guest function bridge over three embeddable script engines.
//!
//! A [`Context`] owns one engine instance and its global namespace. The host
//! binds functions and values into it, runs scripts synchronously and reads
//! results back as [`HostValue`]s. A [`SharedRuntime`] carries bindings (and,
//! for QuickJS, the engine heap) shared by many contexts.

mod context;
mod engine;
mod helpers;
mod host;
mod shared;
pub mod workloads;

pub use context::{Context, ExportedFunction};
pub use eb_core::{
    BridgeError, CallArgs, Capabilities, ContextOptions, ContextState, EngineKind, ErrorKind,
    HostValue, Mutability,
};
pub use host::HostFunction;
pub use shared::SharedRuntime;
