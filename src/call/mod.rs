//! Call and listener capabilities consumed from the RPC runtime.
//!
//! A *call* is the handle for one in-flight invocation; a *listener* is the
//! sink for its lifecycle events. The traits here are what the forwarding
//! wrappers decorate and what transports implement.

mod client;
mod server;
mod state;

pub use client::{ClientCall, ClientCallListener};
pub use server::{ServerCall, ServerCallHandler, ServerCallListener};
pub use state::{CallLifecycle, CallState, ListenerLifecycle, ListenerState, ServerCallLifecycle};
