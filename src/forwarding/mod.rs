//! Forwarding calls and listeners.
//!
//! Each wrapper holds exactly one delegate and an override set (its *hooks*).
//! Hook methods default to forwarding the operation to the delegate with
//! identical arguments, so an interceptor overrides only the events it cares
//! about and calls the delegate it is handed to continue the chain. Wrappers
//! keep no lifecycle state and take no locks; the innermost delegate is the
//! sole source of truth for whether an operation is still allowed.
//!
//! ```
//! use callframe::{
//!     call::ClientCallListener,
//!     forwarding::{ClientListenerHooks, ForwardingClientCallListener},
//!     metadata::Metadata,
//!     CallError,
//! };
//!
//! /// Drops a header before the application sees it.
//! struct StripInternal;
//!
//! impl ClientListenerHooks<String> for StripInternal {
//!     fn on_headers(
//!         &mut self,
//!         delegate: &mut dyn ClientCallListener<String>,
//!         mut headers: Metadata,
//!     ) -> Result<(), CallError> {
//!         headers.discard_all("x-internal");
//!         delegate.on_headers(headers)
//!     }
//! }
//!
//! fn wrap(app: Box<dyn ClientCallListener<String>>) -> impl ClientCallListener<String> {
//!     ForwardingClientCallListener::with_hooks(app, StripInternal)
//! }
//! ```

mod client;
mod server;

pub use client::{
    ClientCallHooks,
    ClientListenerHooks,
    ForwardingClientCall,
    ForwardingClientCallListener,
};
pub use server::{
    ForwardingServerCall,
    ForwardingServerCallListener,
    ServerCallHooks,
    ServerListenerHooks,
};

/// The identity override set: every operation is forwarded unchanged.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Passthrough;
