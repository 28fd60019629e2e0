#![doc(html_root_url = "https://docs.rs/callframe/latest")]
//! Public API for the `callframe` library.
//!
//! This crate provides forwarding wrappers for RPC calls and listeners, and
//! the plumbing to compose them into client and server interceptor chains.
//! An in-process transport lets the whole stack run without a network.

pub mod call;
pub mod calls;
pub mod config;
pub mod dispatch;
pub mod error;
/// Result type alias re-exported for convenience when implementing calls and
/// listeners.
pub use error::{CallError, Result};
pub mod forwarding;
pub mod inprocess;
pub mod interceptor;
pub mod interceptors;
pub mod metadata;
pub mod method;
#[cfg(feature = "metrics")]
pub mod metrics;
pub mod status;

pub use call::{ClientCall, ClientCallListener, ServerCall, ServerCallHandler, ServerCallListener};
pub use forwarding::{
    ForwardingClientCall,
    ForwardingClientCallListener,
    ForwardingServerCall,
    ForwardingServerCallListener,
    Passthrough,
};
pub use interceptor::{Channel, ClientInterceptor, ClientInterceptors, ServerInterceptor, ServerInterceptors};
pub use metadata::{Metadata, MetadataKey, MetadataValue};
pub use method::{CallOptions, MethodDescriptor, MethodType};
pub use status::{Code, Status};
