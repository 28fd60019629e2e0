//! Interceptor chains.
//!
//! Interceptors are composed in registration order. On the client side a
//! chain wraps a [`Channel`]; on the server side it wraps a
//! [`crate::call::ServerCallHandler`]. In both cases the first interceptor
//! registered is the outermost layer, so for a chain `W1, W2, …, WN` an
//! operation travels `W1 → W2 → … → WN → base` and each layer sees it exactly
//! once.

mod client;
mod server;

pub use client::{Channel, ClientInterceptor, ClientInterceptors, InterceptedChannel, intercept};
pub use server::{
    HandlerRegistry,
    InterceptedHandler,
    ServerInterceptor,
    ServerInterceptors,
    ServerMethodDefinition,
    intercept_handler,
};
