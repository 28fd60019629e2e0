//! In-memory transport connecting client calls directly to server handlers.
//!
//! Every call gets one delivery task per listener (see
//! [`crate::dispatch::SerializingExecutor`]), so callbacks arrive in order and
//! never overlap. Whichever side terminates first decides the single
//! `on_close`: a server `close`, a client `cancel`, or an expired deadline.
//! Messages are delivered eagerly; `request(n)` is validated but does not
//! throttle delivery.
//!
//! ```
//! use callframe::{
//!     calls::{unary_call, unary_handler},
//!     config::ChannelConfig,
//!     inprocess::InProcessServer,
//!     interceptor::ServerMethodDefinition,
//!     metadata::Metadata,
//!     method::{CallOptions, MethodDescriptor, MethodType},
//! };
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let method = MethodDescriptor::new("echo.Echo/Shout", MethodType::Unary)?;
//! let server = InProcessServer::new();
//! server.add_method(ServerMethodDefinition::new(
//!     method.clone(),
//!     unary_handler(|request: String, _: &Metadata| Ok(request.to_uppercase())),
//! ))?;
//! let channel = server.channel(ChannelConfig::default())?;
//! let outcome = unary_call(&channel, &method, CallOptions::default(), Metadata::new(), "hi".to_owned()).await?;
//! assert_eq!(outcome.message, "HI");
//! # Ok(())
//! # }
//! ```

mod call;

use tokio::runtime::Handle;

use crate::{
    call::ClientCall,
    config::ChannelConfig,
    error::{CallError, Result},
    interceptor::{Channel, HandlerRegistry, ServerInterceptors, ServerMethodDefinition},
    method::{CallOptions, MethodDescriptor},
};

pub use call::{InProcessClientCall, InProcessServerCall};

/// Server side of the in-memory transport.
///
/// Cloning is cheap; clones share the same method registrations.
pub struct InProcessServer<Req, Resp> {
    registry: HandlerRegistry<Req, Resp>,
    interceptors: ServerInterceptors<Req, Resp>,
}

impl<Req, Resp> Clone for InProcessServer<Req, Resp> {
    fn clone(&self) -> Self {
        Self {
            registry: self.registry.clone(),
            interceptors: self.interceptors.clone(),
        }
    }
}

impl<Req, Resp> Default for InProcessServer<Req, Resp>
where
    Req: Send + 'static,
    Resp: Send + 'static,
{
    fn default() -> Self { Self::new() }
}

impl<Req, Resp> InProcessServer<Req, Resp>
where
    Req: Send + 'static,
    Resp: Send + 'static,
{
    /// A server with no methods and no interceptors.
    #[must_use]
    pub fn new() -> Self {
        Self {
            registry: HandlerRegistry::new(),
            interceptors: ServerInterceptors::new(),
        }
    }

    /// Apply `interceptors` to every method registered afterwards.
    #[must_use]
    pub fn with_interceptors(mut self, interceptors: ServerInterceptors<Req, Resp>) -> Self {
        self.interceptors = interceptors;
        self
    }

    /// Register a method, wrapping its handler with the server interceptors.
    ///
    /// # Errors
    ///
    /// Returns [`CallError::DuplicateMethod`] if the method is already served.
    pub fn add_method(&self, definition: ServerMethodDefinition<Req, Resp>) -> Result<()> {
        self.registry.add_method(definition.intercept(&self.interceptors))
    }

    /// The method registry.
    #[must_use]
    pub fn registry(&self) -> &HandlerRegistry<Req, Resp> { &self.registry }

    /// Open a channel to this server on the current Tokio runtime.
    ///
    /// # Errors
    ///
    /// Returns [`CallError::NoRuntime`] when called outside a runtime.
    pub fn channel(&self, config: ChannelConfig) -> Result<InProcessChannel<Req, Resp>> {
        let runtime = Handle::try_current().map_err(|_| CallError::NoRuntime)?;
        Ok(InProcessChannel {
            registry: self.registry.clone(),
            runtime,
            config,
        })
    }
}

/// Client side of the in-memory transport.
pub struct InProcessChannel<Req, Resp> {
    registry: HandlerRegistry<Req, Resp>,
    runtime: Handle,
    config: ChannelConfig,
}

impl<Req, Resp> InProcessChannel<Req, Resp>
where
    Req: Send + 'static,
    Resp: Send + 'static,
{
    /// Create a concrete in-process call.
    ///
    /// Options left unset fall back to the channel's defaults.
    #[must_use]
    pub fn new_in_process_call(&self, method: &MethodDescriptor, options: &CallOptions) -> InProcessClientCall<Req, Resp> {
        InProcessClientCall::new(
            method.clone(),
            options.clone().or_defaults(self.config.default_options()),
            self.registry.clone(),
            self.runtime.clone(),
        )
    }

    /// The channel configuration.
    #[must_use]
    pub fn config(&self) -> &ChannelConfig { &self.config }
}

impl<Req, Resp> Channel<Req, Resp> for InProcessChannel<Req, Resp>
where
    Req: Send + 'static,
    Resp: Send + 'static,
{
    fn new_call(&self, method: &MethodDescriptor, options: &CallOptions) -> Box<dyn ClientCall<Req, Resp>> {
        Box::new(self.new_in_process_call(method, options))
    }

    fn authority(&self) -> &str { self.config.authority() }
}
