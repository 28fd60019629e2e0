//! Client-side channels and interceptor chains.

use std::sync::Arc;

use crate::{
    call::ClientCall,
    error::{CallError, Result},
    method::{CallOptions, MethodDescriptor},
};

/// Factory for client calls.
pub trait Channel<Req, Resp>: Send + Sync {
    /// Create a call for `method`. The call does nothing until started.
    fn new_call(&self, method: &MethodDescriptor, options: &CallOptions) -> Box<dyn ClientCall<Req, Resp>>;

    /// Authority the channel connects to.
    fn authority(&self) -> &str;
}

/// Intercepts call creation on a [`Channel`].
///
/// Implementations typically obtain the call from `next` and return it
/// wrapped in a [`crate::forwarding::ForwardingClientCall`].
pub trait ClientInterceptor<Req, Resp>: Send + Sync {
    /// Create (and usually wrap) a call via `next`.
    fn intercept_call(
        &self,
        method: &MethodDescriptor,
        options: &CallOptions,
        next: &dyn Channel<Req, Resp>,
    ) -> Box<dyn ClientCall<Req, Resp>>;
}

impl<Req, Resp, F> ClientInterceptor<Req, Resp> for F
where
    F: Fn(&MethodDescriptor, &CallOptions, &dyn Channel<Req, Resp>) -> Box<dyn ClientCall<Req, Resp>>
        + Send
        + Sync,
{
    fn intercept_call(
        &self,
        method: &MethodDescriptor,
        options: &CallOptions,
        next: &dyn Channel<Req, Resp>,
    ) -> Box<dyn ClientCall<Req, Resp>> {
        self(method, options, next)
    }
}

/// A channel whose calls pass through one interceptor before `next`.
pub struct InterceptedChannel<Req, Resp> {
    interceptor: Arc<dyn ClientInterceptor<Req, Resp>>,
    next: Arc<dyn Channel<Req, Resp>>,
}

impl<Req, Resp> Channel<Req, Resp> for InterceptedChannel<Req, Resp> {
    fn new_call(&self, method: &MethodDescriptor, options: &CallOptions) -> Box<dyn ClientCall<Req, Resp>> {
        self.interceptor.intercept_call(method, options, self.next.as_ref())
    }

    fn authority(&self) -> &str { self.next.authority() }
}

/// Builder for a client interceptor chain.
///
/// Interceptors run in registration order: the first one registered is the
/// outermost. It sees `new_call` first, its call wrapper sees every call
/// operation first, and its listener wrapper sees every callback last.
///
/// ```ignore
/// let channel = ClientInterceptors::new()
///     .with(LoggingInterceptor::default())
///     .with(HeaderInjector::new(headers))
///     .channel(base)
///     .build()?;
/// ```
pub struct ClientInterceptors<Req, Resp> {
    interceptors: Vec<Arc<dyn ClientInterceptor<Req, Resp>>>,
    channel: Option<Arc<dyn Channel<Req, Resp>>>,
}

impl<Req, Resp> Default for ClientInterceptors<Req, Resp> {
    fn default() -> Self {
        Self {
            interceptors: Vec::new(),
            channel: None,
        }
    }
}

impl<Req, Resp> ClientInterceptors<Req, Resp>
where
    Req: 'static,
    Resp: 'static,
{
    /// An empty chain.
    #[must_use]
    pub fn new() -> Self { Self::default() }

    /// Register `interceptor` inside those already registered.
    #[must_use]
    pub fn with<I>(mut self, interceptor: I) -> Self
    where
        I: ClientInterceptor<Req, Resp> + 'static,
    {
        self.interceptors.push(Arc::new(interceptor));
        self
    }

    /// Set the channel at the end of the chain.
    #[must_use]
    pub fn channel(mut self, channel: Arc<dyn Channel<Req, Resp>>) -> Self {
        self.channel = Some(channel);
        self
    }

    /// Number of registered interceptors.
    #[must_use]
    pub fn len(&self) -> usize { self.interceptors.len() }

    /// Returns `true` if no interceptor is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool { self.interceptors.is_empty() }

    /// Compose the chain.
    ///
    /// # Errors
    ///
    /// Returns [`CallError::Delegation`] if no channel was set.
    pub fn build(self) -> Result<Arc<dyn Channel<Req, Resp>>> {
        let channel = self
            .channel
            .ok_or_else(|| CallError::Delegation("interceptor chain has no channel".into()))?;
        Ok(compose(channel, self.interceptors))
    }
}

fn compose<Req, Resp>(
    channel: Arc<dyn Channel<Req, Resp>>,
    interceptors: Vec<Arc<dyn ClientInterceptor<Req, Resp>>>,
) -> Arc<dyn Channel<Req, Resp>>
where
    Req: 'static,
    Resp: 'static,
{
    interceptors
        .into_iter()
        .rev()
        .fold(channel, |next, interceptor| {
            Arc::new(InterceptedChannel { interceptor, next }) as Arc<dyn Channel<Req, Resp>>
        })
}

/// Wrap `channel` with `interceptors`, the first being outermost.
pub fn intercept<Req, Resp>(
    channel: Arc<dyn Channel<Req, Resp>>,
    interceptors: Vec<Arc<dyn ClientInterceptor<Req, Resp>>>,
) -> Arc<dyn Channel<Req, Resp>>
where
    Req: 'static,
    Resp: 'static,
{
    compose(channel, interceptors)
}
