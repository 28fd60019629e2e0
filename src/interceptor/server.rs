//! Server-side interceptor chains and method registration.

use std::sync::Arc;

use dashmap::{DashMap, mapref::entry::Entry};
use tracing::debug;

use crate::{
    call::{ServerCall, ServerCallHandler, ServerCallListener},
    error::{CallError, Result},
    metadata::Metadata,
    method::MethodDescriptor,
};

/// Intercepts incoming calls before they reach the handler.
///
/// Implementations typically wrap `call` in a
/// [`crate::forwarding::ForwardingServerCall`], pass it to `next`, and wrap the
/// returned listener in a [`crate::forwarding::ForwardingServerCallListener`].
pub trait ServerInterceptor<Req, Resp>: Send + Sync {
    /// Start the call via `next`, observing or rewriting it on the way.
    ///
    /// # Errors
    ///
    /// Propagates errors from `next`.
    fn intercept_call(
        &self,
        call: Box<dyn ServerCall<Req, Resp>>,
        headers: Metadata,
        next: &dyn ServerCallHandler<Req, Resp>,
    ) -> Result<Box<dyn ServerCallListener<Req>>>;
}

/// A handler whose calls pass through one interceptor before `next`.
pub struct InterceptedHandler<Req, Resp> {
    interceptor: Arc<dyn ServerInterceptor<Req, Resp>>,
    next: Arc<dyn ServerCallHandler<Req, Resp>>,
}

impl<Req, Resp> ServerCallHandler<Req, Resp> for InterceptedHandler<Req, Resp> {
    fn start_call(
        &self,
        call: Box<dyn ServerCall<Req, Resp>>,
        headers: Metadata,
    ) -> Result<Box<dyn ServerCallListener<Req>>> {
        self.interceptor.intercept_call(call, headers, self.next.as_ref())
    }
}

/// Ordered set of server interceptors; the first registered is outermost.
pub struct ServerInterceptors<Req, Resp> {
    interceptors: Vec<Arc<dyn ServerInterceptor<Req, Resp>>>,
}

impl<Req, Resp> Default for ServerInterceptors<Req, Resp> {
    fn default() -> Self {
        Self {
            interceptors: Vec::new(),
        }
    }
}

impl<Req, Resp> Clone for ServerInterceptors<Req, Resp> {
    fn clone(&self) -> Self {
        Self {
            interceptors: self.interceptors.clone(),
        }
    }
}

impl<Req, Resp> ServerInterceptors<Req, Resp>
where
    Req: 'static,
    Resp: 'static,
{
    /// An empty set.
    #[must_use]
    pub fn new() -> Self { Self::default() }

    /// Register `interceptor` inside those already registered.
    #[must_use]
    pub fn with<I>(mut self, interceptor: I) -> Self
    where
        I: ServerInterceptor<Req, Resp> + 'static,
    {
        self.interceptors.push(Arc::new(interceptor));
        self
    }

    /// Wrap `handler` with every registered interceptor.
    #[must_use]
    pub fn wrap(&self, handler: Arc<dyn ServerCallHandler<Req, Resp>>) -> Arc<dyn ServerCallHandler<Req, Resp>> {
        intercept_handler(handler, self.interceptors.clone())
    }
}

/// Wrap `handler` with `interceptors`, the first being outermost.
pub fn intercept_handler<Req, Resp>(
    handler: Arc<dyn ServerCallHandler<Req, Resp>>,
    interceptors: Vec<Arc<dyn ServerInterceptor<Req, Resp>>>,
) -> Arc<dyn ServerCallHandler<Req, Resp>>
where
    Req: 'static,
    Resp: 'static,
{
    interceptors
        .into_iter()
        .rev()
        .fold(handler, |next, interceptor| {
            Arc::new(InterceptedHandler { interceptor, next }) as Arc<dyn ServerCallHandler<Req, Resp>>
        })
}

/// A method paired with the handler serving it.
pub struct ServerMethodDefinition<Req, Resp> {
    method: MethodDescriptor,
    handler: Arc<dyn ServerCallHandler<Req, Resp>>,
}

impl<Req, Resp> Clone for ServerMethodDefinition<Req, Resp> {
    fn clone(&self) -> Self {
        Self {
            method: self.method.clone(),
            handler: Arc::clone(&self.handler),
        }
    }
}

impl<Req, Resp> ServerMethodDefinition<Req, Resp>
where
    Req: 'static,
    Resp: 'static,
{
    /// Pair `method` with `handler`.
    pub fn new<H>(method: MethodDescriptor, handler: H) -> Self
    where
        H: ServerCallHandler<Req, Resp> + 'static,
    {
        Self {
            method,
            handler: Arc::new(handler),
        }
    }

    /// Wrap the handler with `interceptors`.
    #[must_use]
    pub fn intercept(self, interceptors: &ServerInterceptors<Req, Resp>) -> Self {
        Self {
            handler: interceptors.wrap(self.handler),
            method: self.method,
        }
    }

    /// The served method.
    #[must_use]
    pub fn method(&self) -> &MethodDescriptor { &self.method }

    /// The (possibly intercepted) handler.
    #[must_use]
    pub fn handler(&self) -> &Arc<dyn ServerCallHandler<Req, Resp>> { &self.handler }
}

/// Concurrent map from full method names to their definitions.
///
/// Cloning is cheap; clones share the same registrations.
pub struct HandlerRegistry<Req, Resp>(Arc<DashMap<String, ServerMethodDefinition<Req, Resp>>>);

impl<Req, Resp> Default for HandlerRegistry<Req, Resp> {
    fn default() -> Self { Self(Arc::new(DashMap::new())) }
}

impl<Req, Resp> Clone for HandlerRegistry<Req, Resp> {
    fn clone(&self) -> Self { Self(Arc::clone(&self.0)) }
}

impl<Req, Resp> HandlerRegistry<Req, Resp> {
    /// An empty registry.
    #[must_use]
    pub fn new() -> Self { Self::default() }

    /// Register `definition` under its full method name.
    ///
    /// # Errors
    ///
    /// Returns [`CallError::DuplicateMethod`] if the name is taken.
    pub fn add_method(&self, definition: ServerMethodDefinition<Req, Resp>) -> Result<()> {
        let name = definition.method.full_name().to_owned();
        match self.0.entry(name) {
            Entry::Occupied(entry) => Err(CallError::DuplicateMethod(entry.key().clone())),
            Entry::Vacant(entry) => {
                debug!(method = %entry.key(), "method registered");
                entry.insert(definition);
                Ok(())
            }
        }
    }

    /// Look up the definition for `full_name`.
    #[must_use]
    pub fn lookup(&self, full_name: &str) -> Option<ServerMethodDefinition<Req, Resp>> {
        self.0.get(full_name).map(|entry| entry.value().clone())
    }

    /// Remove the definition for `full_name`. Returns `true` if one existed.
    pub fn remove(&self, full_name: &str) -> bool { self.0.remove(full_name).is_some() }

    /// Registered full method names, sorted.
    #[must_use]
    pub fn method_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.0.iter().map(|entry| entry.key().clone()).collect();
        names.sort();
        names
    }
}
