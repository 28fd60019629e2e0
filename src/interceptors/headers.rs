//! Fixed metadata injection for both sides of a call.

use crate::{
    call::{ClientCall, ClientCallListener, ServerCall, ServerCallHandler, ServerCallListener},
    error::Result,
    forwarding::{ClientCallHooks, ForwardingClientCall, ForwardingServerCall, ServerCallHooks},
    interceptor::{Channel, ClientInterceptor, ServerInterceptor},
    metadata::Metadata,
    method::{CallOptions, MethodDescriptor},
};

/// Appends fixed metadata to outgoing headers.
///
/// As a client interceptor it extends the request headers passed to
/// `start`. As a server interceptor it extends the response headers,
/// including the implicit headers that precede a first message sent without
/// an explicit `send_headers`.
#[derive(Clone, Debug, Default)]
pub struct HeaderInjector {
    headers: Metadata,
}

impl HeaderInjector {
    /// Inject `headers` into every client call's start headers and every
    /// server call's response headers.
    #[must_use]
    pub fn new(headers: Metadata) -> Self { Self { headers } }

    /// The metadata appended to every call.
    #[must_use]
    pub fn headers(&self) -> &Metadata { &self.headers }
}

struct RequestHeaders(Metadata);

impl<Req, Resp> ClientCallHooks<Req, Resp> for RequestHeaders {
    fn start(
        &mut self,
        delegate: &mut dyn ClientCall<Req, Resp>,
        listener: Box<dyn ClientCallListener<Resp>>,
        mut headers: Metadata,
    ) -> Result<()> {
        headers.merge(&self.0);
        delegate.start(listener, headers)
    }
}

impl<Req, Resp> ClientInterceptor<Req, Resp> for HeaderInjector
where
    Req: 'static,
    Resp: 'static,
{
    fn intercept_call(
        &self,
        method: &MethodDescriptor,
        options: &CallOptions,
        next: &dyn Channel<Req, Resp>,
    ) -> Box<dyn ClientCall<Req, Resp>> {
        Box::new(ForwardingClientCall::with_hooks(
            next.new_call(method, options),
            RequestHeaders(self.headers.clone()),
        ))
    }
}

struct ResponseHeaders {
    extra: Metadata,
    sent: bool,
}

impl ResponseHeaders {
    fn send<Req, Resp>(&mut self, delegate: &mut dyn ServerCall<Req, Resp>, mut headers: Metadata) -> Result<()> {
        headers.merge(&self.extra);
        delegate.send_headers(headers)?;
        self.sent = true;
        Ok(())
    }
}

impl<Req, Resp> ServerCallHooks<Req, Resp> for ResponseHeaders {
    fn send_headers(&mut self, delegate: &mut dyn ServerCall<Req, Resp>, headers: Metadata) -> Result<()> {
        self.send(delegate, headers)
    }

    fn send_message(&mut self, delegate: &mut dyn ServerCall<Req, Resp>, message: Resp) -> Result<()> {
        if !self.sent {
            self.send(delegate, Metadata::new())?;
        }
        delegate.send_message(message)
    }
}

impl<Req, Resp> ServerInterceptor<Req, Resp> for HeaderInjector
where
    Req: 'static,
    Resp: 'static,
{
    fn intercept_call(
        &self,
        call: Box<dyn ServerCall<Req, Resp>>,
        headers: Metadata,
        next: &dyn ServerCallHandler<Req, Resp>,
    ) -> Result<Box<dyn ServerCallListener<Req>>> {
        let call = ForwardingServerCall::with_hooks(
            call,
            ResponseHeaders {
                extra: self.headers.clone(),
                sent: false,
            },
        );
        next.start_call(Box::new(call), headers)
    }
}
