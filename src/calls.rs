//! Convenience helpers for unary calls.
//!
//! [`unary_call`] drives a client call through `start → request →
//! send_message → half_close` and awaits the single response.
//! [`unary_handler`] adapts a plain function into a
//! [`ServerCallHandler`].

use std::{marker::PhantomData, sync::Arc};

use tokio::sync::oneshot;
use tracing::debug;

use crate::{
    call::{ClientCall, ClientCallListener, ListenerLifecycle, ServerCall, ServerCallHandler, ServerCallListener},
    error::{CallError, Result},
    interceptor::Channel,
    metadata::Metadata,
    method::{CallOptions, MethodDescriptor},
    status::Status,
};

/// Everything a successful unary call produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnaryOutcome<Resp> {
    /// Response headers (empty if the server sent none).
    pub headers: Metadata,
    /// The response message.
    pub message: Resp,
    /// Trailers delivered with the close.
    pub trailers: Metadata,
}

/// Result delivered by a [`ResponseListener`].
pub type UnaryResult<Resp> = std::result::Result<UnaryOutcome<Resp>, Status>;

/// Client listener that collects a single response.
///
/// Enforces [`ListenerLifecycle`]; the outcome is published once `on_close`
/// arrives.
pub struct ResponseListener<Resp> {
    lifecycle: ListenerLifecycle,
    headers: Metadata,
    message: Option<Resp>,
    extra_messages: usize,
    tx: Option<oneshot::Sender<UnaryResult<Resp>>>,
}

impl<Resp: Send> ResponseListener<Resp> {
    /// Create a listener and the receiver its outcome is published on.
    #[must_use]
    pub fn new() -> (Self, oneshot::Receiver<UnaryResult<Resp>>) {
        let (tx, rx) = oneshot::channel();
        let listener = Self {
            lifecycle: ListenerLifecycle::new(),
            headers: Metadata::new(),
            message: None,
            extra_messages: 0,
            tx: Some(tx),
        };
        (listener, rx)
    }

    fn outcome(&mut self, status: Status, trailers: Metadata) -> UnaryResult<Resp> {
        if !status.is_ok() {
            return Err(status);
        }
        if self.extra_messages > 0 {
            return Err(Status::internal(format!(
                "expected one response message, received {}",
                self.extra_messages + 1
            )));
        }
        let message = self
            .message
            .take()
            .ok_or_else(|| Status::internal("call closed without a response message"))?;
        Ok(UnaryOutcome {
            headers: std::mem::take(&mut self.headers),
            message,
            trailers,
        })
    }
}

impl<Resp: Send> ClientCallListener<Resp> for ResponseListener<Resp> {
    fn on_headers(&mut self, headers: Metadata) -> Result<()> {
        self.lifecycle.on_headers()?;
        self.headers = headers;
        Ok(())
    }

    fn on_message(&mut self, message: Resp) -> Result<()> {
        self.lifecycle.on_message()?;
        if self.message.is_some() {
            self.extra_messages += 1;
        } else {
            self.message = Some(message);
        }
        Ok(())
    }

    fn on_ready(&mut self) -> Result<()> { self.lifecycle.on_ready() }

    fn on_close(&mut self, status: Status, trailers: Metadata) -> Result<()> {
        self.lifecycle.on_close()?;
        let outcome = self.outcome(status, trailers);
        if let Some(tx) = self.tx.take() {
            if tx.send(outcome).is_err() {
                debug!("unary outcome dropped: receiver gone");
            }
        }
        Ok(())
    }
}

fn drive<Req, Resp>(
    call: &mut dyn ClientCall<Req, Resp>,
    listener: ResponseListener<Resp>,
    headers: Metadata,
    request: Req,
) -> Result<()>
where
    Resp: Send + 'static,
{
    call.start(Box::new(listener), headers)?;
    call.request(2)?;
    call.send_message(request)?;
    call.half_close()
}

/// Perform a unary call on `channel` and wait for its outcome.
///
/// # Errors
///
/// Returns the close [`Status`] when the call does not end with `OK` and
/// exactly one response message.
pub async fn unary_call<Req, Resp>(
    channel: &dyn Channel<Req, Resp>,
    method: &MethodDescriptor,
    options: CallOptions,
    headers: Metadata,
    request: Req,
) -> UnaryResult<Resp>
where
    Req: Send + 'static,
    Resp: Send + 'static,
{
    let (listener, rx) = ResponseListener::new();
    let mut call = channel.new_call(method, &options);
    let failure = drive(call.as_mut(), listener, headers, request).err();
    if let Some(error) = failure.as_ref().filter(|_| !call.is_terminated()) {
        call.cancel(Some("unary call aborted"), Some(Arc::new(error.clone())));
    }
    let result = rx.await;
    drop(call);
    match result {
        Ok(outcome) => outcome,
        Err(_) => Err(failure.map_or_else(
            || Status::internal("call ended without closing"),
            |error| Status::from(&error),
        )),
    }
}

/// Server handler built from a function of one request.
pub struct UnaryHandler<F, Req, Resp> {
    handler: Arc<F>,
    _types: PhantomData<fn(Req) -> Resp>,
}

/// Adapt `handler` into a [`ServerCallHandler`] for unary methods.
///
/// The function receives the request and the client's headers; its `Err`
/// status becomes the close status.
pub fn unary_handler<F, Req, Resp>(handler: F) -> UnaryHandler<F, Req, Resp>
where
    F: Fn(Req, &Metadata) -> std::result::Result<Resp, Status> + Send + Sync + 'static,
{
    UnaryHandler {
        handler: Arc::new(handler),
        _types: PhantomData,
    }
}

impl<F, Req, Resp> ServerCallHandler<Req, Resp> for UnaryHandler<F, Req, Resp>
where
    F: Fn(Req, &Metadata) -> std::result::Result<Resp, Status> + Send + Sync + 'static,
    Req: Send + 'static,
    Resp: Send + 'static,
{
    fn start_call(
        &self,
        mut call: Box<dyn ServerCall<Req, Resp>>,
        headers: Metadata,
    ) -> Result<Box<dyn ServerCallListener<Req>>> {
        call.request(2)?;
        Ok(Box::new(UnaryServerListener {
            call,
            headers,
            handler: Arc::clone(&self.handler),
            request: None,
            finished: false,
        }))
    }
}

struct UnaryServerListener<F, Req, Resp> {
    call: Box<dyn ServerCall<Req, Resp>>,
    headers: Metadata,
    handler: Arc<F>,
    request: Option<Req>,
    finished: bool,
}

impl<F, Req, Resp> UnaryServerListener<F, Req, Resp> {
    fn ensure_active(&self, operation: &'static str) -> Result<()> {
        if self.finished {
            return Err(CallError::illegal_state(operation, "finished"));
        }
        Ok(())
    }

    fn finish(&mut self, operation: &'static str) -> Result<()> {
        self.ensure_active(operation)?;
        self.finished = true;
        Ok(())
    }
}

impl<F, Req, Resp> ServerCallListener<Req> for UnaryServerListener<F, Req, Resp>
where
    F: Fn(Req, &Metadata) -> std::result::Result<Resp, Status> + Send + Sync + 'static,
    Req: Send + 'static,
    Resp: Send + 'static,
{
    fn on_message(&mut self, message: Req) -> Result<()> {
        self.ensure_active("on_message")?;
        if self.request.is_some() {
            return self
                .call
                .close(Status::internal("too many requests for a unary method"), Metadata::new());
        }
        self.request = Some(message);
        Ok(())
    }

    fn on_half_close(&mut self) -> Result<()> {
        self.ensure_active("on_half_close")?;
        if self.call.is_terminated() {
            return Ok(());
        }
        let Some(request) = self.request.take() else {
            return self
                .call
                .close(Status::internal("half-closed without a request"), Metadata::new());
        };
        match (self.handler)(request, &self.headers) {
            Ok(response) => {
                self.call.send_headers(Metadata::new())?;
                self.call.send_message(response)?;
                self.call.close(Status::ok(), Metadata::new())
            }
            Err(status) => self.call.close(status, Metadata::new()),
        }
    }

    fn on_cancel(&mut self) -> Result<()> {
        self.finish("on_cancel")?;
        debug!(method = %self.call.method_descriptor(), "unary call cancelled");
        Ok(())
    }

    fn on_complete(&mut self) -> Result<()> { self.finish("on_complete") }

    fn on_ready(&mut self) -> Result<()> { self.ensure_active("on_ready") }
}
