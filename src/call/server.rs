//! Server-side call, listener and handler capabilities.

use crate::{error::Result, metadata::Metadata, method::MethodDescriptor, status::Status};

/// Server-side handle for one RPC invocation.
pub trait ServerCall<Req, Resp>: Send {
    /// Ask for up to `count` further request messages.
    ///
    /// # Errors
    ///
    /// Returns [`crate::CallError::IllegalState`] after the call has closed.
    fn request(&mut self, count: u32) -> Result<()>;

    /// Send response headers. At most once, before any message.
    ///
    /// # Errors
    ///
    /// Returns [`crate::CallError::IllegalState`] if headers were already sent
    /// or the call has closed.
    fn send_headers(&mut self, headers: Metadata) -> Result<()>;

    /// Send one response message.
    ///
    /// # Errors
    ///
    /// Returns [`crate::CallError::IllegalState`] after the call has closed or
    /// been cancelled.
    fn send_message(&mut self, message: Resp) -> Result<()>;

    /// Close the call with `status` and `trailers`. Exactly once.
    ///
    /// # Errors
    ///
    /// Returns [`crate::CallError::IllegalState`] if the call already closed.
    fn close(&mut self, status: Status, trailers: Metadata) -> Result<()>;

    /// Returns `true` if the client cancelled the call.
    fn is_cancelled(&self) -> bool;

    /// Returns `true` if the transport can accept a message without buffering.
    fn is_ready(&self) -> bool { true }

    /// Enable or disable per-message compression.
    fn set_message_compression(&mut self, _enabled: bool) {}

    /// Descriptor of the method being served.
    fn method_descriptor(&self) -> &MethodDescriptor;

    /// Returns `true` once the call has closed or been cancelled.
    fn is_terminated(&self) -> bool { self.is_cancelled() }
}

/// Callback sink for server-side call events.
pub trait ServerCallListener<Req>: Send {
    /// A request message was received.
    ///
    /// # Errors
    ///
    /// Implementations reject delivery after completion or cancellation.
    fn on_message(&mut self, _message: Req) -> Result<()> { Ok(()) }

    /// The client will send no more messages.
    ///
    /// # Errors
    ///
    /// Implementations reject delivery after completion or cancellation.
    fn on_half_close(&mut self) -> Result<()> { Ok(()) }

    /// The call was cancelled. Terminal.
    ///
    /// # Errors
    ///
    /// Implementations reject a second terminal event.
    fn on_cancel(&mut self) -> Result<()> { Ok(()) }

    /// The server closed the call and the close was handed to the transport. Terminal.
    ///
    /// # Errors
    ///
    /// Implementations reject a second terminal event.
    fn on_complete(&mut self) -> Result<()> { Ok(()) }

    /// The call can accept more messages without buffering.
    ///
    /// # Errors
    ///
    /// Implementations reject delivery after completion or cancellation.
    fn on_ready(&mut self) -> Result<()> { Ok(()) }
}

/// Starts handling for an incoming call.
pub trait ServerCallHandler<Req, Resp>: Send + Sync {
    /// Produce the listener for a newly arrived call.
    ///
    /// # Errors
    ///
    /// Propagates errors raised while starting the call.
    fn start_call(
        &self,
        call: Box<dyn ServerCall<Req, Resp>>,
        headers: Metadata,
    ) -> Result<Box<dyn ServerCallListener<Req>>>;
}

impl<Req, Resp, F> ServerCallHandler<Req, Resp> for F
where
    F: Fn(Box<dyn ServerCall<Req, Resp>>, Metadata) -> Result<Box<dyn ServerCallListener<Req>>>
        + Send
        + Sync,
{
    fn start_call(
        &self,
        call: Box<dyn ServerCall<Req, Resp>>,
        headers: Metadata,
    ) -> Result<Box<dyn ServerCallListener<Req>>> {
        self(call, headers)
    }
}

impl<Req, Resp, T> ServerCall<Req, Resp> for Box<T>
where
    T: ServerCall<Req, Resp> + ?Sized,
{
    fn request(&mut self, count: u32) -> Result<()> { (**self).request(count) }

    fn send_headers(&mut self, headers: Metadata) -> Result<()> { (**self).send_headers(headers) }

    fn send_message(&mut self, message: Resp) -> Result<()> { (**self).send_message(message) }

    fn close(&mut self, status: Status, trailers: Metadata) -> Result<()> {
        (**self).close(status, trailers)
    }

    fn is_cancelled(&self) -> bool { (**self).is_cancelled() }

    fn is_ready(&self) -> bool { (**self).is_ready() }

    fn set_message_compression(&mut self, enabled: bool) {
        (**self).set_message_compression(enabled);
    }

    fn method_descriptor(&self) -> &MethodDescriptor { (**self).method_descriptor() }

    fn is_terminated(&self) -> bool { (**self).is_terminated() }
}

impl<Req, T> ServerCallListener<Req> for Box<T>
where
    T: ServerCallListener<Req> + ?Sized,
{
    fn on_message(&mut self, message: Req) -> Result<()> { (**self).on_message(message) }

    fn on_half_close(&mut self) -> Result<()> { (**self).on_half_close() }

    fn on_cancel(&mut self) -> Result<()> { (**self).on_cancel() }

    fn on_complete(&mut self) -> Result<()> { (**self).on_complete() }

    fn on_ready(&mut self) -> Result<()> { (**self).on_ready() }
}
