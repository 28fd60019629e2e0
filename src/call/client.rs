//! Client-side call and listener capabilities.

use crate::{
    error::Result,
    metadata::Metadata,
    status::{Cause, Status},
};

/// Client-side handle for one RPC invocation.
///
/// Implementations must serialise operations per call. The lifecycle is
/// enforced by the implementation (see [`super::CallLifecycle`]); wrappers
/// never track it themselves.
pub trait ClientCall<Req, Resp>: Send {
    /// Start the call, registering `listener` for response events and sending
    /// `headers`.
    ///
    /// # Errors
    ///
    /// Returns [`crate::CallError::IllegalState`] if the call was already
    /// started or has terminated.
    fn start(&mut self, listener: Box<dyn ClientCallListener<Resp>>, headers: Metadata)
    -> Result<()>;

    /// Ask for up to `count` further response messages.
    ///
    /// # Errors
    ///
    /// Returns [`crate::CallError::IllegalState`] before `start` or after the
    /// call has terminated.
    fn request(&mut self, count: u32) -> Result<()>;

    /// Cancel the call. Idempotent; a no-op once the call has closed.
    ///
    /// The listener still receives exactly one `on_close`.
    fn cancel(&mut self, message: Option<&str>, cause: Option<Cause>);

    /// Signal that no further request messages will be sent.
    ///
    /// # Errors
    ///
    /// Returns [`crate::CallError::IllegalState`] unless the call is started
    /// and not yet half-closed.
    fn half_close(&mut self) -> Result<()>;

    /// Send one request message.
    ///
    /// # Errors
    ///
    /// Returns [`crate::CallError::IllegalState`] unless the call is started
    /// and not yet half-closed.
    fn send_message(&mut self, message: Req) -> Result<()>;

    /// Returns `true` if the transport can accept a message without buffering.
    fn is_ready(&self) -> bool { true }

    /// Enable or disable per-message compression.
    fn set_message_compression(&mut self, _enabled: bool) {}

    /// Returns `true` once the call has closed or been cancelled.
    fn is_terminated(&self) -> bool { false }
}

/// Callback sink for client-side call events.
///
/// Every callback defaults to accepting the event. Implementations that track
/// [`super::ListenerLifecycle`] reject events delivered after `on_close`.
pub trait ClientCallListener<Resp>: Send {
    /// Response headers were received.
    ///
    /// # Errors
    ///
    /// Implementations reject out-of-order delivery with
    /// [`crate::CallError::IllegalState`].
    fn on_headers(&mut self, _headers: Metadata) -> Result<()> { Ok(()) }

    /// A response message was received.
    ///
    /// # Errors
    ///
    /// Implementations reject delivery after close with
    /// [`crate::CallError::IllegalState`].
    fn on_message(&mut self, _message: Resp) -> Result<()> { Ok(()) }

    /// The call can accept more messages without buffering. Must not block.
    ///
    /// # Errors
    ///
    /// Implementations reject delivery after close with
    /// [`crate::CallError::IllegalState`].
    fn on_ready(&mut self) -> Result<()> { Ok(()) }

    /// The call has closed. Delivered exactly once, after every other callback.
    ///
    /// # Errors
    ///
    /// Implementations reject a second close with
    /// [`crate::CallError::IllegalState`].
    fn on_close(&mut self, _status: Status, _trailers: Metadata) -> Result<()> { Ok(()) }
}

impl<Req, Resp, T> ClientCall<Req, Resp> for Box<T>
where
    T: ClientCall<Req, Resp> + ?Sized,
{
    fn start(
        &mut self,
        listener: Box<dyn ClientCallListener<Resp>>,
        headers: Metadata,
    ) -> Result<()> {
        (**self).start(listener, headers)
    }

    fn request(&mut self, count: u32) -> Result<()> { (**self).request(count) }

    fn cancel(&mut self, message: Option<&str>, cause: Option<Cause>) {
        (**self).cancel(message, cause);
    }

    fn half_close(&mut self) -> Result<()> { (**self).half_close() }

    fn send_message(&mut self, message: Req) -> Result<()> { (**self).send_message(message) }

    fn is_ready(&self) -> bool { (**self).is_ready() }

    fn set_message_compression(&mut self, enabled: bool) {
        (**self).set_message_compression(enabled);
    }

    fn is_terminated(&self) -> bool { (**self).is_terminated() }
}

impl<Resp, T> ClientCallListener<Resp> for Box<T>
where
    T: ClientCallListener<Resp> + ?Sized,
{
    fn on_headers(&mut self, headers: Metadata) -> Result<()> { (**self).on_headers(headers) }

    fn on_message(&mut self, message: Resp) -> Result<()> { (**self).on_message(message) }

    fn on_ready(&mut self) -> Result<()> { (**self).on_ready() }

    fn on_close(&mut self, status: Status, trailers: Metadata) -> Result<()> {
        (**self).on_close(status, trailers)
    }
}
