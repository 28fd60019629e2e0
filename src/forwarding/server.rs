//! Forwarding wrappers for server calls and server listeners.

use super::Passthrough;
use crate::{
    call::{ServerCall, ServerCallListener},
    error::{CallError, Result},
    metadata::Metadata,
    method::MethodDescriptor,
    status::Status,
};

/// Per-operation overrides for a [`ForwardingServerCall`].
///
/// Defaults forward to the delegate unchanged.
pub trait ServerCallHooks<Req, Resp>: Send {
    /// Override point for [`ServerCall::request`].
    ///
    /// # Errors
    ///
    /// Propagates the delegate's error.
    fn request(&mut self, delegate: &mut dyn ServerCall<Req, Resp>, count: u32) -> Result<()> {
        delegate.request(count)
    }

    /// Override point for [`ServerCall::send_headers`].
    ///
    /// # Errors
    ///
    /// Propagates the delegate's error.
    fn send_headers(&mut self, delegate: &mut dyn ServerCall<Req, Resp>, headers: Metadata) -> Result<()> {
        delegate.send_headers(headers)
    }

    /// Override point for [`ServerCall::send_message`].
    ///
    /// # Errors
    ///
    /// Propagates the delegate's error.
    fn send_message(&mut self, delegate: &mut dyn ServerCall<Req, Resp>, message: Resp) -> Result<()> {
        delegate.send_message(message)
    }

    /// Override point for [`ServerCall::close`].
    ///
    /// # Errors
    ///
    /// Propagates the delegate's error.
    fn close(
        &mut self,
        delegate: &mut dyn ServerCall<Req, Resp>,
        status: Status,
        trailers: Metadata,
    ) -> Result<()> {
        delegate.close(status, trailers)
    }

    /// Override point for [`ServerCall::is_cancelled`].
    fn is_cancelled(&self, delegate: &dyn ServerCall<Req, Resp>) -> bool { delegate.is_cancelled() }

    /// Override point for [`ServerCall::is_ready`].
    fn is_ready(&self, delegate: &dyn ServerCall<Req, Resp>) -> bool { delegate.is_ready() }

    /// Override point for [`ServerCall::set_message_compression`].
    fn set_message_compression(&mut self, delegate: &mut dyn ServerCall<Req, Resp>, enabled: bool) {
        delegate.set_message_compression(enabled);
    }
}

/// Per-callback overrides for a [`ForwardingServerCallListener`].
pub trait ServerListenerHooks<Req>: Send {
    /// Override point for [`ServerCallListener::on_message`].
    ///
    /// # Errors
    ///
    /// Propagates the delegate's error.
    fn on_message(&mut self, delegate: &mut dyn ServerCallListener<Req>, message: Req) -> Result<()> {
        delegate.on_message(message)
    }

    /// Override point for [`ServerCallListener::on_half_close`].
    ///
    /// # Errors
    ///
    /// Propagates the delegate's error.
    fn on_half_close(&mut self, delegate: &mut dyn ServerCallListener<Req>) -> Result<()> {
        delegate.on_half_close()
    }

    /// Override point for [`ServerCallListener::on_cancel`].
    ///
    /// # Errors
    ///
    /// Propagates the delegate's error.
    fn on_cancel(&mut self, delegate: &mut dyn ServerCallListener<Req>) -> Result<()> {
        delegate.on_cancel()
    }

    /// Override point for [`ServerCallListener::on_complete`].
    ///
    /// # Errors
    ///
    /// Propagates the delegate's error.
    fn on_complete(&mut self, delegate: &mut dyn ServerCallListener<Req>) -> Result<()> {
        delegate.on_complete()
    }

    /// Override point for [`ServerCallListener::on_ready`].
    ///
    /// # Errors
    ///
    /// Propagates the delegate's error.
    fn on_ready(&mut self, delegate: &mut dyn ServerCallListener<Req>) -> Result<()> {
        delegate.on_ready()
    }
}

impl<Req, Resp> ServerCallHooks<Req, Resp> for Passthrough {}

impl<Req> ServerListenerHooks<Req> for Passthrough {}

/// A [`ServerCall`] that forwards every operation to one delegate.
///
/// # Examples
///
/// Inject a trace header into every response:
///
/// ```
/// use callframe::{
///     call::ServerCall,
///     forwarding::{ForwardingServerCall, ServerCallHooks},
///     metadata::Metadata,
///     CallError,
/// };
///
/// struct TraceHeader;
///
/// impl ServerCallHooks<String, String> for TraceHeader {
///     fn send_headers(
///         &mut self,
///         delegate: &mut dyn ServerCall<String, String>,
///         mut headers: Metadata,
///     ) -> Result<(), CallError> {
///         headers.insert_ascii("x-trace-id", "abc")?;
///         delegate.send_headers(headers)
///     }
/// }
///
/// fn wrap(call: Box<dyn ServerCall<String, String>>) -> impl ServerCall<String, String> {
///     ForwardingServerCall::with_hooks(call, TraceHeader)
/// }
/// ```
#[derive(Debug)]
pub struct ForwardingServerCall<C, H = Passthrough> {
    delegate: C,
    hooks: H,
}

impl<C> ForwardingServerCall<C> {
    /// Wrap `delegate` with the identity override set.
    pub fn new(delegate: C) -> Self { Self::with_hooks(delegate, Passthrough) }

    /// Wrap `delegate` with the identity override set, failing fast if it has
    /// already terminated.
    ///
    /// # Errors
    ///
    /// Returns [`CallError::Delegation`] if `delegate` reports a terminal
    /// state.
    pub fn try_new<Req, Resp>(delegate: C) -> Result<Self>
    where
        C: ServerCall<Req, Resp>,
    {
        Self::try_with_hooks(delegate, Passthrough)
    }
}

impl<C, H> ForwardingServerCall<C, H> {
    /// Wrap `delegate` with the overrides in `hooks`.
    pub fn with_hooks(delegate: C, hooks: H) -> Self { Self { delegate, hooks } }

    /// Wrap `delegate`, failing fast if it has already terminated.
    ///
    /// # Errors
    ///
    /// Returns [`CallError::Delegation`] if `delegate` reports a terminal
    /// state.
    pub fn try_with_hooks<Req, Resp>(delegate: C, hooks: H) -> Result<Self>
    where
        C: ServerCall<Req, Resp>,
    {
        if delegate.is_terminated() {
            return Err(CallError::Delegation(format!(
                "server call delegate for {} has already terminated",
                delegate.method_descriptor()
            )));
        }
        Ok(Self::with_hooks(delegate, hooks))
    }

    /// The wrapped call.
    pub fn delegate(&self) -> &C { &self.delegate }

    /// The wrapped call, mutably.
    pub fn delegate_mut(&mut self) -> &mut C { &mut self.delegate }

    /// The override set.
    pub fn hooks(&self) -> &H { &self.hooks }

    /// The override set, mutably.
    pub fn hooks_mut(&mut self) -> &mut H { &mut self.hooks }

    /// Unwrap into the delegate and override set.
    pub fn into_inner(self) -> (C, H) { (self.delegate, self.hooks) }
}

impl<Req, Resp, C, H> ServerCall<Req, Resp> for ForwardingServerCall<C, H>
where
    C: ServerCall<Req, Resp>,
    H: ServerCallHooks<Req, Resp>,
{
    fn request(&mut self, count: u32) -> Result<()> { self.hooks.request(&mut self.delegate, count) }

    fn send_headers(&mut self, headers: Metadata) -> Result<()> {
        self.hooks.send_headers(&mut self.delegate, headers)
    }

    fn send_message(&mut self, message: Resp) -> Result<()> {
        self.hooks.send_message(&mut self.delegate, message)
    }

    fn close(&mut self, status: Status, trailers: Metadata) -> Result<()> {
        self.hooks.close(&mut self.delegate, status, trailers)
    }

    fn is_cancelled(&self) -> bool { self.hooks.is_cancelled(&self.delegate) }

    fn is_ready(&self) -> bool { self.hooks.is_ready(&self.delegate) }

    fn set_message_compression(&mut self, enabled: bool) {
        self.hooks.set_message_compression(&mut self.delegate, enabled);
    }

    fn method_descriptor(&self) -> &MethodDescriptor { self.delegate.method_descriptor() }

    fn is_terminated(&self) -> bool { self.delegate.is_terminated() }
}

/// A [`ServerCallListener`] that forwards every callback to one delegate.
#[derive(Debug)]
pub struct ForwardingServerCallListener<L, H = Passthrough> {
    delegate: L,
    hooks: H,
}

impl<L> ForwardingServerCallListener<L> {
    /// Wrap `delegate` with the identity override set.
    pub fn new(delegate: L) -> Self { Self::with_hooks(delegate, Passthrough) }
}

impl<L, H> ForwardingServerCallListener<L, H> {
    /// Wrap `delegate` with the overrides in `hooks`.
    pub fn with_hooks(delegate: L, hooks: H) -> Self { Self { delegate, hooks } }

    /// The wrapped listener.
    pub fn delegate(&self) -> &L { &self.delegate }

    /// The wrapped listener, mutably.
    pub fn delegate_mut(&mut self) -> &mut L { &mut self.delegate }

    /// The override set.
    pub fn hooks(&self) -> &H { &self.hooks }

    /// The override set, mutably.
    pub fn hooks_mut(&mut self) -> &mut H { &mut self.hooks }

    /// Unwrap into the delegate and override set.
    pub fn into_inner(self) -> (L, H) { (self.delegate, self.hooks) }
}

impl<Req, L, H> ServerCallListener<Req> for ForwardingServerCallListener<L, H>
where
    L: ServerCallListener<Req>,
    H: ServerListenerHooks<Req>,
{
    fn on_message(&mut self, message: Req) -> Result<()> {
        self.hooks.on_message(&mut self.delegate, message)
    }

    fn on_half_close(&mut self) -> Result<()> { self.hooks.on_half_close(&mut self.delegate) }

    fn on_cancel(&mut self) -> Result<()> { self.hooks.on_cancel(&mut self.delegate) }

    fn on_complete(&mut self) -> Result<()> { self.hooks.on_complete(&mut self.delegate) }

    fn on_ready(&mut self) -> Result<()> { self.hooks.on_ready(&mut self.delegate) }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{call::ServerCallLifecycle, method::MethodType};

    struct Base {
        method: MethodDescriptor,
        lifecycle: ServerCallLifecycle,
        headers: Vec<Metadata>,
    }

    impl Base {
        fn new() -> Self {
            Self {
                method: MethodDescriptor::new("svc/M", MethodType::Unary).expect("valid"),
                lifecycle: ServerCallLifecycle::new(),
                headers: Vec::new(),
            }
        }
    }

    impl ServerCall<u8, u8> for Base {
        fn request(&mut self, _: u32) -> Result<()> { self.lifecycle.request() }

        fn send_headers(&mut self, headers: Metadata) -> Result<()> {
            self.lifecycle.send_headers()?;
            self.headers.push(headers);
            Ok(())
        }

        fn send_message(&mut self, _: u8) -> Result<()> { self.lifecycle.send_message().map(drop) }

        fn close(&mut self, _: Status, _: Metadata) -> Result<()> { self.lifecycle.close() }

        fn is_cancelled(&self) -> bool { self.lifecycle.is_cancelled() }

        fn method_descriptor(&self) -> &MethodDescriptor { &self.method }

        fn is_terminated(&self) -> bool { self.lifecycle.is_terminated() }
    }

    struct TraceId;

    impl ServerCallHooks<u8, u8> for TraceId {
        fn send_headers(&mut self, delegate: &mut dyn ServerCall<u8, u8>, mut headers: Metadata) -> Result<()> {
            headers.insert_ascii("x-trace-id", "abc")?;
            delegate.send_headers(headers)
        }
    }

    #[test]
    fn injected_header_reaches_delegate_once() {
        let mut wrapped = ForwardingServerCall::with_hooks(Base::new(), TraceId);
        let headers = Metadata::from_pairs([("a", "1")]).expect("valid");
        wrapped.send_headers(headers).expect("send headers");

        let expected = Metadata::from_pairs([("a", "1"), ("x-trace-id", "abc")]).expect("valid");
        assert_eq!(wrapped.delegate().headers, vec![expected]);
    }

    #[test]
    fn operations_after_close_are_rejected_by_delegate() {
        let mut wrapped = ForwardingServerCall::new(Base::new());
        wrapped.close(Status::ok(), Metadata::new()).expect("close");
        let err = wrapped.send_message(1).expect_err("closed");
        assert_eq!(err, CallError::illegal_state("send_message", "closed"));
        assert!(wrapped.is_terminated());
        assert!(ForwardingServerCall::try_new(wrapped).is_err());
    }

    #[test]
    fn method_descriptor_comes_from_delegate() {
        let wrapped = ForwardingServerCall::new(ForwardingServerCall::new(Base::new()));
        assert_eq!(wrapped.method_descriptor().full_name(), "svc/M");
    }
}
