//! Forwarding wrappers for client calls and client listeners.

use super::Passthrough;
use crate::{
    call::{ClientCall, ClientCallListener},
    error::{CallError, Result},
    metadata::Metadata,
    status::{Cause, Status},
};

/// Per-operation overrides for a [`ForwardingClientCall`].
///
/// Every method receives the wrapped delegate and by default forwards to it
/// with identical arguments. Override only the operations you care about and
/// call `delegate` to continue down the chain.
pub trait ClientCallHooks<Req, Resp>: Send {
    /// Override point for [`ClientCall::start`].
    ///
    /// # Errors
    ///
    /// Propagates the delegate's error.
    fn start(
        &mut self,
        delegate: &mut dyn ClientCall<Req, Resp>,
        listener: Box<dyn ClientCallListener<Resp>>,
        headers: Metadata,
    ) -> Result<()> {
        delegate.start(listener, headers)
    }

    /// Override point for [`ClientCall::request`].
    ///
    /// # Errors
    ///
    /// Propagates the delegate's error.
    fn request(&mut self, delegate: &mut dyn ClientCall<Req, Resp>, count: u32) -> Result<()> {
        delegate.request(count)
    }

    /// Override point for [`ClientCall::cancel`].
    fn cancel(
        &mut self,
        delegate: &mut dyn ClientCall<Req, Resp>,
        message: Option<&str>,
        cause: Option<Cause>,
    ) {
        delegate.cancel(message, cause);
    }

    /// Override point for [`ClientCall::half_close`].
    ///
    /// # Errors
    ///
    /// Propagates the delegate's error.
    fn half_close(&mut self, delegate: &mut dyn ClientCall<Req, Resp>) -> Result<()> {
        delegate.half_close()
    }

    /// Override point for [`ClientCall::send_message`].
    ///
    /// # Errors
    ///
    /// Propagates the delegate's error.
    fn send_message(&mut self, delegate: &mut dyn ClientCall<Req, Resp>, message: Req) -> Result<()> {
        delegate.send_message(message)
    }

    /// Override point for [`ClientCall::is_ready`].
    fn is_ready(&self, delegate: &dyn ClientCall<Req, Resp>) -> bool { delegate.is_ready() }

    /// Override point for [`ClientCall::set_message_compression`].
    fn set_message_compression(&mut self, delegate: &mut dyn ClientCall<Req, Resp>, enabled: bool) {
        delegate.set_message_compression(enabled);
    }
}

/// Per-callback overrides for a [`ForwardingClientCallListener`].
pub trait ClientListenerHooks<Resp>: Send {
    /// Override point for [`ClientCallListener::on_headers`].
    ///
    /// # Errors
    ///
    /// Propagates the delegate's error.
    fn on_headers(
        &mut self,
        delegate: &mut dyn ClientCallListener<Resp>,
        headers: Metadata,
    ) -> Result<()> {
        delegate.on_headers(headers)
    }

    /// Override point for [`ClientCallListener::on_message`].
    ///
    /// # Errors
    ///
    /// Propagates the delegate's error.
    fn on_message(&mut self, delegate: &mut dyn ClientCallListener<Resp>, message: Resp) -> Result<()> {
        delegate.on_message(message)
    }

    /// Override point for [`ClientCallListener::on_ready`].
    ///
    /// # Errors
    ///
    /// Propagates the delegate's error.
    fn on_ready(&mut self, delegate: &mut dyn ClientCallListener<Resp>) -> Result<()> {
        delegate.on_ready()
    }

    /// Override point for [`ClientCallListener::on_close`].
    ///
    /// # Errors
    ///
    /// Propagates the delegate's error.
    fn on_close(
        &mut self,
        delegate: &mut dyn ClientCallListener<Resp>,
        status: Status,
        trailers: Metadata,
    ) -> Result<()> {
        delegate.on_close(status, trailers)
    }
}

impl<Req, Resp> ClientCallHooks<Req, Resp> for Passthrough {}

impl<Resp> ClientListenerHooks<Resp> for Passthrough {}

/// A [`ClientCall`] that forwards every operation to one delegate.
///
/// The wrapper holds the delegate and its override set and nothing else:
/// no locks, no lifecycle state. Errors from the delegate propagate
/// unchanged.
///
/// # Examples
///
/// ```
/// use callframe::{
///     call::ClientCall,
///     forwarding::{ClientCallHooks, ForwardingClientCall},
///     metadata::Metadata,
///     CallError,
/// };
///
/// /// Counts messages on their way to the delegate.
/// #[derive(Default)]
/// struct CountSends(usize);
///
/// impl ClientCallHooks<String, String> for CountSends {
///     fn send_message(
///         &mut self,
///         delegate: &mut dyn ClientCall<String, String>,
///         message: String,
///     ) -> Result<(), CallError> {
///         self.0 += 1;
///         delegate.send_message(message)
///     }
/// }
///
/// fn wrap(call: Box<dyn ClientCall<String, String>>) -> impl ClientCall<String, String> {
///     ForwardingClientCall::with_hooks(call, CountSends::default())
/// }
/// ```
#[derive(Debug)]
pub struct ForwardingClientCall<C, H = Passthrough> {
    delegate: C,
    hooks: H,
}

impl<C> ForwardingClientCall<C> {
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
        C: ClientCall<Req, Resp>,
    {
        Self::try_with_hooks(delegate, Passthrough)
    }
}

impl<C, H> ForwardingClientCall<C, H> {
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
        C: ClientCall<Req, Resp>,
    {
        if delegate.is_terminated() {
            return Err(CallError::Delegation(
                "client call delegate has already terminated".into(),
            ));
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

impl<Req, Resp, C, H> ClientCall<Req, Resp> for ForwardingClientCall<C, H>
where
    C: ClientCall<Req, Resp>,
    H: ClientCallHooks<Req, Resp>,
{
    fn start(
        &mut self,
        listener: Box<dyn ClientCallListener<Resp>>,
        headers: Metadata,
    ) -> Result<()> {
        self.hooks.start(&mut self.delegate, listener, headers)
    }

    fn request(&mut self, count: u32) -> Result<()> { self.hooks.request(&mut self.delegate, count) }

    fn cancel(&mut self, message: Option<&str>, cause: Option<Cause>) {
        self.hooks.cancel(&mut self.delegate, message, cause);
    }

    fn half_close(&mut self) -> Result<()> { self.hooks.half_close(&mut self.delegate) }

    fn send_message(&mut self, message: Req) -> Result<()> {
        self.hooks.send_message(&mut self.delegate, message)
    }

    fn is_ready(&self) -> bool { self.hooks.is_ready(&self.delegate) }

    fn set_message_compression(&mut self, enabled: bool) {
        self.hooks.set_message_compression(&mut self.delegate, enabled);
    }

    fn is_terminated(&self) -> bool { self.delegate.is_terminated() }
}

/// A [`ClientCallListener`] that forwards every callback to one delegate.
#[derive(Debug)]
pub struct ForwardingClientCallListener<L, H = Passthrough> {
    delegate: L,
    hooks: H,
}

impl<L> ForwardingClientCallListener<L> {
    /// Wrap `delegate` with the identity override set.
    pub fn new(delegate: L) -> Self { Self::with_hooks(delegate, Passthrough) }
}

impl<L, H> ForwardingClientCallListener<L, H> {
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

impl<Resp, L, H> ClientCallListener<Resp> for ForwardingClientCallListener<L, H>
where
    L: ClientCallListener<Resp>,
    H: ClientListenerHooks<Resp>,
{
    fn on_headers(&mut self, headers: Metadata) -> Result<()> {
        self.hooks.on_headers(&mut self.delegate, headers)
    }

    fn on_message(&mut self, message: Resp) -> Result<()> {
        self.hooks.on_message(&mut self.delegate, message)
    }

    fn on_ready(&mut self) -> Result<()> { self.hooks.on_ready(&mut self.delegate) }

    fn on_close(&mut self, status: Status, trailers: Metadata) -> Result<()> {
        self.hooks.on_close(&mut self.delegate, status, trailers)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use super::*;
    use crate::call::{CallLifecycle, ListenerLifecycle};

    type Log = Arc<Mutex<Vec<String>>>;

    struct Base {
        log: Log,
        lifecycle: CallLifecycle,
    }

    impl ClientCall<u32, u32> for Base {
        fn start(&mut self, _: Box<dyn ClientCallListener<u32>>, headers: Metadata) -> Result<()> {
            self.lifecycle.start()?;
            self.log.lock().expect("log").push(format!("start {headers}"));
            Ok(())
        }

        fn request(&mut self, count: u32) -> Result<()> {
            self.lifecycle.request()?;
            self.log.lock().expect("log").push(format!("request {count}"));
            Ok(())
        }

        fn cancel(&mut self, message: Option<&str>, _: Option<Cause>) {
            if self.lifecycle.cancel() {
                self.log.lock().expect("log").push(format!("cancel {message:?}"));
            }
        }

        fn half_close(&mut self) -> Result<()> { self.lifecycle.half_close() }

        fn send_message(&mut self, message: u32) -> Result<()> {
            self.lifecycle.send_message()?;
            self.log.lock().expect("log").push(format!("send {message}"));
            Ok(())
        }

        fn is_terminated(&self) -> bool { self.lifecycle.state().is_terminal() }
    }

    #[derive(Default)]
    struct Sink {
        lifecycle: ListenerLifecycle,
        seen: Vec<String>,
    }

    impl ClientCallListener<u32> for Sink {
        fn on_message(&mut self, message: u32) -> Result<()> {
            self.lifecycle.on_message()?;
            self.seen.push(format!("message {message}"));
            Ok(())
        }

        fn on_close(&mut self, status: Status, _: Metadata) -> Result<()> {
            self.lifecycle.on_close()?;
            self.seen.push(format!("close {}", status.code()));
            Ok(())
        }
    }

    fn base() -> (Base, Log) {
        let log = Log::default();
        (
            Base {
                log: Arc::clone(&log),
                lifecycle: CallLifecycle::new(),
            },
            log,
        )
    }

    struct Doubling;

    impl ClientCallHooks<u32, u32> for Doubling {
        fn send_message(&mut self, delegate: &mut dyn ClientCall<u32, u32>, message: u32) -> Result<()> {
            delegate.send_message(message * 2)
        }
    }

    #[test]
    fn overridden_operation_rewrites_and_siblings_forward() {
        let (call, log) = base();
        let mut wrapped = ForwardingClientCall::with_hooks(call, Doubling);
        wrapped
            .start(Box::new(Sink::default()), Metadata::new())
            .expect("start");
        wrapped.request(3).expect("request");
        wrapped.send_message(21).expect("send");
        assert_eq!(
            *log.lock().expect("log"),
            vec!["start {}", "request 3", "send 42"]
        );
    }

    #[test]
    fn delegate_errors_propagate_unchanged() {
        let (call, _) = base();
        let mut wrapped = ForwardingClientCall::new(call);
        let err = wrapped.send_message(1).expect_err("not started");
        assert_eq!(err, CallError::illegal_state("send_message", "idle"));
    }

    #[test]
    fn try_new_rejects_terminated_delegate() {
        let (mut call, _) = base();
        call.cancel(None, None);
        let err = ForwardingClientCall::try_with_hooks(call, Passthrough).err().expect("terminated");
        assert!(matches!(err, CallError::Delegation(_)));
    }

    #[test]
    fn listener_wrapper_does_not_swallow_rejections() {
        let mut wrapped = ForwardingClientCallListener::new(Sink::default());
        wrapped.on_message(1).expect("message");
        wrapped
            .on_close(Status::ok(), Metadata::new())
            .expect("close");
        let err = wrapped.on_message(2).expect_err("closed listener rejects");
        assert!(err.is_illegal_state());
        assert_eq!(wrapped.delegate().seen, vec!["message 1", "close OK"]);
    }
}
