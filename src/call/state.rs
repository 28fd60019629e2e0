//! Lifecycle trackers used by concrete calls and listeners.
//!
//! Only delegates hold these. Forwarding wrappers are stateless and rely on
//! the innermost delegate to reject operations after the terminal state.

use crate::error::{CallError, Result};

/// State of a client call.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CallState {
    /// Created but not yet started.
    Idle,
    /// Started; messages may be sent.
    Started,
    /// The client will send no more messages.
    HalfClosed,
    /// The call completed.
    Closed,
    /// The call was cancelled.
    Cancelled,
}

impl CallState {
    /// Lower-case name used in error messages.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Started => "started",
            Self::HalfClosed => "half-closed",
            Self::Closed => "closed",
            Self::Cancelled => "cancelled",
        }
    }

    /// Returns `true` for [`CallState::Closed`] and [`CallState::Cancelled`].
    #[must_use]
    pub fn is_terminal(self) -> bool { matches!(self, Self::Closed | Self::Cancelled) }
}

/// Tracks the client-call state machine.
///
/// ```
/// use callframe::call::{CallLifecycle, CallState};
///
/// let mut lifecycle = CallLifecycle::new();
/// lifecycle.start().expect("idle call starts");
/// lifecycle.half_close().expect("started call half-closes");
/// assert!(lifecycle.send_message().is_err());
/// assert!(lifecycle.cancel());
/// assert!(!lifecycle.cancel());
/// assert_eq!(lifecycle.state(), CallState::Cancelled);
/// ```
#[derive(Debug)]
pub struct CallLifecycle {
    state: CallState,
}

impl Default for CallLifecycle {
    fn default() -> Self { Self::new() }
}

impl CallLifecycle {
    /// A tracker in the [`CallState::Idle`] state.
    #[must_use]
    pub fn new() -> Self {
        Self {
            state: CallState::Idle,
        }
    }

    /// Current state.
    #[must_use]
    pub fn state(&self) -> CallState { self.state }

    fn reject(&self, operation: &'static str) -> CallError {
        CallError::illegal_state(operation, self.state.as_str())
    }

    /// Transition `Idle → Started`.
    ///
    /// # Errors
    ///
    /// Returns [`CallError::IllegalState`] from any other state.
    pub fn start(&mut self) -> Result<()> {
        if self.state != CallState::Idle {
            return Err(self.reject("start"));
        }
        self.state = CallState::Started;
        Ok(())
    }

    /// Validate a message send.
    ///
    /// # Errors
    ///
    /// Returns [`CallError::IllegalState`] unless the call is started.
    pub fn send_message(&self) -> Result<()> {
        if self.state != CallState::Started {
            return Err(self.reject("send_message"));
        }
        Ok(())
    }

    /// Transition `Started → HalfClosed`.
    ///
    /// # Errors
    ///
    /// Returns [`CallError::IllegalState`] unless the call is started.
    pub fn half_close(&mut self) -> Result<()> {
        if self.state != CallState::Started {
            return Err(self.reject("half_close"));
        }
        self.state = CallState::HalfClosed;
        Ok(())
    }

    /// Validate a flow-control request.
    ///
    /// # Errors
    ///
    /// Returns [`CallError::IllegalState`] unless started or half-closed.
    pub fn request(&self) -> Result<()> {
        if !matches!(self.state, CallState::Started | CallState::HalfClosed) {
            return Err(self.reject("request"));
        }
        Ok(())
    }

    /// Enter [`CallState::Cancelled`]. Returns `false` if already terminal.
    pub fn cancel(&mut self) -> bool {
        if self.state.is_terminal() {
            return false;
        }
        self.state = CallState::Cancelled;
        true
    }

    /// Enter [`CallState::Closed`]. Returns `false` if already terminal.
    pub fn close(&mut self) -> bool {
        if self.state.is_terminal() {
            return false;
        }
        self.state = CallState::Closed;
        true
    }
}

/// State of a listener.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ListenerState {
    /// No callback received yet.
    Created,
    /// Headers arrived.
    HeadersReceived,
    /// At least one message arrived.
    Streaming,
    /// `on_close` arrived. Terminal.
    Closed,
}

impl ListenerState {
    fn as_str(self) -> &'static str {
        match self {
            Self::Created => "created",
            Self::HeadersReceived => "headers-received",
            Self::Streaming => "streaming",
            Self::Closed => "closed",
        }
    }
}

/// Tracks `CREATED → HEADERS_RECEIVED? → MESSAGE* → CLOSED`.
#[derive(Debug)]
pub struct ListenerLifecycle {
    state: ListenerState,
}

impl Default for ListenerLifecycle {
    fn default() -> Self { Self::new() }
}

impl ListenerLifecycle {
    /// A tracker in the [`ListenerState::Created`] state.
    #[must_use]
    pub fn new() -> Self {
        Self {
            state: ListenerState::Created,
        }
    }

    /// Current state.
    #[must_use]
    pub fn state(&self) -> ListenerState { self.state }

    fn reject(&self, operation: &'static str) -> CallError {
        CallError::illegal_state(operation, self.state.as_str())
    }

    /// Accept headers; only valid as the first event.
    ///
    /// # Errors
    ///
    /// Returns [`CallError::IllegalState`] after any other event.
    pub fn on_headers(&mut self) -> Result<()> {
        if self.state != ListenerState::Created {
            return Err(self.reject("on_headers"));
        }
        self.state = ListenerState::HeadersReceived;
        Ok(())
    }

    /// Accept a message.
    ///
    /// # Errors
    ///
    /// Returns [`CallError::IllegalState`] after close.
    pub fn on_message(&mut self) -> Result<()> {
        if self.state == ListenerState::Closed {
            return Err(self.reject("on_message"));
        }
        self.state = ListenerState::Streaming;
        Ok(())
    }

    /// Accept a readiness signal.
    ///
    /// # Errors
    ///
    /// Returns [`CallError::IllegalState`] after close.
    pub fn on_ready(&self) -> Result<()> {
        if self.state == ListenerState::Closed {
            return Err(self.reject("on_ready"));
        }
        Ok(())
    }

    /// Accept the terminal close.
    ///
    /// # Errors
    ///
    /// Returns [`CallError::IllegalState`] on a second close.
    pub fn on_close(&mut self) -> Result<()> {
        if self.state == ListenerState::Closed {
            return Err(self.reject("on_close"));
        }
        self.state = ListenerState::Closed;
        Ok(())
    }
}

/// Tracks `OPEN → HEADERS_SENT? → CLOSED` for a server call.
#[derive(Debug, Default)]
pub struct ServerCallLifecycle {
    headers_sent: bool,
    closed: bool,
    cancelled: bool,
}

impl ServerCallLifecycle {
    /// A tracker for an open call.
    #[must_use]
    pub fn new() -> Self { Self::default() }

    fn state_name(&self) -> &'static str {
        if self.cancelled {
            "cancelled"
        } else if self.closed {
            "closed"
        } else if self.headers_sent {
            "headers-sent"
        } else {
            "open"
        }
    }

    fn ensure_open(&self, operation: &'static str) -> Result<()> {
        if self.is_terminated() {
            return Err(CallError::illegal_state(operation, self.state_name()));
        }
        Ok(())
    }

    /// Validate a flow-control request.
    ///
    /// # Errors
    ///
    /// Returns [`CallError::IllegalState`] once terminated.
    pub fn request(&self) -> Result<()> { self.ensure_open("request") }

    /// Record explicit headers.
    ///
    /// # Errors
    ///
    /// Returns [`CallError::IllegalState`] if headers were already sent or the
    /// call terminated.
    pub fn send_headers(&mut self) -> Result<()> {
        self.ensure_open("send_headers")?;
        if self.headers_sent {
            return Err(CallError::illegal_state("send_headers", self.state_name()));
        }
        self.headers_sent = true;
        Ok(())
    }

    /// Record a message. Returns `true` if implicit headers must be sent first.
    ///
    /// # Errors
    ///
    /// Returns [`CallError::IllegalState`] once terminated.
    pub fn send_message(&mut self) -> Result<bool> {
        self.ensure_open("send_message")?;
        Ok(!std::mem::replace(&mut self.headers_sent, true))
    }

    /// Record the close.
    ///
    /// # Errors
    ///
    /// Returns [`CallError::IllegalState`] once terminated.
    pub fn close(&mut self) -> Result<()> {
        self.ensure_open("close")?;
        self.closed = true;
        Ok(())
    }

    /// Record a cancellation. Returns `false` if already terminated.
    pub fn cancel(&mut self) -> bool {
        if self.is_terminated() {
            return false;
        }
        self.cancelled = true;
        true
    }

    /// Returns `true` if the call was cancelled.
    #[must_use]
    pub fn is_cancelled(&self) -> bool { self.cancelled }

    /// Returns `true` once closed or cancelled.
    #[must_use]
    pub fn is_terminated(&self) -> bool { self.closed || self.cancelled }
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    #[test]
    fn send_before_start_is_rejected() {
        let lifecycle = CallLifecycle::new();
        let err = lifecycle.send_message().expect_err("idle call rejects sends");
        assert_eq!(err, CallError::illegal_state("send_message", "idle"));
    }

    #[test]
    fn start_twice_is_rejected() {
        let mut lifecycle = CallLifecycle::new();
        lifecycle.start().expect("first start");
        assert!(lifecycle.start().is_err());
    }

    #[rstest]
    #[case::cancelled(true)]
    #[case::closed(false)]
    fn terminal_states_reject_everything(#[case] cancel: bool) {
        let mut lifecycle = CallLifecycle::new();
        lifecycle.start().expect("start");
        if cancel {
            assert!(lifecycle.cancel());
        } else {
            assert!(lifecycle.close());
        }
        assert!(lifecycle.send_message().is_err());
        assert!(lifecycle.half_close().is_err());
        assert!(lifecycle.request().is_err());
        assert!(!lifecycle.cancel(), "cancel after termination is a no-op");
    }

    #[test]
    fn listener_accepts_headers_only_first() {
        let mut lifecycle = ListenerLifecycle::new();
        lifecycle.on_message().expect("message without headers");
        assert!(lifecycle.on_headers().is_err());
    }

    #[test]
    fn listener_rejects_events_after_close() {
        let mut lifecycle = ListenerLifecycle::new();
        lifecycle.on_headers().expect("headers");
        lifecycle.on_message().expect("message");
        lifecycle.on_close().expect("close");
        assert_eq!(
            lifecycle.on_message().expect_err("closed"),
            CallError::illegal_state("on_message", "closed")
        );
        assert!(lifecycle.on_ready().is_err());
        assert!(lifecycle.on_close().is_err());
    }

    #[test]
    fn server_call_sends_implicit_headers_once() {
        let mut lifecycle = ServerCallLifecycle::new();
        assert!(lifecycle.send_message().expect("first message"));
        assert!(!lifecycle.send_message().expect("second message"));
        assert!(lifecycle.send_headers().is_err());
        lifecycle.close().expect("close");
        assert!(lifecycle.close().is_err());
        assert!(!lifecycle.cancel());
    }
}
