//! Recording fakes for calls, listeners and channels.
//!
//! Every fake appends a line to a shared [`EventLog`] for each operation it
//! accepts and enforces the same lifecycle a real transport would, so tests
//! can assert both what reached the base and that nothing reached it after
//! termination.

use std::{
    fmt::Debug,
    sync::{Arc, Mutex, MutexGuard, PoisonError},
};

use callframe::{
    CallError,
    Result,
    call::{
        CallLifecycle,
        ClientCall,
        ClientCallListener,
        ListenerLifecycle,
        ServerCall,
        ServerCallLifecycle,
        ServerCallListener,
    },
    interceptor::Channel,
    metadata::Metadata,
    method::{CallOptions, MethodDescriptor},
    status::{Cause, Status},
};

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> { mutex.lock().unwrap_or_else(PoisonError::into_inner) }

/// Shared, ordered record of observed operations.
#[derive(Clone, Debug, Default)]
pub struct EventLog(Arc<Mutex<Vec<String>>>);

impl EventLog {
    #[must_use]
    pub fn new() -> Self { Self::default() }

    /// Append one event.
    pub fn push(&self, event: impl Into<String>) { lock(&self.0).push(event.into()); }

    /// Snapshot of every event so far.
    #[must_use]
    pub fn events(&self) -> Vec<String> { lock(&self.0).clone() }

    /// Number of events equal to `event`.
    #[must_use]
    pub fn count(&self, event: &str) -> usize { lock(&self.0).iter().filter(|e| *e == event).count() }

    pub fn clear(&self) { lock(&self.0).clear(); }
}

/// Holder for the listener a [`RecordingClientCall`] was started with.
pub struct ListenerSlot<Resp>(Arc<Mutex<Option<Box<dyn ClientCallListener<Resp>>>>>);

impl<Resp> Clone for ListenerSlot<Resp> {
    fn clone(&self) -> Self { Self(Arc::clone(&self.0)) }
}

impl<Resp> Default for ListenerSlot<Resp> {
    fn default() -> Self { Self(Arc::new(Mutex::new(None))) }
}

impl<Resp> ListenerSlot<Resp> {
    /// Run `f` against the stored listener, if the call was started.
    pub fn with<R>(&self, f: impl FnOnce(&mut dyn ClientCallListener<Resp>) -> R) -> Option<R> {
        lock(&self.0).as_mut().map(|listener| f(listener.as_mut()))
    }

    #[must_use]
    pub fn is_set(&self) -> bool { lock(&self.0).is_some() }
}

/// Client call that records every accepted operation as `call.<op>`.
pub struct RecordingClientCall<Resp> {
    log: EventLog,
    lifecycle: CallLifecycle,
    listener: ListenerSlot<Resp>,
}

impl<Resp> RecordingClientCall<Resp> {
    #[must_use]
    pub fn new(log: EventLog) -> Self {
        Self {
            log,
            lifecycle: CallLifecycle::new(),
            listener: ListenerSlot::default(),
        }
    }

    /// Handle to the listener passed to `start`.
    #[must_use]
    pub fn listener(&self) -> ListenerSlot<Resp> { self.listener.clone() }

    /// Mark the call closed, as a transport would after `on_close`.
    pub fn close(&mut self) -> bool { self.lifecycle.close() }
}

impl<Req, Resp> ClientCall<Req, Resp> for RecordingClientCall<Resp>
where
    Req: Debug,
    Resp: Send,
{
    fn start(&mut self, listener: Box<dyn ClientCallListener<Resp>>, headers: Metadata) -> Result<()> {
        self.lifecycle.start()?;
        self.log.push(format!("call.start {headers}"));
        *lock(&self.listener.0) = Some(listener);
        Ok(())
    }

    fn request(&mut self, count: u32) -> Result<()> {
        self.lifecycle.request()?;
        self.log.push(format!("call.request {count}"));
        Ok(())
    }

    fn cancel(&mut self, message: Option<&str>, _cause: Option<Cause>) {
        if self.lifecycle.cancel() {
            self.log.push(format!("call.cancel {}", message.unwrap_or("-")));
        }
    }

    fn half_close(&mut self) -> Result<()> {
        self.lifecycle.half_close()?;
        self.log.push("call.half_close");
        Ok(())
    }

    fn send_message(&mut self, message: Req) -> Result<()> {
        self.lifecycle.send_message()?;
        self.log.push(format!("call.send_message {message:?}"));
        Ok(())
    }

    fn is_terminated(&self) -> bool { self.lifecycle.state().is_terminal() }
}

/// Client listener that records every accepted callback as `listener.<op>`.
pub struct RecordingListener {
    log: EventLog,
    lifecycle: ListenerLifecycle,
}

impl RecordingListener {
    #[must_use]
    pub fn new(log: EventLog) -> Self {
        Self {
            log,
            lifecycle: ListenerLifecycle::new(),
        }
    }
}

impl<Resp: Debug> ClientCallListener<Resp> for RecordingListener {
    fn on_headers(&mut self, headers: Metadata) -> Result<()> {
        self.lifecycle.on_headers()?;
        self.log.push(format!("listener.on_headers {headers}"));
        Ok(())
    }

    fn on_message(&mut self, message: Resp) -> Result<()> {
        self.lifecycle.on_message()?;
        self.log.push(format!("listener.on_message {message:?}"));
        Ok(())
    }

    fn on_ready(&mut self) -> Result<()> {
        self.lifecycle.on_ready()?;
        self.log.push("listener.on_ready");
        Ok(())
    }

    fn on_close(&mut self, status: Status, trailers: Metadata) -> Result<()> {
        self.lifecycle.on_close()?;
        self.log.push(format!("listener.on_close {} {trailers}", status.code()));
        Ok(())
    }
}

/// Channel producing [`RecordingClientCall`]s that share one log.
pub struct RecordingChannel<Resp> {
    log: EventLog,
    authority: String,
    last_listener: Mutex<Option<ListenerSlot<Resp>>>,
}

impl<Resp> RecordingChannel<Resp> {
    #[must_use]
    pub fn new(log: EventLog) -> Self {
        Self {
            log,
            authority: "recording.test".to_owned(),
            last_listener: Mutex::new(None),
        }
    }

    /// Listener slot of the most recently created call.
    #[must_use]
    pub fn last_listener(&self) -> Option<ListenerSlot<Resp>> { lock(&self.last_listener).clone() }
}

impl<Req, Resp> Channel<Req, Resp> for RecordingChannel<Resp>
where
    Req: Debug + 'static,
    Resp: Send + 'static,
{
    fn new_call(&self, method: &MethodDescriptor, _options: &CallOptions) -> Box<dyn ClientCall<Req, Resp>> {
        self.log.push(format!("channel.new_call {method}"));
        let call = RecordingClientCall::new(self.log.clone());
        *lock(&self.last_listener) = Some(call.listener());
        Box::new(call)
    }

    fn authority(&self) -> &str { &self.authority }
}

/// Server call that records every accepted operation as `server.<op>`.
pub struct RecordingServerCall {
    log: EventLog,
    method: MethodDescriptor,
    lifecycle: ServerCallLifecycle,
}

impl RecordingServerCall {
    #[must_use]
    pub fn new(log: EventLog, method: MethodDescriptor) -> Self {
        Self {
            log,
            method,
            lifecycle: ServerCallLifecycle::new(),
        }
    }

    /// Simulate a client cancellation.
    pub fn cancel(&mut self) -> bool { self.lifecycle.cancel() }
}

impl<Req, Resp: Debug> ServerCall<Req, Resp> for RecordingServerCall {
    fn request(&mut self, count: u32) -> Result<()> {
        self.lifecycle.request()?;
        self.log.push(format!("server.request {count}"));
        Ok(())
    }

    fn send_headers(&mut self, headers: Metadata) -> Result<()> {
        self.lifecycle.send_headers()?;
        self.log.push(format!("server.send_headers {headers}"));
        Ok(())
    }

    fn send_message(&mut self, message: Resp) -> Result<()> {
        if self.lifecycle.send_message()? {
            self.log.push("server.implicit_headers");
        }
        self.log.push(format!("server.send_message {message:?}"));
        Ok(())
    }

    fn close(&mut self, status: Status, trailers: Metadata) -> Result<()> {
        self.lifecycle.close()?;
        self.log.push(format!("server.close {} {trailers}", status.code()));
        Ok(())
    }

    fn is_cancelled(&self) -> bool { self.lifecycle.is_cancelled() }

    fn method_descriptor(&self) -> &MethodDescriptor { &self.method }

    fn is_terminated(&self) -> bool { self.lifecycle.is_terminated() }
}

/// Server listener that records every accepted callback as
/// `handler.<op>` and rejects callbacks after a terminal event.
pub struct RecordingServerListener {
    log: EventLog,
    finished: bool,
}

impl RecordingServerListener {
    #[must_use]
    pub fn new(log: EventLog) -> Self { Self { log, finished: false } }

    fn accept(&self, operation: &'static str) -> Result<()> {
        if self.finished {
            return Err(CallError::illegal_state(operation, "finished"));
        }
        Ok(())
    }
}

impl<Req: Debug> ServerCallListener<Req> for RecordingServerListener {
    fn on_message(&mut self, message: Req) -> Result<()> {
        self.accept("on_message")?;
        self.log.push(format!("handler.on_message {message:?}"));
        Ok(())
    }

    fn on_half_close(&mut self) -> Result<()> {
        self.accept("on_half_close")?;
        self.log.push("handler.on_half_close");
        Ok(())
    }

    fn on_cancel(&mut self) -> Result<()> {
        self.accept("on_cancel")?;
        self.finished = true;
        self.log.push("handler.on_cancel");
        Ok(())
    }

    fn on_complete(&mut self) -> Result<()> {
        self.accept("on_complete")?;
        self.finished = true;
        self.log.push("handler.on_complete");
        Ok(())
    }

    fn on_ready(&mut self) -> Result<()> {
        self.accept("on_ready")?;
        self.log.push("handler.on_ready");
        Ok(())
    }
}
