//! Client and server halves of an in-process call.

use std::{
    sync::{Arc, Mutex, MutexGuard, PoisonError},
    time::Duration,
};

use tokio::runtime::Handle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::{
    call::{
        CallLifecycle,
        CallState,
        ClientCall,
        ClientCallListener,
        ServerCall,
        ServerCallLifecycle,
        ServerCallListener,
    },
    dispatch::SerializingExecutor,
    error::Result,
    interceptor::HandlerRegistry,
    metadata::Metadata,
    method::{CallOptions, MethodDescriptor},
    status::{Cause, Status},
};

#[derive(Clone, Copy, Debug)]
enum ServerOutcome {
    Complete,
    Cancel,
}

/// State shared by both halves of one call.
struct Shared<Req, Resp> {
    client: CallLifecycle,
    server: ServerCallLifecycle,
    to_client: Option<SerializingExecutor<dyn ClientCallListener<Resp>>>,
    to_server: Option<SerializingExecutor<dyn ServerCallListener<Req>>>,
    pending_outcome: Option<ServerOutcome>,
    deadline: Option<CancellationToken>,
}

impl<Req, Resp> Shared<Req, Resp>
where
    Req: Send + 'static,
    Resp: Send + 'static,
{
    fn new() -> Self {
        Self {
            client: CallLifecycle::new(),
            server: ServerCallLifecycle::new(),
            to_client: None,
            to_server: None,
            pending_outcome: None,
            deadline: None,
        }
    }

    fn notify_client<F>(&self, callback: F)
    where
        F: FnOnce(&mut (dyn ClientCallListener<Resp> + 'static)) -> Result<()> + Send + 'static,
    {
        if let Some(executor) = &self.to_client {
            executor.execute(callback);
        }
    }

    fn notify_server<F>(&self, callback: F)
    where
        F: FnOnce(&mut (dyn ServerCallListener<Req> + 'static)) -> Result<()> + Send + 'static,
    {
        if let Some(executor) = &self.to_server {
            executor.execute(callback);
        }
    }

    fn close_client(&mut self, status: Status, trailers: Metadata) {
        if let Some(deadline) = self.deadline.take() {
            deadline.cancel();
        }
        if let Some(executor) = &self.to_client {
            executor.execute_final(move |listener| listener.on_close(status, trailers));
        }
    }

    fn finish_server(&mut self, outcome: ServerOutcome) {
        match &self.to_server {
            Some(executor) => deliver_outcome(executor, outcome),
            None => self.pending_outcome = Some(outcome),
        }
    }
}

fn deliver_outcome<Req>(executor: &SerializingExecutor<dyn ServerCallListener<Req>>, outcome: ServerOutcome)
where
    Req: Send + 'static,
{
    match outcome {
        ServerOutcome::Complete => executor.execute_final(|listener| listener.on_complete()),
        ServerOutcome::Cancel => executor.execute_final(|listener| listener.on_cancel()),
    };
}

type SharedState<Req, Resp> = Arc<Mutex<Shared<Req, Resp>>>;

fn lock<Req, Resp>(shared: &Mutex<Shared<Req, Resp>>) -> MutexGuard<'_, Shared<Req, Resp>> {
    shared.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Terminate from the server side. Delivers `on_close` and `on_complete`.
fn close_call<Req, Resp>(shared: &Mutex<Shared<Req, Resp>>, status: Status, trailers: Metadata) -> Result<()>
where
    Req: Send + 'static,
    Resp: Send + 'static,
{
    let mut state = lock(shared);
    state.server.close()?;
    state.client.close();
    debug!(code = %status.code(), "in-process call closed by server");
    state.close_client(status, trailers);
    state.finish_server(ServerOutcome::Complete);
    Ok(())
}

/// Terminate from the client side or the deadline timer. Delivers `on_close`
/// with `status` and `on_cancel`. A no-op once the call has terminated.
fn abort_call<Req, Resp>(shared: &Mutex<Shared<Req, Resp>>, status: Status)
where
    Req: Send + 'static,
    Resp: Send + 'static,
{
    let mut state = lock(shared);
    if !state.client.cancel() {
        return;
    }
    debug!(code = %status.code(), "in-process call aborted");
    state.close_client(status, Metadata::new());
    if state.server.cancel() {
        state.finish_server(ServerOutcome::Cancel);
    }
}

/// Client half of an in-process call, created by
/// [`super::InProcessChannel`].
pub struct InProcessClientCall<Req, Resp> {
    method: MethodDescriptor,
    options: CallOptions,
    registry: HandlerRegistry<Req, Resp>,
    runtime: Handle,
    shared: SharedState<Req, Resp>,
}

impl<Req, Resp> InProcessClientCall<Req, Resp>
where
    Req: Send + 'static,
    Resp: Send + 'static,
{
    pub(super) fn new(
        method: MethodDescriptor,
        options: CallOptions,
        registry: HandlerRegistry<Req, Resp>,
        runtime: Handle,
    ) -> Self {
        Self {
            method,
            options,
            registry,
            runtime,
            shared: Arc::new(Mutex::new(Shared::new())),
        }
    }

    /// Current client-side state.
    #[must_use]
    pub fn state(&self) -> CallState { lock(&self.shared).client.state() }

    fn dispatch_to_handler(&self, headers: Metadata) {
        let Some(definition) = self.registry.lookup(self.method.full_name()) else {
            debug!(method = %self.method, "no handler registered");
            let status = Status::unimplemented(format!("method not found: {}", self.method));
            if let Err(error) = close_call(&self.shared, status, Metadata::new()) {
                debug!(%error, "call already terminated");
            }
            return;
        };
        let server_call = InProcessServerCall {
            method: definition.method().clone(),
            shared: Arc::clone(&self.shared),
        };
        match definition.handler().start_call(Box::new(server_call), headers) {
            Ok(listener) => self.install_server_listener(listener),
            Err(error) => {
                warn!(method = %self.method, %error, "handler failed to start call");
                if let Err(error) = close_call(&self.shared, Status::from(&error), Metadata::new()) {
                    debug!(%error, "call already terminated");
                }
            }
        }
    }

    fn install_server_listener(&self, listener: Box<dyn ServerCallListener<Req>>) {
        let executor = SerializingExecutor::spawn(&self.runtime, listener);
        let mut state = lock(&self.shared);
        match state.pending_outcome.take() {
            Some(outcome) => deliver_outcome(&executor, outcome),
            None => {
                executor.execute(|listener| listener.on_ready());
            }
        }
        state.to_server = Some(executor);
    }

    fn arm_deadline(&self, timeout: Duration) {
        let token = CancellationToken::new();
        {
            let mut state = lock(&self.shared);
            if state.client.state().is_terminal() {
                return;
            }
            state.deadline = Some(token.clone());
        }
        let shared = Arc::clone(&self.shared);
        self.runtime.spawn(async move {
            tokio::select! {
                () = token.cancelled() => {}
                () = tokio::time::sleep(timeout) => {
                    let status = Status::deadline_exceeded(format!("deadline exceeded after {timeout:?}"));
                    abort_call(&shared, status);
                }
            }
        });
    }
}

impl<Req, Resp> ClientCall<Req, Resp> for InProcessClientCall<Req, Resp>
where
    Req: Send + 'static,
    Resp: Send + 'static,
{
    fn start(&mut self, listener: Box<dyn ClientCallListener<Resp>>, headers: Metadata) -> Result<()> {
        {
            let mut state = lock(&self.shared);
            state.client.start()?;
            state.to_client = Some(SerializingExecutor::spawn(&self.runtime, listener));
        }
        debug!(method = %self.method, "in-process call started");
        self.dispatch_to_handler(headers);
        {
            let state = lock(&self.shared);
            if !state.client.state().is_terminal() {
                state.notify_client(|listener| listener.on_ready());
            }
        }
        if let Some(timeout) = self.options.deadline() {
            self.arm_deadline(timeout);
        }
        Ok(())
    }

    fn request(&mut self, _count: u32) -> Result<()> { lock(&self.shared).client.request() }

    fn cancel(&mut self, message: Option<&str>, cause: Option<Cause>) {
        let mut status = Status::cancelled(message.unwrap_or("call cancelled by client"));
        if let Some(cause) = cause {
            status = status.with_cause(cause);
        }
        abort_call(&self.shared, status);
    }

    fn half_close(&mut self) -> Result<()> {
        let mut state = lock(&self.shared);
        state.client.half_close()?;
        if !state.server.is_terminated() {
            state.notify_server(|listener| listener.on_half_close());
        }
        Ok(())
    }

    fn send_message(&mut self, message: Req) -> Result<()> {
        let state = lock(&self.shared);
        state.client.send_message()?;
        if !state.server.is_terminated() {
            state.notify_server(move |listener| listener.on_message(message));
        }
        Ok(())
    }

    fn is_ready(&self) -> bool { lock(&self.shared).client.state() == CallState::Started }

    fn is_terminated(&self) -> bool { lock(&self.shared).client.state().is_terminal() }
}

/// Server half of an in-process call, handed to the registered handler.
pub struct InProcessServerCall<Req, Resp> {
    method: MethodDescriptor,
    shared: SharedState<Req, Resp>,
}

impl<Req, Resp> ServerCall<Req, Resp> for InProcessServerCall<Req, Resp>
where
    Req: Send + 'static,
    Resp: Send + 'static,
{
    fn request(&mut self, _count: u32) -> Result<()> { lock(&self.shared).server.request() }

    fn send_headers(&mut self, headers: Metadata) -> Result<()> {
        let mut state = lock(&self.shared);
        state.server.send_headers()?;
        state.notify_client(move |listener| listener.on_headers(headers));
        Ok(())
    }

    fn send_message(&mut self, message: Resp) -> Result<()> {
        let mut state = lock(&self.shared);
        if state.server.send_message()? {
            state.notify_client(|listener| listener.on_headers(Metadata::new()));
        }
        state.notify_client(move |listener| listener.on_message(message));
        Ok(())
    }

    fn close(&mut self, status: Status, trailers: Metadata) -> Result<()> {
        close_call(&self.shared, status, trailers)
    }

    fn is_cancelled(&self) -> bool { lock(&self.shared).server.is_cancelled() }

    fn is_ready(&self) -> bool { !lock(&self.shared).server.is_terminated() }

    fn method_descriptor(&self) -> &MethodDescriptor { &self.method }

    fn is_terminated(&self) -> bool { lock(&self.shared).server.is_terminated() }
}

#[cfg(test)]
mod tests {
    use super::*;

    type Events = Arc<Mutex<Vec<String>>>;

    struct Client(Events);

    impl ClientCallListener<u8> for Client {
        fn on_message(&mut self, message: u8) -> Result<()> {
            self.0.lock().expect("events").push(format!("client message {message}"));
            Ok(())
        }

        fn on_close(&mut self, status: Status, _: Metadata) -> Result<()> {
            self.0.lock().expect("events").push(format!("client close {}", status.code()));
            Ok(())
        }
    }

    struct Server(Events);

    impl ServerCallListener<u8> for Server {
        fn on_message(&mut self, message: u8) -> Result<()> {
            self.0.lock().expect("events").push(format!("server message {message}"));
            Ok(())
        }

        fn on_complete(&mut self) -> Result<()> {
            self.0.lock().expect("events").push("server complete".to_owned());
            Ok(())
        }
    }

    #[tokio::test]
    async fn notifications_reach_installed_listeners_in_order() {
        let events = Events::default();
        let runtime = Handle::current();
        let mut shared: Shared<u8, u8> = Shared::new();
        shared.notify_client(|listener| listener.on_message(0));

        let client: Box<dyn ClientCallListener<u8>> = Box::new(Client(Arc::clone(&events)));
        let server: Box<dyn ServerCallListener<u8>> = Box::new(Server(Arc::clone(&events)));
        let to_client = SerializingExecutor::spawn(&runtime, client);
        let to_server = SerializingExecutor::spawn(&runtime, server);
        shared.to_client = Some(to_client.clone());
        shared.to_server = Some(to_server.clone());

        shared.notify_server(|listener| listener.on_message(1));
        shared.notify_client(|listener| listener.on_message(2));
        shared.close_client(Status::ok(), Metadata::new());
        shared.finish_server(ServerOutcome::Complete);
        to_client.closed().await;
        to_server.closed().await;

        let events = events.lock().expect("events");
        let client_events: Vec<_> = events.iter().filter(|e| e.starts_with("client")).collect();
        let server_events: Vec<_> = events.iter().filter(|e| e.starts_with("server")).collect();
        assert_eq!(client_events, ["client message 2", "client close OK"]);
        assert_eq!(server_events, ["server message 1", "server complete"]);
    }

    #[test]
    fn outcome_waits_for_the_server_listener() {
        let mut shared: Shared<u8, u8> = Shared::new();
        shared.finish_server(ServerOutcome::Cancel);
        assert!(matches!(shared.pending_outcome, Some(ServerOutcome::Cancel)));
    }
}
