//! Call lifecycle logging.

use tracing::info;

use crate::{
    call::{ClientCall, ClientCallListener, ServerCall, ServerCallHandler, ServerCallListener},
    error::Result,
    forwarding::{
        ClientCallHooks,
        ClientListenerHooks,
        ForwardingClientCall,
        ForwardingClientCallListener,
        ForwardingServerCall,
        ForwardingServerCallListener,
        ServerCallHooks,
        ServerListenerHooks,
    },
    interceptor::{Channel, ClientInterceptor, ServerInterceptor},
    metadata::Metadata,
    method::{CallOptions, MethodDescriptor},
    status::{Cause, Status},
};

/// Emits an `info` event when a call starts, is cancelled and closes.
#[derive(Clone, Copy, Debug, Default)]
pub struct LoggingInterceptor;

struct ClientLog {
    method: String,
}

impl<Req, Resp: 'static> ClientCallHooks<Req, Resp> for ClientLog {
    fn start(
        &mut self,
        delegate: &mut dyn ClientCall<Req, Resp>,
        listener: Box<dyn ClientCallListener<Resp>>,
        headers: Metadata,
    ) -> Result<()> {
        info!(method = %self.method, headers = %headers, "client call started");
        let listener = ForwardingClientCallListener::with_hooks(
            listener,
            ClientLog {
                method: self.method.clone(),
            },
        );
        delegate.start(Box::new(listener), headers)
    }

    fn cancel(&mut self, delegate: &mut dyn ClientCall<Req, Resp>, message: Option<&str>, cause: Option<Cause>) {
        info!(method = %self.method, reason = message.unwrap_or_default(), "client call cancelled");
        delegate.cancel(message, cause);
    }
}

impl<Resp> ClientListenerHooks<Resp> for ClientLog {
    fn on_close(
        &mut self,
        delegate: &mut dyn ClientCallListener<Resp>,
        status: Status,
        trailers: Metadata,
    ) -> Result<()> {
        info!(method = %self.method, code = %status.code(), "client call closed");
        delegate.on_close(status, trailers)
    }
}

impl<Req, Resp> ClientInterceptor<Req, Resp> for LoggingInterceptor
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
            ClientLog {
                method: method.full_name().to_owned(),
            },
        ))
    }
}

struct ServerLog {
    method: String,
}

impl<Req, Resp> ServerCallHooks<Req, Resp> for ServerLog {
    fn close(
        &mut self,
        delegate: &mut dyn ServerCall<Req, Resp>,
        status: Status,
        trailers: Metadata,
    ) -> Result<()> {
        info!(method = %self.method, code = %status.code(), "server call closed");
        delegate.close(status, trailers)
    }
}

impl<Req> ServerListenerHooks<Req> for ServerLog {
    fn on_cancel(&mut self, delegate: &mut dyn ServerCallListener<Req>) -> Result<()> {
        info!(method = %self.method, "server call cancelled");
        delegate.on_cancel()
    }
}

impl<Req, Resp> ServerInterceptor<Req, Resp> for LoggingInterceptor
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
        let method = call.method_descriptor().full_name().to_owned();
        info!(method = %method, headers = %headers, "server call started");
        let call = ForwardingServerCall::with_hooks(
            call,
            ServerLog {
                method: method.clone(),
            },
        );
        let listener = next.start_call(Box::new(call), headers)?;
        Ok(Box::new(ForwardingServerCallListener::with_hooks(
            listener,
            ServerLog { method },
        )))
    }
}
