//! Metric helpers for `callframe`.
//!
//! This module defines metric names and a [`MetricsInterceptor`] recording
//! them through the [`metrics`](https://docs.rs/metrics) crate.

use metrics::counter;

use crate::{
    call::{ClientCall, ClientCallListener, ServerCall, ServerCallHandler, ServerCallListener},
    error::Result,
    forwarding::{
        ClientCallHooks,
        ClientListenerHooks,
        ForwardingClientCall,
        ForwardingClientCallListener,
        ForwardingServerCall,
        ServerCallHooks,
    },
    interceptor::{Channel, ClientInterceptor, ServerInterceptor},
    metadata::Metadata,
    method::{CallOptions, MethodDescriptor},
    status::{Code, Status},
};

/// Name of the counter tracking started calls.
pub const CALLS_STARTED: &str = "callframe_calls_started_total";
/// Name of the counter tracking completed calls, labelled by status code.
pub const CALLS_COMPLETED: &str = "callframe_calls_completed_total";

/// Side of the call being measured.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Side {
    /// Calls made by this process.
    Client,
    /// Calls served by this process.
    Server,
}

impl Side {
    fn as_str(self) -> &'static str {
        match self {
            Side::Client => "client",
            Side::Server => "server",
        }
    }
}

/// Record a started call.
pub fn inc_started(side: Side, method: &str) {
    counter!(CALLS_STARTED, "side" => side.as_str(), "method" => method.to_owned()).increment(1);
}

/// Record a completed call with its final status code.
pub fn inc_completed(side: Side, method: &str, code: Code) {
    counter!(
        CALLS_COMPLETED,
        "side" => side.as_str(),
        "method" => method.to_owned(),
        "code" => code.as_str()
    )
    .increment(1);
}

/// Counts started and completed calls on either side.
///
/// Client calls are counted as completed when the listener receives
/// `on_close`, server calls when the handler closes the call.
#[derive(Clone, Copy, Debug, Default)]
pub struct MetricsInterceptor;

struct Measure {
    side: Side,
    method: String,
}

impl<Req, Resp: 'static> ClientCallHooks<Req, Resp> for Measure {
    fn start(
        &mut self,
        delegate: &mut dyn ClientCall<Req, Resp>,
        listener: Box<dyn ClientCallListener<Resp>>,
        headers: Metadata,
    ) -> Result<()> {
        let listener = ForwardingClientCallListener::with_hooks(
            listener,
            Measure {
                side: self.side,
                method: self.method.clone(),
            },
        );
        delegate.start(Box::new(listener), headers)?;
        inc_started(self.side, &self.method);
        Ok(())
    }
}

impl<Resp> ClientListenerHooks<Resp> for Measure {
    fn on_close(
        &mut self,
        delegate: &mut dyn ClientCallListener<Resp>,
        status: Status,
        trailers: Metadata,
    ) -> Result<()> {
        inc_completed(self.side, &self.method, status.code());
        delegate.on_close(status, trailers)
    }
}

impl<Req, Resp> ServerCallHooks<Req, Resp> for Measure {
    fn close(
        &mut self,
        delegate: &mut dyn ServerCall<Req, Resp>,
        status: Status,
        trailers: Metadata,
    ) -> Result<()> {
        let code = status.code();
        delegate.close(status, trailers)?;
        inc_completed(self.side, &self.method, code);
        Ok(())
    }
}

impl<Req, Resp> ClientInterceptor<Req, Resp> for MetricsInterceptor
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
            Measure {
                side: Side::Client,
                method: method.full_name().to_owned(),
            },
        ))
    }
}

impl<Req, Resp> ServerInterceptor<Req, Resp> for MetricsInterceptor
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
        inc_started(Side::Server, &method);
        let call = ForwardingServerCall::with_hooks(
            call,
            Measure {
                side: Side::Server,
                method,
            },
        );
        next.start_call(Box::new(call), headers)
    }
}
