#![cfg(feature = "metrics")]
//! Tests for `callframe` metrics.
//!
//! These tests verify that the interceptor moves the call counters using
//! `metrics_util::debugging::DebuggingRecorder`.

use std::sync::Arc;

use callframe::{
    Result,
    call::{ServerCall, ServerCallListener},
    interceptor::{ClientInterceptors, ServerInterceptor},
    metadata::Metadata,
    method::{CallOptions, MethodDescriptor, MethodType},
    metrics::{CALLS_COMPLETED, CALLS_STARTED, MetricsInterceptor, Side, inc_completed},
    status::{Code, Status},
};
use callframe_testing::{EventLog, RecordingChannel, RecordingListener, RecordingServerCall, RecordingServerListener};
use metrics::{SharedString, Unit};
use metrics_util::{
    CompositeKey,
    debugging::{DebugValue, DebuggingRecorder, Snapshotter},
};

/// Creates a debugging recorder and snapshotter for metrics testing.
fn debugging_recorder_setup() -> (Snapshotter, DebuggingRecorder) {
    let recorder = DebuggingRecorder::new();
    let snapshotter = recorder.snapshotter();
    (snapshotter, recorder)
}

type Entry = (CompositeKey, Option<Unit>, Option<SharedString>, DebugValue);

/// Sum the counters named `name` whose labels include every pair in `labels`.
fn counter(metrics: &[Entry], name: &str, labels: &[(&str, &str)]) -> u64 {
    metrics
        .iter()
        .filter(|(k, _, _, _)| {
            k.key().name() == name
                && labels
                    .iter()
                    .all(|(key, value)| k.key().labels().any(|l| l.key() == *key && l.value() == *value))
        })
        .map(|(_, _, _, v)| match v {
            DebugValue::Counter(c) => *c,
            _ => 0,
        })
        .sum()
}

fn method() -> MethodDescriptor { MethodDescriptor::new("svc.Stock/Count", MethodType::Unary).expect("method") }

#[test]
fn completed_counter_is_labelled_by_code() {
    let (snapshotter, recorder) = debugging_recorder_setup();
    metrics::with_local_recorder(&recorder, || {
        inc_completed(Side::Server, "svc.Stock/Count", Code::NotFound);
    });
    let metrics = snapshotter.snapshot().into_vec();
    assert_eq!(
        counter(&metrics, CALLS_COMPLETED, &[("code", "NOT_FOUND"), ("side", "server")]),
        1
    );
}

#[test]
fn client_calls_are_counted_on_start_and_close() {
    let (snapshotter, recorder) = debugging_recorder_setup();
    let log = EventLog::new();
    metrics::with_local_recorder(&recorder, || {
        let base = Arc::new(RecordingChannel::<u8>::new(log.clone()));
        let channel = ClientInterceptors::<u8, u8>::new()
            .with(MetricsInterceptor)
            .channel(base.clone())
            .build()
            .expect("chain");
        let mut call = channel.new_call(&method(), &CallOptions::default());
        call.start(Box::new(RecordingListener::new(log.clone())), Metadata::new())
            .expect("start");
        base.last_listener()
            .expect("call created")
            .with(|listener| listener.on_close(Status::unavailable("down"), Metadata::new()))
            .expect("started")
            .expect("close accepted");
    });

    let metrics = snapshotter.snapshot().into_vec();
    assert_eq!(counter(&metrics, CALLS_STARTED, &[("side", "client")]), 1);
    assert_eq!(
        counter(&metrics, CALLS_COMPLETED, &[("side", "client"), ("code", "UNAVAILABLE")]),
        1
    );
}

#[test]
fn server_calls_are_counted_when_the_handler_closes() {
    let (snapshotter, recorder) = debugging_recorder_setup();
    let log = EventLog::new();
    metrics::with_local_recorder(&recorder, || {
        let handler_log = log.clone();
        let handler = move |mut call: Box<dyn ServerCall<u8, u8>>,
                            _: Metadata|
              -> Result<Box<dyn ServerCallListener<u8>>> {
            call.close(Status::ok(), Metadata::new())?;
            Ok(Box::new(RecordingServerListener::new(handler_log.clone())))
        };
        ServerInterceptor::intercept_call(
            &MetricsInterceptor,
            Box::new(RecordingServerCall::new(log.clone(), method())),
            Metadata::new(),
            &handler,
        )
        .expect("start_call");
    });

    let metrics = snapshotter.snapshot().into_vec();
    assert_eq!(
        counter(&metrics, CALLS_STARTED, &[("side", "server"), ("method", "svc.Stock/Count")]),
        1
    );
    assert_eq!(counter(&metrics, CALLS_COMPLETED, &[("side", "server"), ("code", "OK")]), 1);
    assert_eq!(log.events(), ["server.close OK {}"]);
}
