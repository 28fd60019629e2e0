//! End-to-end behaviour of the in-process transport.

use std::{
    sync::{Arc, Mutex},
    time::Duration,
};

use callframe::{
    CallError,
    Result,
    call::{ClientCall, ServerCall, ServerCallListener},
    calls::{unary_call, unary_handler},
    config::ChannelConfig,
    inprocess::{InProcessChannel, InProcessServer},
    interceptor::{Channel, ServerInterceptors, ServerMethodDefinition},
    interceptors::HeaderInjector,
    metadata::Metadata,
    method::{CallOptions, MethodDescriptor, MethodType},
    status::{Code, Status},
};
use callframe_testing::{EventLog, RecordingListener, RecordingServerListener};
use rstest::{fixture, rstest};

type ServerCallSlot = Arc<Mutex<Option<Box<dyn ServerCall<String, String>>>>>;

fn method(name: &str, method_type: MethodType) -> MethodDescriptor {
    MethodDescriptor::new(format!("test.Echo/{name}"), method_type).expect("method")
}

#[fixture]
fn echo_server() -> InProcessServer<String, String> {
    let server = InProcessServer::new();
    server
        .add_method(ServerMethodDefinition::new(
            method("Shout", MethodType::Unary),
            unary_handler(|request: String, headers: &Metadata| {
                if request.is_empty() {
                    return Err(Status::invalid_argument("empty request"));
                }
                let suffix = headers.get("x-suffix").and_then(|v| v.as_str()).unwrap_or("");
                Ok(format!("{}{suffix}", request.to_uppercase()))
            }),
        ))
        .expect("register Shout");
    server
}

/// Registers a streaming method whose handler parks the server call in the
/// returned slot and never closes on its own.
fn park_calls(server: &InProcessServer<String, String>, log: &EventLog) -> ServerCallSlot {
    let slot: ServerCallSlot = Arc::new(Mutex::new(None));
    let (parked, log) = (Arc::clone(&slot), log.clone());
    server
        .add_method(ServerMethodDefinition::new(
            method("Park", MethodType::BidiStreaming),
            move |call: Box<dyn ServerCall<String, String>>,
                  _: Metadata|
                  -> Result<Box<dyn ServerCallListener<String>>> {
                *parked.lock().expect("slot") = Some(call);
                Ok(Box::new(RecordingServerListener::new(log.clone())))
            },
        ))
        .expect("register Park");
    slot
}

async fn eventually(log: &EventLog, event: &str) {
    let waited = tokio::time::timeout(Duration::from_secs(5), async {
        while log.count(event) == 0 {
            tokio::time::sleep(Duration::from_millis(1)).await;
        }
    })
    .await;
    assert!(waited.is_ok(), "timed out waiting for {event}; saw {:?}", log.events());
}

fn channel(server: &InProcessServer<String, String>) -> InProcessChannel<String, String> {
    server.channel(ChannelConfig::default()).expect("inside a runtime")
}

#[rstest]
#[tokio::test]
async fn unary_round_trip(echo_server: InProcessServer<String, String>) {
    let channel = channel(&echo_server);
    let headers = Metadata::from_pairs([("x-suffix", "!")]).expect("headers");
    let outcome = unary_call(
        &channel,
        &method("Shout", MethodType::Unary),
        CallOptions::default(),
        headers,
        "hello".to_owned(),
    )
    .await
    .expect("unary call succeeds");
    assert_eq!(outcome.message, "HELLO!");
    assert!(outcome.headers.is_empty());
    assert!(outcome.trailers.is_empty());
}

#[rstest]
#[tokio::test]
async fn handler_errors_become_the_close_status(echo_server: InProcessServer<String, String>) {
    let channel = channel(&echo_server);
    let status = unary_call(
        &channel,
        &method("Shout", MethodType::Unary),
        CallOptions::default(),
        Metadata::new(),
        String::new(),
    )
    .await
    .expect_err("empty request rejected");
    assert_eq!(status.code(), Code::InvalidArgument);
}

#[rstest]
#[tokio::test]
async fn unknown_methods_are_unimplemented(echo_server: InProcessServer<String, String>) {
    let channel = channel(&echo_server);
    let status = unary_call(
        &channel,
        &method("Whisper", MethodType::Unary),
        CallOptions::default(),
        Metadata::new(),
        "hi".to_owned(),
    )
    .await
    .expect_err("no such method");
    assert_eq!(status.code(), Code::Unimplemented);
}

#[tokio::test]
async fn cancel_closes_exactly_once_on_both_sides() {
    let server = InProcessServer::new();
    let log = EventLog::new();
    let parked = park_calls(&server, &log);
    let channel = channel(&server);

    let mut call = channel.new_call(&method("Park", MethodType::BidiStreaming), &CallOptions::default());
    call.start(Box::new(RecordingListener::new(log.clone())), Metadata::new())
        .expect("start");
    call.send_message("one".to_owned()).expect("send");
    eventually(&log, "handler.on_message \"one\"").await;

    call.cancel(Some("caller gave up"), None);
    call.cancel(None, None);
    eventually(&log, "listener.on_close CANCELLED {}").await;
    eventually(&log, "handler.on_cancel").await;

    let mut server_call = parked.lock().expect("slot").take().expect("handler ran");
    assert!(server_call.is_cancelled());
    let err = server_call
        .close(Status::ok(), Metadata::new())
        .expect_err("close after cancel");
    assert!(err.is_illegal_state());
    assert!(matches!(
        call.send_message("late".to_owned()),
        Err(CallError::IllegalState { .. })
    ));

    tokio::task::yield_now().await;
    let closes = log
        .events()
        .iter()
        .filter(|e| e.starts_with("listener.on_close"))
        .count();
    assert_eq!(closes, 1);
    assert_eq!(log.count("handler.on_cancel"), 1);
    assert_eq!(log.count("handler.on_complete"), 0);
}

#[tokio::test]
async fn server_close_completes_and_streams_in_order() {
    let server = InProcessServer::new();
    let log = EventLog::new();
    let parked = park_calls(&server, &log);
    let channel = channel(&server);

    let mut call = channel.new_call(&method("Park", MethodType::BidiStreaming), &CallOptions::default());
    call.start(Box::new(RecordingListener::new(log.clone())), Metadata::new())
        .expect("start");
    {
        let mut slot = parked.lock().expect("slot");
        let server_call = slot.as_mut().expect("handler ran");
        server_call.send_message("a".to_owned()).expect("first");
        server_call.send_message("b".to_owned()).expect("second");
        let trailers = Metadata::from_pairs([("x-count", "2")]).expect("trailers");
        server_call.close(Status::ok(), trailers).expect("close");
    }
    eventually(&log, "listener.on_close OK {x-count: 2}").await;
    eventually(&log, "handler.on_complete").await;

    let client_events: Vec<String> = log
        .events()
        .into_iter()
        .filter(|e| e.starts_with("listener.") && e != "listener.on_ready")
        .collect();
    assert_eq!(
        client_events,
        [
            "listener.on_headers {}",
            "listener.on_message \"a\"",
            "listener.on_message \"b\"",
            "listener.on_close OK {x-count: 2}",
        ]
    );
    assert!(call.is_terminated());
    call.cancel(None, None);
    assert_eq!(log.count("handler.on_cancel"), 0, "cancel after close is a no-op");
}

#[tokio::test(start_paused = true)]
async fn deadline_expiry_is_deadline_exceeded() {
    let server = InProcessServer::new();
    let log = EventLog::new();
    let _parked = park_calls(&server, &log);
    let channel = server
        .channel(ChannelConfig::default().with_default_deadline(Duration::from_millis(50)))
        .expect("inside a runtime");

    let mut call = channel.new_call(&method("Park", MethodType::BidiStreaming), &CallOptions::default());
    call.start(Box::new(RecordingListener::new(log.clone())), Metadata::new())
        .expect("start");
    eventually(&log, "listener.on_close DEADLINE_EXCEEDED {}").await;
    eventually(&log, "handler.on_cancel").await;
    assert!(call.is_terminated());
}

#[tokio::test]
async fn server_interceptors_apply_to_registered_methods() {
    let headers = Metadata::from_pairs([("x-served-by", "inproc")]).expect("headers");
    let server = InProcessServer::new()
        .with_interceptors(ServerInterceptors::new().with(HeaderInjector::new(headers)));
    server
        .add_method(ServerMethodDefinition::new(
            method("Shout", MethodType::Unary),
            unary_handler(|request: String, _: &Metadata| Ok(request)),
        ))
        .expect("register");
    let outcome = unary_call(
        &channel(&server),
        &method("Shout", MethodType::Unary),
        CallOptions::default(),
        Metadata::new(),
        "hey".to_owned(),
    )
    .await
    .expect("call succeeds");
    assert_eq!(
        outcome.headers.get("x-served-by").and_then(|v| v.as_str()),
        Some("inproc")
    );
}

#[tokio::test]
async fn channel_reports_configured_authority() {
    let server: InProcessServer<String, String> = InProcessServer::new();
    let channel = server
        .channel(ChannelConfig::default().with_authority("orders.internal"))
        .expect("inside a runtime");
    assert_eq!(Channel::authority(&channel), "orders.internal");
}
