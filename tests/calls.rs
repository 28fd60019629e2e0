//! Unary helpers exercised without a transport.

use callframe::{
    call::{ClientCallListener, ServerCallHandler},
    calls::{ResponseListener, unary_handler},
    metadata::Metadata,
    method::{MethodDescriptor, MethodType},
    status::{Code, Status},
};
use callframe_testing::{EventLog, RecordingServerCall};
use rstest::rstest;

fn method() -> MethodDescriptor { MethodDescriptor::new("svc.Math/Double", MethodType::Unary).expect("method") }

#[test]
fn response_listener_publishes_the_outcome() {
    let (mut listener, mut rx) = ResponseListener::<u32>::new();
    let headers = Metadata::from_pairs([("x-node", "7")]).expect("headers");
    listener.on_headers(headers.clone()).expect("headers");
    listener.on_message(42).expect("message");
    listener.on_close(Status::ok(), Metadata::new()).expect("close");

    let outcome = rx.try_recv().expect("published").expect("successful call");
    assert_eq!(outcome.message, 42);
    assert_eq!(outcome.headers, headers);
    assert!(listener.on_message(1).is_err(), "closed listener rejects messages");
    assert!(listener.on_close(Status::ok(), Metadata::new()).is_err());
}

#[rstest]
#[case::failed_status(vec![], Status::not_found("gone"), Code::NotFound)]
#[case::missing_message(vec![], Status::ok(), Code::Internal)]
#[case::extra_message(vec![1, 2], Status::ok(), Code::Internal)]
fn response_listener_reports_failures(#[case] messages: Vec<u32>, #[case] status: Status, #[case] expected: Code) {
    let (mut listener, mut rx) = ResponseListener::<u32>::new();
    for message in messages {
        listener.on_message(message).expect("message");
    }
    listener.on_close(status, Metadata::new()).expect("close");
    let status = rx.try_recv().expect("published").expect_err("failed call");
    assert_eq!(status.code(), expected);
}

#[test]
fn response_listener_rejects_late_headers() {
    let (mut listener, _rx) = ResponseListener::<u32>::new();
    listener.on_message(1).expect("message");
    assert!(listener.on_headers(Metadata::new()).is_err());
}

fn doubler() -> impl ServerCallHandler<u32, u32> {
    unary_handler(|request: u32, _: &Metadata| {
        request
            .checked_mul(2)
            .ok_or_else(|| Status::out_of_range("overflow"))
    })
}

#[test]
fn unary_handler_replies_once_half_closed() {
    let log = EventLog::new();
    let mut listener = doubler()
        .start_call(Box::new(RecordingServerCall::new(log.clone(), method())), Metadata::new())
        .expect("start_call");
    listener.on_message(21).expect("request");
    assert_eq!(log.events(), ["server.request 2"]);

    listener.on_half_close().expect("half close");
    listener.on_complete().expect("complete");
    assert!(listener.on_message(1).is_err(), "completed listener rejects messages");
    assert_eq!(
        log.events(),
        [
            "server.request 2",
            "server.send_headers {}",
            "server.send_message 42",
            "server.close OK {}",
        ]
    );
}

#[rstest]
#[case::handler_error(vec![u32::MAX], "server.close OUT_OF_RANGE {}")]
#[case::no_request(vec![], "server.close INTERNAL {}")]
#[case::two_requests(vec![1, 2], "server.close INTERNAL {}")]
fn unary_handler_closes_with_an_error(#[case] requests: Vec<u32>, #[case] expected: &str) {
    let log = EventLog::new();
    let mut listener = doubler()
        .start_call(Box::new(RecordingServerCall::new(log.clone(), method())), Metadata::new())
        .expect("start_call");
    for request in requests {
        listener.on_message(request).expect("request");
    }
    listener.on_half_close().expect("half close");
    assert_eq!(log.count(expected), 1, "events: {:?}", log.events());
    assert_eq!(log.count("server.send_message 2"), 0);
}
