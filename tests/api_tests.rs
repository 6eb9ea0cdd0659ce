//! External tests for request construction and response checking:
//! endpoint paths, body shapes, and error classification.

use rstest::rstest;
use std::time::Duration;

use roomline::api::*;
use roomline::notify::CollectingNotifier;
use roomline::{ContinuationToken, RoomlineError, SyncResponse, SyncSession};

const HS: &str = "https://matrix.org";

// -- Paths -------------------------------------------------------------------

#[rstest]
#[case::send(send_text("!r:x", "hi").unwrap(), Method::Post, "/_matrix/client/r0/rooms/%21r%3Ax/send/m.room.message")]
#[case::edit(edit_text("!r:x", "$e", "hi").unwrap(), Method::Post, "/_matrix/client/r0/rooms/%21r%3Ax/send/m.room.message")]
#[case::redact(redact("!r:x", "$e", None).unwrap(), Method::Post, "/_matrix/client/r0/rooms/%21r%3Ax/redact/%24e")]
#[case::invite(invite("!r:x", "@b:x").unwrap(), Method::Post, "/_matrix/client/r0/rooms/%21r%3Ax/invite")]
#[case::join(join("!r:x").unwrap(), Method::Post, "/_matrix/client/r0/join/%21r%3Ax")]
#[case::members(joined_members("!r:x").unwrap(), Method::Get, "/_matrix/client/r0/rooms/%21r%3Ax/joined_members")]
#[case::sync(sync(&ContinuationToken::none(), Duration::from_secs(1)), Method::Get, "/_matrix/client/r0/sync")]
fn test_endpoint_paths(#[case] req: ApiRequest, #[case] method: Method, #[case] path: &str) {
    assert_eq!(req.method, method);
    assert_eq!(req.path, path);
    assert!(req.url(HS).starts_with(&format!("{HS}{path}")));
}

// -- Bodies ------------------------------------------------------------------

#[test]
fn test_edit_content_roundtrips_through_serde() {
    let req = edit_text("!r:x", "$e1", " fixed ").unwrap();
    let content: EditContent = serde_json::from_value(req.body.unwrap()).unwrap();
    assert_eq!(content.body, "fixed");
    assert_eq!(content.new_content, TextContent::new("fixed"));
    assert_eq!(content.relates_to.rel_type, "m.replace");
    assert_eq!(content.relates_to.event_id, "$e1");
}

#[test]
fn test_plan_serializes_without_empty_fields() {
    let json = serde_json::to_value(joined_members("!r:x").unwrap()).unwrap();
    assert_eq!(json["method"], "GET");
    assert!(json.get("body").is_none());
    assert!(json.get("query").is_none());
}

#[rstest]
#[case::blank_message(send_text("!r:x", " \n "))]
#[case::blank_edit(edit_text("!r:x", "$e", ""))]
#[case::blank_invitee(invite("!r:x", "  "))]
#[case::blank_join(join(""))]
fn test_blank_input_rejected(#[case] result: roomline::Result<ApiRequest>) {
    assert!(matches!(result, Err(RoomlineError::EmptyInput(_))));
}

// -- Responses ---------------------------------------------------------------

#[rstest]
#[case::rate_limited(429, r#"{"errcode":"M_LIMIT_EXCEEDED","error":"Too many requests"}"#, true)]
#[case::forbidden(403, r#"{"errcode":"M_FORBIDDEN","error":"You are not invited"}"#, false)]
#[case::bad_gateway(502, "", true)]
#[case::not_found(404, "not json", false)]
fn test_error_classification(#[case] status: u16, #[case] body: &str, #[case] retryable: bool) {
    let err = check_response::<SendResponse>(status, body.as_bytes()).unwrap_err();
    assert_eq!(err.is_retryable(), retryable, "{err}");
}

#[test]
fn test_errcode_on_success_status_is_still_an_error() {
    let err = check_response::<EmptyResponse>(200, br#"{"errcode":"M_UNKNOWN"}"#).unwrap_err();
    match err {
        RoomlineError::Api { errcode, message, .. } => {
            assert_eq!(errcode, "M_UNKNOWN");
            assert_eq!(message, "Unknown error");
        }
        other => panic!("expected Api error, got {other:?}"),
    }
}

#[test]
fn test_redact_response_with_event_id_is_accepted_as_empty() {
    assert!(check_response::<EmptyResponse>(200, br#"{"event_id":"$r"}"#).is_ok());
}

// -- Full client cycle -------------------------------------------------------

#[test]
fn test_send_then_sync_cycle() {
    let mut session = SyncSession::new("@me:x").with_room("!r:x");

    let req = session.send_request("hello").unwrap();
    assert_eq!(req.body.as_ref().unwrap()["body"], "hello");
    let sent: SendResponse = check_response(200, br#"{"event_id":"$1"}"#).unwrap();
    session.record_sent(&sent, "hello");

    let body = br#"{"next_batch":"s1","rooms":{"join":{"!r:x":{"timeline":{"events":[
        {"type":"m.room.message","event_id":"$1","sender":"@me:x","content":{"body":"hello"}},
        {"type":"m.room.message","event_id":"$2","sender":"@a:x","content":{"body":"hey"}}
    ]}}}}}"#;
    let response: SyncResponse = check_response(200, body).unwrap();
    session.apply_sync(response, &CollectingNotifier::new());

    let ids: Vec<_> = session.messages().iter().map(|m| m.id.as_str()).collect();
    assert_eq!(ids, vec!["$1", "$2"]);
    assert!(session
        .sync_request(Duration::from_secs(30))
        .url(HS)
        .contains("since=s1"));
}
