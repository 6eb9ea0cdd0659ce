//! External tests for timeline reconciliation: scenarios, ordering rules,
//! and properties that must hold for any event stream.

use proptest::prelude::*;
use rstest::rstest;
use serde_json::json;

use roomline::event::{EventRecord, UpdateBatch};
use roomline::reconcile::{ContinuationToken, Focus, Message, MessageList, Reconciler};

const ME: &str = "@me:x";

fn create(id: &str, body: &str) -> EventRecord {
    EventRecord::Creation {
        id: id.into(),
        sender: "@a:x".into(),
        body: body.into(),
    }
}

fn edit(target: &str, body: &str) -> EventRecord {
    EventRecord::Edit {
        id: format!("$edit-{target}-{body}"),
        target: target.into(),
        body: Some(body.into()),
    }
}

fn redact(target: &str) -> EventRecord {
    EventRecord::Redaction { target: target.into() }
}

fn apply(list: &mut MessageList, events: Vec<EventRecord>) -> ContinuationToken {
    Reconciler::new(ME)
        .reconcile(
            list,
            ContinuationToken::from("s0"),
            UpdateBatch::new(events, Some("s1".into())),
            Focus::Foreground,
        )
        .token
}

fn ids(list: &MessageList) -> Vec<&str> {
    list.iter().map(|m| m.id.as_str()).collect()
}

// ---------------------------------------------------------------------------
// Scenarios
// ---------------------------------------------------------------------------

#[test]
fn test_single_creation_scenario() {
    let mut list = MessageList::new();
    let token = apply(&mut list, vec![create("e1", "hi")]);
    assert_eq!(list.as_slice(), &[Message::new("e1", "hi", "@a:x")]);
    assert_eq!(token.as_str(), Some("s1"));
}

#[test]
fn test_edit_existing_scenario() {
    let mut list = MessageList::new();
    list.push(Message::new("e1", "hi", "@a:x"));
    apply(&mut list, vec![edit("e1", "hi!")]);
    let m = list.get("e1").unwrap();
    assert_eq!(m.body, "hi!");
    assert!(m.edited);
}

#[test]
fn test_explicit_redaction_scenario() {
    let mut list = MessageList::new();
    list.push(Message::new("e1", "hi", "@a:x"));
    apply(&mut list, vec![redact("e1")]);
    assert!(list.is_empty());
}

#[test]
fn test_duplicate_creation_scenario() {
    let mut list = MessageList::new();
    apply(&mut list, vec![create("e1", "hi"), create("e1", "hi")]);
    assert_eq!(ids(&list), vec!["e1"]);
}

#[test]
fn test_missing_cursor_keeps_token() {
    let mut list = MessageList::new();
    let out = Reconciler::new(ME).reconcile(
        &mut list,
        ContinuationToken::from("s5"),
        UpdateBatch::new(vec![], None),
        Focus::Foreground,
    );
    assert_eq!(out.token, ContinuationToken::from("s5"));
}

// ---------------------------------------------------------------------------
// Ordering rules
// ---------------------------------------------------------------------------

#[test]
fn test_edit_before_creation_never_resurfaces() {
    let mut list = MessageList::new();
    apply(&mut list, vec![edit("e1", "late edit"), create("e1", "original")]);
    let m = list.get("e1").unwrap();
    assert_eq!(m.body, "original");
    assert!(!m.edited);

    apply(&mut list, vec![create("e1", "original")]);
    assert_eq!(list.get("e1").unwrap().body, "original");
}

#[test]
fn test_redaction_is_terminal() {
    let mut list = MessageList::new();
    apply(&mut list, vec![create("e1", "hi"), redact("e1")]);
    apply(&mut list, vec![edit("e1", "resurrected")]);
    assert!(list.is_empty());
}

#[test]
fn test_redact_before_create_batch_is_idempotent() {
    let events = vec![redact("e1"), create("e1", "gone"), create("e2", "kept")];
    let mut list = MessageList::new();
    apply(&mut list, events.clone());
    let once = list.clone();
    apply(&mut list, events);
    assert_eq!(list, once);
    assert_eq!(ids(&list), vec!["e2"]);
}

#[test]
fn test_create_then_redact_batch_is_idempotent() {
    let events = vec![create("e1", "hi"), redact("e1"), create("e2", "kept")];
    let mut list = MessageList::new();
    apply(&mut list, events.clone());
    apply(&mut list, events);
    assert_eq!(ids(&list), vec!["e2"]);
}

#[test]
fn test_observation_order_is_preserved() {
    let mut list = MessageList::new();
    apply(&mut list, vec![create("b", "2"), create("a", "1")]);
    apply(&mut list, vec![create("c", "3")]);
    assert_eq!(ids(&list), vec!["b", "a", "c"]);
}

#[rstest]
#[case::marker(json!({
    "type": "m.room.message", "event_id": "$x", "sender": "@a:x",
    "content": { "body": "looks new" },
    "unsigned": { "redacted_because": { "redacts": "e1" } }
}))]
#[case::redaction_top_level(json!({ "type": "m.room.redaction", "redacts": "e1" }))]
#[case::redaction_in_content(json!({ "type": "m.room.redaction", "content": { "redacts": "e1" } }))]
fn test_raw_redaction_shapes_remove_target(#[case] raw: serde_json::Value) {
    let mut list = MessageList::new();
    list.push(Message::new("e1", "hi", "@a:x"));
    let batch = UpdateBatch::from_raw(&[raw], Some("s1".into()));
    Reconciler::new(ME).reconcile(&mut list, ContinuationToken::none(), batch, Focus::Foreground);
    assert!(list.is_empty());
}

#[rstest]
#[case::new_content(json!({ "body": "* fixed", "m.new_content": { "body": "fixed" } }), "fixed", true)]
#[case::plain_body(json!({ "body": "fixed" }), "fixed", true)]
#[case::new_content_without_body(json!({ "body": "* fixed", "m.new_content": {} }), "hi", false)]
#[case::empty_body(json!({ "body": "" }), "hi", false)]
fn test_raw_edit_bodies(
    #[case] mut content: serde_json::Value,
    #[case] expected: &str,
    #[case] edited: bool,
) {
    content["m.relates_to"] = json!({ "rel_type": "m.replace", "event_id": "e1" });
    let raw = json!({ "type": "m.room.message", "event_id": "$edit", "sender": "@a:x", "content": content });

    let mut list = MessageList::new();
    list.push(Message::new("e1", "hi", "@a:x"));
    let batch = UpdateBatch::from_raw(&[raw], Some("s1".into()));
    Reconciler::new(ME).reconcile(&mut list, ContinuationToken::none(), batch, Focus::Foreground);

    let m = list.get("e1").unwrap();
    assert_eq!(m.body, expected);
    assert_eq!(m.edited, edited);
    assert!(!list.contains("$edit"), "an edit must never become a message");
}

// ---------------------------------------------------------------------------
// Properties
// ---------------------------------------------------------------------------

fn arb_event() -> impl Strategy<Value = EventRecord> {
    let id = prop::sample::select(vec!["e1", "e2", "e3", "e4"]);
    prop_oneof![
        (id.clone(), "[a-z]{0,6}").prop_map(|(id, body)| create(id, &body)),
        (id.clone(), prop::option::of("[a-z]{1,6}")).prop_map(|(id, body)| EventRecord::Edit {
            id: String::new(),
            target: id.into(),
            body,
        }),
        id.clone().prop_map(redact),
        id.prop_map(|id| EventRecord::RedactionMarker { target: id.into() }),
    ]
}

/// Give every edit its own event id, as a homeserver would.
fn number_edits(prefix: &str, events: Vec<EventRecord>) -> Vec<EventRecord> {
    events
        .into_iter()
        .enumerate()
        .map(|(i, event)| match event {
            EventRecord::Edit { target, body, .. } => EventRecord::Edit {
                id: format!("${prefix}{i}"),
                target,
                body,
            },
            other => other,
        })
        .collect()
}

proptest! {
    #[test]
    fn prop_ids_stay_unique(batches in prop::collection::vec(prop::collection::vec(arb_event(), 0..12), 1..5)) {
        let mut list = MessageList::new();
        for (n, events) in batches.into_iter().enumerate() {
            apply(&mut list, number_edits(&format!("b{n}-"), events));
            let mut seen = std::collections::HashSet::new();
            for m in &list {
                prop_assert!(seen.insert(m.id.clone()), "duplicate id {}", m.id);
            }
        }
    }

    #[test]
    fn prop_batch_is_idempotent(prior in prop::collection::vec(arb_event(), 0..8), events in prop::collection::vec(arb_event(), 0..12)) {
        let prior = number_edits("p", prior);
        let events = number_edits("e", events);
        let mut list = MessageList::new();
        apply(&mut list, prior);
        apply(&mut list, events.clone());
        let once = list.clone();
        apply(&mut list, events);
        prop_assert_eq!(once, list);
    }
}
