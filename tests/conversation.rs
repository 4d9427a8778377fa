use mcp2ai::models::{
    Conversation, Message, Role, ToolCallRequest, ToolCallResult, ToolErrorKind,
};
use mcp2ai::retry::RetryPolicy;
use serde_json::{json, Map, Value};
use std::time::Duration;

fn call(id: &str) -> ToolCallRequest {
    ToolCallRequest::new(id, "get_current_weather", Map::new())
}

#[test]
fn test_well_formed_conversation() {
    let calls = vec![call("call_1"), call("call_2")];
    let mut conversation = Conversation::new();
    conversation.push(Message::user("Weather in Tokyo and Paris?"));
    conversation.push(Message::assistant("", calls.clone()));
    conversation.push(Message::tool_result(
        &calls[0],
        &ToolCallResult::success("call_1", json!({"city": "Tokyo"})),
    ));
    conversation.push(Message::tool_result(
        &calls[1],
        &ToolCallResult::success("call_2", json!({"city": "Paris"})),
    ));
    conversation.push(Message::assistant("Both are sunny.", Vec::new()));

    assert!(conversation.is_well_formed());
    assert_eq!(conversation.len(), 5);
    assert_eq!(conversation.messages()[2].tool_name.as_deref(), Some("get_current_weather"));
}

#[test]
fn test_unanswered_or_misordered_calls_are_not_well_formed() {
    let calls = vec![call("call_1"), call("call_2")];

    let mut missing = Conversation::new();
    missing.push(Message::user("hi"));
    missing.push(Message::assistant("", calls.clone()));
    missing.push(Message::tool_result(
        &calls[0],
        &ToolCallResult::success("call_1", json!(1)),
    ));
    assert!(!missing.is_well_formed());

    let mut swapped = Conversation::new();
    swapped.push(Message::user("hi"));
    swapped.push(Message::assistant("", calls.clone()));
    swapped.push(Message::tool_result(
        &calls[1],
        &ToolCallResult::success("call_2", json!(2)),
    ));
    swapped.push(Message::tool_result(
        &calls[0],
        &ToolCallResult::success("call_1", json!(1)),
    ));
    assert!(!swapped.is_well_formed());

    let mut orphan = Conversation::new();
    orphan.push(Message::user("hi"));
    orphan.push(Message::tool_result(
        &calls[0],
        &ToolCallResult::success("call_1", json!(1)),
    ));
    assert!(!orphan.is_well_formed());
}

#[test]
fn test_tool_message_content() {
    let text = ToolCallResult::success("c", Value::String("2025-01-01T00:00:00Z".into()));
    assert_eq!(text.to_message_content(), "2025-01-01T00:00:00Z");

    let object = ToolCallResult::success("c", json!({"temp": 18}));
    assert_eq!(object.to_message_content(), r#"{"temp":18}"#);

    let failed = ToolCallResult::failure("c", ToolErrorKind::BackendInvocation, "boom");
    let content: Value = serde_json::from_str(&failed.to_message_content()).unwrap();
    assert_eq!(content, json!({"error": {"kind": "backend_invocation", "message": "boom"}}));
    assert!(failed.is_error());
    assert!(failed.content().is_none());
}

#[test]
fn test_message_serialization_skips_empty_fields() {
    let value = serde_json::to_value(Message::user("hello")).unwrap();
    assert_eq!(value, json!({"role": "user", "content": "hello"}));

    let reply = Message::tool_result(&call("call_1"), &ToolCallResult::success("call_1", json!(1)));
    assert_eq!(reply.role, Role::Tool);
    let value = serde_json::to_value(&reply).unwrap();
    assert_eq!(value["tool_call_id"], "call_1");
}

#[test]
fn test_retry_delay_schedule() {
    let policy = RetryPolicy {
        max_attempts: 5,
        initial_backoff_ms: 100,
        multiplier: 2.0,
        max_backoff_ms: 500,
    };

    assert_eq!(policy.delay_for(1), Duration::from_millis(100));
    assert_eq!(policy.delay_for(2), Duration::from_millis(200));
    assert_eq!(policy.delay_for(3), Duration::from_millis(400));
    assert_eq!(policy.delay_for(4), Duration::from_millis(500));

    assert!(policy.allows_retry(4));
    assert!(!policy.allows_retry(5));
}

#[test]
fn test_retry_none_never_retries() {
    let policy = RetryPolicy::none();
    assert!(!policy.allows_retry(1));

    let zero = RetryPolicy {
        max_attempts: 0,
        ..RetryPolicy::default()
    };
    assert!(!zero.allows_retry(1));
}
