use async_trait::async_trait;
use mcp2ai::backend::types::{McpTool, McpToolResult, ServerInfo};
use mcp2ai::server::{
    handle_message, serve, ToolService, INVALID_PARAMS, INVALID_REQUEST, METHOD_NOT_FOUND,
    PARSE_ERROR,
};
use serde_json::{json, Map, Value};
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};

struct FakeService;

#[async_trait]
impl ToolService for FakeService {
    fn server_info(&self) -> ServerInfo {
        ServerInfo {
            name: "fake-server".to_string(),
            version: "0.1.0".to_string(),
        }
    }

    fn tools(&self) -> Vec<McpTool> {
        vec![McpTool {
            name: "shout".to_string(),
            description: Some("Upper-case some text".to_string()),
            input_schema: json!({
                "type": "object",
                "properties": { "text": { "type": "string" } },
                "required": ["text"]
            }),
        }]
    }

    async fn call_tool(&self, name: &str, arguments: Map<String, Value>) -> McpToolResult {
        match (name, arguments.get("text").and_then(Value::as_str)) {
            ("shout", Some(text)) => McpToolResult::text(text.to_uppercase()),
            ("shout", None) => McpToolResult::error("Missing required parameter: text"),
            (other, _) => McpToolResult::error(format!("Unknown tool: {}", other)),
        }
    }
}

async fn handle(line: &str) -> Option<Value> {
    handle_message(&FakeService, line).await
}

#[tokio::test]
async fn test_initialize_reports_protocol_and_server() {
    let response = handle(r#"{"jsonrpc":"2.0","id":1,"method":"initialize","params":{}}"#)
        .await
        .unwrap();

    assert_eq!(response["jsonrpc"], "2.0");
    assert_eq!(response["id"], 1);
    assert_eq!(response["result"]["protocolVersion"], "2024-11-05");
    assert_eq!(response["result"]["serverInfo"]["name"], "fake-server");
    assert_eq!(response["result"]["capabilities"]["tools"]["listChanged"], false);
}

#[tokio::test]
async fn test_tools_list_uses_wire_names() {
    let response = handle(r#"{"jsonrpc":"2.0","id":"a","method":"tools/list"}"#)
        .await
        .unwrap();

    assert_eq!(response["id"], "a");
    let tools = response["result"]["tools"].as_array().unwrap();
    assert_eq!(tools.len(), 1);
    assert_eq!(tools[0]["name"], "shout");
    assert_eq!(tools[0]["inputSchema"]["required"], json!(["text"]));
}

#[tokio::test]
async fn test_tools_call_success_and_tool_error() {
    let ok = handle(
        r#"{"jsonrpc":"2.0","id":2,"method":"tools/call","params":{"name":"shout","arguments":{"text":"hi"}}}"#,
    )
    .await
    .unwrap();
    assert_eq!(ok["result"]["content"][0]["type"], "text");
    assert_eq!(ok["result"]["content"][0]["text"], "HI");
    assert!(ok["result"].get("isError").is_none());

    let failed = handle(
        r#"{"jsonrpc":"2.0","id":3,"method":"tools/call","params":{"name":"shout","arguments":{}}}"#,
    )
    .await
    .unwrap();
    assert!(failed.get("error").is_none());
    assert_eq!(failed["result"]["isError"], true);
    assert_eq!(
        failed["result"]["content"][0]["text"],
        "Missing required parameter: text"
    );
}

#[tokio::test]
async fn test_tools_call_with_bad_params() {
    let response = handle(r#"{"jsonrpc":"2.0","id":4,"method":"tools/call","params":{"arguments":{}}}"#)
        .await
        .unwrap();
    assert_eq!(response["error"]["code"], INVALID_PARAMS);
}

#[tokio::test]
async fn test_unknown_method() {
    let response = handle(r#"{"jsonrpc":"2.0","id":5,"method":"resources/list"}"#)
        .await
        .unwrap();
    assert_eq!(response["error"]["code"], METHOD_NOT_FOUND);
    assert_eq!(response["error"]["message"], "Method not found: resources/list");
}

#[tokio::test]
async fn test_parse_error_and_invalid_request() {
    let response = handle("{not json").await.unwrap();
    assert_eq!(response["error"]["code"], PARSE_ERROR);
    assert_eq!(response["id"], Value::Null);

    let response = handle(r#"{"jsonrpc":"2.0"}"#).await.unwrap();
    assert_eq!(response["error"]["code"], INVALID_REQUEST);
}

#[tokio::test]
async fn test_notifications_and_stray_responses_get_no_reply() {
    assert!(handle(r#"{"jsonrpc":"2.0","method":"notifications/initialized"}"#)
        .await
        .is_none());
    assert!(handle(r#"{"jsonrpc":"2.0","id":9,"result":{}}"#).await.is_none());
}

#[tokio::test]
async fn test_ping() {
    let response = handle(r#"{"jsonrpc":"2.0","id":6,"method":"ping"}"#)
        .await
        .unwrap();
    assert_eq!(response["result"], json!({}));
}

#[tokio::test]
async fn test_serve_answers_each_line_and_stops_at_eof() {
    let (client, server) = tokio::io::duplex(8 * 1024);
    let (server_read, server_write) = tokio::io::split(server);
    let server_task = tokio::spawn(serve(Arc::new(FakeService), server_read, server_write));

    let (client_read, mut client_write) = tokio::io::split(client);
    client_write
        .write_all(
            concat!(
                r#"{"jsonrpc":"2.0","id":1,"method":"ping"}"#,
                "\n\n",
                r#"{"jsonrpc":"2.0","method":"notifications/initialized"}"#,
                "\n",
                r#"{"jsonrpc":"2.0","id":2,"method":"tools/list"}"#,
                "\n"
            )
            .as_bytes(),
        )
        .await
        .unwrap();
    client_write.shutdown().await.unwrap();

    let mut lines = BufReader::new(client_read).lines();
    let mut ids = Vec::new();
    while let Some(line) = lines.next_line().await.unwrap() {
        let response: Value = serde_json::from_str(&line).unwrap();
        ids.push(response["id"].as_i64().unwrap());
    }
    ids.sort();

    assert_eq!(ids, vec![1, 2]);
    server_task.await.unwrap().unwrap();
}

#[tokio::test]
async fn test_serve_survives_invalid_utf8_line() {
    let (client, server) = tokio::io::duplex(8 * 1024);
    let (server_read, server_write) = tokio::io::split(server);
    let server_task = tokio::spawn(serve(Arc::new(FakeService), server_read, server_write));

    let (client_read, mut client_write) = tokio::io::split(client);
    client_write.write_all(b"\xff\xfe garbage\n").await.unwrap();
    client_write
        .write_all(concat!(r#"{"jsonrpc":"2.0","id":7,"method":"ping"}"#, "\n").as_bytes())
        .await
        .unwrap();
    client_write.shutdown().await.unwrap();

    let mut lines = BufReader::new(client_read).lines();
    let mut responses = Vec::new();
    while let Some(line) = lines.next_line().await.unwrap() {
        responses.push(serde_json::from_str::<Value>(&line).unwrap());
    }

    assert_eq!(responses.len(), 2);
    let parse_error = responses.iter().find(|r| r["id"].is_null()).unwrap();
    assert_eq!(parse_error["error"]["code"], PARSE_ERROR);
    let pong = responses.iter().find(|r| r["id"] == 7).unwrap();
    assert_eq!(pong["result"], json!({}));

    server_task.await.unwrap().unwrap();
}
