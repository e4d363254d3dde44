//! Facade tests against scripted stdio servers. Each mock is a shell
//! script answering canned JSON-RPC responses; request IDs are
//! deterministic because every session allocates from 1.

use std::collections::HashMap;
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use serde_json::{json, Value};

use conduit_mcp_client::{McpClient, ServerSelector};
use conduit_mcp_core::types::{ModelPreferences, Root};
use conduit_mcp_core::McpError;
use conduit_mcp_transport::{TransportConfig, TransportKind};

const INIT_RESPONSE: &str = r#"echo '{"jsonrpc":"2.0","id":1,"result":{"protocolVersion":"2025-11-25","capabilities":{"tools":{"listChanged":true}},"serverInfo":{"name":"mock-server","version":"0.1.0"}}}'"#;

fn stdio_config(script: &str) -> TransportConfig {
    TransportConfig::Stdio {
        command: vec!["sh".to_string(), "-c".to_string(), script.to_string()],
        env: HashMap::new(),
    }
}

async fn wait_for_file(path: &Path) -> String {
    for _ in 0..100 {
        if let Ok(content) = std::fs::read_to_string(path) {
            if !content.trim().is_empty() {
                return content;
            }
        }
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
    panic!("timed out waiting for {path:?}");
}

// A 16-byte WAV header: "RIFF" then "WAVE" at offset 8.
const WAV_HEADER_B64: &str = "UklGRiQAAABXQVZFZm10IA==";

#[tokio::test]
async fn tool_annotations_and_audio_round_trip() {
    let script = format!(
        r#"
read line
{INIT_RESPONSE}
read line
read line
echo '{{"jsonrpc":"2.0","id":2,"result":{{"tools":[{{"name":"get_audio","description":"Generate a tone","inputSchema":{{"type":"object","properties":{{"frequency":{{"type":"number"}}}},"required":["frequency"]}},"annotations":{{"readOnlyHint":true,"destructiveHint":false,"idempotentHint":true,"openWorldHint":false}}}}]}}}}'
read line
echo '{{"jsonrpc":"2.0","id":3,"result":{{"content":[{{"type":"audio","data":"{WAV_HEADER_B64}","mimeType":"audio/wav"}}]}}}}'
read line
"#
    );

    let client = McpClient::new();
    client.add_server("audio", stdio_config(&script)).await.unwrap();

    let tools = client.list_tools().await.unwrap();
    assert_eq!(tools.len(), 1);
    assert_eq!(tools[0].server, "audio");
    let tool = &tools[0].item;
    assert_eq!(tool.name, "get_audio");
    let annotations = tool.annotations.as_ref().unwrap();
    assert!(annotations.read_only_hint());
    assert!(!annotations.destructive_hint());
    assert!(annotations.idempotent_hint());
    assert!(!annotations.open_world_hint());
    // The literal false values were not erased by defaulting.
    assert_eq!(annotations.destructive_hint, Some(false));
    assert_eq!(annotations.open_world_hint, Some(false));

    // Missing required argument fails before anything hits the wire.
    let err = client
        .call_tool("get_audio", Some(json!({})), None)
        .await
        .unwrap_err();
    assert!(matches!(err, McpError::ValidationError(ref m) if m.contains("frequency")));

    // With a single stdio server the transport-kind selector resolves
    // without touching the wire.
    let by_kind = client
        .server(ServerSelector::Kind(TransportKind::Stdio))
        .await
        .unwrap();
    assert_eq!(by_kind.name(), "audio");

    let result = client
        .call_tool("get_audio", Some(json!({"frequency": 440})), None)
        .await
        .unwrap();
    let conduit_mcp_core::types::Content::Audio(audio) = &result.content[0] else {
        panic!("expected audio content, got {:?}", result.content);
    };
    assert_eq!(audio.mime_type, "audio/wav");
    let bytes = audio.decode_bytes().unwrap();
    assert_eq!(&bytes[..4], b"RIFF");
    assert_eq!(&bytes[8..12], b"WAVE");

    client.cleanup().await.unwrap();
}

#[tokio::test]
async fn cross_server_tool_collision_requires_a_selector() {
    let script_for = |server: &str| {
        format!(
            r#"
read line
{INIT_RESPONSE}
read line
read line
echo '{{"jsonrpc":"2.0","id":2,"result":{{"tools":[{{"name":"foo","description":"Foo","inputSchema":{{"type":"object"}}}}]}}}}'
read line
echo '{{"jsonrpc":"2.0","id":3,"result":{{"content":[{{"type":"text","text":"from {server}"}}]}}}}'
read line
"#
        )
    };

    let client = McpClient::new();
    client.add_server("A", stdio_config(&script_for("A"))).await.unwrap();
    client.add_server("B", stdio_config(&script_for("B"))).await.unwrap();

    let err = client.call_tool("foo", Some(json!({})), None).await.unwrap_err();
    match err {
        McpError::AmbiguousToolName { name, candidates } => {
            assert_eq!(name, "foo");
            assert!(candidates.contains(&"A".to_string()));
            assert!(candidates.contains(&"B".to_string()));
        }
        other => panic!("expected ambiguity, got {other:?}"),
    }

    let result = client
        .call_tool("foo", Some(json!({})), Some(ServerSelector::Name("A")))
        .await
        .unwrap();
    assert_eq!(result.content[0].as_text(), Some("from A"));

    // A kind selector is no help here: both servers are stdio.
    let err = client
        .server(ServerSelector::Kind(TransportKind::Stdio))
        .await
        .unwrap_err();
    assert!(matches!(err, McpError::ValidationError(ref m) if m.contains("A") && m.contains("B")));

    // An instance selector pins the exact connection.
    let instance = client.server(ServerSelector::Name("B")).await.unwrap();
    let result = client
        .call_tool("foo", Some(json!({})), Some(ServerSelector::Instance(instance)))
        .await
        .unwrap();
    assert_eq!(result.content[0].as_text(), Some("from B"));

    let err = client.call_tool("missing", None, None).await.unwrap_err();
    assert!(matches!(err, McpError::ToolNotFound { .. }));

    client.cleanup().await.unwrap();
}

#[tokio::test]
async fn list_changed_notification_clears_the_tool_cache() {
    let script = format!(
        r#"
read line
{INIT_RESPONSE}
read line
read line
echo '{{"jsonrpc":"2.0","id":2,"result":{{"tools":[{{"name":"before","inputSchema":{{"type":"object"}}}}]}}}}'
echo '{{"jsonrpc":"2.0","method":"notifications/tools/list_changed"}}'
read line
echo '{{"jsonrpc":"2.0","id":3,"result":{{"tools":[{{"name":"after","inputSchema":{{"type":"object"}}}}]}}}}'
read line
"#
    );

    let client = McpClient::new();
    client.add_server("srv", stdio_config(&script)).await.unwrap();

    let tools = client.list_tools().await.unwrap();
    assert_eq!(tools[0].item.name, "before");

    // Let the invalidation notification drain through the reader.
    tokio::time::sleep(Duration::from_millis(200)).await;

    let tools = client.list_tools().await.unwrap();
    assert_eq!(tools[0].item.name, "after");

    client.cleanup().await.unwrap();
}

#[tokio::test]
async fn elicitation_accept_flows_back_to_the_server() {
    let dir = tempfile::tempdir().unwrap();
    let response_file = dir.path().join("elicitation.json");
    let script = format!(
        r#"
read line
{INIT_RESPONSE}
read line
echo '{{"jsonrpc":"2.0","id":"e1","method":"elicitation/create","params":{{"message":"Pick color","mode":"form","requestedSchema":{{"type":"object","properties":{{"color":{{"type":"string","enum":["red","green"]}}}},"required":["color"]}}}}}}'
read resp
printf '%s\n' "$resp" > {file}
read line
"#,
        file = response_file.display()
    );

    let client = McpClient::new();
    // The handler answers with a value outside the enum; the response still
    // goes out (the server is authoritative) with the violation logged.
    client.on_elicitation_request(Arc::new(|_request| {
        Box::pin(async { Ok::<Value, McpError>(json!({"color": "blue"})) })
    }));
    client.add_server("elicit", stdio_config(&script)).await.unwrap();

    let captured = wait_for_file(&response_file).await;
    let response: Value = serde_json::from_str(captured.trim()).unwrap();
    assert_eq!(response["id"], "e1");
    assert_eq!(response["result"]["action"], "accept");
    assert_eq!(response["result"]["content"]["color"], "blue");

    client.cleanup().await.unwrap();
}

#[tokio::test]
async fn roots_are_served_and_mutations_notify_every_server() {
    let dir = tempfile::tempdir().unwrap();
    let roots_file = dir.path().join("roots.json");
    let notify_file = dir.path().join("notify.json");
    let script = format!(
        r#"
read line
{INIT_RESPONSE}
read line
echo '{{"jsonrpc":"2.0","id":"r1","method":"roots/list"}}'
read resp
printf '%s\n' "$resp" > {roots}
read notif
printf '%s\n' "$notif" > {notify}
read line
"#,
        roots = roots_file.display(),
        notify = notify_file.display()
    );

    let client = McpClient::new();
    client
        .set_roots(vec![Root::named("file:///workspace", "workspace")])
        .await
        .unwrap();
    client.add_server("rooted", stdio_config(&script)).await.unwrap();

    let captured = wait_for_file(&roots_file).await;
    let response: Value = serde_json::from_str(captured.trim()).unwrap();
    assert_eq!(response["id"], "r1");
    assert_eq!(response["result"]["roots"][0]["uri"], "file:///workspace");
    assert_eq!(response["result"]["roots"][0]["name"], "workspace");

    client
        .set_roots(vec![Root::new("file:///other")])
        .await
        .unwrap();
    let captured = wait_for_file(&notify_file).await;
    let notification: Value = serde_json::from_str(captured.trim()).unwrap();
    assert_eq!(notification["method"], "notifications/roots/list_changed");
    assert!(notification.get("id").is_none());

    client.cleanup().await.unwrap();
}

#[tokio::test]
async fn sampling_reply_is_coerced_with_defaults() {
    let dir = tempfile::tempdir().unwrap();
    let response_file = dir.path().join("sampling.json");
    let script = format!(
        r#"
read line
{INIT_RESPONSE}
read line
echo '{{"jsonrpc":"2.0","id":"s1","method":"sampling/createMessage","params":{{"messages":[{{"role":"user","content":{{"type":"text","text":"What is 2+2?"}}}}],"maxTokens":64,"modelPreferences":{{"costPriority":3.5,"hints":[{{"name":"claude","weight":2}}]}}}}}}'
read resp
printf '%s\n' "$resp" > {file}
read line
"#,
        file = response_file.display()
    );

    let seen_preferences: Arc<Mutex<Option<ModelPreferences>>> = Arc::new(Mutex::new(None));
    let record = Arc::clone(&seen_preferences);

    let client = McpClient::new();
    client.on_sampling_request(Arc::new(move |_request, preferences| {
        record.lock().unwrap().replace(preferences);
        Box::pin(async { Ok::<Value, McpError>(json!("The answer is 4")) })
    }));
    client.add_server("sampler", stdio_config(&script)).await.unwrap();

    let captured = wait_for_file(&response_file).await;
    let response: Value = serde_json::from_str(captured.trim()).unwrap();
    assert_eq!(response["id"], "s1");
    assert_eq!(response["result"]["role"], "assistant");
    assert_eq!(response["result"]["model"], "unknown");
    assert_eq!(response["result"]["stopReason"], "endTurn");
    assert_eq!(response["result"]["content"]["text"], "The answer is 4");

    let preferences = seen_preferences.lock().unwrap().clone().unwrap();
    assert_eq!(preferences.cost_priority, Some(1.0));
    assert_eq!(preferences.hints.unwrap()[0].name, "claude");

    client.cleanup().await.unwrap();
}
