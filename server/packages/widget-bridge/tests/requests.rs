mod common;

use std::sync::Arc;

use serde_json::{json, Value};
use tokio::sync::Notify;

use common::{from_relay, recording_host, settle, Harness, WIDGET_HTML};
use widget_bridge::protocol::{ContentBlock, DisplayMode, LogLevel};
use widget_bridge::testing::OpenedWindow;
use widget_bridge::{BridgeCallbacks, UiEvent, WidgetDocument};

async fn connected(harness: Harness) -> Harness {
    harness.connect(WidgetDocument::new(WIDGET_HTML)).await;
    harness
}

#[tokio::test]
async fn tool_call_result_is_wrapped_as_text_content() {
    let harness = connected(Harness::new(|callbacks| {
        callbacks.with_tool_executor(|name: String, arguments: Value| async move {
            assert_eq!(name, "echo");
            Ok::<Value, String>(arguments)
        })
    }))
    .await;

    harness.send_from_widget(json!({
        "jsonrpc": "2.0",
        "id": 7,
        "method": "tools/call",
        "params": {"name": "echo", "arguments": {"a": 1}}
    }));
    settle().await;

    assert_eq!(
        harness.responses_to(json!(7)),
        vec![json!({
            "jsonrpc": "2.0",
            "id": 7,
            "result": {"content": [{"type": "text", "text": "{\"a\":1}"}]}
        })]
    );
}

#[tokio::test]
async fn tool_call_strings_pass_through() {
    let harness = connected(Harness::new(|callbacks| {
        callbacks.with_tool_executor(|_name: String, _arguments: Value| async move {
            Ok::<Value, String>(json!("plain text"))
        })
    }))
    .await;

    let result = harness
        .widget
        .call_tool("say", json!({}))
        .await
        .expect("tool result");
    assert_eq!(
        result.content,
        vec![ContentBlock::Text {
            text: "plain text".to_string()
        }]
    );
}

#[tokio::test]
async fn tool_call_failure_becomes_server_error() {
    let harness = connected(Harness::new(|callbacks| {
        callbacks.with_tool_executor(|_name: String, _arguments: Value| async move {
            Err::<Value, String>("backend exploded".to_string())
        })
    }))
    .await;

    harness.send_from_widget(json!({
        "jsonrpc": "2.0",
        "id": 11,
        "method": "tools/call",
        "params": {"name": "boom"}
    }));
    settle().await;

    let responses = harness.responses_to(json!(11));
    assert_eq!(responses.len(), 1);
    assert_eq!(responses[0]["error"]["code"], -32000);
    assert_eq!(responses[0]["error"]["message"], "backend exploded");
}

#[tokio::test]
async fn tool_call_without_executor_is_not_supported() {
    let harness = connected(Harness::new(|callbacks| callbacks)).await;

    let err = harness
        .widget
        .call_tool("anything", json!({}))
        .await
        .expect_err("no executor");
    let rpc = err.to_rpc_error();
    assert_eq!(rpc.code, -32601);
    assert_eq!(rpc.message, "Tool calls not supported");
}

#[tokio::test]
async fn concurrent_tool_calls_each_get_their_own_result() {
    let harness = connected(Harness::new(|callbacks| {
        callbacks.with_tool_executor(|name: String, _arguments: Value| async move {
            if name == "slow" {
                for _ in 0..20 {
                    tokio::task::yield_now().await;
                }
            }
            Ok::<Value, String>(json!({ "tool": name }))
        })
    }))
    .await;

    let (slow, fast) = tokio::join!(
        harness.widget.call_tool("slow", json!({})),
        harness.widget.call_tool("fast", json!({})),
    );
    assert_eq!(slow.expect("slow").content[0], ContentBlock::Text { text: "{\"tool\":\"slow\"}".to_string() });
    assert_eq!(fast.expect("fast").content[0], ContentBlock::Text { text: "{\"tool\":\"fast\"}".to_string() });
}

#[tokio::test]
async fn unknown_method_request_gets_method_not_found() {
    let harness = connected(Harness::new(|callbacks| callbacks)).await;
    let before = harness.widget_inbox.messages().len();

    harness.send_from_widget(json!({"jsonrpc": "2.0", "id": 99, "method": "ui/teleport", "params": {}}));
    harness.send_from_widget(json!({"jsonrpc": "2.0", "method": "ui/teleport", "params": {}}));
    settle().await;

    let responses = harness.responses_to(json!(99));
    assert_eq!(responses.len(), 1);
    assert_eq!(responses[0]["error"]["code"], -32601);
    assert_eq!(responses[0]["error"]["message"], "Method not found");
    assert_eq!(harness.widget_inbox.messages().len(), before + 1);
}

#[tokio::test]
async fn invalid_params_are_rejected() {
    let harness = connected(Harness::new(|callbacks| callbacks)).await;

    harness.send_from_widget(json!({"jsonrpc": "2.0", "id": 5, "method": "ui/open-link", "params": {"nope": 1}}));
    settle().await;

    let responses = harness.responses_to(json!(5));
    assert_eq!(responses[0]["error"]["code"], -32602);
    assert!(harness.ui.opened().is_empty());
}

#[tokio::test]
async fn open_link_acknowledges_per_spelling() {
    let harness = connected(Harness::new(|callbacks| callbacks)).await;

    harness.send_from_widget(json!({
        "jsonrpc": "2.0", "id": 8, "method": "ui/open-link", "params": {"url": "https://example.com"}
    }));
    harness.send_from_widget(json!({
        "jsonrpc": "2.0", "id": 9, "method": "ui/openLink", "params": {"url": "https://example.org"}
    }));
    settle().await;

    assert_eq!(harness.responses_to(json!(8))[0]["result"], json!({}));
    assert_eq!(harness.responses_to(json!(9))[0]["result"], json!({"success": true}));
    assert_eq!(
        harness.ui.opened(),
        vec![
            OpenedWindow {
                url: "https://example.com".to_string(),
                target: "_blank".to_string(),
                features: "noopener,noreferrer".to_string(),
            },
            OpenedWindow {
                url: "https://example.org".to_string(),
                target: "_blank".to_string(),
                features: "noopener,noreferrer".to_string(),
            },
        ]
    );
}

#[tokio::test]
async fn display_mode_request_echoes_mode_and_notifies_host() {
    let harness = connected(Harness::new(|callbacks| callbacks)).await;

    let granted = harness
        .widget
        .request_display_mode(DisplayMode::Fullscreen)
        .await
        .expect("display mode");
    assert_eq!(granted, DisplayMode::Fullscreen);

    harness.send_from_widget(json!({
        "jsonrpc": "2.0", "id": 21, "method": "ui/requestDisplayMode", "params": {"mode": "pip"}
    }));
    settle().await;
    assert_eq!(harness.responses_to(json!(21))[0]["result"], json!({"mode": "pip"}));

    assert_eq!(
        harness.ui.events(),
        vec![
            UiEvent::RequestDisplayMode {
                mode: "fullscreen".to_string()
            },
            UiEvent::RequestDisplayMode {
                mode: "pip".to_string()
            },
        ]
    );
}

#[tokio::test]
async fn model_context_and_follow_up_messages_reach_the_host() {
    let harness = connected(Harness::new(|callbacks| callbacks)).await;

    harness.send_from_widget(json!({
        "jsonrpc": "2.0", "id": 31, "method": "ui/updateContext", "params": {"selected": 3}
    }));
    harness.send_from_widget(json!({
        "jsonrpc": "2.0", "id": 32, "method": "ui/update-model-context", "params": {"selected": 4}
    }));
    settle().await;
    harness
        .widget
        .send_follow_up_message("tell me more")
        .await
        .expect("follow-up");

    assert_eq!(harness.responses_to(json!(31))[0]["result"], json!({"success": true}));
    assert_eq!(harness.responses_to(json!(32))[0]["result"], json!({}));
    assert_eq!(
        harness.ui.events(),
        vec![
            UiEvent::UpdateModelContext {
                context: json!({"selected": 3})
            },
            UiEvent::UpdateModelContext {
                context: json!({"selected": 4})
            },
            UiEvent::FollowUpMessage {
                text: "tell me more".to_string()
            },
        ]
    );
}

#[tokio::test]
async fn log_and_size_notifications_get_no_response() {
    let harness = connected(Harness::new(|callbacks| callbacks)).await;
    let before = harness.widget_inbox.messages().len();

    harness.widget.log(LogLevel::Warning, json!("disk low"));
    harness.send_from_widget(json!({
        "jsonrpc": "2.0", "method": "ui/log", "params": {"level": "error", "message": "legacy"}
    }));
    harness.widget.notify_size_changed(320.0, 240.0);
    settle().await;

    assert_eq!(harness.widget_inbox.messages().len(), before);
}

#[tokio::test]
async fn tool_result_is_not_delivered_to_a_remounted_widget() {
    let release = Arc::new(Notify::new());
    let callbacks = BridgeCallbacks::default().with_tool_executor({
        let release = release.clone();
        move |_name: String, _arguments: Value| {
            let release = release.clone();
            async move {
                release.notified().await;
                Ok::<Value, String>(json!({"stale": true}))
            }
        }
    });
    let (host, document, first) = recording_host(callbacks);

    host.handle_message(from_relay(
        first,
        json!({"jsonrpc": "2.0", "method": "ui/notifications/sandbox-proxy-ready", "params": {}}),
    ))
    .await;
    host.handle_message(from_relay(
        first,
        json!({"jsonrpc": "2.0", "id": 1, "method": "tools/call", "params": {"name": "slow"}}),
    ))
    .await;
    settle().await;

    let second = host
        .mount(WidgetDocument::new("<html><head></head><body>Y</body></html>"))
        .expect("remount");
    assert_ne!(second, first);

    release.notify_one();
    settle().await;

    let is_response = |message: &Value| message.get("method").is_none() && message["id"] == json!(1);
    for frame in [first, second] {
        let window = document.recorder(frame).expect("frame window");
        assert!(
            !window.messages().iter().any(|posted| is_response(&posted.message)),
            "frame {frame} received a response to a request it never saw"
        );
    }
}

#[tokio::test]
async fn string_request_ids_are_echoed_verbatim() {
    let harness = connected(Harness::new(|callbacks| {
        callbacks.with_tool_executor(|_name: String, _arguments: Value| async move {
            Ok::<Value, String>(json!({"ok": true}))
        })
    }))
    .await;

    harness.send_from_widget(json!({
        "jsonrpc": "2.0", "id": 900, "method": "ui/open-link", "params": {"url": "https://example.com"}
    }));
    harness.send_from_widget(json!({
        "jsonrpc": "2.0", "id": "openai-1", "method": "tools/call", "params": {"name": "list"}
    }));
    settle().await;

    let shim = harness.responses_to(json!("openai-1"));
    assert_eq!(shim.len(), 1);
    assert_eq!(shim[0]["result"]["content"][0]["text"], "{\"ok\":true}");
    let numeric = harness.responses_to(json!(900));
    assert_eq!(numeric.len(), 1);
    assert_eq!(numeric[0]["result"], json!({}));
}
