mod common;

use serde_json::json;

use common::{settle, Harness, WIDGET_HTML};
use widget_bridge::{UiEvent, WidgetDocument, WidgetStateStore};

#[tokio::test]
async fn widget_state_is_persisted_and_visible_immediately() {
    let harness = Harness::new(|callbacks| callbacks);
    harness
        .connect(WidgetDocument::new(WIDGET_HTML).with_state_key("todo"))
        .await;

    harness
        .widget
        .set_widget_state(json!({"done": [1]}))
        .await
        .expect("first write");
    assert_eq!(harness.widget.widget_state(), Some(json!({"done": [1]})));

    harness
        .widget
        .set_widget_state(json!({"done": [1, 2]}))
        .await
        .expect("second write");
    assert_eq!(harness.state.get("todo"), Some(json!({"done": [1, 2]})));
    assert_eq!(
        harness.ui.events().last(),
        Some(&UiEvent::WidgetStateChanged {
            state: json!({"done": [1, 2]})
        })
    );
}

#[tokio::test]
async fn legacy_state_write_is_acknowledged_with_success() {
    let harness = Harness::new(|callbacks| callbacks);
    harness
        .connect(WidgetDocument::new(WIDGET_HTML).with_state_key("todo"))
        .await;

    harness.send_from_widget(json!({
        "jsonrpc": "2.0", "id": 40, "method": "ui/setWidgetState", "params": {"state": {"n": 1}}
    }));
    settle().await;

    assert_eq!(harness.responses_to(json!(40))[0]["result"], json!({"success": true}));
    assert_eq!(harness.state.get("todo"), Some(json!({"n": 1})));
}

#[tokio::test]
async fn state_is_restored_on_remount() {
    let store = WidgetStateStore::new();
    store.set("todo", json!({"draft": "milk"}));
    let harness = Harness::with_state(store, |callbacks| callbacks);

    harness
        .mount(WidgetDocument::new(WIDGET_HTML).with_state_key("todo"))
        .await;

    let resource = harness
        .host_outbox
        .messages()
        .into_iter()
        .find(|posted| posted.method() == Some("ui/notifications/sandbox-resource-ready"))
        .expect("resource pushed");
    let html = resource.message["params"]["html"].as_str().expect("html").to_string();
    assert!(html.contains("\"widgetState\":{\"draft\":\"milk\"}"));

    let result = harness
        .widget
        .initialize("test-widget", "0.1.0")
        .await
        .expect("initialize");
    assert_eq!(result.host_context.widget_state, Some(json!({"draft": "milk"})));
    assert_eq!(harness.widget.widget_state(), Some(json!({"draft": "milk"})));
}

#[tokio::test]
async fn keyless_widget_state_is_visible_for_the_rest_of_the_mount() {
    let harness = Harness::new(|callbacks| callbacks);
    harness.connect(WidgetDocument::new(WIDGET_HTML)).await;

    harness
        .widget
        .set_widget_state(json!({"n": 1}))
        .await
        .expect("state write");
    assert_eq!(harness.host.host_context().widget_state, Some(json!({"n": 1})));

    let result = harness
        .widget
        .initialize("test-widget", "0.1.0")
        .await
        .expect("re-initialize");
    assert_eq!(result.host_context.widget_state, Some(json!({"n": 1})));

    harness
        .host
        .mount(WidgetDocument::new("<html><head></head><body>Y</body></html>"))
        .expect("remount");
    settle().await;
    assert_eq!(harness.host.host_context().widget_state, None);
}
