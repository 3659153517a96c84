mod common;

use serde_json::json;

use common::{settle, Harness, WIDGET_HTML};
use widget_bridge::protocol::{DisplayMode, Theme};
use widget_bridge::WidgetDocument;

const CONTEXT_CHANGED: &str = "ui/notifications/host-context-changed";

fn context_pushes(harness: &Harness) -> Vec<serde_json::Value> {
    harness
        .host_outbox
        .messages()
        .into_iter()
        .filter(|posted| posted.method() == Some(CONTEXT_CHANGED))
        .map(|posted| posted.message)
        .collect()
}

#[tokio::test]
async fn theme_change_after_initialization_is_pushed_once() {
    let harness = Harness::new(|callbacks| callbacks);
    harness.connect(WidgetDocument::new(WIDGET_HTML)).await;
    let mut updates = harness.widget.subscribe();
    updates.mark_unchanged();

    harness.host.set_theme(Theme::Dark);
    harness.host.set_theme(Theme::Dark);
    settle().await;

    let pushes = context_pushes(&harness);
    assert_eq!(pushes.len(), 1);
    assert_eq!(pushes[0]["params"]["theme"], "dark");
    assert_eq!(pushes[0]["params"]["displayMode"], "inline");
    assert_eq!(pushes[0]["params"]["containerDimensions"]["maxHeight"], 600);
    assert_eq!(
        pushes[0]["params"]["availableDisplayModes"],
        json!(["inline", "fullscreen", "pip"])
    );

    assert!(updates.has_changed().expect("session alive"));
    assert_eq!(updates.borrow_and_update().theme, Theme::Dark);
    assert_eq!(harness.widget.theme(), Theme::Dark);
}

#[tokio::test]
async fn changes_before_initialization_are_not_pushed() {
    let harness = Harness::new(|callbacks| callbacks);
    harness.mount(WidgetDocument::new(WIDGET_HTML)).await;

    harness.host.set_theme(Theme::Dark);
    harness.host.set_display_mode(DisplayMode::Pip);
    settle().await;

    assert!(context_pushes(&harness).is_empty());
    let snapshot = harness.host.snapshot().expect("snapshot");
    assert_eq!(snapshot.theme, Theme::Dark);
    assert_eq!(snapshot.display_mode, DisplayMode::Pip);
}

#[tokio::test]
async fn display_mode_change_updates_widget_globals() {
    let harness = Harness::new(|callbacks| callbacks);
    harness.connect(WidgetDocument::new(WIDGET_HTML)).await;

    harness.host.set_display_mode(DisplayMode::Fullscreen);
    settle().await;

    assert_eq!(context_pushes(&harness).len(), 1);
    assert_eq!(harness.widget.display_mode(), DisplayMode::Fullscreen);
}

#[tokio::test]
async fn tool_output_after_initialization_is_resent() {
    let harness = Harness::new(|callbacks| callbacks);
    harness.connect(WidgetDocument::new(WIDGET_HTML)).await;
    let before = harness.widget.globals();
    assert_eq!(before.tool_output, Some(serde_json::Value::Null));

    harness.host.set_tool_output(json!({"items": [1, 2, 3]}));
    settle().await;

    let results: Vec<_> = harness
        .host_methods()
        .into_iter()
        .filter(|method| method == "ui/notifications/tool-result")
        .collect();
    assert_eq!(results.len(), 2);
    assert_eq!(harness.widget.tool_output(), Some(json!({"items": [1, 2, 3]})));
    // Earlier snapshots stay as they were.
    assert_eq!(before.tool_output, Some(serde_json::Value::Null));
}
