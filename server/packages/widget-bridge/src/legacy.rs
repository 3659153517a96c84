//! Legacy bridge injection.
//!
//! Widgets written against the older global-object API expect `window.openai`
//! to exist before their own scripts run. The injector places a shim that
//! provides it, backed by the JSON-RPC protocol, as the first child of
//! `<head>`.

use std::time::Duration;

use serde::Serialize;
use serde_json::Value;
use widget_bridge_protocol::{DisplayMode, Theme};

const SHIM_TEMPLATE: &str = include_str!("legacy_bridge.js");
const SNAPSHOT_PLACEHOLDER: &str = "__WIDGET_BRIDGE_SNAPSHOT__";
const TIMEOUT_PLACEHOLDER: &str = "__WIDGET_BRIDGE_TIMEOUT_MS__";

/// Attribute marking the injected script.
pub const BRIDGE_MARKER: &str = "data-widget-bridge=\"legacy\"";

/// Values the shim exposes synchronously before the handshake completes.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LegacySnapshot {
    pub theme: Theme,
    pub display_mode: DisplayMode,
    pub max_height: u32,
    pub tool_output: Option<Value>,
    pub tool_input: Option<Value>,
    pub widget_state: Option<Value>,
}

impl LegacySnapshot {
    pub fn new(theme: Theme, display_mode: DisplayMode, max_height: u32) -> Self {
        Self {
            theme,
            display_mode,
            max_height,
            tool_output: None,
            tool_input: None,
            widget_state: None,
        }
    }

    pub fn with_tool_output(mut self, output: Option<Value>) -> Self {
        self.tool_output = output;
        self
    }

    pub fn with_tool_input(mut self, input: Option<Value>) -> Self {
        self.tool_input = input;
        self
    }

    pub fn with_widget_state(mut self, state: Option<Value>) -> Self {
        self.widget_state = state;
        self
    }
}

/// Returns `html` with the legacy shim inserted right after the opening
/// `<head>` tag. A document without `<head>` gets one. Already injected
/// documents are returned unchanged.
pub fn inject_legacy_bridge(html: &str, snapshot: &LegacySnapshot, request_timeout: Duration) -> String {
    if html.contains(BRIDGE_MARKER) {
        tracing::debug!("legacy bridge already present; skipping injection");
        return html.to_string();
    }

    let script = render_script(snapshot, request_timeout);

    if let Some(at) = find_tag_end(html, "head") {
        return splice(html, at, &script);
    }

    let head = format!("<head>{script}</head>");
    if let Some(at) = find_tag_end(html, "html") {
        tracing::debug!("widget html has no <head>; inserting one after <html>");
        return splice(html, at, &head);
    }

    tracing::debug!("widget html has neither <html> nor <head>; prepending a head element");
    let at = doctype_end(html).unwrap_or(0);
    splice(html, at, &head)
}

fn render_script(snapshot: &LegacySnapshot, request_timeout: Duration) -> String {
    let snapshot_json = script_safe_json(snapshot);
    let body = SHIM_TEMPLATE
        .replace(SNAPSHOT_PLACEHOLDER, &snapshot_json)
        .replace(TIMEOUT_PLACEHOLDER, &request_timeout.as_millis().to_string());
    format!("<script {BRIDGE_MARKER}>\n{body}</script>")
}

/// JSON that can sit inside an inline `<script>` without terminating it.
fn script_safe_json(value: &impl Serialize) -> String {
    let raw = serde_json::to_string(value).unwrap_or_else(|err| {
        tracing::warn!(error = %err, "failed to encode legacy snapshot");
        "{}".to_string()
    });
    raw.replace('<', "\\u003c")
        .replace('\u{2028}', "\\u2028")
        .replace('\u{2029}', "\\u2029")
}

fn splice(html: &str, at: usize, insert: &str) -> String {
    let mut out = String::with_capacity(html.len() + insert.len());
    out.push_str(&html[..at]);
    out.push_str(insert);
    out.push_str(&html[at..]);
    out
}

/// Byte offset just past the `>` of the first opening `<name ...>` tag.
/// Matching is ASCII case-insensitive and requires the name to end there, so
/// `head` does not match `<header>`.
fn find_tag_end(html: &str, name: &str) -> Option<usize> {
    let bytes = html.as_bytes();
    let name = name.as_bytes();
    let mut from = 0;
    while let Some(offset) = bytes[from..].iter().position(|b| *b == b'<') {
        let start = from + offset + 1;
        let end = start + name.len();
        if end <= bytes.len() && bytes[start..end].eq_ignore_ascii_case(name) {
            let boundary = bytes.get(end).copied();
            if matches!(boundary, Some(b'>' | b'/') | Some(b' ' | b'\t' | b'\n' | b'\r')) {
                let close = bytes[end..].iter().position(|b| *b == b'>')?;
                return Some(end + close + 1);
            }
        }
        from = start;
    }
    None
}

fn doctype_end(html: &str) -> Option<usize> {
    let trimmed = html.trim_start();
    let lead = html.len() - trimmed.len();
    let prefix = trimmed.get(..9)?;
    if !prefix.eq_ignore_ascii_case("<!doctype") {
        return None;
    }
    let close = trimmed.find('>')?;
    Some(lead + close + 1)
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn snapshot() -> LegacySnapshot {
        LegacySnapshot::new(Theme::Dark, DisplayMode::Inline, 600)
            .with_tool_output(Some(json!({"items": ["a"]})))
    }

    #[test]
    fn script_is_first_child_of_head() {
        let html = "<html><HEAD lang=\"en\"><title>t</title></HEAD><body>X</body></html>";
        let out = inject_legacy_bridge(html, &snapshot(), Duration::from_secs(30));
        let head_end = out.find("<HEAD lang=\"en\">").expect("head") + "<HEAD lang=\"en\">".len();
        assert!(out[head_end..].starts_with("<script data-widget-bridge=\"legacy\">"));
        assert!(out.contains("\"theme\":\"dark\""));
        assert!(out.contains("\"maxHeight\":600"));
        assert!(out.contains("var timeoutMs = 30000;"));
        assert!(out.ends_with("<title>t</title></HEAD><body>X</body></html>"));
    }

    #[test]
    fn header_element_is_not_mistaken_for_head() {
        let html = "<html><body><header>h</header></body></html>";
        let out = inject_legacy_bridge(html, &snapshot(), Duration::from_secs(30));
        assert!(out.starts_with("<html><head><script"));
        assert!(out.contains("</script></head><body><header>h</header>"));
    }

    #[test]
    fn fragment_gets_head_after_doctype() {
        let html = "<!DOCTYPE html>\n<div>X</div>";
        let out = inject_legacy_bridge(html, &snapshot(), Duration::from_secs(30));
        assert!(out.starts_with("<!DOCTYPE html><head><script"));
        assert!(out.ends_with("</head>\n<div>X</div>"));

        let bare = inject_legacy_bridge("<div>X</div>", &snapshot(), Duration::from_secs(30));
        assert!(bare.starts_with("<head><script"));
    }

    #[test]
    fn injection_is_applied_once() {
        let html = "<html><head></head><body></body></html>";
        let once = inject_legacy_bridge(html, &snapshot(), Duration::from_secs(30));
        let twice = inject_legacy_bridge(&once, &snapshot(), Duration::from_secs(30));
        assert_eq!(once, twice);
        assert_eq!(once.matches(BRIDGE_MARKER).count(), 1);
    }

    #[test]
    fn snapshot_cannot_close_the_script() {
        let snapshot = LegacySnapshot::new(Theme::Light, DisplayMode::Inline, 600)
            .with_tool_output(Some(json!({"html": "</script><script>alert(1)</script>"})));
        let out = inject_legacy_bridge("<head></head>", &snapshot, Duration::from_secs(30));
        assert_eq!(out.matches("</script>").count(), 1);
        assert!(out.contains("\\u003c/script>"));
    }

    #[test]
    fn shim_request_ids_are_namespaced() {
        let out = inject_legacy_bridge("<head></head>", &snapshot(), Duration::from_secs(30));
        assert!(out.contains("var ID_PREFIX = \"openai-\";"));
        assert!(out.contains("var id = ID_PREFIX + nextId++;"));
        assert!(out.contains("message.id.indexOf(ID_PREFIX) !== 0"));
    }
}
