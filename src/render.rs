//! Human-readable rendering of IR nodes
//!
//! Call-expression formatting shared by every variant's `Display` impl.

use serde_json::{Map, Value};

/// Render `task(arg1, arg2, kw=value)` from a merged invocation.
pub fn reprcall(task: &str, args: &[Value], kwargs: &Map<String, Value>) -> String {
    let mut parts: Vec<String> = args.iter().map(Value::to_string).collect();
    parts.extend(kwargs.iter().map(|(k, v)| format!("{k}={v}")));
    format!("{}({})", task, parts.join(", "))
}

/// Render an element sequence as a bracketed list, bounded to `limit`
/// characters for fan-out variants with large sources.
pub fn render_items(items: &[Value], limit: usize) -> String {
    let rendered = format!(
        "[{}]",
        items
            .iter()
            .map(Value::to_string)
            .collect::<Vec<_>>()
            .join(", ")
    );
    truncate(&rendered, limit)
}

/// Truncate to `limit` characters, appending `...` when anything was cut.
pub fn truncate(s: &str, limit: usize) -> String {
    if s.chars().count() <= limit {
        return s.to_string();
    }
    let mut out: String = s.chars().take(limit.saturating_sub(3)).collect();
    out.push_str("...");
    out
}
