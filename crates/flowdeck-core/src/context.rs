//! Transcript messages returned by the topic-context endpoint.

use serde_json::Value;

/// A single rendered transcript item. Individually malformed items are
/// skipped during normalization so one bad record cannot blank the view.
#[derive(Debug, Clone, PartialEq)]
pub struct ContextMessage {
    pub role: String,
    pub content: Option<String>,
    pub create_time_ms: Option<i64>,
    pub cost: Option<f64>,
    pub raw: Value,
}

impl ContextMessage {
    pub fn from_value(item: &Value) -> Option<Self> {
        if !item.is_object() {
            return None;
        }
        let role = item
            .get("role")
            .and_then(Value::as_str)
            .unwrap_or("assistant")
            .to_string();
        let content = match item.get("content") {
            None | Some(Value::Null) => None,
            Some(Value::String(s)) => Some(s.clone()),
            // Structured content renders as its JSON text.
            Some(other) => Some(other.to_string()),
        };
        let create_time_ms = item.get("create_time").and_then(crate::coerce_epoch_ms);
        let cost = match item.get("cost") {
            Some(Value::Number(n)) => n.as_f64(),
            Some(Value::String(s)) => s.parse::<f64>().ok().filter(|n| n.is_finite()),
            _ => None,
        };
        Some(Self {
            role,
            content,
            create_time_ms,
            cost,
            raw: item.clone(),
        })
    }
}

/// Normalize a raw message array, dropping items that cannot be mapped.
pub fn normalize_messages(items: &[Value]) -> Vec<ContextMessage> {
    items
        .iter()
        .filter_map(ContextMessage::from_value)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn role_defaults_to_assistant() {
        let msg = ContextMessage::from_value(&json!({"content": "hi"})).expect("mapped");
        assert_eq!(msg.role, "assistant");
        assert_eq!(msg.content.as_deref(), Some("hi"));
    }

    #[test]
    fn structured_content_becomes_json_text() {
        let msg = ContextMessage::from_value(&json!({"role": "tool", "content": {"a": 1}}))
            .expect("mapped");
        assert_eq!(msg.content.as_deref(), Some(r#"{"a":1}"#));
    }

    #[test]
    fn string_cost_is_parsed() {
        let msg =
            ContextMessage::from_value(&json!({"cost": "0.25", "create_time": 1000})).expect("mapped");
        assert_eq!(msg.cost, Some(0.25));
        assert_eq!(msg.create_time_ms, Some(1000));
    }

    #[test]
    fn non_objects_are_dropped() {
        let items = vec![json!("junk"), json!({"role": "user", "content": "ok"})];
        assert_eq!(normalize_messages(&items).len(), 1);
    }
}
