//! Response-envelope normalization.
//!
//! Backends wrap the same logical list in several shapes. Each decoder here
//! matches one shape structurally and falls through to the next; the chain
//! ends in an explicit "no recognized shape" `None` / empty default.

use serde_json::{Map, Value};

const LIST_KEYS: [&str; 5] = ["tasks", "items", "data", "result", "records"];

/// Flatten a list envelope: a bare array, or an array under one of the
/// well-known keys, tried in priority order. `None` when nothing matches.
pub fn normalize_list(json: &Value) -> Option<Vec<Value>> {
    if let Some(arr) = json.as_array() {
        return Some(arr.clone());
    }
    LIST_KEYS
        .iter()
        .find_map(|k| json.get(*k).and_then(Value::as_array))
        .cloned()
}

pub fn list_or_empty(json: &Value) -> Vec<Value> {
    normalize_list(json).unwrap_or_default()
}

/// Flatten session documents. The list may sit under `documents`, `items`,
/// `docs`, or be bare; each document may nest its fields under Firestore
/// adapter wrappers (`data`, `data.value`, `value`), merged in that order
/// with later fields winning.
pub fn flatten_session_docs(json: &Value) -> Vec<Value> {
    let arr = if let Some(arr) = json.as_array() {
        arr.clone()
    } else {
        match ["documents", "items", "docs"]
            .iter()
            .find_map(|k| json.get(*k).and_then(Value::as_array))
        {
            Some(arr) => arr.clone(),
            None => return Vec::new(),
        }
    };

    arr.iter()
        .map(|doc| {
            let mut flat = Map::new();
            if let Some(id) = doc.get("id") {
                flat.insert("id".to_string(), id.clone());
            }
            for source in [
                doc.get("data"),
                doc.get("data").and_then(|d| d.get("value")),
                doc.get("value"),
            ]
            .into_iter()
            .flatten()
            {
                if let Some(obj) = source.as_object() {
                    for (k, v) in obj {
                        flat.insert(k.clone(), v.clone());
                    }
                }
            }
            Value::Object(flat)
        })
        .collect()
}

/// Workflow listings come back as `{workflows}`, `{items}`, or a bare array
/// of strings or objects; objects prefer the short id over display names.
pub fn workflow_names(json: &Value) -> Vec<String> {
    let arr = json
        .as_array()
        .or_else(|| json.get("workflows").and_then(Value::as_array))
        .or_else(|| json.get("items").and_then(Value::as_array));
    let Some(arr) = arr else {
        return Vec::new();
    };
    let mut names = Vec::new();
    for item in arr {
        match item {
            Value::String(s) => names.push(s.clone()),
            Value::Object(_) => {
                if let Some(name) = ["id", "name", "fullName", "workflow", "slug"]
                    .iter()
                    .find_map(|k| item.get(*k).and_then(Value::as_str))
                {
                    names.push(name.to_string());
                }
            }
            _ => {}
        }
    }
    names
}

/// Extract the transcript array from a topic-context response. The list may
/// be top-level or nested under the last execution's output/result.
pub fn extract_messages(json: &Value) -> Vec<Value> {
    let paths: [&[&str]; 4] = [
        &["messages"],
        &["lastExec", "output", "messages"],
        &["lastExec", "result", "messages"],
        &["result", "messages"],
    ];
    for path in paths {
        let mut cur = json;
        let mut ok = true;
        for key in path {
            match cur.get(*key) {
                Some(next) => cur = next,
                None => {
                    ok = false;
                    break;
                }
            }
        }
        if ok {
            if let Some(arr) = cur.as_array() {
                return arr.clone();
            }
        }
    }
    Vec::new()
}

/// Decode the CLI-tool execution envelope:
/// `{ result: { encoded: "<json: {command, error, output, ...}>" } }`.
/// Returns `(output, error)`, empty strings when the shape does not match.
pub fn decode_encoded_result(json: &Value) -> (String, String) {
    let Some(encoded) = json
        .get("result")
        .and_then(|r| r.get("encoded"))
        .and_then(Value::as_str)
    else {
        return (String::new(), String::new());
    };
    let Ok(parsed) = serde_json::from_str::<Value>(encoded) else {
        return (String::new(), String::new());
    };
    let field = |key: &str| {
        parsed
            .get(key)
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string()
    };
    (field("output"), field("error"))
}

/// True when a body smells like an HTML document instead of JSON.
pub fn looks_like_html(text: &str) -> bool {
    let lowered = text.trim_start().to_ascii_lowercase();
    lowered.starts_with("<!doctype html") || lowered.contains("<html")
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn list_decoders_run_in_priority_order() {
        assert_eq!(normalize_list(&json!([1, 2])).unwrap().len(), 2);
        // `tasks` outranks `items` when both are present.
        let both = json!({"tasks": [1], "items": [1, 2]});
        assert_eq!(normalize_list(&both).unwrap().len(), 1);
        assert_eq!(normalize_list(&json!({"records": [1, 2, 3]})).unwrap().len(), 3);
    }

    #[test]
    fn unrecognized_list_shape_is_none() {
        assert!(normalize_list(&json!({"rows": [1]})).is_none());
        assert!(normalize_list(&json!("plain")).is_none());
        assert!(list_or_empty(&json!({"rows": [1]})).is_empty());
    }

    #[test]
    fn session_docs_merge_adapter_wrappers() {
        let json = json!({"documents": [{
            "id": "s1",
            "data": {"title": "outer", "value": {"title": "inner", "agentId": "a1"}},
        }]});
        let docs = flatten_session_docs(&json);
        assert_eq!(docs.len(), 1);
        assert_eq!(docs[0]["id"], "s1");
        // data.value wins over data.
        assert_eq!(docs[0]["title"], "inner");
        assert_eq!(docs[0]["agentId"], "a1");
    }

    #[test]
    fn workflow_names_accept_strings_and_objects() {
        let json = json!({"workflows": ["a", {"name": "b"}, {"slug": "c"}, 42]});
        assert_eq!(workflow_names(&json), ["a", "b", "c"]);
        assert!(workflow_names(&json!({"other": 1})).is_empty());
    }

    #[test]
    fn messages_found_at_top_level_or_nested() {
        assert_eq!(extract_messages(&json!({"messages": [1]})).len(), 1);
        let nested = json!({"lastExec": {"output": {"messages": [1, 2]}}});
        assert_eq!(extract_messages(&nested).len(), 2);
        assert!(extract_messages(&json!({})).is_empty());
    }

    #[test]
    fn encoded_result_roundtrip() {
        let json = json!({"result": {"encoded": r#"{"output":"ok\n","error":""}"#}});
        assert_eq!(decode_encoded_result(&json), ("ok\n".to_string(), String::new()));
        assert_eq!(
            decode_encoded_result(&json!({"result": {}})),
            (String::new(), String::new())
        );
        assert_eq!(
            decode_encoded_result(&json!({"result": {"encoded": "not json"}})),
            (String::new(), String::new())
        );
    }

    #[test]
    fn html_detection() {
        assert!(looks_like_html("<!DOCTYPE html><html>"));
        assert!(looks_like_html("  <HTML><body>"));
        assert!(!looks_like_html(r#"{"ok": true}"#));
    }
}
