//! Execution trees: nodes keyed by id with optional parents, forming a
//! forest scoped by session or execution id.

use crate::coerce_epoch_ms;
use serde_json::Value;
use std::collections::HashMap;

#[derive(Debug, Clone, PartialEq)]
pub struct ExecNode {
    pub id: String,
    pub parent_id: Option<String>,
    pub start_ms: Option<i64>,
    pub end_ms: Option<i64>,
    pub raw: Value,
}

/// Normalize the exec-tree payload. Accepts a bare array or one nested under
/// `trees` / `nodes` / `data`; items without a usable id are skipped.
pub fn normalize_exec_nodes(input: &Value) -> Vec<ExecNode> {
    let arr = if let Some(arr) = input.as_array() {
        arr
    } else {
        match ["trees", "nodes", "data"]
            .iter()
            .find_map(|k| input.get(*k).and_then(Value::as_array))
        {
            Some(arr) => arr,
            None => return Vec::new(),
        }
    };

    let mut out = Vec::with_capacity(arr.len());
    for item in arr {
        let Some(id) = ["id", "execId", "exec_id"]
            .iter()
            .find_map(|k| item.get(*k))
            .and_then(id_string)
        else {
            continue;
        };
        // Null parents fall through to the next spelling, then to "root".
        let parent_id = ["parentId", "parent_id", "parent"]
            .iter()
            .find_map(|k| item.get(*k).filter(|v| !v.is_null()))
            .and_then(id_string);
        out.push(ExecNode {
            id,
            parent_id,
            start_ms: item.get("start").and_then(coerce_epoch_ms),
            end_ms: item.get("end").and_then(coerce_epoch_ms),
            raw: item.clone(),
        });
    }
    out
}

fn id_string(v: &Value) -> Option<String> {
    match v {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// Parent/child index over a normalized node list. Nodes whose parent is
/// missing from the list count as roots.
#[derive(Debug, Default)]
pub struct ExecForest {
    pub roots: Vec<usize>,
    children: HashMap<String, Vec<usize>>,
}

impl ExecForest {
    pub fn build(nodes: &[ExecNode]) -> Self {
        let ids: HashMap<&str, ()> = nodes.iter().map(|n| (n.id.as_str(), ())).collect();
        let mut forest = Self::default();
        for (idx, node) in nodes.iter().enumerate() {
            match node.parent_id.as_deref().filter(|p| ids.contains_key(p)) {
                Some(parent) => forest
                    .children
                    .entry(parent.to_string())
                    .or_default()
                    .push(idx),
                None => forest.roots.push(idx),
            }
        }
        forest
    }

    pub fn children_of(&self, id: &str) -> &[usize] {
        self.children.get(id).map(Vec::as_slice).unwrap_or(&[])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn accepts_nested_and_bare_shapes() {
        let bare = json!([{"id": "a"}]);
        let nested = json!({"trees": [{"execId": 7, "parent_id": "a"}]});
        assert_eq!(normalize_exec_nodes(&bare).len(), 1);
        let nodes = normalize_exec_nodes(&nested);
        assert_eq!(nodes[0].id, "7");
        assert_eq!(nodes[0].parent_id.as_deref(), Some("a"));
    }

    #[test]
    fn skips_items_without_an_id() {
        let input = json!({"nodes": [{"parentId": "x"}, {"id": "ok"}]});
        let nodes = normalize_exec_nodes(&input);
        assert_eq!(nodes.len(), 1);
        assert_eq!(nodes[0].id, "ok");
    }

    #[test]
    fn unrecognized_shape_yields_empty() {
        assert!(normalize_exec_nodes(&json!({"other": 1})).is_empty());
        assert!(normalize_exec_nodes(&json!(null)).is_empty());
    }

    #[test]
    fn forest_treats_dangling_parents_as_roots() {
        let nodes = normalize_exec_nodes(&json!([
            {"id": "r"},
            {"id": "c1", "parentId": "r"},
            {"id": "c2", "parentId": "r"},
            {"id": "orphan", "parentId": "gone"}
        ]));
        let forest = ExecForest::build(&nodes);
        assert_eq!(forest.roots.len(), 2);
        assert_eq!(forest.children_of("r").len(), 2);
        assert!(forest.children_of("c1").is_empty());
    }
}
