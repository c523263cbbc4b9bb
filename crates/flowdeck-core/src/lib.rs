use chrono::DateTime;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::str::FromStr;

pub mod consumer;
pub mod context;
pub mod exec;
pub mod listing;
pub mod merge;
pub mod optimistic;
pub mod resolve;
pub mod scroll;

/// A conversation/workflow context, either server-confirmed or a local
/// ephemeral placeholder awaiting confirmation. Reconciled by `id`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub updated_at: Option<String>,
    #[serde(default)]
    pub agent_id: Option<String>,
    #[serde(default)]
    pub workflow_name: Option<String>,
}

impl Session {
    /// Build an ephemeral placeholder; title defaults to the id.
    pub fn ephemeral(id: impl Into<String>, now_iso: impl Into<String>) -> Self {
        let id = id.into();
        Self {
            title: id.clone(),
            id,
            updated_at: Some(now_iso.into()),
            agent_id: None,
            workflow_name: None,
        }
    }

    /// Map a flattened session document. Backends disagree on field names;
    /// anything without an id is unusable and yields `None`.
    pub fn from_doc(doc: &Value) -> Option<Self> {
        let id = string_ish(first_of(doc, &["id", "sessionId", "session_id"])?)?;
        let title = first_of(doc, &["title", "name", "summary"])
            .and_then(string_ish)
            .filter(|t| !t.trim().is_empty())
            .unwrap_or_else(|| id.clone());
        let updated_at = first_of(doc, &["update_time", "updatedAt", "updated_at"])
            .and_then(string_ish);
        let agent_id = first_of(doc, &["agentId", "agent_id"]).and_then(string_ish);
        let workflow_name = first_of(doc, &["workflowName", "workflow_name"]).and_then(string_ish);
        Some(Self {
            id,
            title,
            updated_at,
            agent_id,
            workflow_name,
        })
    }
}

/// A unit of work attached to a session. Field spellings vary per backend,
/// so construction goes through [`TaskRecord::from_value`] rather than serde.
#[derive(Debug, Clone, PartialEq)]
pub struct TaskRecord {
    pub id: String,
    pub status: Option<String>,
    pub title: Option<String>,
    pub description: Option<String>,
    pub session_id: Option<String>,
    pub created_at_ms: Option<i64>,
    pub updated_at_ms: Option<i64>,
    pub raw: Value,
}

impl TaskRecord {
    pub fn from_value(obj: &Value) -> Option<Self> {
        if !obj.is_object() {
            return None;
        }
        let id = string_ish(first_of(obj, &["id", "taskId", "task_id", "name", "uid", "_id"])?)?;
        let status =
            first_of(obj, &["status", "state", "phase", "result", "outcome"]).and_then(string_ish);
        let title = first_of(obj, &["title", "name", "summary", "description"])
            .and_then(string_ish)
            .or_else(|| {
                obj.get("prompt")
                    .and_then(Value::as_str)
                    .map(|p| p.chars().take(80).collect())
            });
        let description = obj
            .get("description")
            .and_then(Value::as_str)
            .map(str::to_string);
        let session_id = first_of(
            obj,
            &[
                "sessionId",
                "session_id",
                "topicId",
                "topic_id",
                "convoId",
                "convo_id",
            ],
        )
        .and_then(string_ish);
        let created_at_ms =
            first_of(obj, &["createdAt", "created_at", "create_time", "created", "start_time"])
                .and_then(coerce_epoch_ms);
        let updated_at_ms =
            first_of(obj, &["updatedAt", "updated_at", "update_time", "updated", "end_time"])
                .and_then(coerce_epoch_ms);
        Some(Self {
            id,
            status,
            title,
            description,
            session_id,
            created_at_ms,
            updated_at_ms,
            raw: obj.clone(),
        })
    }

    pub fn bucket(&self) -> Option<TaskBucket> {
        bucket_for_status(self.status.as_deref()?)
    }
}

/// The four visible status buckets. Raw statuses that match none of the
/// synonym sets stay invisible; there is no fifth "unknown" bucket.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum TaskBucket {
    Queued,
    InProgress,
    Done,
    Stuck,
}

impl TaskBucket {
    pub const ALL: [TaskBucket; 4] = [
        TaskBucket::Queued,
        TaskBucket::InProgress,
        TaskBucket::Done,
        TaskBucket::Stuck,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            TaskBucket::Queued => "queued",
            TaskBucket::InProgress => "in_progress",
            TaskBucket::Done => "done",
            TaskBucket::Stuck => "stuck",
        }
    }

    /// The status literal the backend accepts in per-bucket list queries.
    pub fn query_label(&self) -> &'static str {
        match self {
            TaskBucket::Queued => "Queued",
            TaskBucket::InProgress => "In Progress",
            TaskBucket::Done => "Done",
            TaskBucket::Stuck => "Stuck",
        }
    }
}

impl fmt::Display for TaskBucket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TaskBucket {
    type Err = String;

    fn from_str(input: &str) -> Result<Self, Self::Err> {
        bucket_for_status(input).ok_or_else(|| format!("Unknown status: {input}"))
    }
}

/// Map a free-text backend status onto one of the four buckets.
///
/// Normalization lowercases and collapses whitespace runs to `_`; hyphens are
/// left alone, so `In Progress` buckets and `in-progress` does not. Lossy and
/// non-invertible on purpose.
pub fn bucket_for_status(status: &str) -> Option<TaskBucket> {
    let mut s = String::with_capacity(status.len());
    let mut in_gap = false;
    for ch in status.trim().chars() {
        if ch.is_whitespace() {
            in_gap = true;
            continue;
        }
        if in_gap && !s.is_empty() {
            s.push('_');
        }
        in_gap = false;
        s.extend(ch.to_lowercase());
    }
    match s.as_str() {
        "queued" | "queue" | "pending" | "todo" | "new" => Some(TaskBucket::Queued),
        "in_progress" | "progress" | "running" | "active" | "processing" | "started" => {
            Some(TaskBucket::InProgress)
        }
        "done" | "completed" | "complete" | "success" | "succeeded" | "ok" | "finished" => {
            Some(TaskBucket::Done)
        }
        "stuck" | "blocked" | "failed" | "error" | "halted" => Some(TaskBucket::Stuck),
        _ => None,
    }
}

/// Per-bucket totals for a session's tasks.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct TaskCounts {
    pub queued: usize,
    pub in_progress: usize,
    pub done: usize,
    pub stuck: usize,
}

impl TaskCounts {
    pub fn increment(&mut self, bucket: TaskBucket) {
        match bucket {
            TaskBucket::Queued => self.queued += 1,
            TaskBucket::InProgress => self.in_progress += 1,
            TaskBucket::Done => self.done += 1,
            TaskBucket::Stuck => self.stuck += 1,
        }
    }

    pub fn get(&self, bucket: TaskBucket) -> usize {
        match bucket {
            TaskBucket::Queued => self.queued,
            TaskBucket::InProgress => self.in_progress,
            TaskBucket::Done => self.done,
            TaskBucket::Stuck => self.stuck,
        }
    }

    pub fn total(&self) -> usize {
        self.queued + self.in_progress + self.done + self.stuck
    }

    /// Bucket a slice of tasks; unbucketable statuses are skipped.
    pub fn tally<'a>(tasks: impl IntoIterator<Item = &'a TaskRecord>) -> Self {
        let mut counts = Self::default();
        for task in tasks {
            if let Some(bucket) = task.bucket() {
                counts.increment(bucket);
            }
        }
        counts
    }
}

/// A named configuration binding sessions to a workflow and a toolset.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct AgentRecord {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub workflow_name: Option<String>,
    #[serde(default)]
    pub tools: Vec<String>,
}

/// Mapping record linking a session to at most one agent.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct SessionAgentMapping {
    pub session_id: String,
    pub agent_id: String,
}

/// Coerce the timestamp shapes backends emit into epoch milliseconds:
/// a bare number (already ms), an RFC 3339 string, or a Firestore-style
/// `{_seconds}` / `{seconds}` object.
pub fn coerce_epoch_ms(v: &Value) -> Option<i64> {
    match v {
        Value::Number(n) => n.as_i64().or_else(|| n.as_f64().map(|f| f as i64)),
        Value::String(s) => DateTime::parse_from_rfc3339(s)
            .ok()
            .map(|d| d.timestamp_millis()),
        Value::Object(m) => m
            .get("_seconds")
            .or_else(|| m.get("seconds"))
            .and_then(Value::as_i64)
            .map(|secs| secs * 1000),
        _ => None,
    }
}

/// First present, non-null field among `keys`.
fn first_of<'a>(obj: &'a Value, keys: &[&str]) -> Option<&'a Value> {
    keys.iter()
        .filter_map(|k| obj.get(k))
        .find(|v| !v.is_null())
}

/// Accept a string or a number where an identifier-ish string is expected.
fn string_ish(v: &Value) -> Option<String> {
    match v {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn buckets_queued_synonyms() {
        for raw in ["Queued", "queue", "pending", "todo", "NEW"] {
            assert_eq!(bucket_for_status(raw), Some(TaskBucket::Queued), "{raw}");
        }
    }

    #[test]
    fn buckets_remaining_synonym_sets() {
        assert_eq!(bucket_for_status("In Progress"), Some(TaskBucket::InProgress));
        assert_eq!(bucket_for_status("running"), Some(TaskBucket::InProgress));
        assert_eq!(bucket_for_status("succeeded"), Some(TaskBucket::Done));
        assert_eq!(bucket_for_status("OK"), Some(TaskBucket::Done));
        assert_eq!(bucket_for_status("blocked"), Some(TaskBucket::Stuck));
        assert_eq!(bucket_for_status("halted"), Some(TaskBucket::Stuck));
    }

    #[test]
    fn unknown_status_stays_invisible() {
        assert_eq!(bucket_for_status("something-unrecognized"), None);
        assert_eq!(bucket_for_status("in-progress"), None);
        assert_eq!(bucket_for_status(""), None);
    }

    #[test]
    fn whitespace_runs_collapse_before_matching() {
        assert_eq!(bucket_for_status("  In   Progress  "), Some(TaskBucket::InProgress));
    }

    #[test]
    fn tally_skips_unbucketable_tasks() {
        let tasks: Vec<TaskRecord> = [json!({"id": 1, "status": "pending"}),
            json!({"id": 2, "status": "weird"}),
            json!({"id": 3, "status": "failed"})]
        .iter()
        .filter_map(TaskRecord::from_value)
        .collect();
        let counts = TaskCounts::tally(&tasks);
        assert_eq!(counts.queued, 1);
        assert_eq!(counts.stuck, 1);
        assert_eq!(counts.total(), 2);
    }

    #[test]
    fn task_from_value_accepts_field_variants() {
        let task = TaskRecord::from_value(&json!({
            "task_id": 42,
            "state": "running",
            "prompt": "do the thing",
            "topic_id": "sess-1",
            "created_at": {"_seconds": 1700000000},
        }))
        .expect("mapped");
        assert_eq!(task.id, "42");
        assert_eq!(task.status.as_deref(), Some("running"));
        assert_eq!(task.title.as_deref(), Some("do the thing"));
        assert_eq!(task.session_id.as_deref(), Some("sess-1"));
        assert_eq!(task.created_at_ms, Some(1_700_000_000_000));
    }

    #[test]
    fn task_from_value_requires_an_id() {
        assert!(TaskRecord::from_value(&json!({"status": "done"})).is_none());
        assert!(TaskRecord::from_value(&json!("not-an-object")).is_none());
    }

    #[test]
    fn session_from_doc_defaults_title_to_id() {
        let s = Session::from_doc(&json!({"id": "abc", "update_time": "2026-01-01T00:00:00Z"}))
            .expect("mapped");
        assert_eq!(s.title, "abc");
        assert_eq!(s.updated_at.as_deref(), Some("2026-01-01T00:00:00Z"));
    }

    #[test]
    fn session_from_doc_rejects_missing_id() {
        assert!(Session::from_doc(&json!({"title": "x"})).is_none());
    }

    #[test]
    fn epoch_coercion_shapes() {
        assert_eq!(coerce_epoch_ms(&json!(1700000000000_i64)), Some(1_700_000_000_000));
        assert_eq!(coerce_epoch_ms(&json!({"seconds": 10})), Some(10_000));
        assert_eq!(
            coerce_epoch_ms(&json!("2024-01-01T00:00:00.000Z")),
            Some(1_704_067_200_000)
        );
        assert_eq!(coerce_epoch_ms(&json!(["nope"])), None);
    }
}
