//! HTTP gateway client for the orchestration backend.
//!
//! Normalizes headers (bearer token, project scoping) and the various
//! response envelopes into consistent return types; all failures surface as
//! [`ApiError`].

use crate::envelope;
use crate::error::ApiError;
use flowdeck_core::consumer::{map_lock_status, ConsumerStatus};
use flowdeck_core::context::{normalize_messages, ContextMessage};
use flowdeck_core::exec::{normalize_exec_nodes, ExecNode};
use flowdeck_core::{AgentRecord, Session, SessionAgentMapping, TaskRecord};
use reqwest::{header, Method};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use uuid::Uuid;

const PROJECT_HEADER: &str = "x-project-id";
const CONSUMER_HEADER: &str = "x-consumer-id";
const SKIP_AUTH_HEADER: &str = "X-Skip-Auth";

/// End of the default listing window, seconds (far future).
const SESSION_RANGE_END: i64 = 4_102_444_800;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortOrder {
    Asc,
    Desc,
}

impl SortOrder {
    pub fn as_str(&self) -> &'static str {
        match self {
            SortOrder::Asc => "asc",
            SortOrder::Desc => "desc",
        }
    }
}

#[derive(Debug, Clone)]
pub struct ApiConfig {
    pub base_url: String,
    pub id_token: Option<String>,
    pub skip_auth: bool,
    pub project_id: Option<String>,
}

impl ApiConfig {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            id_token: None,
            skip_auth: false,
            project_id: None,
        }
    }
}

/// Whether a request carries the project header. User-scoped calls
/// (credentials) must omit it.
#[derive(Debug, Clone, Copy)]
enum Scope {
    Project,
    User,
}

#[derive(Clone)]
pub struct ApiClient {
    http: reqwest::Client,
    config: ApiConfig,
}

impl ApiClient {
    pub fn new(config: ApiConfig) -> Self {
        Self::with_http(reqwest::Client::new(), config)
    }

    pub fn with_http(http: reqwest::Client, config: ApiConfig) -> Self {
        Self { http, config }
    }

    pub fn config(&self) -> &ApiConfig {
        &self.config
    }

    async fn send(
        &self,
        method: Method,
        path: &str,
        body: Option<&Value>,
        scope: Scope,
        extra_headers: &[(&str, String)],
    ) -> Result<Value, ApiError> {
        let url = format!("{}{}", self.config.base_url, path);
        let mut req = self
            .http
            .request(method.clone(), url.as_str())
            .header(header::CONTENT_TYPE, "application/json");
        if let Some(token) = &self.config.id_token {
            req = req.bearer_auth(token);
        }
        if self.config.skip_auth {
            req = req.header(SKIP_AUTH_HEADER, "1");
        }
        if matches!(scope, Scope::Project) {
            req = req.header(
                PROJECT_HEADER,
                self.config.project_id.clone().unwrap_or_default(),
            );
        }
        for (name, value) in extra_headers {
            req = req.header(*name, value.as_str());
        }
        if let Some(body) = body {
            req = req.json(body);
        }
        tracing::debug!(method = %method, path, "api request");

        let res = req.send().await?;
        let status = res.status();
        let content_type = res
            .headers()
            .get(header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default()
            .to_string();
        let text = res.text().await?;
        let parsed: Value = if text.is_empty() {
            Value::Null
        } else {
            match serde_json::from_str(&text) {
                Ok(v) => v,
                Err(_) => json!({ "raw": text }),
            }
        };

        // An HTML body means a proxy or the front-end index answered, not
        // the API; surface it distinctly so callers can fall back.
        let raw_is_html = parsed
            .get("raw")
            .and_then(Value::as_str)
            .map(envelope::looks_like_html)
            .unwrap_or(false);
        if content_type.contains("text/html") || raw_is_html {
            return Err(ApiError::UnexpectedHtml {
                status: status.as_u16(),
            });
        }

        if !status.is_success() {
            let message = parsed
                .get("error")
                .and_then(Value::as_str)
                .or_else(|| parsed.get("message").and_then(Value::as_str))
                .map(str::to_string)
                .or_else(|| status.canonical_reason().map(str::to_string))
                .unwrap_or_else(|| "request failed".to_string());
            return Err(ApiError::Status {
                status: status.as_u16(),
                message,
                body: parsed,
            });
        }

        Ok(parsed)
    }

    async fn get(&self, path: &str, scope: Scope) -> Result<Value, ApiError> {
        self.send(Method::GET, path, None, scope, &[]).await
    }

    async fn post(&self, path: &str, body: &Value, scope: Scope) -> Result<Value, ApiError> {
        self.send(Method::POST, path, Some(body), scope, &[]).await
    }

    async fn patch(&self, path: &str, body: &Value) -> Result<Value, ApiError> {
        self.send(Method::PATCH, path, Some(body), Scope::Project, &[])
            .await
    }

    async fn put(&self, path: &str, body: &Value) -> Result<Value, ApiError> {
        self.send(Method::PUT, path, Some(body), Scope::Project, &[])
            .await
    }

    async fn delete(&self, path: &str, scope: Scope) -> Result<Value, ApiError> {
        self.send(Method::DELETE, path, None, scope, &[]).await
    }

    async fn delete_with_body(&self, path: &str, body: &Value) -> Result<Value, ApiError> {
        self.send(Method::DELETE, path, Some(body), Scope::Project, &[])
            .await
    }

    // --- sessions -----------------------------------------------------

    pub async fn list_sessions(&self, query: &SessionListQuery) -> Result<Vec<Session>, ApiError> {
        let mut body = json!({
            "collection": query.collection,
            "field": query.field,
            "order": query.order.as_str(),
            "start": query.start,
            "end": query.end,
        });
        if let Some(limit) = query.limit {
            body["limit"] = limit.into();
        }
        if let Some(field_type) = &query.field_type {
            body["fieldType"] = field_type.clone().into();
        }
        let json = self
            .post("/workflows/context/sessions/list", &body, Scope::Project)
            .await?;
        Ok(envelope::flatten_session_docs(&json)
            .iter()
            .filter_map(Session::from_doc)
            .collect())
    }

    /// Fetch the transcript for a session's topic context.
    pub async fn topic_context(
        &self,
        session_id: &str,
        window_seconds: Option<u64>,
    ) -> Result<Vec<ContextMessage>, ApiError> {
        if session_id.is_empty() {
            return Err(ApiError::MissingField {
                call: "topic_context",
                field: "sessionId",
            });
        }
        let mut body = json!({ "sessionId": session_id });
        if let Some(window) = window_seconds {
            body["windowSeconds"] = window.into();
        }
        let json = self
            .post("/workflows/context/topic/run", &body, Scope::Project)
            .await?;
        Ok(normalize_messages(&envelope::extract_messages(&json)))
    }

    // --- workflow execution -------------------------------------------

    pub async fn workflows_execute(&self, request: &ExecuteRequest) -> Result<Value, ApiError> {
        let body = json!({
            "workflowName": request.workflow_name,
            "params": request.params,
            // Fire-and-forget unless the caller explicitly wants sync.
            "sync": request.sync.unwrap_or(false),
        });
        self.post("/workflows/execute", &body, Scope::Project).await
    }

    pub async fn exec_status_latest(
        &self,
        session_id: &str,
        limit: u32,
    ) -> Result<Option<LatestExec>, ApiError> {
        if session_id.is_empty() {
            return Err(ApiError::MissingField {
                call: "exec_status_latest",
                field: "sessionId",
            });
        }
        let path = format!(
            "/workflows/exec/status/latest/{}?limit={limit}",
            urlencoding::encode(session_id)
        );
        let json = self.get(&path, Scope::Project).await?;
        Ok(LatestExec::from_response(&json))
    }

    pub async fn exec_stop(&self, request: &StopRequest) -> Result<Value, ApiError> {
        let mut body = json!({
            "execId": request.exec_id,
            "includeDescendants": request.include_descendants,
        });
        if let Some(workflow) = &request.workflow {
            body["workflow"] = workflow.clone().into();
        }
        if let Some(workflows) = &request.workflows {
            body["workflows"] = workflows.clone().into();
        }
        self.post("/workflows/exec/stop", &body, Scope::Project)
            .await
    }

    /// Execution forest for a session or a particular exec id.
    pub async fn exec_tree(
        &self,
        session_id: Option<&str>,
        exec_id: Option<&str>,
        include_status: bool,
    ) -> Result<Vec<ExecNode>, ApiError> {
        let mut body = json!({ "includeStatus": include_status });
        if let Some(sid) = session_id {
            body["sessionId"] = sid.into();
        }
        if let Some(eid) = exec_id {
            body["execId"] = eid.into();
        }
        let json = self.post("/workflows/exec/tree", &body, Scope::Project).await?;
        Ok(normalize_exec_nodes(&json))
    }

    pub async fn workflows_list(&self, location: Option<&str>) -> Result<Vec<String>, ApiError> {
        let qs = build_query(&[("location", location.map(str::to_string))]);
        let json = self.get(&format!("/workflows/list{qs}"), Scope::Project).await?;
        Ok(envelope::workflow_names(&json))
    }

    // --- projects ------------------------------------------------------

    pub async fn projects_list(
        &self,
        limit: Option<u32>,
        order: Option<SortOrder>,
    ) -> Result<Value, ApiError> {
        let qs = build_query(&[
            ("limit", limit.map(|l| l.to_string())),
            ("order", order.map(|o| o.as_str().to_string())),
        ]);
        self.get(&format!("/workflows/projects{qs}"), Scope::Project)
            .await
    }

    pub async fn projects_create(
        &self,
        name: Option<&str>,
        remote: Option<&str>,
        live: Option<bool>,
    ) -> Result<Value, ApiError> {
        let mut body = json!({});
        if let Some(remote) = remote.filter(|r| !r.is_empty()) {
            body["remote"] = remote.into();
        }
        if let Some(name) = name.map(str::trim).filter(|n| !n.is_empty()) {
            body["name"] = name.into();
        }
        if let Some(live) = live {
            body["live"] = live.into();
        }
        self.post("/workflows/projects", &body, Scope::Project).await
    }

    // --- consumer lock / producer -------------------------------------

    pub async fn consumer_lock_status(
        &self,
        project_id: &str,
        self_consumer_id: Option<&str>,
    ) -> Result<ConsumerStatus, ApiError> {
        if project_id.is_empty() {
            return Err(ApiError::MissingField {
                call: "consumer_lock_status",
                field: "projectId",
            });
        }
        let path = format!(
            "/workflows/projects/{}/consumer-lock/status",
            urlencoding::encode(project_id)
        );
        let extra: Vec<(&str, String)> = self_consumer_id
            .filter(|id| !id.is_empty())
            .map(|id| vec![(CONSUMER_HEADER, id.to_string())])
            .unwrap_or_default();
        let json = self
            .send(Method::GET, &path, None, Scope::Project, &extra)
            .await?;
        Ok(map_lock_status(&json, self_consumer_id))
    }

    pub async fn producer_start(&self, options: &ProducerStartOptions) -> Result<Value, ApiError> {
        let body = serde_json::to_value(options).unwrap_or_else(|_| json!({}));
        self.post("/workflows/producer/start", &body, Scope::Project)
            .await
    }

    pub async fn producer_stop(&self) -> Result<Value, ApiError> {
        self.post("/workflows/producer/stop", &json!({}), Scope::Project)
            .await
    }

    // --- tasks ---------------------------------------------------------

    pub async fn tasks_list(&self, query: &TaskListQuery) -> Result<Vec<TaskRecord>, ApiError> {
        let qs = build_query(&[
            ("sessionId", query.session_id.clone()),
            ("status", effective_status(query.status.as_deref())),
            ("limit", query.limit.map(|l| l.to_string())),
            ("order", Some(query.order.as_str().to_string())),
        ]);
        let json = self.get(&format!("/workflows/tasks{qs}"), Scope::Project).await?;
        Ok(map_tasks(&json))
    }

    pub async fn tasks_list_by_session(
        &self,
        session_id: &str,
        query: &TaskListQuery,
    ) -> Result<Vec<TaskRecord>, ApiError> {
        if session_id.is_empty() {
            return Err(ApiError::MissingField {
                call: "tasks_list_by_session",
                field: "sessionId",
            });
        }
        let qs = build_query(&[
            ("status", effective_status(query.status.as_deref())),
            ("limit", query.limit.map(|l| l.to_string())),
            ("order", Some(query.order.as_str().to_string())),
        ]);
        let path = format!(
            "/workflows/tasks/by-session/{}{qs}",
            urlencoding::encode(session_id)
        );
        let json = self.get(&path, Scope::Project).await?;
        Ok(map_tasks(&json))
    }

    pub async fn task_create(&self, draft: &TaskDraft) -> Result<Value, ApiError> {
        let body = serde_json::to_value(draft).unwrap_or_else(|_| json!({}));
        self.post("/workflows/tasks", &body, Scope::Project).await
    }

    pub async fn task_update(&self, id: &str, fields: &Value) -> Result<Value, ApiError> {
        if id.is_empty() {
            return Err(ApiError::MissingField {
                call: "task_update",
                field: "id",
            });
        }
        self.patch(
            &format!("/workflows/tasks/{}", urlencoding::encode(id)),
            fields,
        )
        .await
    }

    pub async fn task_status_update(&self, id: &str, status: &str) -> Result<Value, ApiError> {
        if id.is_empty() {
            return Err(ApiError::MissingField {
                call: "task_status_update",
                field: "id",
            });
        }
        self.post(
            &format!("/workflows/tasks/{}/status", urlencoding::encode(id)),
            &json!({ "status": status }),
            Scope::Project,
        )
        .await
    }

    pub async fn task_delete(&self, id: &str) -> Result<Value, ApiError> {
        if id.is_empty() {
            return Err(ApiError::MissingField {
                call: "task_delete",
                field: "id",
            });
        }
        self.delete(
            &format!("/workflows/tasks/{}", urlencoding::encode(id)),
            Scope::Project,
        )
        .await
    }

    // --- agents --------------------------------------------------------

    pub async fn agents_list(&self) -> Result<Vec<AgentRecord>, ApiError> {
        let json = self.get("/workflows/agents", Scope::Project).await?;
        let items = envelope::normalize_list(&json)
            .or_else(|| json.get("agents").and_then(Value::as_array).cloned())
            .unwrap_or_default();
        Ok(items
            .into_iter()
            .filter_map(|item| serde_json::from_value(item).ok())
            .collect())
    }

    /// `Ok(None)` when the agent does not exist.
    pub async fn agent_get(&self, id: &str) -> Result<Option<AgentRecord>, ApiError> {
        if id.is_empty() {
            return Err(ApiError::MissingField {
                call: "agent_get",
                field: "id",
            });
        }
        let path = format!("/workflows/agents/{}", urlencoding::encode(id));
        let json = match self.get(&path, Scope::Project).await {
            Ok(json) => json,
            Err(ApiError::Status { status: 404, .. }) => return Ok(None),
            Err(err) => return Err(err),
        };
        let record = json.get("agent").unwrap_or(&json);
        Ok(serde_json::from_value(record.clone()).ok())
    }

    /// Exact-name lookup over the agent listing.
    pub async fn agent_get_by_name(&self, name: &str) -> Result<Option<AgentRecord>, ApiError> {
        if name.is_empty() {
            return Ok(None);
        }
        let agents = self.agents_list().await?;
        Ok(agents.into_iter().find(|agent| agent.name == name))
    }

    pub async fn agent_create(&self, draft: &AgentDraft) -> Result<Value, ApiError> {
        let body = serde_json::to_value(draft).unwrap_or_else(|_| json!({}));
        self.post("/workflows/agents", &body, Scope::Project).await
    }

    pub async fn agent_update(&self, id: &str, fields: &Value) -> Result<Value, ApiError> {
        if id.is_empty() {
            return Err(ApiError::MissingField {
                call: "agent_update",
                field: "id",
            });
        }
        self.patch(
            &format!("/workflows/agents/{}", urlencoding::encode(id)),
            fields,
        )
        .await
    }

    pub async fn agent_delete(&self, id: &str) -> Result<Value, ApiError> {
        if id.is_empty() {
            return Err(ApiError::MissingField {
                call: "agent_delete",
                field: "id",
            });
        }
        self.delete(
            &format!("/workflows/agents/{}", urlencoding::encode(id)),
            Scope::Project,
        )
        .await
    }

    pub async fn agent_tools_add(&self, id: &str, tools: &[String]) -> Result<Value, ApiError> {
        if id.is_empty() {
            return Err(ApiError::MissingField {
                call: "agent_tools_add",
                field: "id",
            });
        }
        self.post(
            &format!("/workflows/agents/{}/tools", urlencoding::encode(id)),
            &json!({ "tools": tools }),
            Scope::Project,
        )
        .await
    }

    pub async fn agent_tools_remove(&self, id: &str, tools: &[String]) -> Result<Value, ApiError> {
        if id.is_empty() {
            return Err(ApiError::MissingField {
                call: "agent_tools_remove",
                field: "id",
            });
        }
        self.delete_with_body(
            &format!("/workflows/agents/{}/tools", urlencoding::encode(id)),
            &json!({ "tools": tools }),
        )
        .await
    }

    pub async fn agent_tools_list(&self, id: &str) -> Result<Vec<String>, ApiError> {
        if id.is_empty() {
            return Err(ApiError::MissingField {
                call: "agent_tools_list",
                field: "id",
            });
        }
        let json = self
            .get(
                &format!("/workflows/agents/{}/tools", urlencoding::encode(id)),
                Scope::Project,
            )
            .await?;
        let items = envelope::normalize_list(&json)
            .or_else(|| json.get("tools").and_then(Value::as_array).cloned())
            .unwrap_or_default();
        Ok(items
            .into_iter()
            .filter_map(|item| match item {
                Value::String(s) => Some(s),
                Value::Object(_) => ["name", "id"]
                    .iter()
                    .find_map(|k| item.get(*k).and_then(Value::as_str))
                    .map(str::to_string),
                _ => None,
            })
            .collect())
    }

    // --- session/agent mapping ----------------------------------------

    pub async fn session_agent_link(
        &self,
        session_id: &str,
        agent_id: &str,
    ) -> Result<Value, ApiError> {
        if session_id.is_empty() {
            return Err(ApiError::MissingField {
                call: "session_agent_link",
                field: "sessionId",
            });
        }
        if agent_id.is_empty() {
            return Err(ApiError::MissingField {
                call: "session_agent_link",
                field: "agentId",
            });
        }
        self.put(
            &format!(
                "/workflows/agents/session/{}",
                urlencoding::encode(session_id)
            ),
            &json!({ "agentId": agent_id }),
        )
        .await
    }

    /// `Ok(None)` when no mapping exists (404 or an empty record).
    pub async fn session_agent_get(
        &self,
        session_id: &str,
    ) -> Result<Option<SessionAgentMapping>, ApiError> {
        if session_id.is_empty() {
            return Err(ApiError::MissingField {
                call: "session_agent_get",
                field: "sessionId",
            });
        }
        let path = format!(
            "/workflows/agents/session/{}",
            urlencoding::encode(session_id)
        );
        let json = match self.get(&path, Scope::Project).await {
            Ok(json) => json,
            Err(ApiError::Status { status: 404, .. }) => return Ok(None),
            Err(err) => return Err(err),
        };
        let record = json.get("mapping").unwrap_or(&json);
        Ok(serde_json::from_value(record.clone()).ok())
    }

    pub async fn session_agent_unlink(&self, session_id: &str) -> Result<Value, ApiError> {
        if session_id.is_empty() {
            return Err(ApiError::MissingField {
                call: "session_agent_unlink",
                field: "sessionId",
            });
        }
        self.delete(
            &format!(
                "/workflows/agents/session/{}",
                urlencoding::encode(session_id)
            ),
            Scope::Project,
        )
        .await
    }

    // --- tools registry / generic execution ---------------------------

    pub async fn tools_registry_list(&self, names: &[String]) -> Result<Value, ApiError> {
        let encoded = if names.is_empty() {
            None
        } else {
            serde_json::to_string(names).ok()
        };
        let qs = build_query(&[("names", encoded)]);
        self.get(&format!("/workflows/tools/list{qs}"), Scope::Project)
            .await
    }

    /// Execute a registered tool through the workflow engine.
    pub async fn tool_execute(
        &self,
        workflow_name: &str,
        tool_name: &str,
        args: &Value,
        opts: &ToolExecOptions,
    ) -> Result<Value, ApiError> {
        let session_id = opts
            .session_id
            .clone()
            .unwrap_or_else(|| Uuid::new_v4().to_string());
        let tool_call = json!({
            "id": Uuid::new_v4().to_string(),
            "type": "function",
            "function": {
                "name": tool_name,
                "arguments": serde_json::to_string(args).unwrap_or_else(|_| "{}".to_string()),
            },
        });
        self.workflows_execute(&ExecuteRequest {
            workflow_name: workflow_name.to_string(),
            params: json!({
                "sessionId": session_id,
                "tool_call": tool_call,
                "cost": opts.cost,
                "background": opts.background.unwrap_or(false),
            }),
            sync: None,
        })
        .await
    }

    /// CLI tools run in the background unless explicitly overridden.
    pub async fn run_command(
        &self,
        command: &str,
        opts: &ToolExecOptions,
    ) -> Result<Value, ApiError> {
        let mut opts = opts.clone();
        opts.background = Some(opts.background.unwrap_or(true));
        self.tool_execute(
            CLI_TOOLS_WORKFLOW,
            "RUN_COMMAND",
            &json!({ "command": command }),
            &opts,
        )
        .await
    }

    pub async fn read_remote_file(
        &self,
        filepath: &str,
        opts: &ToolExecOptions,
    ) -> Result<Value, ApiError> {
        let mut opts = opts.clone();
        opts.background = Some(opts.background.unwrap_or(true));
        self.tool_execute(
            CLI_TOOLS_WORKFLOW,
            "READ_FILE",
            &json!({ "filepath": filepath }),
            &opts,
        )
        .await
    }

    pub async fn update_remote_file(
        &self,
        filepath: &str,
        content: &str,
        opts: &ToolExecOptions,
    ) -> Result<Value, ApiError> {
        let mut opts = opts.clone();
        opts.background = Some(opts.background.unwrap_or(true));
        self.tool_execute(
            CLI_TOOLS_WORKFLOW,
            "UPDATE_FILE",
            &json!({ "filepath": filepath, "content": content }),
            &opts,
        )
        .await
    }

    // --- git integration ----------------------------------------------

    pub async fn git_config_get(&self, project_id: &str) -> Result<Value, ApiError> {
        if project_id.is_empty() {
            return Err(ApiError::MissingField {
                call: "git_config_get",
                field: "projectId",
            });
        }
        let qs = build_query(&[("projectId", Some(project_id.to_string()))]);
        self.get(&format!("/workflows/services/git/config{qs}"), Scope::Project)
            .await
    }

    pub async fn git_config_put(&self, config: &GitConfigUpdate) -> Result<Value, ApiError> {
        if config.project_id.is_empty() {
            return Err(ApiError::MissingField {
                call: "git_config_put",
                field: "projectId",
            });
        }
        let body = serde_json::to_value(config).unwrap_or_else(|_| json!({}));
        self.put("/workflows/services/git/config", &body).await
    }

    pub async fn git_config_delete(&self, project_id: &str) -> Result<Value, ApiError> {
        if project_id.is_empty() {
            return Err(ApiError::MissingField {
                call: "git_config_delete",
                field: "projectId",
            });
        }
        let qs = build_query(&[("projectId", Some(project_id.to_string()))]);
        self.delete(
            &format!("/workflows/services/git/config{qs}"),
            Scope::Project,
        )
        .await
    }

    pub async fn git_tree(
        &self,
        project_id: &str,
        git_ref: Option<&str>,
        recursive: bool,
    ) -> Result<Value, ApiError> {
        if project_id.is_empty() {
            return Err(ApiError::MissingField {
                call: "git_tree",
                field: "projectId",
            });
        }
        let qs = build_query(&[
            ("projectId", Some(project_id.to_string())),
            ("ref", git_ref.map(str::to_string)),
            ("recursive", recursive.then(|| "1".to_string())),
        ]);
        self.get(&format!("/workflows/services/git/tree{qs}"), Scope::Project)
            .await
    }

    pub async fn git_list(
        &self,
        project_id: Option<&str>,
        path: Option<&str>,
        git_ref: Option<&str>,
    ) -> Result<Value, ApiError> {
        let qs = build_query(&[
            ("projectId", project_id.map(str::to_string)),
            ("path", path.map(str::to_string)),
            ("ref", git_ref.map(str::to_string)),
        ]);
        self.get(&format!("/workflows/services/git/list{qs}"), Scope::Project)
            .await
    }

    pub async fn git_read(
        &self,
        project_id: Option<&str>,
        path: &str,
        git_ref: Option<&str>,
    ) -> Result<Value, ApiError> {
        if path.is_empty() {
            return Err(ApiError::MissingField {
                call: "git_read",
                field: "path",
            });
        }
        let qs = build_query(&[
            ("projectId", project_id.map(str::to_string)),
            ("path", Some(path.to_string())),
            ("ref", git_ref.map(str::to_string)),
        ]);
        self.get(&format!("/workflows/services/git/read{qs}"), Scope::Project)
            .await
    }

    pub async fn git_write(&self, write: &GitWrite) -> Result<Value, ApiError> {
        if write.path.is_empty() {
            return Err(ApiError::MissingField {
                call: "git_write",
                field: "path",
            });
        }
        let body = serde_json::to_value(write).unwrap_or_else(|_| json!({}));
        self.put("/workflows/services/git/write", &body).await
    }

    pub async fn git_delete(&self, delete: &GitDelete) -> Result<Value, ApiError> {
        if delete.path.is_empty() {
            return Err(ApiError::MissingField {
                call: "git_delete",
                field: "path",
            });
        }
        let body = serde_json::to_value(delete).unwrap_or_else(|_| json!({}));
        self.delete_with_body("/workflows/services/git/delete", &body)
            .await
    }

    // --- collapse state ------------------------------------------------

    pub async fn collapse_state_set(
        &self,
        session_id: &str,
        group: &str,
        expanded: bool,
        response_id: Option<&str>,
    ) -> Result<Value, ApiError> {
        if session_id.is_empty() {
            return Err(ApiError::MissingField {
                call: "collapse_state_set",
                field: "sessionId",
            });
        }
        let group = group.trim();
        if group.is_empty() {
            return Err(ApiError::MissingField {
                call: "collapse_state_set",
                field: "group",
            });
        }
        let mut body = json!({
            "sessionId": session_id,
            "group": group,
            "expanded": expanded,
        });
        if let Some(response_id) = response_id.filter(|r| !r.is_empty()) {
            body["responseId"] = response_id.into();
        }
        self.post("/workflows/context/collapse/state/set", &body, Scope::Project)
            .await
    }

    // --- credentials (user-scoped) ------------------------------------

    pub async fn creds_list(&self) -> Result<Vec<CredMeta>, ApiError> {
        let json = self.get("/workflows/creds", Scope::User).await?;
        let items = json
            .get("creds")
            .and_then(Value::as_array)
            .cloned()
            .unwrap_or_default();
        Ok(items
            .into_iter()
            .filter_map(|item| serde_json::from_value(item).ok())
            .collect())
    }

    pub async fn creds_set(&self, provider: &str, value: &str) -> Result<Value, ApiError> {
        if provider.is_empty() {
            return Err(ApiError::MissingField {
                call: "creds_set",
                field: "provider",
            });
        }
        if value.is_empty() {
            return Err(ApiError::MissingField {
                call: "creds_set",
                field: "value",
            });
        }
        self.post(
            &format!("/workflows/creds/{}", urlencoding::encode(provider)),
            &json!({ "value": value }),
            Scope::User,
        )
        .await
    }

    pub async fn creds_delete(&self, provider: &str) -> Result<Value, ApiError> {
        if provider.is_empty() {
            return Err(ApiError::MissingField {
                call: "creds_delete",
                field: "provider",
            });
        }
        self.delete(
            &format!("/workflows/creds/{}", urlencoding::encode(provider)),
            Scope::User,
        )
        .await
    }
}

pub const CLI_TOOLS_WORKFLOW: &str = "tools-CliTools";

fn map_tasks(json: &Value) -> Vec<TaskRecord> {
    envelope::list_or_empty(json)
        .iter()
        .filter_map(TaskRecord::from_value)
        .collect()
}

/// `all` (any case) and blanks mean "no status filter".
fn effective_status(status: Option<&str>) -> Option<String> {
    status
        .map(str::trim)
        .filter(|s| !s.is_empty() && !s.eq_ignore_ascii_case("all"))
        .map(str::to_string)
}

fn build_query(pairs: &[(&str, Option<String>)]) -> String {
    let parts: Vec<String> = pairs
        .iter()
        .filter_map(|(key, value)| {
            value
                .as_ref()
                .map(|v| format!("{key}={}", urlencoding::encode(v)))
        })
        .collect();
    if parts.is_empty() {
        String::new()
    } else {
        format!("?{}", parts.join("&"))
    }
}

#[derive(Debug, Clone)]
pub struct SessionListQuery {
    pub collection: String,
    pub field: String,
    pub order: SortOrder,
    pub start: i64,
    pub end: i64,
    pub limit: Option<u32>,
    pub field_type: Option<String>,
}

impl Default for SessionListQuery {
    fn default() -> Self {
        Self {
            collection: "convo.sessions".to_string(),
            field: "update_time".to_string(),
            order: SortOrder::Desc,
            start: 0,
            end: SESSION_RANGE_END,
            limit: None,
            field_type: None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct TaskListQuery {
    pub session_id: Option<String>,
    pub status: Option<String>,
    pub limit: Option<u32>,
    pub order: SortOrder,
}

impl Default for TaskListQuery {
    fn default() -> Self {
        Self {
            session_id: None,
            status: None,
            limit: Some(100),
            order: SortOrder::Desc,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskDraft {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AgentDraft {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub workflow_name: Option<String>,
    pub tools: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct ExecuteRequest {
    pub workflow_name: String,
    pub params: Value,
    pub sync: Option<bool>,
}

#[derive(Debug, Clone)]
pub struct StopRequest {
    pub exec_id: String,
    pub include_descendants: bool,
    pub workflow: Option<String>,
    pub workflows: Option<Vec<String>>,
}

/// Most recent execution reported for a session.
#[derive(Debug, Clone, PartialEq)]
pub struct LatestExec {
    pub exec_id: String,
    pub status: Option<String>,
    pub created_ms: Option<i64>,
    pub error: Option<String>,
}

impl LatestExec {
    fn from_response(json: &Value) -> Option<Self> {
        let item = json.get("items").and_then(Value::as_array)?.first()?;
        let exec_id = ["execId", "exec_id", "id"]
            .iter()
            .find_map(|k| item.get(*k).and_then(Value::as_str))?
            .to_string();
        Some(Self {
            exec_id,
            status: item
                .get("status")
                .and_then(Value::as_str)
                .map(str::to_string),
            created_ms: item
                .get("created")
                .and_then(flowdeck_core::coerce_epoch_ms),
            error: item.get("error").and_then(Value::as_str).map(str::to_string),
        })
    }
}

#[derive(Debug, Clone, Default)]
pub struct ToolExecOptions {
    pub session_id: Option<String>,
    pub background: Option<bool>,
    pub cost: f64,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct ProducerStartOptions {
    #[serde(rename = "sessionId", skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub since_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub since_time: Option<String>,
    #[serde(rename = "leaseMs", skip_serializing_if = "Option::is_none")]
    pub lease_ms: Option<u64>,
    #[serde(rename = "eventsHeartbeatMs", skip_serializing_if = "Option::is_none")]
    pub events_heartbeat_ms: Option<u64>,
    #[serde(rename = "reconnectBackoffMs", skip_serializing_if = "Option::is_none")]
    pub reconnect_backoff_ms: Option<u64>,
    #[serde(rename = "workspaceId", skip_serializing_if = "Option::is_none")]
    pub workspace_id: Option<String>,
    #[serde(rename = "workspaceTtlMs", skip_serializing_if = "Option::is_none")]
    pub workspace_ttl_ms: Option<u64>,
    #[serde(rename = "localDocker", skip_serializing_if = "Option::is_none")]
    pub local_docker: Option<bool>,
    #[serde(rename = "localDockerImage", skip_serializing_if = "Option::is_none")]
    pub local_docker_image: Option<String>,
    #[serde(rename = "localDockerArgs", skip_serializing_if = "Option::is_none")]
    pub local_docker_args: Option<Vec<String>>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GitConfigUpdate {
    pub project_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub owner: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub repo: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default_branch: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GitWrite {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub project_id: Option<String>,
    pub path: String,
    pub content: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub branch: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sha: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GitDelete {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub project_id: Option<String>,
    pub path: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub branch: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sha: Option<String>,
}

/// Credential metadata; values never round-trip to the client.
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CredMeta {
    pub id: String,
    pub provider: String,
    #[serde(default)]
    pub last4: Option<String>,
    #[serde(default)]
    pub updated: Option<Value>,
    #[serde(default)]
    pub has_value: Option<bool>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn query_builder_encodes_and_skips_none() {
        let qs = build_query(&[
            ("a", Some("x y".to_string())),
            ("b", None),
            ("c", Some("1".to_string())),
        ]);
        assert_eq!(qs, "?a=x%20y&c=1");
        assert_eq!(build_query(&[("a", None)]), "");
    }

    #[test]
    fn all_status_filter_is_dropped() {
        assert_eq!(effective_status(Some("All")), None);
        assert_eq!(effective_status(Some("  ")), None);
        assert_eq!(effective_status(Some("Queued")), Some("Queued".to_string()));
        assert_eq!(effective_status(None), None);
    }

    #[test]
    fn latest_exec_parses_first_item() {
        let json = serde_json::json!({"items": [
            {"execId": "e1", "status": "Running", "created": 5},
            {"execId": "e2"}
        ]});
        let latest = LatestExec::from_response(&json).expect("parsed");
        assert_eq!(latest.exec_id, "e1");
        assert_eq!(latest.status.as_deref(), Some("Running"));
        assert_eq!(latest.created_ms, Some(5));
        assert!(LatestExec::from_response(&serde_json::json!({"items": []})).is_none());
    }

    #[test]
    fn producer_options_serialize_with_wire_names() {
        let opts = ProducerStartOptions {
            session_id: Some("s".to_string()),
            lease_ms: Some(10),
            since_id: Some("m1".to_string()),
            ..Default::default()
        };
        let v = serde_json::to_value(&opts).expect("serialize");
        assert_eq!(v["sessionId"], "s");
        assert_eq!(v["leaseMs"], 10);
        assert_eq!(v["since_id"], "m1");
        assert!(v.get("localDocker").is_none());
    }
}
