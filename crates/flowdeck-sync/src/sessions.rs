//! Ephemeral-session registry and the new-session creation flow.

use chrono::{SecondsFormat, Utc};
use flowdeck_api::{AgentDraft, ApiClient, ApiError, ExecuteRequest};
use flowdeck_core::merge::merge_sessions;
use flowdeck_core::{AgentRecord, Session, SessionAgentMapping};
use serde_json::{json, Value};
use uuid::Uuid;

/// Locally created sessions awaiting server confirmation, newest first.
/// Cleared whenever the user or project identity changes.
#[derive(Debug, Default)]
pub struct EphemeralSessions {
    items: Vec<Session>,
    user_id: Option<String>,
    project_id: Option<String>,
}

impl EphemeralSessions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn items(&self) -> &[Session] {
        &self.items
    }

    /// Track the current user/project; a change drops all placeholders
    /// (they belong to the previous identity).
    pub fn sync_identity(&mut self, user_id: Option<&str>, project_id: Option<&str>) {
        if self.user_id.as_deref() != user_id {
            self.items.clear();
        } else if project_id.is_some() && self.project_id.as_deref() != project_id {
            self.items.clear();
        }
        self.user_id = user_id.map(str::to_string);
        self.project_id = project_id.map(str::to_string);
    }

    /// Insert a placeholder at the front so it renders immediately.
    pub fn insert_placeholder(&mut self, id: &str) -> Session {
        let now = Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true);
        let session = Session::ephemeral(id, now);
        self.items.insert(0, session.clone());
        session
    }

    /// The rendered list: ephemeral-only entries first, then the server
    /// list untouched; server wins on id conflicts.
    pub fn merged(&self, server: &[Session]) -> Vec<Session> {
        merge_sessions(server, &self.items)
    }
}

#[derive(Debug, Clone, Default)]
pub struct NewSessionInput {
    pub agent_id: Option<String>,
    pub workflow_name: Option<String>,
    pub auto_start: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewSessionOutcome {
    pub id: String,
    pub agent_id: Option<String>,
    pub workflow_name: Option<String>,
}

pub fn generate_session_id() -> String {
    Uuid::new_v4().to_string()
}

/// Wire up agent/workflow execution for a freshly created session id.
///
/// Best-effort by design: the ephemeral placeholder must survive any
/// downstream failure so the user keeps an entry to come back to. Failures
/// are logged and folded into the outcome, never returned as errors.
pub async fn setup_new_session(
    client: &ApiClient,
    id: &str,
    input: &NewSessionInput,
    session_fallback_workflow: Option<&str>,
) -> NewSessionOutcome {
    match setup_inner(client, id, input, session_fallback_workflow).await {
        Ok(outcome) => outcome,
        Err(err) => {
            tracing::warn!(session = id, error = %err, "new-session setup failed; keeping placeholder");
            NewSessionOutcome {
                id: id.to_string(),
                agent_id: input.agent_id.clone(),
                workflow_name: None,
            }
        }
    }
}

async fn setup_inner(
    client: &ApiClient,
    id: &str,
    input: &NewSessionInput,
    session_fallback_workflow: Option<&str>,
) -> Result<NewSessionOutcome, ApiError> {
    // An explicitly selected agent takes priority over a bare workflow pick.
    if let Some(agent_id) = input.agent_id.as_deref().filter(|a| !a.is_empty()) {
        client.session_agent_link(id, agent_id).await?;
        let workflow_name = match client.agent_get(agent_id).await {
            Ok(Some(agent)) => agent
                .workflow_name
                .filter(|w| !w.trim().is_empty()),
            Ok(None) => None,
            Err(err) => {
                tracing::debug!(agent = agent_id, error = %err, "agent lookup failed");
                None
            }
        }
        .or_else(|| session_fallback_workflow.map(str::to_string));

        if input.auto_start {
            if let Some(workflow) = &workflow_name {
                start_workflow(client, workflow, id, Some(agent_id)).await?;
            }
        }
        return Ok(NewSessionOutcome {
            id: id.to_string(),
            agent_id: Some(agent_id.to_string()),
            workflow_name,
        });
    }

    // A workflow pick creates and links an agent named after it. The
    // backend does not attach default tools automatically, so prefetch
    // them best-effort.
    if let Some(workflow) = input.workflow_name.as_deref().filter(|w| !w.is_empty()) {
        let default_tools = match client.agent_tools_list("default").await {
            Ok(tools) => tools,
            Err(err) => {
                tracing::debug!(error = %err, "default toolset prefetch failed");
                Vec::new()
            }
        };
        let created = client
            .agent_create(&AgentDraft {
                name: workflow.to_string(),
                description: Some(String::new()),
                workflow_name: Some(workflow.to_string()),
                tools: default_tools,
            })
            .await?;
        let agent_id = created_agent_id(&created);
        if let Some(agent_id) = &agent_id {
            client.session_agent_link(id, agent_id).await?;
            if input.auto_start {
                start_workflow(client, workflow, id, Some(agent_id)).await?;
            }
        }
        return Ok(NewSessionOutcome {
            id: id.to_string(),
            agent_id,
            workflow_name: Some(workflow.to_string()),
        });
    }

    Ok(NewSessionOutcome {
        id: id.to_string(),
        agent_id: None,
        workflow_name: None,
    })
}

async fn start_workflow(
    client: &ApiClient,
    workflow: &str,
    session_id: &str,
    agent_id: Option<&str>,
) -> Result<Value, ApiError> {
    let mut params = json!({ "query": "", "sessionId": session_id });
    if let Some(agent_id) = agent_id {
        params["agentId"] = agent_id.into();
    }
    client
        .workflows_execute(&ExecuteRequest {
            workflow_name: workflow.to_string(),
            params,
            sync: None,
        })
        .await
}

fn created_agent_id(created: &Value) -> Option<String> {
    let record = created.get("agent").unwrap_or(created);
    record
        .get("id")
        .and_then(Value::as_str)
        .filter(|id| !id.is_empty())
        .map(str::to_string)
}

/// Server-confirmed agent binding for a session, resolved through the
/// fallback chain: explicit mapping, then an agent named after the session.
#[derive(Debug, Clone, Default)]
pub struct SessionAgentConfig {
    pub mapping: Option<SessionAgentMapping>,
    pub agent: Option<AgentRecord>,
    pub workflow_name: Option<String>,
}

pub async fn load_session_agent_config(
    client: &ApiClient,
    session_id: &str,
) -> Result<SessionAgentConfig, ApiError> {
    let mapping = client.session_agent_get(session_id).await?;

    let mut agent = match &mapping {
        Some(mapping) => client.agent_get(&mapping.agent_id).await?,
        None => None,
    };
    if agent.is_none() {
        agent = client.agent_get_by_name(session_id).await?;
    }

    let workflow_name = agent.as_ref().and_then(|a| a.workflow_name.clone());
    Ok(SessionAgentConfig {
        mapping,
        agent,
        workflow_name,
    })
}
