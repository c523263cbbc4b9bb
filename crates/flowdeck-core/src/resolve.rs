use crate::{AgentRecord, Session};
use std::collections::HashMap;

/// Outcome of the workflow resolution chain. A `None` workflow name means
/// the session cannot execute anything.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkflowResolution {
    pub agent_id: Option<String>,
    pub workflow_name: Option<String>,
}

/// Resolve which workflow a session would execute.
///
/// Precedence: an explicit pending agent choice overrides the
/// server-confirmed `session.agent_id`; a known agent's non-empty
/// `workflow_name` beats the session's own fallback name. Pure over its
/// three inputs.
pub fn resolve_agent_workflow(
    pending_agent_id: Option<&str>,
    session: Option<&Session>,
    agents_by_id: &HashMap<String, AgentRecord>,
) -> WorkflowResolution {
    let agent_id = pending_agent_id
        .map(str::to_string)
        .or_else(|| session.and_then(|s| s.agent_id.clone()));

    let from_agent = agent_id
        .as_deref()
        .and_then(|id| agents_by_id.get(id))
        .and_then(|rec| rec.workflow_name.as_deref())
        .map(str::trim)
        .filter(|name| !name.is_empty())
        .map(str::to_string);

    if from_agent.is_some() {
        return WorkflowResolution {
            agent_id,
            workflow_name: from_agent,
        };
    }

    let fallback = session
        .and_then(|s| s.workflow_name.as_deref())
        .map(str::trim)
        .filter(|name| !name.is_empty())
        .map(str::to_string);

    WorkflowResolution {
        agent_id,
        workflow_name: fallback,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn agent(id: &str, workflow: Option<&str>) -> AgentRecord {
        AgentRecord {
            id: id.to_string(),
            name: id.to_string(),
            description: None,
            workflow_name: workflow.map(str::to_string),
            tools: Vec::new(),
        }
    }

    fn session(agent_id: Option<&str>, workflow: Option<&str>) -> Session {
        Session {
            id: "sess".to_string(),
            title: "sess".to_string(),
            updated_at: None,
            agent_id: agent_id.map(str::to_string),
            workflow_name: workflow.map(str::to_string),
        }
    }

    #[test]
    fn session_workflow_is_used_when_no_agent_matches() {
        let sess = session(Some("a1"), Some("W"));
        let resolved = resolve_agent_workflow(None, Some(&sess), &HashMap::new());
        assert_eq!(resolved.agent_id.as_deref(), Some("a1"));
        assert_eq!(resolved.workflow_name.as_deref(), Some("W"));
    }

    #[test]
    fn pending_agent_workflow_takes_precedence() {
        let mut agents = HashMap::new();
        agents.insert("a2".to_string(), agent("a2", Some("agent-flow")));
        let sess = session(Some("a1"), Some("session-flow"));
        let resolved = resolve_agent_workflow(Some("a2"), Some(&sess), &agents);
        assert_eq!(resolved.agent_id.as_deref(), Some("a2"));
        assert_eq!(resolved.workflow_name.as_deref(), Some("agent-flow"));
    }

    #[test]
    fn blank_agent_workflow_falls_back_to_session() {
        let mut agents = HashMap::new();
        agents.insert("a1".to_string(), agent("a1", Some("   ")));
        let sess = session(Some("a1"), Some("fallback-flow"));
        let resolved = resolve_agent_workflow(None, Some(&sess), &agents);
        assert_eq!(resolved.workflow_name.as_deref(), Some("fallback-flow"));
    }

    #[test]
    fn nothing_resolvable_yields_none() {
        let resolved = resolve_agent_workflow(None, None, &HashMap::new());
        assert_eq!(resolved.agent_id, None);
        assert_eq!(resolved.workflow_name, None);
    }

    #[test]
    fn pending_id_is_kept_even_without_a_workflow() {
        let sess = session(Some("a1"), None);
        let resolved = resolve_agent_workflow(Some("a9"), Some(&sess), &HashMap::new());
        assert_eq!(resolved.agent_id.as_deref(), Some("a9"));
        assert_eq!(resolved.workflow_name, None);
    }
}
