use crossterm::event::{KeyCode, KeyEvent};
use flowdeck_api::{
    ApiClient, ApiError, CredMeta, LatestExec, ProducerStartOptions, SortOrder, StopRequest,
    TaskDraft, TaskListQuery,
};
use flowdeck_core::consumer::ConsumerStatus;
use flowdeck_core::context::ContextMessage;
use flowdeck_core::exec::ExecNode;
use flowdeck_core::scroll::{Geometry, HomeEdge, ScrollAnchor, ScrollDecision};
use flowdeck_core::{AgentRecord, Session, TaskBucket, TaskCounts, TaskRecord};
use flowdeck_store::ClientStore;
use flowdeck_sync::{
    generate_session_id, load_session_agent_config, load_task_counts, setup_new_session,
    AuthState, CollapseController, CollapseUpdate, EphemeralSessions, FetchUpdate, Latest,
    NewSessionInput, NewSessionOutcome, PollTargets, PollTick, ProducerControls, ProducerUpdate,
    ResourceFetcher, SessionAgentConfig,
};
use serde_json::Value;
use std::collections::HashMap;
use std::time::Instant;
use tokio::sync::mpsc;

/// Everything delivered back into the select loop by spawned work.
pub enum SyncEvent {
    Sessions(FetchUpdate<Vec<Session>>),
    Messages(FetchUpdate<Vec<ContextMessage>>),
    Tasks(FetchUpdate<Vec<TaskRecord>>),
    TaskCounts(FetchUpdate<TaskCounts>),
    Agents(FetchUpdate<Vec<AgentRecord>>),
    Workflows(FetchUpdate<Vec<String>>),
    Creds(FetchUpdate<Vec<CredMeta>>),
    ExecTrees(FetchUpdate<Vec<ExecNode>>),
    LatestExec(FetchUpdate<Option<LatestExec>>),
    Consumer(FetchUpdate<ConsumerStatus>),
    AgentConfig(FetchUpdate<SessionAgentConfig>),
    GitConfig(FetchUpdate<Value>),
    Producer(ProducerUpdate),
    Collapse(CollapseUpdate),
    SessionCreated(NewSessionOutcome),
    TaskMutated(Result<Value, ApiError>),
    ExecStopped(Result<Value, ApiError>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum View {
    Sessions,
    Agents,
    Integrations,
}

impl View {
    pub fn title(self) -> &'static str {
        match self {
            View::Sessions => "Sessions",
            View::Agents => "Agents",
            View::Integrations => "Integrations",
        }
    }

    fn next(self) -> Self {
        match self {
            View::Sessions => View::Agents,
            View::Agents => View::Integrations,
            View::Integrations => View::Sessions,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InputMode {
    None,
    NewTaskTitle(String),
}

#[derive(Debug, Clone)]
pub struct ConsoleConfig {
    pub user_id: String,
    pub default_workflow: Option<String>,
}

pub struct App {
    pub client: ApiClient,
    pub auth: AuthState,
    pub store: ClientStore,
    pub config: ConsoleConfig,
    pub consumer_id: String,
    tx: mpsc::Sender<SyncEvent>,

    pub sessions: ResourceFetcher<Vec<Session>>,
    pub messages: ResourceFetcher<Vec<ContextMessage>>,
    pub tasks: ResourceFetcher<Vec<TaskRecord>>,
    pub task_counts: ResourceFetcher<TaskCounts>,
    pub agents: ResourceFetcher<Vec<AgentRecord>>,
    pub workflows: ResourceFetcher<Vec<String>>,
    pub creds: ResourceFetcher<Vec<CredMeta>>,
    pub exec_trees: ResourceFetcher<Vec<ExecNode>>,
    pub latest_exec: ResourceFetcher<Option<LatestExec>>,
    pub consumer: ResourceFetcher<ConsumerStatus>,
    pub agent_config: ResourceFetcher<SessionAgentConfig>,
    pub git_config: ResourceFetcher<Value>,
    pub producer: ProducerControls,

    pub ephemeral: EphemeralSessions,
    pub poll_targets: Latest<PollTargets>,

    pub view: View,
    pub input: InputMode,
    pub show_help: bool,
    pub selected_session: Option<String>,
    pub session_index: usize,
    pub agent_index: usize,
    pub task_index: usize,
    pub pending_agent_id: Option<String>,
    pub pending_workflow: Option<String>,
    pub task_filter: Option<TaskBucket>,

    pub transcript_anchor: ScrollAnchor,
    pub transcript_scroll_top: u32,
    transcript_content_height: u32,
    transcript_viewport_height: u32,
    pub tasks_anchor: ScrollAnchor,
    pub tasks_scroll_top: u32,

    pub collapse: HashMap<String, CollapseController>,
    pub collapse_order: Vec<String>,
    pub collapse_index: usize,

    pub status_note: Option<String>,
    pub should_quit: bool,
}

impl App {
    pub fn new(
        client: ApiClient,
        auth: AuthState,
        mut store: ClientStore,
        config: ConsoleConfig,
        tx: mpsc::Sender<SyncEvent>,
    ) -> Self {
        let consumer_id = store.consumer_id().unwrap_or_default();
        let mut ephemeral = EphemeralSessions::new();
        ephemeral.sync_identity(
            Some(config.user_id.as_str()),
            client.config().project_id.as_deref(),
        );
        Self {
            client,
            auth,
            store,
            config,
            consumer_id,
            tx,
            sessions: ResourceFetcher::new("sessions"),
            messages: ResourceFetcher::new("messages"),
            tasks: ResourceFetcher::new("tasks"),
            task_counts: ResourceFetcher::new("task-counts"),
            agents: ResourceFetcher::new("agents"),
            workflows: ResourceFetcher::new("workflows"),
            creds: ResourceFetcher::new("creds"),
            exec_trees: ResourceFetcher::new("exec-trees"),
            latest_exec: ResourceFetcher::new("latest-exec"),
            consumer: ResourceFetcher::new("consumer"),
            agent_config: ResourceFetcher::new("agent-config"),
            git_config: ResourceFetcher::new("git-config"),
            producer: ProducerControls::new(),
            ephemeral,
            poll_targets: Latest::new(PollTargets::default()),
            view: View::Sessions,
            input: InputMode::None,
            show_help: false,
            selected_session: None,
            session_index: 0,
            agent_index: 0,
            task_index: 0,
            pending_agent_id: None,
            pending_workflow: None,
            task_filter: None,
            transcript_anchor: ScrollAnchor::new(HomeEdge::Bottom),
            transcript_scroll_top: 0,
            transcript_content_height: 0,
            transcript_viewport_height: 0,
            tasks_anchor: ScrollAnchor::new(HomeEdge::Top),
            tasks_scroll_top: 0,
            collapse: HashMap::new(),
            collapse_order: Vec::new(),
            collapse_index: 0,
            status_note: None,
            should_quit: false,
        }
    }

    pub fn should_quit(&self) -> bool {
        self.should_quit
    }

    // --- derived state -------------------------------------------------

    /// Merged sidebar list: ephemeral placeholders first, then the server
    /// list as returned.
    pub fn session_rows(&self) -> Vec<Session> {
        let server = self.sessions.data().map(Vec::as_slice).unwrap_or(&[]);
        self.ephemeral.merged(server)
    }

    pub fn running(&self) -> bool {
        self.latest_exec
            .data()
            .and_then(|latest| latest.as_ref())
            .and_then(|latest| latest.status.as_deref())
            .map(|status| normalize_status(status) == "Running")
            .unwrap_or(false)
    }

    pub fn transcript_geometry(&self) -> Geometry {
        Geometry {
            scroll_top: self.transcript_scroll_top,
            scroll_height: self.transcript_content_height,
            client_height: self.transcript_viewport_height,
        }
    }

    /// Called from the renderer once layout is known.
    pub fn record_transcript_viewport(&mut self, content_height: u32, viewport_height: u32) {
        self.transcript_content_height = content_height;
        self.transcript_viewport_height = viewport_height;
        let max_top = content_height.saturating_sub(viewport_height);
        if self.transcript_scroll_top > max_top {
            self.transcript_scroll_top = max_top;
        }
    }

    fn scroll_transcript_home(&mut self) {
        self.transcript_scroll_top = self
            .transcript_content_height
            .saturating_sub(self.transcript_viewport_height);
    }

    // --- fetches -------------------------------------------------------

    pub fn refresh_initial(&mut self) {
        self.refresh_sessions();
        self.refresh_agents();
        self.refresh_workflows();
        self.refresh_creds();
        self.refresh_consumer();
    }

    pub fn refresh_sessions(&mut self) {
        let client = self.client.clone();
        self.sessions.begin(self.tx.clone(), SyncEvent::Sessions, async move {
            client
                .list_sessions(&flowdeck_api::SessionListQuery::default())
                .await
        });
    }

    pub fn refresh_messages(&mut self) {
        let Some(session_id) = self.selected_session.clone() else {
            return;
        };
        let client = self.client.clone();
        self.messages.begin(self.tx.clone(), SyncEvent::Messages, async move {
            client.topic_context(&session_id, None).await
        });
    }

    pub fn refresh_tasks(&mut self) {
        let Some(session_id) = self.selected_session.clone() else {
            return;
        };
        let client = self.client.clone();
        let status = self.task_filter.map(|b| b.query_label().to_string());
        self.tasks.begin(self.tx.clone(), SyncEvent::Tasks, async move {
            client
                .tasks_list_by_session(
                    &session_id,
                    &TaskListQuery {
                        session_id: None,
                        status,
                        limit: Some(100),
                        order: SortOrder::Desc,
                    },
                )
                .await
        });
    }

    pub fn refresh_task_counts(&mut self) {
        let Some(session_id) = self.selected_session.clone() else {
            return;
        };
        let client = self.client.clone();
        self.task_counts
            .begin(self.tx.clone(), SyncEvent::TaskCounts, async move {
                load_task_counts(&client, &session_id).await
            });
    }

    pub fn refresh_agents(&mut self) {
        let client = self.client.clone();
        self.agents.begin(self.tx.clone(), SyncEvent::Agents, async move {
            client.agents_list().await
        });
    }

    pub fn refresh_workflows(&mut self) {
        let client = self.client.clone();
        self.workflows
            .begin(self.tx.clone(), SyncEvent::Workflows, async move {
                client.workflows_list(None).await
            });
    }

    pub fn refresh_creds(&mut self) {
        let client = self.client.clone();
        self.creds.begin(self.tx.clone(), SyncEvent::Creds, async move {
            client.creds_list().await
        });
    }

    pub fn refresh_exec_trees(&mut self) {
        let Some(session_id) = self.selected_session.clone() else {
            return;
        };
        let client = self.client.clone();
        self.exec_trees
            .begin(self.tx.clone(), SyncEvent::ExecTrees, async move {
                client.exec_tree(Some(&session_id), None, false).await
            });
    }

    pub fn refresh_latest_exec(&mut self) {
        let Some(session_id) = self.selected_session.clone() else {
            return;
        };
        let client = self.client.clone();
        self.latest_exec
            .begin(self.tx.clone(), SyncEvent::LatestExec, async move {
                client.exec_status_latest(&session_id, 1).await
            });
    }

    pub fn refresh_consumer(&mut self) {
        let Some(project_id) = self.client.config().project_id.clone() else {
            return;
        };
        let client = self.client.clone();
        let consumer_id = self.consumer_id.clone();
        self.consumer
            .begin(self.tx.clone(), SyncEvent::Consumer, async move {
                client
                    .consumer_lock_status(&project_id, Some(&consumer_id))
                    .await
            });
    }

    pub fn refresh_agent_config(&mut self) {
        let Some(session_id) = self.selected_session.clone() else {
            return;
        };
        let client = self.client.clone();
        self.agent_config
            .begin(self.tx.clone(), SyncEvent::AgentConfig, async move {
                load_session_agent_config(&client, &session_id).await
            });
    }

    pub fn refresh_git_config(&mut self) {
        let Some(project_id) = self.client.config().project_id.clone() else {
            self.status_note = Some("no project selected".to_string());
            return;
        };
        let client = self.client.clone();
        self.git_config
            .begin(self.tx.clone(), SyncEvent::GitConfig, async move {
                client.git_config_get(&project_id).await
            });
    }

    /// One gated poll firing: refresh whatever is currently visible.
    pub fn refresh_for_tick(&mut self, tick: PollTick) {
        if tick.refresh_messages {
            self.refresh_messages();
        }
        if tick.refresh_inline_tasks {
            self.refresh_tasks();
        }
        if tick.refresh_task_counts {
            self.refresh_task_counts();
        }
        if tick.refresh_sessions {
            self.refresh_sessions();
        }
    }

    pub fn update_poll_targets(&self) {
        self.poll_targets.set(PollTargets {
            running: self.running(),
            task_filter_active: self.task_filter.is_some(),
            session_id: self.selected_session.clone(),
        });
    }

    // --- session lifecycle --------------------------------------------

    pub fn activate_session(&mut self, id: String) {
        if self.selected_session.as_deref() == Some(id.as_str()) {
            return;
        }
        self.selected_session = Some(id);
        self.pending_agent_id = None;
        // Key identity changed: forget scroll history and snap on first paint.
        self.transcript_anchor.reset();
        self.tasks_anchor.reset();
        self.transcript_scroll_top = 0;
        self.tasks_scroll_top = 0;
        self.task_index = 0;
        self.collapse.clear();
        self.collapse_order.clear();
        self.collapse_index = 0;
        self.messages.clear();
        self.tasks.clear();
        self.task_counts.clear();
        self.latest_exec.clear();
        self.agent_config.clear();
        self.exec_trees.clear();
        self.refresh_messages();
        if self.task_filter.is_some() {
            self.refresh_tasks();
        }
        self.refresh_task_counts();
        self.refresh_agent_config();
        self.refresh_latest_exec();
        self.update_poll_targets();
    }

    pub fn create_session(&mut self) {
        let id = generate_session_id();
        self.ephemeral.insert_placeholder(&id);
        self.session_index = 0;
        self.activate_session(id.clone());
        let input = NewSessionInput {
            agent_id: self.pending_agent_id.clone(),
            workflow_name: self.pending_workflow.clone(),
            auto_start: true,
        };
        let fallback = self.config.default_workflow.clone();
        let client = self.client.clone();
        let tx = self.tx.clone();
        tokio::spawn(async move {
            let outcome = setup_new_session(&client, &id, &input, fallback.as_deref()).await;
            let _ = tx.send(SyncEvent::SessionCreated(outcome)).await;
        });
    }

    // --- mutations -----------------------------------------------------

    fn create_task(&mut self, title: String) {
        let Some(session_id) = self.selected_session.clone() else {
            return;
        };
        let title = title.trim().to_string();
        if title.is_empty() {
            return;
        }
        let client = self.client.clone();
        let tx = self.tx.clone();
        tokio::spawn(async move {
            let result = client
                .task_create(&TaskDraft {
                    session_id: Some(session_id),
                    title: Some(title),
                    description: None,
                    status: Some("Queued".to_string()),
                })
                .await;
            let _ = tx.send(SyncEvent::TaskMutated(result)).await;
        });
    }

    fn selected_task_id(&self) -> Option<String> {
        self.tasks
            .data()
            .and_then(|tasks| tasks.get(self.task_index))
            .map(|task| task.id.clone())
    }

    fn mark_selected_task_done(&mut self) {
        let Some(id) = self.selected_task_id() else {
            return;
        };
        let client = self.client.clone();
        let tx = self.tx.clone();
        tokio::spawn(async move {
            let result = client.task_status_update(&id, "Done").await;
            let _ = tx.send(SyncEvent::TaskMutated(result)).await;
        });
    }

    fn delete_selected_task(&mut self) {
        let Some(id) = self.selected_task_id() else {
            return;
        };
        let client = self.client.clone();
        let tx = self.tx.clone();
        tokio::spawn(async move {
            let result = client.task_delete(&id).await;
            let _ = tx.send(SyncEvent::TaskMutated(result)).await;
        });
    }

    fn stop_execution(&mut self) {
        let Some(latest) = self.latest_exec.data().and_then(|l| l.clone()) else {
            self.status_note = Some("no execution to stop".to_string());
            return;
        };
        let client = self.client.clone();
        let tx = self.tx.clone();
        tokio::spawn(async move {
            let result = client
                .exec_stop(&StopRequest {
                    exec_id: latest.exec_id,
                    include_descendants: true,
                    workflow: None,
                    workflows: None,
                })
                .await;
            let _ = tx.send(SyncEvent::ExecStopped(result)).await;
        });
    }

    fn toggle_producer(&mut self, start: bool) {
        let client = self.client.clone();
        let tx = self.tx.clone();
        if start {
            self.producer.begin_start(
                client,
                ProducerStartOptions::default(),
                tx,
                SyncEvent::Producer,
            );
        } else {
            self.producer.begin_stop(client, tx, SyncEvent::Producer);
        }
    }

    // --- collapse groups ----------------------------------------------

    /// Transcript groups come from the message stream; keep one controller
    /// per group and feed server-reported state into existing ones.
    fn rebuild_collapse_groups(&mut self) {
        let Some(session_id) = self.selected_session.clone() else {
            return;
        };
        let messages = match self.messages.data() {
            Some(messages) => messages,
            None => return,
        };
        let mut order = Vec::new();
        let mut seen: HashMap<String, bool> = HashMap::new();
        for message in messages {
            let Some(group) = message.raw.get("group").and_then(Value::as_str) else {
                continue;
            };
            let expanded = message
                .raw
                .get("expanded")
                .and_then(Value::as_bool)
                .unwrap_or(false);
            if !seen.contains_key(group) {
                order.push(group.to_string());
            }
            seen.insert(group.to_string(), expanded);
        }
        for (group, expanded) in &seen {
            match self.collapse.get_mut(group) {
                Some(controller) => controller.on_server(*expanded),
                None => {
                    let response_id = None;
                    self.collapse.insert(
                        group.clone(),
                        CollapseController::new(session_id.clone(), group.clone(), response_id, *expanded),
                    );
                }
            }
        }
        self.collapse.retain(|group, _| seen.contains_key(group));
        self.collapse_order = order;
        if self.collapse_index >= self.collapse_order.len() {
            self.collapse_index = self.collapse_order.len().saturating_sub(1);
        }
    }

    pub fn selected_group(&self) -> Option<&str> {
        self.collapse_order
            .get(self.collapse_index)
            .map(String::as_str)
    }

    fn toggle_selected_group(&mut self, now: Instant) {
        let Some(group) = self.selected_group().map(str::to_string) else {
            return;
        };
        if let Some(controller) = self.collapse.get_mut(&group) {
            controller.on_user_toggle(now);
            // Height changed without a scroll event; never auto-scroll over it.
            self.transcript_anchor.note_user_expand();
        }
    }

    /// Drive debounce windows and notice expiry.
    pub fn pump_timers(&mut self, now: Instant) {
        let client = self.client.clone();
        for controller in self.collapse.values_mut() {
            controller.poll(now, &client, self.tx.clone(), SyncEvent::Collapse);
        }
    }

    pub fn collapse_notice_active(&self, now: Instant) -> bool {
        self.collapse
            .values()
            .any(|controller| controller.notice_active(now))
    }

    // --- event application --------------------------------------------

    pub fn apply_sync(&mut self, event: SyncEvent, now: Instant) {
        match event {
            SyncEvent::Sessions(update) => {
                if self.sessions.apply(update) {
                    self.ensure_session_selection();
                }
            }
            SyncEvent::Messages(update) => {
                if self.messages.apply(update) {
                    let count = self.messages.data().map(Vec::len).unwrap_or(0);
                    let geometry = self.transcript_geometry();
                    match self.transcript_anchor.on_item_count(count, geometry) {
                        ScrollDecision::SnapHome | ScrollDecision::ScrollHome => {
                            self.scroll_transcript_home();
                        }
                        ScrollDecision::Stay => {}
                    }
                    self.rebuild_collapse_groups();
                }
            }
            SyncEvent::Tasks(update) => {
                if self.tasks.apply(update) {
                    let count = self.tasks.data().map(Vec::len).unwrap_or(0);
                    let geometry = Geometry {
                        scroll_top: self.tasks_scroll_top,
                        scroll_height: count as u32,
                        client_height: self.transcript_viewport_height,
                    };
                    if self.tasks_anchor.on_item_count(count, geometry) != ScrollDecision::Stay {
                        self.tasks_scroll_top = 0;
                    }
                    let len = self.tasks.data().map(Vec::len).unwrap_or(0);
                    if self.task_index >= len {
                        self.task_index = len.saturating_sub(1);
                    }
                }
            }
            SyncEvent::TaskCounts(update) => {
                self.task_counts.apply(update);
            }
            SyncEvent::Agents(update) => {
                if self.agents.apply(update) {
                    let len = self.agents.data().map(Vec::len).unwrap_or(0);
                    if self.agent_index >= len {
                        self.agent_index = len.saturating_sub(1);
                    }
                }
            }
            SyncEvent::Workflows(update) => {
                self.workflows.apply(update);
            }
            SyncEvent::Creds(update) => {
                self.creds.apply(update);
            }
            SyncEvent::ExecTrees(update) => {
                self.exec_trees.apply(update);
            }
            SyncEvent::LatestExec(update) => {
                if self.latest_exec.apply(update) {
                    self.update_poll_targets();
                }
            }
            SyncEvent::Consumer(update) => {
                self.consumer.apply(update);
            }
            SyncEvent::AgentConfig(update) => {
                self.agent_config.apply(update);
            }
            SyncEvent::GitConfig(update) => {
                self.git_config.apply(update);
            }
            SyncEvent::Producer(update) => {
                self.producer.apply(update);
                self.refresh_consumer();
            }
            SyncEvent::Collapse(update) => {
                let group = update.group.clone();
                if let Some(controller) = self.collapse.get_mut(&group) {
                    if controller.apply(update, now) {
                        self.status_note =
                            Some("Could not update state. Please sign in again.".to_string());
                    }
                }
            }
            SyncEvent::SessionCreated(outcome) => {
                self.pending_agent_id = outcome.agent_id.clone();
                if let Some(workflow) = &outcome.workflow_name {
                    self.status_note = Some(format!("session started on {workflow}"));
                }
                self.refresh_sessions();
                self.refresh_latest_exec();
            }
            SyncEvent::TaskMutated(result) => match result {
                Ok(_) => {
                    self.refresh_tasks();
                    self.refresh_task_counts();
                }
                Err(err) => {
                    self.status_note = Some(format!("task update failed: {err}"));
                }
            },
            SyncEvent::ExecStopped(result) => match result {
                Ok(_) => {
                    self.status_note = Some("stop requested".to_string());
                    self.refresh_latest_exec();
                }
                Err(err) => {
                    self.status_note = Some(format!("stop failed: {err}"));
                }
            },
        }
    }

    /// Auto-select the first session on load; never override an existing
    /// selection, even one absent from the server list (ephemeral ids).
    fn ensure_session_selection(&mut self) {
        let rows = self.session_rows();
        if rows.is_empty() {
            return;
        }
        if self.selected_session.is_none() {
            let id = rows[0].id.clone();
            self.session_index = 0;
            self.activate_session(id);
        } else if let Some(current) = &self.selected_session {
            if let Some(pos) = rows.iter().position(|s| &s.id == current) {
                self.session_index = pos;
            }
        }
    }

    // --- input ---------------------------------------------------------

    pub fn handle_key(&mut self, key: KeyEvent, now: Instant) {
        if let InputMode::NewTaskTitle(buffer) = &mut self.input {
            match key.code {
                KeyCode::Enter => {
                    let title = buffer.clone();
                    self.input = InputMode::None;
                    self.create_task(title);
                }
                KeyCode::Esc => {
                    self.input = InputMode::None;
                }
                KeyCode::Backspace => {
                    buffer.pop();
                }
                KeyCode::Char(c) => {
                    buffer.push(c);
                }
                _ => {}
            }
            return;
        }

        match key.code {
            KeyCode::Char('q') => self.should_quit = true,
            KeyCode::Char('?') => self.show_help = !self.show_help,
            KeyCode::Tab => self.view = self.view.next(),
            KeyCode::Char('r') => {
                self.refresh_sessions();
                self.refresh_messages();
                self.refresh_tasks();
                self.refresh_task_counts();
            }
            KeyCode::Char('j') | KeyCode::Down if self.view == View::Agents => {
                let len = self.agents.data().map(Vec::len).unwrap_or(0);
                if len > 0 {
                    self.agent_index = (self.agent_index + 1).min(len - 1);
                }
            }
            KeyCode::Char('k') | KeyCode::Up if self.view == View::Agents => {
                self.agent_index = self.agent_index.saturating_sub(1);
            }
            KeyCode::Char('j') => self.move_session_selection(1),
            KeyCode::Char('k') => self.move_session_selection(-1),
            KeyCode::Char('J') => self.move_task_selection(1),
            KeyCode::Char('K') => self.move_task_selection(-1),
            KeyCode::Down => self.scroll_transcript(1),
            KeyCode::Up => self.scroll_transcript(-1),
            KeyCode::PageDown => self.scroll_transcript(10),
            KeyCode::PageUp => self.scroll_transcript(-10),
            KeyCode::End => {
                self.scroll_transcript_home();
                self.transcript_anchor.observe_scroll(self.transcript_geometry());
            }
            KeyCode::Char('f') => {
                self.task_filter = next_filter(self.task_filter);
                self.task_index = 0;
                self.tasks_anchor.reset();
                if self.task_filter.is_some() {
                    self.refresh_tasks();
                }
                self.update_poll_targets();
            }
            KeyCode::Char('n') => self.create_session(),
            KeyCode::Char('t') => {
                if self.selected_session.is_some() {
                    self.input = InputMode::NewTaskTitle(String::new());
                }
            }
            KeyCode::Char('d') => self.mark_selected_task_done(),
            KeyCode::Char('D') => self.delete_selected_task(),
            KeyCode::Char('w') => self.cycle_pending_workflow(),
            KeyCode::Char('a') => self.cycle_pending_agent(),
            KeyCode::Char('p') => self.toggle_producer(true),
            KeyCode::Char('P') => self.toggle_producer(false),
            KeyCode::Char('x') => self.stop_execution(),
            KeyCode::Char('c') => self.toggle_selected_group(now),
            KeyCode::Char('[') => {
                self.collapse_index = self.collapse_index.saturating_sub(1);
            }
            KeyCode::Char(']') => {
                if !self.collapse_order.is_empty() {
                    self.collapse_index =
                        (self.collapse_index + 1).min(self.collapse_order.len() - 1);
                }
            }
            KeyCode::Char('e') => self.refresh_exec_trees(),
            KeyCode::Char('G') => self.refresh_git_config(),
            KeyCode::Enter => {
                let rows = self.session_rows();
                if let Some(session) = rows.get(self.session_index) {
                    let id = session.id.clone();
                    self.activate_session(id);
                }
            }
            KeyCode::Esc => {
                self.status_note = None;
                self.show_help = false;
            }
            _ => {}
        }
    }

    fn move_session_selection(&mut self, delta: i32) {
        let len = self.session_rows().len();
        if len == 0 {
            return;
        }
        let next = self.session_index as i32 + delta;
        self.session_index = next.clamp(0, len as i32 - 1) as usize;
    }

    fn move_task_selection(&mut self, delta: i32) {
        let len = self.tasks.data().map(Vec::len).unwrap_or(0);
        if len == 0 {
            return;
        }
        let next = self.task_index as i32 + delta;
        self.task_index = next.clamp(0, len as i32 - 1) as usize;
    }

    fn scroll_transcript(&mut self, delta: i32) {
        let max_top = self
            .transcript_content_height
            .saturating_sub(self.transcript_viewport_height);
        let next = self.transcript_scroll_top as i64 + delta as i64;
        self.transcript_scroll_top = next.clamp(0, max_top as i64) as u32;
        self.transcript_anchor
            .observe_scroll(self.transcript_geometry());
    }

    fn cycle_pending_workflow(&mut self) {
        let Some(workflows) = self.workflows.data() else {
            return;
        };
        if workflows.is_empty() {
            return;
        }
        let next = match &self.pending_workflow {
            None => 0,
            Some(current) => workflows
                .iter()
                .position(|w| w == current)
                .map(|i| (i + 1) % workflows.len())
                .unwrap_or(0),
        };
        self.pending_workflow = Some(workflows[next].clone());
        self.pending_agent_id = None;
        self.status_note = Some(format!("next session workflow: {}", workflows[next]));
    }

    fn cycle_pending_agent(&mut self) {
        let Some(agents) = self.agents.data() else {
            return;
        };
        if agents.is_empty() {
            return;
        }
        let next = match &self.pending_agent_id {
            None => 0,
            Some(current) => agents
                .iter()
                .position(|a| &a.id == current)
                .map(|i| (i + 1) % agents.len())
                .unwrap_or(0),
        };
        self.pending_agent_id = Some(agents[next].id.clone());
        self.pending_workflow = None;
        self.status_note = Some(format!("next session agent: {}", agents[next].name));
    }
}

fn next_filter(current: Option<TaskBucket>) -> Option<TaskBucket> {
    match current {
        None => Some(TaskBucket::Queued),
        Some(TaskBucket::Queued) => Some(TaskBucket::InProgress),
        Some(TaskBucket::InProgress) => Some(TaskBucket::Done),
        Some(TaskBucket::Done) => Some(TaskBucket::Stuck),
        Some(TaskBucket::Stuck) => None,
    }
}

/// Uppercase first letter, lowercase the rest; empty stays empty.
fn normalize_status(status: &str) -> String {
    let trimmed = status.trim();
    let mut chars = trimmed.chars();
    match chars.next() {
        Some(first) => {
            first.to_uppercase().collect::<String>() + &chars.as_str().to_lowercase()
        }
        None => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_normalization_matches_running_check() {
        assert_eq!(normalize_status("RUNNING"), "Running");
        assert_eq!(normalize_status("running "), "Running");
        assert_eq!(normalize_status(""), "");
    }

    #[test]
    fn filter_cycles_through_all_buckets_and_off() {
        let mut filter = None;
        let mut seen = Vec::new();
        for _ in 0..5 {
            filter = next_filter(filter);
            seen.push(filter);
        }
        assert_eq!(seen[0], Some(TaskBucket::Queued));
        assert_eq!(seen[3], Some(TaskBucket::Stuck));
        assert_eq!(seen[4], None);
    }
}
