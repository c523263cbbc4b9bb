use crate::state::{App, InputMode, View};
use crate::theme::{self, icons};
use flowdeck_core::exec::ExecForest;
use flowdeck_core::resolve::resolve_agent_workflow;
use flowdeck_core::{AgentRecord, TaskBucket};
use ratatui::{
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Clear, List, ListItem, Paragraph, Wrap},
    Frame,
};
use std::collections::HashMap;
use std::time::Instant;

pub fn render(f: &mut Frame, app: &mut App, now: Instant) {
    let area = f.size();
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(2),
            Constraint::Length(1),
            Constraint::Min(0),
            Constraint::Length(1),
        ])
        .split(area);

    f.render_widget(header(app), chunks[0]);
    f.render_widget(counts_bar(app), chunks[1]);

    match app.view {
        View::Sessions => render_sessions(f, app, chunks[2]),
        View::Agents => render_agents(f, app, chunks[2]),
        View::Integrations => render_integrations(f, app, chunks[2]),
    }

    f.render_widget(footer(app, now), chunks[3]);

    if app.show_help {
        render_help(f, area);
    }
}

fn header(app: &App) -> Paragraph<'static> {
    let project = app
        .client
        .config()
        .project_id
        .clone()
        .unwrap_or_else(|| "-".to_string());
    let consumer = match app.consumer.data() {
        Some(status) if status.locked => {
            let kind = status
                .consumer_type
                .map(|t| t.as_str())
                .unwrap_or("?");
            let owner = if status.owned_by_you { " you" } else { "" };
            format!(
                "{} {kind}{owner} {}s",
                icons::LOCKED,
                status.remaining_ms / 1000
            )
        }
        Some(_) => "unlocked".to_string(),
        None => "-".to_string(),
    };
    let producer = if app.producer.starting() {
        "starting"
    } else if app.producer.stopping() {
        "stopping"
    } else {
        "idle"
    };
    let exec = if app.running() {
        Span::styled(format!("{} running", icons::RUNNING), Style::default().fg(theme::OK))
    } else {
        Span::styled(format!("{} idle", icons::IDLE), Style::default().fg(theme::MUTED))
    };

    let line1 = Line::from(vec![
        Span::styled("Flowdeck", theme::HEADER_STYLE),
        Span::raw("  "),
        Span::styled(app.view.title(), Style::default().fg(theme::ACCENT)),
        Span::raw("  "),
        exec,
    ]);
    let user = app.auth.user_id().unwrap_or_else(|| "anonymous".to_string());
    let line2 = Line::from(vec![
        Span::styled(format!("user {user}"), Style::default().fg(theme::MUTED)),
        Span::raw("  "),
        Span::styled(format!("project {project}"), Style::default().fg(theme::MUTED)),
        Span::raw("  "),
        Span::styled(format!("lock {consumer}"), Style::default().fg(theme::MUTED)),
        Span::raw("  "),
        Span::styled(format!("producer {producer}"), Style::default().fg(theme::MUTED)),
    ]);
    Paragraph::new(vec![line1, line2])
}

fn counts_bar(app: &App) -> Paragraph<'static> {
    let counts = app.task_counts.data().copied().unwrap_or_default();
    let mut spans = Vec::new();
    for bucket in TaskBucket::ALL {
        let marker = if app.task_filter == Some(bucket) { "*" } else { " " };
        spans.push(Span::styled(
            format!("{marker}{} {} ", bucket.query_label(), counts.get(bucket)),
            Style::default().fg(theme::bucket_color(bucket)),
        ));
    }
    if let Some(err) = app.task_counts.error() {
        spans.push(Span::styled(
            format!(" counts stale: {err}"),
            Style::default().fg(theme::WARN),
        ));
    }
    Paragraph::new(Line::from(spans))
}

fn render_sessions(f: &mut Frame, app: &mut App, area: Rect) {
    let panes = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(32), Constraint::Percentage(68)])
        .split(area);

    render_session_list(f, app, panes[0]);
    if app.task_filter.is_some() {
        render_task_list(f, app, panes[1]);
    } else {
        render_transcript(f, app, panes[1]);
    }
}

fn render_session_list(f: &mut Frame, app: &App, area: Rect) {
    let rows = app.session_rows();
    let server_ids: Vec<&str> = app
        .sessions
        .data()
        .map(|sessions| sessions.iter().map(|s| s.id.as_str()).collect())
        .unwrap_or_default();

    let items: Vec<ListItem> = rows
        .iter()
        .enumerate()
        .map(|(idx, session)| {
            let ephemeral = !server_ids.contains(&session.id.as_str());
            let marker = if ephemeral { icons::EPHEMERAL } else { " " };
            let selected_now = app.selected_session.as_deref() == Some(session.id.as_str());
            let mut style = if idx == app.session_index {
                theme::SELECTED_STYLE
            } else if ephemeral {
                Style::default().fg(theme::EPHEMERAL)
            } else {
                Style::default().fg(theme::TEXT)
            };
            if selected_now && idx != app.session_index {
                style = style.add_modifier(Modifier::BOLD);
            }
            ListItem::new(Line::from(format!(
                "{marker} {}",
                ellipsize(&session.title, area.width.saturating_sub(4) as usize)
            )))
            .style(style)
        })
        .collect();

    let title = if app.sessions.loading() {
        "Sessions (loading)"
    } else {
        "Sessions"
    };
    let mut block = Block::default()
        .borders(Borders::ALL)
        .title(title)
        .border_style(Style::default().fg(theme::BORDER));
    if app.sessions.error().is_some() {
        block = block.border_style(Style::default().fg(theme::CRITICAL));
    }
    let inner = block.inner(area);
    f.render_widget(block, area);

    if let Some(err) = app.sessions.error() {
        // Primary-content failure: persistent inline banner, stale rows stay.
        let banner_height = 2.min(inner.height);
        let banner = Rect {
            height: banner_height,
            ..inner
        };
        f.render_widget(
            Paragraph::new(err.to_string())
                .style(Style::default().fg(theme::CRITICAL))
                .wrap(Wrap { trim: true }),
            banner,
        );
        let rest = Rect {
            y: inner.y + banner_height,
            height: inner.height.saturating_sub(banner_height),
            ..inner
        };
        f.render_widget(List::new(items), rest);
    } else {
        f.render_widget(List::new(items), inner);
    }
}

fn render_transcript(f: &mut Frame, app: &mut App, area: Rect) {
    let block = Block::default()
        .borders(Borders::ALL)
        .title("Transcript")
        .border_style(Style::default().fg(theme::BORDER));
    let inner = block.inner(area);
    f.render_widget(block, area);

    let lines = transcript_lines(app, inner.width as usize);
    app.record_transcript_viewport(lines.len() as u32, inner.height as u32);

    let top = app.transcript_scroll_top as usize;
    let visible: Vec<Line> = lines
        .into_iter()
        .skip(top)
        .take(inner.height as usize)
        .collect();
    f.render_widget(Paragraph::new(visible), inner);
}

fn transcript_lines(app: &App, width: usize) -> Vec<Line<'static>> {
    let mut lines = Vec::new();
    if let Some(err) = app.messages.error() {
        lines.push(Line::from(Span::styled(
            format!("transcript stale: {err}"),
            Style::default().fg(theme::WARN),
        )));
    }
    let Some(messages) = app.messages.data() else {
        if app.messages.loading() {
            lines.push(Line::from(Span::styled(
                "loading...",
                Style::default().fg(theme::MUTED),
            )));
        }
        return lines;
    };

    let mut rendered_groups: HashMap<String, usize> = HashMap::new();
    for message in messages {
        let group = message
            .raw
            .get("group")
            .and_then(serde_json::Value::as_str)
            .map(str::to_string);

        if let Some(group) = group {
            let expanded = app
                .collapse
                .get(&group)
                .map(|c| c.expanded())
                .unwrap_or(false);
            let count = rendered_groups.entry(group.clone()).or_insert(0);
            *count += 1;
            if *count == 1 {
                let chevron = if expanded { icons::EXPANDED } else { icons::COLLAPSED };
                let selected = app.selected_group() == Some(group.as_str());
                let style = if selected {
                    Style::default().fg(theme::ACCENT).add_modifier(Modifier::BOLD)
                } else {
                    Style::default().fg(theme::MUTED)
                };
                lines.push(Line::from(Span::styled(format!("{chevron} [{group}]"), style)));
            }
            if !expanded {
                continue;
            }
        }

        let role = message.role.clone();
        let content = message
            .content
            .clone()
            .unwrap_or_default()
            .replace('\n', " ");
        let text = ellipsize(&format!("{role}: {content}"), width.saturating_sub(1));
        lines.push(Line::from(Span::styled(
            text,
            Style::default().fg(theme::role_color(&role)),
        )));
    }
    lines
}

fn render_task_list(f: &mut Frame, app: &App, area: Rect) {
    let filter = app
        .task_filter
        .map(|b| b.query_label())
        .unwrap_or("All");
    let title = format!("Tasks: {filter}");
    let block = Block::default()
        .borders(Borders::ALL)
        .title(title)
        .border_style(Style::default().fg(theme::BORDER));
    let inner = block.inner(area);
    f.render_widget(block, area);

    if let Some(err) = app.tasks.error() {
        f.render_widget(
            Paragraph::new(err.to_string())
                .style(Style::default().fg(theme::CRITICAL))
                .wrap(Wrap { trim: true }),
            inner,
        );
        return;
    }

    let tasks = app.tasks.data().map(Vec::as_slice).unwrap_or(&[]);
    let items: Vec<ListItem> = tasks
        .iter()
        .enumerate()
        .map(|(idx, task)| {
            let bucket = task.bucket();
            let color = bucket.map(theme::bucket_color).unwrap_or(theme::MUTED);
            let status = task.status.as_deref().unwrap_or("-");
            let title = task.title.as_deref().unwrap_or(&task.id);
            let style = if idx == app.task_index {
                theme::SELECTED_STYLE
            } else {
                Style::default().fg(color)
            };
            ListItem::new(Line::from(format!("[{status}] {title}"))).style(style)
        })
        .collect();
    f.render_widget(List::new(items), inner);
}

fn render_agents(f: &mut Frame, app: &App, area: Rect) {
    let panes = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Min(0), Constraint::Length(3)])
        .split(area);

    let block = Block::default()
        .borders(Borders::ALL)
        .title("Agents")
        .border_style(Style::default().fg(theme::BORDER));
    let inner = block.inner(panes[0]);
    f.render_widget(block, panes[0]);

    if let Some(err) = app.agents.error() {
        f.render_widget(
            Paragraph::new(err.to_string()).style(Style::default().fg(theme::CRITICAL)),
            inner,
        );
    } else {
        let agents = app.agents.data().map(Vec::as_slice).unwrap_or(&[]);
        let items: Vec<ListItem> = agents
            .iter()
            .enumerate()
            .map(|(idx, agent)| {
                let workflow = agent.workflow_name.as_deref().unwrap_or("-");
                let pending = app.pending_agent_id.as_deref() == Some(agent.id.as_str());
                let marker = if pending { "*" } else { " " };
                let style = if idx == app.agent_index {
                    theme::SELECTED_STYLE
                } else {
                    Style::default().fg(theme::TEXT)
                };
                ListItem::new(Line::from(format!(
                    "{marker} {}  wf:{workflow}  tools:{}",
                    agent.name,
                    agent.tools.len()
                )))
                .style(style)
            })
            .collect();
        f.render_widget(List::new(items), inner);
    }

    // Resolution line for the selected session.
    let resolution = {
        let agents_by_id: HashMap<String, AgentRecord> = app
            .agents
            .data()
            .map(|agents| {
                agents
                    .iter()
                    .map(|a| (a.id.clone(), a.clone()))
                    .collect()
            })
            .unwrap_or_default();
        let rows = app.session_rows();
        let session = app
            .selected_session
            .as_deref()
            .and_then(|id| rows.iter().find(|s| s.id == id));
        let resolved = resolve_agent_workflow(
            app.pending_agent_id.as_deref(),
            session,
            &agents_by_id,
        );
        match resolved.workflow_name {
            Some(workflow) => format!(
                "selected session would run: {workflow} (agent {})",
                resolved.agent_id.as_deref().unwrap_or("-")
            ),
            None => "selected session cannot execute (no workflow)".to_string(),
        }
    };
    f.render_widget(
        Paragraph::new(resolution)
            .style(Style::default().fg(theme::MUTED))
            .block(Block::default().borders(Borders::ALL).title("Resolution")),
        panes[1],
    );
}

fn render_integrations(f: &mut Frame, app: &App, area: Rect) {
    let panes = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(40), Constraint::Percentage(60)])
        .split(area);

    let creds_block = Block::default()
        .borders(Borders::ALL)
        .title("Credentials")
        .border_style(Style::default().fg(theme::BORDER));
    let creds_inner = creds_block.inner(panes[0]);
    f.render_widget(creds_block, panes[0]);
    if let Some(err) = app.creds.error() {
        f.render_widget(
            Paragraph::new(err.to_string()).style(Style::default().fg(theme::CRITICAL)),
            creds_inner,
        );
    } else {
        let creds = app.creds.data().map(Vec::as_slice).unwrap_or(&[]);
        let mut items: Vec<ListItem> = creds
            .iter()
            .map(|cred| {
                let last4 = cred.last4.as_deref().unwrap_or("????");
                ListItem::new(Line::from(format!("{}  ****{last4}", cred.provider)))
                    .style(Style::default().fg(theme::TEXT))
            })
            .collect();
        let shortlist = app.store.shortlist(&app.config.user_id);
        if !shortlist.is_empty() {
            items.push(ListItem::new(Line::from(Span::styled(
                format!("recent projects: {}", shortlist.join(", ")),
                Style::default().fg(theme::MUTED),
            ))));
        }
        f.render_widget(List::new(items), creds_inner);
    }

    let right = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Percentage(50), Constraint::Percentage(50)])
        .split(panes[1]);

    let git_block = Block::default()
        .borders(Borders::ALL)
        .title("Git config (G to load)")
        .border_style(Style::default().fg(theme::BORDER));
    let git_inner = git_block.inner(right[0]);
    f.render_widget(git_block, right[0]);
    let git_text = if let Some(err) = app.git_config.error() {
        err.to_string()
    } else {
        app.git_config
            .data()
            .map(|cfg| serde_json::to_string_pretty(cfg).unwrap_or_default())
            .unwrap_or_else(|| "-".to_string())
    };
    f.render_widget(
        Paragraph::new(git_text)
            .style(Style::default().fg(theme::MUTED))
            .wrap(Wrap { trim: true }),
        git_inner,
    );

    let exec_block = Block::default()
        .borders(Borders::ALL)
        .title("Execution forest (e to load)")
        .border_style(Style::default().fg(theme::BORDER));
    let exec_inner = exec_block.inner(right[1]);
    f.render_widget(exec_block, right[1]);
    let nodes = app.exec_trees.data().map(Vec::as_slice).unwrap_or(&[]);
    let forest = ExecForest::build(nodes);
    let mut lines = vec![Line::from(Span::styled(
        format!("{} nodes, {} roots", nodes.len(), forest.roots.len()),
        Style::default().fg(theme::MUTED),
    ))];
    for root in forest.roots.iter().take(exec_inner.height.saturating_sub(1) as usize) {
        let node = &nodes[*root];
        lines.push(Line::from(format!(
            "{}  children:{}",
            node.id,
            forest.children_of(&node.id).len()
        )));
    }
    f.render_widget(Paragraph::new(lines), exec_inner);
}

fn footer(app: &App, now: Instant) -> Paragraph<'static> {
    if let InputMode::NewTaskTitle(buffer) = &app.input {
        return Paragraph::new(Line::from(vec![
            Span::styled("new task: ", Style::default().fg(theme::ACCENT)),
            Span::raw(buffer.clone()),
            Span::styled("_", Style::default().fg(theme::ACCENT)),
        ]));
    }
    if app.collapse_notice_active(now) {
        return Paragraph::new(Span::styled(
            "Could not update state. Please sign in again.",
            Style::default().fg(theme::WARN),
        ));
    }
    if let Some(err) = app.producer.error() {
        return Paragraph::new(Span::styled(
            format!("producer: {err}"),
            Style::default().fg(theme::CRITICAL),
        ));
    }
    if let Some(note) = &app.status_note {
        return Paragraph::new(Span::styled(
            note.clone(),
            Style::default().fg(theme::MUTED),
        ));
    }
    Paragraph::new(Span::styled(
        "q quit  ? help  Tab view  j/k session  f filter  n new  r reload",
        Style::default().fg(theme::MUTED),
    ))
}

fn render_help(f: &mut Frame, area: Rect) {
    let width = 52.min(area.width);
    let height = 20.min(area.height);
    let popup = Rect {
        x: area.x + (area.width.saturating_sub(width)) / 2,
        y: area.y + (area.height.saturating_sub(height)) / 2,
        width,
        height,
    };
    f.render_widget(Clear, popup);

    let block = Block::default()
        .borders(Borders::ALL)
        .title("Help")
        .border_style(Style::default().fg(Color::Yellow));
    let inner = block.inner(popup);
    f.render_widget(block, popup);

    let entries = [
        ("j / k", "select session"),
        ("Enter", "open session"),
        ("Up / Down", "scroll transcript"),
        ("End", "jump to newest"),
        ("f", "cycle task filter"),
        ("J / K", "select task"),
        ("t", "new task"),
        ("d / D", "task done / delete"),
        ("n", "new session"),
        ("w / a", "pick workflow / agent"),
        ("c", "collapse group"),
        ("[ / ]", "select group"),
        ("p / P", "producer start / stop"),
        ("x", "stop execution"),
        ("e / G", "exec forest / git config"),
        ("r", "reload"),
        ("Tab", "switch view"),
        ("q", "quit"),
    ];
    let mut text = Vec::new();
    for (key, desc) in entries {
        text.push(Line::from(vec![
            Span::styled(format!("{key:<10}"), Style::default().fg(Color::Cyan)),
            Span::raw(desc),
        ]));
    }
    f.render_widget(Paragraph::new(text).wrap(Wrap { trim: true }), inner);
}

fn ellipsize(text: &str, max: usize) -> String {
    if max == 0 {
        return String::new();
    }
    if text.chars().count() <= max {
        return text.to_string();
    }
    let mut out: String = text.chars().take(max.saturating_sub(1)).collect();
    out.push('…');
    out
}
