mod state;
mod theme;
mod ui;

use anyhow::Result;
use clap::Parser;
use crossterm::{
    event::{Event, EventStream, KeyEventKind},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use flowdeck_api::{ApiClient, ApiConfig};
use flowdeck_store::ClientStore;
use flowdeck_sync::{spawn_poller, AuthState, Identity};
use futures_util::StreamExt;
use ratatui::{backend::CrosstermBackend, Terminal};
use state::{App, ConsoleConfig, SyncEvent};
use std::io;
use std::path::PathBuf;
use std::time::{Duration, Instant};
use tokio::sync::mpsc;
use tracing_subscriber::EnvFilter;

const MIN_POLL_MS: u64 = 1_500;
const MAX_POLL_MS: u64 = 10_000;
const TIMER_PUMP_MS: u64 = 100;
const EVENT_QUEUE_CAPACITY: usize = 256;

/// Terminal cockpit for a remote workflow/agent orchestration backend.
#[derive(Parser, Debug)]
#[command(name = "flowdeck", version)]
struct Cli {
    /// API base URL, e.g. https://host/api
    #[arg(long, default_value = "http://127.0.0.1:8787/api")]
    base_url: String,

    /// Bearer token; falls back to $FLOWDECK_TOKEN
    #[arg(long)]
    token: Option<String>,

    /// User id used for the local project shortlist
    #[arg(long, default_value = "local")]
    user: String,

    /// Project id; falls back to the stored selection
    #[arg(long)]
    project: Option<String>,

    /// Content poll period in milliseconds (clamped to 1500..=10000)
    #[arg(long, default_value_t = 10_000)]
    poll_ms: u64,

    /// Consumer-lock poll period in milliseconds
    #[arg(long, default_value_t = 4_000)]
    consumer_poll_ms: u64,

    /// Execution-status poll period in milliseconds
    #[arg(long, default_value_t = 8_000)]
    exec_poll_ms: u64,

    /// Send X-Skip-Auth instead of a bearer token (dev backends)
    #[arg(long)]
    skip_auth: bool,

    /// Log file; without it logs are discarded to keep the screen clean
    #[arg(long)]
    log_file: Option<PathBuf>,

    /// State file override (defaults to the user state directory)
    #[arg(long)]
    state_file: Option<PathBuf>,

    /// Workflow used when creating sessions with no agent or pick
    #[arg(long)]
    default_workflow: Option<String>,
}

fn init_logging(log_file: Option<&PathBuf>) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    match log_file {
        Some(path) => {
            if let Ok(file) = std::fs::File::create(path) {
                let _ = tracing_subscriber::fmt()
                    .with_env_filter(filter)
                    .with_ansi(false)
                    .with_writer(std::sync::Mutex::new(file))
                    .try_init();
            }
        }
        None => {
            let _ = tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_writer(io::sink)
                .try_init();
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.log_file.as_ref());
    tracing::info!(base_url = %cli.base_url, "flowdeck starting");

    let mut store = match &cli.state_file {
        Some(path) => ClientStore::open(path),
        None => ClientStore::open_default(),
    };

    let token = cli
        .token
        .clone()
        .or_else(|| std::env::var("FLOWDECK_TOKEN").ok());
    let project = cli.project.clone().or_else(|| store.selected_project());
    if let Some(project) = &project {
        store.set_selected_project(Some(project.as_str()))?;
        store.remember_project(&cli.user, project)?;
    }

    let auth = AuthState::fixed(token.clone().map(|id_token| Identity {
        user_id: cli.user.clone(),
        id_token,
    }));

    let mut api_config = ApiConfig::new(cli.base_url.clone());
    api_config.id_token = token;
    api_config.skip_auth = cli.skip_auth;
    api_config.project_id = project;
    let client = ApiClient::new(api_config);

    let (tx, mut rx) = mpsc::channel::<SyncEvent>(EVENT_QUEUE_CAPACITY);
    let mut app = App::new(
        client,
        auth,
        store,
        ConsoleConfig {
            user_id: cli.user.clone(),
            default_workflow: cli.default_workflow.clone(),
        },
        tx,
    );
    app.refresh_initial();

    let poll_period = Duration::from_millis(cli.poll_ms.clamp(MIN_POLL_MS, MAX_POLL_MS));
    let (poll_tx, mut poll_rx) = mpsc::channel(8);
    let poller = spawn_poller(poll_period, app.poll_targets.clone(), poll_tx);

    let mut consumer_ticker = tokio::time::interval(Duration::from_millis(
        cli.consumer_poll_ms.max(MIN_POLL_MS),
    ));
    let mut exec_ticker =
        tokio::time::interval(Duration::from_millis(cli.exec_poll_ms.max(MIN_POLL_MS)));
    let mut timer_ticker = tokio::time::interval(Duration::from_millis(TIMER_PUMP_MS));

    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;
    terminal.clear()?;
    let mut events = EventStream::new();

    let result = run_loop(
        &mut terminal,
        &mut app,
        &mut events,
        &mut rx,
        &mut poll_rx,
        &mut consumer_ticker,
        &mut exec_ticker,
        &mut timer_ticker,
    )
    .await;

    poller.abort();
    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;

    result
}

#[allow(clippy::too_many_arguments)]
async fn run_loop(
    terminal: &mut Terminal<CrosstermBackend<io::Stdout>>,
    app: &mut App,
    events: &mut EventStream,
    rx: &mut mpsc::Receiver<SyncEvent>,
    poll_rx: &mut mpsc::Receiver<flowdeck_sync::PollTick>,
    consumer_ticker: &mut tokio::time::Interval,
    exec_ticker: &mut tokio::time::Interval,
    timer_ticker: &mut tokio::time::Interval,
) -> Result<()> {
    loop {
        terminal.draw(|f| ui::render(f, app, Instant::now()))?;

        tokio::select! {
            maybe_event = events.next() => {
                if let Some(Ok(event)) = maybe_event {
                    match event {
                        Event::Key(key)
                            if matches!(key.kind, KeyEventKind::Press | KeyEventKind::Repeat) =>
                        {
                            app.handle_key(key, Instant::now());
                        }
                        Event::Resize(_, _) => {}
                        _ => {}
                    }
                }
            }
            Some(event) = rx.recv() => {
                app.apply_sync(event, Instant::now());
                // Drain whatever else already arrived before redrawing.
                while let Ok(event) = rx.try_recv() {
                    app.apply_sync(event, Instant::now());
                }
            }
            Some(tick) = poll_rx.recv() => {
                app.refresh_for_tick(tick);
            }
            _ = consumer_ticker.tick() => {
                app.refresh_consumer();
            }
            _ = exec_ticker.tick() => {
                // Runs even while "running": this is how the flag clears.
                app.refresh_latest_exec();
            }
            _ = timer_ticker.tick() => {
                app.pump_timers(Instant::now());
            }
        }

        if app.should_quit() {
            break;
        }
    }
    Ok(())
}
