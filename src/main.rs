use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use crossterm::event::{self, Event, KeyEventKind};
use serde::Serialize;
use std::fs::{self, File};
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::{mpsc, Notify};
use tracing::info;
use tracing_subscriber::EnvFilter;

mod actions;
mod app;
mod collector;

use actions::Action;
use app::App;
use collector::Detectors;
use hostwatch::inventory::process_snapshot;
use hostwatch::Config;

#[derive(Parser)]
#[command(name = "hostwatch", version, about = "Inspect SSH, tmux, git and processes on this host")]
struct Cli {
    /// Config file (defaults to $XDG_CONFIG_HOME/hostwatch/config.json)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Workspace root scanned for git repositories and recent files
    #[arg(long, global = true)]
    root: Option<PathBuf>,

    /// Number of recent files to report
    #[arg(long, global = true)]
    limit: Option<usize>,

    /// Skip dot-files and dot-directories in the recent files view
    #[arg(long, global = true)]
    exclude_hidden: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Interactive terminal dashboard (default)
    Dashboard,
    /// Inet sockets with their owning processes
    Connections,
    /// Detailed snapshot of one process
    Process { pid: u32 },
    /// SSH daemon status and established sessions
    Ssh,
    /// tmux server, sessions and clients
    Tmux,
    /// Status of every git repository under the workspace root
    Git,
    /// Zombie processes
    Zombies,
    /// System uptime
    Uptime,
    /// Most recently modified files under the workspace root
    Recent,
    /// Listening TCP servers and whether they speak HTTP
    Servers,
}

impl Cli {
    fn config(&self) -> Config {
        let mut config = Config::load(self.config.as_deref());
        if let Some(root) = &self.root {
            config.workspace_root = root.clone();
        }
        if let Some(limit) = self.limit {
            config.recent_limit = limit;
        }
        if self.exclude_hidden {
            config.exclude_hidden = true;
        }
        config
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let command = cli.command.as_ref().unwrap_or(&Commands::Dashboard);

    // Initialize logging
    let filter =
        EnvFilter::from_default_env().add_directive(tracing::Level::INFO.into());
    if matches!(command, Commands::Dashboard) {
        let log_path = log_file_path();
        if let Some(dir) = log_path.parent() {
            fs::create_dir_all(dir)
                .with_context(|| format!("creating log directory {}", dir.display()))?;
        }
        let file = File::create(&log_path)
            .with_context(|| format!("creating log file {}", log_path.display()))?;
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_ansi(false)
            .with_writer(Mutex::new(file))
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .init();
    }

    let detectors = Detectors::new(cli.config());
    match command {
        Commands::Dashboard => run_dashboard(detectors).await,
        Commands::Connections => print_json(&detectors.inventory.inet_connections()?),
        Commands::Process { pid } => print_json(&process_snapshot(*pid).await?),
        Commands::Ssh => print_json(&detectors.ssh.get_status().await),
        Commands::Tmux => print_json(&detectors.tmux.get_status().await),
        Commands::Git => {
            print_json(&detectors.git.scan_all(&detectors.config.workspace_root).await)
        }
        Commands::Zombies => print_json(&hostwatch::zombie::scan(detectors.inventory.as_ref())),
        Commands::Uptime => print_json(&hostwatch::uptime::get_uptime(
            detectors.inventory.as_ref(),
        )?),
        Commands::Recent => print_json(&hostwatch::recent::get_recent_files(
            &detectors.config.workspace_root,
            detectors.config.recent_limit,
            detectors.config.exclude_hidden,
        )),
        Commands::Servers => {
            let servers = hostwatch::servers::build_server_list(
                detectors.inventory.as_ref(),
                &[std::process::id()],
                detectors.config.probe_timeout(),
            )
            .await?;
            print_json(&servers)
        }
    }
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn log_file_path() -> PathBuf {
    dirs::state_dir()
        .or_else(dirs::cache_dir)
        .unwrap_or_else(std::env::temp_dir)
        .join("hostwatch")
        .join("hostwatch.log")
}

async fn run_dashboard(detectors: Detectors) -> Result<()> {
    let refresh_interval = detectors.config.refresh_interval();
    info!(?refresh_interval, root = %detectors.config.workspace_root.display(), "starting dashboard");

    // Create event channel
    let (tx, mut rx) = mpsc::unbounded_channel::<Action>();
    let refresh = Arc::new(Notify::new());

    // Initialize terminal
    let mut terminal = ratatui::init();

    // Spawn input handler
    let input_tx = tx.clone();
    tokio::spawn(async move {
        loop {
            if event::poll(Duration::from_millis(100)).unwrap_or(false) {
                if let Ok(Event::Key(key)) = event::read() {
                    if key.kind == KeyEventKind::Press {
                        let _ = input_tx.send(Action::KeyPress(key));
                    }
                }
            }
        }
    });

    // Spawn snapshot poller
    let poll_tx = tx.clone();
    let poll_refresh = refresh.clone();
    tokio::spawn(async move {
        loop {
            let snapshot = detectors.collect().await;
            if poll_tx.send(Action::SnapshotUpdated(Box::new(snapshot))).is_err() {
                break;
            }
            tokio::select! {
                _ = tokio::time::sleep(refresh_interval) => {}
                _ = poll_refresh.notified() => {}
            }
        }
    });

    // Create app state
    let mut app = App::new();

    // Main event loop
    let result = loop {
        // Render
        if let Err(e) = terminal.draw(|f| app.render(f)) {
            break Err(e.into());
        }

        // Process any pending actions from the app
        for pending_action in app.take_pending_actions() {
            if let Action::Refresh = pending_action {
                refresh.notify_one();
            }
        }

        // Handle events from channel
        match rx.recv().await {
            Some(action) => match app.handle_action(action) {
                Ok(true) => break Ok(()),
                Ok(false) => {}
                Err(e) => break Err(e),
            },
            None => break Ok(()),
        }
    };

    // Restore terminal
    ratatui::restore();
    result
}
