mod app;
mod board;
mod config;
mod docker;
mod filter;
mod loader;
mod notice;
mod page;
mod poll;
mod scope;
#[cfg(test)]
mod testing;
mod theme;
mod ui;

use anyhow::{Context, Result};
use clap::Parser;
use crossterm::{
    event::{Event, EventStream, KeyEventKind},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use futures_util::StreamExt;
use notify::{RecommendedWatcher, RecursiveMode, Watcher};
use ratatui::{backend::CrosstermBackend, Terminal};
use std::{
    fs::OpenOptions,
    io,
    path::{Path, PathBuf},
    sync::{Arc, Mutex},
};
use tokio::sync::mpsc;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use crate::app::App;
use crate::config::{parse_bool_flag, Args, Config};
use crate::docker::DockerControlPlane;

#[tokio::main]
async fn main() -> Result<()> {
    let config = Config::from_args(Args::parse());
    init_logging();
    info!(
        event = "console_starting",
        config_path = %config.config_path.display(),
        poll_ms = config.poll_interval.as_millis() as u64,
        timeout_secs = config.request_timeout.as_secs()
    );

    let plane = Arc::new(DockerControlPlane::new(
        config.docker_bin.clone(),
        config.managed_label.clone(),
        config.config_path.clone(),
    ));
    let (watcher, watch_rx) = setup_watcher(&config.config_path);
    let mut terminal = setup_terminal().context("failed to initialise terminal")?;
    let mut app = App::new(plane, config.page_settings());
    if watcher.is_none() {
        app.status_note = Some(format!(
            "not watching {}; press r to reload",
            config.config_path.display()
        ));
    }

    let result = run_app(&mut terminal, &mut app, watch_rx).await;
    restore_terminal(&mut terminal)?;
    drop(watcher);
    result
}

fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let stdout_enabled = std::env::var("FLEET_LOG_STDOUT")
        .ok()
        .and_then(|value| parse_bool_flag(&value))
        .unwrap_or(false);
    if stdout_enabled {
        let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();
        return;
    }
    if let Some(path) = std::env::var_os("FLEET_LOG_FILE").filter(|value| !value.is_empty()) {
        if let Ok(file) = OpenOptions::new().create(true).append(true).open(&path) {
            let _ = tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_ansi(false)
                .with_writer(Mutex::new(file))
                .try_init();
            return;
        }
    }
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::sink)
        .try_init();
}

fn setup_terminal() -> Result<Terminal<CrosstermBackend<io::Stdout>>> {
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;
    terminal.clear()?;
    Ok(terminal)
}

fn restore_terminal(terminal: &mut Terminal<CrosstermBackend<io::Stdout>>) -> Result<()> {
    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;
    Ok(())
}

async fn run_app(
    terminal: &mut Terminal<CrosstermBackend<io::Stdout>>,
    app: &mut App,
    mut watch_rx: Option<mpsc::Receiver<()>>,
) -> Result<()> {
    let mut events = EventStream::new();

    loop {
        if app.take_redraw() {
            terminal.draw(|f| ui::render(f, app))?;
        }

        tokio::select! {
            wake = app.next_wake() => {
                app.handle_wake(wake);
            }
            Some(()) = recv_change(&mut watch_rx) => {
                app.on_config_changed();
            }
            maybe_event = events.next() => {
                match maybe_event {
                    Some(Ok(Event::Key(key))) => {
                        if matches!(key.kind, KeyEventKind::Press | KeyEventKind::Repeat) {
                            app.handle_key(key);
                        }
                    }
                    Some(Ok(Event::Resize(_, _))) => app.mark_dirty(),
                    Some(Ok(_)) => {}
                    Some(Err(err)) => warn!(event = "terminal_event_failed", error = %err),
                    None => break,
                }
            }
        }

        if app.should_quit() {
            break;
        }
    }

    info!(event = "console_stopping");
    Ok(())
}

async fn recv_change(watch_rx: &mut Option<mpsc::Receiver<()>>) -> Option<()> {
    match watch_rx.as_mut() {
        Some(rx) => rx.recv().await,
        None => std::future::pending().await,
    }
}

/// Watches the directory holding the configured-servers file; events for
/// other files are dropped.
fn setup_watcher(config_path: &Path) -> (Option<RecommendedWatcher>, Option<mpsc::Receiver<()>>) {
    let Some(dir) = config_path.parent().filter(|dir| dir.exists()) else {
        warn!(event = "config_watch_skipped", path = %config_path.display());
        return (None, None);
    };
    let (tx, rx) = mpsc::channel(1);
    let target: PathBuf = config_path.to_path_buf();
    let watcher = RecommendedWatcher::new(
        move |res: notify::Result<notify::Event>| {
            if let Ok(event) = res {
                if event.paths.iter().any(|path| path.file_name() == target.file_name()) {
                    let _ = tx.try_send(());
                }
            }
        },
        notify::Config::default(),
    );
    let mut watcher = match watcher {
        Ok(watcher) => watcher,
        Err(err) => {
            warn!(event = "config_watch_failed", error = %err);
            return (None, None);
        }
    };
    if let Err(err) = watcher.watch(dir, RecursiveMode::NonRecursive) {
        warn!(event = "config_watch_failed", error = %err);
        return (None, None);
    }
    (Some(watcher), Some(rx))
}
