mod api;
mod app;
mod config;
mod controller;
mod credentials;
mod directory;
mod email_store;
mod error;
mod models;
mod process;
mod tags;
mod ui;

use crate::api::MailBackend;
use crate::config::Config;
use crate::controller::{Effect, Outcome};
use anyhow::{Context, Result};
use crossterm::{
    event::{Event, EventStream, KeyEventKind},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode},
};
use futures::StreamExt;
use ratatui::Terminal;
use ratatui::backend::CrosstermBackend;
use std::io;
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc::{self, UnboundedSender};
use tracing::{debug, info};

const DEBUG_LOG: &str = "maildesk_debug.log";

fn init_logging() -> Result<()> {
    let file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(DEBUG_LOG)
        .context("Failed to open debug log")?;

    tracing_subscriber::fmt()
        .with_writer(Mutex::new(file))
        .with_ansi(false)
        .with_max_level(tracing::Level::DEBUG)
        .init();
    Ok(())
}

/// Runs each effect on its own task and reports the outcome back to the UI loop.
fn dispatch(effects: Vec<Effect>, backend: &Arc<dyn MailBackend>, tx: &UnboundedSender<Outcome>) {
    for effect in effects {
        debug!(?effect, "Dispatching");
        let backend = backend.clone();
        let tx = tx.clone();
        tokio::spawn(async move {
            let outcome = controller::execute(effect, backend.as_ref()).await;
            let _ = tx.send(outcome);
        });
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args: Vec<String> = std::env::args().collect();
    if args.iter().any(|arg| arg == "--debug") {
        init_logging()?;
    }

    if let Some(pos) = args.iter().position(|arg| arg == "--set-api-key") {
        let key = args
            .get(pos + 1)
            .context("--set-api-key expects a value")?;
        credentials::store_api_key(key)?;
        println!("API key stored in the system keyring.");
        return Ok(());
    }
    if args.iter().any(|arg| arg == "--reset-api-key") {
        credentials::clear_api_key()?;
        println!("API key removed from the system keyring.");
        return Ok(());
    }

    let config = Config::load();
    let (api_key, key_source) = config.resolve_api_key();
    info!(data_source = ?config.api.data_source, ?key_source, "Starting");
    let backend = api::from_settings(&config.api, api_key)?;

    // Setup terminal
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(
        stdout,
        crossterm::terminal::EnterAlternateScreen,
        crossterm::event::EnableMouseCapture
    )?;
    let mut terminal = Terminal::new(CrosstermBackend::new(stdout))?;

    let result = run(&mut terminal, &config, backend).await;

    // Restore terminal
    disable_raw_mode()?;
    execute!(
        terminal.backend_mut(),
        crossterm::terminal::LeaveAlternateScreen,
        crossterm::event::DisableMouseCapture
    )?;
    terminal.show_cursor()?;

    result
}

async fn run(
    terminal: &mut Terminal<CrosstermBackend<io::Stdout>>,
    config: &Config,
    backend: Arc<dyn MailBackend>,
) -> Result<()> {
    let mut app = app::App::new(config);
    let (tx, mut rx) = mpsc::unbounded_channel::<Outcome>();
    let mut events = EventStream::new();

    let startup = app.controller.start();
    dispatch(startup, &backend, &tx);

    while !app.should_quit {
        terminal.draw(|f| ui::render(f, &mut app))?;

        tokio::select! {
            Some(outcome) = rx.recv() => {
                app.controller.apply(outcome);
            }
            maybe_event = events.next() => match maybe_event {
                Some(Ok(Event::Key(key))) if key.kind == KeyEventKind::Press => {
                    let today = chrono::Local::now().date_naive();
                    let effects = app.handle_key(key, today);
                    dispatch(effects, &backend, &tx);
                }
                Some(Ok(Event::Mouse(mouse))) => {
                    let effects = app.handle_mouse(mouse);
                    dispatch(effects, &backend, &tx);
                }
                Some(Ok(_)) => {}
                Some(Err(e)) => return Err(e).context("Failed to read terminal event"),
                None => break,
            },
        }
    }

    Ok(())
}
