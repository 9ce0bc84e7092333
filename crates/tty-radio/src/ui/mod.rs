//! Interactive terminal UI.  Everything goes through the HTTP API, so the UI
//! works the same against an embedded or a separately started server.

mod app;
mod theme;

use std::io;
use std::time::Duration;

use anyhow::Context;
use ratatui::crossterm::{
    event::{self, Event},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{backend::CrosstermBackend, Terminal};
use tokio::sync::mpsc;
use tracing::{debug, warn};

use tty_radio_proto::client::{ApiClient, ClientError};
use tty_radio_proto::config::Theme;
use tty_radio_proto::protocol::StatusData;

use app::{Action, App};
use theme::Palette;

const STATUS_POLL: Duration = Duration::from_secs(1);
const INPUT_POLL: Duration = Duration::from_millis(200);

type Term = Terminal<CrosstermBackend<io::Stdout>>;

pub async fn run(client: ApiClient, theme: Theme, compact_titles: bool) -> anyhow::Result<()> {
    let stations = client.stations().await.context("Failed to load stations")?;
    let mut app = App::new(stations, Palette::for_theme(theme), compact_titles);
    if let Ok(status) = client.status().await {
        app.set_status(status);
        app.follow_selection();
    }

    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let mut terminal = Terminal::new(CrosstermBackend::new(stdout))?;

    let result = event_loop(&mut terminal, &mut app, &client).await;

    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;
    result
}

async fn event_loop(terminal: &mut Term, app: &mut App, client: &ApiClient) -> anyhow::Result<()> {
    let (tx, mut rx) = mpsc::channel::<Event>(64);
    // Polls with a timeout so the thread ends once the loop drops the receiver.
    tokio::task::spawn_blocking(move || loop {
        match event::poll(INPUT_POLL) {
            Ok(true) => match event::read() {
                Ok(ev) => {
                    if tx.blocking_send(ev).is_err() {
                        break;
                    }
                }
                Err(_) => break,
            },
            Ok(false) if tx.is_closed() => break,
            Ok(false) => {}
            Err(_) => break,
        }
    });

    let mut poll = tokio::time::interval(STATUS_POLL);
    poll.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

    if let Some(action) = app.detail_action() {
        perform(app, client, action).await;
    }

    loop {
        terminal.draw(|f| app.draw(f))?;

        tokio::select! {
            ev = rx.recv() => {
                let Some(ev) = ev else { break };
                if let Event::Key(key) = ev {
                    let mut quit = false;
                    for action in app.handle_key(key) {
                        if action == Action::Quit {
                            quit = true;
                        } else {
                            perform(app, client, action).await;
                        }
                    }
                    if quit {
                        break;
                    }
                }
            }

            _ = poll.tick() => {
                match client.status().await {
                    Ok(status) => {
                        app.set_status(status);
                        if app.error.as_deref() == Some(LOST_SERVER) {
                            app.error = None;
                        }
                    }
                    Err(e) => {
                        debug!("status poll failed: {}", e);
                        if e.is_connection() {
                            app.error = Some(LOST_SERVER.to_string());
                        }
                    }
                }
            }
        }
    }
    Ok(())
}

const LOST_SERVER: &str = "lost connection to server";

/// Carry out one action against the server and fold the result into the UI.
async fn perform(app: &mut App, client: &ApiClient, action: Action) {
    let result = match action {
        Action::PlaySelected => play_selected(app, client).await,
        Action::TogglePause => match &app.status {
            Some(s) if s.is_playing() => client.pause().await,
            _ => client.play(None, None).await,
        },
        Action::Stop => client.stop().await,
        Action::SetVolume(volume) => client.set_volume(volume).await,
        Action::LoadDetail { station, stream } => {
            match client.stream(&station, &stream).await {
                Ok(detail) => {
                    app.details.insert((station, stream), detail);
                }
                Err(e) => debug!("no detail for {}/{}: {}", station, stream, e),
            }
            return;
        }
        Action::Quit => return,
    };

    match result {
        Ok(status) => {
            app.error = None;
            app.set_status(status);
        }
        Err(e) => {
            warn!("UI action failed: {}", e);
            app.error = Some(e.to_string());
        }
    }
}

async fn play_selected(app: &App, client: &ApiClient) -> Result<StatusData, ClientError> {
    let Some((station, stream)) = app.highlighted() else {
        return Err(ClientError::Api("No stream selected".to_string()));
    };
    if let Some(status) = &app.status {
        if status.currently_streaming {
            if status.station.as_deref() == Some(station)
                && status.stream.as_deref() == Some(stream)
                && status.is_playing()
            {
                return Ok(status.clone());
            }
            client.stop().await?;
        }
    }
    client.play(Some(station), Some(stream)).await
}
