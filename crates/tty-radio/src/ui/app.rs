//! UI state, key bindings and drawing.
//!
//! `App` holds only what the screen needs: the station list, the cursor and
//! the last status polled from the server.  Keys become [`Action`]s; the ones
//! that need the server are carried out by the event loop in `ui::run`.

use std::collections::HashMap;

use chrono::{DateTime, Local};
use ratatui::crossterm::event::{KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use ratatui::{
    layout::{Constraint, Direction, Layout, Rect},
    text::{Line, Span},
    widgets::{Block, Borders, List, ListItem, ListState, Paragraph, Tabs, Wrap},
    Frame,
};

use tty_radio_proto::protocol::{StationSummary, StatusData, StreamDetail};
use tty_radio_proto::volume::{Volume, MAX_VOLUME};

use super::theme::Palette;

/// One step of `+`/`-`, 5%.
pub const VOLUME_STEP: i64 = MAX_VOLUME as i64 / 20;

#[derive(Debug, Clone, PartialEq)]
pub enum Action {
    /// Play the highlighted stream.
    PlaySelected,
    TogglePause,
    Stop,
    SetVolume(Volume),
    /// The cursor moved onto a stream whose details are not loaded yet.
    LoadDetail { station: String, stream: String },
    Quit,
}

pub struct App {
    pub stations: Vec<StationSummary>,
    pub station_idx: usize,
    pub list: ListState,
    pub status: Option<StatusData>,
    pub last_update: Option<DateTime<Local>>,
    pub error: Option<String>,
    pub details: HashMap<(String, String), StreamDetail>,
    pub compact_titles: bool,
    pub palette: Palette,
}

impl App {
    pub fn new(stations: Vec<StationSummary>, palette: Palette, compact_titles: bool) -> Self {
        let mut app = Self {
            stations,
            station_idx: 0,
            list: ListState::default(),
            status: None,
            last_update: None,
            error: None,
            details: HashMap::new(),
            compact_titles,
            palette,
        };
        app.list.select(app.first_row());
        app
    }

    fn first_row(&self) -> Option<usize> {
        self.current_station()
            .filter(|s| !s.streams.is_empty())
            .map(|_| 0)
    }

    pub fn current_station(&self) -> Option<&StationSummary> {
        self.stations.get(self.station_idx)
    }

    /// `(station, stream)` under the cursor.
    pub fn highlighted(&self) -> Option<(&str, &str)> {
        let station = self.current_station()?;
        let stream = station.streams.get(self.list.selected()?)?;
        Some((station.name.as_str(), stream.as_str()))
    }

    pub fn set_status(&mut self, status: StatusData) {
        self.status = Some(status);
        self.last_update = Some(Local::now());
    }

    /// Point the tabs and the cursor at the stream the server has selected.
    pub fn follow_selection(&mut self) {
        let Some(status) = &self.status else { return };
        let (Some(station), Some(stream)) = (&status.station, &status.stream) else {
            return;
        };
        if let Some(idx) = self.stations.iter().position(|s| &s.name == station) {
            self.station_idx = idx;
            let row = self.stations[idx].streams.iter().position(|s| s == stream);
            self.list.select(row.or(self.first_row()));
        }
    }

    fn switch_station(&mut self, forward: bool) {
        let n = self.stations.len();
        if n == 0 {
            return;
        }
        self.station_idx = if forward {
            (self.station_idx + 1) % n
        } else {
            (self.station_idx + n - 1) % n
        };
        self.list.select(self.first_row());
    }

    fn move_cursor(&mut self, delta: isize) {
        let len = self.current_station().map_or(0, |s| s.streams.len());
        if len == 0 {
            self.list.select(None);
            return;
        }
        let cur = self.list.selected().unwrap_or(0) as isize;
        let next = (cur + delta).clamp(0, len as isize - 1);
        self.list.select(Some(next as usize));
    }

    fn step_volume(&self, up: bool) -> Option<Volume> {
        let current = self.status.as_ref()?.volume;
        let delta = if up { VOLUME_STEP } else { -VOLUME_STEP };
        let target = (i64::from(current.get()) + delta).clamp(0, i64::from(MAX_VOLUME));
        let volume = Volume::new(target).ok()?;
        (volume != current).then_some(volume)
    }

    /// The detail request for the highlighted stream, if it is not cached.
    pub fn detail_action(&self) -> Option<Action> {
        let (station, stream) = self.highlighted()?;
        let key = (station.to_string(), stream.to_string());
        if self.details.contains_key(&key) {
            return None;
        }
        Some(Action::LoadDetail {
            station: key.0,
            stream: key.1,
        })
    }

    pub fn handle_key(&mut self, key: KeyEvent) -> Vec<Action> {
        if key.kind != KeyEventKind::Press {
            return vec![];
        }
        match key.code {
            KeyCode::Char('q') | KeyCode::Esc => return vec![Action::Quit],
            KeyCode::Char('c') if key.modifiers.contains(KeyModifiers::CONTROL) => {
                return vec![Action::Quit];
            }
            KeyCode::Enter => return vec![Action::PlaySelected],
            KeyCode::Char(' ') | KeyCode::Char('p') => return vec![Action::TogglePause],
            KeyCode::Char('s') => return vec![Action::Stop],
            KeyCode::Char('+') | KeyCode::Char('=') => {
                return self.step_volume(true).map(Action::SetVolume).into_iter().collect();
            }
            KeyCode::Char('-') => {
                return self.step_volume(false).map(Action::SetVolume).into_iter().collect();
            }
            KeyCode::Tab | KeyCode::Right | KeyCode::Char('l') => self.switch_station(true),
            KeyCode::BackTab | KeyCode::Left | KeyCode::Char('h') => self.switch_station(false),
            KeyCode::Down | KeyCode::Char('j') => self.move_cursor(1),
            KeyCode::Up | KeyCode::Char('k') => self.move_cursor(-1),
            KeyCode::PageDown => self.move_cursor(10),
            KeyCode::PageUp => self.move_cursor(-10),
            KeyCode::Home | KeyCode::Char('g') => self.move_cursor(isize::MIN / 2),
            KeyCode::End | KeyCode::Char('G') => self.move_cursor(isize::MAX / 2),
            _ => return vec![],
        }
        self.detail_action().into_iter().collect()
    }

    // ── Drawing ───────────────────────────────────────────────────────────────

    pub fn draw(&mut self, f: &mut Frame) {
        let chunks = Layout::default()
            .direction(Direction::Vertical)
            .constraints([
                Constraint::Length(3),
                Constraint::Min(5),
                Constraint::Length(7),
                Constraint::Length(1),
            ])
            .split(f.area());

        self.draw_tabs(f, chunks[0]);
        self.draw_streams(f, chunks[1]);
        self.draw_now_playing(f, chunks[2]);
        self.draw_footer(f, chunks[3]);
    }

    fn draw_tabs(&self, f: &mut Frame, area: Rect) {
        let p = &self.palette;
        let titles: Vec<Line> = self
            .stations
            .iter()
            .map(|s| Line::from(s.ui_name.clone()))
            .collect();
        let tabs = Tabs::new(titles)
            .select(self.station_idx)
            .block(
                Block::default()
                    .borders(Borders::ALL)
                    .border_style(p.border())
                    .title(" stations "),
            )
            .style(p.secondary())
            .highlight_style(p.accent());
        f.render_widget(tabs, area);
    }

    fn draw_streams(&mut self, f: &mut Frame, area: Rect) {
        let p = self.palette;
        let (station_name, streams) = match self.current_station() {
            Some(s) => (s.name.clone(), s.streams.clone()),
            None => (String::new(), Vec::new()),
        };
        let playing = self
            .status
            .as_ref()
            .filter(|s| s.currently_streaming && s.station.as_deref() == Some(&station_name))
            .and_then(|s| s.stream.clone());

        let items: Vec<ListItem> = streams
            .iter()
            .map(|name| {
                let marker = if playing.as_deref() == Some(name.as_str()) {
                    Span::styled("♪ ", p.playing())
                } else {
                    Span::raw("  ")
                };
                let mut lines = vec![Line::from(vec![marker, Span::styled(name.clone(), p.default_style())])];
                if !self.compact_titles {
                    let desc = self
                        .details
                        .get(&(station_name.clone(), name.clone()))
                        .and_then(|d| d.desc.clone());
                    if let Some(desc) = desc {
                        lines.push(Line::from(Span::styled(format!("    {}", desc), p.secondary())));
                    }
                }
                ListItem::new(lines)
            })
            .collect();

        let list = List::new(items)
            .block(
                Block::default()
                    .borders(Borders::ALL)
                    .border_style(p.border())
                    .title(format!(" {} ", station_name)),
            )
            .highlight_style(p.selected());
        f.render_stateful_widget(list, area, &mut self.list);
    }

    fn draw_now_playing(&self, f: &mut Frame, area: Rect) {
        let p = &self.palette;
        let mut lines = Vec::new();

        match &self.status {
            None => lines.push(Line::from(Span::styled("connecting…", p.secondary()))),
            Some(status) => {
                let (label, style) = if status.is_playing() {
                    ("playing", p.playing())
                } else if status.paused {
                    ("paused", p.paused())
                } else {
                    ("stopped", p.secondary())
                };
                let stream = status.stream.as_deref().unwrap_or("-");
                lines.push(Line::from(vec![
                    Span::styled(format!("{:<8}", label), style),
                    Span::styled(stream.to_string(), p.default_style()),
                    Span::styled(
                        format!("  ({})", status.station.as_deref().unwrap_or("-")),
                        p.secondary(),
                    ),
                ]));
                if let Some(name) = status.stream_name.as_deref().filter(|s| !s.is_empty()) {
                    lines.push(Line::from(Span::styled(name.to_string(), p.secondary())));
                }
                if let Some(song) = status.song.as_deref().filter(|s| !s.is_empty()) {
                    lines.push(Line::from(Span::styled(song.to_string(), p.accent())));
                }
                lines.push(Line::from(Span::styled(
                    format!("volume {}%", status.volume.as_percent()),
                    p.secondary(),
                )));
            }
        }

        let mut title = " now playing ".to_string();
        if let Some(at) = self.last_update {
            title = format!(" now playing · {} ", at.format("%H:%M:%S"));
        }
        let panel = Paragraph::new(lines)
            .wrap(Wrap { trim: true })
            .block(
                Block::default()
                    .borders(Borders::ALL)
                    .border_style(p.border())
                    .title(title),
            );
        f.render_widget(panel, area);
    }

    fn draw_footer(&self, f: &mut Frame, area: Rect) {
        let p = &self.palette;
        let line = match &self.error {
            Some(e) => Line::from(Span::styled(e.clone(), p.error())),
            None => Line::from(Span::styled(
                "enter play  space pause  s stop  +/- volume  tab station  q quit",
                p.secondary(),
            )),
        };
        f.render_widget(Paragraph::new(line), area);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tty_radio_proto::config::Theme;

    fn key(code: KeyCode) -> KeyEvent {
        KeyEvent::new(code, KeyModifiers::NONE)
    }

    fn app() -> App {
        let stations = vec![
            StationSummary {
                name: "favs".into(),
                ui_name: "Favorites".into(),
                streams: vec!["BAGeL Radio".into(), "WCPE Classical".into()],
            },
            StationSummary {
                name: "soma".into(),
                ui_name: "SomaFM".into(),
                streams: vec!["Groove Salad".into()],
            },
        ];
        App::new(stations, Palette::for_theme(Theme::NoColor), false)
    }

    fn status(volume: i64) -> StatusData {
        StatusData {
            station: Some("soma".into()),
            stream: Some("Groove Salad".into()),
            paused: false,
            currently_streaming: true,
            stream_name: None,
            song: None,
            volume: Volume::new(volume).unwrap(),
        }
    }

    #[test]
    fn test_station_switching_wraps() {
        let mut app = app();
        assert_eq!(app.highlighted(), Some(("favs", "BAGeL Radio")));

        let actions = app.handle_key(key(KeyCode::BackTab));
        assert_eq!(app.highlighted(), Some(("soma", "Groove Salad")));
        assert_eq!(
            actions,
            [Action::LoadDetail {
                station: "soma".into(),
                stream: "Groove Salad".into()
            }]
        );

        app.handle_key(key(KeyCode::Tab));
        assert_eq!(app.station_idx, 0);
    }

    #[test]
    fn test_cursor_is_clamped() {
        let mut app = app();
        app.handle_key(key(KeyCode::Up));
        assert_eq!(app.list.selected(), Some(0));
        app.handle_key(key(KeyCode::End));
        assert_eq!(app.highlighted(), Some(("favs", "WCPE Classical")));
        app.handle_key(key(KeyCode::Down));
        assert_eq!(app.list.selected(), Some(1));
    }

    #[test]
    fn test_volume_keys() {
        let mut app = app();
        assert!(app.handle_key(key(KeyCode::Char('+'))).is_empty());

        app.set_status(status(11000));
        assert_eq!(
            app.handle_key(key(KeyCode::Char('+'))),
            [Action::SetVolume(Volume::new(12600).unwrap())]
        );

        app.set_status(status(i64::from(MAX_VOLUME)));
        assert!(app.handle_key(key(KeyCode::Char('+'))).is_empty());
        app.set_status(status(500));
        assert_eq!(
            app.handle_key(key(KeyCode::Char('-'))),
            [Action::SetVolume(Volume::new(0).unwrap())]
        );
    }

    #[test]
    fn test_follow_selection_and_quit() {
        let mut app = app();
        app.set_status(status(11000));
        app.follow_selection();
        assert_eq!(app.highlighted(), Some(("soma", "Groove Salad")));
        assert!(app.last_update.is_some());

        assert_eq!(app.handle_key(key(KeyCode::Char('q'))), [Action::Quit]);
        let ctrl_c = KeyEvent::new(KeyCode::Char('c'), KeyModifiers::CONTROL);
        assert_eq!(app.handle_key(ctrl_c), [Action::Quit]);
    }
}
