use std::{cmp, future::Future, io, thread, time::Duration};

use anyhow::{Context, Result};
use chrono::Local;
use crossterm::{
    event::{self, Event, KeyCode, KeyEvent, KeyModifiers},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use patlimer_core::{
    models::{Channel, Pilot, PilotId, Race, RaceEvent, RaceEventId, RaceStatus, MAX_HEATS},
    session::{
        EventView, LoadOutcome, Notice, NoticeLevel, SessionError, SessionStore, SlotBuilder,
    },
};
use ratatui::{
    backend::CrosstermBackend,
    layout::{Alignment, Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Clear, List, ListItem, ListState, Paragraph, Wrap},
    Frame, Terminal,
};
use tokio::{spawn, sync::mpsc};
use tracing::{debug, error, info};

use crate::backend::Backend;

const TICK_RATE: Duration = Duration::from_millis(250);
const MAX_NAME_LEN: usize = 48;

#[derive(Debug, Clone)]
struct Theme {
    primary_fg: Color,
    accent: Color,
    muted: Color,
    selection_bg: Color,
    success: Color,
    warning: Color,
    danger: Color,
}

impl Default for Theme {
    fn default() -> Self {
        Self {
            primary_fg: Color::White,
            accent: Color::Cyan,
            muted: Color::DarkGray,
            selection_bg: Color::DarkGray,
            success: Color::Green,
            warning: Color::Yellow,
            danger: Color::Red,
        }
    }
}

impl Theme {
    fn status_color(&self, status: RaceStatus) -> Color {
        match status {
            RaceStatus::New => self.primary_fg,
            RaceStatus::InProgress => self.success,
            RaceStatus::Interrupted => self.warning,
            RaceStatus::Finished => self.muted,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PromptKind {
    RaceEvent,
    Pilot,
}

impl PromptKind {
    fn title(&self) -> &'static str {
        match self {
            PromptKind::RaceEvent => "New Race Event",
            PromptKind::Pilot => "New Pilot",
        }
    }

    fn instruction(&self) -> &'static str {
        match self {
            PromptKind::RaceEvent => "Event name",
            PromptKind::Pilot => "Pilot name",
        }
    }
}

#[derive(Debug, Clone)]
struct PromptModal {
    kind: PromptKind,
    input: String,
    cursor: usize,
}

impl PromptModal {
    fn new(kind: PromptKind) -> Self {
        Self {
            kind,
            input: String::new(),
            cursor: 0,
        }
    }

    fn move_cursor(&mut self, delta: isize) {
        let len = self.input.len() as isize;
        let next = (self.cursor as isize + delta).clamp(0, len);
        self.cursor = next as usize;
    }

    fn move_home(&mut self) {
        self.cursor = 0;
    }

    fn move_end(&mut self) {
        self.cursor = self.input.len();
    }

    fn insert(&mut self, ch: char) {
        if self.input.len() >= MAX_NAME_LEN {
            return;
        }
        if ch.is_ascii() && !ch.is_ascii_control() {
            self.input.insert(self.cursor, ch);
            self.cursor += ch.len_utf8();
        }
    }

    fn backspace(&mut self) {
        if self.cursor > 0 && self.cursor <= self.input.len() {
            self.cursor -= 1;
            self.input.remove(self.cursor);
        }
    }

    fn delete(&mut self) {
        if self.cursor < self.input.len() {
            self.input.remove(self.cursor);
        }
    }

    fn value(&self) -> String {
        self.input.trim().to_string()
    }
}

enum AppEvent {
    Input(Event),
    Tick,
    Initialized(Result<usize, SessionError>),
    EventCreated(Result<RaceEvent, SessionError>),
    EventRemoved {
        event_id: RaceEventId,
        result: Result<(), SessionError>,
    },
    DetailsLoaded {
        event_id: RaceEventId,
        result: Result<LoadOutcome, SessionError>,
    },
    PilotAdded(Result<Pilot, SessionError>),
    RaceAdded(Result<Race, SessionError>),
    RaceStarted(Result<Race, SessionError>),
}

/// Terminal front end over one [`SessionStore`].
pub struct PatLimerApp {
    session: SessionStore<Backend>,
    backend_label: String,
    builder: SlotBuilder,
    state: UiState,
    prompt: Option<PromptModal>,
    loading: Option<RaceEventId>,
    event_tx: Option<mpsc::Sender<AppEvent>>,
    theme: Theme,
}

impl PatLimerApp {
    pub fn new(session: SessionStore<Backend>, backend_label: String) -> Self {
        Self {
            session,
            backend_label,
            builder: SlotBuilder::new(),
            state: UiState::default(),
            prompt: None,
            loading: None,
            event_tx: None,
            theme: Theme::default(),
        }
    }

    pub async fn run(&mut self) -> Result<()> {
        let mut stdout = io::stdout();
        enable_raw_mode().context("failed to enter raw mode")?;
        execute!(stdout, EnterAlternateScreen).context("failed to enter alternate screen")?;
        let backend = CrosstermBackend::new(stdout);
        let mut terminal = Terminal::new(backend).context("failed to create terminal")?;
        terminal.hide_cursor()?;
        terminal.clear()?;

        let (event_tx, mut event_rx) = mpsc::channel::<AppEvent>(128);
        spawn_input_thread(event_tx.clone());
        self.event_tx = Some(event_tx);

        self.state
            .set_status(format!("Connecting to {} backend…", self.backend_label));
        self.dispatch(|session| async move { AppEvent::Initialized(session.initialize().await) });

        loop {
            terminal.draw(|frame| self.draw(frame))?;
            if self.state.should_quit {
                break;
            }
            let maybe_event = event_rx.recv().await;
            if !self.process_app_event(maybe_event) {
                break;
            }
        }

        restore_terminal(&mut terminal)?;
        self.event_tx = None;
        Ok(())
    }

    /// Run a session intent off the UI loop and feed its result back as an event.
    fn dispatch<F, Fut>(&mut self, task: F)
    where
        F: FnOnce(SessionStore<Backend>) -> Fut,
        Fut: Future<Output = AppEvent> + Send + 'static,
    {
        let Some(sender) = self.event_tx.clone() else {
            self.state
                .set_status("Internal error: event channel unavailable".to_string());
            error!("event_channel_missing");
            return;
        };
        let pending = task(self.session.clone());
        spawn(async move {
            let _ = sender.send(pending.await).await;
        });
    }

    fn process_app_event(&mut self, maybe_event: Option<AppEvent>) -> bool {
        match maybe_event {
            Some(AppEvent::Input(event)) => {
                if self.prompt.is_some() {
                    if let Event::Key(key) = event {
                        self.handle_prompt_key(key);
                    }
                } else if let Err(err) = self.handle_input(event) {
                    self.state.set_status(format!("Error: {err}"));
                }
            }
            Some(AppEvent::Tick) => {}
            Some(AppEvent::Initialized(result)) => {
                if let Ok(total) = result {
                    self.state.set_status(format!("Loaded {total} race events"));
                }
            }
            Some(AppEvent::EventCreated(result)) => {
                if let Ok(event) = result {
                    self.state.event_cursor = self.session.race_events().len().saturating_sub(1);
                    self.state.set_status(format!("Created {}", event.name));
                }
            }
            Some(AppEvent::EventRemoved { event_id, result }) => {
                if result.is_ok() {
                    self.handle_event_removed(&event_id);
                }
            }
            Some(AppEvent::DetailsLoaded { event_id, result }) => {
                self.handle_details_loaded(event_id, result);
            }
            Some(AppEvent::PilotAdded(result)) => {
                if let Ok(pilot) = result {
                    self.state.set_status(format!("Added pilot {}", pilot.name));
                }
            }
            Some(AppEvent::RaceAdded(result)) => {
                if let Ok(race) = result {
                    self.builder.clear();
                    self.state.slot_cursor = 0;
                    self.state
                        .set_status(format!("Created {} with {} heats", race.name, race.heats.len()));
                }
            }
            Some(AppEvent::RaceStarted(result)) => {
                if let Ok(race) = result {
                    self.session
                        .push_notice(Notice::info(format!("{} is {}", race.name, race.status)));
                }
            }
            None => return false,
        }
        self.absorb_notices();
        true
    }

    fn absorb_notices(&mut self) {
        for notice in self.session.take_notices() {
            self.state.set_notice(notice);
        }
    }

    fn handle_event_removed(&mut self, event_id: &RaceEventId) {
        if self.session.selection().is_none() {
            self.builder.clear();
        }
        if self.loading.as_ref() == Some(event_id) {
            self.loading = None;
        }
        let total = self.session.race_events().len();
        self.state.event_cursor = clamp_cursor(self.state.event_cursor, total);
        self.state.set_status("Race event removed".to_string());
    }

    fn handle_details_loaded(
        &mut self,
        event_id: RaceEventId,
        result: Result<LoadOutcome, SessionError>,
    ) {
        let expected = self.loading.as_ref() == Some(&event_id)
            || self.session.selection().as_ref() == Some(&event_id);
        match result {
            Ok(LoadOutcome::Installed(details)) if expected => {
                self.loading = None;
                self.builder.retain_roster(&details.pilots);
                self.state.race_cursor = clamp_cursor(self.state.race_cursor, details.races.len());
                if self.session.view() == Some(EventView::Settings) && details.is_empty() {
                    self.state
                        .set_status("Add pilots and compose a race to get started".to_string());
                } else {
                    self.state.set_status(format!(
                        "{} pilots, {} races",
                        details.pilots.len(),
                        details.races.len()
                    ));
                }
            }
            Ok(_) => {
                debug!(event_id = %event_id, "ignoring superseded details");
            }
            Err(err) => {
                if self.loading.as_ref() == Some(&event_id) {
                    self.loading = None;
                    self.session.clear_selection();
                }
                error!(event_id = %event_id, %err, "details load failed");
            }
        }
    }

    fn handle_input(&mut self, event: Event) -> Result<()> {
        let Event::Key(key) = event else {
            return Ok(());
        };
        if key.modifiers == KeyModifiers::CONTROL && key.code == KeyCode::Char('c') {
            self.state.should_quit = true;
            return Ok(());
        }
        match self.session.view() {
            None => self.handle_list_key(key),
            Some(EventView::Viewing) => self.handle_detail_key(key),
            Some(EventView::Settings) => self.handle_settings_key(key),
        }
        Ok(())
    }

    fn handle_list_key(&mut self, key: KeyEvent) {
        let total = self.session.race_events().len();
        match key.code {
            KeyCode::Char('q') | KeyCode::Char('Q') => {
                self.state.should_quit = true;
            }
            KeyCode::Esc => {
                if self.loading.take().is_some() {
                    self.session.clear_selection();
                    self.state.set_status("Loading cancelled".to_string());
                } else {
                    self.state.should_quit = true;
                }
            }
            KeyCode::Char('j') | KeyCode::Down => {
                self.state.event_cursor = move_cursor(self.state.event_cursor, 1, total);
            }
            KeyCode::Char('k') | KeyCode::Up => {
                self.state.event_cursor = move_cursor(self.state.event_cursor, -1, total);
            }
            KeyCode::Enter => self.open_current_event(),
            KeyCode::Char('n') => {
                self.prompt = Some(PromptModal::new(PromptKind::RaceEvent));
            }
            KeyCode::Char('d') => self.remove_current_event(),
            _ => {}
        }
    }

    fn open_current_event(&mut self) {
        let Some(event) = self.session.race_events().get(self.state.event_cursor).cloned() else {
            self.state.set_status("No race event selected".to_string());
            return;
        };
        info!(event_id = %event.id, name = %event.name, "Opening race event");
        self.builder.clear();
        self.state.race_cursor = 0;
        self.state.slot_cursor = 0;
        self.loading = Some(event.id.clone());
        self.state.set_status(format!("Loading {}…", event.name));
        let event_id = event.id;
        self.dispatch(move |session| async move {
            let result = session.select_race_event(event_id.clone()).await;
            AppEvent::DetailsLoaded { event_id, result }
        });
    }

    fn remove_current_event(&mut self) {
        let Some(event) = self.session.race_events().get(self.state.event_cursor).cloned() else {
            self.state.set_status("No race event selected".to_string());
            return;
        };
        self.state.set_status(format!("Removing {}…", event.name));
        let event_id = event.id;
        self.dispatch(move |session| async move {
            let result = session.remove_race_event(&event_id).await;
            AppEvent::EventRemoved { event_id, result }
        });
    }

    fn back_to_list(&mut self) {
        self.session.clear_selection();
        self.builder.clear();
        self.loading = None;
        self.state.set_status("Select a race event".to_string());
    }

    fn reload_details(&mut self) {
        let Some(event_id) = self.session.selection() else {
            return;
        };
        self.dispatch(move |session| async move {
            let result = session.load_race_event_details(&event_id).await;
            AppEvent::DetailsLoaded { event_id, result }
        });
    }

    fn handle_detail_key(&mut self, key: KeyEvent) {
        let total = self.session.races().len();
        match key.code {
            KeyCode::Esc => self.back_to_list(),
            KeyCode::Char('j') | KeyCode::Down => {
                self.state.race_cursor = move_cursor(self.state.race_cursor, 1, total);
            }
            KeyCode::Char('k') | KeyCode::Up => {
                self.state.race_cursor = move_cursor(self.state.race_cursor, -1, total);
            }
            KeyCode::Char('s') => {
                let Some(race_id) = self.session.next_pending_race() else {
                    self.state.set_status("No race is waiting to start".to_string());
                    return;
                };
                self.dispatch(move |session| async move {
                    AppEvent::RaceStarted(session.start_race(&race_id).await)
                });
            }
            KeyCode::Char('r') => self.reload_details(),
            KeyCode::Tab => {
                self.session.toggle_settings();
            }
            _ => {}
        }
    }

    fn handle_settings_key(&mut self, key: KeyEvent) {
        let slots = self.builder.len();
        match key.code {
            KeyCode::Esc => self.back_to_list(),
            KeyCode::Tab => {
                if !self.session.toggle_settings() {
                    self.state
                        .set_status("Add at least one pilot and one race first".to_string());
                }
            }
            KeyCode::Char('j') | KeyCode::Down => {
                self.state.slot_cursor = move_cursor(self.state.slot_cursor, 1, slots);
            }
            KeyCode::Char('k') | KeyCode::Up => {
                self.state.slot_cursor = move_cursor(self.state.slot_cursor, -1, slots);
            }
            KeyCode::Char('p') => {
                self.prompt = Some(PromptModal::new(PromptKind::Pilot));
            }
            KeyCode::Char('a') => {
                if self.builder.add_slot() {
                    self.state.slot_cursor = self.builder.len() - 1;
                } else {
                    self.state
                        .set_status(format!("A race holds at most {MAX_HEATS} heats"));
                }
            }
            KeyCode::Char('x') => {
                if self.builder.remove_slot(self.state.slot_cursor).is_some() {
                    self.state.slot_cursor = clamp_cursor(self.state.slot_cursor, self.builder.len());
                }
            }
            KeyCode::Char('c') => {
                let index = self.state.slot_cursor;
                if let Some(slot) = self.builder.slots().get(index) {
                    let next = Channel::cycle(slot.channel);
                    self.builder.set_channel(index, next);
                }
            }
            KeyCode::Char('o') => {
                let index = self.state.slot_cursor;
                if let Some(slot) = self.builder.slots().get(index) {
                    let next = cycle_pilot(slot.pilot.as_ref(), &self.session.pilots());
                    self.builder.set_pilot(index, next);
                }
            }
            KeyCode::Enter => self.submit_race(),
            KeyCode::Char('r') => self.reload_details(),
            _ => {}
        }
    }

    fn submit_race(&mut self) {
        if let Err(err) = self.builder.validate() {
            self.state.set_status(format!("Cannot create race: {err}"));
            return;
        }
        let Some(draft) = self.builder.build() else {
            return;
        };
        self.state.set_status("Creating race…".to_string());
        self.dispatch(move |session| async move { AppEvent::RaceAdded(session.add_race(draft).await) });
    }

    fn handle_prompt_key(&mut self, key: KeyEvent) {
        let mut submit: Option<(PromptKind, String)> = None;
        let mut cancel = false;
        if let Some(prompt) = self.prompt.as_mut() {
            match key.code {
                KeyCode::Esc => cancel = true,
                KeyCode::Enter => submit = Some((prompt.kind, prompt.value())),
                KeyCode::Left => prompt.move_cursor(-1),
                KeyCode::Right => prompt.move_cursor(1),
                KeyCode::Home => prompt.move_home(),
                KeyCode::End => prompt.move_end(),
                KeyCode::Backspace => prompt.backspace(),
                KeyCode::Delete => prompt.delete(),
                KeyCode::Char(ch) => {
                    if key.modifiers.is_empty() || key.modifiers == KeyModifiers::SHIFT {
                        prompt.insert(ch);
                    }
                }
                _ => {}
            }
        }

        if cancel {
            self.prompt = None;
            self.state.set_status("Cancelled".to_string());
            return;
        }

        if let Some((kind, name)) = submit {
            self.prompt = None;
            match kind {
                PromptKind::RaceEvent => self.dispatch(move |session| async move {
                    AppEvent::EventCreated(session.create_race_event(&name).await)
                }),
                PromptKind::Pilot => self.dispatch(move |session| async move {
                    AppEvent::PilotAdded(session.add_pilot(&name).await)
                }),
            }
        }
    }

    fn draw(&mut self, frame: &mut Frame) {
        let area = frame.size();
        let layout = Layout::default()
            .direction(Direction::Vertical)
            .constraints([
                Constraint::Length(3),
                Constraint::Min(5),
                Constraint::Length(4),
            ])
            .split(area);

        self.render_header(frame, layout[0]);
        match self.session.view() {
            None => self.render_event_list(frame, layout[1]),
            Some(EventView::Viewing) => self.render_race_list(frame, layout[1]),
            Some(EventView::Settings) => self.render_settings(frame, layout[1]),
        }
        self.render_status(frame, layout[2]);

        if let Some(prompt) = &self.prompt {
            self.render_prompt(frame, prompt);
        }
    }

    fn render_header(&self, frame: &mut Frame, area: Rect) {
        let mut spans = vec![Span::styled(
            "PatLimer",
            Style::default()
                .fg(self.theme.accent)
                .add_modifier(Modifier::BOLD),
        )];
        if let Some(event) = self.session.selected_event() {
            spans.push(Span::raw(" · "));
            spans.push(Span::styled(
                event.name,
                Style::default().fg(self.theme.primary_fg),
            ));
            spans.push(Span::styled(
                format!(" ({})", event.race_event_type),
                Style::default().fg(self.theme.muted),
            ));
        }
        spans.push(Span::styled(
            format!("  [{}]", self.backend_label),
            Style::default().fg(self.theme.muted),
        ));
        let header = Paragraph::new(Line::from(spans))
            .block(Block::default().borders(Borders::ALL))
            .alignment(Alignment::Left);
        frame.render_widget(header, area);
    }

    fn render_event_list(&mut self, frame: &mut Frame, area: Rect) {
        let events = self.session.race_events();
        self.state.event_cursor = clamp_cursor(self.state.event_cursor, events.len());

        let items: Vec<ListItem> = events
            .iter()
            .enumerate()
            .map(|(idx, event)| {
                let marker = if idx == self.state.event_cursor {
                    Span::styled(
                        "▶ ",
                        Style::default()
                            .fg(self.theme.accent)
                            .add_modifier(Modifier::BOLD),
                    )
                } else {
                    Span::raw("  ")
                };
                let loading = self.loading.as_ref() == Some(&event.id);
                let mut line = vec![
                    marker,
                    Span::styled(
                        event.name.clone(),
                        Style::default()
                            .fg(self.theme.primary_fg)
                            .add_modifier(Modifier::BOLD),
                    ),
                    Span::styled(
                        format!(
                            " · {} · {}",
                            event.race_event_type,
                            event.created_at.with_timezone(&Local).format("%Y-%m-%d")
                        ),
                        Style::default().fg(self.theme.muted),
                    ),
                ];
                if loading {
                    line.push(Span::styled(
                        "  loading…",
                        Style::default().fg(self.theme.warning),
                    ));
                }
                ListItem::new(Line::from(line))
            })
            .collect();

        let mut list_state = ListState::default();
        if !events.is_empty() {
            list_state.select(Some(self.state.event_cursor));
        }
        let title = if self.session.is_initialized() {
            format!("Race Events ({})", events.len())
        } else {
            "Race Events".to_string()
        };
        let list = List::new(items)
            .block(Block::default().borders(Borders::ALL).title(title))
            .highlight_style(Style::default().bg(self.theme.selection_bg));
        frame.render_stateful_widget(list, area, &mut list_state);
    }

    fn render_race_list(&mut self, frame: &mut Frame, area: Rect) {
        let details = self.session.details();
        self.state.race_cursor = clamp_cursor(self.state.race_cursor, details.races.len());

        let items: Vec<ListItem> = details
            .races
            .iter()
            .enumerate()
            .map(|(idx, race)| {
                let marker = if idx == self.state.race_cursor { "▶ " } else { "  " };
                let mut lines = vec![Line::from(vec![
                    Span::styled(marker, Style::default().fg(self.theme.accent)),
                    Span::styled(
                        race.name.clone(),
                        Style::default().add_modifier(Modifier::BOLD),
                    ),
                    Span::raw("  "),
                    Span::styled(
                        race.status.to_string(),
                        Style::default().fg(self.theme.status_color(race.status)),
                    ),
                ])];
                lines.extend(race.heats.iter().map(|heat| {
                    Line::from(Span::styled(
                        format!(
                            "    #{} {}  {}",
                            heat.no,
                            heat.channel,
                            pilot_name(&details.pilots, &heat.pilot_id)
                        ),
                        Style::default().fg(self.theme.muted),
                    ))
                }));
                ListItem::new(lines)
            })
            .collect();

        let mut list_state = ListState::default();
        if !details.races.is_empty() {
            list_state.select(Some(self.state.race_cursor));
        }
        let list = List::new(items)
            .block(
                Block::default()
                    .borders(Borders::ALL)
                    .title(format!("Races ({})", details.races.len())),
            )
            .highlight_style(Style::default().bg(self.theme.selection_bg));
        frame.render_stateful_widget(list, area, &mut list_state);
    }

    fn render_settings(&mut self, frame: &mut Frame, area: Rect) {
        let columns = Layout::default()
            .direction(Direction::Horizontal)
            .constraints([Constraint::Percentage(40), Constraint::Percentage(60)])
            .split(area);

        let pilots = self.session.pilots();
        let pilot_lines: Vec<Line> = if pilots.is_empty() {
            vec![Line::from(Span::styled(
                "No pilots yet. Press p to add one.",
                Style::default().fg(self.theme.muted),
            ))]
        } else {
            pilots
                .iter()
                .map(|pilot| Line::from(format!("• {}", pilot.name)))
                .collect()
        };
        let roster = Paragraph::new(pilot_lines)
            .block(
                Block::default()
                    .borders(Borders::ALL)
                    .title(format!("Pilots ({})", pilots.len())),
            )
            .wrap(Wrap { trim: true });
        frame.render_widget(roster, columns[0]);

        self.state.slot_cursor = clamp_cursor(self.state.slot_cursor, self.builder.len());
        let mut lines: Vec<Line> = self
            .builder
            .slots()
            .iter()
            .enumerate()
            .map(|(idx, slot)| {
                let selected = idx == self.state.slot_cursor;
                let marker = if selected { "▶ " } else { "  " };
                let channel = slot
                    .channel
                    .map(|channel| channel.to_string())
                    .unwrap_or_else(|| "--".to_string());
                let pilot = slot
                    .pilot
                    .as_ref()
                    .map(|pilot| pilot.name.clone())
                    .unwrap_or_else(|| "no pilot".to_string());
                let style = if slot.is_complete() {
                    Style::default().fg(self.theme.primary_fg)
                } else {
                    Style::default().fg(self.theme.warning)
                };
                let style = if selected {
                    style.bg(self.theme.selection_bg)
                } else {
                    style
                };
                Line::from(Span::styled(
                    format!("{marker}Heat {}  {channel:<3} {pilot}", idx + 1),
                    style,
                ))
            })
            .collect();
        if self.builder.is_empty() {
            lines.push(Line::from(Span::styled(
                "Press a to add a heat.",
                Style::default().fg(self.theme.muted),
            )));
        }
        lines.push(Line::from(""));
        let free: Vec<String> = self
            .builder
            .free_channels()
            .iter()
            .map(Channel::to_string)
            .collect();
        let free = if free.is_empty() {
            "none".to_string()
        } else {
            free.join(" ")
        };
        lines.push(Line::from(Span::styled(
            format!("Free channels: {free}"),
            Style::default().fg(self.theme.muted),
        )));
        let verdict = match self.builder.validate() {
            Ok(()) => Span::styled("Ready to create", Style::default().fg(self.theme.success)),
            Err(err) => Span::styled(err.to_string(), Style::default().fg(self.theme.danger)),
        };
        lines.push(Line::from(verdict));

        let draft = Paragraph::new(lines)
            .block(
                Block::default()
                    .borders(Borders::ALL)
                    .title(format!("New Race ({}/{MAX_HEATS})", self.builder.len())),
            )
            .wrap(Wrap { trim: false });
        frame.render_widget(draft, columns[1]);
    }

    fn render_status(&self, frame: &mut Frame, area: Rect) {
        let block = Block::default().borders(Borders::ALL).title("Status");
        let color = match self.state.status_level {
            NoticeLevel::Info => self.theme.primary_fg,
            NoticeLevel::Error => self.theme.danger,
        };
        let primary = Line::from(Span::styled(self.state.status.clone(), Style::default().fg(color)));
        let hints = match self.session.view() {
            None => "Enter open  n new  d remove  q quit",
            Some(EventView::Viewing) => "s start next  Tab settings  r reload  Esc back",
            Some(EventView::Settings) => {
                "p pilot  a add heat  x remove  c channel  o pilot  Enter create  Tab races  Esc back"
            }
        };
        let secondary = Line::from(Span::styled(hints, Style::default().fg(self.theme.muted)));
        let paragraph = Paragraph::new(vec![primary, secondary])
            .block(block)
            .wrap(Wrap { trim: true });
        frame.render_widget(paragraph, area);
    }

    fn render_prompt(&self, frame: &mut Frame, prompt: &PromptModal) {
        let frame_area = frame.size();
        let width = cmp::max(cmp::min(56_u16, frame_area.width.saturating_sub(4)), 24_u16);
        let height = 6_u16.min(frame_area.height.saturating_sub(2)).max(5_u16);
        let area = centered_rect(width, height, frame_area);

        frame.render_widget(Clear, area);

        let input_line = Line::from(vec![
            Span::styled("> ", Style::default().fg(self.theme.accent)),
            Span::raw(prompt.input.clone()),
        ]);
        let helper = Line::from(vec![
            Span::styled("Enter", Style::default().add_modifier(Modifier::BOLD)),
            Span::raw(" save  "),
            Span::styled("Esc", Style::default().add_modifier(Modifier::BOLD)),
            Span::raw(" cancel"),
        ]);
        let paragraph = Paragraph::new(vec![
            Line::from(prompt.kind.instruction()),
            input_line,
            Line::from(""),
            helper,
        ])
        .block(Block::default().borders(Borders::ALL).title(prompt.kind.title()))
        .wrap(Wrap { trim: true });

        frame.render_widget(paragraph, area);

        let cursor_x =
            (area.x + 3 + prompt.cursor as u16).min(area.x + area.width.saturating_sub(2));
        frame.set_cursor(cursor_x, area.y + 2);
    }
}

fn restore_terminal(terminal: &mut Terminal<CrosstermBackend<io::Stdout>>) -> Result<()> {
    disable_raw_mode().context("failed to disable raw mode")?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)
        .context("failed to leave alternate screen")?;
    terminal.show_cursor()?;
    Ok(())
}

fn spawn_input_thread(sender: mpsc::Sender<AppEvent>) {
    thread::spawn(move || loop {
        match event::poll(TICK_RATE) {
            Ok(true) => match event::read() {
                Ok(evt) => {
                    if sender.blocking_send(AppEvent::Input(evt)).is_err() {
                        break;
                    }
                }
                Err(_) => break,
            },
            Ok(false) => {
                if sender.blocking_send(AppEvent::Tick).is_err() {
                    break;
                }
            }
            Err(_) => break,
        }
    });
}

struct UiState {
    event_cursor: usize,
    race_cursor: usize,
    slot_cursor: usize,
    status: String,
    status_level: NoticeLevel,
    should_quit: bool,
}

impl Default for UiState {
    fn default() -> Self {
        Self {
            event_cursor: 0,
            race_cursor: 0,
            slot_cursor: 0,
            status: "Ready".to_string(),
            status_level: NoticeLevel::Info,
            should_quit: false,
        }
    }
}

impl UiState {
    fn set_status(&mut self, status: String) {
        self.status = status;
        self.status_level = NoticeLevel::Info;
    }

    fn set_notice(&mut self, notice: Notice) {
        self.status = format!(
            "[{}] {}",
            notice.raised_at.with_timezone(&Local).format("%H:%M:%S"),
            notice.message
        );
        self.status_level = notice.level;
    }
}

fn move_cursor(cursor: usize, delta: isize, len: usize) -> usize {
    if len == 0 {
        return 0;
    }
    (cursor as isize + delta).clamp(0, len as isize - 1) as usize
}

fn clamp_cursor(cursor: usize, len: usize) -> usize {
    cursor.min(len.saturating_sub(1))
}

/// Next roster pilot after `current`, wrapping to none after the last one.
fn cycle_pilot(current: Option<&Pilot>, roster: &[Pilot]) -> Option<Pilot> {
    let next = match current {
        None => 0,
        Some(pilot) => roster.iter().position(|p| p.id == pilot.id)? + 1,
    };
    roster.get(next).cloned()
}

fn pilot_name(pilots: &[Pilot], id: &PilotId) -> String {
    pilots
        .iter()
        .find(|pilot| &pilot.id == id)
        .map(|pilot| pilot.name.clone())
        .unwrap_or_else(|| id.to_string())
}

fn centered_rect(width: u16, height: u16, area: Rect) -> Rect {
    let width = width.min(area.width);
    let height = height.min(area.height);
    let x = area.x + (area.width.saturating_sub(width)) / 2;
    let y = area.y + (area.height.saturating_sub(height)) / 2;
    Rect::new(x, y, width, height)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn roster() -> Vec<Pilot> {
        ["Ada", "Grace", "Linus"]
            .iter()
            .enumerate()
            .map(|(idx, name)| Pilot {
                id: PilotId::from(format!("pilot-{idx}").as_str()),
                name: name.to_string(),
                race_event_id: RaceEventId::from("evt-1"),
            })
            .collect()
    }

    #[test]
    fn pilot_cycle_walks_roster_then_clears() {
        let roster = roster();
        let first = cycle_pilot(None, &roster);
        assert_eq!(first.as_ref().map(|p| p.name.as_str()), Some("Ada"));
        let second = cycle_pilot(first.as_ref(), &roster);
        assert_eq!(second.as_ref().map(|p| p.name.as_str()), Some("Grace"));
        let last = cycle_pilot(Some(&roster[2]), &roster);
        assert!(last.is_none());
        assert!(cycle_pilot(None, &[]).is_none());
    }

    #[test]
    fn pilot_cycle_restarts_for_removed_pilot() {
        let roster = roster();
        let stranger = Pilot {
            id: PilotId::from("pilot-99"),
            name: "Ghost".to_string(),
            race_event_id: RaceEventId::from("evt-1"),
        };
        assert!(cycle_pilot(Some(&stranger), &roster).is_none());
    }

    #[test]
    fn prompt_edits_at_cursor() {
        let mut prompt = PromptModal::new(PromptKind::Pilot);
        for ch in "Ada".chars() {
            prompt.insert(ch);
        }
        prompt.move_home();
        prompt.insert(' ');
        prompt.move_end();
        prompt.backspace();
        assert_eq!(prompt.input, " Ad");
        assert_eq!(prompt.value(), "Ad");
        prompt.move_cursor(-10);
        prompt.delete();
        assert_eq!(prompt.input, "Ad");
    }

    #[test]
    fn prompt_caps_length_and_ignores_controls() {
        let mut prompt = PromptModal::new(PromptKind::RaceEvent);
        prompt.insert('\n');
        assert!(prompt.input.is_empty());
        for _ in 0..(MAX_NAME_LEN + 10) {
            prompt.insert('x');
        }
        assert_eq!(prompt.input.len(), MAX_NAME_LEN);
    }

    #[test]
    fn cursor_helpers_stay_in_bounds() {
        assert_eq!(move_cursor(0, -1, 3), 0);
        assert_eq!(move_cursor(2, 1, 3), 2);
        assert_eq!(move_cursor(5, 1, 0), 0);
        assert_eq!(clamp_cursor(7, 2), 1);
        assert_eq!(clamp_cursor(3, 0), 0);
    }

    #[test]
    fn unknown_pilot_falls_back_to_id() {
        let roster = roster();
        assert_eq!(pilot_name(&roster, &PilotId::from("pilot-1")), "Grace");
        assert_eq!(pilot_name(&roster, &PilotId::from("pilot-7")), "pilot-7");
    }
}
