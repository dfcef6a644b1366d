// src/tui.rs
use crate::error::{AppResult, StoreError, TuiError};
use crate::gateway::FileGateway;
use crate::models::{BreachRecord, CredentialRecord};
use crate::screen::{ClipboardSink, DeleteOutcome, DetailRow, DetailScreen, MenuAction, Navigation, ScreenEvent};
use crate::session::CommitResult;

use arboard;
use crossterm::{
    event::{self, DisableFocusChange, EnableFocusChange, Event, KeyCode, KeyEvent, KeyEventKind},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use log;
use ratatui::{
    prelude::*,
    widgets::{Block, Borders, Clear, Paragraph, Wrap},
};
use std::io::{stdout, Stdout};
use std::sync::mpsc::{self, Receiver, Sender};
use std::time::Duration;

const VIEW_KEYS: &str = "(e) Edit | (w/c/x) Copy site/user/pass | (r) Reveal | (o) Open | (d) Delete | (s) Reload | (q) Back";
const EDIT_KEYS: &str = "(Tab) Switch field | (Enter) Done | (Esc) Cancel | (F5) Reload";

/// System clipboard backed by `arboard`.
pub struct SystemClipboard;

impl ClipboardSink for SystemClipboard {
    fn set_text(&mut self, text: String) -> Result<(), String> {
        let mut clipboard = arboard::Clipboard::new().map_err(|e| format!("Error initializing clipboard: {}", e))?;
        clipboard.set_text(text).map_err(|e| format!("Error setting clipboard text: {}", e))
    }
}

#[derive(PartialEq, Debug, Clone, Copy)]
pub enum EditField {
    Username,
    Password,
}

#[derive(PartialEq, Debug, Clone, Copy)]
pub enum InputMode {
    Viewing,
    Editing { field: EditField },
    ConfirmDelete,
}

pub struct App {
    should_quit: bool,
    screen: DetailScreen<FileGateway>,
    navigations: Receiver<Navigation>,
    events: Sender<ScreenEvent>,
    input_mode: InputMode,
    app_status: String,
}

impl App {
    pub fn new(
        record: CredentialRecord,
        breach: Option<BreachRecord>,
        gateway: FileGateway,
        breach_info_url: String,
    ) -> Self {
        let (nav_tx, navigations) = mpsc::channel();
        let (events, event_rx) = mpsc::channel();
        let navigate = Box::new(move |nav: Navigation| {
            if let Err(e) = nav_tx.send(nav) {
                log::warn!("Navigation request dropped: {}", e);
            }
        });
        let screen = DetailScreen::new(record, gateway, navigate, Box::new(SystemClipboard), event_rx)
            .with_breach(breach)
            .with_breach_info_url(breach_info_url);
        App {
            should_quit: false,
            screen,
            navigations,
            events,
            input_mode: InputMode::Viewing,
            app_status: VIEW_KEYS.to_string(),
        }
    }

    fn notify(&mut self, event: ScreenEvent) {
        if let Err(e) = self.events.send(event) {
            log::warn!("Screen event {:?} dropped: {}", event, e);
        }
    }

    /// Handles queued screen events and navigation requests, then brings the input
    /// mode back in line with the screen state.
    fn sync_with_screen(&mut self) {
        self.screen.pump_events();

        while let Ok(nav) = self.navigations.try_recv() {
            match nav {
                Navigation::Back => {
                    log::info!("Detail screen closed");
                    self.should_quit = true;
                }
                Navigation::OpenUrl(url) => {
                    log::info!("Navigation requested to {}", url);
                    self.app_status = format!("Open {}", url);
                }
            }
        }

        match self.input_mode {
            InputMode::Editing { .. } if !self.screen.is_editing() => {
                self.input_mode = InputMode::Viewing;
                self.app_status = "Record reloaded; unsaved edit discarded.".to_string();
            }
            InputMode::ConfirmDelete if self.screen.pending_delete().is_none() => {
                self.input_mode = InputMode::Viewing;
                self.app_status = VIEW_KEYS.to_string();
            }
            _ => {}
        }
    }

    fn perform(&mut self, row: DetailRow, action: MenuAction, done: &str) {
        match self.screen.perform(row, action) {
            Ok(()) => {
                if action == MenuAction::Copy {
                    self.app_status = format!("{} copied to clipboard!", done);
                }
            }
            Err(e) => {
                log::error!("{:?} on {:?} failed: {}", action, row, e);
                self.app_status = format!("Error: {}", e);
            }
        }
    }

    pub fn on_key(&mut self, key_event: KeyEvent) {
        // Character keys may be password text.
        if !matches!(key_event.code, KeyCode::Char(_)) {
            log::debug!("Key event received: {:?}", key_event.code);
        }
        match self.input_mode {
            InputMode::Viewing => self.on_view_key(key_event.code),
            InputMode::Editing { field } => self.on_edit_key(key_event.code, field),
            InputMode::ConfirmDelete => self.on_confirm_key(key_event.code),
        }
        self.sync_with_screen();
    }

    fn on_view_key(&mut self, key_code: KeyCode) {
        match key_code {
            KeyCode::Char('q') | KeyCode::Esc => self.should_quit = true,
            KeyCode::Char('e') => match self.screen.begin_edit() {
                Ok(()) => {
                    self.input_mode = InputMode::Editing { field: EditField::Username };
                    self.app_status = EDIT_KEYS.to_string();
                }
                Err(e) => self.app_status = format!("Cannot edit: {}", e),
            },
            KeyCode::Char('w') => self.perform(DetailRow::Website, MenuAction::Copy, "Website"),
            KeyCode::Char('c') => self.perform(DetailRow::Username, MenuAction::Copy, "Username"),
            KeyCode::Char('x') => self.perform(DetailRow::Password, MenuAction::Copy, "Password"),
            KeyCode::Char('r') => {
                let toggle = if self.screen.password_revealed() { MenuAction::Hide } else { MenuAction::Reveal };
                self.perform(DetailRow::Password, toggle, "");
            }
            KeyCode::Char('o') => self.perform(DetailRow::Website, MenuAction::OpenAndFill, ""),
            KeyCode::Char('b') => self.screen.open_breach_site(),
            KeyCode::Char('l') => self.screen.open_breach_info(),
            KeyCode::Char('s') | KeyCode::F(5) => {
                self.notify(ScreenEvent::SyncFinished);
                self.app_status = "Reloaded.".to_string();
            }
            KeyCode::Char('d') => {
                self.screen.select_row(DetailRow::Delete);
                self.input_mode = InputMode::ConfirmDelete;
            }
            _ => {}
        }
    }

    fn on_edit_key(&mut self, key_code: KeyCode, field: EditField) {
        match key_code {
            KeyCode::Char(c) => {
                if let Some(buffer) = self.screen.edit_buffer_mut() {
                    match field {
                        EditField::Username => buffer.username.push(c),
                        EditField::Password => buffer.password.push(c),
                    }
                }
            }
            KeyCode::Backspace => {
                if let Some(buffer) = self.screen.edit_buffer_mut() {
                    match field {
                        EditField::Username => buffer.username.pop(),
                        EditField::Password => buffer.password.pop(),
                    };
                }
            }
            KeyCode::Tab | KeyCode::Down | KeyCode::Up => {
                let next = match field {
                    EditField::Username => EditField::Password,
                    EditField::Password => EditField::Username,
                };
                self.input_mode = InputMode::Editing { field: next };
            }
            KeyCode::Enter => {
                self.input_mode = InputMode::Viewing;
                self.app_status = match self.screen.done_editing() {
                    Ok(CommitResult::NoChange) => "No changes.".to_string(),
                    Ok(CommitResult::Committed(_)) => "Login updated.".to_string(),
                    Ok(CommitResult::Rejected(reason)) => format!("Not saved: {}", reason),
                    Ok(CommitResult::UpdateFailed(e)) => format!("Failed to save login: {}", e),
                    Err(e) => format!("Error: {}", e),
                };
            }
            KeyCode::F(5) => self.notify(ScreenEvent::SyncFinished),
            KeyCode::Esc => {
                self.screen.cancel_edit();
                self.input_mode = InputMode::Viewing;
                self.app_status = "Edit cancelled.".to_string();
            }
            _ => {}
        }
    }

    fn on_confirm_key(&mut self, key_code: KeyCode) {
        match key_code {
            KeyCode::Char('y') => {
                self.input_mode = InputMode::Viewing;
                self.app_status = match self.screen.confirm_delete() {
                    Ok(DeleteOutcome::Deleted) => "Login deleted.".to_string(),
                    Ok(DeleteOutcome::Failed(e)) => format!("Failed to delete login: {}", e),
                    Err(e) => format!("Error: {}", e),
                };
            }
            KeyCode::Char('n') | KeyCode::Esc => {
                self.screen.cancel_delete();
                self.input_mode = InputMode::Viewing;
                self.app_status = VIEW_KEYS.to_string();
            }
            _ => {}
        }
    }
}

/// Opens the detail view for credential `id` and runs it until the user leaves or the
/// credential disappears.
pub fn run_tui(
    mut gateway: FileGateway,
    id: &str,
    breach: Option<BreachRecord>,
    breach_info_url: String,
) -> AppResult<()> {
    use crate::gateway::CredentialGateway;

    let record = gateway
        .fetch_by_id(id)?
        .ok_or_else(|| StoreError::NotFound(id.to_string()))?;

    log::info!("Initializing TUI for credential {}", id);
    enable_raw_mode().map_err(|e| { log::error!("Failed to enable raw mode: {}", e); TuiError::Io(e) })?;
    let mut stdout = stdout();
    execute!(stdout, EnterAlternateScreen, EnableFocusChange)
        .map_err(|e| { log::error!("Failed to setup terminal screen: {}", e); TuiError::Io(e) })?;

    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend).map_err(|e| { log::error!("Failed to create terminal: {}", e); TuiError::Io(e) })?;

    let mut app = App::new(record, breach, gateway, breach_info_url);
    let res = run_app_loop(&mut terminal, &mut app);
    log::info!("TUI application loop finished.");

    disable_raw_mode().map_err(|e| { log::error!("Failed to disable raw mode: {}", e); TuiError::Io(e) })?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen, DisableFocusChange)
        .map_err(|e| { log::error!("Failed to restore terminal screen: {}", e); TuiError::Io(e) })?;

    res?;
    log::info!("TUI shutdown complete.");
    Ok(())
}

fn run_app_loop(terminal: &mut Terminal<CrosstermBackend<Stdout>>, app: &mut App) -> Result<(), TuiError> {
    while !app.should_quit && !app.screen.is_closed() {
        terminal.draw(|f| ui(f, app)).map_err(|e| { log::error!("Terminal draw error: {}", e); TuiError::Io(e) })?;

        if event::poll(Duration::from_millis(100)).map_err(|e| { log::error!("Event poll error: {}", e); TuiError::Io(e) })? {
            match event::read().map_err(|e| { log::error!("Event read error: {}", e); TuiError::Io(e) })? {
                Event::Key(key_event) if key_event.kind == KeyEventKind::Press => app.on_key(key_event),
                Event::FocusLost => app.notify(ScreenEvent::AppBackgrounded),
                _ => {}
            }
        }
        app.sync_with_screen();
    }
    Ok(())
}

fn row_lines<'a>(app: &'a App, row: DetailRow) -> Vec<Line<'a>> {
    let screen = &app.screen;
    let value = screen.displayed_value(row).unwrap_or_default();
    let label = Style::default().bold();
    match row {
        DetailRow::Breach => {
            let description = screen.breach().map(|b| b.description.clone()).unwrap_or_default();
            vec![
                Line::from(Span::styled(format!("Breach alert: {}", value), Style::default().fg(Color::Red).bold())),
                Line::from(description),
                Line::from(Span::styled("(b) Go to site | (l) Learn more", Style::default().fg(Color::DarkGray))),
            ]
        }
        DetailRow::Website => {
            let style = if screen.is_editing() && !screen.row_is_editable(row) {
                Style::default().fg(Color::DarkGray)
            } else {
                Style::default()
            };
            vec![Line::from(vec![Span::styled("Website: ", label), Span::styled(value, style)])]
        }
        DetailRow::Username | DetailRow::Password => {
            let focused = match (app.input_mode, row) {
                (InputMode::Editing { field: EditField::Username }, DetailRow::Username) => true,
                (InputMode::Editing { field: EditField::Password }, DetailRow::Password) => true,
                _ => false,
            };
            let (text, style) = if focused {
                (format!("{}▋", value), Style::default().fg(Color::Yellow))
            } else {
                (value, Style::default())
            };
            vec![Line::from(vec![Span::styled(format!("{}: ", row.title()), label), Span::styled(text, style)])]
        }
        DetailRow::LastModified => {
            let mut lines = vec![Line::from("")];
            lines.extend(value.lines().map(|l| Line::from(l.to_string()).alignment(Alignment::Center)));
            lines.push(Line::from(""));
            lines
        }
        DetailRow::Delete => vec![Line::from(Span::styled("(d) Delete", Style::default().fg(Color::Red))).alignment(Alignment::Center)],
    }
}

fn draw_detail(f: &mut Frame, app: &App) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Min(0), Constraint::Length(3)].as_ref())
        .split(f.size());

    let title = if app.screen.is_editing() { "Edit Login" } else { "Login" };
    let lines: Vec<Line> = app
        .screen
        .visible_rows()
        .into_iter()
        .flat_map(|row| row_lines(app, row))
        .collect();
    let details = Paragraph::new(lines)
        .block(Block::default().borders(Borders::ALL).title(title))
        .wrap(Wrap { trim: true });
    f.render_widget(details, chunks[0]);

    let status_paragraph = Paragraph::new(app.app_status.as_str()).block(Block::default().borders(Borders::ALL).title("Status"));
    f.render_widget(status_paragraph, chunks[1]);
}

fn draw_delete_confirmation(f: &mut Frame, app: &App) {
    let Some(wording) = app.screen.pending_delete() else {
        return;
    };
    let area = centered_rect(60, 25, f.size());
    f.render_widget(Clear, area);
    let text = vec![
        Line::from("Are you sure?"),
        Line::from(wording.message()),
        Line::from(""),
        Line::from("(y) Delete | (n) Cancel"),
    ];
    let popup = Paragraph::new(text)
        .block(Block::default().borders(Borders::ALL).title("Remove Login"))
        .alignment(Alignment::Center)
        .wrap(Wrap { trim: true });
    f.render_widget(popup, area);
}

fn ui(f: &mut Frame, app: &mut App) {
    draw_detail(f, app);
    if app.input_mode == InputMode::ConfirmDelete {
        draw_delete_confirmation(f, app);
    }
}

/// Helper to create a centered rect for popups.
fn centered_rect(percent_x: u16, percent_y: u16, r: Rect) -> Rect {
    let popup_layout = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Percentage((100 - percent_y) / 2),
            Constraint::Percentage(percent_y),
            Constraint::Percentage((100 - percent_y) / 2),
        ])
        .split(r);

    Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Percentage((100 - percent_x) / 2),
            Constraint::Percentage(percent_x),
            Constraint::Percentage((100 - percent_x) / 2),
        ])
        .split(popup_layout[1])[1]
}
