// src/screen.rs
use crate::error::{ScreenError, ScreenResult, SessionError, StoreError};
use crate::gateway::CredentialGateway;
use crate::models::{BreachRecord, CredentialRecord, EditBuffer};
use crate::session::{CommitResult, CredentialEditSession};
use crate::validation::resolve_url;
use chrono::{DateTime, Utc};
use log;
use std::sync::mpsc::Receiver;
use url::Url;

const PASSWORD_MASK: &str = "••••••••";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DetailRow {
    Breach,
    Website,
    Username,
    Password,
    LastModified,
    Delete,
}

impl DetailRow {
    pub const ALL: [DetailRow; 6] = [
        DetailRow::Breach,
        DetailRow::Website,
        DetailRow::Username,
        DetailRow::Password,
        DetailRow::LastModified,
        DetailRow::Delete,
    ];

    pub fn title(&self) -> &'static str {
        match self {
            DetailRow::Breach => "Breach alert",
            DetailRow::Website => "Website",
            DetailRow::Username => "Username",
            DetailRow::Password => "Password",
            DetailRow::LastModified => "",
            DetailRow::Delete => "Delete",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MenuAction {
    Copy,
    OpenAndFill,
    Reveal,
    Hide,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Navigation {
    OpenUrl(Url),
    Back,
}

/// Notifications the host forwards to the screen.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScreenEvent {
    SyncFinished,
    AppBackgrounded,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeleteWording {
    /// The store has synced at least once, so the delete propagates to other devices.
    Everywhere,
    LocalOnly,
}

impl DeleteWording {
    pub fn message(&self) -> &'static str {
        match self {
            DeleteWording::Everywhere => "This will remove the login from all of your synced devices.",
            DeleteWording::LocalOnly => "This will remove the login from this device only.",
        }
    }
}

#[derive(Debug)]
pub enum DeleteOutcome {
    Deleted,
    Failed(StoreError),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RowSelection {
    Nothing,
    Menu(Vec<MenuAction>),
    ConfirmDelete(DeleteWording),
}

pub trait ClipboardSink {
    fn set_text(&mut self, text: String) -> Result<(), String>;
}

pub type NavigationHandler = Box<dyn FnMut(Navigation)>;

/// Screen model for a single credential: what is shown, what can be done, and what
/// happens when the store or the host reports something.
pub struct DetailScreen<G: CredentialGateway> {
    session: CredentialEditSession,
    edit_buffer: Option<EditBuffer>,
    breach: Option<BreachRecord>,
    breach_info_url: String,
    gateway: G,
    navigate: NavigationHandler,
    clipboard: Box<dyn ClipboardSink>,
    events: Receiver<ScreenEvent>,
    pending_delete: Option<DeleteWording>,
    password_revealed: bool,
    closed: bool,
}

impl<G: CredentialGateway> DetailScreen<G> {
    pub fn new(
        record: CredentialRecord,
        gateway: G,
        navigate: NavigationHandler,
        clipboard: Box<dyn ClipboardSink>,
        events: Receiver<ScreenEvent>,
    ) -> Self {
        DetailScreen {
            session: CredentialEditSession::new(record),
            edit_buffer: None,
            breach: None,
            breach_info_url: crate::config::DEFAULT_BREACH_INFO_URL.to_string(),
            gateway,
            navigate,
            clipboard,
            events,
            pending_delete: None,
            password_revealed: false,
            closed: false,
        }
    }

    pub fn with_breach(mut self, breach: Option<BreachRecord>) -> Self {
        self.breach = breach;
        self
    }

    pub fn with_breach_info_url(mut self, url: impl Into<String>) -> Self {
        self.breach_info_url = url.into();
        self
    }

    pub fn record(&self) -> &CredentialRecord {
        self.session.record()
    }

    pub fn breach(&self) -> Option<&BreachRecord> {
        self.breach.as_ref()
    }

    #[cfg(test)]
    pub fn gateway(&self) -> &G {
        &self.gateway
    }

    pub fn is_editing(&self) -> bool {
        self.session.is_editing()
    }

    pub fn edit_buffer(&self) -> Option<&EditBuffer> {
        self.edit_buffer.as_ref()
    }

    pub fn edit_buffer_mut(&mut self) -> Option<&mut EditBuffer> {
        self.edit_buffer.as_mut()
    }

    pub fn pending_delete(&self) -> Option<DeleteWording> {
        self.pending_delete
    }

    pub fn password_revealed(&self) -> bool {
        self.password_revealed
    }

    /// True once the screen has asked the host to navigate back.
    pub fn is_closed(&self) -> bool {
        self.closed
    }

    pub fn visible_rows(&self) -> Vec<DetailRow> {
        DetailRow::ALL
            .iter()
            .copied()
            .filter(|row| *row != DetailRow::Breach || self.breach.is_some())
            .collect()
    }

    /// Only username and password can change, and only in edit mode.
    pub fn row_is_editable(&self, row: DetailRow) -> bool {
        self.is_editing() && matches!(row, DetailRow::Username | DetailRow::Password)
    }

    pub fn displayed_value(&self, row: DetailRow) -> Option<String> {
        let record = self.record();
        match row {
            DetailRow::Website => Some(record.hostname.clone()),
            DetailRow::Username => Some(
                self.edit_buffer
                    .as_ref()
                    .map_or_else(|| record.username.clone(), |b| b.username.clone()),
            ),
            DetailRow::Password => {
                if let Some(buffer) = &self.edit_buffer {
                    Some(buffer.password.clone())
                } else if self.password_revealed {
                    Some(record.password.clone())
                } else {
                    Some(PASSWORD_MASK.to_string())
                }
            }
            DetailRow::Breach => self.breach.as_ref().map(|b| format!("{} ({})", b.name, b.breach_date)),
            DetailRow::LastModified => Some(self.timestamps_caption()),
            DetailRow::Delete => None,
        }
    }

    pub fn timestamps_caption(&self) -> String {
        let record = self.record();
        format!(
            "Created {}\nModified {}",
            format_timestamp(record.time_created),
            format_timestamp(record.time_password_changed)
        )
    }

    pub fn begin_edit(&mut self) -> ScreenResult<()> {
        let buffer = self.session.begin_edit()?;
        self.edit_buffer = Some(buffer);
        Ok(())
    }

    pub fn cancel_edit(&mut self) {
        self.edit_buffer = None;
        self.session.cancel_edit();
    }

    /// Leaves edit mode, committing the buffer if it changed.
    pub fn done_editing(&mut self) -> ScreenResult<CommitResult> {
        let buffer = self.edit_buffer.take().ok_or(SessionError::NotEditing)?;
        let result = self.session.attempt_commit(buffer, &mut self.gateway)?;
        Ok(result)
    }

    pub fn select_row(&mut self, row: DetailRow) -> RowSelection {
        match row {
            DetailRow::Delete => RowSelection::ConfirmDelete(self.request_delete()),
            DetailRow::Website | DetailRow::Username | DetailRow::Password if !self.is_editing() => {
                RowSelection::Menu(self.menu_actions(row))
            }
            _ => RowSelection::Nothing,
        }
    }

    pub fn menu_actions(&self, row: DetailRow) -> Vec<MenuAction> {
        match row {
            DetailRow::Website => vec![MenuAction::Copy, MenuAction::OpenAndFill],
            DetailRow::Username => vec![MenuAction::Copy],
            DetailRow::Password => {
                let toggle = if self.password_revealed { MenuAction::Hide } else { MenuAction::Reveal };
                vec![MenuAction::Copy, toggle]
            }
            _ => Vec::new(),
        }
    }

    pub fn perform(&mut self, row: DetailRow, action: MenuAction) -> ScreenResult<()> {
        if !self.menu_actions(row).contains(&action) {
            return Err(ScreenError::UnsupportedAction { row, action });
        }
        match action {
            MenuAction::Copy => {
                let record = self.record();
                let text = match row {
                    DetailRow::Website => record.hostname.clone(),
                    DetailRow::Username => record.username.clone(),
                    _ => record.password.clone(),
                };
                self.clipboard.set_text(text).map_err(|e| {
                    log::error!("Failed to copy {:?} to clipboard: {}", row, e);
                    ScreenError::Clipboard(e)
                })?;
                log::info!("Copied {:?} of credential {} to clipboard", row, self.record().id);
            }
            MenuAction::OpenAndFill => match self.open_and_fill_url() {
                Some(url) => {
                    log::info!("Opening {} for credential {}", url, self.record().id);
                    (self.navigate)(Navigation::OpenUrl(url));
                }
                None => log::warn!("Credential {} has no usable URL to open", self.record().id),
            },
            MenuAction::Reveal => self.password_revealed = true,
            MenuAction::Hide => self.password_revealed = false,
        }
        Ok(())
    }

    /// The form submit URL when it resolves, otherwise the hostname.
    pub fn open_and_fill_url(&self) -> Option<Url> {
        let record = self.record();
        record
            .form_submit_url
            .as_deref()
            .and_then(|u| resolve_url(u).ok())
            .or_else(|| resolve_url(&record.hostname).ok())
    }

    pub fn open_breach_info(&mut self) {
        if self.breach.is_none() {
            return;
        }
        match Url::parse(&self.breach_info_url) {
            Ok(url) => (self.navigate)(Navigation::OpenUrl(url)),
            Err(e) => log::warn!("Configured breach info URL {:?} is invalid: {}", self.breach_info_url, e),
        }
    }

    pub fn open_breach_site(&mut self) {
        let Some(domain) = self.breach.as_ref().map(|b| b.domain.clone()) else {
            return;
        };
        match resolve_url(&domain) {
            Ok(url) => (self.navigate)(Navigation::OpenUrl(url)),
            Err(e) => log::warn!("Breach domain {:?} is not a usable URL: {}", domain, e),
        }
    }

    /// Asks the store whether it ever synced and opens a delete confirmation worded
    /// accordingly. An unanswerable sync query is treated as "synced".
    pub fn request_delete(&mut self) -> DeleteWording {
        let synced = self.gateway.has_ever_synced().unwrap_or_else(|e| {
            log::warn!("Could not determine sync status, assuming synced: {}", e);
            true
        });
        let wording = if synced { DeleteWording::Everywhere } else { DeleteWording::LocalOnly };
        self.pending_delete = Some(wording);
        wording
    }

    pub fn cancel_delete(&mut self) {
        self.pending_delete = None;
    }

    pub fn confirm_delete(&mut self) -> ScreenResult<DeleteOutcome> {
        self.pending_delete.take().ok_or(ScreenError::NoDeletePending)?;
        let id = self.record().id.clone();
        match self.gateway.delete(&id) {
            Ok(()) => {
                log::info!("Credential {} deleted, leaving detail screen", id);
                self.navigate_back();
                Ok(DeleteOutcome::Deleted)
            }
            Err(e) => {
                log::warn!("Failed to delete credential {}: {}", id, e);
                Ok(DeleteOutcome::Failed(e))
            }
        }
    }

    pub fn handle_event(&mut self, event: ScreenEvent) {
        log::debug!("Handling screen event {:?}", event);
        match event {
            ScreenEvent::SyncFinished => self.reload(),
            ScreenEvent::AppBackgrounded => {
                if self.pending_delete.take().is_some() {
                    log::info!("Dismissed delete confirmation on backgrounding");
                }
            }
        }
    }

    /// Handles every event queued since the last call. Returns how many were handled.
    pub fn pump_events(&mut self) -> usize {
        let mut handled = 0;
        while let Ok(event) = self.events.try_recv() {
            self.handle_event(event);
            handled += 1;
        }
        handled
    }

    fn reload(&mut self) {
        let id = self.record().id.clone();
        match self.gateway.fetch_by_id(&id) {
            Ok(Some(record)) => {
                self.edit_buffer = None;
                self.session.replace_record(record);
                log::info!("Reloaded credential {} after sync", id);
            }
            Ok(None) => {
                log::info!("Credential {} was removed elsewhere, leaving detail screen", id);
                self.navigate_back();
            }
            Err(e) => log::warn!("Failed to reload credential {}: {}", id, e),
        }
    }

    fn navigate_back(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;
        self.edit_buffer = None;
        self.session.cancel_edit();
        self.pending_delete = None;
        (self.navigate)(Navigation::Back);
    }
}

fn format_timestamp(millis: i64) -> String {
    DateTime::<Utc>::from_timestamp_millis(millis)
        .map(|dt| dt.format("%b %-d, %Y").to_string())
        .unwrap_or_else(|| "unknown".to_string())
}
