// src/session.rs
use crate::error::{SessionError, StoreError, ValidationError};
use crate::gateway::CredentialGateway;
use crate::models::{CredentialRecord, EditBuffer};
use crate::validation;
use log;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    Editing,
}

#[derive(Debug)]
pub enum CommitResult {
    /// Username and password are identical to the held record. Nothing was written.
    NoChange,
    /// The edited record is malformed. Nothing was written.
    Rejected(ValidationError),
    /// The store accepted the edit and the session now holds the updated record.
    Committed(CredentialRecord),
    /// The store refused the edit. The session keeps the previous record.
    UpdateFailed(StoreError),
}

/// Edit state for one credential on the detail screen.
///
/// The session only ever moves `Idle -> Editing -> Idle`. Callers hold it by `&mut`,
/// so a commit cannot start while another one is still talking to the gateway.
pub struct CredentialEditSession {
    record: CredentialRecord,
    state: SessionState,
}

impl CredentialEditSession {
    pub fn new(record: CredentialRecord) -> Self {
        CredentialEditSession { record, state: SessionState::Idle }
    }

    pub fn record(&self) -> &CredentialRecord {
        &self.record
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn is_editing(&self) -> bool {
        self.state == SessionState::Editing
    }

    pub fn begin_edit(&mut self) -> Result<EditBuffer, SessionError> {
        if self.is_editing() {
            log::warn!("begin_edit called while credential {} is already being edited", self.record.id);
            return Err(SessionError::AlreadyEditing);
        }
        self.state = SessionState::Editing;
        log::info!("Editing credential {}", self.record.id);
        Ok(EditBuffer {
            username: self.record.username.clone(),
            password: self.record.password.clone(),
        })
    }

    pub fn cancel_edit(&mut self) {
        if self.is_editing() {
            log::info!("Edit of credential {} cancelled", self.record.id);
        }
        self.state = SessionState::Idle;
    }

    /// Compares `buffer` with the held record, validates the result and writes it
    /// through `gateway` if anything changed. Always leaves edit mode.
    pub fn attempt_commit(
        &mut self,
        buffer: EditBuffer,
        gateway: &mut dyn CredentialGateway,
    ) -> Result<CommitResult, SessionError> {
        if !self.is_editing() {
            log::warn!("attempt_commit called for credential {} without an edit in progress", self.record.id);
            return Err(SessionError::NotEditing);
        }
        self.state = SessionState::Idle;

        if buffer.matches(&self.record) {
            log::info!("No changes to credential {}", self.record.id);
            return Ok(CommitResult::NoChange);
        }

        let updated = self.record.with_edits(&buffer);
        if let Err(reason) = validation::validate_record(&updated) {
            log::warn!("Rejected edit of credential {}: {}", self.record.id, reason);
            return Ok(CommitResult::Rejected(reason));
        }

        match gateway.update(&self.record.id, &updated) {
            Ok(()) => {
                log::info!("Committed edit of credential {}", self.record.id);
                self.record = updated.clone();
                Ok(CommitResult::Committed(updated))
            }
            Err(e) => {
                log::warn!("Store refused edit of credential {}: {}", self.record.id, e);
                Ok(CommitResult::UpdateFailed(e))
            }
        }
    }

    /// Swaps in a freshly loaded record. An edit in progress is dropped, not merged;
    /// returns `true` when that happened.
    pub fn replace_record(&mut self, record: CredentialRecord) -> bool {
        let discarded = self.is_editing();
        if discarded {
            log::info!("Discarding unsaved edit of credential {} after reload", self.record.id);
        }
        self.record = record;
        self.state = SessionState::Idle;
        discarded
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gateway::testing::{GatewayCall, RecordingGateway};
    use proptest::prelude::*;

    fn sample_record() -> CredentialRecord {
        CredentialRecord {
            id: "1".to_string(),
            hostname: "example.com".to_string(),
            username: "a".to_string(),
            password: "p1".to_string(),
            form_submit_url: Some("https://example.com/login".to_string()),
            username_field: Some("user".to_string()),
            password_field: Some("pass".to_string()),
            time_created: 10,
            time_password_changed: 20,
            ..Default::default()
        }
    }

    #[test]
    fn test_begin_edit_seeds_buffer_and_enters_editing() {
        let mut session = CredentialEditSession::new(sample_record());
        let buffer = session.begin_edit().unwrap();
        assert_eq!(buffer.username, "a");
        assert_eq!(buffer.password, "p1");
        assert_eq!(session.state(), SessionState::Editing);
    }

    #[test]
    fn test_begin_edit_twice_is_rejected() {
        let mut session = CredentialEditSession::new(sample_record());
        session.begin_edit().unwrap();
        assert_eq!(session.begin_edit(), Err(SessionError::AlreadyEditing));
        assert!(session.is_editing());
    }

    #[test]
    fn test_password_change_commits_once() {
        let mut gateway = RecordingGateway::with_record(sample_record());
        let mut session = CredentialEditSession::new(sample_record());

        let mut buffer = session.begin_edit().unwrap();
        buffer.password = "p2".to_string();
        let result = session.attempt_commit(buffer, &mut gateway).unwrap();

        let expected = CredentialRecord { password: "p2".to_string(), ..sample_record() };
        match result {
            CommitResult::Committed(record) => assert_eq!(record, expected),
            other => panic!("Expected Committed, got {:?}", other),
        }
        assert_eq!(session.record(), &expected);
        assert_eq!(session.state(), SessionState::Idle);
        assert_eq!(gateway.updates(), vec![&GatewayCall::Update("1".to_string(), expected)]);
    }

    #[test]
    fn test_editing_back_to_original_is_no_change() {
        let mut gateway = RecordingGateway::with_record(sample_record());
        let mut session = CredentialEditSession::new(sample_record());

        let mut buffer = session.begin_edit().unwrap();
        buffer.password = "temporary".to_string();
        buffer.password = "p1".to_string();
        let result = session.attempt_commit(buffer, &mut gateway).unwrap();

        assert!(matches!(result, CommitResult::NoChange));
        assert!(gateway.calls.is_empty());
        assert!(!session.is_editing());
    }

    #[test]
    fn test_second_commit_without_begin_edit_is_guarded() {
        let mut gateway = RecordingGateway::with_record(sample_record());
        let mut session = CredentialEditSession::new(sample_record());

        let mut buffer = session.begin_edit().unwrap();
        buffer.username = "b".to_string();
        let again = buffer.clone();
        assert!(matches!(session.attempt_commit(buffer, &mut gateway), Ok(CommitResult::Committed(_))));

        assert_eq!(session.attempt_commit(again, &mut gateway).err(), Some(SessionError::NotEditing));
        assert_eq!(gateway.updates().len(), 1);
    }

    #[test]
    fn test_commit_while_idle_is_guarded() {
        let mut gateway = RecordingGateway::default();
        let mut session = CredentialEditSession::new(sample_record());
        let buffer = EditBuffer { username: "x".to_string(), password: "y".to_string() };
        assert_eq!(session.attempt_commit(buffer, &mut gateway).err(), Some(SessionError::NotEditing));
        assert!(gateway.calls.is_empty());
    }

    #[test]
    fn test_invalid_record_is_rejected_without_write() {
        let broken = CredentialRecord { hostname: String::new(), ..sample_record() };
        let mut gateway = RecordingGateway::with_record(broken.clone());
        let mut session = CredentialEditSession::new(broken.clone());

        let mut buffer = session.begin_edit().unwrap();
        buffer.username = "changed".to_string();
        let result = session.attempt_commit(buffer, &mut gateway).unwrap();

        assert!(matches!(result, CommitResult::Rejected(ValidationError::EmptyHostname)));
        assert_eq!(session.record(), &broken);
        assert!(!session.is_editing());
        assert!(gateway.calls.is_empty());
    }

    #[test]
    fn test_gateway_failure_keeps_previous_record() {
        let mut gateway = RecordingGateway::with_record(sample_record());
        gateway.fail_updates = true;
        let mut session = CredentialEditSession::new(sample_record());

        let mut buffer = session.begin_edit().unwrap();
        buffer.password = "p2".to_string();
        let result = session.attempt_commit(buffer, &mut gateway).unwrap();

        assert!(matches!(result, CommitResult::UpdateFailed(_)));
        assert_eq!(session.record(), &sample_record());
        assert!(!session.is_editing());
        assert_eq!(gateway.updates().len(), 1);
    }

    #[test]
    fn test_cancel_edit_returns_to_idle() {
        let mut session = CredentialEditSession::new(sample_record());
        session.begin_edit().unwrap();
        session.cancel_edit();
        assert_eq!(session.state(), SessionState::Idle);
        assert!(session.begin_edit().is_ok());
    }

    #[test]
    fn test_replace_record_discards_edit() {
        let mut session = CredentialEditSession::new(sample_record());
        session.begin_edit().unwrap();

        let reloaded = CredentialRecord { username: "synced".to_string(), ..sample_record() };
        assert!(session.replace_record(reloaded.clone()));
        assert_eq!(session.record(), &reloaded);
        assert_eq!(session.state(), SessionState::Idle);

        assert!(!session.replace_record(sample_record()));
    }

    fn field() -> impl Strategy<Value = String> {
        "[a-zA-Z0-9@._!-]{0,16}"
    }

    fn record_strategy() -> impl Strategy<Value = CredentialRecord> {
        ("[a-z]{1,12}\\.(com|org|net)", field(), field(), any::<i64>(), any::<i64>()).prop_map(
            |(hostname, username, password, time_created, time_password_changed)| CredentialRecord {
                id: "rec".to_string(),
                hostname,
                username,
                password,
                http_realm: Some("realm".to_string()),
                time_created,
                time_password_changed,
                ..Default::default()
            },
        )
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(64))]

        #[test]
        fn unchanged_buffer_is_never_written(record in record_strategy()) {
            let mut gateway = RecordingGateway::with_record(record.clone());
            let mut session = CredentialEditSession::new(record.clone());
            let buffer = session.begin_edit().unwrap();

            let result = session.attempt_commit(buffer, &mut gateway).unwrap();
            prop_assert!(matches!(result, CommitResult::NoChange));
            prop_assert!(gateway.calls.is_empty());
            prop_assert_eq!(session.record(), &record);
        }

        #[test]
        fn changed_buffer_replaces_only_edited_fields(
            record in record_strategy(),
            username in field(),
            password in field(),
        ) {
            prop_assume!(username != record.username || password != record.password);
            let mut gateway = RecordingGateway::with_record(record.clone());
            let mut session = CredentialEditSession::new(record.clone());
            session.begin_edit().unwrap();

            let buffer = EditBuffer { username: username.clone(), password: password.clone() };
            let result = session.attempt_commit(buffer, &mut gateway).unwrap();
            prop_assert!(matches!(result, CommitResult::Committed(_)));

            let held = session.record();
            prop_assert_eq!(&held.username, &username);
            prop_assert_eq!(&held.password, &password);
            prop_assert_eq!(&held.id, &record.id);
            prop_assert_eq!(&held.hostname, &record.hostname);
            prop_assert_eq!(&held.http_realm, &record.http_realm);
            prop_assert_eq!(&held.form_submit_url, &record.form_submit_url);
            prop_assert_eq!(held.time_created, record.time_created);
            prop_assert_eq!(held.time_password_changed, record.time_password_changed);
            prop_assert_eq!(gateway.updates().len(), 1);
        }

        #[test]
        fn blank_hostname_is_always_rejected(
            mut record in record_strategy(),
            blank in "[ \t]{0,3}",
            password in field(),
        ) {
            record.hostname = blank;
            let mut gateway = RecordingGateway::with_record(record.clone());
            let mut session = CredentialEditSession::new(record.clone());
            session.begin_edit().unwrap();

            let buffer = EditBuffer { username: format!("{}-edited", record.username), password };
            let result = session.attempt_commit(buffer, &mut gateway).unwrap();
            prop_assert!(matches!(result, CommitResult::Rejected(ValidationError::EmptyHostname)));
            prop_assert!(gateway.calls.is_empty());
        }
    }
}
