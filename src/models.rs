// src/models.rs
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

const REDACTED: &str = "<redacted>";

/// A stored site/username/password tuple plus the metadata used for auto-fill matching.
#[derive(Serialize, Deserialize, Clone, PartialEq, Eq, Default)]
pub struct CredentialRecord {
    pub id: String,
    pub hostname: String,
    pub username: String,
    pub password: String,
    pub http_realm: Option<String>,
    pub form_submit_url: Option<String>,
    pub username_field: Option<String>,
    pub password_field: Option<String>,
    /// Epoch milliseconds.
    pub time_created: i64,
    /// Epoch milliseconds.
    pub time_password_changed: i64,
}

impl CredentialRecord {
    pub fn new(hostname: String, username: String, password: String) -> Self {
        let now = Utc::now().timestamp_millis();
        Self {
            id: Uuid::new_v4().to_string(),
            hostname,
            username,
            password,
            time_created: now,
            time_password_changed: now,
            ..Default::default()
        }
    }

    /// Builds the record an edit would produce: same identity and metadata, new
    /// username and password.
    pub fn with_edits(&self, buffer: &EditBuffer) -> Self {
        Self {
            username: buffer.username.clone(),
            password: buffer.password.clone(),
            ..self.clone()
        }
    }
}

impl fmt::Debug for CredentialRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CredentialRecord")
            .field("id", &self.id)
            .field("hostname", &self.hostname)
            .field("username", &self.username)
            .field("password", &REDACTED)
            .field("http_realm", &self.http_realm)
            .field("form_submit_url", &self.form_submit_url)
            .field("username_field", &self.username_field)
            .field("password_field", &self.password_field)
            .field("time_created", &self.time_created)
            .field("time_password_changed", &self.time_password_changed)
            .finish()
    }
}

/// The two fields the detail screen lets the user change.
#[derive(Clone, PartialEq, Eq, Default)]
pub struct EditBuffer {
    pub username: String,
    pub password: String,
}

impl EditBuffer {
    pub fn matches(&self, record: &CredentialRecord) -> bool {
        self.username == record.username && self.password == record.password
    }
}

impl fmt::Debug for EditBuffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EditBuffer")
            .field("username", &self.username)
            .field("password", &REDACTED)
            .finish()
    }
}

/// A known data breach affecting the credential's domain. Supplied by the host, never
/// stored alongside the credential.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct BreachRecord {
    pub name: String,
    pub domain: String,
    pub breach_date: String,
    pub description: String,
}

#[derive(Serialize, Deserialize, Debug, Default)]
pub struct CredentialStore {
    pub records: Vec<CredentialRecord>,
    /// Epoch milliseconds of the last successful sync; `None` if never synced.
    pub last_synced: Option<i64>,
}

impl CredentialStore {
    pub fn new() -> Self {
        CredentialStore::default()
    }

    pub fn add_record(&mut self, record: CredentialRecord) {
        self.records.push(record);
    }

    pub fn find(&self, id: &str) -> Option<&CredentialRecord> {
        self.records.iter().find(|r| r.id == id)
    }

    pub fn find_mut(&mut self, id: &str) -> Option<&mut CredentialRecord> {
        self.records.iter_mut().find(|r| r.id == id)
    }

    pub fn remove(&mut self, id: &str) -> Option<CredentialRecord> {
        let index = self.records.iter().position(|r| r.id == id)?;
        Some(self.records.remove(index))
    }
}
