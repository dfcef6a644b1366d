// src/gateway.rs
use crate::config::Argon2Params;
use crate::error::{GatewayResult, StoreError};
use crate::models::{CredentialRecord, CredentialStore};
use crate::store;
use chrono::Utc;
use log;
use std::path::PathBuf;

/// What the detail screen needs from the credential store.
///
/// Completions are delivered on the caller's thread.
pub trait CredentialGateway {
    /// `Ok(None)` means the record no longer exists.
    fn fetch_by_id(&mut self, id: &str) -> GatewayResult<Option<CredentialRecord>>;
    fn update(&mut self, id: &str, record: &CredentialRecord) -> GatewayResult<()>;
    fn delete(&mut self, id: &str) -> GatewayResult<()>;
    /// Only used to phrase the delete confirmation.
    fn has_ever_synced(&mut self) -> GatewayResult<bool>;
}

/// Gateway over the encrypted store file. Every call reads the file fresh so changes
/// written by another process (e.g. a sync) are picked up.
pub struct FileGateway {
    filepath: PathBuf,
    master_password: String,
    argon2_params: Argon2Params,
}

impl FileGateway {
    pub fn new(filepath: PathBuf, master_password: String, argon2_params: Argon2Params) -> Self {
        FileGateway { filepath, master_password, argon2_params }
    }

    fn load(&self) -> GatewayResult<CredentialStore> {
        store::load_store(&self.master_password, &self.filepath, &self.argon2_params)
    }

    fn save(&self, credentials: &CredentialStore) -> GatewayResult<()> {
        store::save_store(credentials, &self.master_password, &self.filepath, &self.argon2_params)
    }
}

impl CredentialGateway for FileGateway {
    fn fetch_by_id(&mut self, id: &str) -> GatewayResult<Option<CredentialRecord>> {
        let credentials = self.load()?;
        let found = credentials.find(id).cloned();
        if found.is_none() {
            log::info!("Credential {} not found in {:?}", id, self.filepath);
        }
        Ok(found)
    }

    fn update(&mut self, id: &str, record: &CredentialRecord) -> GatewayResult<()> {
        let mut credentials = self.load()?;
        let stored = credentials.find_mut(id).ok_or_else(|| {
            log::warn!("Update requested for unknown credential {}", id);
            StoreError::NotFound(id.to_string())
        })?;

        let password_changed = stored.password != record.password;
        let time_created = stored.time_created;
        let previous_change = stored.time_password_changed;
        *stored = CredentialRecord {
            id: id.to_string(),
            time_created,
            time_password_changed: if password_changed { Utc::now().timestamp_millis() } else { previous_change },
            ..record.clone()
        };

        self.save(&credentials)?;
        log::info!("Updated credential {} (password changed: {})", id, password_changed);
        Ok(())
    }

    fn delete(&mut self, id: &str) -> GatewayResult<()> {
        let mut credentials = self.load()?;
        if credentials.remove(id).is_none() {
            log::warn!("Delete requested for unknown credential {}", id);
            return Err(StoreError::NotFound(id.to_string()));
        }
        self.save(&credentials)?;
        log::info!("Deleted credential {}", id);
        Ok(())
    }

    fn has_ever_synced(&mut self) -> GatewayResult<bool> {
        Ok(self.load()?.last_synced.is_some())
    }
}


#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::tests::fast_params;
    use tempfile::TempDir;

    const MASTER: &str = "master";

    fn seeded_gateway(synced: bool) -> (TempDir, FileGateway, CredentialRecord) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("logins.enc");
        let record = CredentialRecord {
            id: "1".to_string(),
            hostname: "example.com".to_string(),
            username: "a".to_string(),
            password: "p1".to_string(),
            time_created: 1_000,
            time_password_changed: 1_000,
            ..Default::default()
        };
        let mut credentials = CredentialStore::new();
        credentials.add_record(record.clone());
        if synced {
            credentials.last_synced = Some(5_000);
        }
        store::save_store(&credentials, MASTER, &path, &fast_params()).unwrap();
        (dir, FileGateway::new(path, MASTER.to_string(), fast_params()), record)
    }

    #[test]
    fn test_fetch_by_id_found_and_missing() {
        let (_dir, mut gateway, record) = seeded_gateway(false);
        assert_eq!(gateway.fetch_by_id("1").unwrap(), Some(record));
        assert_eq!(gateway.fetch_by_id("nope").unwrap(), None);
    }

    #[test]
    fn test_update_password_bumps_change_time() {
        let (_dir, mut gateway, record) = seeded_gateway(false);
        let edited = CredentialRecord { password: "p2".to_string(), ..record };
        gateway.update("1", &edited).unwrap();

        let stored = gateway.fetch_by_id("1").unwrap().unwrap();
        assert_eq!(stored.password, "p2");
        assert_eq!(stored.time_created, 1_000);
        assert!(stored.time_password_changed > 1_000);
    }

    #[test]
    fn test_update_username_only_keeps_change_time() {
        let (_dir, mut gateway, record) = seeded_gateway(false);
        let edited = CredentialRecord { username: "b".to_string(), ..record };
        gateway.update("1", &edited).unwrap();

        let stored = gateway.fetch_by_id("1").unwrap().unwrap();
        assert_eq!(stored.username, "b");
        assert_eq!(stored.time_password_changed, 1_000);
    }

    #[test]
    fn test_update_and_delete_unknown_id() {
        let (_dir, mut gateway, record) = seeded_gateway(false);
        match gateway.update("missing", &record) {
            Err(StoreError::NotFound(id)) => assert_eq!(id, "missing"),
            other => panic!("Expected NotFound, got {:?}", other),
        }
        assert!(matches!(gateway.delete("missing"), Err(StoreError::NotFound(_))));
    }

    #[test]
    fn test_delete_removes_record() {
        let (_dir, mut gateway, _record) = seeded_gateway(false);
        gateway.delete("1").unwrap();
        assert_eq!(gateway.fetch_by_id("1").unwrap(), None);
    }

    #[test]
    fn test_has_ever_synced_reflects_store_metadata() {
        let (_dir, mut never, _) = seeded_gateway(false);
        let (_dir2, mut synced, _) = seeded_gateway(true);
        assert!(!never.has_ever_synced().unwrap());
        assert!(synced.has_ever_synced().unwrap());
    }

    #[test]
    fn test_wrong_master_password_is_a_gateway_error() {
        let (dir, _gateway, _) = seeded_gateway(false);
        let mut gateway = FileGateway::new(dir.path().join("logins.enc"), "wrong".to_string(), fast_params());
        assert!(matches!(gateway.fetch_by_id("1"), Err(StoreError::Crypto(_))));
    }
}
