// src/store.rs
use crate::config::Argon2Params;
use crate::crypto::{self, NONCE_LEN, SALT_LEN};
use crate::error::{StoreError, StoreResult};
use crate::models::CredentialStore;
use log;
use std::fs::{File, OpenOptions};
use std::io::{Read, Write};
use std::path::Path;

/// Saves the credential store to a file, encrypting it with a key derived from the
/// master password.
///
/// The file format is:
/// [SALT (SALT_LEN bytes)] [NONCE (NONCE_LEN bytes)] [ENCRYPTED DATA (...)]
pub fn save_store(store: &CredentialStore, master_password: &str, filepath: &Path, argon2_config: &Argon2Params) -> StoreResult<()> {
    log::info!("Attempting to save store to {:?}", filepath);
    let salt = crypto::generate_salt();
    let key = crypto::derive_store_key(master_password, &salt, argon2_config)?;

    let serialized_data = bincode::serialize(store).map_err(|e| {
        let msg = format!("Bincode serialization failed: {}", e);
        log::error!("save_store: {}", msg);
        StoreError::Serialization(msg)
    })?;

    let nonce = crypto::generate_nonce();
    let encrypted_data = crypto::encrypt_data(&serialized_data, &key, &nonce)?;

    let mut file = OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(true)
        .open(filepath)
        .map_err(|e| {
            log::error!("Failed to open file {:?} for writing: {:?}", filepath, e);
            StoreError::Io(e)
        })?;

    file.write_all(&salt).map_err(|e| { log::error!("Failed to write salt to {:?}: {:?}", filepath, e); e })?;
    file.write_all(&nonce).map_err(|e| { log::error!("Failed to write nonce to {:?}: {:?}", filepath, e); e })?;
    file.write_all(&encrypted_data).map_err(|e| { log::error!("Failed to write encrypted data to {:?}: {:?}", filepath, e); e })?;

    log::info!("Credential store saved successfully to {:?} ({} records)", filepath, store.records.len());
    Ok(())
}

/// Loads the credential store from a file, decrypting it with a key derived from the
/// master password.
pub fn load_store(master_password: &str, filepath: &Path, argon2_config: &Argon2Params) -> StoreResult<CredentialStore> {
    log::info!("Attempting to load store from {:?}", filepath);
    let mut file = File::open(filepath).map_err(|e| {
        log::warn!("Failed to open store file {:?}: {:?}", filepath, e);
        StoreError::Io(e)
    })?;

    let mut file_contents = Vec::new();
    file.read_to_end(&mut file_contents).map_err(|e| {
        log::error!("Failed to read store file {:?}: {:?}", filepath, e);
        StoreError::Io(e)
    })?;

    if file_contents.len() < SALT_LEN + NONCE_LEN {
        let msg = format!("File {:?} is too short to contain salt and nonce (len: {})", filepath, file_contents.len());
        log::error!("load_store: {}", msg);
        return Err(StoreError::FormatError(msg));
    }
    let salt = &file_contents[..SALT_LEN];
    let mut nonce = [0u8; NONCE_LEN];
    nonce.copy_from_slice(&file_contents[SALT_LEN..SALT_LEN + NONCE_LEN]);
    let encrypted_data = &file_contents[SALT_LEN + NONCE_LEN..];

    let key = crypto::derive_store_key(master_password, salt, argon2_config)?;
    let decrypted_data = crypto::decrypt_data(encrypted_data, &key, &nonce).map_err(|crypto_err| {
        log::warn!("Decryption failed for store {:?}. Wrong password or corrupted data?", filepath);
        StoreError::Crypto(crypto_err)
    })?;

    let store: CredentialStore = bincode::deserialize(&decrypted_data).map_err(|e| {
        let msg = format!("Bincode deserialization failed: {}", e);
        log::error!("load_store: {}", msg);
        StoreError::Deserialization(msg)
    })?;

    log::info!("Credential store loaded successfully from {:?} ({} records)", filepath, store.records.len());
    Ok(store)
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::error::CryptoError;
    use crate::models::CredentialRecord;
    use std::fs;
    use tempfile::NamedTempFile;

    pub(crate) fn fast_params() -> Argon2Params {
        Argon2Params { m_cost: 256, t_cost: 1, p_cost: 1 }
    }

    fn create_test_store() -> CredentialStore {
        let mut store = CredentialStore::new();
        store.add_record(CredentialRecord {
            id: "1".to_string(),
            hostname: "https://example.com".to_string(),
            username: "alice".to_string(),
            password: "p1".to_string(),
            form_submit_url: Some("https://example.com/login".to_string()),
            time_created: 1_600_000_000_000,
            time_password_changed: 1_600_000_000_000,
            ..Default::default()
        });
        store.add_record(CredentialRecord {
            id: "2".to_string(),
            hostname: "https://intranet.example.org".to_string(),
            username: "bob".to_string(),
            password: "p2".to_string(),
            http_realm: Some("Staff".to_string()),
            ..Default::default()
        });
        store.last_synced = Some(1_650_000_000_000);
        store
    }

    #[test]
    fn test_save_and_load_store_successfully() {
        let temp_file = NamedTempFile::new().expect("Failed to create temp file");
        let filepath = temp_file.path();
        let original_store = create_test_store();

        save_store(&original_store, "securepassword123", filepath, &fast_params()).expect("Failed to save store");
        let loaded_store = load_store("securepassword123", filepath, &fast_params()).expect("Failed to load store");

        assert_eq!(original_store.records, loaded_store.records);
        assert_eq!(loaded_store.last_synced, Some(1_650_000_000_000));
    }

    #[test]
    fn test_load_store_wrong_password() {
        let temp_file = NamedTempFile::new().expect("Failed to create temp file");
        let filepath = temp_file.path();
        save_store(&create_test_store(), "correctpassword", filepath, &fast_params()).expect("Saving failed");

        match load_store("wrongpassword", filepath, &fast_params()) {
            Err(StoreError::Crypto(CryptoError::ChaCha(_))) => {}
            other => panic!("Expected a ChaCha error due to wrong password, but got {:?}", other),
        }
    }

    #[test]
    fn test_load_store_tampered_file_data() {
        let temp_file = NamedTempFile::new().expect("Failed to create temp file");
        let filepath = temp_file.path();
        save_store(&create_test_store(), "securepassword", filepath, &fast_params()).expect("Saving failed");

        let mut contents = fs::read(filepath).expect("Reading file failed");
        contents[SALT_LEN + NONCE_LEN] = !contents[SALT_LEN + NONCE_LEN];
        fs::write(filepath, contents).expect("Writing tampered file failed");

        match load_store("securepassword", filepath, &fast_params()) {
            Err(StoreError::Crypto(CryptoError::ChaCha(_))) => {}
            other => panic!("Expected ChaCha error due to tampered data, got {:?}", other),
        }
    }

    #[test]
    fn test_save_and_load_empty_store() {
        let temp_file = NamedTempFile::new().expect("Failed to create temp file");
        let filepath = temp_file.path();

        save_store(&CredentialStore::new(), "emptypassword", filepath, &fast_params()).expect("Failed to save empty store");
        let loaded_store = load_store("emptypassword", filepath, &fast_params()).expect("Failed to load empty store");

        assert!(loaded_store.records.is_empty());
        assert!(loaded_store.last_synced.is_none());
    }

    #[test]
    fn test_load_non_existent_file() {
        let dir = tempfile::tempdir().unwrap();
        let filepath = dir.path().join("missing.enc");
        match load_store("anypassword", &filepath, &fast_params()) {
            Err(StoreError::Io(_)) => {}
            other => panic!("Expected Io error for non-existent file, got {:?}", other),
        }
    }

    #[test]
    fn test_load_too_short_file() {
        let temp_file = NamedTempFile::new().expect("Failed to create temp file");
        let filepath = temp_file.path();
        fs::write(filepath, b"short").expect("Failed to write short file");

        match load_store("anypassword", filepath, &fast_params()) {
            Err(StoreError::FormatError(msg)) => assert!(msg.contains("too short")),
            other => panic!("Expected FormatError for too short file, got {:?}", other),
        }
    }
}
