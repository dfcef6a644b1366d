// src/error.rs
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CryptoError {
    #[error("Argon2 key derivation failed: {0}")]
    Argon2(String),
    #[error("ChaCha20Poly1305 operation failed: {0}")]
    ChaCha(String),
}

#[derive(Debug, Error)]
pub enum AppError {
    #[error("Cryptography error: {0}")]
    Crypto(#[from] CryptoError),
    #[error("Storage error: {0}")]
    Store(#[from] StoreError),
    #[error("TUI error: {0}")]
    Tui(#[from] TuiError),
    #[error("CLI error: {0}")]
    Cli(String),
}

#[derive(Debug, Error)]
pub enum TuiError {
    #[error("Terminal I/O error: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("File I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Serialization error: {0}")]
    Serialization(String),
    #[error("Deserialization error: {0}")]
    Deserialization(String),
    #[error("Data format error: {0}")]
    FormatError(String),
    #[error("Cryptography error during store operation: {0}")]
    Crypto(#[from] CryptoError),
    #[error("No credential with id {0}")]
    NotFound(String),
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum UrlError {
    #[error("empty value")]
    Empty,
    #[error(transparent)]
    Parse(#[from] url::ParseError),
    #[error("no host")]
    MissingHost,
}

/// Reasons a candidate credential is refused before it reaches the store.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Hostname cannot be empty")]
    EmptyHostname,
    #[error("Hostname {hostname:?} is not a usable origin: {reason}")]
    InvalidHostname { hostname: String, reason: UrlError },
    #[error("A credential cannot target both an HTTP realm and a form submit URL")]
    ConflictingTargets,
    #[error("Field {0} contains an illegal character")]
    IllegalFieldValue(&'static str),
}

#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum SessionError {
    #[error("Edit mode is already active")]
    AlreadyEditing,
    #[error("No edit in progress")]
    NotEditing,
}

#[derive(Debug, Error)]
pub enum ScreenError {
    #[error(transparent)]
    Session(#[from] SessionError),
    #[error("No delete confirmation is pending")]
    NoDeletePending,
    #[error("Action {action:?} is not available for the {row:?} row")]
    UnsupportedAction {
        row: crate::screen::DetailRow,
        action: crate::screen::MenuAction,
    },
    #[error("Clipboard error: {0}")]
    Clipboard(String),
}

pub type AppResult<T> = Result<T, AppError>;
pub type CryptoResult<T> = Result<T, CryptoError>;
pub type StoreResult<T> = Result<T, StoreError>;
pub type GatewayResult<T> = Result<T, StoreError>;
pub type ScreenResult<T> = Result<T, ScreenError>;
