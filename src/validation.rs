// src/validation.rs
use crate::error::{UrlError, ValidationError};
use crate::models::CredentialRecord;
use url::Url;

const DEFAULT_SCHEME: &str = "https";

/// Resolves a stored hostname (or form submit URL) into an absolute URL.
/// Bare hosts such as `example.com` get the `https` scheme.
pub fn resolve_url(raw: &str) -> Result<Url, UrlError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(UrlError::Empty);
    }
    let candidate = if trimmed.contains("://") {
        trimmed.to_string()
    } else {
        format!("{}://{}", DEFAULT_SCHEME, trimmed)
    };
    let url = Url::parse(&candidate)?;
    match url.host_str() {
        Some(host) if !host.is_empty() => Ok(url),
        _ => Err(UrlError::MissingHost),
    }
}

/// Checks that a candidate credential is still well-formed enough to be stored.
///
/// Empty usernames and empty passwords are allowed.
pub fn validate_record(record: &CredentialRecord) -> Result<(), ValidationError> {
    if record.hostname.trim().is_empty() {
        return Err(ValidationError::EmptyHostname);
    }
    resolve_url(&record.hostname).map_err(|reason| ValidationError::InvalidHostname {
        hostname: record.hostname.clone(),
        reason,
    })?;

    if record.http_realm.is_some() && record.form_submit_url.is_some() {
        return Err(ValidationError::ConflictingTargets);
    }

    if record.username.contains('\0') {
        return Err(ValidationError::IllegalFieldValue("username"));
    }
    if record.password.contains('\0') {
        return Err(ValidationError::IllegalFieldValue("password"));
    }
    Ok(())
}
