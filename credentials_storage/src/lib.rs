use std::path::{Path, PathBuf};

use keyring::Entry;
use serde::Deserialize;

#[cfg(not(test))]
const SERVICE_NAME: &str = "collection-drain";
const USERNAME: &str = "firestore-service-account"; // Fixed username for all credentials

// Test-specific service name to avoid polluting production keyring
#[cfg(test)]
const TEST_SERVICE_NAME: &str = "collection-drain-test";

const PROJECT_ID_VARS: [&str; 2] = ["FIRESTORE_PROJECT_ID", "GOOGLE_CLOUD_PROJECT"];
const ACCESS_TOKEN_VAR: &str = "FIRESTORE_ACCESS_TOKEN";
const KEY_FILE_VAR: &str = "GOOGLE_APPLICATION_CREDENTIALS";

/// Get the appropriate service name based on build configuration
fn get_service_name() -> &'static str {
    #[cfg(test)]
    {
        TEST_SERVICE_NAME
    }
    #[cfg(not(test))]
    {
        SERVICE_NAME
    }
}

/// How to authenticate against Firestore.
#[derive(Clone, PartialEq, Eq)]
pub enum FirestoreCredentials {
    /// Short lived OAuth2 token with the datastore scope. Only ever taken from
    /// the environment, never stored.
    AccessToken {
        project_id: Option<String>,
        access_token: String,
    },
    /// Service account key file contents. Tokens are minted from it as needed.
    ServiceAccountKey { key_json: String },
}

impl std::fmt::Debug for FirestoreCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FirestoreCredentials::AccessToken { project_id, .. } => f
                .debug_struct("AccessToken")
                .field("project_id", project_id)
                .field("access_token", &"<redacted>")
                .finish(),
            FirestoreCredentials::ServiceAccountKey { .. } => f
                .debug_struct("ServiceAccountKey")
                .field("key_json", &"<redacted>")
                .finish(),
        }
    }
}

// Just enough of a service account key to reject files that are not one
#[derive(Deserialize)]
struct KeyShape {
    #[serde(rename = "client_email")]
    _client_email: String,
    #[serde(rename = "private_key")]
    _private_key: String,
}

fn validate_key_json(key_json: &str) -> Result<(), CredentialsError> {
    serde_json::from_str::<KeyShape>(key_json)?;
    Ok(())
}

/// Errors that can occur when working with credentials
#[derive(Debug, thiserror::Error)]
pub enum CredentialsError {
    #[error("Keyring error: {0}")]
    Keyring(#[from] keyring::Error),

    #[error("No credentials stored")]
    NoCredentials,

    #[error("Failed to serialize/deserialize credentials: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Failed to read key file '{path}': {source}")]
    KeyFile {
        path: String,
        source: std::io::Error,
    },
}

/// Store a service account key in the system keyring.
///
/// Only the long lived key is kept; access tokens are minted from it per run.
///
/// # Errors
///
/// Returns an error if the keyring is not accessible or the JSON is not a service account key.
pub fn store_service_account_key(key_json: &str) -> Result<(), CredentialsError> {
    validate_key_json(key_json)?;
    let entry = Entry::new(get_service_name(), USERNAME)?;
    entry.set_password(key_json)?;
    Ok(())
}

/// Load the service account key from the system keyring.
///
/// # Errors
///
/// Returns `CredentialsError::NoCredentials` if no key is stored.
/// Returns other errors if the keyring is not accessible or the stored key is corrupted.
pub fn load_service_account_key() -> Result<String, CredentialsError> {
    let entry = Entry::new(get_service_name(), USERNAME)?;
    match entry.get_password() {
        Ok(key_json) => {
            validate_key_json(&key_json)?;
            Ok(key_json)
        }
        Err(keyring::Error::NoEntry) => Err(CredentialsError::NoCredentials),
        Err(e) => Err(CredentialsError::Keyring(e)),
    }
}

/// Read a service account key file.
pub fn read_key_file(path: &Path) -> Result<String, CredentialsError> {
    let key_json = std::fs::read_to_string(path).map_err(|source| CredentialsError::KeyFile {
        path: path.display().to_string(),
        source,
    })?;
    validate_key_json(&key_json)?;
    Ok(key_json)
}

/// Resolve credentials from the process environment, an optional key file
/// and the system keyring.
///
/// # Errors
///
/// Returns `CredentialsError::NoCredentials` if no source has credentials.
pub fn load_credentials_with_fallback(
    key_file: Option<&Path>,
) -> Result<FirestoreCredentials, CredentialsError> {
    resolve_credentials(key_file, |name| std::env::var(name).ok(), load_service_account_key)
}

/// Pick credentials by precedence, most explicit first:
///
/// 1. `FIRESTORE_ACCESS_TOKEN` (project from `FIRESTORE_PROJECT_ID` or `GOOGLE_CLOUD_PROJECT`),
///    e.g. `FIRESTORE_ACCESS_TOKEN=$(gcloud auth print-access-token)`
/// 2. the given key file, else `GOOGLE_APPLICATION_CREDENTIALS`
/// 3. the service account key in the keyring
///
/// The keyring is only read when nothing else is configured.
pub fn resolve_credentials<F, K>(
    key_file: Option<&Path>,
    lookup: F,
    keyring: K,
) -> Result<FirestoreCredentials, CredentialsError>
where
    F: Fn(&str) -> Option<String>,
    K: FnOnce() -> Result<String, CredentialsError>,
{
    if let Some(credentials) = credentials_from_env(&lookup) {
        return Ok(credentials);
    }

    let key_file = key_file
        .map(Path::to_path_buf)
        .or_else(|| non_empty(&lookup, KEY_FILE_VAR).map(PathBuf::from));
    if let Some(path) = key_file {
        let key_json = read_key_file(&path)?;
        return Ok(FirestoreCredentials::ServiceAccountKey { key_json });
    }

    let key_json = keyring()?;
    Ok(FirestoreCredentials::ServiceAccountKey { key_json })
}

fn non_empty<F>(lookup: &F, name: &str) -> Option<String>
where
    F: Fn(&str) -> Option<String>,
{
    lookup(name).filter(|v| !v.trim().is_empty())
}

/// Access token credentials from environment style lookups. Empty values count as missing.
pub fn credentials_from_env<F>(lookup: F) -> Option<FirestoreCredentials>
where
    F: Fn(&str) -> Option<String>,
{
    let access_token = non_empty(&lookup, ACCESS_TOKEN_VAR)?;
    let project_id = PROJECT_ID_VARS
        .iter()
        .find_map(|name| non_empty(&lookup, name));

    Some(FirestoreCredentials::AccessToken {
        project_id,
        access_token,
    })
}

/// Delete the stored service account key from the system keyring.
///
/// This operation is idempotent - deleting already-deleted credentials succeeds.
pub fn delete_credentials() -> Result<(), CredentialsError> {
    let entry = Entry::new(get_service_name(), USERNAME)?;
    match entry.delete_credential() {
        Ok(_) => Ok(()),
        Err(keyring::Error::NoEntry) => Ok(()), // Already deleted
        Err(e) => Err(CredentialsError::Keyring(e)),
    }
}

/// Check if a service account key is currently stored in the keyring.
///
/// Environment variables are not consulted.
pub fn has_credentials() -> Result<bool, CredentialsError> {
    match load_service_account_key() {
        Ok(_) => Ok(true),
        Err(CredentialsError::NoCredentials) => Ok(false),
        Err(e) => Err(e),
    }
}
