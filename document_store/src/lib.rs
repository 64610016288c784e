// Firestore access needs:
// - project id (FIRESTORE_PROJECT_ID, --project-id or the service account key)
// - a bearer token, either minted from a service account key
//   (--credentials, GOOGLE_APPLICATION_CREDENTIALS or system keyring)
//   or a short lived one from FIRESTORE_ACCESS_TOKEN
// - or FIRESTORE_EMULATOR_HOST pointing at a local emulator, in which case no token is needed
//

pub mod auth;
pub mod firestore;
pub mod mock;
pub mod ops;

pub use auth::{ServiceAccountKey, ServiceAccountTokenProvider, StaticToken, TokenProvider};
pub use firestore::{FirestoreSettings, FirestoreStore};
pub use ops::DocumentStoreOps;

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum StoreError {
    #[error("Transaction too large: {0}")]
    TransactionTooLarge(String),

    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    #[error("Unauthenticated: {0}")]
    Unauthenticated(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Backend error ({status}): {message}")]
    Backend { status: String, message: String },

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Failed to decode response: {0}")]
    Decode(String),
}

impl StoreError {
    pub fn is_transaction_too_large(&self) -> bool {
        matches!(self, StoreError::TransactionTooLarge(_))
    }
}

impl From<serde_json::Error> for StoreError {
    fn from(err: serde_json::Error) -> Self {
        StoreError::Decode(err.to_string())
    }
}

impl From<surf::Error> for StoreError {
    fn from(err: surf::Error) -> Self {
        StoreError::Transport(err.to_string())
    }
}
