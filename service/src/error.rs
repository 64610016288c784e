use std::fmt::{Display, Formatter, Result};

use credentials_storage::CredentialsError;
use document_store::StoreError;

#[derive(Debug, Clone, PartialEq)]
pub enum Error {
    StoreError(StoreError),
    CredentialsError(String),
    SettingsError(String),
    InvalidInput(String),
}

impl Display for Error {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result {
        match self {
            Error::StoreError(error) => write!(f, "Document store error: {}", error),
            Error::CredentialsError(message) => write!(f, "Credentials error: {}", message),
            Error::SettingsError(message) => write!(f, "Settings error: {}", message),
            Error::InvalidInput(message) => write!(f, "Invalid input: {}", message),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::StoreError(error) => Some(error),
            _ => None,
        }
    }
}

impl From<StoreError> for Error {
    fn from(err: StoreError) -> Self {
        Error::StoreError(err)
    }
}

impl From<CredentialsError> for Error {
    fn from(err: CredentialsError) -> Self {
        Error::CredentialsError(err.to_string())
    }
}

impl From<core_types::CoreTypeError> for Error {
    fn from(err: core_types::CoreTypeError) -> Self {
        Error::InvalidInput(err.to_string())
    }
}
