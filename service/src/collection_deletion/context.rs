use std::path::Path;
use std::sync::Arc;

use async_std::channel::Sender;
use core_types::{CollectionPath, DeletionEvent};
use credentials_storage::{CredentialsError, FirestoreCredentials};
use document_store::{DocumentStoreOps, FirestoreSettings};

use crate::{collection_deletion::model::DrainReport, settings::DeletionSettings};

/// Resolves credentials, given an explicit service account key file if one was configured
pub type CredentialsLoader = fn(Option<&Path>) -> Result<FirestoreCredentials, CredentialsError>;

/// Context object that flows through the pipeline, accumulating state
pub struct DeletionContext {
    pub collection: CollectionPath,
    pub settings: DeletionSettings,
    pub firestore_settings: FirestoreSettings,
    pub credentials_loader: CredentialsLoader,
    pub progress_tx: Option<Sender<DeletionEvent>>,

    // Lazy initialized by ConnectToStoreStep unless a store was injected.
    // Trait object so tests can run against a mock store.
    pub store: Option<Arc<dyn DocumentStoreOps>>,

    pub report: DrainReport,
}

impl DeletionContext {
    pub fn new(
        collection: CollectionPath,
        settings: DeletionSettings,
        firestore_settings: FirestoreSettings,
    ) -> Self {
        Self {
            collection,
            settings,
            firestore_settings,
            credentials_loader: credentials_storage::load_credentials_with_fallback,
            progress_tx: None,
            store: None,
            report: DrainReport::default(),
        }
    }
}
