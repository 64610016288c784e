use std::sync::Arc;

use async_std::channel::Sender;
use core_types::{CollectionPath, DeletionEvent};
use document_store::{DocumentStoreOps, FirestoreSettings};

use crate::{
    collection_deletion::{context::DeletionContext, model::DrainReport},
    error::Error,
    pipeline::Pipeline,
    settings::DeletionSettings,
};

pub struct CollectionDeletionService {
    settings: DeletionSettings,
    firestore_settings: FirestoreSettings,
    store: Option<Arc<dyn DocumentStoreOps>>,
}

impl CollectionDeletionService {
    /// Service that connects to Firestore on first use.
    pub fn new(settings: DeletionSettings, firestore_settings: FirestoreSettings) -> Self {
        Self {
            settings,
            firestore_settings,
            store: None,
        }
    }

    /// Service working against an already constructed store.
    pub fn new_with_store(settings: DeletionSettings, store: Arc<dyn DocumentStoreOps>) -> Self {
        Self {
            settings,
            firestore_settings: FirestoreSettings::default(),
            store: Some(store),
        }
    }

    #[tracing::instrument(skip_all, fields(collection = %collection))]
    pub async fn delete_collection(
        &self,
        collection: &CollectionPath,
        progress_tx: Option<Sender<DeletionEvent>>,
    ) -> Result<DrainReport, Error> {
        tracing::info!(
            batch_size = self.settings.batch_size,
            "Starting deletion of collection '{}'",
            collection
        );

        let mut context = DeletionContext::new(
            collection.clone(),
            self.settings.clone(),
            self.firestore_settings.clone(),
        );
        context.store = self.store.clone();
        context.progress_tx = progress_tx;

        let pipeline = Pipeline::<DeletionContext>::new();
        pipeline.execute(&mut context).await?;

        let report = context.report;
        tracing::info!(
            total_deleted = report.total_deleted,
            batches = report.batches_committed,
            batch_size_reductions = report.batch_size_reductions,
            final_batch_size = report.final_batch_size,
            "Collection deletion summary"
        );

        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use document_store::{StoreError, mock::MockDocumentStore};
    use tracing::Level;
    use tracing_subscriber::layer::SubscriberExt;

    use super::*;
    use crate::test_support::LevelRecorder;

    fn settings(batch_size: usize) -> DeletionSettings {
        DeletionSettings {
            batch_size,
            pacing_interval: Duration::ZERO,
        }
    }

    #[async_std::test]
    async fn test_delete_collection_with_mock_store() {
        let store = MockDocumentStore::new();
        store.add_documents("users/alice/orders", 42);
        store.add_documents("users", 3);
        let service = CollectionDeletionService::new_with_store(settings(10), Arc::new(store.clone()));

        let collection = CollectionPath::parse("users/alice/orders").unwrap();
        let report = service.delete_collection(&collection, None).await.unwrap();

        assert_eq!(report.total_deleted, 42);
        assert_eq!(report.batches_committed, 5);
        assert_eq!(store.remaining_count("users/alice/orders"), 0);
        assert_eq!(store.remaining_count("users"), 3);
    }

    #[async_std::test]
    async fn test_delete_collection_reports_store_error() {
        let store = MockDocumentStore::new();
        store.add_documents("users", 30);
        store.fail_commit_at(3, StoreError::PermissionDenied("denied".to_string()));
        let service = CollectionDeletionService::new_with_store(settings(10), Arc::new(store.clone()));

        let collection = CollectionPath::parse("users").unwrap();
        let result = service.delete_collection(&collection, None).await;

        assert_eq!(
            result,
            Err(Error::StoreError(StoreError::PermissionDenied(
                "denied".to_string()
            )))
        );
        assert_eq!(store.remaining_count("users"), 10);

        // Running again resumes from what is left
        store.clear_failures();
        let report = service.delete_collection(&collection, None).await.unwrap();
        assert_eq!(report.total_deleted, 10);
        assert_eq!(store.remaining_count("users"), 0);
    }

    #[async_std::test]
    async fn test_invalid_settings_fail_before_store_access() {
        let store = MockDocumentStore::new();
        store.add_documents("users", 3);
        let service = CollectionDeletionService::new_with_store(settings(0), Arc::new(store.clone()));

        let collection = CollectionPath::parse("users").unwrap();
        let result = service.delete_collection(&collection, None).await;

        assert!(matches!(result, Err(Error::InvalidInput(_))));
        assert!(store.queries().is_empty());
    }

    #[async_std::test]
    async fn test_progress_channel_receives_events() {
        let store = MockDocumentStore::new();
        store.add_documents("users", 3);
        let service = CollectionDeletionService::new_with_store(settings(2), Arc::new(store));
        let (tx, rx) = async_std::channel::unbounded();

        let collection = CollectionPath::parse("users").unwrap();
        service.delete_collection(&collection, Some(tx)).await.unwrap();

        let mut batch_events = 0;
        while let Ok(event) = rx.try_recv() {
            if matches!(event, DeletionEvent::BatchDeleted { .. }) {
                batch_events += 1;
            }
        }
        assert_eq!(batch_events, 2);
    }

    #[test]
    fn test_fatal_error_is_logged_once() {
        let store = MockDocumentStore::new();
        store.add_documents("users", 30);
        store.fail_commit_at(2, StoreError::PermissionDenied("denied".to_string()));
        let service = CollectionDeletionService::new_with_store(settings(10), Arc::new(store));

        let recorder = LevelRecorder::default();
        let subscriber = tracing_subscriber::registry().with(recorder.clone());
        let collection = CollectionPath::parse("users").unwrap();
        let result = tracing::subscriber::with_default(subscriber, || {
            async_std::task::block_on(service.delete_collection(&collection, None))
        });

        assert!(result.is_err());
        assert_eq!(recorder.count(Level::ERROR), 1);
        assert_eq!(recorder.count(Level::WARN), 0);
    }
}
