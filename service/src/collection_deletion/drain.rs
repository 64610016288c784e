use async_std::channel::Sender;
use async_std::task;
use core_types::{CollectionPath, DeletionEvent, DrainState};
use document_store::DocumentStoreOps;

use crate::{
    collection_deletion::model::DrainReport,
    error::Error,
    settings::{DeletionSettings, MIN_BATCH_SIZE},
};

async fn notify(progress_tx: Option<&Sender<DeletionEvent>>, event: DeletionEvent) {
    if let Some(tx) = progress_tx {
        tx.send(event).await.ok();
    }
}

/// Delete every document in `collection`, one batch per cycle, until a query
/// comes back empty.
///
/// A commit rejected as too large halves the batch size and retries from the
/// same point without pacing. Any other store error ends the run and is
/// returned as is; batches committed before it stay deleted, so running the
/// drain again picks up where it stopped.
pub async fn drain_collection(
    store: &dyn DocumentStoreOps,
    collection: &CollectionPath,
    settings: &DeletionSettings,
    progress_tx: Option<&Sender<DeletionEvent>>,
) -> Result<DrainReport, Error> {
    settings.validate()?;

    let mut report = DrainReport::new(settings.batch_size);
    notify(
        progress_tx,
        DeletionEvent::DrainStarted {
            collection: collection.to_string(),
            batch_size: settings.batch_size,
        },
    )
    .await;

    match run_cycles(store, collection, settings, progress_tx, &mut report).await {
        Ok(()) => {
            tracing::info!(
                collection = %collection,
                total_deleted = report.total_deleted,
                batches = report.batches_committed,
                "Collection drained"
            );
            notify(
                progress_tx,
                DeletionEvent::DrainCompleted {
                    total_deleted: report.total_deleted,
                    batches: report.batches_committed,
                },
            )
            .await;
            Ok(report)
        }
        Err(error) => {
            notify(
                progress_tx,
                DeletionEvent::DrainFailed {
                    error: error.to_string(),
                    total_deleted: report.total_deleted,
                },
            )
            .await;
            Err(error)
        }
    }
}

async fn run_cycles(
    store: &dyn DocumentStoreOps,
    collection: &CollectionPath,
    settings: &DeletionSettings,
    progress_tx: Option<&Sender<DeletionEvent>>,
    report: &mut DrainReport,
) -> Result<(), Error> {
    let mut batch_size = settings.batch_size;

    loop {
        tracing::debug!(state = %DrainState::Querying, batch_size);
        let documents = store.query_limited(collection, batch_size).await?;

        if documents.is_empty() {
            tracing::debug!(state = %DrainState::Done, "No documents left");
            return Ok(());
        }

        let count = documents.len();
        tracing::debug!(state = %DrainState::Committing, count);

        match store.commit_delete_batch(&documents).await {
            Ok(()) => {
                report.record_batch(count);
                tracing::info!(
                    collection = %collection,
                    total_deleted = report.total_deleted,
                    "Deleted batch of {} documents",
                    count
                );
                notify(
                    progress_tx,
                    DeletionEvent::BatchDeleted {
                        count,
                        total_deleted: report.total_deleted,
                        batch_number: report.batches_committed,
                    },
                )
                .await;

                tracing::debug!(state = %DrainState::PacedWait, pacing = ?settings.pacing_interval);
                task::sleep(settings.pacing_interval).await;
            }
            Err(error) if error.is_transaction_too_large() && batch_size > MIN_BATCH_SIZE => {
                let reduced = (batch_size / 2).max(MIN_BATCH_SIZE);
                tracing::info!(
                    from = batch_size,
                    to = reduced,
                    reason = %error,
                    "Batch too large, reducing batch size and retrying"
                );
                report.record_reduction(reduced);
                notify(
                    progress_tx,
                    DeletionEvent::BatchSizeReduced {
                        from: batch_size,
                        to: reduced,
                    },
                )
                .await;
                batch_size = reduced;
            }
            Err(error) => {
                // Reported once by the caller
                tracing::debug!(
                    state = %DrainState::Failed,
                    batch_size,
                    total_deleted = report.total_deleted
                );
                return Err(Error::StoreError(error));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;
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

    fn users() -> CollectionPath {
        CollectionPath::parse("users").unwrap()
    }

    #[async_std::test]
    async fn test_drains_250_documents_in_three_batches() {
        let store = MockDocumentStore::new();
        store.add_documents("users", 250);

        let report = drain_collection(&store, &users(), &settings(100), None)
            .await
            .unwrap();

        assert_eq!(store.successful_commit_sizes(), vec![100, 100, 50]);
        assert_eq!(store.query_limits(), vec![100, 100, 100, 100]);
        assert_eq!(store.remaining_count("users"), 0);
        assert_eq!(report.total_deleted, 250);
        assert_eq!(report.batches_committed, 3);
        assert_eq!(report.batch_size_reductions, 0);
        assert_eq!(report.final_batch_size, 100);
    }

    #[async_std::test]
    async fn test_empty_collection_finishes_after_one_query() {
        let store = MockDocumentStore::new();
        store.add_documents("teams", 3);

        let report = drain_collection(&store, &users(), &settings(100), None)
            .await
            .unwrap();

        assert_eq!(report, DrainReport::new(100));
        assert_eq!(store.query_limits(), vec![100]);
        assert!(store.commits().is_empty());
        assert_eq!(store.remaining_count("teams"), 3);
    }

    #[async_std::test]
    async fn test_oversize_commits_halve_batch_size() {
        let store = MockDocumentStore::new();
        store.add_documents("users", 10);
        store.fail_batches_larger_than(3);

        let report = drain_collection(&store, &users(), &settings(100), None)
            .await
            .unwrap();

        assert_eq!(
            store.query_limits(),
            vec![100, 50, 25, 12, 6, 3, 3, 3, 3, 3]
        );
        assert_eq!(store.commit_sizes(), vec![10, 10, 10, 10, 6, 3, 3, 3, 1]);
        assert_eq!(store.successful_commit_sizes(), vec![3, 3, 3, 1]);
        assert_eq!(report.batch_size_reductions, 5);
        assert_eq!(report.final_batch_size, 3);
        assert_eq!(report.total_deleted, 10);
        assert_eq!(store.remaining_count("users"), 0);
    }

    #[async_std::test]
    async fn test_batch_size_never_grows_and_only_halves() {
        let store = MockDocumentStore::new();
        store.add_random_documents("users", 40);
        store.fail_batches_larger_than(7);

        drain_collection(&store, &users(), &settings(64), None)
            .await
            .unwrap();

        let limits = store.query_limits();
        let commits = store.commits();
        for (i, pair) in limits.windows(2).enumerate() {
            assert!(pair[1] <= pair[0]);
            if pair[1] < pair[0] {
                assert_eq!(pair[1], pair[0] / 2);
                assert!(!commits[i].succeeded);
            }
        }
        assert_eq!(store.remaining_count("users"), 0);
    }

    #[async_std::test]
    async fn test_single_document_too_large_is_fatal() {
        let store = MockDocumentStore::new();
        store.add_documents("users", 5);
        store.fail_batches_larger_than(0);

        let result = drain_collection(&store, &users(), &settings(8), None).await;

        assert!(matches!(
            result,
            Err(Error::StoreError(StoreError::TransactionTooLarge(_)))
        ));
        assert_eq!(store.query_limits(), vec![8, 4, 2, 1]);
        assert_eq!(store.remaining_count("users"), 5);
    }

    #[async_std::test]
    async fn test_other_commit_error_aborts_without_further_queries() {
        let store = MockDocumentStore::new();
        store.add_documents("users", 500);
        let denied = StoreError::PermissionDenied("Missing or insufficient permissions.".to_string());
        store.fail_commit_at(3, denied.clone());

        let result = drain_collection(&store, &users(), &settings(100), None).await;

        assert_eq!(result, Err(Error::StoreError(denied)));
        assert_eq!(store.query_limits().len(), 3);
        assert_eq!(store.successful_commit_sizes(), vec![100, 100]);
        assert_eq!(store.remaining_count("users"), 300);
    }

    #[async_std::test]
    async fn test_query_error_aborts_before_any_commit() {
        let store = MockDocumentStore::new();
        store.add_documents("users", 5);
        store.fail_query_at(1, StoreError::Transport("connection refused".to_string()));

        let result = drain_collection(&store, &users(), &settings(100), None).await;

        assert!(matches!(
            result,
            Err(Error::StoreError(StoreError::Transport(_)))
        ));
        assert!(store.commits().is_empty());
    }

    #[async_std::test]
    async fn test_rerun_after_failure_converges() {
        let store = MockDocumentStore::new();
        store.add_documents("users", 120);
        store.fail_commit_at(2, StoreError::Transport("connection reset".to_string()));

        assert!(
            drain_collection(&store, &users(), &settings(50), None)
                .await
                .is_err()
        );
        assert_eq!(store.remaining_count("users"), 70);

        store.clear_failures();
        let report = drain_collection(&store, &users(), &settings(50), None)
            .await
            .unwrap();

        assert_eq!(report.total_deleted, 70);
        assert_eq!(store.remaining_count("users"), 0);
        assert_eq!(store.deleted_names().len(), 120);
    }

    #[async_std::test]
    async fn test_no_document_is_returned_after_its_deletion() {
        let store = MockDocumentStore::new();
        store.add_documents("users", 37);

        drain_collection(&store, &users(), &settings(5), None)
            .await
            .unwrap();

        let queries = store.queries();
        let commits = store.commits();
        let mut deleted: HashSet<String> = HashSet::new();
        for (i, query) in queries.iter().enumerate() {
            assert!(query.returned.iter().all(|d| !deleted.contains(&d.name)));
            if let Some(commit) = commits.get(i).filter(|c| c.succeeded) {
                for doc in &commit.documents {
                    assert!(deleted.insert(doc.name.clone()));
                }
            }
        }
        assert_eq!(deleted.len(), 37);
    }

    #[async_std::test]
    async fn test_waits_pacing_interval_after_each_commit() {
        let store = MockDocumentStore::new();
        store.add_documents("users", 5);
        let pacing = Duration::from_millis(20);
        let settings = DeletionSettings {
            batch_size: 2,
            pacing_interval: pacing,
        };

        drain_collection(&store, &users(), &settings, None)
            .await
            .unwrap();

        let queries = store.queries();
        let commits = store.commits();
        assert_eq!(commits.len(), 3);
        assert_eq!(queries.len(), 4);
        for (commit, next_query) in commits.iter().zip(queries.iter().skip(1)) {
            assert!(next_query.at.duration_since(commit.at) >= pacing);
        }
    }

    #[async_std::test]
    async fn test_oversize_retry_is_not_paced() {
        let store = MockDocumentStore::new();
        store.add_documents("users", 4);
        store.fail_batches_larger_than(2);
        let settings = DeletionSettings {
            batch_size: 4,
            pacing_interval: Duration::from_millis(200),
        };

        drain_collection(&store, &users(), &settings, None)
            .await
            .unwrap();

        let queries = store.queries();
        let commits = store.commits();
        assert!(!commits[0].succeeded);
        assert!(queries[1].at.duration_since(commits[0].at) < Duration::from_millis(200));
    }

    #[async_std::test]
    async fn test_progress_events() {
        let store = MockDocumentStore::new();
        store.add_documents("users", 5);
        store.fail_batches_larger_than(2);
        let (tx, rx) = async_std::channel::unbounded();

        drain_collection(&store, &users(), &settings(4), Some(&tx))
            .await
            .unwrap();

        let mut events = Vec::new();
        while let Ok(event) = rx.try_recv() {
            events.push(event);
        }

        assert_eq!(
            events,
            vec![
                DeletionEvent::DrainStarted {
                    collection: "users".to_string(),
                    batch_size: 4
                },
                DeletionEvent::BatchSizeReduced { from: 4, to: 2 },
                DeletionEvent::BatchDeleted {
                    count: 2,
                    total_deleted: 2,
                    batch_number: 1
                },
                DeletionEvent::BatchDeleted {
                    count: 2,
                    total_deleted: 4,
                    batch_number: 2
                },
                DeletionEvent::BatchDeleted {
                    count: 1,
                    total_deleted: 5,
                    batch_number: 3
                },
                DeletionEvent::DrainCompleted {
                    total_deleted: 5,
                    batches: 3
                },
            ]
        );
    }

    #[async_std::test]
    async fn test_failure_event_carries_progress() {
        let store = MockDocumentStore::new();
        store.add_documents("users", 5);
        store.fail_commit_at(2, StoreError::NotFound("database missing".to_string()));
        let (tx, rx) = async_std::channel::unbounded();

        let _ = drain_collection(&store, &users(), &settings(2), Some(&tx)).await;

        let mut last = None;
        while let Ok(event) = rx.try_recv() {
            last = Some(event);
        }
        assert!(matches!(
            last,
            Some(DeletionEvent::DrainFailed { total_deleted: 2, .. })
        ));
    }

    #[async_std::test]
    async fn test_zero_batch_size_is_rejected_before_querying() {
        let store = MockDocumentStore::new();
        store.add_documents("users", 5);

        let result = drain_collection(&store, &users(), &settings(0), None).await;

        assert!(matches!(result, Err(Error::InvalidInput(_))));
        assert!(store.queries().is_empty());
    }

    #[test]
    fn test_drain_does_not_log_above_info() {
        // Reductions and failures reach the user as progress events and the
        // caller's error report, so the console must not repeat them
        let store = MockDocumentStore::new();
        store.add_documents("users", 10);
        store.fail_batches_larger_than(3);
        store.fail_commit_at(3, StoreError::PermissionDenied("denied".to_string()));

        let recorder = LevelRecorder::default();
        let subscriber = tracing_subscriber::registry().with(recorder.clone());
        let collection = CollectionPath::parse("users").unwrap();
        let result = tracing::subscriber::with_default(subscriber, || {
            task::block_on(drain_collection(&store, &collection, &settings(100), None))
        });

        assert!(matches!(
            result,
            Err(Error::StoreError(StoreError::PermissionDenied(_)))
        ));
        assert!(recorder.count(Level::INFO) > 0);
        assert_eq!(recorder.count(Level::WARN), 0);
        assert_eq!(recorder.count(Level::ERROR), 0);
    }
}
