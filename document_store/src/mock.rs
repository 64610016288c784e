use std::collections::BTreeSet;
use std::sync::{Arc, Mutex};
use std::time::Instant;

use async_trait::async_trait;
use core_types::{CollectionPath, DocumentRef};

use crate::{StoreError, ops::DocumentStoreOps};

/// A single `query_limited` call as seen by the mock.
#[derive(Debug, Clone)]
pub struct QueryRecord {
    pub limit: usize,
    pub returned: Vec<DocumentRef>,
    pub at: Instant,
}

/// A single `commit_delete_batch` call as seen by the mock.
#[derive(Debug, Clone)]
pub struct CommitRecord {
    pub documents: Vec<DocumentRef>,
    pub succeeded: bool,
    pub at: Instant,
}

/// Internal state for MockDocumentStore.
///
/// Groups all mutable state into a single struct for simplified locking.
#[derive(Default)]
struct MockState {
    /// Document names currently stored, kept ordered so queries are stable
    documents: BTreeSet<String>,
    /// Names removed by successful commits
    deleted: Vec<String>,
    /// Commits with more documents than this fail with TransactionTooLarge
    max_batch_size: Option<usize>,
    /// Fail the n-th (1-based) query call with the given error
    fail_query_at: Option<(usize, StoreError)>,
    /// Fail the n-th (1-based) commit call with the given error
    fail_commit_at: Option<(usize, StoreError)>,
    queries: Vec<QueryRecord>,
    commits: Vec<CommitRecord>,
}

/// Mock implementation of DocumentStoreOps for testing
///
/// This mock allows you to:
/// - Seed collections with documents
/// - Simulate transaction size limits and other failures
/// - Verify which queries and commits were performed, and when
#[derive(Clone, Default)]
pub struct MockDocumentStore {
    state: Arc<Mutex<MockState>>,
}

fn is_in_collection(name: &str, collection: &CollectionPath) -> bool {
    name.strip_prefix(collection.as_str())
        .and_then(|rest| rest.strip_prefix('/'))
        .is_some_and(|id| !id.is_empty() && !id.contains('/'))
}

impl MockDocumentStore {
    /// Create a new empty mock document store
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a document, `name` is the full document path (e.g. `users/alice`)
    pub fn add_document(&self, name: impl Into<String>) {
        let mut state = self.state.lock().unwrap();
        state.documents.insert(name.into());
    }

    /// Add `count` documents with sequential ids (`doc-0000`, `doc-0001`, ...)
    pub fn add_documents(&self, collection: &str, count: usize) {
        let mut state = self.state.lock().unwrap();
        for i in 0..count {
            state.documents.insert(format!("{}/doc-{:04}", collection, i));
        }
    }

    /// Add `count` documents with random ids
    pub fn add_random_documents(&self, collection: &str, count: usize) {
        let mut state = self.state.lock().unwrap();
        for _ in 0..count {
            state
                .documents
                .insert(format!("{}/{}", collection, uuid::Uuid::new_v4()));
        }
    }

    /// Make commits with more than `max` documents fail as too large
    pub fn fail_batches_larger_than(&self, max: usize) {
        let mut state = self.state.lock().unwrap();
        state.max_batch_size = Some(max);
    }

    /// Make the n-th query call (1-based) fail with the given error
    pub fn fail_query_at(&self, call: usize, error: StoreError) {
        let mut state = self.state.lock().unwrap();
        state.fail_query_at = Some((call, error));
    }

    /// Make the n-th commit call (1-based) fail with the given error
    pub fn fail_commit_at(&self, call: usize, error: StoreError) {
        let mut state = self.state.lock().unwrap();
        state.fail_commit_at = Some((call, error));
    }

    /// Remove all injected failures, keeping documents and logs
    pub fn clear_failures(&self) {
        let mut state = self.state.lock().unwrap();
        state.max_batch_size = None;
        state.fail_query_at = None;
        state.fail_commit_at = None;
    }

    /// Number of documents left in the given collection
    pub fn remaining_count(&self, collection: &str) -> usize {
        let Ok(collection) = CollectionPath::parse(collection) else {
            return 0;
        };
        let state = self.state.lock().unwrap();
        state
            .documents
            .iter()
            .filter(|name| is_in_collection(name, &collection))
            .count()
    }

    /// Total number of stored documents across all collections
    pub fn document_count(&self) -> usize {
        let state = self.state.lock().unwrap();
        state.documents.len()
    }

    /// Check if a document was deleted
    pub fn was_deleted(&self, name: &str) -> bool {
        let state = self.state.lock().unwrap();
        state.deleted.iter().any(|d| d == name)
    }

    /// Names of deleted documents in deletion order
    pub fn deleted_names(&self) -> Vec<String> {
        let state = self.state.lock().unwrap();
        state.deleted.clone()
    }

    pub fn queries(&self) -> Vec<QueryRecord> {
        let state = self.state.lock().unwrap();
        state.queries.clone()
    }

    pub fn commits(&self) -> Vec<CommitRecord> {
        let state = self.state.lock().unwrap();
        state.commits.clone()
    }

    /// Limits passed to each query, in call order
    pub fn query_limits(&self) -> Vec<usize> {
        let state = self.state.lock().unwrap();
        state.queries.iter().map(|q| q.limit).collect()
    }

    /// Sizes of all attempted commits, in call order
    pub fn commit_sizes(&self) -> Vec<usize> {
        let state = self.state.lock().unwrap();
        state.commits.iter().map(|c| c.documents.len()).collect()
    }

    /// Sizes of commits that succeeded, in call order
    pub fn successful_commit_sizes(&self) -> Vec<usize> {
        let state = self.state.lock().unwrap();
        state
            .commits
            .iter()
            .filter(|c| c.succeeded)
            .map(|c| c.documents.len())
            .collect()
    }
}

#[async_trait]
impl DocumentStoreOps for MockDocumentStore {
    async fn query_limited(
        &self,
        collection: &CollectionPath,
        limit: usize,
    ) -> Result<Vec<DocumentRef>, StoreError> {
        let mut state = self.state.lock().unwrap();
        let call = state.queries.len() + 1;

        let failure = match &state.fail_query_at {
            Some((n, error)) if *n == call => Some(error.clone()),
            _ => None,
        };
        if let Some(error) = failure {
            state.queries.push(QueryRecord {
                limit,
                returned: Vec::new(),
                at: Instant::now(),
            });
            return Err(error);
        }

        let returned: Vec<DocumentRef> = state
            .documents
            .iter()
            .filter(|name| is_in_collection(name, collection))
            .take(limit)
            .map(|name| DocumentRef::new(name.clone()))
            .collect();

        state.queries.push(QueryRecord {
            limit,
            returned: returned.clone(),
            at: Instant::now(),
        });
        Ok(returned)
    }

    async fn commit_delete_batch(&self, documents: &[DocumentRef]) -> Result<(), StoreError> {
        let mut state = self.state.lock().unwrap();
        let call = state.commits.len() + 1;

        let failure = match (&state.fail_commit_at, state.max_batch_size) {
            (Some((n, error)), _) if *n == call => Some(error.clone()),
            (_, Some(max)) if documents.len() > max => Some(StoreError::TransactionTooLarge(
                format!("Transaction too big: {} writes, limit {}", documents.len(), max),
            )),
            _ => None,
        };

        state.commits.push(CommitRecord {
            documents: documents.to_vec(),
            succeeded: failure.is_none(),
            at: Instant::now(),
        });

        if let Some(error) = failure {
            return Err(error);
        }

        let state = &mut *state;
        for doc in documents {
            if state.documents.remove(&doc.name) {
                state.deleted.push(doc.name.clone());
            }
        }

        Ok(())
    }
}
