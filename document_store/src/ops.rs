use async_trait::async_trait;
use core_types::{CollectionPath, DocumentRef};

use crate::StoreError;

/// Trait for document store operations to enable testing
#[async_trait]
pub trait DocumentStoreOps: Send + Sync {
    /// Fetch up to `limit` references to documents currently in the collection.
    ///
    /// Deletions committed earlier through the same store must be reflected
    /// in the result.
    async fn query_limited(
        &self,
        collection: &CollectionPath,
        limit: usize,
    ) -> Result<Vec<DocumentRef>, StoreError>;

    /// Delete all given documents in one atomic commit.
    ///
    /// Fails with `StoreError::TransactionTooLarge` when the batch does not
    /// fit into a single transaction.
    async fn commit_delete_batch(&self, documents: &[DocumentRef]) -> Result<(), StoreError>;
}
