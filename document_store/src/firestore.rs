use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use core_types::{CollectionPath, DocumentRef};
use serde::Deserialize;
use serde_json::{Value, json};

use crate::{StoreError, auth::TokenProvider, ops::DocumentStoreOps};

const FIRESTORE_BASE_URL: &str = "https://firestore.googleapis.com/v1";
const DEFAULT_DATABASE_ID: &str = "(default)";
const TRANSACTION_TOO_BIG: &str = "Transaction too big";

/// Where the Firestore database lives.
#[derive(Debug, Clone, PartialEq)]
pub struct FirestoreSettings {
    pub project_id: Option<String>,
    pub database_id: String,
    /// `host:port` of a local Firestore emulator
    pub emulator_host: Option<String>,
    /// Service account key file, takes precedence over a key in the keyring
    pub credentials_file: Option<PathBuf>,
}

impl Default for FirestoreSettings {
    fn default() -> Self {
        Self {
            project_id: None,
            database_id: DEFAULT_DATABASE_ID.to_string(),
            emulator_host: None,
            credentials_file: None,
        }
    }
}

impl FirestoreSettings {
    pub fn is_emulator(&self) -> bool {
        self.emulator_host.is_some()
    }

    pub fn base_url(&self) -> String {
        match &self.emulator_host {
            Some(host) => format!("http://{}/v1", host.trim_end_matches('/')),
            None => FIRESTORE_BASE_URL.to_string(),
        }
    }
}

/// Firestore REST v1 implementation of `DocumentStoreOps`.
///
/// Every request asks the token provider for its bearer token, so tokens that
/// expire during a long run are replaced.
pub struct FirestoreStore {
    client: surf::Client,
    base_url: String,
    documents_root: String,
    tokens: Arc<dyn TokenProvider>,
}

impl FirestoreStore {
    pub fn connect(
        settings: &FirestoreSettings,
        project_id: &str,
        tokens: Arc<dyn TokenProvider>,
    ) -> Self {
        let base_url = settings.base_url();
        tracing::info!(
            base_url = %base_url,
            project_id,
            database_id = %settings.database_id,
            "Connecting to Firestore"
        );

        Self {
            client: surf::Client::new(),
            base_url,
            documents_root: documents_root(project_id, &settings.database_id),
            tokens,
        }
    }

    fn run_query_url(&self, collection: &CollectionPath) -> String {
        match collection.parent_document() {
            Some(parent) => format!(
                "{}/{}/{}:runQuery",
                self.base_url, self.documents_root, parent
            ),
            None => format!("{}/{}:runQuery", self.base_url, self.documents_root),
        }
    }

    fn commit_url(&self) -> String {
        format!("{}/{}:commit", self.base_url, self.documents_root)
    }

    async fn authorization(&self) -> Result<String, StoreError> {
        let token = self.tokens.access_token().await?;
        Ok(format!("Bearer {}", token))
    }

    async fn post_json(&self, url: &str, body: &Value) -> Result<String, StoreError> {
        let authorization = self.authorization().await?;
        let mut response = self
            .client
            .post(url)
            .header("Authorization", authorization)
            .body_json(body)?
            .await?;

        let status = response.status();
        let text = response.body_string().await?;
        if !status.is_success() {
            return Err(classify_error(u16::from(status), &text));
        }
        Ok(text)
    }
}

#[async_trait]
impl DocumentStoreOps for FirestoreStore {
    async fn query_limited(
        &self,
        collection: &CollectionPath,
        limit: usize,
    ) -> Result<Vec<DocumentRef>, StoreError> {
        let body = build_query_body(collection, limit);
        let response = self.post_json(&self.run_query_url(collection), &body).await?;
        let documents = parse_query_response(&response)?;
        tracing::debug!(
            collection = %collection,
            limit,
            returned = documents.len(),
            "Firestore query finished"
        );
        Ok(documents)
    }

    async fn commit_delete_batch(&self, documents: &[DocumentRef]) -> Result<(), StoreError> {
        let body = build_commit_body(documents);
        self.post_json(&self.commit_url(), &body).await?;
        tracing::debug!(writes = documents.len(), "Firestore commit finished");
        Ok(())
    }
}

fn documents_root(project_id: &str, database_id: &str) -> String {
    format!("projects/{}/databases/{}/documents", project_id, database_id)
}

/// Structured query selecting only document names, ordered by name so that
/// repeated queries against a shrinking collection stay stable.
pub fn build_query_body(collection: &CollectionPath, limit: usize) -> Value {
    let limit = limit.min(i32::MAX as usize);
    json!({
        "structuredQuery": {
            "select": { "fields": [{ "fieldPath": "__name__" }] },
            "from": [{ "collectionId": collection.collection_id(), "allDescendants": false }],
            "orderBy": [{ "field": { "fieldPath": "__name__" }, "direction": "ASCENDING" }],
            "limit": limit,
        }
    })
}

pub fn build_commit_body(documents: &[DocumentRef]) -> Value {
    let writes: Vec<Value> = documents
        .iter()
        .map(|doc| json!({ "delete": doc.name }))
        .collect();
    json!({ "writes": writes })
}

#[derive(Deserialize)]
struct RunQueryRow {
    document: Option<DocumentName>,
}

#[derive(Deserialize)]
struct DocumentName {
    name: String,
}

/// Rows without a `document` (e.g. a bare `readTime` for an empty result) are skipped.
pub fn parse_query_response(body: &str) -> Result<Vec<DocumentRef>, StoreError> {
    let rows: Vec<RunQueryRow> = serde_json::from_str(body)?;
    Ok(rows
        .into_iter()
        .filter_map(|row| row.document)
        .map(|doc| DocumentRef::new(doc.name))
        .collect())
}

#[derive(Deserialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Deserialize)]
struct ErrorBody {
    #[serde(default)]
    message: String,
    #[serde(default)]
    status: String,
}

fn decode_error_body(body: &str) -> Option<ErrorBody> {
    if let Ok(envelope) = serde_json::from_str::<ErrorEnvelope>(body) {
        return Some(envelope.error);
    }
    // runQuery reports errors as a single element stream
    serde_json::from_str::<Vec<ErrorEnvelope>>(body)
        .ok()
        .and_then(|envelopes| envelopes.into_iter().next())
        .map(|envelope| envelope.error)
}

/// Map a failed Firestore response to a `StoreError` kind.
pub fn classify_error(http_status: u16, body: &str) -> StoreError {
    let Some(error) = decode_error_body(body) else {
        return classify_http_status(http_status, body.trim().to_string());
    };

    match error.status.as_str() {
        "INVALID_ARGUMENT" if error.message.contains(TRANSACTION_TOO_BIG) => {
            StoreError::TransactionTooLarge(error.message)
        }
        "INVALID_ARGUMENT" => StoreError::InvalidArgument(error.message),
        "PERMISSION_DENIED" => StoreError::PermissionDenied(error.message),
        "UNAUTHENTICATED" => StoreError::Unauthenticated(error.message),
        "NOT_FOUND" => StoreError::NotFound(error.message),
        "" => classify_http_status(http_status, error.message),
        status => StoreError::Backend {
            status: status.to_string(),
            message: error.message,
        },
    }
}

fn classify_http_status(http_status: u16, message: String) -> StoreError {
    match http_status {
        400 if message.contains(TRANSACTION_TOO_BIG) => StoreError::TransactionTooLarge(message),
        400 => StoreError::InvalidArgument(message),
        401 => StoreError::Unauthenticated(message),
        403 => StoreError::PermissionDenied(message),
        404 => StoreError::NotFound(message),
        status => StoreError::Backend {
            status: status.to_string(),
            message,
        },
    }
}
