use std::sync::Arc;

use credentials_storage::FirestoreCredentials;
use document_store::{
    FirestoreStore, ServiceAccountKey, ServiceAccountTokenProvider, StaticToken, TokenProvider,
};

use crate::{
    collection_deletion::{context::DeletionContext, drain::drain_collection},
    error::Error,
    pipeline::{PipelineStep, StepAction},
};

/// Step 1: Reject settings the drain loop cannot run with
pub struct ValidateSettingsStep;

#[async_trait::async_trait]
impl PipelineStep<DeletionContext> for ValidateSettingsStep {
    fn name(&self) -> &'static str {
        "validate_settings"
    }

    async fn execute(&self, context: &mut DeletionContext) -> StepAction {
        match context.settings.validate() {
            Ok(()) => StepAction::Continue,
            Err(e) => StepAction::Abort(e),
        }
    }
}

/// Step 2: Connect to Firestore
///
/// Credentials are only needed outside the emulator. An explicit project id
/// in the settings wins over the one carried by the credentials.
pub struct ConnectToStoreStep;

impl ConnectToStoreStep {
    fn token_provider(
        credentials: FirestoreCredentials,
    ) -> Result<(Option<String>, Arc<dyn TokenProvider>), Error> {
        match credentials {
            FirestoreCredentials::AccessToken {
                project_id,
                access_token,
            } => {
                tracing::info!("Using Firestore access token from the environment");
                let tokens: Arc<dyn TokenProvider> = Arc::new(StaticToken::new(access_token));
                Ok((project_id, tokens))
            }
            FirestoreCredentials::ServiceAccountKey { key_json } => {
                let key = ServiceAccountKey::from_json(&key_json)?;
                tracing::info!(client_email = %key.client_email, "Using service account key");
                let project_id = key.project_id.clone();
                let tokens: Arc<dyn TokenProvider> = Arc::new(ServiceAccountTokenProvider::new(key));
                Ok((project_id, tokens))
            }
        }
    }
}

#[async_trait::async_trait]
impl PipelineStep<DeletionContext> for ConnectToStoreStep {
    fn name(&self) -> &'static str {
        "connect_to_store"
    }

    fn should_execute(&self, context: &DeletionContext) -> bool {
        context.store.is_none()
    }

    async fn execute(&self, context: &mut DeletionContext) -> StepAction {
        let firestore_settings = &context.firestore_settings;

        let (credentials_project, tokens): (Option<String>, Arc<dyn TokenProvider>) =
            if firestore_settings.is_emulator() {
                tracing::info!(
                    "Using Firestore emulator at {}",
                    firestore_settings.emulator_host.as_deref().unwrap_or_default()
                );
                let tokens: Arc<dyn TokenProvider> = Arc::new(StaticToken::emulator());
                (None, tokens)
            } else {
                let key_file = firestore_settings.credentials_file.as_deref();
                let credentials = match (context.credentials_loader)(key_file) {
                    Ok(creds) => creds,
                    Err(e) => return StepAction::Abort(e.into()),
                };
                match Self::token_provider(credentials) {
                    Ok(resolved) => resolved,
                    Err(e) => return StepAction::Abort(e),
                }
            };

        let project_id = firestore_settings.project_id.clone().or(credentials_project);
        let Some(project_id) = project_id else {
            return StepAction::Abort(Error::SettingsError(
                "Firestore project id is not configured".to_string(),
            ));
        };

        let store = FirestoreStore::connect(firestore_settings, &project_id, tokens);
        context.store = Some(Arc::new(store));
        StepAction::Continue
    }
}

/// Step 3: Delete the collection batch by batch
pub struct DrainCollectionStep;

#[async_trait::async_trait]
impl PipelineStep<DeletionContext> for DrainCollectionStep {
    fn name(&self) -> &'static str {
        "drain_collection"
    }

    async fn execute(&self, context: &mut DeletionContext) -> StepAction {
        let Some(store) = context.store.clone() else {
            return StepAction::Abort(Error::SettingsError(
                "No document store connected".to_string(),
            ));
        };

        match drain_collection(
            store.as_ref(),
            &context.collection,
            &context.settings,
            context.progress_tx.as_ref(),
        )
        .await
        {
            Ok(report) => {
                context.report = report;
                StepAction::Continue
            }
            Err(e) => StepAction::Abort(e),
        }
    }
}
