mod logging;

use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;

use async_std::task;
use clap::{Parser, ValueEnum, error::ErrorKind};
use core_types::{CollectionPath, DeletionEvent};
use document_store::FirestoreSettings;
use service::{
    collection_deletion::{model::DrainReport, service::CollectionDeletionService},
    error::Error,
    settings::{DEFAULT_BATCH_SIZE, DeletionSettings, MIN_BATCH_SIZE},
};

#[derive(Debug, Clone, Copy, PartialEq, ValueEnum)]
enum ProgressFormat {
    Text,
    Json,
}

/// Delete every document in a Firestore collection in bounded batches
#[derive(Parser, Debug)]
#[command(name = "drain-collection", version, about)]
struct Cli {
    /// Collection to delete, e.g. `users` or `users/alice/orders`
    collection: String,

    /// Maximum number of documents fetched and deleted per batch
    #[arg(long, default_value_t = DEFAULT_BATCH_SIZE, value_parser = parse_batch_size)]
    batch_size: usize,

    /// Pause after every committed batch, in milliseconds
    #[arg(long, default_value_t = 100)]
    pacing_ms: u64,

    /// Firestore project, defaults to the project of the service account key
    #[arg(long, env = "FIRESTORE_PROJECT_ID")]
    project_id: Option<String>,

    /// Service account key file; tokens are minted from it for every request.
    /// Ignored when FIRESTORE_ACCESS_TOKEN is set.
    #[arg(long, env = "GOOGLE_APPLICATION_CREDENTIALS")]
    credentials: Option<PathBuf>,

    /// Firestore database id
    #[arg(long, default_value = "(default)")]
    database: String,

    /// host:port of a Firestore emulator, no credentials needed when set
    #[arg(long, env = "FIRESTORE_EMULATOR_HOST")]
    emulator_host: Option<String>,

    /// How progress is printed to stdout
    #[arg(long, value_enum, default_value_t = ProgressFormat::Text)]
    progress: ProgressFormat,
}

impl Cli {
    fn deletion_settings(&self) -> DeletionSettings {
        DeletionSettings {
            batch_size: self.batch_size,
            pacing_interval: Duration::from_millis(self.pacing_ms),
        }
    }

    fn firestore_settings(&self) -> FirestoreSettings {
        FirestoreSettings {
            project_id: self.project_id.clone(),
            database_id: self.database.clone(),
            emulator_host: self.emulator_host.clone(),
            credentials_file: self.credentials.clone(),
        }
    }
}

fn parse_batch_size(value: &str) -> Result<usize, String> {
    let size: usize = value
        .parse()
        .map_err(|e| format!("'{}' is not a number: {}", value, e))?;
    if size < MIN_BATCH_SIZE {
        return Err(format!("batch size must be at least {}", MIN_BATCH_SIZE));
    }
    Ok(size)
}

fn format_event(event: &DeletionEvent, format: ProgressFormat) -> Option<String> {
    match format {
        ProgressFormat::Json => serde_json::to_string(event).ok(),
        ProgressFormat::Text => match event {
            DeletionEvent::BatchDeleted { count, .. } => {
                Some(format!("Deleted batch of {} documents", count))
            }
            DeletionEvent::BatchSizeReduced { from, to } => Some(format!(
                "Batch too large, reducing batch size from {} to {} and retrying...",
                from, to
            )),
            _ => None,
        },
    }
}

async fn run(cli: &Cli, collection: &CollectionPath) -> Result<DrainReport, Error> {
    let service = CollectionDeletionService::new(cli.deletion_settings(), cli.firestore_settings());

    let (progress_tx, progress_rx) = async_std::channel::unbounded::<DeletionEvent>();
    let format = cli.progress;
    let printer = task::spawn(async move {
        while let Ok(event) = progress_rx.recv().await {
            if let Some(line) = format_event(&event, format) {
                println!("{}", line);
            }
        }
    });

    let result = service.delete_collection(collection, Some(progress_tx)).await;
    // The sender was dropped with the pipeline context, so the printer drains and stops
    printer.await;
    result
}

fn main() -> ExitCode {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) if matches!(e.kind(), ErrorKind::DisplayHelp | ErrorKind::DisplayVersion) => {
            e.exit()
        }
        Err(e) => {
            e.print().ok();
            return ExitCode::FAILURE;
        }
    };

    let collection = match CollectionPath::parse(&cli.collection) {
        Ok(collection) => collection,
        Err(e) => {
            eprintln!("Error: {}", e);
            eprintln!("Usage: drain-collection <COLLECTION>");
            return ExitCode::FAILURE;
        }
    };

    let _guard = logging::init_logging();

    println!("Starting deletion of collection '{}'...", collection);

    match task::block_on(run(&cli, &collection)) {
        Ok(report) => {
            println!(
                "Collection '{}' deleted successfully ({} documents in {} batches)",
                collection, report.total_deleted, report.batches_committed
            );
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("Error deleting collection: {}", e);
            ExitCode::FAILURE
        }
    }
}
