use std::path::PathBuf;

use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{EnvFilter, Layer, layer::SubscriberExt, util::SubscriberInitExt};

const DEFAULT_CONSOLE_FILTER: &str = "warn";
const DEFAULT_FILE_FILTER: &str = "info,service=debug,document_store=debug";

/// Initializes logging for the command line tool.
///
/// Sets up two logging outputs:
/// - Console: compact, on stderr, warnings only unless RUST_LOG says otherwise
///   (progress lines on stdout come from deletion events, not from logs)
/// - File: JSON in `~/.local/share/collection-drain/logs/`, rotated daily
///
/// Returns a guard that must be kept alive for the duration of the program.
/// `None` when the log directory could not be set up.
pub fn init_logging() -> Option<WorkerGuard> {
    let log_dir = dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("collection-drain")
        .join("logs");

    if let Err(e) = std::fs::create_dir_all(&log_dir) {
        eprintln!(
            "Warning: Failed to create log directory at {}: {}",
            log_dir.display(),
            e
        );
    }

    let console_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(DEFAULT_CONSOLE_FILTER));
    let console_layer = tracing_subscriber::fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_level(true)
        .compact()
        .with_filter(console_filter);

    let file_appender = RollingFileAppender::builder()
        .rotation(Rotation::DAILY)
        .filename_prefix("drain")
        .filename_suffix("log")
        .build(&log_dir);

    let (file_layer, guard) = match file_appender {
        Ok(appender) => {
            let (non_blocking, guard) = tracing_appender::non_blocking(appender);
            let layer = tracing_subscriber::fmt::layer()
                .with_writer(non_blocking)
                .json()
                .with_current_span(true)
                .with_span_list(true)
                .with_file(true)
                .with_line_number(true)
                .with_filter(EnvFilter::new(DEFAULT_FILE_FILTER));
            (Some(layer), Some(guard))
        }
        Err(e) => {
            eprintln!("Warning: File logging disabled: {}", e);
            (None, None)
        }
    };

    tracing_subscriber::registry()
        .with(console_layer)
        .with(file_layer)
        .init();

    if guard.is_some() {
        tracing::info!("Logs are written to {}", log_dir.display());
    }

    guard
}
