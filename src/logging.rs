use std::time::Duration;

use chrono::Utc;
use tracing::info;
use tracing_subscriber::EnvFilter;

use crate::config::{LogFormat, LoggingConfig};
use crate::error::{AppError, AppResult};
use crate::reconcile::{RunReport, SyncContext};

/// Install the global subscriber. `RUST_LOG` wins over `level_override`,
/// which wins over the configured level.
pub fn init_logging(config: &LoggingConfig, level_override: Option<&str>) -> AppResult<()> {
    let level = level_override.unwrap_or(&config.level);
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(level))
        .map_err(|e| AppError::Configuration(format!("Invalid log level '{}': {}", level, e)))?;

    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    let result = match config.format {
        LogFormat::Pretty => builder.pretty().try_init(),
        LogFormat::Compact => builder.compact().try_init(),
    };
    result.map_err(|e| AppError::Internal(format!("Failed to install logger: {}", e)))
}

/// One line per run on the `import_log` target
pub fn log_run_summary(context: &SyncContext, report: &RunReport, elapsed: Duration) {
    let counters = report.counters.for_kind(context.kind());
    let timestamp = Utc::now().format("%Y-%m-%d %H:%M:%S UTC");

    info!(
        target: "import_log",
        "{} configuration={} table={} status={} pages={} entries={} skipped={} added={} updated={} groups_added={} flagged={} {}ms",
        timestamp,
        context.configuration_id,
        context.table,
        report.status.label(),
        report.pages_fetched,
        report.entries_seen,
        report.entries_skipped,
        counters.added,
        counters.updated,
        report.counters.groups_added,
        report.users_flagged,
        elapsed.as_millis()
    );
}
