use std::path::Path;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{
    fmt::{self, time::OffsetTime},
    layer::SubscriberExt,
    util::SubscriberInitExt,
    EnvFilter,
};

/// Initialize logging to stderr, and to a daily log file when `log_dir` is given
///
/// The returned guard flushes the file writer and must live until exit.
pub fn init_logging(verbose: bool, log_dir: Option<&Path>) -> anyhow::Result<Option<WorkerGuard>> {
    let timer = OffsetTime::local_rfc_3339().unwrap_or_else(|_| {
        // local offset is unavailable in some environments
        OffsetTime::new(
            time::UtcOffset::UTC,
            time::format_description::well_known::Rfc3339,
        )
    });

    let (file_layer, guard) = match log_dir {
        Some(dir) => {
            std::fs::create_dir_all(dir)?;
            let file_appender = RollingFileAppender::builder()
                .rotation(Rotation::DAILY)
                .filename_prefix("ctm")
                .filename_suffix("log")
                .build(dir)?;
            let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);
            let layer = fmt::layer()
                .with_writer(non_blocking)
                .with_timer(timer.clone())
                .with_ansi(false)
                .with_target(true)
                .with_file(true)
                .with_line_number(true);
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    let level = if verbose { "debug" } else { "info" };
    tracing_subscriber::registry()
        .with(file_layer)
        // stdout is reserved for reports
        .with(
            fmt::layer()
                .with_writer(std::io::stderr)
                .with_timer(timer)
                .with_target(false)
                .with_file(false)
                .with_line_number(false),
        )
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level)))
        .init();

    if let Some(dir) = log_dir {
        tracing::debug!("Log files are being written to: {:?}", dir);
    }
    Ok(guard)
}
