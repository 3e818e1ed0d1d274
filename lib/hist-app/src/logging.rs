//! Logging.

use hist_error::{generic_error, GenericError};
use tracing::{level_filters::LevelFilter, Subscriber};
use tracing_subscriber::{
    layer::SubscriberExt as _, registry::LookupSpan, util::SubscriberInitExt as _, EnvFilter, Layer,
};

const LOG_LEVEL_ENV_VAR: &str = "HIST_LOG_LEVEL";
const LOG_FORMAT_JSON_ENV_VAR: &str = "HIST_LOG_FORMAT_JSON";

/// Logs a message to standard error and exits the process with a non-zero exit code.
pub fn fatal_and_exit(message: String) -> ! {
    eprintln!("FATAL: {}", message);
    std::process::exit(1);
}

/// Initializes the logging subsystem for `tracing`.
///
/// Filtering directives are read from `HIST_LOG_LEVEL`, using `default_level` (or `INFO`, if not given) when the
/// variable is unset or invalid. When `HIST_LOG_FORMAT_JSON` is `true` or `1`, events are emitted as JSON objects;
/// otherwise a compact, human-readable format is used. All output goes to standard error so that standard output
/// remains free for data.
///
/// # Errors
///
/// If the logging subsystem was already initialized, an error will be returned.
pub fn initialize_logging(default_level: Option<LevelFilter>) -> Result<(), GenericError> {
    let level_filter = EnvFilter::builder()
        .with_default_directive(default_level.unwrap_or(LevelFilter::INFO).into())
        .with_env_var(LOG_LEVEL_ENV_VAR)
        .from_env_lossy();

    let is_json = std::env::var(LOG_FORMAT_JSON_ENV_VAR)
        .map(|s| parse_bool_flag(&s))
        .unwrap_or(false);

    let result = if is_json {
        tracing_subscriber::registry()
            .with(json_layer().with_filter(level_filter))
            .try_init()
    } else {
        tracing_subscriber::registry()
            .with(compact_layer().with_filter(level_filter))
            .try_init()
    };

    result.map_err(|e| generic_error!("Failed to initialize logging: {}", e))
}

fn parse_bool_flag(value: &str) -> bool {
    matches!(value.trim().to_lowercase().as_str(), "true" | "1")
}

fn json_layer<S>() -> impl Layer<S>
where
    S: Subscriber + for<'a> LookupSpan<'a>,
{
    tracing_subscriber::fmt::Layer::new()
        .json()
        .flatten_event(true)
        .with_target(true)
        .with_file(true)
        .with_line_number(true)
        .with_writer(std::io::stderr)
}

fn compact_layer<S>() -> impl Layer<S>
where
    S: Subscriber + for<'a> LookupSpan<'a>,
{
    tracing_subscriber::fmt::Layer::new()
        .compact()
        .with_ansi(true)
        .with_target(true)
        .with_writer(std::io::stderr)
}
