// Logging for perch
//
// Built on the `tracing` ecosystem. The library only emits events; an
// application (or a test) installs a subscriber once through one of the
// `init*` functions below.
//
// ```rust
// use perch::logging;
//
// // INFO level, human readable console output
// logging::init(logging::LogConfig::default());
//
// // Or, for development: DEBUG for perch, TRACE for reference counting
// logging::init_development();
// ```
//
// Reference counting events (payload destroyed, storage released) are
// emitted at TRACE level under the `perch::control_block` target, so they
// stay off unless asked for:
//
// ```text
// RUST_LOG=perch::control_block=trace
// ```

use std::sync::Once;

use tracing::{Level, Subscriber};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

pub use tracing;

/// Configuration for the subscriber installed by [`init`].
#[derive(Debug, Clone)]
pub struct LogConfig {
    /// Minimum log level to display
    pub level: Level,
    /// Whether to use JSON format for logs
    pub json_format: bool,
    /// Whether to include file and line information
    pub show_file_line: bool,
    /// Whether to include thread name/id
    pub show_thread_info: bool,
    /// Target filter expressions (format: "target=level,target2=level2,...")
    pub target_filters: Option<String>,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: Level::INFO,
            json_format: false,
            show_file_line: true,
            show_thread_info: true,
            target_filters: None,
        }
    }
}

impl LogConfig {
    /// Builds the filter: environment first, then the configured level, then
    /// the per-target directives. Malformed directives are skipped.
    pub fn env_filter(&self) -> EnvFilter {
        let mut filter = EnvFilter::from_default_env().add_directive(self.level.into());
        if let Some(filters) = &self.target_filters {
            for directive in filters.split(',').filter_map(|f| f.trim().parse().ok()) {
                filter = filter.add_directive(directive);
            }
        }
        filter
    }
}

static INIT: Once = Once::new();

/// Installs the global subscriber. Only the first call has an effect.
pub fn init(config: LogConfig) {
    INIT.call_once(|| {
        let registry = tracing_subscriber::registry().with(config.env_filter());

        let subscriber: Box<dyn Subscriber + Send + Sync> = if config.json_format {
            Box::new(registry.with(fmt::layer().json().flatten_event(true)))
        } else {
            Box::new(
                registry.with(
                    fmt::layer()
                        .with_ansi(atty::is(atty::Stream::Stdout))
                        .with_file(config.show_file_line)
                        .with_line_number(config.show_file_line)
                        .with_thread_names(config.show_thread_info)
                        .with_thread_ids(config.show_thread_info),
                ),
            )
        };

        if let Err(err) = tracing::subscriber::set_global_default(subscriber) {
            eprintln!("Error setting global tracing subscriber: {}", err);
        }
    });
}

/// DEBUG for perch, TRACE for reference counting, with locations.
pub fn init_development() {
    init(LogConfig {
        level: Level::DEBUG,
        target_filters: Some("perch=debug,perch::control_block=trace".to_string()),
        ..LogConfig::default()
    });
}

/// JSON output without file/line information.
pub fn init_production() {
    init(LogConfig {
        json_format: true,
        show_file_line: false,
        ..LogConfig::default()
    });
}

/// Warnings and errors only, to keep test output readable.
pub fn init_test() {
    init(LogConfig {
        level: Level::WARN,
        show_thread_info: false,
        ..LogConfig::default()
    });
}

/// Span covering work done on behalf of one actor.
///
/// ```rust,ignore
/// let span = perch::actor_span!(ptr.address());
/// let _guard = span.enter();
/// ```
#[macro_export]
macro_rules! actor_span {
    ($address:expr) => {
        $crate::logging::tracing::debug_span!("actor", address = %$address)
    };
    ($address:expr, $($fields:tt)*) => {
        $crate::logging::tracing::debug_span!("actor", address = %$address, $($fields)*)
    };
}

/// Reference counting and lifecycle transitions of a control block.
#[macro_export]
macro_rules! log_lifecycle {
    ($address:expr, $event:expr) => {{
        $crate::logging::tracing::trace!(actor = %$address, event = $event);
    }};
    ($address:expr, $event:expr, $($fields:tt)*) => {{
        $crate::logging::tracing::trace!(actor = %$address, event = $event, $($fields)*);
    }};
}

/// Outcome of resolving an identity through the bridge.
#[macro_export]
macro_rules! log_resolution {
    ($address:expr, $outcome:expr) => {{
        $crate::logging::tracing::debug!(actor = %$address, outcome = $outcome);
    }};
    ($address:expr, $outcome:expr, $($fields:tt)*) => {{
        $crate::logging::tracing::debug!(actor = %$address, outcome = $outcome, $($fields)*);
    }};
}
