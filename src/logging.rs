use crate::config::AppConfig;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

/// Directive used when `RUST_LOG` is unset.
///
/// The configured level applies to this crate; dependencies stay at `warn`.
/// At `trace` everything is opened up, sqlx statement logs included.
fn default_directive(log_level: &str) -> String {
    let level = log_level.trim().to_ascii_lowercase();
    match level.as_str() {
        "trace" => "trace".to_string(),
        "debug" => "info,bonus_accrual=debug,sqlx=warn".to_string(),
        _ => format!("warn,bonus_accrual={}", level),
    }
}

/// Install the global subscriber. Keep the guard alive until exit or
/// buffered lines are lost.
pub fn init_logging(config: &AppConfig) -> WorkerGuard {
    let file_appender = match config.rotation.as_str() {
        "hourly" => tracing_appender::rolling::hourly(&config.log_dir, &config.log_file),
        "daily" => tracing_appender::rolling::daily(&config.log_dir, &config.log_file),
        _ => tracing_appender::rolling::never(&config.log_dir, &config.log_file),
    };
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directive(&config.log_level)));
    let registry = tracing_subscriber::registry().with(filter);

    // JSON goes to the file only; text mode mirrors to a colored stdout
    if config.use_json {
        let file_layer = fmt::layer()
            .json()
            .with_current_span(false)
            .with_target(true)
            .with_writer(non_blocking);
        registry.with(file_layer).init();
    } else {
        let file_layer = fmt::layer()
            .with_target(false)
            .with_writer(non_blocking)
            .with_ansi(false);
        let stdout_layer = fmt::layer().with_target(false).with_ansi(true);
        registry.with(file_layer).with(stdout_layer).init();
    }

    guard
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_directive_scopes_level_to_crate() {
        assert_eq!(default_directive("info"), "warn,bonus_accrual=info");
        assert_eq!(default_directive(" WARN "), "warn,bonus_accrual=warn");
    }

    #[test]
    fn test_default_directive_debug_keeps_sqlx_quiet() {
        let directive = default_directive("debug");
        assert!(directive.contains("bonus_accrual=debug"));
        assert!(directive.contains("sqlx=warn"));
    }

    #[test]
    fn test_default_directive_trace_opens_everything() {
        assert_eq!(default_directive("trace"), "trace");
    }

    #[test]
    fn test_default_directive_parses() {
        for level in ["trace", "debug", "info", "warn", "error"] {
            assert!(EnvFilter::try_new(default_directive(level)).is_ok());
        }
    }
}
