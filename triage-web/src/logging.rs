//! Inicialização dos logs (`tracing`), em formato legível ou JSON.

use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use triage_core::config::LoggingConfig;

/// Inicializa o subscriber global.
///
/// `RUST_LOG`, quando definido, tem prioridade sobre `level`. Os logs vão
/// para stderr.
pub fn init(level: &str, json_format: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    if json_format {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(
                fmt::layer()
                    .with_target(false)
                    .with_writer(std::io::stderr)
                    .with_ansi(true),
            )
            .init();
    }
}

/// Inicializa a partir da seção `[logging]`, com os overrides da linha de comando.
pub fn init_from_config(config: &LoggingConfig, verbose: bool, json_logs: bool) {
    let level = if verbose { "debug" } else { config.level.as_str() };
    let json_format = json_logs || config.format == "json";
    init(level, json_format);
}
