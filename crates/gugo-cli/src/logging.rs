use tracing::Level;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt::{self, writer::MakeWriterExt};
use tracing_subscriber::prelude::*;

const VERBOSE_DIRECTIVES: &str = "info,gugo_core=debug,gugo_providers=debug,gugo_cli=debug";

/// Installs the global subscriber. `RUST_LOG` wins over `verbose`.
/// Warnings and errors go to stderr, everything else to stdout.
pub fn init(verbose: bool) {
    let filter = build_filter(verbose, std::env::var("RUST_LOG").ok().as_deref());
    let writer = std::io::stderr
        .with_max_level(Level::WARN)
        .or_else(std::io::stdout);
    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(writer))
        .init();
}

fn default_directives(verbose: bool) -> &'static str {
    if verbose { VERBOSE_DIRECTIVES } else { "info" }
}

fn build_filter(verbose: bool, rust_log: Option<&str>) -> EnvFilter {
    match rust_log.map(str::trim).filter(|value| !value.is_empty()) {
        Some(directives) => EnvFilter::try_new(directives)
            .unwrap_or_else(|_| EnvFilter::new(default_directives(verbose))),
        None => EnvFilter::new(default_directives(verbose)),
    }
}
