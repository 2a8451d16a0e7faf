// ABOUTME: tracing-subscriber setup; diagnostics go to stderr so prompts and tsh output stay clean
// ABOUTME: RUST_LOG takes precedence over the -v verbosity count

use tracing_subscriber::EnvFilter;

pub fn create_env_filter(verbosity: u8) -> EnvFilter {
    if std::env::var("RUST_LOG").is_ok() {
        EnvFilter::from_default_env()
    } else {
        match verbosity {
            0 => EnvFilter::new("tsh_helper=warn"),
            1 => EnvFilter::new("tsh_helper=info"),
            2 => EnvFilter::new("tsh_helper=debug"),
            _ => EnvFilter::new("tsh_helper=trace"),
        }
    }
}

pub fn init_logging(verbosity: u8) {
    tracing_subscriber::fmt()
        .with_env_filter(create_env_filter(verbosity))
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}
