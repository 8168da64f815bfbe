use std::str::FromStr;

use tracing::level_filters::LevelFilter;

/// Installs the stderr subscriber. `-v` flags win over the configured level.
pub(crate) fn init(verbose: u8, configured: Option<&str>) {
    let level = match verbose {
        0 => configured
            .and_then(|level| LevelFilter::from_str(level).ok())
            .unwrap_or(LevelFilter::WARN),
        1 => LevelFilter::DEBUG,
        _ => LevelFilter::TRACE,
    };
    let _ = tracing_subscriber::fmt()
        .with_max_level(level)
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init();
}
