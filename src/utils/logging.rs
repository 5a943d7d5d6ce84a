use tracing::Level;

/// Maps a level name (`LOG_LEVEL`, `--log-level`) to a tracing level.
/// Unknown names fall back to `info`.
pub fn parse_level(name: &str) -> Level {
    match name.trim().to_ascii_lowercase().as_str() {
        "error" => Level::ERROR,
        "warn" | "warning" => Level::WARN,
        "debug" => Level::DEBUG,
        "trace" => Level::TRACE,
        _ => Level::INFO,
    }
}

/// Installs the fmt subscriber at `level`. Later calls are no-ops.
pub fn init(level: &str) -> Level {
    let level = parse_level(level);
    let _ = tracing_subscriber::fmt()
        .with_max_level(level)
        .with_target(false)
        .try_init();
    level
}
