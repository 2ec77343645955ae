use log::LevelFilter;

/// Log to stderr at `Info`, overridable through `RUST_LOG`.
///
/// Calling this more than once keeps the first logger.
pub fn init_logging() {
    let _ = env_logger::builder()
        .format_target(false)
        .format_timestamp_secs()
        .filter_level(LevelFilter::Info)
        .parse_default_env()
        .try_init();
}
