use tracing_subscriber::EnvFilter;

/// Install the global tracing subscriber.
///
/// The filter comes from `RUST_LOG` and defaults to `info`, which logs
/// every consumed widget; use `warn` for a quiet run or `debug` to follow
/// producers, consumers and the moderator.
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(cfg!(debug_assertions))
        .init();
}
