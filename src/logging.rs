use tracing_subscriber::EnvFilter;

/// Install the global subscriber. Logs always go to stderr so stdout stays
/// free for the conversation (or, in the tool server, for the protocol).
///
/// `RUST_LOG` wins when set; otherwise `warn`, or `debug` for this crate
/// under `verbose`.
pub fn init(verbose: bool) {
    let default_directive = if verbose {
        "warn,mcp2ai=debug,weather_mcp=debug"
    } else {
        "warn"
    };

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directive));

    // A second call (e.g. from tests) leaves the first subscriber in place.
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(verbose)
        .try_init();
}
