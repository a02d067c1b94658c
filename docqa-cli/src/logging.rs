use tracing_subscriber::EnvFilter;

/// Install the global subscriber. Logs go to stderr so answers printed on
/// stdout stay machine-readable.
pub fn init(json: bool) {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .with_writer(std::io::stderr);

    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}
