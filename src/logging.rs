use tracing_subscriber::EnvFilter;

/// Environment variable read when no explicit filter is given.
pub const LOG_ENV: &str = "PSP_TRACKER_LOG";

/// Install a global fmt subscriber.
///
/// `filter` takes `EnvFilter` directives (`"debug"`, `"psp_tracker=trace"`).
/// Without one, `PSP_TRACKER_LOG` is used, falling back to `info`.
/// Returns `false` if a subscriber was already installed.
pub fn init_logging(filter: Option<&str>) -> bool {
    let filter = match filter {
        Some(directives) => EnvFilter::new(directives),
        None => EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new("info")),
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .try_init()
        .is_ok()
}
