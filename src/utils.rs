/// Utility functions shared by training entry points

/// Environment variable holding the log level
pub const LOG_LEVEL_ENV: &str = "APP_LOG_LEVEL";

/// Install the `env_logger` backend
///
/// The level is read from `APP_LOG_LEVEL` and defaults to `info`. Calling
/// this more than once is harmless.
pub fn init_logging() {
    let env = env_logger::Env::default().filter_or(LOG_LEVEL_ENV, "info");
    if env_logger::Builder::from_env(env)
        .format_timestamp_secs()
        .try_init()
        .is_ok()
    {
        log::info!("Starting. Process id: {}", std::process::id());
    }
}

/// Relative difference between two values, safe around zero
pub fn relative_diff(a: f64, b: f64) -> f64 {
    let scale = a.abs().max(b.abs());
    if scale == 0.0 {
        0.0
    } else {
        (a - b).abs() / scale
    }
}
