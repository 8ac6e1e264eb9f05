//! Logging setup
//!
//! Structured logging for the checkout engine. The presentation layer owns
//! the screen; everything observable from this crate goes through `tracing`.

/// Initialize the logger at the default level
pub fn init_logger() {
    init_logger_with_level(None);
}

/// Initialize the logger with an explicit level ("debug", "info", ...)
pub fn init_logger_with_level(log_level: Option<&str>) {
    let level = log_level.unwrap_or("info");

    tracing_subscriber::fmt()
        .with_max_level(level.parse().unwrap_or(tracing::Level::INFO))
        .with_file(false)
        .with_line_number(false)
        .with_thread_ids(false)
        .with_target(false)
        .init();
}

/// Load `.env` and initialize logging. Call once at startup.
pub fn setup_environment() {
    dotenv::dotenv().ok();
    init_logger_with_level(std::env::var("LOG_LEVEL").ok().as_deref());
}
