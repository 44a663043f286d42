//! Colorized key/message logging for lifecycle events.

const MAGENTA: &str = "\x1b[35m";
const YELLOW: &str = "\x1b[33m";
const RESET: &str = "\x1b[0m";

pub fn format_cb_log(key: &str, message: impl std::fmt::Display) -> String {
    format!("{MAGENTA}{key}:{YELLOW} {message}{RESET}")
}

/// Log `message` under `key` with the key in magenta and the message in yellow.
pub fn cb_log(key: &str, message: impl std::fmt::Display) {
    tracing::info!("{}", format_cb_log(key, message));
}
