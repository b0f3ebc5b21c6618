#![deny(missing_docs)]
//! Shared logging utilities for the scrapeqa workspace.
//!
//! Every crate logs through the `client_*` macros so that records carry the
//! common [`LOG_TARGET`] and can be filtered as one unit. The binary owns
//! the real logger; tests use [`initialize_for_tests`].

use std::sync::Once;

/// Target attached to every record emitted through the `client_*` macros.
pub const LOG_TARGET: &str = "scrapeqa";

/// Shortens a session identifier for log output.
///
/// Identifiers are correlation tokens, so only a prefix is written to logs.
pub fn short_id(id: &str) -> String {
    let prefix: String = id.chars().take(8).collect();
    if prefix.len() < id.len() {
        format!("{prefix}…")
    } else {
        prefix
    }
}

/// Logs a trace-level message under the workspace target.
#[macro_export]
macro_rules! client_trace {
    ($($arg:tt)*) => {{
        log::trace!(target: $crate::LOG_TARGET, $($arg)*);
    }};
}

/// Logs a debug-level message under the workspace target.
#[macro_export]
macro_rules! client_debug {
    ($($arg:tt)*) => {{
        log::debug!(target: $crate::LOG_TARGET, $($arg)*);
    }};
}

/// Logs an info-level message under the workspace target.
#[macro_export]
macro_rules! client_info {
    ($($arg:tt)*) => {{
        log::info!(target: $crate::LOG_TARGET, $($arg)*);
    }};
}

/// Logs a warn-level message under the workspace target.
#[macro_export]
macro_rules! client_warn {
    ($($arg:tt)*) => {{
        log::warn!(target: $crate::LOG_TARGET, $($arg)*);
    }};
}

/// Logs an error-level message under the workspace target.
#[macro_export]
macro_rules! client_error {
    ($($arg:tt)*) => {{
        log::error!(target: $crate::LOG_TARGET, $($arg)*);
    }};
}

/// Initializes a terminal logger for tests.
///
/// Only the first call installs a logger; later calls (from other tests in
/// the same binary) return immediately.
pub fn initialize_for_tests() {
    static INIT: Once = Once::new();
    INIT.call_once(|| {
        use simplelog::{ColorChoice, CombinedLogger, Config, TermLogger, TerminalMode};

        let level = if cfg!(debug_assertions) {
            log::LevelFilter::Debug
        } else {
            log::LevelFilter::Info
        };

        // Another harness may have set a logger already.
        let _ = CombinedLogger::init(vec![TermLogger::new(
            level,
            Config::default(),
            TerminalMode::Mixed,
            ColorChoice::Auto,
        )]);
    });
}
