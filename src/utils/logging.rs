//! Logger setup plus a per-tick trace macro gated by a module-level
//! `ENABLE_LOGS` flag.
//!
//! Usage:
//! ```ignore
//! const ENABLE_LOGS: bool = false;
//!
//! use crate::log_tick;
//!
//! log_tick!("ramp tick {}", tick);
//! ```

use log::LevelFilter;

/// Installs the global logger at Info, or Debug when `debug` is set. Module
/// filters from `RUST_LOG` still apply. Safe to call more than once.
pub fn init(debug: bool) {
    let _ = env_logger::Builder::from_default_env()
        .filter_level(level(debug))
        .format_timestamp_millis()
        .try_init();
}

/// Reads `MOKUSO_DEBUG` the same way the binary does.
pub fn debug_from_env() -> bool {
    std::env::var("MOKUSO_DEBUG")
        .map(|value| value == "1" || value.eq_ignore_ascii_case("true"))
        .unwrap_or(false)
}

pub fn level(debug: bool) -> LevelFilter {
    if debug {
        LevelFilter::Debug
    } else {
        LevelFilter::Info
    }
}

/// Trace logging for hot loops. Checks the `ENABLE_LOGS` const in the
/// calling module, so disabled call sites compile to nothing.
#[macro_export]
macro_rules! log_tick {
    ($($arg:tt)*) => {
        if ENABLE_LOGS {
            log::trace!($($arg)*);
        }
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn level_follows_debug_flag() {
        assert_eq!(level(true), LevelFilter::Debug);
        assert_eq!(level(false), LevelFilter::Info);
    }

    #[test]
    fn init_twice_does_not_panic() {
        init(false);
        init(true);
    }
}
