//! Logging initialisation
//!
//! Everything logs through the `log` facade. The binary installs
//! `env_logger` with an `info` default (`debug` with `--debug`); `RUST_LOG`
//! always wins.

use log::LevelFilter;

/// Default filter for the given debug flag.
pub fn default_filter(debug: bool) -> &'static str {
    if debug {
        "debug"
    } else {
        "info"
    }
}

/// Installs the global logger. Calling it again is harmless.
pub fn init(debug: bool) -> bool {
    let env = env_logger::Env::default().default_filter_or(default_filter(debug));
    let installed = env_logger::Builder::from_env(env)
        .format_timestamp_millis()
        .try_init()
        .is_ok();
    if installed {
        log::debug!("Logger installed (max level {})", log::max_level());
    }
    installed
}

/// Raises or lowers the global level at runtime, e.g. after the config file
/// turned `general.debug` on.
pub fn set_debug(debug: bool) {
    log::set_max_level(if debug {
        LevelFilter::Debug
    } else {
        LevelFilter::Info
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_filter() {
        assert_eq!(default_filter(true), "debug");
        assert_eq!(default_filter(false), "info");
    }

    #[test]
    fn test_init_is_idempotent() {
        init(false);
        assert!(!init(true));
    }
}
