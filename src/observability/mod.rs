//! Tracing setup.
//!
//! The crate only emits `tracing` events and spans. Applications normally
//! install their own subscriber; enable the `tracing-subscriber` feature to
//! use [`init_tracing`] instead.
//!
//! ```toml
//! agent-engine = { version = "0.1", features = ["tracing-subscriber"] }
//! ```

/// Filter used when neither the argument nor `RUST_LOG` gives one.
pub const DEFAULT_FILTER: &str = "info";

/// Installs a global `fmt` subscriber. `RUST_LOG` wins over `filter`.
///
/// Returns `false` if a global subscriber was already set.
#[cfg(feature = "tracing-subscriber")]
#[cfg_attr(docsrs, doc(cfg(feature = "tracing-subscriber")))]
pub fn init_tracing(filter: Option<&str>) -> bool {
    use tracing_subscriber::EnvFilter;

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(filter.unwrap_or(DEFAULT_FILTER)));

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(true)
        .try_init()
        .is_ok()
}

#[cfg(all(test, feature = "tracing-subscriber"))]
mod tests {
    use super::*;

    #[test]
    fn test_second_init_reports_existing_subscriber() {
        let _ = init_tracing(Some("debug"));
        assert!(!init_tracing(None));
    }
}
