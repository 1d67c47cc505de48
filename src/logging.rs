use tracing_subscriber::EnvFilter;

/// Install a global fmt subscriber. `RUST_LOG` wins over `default_directive`.
///
/// # Panics
///
/// Panics if a global subscriber is already installed. Use [`try_init`] where
/// that can happen, e.g. from tests.
pub fn init(default_directive: &str) {
    tracing_subscriber::fmt()
        .with_env_filter(env_filter(default_directive))
        .init();
}

/// Like [`init`], but returns `false` instead of panicking when a subscriber
/// is already set. Output goes through the test writer so it is captured per
/// test.
pub fn try_init(default_directive: &str) -> bool {
    tracing_subscriber::fmt()
        .with_env_filter(env_filter(default_directive))
        .with_test_writer()
        .try_init()
        .is_ok()
}

fn env_filter(default_directive: &str) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_directive))
}
