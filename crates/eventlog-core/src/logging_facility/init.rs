//! Subscriber setup for hosts embedding the event log
//!
//! Pipeline diagnostics (sink swaps, backpressure waits, delta policy
//! anomalies) go through `tracing`. The host picks how they are rendered.

use std::sync::Once;
use tracing_subscriber::{util::SubscriberInitExt, EnvFilter};

/// How pipeline diagnostics are rendered
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Profile {
    /// Human-readable lines, including per-write debug events
    Development,
    /// One JSON object per diagnostic, lifecycle operations and above
    Production,
    /// Nothing rendered; tests attach `init_test_capture()` instead
    Test,
}

impl Profile {
    /// Filter used when `RUST_LOG` is not set
    pub fn default_directive(&self) -> &'static str {
        match self {
            Profile::Development => "eventlog_core=debug,eventlog_pipeline=debug",
            // Delta anomalies are warnings; lifecycle ops log at info
            Profile::Production => "eventlog_core=warn,eventlog_pipeline=info",
            Profile::Test => "eventlog_core=trace,eventlog_pipeline=trace",
        }
    }
}

static INIT_ONCE: Once = Once::new();

/// Install the global subscriber for `profile`
///
/// Only the first call has an effect. The pipeline never calls this
/// itself, and a subscriber the host installed earlier is left alone.
///
/// # Example
///
/// ```
/// use eventlog_core::logging_facility::{init, Profile};
///
/// init(Profile::Production);
/// ```
pub fn init(profile: Profile) {
    INIT_ONCE.call_once(|| {
        let filter = EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(profile.default_directive()));
        match profile {
            Profile::Development => {
                let _ = tracing_subscriber::fmt()
                    .with_env_filter(filter)
                    .with_target(true)
                    .try_init();
            }
            Profile::Production => {
                let _ = tracing_subscriber::fmt()
                    .json()
                    .with_env_filter(filter)
                    .try_init();
            }
            Profile::Test => {
                let _ = tracing_subscriber::registry().try_init();
            }
        }
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_idempotent() {
        init(Profile::Test);
        init(Profile::Test);
        init(Profile::Development);
    }

    #[test]
    fn test_profile_directives() {
        assert!(Profile::Production
            .default_directive()
            .contains("eventlog_pipeline=info"));
        assert_ne!(
            Profile::Development.default_directive(),
            Profile::Production.default_directive()
        );
    }
}
