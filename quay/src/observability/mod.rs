//! Logging setup for Quay applications and their test suites.

mod tracing;

pub use self::tracing::TracingConfig;
