//! Testing utilities for the bond workspace
//!
//! Sample instrumentation targets, their mocks, and tracing setup for tests.

#![allow(missing_docs)]

pub mod mocks;
pub mod samples;

pub use mocks::{
    create_mock_datetime, create_strict_mock_datetime, mock_make_a_network_request, mock_now,
    mock_write_to_disk,
};
pub use samples::{invoke, network_request_signature, SampleRuntime, FLOSS_MESSAGE};

use tracing_subscriber::EnvFilter;

/// Route `tracing` output to the test harness; `RUST_LOG` picks the level
pub fn init_tracing() {
    // A second call in the same process finds a subscriber already set.
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// Fresh runtime with every sample module loaded
pub fn sample_runtime() -> SampleRuntime {
    init_tracing();
    SampleRuntime::new().unwrap()
}
