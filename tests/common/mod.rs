#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use safe_runner::shutdown::{ShutdownController, ShutdownOptions};
use safe_runner::types::SpawnStrategy;
use safe_runner_test_utils::fake_registry::FakeRegistry;

pub use safe_runner_test_utils::init_tracing;

pub type TestResult = Result<(), Box<dyn std::error::Error>>;

/// Options for controllers built in tests: no OS signal handlers, so the
/// test harness keeps its own Ctrl-C behaviour.
pub fn test_options() -> ShutdownOptions {
    ShutdownOptions {
        terminate_timeout: Duration::from_millis(200),
        spawn_strategy: SpawnStrategy::Inherit,
        handle_signals: false,
    }
}

pub fn controller_for(registry: &FakeRegistry) -> ShutdownController {
    ShutdownController::install(Arc::new(registry.clone()), test_options())
        .expect("installing a controller without signal handlers cannot fail")
}
