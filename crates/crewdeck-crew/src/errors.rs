use crewdeck_core::CrewError;
use std::error::Error as _;
use tracing::error;

/// Shared sink for errors caught inside the pipeline.
pub trait ErrorHandler: Send + Sync {
    /// Record `error`, raised while running `operation`.
    fn handle(&self, error: &CrewError, operation: &str);
}

/// Logs `"<operation>: <error>"` with the source chain.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingErrorHandler;

impl ErrorHandler for TracingErrorHandler {
    fn handle(&self, error: &CrewError, operation: &str) {
        handle_crew_error(error, operation);
    }
}

/// Log `error` for `operation`, including every source in its chain.
pub fn handle_crew_error(error: &CrewError, operation: &str) {
    let mut chain = Vec::new();
    let mut source = error.source();
    while let Some(cause) = source {
        chain.push(cause.to_string());
        source = cause.source();
    }

    if chain.is_empty() {
        error!("{operation}: {error}");
    } else {
        error!(causes = ?chain, "{operation}: {error}");
    }
}
