//! Structured run logging.

use podthumb_models::{RunId, Stage};
use tracing::{error, info, warn, Span};

/// Logs run lifecycle events with the run id and operation attached.
#[derive(Debug, Clone)]
pub struct RunLogger {
    run_id: String,
    operation: String,
}

impl RunLogger {
    /// `operation` names the entry point, e.g. `"run"` or `"sample"`.
    pub fn new(run_id: &RunId, operation: &str) -> Self {
        Self {
            run_id: run_id.to_string(),
            operation: operation.to_string(),
        }
    }

    pub fn log_start(&self, message: &str) {
        info!(
            run_id = %self.run_id,
            operation = %self.operation,
            "Run started: {}", message
        );
    }

    pub fn log_stage(&self, stage: Stage, message: &str) {
        info!(
            run_id = %self.run_id,
            operation = %self.operation,
            stage = %stage,
            "Stage: {}", message
        );
    }

    pub fn log_progress(&self, message: &str) {
        info!(
            run_id = %self.run_id,
            operation = %self.operation,
            "Run progress: {}", message
        );
    }

    pub fn log_warning(&self, message: &str) {
        warn!(
            run_id = %self.run_id,
            operation = %self.operation,
            "Run warning: {}", message
        );
    }

    pub fn log_error(&self, message: &str) {
        error!(
            run_id = %self.run_id,
            operation = %self.operation,
            "Run error: {}", message
        );
    }

    pub fn log_completion(&self, message: &str) {
        info!(
            run_id = %self.run_id,
            operation = %self.operation,
            "Run completed: {}", message
        );
    }

    pub fn run_id(&self) -> &str {
        &self.run_id
    }

    pub fn operation(&self) -> &str {
        &self.operation
    }

    pub fn create_span(&self) -> Span {
        tracing::info_span!(
            "run",
            run_id = %self.run_id,
            operation = %self.operation
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_run_logger_creation() {
        let run_id = RunId::new();
        let logger = RunLogger::new(&run_id, "run");

        assert_eq!(logger.run_id(), run_id.to_string());
        assert_eq!(logger.operation(), "run");
    }

    #[test]
    fn test_logging_does_not_panic() {
        let logger = RunLogger::new(&RunId::new(), "sample");
        let _guard = logger.create_span().entered();
        logger.log_start("starting");
        logger.log_stage(Stage::Identify, "cache miss");
        logger.log_progress("halfway");
        logger.log_warning("careful");
        logger.log_error("boom");
        logger.log_completion("done");
    }
}
