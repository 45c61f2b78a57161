//! Job-scoped structured logging.
//!
//! Every line carries `job_id`; clip lines add `sequence_index`, stage lines
//! add `stage`, so a single job can be followed through JSON logs.

use std::path::Path;
use std::time::Duration;
use tracing::{error, info, Span};

use vcomp_models::{AlignmentStandard, JobId, Resolution};

use crate::error::{ComposeError, Stage};

/// Logger bound to one composition job.
#[derive(Debug, Clone)]
pub struct JobLogger {
    job_id: JobId,
}

impl JobLogger {
    pub fn new(job_id: &JobId) -> Self {
        Self {
            job_id: job_id.clone(),
        }
    }

    pub fn job_id(&self) -> &JobId {
        &self.job_id
    }

    pub fn started(&self, clips: usize, canvas: Resolution, standard: AlignmentStandard) {
        info!(
            job_id = %self.job_id,
            clips,
            canvas = %canvas,
            standard = %standard,
            "Composition started"
        );
    }

    /// A job-level stage finished.
    pub fn stage(&self, stage: Stage, message: &str) {
        info!(job_id = %self.job_id, stage = %stage, "{}", message);
    }

    pub fn clip(&self, sequence_index: u32, message: &str) {
        info!(job_id = %self.job_id, sequence_index, "{}", message);
    }

    pub fn failed(&self, err: &ComposeError) {
        error!(
            job_id = %self.job_id,
            stage = %err.stage(),
            sequence_index = ?err.sequence_index(),
            "Composition failed: {}", err
        );
    }

    pub fn completed(&self, output: &Path, elapsed: Duration) {
        info!(
            job_id = %self.job_id,
            output = %output.display(),
            elapsed_secs = elapsed.as_secs_f64(),
            "Composition completed"
        );
    }

    /// Span wrapping the whole job.
    pub fn span(&self) -> Span {
        tracing::info_span!("compose", job_id = %self.job_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_logger_keeps_job_id() {
        let logger = JobLogger::new(&JobId::from_string("job-42"));
        assert_eq!(logger.job_id().as_str(), "job-42");

        // Emitting without a subscriber must be harmless
        logger.clip(3, "spliced");
        logger.stage(Stage::Concatenation, "clips concatenated");
        logger.failed(&ComposeError::invalid_job("bad"));
    }
}
