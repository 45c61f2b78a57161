//! Composition stages.
//!
//! Per-clip stages (`splice`, `ensure_audio`, `standardize`) take a clip and
//! return an updated copy; they never touch shared state, so clips can run
//! concurrently. Job-level stages (`sequence`, `concatenate`,
//! `align_and_merge`) run once every clip is ready.

use std::sync::Arc;

use vcomp_media::{CancelToken, MediaProbe, MediaTranscoder};
use vcomp_models::JobId;

use crate::logging::JobLogger;

pub mod align;
pub mod audio;
pub mod concat;
pub mod sequence;
pub mod splice;
pub mod standardize;
pub mod temp;

pub use align::{align_and_merge, check_audio_track, plan_alignment, AlignmentAction, AlignmentOutcome};
pub use audio::ensure_audio;
pub use concat::concatenate;
pub use sequence::{sequence, validate_requests};
pub use splice::splice;
pub use standardize::standardize;
pub use temp::{TempArtifact, TempLifecycle};

/// Everything a stage needs about the running job.
#[derive(Clone)]
pub struct StageContext {
    pub job_id: JobId,
    pub probe: Arc<dyn MediaProbe>,
    pub transcoder: Arc<dyn MediaTranscoder>,
    pub temp: TempLifecycle,
    pub cancel: CancelToken,
    pub logger: JobLogger,
}

impl StageContext {
    pub fn new(
        job_id: JobId,
        probe: Arc<dyn MediaProbe>,
        transcoder: Arc<dyn MediaTranscoder>,
        temp: TempLifecycle,
        cancel: CancelToken,
    ) -> Self {
        let logger = JobLogger::new(&job_id);
        Self {
            job_id,
            probe,
            transcoder,
            temp,
            cancel,
            logger,
        }
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use async_trait::async_trait;
    use mockall::mock;
    use std::path::{Path, PathBuf};
    use std::sync::Arc;

    use vcomp_media::{CancelToken, MediaProbe, MediaResult, MediaStreamInfo, MediaTranscoder, RenderDirective};
    use vcomp_models::JobId;

    use super::{StageContext, TempLifecycle};

    mock! {
        pub Probe {}

        #[async_trait]
        impl MediaProbe for Probe {
            async fn probe(&self, path: &Path) -> MediaResult<MediaStreamInfo>;
        }
    }

    mock! {
        pub Transcoder {}

        #[async_trait]
        impl MediaTranscoder for Transcoder {
            async fn transcode(
                &self,
                inputs: &[PathBuf],
                directive: &RenderDirective,
                output: &Path,
                cancel: &CancelToken,
            ) -> MediaResult<PathBuf>;
        }
    }

    pub fn context(probe: MockProbe, transcoder: MockTranscoder) -> StageContext {
        StageContext::new(
            JobId::from_string("job-test"),
            Arc::new(probe),
            Arc::new(transcoder),
            TempLifecycle::new("/scratch", &JobId::from_string("job-test")),
            CancelToken::none(),
        )
    }
}
