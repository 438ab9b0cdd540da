use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

use thiserror::Error;
use tracing::Instrument;
use uuid::Uuid;

use super::gateway::ModelGateway;
use super::sanitize::strip_invisible_chars;
use super::stages;
use super::types::{
    PartialResults, PipelineResult, RunMetrics, SeverityAssessmentResult,
};
use super::{PipelineError, Stage};

/// Progress of a run through the stage sequence.
///
/// `Idle → Transcribing → MappingConditions → MappingProcedures →
/// AssessingSeverity → Done`, with `Failed` reachable from any non-terminal
/// state. Nothing is retained between runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    Idle,
    Transcribing,
    MappingConditions,
    MappingProcedures,
    AssessingSeverity,
    Done,
    Failed,
}

impl RunState {
    /// Caller-facing description of the step in progress.
    pub fn describe(&self) -> &'static str {
        match self {
            RunState::Idle => "Waiting for input",
            RunState::Transcribing => "Transcribing notes...",
            RunState::MappingConditions => "Mapping conditions to ICD codes...",
            RunState::MappingProcedures => "Mapping procedures to ICD codes...",
            RunState::AssessingSeverity => "Assessing condition severity...",
            RunState::Done => "Processing complete",
            RunState::Failed => "Processing failed",
        }
    }
}

impl std::fmt::Display for RunState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            RunState::Idle => "idle",
            RunState::Transcribing => "transcribing",
            RunState::MappingConditions => "mapping-conditions",
            RunState::MappingProcedures => "mapping-procedures",
            RunState::AssessingSeverity => "assessing-severity",
            RunState::Done => "done",
            RunState::Failed => "failed",
        };
        f.write_str(name)
    }
}

/// Cooperative cancellation flag, checked before each stage starts.
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    flag: Arc<AtomicBool>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }
}

/// A failed run: the error plus whatever completed before the failing stage.
#[derive(Debug, Error)]
#[error("{error}")]
pub struct FailedRun {
    pub error: PipelineError,
    pub partial: PartialResults,
}

impl FailedRun {
    /// The stage the failure points at, if any.
    pub fn stage(&self) -> Option<Stage> {
        self.error.stage()
    }
}

type ProgressFn = dyn Fn(RunState) + Send + Sync;

/// Sequences the four stages over a model gateway.
///
/// Mapping stages run back to back by default; [`with_concurrent_mapping`]
/// issues them together since they only depend on the transcription.
///
/// [`with_concurrent_mapping`]: NotesPipeline::with_concurrent_mapping
pub struct NotesPipeline {
    gateway: Arc<dyn ModelGateway>,
    concurrent_mapping: bool,
    progress: Option<Box<ProgressFn>>,
}

impl NotesPipeline {
    pub fn new(gateway: Arc<dyn ModelGateway>) -> Self {
        Self {
            gateway,
            concurrent_mapping: false,
            progress: None,
        }
    }

    /// Issue the condition and procedure mapping calls together.
    pub fn with_concurrent_mapping(mut self) -> Self {
        self.concurrent_mapping = true;
        self
    }

    /// Observe every state transition, e.g. to drive a progress indicator.
    pub fn with_progress(mut self, observer: impl Fn(RunState) + Send + Sync + 'static) -> Self {
        self.progress = Some(Box::new(observer));
        self
    }

    /// Process `notes` through all four stages.
    pub async fn run(&self, notes: &str) -> Result<PipelineResult, FailedRun> {
        self.run_with_cancel(notes, &CancelToken::new()).await
    }

    /// Process `notes`, aborting before the next stage once `cancel` fires.
    pub async fn run_with_cancel(
        &self,
        notes: &str,
        cancel: &CancelToken,
    ) -> Result<PipelineResult, FailedRun> {
        let run_id = Uuid::new_v4();
        let span = tracing::info_span!("pipeline_run", run_id = %run_id);
        self.execute(notes, cancel).instrument(span).await
    }

    fn transition(&self, state: RunState) {
        if let Some(observer) = &self.progress {
            observer(state);
        }
    }

    fn fail(&self, error: impl Into<PipelineError>, partial: PartialResults) -> FailedRun {
        let error = error.into();
        self.transition(RunState::Failed);
        tracing::warn!(stage = ?error.stage().map(|s| s.label()), %error, "pipeline run failed");
        FailedRun { error, partial }
    }

    fn check_cancel(
        &self,
        next: Stage,
        cancel: &CancelToken,
        partial: &PartialResults,
    ) -> Result<(), FailedRun> {
        if cancel.is_cancelled() {
            return Err(self.fail(PipelineError::Cancelled(next), partial.clone()));
        }
        Ok(())
    }

    async fn execute(
        &self,
        notes: &str,
        cancel: &CancelToken,
    ) -> Result<PipelineResult, FailedRun> {
        let started = Instant::now();
        let mut partial = PartialResults::default();

        let trimmed = notes.trim();
        if trimmed.is_empty() {
            return Err(self.fail(PipelineError::EmptyInput, partial));
        }

        let cleaned = strip_invisible_chars(trimmed);
        if cleaned.trim().is_empty() {
            return Err(self.fail(PipelineError::EmptyInput, partial));
        }
        let notes_len = cleaned.chars().count();

        // Stage 1: transcribe
        self.check_cancel(Stage::Transcribe, cancel, &partial)?;
        self.transition(RunState::Transcribing);
        let transcription = match stages::transcribe_notes(self.gateway.as_ref(), &cleaned).await {
            Ok(t) => t,
            Err(e) => return Err(self.fail(e, partial)),
        };
        partial.transcription = Some(transcription.clone());
        tracing::info!(chars = transcription.chars().count(), "notes transcribed");

        // Stages 2a/2b: mapping, sequential or fanned out
        let (conditions, procedures) = if self.concurrent_mapping {
            self.check_cancel(Stage::MapConditions, cancel, &partial)?;
            self.transition(RunState::MappingConditions);
            self.transition(RunState::MappingProcedures);
            let (conditions_result, procedures_result) = tokio::join!(
                stages::map_conditions(self.gateway.as_ref(), &transcription),
                stages::map_procedures(self.gateway.as_ref(), &transcription),
            );
            match (conditions_result, procedures_result) {
                (Ok(c), Ok(p)) => (c, p),
                (Ok(c), Err(e)) => {
                    partial.condition_code_mappings = Some(c);
                    return Err(self.fail(e, partial));
                }
                (Err(e), Ok(p)) => {
                    partial.procedure_code_mappings = Some(p);
                    return Err(self.fail(e, partial));
                }
                (Err(e), Err(_)) => return Err(self.fail(e, partial)),
            }
        } else {
            self.check_cancel(Stage::MapConditions, cancel, &partial)?;
            self.transition(RunState::MappingConditions);
            let conditions = match stages::map_conditions(self.gateway.as_ref(), &transcription).await
            {
                Ok(c) => c,
                Err(e) => return Err(self.fail(e, partial)),
            };
            partial.condition_code_mappings = Some(conditions.clone());

            self.check_cancel(Stage::MapProcedures, cancel, &partial)?;
            self.transition(RunState::MappingProcedures);
            let procedures =
                match stages::map_procedures(self.gateway.as_ref(), &transcription).await {
                    Ok(p) => p,
                    Err(e) => return Err(self.fail(e, partial)),
                };
            (conditions, procedures)
        };
        partial.condition_code_mappings = Some(conditions.clone());
        partial.procedure_code_mappings = Some(procedures.clone());
        tracing::info!(
            conditions = conditions.len(),
            procedures = procedures.len(),
            "codes mapped"
        );

        // Stage 3: severity, once per condition, input order preserved
        let mut assessments = Vec::with_capacity(conditions.len());
        if !conditions.is_empty() {
            self.check_cancel(Stage::AssessSeverity, cancel, &partial)?;
            self.transition(RunState::AssessingSeverity);
            for mapping in &conditions {
                if cancel.is_cancelled() {
                    partial.severity_assessments = Some(assessments);
                    return Err(
                        self.fail(PipelineError::Cancelled(Stage::AssessSeverity), partial)
                    );
                }
                let assessment = match stages::assess_severity(
                    self.gateway.as_ref(),
                    &mapping.condition,
                    &transcription,
                )
                .await
                {
                    Ok(a) => a,
                    Err(e) => {
                        partial.severity_assessments = Some(assessments);
                        return Err(self.fail(e, partial));
                    }
                };
                assessments.push(SeverityAssessmentResult {
                    mapping: mapping.clone(),
                    severity: assessment.severity,
                    reason: assessment.reason,
                });
            }
        }

        self.transition(RunState::Done);
        let metrics = RunMetrics {
            elapsed_ms: started.elapsed().as_millis() as u64,
            notes_len,
            transcription_len: transcription.chars().count(),
            condition_count: conditions.len(),
            procedure_count: procedures.len(),
        };
        tracing::info!(
            elapsed_ms = metrics.elapsed_ms,
            conditions = metrics.condition_count,
            procedures = metrics.procedure_count,
            "pipeline run complete"
        );

        Ok(PipelineResult {
            transcription,
            condition_code_mappings: conditions,
            procedure_code_mappings: procedures,
            severity_assessments: assessments,
            metrics,
        })
    }
}
