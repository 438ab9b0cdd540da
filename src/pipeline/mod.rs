pub mod gateway;
pub mod orchestrator;
pub mod prompt;
pub mod sanitize;
pub mod schema;
pub mod stages;
pub mod types;

pub use gateway::*;
pub use orchestrator::*;
pub use schema::{FieldKind, FieldSpec, SchemaViolation, Shape};
pub use types::*;

use thiserror::Error;

/// Identity of one request/response unit of the pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stage {
    Transcribe,
    MapConditions,
    MapProcedures,
    AssessSeverity,
}

impl Stage {
    /// Caller-facing label used in failure notices.
    pub fn label(&self) -> &'static str {
        match self {
            Stage::Transcribe => "transcription",
            Stage::MapConditions => "condition mapping",
            Stage::MapProcedures => "procedure mapping",
            Stage::AssessSeverity => "severity assessment",
        }
    }
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

/// What went wrong inside a stage.
#[derive(Debug, Error)]
pub enum StageFailure {
    #[error(transparent)]
    Gateway(#[from] gateway::GatewayError),

    #[error("response is not valid JSON: {0}")]
    ResponseParse(String),

    #[error(transparent)]
    Schema(#[from] schema::SchemaViolation),
}

/// A stage that failed, with the input it was given.
///
/// `Display` never echoes the input — note content stays out of logs and
/// user-facing messages. The field remains on the value for diagnostics.
#[derive(Debug, Error)]
#[error("{stage} failed: {source}")]
pub struct StageError {
    pub stage: Stage,
    pub input: String,
    pub source: StageFailure,
}

impl StageError {
    pub fn new(stage: Stage, input: impl Into<String>, source: StageFailure) -> Self {
        Self {
            stage,
            input: input.into(),
            source,
        }
    }
}

/// Why a pipeline run did not finish.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("notes input is empty")]
    EmptyInput,

    #[error("run cancelled before {0}")]
    Cancelled(Stage),

    #[error(transparent)]
    Stage(#[from] StageError),
}

impl PipelineError {
    /// The stage this error points at, if any.
    pub fn stage(&self) -> Option<Stage> {
        match self {
            PipelineError::EmptyInput => None,
            PipelineError::Cancelled(stage) => Some(*stage),
            PipelineError::Stage(err) => Some(err.stage),
        }
    }
}
