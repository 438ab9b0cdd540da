//! MedScribe turns free-text clinical notes into ICD billing-code mappings
//! through a staged LLM pipeline: transcribe → map conditions → map
//! procedures → assess severity per condition.
//!
//! All classification is delegated to an external chat-completion service
//! behind [`pipeline::ModelGateway`]; this crate owns the prompts, the
//! structured-output contract, and the run sequencing. Nothing is persisted —
//! every value lives for one [`pipeline::NotesPipeline::run`].

pub mod config;
pub mod pipeline;

pub use config::{ConfigError, GatewayConfig};
pub use pipeline::{
    CancelToken, ConditionCodeMapping, FailedRun, GatewayError, MockGateway, ModelGateway,
    NotesPipeline, OpenAiGateway, PartialResults, PipelineError, PipelineResult,
    ProcedureCodeMapping, RunMetrics, RunState, SchemaViolation, Severity, SeverityAssessment,
    SeverityAssessmentResult, Stage, StageError, StageFailure,
};

use tracing_subscriber::EnvFilter;

/// Initialize tracing with the crate's default filter.
///
/// Convenience for embedders; honors `RUST_LOG` when set.
pub fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(config::default_log_filter())),
        )
        .init();
}
