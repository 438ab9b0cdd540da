use serde::{Deserialize, Serialize};

/// A condition identified in the transcribed notes, mapped to an ICD code.
///
/// Wire names are camelCase to match the model's instructed output format.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConditionCodeMapping {
    pub condition: String,
    pub icd_code: String,
    /// Clinical classification, e.g. "Primary Diagnosis", "Comorbidity".
    pub condition_category: String,
    /// Relevance of the mapping, 0 to 1.
    pub confidence: f32,
    /// Verbatim snippet from the notes supporting the condition (max 100
    /// chars requested of the model, not enforced).
    pub source_text: String,
    /// Why this ICD code was chosen (max 150 chars requested).
    pub justification: String,
}

/// A procedure identified in the transcribed notes, mapped to an ICD code.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcedureCodeMapping {
    pub procedure: String,
    pub icd_code: String,
    pub confidence: f32,
    pub source_text: String,
    pub justification: String,
}

/// Assessed severity level of a condition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Low,
    Medium,
    High,
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Severity::Low => write!(f, "low"),
            Severity::Medium => write!(f, "medium"),
            Severity::High => write!(f, "high"),
        }
    }
}

/// The severity verdict for a single condition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SeverityAssessment {
    pub severity: Severity,
    pub reason: String,
}

/// A condition mapping joined with its severity assessment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SeverityAssessmentResult {
    #[serde(flatten)]
    pub mapping: ConditionCodeMapping,
    pub severity: Severity,
    pub reason: String,
}

/// Operational analytics for one pipeline run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct RunMetrics {
    /// Wall-clock duration of the whole run in milliseconds.
    pub elapsed_ms: u64,
    /// Length of the (trimmed) notes input, in characters.
    pub notes_len: usize,
    /// Length of the transcription, in characters.
    pub transcription_len: usize,
    pub condition_count: usize,
    pub procedure_count: usize,
}

/// Aggregate output of a successful pipeline run.
///
/// `severity_assessments` always has exactly one entry per condition mapping.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PipelineResult {
    pub transcription: String,
    pub condition_code_mappings: Vec<ConditionCodeMapping>,
    pub procedure_code_mappings: Vec<ProcedureCodeMapping>,
    pub severity_assessments: Vec<SeverityAssessmentResult>,
    pub metrics: RunMetrics,
}

/// Whatever a failed run managed to compute before the failing stage.
///
/// `None` means the stage never completed; an empty vec means it completed
/// and legitimately found nothing.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PartialResults {
    pub transcription: Option<String>,
    pub condition_code_mappings: Option<Vec<ConditionCodeMapping>>,
    pub procedure_code_mappings: Option<Vec<ProcedureCodeMapping>>,
    pub severity_assessments: Option<Vec<SeverityAssessmentResult>>,
}
