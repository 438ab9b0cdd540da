//! The four stage functions.
//!
//! Every stage is the same request/response unit: build the prompt, call the
//! gateway, parse the returned text as JSON, check it against the stage's
//! declared shape, then decode into the typed record. Any failure along that
//! path becomes a [`StageError`] carrying the stage identity and the original
//! input; nothing is retried.

use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::Value;

use super::gateway::ModelGateway;
use super::prompt;
use super::schema::{FieldSpec, Shape};
use super::types::{ConditionCodeMapping, ProcedureCodeMapping, SeverityAssessment};
use super::{Stage, StageError, StageFailure};

pub const SEVERITY_LEVELS: &[&str] = &["low", "medium", "high"];

fn transcription_shape() -> Shape {
    Shape::new("transcription", vec![FieldSpec::string("transcription")])
}

fn condition_mappings_shape() -> Shape {
    Shape::new(
        "conditionCodeMappings",
        vec![FieldSpec::array(
            "conditionCodeMappings",
            Shape::new(
                "conditionCodeMapping",
                vec![
                    FieldSpec::string("condition"),
                    FieldSpec::string("icdCode"),
                    FieldSpec::string("conditionCategory"),
                    FieldSpec::number("confidence", Some(0.0), Some(1.0)),
                    FieldSpec::string("sourceText"),
                    FieldSpec::string("justification"),
                ],
            ),
        )],
    )
}

fn procedure_mappings_shape() -> Shape {
    Shape::new(
        "procedureCodeMappings",
        vec![FieldSpec::array(
            "procedureCodeMappings",
            Shape::new(
                "procedureCodeMapping",
                vec![
                    FieldSpec::string("procedure"),
                    FieldSpec::string("icdCode"),
                    FieldSpec::number("confidence", Some(0.0), Some(1.0)),
                    FieldSpec::string("sourceText"),
                    FieldSpec::string("justification"),
                ],
            ),
        )],
    )
}

fn severity_shape() -> Shape {
    Shape::new(
        "severityAssessment",
        vec![
            FieldSpec::enumeration("severity", SEVERITY_LEVELS),
            FieldSpec::string("reason"),
        ],
    )
}

/// One gateway round-trip: call, parse, shape-check, decode.
async fn run_stage<T: DeserializeOwned>(
    gateway: &dyn ModelGateway,
    stage: Stage,
    system: &str,
    user: &str,
    shape: &Shape,
    input: &str,
) -> Result<T, StageError> {
    let raw = gateway
        .complete_json(system, user)
        .await
        .map_err(|e| StageError::new(stage, input, StageFailure::Gateway(e)))?;

    let value: Value = serde_json::from_str(&raw)
        .map_err(|e| StageError::new(stage, input, StageFailure::ResponseParse(e.to_string())))?;

    shape
        .validate(&value)
        .map_err(|e| StageError::new(stage, input, StageFailure::Schema(e)))?;

    let typed = serde_json::from_value(value)
        .map_err(|e| StageError::new(stage, input, StageFailure::ResponseParse(e.to_string())))?;

    tracing::debug!(stage = %stage, "stage completed");
    Ok(typed)
}

#[derive(Deserialize)]
struct TranscriptionPayload {
    transcription: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ConditionMappingsPayload {
    condition_code_mappings: Vec<ConditionCodeMapping>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ProcedureMappingsPayload {
    procedure_code_mappings: Vec<ProcedureCodeMapping>,
}

/// Rewrite raw doctor's notes into jargon-free prose.
pub async fn transcribe_notes(
    gateway: &dyn ModelGateway,
    notes: &str,
) -> Result<String, StageError> {
    let user = prompt::build_transcribe_prompt(notes);
    let payload: TranscriptionPayload = run_stage(
        gateway,
        Stage::Transcribe,
        prompt::TRANSCRIBE_SYSTEM_PROMPT,
        &user,
        &transcription_shape(),
        notes,
    )
    .await?;
    Ok(payload.transcription)
}

/// Identify conditions in the transcription and map each to an ICD code.
/// An empty result is valid — it means no conditions were found.
pub async fn map_conditions(
    gateway: &dyn ModelGateway,
    transcribed_notes: &str,
) -> Result<Vec<ConditionCodeMapping>, StageError> {
    let user = prompt::build_condition_mapping_prompt(transcribed_notes);
    let payload: ConditionMappingsPayload = run_stage(
        gateway,
        Stage::MapConditions,
        prompt::CONDITION_MAPPING_SYSTEM_PROMPT,
        &user,
        &condition_mappings_shape(),
        transcribed_notes,
    )
    .await?;
    Ok(payload.condition_code_mappings)
}

/// Identify procedures in the transcription and map each to an ICD code.
pub async fn map_procedures(
    gateway: &dyn ModelGateway,
    transcribed_notes: &str,
) -> Result<Vec<ProcedureCodeMapping>, StageError> {
    let user = prompt::build_procedure_mapping_prompt(transcribed_notes);
    let payload: ProcedureMappingsPayload = run_stage(
        gateway,
        Stage::MapProcedures,
        prompt::PROCEDURE_MAPPING_SYSTEM_PROMPT,
        &user,
        &procedure_mappings_shape(),
        transcribed_notes,
    )
    .await?;
    Ok(payload.procedure_code_mappings)
}

/// Assess the severity of a single condition against the notes.
/// Called once per condition, never batched.
pub async fn assess_severity(
    gateway: &dyn ModelGateway,
    condition: &str,
    notes: &str,
) -> Result<SeverityAssessment, StageError> {
    let user = prompt::build_severity_prompt(condition, notes);
    run_stage(
        gateway,
        Stage::AssessSeverity,
        prompt::SEVERITY_SYSTEM_PROMPT,
        &user,
        &severity_shape(),
        condition,
    )
    .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::gateway::{GatewayError, MockGateway};
    use crate::pipeline::types::Severity;

    fn condition_response() -> &'static str {
        r#"{
          "conditionCodeMappings": [
            {
              "condition": "hypertension",
              "icdCode": "I10",
              "conditionCategory": "Primary Diagnosis",
              "confidence": 0.95,
              "sourceText": "Hx HTN",
              "justification": "Documented history of essential hypertension"
            }
          ]
        }"#
    }

    // ── Transcribe ──────────────────────────────────────────────────

    #[tokio::test]
    async fn transcribe_returns_transcription_field() {
        let gateway = MockGateway::new(
            r#"{"transcription": "Patient complains of shortness of breath."}"#,
        );
        let result = transcribe_notes(&gateway, "Pt c/o SOB").await.unwrap();
        assert_eq!(result, "Patient complains of shortness of breath.");
    }

    #[tokio::test]
    async fn transcribe_non_json_body_fails_with_parse_error() {
        let gateway = MockGateway::new("Sorry, I cannot help with that.");
        let err = transcribe_notes(&gateway, "Pt c/o SOB").await.unwrap_err();
        assert_eq!(err.stage, Stage::Transcribe);
        assert_eq!(err.input, "Pt c/o SOB");
        assert!(matches!(err.source, StageFailure::ResponseParse(_)));
    }

    #[tokio::test]
    async fn transcribe_missing_field_fails_schema_validation() {
        let gateway = MockGateway::new(r#"{"text": "wrong key"}"#);
        let err = transcribe_notes(&gateway, "notes").await.unwrap_err();
        assert!(matches!(err.source, StageFailure::Schema(_)));
    }

    // ── MapConditions ───────────────────────────────────────────────

    #[tokio::test]
    async fn map_conditions_returns_typed_mappings() {
        let gateway = MockGateway::new(condition_response());
        let mappings = map_conditions(&gateway, "hypertension noted").await.unwrap();
        assert_eq!(mappings.len(), 1);
        assert_eq!(mappings[0].condition, "hypertension");
        assert_eq!(mappings[0].icd_code, "I10");
        assert_eq!(mappings[0].condition_category, "Primary Diagnosis");
    }

    #[tokio::test]
    async fn map_conditions_empty_array_is_valid() {
        let gateway = MockGateway::new(r#"{"conditionCodeMappings": []}"#);
        let mappings = map_conditions(&gateway, "healthy patient").await.unwrap();
        assert!(mappings.is_empty());
    }

    #[tokio::test]
    async fn map_conditions_confidence_out_of_range_rejected() {
        let gateway = MockGateway::new(
            r#"{
              "conditionCodeMappings": [
                {
                  "condition": "hypertension",
                  "icdCode": "I10",
                  "conditionCategory": "Primary Diagnosis",
                  "confidence": 1.7,
                  "sourceText": "Hx HTN",
                  "justification": "x"
                }
              ]
            }"#,
        );
        let err = map_conditions(&gateway, "notes").await.unwrap_err();
        match err.source {
            StageFailure::Schema(violation) => {
                assert!(violation.problems[0].contains("confidence"));
            }
            other => panic!("expected schema violation, got {other:?}"),
        }
    }

    // ── MapProcedures ───────────────────────────────────────────────

    #[tokio::test]
    async fn map_procedures_returns_typed_mappings() {
        let gateway = MockGateway::new(
            r#"{
              "procedureCodeMappings": [
                {
                  "procedure": "electrocardiogram",
                  "icdCode": "89.52",
                  "confidence": 0.9,
                  "sourceText": "Order EKG",
                  "justification": "EKG ordered in plan"
                }
              ]
            }"#,
        );
        let mappings = map_procedures(&gateway, "an electrocardiogram was ordered")
            .await
            .unwrap();
        assert_eq!(mappings.len(), 1);
        assert_eq!(mappings[0].procedure, "electrocardiogram");
    }

    #[tokio::test]
    async fn map_procedures_gateway_failure_carries_stage_identity() {
        let gateway = MockGateway::failing(GatewayError::Status {
            status: 503,
            body: "overloaded".into(),
        });
        let err = map_procedures(&gateway, "notes").await.unwrap_err();
        assert_eq!(err.stage, Stage::MapProcedures);
        assert!(matches!(err.source, StageFailure::Gateway(_)));
        assert!(err.to_string().starts_with("procedure mapping failed"));
    }

    // ── AssessSeverity ──────────────────────────────────────────────

    #[tokio::test]
    async fn assess_severity_returns_level_and_reason() {
        let gateway = MockGateway::new(
            r#"{"severity": "medium", "reason": "documented history, currently managed"}"#,
        );
        let assessment = assess_severity(&gateway, "hypertension", "notes")
            .await
            .unwrap();
        assert_eq!(assessment.severity, Severity::Medium);
        assert!(!assessment.reason.is_empty());
    }

    #[tokio::test]
    async fn assess_severity_rejects_unknown_level() {
        let gateway = MockGateway::new(r#"{"severity": "catastrophic", "reason": "bad"}"#);
        let err = assess_severity(&gateway, "hypertension", "notes")
            .await
            .unwrap_err();
        assert_eq!(err.stage, Stage::AssessSeverity);
        assert_eq!(err.input, "hypertension");
        assert!(matches!(err.source, StageFailure::Schema(_)));
    }

    #[tokio::test]
    async fn assess_severity_accepts_each_level() {
        for level in ["low", "medium", "high"] {
            let gateway =
                MockGateway::new(&format!(r#"{{"severity": "{level}", "reason": "r"}}"#));
            let assessment = assess_severity(&gateway, "c", "n").await.unwrap();
            assert_eq!(assessment.severity.to_string(), level);
        }
    }
}
