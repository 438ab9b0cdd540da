//! Instruction text for each pipeline stage.
//!
//! Builders are pure: the same input always produces the same prompt, so
//! prompt content is testable without a model call.

pub const TRANSCRIBE_SYSTEM_PROMPT: &str =
    "You are a medical scribe who rewrites doctor's notes into clear, readable prose. \
     Always respond with valid JSON.";

pub const CONDITION_MAPPING_SYSTEM_PROMPT: &str =
    "You are an expert medical coder who maps medical conditions to ICD codes. \
     Always respond with valid JSON.";

pub const PROCEDURE_MAPPING_SYSTEM_PROMPT: &str =
    "You are an expert medical coder who maps medical procedures to ICD codes. \
     Always respond with valid JSON.";

pub const SEVERITY_SYSTEM_PROMPT: &str =
    "You are an expert medical professional who assesses the severity of medical conditions. \
     Always respond with valid JSON.";

/// Stage 1: rewrite raw notes into jargon-free prose.
pub fn build_transcribe_prompt(notes: &str) -> String {
    format!(
        r#"Transcribe the following doctor's notes into a clear, readable format, removing acronyms and jargon.

Notes: {notes}

Format your response as a JSON object with a single key "transcription" containing the transcribed notes."#
    )
}

/// Stage 2: identify conditions and map each to an ICD code.
pub fn build_condition_mapping_prompt(transcribed_notes: &str) -> String {
    format!(
        r#"Given the following transcribed doctor's notes:

Transcribed Notes: {transcribed_notes}

Identify the medical conditions mentioned. For each condition:
1. Map it to the most relevant ICD (International Classification of Diseases) code.
2. Classify the condition (e.g., 'Primary Diagnosis', 'Secondary Diagnosis', 'Comorbidity', 'Symptom') using clinical judgment.
3. Include a confidence score (0-1) for the mapping.
4. Provide a 'sourceText' field containing a brief, relevant verbatim snippet from the original notes that supports the identified condition (max 100 characters).
5. Provide a 'justification' field (max 150 characters) explaining why this ICD code was chosen.

Prioritize mentions that are likely to be relevant for billing and clinical documentation.
Where possible, prioritize ICD codes relevant to the Singaporean healthcare market if there are regional variations.

Format your response as a JSON object with a key "conditionCodeMappings" containing an array of objects. Each object must include 'condition', 'icdCode', 'conditionCategory', 'confidence', 'sourceText', and 'justification'.
If no conditions are identified, return an empty array for "conditionCodeMappings"."#
    )
}

/// Stage 3: identify procedures and map each to an ICD code.
pub fn build_procedure_mapping_prompt(transcribed_notes: &str) -> String {
    format!(
        r#"Given the following transcribed doctor's notes, identify any medical procedures requested or mentioned and map them to the most relevant ICD (International Classification of Diseases) codes.

Transcribed Notes: {transcribed_notes}

Where possible, prioritize ICD codes relevant to the Singaporean healthcare market.
Prioritize mentions that are likely to be relevant for billing purposes. Include a confidence score (0-1) for each mapping.
For each mapping, also include a 'sourceText' field containing a brief, relevant verbatim snippet from the original notes that supports the identified procedure (max 100 characters), and a 'justification' field (max 150 characters) explaining why the specific ICD code was chosen.

Format your response as a JSON object with a key "procedureCodeMappings" containing an array of objects, where each object has "procedure", "icdCode", "confidence", "sourceText", and "justification" fields.
If no procedures are identified, return an empty array for "procedureCodeMappings"."#
    )
}

/// Stage 4: assess the severity of one condition against the notes.
pub fn build_severity_prompt(condition: &str, notes: &str) -> String {
    format!(
        r#"Assess the severity of a medical condition based on doctor's notes.

Condition: {condition}
Notes: {notes}

Assess the severity of the condition as either "low", "medium", or "high" and provide a brief reason for your assessment.
Format your response as a JSON object with keys "severity" and "reason"."#
    )
}
