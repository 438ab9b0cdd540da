use serde_json::Value;
use thiserror::Error;

/// Declarative shape of a stage's JSON output.
///
/// Validation is structural only: field presence, field type, numeric range,
/// enum membership. Business meaning is left to the caller.
#[derive(Debug, Clone)]
pub struct Shape {
    pub name: &'static str,
    pub fields: Vec<FieldSpec>,
}

/// A required field within a [`Shape`].
#[derive(Debug, Clone)]
pub struct FieldSpec {
    pub name: &'static str,
    pub kind: FieldKind,
}

/// The accepted type of a field.
#[derive(Debug, Clone)]
pub enum FieldKind {
    String,
    Number { min: Option<f64>, max: Option<f64> },
    Enum(&'static [&'static str]),
    Array(Shape),
}

impl FieldSpec {
    pub fn string(name: &'static str) -> Self {
        Self {
            name,
            kind: FieldKind::String,
        }
    }

    pub fn number(name: &'static str, min: Option<f64>, max: Option<f64>) -> Self {
        Self {
            name,
            kind: FieldKind::Number { min, max },
        }
    }

    pub fn enumeration(name: &'static str, allowed: &'static [&'static str]) -> Self {
        Self {
            name,
            kind: FieldKind::Enum(allowed),
        }
    }

    pub fn array(name: &'static str, element: Shape) -> Self {
        Self {
            name,
            kind: FieldKind::Array(element),
        }
    }
}

/// Parsed JSON that does not conform to the declared shape.
///
/// Collects every non-conforming field so a single error names them all.
#[derive(Debug, Clone, Error)]
#[error("response does not match the '{shape}' shape: {}", .problems.join("; "))]
pub struct SchemaViolation {
    pub shape: String,
    pub problems: Vec<String>,
}

impl Shape {
    pub fn new(name: &'static str, fields: Vec<FieldSpec>) -> Self {
        Self { name, fields }
    }

    /// Check `value` against this shape. All declared fields are required;
    /// unknown extra fields are tolerated.
    pub fn validate(&self, value: &Value) -> Result<(), SchemaViolation> {
        let mut problems = Vec::new();

        match value.as_object() {
            Some(_) => self.collect_problems(value, "", &mut problems),
            None => problems.push(format!("expected a JSON object, got {}", type_name(value))),
        }

        if problems.is_empty() {
            Ok(())
        } else {
            Err(SchemaViolation {
                shape: self.name.to_string(),
                problems,
            })
        }
    }

    fn collect_problems(&self, object: &Value, prefix: &str, problems: &mut Vec<String>) {
        for field in &self.fields {
            let path = if prefix.is_empty() {
                field.name.to_string()
            } else {
                format!("{prefix}.{}", field.name)
            };

            match object.get(field.name) {
                None => problems.push(format!("{path}: missing required field")),
                Some(v) => check_kind(&path, v, &field.kind, problems),
            }
        }
    }
}

fn check_kind(path: &str, value: &Value, kind: &FieldKind, problems: &mut Vec<String>) {
    match kind {
        FieldKind::String => {
            if !value.is_string() {
                problems.push(format!("{path}: expected string, got {}", type_name(value)));
            }
        }
        FieldKind::Number { min, max } => match value.as_f64() {
            None => problems.push(format!("{path}: expected number, got {}", type_name(value))),
            Some(n) => {
                if let Some(lo) = min {
                    if n < *lo {
                        problems.push(format!("{path}: {n} below minimum {lo}"));
                    }
                }
                if let Some(hi) = max {
                    if n > *hi {
                        problems.push(format!("{path}: {n} above maximum {hi}"));
                    }
                }
            }
        },
        FieldKind::Enum(allowed) => match value.as_str() {
            None => problems.push(format!("{path}: expected string, got {}", type_name(value))),
            Some(s) => {
                if !allowed.contains(&s) {
                    problems.push(format!(
                        "{path}: '{s}' is not one of [{}]",
                        allowed.join(", ")
                    ));
                }
            }
        },
        FieldKind::Array(element) => match value.as_array() {
            None => problems.push(format!("{path}: expected array, got {}", type_name(value))),
            Some(items) => {
                for (i, item) in items.iter().enumerate() {
                    let item_path = format!("{path}[{i}]");
                    if item.is_object() {
                        element.collect_problems(item, &item_path, problems);
                    } else {
                        problems.push(format!(
                            "{item_path}: expected object, got {}",
                            type_name(item)
                        ));
                    }
                }
            }
        },
    }
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
