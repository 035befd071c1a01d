use crate::error::app_error::AppError;
use regex::Regex;
use serde::ser::{Serialize, SerializeStruct, Serializer};
use std::sync::LazyLock;
use validator::{Validate, ValidationErrors, ValidationErrorsKind};

static ANGLE_BRACKETS: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[<>]").expect("valid angle bracket pattern"));
static JAVASCRIPT_SCHEME: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?i)javascript:").expect("valid scheme pattern"));
static EVENT_HANDLER: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?i)on\w+\s*=").expect("valid handler pattern"));

/// Result of checking a payload against its schema.
#[derive(Debug)]
pub enum ValidationOutcome<T> {
    Valid(T),
    Invalid(Vec<String>),
}

impl<T> ValidationOutcome<T> {
    pub fn is_valid(&self) -> bool {
        matches!(self, ValidationOutcome::Valid(_))
    }

    pub fn into_result(self) -> Result<T, AppError> {
        match self {
            ValidationOutcome::Valid(data) => Ok(data),
            ValidationOutcome::Invalid(errors) => Err(AppError::Validation(errors)),
        }
    }
}

impl<T: Serialize> Serialize for ValidationOutcome<T> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut state = serializer.serialize_struct("ValidationOutcome", 2)?;
        match self {
            ValidationOutcome::Valid(data) => {
                state.serialize_field("success", &true)?;
                state.serialize_field("data", data)?;
            }
            ValidationOutcome::Invalid(errors) => {
                state.serialize_field("success", &false)?;
                state.serialize_field("errors", errors)?;
            }
        }
        state.end()
    }
}

/// Checks every constraint on `payload` and reports all violations at once.
pub fn validate_input<T: Validate>(payload: T) -> ValidationOutcome<T> {
    match payload.validate() {
        Ok(()) => ValidationOutcome::Valid(payload),
        Err(errors) => ValidationOutcome::Invalid(collect_messages(&errors)),
    }
}

/// Flattens nested validator errors into `field: message` lines, sorted.
pub fn collect_messages(errors: &ValidationErrors) -> Vec<String> {
    let mut messages = Vec::new();
    collect_into(errors, None, &mut messages);
    messages.sort();
    messages.dedup();
    messages
}

fn collect_into(errors: &ValidationErrors, prefix: Option<&str>, out: &mut Vec<String>) {
    for (field, kind) in errors.errors() {
        let path = match (prefix, field.as_ref()) {
            (Some(prefix), "__all__") => prefix.to_string(),
            (None, "__all__") => String::new(),
            (Some(prefix), field) => format!("{}.{}", prefix, field),
            (None, field) => field.to_string(),
        };

        match kind {
            ValidationErrorsKind::Field(field_errors) => {
                for error in field_errors {
                    let message = error
                        .message
                        .as_ref()
                        .map(|m| m.to_string())
                        .unwrap_or_else(|| format!("failed {} check", error.code));
                    if path.is_empty() {
                        out.push(message);
                    } else {
                        out.push(format!("{}: {}", path, message));
                    }
                }
            }
            ValidationErrorsKind::Struct(nested) => collect_into(nested, Some(&path), out),
            ValidationErrorsKind::List(items) => {
                for (index, nested) in items {
                    collect_into(nested, Some(&format!("{}[{}]", path, index)), out);
                }
            }
        }
    }
}

/// Strips markup and script vectors from free text until nothing more matches.
///
/// Removal can splice a new match together (`javasjavascript:cript:`), so the
/// patterns are applied until the text stops changing.
pub fn sanitize_input(text: &str) -> String {
    let mut current = text.trim().to_string();
    loop {
        let stripped = ANGLE_BRACKETS.replace_all(&current, "");
        let stripped = JAVASCRIPT_SCHEME.replace_all(&stripped, "");
        let stripped = EVENT_HANDLER.replace_all(&stripped, "").into_owned();
        if stripped == current {
            break;
        }
        current = stripped;
    }
    current.trim().to_string()
}

pub fn sanitize_optional(text: Option<&str>) -> Option<String> {
    text.map(sanitize_input).filter(|s| !s.is_empty())
}
