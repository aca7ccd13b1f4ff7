//! Structural validation against a JSON Schema.

use jsonschema::error::ValidationErrorKind;
use jsonschema::JSONSchema;
use serde_json::Value;

/// What is wrong with a field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldErrorKind {
    Missing,
    WrongType,
    OutOfRange,
    Unexpected,
    Invalid,
}

/// A problem at a JSON pointer path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldError {
    pub path: String,
    pub kind: FieldErrorKind,
    pub message: String,
}

impl FieldError {
    pub fn new(path: impl Into<String>, kind: FieldErrorKind, message: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            kind,
            message: message.into(),
        }
    }

    pub fn missing(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(path, FieldErrorKind::Missing, message)
    }

    pub fn unexpected(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(path, FieldErrorKind::Unexpected, message)
    }

    pub fn out_of_range(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(path, FieldErrorKind::OutOfRange, message)
    }

    pub fn invalid(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(path, FieldErrorKind::Invalid, message)
    }
}

impl std::fmt::Display for FieldError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let path = if self.path.is_empty() { "/" } else { &self.path };
        write!(f, "{}: {}", path, self.message)
    }
}

/// Validation result with details.
#[derive(Debug, Clone)]
pub struct ValidationResult {
    pub valid: bool,
    pub errors: Vec<FieldError>,
    pub warnings: Vec<String>,
}

impl Default for ValidationResult {
    fn default() -> Self {
        Self::new()
    }
}

impl ValidationResult {
    pub fn new() -> Self {
        Self {
            valid: true,
            errors: Vec::new(),
            warnings: Vec::new(),
        }
    }

    pub fn add_error(&mut self, error: FieldError) {
        self.valid = false;
        self.errors.push(error);
    }

    pub fn add_warning(&mut self, message: impl Into<String>) {
        self.warnings.push(message.into());
    }

    pub fn merge(&mut self, other: ValidationResult) {
        if !other.valid {
            self.valid = false;
        }
        self.errors.extend(other.errors);
        self.warnings.extend(other.warnings);
    }

    /// Paths of fields reported missing.
    pub fn missing_fields(&self) -> Vec<&str> {
        self.errors
            .iter()
            .filter(|e| e.kind == FieldErrorKind::Missing)
            .map(|e| e.path.as_str())
            .collect()
    }

    pub fn summary(&self) -> String {
        self.errors
            .iter()
            .map(|e| e.to_string())
            .collect::<Vec<_>>()
            .join("; ")
    }
}

/// Validator for decoded JSON values.
pub struct SchemaValidator;

impl SchemaValidator {
    /// Validate `value` against a JSON Schema document.
    pub fn validate(value: &Value, schema: &Value) -> ValidationResult {
        let mut result = ValidationResult::new();

        let compiled = match JSONSchema::compile(schema) {
            Ok(compiled) => compiled,
            Err(e) => {
                result.add_error(FieldError::invalid("", format!("schema did not compile: {}", e)));
                return result;
            }
        };

        if let Err(errors) = compiled.validate(value) {
            for error in errors {
                let mut path = error.instance_path.to_string();
                let kind = match &error.kind {
                    ValidationErrorKind::Required { property } => {
                        let name = property.as_str().map(str::to_string).unwrap_or_else(|| property.to_string());
                        path = format!("{}/{}", path, name);
                        FieldErrorKind::Missing
                    }
                    ValidationErrorKind::Type { .. } => FieldErrorKind::WrongType,
                    ValidationErrorKind::Minimum { .. }
                    | ValidationErrorKind::Maximum { .. }
                    | ValidationErrorKind::ExclusiveMinimum { .. }
                    | ValidationErrorKind::ExclusiveMaximum { .. } => FieldErrorKind::OutOfRange,
                    ValidationErrorKind::AdditionalProperties { .. } => FieldErrorKind::Unexpected,
                    _ => FieldErrorKind::Invalid,
                };
                result.add_error(FieldError::new(path, kind, error.to_string()));
            }
        }

        result
    }

    /// Top-level keys a schema marks as required.
    pub fn required_keys(schema: &Value) -> Vec<String> {
        schema
            .get("required")
            .and_then(Value::as_array)
            .map(|keys| keys.iter().filter_map(|k| k.as_str().map(str::to_string)).collect())
            .unwrap_or_default()
    }
}
