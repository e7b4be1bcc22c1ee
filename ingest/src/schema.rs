//! JSON-schema gate for untrusted inbound payloads.
//!
//! The schema is compiled exactly once, at startup, and held in read-only
//! state for the process lifetime. Re-reading or re-compiling it per message
//! is a defect this module exists to prevent.
//!
//! A rejection is a verdict, not a fault: the caller logs it and drops the
//! message, and the process keeps running.

use jsonschema::Validator;
use serde_json::Value;
use std::path::Path;
use thiserror::Error;

/// The order document schema compiled into the binary.
///
/// Operators can override it per deployment via
/// [`SchemaValidator::from_file`].
const EMBEDDED_SCHEMA: &str = include_str!("../schema/order.schema.json");

/// Errors raised while loading or compiling a schema at startup.
///
/// These are fatal to the caller: a process that cannot build its validator
/// must not consume messages.
#[derive(Error, Debug)]
pub enum SchemaError {
    /// The schema document could not be read from disk.
    #[error("Failed to read schema file: {0}")]
    Io(#[from] std::io::Error),

    /// The schema document was not valid JSON.
    #[error("Schema document is not valid JSON: {0}")]
    Parse(String),

    /// The schema document did not compile as Draft 2020-12.
    #[error("Schema compilation failed: {0}")]
    Compile(String),
}

/// Verdict for a payload that failed validation.
///
/// Carries a human-readable reason assembled from every instance-path error,
/// suitable for the rejection log line.
#[derive(Error, Debug)]
#[error("{reason}")]
pub struct ValidationFailure {
    /// Why the payload was rejected.
    pub reason: String,
}

/// Validates raw message payloads against the order document schema.
///
/// # Example
///
/// ```
/// use orderhub_ingest::SchemaValidator;
///
/// # fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let validator = SchemaValidator::embedded()?;
///
/// assert!(validator.validate(b"{}").is_err());
/// # Ok(())
/// # }
/// ```
pub struct SchemaValidator {
    validator: Validator,
}

impl SchemaValidator {
    /// Compile a validator from a schema document.
    ///
    /// # Errors
    ///
    /// Returns [`SchemaError::Compile`] if the document is not a valid
    /// Draft 2020-12 schema.
    pub fn new(schema: &Value) -> Result<Self, SchemaError> {
        let validator = jsonschema::draft202012::new(schema)
            .map_err(|e| SchemaError::Compile(e.to_string()))?;
        Ok(Self { validator })
    }

    /// Compile the schema document shipped inside the binary.
    ///
    /// # Errors
    ///
    /// Returns a [`SchemaError`] if the embedded document fails to parse or
    /// compile, which indicates a broken build rather than bad input.
    pub fn embedded() -> Result<Self, SchemaError> {
        let schema: Value = serde_json::from_str(EMBEDDED_SCHEMA)
            .map_err(|e| SchemaError::Parse(e.to_string()))?;
        Self::new(&schema)
    }

    /// Compile a schema document from disk (operator override).
    ///
    /// # Errors
    ///
    /// Returns a [`SchemaError`] if the file cannot be read, parsed, or
    /// compiled.
    pub fn from_file(path: &Path) -> Result<Self, SchemaError> {
        let contents = std::fs::read_to_string(path)?;
        let schema: Value =
            serde_json::from_str(&contents).map_err(|e| SchemaError::Parse(e.to_string()))?;
        Self::new(&schema)
    }

    /// Validate a raw payload against the schema.
    ///
    /// A payload that is not valid JSON at all fails here too: the gate's
    /// job is to hand the pipeline nothing it cannot trust structurally.
    ///
    /// # Errors
    ///
    /// Returns a [`ValidationFailure`] naming every violating instance path.
    pub fn validate(&self, raw: &[u8]) -> Result<(), ValidationFailure> {
        let instance: Value = serde_json::from_slice(raw).map_err(|e| ValidationFailure {
            reason: format!("payload is not valid JSON: {e}"),
        })?;

        let errors: Vec<String> = self
            .validator
            .iter_errors(&instance)
            .map(|e| format!("{}: {e}", e.instance_path()))
            .collect();

        if errors.is_empty() {
            Ok(())
        } else {
            Err(ValidationFailure {
                reason: errors.join("; "),
            })
        }
    }
}
