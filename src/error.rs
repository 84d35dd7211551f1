//! Error types for the host-side configuration surface
//!
//! The protocol engine itself never fails; these errors only come out of
//! protocol files and named parameter assignments.

use thiserror::Error;

use crate::generator::params::ParameterId;
use crate::generator::variant::Variant;

#[derive(Debug, Error)]
pub enum ConfigError {
    /// Reading a protocol or writing a trace failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Protocol file is not valid JSON or does not match the expected layout.
    #[error("Invalid protocol file: {0}")]
    Json(#[from] serde_json::Error),

    /// No parameter with this name exists.
    #[error("Unknown parameter: {0}")]
    UnknownParameter(String),

    /// The parameter exists but the variant's phase shape has no use for it.
    #[error("Parameter {parameter:?} does not apply to {variant:?}")]
    NotApplicable {
        parameter: ParameterId,
        variant: Variant,
    },

    /// A `name=value` assignment could not be split or parsed.
    #[error("Invalid assignment: {0}")]
    InvalidAssignment(String),

    /// No variant with this name exists.
    #[error("Unknown variant: {0}")]
    UnknownVariant(String),
}
