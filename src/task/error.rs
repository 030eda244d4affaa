/// Violations of the task encoding. They are detected while the task is
/// being populated or precomputed and are never recovered from.
#[derive(Debug, thiserror::Error)]
pub enum ModelError {
    #[error("value {value} is not in the domain of variable {variable}")]
    InvalidInitialValue { variable: String, value: String },
    #[error("cannot negate initial value of non-binary variable {0}")]
    NegatedNonBinary(String),
    #[error("variable {0} has no initial value at time 0")]
    MissingInitialValue(String),
    #[error("contradictory initial value {value} at time {time} for numeric variable {variable}")]
    ContradictoryNumericValue { variable: String, value: f64, time: f64 },
    #[error("action {action}: {reason}")]
    UnsupportedDuration { action: String, reason: &'static str },
    #[error("unsupported numeric expression: {0}")]
    UnsupportedExpression(String),
    #[error("{kind} index {index} out of range")]
    IndexOutOfRange { kind: &'static str, index: usize },
    #[error("unknown {kind} '{name}'")]
    UnknownName { kind: &'static str, name: String },
    #[error("task exceeds the 16-bit encoding limit: {0}")]
    EncodingLimit(String),
}

pub type Result<T> = std::result::Result<T, ModelError>;
