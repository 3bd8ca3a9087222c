use thiserror::Error;

/// Application-level failures raised by the in-memory collaborators.
#[derive(Clone, Debug, Error, PartialEq)]
pub enum AppError {
    #[error("Transaction cannot be applied: {reason}")]
    CannotApply { reason: String },

    #[error("Transaction deserialization failed: {details}")]
    DeserializationFailed { details: String },

    #[error("Unsupported transaction type: {type_id} in group {type_group}")]
    UnsupportedTransactionType { type_id: u32, type_group: u32 },

    #[error("Service unavailable: {details}")]
    Unavailable { details: String },
}

// Helper functions for creating common errors
impl AppError {
    pub fn cannot_apply<S: Into<String>>(reason: S) -> Self {
        Self::CannotApply {
            reason: reason.into(),
        }
    }

    pub fn deserialization_failed<S: Into<String>>(details: S) -> Self {
        Self::DeserializationFailed {
            details: details.into(),
        }
    }

    pub fn unsupported_type(type_id: u32, type_group: u32) -> Self {
        Self::UnsupportedTransactionType {
            type_id,
            type_group,
        }
    }

    pub fn unavailable<S: Into<String>>(details: S) -> Self {
        Self::Unavailable {
            details: details.into(),
        }
    }
}
