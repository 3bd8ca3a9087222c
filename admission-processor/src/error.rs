use serde::{Serialize, Serializer};
use thiserror::Error;

/// Classification of a per-transaction rejection.
///
/// The closed set below covers every stage of the processor; anything else a
/// pool implementation reports is carried verbatim through `Pool`.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    Duplicate,
    Unknown,
    LowFee,
    Apply,
    Forged,
    PoolFull,
    /// Any other `ERR_POOL_*` code surfaced by the mempool.
    Pool(String),
}

impl ErrorKind {
    pub fn code(&self) -> &str {
        match self {
            ErrorKind::Duplicate => "ERR_DUPLICATE",
            ErrorKind::Unknown => "ERR_UNKNOWN",
            ErrorKind::LowFee => "ERR_LOW_FEE",
            ErrorKind::Apply => "ERR_APPLY",
            ErrorKind::Forged => "ERR_FORGED",
            ErrorKind::PoolFull => "ERR_POOL_FULL",
            ErrorKind::Pool(code) => code,
        }
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.code())
    }
}

impl Serialize for ErrorKind {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.code())
    }
}

/// A per-transaction rejection record. Errors are data here, not control
/// flow: every failure lands in a ticket bucket and processing continues.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct TxError {
    pub kind: ErrorKind,
    pub message: String,
}

impl TxError {
    pub fn new<S: Into<String>>(kind: ErrorKind, message: S) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }
}

/// Failures of the processor surface itself, as opposed to per-transaction
/// outcomes. These only occur when the actor system is unhealthy.
#[derive(Clone, Debug, Error)]
pub enum ProcessorError {
    #[error("Actor communication failed: {details}")]
    ActorError { details: String },
}

impl ProcessorError {
    pub fn actor<S: Into<String>>(details: S) -> Self {
        Self::ActorError {
            details: details.into(),
        }
    }
}

impl<T> From<ractor::MessagingErr<T>> for ProcessorError {
    fn from(err: ractor::MessagingErr<T>) -> Self {
        ProcessorError::ActorError {
            details: err.to_string(),
        }
    }
}
