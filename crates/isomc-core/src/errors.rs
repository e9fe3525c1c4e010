//! Structured error types shared across isomc crates.

use std::collections::BTreeMap;
use std::fmt::{self, Display};

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Structured payload attached to every [`IsoError`] variant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorInfo {
    /// Stable machine readable error code.
    pub code: String,
    /// Human readable diagnostic message.
    pub message: String,
    /// Contextual key value pairs (block ids, counts, indices).
    #[serde(default)]
    pub context: BTreeMap<String, String>,
    /// Optional hint that may help the caller resolve the issue.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hint: Option<String>,
}

impl ErrorInfo {
    /// Creates a new error payload with the provided code and message.
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
            context: BTreeMap::new(),
            hint: None,
        }
    }

    /// Adds a context entry to the payload.
    pub fn with_context(mut self, key: impl Into<String>, value: impl ToString) -> Self {
        self.context.insert(key.into(), value.to_string());
        self
    }

    /// Sets a human readable hint for remediation.
    pub fn with_hint(mut self, hint: impl Into<String>) -> Self {
        self.hint = Some(hint.into());
        self
    }
}

/// Canonical error type for the isomc engine.
///
/// Every error is scoped to the block that raised it; callers running several
/// blocks keep the failures separate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Error)]
#[serde(tag = "family", content = "detail")]
pub enum IsoError {
    /// Singular normal-equations matrix or other unrecoverable numeric failure.
    #[error("numerical error: {0}")]
    Numerical(ErrorInfo),
    /// Accumulator counts inconsistent with the declared detector/isotope counts.
    #[error("data shape error: {0}")]
    DataShape(ErrorInfo),
    /// Statistics requested on an empty post burn-in ensemble.
    #[error("insufficient ensemble: {0}")]
    InsufficientEnsemble(ErrorInfo),
    /// Analysis-method inputs (species, ratios, detectors) are inconsistent.
    #[error("method error: {0}")]
    Method(ErrorInfo),
    /// Ensemble store misuse or access before the sampler completed.
    #[error("ensemble error: {0}")]
    Ensemble(ErrorInfo),
    /// Configuration parsing and validation errors.
    #[error("config error: {0}")]
    Config(ErrorInfo),
    /// Serialization and I/O errors.
    #[error("serde error: {0}")]
    Serde(ErrorInfo),
}

impl Display for ErrorInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (code: {})", self.message, self.code)?;
        if !self.context.is_empty() {
            write!(f, " | context: [")?;
            for (idx, (key, value)) in self.context.iter().enumerate() {
                if idx > 0 {
                    write!(f, ", ")?;
                }
                write!(f, "{key}={value}")?;
            }
            write!(f, "]")?;
        }
        if let Some(hint) = &self.hint {
            write!(f, " | hint: {hint}")?;
        }
        Ok(())
    }
}

impl IsoError {
    /// Returns a reference to the payload describing the error.
    pub fn info(&self) -> &ErrorInfo {
        match self {
            IsoError::Numerical(info)
            | IsoError::DataShape(info)
            | IsoError::InsufficientEnsemble(info)
            | IsoError::Method(info)
            | IsoError::Ensemble(info)
            | IsoError::Config(info)
            | IsoError::Serde(info) => info,
        }
    }

    /// Shorthand for a [`IsoError::DataShape`] error.
    pub fn data_shape(code: &str, message: impl Into<String>) -> Self {
        IsoError::DataShape(ErrorInfo::new(code, message))
    }

    /// Shorthand for a [`IsoError::Method`] error.
    pub fn method(code: &str, message: impl Into<String>) -> Self {
        IsoError::Method(ErrorInfo::new(code, message))
    }
}
