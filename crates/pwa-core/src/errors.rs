//! Structured error types shared across PWA crates.

use std::collections::BTreeMap;
use std::fmt::{self, Display};

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Structured payload attached to every [`PwaError`] variant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorInfo {
    /// Stable machine readable error code.
    pub code: String,
    /// Human readable diagnostic message.
    pub message: String,
    /// Contextual key value pairs (identifiers, spins, sizes, etc.).
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

/// Canonical error type for the PWA engine.
///
/// `Construction` errors are raised while a decay tree is being built and
/// abort only the node being built. `Protocol` errors signal a defect in the
/// way the engine is driven (freezing twice, querying an unregistered
/// combination, allocating storage before freezing) and are never retried.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Error)]
#[serde(tag = "family", content = "detail")]
pub enum PwaError {
    /// Combination registry errors.
    #[error("combination error: {0}")]
    Combination(ErrorInfo),
    /// Decay-tree construction and validation errors.
    #[error("construction error: {0}")]
    Construction(ErrorInfo),
    /// Indexing and evaluation protocol violations.
    #[error("protocol error: {0}")]
    Protocol(ErrorInfo),
    /// Dataset and partitioning errors.
    #[error("data error: {0}")]
    Data(ErrorInfo),
    /// Fit parameter errors.
    #[error("parameter error: {0}")]
    Parameter(ErrorInfo),
    /// Configuration and serialization errors.
    #[error("config error: {0}")]
    Config(ErrorInfo),
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

impl PwaError {
    /// Returns a reference to the payload describing the error.
    pub fn info(&self) -> &ErrorInfo {
        match self {
            PwaError::Combination(info)
            | PwaError::Construction(info)
            | PwaError::Protocol(info)
            | PwaError::Data(info)
            | PwaError::Parameter(info)
            | PwaError::Config(info) => info,
        }
    }

    /// Returns the stable machine readable code of the error.
    pub fn code(&self) -> &str {
        &self.info().code
    }

    /// Adds a context entry to the payload, keeping the error family.
    pub fn with_context(self, key: impl Into<String>, value: impl ToString) -> Self {
        match self {
            PwaError::Combination(info) => PwaError::Combination(info.with_context(key, value)),
            PwaError::Construction(info) => PwaError::Construction(info.with_context(key, value)),
            PwaError::Protocol(info) => PwaError::Protocol(info.with_context(key, value)),
            PwaError::Data(info) => PwaError::Data(info.with_context(key, value)),
            PwaError::Parameter(info) => PwaError::Parameter(info.with_context(key, value)),
            PwaError::Config(info) => PwaError::Config(info.with_context(key, value)),
        }
    }
}

/// Shorthand for a construction-family error.
pub fn construction_error(code: impl Into<String>, message: impl Into<String>) -> PwaError {
    PwaError::Construction(ErrorInfo::new(code, message))
}

/// Shorthand for a protocol-family error.
pub fn protocol_error(code: impl Into<String>, message: impl Into<String>) -> PwaError {
    PwaError::Protocol(ErrorInfo::new(code, message))
}

/// Shorthand for a data-family error.
pub fn data_error(code: impl Into<String>, message: impl Into<String>) -> PwaError {
    PwaError::Data(ErrorInfo::new(code, message))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_includes_context_and_hint() {
        let err = PwaError::Protocol(
            ErrorInfo::new("already-frozen", "accessor index is frozen")
                .with_context("accessors", 4)
                .with_hint("freeze exactly once"),
        );
        let text = err.to_string();
        assert!(text.starts_with("protocol error: accessor index is frozen"));
        assert!(text.contains("accessors=4"));
        assert!(text.contains("hint: freeze exactly once"));
    }

    #[test]
    fn with_context_keeps_family() {
        let err = construction_error("spin-not-conserved", "triangle violated")
            .with_context("two_j", 2);
        assert!(matches!(err, PwaError::Construction(_)));
        assert_eq!(err.code(), "spin-not-conserved");
        assert_eq!(err.info().context.get("two_j"), Some(&"2".to_string()));
    }
}
