//! Errors from compiling a document or looking up a `pdpId`.

use thiserror::Error;

/// The external compiler (spec §6.1) rejected a document.
#[derive(Debug, Error)]
#[error("failed to compile document '{document}': {message}")]
pub struct CompileError {
    /// The document's name, for diagnostics.
    pub document: String,
    /// Why the compiler rejected it.
    pub message: String,
}

impl CompileError {
    /// Construct a `CompileError` for `document`.
    #[must_use]
    pub fn new(document: impl Into<String>, message: impl Into<String>) -> Self {
        Self { document: document.into(), message: message.into() }
    }
}

/// Why `decide` could not start a subscription.
#[derive(Debug, Error)]
pub enum DecisionError {
    /// No configuration has ever been loaded for this `pdpId`.
    #[error("no configuration loaded for pdpId '{0}'")]
    UnknownPdp(String),
}
