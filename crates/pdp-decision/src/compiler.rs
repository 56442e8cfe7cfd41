//! The external compiler collaborator (spec §6.1): `compileDocument(text) ->
//! CompiledDocument`. The decision core consumes only this interface; no SAPL
//! parser lives in this workspace.

use pdp_policy::Voter;

use crate::error::CompileError;

/// Compiles a single SAPL document's source text into a [`Voter`] (a
/// `PolicyVoter` or `PolicySetVoter`).
pub trait DocumentCompiler: Send + Sync {
    /// Compile `text`, named `document` for diagnostics.
    ///
    /// # Errors
    ///
    /// Returns [`CompileError`] if `text` is not a well-formed document.
    fn compile(&self, document: &str, text: &str) -> Result<Voter, CompileError>;
}
