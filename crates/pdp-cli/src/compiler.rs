//! A minimal stand-in [`DocumentCompiler`] so the CLI has something to run
//! against without a SAPL grammar in this workspace (spec §6.1 treats
//! document compilation as an external collaborator). A document is exactly
//! one non-blank line, `permit` or `deny`, applicable unconditionally.

use pdp_decision::{CompileError, DocumentCompiler};
use pdp_expr::Expr;
use pdp_policy::{Effect, Policy, Voter};

/// Compiles `permit`/`deny` one-liners into unconditional policies.
#[derive(Debug, Default)]
pub struct MinimalDocumentCompiler;

impl DocumentCompiler for MinimalDocumentCompiler {
    fn compile(&self, document: &str, text: &str) -> Result<Voter, CompileError> {
        let effect = match text.trim().to_ascii_lowercase().as_str() {
            "permit" => Effect::Permit,
            "deny" => Effect::Deny,
            other => {
                return Err(CompileError::new(document, format!("expected 'permit' or 'deny', got '{other}'")))
            }
        };
        Ok(Voter::Policy(Policy {
            name: document.to_string(),
            effect,
            target: Expr::Literal(pdp_core::Value::boolean(true)),
            body: Vec::new(),
            obligations: Vec::new(),
            advice: Vec::new(),
            transform: None,
        }))
    }
}
