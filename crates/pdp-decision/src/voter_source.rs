//! [`PdpVoterSource`]: the process-wide `pdpId -> compiled voter tree` map
//! (spec §9, "the only process-wide mutable cell"). Implements
//! [`pdp_config::VoterSource`] to receive published configurations and
//! compiles their documents through a [`DocumentCompiler`].

use std::sync::Arc;

use dashmap::DashMap;
use indexmap::IndexMap;
use pdp_core::Value;
use pdp_config::{PdpConfiguration, VoterSource};
use pdp_policy::{CombiningAlgorithm, DefaultDecision, ErrorHandling, Voter};
use tokio::sync::watch;

use crate::compiler::DocumentCompiler;

/// A compiled configuration installed for one `pdpId`.
pub struct CompiledConfiguration {
    /// Top-level compiled voters, in declaration order.
    pub voters: Vec<Voter>,
    /// The top-level combining algorithm.
    pub algorithm: CombiningAlgorithm,
    /// The fallback decision when every voter abstains.
    pub default_decision: DefaultDecision,
    /// How an `Indeterminate` result is finalised.
    pub error_handling: ErrorHandling,
    /// A stable identifier for this configuration, if declared.
    pub configuration_id: Option<String>,
    /// Variables bound into every evaluation context built from this
    /// configuration.
    pub variables: IndexMap<String, Value>,
}

/// The `pdpId -> compiled voter tree` registry. A decision point reads
/// [`Self::current`] to evaluate subscriptions and subscribes to
/// [`Self::generation`] to learn when a `pdpId`'s voter tree changes.
pub struct PdpVoterSource<C> {
    compiler: C,
    entries: DashMap<String, Arc<CompiledConfiguration>>,
    generations: DashMap<String, watch::Sender<u64>>,
}

impl<C: DocumentCompiler> PdpVoterSource<C> {
    /// Construct an empty registry using `compiler` to compile documents.
    pub fn new(compiler: C) -> Self {
        Self { compiler, entries: DashMap::new(), generations: DashMap::new() }
    }

    /// The currently installed configuration for `pdp_id`, if any.
    #[must_use]
    pub fn current(&self, pdp_id: &str) -> Option<Arc<CompiledConfiguration>> {
        self.entries.get(pdp_id).map(|e| Arc::clone(&e))
    }

    /// A receiver that ticks every time `pdp_id`'s installed configuration
    /// changes (installed, reloaded, or removed).
    pub fn generation(&self, pdp_id: &str) -> watch::Receiver<u64> {
        self.generations.entry(pdp_id.to_string()).or_insert_with(|| watch::channel(0).0).subscribe()
    }

    fn bump_generation(&self, pdp_id: &str) {
        let sender = self.generations.entry(pdp_id.to_string()).or_insert_with(|| watch::channel(0).0);
        sender.send_modify(|g| *g = g.wrapping_add(1));
    }
}

impl<C: DocumentCompiler> VoterSource for PdpVoterSource<C> {
    fn load_configuration(&self, config: PdpConfiguration, _replace: bool) {
        let mut voters = Vec::with_capacity(config.sapl_documents.len());
        for document in &config.sapl_documents {
            match self.compiler.compile(&document.name, &document.text) {
                Ok(voter) => voters.push(voter),
                Err(err) => {
                    tracing::warn!(
                        pdp_id = %config.pdp_id,
                        document = %document.name,
                        %err,
                        "discarding configuration load, retaining last-good configuration"
                    );
                    return;
                }
            }
        }

        let compiled = CompiledConfiguration {
            voters,
            algorithm: config.algorithm,
            default_decision: config.default_decision,
            error_handling: config.error_handling,
            configuration_id: config.configuration_id,
            variables: config.variables,
        };
        self.entries.insert(config.pdp_id.clone(), Arc::new(compiled));
        self.bump_generation(&config.pdp_id);
    }

    fn remove_configuration_for_pdp(&self, pdp_id: &str) {
        self.entries.remove(pdp_id);
        self.bump_generation(pdp_id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::CompileError;
    use pdp_config::SaplDocument;
    use pdp_expr::Expr;
    use pdp_policy::{Effect, Policy};

    struct EchoCompiler;

    impl DocumentCompiler for EchoCompiler {
        fn compile(&self, document: &str, _text: &str) -> Result<Voter, CompileError> {
            Ok(Voter::Policy(Policy {
                name: document.to_string(),
                effect: Effect::Permit,
                target: Expr::Literal(Value::boolean(true)),
                body: Vec::new(),
                obligations: Vec::new(),
                advice: Vec::new(),
                transform: None,
            }))
        }
    }

    struct RejectingCompiler;

    impl DocumentCompiler for RejectingCompiler {
        fn compile(&self, document: &str, _text: &str) -> Result<Voter, CompileError> {
            Err(CompileError::new(document, "syntax error"))
        }
    }

    fn configuration(pdp_id: &str, documents: Vec<SaplDocument>) -> PdpConfiguration {
        PdpConfiguration::new(pdp_id, pdp_config::PdpJson::default(), documents)
    }

    #[test]
    fn installs_compiled_configuration_and_bumps_generation() {
        let source = PdpVoterSource::new(EchoCompiler);
        let mut rx = source.generation("default");
        source.load_configuration(configuration("default", vec![SaplDocument { name: "a.sapl".into(), text: String::new() }]), true);
        assert!(source.current("default").is_some());
        assert!(*rx.borrow_and_update() >= 1);
    }

    #[test]
    fn failed_compilation_retains_prior_configuration() {
        let source = PdpVoterSource::new(EchoCompiler);
        source.load_configuration(configuration("default", vec![SaplDocument { name: "a.sapl".into(), text: String::new() }]), true);
        let before = source.current("default").unwrap().voters.len();

        let rejecting = PdpVoterSource::new(RejectingCompiler);
        rejecting.entries.insert("default".to_string(), Arc::clone(&source.entries.get("default").unwrap()));
        rejecting.load_configuration(configuration("default", vec![SaplDocument { name: "b.sapl".into(), text: String::new() }]), true);
        assert_eq!(rejecting.current("default").unwrap().voters.len(), before);
    }

    #[test]
    fn removing_configuration_bumps_generation() {
        let source = PdpVoterSource::new(EchoCompiler);
        source.load_configuration(configuration("default", vec![SaplDocument { name: "a.sapl".into(), text: String::new() }]), true);
        let mut rx = source.generation("default");
        rx.borrow_and_update();
        source.remove_configuration_for_pdp("default");
        assert!(source.current("default").is_none());
        assert!(*rx.borrow_and_update() >= 1);
    }
}
