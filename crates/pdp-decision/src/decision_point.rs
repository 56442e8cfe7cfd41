//! [`DecisionPoint`]: ties a [`PdpVoterSource`] to [`VoteInterceptor`]s and
//! exposes `decide`, a reactive stream of [`AuthorizationDecision`]s (spec
//! §4.5, §5).

use std::sync::Arc;

use pdp_core::ErrorValue;
use pdp_expr::{AttributeBroker, EvaluationContext, FunctionBroker};
use pdp_policy::{combine, CombiningAlgorithm, Outcome, Vote, Voter, VoterDescriptor};
use tokio_stream::wrappers::ReceiverStream;

use crate::compiler::DocumentCompiler;
use crate::error::DecisionError;
use crate::interceptor::{InterceptorRegistry, VoteInterceptor};
use crate::subscription::{AuthorizationDecision, AuthorizationSubscription};
use crate::voter_source::PdpVoterSource;

/// The channel depth for a `decide` subscription's decision stream. A slow
/// consumer applies backpressure to re-evaluation rather than buffering
/// unboundedly.
const DECISION_CHANNEL_CAPACITY: usize = 16;

/// Evaluate every top-level voter under `pdp_id`'s combining algorithm,
/// producing the PDP-level vote (spec §4.3.2, §4.3.3, applied one level
/// above any policy set).
fn evaluate_pdp(voters: &[Voter], algorithm: CombiningAlgorithm, pdp_id: &str, ctx: &mut EvaluationContext<'_>) -> Vote {
    let descriptor = VoterDescriptor::pdp(pdp_id.to_string());
    let children: Vec<Vote> = voters.iter().map(|v| v.vote(ctx)).collect();
    let combined = combine(algorithm, &children);

    let mut errors = combined.errors;
    if errors.is_empty() && combined.outcome == Outcome::Indeterminate {
        errors.push(ErrorValue::new("indeterminate_combination", "combined result is indeterminate"));
    }

    Vote {
        decision: combined.outcome,
        outcome: combined.outcome,
        obligations: combined.obligations,
        advice: combined.advice,
        resource: combined.resource,
        voter: descriptor,
        errors,
        attribute_records: ctx.attribute_records().to_vec(),
        contributing_votes: children,
    }
}

/// The decision point: a voter-tree registry plus the interceptor hooks and
/// `decide` entry point built on top of it.
pub struct DecisionPoint<C> {
    voters: Arc<PdpVoterSource<C>>,
    interceptors: Arc<InterceptorRegistry>,
}

impl<C: DocumentCompiler + 'static> DecisionPoint<C> {
    /// Construct a decision point compiling documents with `compiler`.
    pub fn new(compiler: C) -> Self {
        Self { voters: Arc::new(PdpVoterSource::new(compiler)), interceptors: Arc::new(InterceptorRegistry::new()) }
    }

    /// The voter-tree registry, to hand to configuration sources as their
    /// [`pdp_config::VoterSource`] sink.
    #[must_use]
    pub fn voter_source(&self) -> Arc<PdpVoterSource<C>> {
        Arc::clone(&self.voters)
    }

    /// Register an interceptor.
    pub fn add_interceptor(&self, interceptor: Arc<dyn VoteInterceptor>) {
        self.interceptors.register(interceptor);
    }

    /// Start a reactive decision stream for `subscription` against `pdp_id`.
    ///
    /// Every update to `pdp_id`'s installed voter tree re-evaluates the
    /// subscription and emits a new [`AuthorizationDecision`]. When the
    /// configuration is removed, a final `Indeterminate` decision with
    /// reason `"configuration removed"` is emitted and the stream
    /// completes. Dropping the returned stream cancels re-evaluation and
    /// fires every interceptor's `on_unsubscribe` exactly once.
    ///
    /// # Errors
    ///
    /// Returns [`DecisionError::UnknownPdp`] if no configuration has ever
    /// been loaded for `pdp_id`.
    pub fn decide(
        &self,
        subscription: AuthorizationSubscription,
        pdp_id: &str,
        function_broker: Arc<dyn FunctionBroker>,
        attribute_broker: Arc<dyn AttributeBroker>,
    ) -> Result<ReceiverStream<AuthorizationDecision>, DecisionError> {
        if self.voters.current(pdp_id).is_none() {
            return Err(DecisionError::UnknownPdp(pdp_id.to_string()));
        }

        let subscription_id = pdp_core::ids::new_trace_id();
        self.interceptors.notify_subscribe(&subscription_id, &subscription);

        let (tx, rx) = tokio::sync::mpsc::channel(DECISION_CHANNEL_CAPACITY);
        let mut generation_rx = self.voters.generation(pdp_id);
        let voters = Arc::clone(&self.voters);
        let interceptors = Arc::clone(&self.interceptors);
        let pdp_id = pdp_id.to_string();

        tokio::spawn(async move {
            loop {
                let Some(compiled) = voters.current(&pdp_id) else {
                    let _ = tx.send(AuthorizationDecision::configuration_removed()).await;
                    break;
                };

                let mut ctx = EvaluationContext::new(
                    subscription.subject.clone(),
                    subscription.action.clone(),
                    subscription.resource.clone(),
                    subscription.environment.clone(),
                    function_broker.as_ref(),
                    attribute_broker.as_ref(),
                );
                ctx.configuration_id.clone_from(&compiled.configuration_id);
                for (name, value) in &compiled.variables {
                    ctx.variables.insert(name.clone(), value.clone());
                }

                let vote = evaluate_pdp(&compiled.voters, compiled.algorithm, &pdp_id, &mut ctx);
                let vote = pdp_policy::finalize(vote, compiled.default_decision, compiled.error_handling);
                let decision = AuthorizationDecision::from_vote(&vote);
                if tx.send(decision.clone()).await.is_err() {
                    break;
                }
                interceptors.notify_vote(&subscription_id, &decision);

                if generation_rx.changed().await.is_err() {
                    break;
                }
            }
            interceptors.notify_unsubscribe(&subscription_id);
        });

        Ok(ReceiverStream::new(rx))
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use pdp_config::{PdpConfiguration, PdpJson, SaplDocument, VoterSource};
    use pdp_core::Value;
    use pdp_expr::{Expr, NoAttributes, NoFunctions};
    use pdp_policy::Effect;
    use tokio_stream::StreamExt;

    use super::*;
    use crate::subscription::AuthorizationSubscription;

    /// Compiles every document to a single `permit`/`deny` policy whose
    /// effect can be flipped between reloads, to exercise hot reload without
    /// swapping the compiler instance installed in a [`DecisionPoint`].
    struct ScriptedCompiler {
        effect: Arc<Mutex<Effect>>,
    }

    impl ScriptedCompiler {
        fn new(effect: Arc<Mutex<Effect>>) -> Self {
            Self { effect }
        }
    }

    impl DocumentCompiler for ScriptedCompiler {
        fn compile(&self, document: &str, _text: &str) -> Result<Voter, crate::error::CompileError> {
            Ok(Voter::Policy(pdp_policy::Policy {
                name: document.to_string(),
                effect: *self.effect.lock().unwrap(),
                target: Expr::Literal(Value::boolean(true)),
                body: Vec::new(),
                obligations: Vec::new(),
                advice: Vec::new(),
                transform: None,
            }))
        }
    }

    fn subscription() -> AuthorizationSubscription {
        AuthorizationSubscription::new(
            Value::text("alice"),
            Value::text("read"),
            Value::text("doc1"),
            Value::object(indexmap::IndexMap::new()),
        )
    }

    fn load(voters: &PdpVoterSource<ScriptedCompiler>, pdp_id: &str, algorithm: CombiningAlgorithm) {
        let pdp_json = PdpJson { algorithm, ..PdpJson::default() };
        voters.load_configuration(
            PdpConfiguration::new(pdp_id, pdp_json, vec![SaplDocument { name: "p1.sapl".into(), text: String::new() }]),
            true,
        );
    }

    #[tokio::test]
    async fn decide_emits_a_decision_then_completes_on_removal() {
        let point = DecisionPoint::new(ScriptedCompiler::new(Arc::new(Mutex::new(Effect::Permit))));
        load(&point.voter_source(), "default", CombiningAlgorithm::PriorityPermit);

        let mut stream = point
            .decide(subscription(), "default", Arc::new(NoFunctions), Arc::new(NoAttributes))
            .unwrap();

        assert_eq!(stream.next().await.unwrap().decision, Outcome::Permit);

        point.voter_source().remove_configuration_for_pdp("default");
        assert_eq!(stream.next().await.unwrap().decision, Outcome::Indeterminate);
        assert!(stream.next().await.is_none());
    }

    #[tokio::test]
    async fn decide_reevaluates_on_hot_reload() {
        let effect = Arc::new(Mutex::new(Effect::Deny));
        let point = DecisionPoint::new(ScriptedCompiler::new(Arc::clone(&effect)));
        load(&point.voter_source(), "default", CombiningAlgorithm::PriorityDeny);

        let mut stream = point
            .decide(subscription(), "default", Arc::new(NoFunctions), Arc::new(NoAttributes))
            .unwrap();
        assert_eq!(stream.next().await.unwrap().decision, Outcome::Deny);

        // Flip the compiler's effect and reload under the same pdpId: the
        // existing subscription re-evaluates against the new voter tree and
        // the next emission turns from Deny to Permit.
        *effect.lock().unwrap() = Effect::Permit;
        load(&point.voter_source(), "default", CombiningAlgorithm::PriorityPermit);
        assert_eq!(stream.next().await.unwrap().decision, Outcome::Permit);
    }

    #[tokio::test]
    async fn decide_rejects_unknown_pdp_id() {
        let point = DecisionPoint::new(ScriptedCompiler::new(Arc::new(Mutex::new(Effect::Permit))));
        let result = point.decide(subscription(), "missing", Arc::new(NoFunctions), Arc::new(NoAttributes));
        assert!(result.is_err());
    }

    #[test]
    fn interceptors_fire_in_priority_order() {
        struct Recording {
            priority: i32,
            order: Arc<Mutex<Vec<i32>>>,
        }
        impl VoteInterceptor for Recording {
            fn priority(&self) -> i32 {
                self.priority
            }
            fn on_subscribe(&self, _subscription_id: &str, _subscription: &AuthorizationSubscription) {
                self.order.lock().unwrap().push(self.priority);
            }
            fn on_vote(&self, _subscription_id: &str, _decision: &AuthorizationDecision) {
                self.order.lock().unwrap().push(self.priority);
            }
            fn on_unsubscribe(&self, _subscription_id: &str) {}
        }

        let order = Arc::new(Mutex::new(Vec::new()));
        let registry = InterceptorRegistry::new();
        registry.register(Arc::new(Recording { priority: 5, order: Arc::clone(&order) }));
        registry.register(Arc::new(Recording { priority: -1, order: Arc::clone(&order) }));
        registry.register(Arc::new(Recording { priority: 0, order: Arc::clone(&order) }));

        registry.notify_subscribe("s1", &subscription());
        assert_eq!(*order.lock().unwrap(), vec![-1, 0, 5]);

        order.lock().unwrap().clear();
        registry.notify_vote("s1", &AuthorizationDecision::configuration_removed());
        assert_eq!(*order.lock().unwrap(), vec![-1, 0, 5]);
    }
}
