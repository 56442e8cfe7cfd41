//! The request/response shapes `decide` consumes and produces (spec §4.5).

use pdp_core::Value;
use pdp_policy::{Outcome, Vote};

/// The four top-level bindings a `decide` call evaluates policies against.
#[derive(Debug, Clone)]
pub struct AuthorizationSubscription {
    /// Who is acting.
    pub subject: Value,
    /// What they are trying to do.
    pub action: Value,
    /// What they are trying to do it to.
    pub resource: Value,
    /// Ambient context (time, location, ...).
    pub environment: Value,
}

impl AuthorizationSubscription {
    /// Construct a subscription from its four bindings.
    #[must_use]
    pub fn new(subject: Value, action: Value, resource: Value, environment: Value) -> Self {
        Self { subject, action, resource, environment }
    }
}

/// One emission of a `decide` stream: the finalised PDP-level outcome,
/// aggregated obligations/advice, any resource transform, and a full trace.
#[derive(Debug, Clone)]
pub struct AuthorizationDecision {
    /// The finalised outcome.
    pub decision: Outcome,
    /// Obligations the caller must execute for this decision to take effect.
    pub obligations: Vec<Value>,
    /// Advice the caller may act on.
    pub advice: Vec<Value>,
    /// The transformed resource, or `Undefined` if no policy contributed one.
    pub resource: Value,
    /// The full vote trace (spec §4.3.5), for audit and debugging.
    pub trace: Value,
}

impl AuthorizationDecision {
    /// Build the external decision shape from the finalised PDP-level vote.
    #[must_use]
    pub fn from_vote(vote: &Vote) -> Self {
        Self {
            decision: vote.decision,
            obligations: vote.obligations.clone(),
            advice: vote.advice.clone(),
            resource: vote.resource.clone(),
            trace: vote.to_trace(),
        }
    }

    /// The terminal decision emitted when a `pdpId`'s configuration is
    /// removed while a subscription is active (spec §4.5, testable property
    /// 6): `Indeterminate` with reason `"configuration removed"`, no
    /// obligations, advice, or resource.
    #[must_use]
    pub fn configuration_removed() -> Self {
        Self {
            decision: Outcome::Indeterminate,
            obligations: Vec::new(),
            advice: Vec::new(),
            resource: Value::undefined(),
            trace: Value::object({
                let mut m = indexmap::IndexMap::new();
                m.insert("reason".to_string(), Value::text("configuration removed"));
                m
            }),
        }
    }
}
