//! `Vote`, the result of evaluating a voter, plus finalisation against a
//! configuration's `defaultDecision`/`errorHandling` (spec §4.3.4) and trace
//! rendering (spec §4.3.5).

use pdp_core::Value;
use pdp_expr::AttributeRecord;

use crate::model::Voter;

/// The outcome of a vote: either a concrete decision, or one of the two
/// non-decisions (`NotApplicable` from an unmatched target/failed
/// condition, `Indeterminate` from an evaluation error).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// The voter applied and granted `Permit`.
    Permit,
    /// The voter applied and granted `Deny`.
    Deny,
    /// The voter's target did not match, or a body condition was false.
    NotApplicable,
    /// Evaluating the voter failed.
    Indeterminate,
}

/// Which kind of voter produced a vote, for trace rendering.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VoterKind {
    /// A leaf policy.
    Policy,
    /// A policy set.
    PolicySet,
    /// The PDP-level voter combining top-level policy/policy-set voters.
    Pdp,
}

/// Identifies which voter produced a vote.
#[derive(Debug, Clone)]
pub struct VoterDescriptor {
    /// The kind of voter.
    pub kind: VoterKind,
    /// The voter's name.
    pub name: String,
}

impl VoterDescriptor {
    /// A descriptor for a leaf policy voter.
    #[must_use]
    pub fn policy(name: impl Into<String>) -> Self {
        Self { kind: VoterKind::Policy, name: name.into() }
    }

    /// A descriptor for a policy-set voter.
    #[must_use]
    pub fn policy_set(name: impl Into<String>) -> Self {
        Self { kind: VoterKind::PolicySet, name: name.into() }
    }

    /// A descriptor for the PDP-level voter.
    #[must_use]
    pub fn pdp(name: impl Into<String>) -> Self {
        Self { kind: VoterKind::Pdp, name: name.into() }
    }

    /// A descriptor built from a compiled [`Voter`].
    #[must_use]
    pub fn of(voter: &Voter) -> Self {
        match voter {
            Voter::Policy(p) => Self::policy(p.name.clone()),
            Voter::PolicySet(s) => Self::policy_set(s.name.clone()),
        }
    }
}

/// The result of evaluating one voter (spec §4.3.1-§4.3.3).
///
/// `decision` and `outcome` start out equal; [`finalize`] may demote
/// `decision` (e.g. `Indeterminate` -> `NotApplicable` under
/// `ErrorHandling::Abstain`) while leaving `outcome` as the pre-finalisation
/// classification, so a trace can still show why a vote was originally
/// indeterminate even after it's been finalised away.
#[derive(Debug, Clone)]
pub struct Vote {
    /// The finalised decision. Equal to `outcome` until [`finalize`] runs.
    pub decision: Outcome,
    /// The vote's outcome as originally classified, before finalisation.
    pub outcome: Outcome,
    /// Obligations the caller must execute for this decision to take effect.
    pub obligations: Vec<Value>,
    /// Advice the caller may act on.
    pub advice: Vec<Value>,
    /// The transformed resource, or `Undefined` if no policy contributed one.
    pub resource: Value,
    /// Which voter produced this vote.
    pub voter: VoterDescriptor,
    /// Errors contributing to an `Indeterminate` outcome.
    pub errors: Vec<pdp_core::ErrorValue>,
    /// Attribute retrievals made while producing this vote.
    pub attribute_records: Vec<AttributeRecord>,
    /// Child votes, for a policy-set or PDP-level vote.
    pub contributing_votes: Vec<Vote>,
}

impl Vote {
    /// An `Abstain` (`NotApplicable`) vote from `voter`, with no obligations,
    /// advice, or resource.
    #[must_use]
    pub fn abstain(voter: VoterDescriptor) -> Self {
        Self {
            decision: Outcome::NotApplicable,
            outcome: Outcome::NotApplicable,
            obligations: Vec::new(),
            advice: Vec::new(),
            resource: Value::undefined(),
            voter,
            errors: Vec::new(),
            attribute_records: Vec::new(),
            contributing_votes: Vec::new(),
        }
    }

    /// An `Indeterminate` vote carrying a single error.
    #[must_use]
    pub fn indeterminate(
        voter: VoterDescriptor,
        error: pdp_core::ErrorValue,
        attribute_records: Vec<AttributeRecord>,
    ) -> Self {
        Self {
            decision: Outcome::Indeterminate,
            outcome: Outcome::Indeterminate,
            obligations: Vec::new(),
            advice: Vec::new(),
            resource: Value::undefined(),
            voter,
            errors: vec![error],
            attribute_records,
            contributing_votes: Vec::new(),
        }
    }

    /// Render this vote (and its contributing votes, recursively) as a trace
    /// object (spec §4.3.5).
    #[must_use]
    pub fn to_trace(&self) -> Value {
        use indexmap::IndexMap;
        let mut obj = IndexMap::new();
        obj.insert("decision".to_string(), Value::text(outcome_name(self.decision)));
        obj.insert("obligations".to_string(), Value::array(self.obligations.clone()));
        obj.insert("advice".to_string(), Value::array(self.advice.clone()));
        if !self.resource.is_undefined() {
            obj.insert("resource".to_string(), self.resource.clone());
        }
        let mut voter = IndexMap::new();
        voter.insert("kind".to_string(), Value::text(voter_kind_name(self.voter.kind)));
        voter.insert("name".to_string(), Value::text(self.voter.name.clone()));
        obj.insert("voter".to_string(), Value::object(voter));
        obj.insert("outcome".to_string(), Value::text(outcome_name(self.outcome)));
        obj.insert(
            "errors".to_string(),
            Value::array(
                self.errors
                    .iter()
                    .map(|e| {
                        let mut m = IndexMap::new();
                        m.insert("kind".to_string(), Value::text(e.kind.clone()));
                        m.insert("message".to_string(), Value::text(e.message.clone()));
                        Value::object(m)
                    })
                    .collect(),
            ),
        );
        obj.insert(
            "contributingAttributes".to_string(),
            Value::array(
                self.attribute_records
                    .iter()
                    .map(|r| {
                        let mut m = IndexMap::new();
                        m.insert("name".to_string(), Value::text(r.name.clone()));
                        m.insert("entity".to_string(), r.entity.clone());
                        m.insert("arguments".to_string(), Value::array(r.arguments.clone()));
                        m.insert("retrievedAt".to_string(), Value::number(r.retrieved_at));
                        m.insert("value".to_string(), r.value.clone());
                        Value::object(m)
                    })
                    .collect(),
            ),
        );
        obj.insert(
            "contributingVotes".to_string(),
            Value::array(self.contributing_votes.iter().map(Vote::to_trace).collect()),
        );
        Value::object(obj)
    }
}

fn outcome_name(o: Outcome) -> &'static str {
    match o {
        Outcome::Permit => "Permit",
        Outcome::Deny => "Deny",
        Outcome::NotApplicable => "NotApplicable",
        Outcome::Indeterminate => "Indeterminate",
    }
}

fn voter_kind_name(k: VoterKind) -> &'static str {
    match k {
        VoterKind::Policy => "Policy",
        VoterKind::PolicySet => "PolicySet",
        VoterKind::Pdp => "Pdp",
    }
}

/// The configuration's default decision when every voter abstains (spec
/// §4.3.4, §6.3 `algorithm.defaultDecision`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DefaultDecision {
    /// Fall back to `Deny`.
    #[default]
    Deny,
    /// Fall back to `Permit`.
    Permit,
    /// Leave `NotApplicable` unchanged.
    Abstain,
}

/// How an `Indeterminate` vote is finalised (spec §4.3.4, §6.3
/// `algorithm.errorHandling`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ErrorHandling {
    /// Leave `Indeterminate` unchanged.
    #[default]
    Propagate,
    /// Demote to `NotApplicable`, preserving the prior outcome for tracing.
    Abstain,
}

/// Finalise a vote leaving the outermost combination against
/// `default_decision`/`error_handling` (spec §4.3.4's table).
#[must_use]
pub fn finalize(mut vote: Vote, default_decision: DefaultDecision, error_handling: ErrorHandling) -> Vote {
    match (vote.decision, default_decision, error_handling) {
        (Outcome::NotApplicable, DefaultDecision::Permit, _) => {
            vote.decision = Outcome::Permit;
        }
        (Outcome::NotApplicable, DefaultDecision::Deny, _) => {
            vote.decision = Outcome::Deny;
        }
        (Outcome::NotApplicable, DefaultDecision::Abstain, _) => {}
        (Outcome::Indeterminate, _, ErrorHandling::Abstain) => {
            // `outcome` is left untouched so a trace can still show the
            // vote was originally Indeterminate.
            vote.decision = Outcome::NotApplicable;
        }
        (Outcome::Indeterminate, _, ErrorHandling::Propagate) => {}
        (Outcome::Permit | Outcome::Deny, _, _) => {}
    }
    vote
}

#[cfg(test)]
mod tests {
    use super::*;
    use pdp_core::ErrorValue;

    #[test]
    fn abstain_and_indeterminate_start_with_equal_decision_and_outcome() {
        let a = Vote::abstain(VoterDescriptor::policy("p"));
        assert_eq!(a.decision, Outcome::NotApplicable);
        assert_eq!(a.outcome, Outcome::NotApplicable);

        let i = Vote::indeterminate(VoterDescriptor::policy("p"), ErrorValue::new("E", "boom"), Vec::new());
        assert_eq!(i.decision, Outcome::Indeterminate);
        assert_eq!(i.outcome, Outcome::Indeterminate);
    }

    #[test]
    fn finalize_not_applicable_respects_default_decision() {
        let v = Vote::abstain(VoterDescriptor::policy("p"));
        let finalized = finalize(v, DefaultDecision::Permit, ErrorHandling::Propagate);
        assert_eq!(finalized.decision, Outcome::Permit);
        assert_eq!(finalized.outcome, Outcome::NotApplicable);
    }

    #[test]
    fn finalize_indeterminate_abstain_demotes_decision_but_preserves_outcome() {
        let v = Vote::indeterminate(VoterDescriptor::policy("p"), ErrorValue::new("E", "boom"), Vec::new());
        let finalized = finalize(v, DefaultDecision::Deny, ErrorHandling::Abstain);
        assert_eq!(finalized.decision, Outcome::NotApplicable);
        assert_eq!(finalized.outcome, Outcome::Indeterminate);
    }

    #[test]
    fn finalize_indeterminate_propagate_leaves_both_unchanged() {
        let v = Vote::indeterminate(VoterDescriptor::policy("p"), ErrorValue::new("E", "boom"), Vec::new());
        let finalized = finalize(v, DefaultDecision::Deny, ErrorHandling::Propagate);
        assert_eq!(finalized.decision, Outcome::Indeterminate);
        assert_eq!(finalized.outcome, Outcome::Indeterminate);
    }

    #[test]
    fn to_trace_emits_decision_and_outcome_from_distinct_fields_after_finalize() {
        let v = Vote::indeterminate(VoterDescriptor::policy("p"), ErrorValue::new("E", "boom"), Vec::new());
        let finalized = finalize(v, DefaultDecision::Deny, ErrorHandling::Abstain);
        let trace = finalized.to_trace();
        let obj = trace.as_object().expect("trace is an object");
        assert_eq!(obj.get("decision").and_then(pdp_core::Value::as_text), Some("NotApplicable"));
        assert_eq!(obj.get("outcome").and_then(pdp_core::Value::as_text), Some("Indeterminate"));
    }
}
