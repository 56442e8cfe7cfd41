//! Combining algorithms (spec §4.3.3): fuse a list of child votes into one.

use pdp_core::{ErrorValue, Value};

use crate::model::CombiningAlgorithm;
use crate::vote::{Outcome, Vote};

/// The result of combining child votes, before a voter descriptor and
/// contributing-votes list are attached.
pub struct Combined {
    /// The combined outcome.
    pub outcome: Outcome,
    /// Concatenated obligations from the winning vote(s), corpus order.
    pub obligations: Vec<Value>,
    /// Concatenated advice from the winning vote(s), corpus order.
    pub advice: Vec<Value>,
    /// The resource transform, if exactly one winning vote contributed one.
    pub resource: Value,
    /// Errors surfaced by an `Indeterminate` result.
    pub errors: Vec<ErrorValue>,
}

/// Combine `votes` (the children of a policy set) using `algorithm`.
#[must_use]
pub fn combine(algorithm: CombiningAlgorithm, votes: &[Vote]) -> Combined {
    match algorithm {
        CombiningAlgorithm::PriorityPermit => priority(votes, Outcome::Permit, Outcome::Deny),
        CombiningAlgorithm::PriorityDeny => priority(votes, Outcome::Deny, Outcome::Permit),
        CombiningAlgorithm::Unanimous => unanimous(votes),
        CombiningAlgorithm::Unique => unique(votes),
        CombiningAlgorithm::First => first(votes),
    }
}

fn by_outcome<'a>(votes: &'a [Vote], outcome: Outcome) -> Vec<&'a Vote> {
    votes.iter().filter(|v| v.outcome == outcome).collect()
}

fn priority(votes: &[Vote], winner: Outcome, runner_up: Outcome) -> Combined {
    let winners = by_outcome(votes, winner);
    if !winners.is_empty() {
        return fuse(winner, &winners);
    }
    if votes.iter().any(|v| v.outcome == Outcome::Indeterminate) {
        return indeterminate_from(votes);
    }
    let runners = by_outcome(votes, runner_up);
    if !runners.is_empty() {
        return fuse(runner_up, &runners);
    }
    empty(Outcome::NotApplicable)
}

fn unanimous(votes: &[Vote]) -> Combined {
    if votes.iter().any(|v| v.outcome == Outcome::Indeterminate) {
        return indeterminate_from(votes);
    }
    let permits = by_outcome(votes, Outcome::Permit);
    let denies = by_outcome(votes, Outcome::Deny);
    if !permits.is_empty() && denies.is_empty() {
        return fuse(Outcome::Permit, &permits);
    }
    if !denies.is_empty() && permits.is_empty() {
        return fuse(Outcome::Deny, &denies);
    }
    if !permits.is_empty() && !denies.is_empty() {
        return Combined {
            outcome: Outcome::Indeterminate,
            obligations: Vec::new(),
            advice: Vec::new(),
            resource: Value::undefined(),
            errors: vec![ErrorValue::new("mixed_decision", "unanimous combination requires all applicable votes to agree")],
        };
    }
    empty(Outcome::NotApplicable)
}

fn unique(votes: &[Vote]) -> Combined {
    let applicable: Vec<&Vote> = votes.iter().filter(|v| matches!(v.outcome, Outcome::Permit | Outcome::Deny)).collect();
    if votes.iter().any(|v| v.outcome == Outcome::Indeterminate) && applicable.len() <= 1 {
        // An error alongside at most one applicable vote is still ambiguous
        // about which decision should have won; treat as Indeterminate.
        return indeterminate_from(votes);
    }
    match applicable.len() {
        0 => empty(Outcome::NotApplicable),
        1 => fuse(applicable[0].outcome, &applicable),
        _ => Combined {
            outcome: Outcome::Indeterminate,
            obligations: Vec::new(),
            advice: Vec::new(),
            resource: Value::undefined(),
            errors: vec![ErrorValue::new("non_unique_decision", "more than one applicable vote under the 'unique' algorithm")],
        },
    }
}

fn first(votes: &[Vote]) -> Combined {
    for vote in votes {
        if matches!(vote.outcome, Outcome::Permit | Outcome::Deny) {
            return fuse(vote.outcome, &[vote]);
        }
        if vote.outcome == Outcome::Indeterminate {
            return indeterminate_from(std::slice::from_ref(vote));
        }
    }
    empty(Outcome::NotApplicable)
}

fn empty(outcome: Outcome) -> Combined {
    Combined { outcome, obligations: Vec::new(), advice: Vec::new(), resource: Value::undefined(), errors: Vec::new() }
}

fn indeterminate_from(votes: &[Vote]) -> Combined {
    let errors = votes.iter().flat_map(|v| v.errors.iter().cloned()).collect();
    Combined { outcome: Outcome::Indeterminate, obligations: Vec::new(), advice: Vec::new(), resource: Value::undefined(), errors }
}

/// Concatenate obligations/advice from `winners` in corpus order and enforce
/// the at-most-one-resource-transform rule.
fn fuse(outcome: Outcome, winners: &[&Vote]) -> Combined {
    let mut obligations = Vec::new();
    let mut advice = Vec::new();
    let mut transforms = Vec::new();
    for v in winners {
        obligations.extend(v.obligations.iter().cloned());
        advice.extend(v.advice.iter().cloned());
        if !v.resource.is_undefined() {
            transforms.push(v.resource.clone());
        }
    }
    if transforms.len() > 1 {
        return Combined {
            outcome: Outcome::Indeterminate,
            obligations: Vec::new(),
            advice: Vec::new(),
            resource: Value::undefined(),
            errors: vec![ErrorValue::new("multiple_transformations", "multiple transformations")],
        };
    }
    let resource = transforms.into_iter().next().unwrap_or_else(Value::undefined);
    Combined { outcome, obligations, advice, resource, errors: Vec::new() }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vote::VoterDescriptor;

    fn vote(outcome: Outcome) -> Vote {
        Vote {
            decision: outcome,
            outcome,
            obligations: Vec::new(),
            advice: Vec::new(),
            resource: Value::undefined(),
            voter: VoterDescriptor::policy("p"),
            errors: Vec::new(),
            attribute_records: Vec::new(),
            contributing_votes: Vec::new(),
        }
    }

    #[test]
    fn priority_deny_overrides_permit() {
        let votes = vec![vote(Outcome::Permit), vote(Outcome::Deny)];
        let combined = combine(CombiningAlgorithm::PriorityDeny, &votes);
        assert_eq!(combined.outcome, Outcome::Deny);
    }

    #[test]
    fn priority_permit_overrides_deny() {
        let votes = vec![vote(Outcome::Permit), vote(Outcome::Deny)];
        let combined = combine(CombiningAlgorithm::PriorityPermit, &votes);
        assert_eq!(combined.outcome, Outcome::Permit);
    }

    #[test]
    fn unanimous_mixed_is_indeterminate() {
        let votes = vec![vote(Outcome::Permit), vote(Outcome::Deny)];
        let combined = combine(CombiningAlgorithm::Unanimous, &votes);
        assert_eq!(combined.outcome, Outcome::Indeterminate);
    }

    #[test]
    fn unanimous_all_abstain_is_not_applicable() {
        let votes = vec![vote(Outcome::NotApplicable), vote(Outcome::NotApplicable)];
        let combined = combine(CombiningAlgorithm::Unanimous, &votes);
        assert_eq!(combined.outcome, Outcome::NotApplicable);
    }

    #[test]
    fn unique_more_than_one_applicable_is_indeterminate() {
        let votes = vec![vote(Outcome::Permit), vote(Outcome::Permit)];
        let combined = combine(CombiningAlgorithm::Unique, &votes);
        assert_eq!(combined.outcome, Outcome::Indeterminate);
    }

    #[test]
    fn unique_exactly_one_applicable_wins() {
        let votes = vec![vote(Outcome::NotApplicable), vote(Outcome::Deny)];
        let combined = combine(CombiningAlgorithm::Unique, &votes);
        assert_eq!(combined.outcome, Outcome::Deny);
    }

    #[test]
    fn first_applicable_wins_in_corpus_order() {
        let votes = vec![vote(Outcome::NotApplicable), vote(Outcome::Permit), vote(Outcome::Deny)];
        let combined = combine(CombiningAlgorithm::First, &votes);
        assert_eq!(combined.outcome, Outcome::Permit);
    }

    #[test]
    fn multiple_transforms_are_indeterminate() {
        let mut a = vote(Outcome::Permit);
        a.resource = Value::text("a");
        let mut b = vote(Outcome::Permit);
        b.resource = Value::text("b");
        let combined = combine(CombiningAlgorithm::PriorityPermit, &[a, b]);
        assert_eq!(combined.outcome, Outcome::Indeterminate);
        assert_eq!(combined.errors[0].kind, "multiple_transformations");
    }

    proptest::proptest! {
        /// `priority-deny`'s resulting outcome depends only on the multiset
        /// of child outcomes, not the order votes are evaluated in.
        #[test]
        fn priority_deny_outcome_is_order_independent(
            outcomes in proptest::collection::vec(
                proptest::prelude::any::<u8>().prop_map(|b| match b % 4 {
                    0 => Outcome::Permit,
                    1 => Outcome::Deny,
                    2 => Outcome::NotApplicable,
                    _ => Outcome::Indeterminate,
                }),
                0..8,
            ),
            rotate_by in 0usize..8,
        ) {
            let votes: Vec<Vote> = outcomes.iter().map(|o| vote(*o)).collect();
            let combined = combine(CombiningAlgorithm::PriorityDeny, &votes);

            let rotate_by = if votes.is_empty() { 0 } else { rotate_by % votes.len() };
            let mut rotated = votes;
            rotated.rotate_left(rotate_by);
            let combined_rotated = combine(CombiningAlgorithm::PriorityDeny, &rotated);

            assert_eq!(combined.outcome, combined_rotated.outcome);
        }
    }
}
