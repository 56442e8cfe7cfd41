//! Bridges [`pdp_policy::VoteObserver`] to structured `tracing` events.

use pdp_policy::{Outcome, Vote, VoterKind};

/// Logs every finalised vote as a structured `tracing` event. Always
/// available (unlike the `otel` feature's counters), this is the default
/// observer a PDP process installs via [`pdp_policy::set_observer`].
#[derive(Debug, Default)]
pub struct LoggingVoteObserver;

impl LoggingVoteObserver {
    /// Construct a new observer.
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl pdp_policy::VoteObserver for LoggingVoteObserver {
    fn on_vote(&self, vote: &Vote) {
        let kind = voter_kind_name(vote.voter.kind);
        let outcome = outcome_name(vote.outcome);
        if vote.errors.is_empty() {
            tracing::info!(voter.kind = kind, voter.name = %vote.voter.name, decision = outcome, "vote");
        } else {
            for error in &vote.errors {
                tracing::warn!(
                    voter.kind = kind,
                    voter.name = %vote.voter.name,
                    decision = outcome,
                    error.kind = %error.kind,
                    error.message = %error.message,
                    "vote"
                );
            }
        }
    }
}

fn outcome_name(o: Outcome) -> &'static str {
    match o {
        Outcome::Permit => "permit",
        Outcome::Deny => "deny",
        Outcome::NotApplicable => "not_applicable",
        Outcome::Indeterminate => "indeterminate",
    }
}

fn voter_kind_name(k: VoterKind) -> &'static str {
    match k {
        VoterKind::Policy => "policy",
        VoterKind::PolicySet => "policy_set",
        VoterKind::Pdp => "pdp",
    }
}

#[cfg(test)]
mod tests {
    use pdp_policy::VoterDescriptor;

    use super::*;

    #[test]
    fn logs_without_panicking_on_permit_and_indeterminate() {
        let observer = LoggingVoteObserver::new();
        observer.on_vote(&Vote::abstain(VoterDescriptor::policy("p1")));
        observer.on_vote(&Vote::indeterminate(
            VoterDescriptor::pdp("default"),
            pdp_core::ErrorValue::new("eval_error", "boom"),
            Vec::new(),
        ));
    }
}
