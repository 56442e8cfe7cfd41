//! OpenTelemetry-backed vote counters (feature `otel`).

use once_cell::sync::OnceCell;
use opentelemetry::metrics::Counter;
use opentelemetry::KeyValue;
use pdp_policy::{Outcome, Vote, VoterKind};

struct Instruments {
    votes: Counter<u64>,
}

static INSTR: OnceCell<Instruments> = OnceCell::new();

fn instruments() -> &'static Instruments {
    INSTR.get_or_init(|| {
        let meter = opentelemetry::global::meter("pdp-telemetry");
        let votes = meter.u64_counter("pdp.votes").with_description("Finalised votes by voter kind and outcome").init();
        Instruments { votes }
    })
}

/// Counts finalised votes as an OpenTelemetry metric, tagged by voter kind,
/// voter name, and outcome.
#[derive(Debug, Default)]
pub struct OtelVoteObserver;

impl OtelVoteObserver {
    /// Construct a new observer.
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl pdp_policy::VoteObserver for OtelVoteObserver {
    fn on_vote(&self, vote: &Vote) {
        instruments().votes.add(
            1,
            &[
                KeyValue::new("voter.kind", voter_kind_name(vote.voter.kind)),
                KeyValue::new("voter.name", vote.voter.name.clone()),
                KeyValue::new("decision", outcome_name(vote.outcome)),
            ],
        );
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
