//! The voter and combining engine (spec §4.3): policies, policy sets, votes,
//! the five combining algorithms, finalisation against a configuration's
//! `defaultDecision`/`errorHandling`, and vote tracing.
//!
//! This crate evaluates a compiled policy/policy-set tree (the external
//! compiler, spec §6.1, is assumed to produce [`model::Policy`]/
//! [`model::PolicySet`] values) against a [`pdp_expr::EvaluationContext`].
//! It does not load configuration or schedule re-evaluation on attribute
//! changes; that is `pdp-decision`'s job.

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod combining;
pub mod model;
pub mod observer;
pub mod vote;
mod voter;

pub use combining::{combine, Combined};
pub use model::{CombiningAlgorithm, Effect, Policy, PolicySet, Statement, Voter};
pub use observer::{install_audit_sink, set_observer, vote_metrics, AuditRecord, AuditSink, VoteMetrics, VoteObserver};
pub use vote::{finalize, DefaultDecision, ErrorHandling, Outcome, Vote, VoterDescriptor, VoterKind};
