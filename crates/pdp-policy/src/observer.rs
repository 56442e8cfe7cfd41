//! Process-global observer/metrics/audit hooks for vote evaluation, mirroring
//! the install-a-hook pattern used throughout this codebase's governance
//! layer: a `OnceLock<RwLock<Option<Arc<dyn Trait>>>>` observer slot, a
//! `OnceLock`-backed counter table, and an opt-in audit sink callers drain.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, OnceLock, RwLock};

use crate::vote::{Outcome, Vote};

/// Observer invoked after every vote is finalised.
///
/// Install an implementation via [`set_observer`] to receive a callback for
/// each policy, policy-set, or PDP-level vote. Implementations must be cheap
/// and non-blocking.
pub trait VoteObserver: Send + Sync {
    /// Called with the finalised vote and the voter's qualified name.
    fn on_vote(&self, vote: &Vote);
}

static OBSERVER: OnceLock<RwLock<Option<Arc<dyn VoteObserver>>>> = OnceLock::new();

/// Install or clear the global vote observer. Passing `None` clears it.
pub fn set_observer(observer: Option<Box<dyn VoteObserver>>) {
    let cell = OBSERVER.get_or_init(|| RwLock::new(None));
    let mut w = cell.write().expect("observer write lock poisoned");
    *w = observer.map(Arc::from);
}

/// In-process counters for vote outcomes, keyed by `{voter_name, outcome}`.
#[derive(Default)]
pub struct VoteMetrics {
    inner: Arc<Mutex<HashMap<String, u64>>>,
}

impl VoteMetrics {
    /// Read the current count for a given `(voter_name, outcome)` pair.
    pub fn count(&self, voter_name: &str, outcome: &str) -> u64 {
        let key = format!("{voter_name}:{outcome}");
        self.inner.lock().expect("metrics lock poisoned").get(&key).copied().unwrap_or(0)
    }

    fn inc(&self, voter_name: &str, outcome: &str) {
        let mut g = self.inner.lock().expect("metrics lock poisoned");
        *g.entry(format!("{voter_name}:{outcome}")).or_insert(0) += 1;
    }
}

static METRICS: OnceLock<VoteMetrics> = OnceLock::new();

/// Access the global vote metrics registry.
#[must_use]
pub fn vote_metrics() -> &'static VoteMetrics {
    METRICS.get_or_init(VoteMetrics::default)
}

/// A single recorded vote, captured for later inspection.
#[derive(Debug, Clone)]
pub struct AuditRecord {
    /// The voter's qualified name.
    pub voter_name: String,
    /// The finalised outcome.
    pub outcome: Outcome,
}

/// Handle for draining captured audit records. Cheap to clone; thread-safe.
#[derive(Clone)]
pub struct AuditSink {
    inner: Arc<Mutex<Vec<AuditRecord>>>,
}

impl AuditSink {
    /// Drain and return all captured audit records.
    pub fn drain(&self) -> Vec<AuditRecord> {
        let mut g = self.inner.lock().expect("audit lock poisoned");
        std::mem::take(&mut *g)
    }
}

static AUDIT: OnceLock<AuditSink> = OnceLock::new();

/// Install (or retrieve) the process-global audit sink. Recording only
/// happens once a sink has been installed; until then [`record`] is a no-op
/// beyond metrics and observer notification.
pub fn install_audit_sink() -> AuditSink {
    if let Some(s) = AUDIT.get() {
        return s.clone();
    }
    let sink = AuditSink { inner: Arc::new(Mutex::new(Vec::new())) };
    let _ = AUDIT.set(sink.clone());
    sink
}

/// Notify the installed observer, bump metrics, and append to the audit sink
/// if one has been installed. Called once per finalised vote.
pub fn record(vote: &Vote) {
    let outcome = outcome_name(vote.outcome);
    vote_metrics().inc(&vote.voter.name, outcome);

    if let Some(lock) = OBSERVER.get() {
        if let Ok(r) = lock.read() {
            if let Some(obs) = r.as_ref() {
                obs.on_vote(vote);
            }
        }
    }

    if let Some(sink) = AUDIT.get() {
        let mut g = sink.inner.lock().expect("audit lock poisoned");
        g.push(AuditRecord { voter_name: vote.voter.name.clone(), outcome: vote.outcome });
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

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vote::VoterDescriptor;
    use std::sync::Mutex as StdMutex;

    struct Capture(StdMutex<Vec<Outcome>>);

    impl VoteObserver for Capture {
        fn on_vote(&self, vote: &Vote) {
            self.0.lock().unwrap().push(vote.outcome);
        }
    }

    #[test]
    fn observer_receives_recorded_votes() {
        let capture = Arc::new(Capture(StdMutex::new(Vec::new())));
        let observer_capture = Arc::clone(&capture);
        set_observer(Some(Box::new(CaptureHandle(observer_capture))));

        let vote = Vote::abstain(VoterDescriptor::policy("test"));
        record(&vote);

        assert_eq!(capture.0.lock().unwrap().as_slice(), &[Outcome::NotApplicable]);
        set_observer(None);
    }

    struct CaptureHandle(Arc<Capture>);
    impl VoteObserver for CaptureHandle {
        fn on_vote(&self, vote: &Vote) {
            self.0.on_vote(vote);
        }
    }

    #[test]
    fn metrics_count_by_voter_and_outcome() {
        let vote = Vote::abstain(VoterDescriptor::policy("metrics-test-voter"));
        record(&vote);
        assert!(vote_metrics().count("metrics-test-voter", "not_applicable") >= 1);
    }
}
