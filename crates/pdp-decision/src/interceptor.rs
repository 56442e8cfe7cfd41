//! `VoteInterceptor`: priority-ordered hooks fired when a subscription
//! starts and ends, keyed by a stable, generated subscription identifier
//! (spec §4.5, testable property 6).

use std::sync::{Arc, RwLock};

use crate::subscription::{AuthorizationDecision, AuthorizationSubscription};

/// A hook notified when a `decide` subscription starts, emits a decision,
/// and ends. Lower `priority()` values run first.
pub trait VoteInterceptor: Send + Sync {
    /// This interceptor's priority; ties keep registration order.
    fn priority(&self) -> i32 {
        0
    }

    /// Called once, before the first decision is emitted.
    fn on_subscribe(&self, subscription_id: &str, subscription: &AuthorizationSubscription);

    /// Called on every decision emitted for `subscription_id`, after it has
    /// been sent to the subscriber.
    fn on_vote(&self, subscription_id: &str, decision: &AuthorizationDecision);

    /// Called exactly once, when the subscription's stream completes for
    /// any reason (cancellation, configuration removal, or the caller
    /// dropping the stream).
    fn on_unsubscribe(&self, subscription_id: &str);
}

/// The registered interceptors, kept in priority order.
#[derive(Default)]
pub struct InterceptorRegistry {
    interceptors: RwLock<Vec<Arc<dyn VoteInterceptor>>>,
}

impl InterceptorRegistry {
    /// An empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `interceptor`, re-sorting by priority.
    pub fn register(&self, interceptor: Arc<dyn VoteInterceptor>) {
        let mut guard = self.interceptors.write().unwrap();
        guard.push(interceptor);
        guard.sort_by_key(|i| i.priority());
    }

    /// Notify every interceptor, in priority order, that `subscription_id`
    /// has started.
    pub fn notify_subscribe(&self, subscription_id: &str, subscription: &AuthorizationSubscription) {
        for interceptor in self.interceptors.read().unwrap().iter() {
            interceptor.on_subscribe(subscription_id, subscription);
        }
    }

    /// Notify every interceptor, in priority order, of a decision emitted
    /// for `subscription_id`.
    pub fn notify_vote(&self, subscription_id: &str, decision: &AuthorizationDecision) {
        for interceptor in self.interceptors.read().unwrap().iter() {
            interceptor.on_vote(subscription_id, decision);
        }
    }

    /// Notify every interceptor, in priority order, that `subscription_id`
    /// has ended.
    pub fn notify_unsubscribe(&self, subscription_id: &str) {
        for interceptor in self.interceptors.read().unwrap().iter() {
            interceptor.on_unsubscribe(subscription_id);
        }
    }
}
