//! Evaluating a compiled [`Policy`] or [`PolicySet`] against an
//! [`EvaluationContext`], producing a [`Vote`] (spec §4.3.1, §4.3.2).

use pdp_core::{ErrorValue, Value};
use pdp_expr::{evaluate, EvaluationContext};

use crate::combining::combine;
use crate::model::{Effect, Policy, PolicySet, Statement, Voter};
use crate::observer;
use crate::vote::{Outcome, Vote, VoterDescriptor};

impl Policy {
    /// Evaluate this policy's target, body, obligations, advice, and
    /// transform, in that order (spec §4.3.1).
    #[must_use]
    pub fn vote(&self, ctx: &mut EvaluationContext) -> Vote {
        let descriptor = VoterDescriptor::policy(self.name.clone());
        let target = evaluate(&self.target, ctx);
        if let Some(err) = target.as_error() {
            let v = Vote::indeterminate(descriptor, err.clone(), ctx.attribute_records().to_vec());
            observer::record(&v);
            return v;
        }
        if !target.is_true() {
            let v = Vote::abstain(descriptor);
            observer::record(&v);
            return v;
        }

        for statement in &self.body {
            match statement {
                Statement::Let(name, expr) => {
                    let value = evaluate(expr, ctx);
                    if let Some(err) = value.as_error() {
                        let v = Vote::indeterminate(descriptor, err.clone(), ctx.attribute_records().to_vec());
                        observer::record(&v);
                        return v;
                    }
                    ctx.variables.insert(name.clone(), value);
                }
                Statement::Condition(expr) => {
                    let value = evaluate(expr, ctx);
                    if let Some(err) = value.as_error() {
                        let v = Vote::indeterminate(descriptor, err.clone(), ctx.attribute_records().to_vec());
                        observer::record(&v);
                        return v;
                    }
                    if !value.is_true() {
                        let v = Vote::abstain(descriptor);
                        observer::record(&v);
                        return v;
                    }
                }
            }
        }

        let mut obligations = Vec::new();
        for expr in &self.obligations {
            let value = evaluate(expr, ctx);
            if let Some(err) = value.as_error() {
                let v = Vote::indeterminate(descriptor, err.clone(), ctx.attribute_records().to_vec());
                observer::record(&v);
                return v;
            }
            obligations.push(value);
        }

        let mut advice = Vec::new();
        for expr in &self.advice {
            let value = evaluate(expr, ctx);
            if let Some(err) = value.as_error() {
                let v = Vote::indeterminate(descriptor, err.clone(), ctx.attribute_records().to_vec());
                observer::record(&v);
                return v;
            }
            advice.push(value);
        }

        let resource = match &self.transform {
            Some(expr) => {
                let value = evaluate(expr, ctx);
                if let Some(err) = value.as_error() {
                    let v = Vote::indeterminate(descriptor, err.clone(), ctx.attribute_records().to_vec());
                    observer::record(&v);
                    return v;
                }
                value
            }
            None => Value::undefined(),
        };

        let outcome = match self.effect {
            Effect::Permit => Outcome::Permit,
            Effect::Deny => Outcome::Deny,
        };
        let v = Vote {
            decision: outcome,
            outcome,
            obligations,
            advice,
            resource,
            voter: descriptor,
            errors: Vec::new(),
            attribute_records: ctx.attribute_records().to_vec(),
            contributing_votes: Vec::new(),
        };
        observer::record(&v);
        v
    }
}

impl PolicySet {
    /// Evaluate this set's target, then every child voter, then combine
    /// child votes with the set's algorithm (spec §4.3.2, §4.3.3).
    #[must_use]
    pub fn vote(&self, ctx: &mut EvaluationContext) -> Vote {
        let descriptor = VoterDescriptor::policy_set(self.name.clone());
        let target = evaluate(&self.target, ctx);
        if let Some(err) = target.as_error() {
            let v = Vote::indeterminate(descriptor, err.clone(), ctx.attribute_records().to_vec());
            observer::record(&v);
            return v;
        }
        if !target.is_true() {
            let v = Vote::abstain(descriptor);
            observer::record(&v);
            return v;
        }

        let children: Vec<Vote> = self.children.iter().map(|child| child.vote(ctx)).collect();
        let combined = combine(self.algorithm, &children);

        let mut errors = combined.errors;
        if errors.is_empty() && combined.outcome == Outcome::Indeterminate {
            errors.push(ErrorValue::new("indeterminate_combination", "combined result is indeterminate"));
        }

        let v = Vote {
            decision: combined.outcome,
            outcome: combined.outcome,
            obligations: combined.obligations,
            advice: combined.advice,
            resource: combined.resource,
            voter: descriptor,
            errors,
            attribute_records: ctx.attribute_records().to_vec(),
            contributing_votes: children,
        };
        observer::record(&v);
        v
    }
}

impl Voter {
    /// Evaluate this voter, dispatching to [`Policy::vote`] or
    /// [`PolicySet::vote`].
    #[must_use]
    pub fn vote(&self, ctx: &mut EvaluationContext) -> Vote {
        match self {
            Voter::Policy(p) => p.vote(ctx),
            Voter::PolicySet(s) => s.vote(ctx),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pdp_expr::{Expr, NoAttributes, NoFunctions};

    fn ctx<'a>(funcs: &'a NoFunctions, attrs: &'a NoAttributes) -> EvaluationContext<'a> {
        EvaluationContext::new(
            Value::object(Default::default()),
            Value::text("read"),
            Value::object(Default::default()),
            Value::object(Default::default()),
            funcs,
            attrs,
        )
    }

    fn literal_true() -> Expr {
        Expr::Literal(Value::boolean(true))
    }

    fn literal_false() -> Expr {
        Expr::Literal(Value::boolean(false))
    }

    fn permit_policy(name: &str) -> Policy {
        Policy {
            name: name.to_string(),
            effect: Effect::Permit,
            target: literal_true(),
            body: Vec::new(),
            obligations: Vec::new(),
            advice: Vec::new(),
            transform: None,
        }
    }

    fn deny_policy(name: &str) -> Policy {
        Policy { effect: Effect::Deny, ..permit_policy(name) }
    }

    #[test]
    fn policy_with_false_target_abstains() {
        let funcs = NoFunctions;
        let attrs = NoAttributes;
        let mut c = ctx(&funcs, &attrs);
        let policy = Policy { target: literal_false(), ..permit_policy("p1") };
        let vote = policy.vote(&mut c);
        assert_eq!(vote.outcome, Outcome::NotApplicable);
    }

    #[test]
    fn policy_with_true_target_grants_its_effect() {
        let funcs = NoFunctions;
        let attrs = NoAttributes;
        let mut c = ctx(&funcs, &attrs);
        let vote = permit_policy("p1").vote(&mut c);
        assert_eq!(vote.outcome, Outcome::Permit);
    }

    #[test]
    fn policy_set_priority_deny_overrides_nested_permit() {
        use crate::model::CombiningAlgorithm;
        let funcs = NoFunctions;
        let attrs = NoAttributes;
        let mut c = ctx(&funcs, &attrs);
        let set = PolicySet {
            name: "s1".to_string(),
            target: literal_true(),
            algorithm: CombiningAlgorithm::PriorityDeny,
            children: vec![Voter::Policy(permit_policy("p1")), Voter::Policy(deny_policy("p2"))],
        };
        let vote = set.vote(&mut c);
        assert_eq!(vote.outcome, Outcome::Deny);
        assert_eq!(vote.contributing_votes.len(), 2);
    }

    #[test]
    fn failing_condition_body_statement_is_indeterminate() {
        let funcs = NoFunctions;
        let attrs = NoAttributes;
        let mut c = ctx(&funcs, &attrs);
        let policy = Policy {
            body: vec![Statement::Condition(Expr::Literal(Value::error(pdp_core::ErrorValue::new(
                "boom", "boom",
            ))))],
            ..permit_policy("p1")
        };
        let vote = policy.vote(&mut c);
        assert_eq!(vote.outcome, Outcome::Indeterminate);
    }
}
