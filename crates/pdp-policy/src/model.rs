//! Compiled policy/policy-set model (spec §4.3.1, §4.3.2). These are the
//! `PolicyVoter`/`PolicySetVoter` values the external compiler (§6.1) is
//! assumed to produce; this crate only evaluates them.

use pdp_expr::Expr;

/// The effect a policy grants when applicable: the `permit`/`deny` keyword
/// at the head of its body.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Effect {
    /// `policy ... permit ...`.
    Permit,
    /// `policy ... deny ...`.
    Deny,
}

/// One statement of a policy body: either a local variable binding or a
/// condition that must evaluate to `true` for the policy to stay applicable.
#[derive(Debug, Clone)]
pub enum Statement {
    /// `var name = expr;` — binds `name` in the evaluation context for the
    /// remainder of the body.
    Let(String, Expr),
    /// A bare condition expression.
    Condition(Expr),
}

/// A single policy: target, body, effect, and its obligations/advice/
/// transform expressions.
#[derive(Debug, Clone)]
pub struct Policy {
    /// The policy's name, used in vote tracing.
    pub name: String,
    /// The effect granted when the policy is applicable and its body holds.
    pub effect: Effect,
    /// The target expression; the policy only applies when this is `true`.
    pub target: Expr,
    /// Body statements, evaluated in order.
    pub body: Vec<Statement>,
    /// Obligation expressions, evaluated in order.
    pub obligations: Vec<Expr>,
    /// Advice expressions, evaluated in order.
    pub advice: Vec<Expr>,
    /// The resource transform expression, if the policy declares one.
    pub transform: Option<Expr>,
}

/// A policy set: a target, a combining algorithm, and an ordered list of
/// child voters (policies or nested policy sets).
#[derive(Debug, Clone)]
pub struct PolicySet {
    /// The policy set's name, used in vote tracing.
    pub name: String,
    /// The target expression; the set only applies when this is `true`.
    pub target: Expr,
    /// The algorithm combining child votes.
    pub algorithm: CombiningAlgorithm,
    /// Child voters, in corpus (declaration) order.
    pub children: Vec<Voter>,
}

/// A compiled voter: either a leaf policy or a nested policy set.
#[derive(Debug, Clone)]
pub enum Voter {
    /// A leaf policy.
    Policy(Policy),
    /// A nested policy set.
    PolicySet(PolicySet),
}

impl Voter {
    /// This voter's name, for tracing.
    #[must_use]
    pub fn name(&self) -> &str {
        match self {
            Voter::Policy(p) => &p.name,
            Voter::PolicySet(s) => &s.name,
        }
    }
}

/// The five combining algorithms (spec §4.3.3).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CombiningAlgorithm {
    /// `Permit` wins over `Deny`.
    PriorityPermit,
    /// `Deny` wins over `Permit`.
    PriorityDeny,
    /// All applicable votes must agree.
    Unanimous,
    /// Exactly one applicable vote is required.
    Unique,
    /// The first applicable vote (corpus order) wins.
    First,
}
