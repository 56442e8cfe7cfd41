//! Compiled expression tree consumed by [`crate::evaluate`].
//!
//! These types are the target shape produced by the external compiler
//! (spec §6.1). This crate never parses SAPL source text; tests build
//! `Expr` values directly.

use pdp_core::{Location, Value};

/// A unary operator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    /// Boolean negation (`!`).
    Not,
    /// Arithmetic negation (`-`).
    Negate,
}

/// A binary operator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    /// Logical `&&`.
    And,
    /// Logical `||`.
    Or,
    /// Structural equality `==`.
    Eq,
    /// Structural inequality `!=`.
    NotEq,
    /// `<`.
    Lt,
    /// `<=`.
    LtEq,
    /// `>`.
    Gt,
    /// `>=`.
    GtEq,
    /// `+`.
    Add,
    /// `-`.
    Sub,
    /// `*`.
    Mul,
    /// `/`.
    Div,
    /// `%`.
    Rem,
}

/// A single path step applied to a base value (spec §4.2.1).
#[derive(Debug, Clone)]
pub enum PathStep {
    /// `.k` — key lookup.
    Key(String),
    /// `[i]` — index, possibly negative.
    Index(i64),
    /// `[from:to:step]` — slice, each bound optional.
    Slice { from: Option<i64>, to: Option<i64>, step: Option<i64> },
    /// `.*` — wildcard.
    Wildcard,
    /// `[i1, i2, ...]` — index union.
    IndexUnion(Vec<i64>),
    /// `["k1", "k2", ...]` — attribute union.
    AttributeUnion(Vec<String>),
    /// `..k` — recursive key search.
    RecursiveKey(String),
    /// `..[i]` — recursive index search.
    RecursiveIndex(i64),
    /// `..*` — recursive wildcard.
    RecursiveWildcard,
    /// `[[expr]]` — expression step; evaluated and dispatched to index or key.
    Expression(Box<Expr>),
}

/// A step within an extended filter target path (spec §4.2.2). A superset of
/// [`PathStep`]: adds the filter-condition step `[?(pred)]`, whose predicate
/// must be statically evaluable (it may not reference `@`).
#[derive(Debug, Clone)]
pub enum FilterTargetStep {
    /// An ordinary path step.
    Path(PathStep),
    /// `[?(pred)]` — keep the position only if `pred` evaluates to `true`.
    /// `pred` must not reference the relative-value binding `@`.
    Condition(Box<Expr>),
}

/// One `target : function` pair of an extended filter.
#[derive(Debug, Clone)]
pub struct FilterTarget {
    /// Steps from `@` identifying the position to rewrite.
    pub steps: Vec<FilterTargetStep>,
    /// The filter function applied at that position (e.g. `filter.remove`).
    pub function: Box<Expr>,
}

/// A filter pipeline: either a single `fn(args)` applied to the whole value
/// (optionally per-element via `each`), or a set of extended targets.
#[derive(Debug, Clone)]
pub enum FilterPipeline {
    /// `parent |- fn(args)`; `each` applies `fn` to every array element.
    Simple { function: Box<Expr>, each: bool },
    /// `parent |- { target: fn, ... }`.
    Extended(Vec<FilterTarget>),
}

/// A compiled expression node.
#[derive(Debug, Clone)]
pub enum Expr {
    /// A literal value.
    Literal(Value),
    /// A named reference: `subject`, `action`, `resource`, `environment`, or
    /// a variable bound by `pdp.json` or a policy body statement.
    Variable(String),
    /// `@` — the current relative value, bound inside filter/subtemplate/
    /// filter-condition bodies.
    Current,
    /// `#` — the current relative index, bound inside `each` iteration.
    Index,
    /// A unary operator application.
    Unary { op: UnaryOp, operand: Box<Expr> },
    /// A binary operator application.
    Binary { op: BinaryOp, left: Box<Expr>, right: Box<Expr> },
    /// `cond ? then : else`.
    Conditional { condition: Box<Expr>, then_branch: Box<Expr>, else_branch: Box<Expr> },
    /// `base` followed by a chain of path steps.
    Path { base: Box<Expr>, steps: Vec<PathStep> },
    /// `library.function(args...)`.
    FunctionCall { name: String, args: Vec<Expr> },
    /// `entity.<prefix>.name(args...)` — an attribute invocation.
    AttributeCall { name: String, entity: Box<Expr>, args: Vec<Expr> },
    /// `target |- pipeline`.
    Filter { target: Box<Expr>, pipeline: FilterPipeline },
    /// `base :: template`.
    Subtemplate { base: Box<Expr>, template: Box<Expr> },
    /// Attaches a source location to an inner expression, for error/metadata
    /// provenance. The compiler wraps every leaf it emits in one of these.
    Located { location: Location, expr: Box<Expr> },
}

impl Expr {
    /// Wrap `self` with a source location.
    #[must_use]
    pub fn at(self, location: Location) -> Self {
        Expr::Located { location, expr: Box::new(self) }
    }
}
