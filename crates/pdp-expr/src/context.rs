//! Evaluation context: the four top-level bindings, variables, import
//! resolution, the `@`/`#` relative-value stack, and the function/attribute
//! broker collaborators (spec §4.2, §4.2.3, §4.2.4).

use std::collections::HashMap;

use pdp_core::{ids, Location, Value};

/// Resolves `library.function` or `<prefix>.name` references declared via
/// `import ... [as alias]` to their fully-qualified form. Unqualified names
/// not found here are tried as-is against the broker (spec §4.2.4).
#[derive(Debug, Clone, Default)]
pub struct ImportTable {
    aliases: HashMap<String, String>,
}

impl ImportTable {
    /// An empty import table.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Declare `import <qualified> as <alias>` (or `import <qualified>`,
    /// where `alias` is the qualified name's final segment).
    pub fn add(&mut self, alias: impl Into<String>, qualified: impl Into<String>) {
        self.aliases.insert(alias.into(), qualified.into());
    }

    /// Resolve `name`: aliases first, then the name itself unqualified.
    #[must_use]
    pub fn resolve<'a>(&'a self, name: &'a str) -> &'a str {
        self.aliases.get(name).map_or(name, String::as_str)
    }
}

/// A recorded attribute retrieval, attached to the enclosing vote for
/// traceability (spec §4.2.3, `toTrace()` in §4.3.5).
#[derive(Debug, Clone)]
pub struct AttributeRecord {
    /// Fully-qualified attribute name (`<prefix>.name`).
    pub name: String,
    /// The configuration this retrieval happened under, if known.
    pub configuration_id: Option<String>,
    /// The entity the attribute was invoked on.
    pub entity: Value,
    /// Arguments passed to the invocation.
    pub arguments: Vec<Value>,
    /// Milliseconds since the UNIX epoch at retrieval time.
    pub retrieved_at: u64,
    /// The value retrieved.
    pub value: Value,
}

/// An attribute invocation: `entity.<prefix>.name(arguments)`.
#[derive(Debug, Clone)]
pub struct AttributeInvocation {
    /// Fully-qualified attribute name.
    pub name: String,
    /// Entity the attribute is invoked on.
    pub entity: Value,
    /// Evaluated argument values.
    pub arguments: Vec<Value>,
}

/// Resolves a function call to a [`Value`]. Implementations own arity and
/// argument-type validation; a mismatch is reported as an `Error` value
/// rather than surfaced to the evaluator as a distinct failure mode (spec
/// §4.2.3: "a mismatch ⇒ `Error`").
pub trait FunctionBroker: Send + Sync {
    /// Invoke `name` (already import-resolved) with `args`, returning its
    /// result or an `Error` value describing why it could not be called.
    fn call(&self, name: &str, args: &[Value]) -> Value;
}

/// Resolves an attribute invocation to its current value. The broker owns
/// the underlying subscription: repeated calls with the same invocation may
/// return different values as the backing stream emits (spec §4.2.3, §9
/// "Reactive attribute streams"). Re-evaluation on new values is driven by
/// the decision point (`pdp-decision`), not by this crate.
pub trait AttributeBroker: Send + Sync {
    /// The attribute's current value, or `Undefined` if no value has been
    /// delivered yet.
    fn current(&self, invocation: &AttributeInvocation) -> Value;
}

/// A [`FunctionBroker`] that resolves nothing; useful for tests that don't
/// exercise function calls.
pub struct NoFunctions;

impl FunctionBroker for NoFunctions {
    fn call(&self, name: &str, _args: &[Value]) -> Value {
        Value::error_at(None, "invalid_function_name", format!("unresolved function '{name}'"))
    }
}

/// An [`AttributeBroker`] that never has a value; useful for tests that
/// don't exercise attribute invocation.
pub struct NoAttributes;

impl AttributeBroker for NoAttributes {
    fn current(&self, _invocation: &AttributeInvocation) -> Value {
        Value::undefined()
    }
}

/// Everything [`crate::evaluate`] needs to run an expression tree: the four
/// top-level bindings, declared variables, the relative-value (`@`/`#`)
/// stack, import table, and the function/attribute collaborators.
pub struct EvaluationContext<'a> {
    /// The subject of the authorization subscription.
    pub subject: Value,
    /// The action of the authorization subscription.
    pub action: Value,
    /// The resource of the authorization subscription.
    pub resource: Value,
    /// The environment of the authorization subscription.
    pub environment: Value,
    /// Variables declared by `pdp.json` or bound by policy body statements.
    pub variables: HashMap<String, Value>,
    /// Import aliases in scope for the expression tree being evaluated.
    pub imports: ImportTable,
    /// The configuration id attribute retrievals are attributed to.
    pub configuration_id: Option<String>,
    function_broker: &'a dyn FunctionBroker,
    attribute_broker: &'a dyn AttributeBroker,
    relative_stack: Vec<Value>,
    index_stack: Vec<i64>,
    attribute_records: Vec<AttributeRecord>,
    current_location: Option<Location>,
}

impl<'a> EvaluationContext<'a> {
    /// Construct a context for a single authorization subscription.
    #[must_use]
    pub fn new(
        subject: Value,
        action: Value,
        resource: Value,
        environment: Value,
        function_broker: &'a dyn FunctionBroker,
        attribute_broker: &'a dyn AttributeBroker,
    ) -> Self {
        Self {
            subject,
            action,
            resource,
            environment,
            variables: HashMap::new(),
            imports: ImportTable::new(),
            configuration_id: None,
            function_broker,
            attribute_broker,
            relative_stack: Vec::new(),
            index_stack: Vec::new(),
            attribute_records: Vec::new(),
            current_location: None,
        }
    }

    /// Look up a top-level binding or declared variable by name.
    #[must_use]
    pub fn variable(&self, name: &str) -> Option<Value> {
        match name {
            "subject" => Some(self.subject.clone()),
            "action" => Some(self.action.clone()),
            "resource" => Some(self.resource.clone()),
            "environment" => Some(self.environment.clone()),
            other => self.variables.get(other).cloned(),
        }
    }

    /// Push a new `@` binding (entering a filter/subtemplate/condition body).
    pub fn push_current(&mut self, value: Value) {
        self.relative_stack.push(value);
    }

    /// Pop the innermost `@` binding.
    pub fn pop_current(&mut self) {
        self.relative_stack.pop();
    }

    /// The innermost `@` binding, if any is in scope.
    #[must_use]
    pub fn current(&self) -> Option<&Value> {
        self.relative_stack.last()
    }

    /// Push a new `#` binding (entering `each` iteration).
    pub fn push_index(&mut self, index: i64) {
        self.index_stack.push(index);
    }

    /// Pop the innermost `#` binding.
    pub fn pop_index(&mut self) {
        self.index_stack.pop();
    }

    /// The innermost `#` binding, if any is in scope.
    #[must_use]
    pub fn index(&self) -> Option<i64> {
        self.index_stack.last().copied()
    }

    /// Set the source location attributed to errors produced from this
    /// point on, until overwritten. Mirrors `Expr::Located` nodes as they
    /// are visited.
    pub fn set_location(&mut self, location: Option<Location>) {
        self.current_location = location;
    }

    /// The currently active source location, if any.
    #[must_use]
    pub fn location(&self) -> Option<Location> {
        self.current_location.clone()
    }

    /// Call the function broker, after resolving `name` through `imports`.
    #[must_use]
    pub fn call_function(&self, name: &str, args: &[Value]) -> Value {
        let resolved = self.imports.resolve(name).to_string();
        self.function_broker.call(&resolved, args)
    }

    /// Call the attribute broker, after resolving `name` through `imports`,
    /// recording the retrieval for later tracing.
    pub fn call_attribute(&mut self, name: &str, entity: Value, arguments: Vec<Value>) -> Value {
        let resolved = self.imports.resolve(name).to_string();
        let invocation =
            AttributeInvocation { name: resolved.clone(), entity: entity.clone(), arguments: arguments.clone() };
        let value = self.attribute_broker.current(&invocation);
        self.attribute_records.push(AttributeRecord {
            name: resolved,
            configuration_id: self.configuration_id.clone(),
            entity,
            arguments,
            retrieved_at: ids::now_ms(),
            value: value.clone(),
        });
        value
    }

    /// Every attribute retrieval recorded so far, for attaching to a vote.
    #[must_use]
    pub fn attribute_records(&self) -> &[AttributeRecord] {
        &self.attribute_records
    }
}
