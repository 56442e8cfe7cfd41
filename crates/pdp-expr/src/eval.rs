//! The expression evaluator proper: dispatches over [`Expr`] nodes, calling
//! into `path`, `filter`, and `builtins` for their respective step kinds.

use pdp_core::Value;
use rust_decimal::Decimal;

use crate::ast::{BinaryOp, Expr, FilterPipeline, PathStep, UnaryOp};
use crate::builtins::{self, FilterOutcome};
use crate::context::EvaluationContext;
use crate::filter::{self, FilterRuntime, ResolvedTarget};
use crate::path;
use crate::MAX_RECURSION_DEPTH;

/// Evaluate `expr` against `ctx`, producing a `Value`. Never panics: every
/// malformed or type-mismatched operation yields an `Error` value instead
/// (spec §9 "Error as value").
#[must_use]
pub fn evaluate(expr: &Expr, ctx: &mut EvaluationContext<'_>) -> Value {
    eval_inner(expr, ctx, 0)
}

fn depth_guard(depth: usize) -> Option<Value> {
    if depth > MAX_RECURSION_DEPTH {
        Some(Value::error_at(None, "recursion_limit_exceeded", "expression evaluation exceeded maximum depth"))
    } else {
        None
    }
}

fn eval_inner(expr: &Expr, ctx: &mut EvaluationContext<'_>, depth: usize) -> Value {
    if let Some(e) = depth_guard(depth) {
        return e;
    }
    match expr {
        Expr::Literal(v) => v.clone(),
        Expr::Variable(name) => ctx
            .variable(name)
            .unwrap_or_else(|| Value::error_at(ctx.location(), "unbound_variable", format!("variable '{name}' is not bound"))),
        Expr::Current => ctx
            .current()
            .cloned()
            .unwrap_or_else(|| Value::error_at(ctx.location(), "unbound_relative_value", "'@' is not bound at this position")),
        Expr::Index => ctx
            .index()
            .map(Value::number)
            .unwrap_or_else(|| Value::error_at(ctx.location(), "unbound_relative_index", "'#' is not bound at this position")),
        Expr::Unary { op, operand } => {
            let v = eval_inner(operand, ctx, depth + 1);
            eval_unary(*op, v, ctx)
        }
        Expr::Binary { op, left, right } => eval_binary(*op, left, right, ctx, depth),
        Expr::Conditional { condition, then_branch, else_branch } => {
            let c = eval_inner(condition, ctx, depth + 1);
            if c.is_error() {
                c
            } else if c.is_true() {
                eval_inner(then_branch, ctx, depth + 1)
            } else {
                eval_inner(else_branch, ctx, depth + 1)
            }
        }
        Expr::Path { base, steps } => {
            let mut current = eval_inner(base, ctx, depth + 1);
            for step in steps {
                if current.is_error() {
                    break;
                }
                current = eval_path_step(&current, step, ctx, depth + 1);
            }
            current
        }
        Expr::FunctionCall { name, args } => {
            let values = eval_args(args, ctx, depth);
            if let Some(e) = first_error(&values) {
                return e;
            }
            ctx.call_function(name, &values)
        }
        Expr::AttributeCall { name, entity, args } => {
            let entity_value = eval_inner(entity, ctx, depth + 1);
            if entity_value.is_error() {
                return entity_value;
            }
            let values = eval_args(args, ctx, depth);
            if let Some(e) = first_error(&values) {
                return e;
            }
            ctx.call_attribute(name, entity_value, values)
        }
        Expr::Filter { target, pipeline } => eval_filter(target, pipeline, ctx, depth),
        Expr::Subtemplate { base, template } => eval_subtemplate(base, template, ctx, depth),
        Expr::Located { location, expr } => {
            ctx.set_location(Some(location.clone()));
            eval_inner(expr, ctx, depth + 1)
        }
    }
}

fn eval_args(args: &[Expr], ctx: &mut EvaluationContext<'_>, depth: usize) -> Vec<Value> {
    args.iter().map(|a| eval_inner(a, ctx, depth + 1)).collect()
}

fn first_error(values: &[Value]) -> Option<Value> {
    values.iter().find(|v| v.is_error()).cloned()
}

fn eval_unary(op: UnaryOp, operand: Value, ctx: &EvaluationContext<'_>) -> Value {
    if operand.is_error() {
        return operand;
    }
    match op {
        UnaryOp::Not => match operand.as_bool() {
            Some(b) => Value::boolean(!b),
            None => Value::error_at(ctx.location(), "type_mismatch", "'!' requires a boolean operand"),
        },
        UnaryOp::Negate => match operand.as_number() {
            Some(n) => Value::number(-n),
            None => Value::error_at(ctx.location(), "type_mismatch", "unary '-' requires a numeric operand"),
        },
    }
}

fn eval_binary(op: BinaryOp, left: &Expr, right: &Expr, ctx: &mut EvaluationContext<'_>, depth: usize) -> Value {
    // Structural equality is defined for every value, including Undefined
    // and Error, so it bypasses the generic error-propagation checks below.
    if matches!(op, BinaryOp::Eq | BinaryOp::NotEq) {
        let l = eval_inner(left, ctx, depth + 1);
        let r = eval_inner(right, ctx, depth + 1);
        let eq = l == r;
        return Value::boolean(if op == BinaryOp::Eq { eq } else { !eq });
    }
    if matches!(op, BinaryOp::And | BinaryOp::Or) {
        let l = eval_inner(left, ctx, depth + 1);
        if l.is_error() {
            return l;
        }
        let Some(lb) = l.as_bool() else {
            return Value::error_at(ctx.location(), "type_mismatch", "logical operator requires a boolean operand");
        };
        if (op == BinaryOp::And && !lb) || (op == BinaryOp::Or && lb) {
            return Value::boolean(lb);
        }
        let r = eval_inner(right, ctx, depth + 1);
        if r.is_error() {
            return r;
        }
        return match r.as_bool() {
            Some(rb) => Value::boolean(rb),
            None => Value::error_at(ctx.location(), "type_mismatch", "logical operator requires a boolean operand"),
        };
    }

    let l = eval_inner(left, ctx, depth + 1);
    let r = eval_inner(right, ctx, depth + 1);
    if l.is_error() {
        return l;
    }
    if r.is_error() {
        return r;
    }

    if matches!(op, BinaryOp::Lt | BinaryOp::LtEq | BinaryOp::Gt | BinaryOp::GtEq) {
        return match (l.as_number(), r.as_number()) {
            (Some(a), Some(b)) => Value::boolean(match op {
                BinaryOp::Lt => a < b,
                BinaryOp::LtEq => a <= b,
                BinaryOp::Gt => a > b,
                BinaryOp::GtEq => a >= b,
                _ => unreachable!(),
            }),
            _ => Value::error_at(ctx.location(), "type_mismatch", "comparison requires numeric operands"),
        };
    }

    // Arithmetic: '+' additionally supports text concatenation.
    if op == BinaryOp::Add {
        if let (Some(a), Some(b)) = (l.as_text(), r.as_text()) {
            return Value::text(format!("{a}{b}"));
        }
    }
    match (l.as_number(), r.as_number()) {
        (Some(a), Some(b)) => arithmetic(op, a, b, ctx),
        _ => Value::error_at(ctx.location(), "type_mismatch", "arithmetic operator requires numeric operands"),
    }
}

fn arithmetic(op: BinaryOp, a: Decimal, b: Decimal, ctx: &EvaluationContext<'_>) -> Value {
    match op {
        BinaryOp::Add => Value::number(a + b),
        BinaryOp::Sub => Value::number(a - b),
        BinaryOp::Mul => Value::number(a * b),
        BinaryOp::Div => {
            if b.is_zero() {
                Value::error_at(ctx.location(), "division_by_zero", "division by zero")
            } else {
                Value::number(a / b)
            }
        }
        BinaryOp::Rem => {
            if b.is_zero() {
                Value::error_at(ctx.location(), "division_by_zero", "remainder by zero")
            } else {
                Value::number(a % b)
            }
        }
        _ => unreachable!("non-arithmetic op routed to arithmetic()"),
    }
}

fn eval_path_step(current: &Value, step: &PathStep, ctx: &mut EvaluationContext<'_>, depth: usize) -> Value {
    let location = ctx.location();
    match step {
        PathStep::Key(k) => path::key_step(current, k, location.as_ref()),
        PathStep::Index(i) => path::index_step(current, *i, location.as_ref()),
        PathStep::Slice { from, to, step } => path::slice_step(current, *from, *to, *step, location.as_ref()),
        PathStep::Wildcard => path::wildcard_step(current, location.as_ref()),
        PathStep::IndexUnion(indices) => path::index_union_step(current, indices, location.as_ref()),
        PathStep::AttributeUnion(keys) => path::attribute_union_step(current, keys, location.as_ref()),
        PathStep::RecursiveKey(k) => path::recursive_key_step(current, k, location.as_ref()),
        PathStep::RecursiveIndex(i) => path::recursive_index_step(current, *i, location.as_ref()),
        PathStep::RecursiveWildcard => path::recursive_wildcard_step(current, location.as_ref()),
        PathStep::Expression(expr) => {
            let key = eval_inner(expr, ctx, depth + 1);
            if key.is_error() {
                return key;
            }
            if let Some(n) = key.as_index() {
                path::index_step(current, n, location.as_ref())
            } else if let Some(s) = key.as_text() {
                path::key_step(current, s, location.as_ref())
            } else {
                Value::error_at(location, "invalid_expression_step", "expression step must evaluate to a number or text")
            }
        }
    }
}

/// Bridges `filter::FilterRuntime` to an `EvaluationContext`: applying a
/// filter function binds `@` to the position being rewritten for the
/// function's own evaluation, while condition predicates are evaluated
/// without touching the `@` stack (they must be static, spec §4.2.2/§9).
struct EvalFilterRuntime<'ctx, 'a> {
    ctx: &'ctx mut EvaluationContext<'a>,
    depth: usize,
}

impl FilterRuntime for EvalFilterRuntime<'_, '_> {
    fn apply(&mut self, function: &Expr, current: &Value) -> FilterOutcome {
        self.ctx.push_current(current.clone());
        let outcome = match resolve_call(function) {
            Some((name, args)) => {
                let arg_values = eval_args(&args, self.ctx, self.depth);
                if let Some(e) = first_error(&arg_values) {
                    FilterOutcome::Replace(e)
                } else if let Some(outcome) = builtins::apply(&name, current, &arg_values) {
                    outcome
                } else {
                    FilterOutcome::Replace(self.ctx.call_function(&name, &arg_values))
                }
            }
            None => FilterOutcome::Replace(eval_inner(function, self.ctx, self.depth + 1)),
        };
        self.ctx.pop_current();
        outcome
    }

    fn eval_condition(&mut self, predicate: &Expr) -> Value {
        eval_inner(predicate, self.ctx, self.depth + 1)
    }
}

/// Extract `name(args...)` from a `FunctionCall` node, resolving built-ins
/// before falling back to the broker. Any other expression shape is
/// evaluated directly with `@` already bound to the current position.
fn resolve_call(expr: &Expr) -> Option<(String, Vec<Expr>)> {
    match expr {
        Expr::FunctionCall { name, args } => Some((name.clone(), args.clone())),
        Expr::Located { expr, .. } => resolve_call(expr),
        _ => None,
    }
}

fn eval_filter(target: &Expr, pipeline: &FilterPipeline, ctx: &mut EvaluationContext<'_>, depth: usize) -> Value {
    let target_value = eval_inner(target, ctx, depth + 1);
    if target_value.is_error() {
        return target_value;
    }
    let mut runtime = EvalFilterRuntime { ctx, depth };
    match pipeline {
        FilterPipeline::Simple { function, each } => filter::apply_simple(&target_value, function, *each, &mut runtime),
        FilterPipeline::Extended(targets) => {
            let resolved: Vec<ResolvedTarget<'_>> =
                targets.iter().map(|t| ResolvedTarget { steps: &t.steps, function: t.function.as_ref() }).collect();
            filter::apply_extended(&target_value, &resolved, &mut runtime)
        }
    }
}

fn eval_subtemplate(base: &Expr, template: &Expr, ctx: &mut EvaluationContext<'_>, depth: usize) -> Value {
    let base_value = eval_inner(base, ctx, depth + 1);
    if base_value.is_error() {
        return base_value;
    }
    if base_value.is_undefined() {
        return Value::undefined();
    }
    if let Some(items) = base_value.as_array() {
        let mut out = Vec::with_capacity(items.len());
        for (i, item) in items.iter().enumerate() {
            ctx.push_current(item.clone());
            ctx.push_index(i as i64);
            let v = eval_inner(template, ctx, depth + 1);
            ctx.pop_index();
            ctx.pop_current();
            if v.is_error() {
                return v;
            }
            out.push(v);
        }
        Value::array(out)
    } else {
        ctx.push_current(base_value);
        let v = eval_inner(template, ctx, depth + 1);
        ctx.pop_current();
        v
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::{FilterTarget, FilterTargetStep};
    use crate::context::{NoAttributes, NoFunctions};
    use indexmap::indexmap;
    use rust_decimal::Decimal;

    fn ctx<'a>(funcs: &'a dyn crate::FunctionBroker, attrs: &'a dyn crate::AttributeBroker) -> EvaluationContext<'a> {
        EvaluationContext::new(Value::text("investigator"), Value::text("summon"), Value::text("deep_one"), Value::null(), funcs, attrs)
    }

    #[test]
    fn subject_variable_resolves_to_top_level_binding() {
        let (f, a) = (NoFunctions, NoAttributes);
        let mut c = ctx(&f, &a);
        let v = evaluate(&Expr::Variable("subject".to_string()), &mut c);
        assert_eq!(v, Value::text("investigator"));
    }

    #[test]
    fn arithmetic_add() {
        let (f, a) = (NoFunctions, NoAttributes);
        let mut c = ctx(&f, &a);
        let expr = Expr::Binary {
            op: BinaryOp::Add,
            left: Box::new(Expr::Literal(Value::number(Decimal::from(2)))),
            right: Box::new(Expr::Literal(Value::number(Decimal::from(3)))),
        };
        assert_eq!(evaluate(&expr, &mut c), Value::number(Decimal::from(5)));
    }

    #[test]
    fn division_by_zero_is_error() {
        let (f, a) = (NoFunctions, NoAttributes);
        let mut c = ctx(&f, &a);
        let expr = Expr::Binary {
            op: BinaryOp::Div,
            left: Box::new(Expr::Literal(Value::number(Decimal::from(1)))),
            right: Box::new(Expr::Literal(Value::number(Decimal::ZERO))),
        };
        assert!(evaluate(&expr, &mut c).is_error());
    }

    #[test]
    fn path_key_step_on_object() {
        let (f, a) = (NoFunctions, NoAttributes);
        let mut c = ctx(&f, &a);
        let obj = Value::object(indexmap! { "age".to_string() => Value::number(Decimal::from(42)) });
        let expr = Expr::Path { base: Box::new(Expr::Literal(obj)), steps: vec![PathStep::Key("age".to_string())] };
        assert_eq!(evaluate(&expr, &mut c), Value::number(Decimal::from(42)));
    }

    #[test]
    fn nested_field_filter_remove_matches_testable_property() {
        let (f, a) = (NoFunctions, NoAttributes);
        let mut c = ctx(&f, &a);
        let target = Value::object(indexmap! {
            "name".to_string() => Value::text("test"),
            "age".to_string() => Value::number(Decimal::from(42)),
        });
        let remove = Box::new(Expr::FunctionCall { name: "filter.remove".to_string(), args: vec![] });
        let steps = vec![FilterTargetStep::Path(PathStep::Key("name".to_string()))];
        let pipeline = FilterPipeline::Extended(vec![FilterTarget { steps, function: remove }]);
        let expr = Expr::Filter { target: Box::new(Expr::Literal(target)), pipeline };
        let result = evaluate(&expr, &mut c);
        let expected = Value::object(indexmap! { "age".to_string() => Value::number(Decimal::from(42)) });
        assert_eq!(result, expected);
    }

    #[test]
    fn unbound_current_is_error() {
        let (f, a) = (NoFunctions, NoAttributes);
        let mut c = ctx(&f, &a);
        assert!(evaluate(&Expr::Current, &mut c).is_error());
    }
}
