//! Filter pipeline evaluation (spec §4.2.2): simple `|- fn(args)` / `each`,
//! and extended `|- { target: fn, ... }` rewrites.

use indexmap::IndexMap;
use pdp_core::Value;

use crate::ast::{Expr, FilterTargetStep, PathStep};
use crate::builtins::FilterOutcome;
use crate::path;

/// Collaborator supplying the two things a filter rewrite cannot compute on
/// its own: applying a filter function at a position (which may call the
/// function broker or a built-in), and evaluating a static filter-condition
/// predicate. Implemented by `pdp-expr`'s evaluator, which owns the
/// `EvaluationContext` these calls need.
pub trait FilterRuntime {
    /// Apply `function` to `current`, the value at the addressed position.
    fn apply(&mut self, function: &Expr, current: &Value) -> FilterOutcome;
    /// Evaluate a filter-condition predicate. Must not reference `@`.
    fn eval_condition(&mut self, predicate: &Expr) -> Value;
}

/// Apply a simple (non-extended) filter: `target |- fn(args)`, optionally
/// preceded by `each`.
pub fn apply_simple(
    target: &Value,
    function: &Expr,
    each: bool,
    runtime: &mut dyn FilterRuntime,
) -> Value {
    if target.is_undefined() {
        return Value::error_at(None, "filter_on_undefined", "filters cannot be applied to undefined");
    }
    if each {
        let Some(items) = target.as_array() else {
            return Value::error_at(None, "each_on_non_array", "cannot use 'each' with non-array");
        };
        let mut out = Vec::with_capacity(items.len());
        for item in items {
            if let FilterOutcome::Replace(v) = runtime.apply(function, item) {
                out.push(v);
            }
        }
        return Value::array(out);
    }
    match runtime.apply(function, target) {
        FilterOutcome::Replace(v) => v,
        // Removing the root of the whole filtered value has nothing to
        // remove it from; the result collapses to Undefined.
        FilterOutcome::Remove => Value::undefined(),
    }
}

/// One extended-filter target: the steps from `@` to the position, and the
/// function applied there.
pub struct ResolvedTarget<'a> {
    /// Steps from the root to the position being rewritten.
    pub steps: &'a [FilterTargetStep],
    /// The function applied at that position.
    pub function: &'a Expr,
}

/// Apply every extended-filter target to `target` in corpus order, folding
/// each rewrite into the next.
pub fn apply_extended(target: &Value, targets: &[ResolvedTarget<'_>], runtime: &mut dyn FilterRuntime) -> Value {
    if target.is_undefined() {
        return Value::error_at(None, "filter_on_undefined", "filters cannot be applied to undefined");
    }
    let mut current = target.clone();
    for t in targets {
        match rewrite(&current, t.steps, 0, t.function, runtime) {
            Ok(Some(v)) => current = v,
            Ok(None) => current = Value::undefined(),
            Err(e) => return e,
        }
    }
    current
}

/// Walk `steps[pos..]` from `value`, applying `function` at the addressed
/// position and rebuilding every ancestor immutably. `Ok(None)` means the
/// position (or, at `pos == 0`, the whole value) was deleted.
fn rewrite(
    value: &Value,
    steps: &[FilterTargetStep],
    pos: usize,
    function: &Expr,
    runtime: &mut dyn FilterRuntime,
) -> Result<Option<Value>, Value> {
    if pos == steps.len() {
        return match runtime.apply(function, value) {
            FilterOutcome::Replace(v) => Ok(Some(v)),
            FilterOutcome::Remove => Ok(None),
        };
    }
    match &steps[pos] {
        FilterTargetStep::Condition(predicate) => {
            if runtime.eval_condition(predicate).is_true() {
                rewrite(value, steps, pos + 1, function, runtime)
            } else {
                Ok(Some(value.clone()))
            }
        }
        FilterTargetStep::Path(PathStep::Key(key)) => {
            let Some(obj) = value.as_object() else {
                return Err(Value::error_at(None, "field_not_found", format!("Field '{key}' not found")));
            };
            let Some(child) = obj.get(key) else {
                return Err(Value::error_at(None, "field_not_found", format!("Field '{key}' not found")));
            };
            let result = rewrite(child, steps, pos + 1, function, runtime)?;
            let mut new_obj = obj.clone();
            match result {
                Some(v) => {
                    new_obj.insert(key.clone(), v);
                }
                None => {
                    new_obj.shift_remove(key);
                }
            }
            Ok(Some(Value::object(new_obj)))
        }
        FilterTargetStep::Path(PathStep::Index(index)) => {
            let Some(arr) = value.as_array() else {
                return Err(Value::error_at(None, "array_index_out_of_bounds", "array index out of bounds"));
            };
            let len = arr.len() as i64;
            let n = if *index < 0 { index + len } else { *index };
            if n < 0 || n >= len {
                return Err(Value::error_at(None, "array_index_out_of_bounds", "array index out of bounds"));
            }
            let result = rewrite(&arr[n as usize], steps, pos + 1, function, runtime)?;
            let mut new_arr = arr.to_vec();
            match result {
                Some(v) => new_arr[n as usize] = v,
                None => {
                    new_arr.remove(n as usize);
                }
            }
            Ok(Some(Value::array(new_arr)))
        }
        FilterTargetStep::Path(PathStep::Wildcard) => {
            if let Some(arr) = value.as_array() {
                let mut out = Vec::with_capacity(arr.len());
                for item in arr {
                    if let Some(v) = rewrite(item, steps, pos + 1, function, runtime)? {
                        out.push(v);
                    }
                }
                Ok(Some(Value::array(out)))
            } else if let Some(obj) = value.as_object() {
                let mut new_obj = IndexMap::with_capacity(obj.len());
                for (k, v) in obj {
                    if let Some(nv) = rewrite(v, steps, pos + 1, function, runtime)? {
                        new_obj.insert(k.clone(), nv);
                    }
                }
                Ok(Some(Value::object(new_obj)))
            } else {
                Err(Value::error_at(None, "wildcard_on_scalar", format!("wildcard on {}", path::type_name(value))))
            }
        }
        FilterTargetStep::Path(PathStep::Slice { from, to, step }) => {
            if value.as_array().is_none() {
                return Err(Value::error_at(None, "array_index_out_of_bounds", "array index out of bounds"));
            }
            let selected = path::slice_step(value, *from, *to, *step, None);
            if selected.is_error() {
                return Err(selected);
            }
            let arr = value.as_array().unwrap_or(&[]);
            rewrite_indices(arr, &matching_slice_indices(arr.len(), *from, *to, *step), steps, pos, function, runtime)
        }
        FilterTargetStep::Path(PathStep::IndexUnion(indices)) => {
            let Some(arr) = value.as_array() else {
                return Err(Value::error_at(None, "array_index_out_of_bounds", "array index out of bounds"));
            };
            let len = arr.len() as i64;
            let mut normalized = Vec::with_capacity(indices.len());
            for &i in indices {
                let n = if i < 0 { i + len } else { i };
                if n < 0 || n >= len {
                    return Err(Value::error_at(
                        None,
                        "index_out_of_bounds",
                        format!("index {i} out of bounds for array of size {len}"),
                    ));
                }
                normalized.push(n as usize);
            }
            normalized.sort_unstable();
            normalized.dedup();
            rewrite_indices(arr, &normalized, steps, pos, function, runtime)
        }
        FilterTargetStep::Path(PathStep::AttributeUnion(keys)) => {
            let Some(obj) = value.as_object() else {
                return Err(Value::error_at(None, "attribute_union_on_non_object", "attribute union requires an object"));
            };
            let wanted: std::collections::HashSet<&str> = keys.iter().map(String::as_str).collect();
            let mut new_obj = IndexMap::with_capacity(obj.len());
            for (k, v) in obj {
                if wanted.contains(k.as_str()) {
                    if let Some(nv) = rewrite(v, steps, pos + 1, function, runtime)? {
                        new_obj.insert(k.clone(), nv);
                    }
                } else {
                    new_obj.insert(k.clone(), v.clone());
                }
            }
            Ok(Some(Value::object(new_obj)))
        }
        FilterTargetStep::Path(
            PathStep::RecursiveKey(_)
            | PathStep::RecursiveIndex(_)
            | PathStep::RecursiveWildcard
            | PathStep::Expression(_),
        ) => Err(Value::error_at(
            None,
            "unsupported_filter_target_step",
            "this path step is not supported in a filter target",
        )),
    }
}

fn matching_slice_indices(len: usize, from: Option<i64>, to: Option<i64>, step: Option<i64>) -> Vec<usize> {
    let len = len as i64;
    let step = step.unwrap_or(1);
    let normalize = |i: i64| if i < 0 { i + len } else { i };
    let mut out = Vec::new();
    if step > 0 {
        let from = normalize(from.unwrap_or(0)).clamp(0, len);
        let to = normalize(to.unwrap_or(len)).clamp(0, len);
        let mut i = from;
        while i < to {
            if (0..len).contains(&i) {
                out.push(i as usize);
            }
            i += step;
        }
    } else if step < 0 {
        let from = normalize(from.unwrap_or(len - 1)).clamp(-1, len - 1);
        let until = normalize(to.unwrap_or(-1)).clamp(-1, len - 1);
        let mut i = from;
        while i > until {
            if (0..len).contains(&i) {
                out.push(i as usize);
            }
            i += step;
        }
    }
    out
}

fn rewrite_indices(
    arr: &[Value],
    indices: &[usize],
    steps: &[FilterTargetStep],
    pos: usize,
    function: &Expr,
    runtime: &mut dyn FilterRuntime,
) -> Result<Option<Value>, Value> {
    let selected: std::collections::HashSet<usize> = indices.iter().copied().collect();
    let mut out = Vec::with_capacity(arr.len());
    for (i, item) in arr.iter().enumerate() {
        if selected.contains(&i) {
            if let Some(v) = rewrite(item, steps, pos + 1, function, runtime)? {
                out.push(v);
            }
        } else {
            out.push(item.clone());
        }
    }
    Ok(Some(Value::array(out)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builtins;
    use indexmap::indexmap;

    struct TestRuntime;

    impl FilterRuntime for TestRuntime {
        fn apply(&mut self, function: &Expr, current: &Value) -> FilterOutcome {
            let Expr::FunctionCall { name, .. } = function else { panic!("test only uses FunctionCall") };
            builtins::apply(name, current, &[]).expect("builtin")
        }

        fn eval_condition(&mut self, _predicate: &Expr) -> Value {
            Value::boolean(true)
        }
    }

    fn remove_fn() -> Expr {
        Expr::FunctionCall { name: "filter.remove".to_string(), args: vec![] }
    }

    #[test]
    fn filter_on_undefined_errors() {
        let v = apply_simple(&Value::undefined(), &remove_fn(), false, &mut TestRuntime);
        assert!(v.is_error());
    }

    #[test]
    fn each_on_non_array_errors() {
        let v = apply_simple(&Value::text("x"), &remove_fn(), true, &mut TestRuntime);
        assert!(v.is_error());
    }

    #[test]
    fn nested_field_remove() {
        let target = Value::object(indexmap! {
            "name".to_string() => Value::text("test"),
            "age".to_string() => Value::number(rust_decimal::Decimal::from(42)),
        });
        let steps = vec![FilterTargetStep::Path(PathStep::Key("name".to_string()))];
        let function = remove_fn();
        let targets = vec![ResolvedTarget { steps: &steps, function: &function }];
        let result = apply_extended(&target, &targets, &mut TestRuntime);
        let expected = Value::object(indexmap! {
            "age".to_string() => Value::number(rust_decimal::Decimal::from(42)),
        });
        assert_eq!(result, expected);
    }

    #[test]
    fn remove_at_root_becomes_undefined() {
        let target = Value::object(indexmap! { "a".to_string() => Value::null() });
        let function = remove_fn();
        let targets = vec![ResolvedTarget { steps: &[], function: &function }];
        let result = apply_extended(&target, &targets, &mut TestRuntime);
        assert!(result.is_undefined());
    }
}
