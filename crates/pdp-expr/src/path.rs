//! Path step evaluation over [`Value`] (spec §4.2.1).
//!
//! Each function here is pure: given a parent value (and, for the
//! recursive steps, a depth budget) it returns the stepped-into value or an
//! `Error`. The expression-step variant (`[[expr]]`) is evaluated in
//! `eval.rs`, since it needs to evaluate an `Expr` first.

use pdp_core::{Location, Value};

use crate::MAX_RECURSION_DEPTH;

fn err(location: Option<&Location>, kind: &str, message: impl Into<String>) -> Value {
    Value::error_at(location.cloned(), kind, message)
}

/// `parent.k`.
#[must_use]
pub fn key_step(parent: &Value, key: &str, location: Option<&Location>) -> Value {
    if let Some(obj) = parent.as_object() {
        obj.get(key).cloned().unwrap_or_else(Value::undefined)
    } else if let Some(items) = parent.as_array() {
        let projected: Vec<Value> = items
            .iter()
            .map(|item| key_step(item, key, location))
            .filter(|v| !v.is_undefined())
            .collect();
        Value::array(projected)
    } else {
        Value::undefined()
    }
}

fn normalize(i: i64, len: i64) -> i64 {
    if i < 0 {
        i + len
    } else {
        i
    }
}

/// `parent[i]`.
#[must_use]
pub fn index_step(parent: &Value, index: i64, location: Option<&Location>) -> Value {
    let Some(items) = parent.as_array() else {
        return Value::undefined();
    };
    let len = items.len() as i64;
    let normalized = normalize(index, len);
    if normalized < 0 || normalized >= len {
        return err(
            location,
            "index_out_of_bounds",
            format!("index {index} out of bounds for array of size {len}"),
        );
    }
    items[normalized as usize].clone()
}

/// `parent[from:to:step]`. Step `0` is an error. Missing bounds default to
/// sentinel extremes; negative bounds normalise by `+len`, then clamp to
/// `[0, len]`. This is the non-Python selection rule spec §4.2.1 requires:
/// with a positive step the included indices are the arithmetic progression
/// starting at `from` while `< to`; with a negative step, starting at `from`
/// while `> until` (the normalised `to`, defaulting to `-1`).
#[must_use]
pub fn slice_step(
    parent: &Value,
    from: Option<i64>,
    to: Option<i64>,
    step: Option<i64>,
    location: Option<&Location>,
) -> Value {
    let Some(items) = parent.as_array() else {
        return Value::undefined();
    };
    let step = step.unwrap_or(1);
    if step == 0 {
        return err(location, "invalid_slice_step", "slice step must not be zero");
    }
    let len = items.len() as i64;
    let mut out = Vec::new();
    if step > 0 {
        let from = normalize(from.unwrap_or(0), len).clamp(0, len);
        let to = normalize(to.unwrap_or(len), len).clamp(0, len);
        let mut i = from;
        while i < to {
            if (0..len).contains(&i) {
                out.push(items[i as usize].clone());
            }
            i += step;
        }
    } else {
        let default_from = len - 1;
        let from = normalize(from.unwrap_or(default_from), len).clamp(-1, len - 1);
        let until = normalize(to.unwrap_or(-1), len).clamp(-1, len - 1);
        let mut i = from;
        while i > until {
            if (0..len).contains(&i) {
                out.push(items[i as usize].clone());
            }
            i += step;
        }
    }
    Value::array(out)
}

/// `parent.*`.
#[must_use]
pub fn wildcard_step(parent: &Value, location: Option<&Location>) -> Value {
    if parent.as_array().is_some() {
        parent.clone()
    } else if let Some(obj) = parent.as_object() {
        Value::array(obj.values().cloned().collect())
    } else {
        err(location, "wildcard_on_scalar", format!("wildcard on {}", type_name(parent)))
    }
}

/// `parent[i1, i2, ...]`.
#[must_use]
pub fn index_union_step(parent: &Value, indices: &[i64], location: Option<&Location>) -> Value {
    let Some(items) = parent.as_array() else {
        return err(location, "index_union_on_non_array", "index union requires an array");
    };
    let len = items.len() as i64;
    let mut normalized: Vec<i64> = Vec::with_capacity(indices.len());
    for &i in indices {
        let n = normalize(i, len);
        if n < 0 || n >= len {
            return err(
                location,
                "index_out_of_bounds",
                format!("index {i} out of bounds for array of size {len}"),
            );
        }
        normalized.push(n);
    }
    normalized.sort_unstable();
    normalized.dedup();
    Value::array(normalized.into_iter().map(|i| items[i as usize].clone()).collect())
}

/// `parent["k1", "k2", ...]`.
#[must_use]
pub fn attribute_union_step(parent: &Value, keys: &[String], location: Option<&Location>) -> Value {
    let Some(obj) = parent.as_object() else {
        return err(location, "attribute_union_on_non_object", "attribute union requires an object");
    };
    let wanted: std::collections::HashSet<&str> = keys.iter().map(String::as_str).collect();
    let mut out = Vec::with_capacity(wanted.len());
    for (k, v) in obj {
        if wanted.contains(k.as_str()) {
            out.push(v.clone());
        }
    }
    Value::array(out)
}

fn recurse_collect(
    value: &Value,
    depth: usize,
    location: Option<&Location>,
    visit: &mut dyn FnMut(&Value, &mut Vec<Value>),
    out: &mut Vec<Value>,
) -> Option<Value> {
    if depth > MAX_RECURSION_DEPTH {
        return Some(err(location, "recursion_limit_exceeded", "recursive descent exceeded maximum depth"));
    }
    visit(value, out);
    if let Some(items) = value.as_array() {
        for item in items {
            if let Some(e) = recurse_collect(item, depth + 1, location, visit, out) {
                return Some(e);
            }
        }
    } else if let Some(obj) = value.as_object() {
        for v in obj.values() {
            if let Some(e) = recurse_collect(v, depth + 1, location, visit, out) {
                return Some(e);
            }
        }
    }
    None
}

/// `..k` — depth-first search collecting every object field named `k`.
#[must_use]
pub fn recursive_key_step(parent: &Value, key: &str, location: Option<&Location>) -> Value {
    let mut out = Vec::new();
    let mut visit = |v: &Value, out: &mut Vec<Value>| {
        if let Some(obj) = v.as_object() {
            if let Some(found) = obj.get(key) {
                out.push(found.clone());
            }
        }
    };
    if let Some(e) = recurse_collect(parent, 0, location, &mut visit, &mut out) {
        return e;
    }
    Value::array(out)
}

/// `..[i]` — depth-first search emitting the normalised-index element of
/// every encountered array, when in range.
#[must_use]
pub fn recursive_index_step(parent: &Value, index: i64, location: Option<&Location>) -> Value {
    let mut out = Vec::new();
    let mut visit = |v: &Value, out: &mut Vec<Value>| {
        if let Some(items) = v.as_array() {
            let len = items.len() as i64;
            let n = normalize(index, len);
            if n >= 0 && n < len {
                out.push(items[n as usize].clone());
            }
        }
    };
    if let Some(e) = recurse_collect(parent, 0, location, &mut visit, &mut out) {
        return e;
    }
    Value::array(out)
}

/// `..*` — depth-first search emitting every encountered child value.
#[must_use]
pub fn recursive_wildcard_step(parent: &Value, location: Option<&Location>) -> Value {
    let mut out = Vec::new();
    let mut visit = |v: &Value, out: &mut Vec<Value>| {
        if let Some(items) = v.as_array() {
            out.extend(items.iter().cloned());
        } else if let Some(obj) = v.as_object() {
            out.extend(obj.values().cloned());
        }
    };
    if let Some(e) = recurse_collect(parent, 0, location, &mut visit, &mut out) {
        return e;
    }
    Value::array(out)
}

pub(crate) fn type_name(value: &Value) -> &'static str {
    if value.is_undefined() {
        "undefined"
    } else if value.is_null() {
        "null"
    } else if value.is_error() {
        "error"
    } else if value.as_bool().is_some() {
        "boolean"
    } else if value.as_number().is_some() {
        "number"
    } else if value.as_text().is_some() {
        "text"
    } else if value.as_array().is_some() {
        "array"
    } else if value.as_object().is_some() {
        "object"
    } else {
        "value"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal::Decimal;

    fn arr(values: impl IntoIterator<Item = i64>) -> Value {
        Value::array(values.into_iter().map(Value::number).collect())
    }

    #[test]
    fn index_negative_boundary() {
        let a = arr([10, 20, 30]);
        assert_eq!(index_step(&a, -3, None), Value::number(10));
        let err = index_step(&a, -4, None);
        assert!(err.is_error());
    }

    #[test]
    fn slice_zero_step_errors() {
        let a = arr([1, 2, 3]);
        let v = slice_step(&a, None, None, Some(0), None);
        assert!(v.is_error());
    }

    #[test]
    fn slice_positive_step() {
        let a = arr([0, 1, 2, 3, 4]);
        let v = slice_step(&a, Some(1), Some(4), Some(2), None);
        assert_eq!(v, Value::array(vec![Value::number(1), Value::number(3)]));
    }

    #[test]
    fn slice_negative_step_reverses() {
        let a = arr([0, 1, 2, 3, 4]);
        let v = slice_step(&a, None, None, Some(-1), None);
        assert_eq!(
            v,
            Value::array(vec![
                Value::number(4),
                Value::number(3),
                Value::number(2),
                Value::number(1),
                Value::number(0)
            ])
        );
    }

    #[test]
    fn wildcard_on_scalar_errors() {
        let v = wildcard_step(&Value::number(Decimal::from(1)), None);
        assert!(v.is_error());
    }

    #[test]
    fn index_union_sorts_and_dedups() {
        let a = arr([10, 20, 30, 40]);
        let v = index_union_step(&a, &[2, 0, 2], None);
        assert_eq!(v, Value::array(vec![Value::number(10), Value::number(30)]));
    }

    #[test]
    fn recursive_key_collects_nested_matches() {
        use indexmap::indexmap;
        let inner = Value::object(indexmap! { "name".to_string() => Value::text("b") });
        let outer = Value::object(indexmap! {
            "name".to_string() => Value::text("a"),
            "child".to_string() => inner,
        });
        let v = recursive_key_step(&outer, "name", None);
        assert_eq!(v, Value::array(vec![Value::text("a"), Value::text("b")]));
    }

    #[test]
    fn recursion_depth_limit_is_enforced() {
        let mut v = Value::array(vec![Value::number(1)]);
        for _ in 0..(super::MAX_RECURSION_DEPTH + 2) {
            v = Value::array(vec![v]);
        }
        let out = recursive_wildcard_step(&v, None);
        assert!(out.is_error());
    }

    proptest::proptest! {
        /// `indexStep(a, i) == indexStep(a, i + len(a))` for negative `i`
        /// within bounds: the two forms name the same element.
        #[test]
        fn negative_index_matches_its_positive_equivalent(
            len in 1usize..32,
            offset in 1usize..32,
        ) {
            let len_i64 = len as i64;
            let negative = -((offset % len) as i64 + 1);
            let a = arr((0..len_i64).collect::<Vec<_>>());
            let by_negative = index_step(&a, negative, None);
            let by_positive = index_step(&a, negative + len_i64, None);
            assert_eq!(by_negative, by_positive);
        }
    }
}
