//! Built-in filter functions (spec §4.2.2): `filter.remove`, `filter.blacken`,
//! `filter.replace(v)`. These are language primitives, not broker-resolved
//! functions, so the filter evaluator checks them before falling through to
//! the [`crate::FunctionBroker`].

use pdp_core::Value;

/// The outcome of applying a filter function at one position.
pub enum FilterOutcome {
    /// Replace the position with this value.
    Replace(Value),
    /// Delete the position entirely.
    Remove,
}

/// Apply `name(args)` to `current` if it names a built-in filter function;
/// `None` means "not a built-in, try the broker".
#[must_use]
pub fn apply(name: &str, current: &Value, args: &[Value]) -> Option<FilterOutcome> {
    match name {
        "filter.remove" => Some(FilterOutcome::Remove),
        "filter.blacken" => Some(blacken(current)),
        "filter.replace" => {
            Some(FilterOutcome::Replace(args.first().cloned().unwrap_or_else(Value::undefined)))
        }
        _ => None,
    }
}

fn blacken(current: &Value) -> FilterOutcome {
    match current.as_text() {
        Some(text) => {
            let blackened: String = text.chars().map(|_| 'X').collect();
            FilterOutcome::Replace(Value::text(blackened))
        }
        None => FilterOutcome::Replace(Value::error_at(
            None,
            "blacken_on_non_text",
            "filter.blacken requires a text value",
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blacken_replaces_every_character() {
        match apply("filter.blacken", &Value::text("secret"), &[]) {
            Some(FilterOutcome::Replace(v)) => assert_eq!(v.as_text(), Some("XXXXXX")),
            _ => panic!("expected Replace"),
        }
    }

    #[test]
    fn remove_is_remove() {
        assert!(matches!(apply("filter.remove", &Value::null(), &[]), Some(FilterOutcome::Remove)));
    }

    #[test]
    fn replace_substitutes_argument() {
        match apply("filter.replace", &Value::text("a"), &[Value::number(rust_decimal::Decimal::from(1))])
        {
            Some(FilterOutcome::Replace(v)) => assert_eq!(v, Value::number(rust_decimal::Decimal::from(1))),
            _ => panic!("expected Replace"),
        }
    }
}
