//! The `Value` domain (spec §3 "Value (C1)"): a JSON-shaped tagged union with
//! an `Undefined` absence marker and a first-class `Error` variant, carrying
//! optional provenance metadata that never affects equality.

use std::sync::Arc;

use indexmap::IndexMap;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;

use crate::metadata::{Location, Metadata};

/// A first-class evaluation failure. Propagates through operators the way
/// `Undefined` does, except it wins over every other value when the two are
/// combined, and it terminates combining with `Indeterminate` at the nearest
/// voter (see `pdp-policy`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErrorValue {
    /// Short machine-stable error kind (e.g. `"index_out_of_bounds"`).
    pub kind: String,
    /// Human-readable message.
    pub message: String,
    /// Source location, if the producing expression step carried one.
    pub location: Option<Location>,
}

impl ErrorValue {
    /// Construct an error value for `kind` with a formatted `message`.
    #[must_use]
    pub fn new(kind: impl Into<String>, message: impl Into<String>) -> Self {
        Self { kind: kind.into(), message: message.into(), location: None }
    }

    /// Construct an error value at a specific source location.
    #[must_use]
    pub fn at(location: Location, kind: impl Into<String>, message: impl Into<String>) -> Self {
        Self { kind: kind.into(), message: message.into(), location: Some(location) }
    }
}

impl std::fmt::Display for ErrorValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.kind, self.message)
    }
}

#[derive(Debug, Clone)]
enum Kind {
    Undefined,
    Null,
    Boolean(bool),
    Number(Decimal),
    Text(Arc<str>),
    Array(Arc<Vec<Value>>),
    Object(Arc<IndexMap<String, Value>>),
    Error(Arc<ErrorValue>),
}

/// An immutable, JSON-shaped value, optionally carrying provenance metadata.
///
/// Equality is structural and ignores metadata: two values built from the
/// same data via different evaluation paths compare equal.
#[derive(Debug, Clone)]
pub struct Value {
    kind: Kind,
    metadata: Option<Arc<Metadata>>,
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (&self.kind, &other.kind) {
            (Kind::Undefined, Kind::Undefined) | (Kind::Null, Kind::Null) => true,
            (Kind::Boolean(a), Kind::Boolean(b)) => a == b,
            (Kind::Number(a), Kind::Number(b)) => a == b,
            (Kind::Text(a), Kind::Text(b)) => a == b,
            (Kind::Array(a), Kind::Array(b)) => a == b,
            (Kind::Object(a), Kind::Object(b)) => {
                a.len() == b.len() && a.iter().all(|(k, v)| b.get(k) == Some(v))
            }
            (Kind::Error(a), Kind::Error(b)) => a == b,
            _ => false,
        }
    }
}

impl Value {
    /// The distinguished absence value.
    #[must_use]
    pub fn undefined() -> Self {
        Self { kind: Kind::Undefined, metadata: None }
    }

    /// JSON null.
    #[must_use]
    pub fn null() -> Self {
        Self { kind: Kind::Null, metadata: None }
    }

    /// A boolean.
    #[must_use]
    pub fn boolean(b: bool) -> Self {
        Self { kind: Kind::Boolean(b), metadata: None }
    }

    /// An arbitrary-precision decimal number.
    #[must_use]
    pub fn number(n: impl Into<Decimal>) -> Self {
        Self { kind: Kind::Number(n.into()), metadata: None }
    }

    /// A UTF-8 text value.
    #[must_use]
    pub fn text(s: impl Into<String>) -> Self {
        Self { kind: Kind::Text(Arc::from(s.into())), metadata: None }
    }

    /// An ordered array, preserving the order of `items`.
    #[must_use]
    pub fn array(items: Vec<Value>) -> Self {
        Self { kind: Kind::Array(Arc::new(items)), metadata: None }
    }

    /// An object preserving the insertion order of `entries`.
    #[must_use]
    pub fn object(entries: IndexMap<String, Value>) -> Self {
        Self { kind: Kind::Object(Arc::new(entries)), metadata: None }
    }

    /// A first-class error, optionally located.
    #[must_use]
    pub fn error(err: ErrorValue) -> Self {
        Self { kind: Kind::Error(Arc::new(err)), metadata: None }
    }

    /// Convenience constructor: an error at `location` with `kind`/`message`.
    #[must_use]
    pub fn error_at(
        location: Option<Location>,
        kind: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        let err = match location {
            Some(loc) => ErrorValue::at(loc, kind, message),
            None => ErrorValue::new(kind, message),
        };
        Self::error(err)
    }

    /// Attach (replacing any prior) metadata. Idempotent: applying the same
    /// metadata twice is equivalent to applying it once.
    #[must_use]
    pub fn with_metadata(mut self, metadata: Metadata) -> Self {
        self.metadata = Some(Arc::new(metadata));
        self
    }

    /// The attached metadata, if any.
    #[must_use]
    pub fn metadata(&self) -> Option<&Metadata> {
        self.metadata.as_deref()
    }

    /// Merge this value's metadata with `other`'s, producing a combined
    /// provenance usable for a value derived from both.
    #[must_use]
    pub fn merged_metadata(&self, other: &Value) -> Metadata {
        match (&self.metadata, &other.metadata) {
            (Some(a), Some(b)) => a.merge(b),
            (Some(a), None) => (**a).clone(),
            (None, Some(b)) => (**b).clone(),
            (None, None) => Metadata::default(),
        }
    }

    /// `true` iff this is `Undefined`.
    #[must_use]
    pub fn is_undefined(&self) -> bool {
        matches!(self.kind, Kind::Undefined)
    }

    /// `true` iff this is `Null`.
    #[must_use]
    pub fn is_null(&self) -> bool {
        matches!(self.kind, Kind::Null)
    }

    /// `true` iff this is a first-class `Error`.
    #[must_use]
    pub fn is_error(&self) -> bool {
        matches!(self.kind, Kind::Error(_))
    }

    /// `true` iff this is exactly boolean `true`.
    #[must_use]
    pub fn is_true(&self) -> bool {
        matches!(self.kind, Kind::Boolean(true))
    }

    /// The error payload, if this is an `Error` value.
    #[must_use]
    pub fn as_error(&self) -> Option<&ErrorValue> {
        match &self.kind {
            Kind::Error(e) => Some(e),
            _ => None,
        }
    }

    /// The boolean payload, if this is a `Boolean` value.
    #[must_use]
    pub fn as_bool(&self) -> Option<bool> {
        match self.kind {
            Kind::Boolean(b) => Some(b),
            _ => None,
        }
    }

    /// The decimal payload, if this is a `Number` value.
    #[must_use]
    pub fn as_number(&self) -> Option<Decimal> {
        match self.kind {
            Kind::Number(n) => Some(n),
            _ => None,
        }
    }

    /// The text payload, if this is a `Text` value.
    #[must_use]
    pub fn as_text(&self) -> Option<&str> {
        match &self.kind {
            Kind::Text(s) => Some(s),
            _ => None,
        }
    }

    /// The array payload, if this is an `Array` value.
    #[must_use]
    pub fn as_array(&self) -> Option<&[Value]> {
        match &self.kind {
            Kind::Array(a) => Some(a),
            _ => None,
        }
    }

    /// The object payload, if this is an `Object` value.
    #[must_use]
    pub fn as_object(&self) -> Option<&IndexMap<String, Value>> {
        match &self.kind {
            Kind::Object(o) => Some(o),
            _ => None,
        }
    }

    /// Convert an integer-valued `Number` into a `usize` index, or `None`
    /// if the value is not an integer (used by index/slice steps).
    #[must_use]
    pub fn as_index(&self) -> Option<i64> {
        let n = self.as_number()?;
        if n.fract().is_zero() {
            n.to_i64()
        } else {
            None
        }
    }

    /// Render to `serde_json::Value` for interop with the rest of the stack
    /// (YAML/JSON sources, telemetry, CLI output). `Undefined` and `Error`
    /// have no JSON representation and become `Null`/a tagged error object.
    #[must_use]
    pub fn to_json(&self) -> serde_json::Value {
        use serde_json::{Map, Value as J};
        match &self.kind {
            Kind::Undefined => J::Null,
            Kind::Null => J::Null,
            Kind::Boolean(b) => J::Bool(*b),
            Kind::Number(n) => serde_json::Number::from_f64(
                n.to_string().parse::<f64>().unwrap_or_default(),
            )
            .map(J::Number)
            .unwrap_or(J::Null),
            Kind::Text(s) => J::String(s.to_string()),
            Kind::Array(a) => J::Array(a.iter().map(Value::to_json).collect()),
            Kind::Object(o) => {
                let mut m = Map::new();
                for (k, v) in o.iter() {
                    m.insert(k.clone(), v.to_json());
                }
                J::Object(m)
            }
            Kind::Error(e) => {
                let mut m = Map::new();
                m.insert("error".into(), J::String(e.kind.clone()));
                m.insert("message".into(), J::String(e.message.clone()));
                J::Object(m)
            }
        }
    }

    /// Build a `Value` from a `serde_json::Value`, preserving object key order.
    #[must_use]
    pub fn from_json(json: &serde_json::Value) -> Self {
        match json {
            serde_json::Value::Null => Value::null(),
            serde_json::Value::Bool(b) => Value::boolean(*b),
            serde_json::Value::Number(n) => {
                let dec = n
                    .as_i64()
                    .map(Decimal::from)
                    .or_else(|| n.as_f64().and_then(Decimal::from_f64_retain))
                    .unwrap_or_default();
                Value::number(dec)
            }
            serde_json::Value::String(s) => Value::text(s.clone()),
            serde_json::Value::Array(items) => {
                Value::array(items.iter().map(Value::from_json).collect())
            }
            serde_json::Value::Object(map) => {
                let mut entries = IndexMap::with_capacity(map.len());
                for (k, v) in map {
                    entries.insert(k.clone(), Value::from_json(v));
                }
                Value::object(entries)
            }
        }
    }
}

/// Shared, zero-allocation singletons for the most common values.
pub mod constants {
    use super::Value;
    use once_cell::sync::Lazy;

    /// The distinguished absence value.
    pub static UNDEFINED: Lazy<Value> = Lazy::new(Value::undefined);
    /// JSON null.
    pub static NULL: Lazy<Value> = Lazy::new(Value::null);
    /// Boolean `true`.
    pub static TRUE: Lazy<Value> = Lazy::new(|| Value::boolean(true));
    /// Boolean `false`.
    pub static FALSE: Lazy<Value> = Lazy::new(|| Value::boolean(false));
    /// The empty array.
    pub static EMPTY_ARRAY: Lazy<Value> = Lazy::new(|| Value::array(Vec::new()));
    /// The empty object.
    pub static EMPTY_OBJECT: Lazy<Value> =
        Lazy::new(|| Value::object(indexmap::IndexMap::new()));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metadata::Location;

    #[test]
    fn metadata_is_idempotent() {
        let m = Metadata::from_location(Location::at("p.sapl", 1, 1));
        let v = Value::boolean(true).with_metadata(m.clone());
        let v2 = v.clone().with_metadata(m.clone());
        assert_eq!(v2.metadata(), v.metadata());
    }

    #[test]
    fn number_equality_ignores_scale() {
        assert_eq!(Value::number(Decimal::from(1)), Value::number(Decimal::new(10, 1)));
    }

    #[test]
    fn object_equality_ignores_key_order() {
        let mut a = IndexMap::new();
        a.insert("x".to_string(), Value::number(Decimal::from(1)));
        a.insert("y".to_string(), Value::number(Decimal::from(2)));
        let mut b = IndexMap::new();
        b.insert("y".to_string(), Value::number(Decimal::from(2)));
        b.insert("x".to_string(), Value::number(Decimal::from(1)));
        assert_eq!(Value::object(a), Value::object(b));
    }

    #[test]
    fn metadata_does_not_affect_equality() {
        let m = Metadata::from_location(Location::at("p.sapl", 1, 1));
        let a = Value::text("x");
        let b = Value::text("x").with_metadata(m);
        assert_eq!(a, b);
    }

    #[test]
    fn json_roundtrip_preserves_structure() {
        let mut entries = IndexMap::new();
        entries.insert("a".to_string(), Value::number(Decimal::from(42)));
        entries.insert("b".to_string(), Value::array(vec![Value::text("x"), Value::null()]));
        let v = Value::object(entries);
        let json = v.to_json();
        let back = Value::from_json(&json);
        assert_eq!(v, back);
    }

    proptest::proptest! {
        /// `v.withMetadata(m).withMetadata(m) == v.withMetadata(m)`, for any
        /// scalar value and any location-derived metadata.
        #[test]
        fn metadata_application_is_idempotent(
            text in ".*",
            document in ".*",
            line in 0u32..10_000,
            column in 0u32..10_000,
        ) {
            let m = Metadata::from_location(Location::at(document, line, column));
            let once = Value::text(text).with_metadata(m.clone());
            let twice = once.clone().with_metadata(m);
            assert_eq!(once.metadata(), twice.metadata());
        }

        /// `Value -> JSON -> Value` preserves structure for any boolean,
        /// number, or text leaf nested inside an array.
        #[test]
        fn json_roundtrip_preserves_array_of_scalars(
            numbers in proptest::collection::vec(-1_000_000i64..1_000_000, 0..8),
            text in ".*",
            flag: bool,
        ) {
            let mut items: Vec<Value> = numbers.into_iter().map(Decimal::from).map(Value::number).collect();
            items.push(Value::text(text));
            items.push(Value::boolean(flag));
            let v = Value::array(items);
            assert_eq!(v, Value::from_json(&v.to_json()));
        }
    }
}
