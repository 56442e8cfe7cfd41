//! PDP core primitives: the immutable value domain (Value), location/metadata
//! types, and id/timestamp helpers shared by every other `pdp-*` crate.

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod ids {
    //! Monotonic ids and trace ids, used to tag attribute records and audit entries.

    use std::sync::atomic::{AtomicU64, Ordering};
    use std::time::{SystemTime, UNIX_EPOCH};
    use uuid::Uuid;

    static NEXT_ID: AtomicU64 = AtomicU64::new(1);

    /// Generate a new monotonic identifier (starts at 1, process-wide).
    pub fn next_monotonic_id() -> u64 {
        NEXT_ID.fetch_add(1, Ordering::Relaxed)
    }

    /// Milliseconds since the UNIX epoch.
    pub fn now_ms() -> u64 {
        SystemTime::now().duration_since(UNIX_EPOCH).expect("system clock before epoch").as_millis()
            as u64
    }

    /// Opaque trace identifier (UUID v4 string), used to correlate a vote's
    /// contributing attribute retrievals.
    pub fn new_trace_id() -> String {
        Uuid::new_v4().to_string()
    }

}

pub mod metadata {
    //! Source location and provenance metadata attached to `Value`s.

    use serde::{Deserialize, Serialize};

    /// A source location (document + line/column), attached to errors and
    /// to values produced while evaluating an expression at that location.
    #[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
    pub struct Location {
        /// Document or policy name the location is within, if known.
        pub document: Option<String>,
        /// 1-based line number.
        pub line: Option<u32>,
        /// 1-based column number.
        pub column: Option<u32>,
    }

    impl Location {
        /// Construct a location for a given document and line/column.
        #[must_use]
        pub fn at(document: impl Into<String>, line: u32, column: u32) -> Self {
            Self { document: Some(document.into()), line: Some(line), column: Some(column) }
        }
    }

    /// Provenance metadata: every location an expression tree touched while
    /// producing a value, plus arbitrary trace tags (e.g. attribute record ids).
    #[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
    pub struct Metadata {
        /// Every location contributing to this value, in evaluation order.
        pub locations: Vec<Location>,
        /// Free-form trace tags (attribute invocation ids, rule names, ...).
        pub trace_tags: Vec<String>,
    }

    impl Metadata {
        /// Construct metadata from a single location.
        #[must_use]
        pub fn from_location(location: Location) -> Self {
            Self { locations: vec![location], trace_tags: Vec::new() }
        }

        /// Combine two provenances. Used when an operator merges metadata from
        /// more than one operand; order is left-then-right.
        #[must_use]
        pub fn merge(&self, other: &Metadata) -> Metadata {
            let mut locations = self.locations.clone();
            locations.extend(other.locations.iter().cloned());
            let mut trace_tags = self.trace_tags.clone();
            trace_tags.extend(other.trace_tags.iter().cloned());
            Metadata { locations, trace_tags }
        }
    }
}

pub mod value;

pub use metadata::{Location, Metadata};
pub use value::{ErrorValue, Value};
