//! The signed bundle archive format (spec §4.4.3, §6.4): build, parse, and
//! verify `.saplbundle` files — ZIP archives carrying a required `pdp.json`,
//! zero or more `*.sapl` documents, and an optional Ed25519-signed
//! `MANIFEST` entry.

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod bundle;
mod builder;
mod error;
mod manifest;
mod parser;

pub use bundle::Bundle;
pub use builder::BundleBuilder;
pub use error::BundleError;
pub use manifest::{Manifest, ManifestSignature};
pub use parser::BundleParser;
