//! Configuration sources (spec §4.4): directory, multi-directory, and
//! bundle (local/remote) sources that publish [`PdpConfiguration`] records
//! to a [`VoterSource`] sink.

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod configuration;
pub mod configuration_id;
pub mod directory;
pub mod error;
pub mod local_bundle;
pub mod multi_directory;
pub mod pdp_json;
pub mod remote_bundle;
pub mod security;

pub use configuration::{is_valid_pdp_id, PdpConfiguration, SaplDocument, VoterSource};
pub use configuration_id::configuration_id;
pub use directory::DirectorySource;
pub use error::{ConfigError, FatalError};
pub use local_bundle::LocalBundleSource;
pub use multi_directory::MultiDirectorySource;
pub use pdp_json::PdpJson;
pub use remote_bundle::{FetchMode, RemoteBundleConfig, RemoteBundleSource};
pub use security::BundleSecurityPolicy;
