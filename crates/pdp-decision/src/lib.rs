//! The decision point (spec §4.5): the process-wide `pdpId -> voter tree`
//! registry, an external-compiler collaborator interface, and `decide`, a
//! reactive stream of authorization decisions.

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod compiler;
pub mod decision_point;
pub mod error;
pub mod interceptor;
pub mod subscription;
pub mod voter_source;

pub use compiler::DocumentCompiler;
pub use decision_point::DecisionPoint;
pub use error::{CompileError, DecisionError};
pub use interceptor::{InterceptorRegistry, VoteInterceptor};
pub use subscription::{AuthorizationDecision, AuthorizationSubscription};
pub use voter_source::{CompiledConfiguration, PdpVoterSource};
