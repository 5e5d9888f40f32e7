//! # warden-core
//!
//! Core value types for the Warden policy rule engine:
//!
//! - [`uri`] - the SecurityURI match key (header, body, canonical string form)
//! - [`wildcard`] - glob matching over canonical URI strings
//! - [`rule`] - the policy rule model (effect, priority, scripts, filter fragments)
//! - [`context`] - principal and resource contexts supplied per request
//!
//! These types carry no behavior beyond construction, canonicalization and
//! matching; the evaluation engine lives in `warden-policy`.

pub mod context;
pub mod rule;
pub mod uri;
pub mod wildcard;

pub use context::{DataDomain, PrincipalContext, PrincipalContextBuilder, ResourceContext};
pub use rule::{DEFAULT_PRIORITY, FilterJoinOp, Rule, RuleBuilder, RuleEffect};
pub use uri::{ANY, SecurityUri, SecurityUriBody, SecurityUriHeader};
pub use wildcard::{CaseSensitivity, wildcard_match};
