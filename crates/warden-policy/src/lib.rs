//! # warden-policy
//!
//! The authorization core of the Warden platform: rule storage, wildcard
//! matching, priority/short-circuit evaluation, script-conditioned rules and
//! filter composition.
//!
//! Given a principal (user identity plus roles plus tenant/org/account
//! scope) and a requested resource/action, [`PolicyRuleEngine`] decides
//! ALLOW or DENY with a full audit trail, and for read operations composes
//! the data-filtering predicates restricting which records the principal may
//! see.
//!
//! ## Modules
//!
//! - [`engine`] - the rule store, evaluation algorithm and filter composer
//! - [`config`] - engine configuration and script sandbox limits
//! - [`system`] - built-in system rules installed ahead of loaded policy
//! - [`index`] - optional discrimination index over the rule base
//! - [`filters`] - query predicates, variable bundle and the parser seam
//! - [`script`] - condition-script evaluation (sandboxed Rhai by default)
//! - [`source`] - the persisted-policy source consumed on reload
//! - [`resolver`] - access-list resolver SPI
//! - [`response`] - audit artifacts produced per evaluation
//! - [`error`] - error taxonomy
//!
//! ## Example
//!
//! ```
//! use warden_core::{DataDomain, PrincipalContext, ResourceContext, RuleEffect};
//! use warden_policy::{EngineConfig, PolicyRuleEngine};
//!
//! let engine = PolicyRuleEngine::new(EngineConfig::default());
//!
//! let principal = PrincipalContext::builder(
//!     "alice@acme.com",
//!     "acme-com",
//!     DataDomain::new("acme.com", "1234567890", "acme.com", 0, "alice@acme.com"),
//! )
//! .roles(["user"])
//! .build();
//! let resource = ResourceContext::new("sales", "order", "view");
//!
//! let response = engine.check_rules(&principal, &resource);
//! assert_eq!(response.final_effect, RuleEffect::Allow);
//! ```

pub mod config;
pub mod engine;
pub mod error;
pub mod filters;
pub mod index;
pub mod resolver;
pub mod response;
pub mod script;
pub mod source;
pub mod system;

pub use config::{EngineConfig, ScriptConfig};
pub use engine::{EngineStats, PolicyRuleEngine};
pub use error::{PolicyError, PolicyResult};
pub use filters::{ClauseFilterParser, FilterParser, FilterValue, QueryFilter, VariableBundle};
pub use index::RuleIndex;
pub use resolver::AccessListResolver;
pub use response::{
    MatchEvent, RuleDeterminedEffect, RuleResult, SecurityCheckResponse, string_difference,
};
pub use script::{RhaiScriptEvaluator, ScriptEvaluator};
pub use source::{InMemoryPolicySource, PolicyDocument, PolicySource};
