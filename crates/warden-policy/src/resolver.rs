//! Access-list resolver SPI.
//!
//! Resolvers contribute externally computed collections (for example the set
//! of record ids reachable over a graph edge) into the filter-fragment
//! variable bundle. Zero or more may be registered with the engine; each
//! contributes one named variable. A failing resolver is logged and skipped,
//! never fatal to composition.

use warden_core::{PrincipalContext, ResourceContext};

use crate::error::PolicyResult;

/// A pluggable contributor of one named collection.
pub trait AccessListResolver: Send + Sync {
    /// The variable name this resolver contributes under.
    fn key(&self) -> &str;

    /// Whether this resolver applies to the given request and target type.
    fn supports(
        &self,
        principal: &PrincipalContext,
        resource: &ResourceContext,
        target: &str,
    ) -> bool;

    /// Compute the collection. The value is typically a JSON array of ids.
    ///
    /// # Errors
    ///
    /// Implementations may fail; the engine logs and continues without the
    /// contribution.
    fn resolve(
        &self,
        principal: &PrincipalContext,
        resource: &ResourceContext,
        target: &str,
    ) -> PolicyResult<serde_json::Value>;
}
