//! Principal and resource contexts.
//!
//! These are supplied by the calling layer per request: who is asking
//! ([`PrincipalContext`]) and what they are asking to do
//! ([`ResourceContext`]). Both are read-only from the engine's perspective
//! and are bound as structured values into condition scripts.

use serde::{Deserialize, Serialize};

/// The tenancy coordinates a principal operates in.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DataDomain {
    pub org_ref_name: String,
    pub account_num: String,
    pub tenant_id: String,
    /// Tenant-internal partition used for fine-grained ownership scoping.
    pub data_segment: i32,
    pub owner_id: String,
}

impl DataDomain {
    #[must_use]
    pub fn new(
        org_ref_name: &str,
        account_num: &str,
        tenant_id: &str,
        data_segment: i32,
        owner_id: &str,
    ) -> Self {
        Self {
            org_ref_name: org_ref_name.to_string(),
            account_num: account_num.to_string(),
            tenant_id: tenant_id.to_string(),
            data_segment,
            owner_id: owner_id.to_string(),
        }
    }
}

/// The authenticated caller: user id, roles in declaration order, home realm
/// and data domain.
///
/// Role order matters: candidate identity URIs are built roles-first in this
/// order, and equal-priority rules keep their accumulation order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PrincipalContext {
    pub user_id: String,
    pub roles: Vec<String>,
    pub default_realm: String,
    pub data_domain: DataDomain,
    /// The scope under which this context was established.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scope: Option<String>,
}

impl PrincipalContext {
    /// Start building a principal from its required parts.
    #[must_use]
    pub fn builder(
        user_id: &str,
        default_realm: &str,
        data_domain: DataDomain,
    ) -> PrincipalContextBuilder {
        PrincipalContextBuilder {
            principal: PrincipalContext {
                user_id: user_id.to_string(),
                roles: Vec::new(),
                default_realm: default_realm.to_string(),
                data_domain,
                scope: None,
            },
        }
    }
}

/// Builder for [`PrincipalContext`].
#[derive(Debug)]
pub struct PrincipalContextBuilder {
    principal: PrincipalContext,
}

impl PrincipalContextBuilder {
    #[must_use]
    pub fn roles<I, S>(mut self, roles: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.principal.roles = roles.into_iter().map(Into::into).collect();
        self
    }

    #[must_use]
    pub fn scope(mut self, scope: &str) -> Self {
        self.principal.scope = Some(scope.to_string());
        self
    }

    #[must_use]
    pub fn build(self) -> PrincipalContext {
        self.principal
    }
}

/// The target of the request: area, functional domain, action, and an
/// optional concrete resource id / realm override.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceContext {
    pub area: String,
    pub functional_domain: String,
    pub action: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resource_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub realm: Option<String>,
}

impl ResourceContext {
    #[must_use]
    pub fn new(area: &str, functional_domain: &str, action: &str) -> Self {
        Self {
            area: area.to_string(),
            functional_domain: functional_domain.to_string(),
            action: action.to_string(),
            resource_id: None,
            realm: None,
        }
    }

    #[must_use]
    pub fn with_resource_id(mut self, resource_id: &str) -> Self {
        self.resource_id = Some(resource_id.to_string());
        self
    }

    #[must_use]
    pub fn with_realm(mut self, realm: &str) -> Self {
        self.realm = Some(realm.to_string());
        self
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn principal_builder_keeps_role_order() {
        let principal = PrincipalContext::builder(
            "alice@acme.com",
            "acme-com",
            DataDomain::new("acme.com", "111", "acme.com", 0, "alice@acme.com"),
        )
        .roles(["user", "auditor", "user"])
        .build();
        assert_eq!(principal.roles, vec!["user", "auditor", "user"]);
        assert_eq!(principal.default_realm, "acme-com");
        assert!(principal.scope.is_none());
    }

    #[test]
    fn resource_context_serializes_camel_case() {
        let resource = ResourceContext::new("sales", "order", "view").with_resource_id("ord-1");
        let json = serde_json::to_value(&resource).unwrap();
        assert_eq!(json["functionalDomain"], "order");
        assert_eq!(json["resourceId"], "ord-1");
        assert!(json.get("realm").is_none());
    }

    #[test]
    fn principal_round_trips_through_json() {
        let principal = PrincipalContext::builder(
            "alice@acme.com",
            "acme-com",
            DataDomain::new("acme.com", "111", "acme.com", 2, "alice@acme.com"),
        )
        .roles(["user"])
        .scope("interactive")
        .build();

        let json = serde_json::to_string(&principal).unwrap();
        let back: PrincipalContext = serde_json::from_str(&json).unwrap();
        assert_eq!(back, principal);
        assert_eq!(back.data_domain.data_segment, 2);
    }
}
