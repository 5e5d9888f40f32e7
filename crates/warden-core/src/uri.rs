//! The SecurityURI match key.
//!
//! A rule carries a `SecurityUri` *pattern*; evaluation synthesizes one
//! concrete `SecurityUri` per identity the principal holds. Both sides are
//! rendered to a canonical colon-joined string and compared as a whole by the
//! wildcard matcher.
//!
//! The canonical form is
//! `identity:area:functionalDomain:action|realm:orgRefName:accountNumber:tenantId:dataSegment:ownerId:resourceId`
//! with every segment lower-cased. Matching operates on this whole string, so
//! a wildcard in one segment can span into the next; this is intentional and
//! must not be "fixed" by per-segment comparison.

use serde::{Deserialize, Serialize};

/// The wildcard segment value: matches anything.
pub const ANY: &str = "*";

fn lower(value: &str) -> String {
    value.to_lowercase()
}

// =============================================================================
// Header
// =============================================================================

/// The matching half of a [`SecurityUri`]: who is acting on what.
///
/// `identity` is either a concrete user id or a role name; `area` groups
/// functional domains (it usually corresponds to the first segment of a REST
/// path); `action` is the operation being attempted. Every field may be the
/// wildcard `*`.
///
/// All segments are lower-cased at construction so the canonical string form
/// is stable.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", from = "HeaderParts")]
pub struct SecurityUriHeader {
    identity: String,
    area: String,
    functional_domain: String,
    action: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct HeaderParts {
    identity: String,
    area: String,
    functional_domain: String,
    action: String,
}

impl From<HeaderParts> for SecurityUriHeader {
    fn from(parts: HeaderParts) -> Self {
        Self::new(
            &parts.identity,
            &parts.area,
            &parts.functional_domain,
            &parts.action,
        )
    }
}

impl Default for SecurityUriHeader {
    fn default() -> Self {
        Self::any()
    }
}

impl SecurityUriHeader {
    /// Create a header; every segment is lower-cased.
    #[must_use]
    pub fn new(identity: &str, area: &str, functional_domain: &str, action: &str) -> Self {
        Self {
            identity: lower(identity),
            area: lower(area),
            functional_domain: lower(functional_domain),
            action: lower(action),
        }
    }

    /// A header that matches anything: all segments wildcarded.
    #[must_use]
    pub fn any() -> Self {
        Self {
            identity: ANY.to_string(),
            area: ANY.to_string(),
            functional_domain: ANY.to_string(),
            action: ANY.to_string(),
        }
    }

    #[must_use]
    pub fn identity(&self) -> &str {
        &self.identity
    }

    #[must_use]
    pub fn area(&self) -> &str {
        &self.area
    }

    #[must_use]
    pub fn functional_domain(&self) -> &str {
        &self.functional_domain
    }

    #[must_use]
    pub fn action(&self) -> &str {
        &self.action
    }

    /// Rebuild with a different identity.
    #[must_use]
    pub fn with_identity(mut self, identity: &str) -> Self {
        self.identity = lower(identity);
        self
    }

    /// Rebuild with a different area.
    #[must_use]
    pub fn with_area(mut self, area: &str) -> Self {
        self.area = lower(area);
        self
    }

    /// Rebuild with a different functional domain.
    #[must_use]
    pub fn with_functional_domain(mut self, functional_domain: &str) -> Self {
        self.functional_domain = lower(functional_domain);
        self
    }

    /// Rebuild with a different action.
    #[must_use]
    pub fn with_action(mut self, action: &str) -> Self {
        self.action = lower(action);
        self
    }

    /// Canonical colon-joined form, e.g. `user:security:userprofile:view`.
    #[must_use]
    pub fn uri_string(&self) -> String {
        format!(
            "{}:{}:{}:{}",
            self.identity, self.area, self.functional_domain, self.action
        )
    }
}

impl std::fmt::Display for SecurityUriHeader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.uri_string())
    }
}

// =============================================================================
// Body
// =============================================================================

/// The scoping half of a [`SecurityUri`]: which records the rule applies to.
///
/// Once a rule matches by header, the body narrows the tenancy scope: realm,
/// organization, account, tenant, data segment, owner, and optionally a
/// single resource id. Every field may be the wildcard `*`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", from = "BodyParts")]
pub struct SecurityUriBody {
    realm: String,
    org_ref_name: String,
    account_number: String,
    tenant_id: String,
    data_segment: String,
    owner_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    resource_id: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct BodyParts {
    realm: String,
    org_ref_name: String,
    account_number: String,
    tenant_id: String,
    data_segment: String,
    owner_id: String,
    #[serde(default)]
    resource_id: Option<String>,
}

impl From<BodyParts> for SecurityUriBody {
    fn from(parts: BodyParts) -> Self {
        let mut body = SecurityUriBody {
            realm: lower(&parts.realm),
            org_ref_name: lower(&parts.org_ref_name),
            account_number: lower(&parts.account_number),
            tenant_id: lower(&parts.tenant_id),
            data_segment: lower(&parts.data_segment),
            owner_id: lower(&parts.owner_id),
            resource_id: None,
        };
        if let Some(id) = parts.resource_id {
            body.resource_id = Some(lower(&id));
        }
        body
    }
}

impl Default for SecurityUriBody {
    fn default() -> Self {
        Self::any()
    }
}

impl SecurityUriBody {
    /// A body that matches any scope: all segments wildcarded, no resource id.
    #[must_use]
    pub fn any() -> Self {
        Self {
            realm: ANY.to_string(),
            org_ref_name: ANY.to_string(),
            account_number: ANY.to_string(),
            tenant_id: ANY.to_string(),
            data_segment: ANY.to_string(),
            owner_id: ANY.to_string(),
            resource_id: None,
        }
    }

    #[must_use]
    pub fn realm(&self) -> &str {
        &self.realm
    }

    #[must_use]
    pub fn org_ref_name(&self) -> &str {
        &self.org_ref_name
    }

    #[must_use]
    pub fn account_number(&self) -> &str {
        &self.account_number
    }

    #[must_use]
    pub fn tenant_id(&self) -> &str {
        &self.tenant_id
    }

    #[must_use]
    pub fn data_segment(&self) -> &str {
        &self.data_segment
    }

    #[must_use]
    pub fn owner_id(&self) -> &str {
        &self.owner_id
    }

    #[must_use]
    pub fn resource_id(&self) -> Option<&str> {
        self.resource_id.as_deref()
    }

    #[must_use]
    pub fn with_realm(mut self, realm: &str) -> Self {
        self.realm = lower(realm);
        self
    }

    #[must_use]
    pub fn with_org_ref_name(mut self, org_ref_name: &str) -> Self {
        self.org_ref_name = lower(org_ref_name);
        self
    }

    #[must_use]
    pub fn with_account_number(mut self, account_number: &str) -> Self {
        self.account_number = lower(account_number);
        self
    }

    #[must_use]
    pub fn with_tenant_id(mut self, tenant_id: &str) -> Self {
        self.tenant_id = lower(tenant_id);
        self
    }

    #[must_use]
    pub fn with_data_segment(mut self, data_segment: &str) -> Self {
        self.data_segment = lower(data_segment);
        self
    }

    #[must_use]
    pub fn with_owner_id(mut self, owner_id: &str) -> Self {
        self.owner_id = lower(owner_id);
        self
    }

    #[must_use]
    pub fn with_resource_id(mut self, resource_id: &str) -> Self {
        self.resource_id = Some(lower(resource_id));
        self
    }

    /// Canonical colon-joined form; a missing resource id renders as `*`.
    #[must_use]
    pub fn uri_string(&self) -> String {
        format!(
            "{}:{}:{}:{}:{}:{}:{}",
            self.realm,
            self.org_ref_name,
            self.account_number,
            self.tenant_id,
            self.data_segment,
            self.owner_id,
            self.resource_id.as_deref().unwrap_or(ANY)
        )
    }
}

impl std::fmt::Display for SecurityUriBody {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.uri_string())
    }
}

// =============================================================================
// Full URI
// =============================================================================

/// The compound match key: header and body joined by `|`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SecurityUri {
    header: SecurityUriHeader,
    body: SecurityUriBody,
}

impl SecurityUri {
    #[must_use]
    pub fn new(header: SecurityUriHeader, body: SecurityUriBody) -> Self {
        Self { header, body }
    }

    #[must_use]
    pub fn header(&self) -> &SecurityUriHeader {
        &self.header
    }

    #[must_use]
    pub fn body(&self) -> &SecurityUriBody {
        &self.body
    }

    /// The unit of comparison for the wildcard matcher.
    #[must_use]
    pub fn uri_string(&self) -> String {
        format!("{}|{}", self.header.uri_string(), self.body.uri_string())
    }
}

impl std::fmt::Display for SecurityUri {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.uri_string())
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn header_lowercases_all_segments() {
        let header = SecurityUriHeader::new("Alice@Example.COM", "Security", "UserProfile", "VIEW");
        assert_eq!(
            header.uri_string(),
            "alice@example.com:security:userprofile:view"
        );
    }

    #[test]
    fn default_header_and_body_are_fully_wildcarded() {
        let uri = SecurityUri::new(SecurityUriHeader::any(), SecurityUriBody::any());
        assert_eq!(uri.uri_string(), "*:*:*:*|*:*:*:*:*:*:*");
    }

    #[test]
    fn body_renders_missing_resource_id_as_wildcard() {
        let body = SecurityUriBody::any()
            .with_realm("acme-com")
            .with_tenant_id("acme.com")
            .with_owner_id("alice");
        assert_eq!(body.uri_string(), "acme-com:*:*:acme.com:*:alice:*");

        let with_id = body.with_resource_id("ORDER-17");
        assert_eq!(with_id.uri_string(), "acme-com:*:*:acme.com:*:alice:order-17");
    }

    #[test]
    fn clone_then_rebuild_does_not_touch_the_original() {
        let base = SecurityUriHeader::new("user", "*", "*", "*");
        let narrowed = base.clone().with_area("Security").with_action("DELETE");
        assert_eq!(base.uri_string(), "user:*:*:*");
        assert_eq!(narrowed.uri_string(), "user:security:*:delete");
    }

    #[test]
    fn canonical_string_is_order_stable() {
        let uri = SecurityUri::new(
            SecurityUriHeader::new("user", "sales", "order", "view"),
            SecurityUriBody::any()
                .with_realm("acme-com")
                .with_org_ref_name("acme.com")
                .with_account_number("1234567890")
                .with_tenant_id("acme.com")
                .with_data_segment("0")
                .with_owner_id("alice"),
        );
        assert_eq!(
            uri.uri_string(),
            "user:sales:order:view|acme-com:acme.com:1234567890:acme.com:0:alice:*"
        );
    }

    #[test]
    fn deserialization_normalizes_case() {
        let json = r#"{
            "identity": "ADMIN",
            "area": "Sales",
            "functionalDomain": "Order",
            "action": "View"
        }"#;
        let header: SecurityUriHeader = serde_json::from_str(json).unwrap();
        assert_eq!(header.uri_string(), "admin:sales:order:view");
    }
}
