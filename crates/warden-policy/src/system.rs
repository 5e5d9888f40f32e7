//! Built-in system rules.
//!
//! These are installed ahead of externally loaded policy on every reload, so
//! the platform's baseline guarantees hold regardless of what the policy
//! store contains: the system identity owns the security area, ordinary
//! users see their own records in the default data segment, nobody with just
//! the `user` role deletes security records, tenant admins administer their
//! own tenant, and the anonymous identity can reach the two onboarding
//! endpoints in the system tenant.

use std::collections::HashMap;
use std::sync::Arc;

use warden_core::{Rule, RuleEffect, SecurityUri, SecurityUriBody, SecurityUriHeader};

use crate::config::EngineConfig;

/// The administrative area the system identity is granted.
pub const SECURITY_AREA: &str = "security";

/// Filter fragment restricting records to the principal's own, in the
/// default data segment.
pub const OWN_RECORDS_FILTER: &str =
    "dataDomain.ownerId:${principalId}&&dataDomain.dataSegment:#0";

/// Filter fragment restricting records to the principal's tenant.
pub const OWN_TENANT_FILTER: &str = "dataDomain.tenantId:${pTenantId}";

fn add(map: &mut HashMap<String, Vec<Arc<Rule>>>, rule: Rule) {
    let identity = rule.security_uri.header().identity().to_string();
    map.entry(identity).or_default().push(Arc::new(rule));
}

/// Install every built-in rule into `map`, keyed by header identity.
pub(crate) fn install_system_rules(map: &mut HashMap<String, Vec<Arc<Rule>>>, config: &EngineConfig) {
    let system_body = SecurityUriBody::any()
        .with_realm(&config.system_realm)
        .with_org_ref_name(&config.system_org_ref_name)
        .with_account_number(&config.system_account_number)
        .with_tenant_id(&config.system_tenant_id)
        .with_owner_id(&config.system_user_id);

    // The system identity and the "system" role own the security area.
    add(
        map,
        Rule::builder(
            "system-any-action-in-security",
            SecurityUri::new(
                SecurityUriHeader::new(&config.system_user_id, SECURITY_AREA, "*", "*"),
                system_body.clone(),
            ),
            RuleEffect::Allow,
        )
        .description("the system identity can take any action within the security area")
        .priority(0)
        .final_rule(true)
        .build(),
    );
    add(
        map,
        Rule::builder(
            "system-role-any-action-in-security",
            SecurityUri::new(
                SecurityUriHeader::new("system", SECURITY_AREA, "*", "*"),
                system_body,
            ),
            RuleEffect::Allow,
        )
        .description("the system role can take any action within the security area")
        .priority(1)
        .final_rule(true)
        .build(),
    );

    // Any user may act on records they own in the default data segment. The
    // ownership check is the AND-filter fragment, not a hard match, so it
    // still participates in filter composition on read paths.
    add(
        map,
        Rule::builder(
            "user-owns-record-in-default-segment",
            SecurityUri::new(
                SecurityUriHeader::new("user", "*", "*", "*"),
                SecurityUriBody::any(),
            ),
            RuleEffect::Allow,
        )
        .description("users can act on their own records, limited to the default data segment")
        .and_filter_string(OWN_RECORDS_FILTER)
        .build(),
    );

    // Users never delete security records, whatever later policy says.
    add(
        map,
        Rule::builder(
            "user-no-delete-in-security",
            SecurityUri::new(
                SecurityUriHeader::new("user", SECURITY_AREA, "*", "delete"),
                SecurityUriBody::any(),
            ),
            RuleEffect::Deny,
        )
        .description("users cannot delete anything in the security area")
        .and_filter_string(OWN_RECORDS_FILTER)
        .final_rule(true)
        .build(),
    );

    // Tenant admins administer records of their own tenant.
    add(
        map,
        Rule::builder(
            "tenant-admin-own-tenant",
            SecurityUri::new(
                SecurityUriHeader::new("admin", "*", "*", "*"),
                SecurityUriBody::any(),
            ),
            RuleEffect::Allow,
        )
        .description("tenant admins can administer records within their own tenant")
        .and_filter_string(OWN_TENANT_FILTER)
        .final_rule(true)
        .build(),
    );

    // Anonymous onboarding actions, scoped to the system tenant.
    let anonymous_body = SecurityUriBody::any()
        .with_realm(&config.system_realm)
        .with_tenant_id(&config.system_tenant_id)
        .with_account_number(&config.system_account_number);
    add(
        map,
        Rule::builder(
            "anonymous-registration-request",
            SecurityUri::new(
                SecurityUriHeader::new(
                    &config.anonymous_user_id,
                    "onboarding",
                    "registrationRequest",
                    "create",
                ),
                anonymous_body.clone(),
            ),
            RuleEffect::Allow,
        )
        .description("anonymous callers may submit a registration request")
        .and_filter_string(OWN_TENANT_FILTER)
        .final_rule(true)
        .build(),
    );
    add(
        map,
        Rule::builder(
            "anonymous-contact-us",
            SecurityUri::new(
                SecurityUriHeader::new(&config.anonymous_user_id, "website", "contactus", "create"),
                anonymous_body,
            ),
            RuleEffect::Allow,
        )
        .description("anonymous callers may submit a contact-us message")
        .and_filter_string(OWN_TENANT_FILTER)
        .final_rule(true)
        .build(),
    );
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn system_rules_cover_the_expected_identities() {
        let mut map = HashMap::new();
        install_system_rules(&mut map, &EngineConfig::default());

        assert!(map.contains_key("system@system.com"));
        assert!(map.contains_key("system"));
        assert!(map.contains_key("admin"));
        assert!(map.contains_key("anonymous@system.com"));
        assert_eq!(map["user"].len(), 2);
    }

    #[test]
    fn user_deny_rule_is_final_and_scoped_to_security_deletes() {
        let mut map = HashMap::new();
        install_system_rules(&mut map, &EngineConfig::default());

        let deny = map["user"]
            .iter()
            .find(|r| r.effect == RuleEffect::Deny)
            .unwrap();
        assert!(deny.final_rule);
        assert_eq!(
            deny.security_uri.header().uri_string(),
            "user:security:*:delete"
        );
    }

    #[test]
    fn anonymous_rules_are_pinned_to_the_system_tenant() {
        let mut map = HashMap::new();
        install_system_rules(&mut map, &EngineConfig::default());

        for rule in &map["anonymous@system.com"] {
            assert_eq!(rule.security_uri.body().realm(), "system-com");
            assert_eq!(rule.security_uri.body().tenant_id(), "system.com");
            assert!(rule.final_rule);
        }
    }
}
