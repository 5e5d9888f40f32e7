//! Optional discrimination index over the rule base.
//!
//! A four-level trie over the header dimensions (identity, area, functional
//! domain, action). Each level holds an exact-match child map plus one
//! wildcard branch, so a rule wildcarded at any level stays reachable from
//! every concrete query at that level. The index only shrinks the candidate
//! set: every candidate is re-verified with the authoritative wildcard
//! matcher against the reconstructed full URI before it is accepted.
//!
//! The index is versioned and rebuilt wholesale whenever the backing rule
//! set changes; it is never patched in place.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use warden_core::{
    CaseSensitivity, PrincipalContext, ResourceContext, Rule, wildcard_match,
};

use crate::engine::identity_uri;

#[derive(Debug, Default)]
struct Node {
    exact: HashMap<String, Node>,
    wildcard: Option<Box<Node>>,
    /// Rules terminating at this path, sorted by priority ascending.
    rules: Vec<Arc<Rule>>,
}

impl Node {
    fn step(&mut self, key: &str) -> &mut Node {
        if key == "*" {
            self.wildcard.get_or_insert_with(Box::default)
        } else {
            self.exact.entry(key.to_string()).or_default()
        }
    }

    fn sort_recursively(&mut self) {
        self.rules.sort_by_key(|r| r.priority);
        if let Some(wildcard) = &mut self.wildcard {
            wildcard.sort_recursively();
        }
        for child in self.exact.values_mut() {
            child.sort_recursively();
        }
    }

    /// Children reachable for a concrete key: the exact branch if present,
    /// then the wildcard branch.
    fn children_for<'a>(&'a self, key: &str) -> impl Iterator<Item = &'a Node> + 'a {
        self.exact
            .get(key)
            .into_iter()
            .chain(self.wildcard.as_deref())
    }
}

/// A compiled snapshot of the rule base, keyed by header dimensions.
#[derive(Debug)]
pub struct RuleIndex {
    root: Node,
    version: u64,
}

impl RuleIndex {
    /// Build an index over `rules`, stamped with the rule-base version.
    #[must_use]
    pub fn build<I>(rules: I, version: u64) -> Self
    where
        I: IntoIterator<Item = Arc<Rule>>,
    {
        let mut root = Node::default();
        let mut indexed = 0usize;
        for rule in rules {
            let header = rule.security_uri.header();
            root.step(header.identity())
                .step(header.area())
                .step(header.functional_domain())
                .step(header.action())
                .rules
                .push(Arc::clone(&rule));
            indexed += 1;
        }
        root.sort_recursively();
        tracing::debug!(rules = indexed, version, "rule index built");
        Self { root, version }
    }

    #[must_use]
    pub fn version(&self) -> u64 {
        self.version
    }

    /// Collect the rules applicable to this principal/resource pair.
    ///
    /// Traverses both the exact and the wildcard branch at every level for
    /// each identity the principal carries, re-verifies each terminal rule
    /// with the canonical matcher, and returns the survivors in priority
    /// order.
    #[must_use]
    pub fn applicable_rules(
        &self,
        principal: &PrincipalContext,
        resource: &ResourceContext,
    ) -> Vec<Arc<Rule>> {
        let mut identities: Vec<&str> = Vec::with_capacity(principal.roles.len() + 1);
        identities.push(&principal.user_id);
        identities.extend(principal.roles.iter().map(String::as_str));

        let area = resource.area.to_lowercase();
        let domain = resource.functional_domain.to_lowercase();
        let action = resource.action.to_lowercase();

        let mut seen: HashSet<usize> = HashSet::new();
        let mut out: Vec<Arc<Rule>> = Vec::new();

        for identity in identities {
            let candidate = identity_uri(identity, principal, resource).uri_string();
            for id_node in self.root.children_for(&identity.to_lowercase()) {
                for area_node in id_node.children_for(&area) {
                    for domain_node in area_node.children_for(&domain) {
                        for action_node in domain_node.children_for(&action) {
                            for rule in &action_node.rules {
                                if !wildcard_match(
                                    &candidate,
                                    &rule.security_uri.uri_string(),
                                    CaseSensitivity::Insensitive,
                                ) {
                                    continue;
                                }
                                if seen.insert(Arc::as_ptr(rule) as usize) {
                                    out.push(Arc::clone(rule));
                                }
                            }
                        }
                    }
                }
            }
        }

        out.sort_by_key(|r| r.priority);
        out
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use warden_core::{DataDomain, RuleEffect, SecurityUri, SecurityUriBody, SecurityUriHeader};

    fn rule(name: &str, identity: &str, area: &str, action: &str, priority: i32) -> Arc<Rule> {
        Arc::new(
            Rule::builder(
                name,
                SecurityUri::new(
                    SecurityUriHeader::new(identity, area, "*", action),
                    SecurityUriBody::any(),
                ),
                RuleEffect::Allow,
            )
            .priority(priority)
            .build(),
        )
    }

    fn principal() -> PrincipalContext {
        PrincipalContext::builder(
            "alice",
            "acme-com",
            DataDomain::new("acme.com", "111", "acme.com", 0, "alice"),
        )
        .roles(["user"])
        .build()
    }

    #[test]
    fn wildcard_branches_stay_reachable_from_concrete_queries() {
        let index = RuleIndex::build(
            vec![
                rule("exact", "user", "sales", "view", 10),
                rule("any-area", "user", "*", "view", 10),
                rule("any-identity", "*", "sales", "view", 10),
                rule("other-area", "user", "billing", "view", 10),
            ],
            1,
        );

        let resource = ResourceContext::new("sales", "order", "view");
        let names: Vec<_> = index
            .applicable_rules(&principal(), &resource)
            .iter()
            .map(|r| r.name.clone())
            .collect();

        assert!(names.contains(&"exact".to_string()));
        assert!(names.contains(&"any-area".to_string()));
        assert!(names.contains(&"any-identity".to_string()));
        assert!(!names.contains(&"other-area".to_string()));
    }

    #[test]
    fn results_come_back_in_priority_order() {
        let index = RuleIndex::build(
            vec![
                rule("late", "user", "*", "*", 50),
                rule("early", "user", "*", "*", 1),
                rule("middle", "user", "sales", "*", 10),
            ],
            1,
        );

        let resource = ResourceContext::new("sales", "order", "view");
        let names: Vec<_> = index
            .applicable_rules(&principal(), &resource)
            .iter()
            .map(|r| r.name.clone())
            .collect();
        assert_eq!(names, vec!["early", "middle", "late"]);
    }

    #[test]
    fn candidates_failing_the_authoritative_matcher_are_dropped() {
        // header matches by trie dimensions but the body pins another tenant
        let body_pinned = Arc::new(
            Rule::builder(
                "other-tenant",
                SecurityUri::new(
                    SecurityUriHeader::new("user", "*", "*", "*"),
                    SecurityUriBody::any().with_tenant_id("someone-else.com"),
                ),
                RuleEffect::Allow,
            )
            .build(),
        );
        let index = RuleIndex::build(vec![body_pinned], 1);

        let resource = ResourceContext::new("sales", "order", "view");
        assert!(index.applicable_rules(&principal(), &resource).is_empty());
    }

    #[test]
    fn duplicate_hits_across_identities_collapse() {
        // reachable via both the userId and the role path
        let shared = rule("any-identity", "*", "*", "*", 10);
        let index = RuleIndex::build(vec![shared], 1);

        let resource = ResourceContext::new("sales", "order", "view");
        assert_eq!(index.applicable_rules(&principal(), &resource).len(), 1);
    }

    #[test]
    fn index_is_stamped_with_a_version() {
        let index = RuleIndex::build(Vec::new(), 42);
        assert_eq!(index.version(), 42);
    }
}
