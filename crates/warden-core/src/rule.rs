//! Policy rules.
//!
//! A rule is a named, immutable policy unit: a [`SecurityUri`] pattern, an
//! effect, a priority (lower evaluates earlier), a final flag that stops
//! evaluation on match, optional pre/postcondition scripts, and optional
//! AND/OR filter fragments composed into data-filtering predicates for read
//! paths.

use serde::{Deserialize, Serialize};

use crate::uri::SecurityUri;

/// Priority assigned when a rule does not specify one.
pub const DEFAULT_PRIORITY: i32 = 10;

/// The outcome a rule contributes when it applies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum RuleEffect {
    Allow,
    Deny,
}

/// How a rule's AND and OR filter fragments are joined when both are present.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum FilterJoinOp {
    And,
    Or,
}

/// A single policy rule. Build one with [`Rule::builder`].
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Rule {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// The pattern this rule is matched by; may contain wildcards anywhere.
    pub security_uri: SecurityUri,
    /// Boolean expression evaluated before anything else on a match; a false
    /// result makes the rule NOT_APPLICABLE.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub precondition_script: Option<String>,
    /// Boolean expression evaluated after the match; a false result makes
    /// the rule NOT_APPLICABLE for that comparison.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub postcondition_script: Option<String>,
    /// Filter fragment contributed to the AND group during composition.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub and_filter_string: Option<String>,
    /// Filter fragment contributed to the OR group during composition.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub or_filter_string: Option<String>,
    /// Join operator used when both fragments are present; defaults to AND.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub join_op: Option<FilterJoinOp>,
    pub effect: RuleEffect,
    /// Lower values evaluate earlier.
    #[serde(default = "default_priority")]
    pub priority: i32,
    /// A matching final rule stops evaluation entirely.
    #[serde(default)]
    pub final_rule: bool,
}

fn default_priority() -> i32 {
    DEFAULT_PRIORITY
}

impl Rule {
    /// Start building a rule with the required fields.
    #[must_use]
    pub fn builder(name: &str, security_uri: SecurityUri, effect: RuleEffect) -> RuleBuilder {
        RuleBuilder {
            rule: Rule {
                name: name.to_string(),
                description: None,
                security_uri,
                precondition_script: None,
                postcondition_script: None,
                and_filter_string: None,
                or_filter_string: None,
                join_op: None,
                effect,
                priority: DEFAULT_PRIORITY,
                final_rule: false,
            },
        }
    }

    /// The join operator, defaulted.
    #[must_use]
    pub fn effective_join_op(&self) -> FilterJoinOp {
        self.join_op.unwrap_or(FilterJoinOp::And)
    }
}

/// Builder for [`Rule`].
#[derive(Debug)]
pub struct RuleBuilder {
    rule: Rule,
}

impl RuleBuilder {
    #[must_use]
    pub fn description(mut self, description: &str) -> Self {
        self.rule.description = Some(description.to_string());
        self
    }

    #[must_use]
    pub fn precondition_script(mut self, script: &str) -> Self {
        self.rule.precondition_script = Some(script.to_string());
        self
    }

    #[must_use]
    pub fn postcondition_script(mut self, script: &str) -> Self {
        self.rule.postcondition_script = Some(script.to_string());
        self
    }

    #[must_use]
    pub fn and_filter_string(mut self, fragment: &str) -> Self {
        self.rule.and_filter_string = Some(fragment.to_string());
        self
    }

    #[must_use]
    pub fn or_filter_string(mut self, fragment: &str) -> Self {
        self.rule.or_filter_string = Some(fragment.to_string());
        self
    }

    #[must_use]
    pub fn join_op(mut self, op: FilterJoinOp) -> Self {
        self.rule.join_op = Some(op);
        self
    }

    #[must_use]
    pub fn priority(mut self, priority: i32) -> Self {
        self.rule.priority = priority;
        self
    }

    #[must_use]
    pub fn final_rule(mut self, final_rule: bool) -> Self {
        self.rule.final_rule = final_rule;
        self
    }

    #[must_use]
    pub fn build(self) -> Rule {
        self.rule
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::uri::{SecurityUri, SecurityUriBody, SecurityUriHeader};

    fn any_uri() -> SecurityUri {
        SecurityUri::new(SecurityUriHeader::any(), SecurityUriBody::any())
    }

    #[test]
    fn builder_applies_defaults() {
        let rule = Rule::builder("allow-anything", any_uri(), RuleEffect::Allow).build();
        assert_eq!(rule.priority, DEFAULT_PRIORITY);
        assert!(!rule.final_rule);
        assert!(rule.postcondition_script.is_none());
        assert_eq!(rule.effective_join_op(), FilterJoinOp::And);
    }

    #[test]
    fn serde_uses_wire_names() {
        let rule = Rule::builder("owner-scope", any_uri(), RuleEffect::Deny)
            .and_filter_string("dataDomain.ownerId:${principalId}")
            .join_op(FilterJoinOp::Or)
            .priority(5)
            .final_rule(true)
            .build();
        let json = serde_json::to_value(&rule).unwrap();
        assert_eq!(json["effect"], "DENY");
        assert_eq!(json["joinOp"], "OR");
        assert_eq!(json["finalRule"], true);
        assert_eq!(json["andFilterString"], "dataDomain.ownerId:${principalId}");

        let back: Rule = serde_json::from_value(json).unwrap();
        assert_eq!(back.priority, 5);
        assert_eq!(back.effect, RuleEffect::Deny);
    }

    #[test]
    fn priority_defaults_when_absent_from_document() {
        let json = serde_json::json!({
            "name": "from-storage",
            "securityUri": {
                "header": {"identity": "user", "area": "*", "functionalDomain": "*", "action": "*"},
                "body": {
                    "realm": "*", "orgRefName": "*", "accountNumber": "*",
                    "tenantId": "*", "dataSegment": "*", "ownerId": "*"
                }
            },
            "effect": "ALLOW"
        });
        let rule: Rule = serde_json::from_value(json).unwrap();
        assert_eq!(rule.priority, DEFAULT_PRIORITY);
        assert!(!rule.final_rule);
    }
}
