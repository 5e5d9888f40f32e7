//! Audit artifacts produced by an evaluation.
//!
//! A [`SecurityCheckResponse`] is created fresh per `check_rules` call and
//! records not just the decision but how it was reached: every rule
//! considered, every rule x identity-URI comparison attempted (with a string
//! diff for the misses), and the expanded candidate URIs.

use std::sync::Arc;

use serde::Serialize;

use warden_core::{PrincipalContext, ResourceContext, Rule, RuleEffect, SecurityUri};

/// The effect a matched rule actually contributed.
///
/// `NotApplicable` means the rule matched by URI but a condition script (or a
/// failed script, which is treated the same way) withdrew it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RuleDeterminedEffect {
    Allow,
    Deny,
    NotApplicable,
}

impl From<RuleEffect> for RuleDeterminedEffect {
    fn from(effect: RuleEffect) -> Self {
        match effect {
            RuleEffect::Allow => Self::Allow,
            RuleEffect::Deny => Self::Deny,
        }
    }
}

/// A rule that matched, with the effect it was determined to contribute.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RuleResult {
    pub rule: Arc<Rule>,
    pub determined_effect: RuleDeterminedEffect,
}

/// One rule x identity-URI comparison, matched or not.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MatchEvent {
    /// Canonical string of the candidate identity URI.
    pub principal_uri: String,
    /// Canonical string of the rule's pattern URI.
    pub rule_uri: String,
    pub rule_name: String,
    pub matched: bool,
    /// Remainder of the rule URI from the first point of difference; empty
    /// when the strings are equal.
    pub difference: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pre_script: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pre_script_result: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub post_script: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub post_script_result: Option<bool>,
}

impl MatchEvent {
    pub(crate) fn new(principal_uri: &str, rule_uri: &str, rule_name: &str, matched: bool) -> Self {
        Self {
            principal_uri: principal_uri.to_string(),
            rule_uri: rule_uri.to_string(),
            rule_name: rule_name.to_string(),
            matched,
            difference: string_difference(principal_uri, rule_uri),
            pre_script: None,
            pre_script_result: None,
            post_script: None,
            post_script_result: None,
        }
    }
}

/// The full audit trail of one authorization decision.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SecurityCheckResponse {
    pub principal: PrincipalContext,
    pub resource: ResourceContext,
    /// The decision. Starts at the caller-supplied default and is overwritten
    /// by each applicable rule in evaluation order.
    pub final_effect: RuleEffect,
    /// Every rule considered, in evaluation order.
    pub evaluated_rules: Vec<Arc<Rule>>,
    /// Rules that matched, with their determined effects.
    pub matched_rule_results: Vec<RuleResult>,
    /// Every comparison attempted.
    pub match_events: Vec<MatchEvent>,
    /// The candidate identity URIs the principal expanded to.
    pub applicable_uris: Vec<SecurityUri>,
}

impl SecurityCheckResponse {
    pub(crate) fn new(
        principal: PrincipalContext,
        resource: ResourceContext,
        default_effect: RuleEffect,
    ) -> Self {
        Self {
            principal,
            resource,
            final_effect: default_effect,
            evaluated_rules: Vec::new(),
            matched_rule_results: Vec::new(),
            match_events: Vec::new(),
            applicable_uris: Vec::new(),
        }
    }
}

/// The remainder of `second` starting where it first differs from `first`;
/// empty when `second` adds nothing.
#[must_use]
pub fn string_difference(first: &str, second: &str) -> String {
    let mut a = first.chars();
    let mut b = second.char_indices();
    loop {
        match (a.next(), b.next()) {
            (Some(x), Some((i, y))) => {
                if x != y {
                    return second[i..].to_string();
                }
            }
            (None, Some((i, _))) => return second[i..].to_string(),
            (_, None) => return String::new(),
        }
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn string_difference_returns_tail_of_second() {
        assert_eq!(string_difference("abc", "abxyz"), "xyz");
        assert_eq!(string_difference("ab", "abcde"), "cde");
        assert_eq!(string_difference("same", "same"), "");
        assert_eq!(string_difference("longer", "long"), "");
        assert_eq!(string_difference("", "whole"), "whole");
    }

    #[test]
    fn determined_effect_mirrors_rule_effect() {
        assert_eq!(
            RuleDeterminedEffect::from(RuleEffect::Allow),
            RuleDeterminedEffect::Allow
        );
        assert_eq!(
            RuleDeterminedEffect::from(RuleEffect::Deny),
            RuleDeterminedEffect::Deny
        );
    }

    #[test]
    fn match_event_carries_the_diff() {
        let event = MatchEvent::new("user:a:b:c|x", "user:a:b:d|y", "r", false);
        assert_eq!(event.difference, "d|y");
        assert!(!event.matched);
    }
}
