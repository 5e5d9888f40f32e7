//! The policy rule engine: rule storage, evaluation and filter composition.
//!
//! The rule base is an identity -> rule-list map held as an immutable
//! snapshot behind an atomically swapped pointer. Readers dereference once
//! per call and work on a consistent view; `reload_from_repo` builds a
//! complete replacement off to the side and publishes it with a single swap,
//! so an in-flight evaluation sees either the old or the new rule set, never
//! a mix.
//!
//! # Evaluation
//!
//! `check_rules` gathers the rules keyed by the principal's user id and each
//! of its roles (in declaration order, duplicates kept), stable-sorts them by
//! priority, then compares every candidate identity URI (roles first, user
//! id last) against each rule's pattern with the whole-string wildcard
//! matcher. Matches apply their effect in evaluation order - later matches
//! overwrite earlier ones - until a final rule stops the scan. The returned
//! [`SecurityCheckResponse`] carries the full audit trail.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use arc_swap::ArcSwap;
use time::OffsetDateTime;

use warden_core::{
    CaseSensitivity, FilterJoinOp, PrincipalContext, ResourceContext, Rule, RuleEffect,
    SecurityUri, SecurityUriBody, SecurityUriHeader, wildcard_match,
};

use crate::config::EngineConfig;
use crate::error::PolicyResult;
use crate::filters::{ClauseFilterParser, FilterParser, QueryFilter, VariableBundle};
use crate::index::RuleIndex;
use crate::resolver::AccessListResolver;
use crate::response::{MatchEvent, RuleDeterminedEffect, RuleResult, SecurityCheckResponse};
use crate::script::{RhaiScriptEvaluator, ScriptEvaluator};
use crate::source::PolicySource;
use crate::system;

// =============================================================================
// Snapshot
// =============================================================================

/// One immutable, internally consistent view of the rule base.
#[derive(Debug)]
struct RuleSnapshot {
    /// Identity (lower-cased user id or role name) -> rules, each list
    /// sorted by priority ascending.
    rules: HashMap<String, Vec<Arc<Rule>>>,
    /// Monotonically increasing; bumped on every reload.
    version: u64,
    /// Compiled discrimination index, present when enabled and current.
    index: Option<Arc<RuleIndex>>,
    loaded_realm: Option<String>,
    last_reload: Option<OffsetDateTime>,
}

fn normalize_identity(identity: &str) -> String {
    identity.trim().to_lowercase()
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|s| !s.is_empty())
}

/// Build the concrete URI one identity expands to for this request.
///
/// The owner segment is the identity string itself, so owner-scoped rule
/// bodies can compare against whichever identity is being tried.
pub(crate) fn identity_uri(
    identity: &str,
    principal: &PrincipalContext,
    resource: &ResourceContext,
) -> SecurityUri {
    let header = SecurityUriHeader::new(
        identity,
        &resource.area,
        &resource.functional_domain,
        &resource.action,
    );
    let mut body = SecurityUriBody::any()
        .with_realm(&principal.default_realm)
        .with_org_ref_name(&principal.data_domain.org_ref_name)
        .with_account_number(&principal.data_domain.account_num)
        .with_tenant_id(&principal.data_domain.tenant_id)
        .with_data_segment(&principal.data_domain.data_segment.to_string())
        .with_owner_id(identity);
    if let Some(resource_id) = &resource.resource_id {
        body = body.with_resource_id(resource_id);
    }
    SecurityUri::new(header, body)
}

/// Candidate identity URIs: roles first in declaration order, then the
/// principal's own user id.
fn expand_identity_uris(
    principal: &PrincipalContext,
    resource: &ResourceContext,
) -> Vec<SecurityUri> {
    let mut uris = Vec::with_capacity(principal.roles.len() + 1);
    for role in &principal.roles {
        uris.push(identity_uri(role, principal, resource));
    }
    uris.push(identity_uri(&principal.user_id, principal, resource));
    uris
}

/// Candidate rules: the user id's list, then each role's list in order,
/// without de-duplication, stable-sorted by priority.
fn applicable_rules(
    snapshot: &RuleSnapshot,
    principal: &PrincipalContext,
    resource: &ResourceContext,
) -> Vec<Arc<Rule>> {
    if let Some(index) = &snapshot.index {
        return index.applicable_rules(principal, resource);
    }

    let mut rules: Vec<Arc<Rule>> = Vec::new();
    if let Some(list) = snapshot.rules.get(&normalize_identity(&principal.user_id)) {
        rules.extend(list.iter().cloned());
    }
    for role in &principal.roles {
        if let Some(list) = snapshot.rules.get(&normalize_identity(role)) {
            rules.extend(list.iter().cloned());
        }
    }
    rules.sort_by_key(|r| r.priority);
    rules
}

// =============================================================================
// Engine
// =============================================================================

/// Point-in-time statistics about the engine.
#[derive(Debug, Clone)]
pub struct EngineStats {
    pub version: u64,
    pub identity_count: usize,
    pub rule_count: usize,
    pub loaded_realm: Option<String>,
    pub last_reload: Option<OffsetDateTime>,
    pub index_version: Option<u64>,
}

/// The tenant-aware policy rule engine.
///
/// Created once per process (or per tenant boundary), seeded with the
/// built-in system rules, optionally rehydrated in bulk from a
/// [`PolicySource`]. Evaluation is synchronous and lock-free; reloads are
/// serialized and publish atomically.
pub struct PolicyRuleEngine {
    snapshot: ArcSwap<RuleSnapshot>,
    source: Option<Arc<dyn PolicySource>>,
    script: Arc<dyn ScriptEvaluator>,
    parser: Arc<dyn FilterParser>,
    resolvers: Vec<Arc<dyn AccessListResolver>>,
    config: EngineConfig,
    /// Serializes `add_rule` writers; readers never take it.
    write_lock: Mutex<()>,
    /// Serializes reloads against each other.
    reload_lock: tokio::sync::Mutex<()>,
    version_counter: AtomicU64,
}

impl PolicyRuleEngine {
    /// Create an engine seeded with the built-in system rules, the sandboxed
    /// Rhai script runtime and the built-in clause filter parser.
    #[must_use]
    pub fn new(config: EngineConfig) -> Self {
        let mut rules = HashMap::new();
        system::install_system_rules(&mut rules, &config);
        for list in rules.values_mut() {
            list.sort_by_key(|r| r.priority);
        }

        let script = Arc::new(RhaiScriptEvaluator::new(config.script.clone()));
        Self {
            snapshot: ArcSwap::from_pointee(RuleSnapshot {
                rules,
                version: 0,
                index: None,
                loaded_realm: None,
                last_reload: None,
            }),
            source: None,
            script,
            parser: Arc::new(ClauseFilterParser),
            resolvers: Vec::new(),
            config,
            write_lock: Mutex::new(()),
            reload_lock: tokio::sync::Mutex::new(()),
            version_counter: AtomicU64::new(0),
        }
    }

    /// Attach the persisted-policy source consumed by [`Self::reload_from_repo`].
    #[must_use]
    pub fn with_source(mut self, source: Arc<dyn PolicySource>) -> Self {
        self.source = Some(source);
        self
    }

    /// Replace the condition-script runtime.
    #[must_use]
    pub fn with_script_evaluator(mut self, script: Arc<dyn ScriptEvaluator>) -> Self {
        self.script = script;
        self
    }

    /// Replace the filter-fragment parser.
    #[must_use]
    pub fn with_filter_parser(mut self, parser: Arc<dyn FilterParser>) -> Self {
        self.parser = parser;
        self
    }

    /// Register an access-list resolver. Each contributes one named
    /// collection to the filter variable bundle.
    #[must_use]
    pub fn register_resolver(mut self, resolver: Arc<dyn AccessListResolver>) -> Self {
        self.resolvers.push(resolver);
        self
    }

    #[must_use]
    pub fn default_realm(&self) -> &str {
        &self.config.default_realm
    }

    /// The rule-base version; bumped on every reload.
    #[must_use]
    pub fn version(&self) -> u64 {
        self.snapshot.load().version
    }

    #[must_use]
    pub fn stats(&self) -> EngineStats {
        let snapshot = self.snapshot.load();
        EngineStats {
            version: snapshot.version,
            identity_count: snapshot.rules.len(),
            rule_count: snapshot.rules.values().map(Vec::len).sum(),
            loaded_realm: snapshot.loaded_realm.clone(),
            last_reload: snapshot.last_reload,
            index_version: snapshot.index.as_ref().map(|i| i.version()),
        }
    }

    // -------------------------------------------------------------------------
    // Registration & reload
    // -------------------------------------------------------------------------

    /// Append a rule to the list keyed by `key`'s identity.
    ///
    /// The rule base is copied, extended and swapped; the compiled index is
    /// dropped so later evaluations see the addition. A blank identity is
    /// logged and ignored.
    pub fn add_rule(&self, key: &SecurityUriHeader, rule: Rule) {
        if key.identity().trim().is_empty() {
            tracing::warn!(rule = %rule.name, "cannot add rule: identity is blank");
            return;
        }
        let identity = normalize_identity(key.identity());

        let _guard = match self.write_lock.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        let current = self.snapshot.load_full();
        let mut rules = current.rules.clone();
        let list = rules.entry(identity).or_default();
        list.push(Arc::new(rule));
        list.sort_by_key(|r| r.priority);

        self.snapshot.store(Arc::new(RuleSnapshot {
            rules,
            version: current.version,
            index: None,
            loaded_realm: current.loaded_realm.clone(),
            last_reload: current.last_reload,
        }));
    }

    /// All rules registered for one identity (user id or role name).
    #[must_use]
    pub fn rules_for_identity(&self, identity: &str) -> Option<Vec<Arc<Rule>>> {
        let normalized = normalize_identity(identity);
        if normalized.is_empty() {
            return None;
        }
        self.snapshot.load().rules.get(&normalized).cloned()
    }

    /// Rebuild the rule base from the policy source for `realm`.
    ///
    /// System rules are installed first, then every persisted policy's rules
    /// are indexed by their header identity (falling back to the policy's
    /// principal id; rules with neither are skipped with a warning). Each
    /// identity's list is sorted once by priority. The finished snapshot is
    /// stamped with a new version and published with one atomic swap.
    ///
    /// Hydration failure never leaves the engine ruleless: on any source
    /// error it falls back to system rules only and logs a warning.
    pub async fn reload_from_repo(&self, realm: &str) {
        let _guard = self.reload_lock.lock().await;

        let mut rules: HashMap<String, Vec<Arc<Rule>>> = HashMap::new();
        system::install_system_rules(&mut rules, &self.config);

        let mut loaded = 0usize;
        if let Some(source) = &self.source {
            match source.list_policies(realm).await {
                Ok(policies) => {
                    for policy in policies {
                        for rule in policy.rules {
                            let header_identity =
                                rule.security_uri.header().identity().trim().to_string();
                            let identity = if header_identity.is_empty() {
                                policy.principal_id.trim().to_string()
                            } else {
                                header_identity
                            };
                            if identity.is_empty() {
                                tracing::warn!(rule = %rule.name, "rule has no identity; skipping");
                                continue;
                            }
                            rules
                                .entry(normalize_identity(&identity))
                                .or_default()
                                .push(Arc::new(rule));
                            loaded += 1;
                        }
                    }
                }
                Err(e) => {
                    tracing::warn!(
                        realm,
                        error = %e,
                        "policy hydration failed; serving system rules only"
                    );
                    rules = HashMap::new();
                    system::install_system_rules(&mut rules, &self.config);
                    loaded = 0;
                }
            }
        }

        for list in rules.values_mut() {
            list.sort_by_key(|r| r.priority);
        }

        let version = self.version_counter.fetch_add(1, Ordering::SeqCst) + 1;
        let index = if self.config.index_enabled {
            let all: Vec<Arc<Rule>> = rules.values().flatten().cloned().collect();
            Some(Arc::new(RuleIndex::build(all, version)))
        } else {
            None
        };

        let identity_count = rules.len();
        let rule_count: usize = rules.values().map(Vec::len).sum();
        self.snapshot.store(Arc::new(RuleSnapshot {
            rules,
            version,
            index,
            loaded_realm: Some(realm.to_string()),
            last_reload: Some(OffsetDateTime::now_utc()),
        }));

        tracing::info!(
            realm,
            version,
            loaded,
            rules = rule_count,
            identities = identity_count,
            "rule base reloaded"
        );
    }

    // -------------------------------------------------------------------------
    // Evaluation
    // -------------------------------------------------------------------------

    /// Evaluate with the usual DENY default.
    #[must_use]
    pub fn check_rules(
        &self,
        principal: &PrincipalContext,
        resource: &ResourceContext,
    ) -> SecurityCheckResponse {
        self.check_rules_with_default(principal, resource, RuleEffect::Deny)
    }

    /// Evaluate the rule base for one principal/resource pair.
    ///
    /// `default_effect` is the decision when nothing applies. Typically DENY
    /// so rules add permissions; an ALLOW default inverts that and lets
    /// rules remove them.
    #[must_use]
    pub fn check_rules_with_default(
        &self,
        principal: &PrincipalContext,
        resource: &ResourceContext,
        default_effect: RuleEffect,
    ) -> SecurityCheckResponse {
        let snapshot = self.snapshot.load_full();
        let mut response =
            SecurityCheckResponse::new(principal.clone(), resource.clone(), default_effect);

        let candidates = applicable_rules(&snapshot, principal, resource);
        let expanded = expand_identity_uris(principal, resource);
        response.applicable_uris = expanded.clone();

        tracing::debug!(
            user = %principal.user_id,
            rules = candidates.len(),
            uris = expanded.len(),
            "checking rules"
        );

        'rules: for rule in &candidates {
            response.evaluated_rules.push(Arc::clone(rule));
            let pattern = rule.security_uri.uri_string();

            for uri in &expanded {
                let candidate = uri.uri_string();
                if !wildcard_match(&candidate, &pattern, CaseSensitivity::Insensitive) {
                    response
                        .match_events
                        .push(MatchEvent::new(&candidate, &pattern, &rule.name, false));
                    continue;
                }

                let mut event = MatchEvent::new(&candidate, &pattern, &rule.name, true);

                if let Some(script) = non_blank(rule.precondition_script.as_deref()) {
                    let pre_ok = self.run_script(script, &rule.name, principal, resource);
                    event.pre_script = Some(script.to_string());
                    event.pre_script_result = Some(pre_ok);
                    if !pre_ok {
                        response.matched_rule_results.push(RuleResult {
                            rule: Arc::clone(rule),
                            determined_effect: RuleDeterminedEffect::NotApplicable,
                        });
                        response.match_events.push(event);
                        // rule withdrawn; remaining identity URIs are moot
                        continue 'rules;
                    }
                }

                let determined_effect =
                    if let Some(script) = non_blank(rule.postcondition_script.as_deref()) {
                        let post_ok = self.run_script(script, &rule.name, principal, resource);
                        event.post_script = Some(script.to_string());
                        event.post_script_result = Some(post_ok);
                        if post_ok {
                            response.final_effect = rule.effect;
                            RuleDeterminedEffect::from(rule.effect)
                        } else {
                            RuleDeterminedEffect::NotApplicable
                        }
                    } else {
                        response.final_effect = rule.effect;
                        RuleDeterminedEffect::from(rule.effect)
                    };

                response.matched_rule_results.push(RuleResult {
                    rule: Arc::clone(rule),
                    determined_effect,
                });
                response.match_events.push(event);

                if rule.final_rule {
                    break 'rules;
                }
            }
        }

        response
    }

    fn run_script(
        &self,
        script: &str,
        rule_name: &str,
        principal: &PrincipalContext,
        resource: &ResourceContext,
    ) -> bool {
        match self.script.evaluate(script, principal, resource) {
            Ok(result) => result,
            Err(e) => {
                tracing::warn!(
                    rule = rule_name,
                    error = %e,
                    "condition script failed; treating as false"
                );
                false
            }
        }
    }

    // -------------------------------------------------------------------------
    // Filter composition
    // -------------------------------------------------------------------------

    /// The substitution variables for this request, merged with every
    /// supporting resolver's contribution. A failing resolver is logged and
    /// skipped.
    #[must_use]
    pub fn resolve_variable_bundle(
        &self,
        principal: &PrincipalContext,
        resource: &ResourceContext,
        target: &str,
    ) -> VariableBundle {
        let mut collections = HashMap::new();
        for resolver in &self.resolvers {
            if !resolver.supports(principal, resource, target) {
                continue;
            }
            match resolver.resolve(principal, resource, target) {
                Ok(value) => {
                    collections.insert(resolver.key().to_string(), value);
                }
                Err(e) => {
                    tracing::warn!(
                        resolver = resolver.key(),
                        error = %e,
                        "access-list resolver failed; continuing without it"
                    );
                }
            }
        }
        VariableBundle::standard(principal, resource).with_collections(collections)
    }

    /// Compose the data-filtering predicates the matched rules contribute.
    ///
    /// Runs [`Self::check_rules`] (DENY default) and walks the matched rules
    /// in evaluation order, skipping NOT_APPLICABLE ones. Each rule's AND
    /// fragment joins a pending AND group and its OR fragment a pending OR
    /// group; when both are present after a rule they merge per the rule's
    /// join operator, otherwise the single non-empty group is flushed.
    /// Composition stops at a final rule. The result - including
    /// `initial_filters` - is de-duplicated by string representation,
    /// first occurrence winning.
    ///
    /// # Errors
    ///
    /// Propagates [`crate::error::PolicyError::FilterParse`] when a stored
    /// fragment is malformed; that is a configuration error, not a
    /// recoverable condition.
    pub fn get_filters(
        &self,
        initial_filters: Vec<QueryFilter>,
        principal: &PrincipalContext,
        resource: &ResourceContext,
        target: &str,
    ) -> PolicyResult<Vec<QueryFilter>> {
        let response = self.check_rules(principal, resource);
        let variables = self.resolve_variable_bundle(principal, resource, target);

        let mut composed: Vec<QueryFilter> = initial_filters;
        for result in &response.matched_rule_results {
            if result.determined_effect == RuleDeterminedEffect::NotApplicable {
                continue;
            }
            // both ALLOW and DENY rules contribute; the filters express the
            // scope the rule applied to, not its effect
            let rule = &result.rule;

            let mut and_group: Vec<QueryFilter> = Vec::new();
            let mut or_group: Vec<QueryFilter> = Vec::new();
            if let Some(fragment) = non_blank(rule.and_filter_string.as_deref()) {
                and_group.push(self.parser.parse(fragment, &variables, target)?);
            }
            if let Some(fragment) = non_blank(rule.or_filter_string.as_deref()) {
                or_group.push(self.parser.parse(fragment, &variables, target)?);
            }

            match (and_group.is_empty(), or_group.is_empty()) {
                (false, false) => match rule.effective_join_op() {
                    FilterJoinOp::And => {
                        and_group.push(QueryFilter::or(or_group));
                        composed.push(QueryFilter::and(and_group));
                    }
                    FilterJoinOp::Or => {
                        or_group.push(QueryFilter::and(and_group));
                        composed.push(QueryFilter::or(or_group));
                    }
                },
                (false, true) => composed.extend(and_group),
                (true, false) => composed.push(QueryFilter::or(or_group)),
                (true, true) => {}
            }

            if rule.final_rule {
                break;
            }
        }

        let mut seen = HashSet::new();
        Ok(composed
            .into_iter()
            .filter(|filter| seen.insert(filter.to_string()))
            .collect())
    }
}

// =============================================================================
// Tests
// =============================================================================
