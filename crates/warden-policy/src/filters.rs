//! Query predicates, the substitution variable bundle, and the filter-parser
//! seam.
//!
//! Rules carry filter *fragments* in a small declarative language; turning a
//! fragment into a concrete predicate is the job of an external grammar,
//! reached through [`FilterParser`]. The engine's side of the contract is the
//! [`VariableBundle`]: string variables substituted into `${name}` tokens
//! (with a `#` prefix marking numeric literals) plus the named collections
//! contributed by access-list resolvers.
//!
//! [`ClauseFilterParser`] is the built-in implementation covering the clause
//! syntax the system rules use (`field:value` terms joined by `&&` or `||`);
//! hosts with a richer grammar plug in their own parser.

use std::collections::HashMap;
use std::fmt;

use serde::Serialize;

use warden_core::{PrincipalContext, ResourceContext};

use crate::error::{PolicyError, PolicyResult};

// =============================================================================
// Predicates
// =============================================================================

/// A literal value inside a predicate.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum FilterValue {
    Str(String),
    Int(i64),
}

impl fmt::Display for FilterValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Str(s) => write!(f, "\"{s}\""),
            Self::Int(n) => write!(f, "{n}"),
        }
    }
}

/// A composable query predicate handed to the persistence layer.
///
/// The string rendering is load-bearing: composed filters are de-duplicated
/// by it (structurally identical predicates that render differently are
/// treated as distinct).
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum QueryFilter {
    /// Field equals a literal value.
    Eq { field: String, value: FilterValue },
    /// Field is one of a set of values.
    In {
        field: String,
        values: Vec<FilterValue>,
    },
    /// Every inner predicate holds.
    And(Vec<QueryFilter>),
    /// At least one inner predicate holds.
    Or(Vec<QueryFilter>),
}

impl QueryFilter {
    #[must_use]
    pub fn eq(field: &str, value: FilterValue) -> Self {
        Self::Eq {
            field: field.to_string(),
            value,
        }
    }

    #[must_use]
    pub fn is_in(field: &str, values: Vec<FilterValue>) -> Self {
        Self::In {
            field: field.to_string(),
            values,
        }
    }

    #[must_use]
    pub fn and(filters: Vec<QueryFilter>) -> Self {
        Self::And(filters)
    }

    #[must_use]
    pub fn or(filters: Vec<QueryFilter>) -> Self {
        Self::Or(filters)
    }
}

fn write_list(f: &mut fmt::Formatter<'_>, items: &[QueryFilter]) -> fmt::Result {
    for (i, item) in items.iter().enumerate() {
        if i > 0 {
            f.write_str(", ")?;
        }
        write!(f, "{item}")?;
    }
    Ok(())
}

impl fmt::Display for QueryFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Eq { field, value } => write!(f, "{field} == {value}"),
            Self::In { field, values } => {
                write!(f, "{field} in [")?;
                for (i, v) in values.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{v}")?;
                }
                f.write_str("]")
            }
            Self::And(inner) => {
                f.write_str("and(")?;
                write_list(f, inner)?;
                f.write_str(")")
            }
            Self::Or(inner) => {
                f.write_str("or(")?;
                write_list(f, inner)?;
                f.write_str(")")
            }
        }
    }
}

// =============================================================================
// Variable bundle
// =============================================================================

/// Everything a filter fragment may reference.
#[derive(Debug, Clone, Default)]
pub struct VariableBundle {
    /// `${name}` string substitutions.
    pub strings: HashMap<String, String>,
    /// Resolver-contributed collections, keyed by resolver key.
    pub collections: HashMap<String, serde_json::Value>,
}

impl VariableBundle {
    /// The standard variables derived from the request contexts.
    #[must_use]
    pub fn standard(principal: &PrincipalContext, resource: &ResourceContext) -> Self {
        let mut strings = HashMap::new();
        strings.insert("principalId".to_string(), principal.user_id.clone());
        strings.insert(
            "pAccountId".to_string(),
            principal.data_domain.account_num.clone(),
        );
        strings.insert(
            "pTenantId".to_string(),
            principal.data_domain.tenant_id.clone(),
        );
        strings.insert("ownerId".to_string(), principal.data_domain.owner_id.clone());
        strings.insert(
            "orgRefName".to_string(),
            principal.data_domain.org_ref_name.clone(),
        );
        strings.insert(
            "resourceId".to_string(),
            resource.resource_id.clone().unwrap_or_else(|| "*".to_string()),
        );
        strings.insert("action".to_string(), resource.action.clone());
        strings.insert(
            "functionalDomain".to_string(),
            resource.functional_domain.clone(),
        );
        strings.insert("area".to_string(), resource.area.clone());
        strings.insert("defaultRealm".to_string(), principal.default_realm.clone());

        Self {
            strings,
            collections: HashMap::new(),
        }
    }

    #[must_use]
    pub fn with_collections(mut self, collections: HashMap<String, serde_json::Value>) -> Self {
        self.collections.extend(collections);
        self
    }

    /// Replace every `${name}` token found in `strings`; unknown tokens are
    /// left intact for the downstream grammar to reject.
    #[must_use]
    pub fn substitute(&self, input: &str) -> String {
        let mut out = String::with_capacity(input.len());
        let mut rest = input;
        while let Some(start) = rest.find("${") {
            out.push_str(&rest[..start]);
            match rest[start..].find('}') {
                Some(offset) => {
                    let name = &rest[start + 2..start + offset];
                    match self.strings.get(name) {
                        Some(value) => out.push_str(value),
                        None => out.push_str(&rest[start..=start + offset]),
                    }
                    rest = &rest[start + offset + 1..];
                }
                None => {
                    out.push_str(&rest[start..]);
                    rest = "";
                }
            }
        }
        out.push_str(rest);
        out
    }
}

// =============================================================================
// Parser seam
// =============================================================================

/// Turns a filter fragment into a concrete predicate.
///
/// Implemented externally by the host's query grammar; the engine only
/// supplies the fragment, the variable bundle, and the logical target type
/// being queried.
pub trait FilterParser: Send + Sync {
    /// Parse one fragment.
    ///
    /// # Errors
    ///
    /// Returns [`PolicyError::FilterParse`] for a malformed fragment; this
    /// propagates out of filter composition as a hard configuration error.
    fn parse(
        &self,
        fragment: &str,
        variables: &VariableBundle,
        target: &str,
    ) -> PolicyResult<QueryFilter>;
}

/// The built-in clause parser.
///
/// Grammar: `field:value` terms joined by `&&` (all must hold) or `||` (any
/// must hold); a fragment may not mix the two. A value of `${name}` resolves
/// through the bundle - to an `in` predicate when `name` is a resolver
/// collection, to an equality otherwise. A `#` prefix marks an integer
/// literal. Anything else is a string literal after substitution.
#[derive(Debug, Default)]
pub struct ClauseFilterParser;

impl ClauseFilterParser {
    fn parse_clause(&self, clause: &str, variables: &VariableBundle) -> PolicyResult<QueryFilter> {
        let clause = clause.trim();
        let Some((field, value)) = clause.split_once(':') else {
            return Err(PolicyError::filter_parse(
                clause,
                "expected 'field:value'".to_string(),
            ));
        };
        let field = field.trim();
        let value = value.trim();
        if field.is_empty() || value.is_empty() {
            return Err(PolicyError::filter_parse(clause, "empty field or value"));
        }

        if let Some(name) = value
            .strip_prefix("${")
            .and_then(|rest| rest.strip_suffix('}'))
        {
            if let Some(collection) = variables.collections.get(name) {
                let serde_json::Value::Array(items) = collection else {
                    return Err(PolicyError::filter_parse(
                        clause,
                        format!("variable '{name}' is not a collection"),
                    ));
                };
                let mut values = Vec::with_capacity(items.len());
                for item in items {
                    match item {
                        serde_json::Value::String(s) => values.push(FilterValue::Str(s.clone())),
                        serde_json::Value::Number(n) if n.is_i64() => {
                            values.push(FilterValue::Int(n.as_i64().unwrap_or_default()));
                        }
                        other => {
                            return Err(PolicyError::filter_parse(
                                clause,
                                format!("unsupported collection element {other}"),
                            ));
                        }
                    }
                }
                return Ok(QueryFilter::is_in(field, values));
            }
            if let Some(s) = variables.strings.get(name) {
                return Ok(QueryFilter::eq(field, FilterValue::Str(s.clone())));
            }
            return Err(PolicyError::filter_parse(
                clause,
                format!("unknown variable '{name}'"),
            ));
        }

        if let Some(number) = value.strip_prefix('#') {
            let parsed: i64 = number.parse().map_err(|_| {
                PolicyError::filter_parse(clause, format!("'{number}' is not a number"))
            })?;
            return Ok(QueryFilter::eq(field, FilterValue::Int(parsed)));
        }

        Ok(QueryFilter::eq(
            field,
            FilterValue::Str(variables.substitute(value)),
        ))
    }
}

impl FilterParser for ClauseFilterParser {
    fn parse(
        &self,
        fragment: &str,
        variables: &VariableBundle,
        _target: &str,
    ) -> PolicyResult<QueryFilter> {
        let fragment = fragment.trim();
        if fragment.is_empty() {
            return Err(PolicyError::filter_parse(fragment, "empty fragment"));
        }

        let has_and = fragment.contains("&&");
        let has_or = fragment.contains("||");
        if has_and && has_or {
            return Err(PolicyError::filter_parse(
                fragment,
                "mixing '&&' and '||' in one fragment is not supported",
            ));
        }

        let separator = if has_or { "||" } else { "&&" };
        let clauses: Vec<QueryFilter> = fragment
            .split(separator)
            .map(|clause| self.parse_clause(clause, variables))
            .collect::<PolicyResult<_>>()?;

        Ok(match (clauses.len(), has_or) {
            (1, _) => clauses.into_iter().next().unwrap_or(QueryFilter::And(vec![])),
            (_, true) => QueryFilter::or(clauses),
            (_, false) => QueryFilter::and(clauses),
        })
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use warden_core::DataDomain;

    fn bundle() -> VariableBundle {
        let principal = PrincipalContext::builder(
            "alice@acme.com",
            "acme-com",
            DataDomain::new("acme.com", "111", "acme.com", 0, "alice@acme.com"),
        )
        .roles(["user"])
        .build();
        let resource = ResourceContext::new("sales", "order", "view").with_resource_id("ord-1");
        VariableBundle::standard(&principal, &resource)
    }

    #[test]
    fn standard_bundle_exposes_the_reference_names() {
        let vars = bundle();
        assert_eq!(vars.strings["principalId"], "alice@acme.com");
        assert_eq!(vars.strings["pTenantId"], "acme.com");
        assert_eq!(vars.strings["pAccountId"], "111");
        assert_eq!(vars.strings["resourceId"], "ord-1");
        assert_eq!(vars.strings["functionalDomain"], "order");
        assert_eq!(vars.strings["defaultRealm"], "acme-com");
    }

    #[test]
    fn substitution_replaces_known_and_keeps_unknown_tokens() {
        let vars = bundle();
        assert_eq!(
            vars.substitute("owner is ${principalId} in ${pTenantId}"),
            "owner is alice@acme.com in acme.com"
        );
        assert_eq!(vars.substitute("${nope}"), "${nope}");
        assert_eq!(vars.substitute("${unterminated"), "${unterminated");
    }

    #[test]
    fn and_fragment_parses_to_a_conjunction() {
        let parser = ClauseFilterParser;
        let filter = parser
            .parse(
                "dataDomain.ownerId:${principalId}&&dataDomain.dataSegment:#0",
                &bundle(),
                "order",
            )
            .unwrap();
        assert_eq!(
            filter.to_string(),
            "and(dataDomain.ownerId == \"alice@acme.com\", dataDomain.dataSegment == 0)"
        );
    }

    #[test]
    fn or_fragment_parses_to_a_disjunction() {
        let parser = ClauseFilterParser;
        let filter = parser
            .parse("status:open||status:pending", &bundle(), "order")
            .unwrap();
        assert_eq!(
            filter.to_string(),
            "or(status == \"open\", status == \"pending\")"
        );
    }

    #[test]
    fn resolver_collections_become_in_predicates() {
        let parser = ClauseFilterParser;
        let vars = bundle().with_collections(HashMap::from([(
            "visibleIds".to_string(),
            serde_json::json!(["a", "b"]),
        )]));
        let filter = parser.parse("_id:${visibleIds}", &vars, "order").unwrap();
        assert_eq!(filter.to_string(), "_id in [\"a\", \"b\"]");
    }

    #[test]
    fn unknown_variable_is_a_parse_error() {
        let parser = ClauseFilterParser;
        let err = parser
            .parse("owner:${mystery}", &bundle(), "order")
            .unwrap_err();
        assert!(matches!(err, PolicyError::FilterParse { .. }));
    }

    #[test]
    fn mixed_connectors_are_rejected() {
        let parser = ClauseFilterParser;
        let err = parser
            .parse("a:1&&b:2||c:3", &bundle(), "order")
            .unwrap_err();
        assert!(matches!(err, PolicyError::FilterParse { .. }));
    }

    #[test]
    fn rendering_distinguishes_strings_from_numbers() {
        assert_eq!(
            QueryFilter::eq("seg", FilterValue::Int(0)).to_string(),
            "seg == 0"
        );
        assert_eq!(
            QueryFilter::eq("seg", FilterValue::Str("0".into())).to_string(),
            "seg == \"0\""
        );
    }
}
