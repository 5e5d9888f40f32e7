//! Condition-script evaluation.
//!
//! Rules may carry pre/postcondition scripts: boolean expressions over the
//! principal and resource contexts. The engine consumes them through the
//! [`ScriptEvaluator`] seam; [`RhaiScriptEvaluator`] is the default runtime.
//!
//! # Design
//!
//! The Rhai engine is created once and reused for every evaluation. Scripts
//! are compiled to AST once and cached by hash; only the scope is built per
//! call. The contexts are bound as read-only structured maps named
//! `principal` and `resource`, using the same camelCase field names as their
//! JSON form:
//!
//! ```text
//! principal.userId == "alice@acme.com" && resource.action == "view"
//! principal.dataDomain.tenantId == resource.area
//! ```

use std::collections::HashMap;
use std::hash::{DefaultHasher, Hash, Hasher};
use std::sync::RwLock;

use rhai::{AST, Dynamic, Engine, Scope};

use warden_core::{PrincipalContext, ResourceContext};

use crate::config::ScriptConfig;
use crate::error::{PolicyError, PolicyResult};

/// Evaluates a boolean expression with `principal`/`resource` bound.
///
/// Sandboxing and resource limits are the implementation's concern; the
/// engine treats a returned error the same as a `false` result.
pub trait ScriptEvaluator: Send + Sync {
    /// Run `script` and return its boolean result.
    ///
    /// # Errors
    ///
    /// Returns [`PolicyError::Script`] when the script fails to compile,
    /// exceeds a sandbox limit, or produces a non-boolean value.
    fn evaluate(
        &self,
        script: &str,
        principal: &PrincipalContext,
        resource: &ResourceContext,
    ) -> PolicyResult<bool>;
}

/// Sandboxed Rhai runtime with an AST cache.
pub struct RhaiScriptEvaluator {
    engine: Engine,
    script_cache: RwLock<HashMap<u64, AST>>,
}

impl Default for RhaiScriptEvaluator {
    fn default() -> Self {
        Self::new(ScriptConfig::default())
    }
}

impl RhaiScriptEvaluator {
    /// Create a runtime with the given sandbox limits.
    #[must_use]
    pub fn new(config: ScriptConfig) -> Self {
        let mut engine = Engine::new();
        engine.set_max_operations(config.max_operations);
        engine.set_max_call_levels(config.max_call_levels);
        engine.set_max_expr_depths(64, 64);
        engine.set_max_string_size(config.max_string_size);
        engine.set_max_array_size(1_000);
        engine.set_max_map_size(1_000);
        engine.disable_symbol("eval");

        Self {
            engine,
            script_cache: RwLock::new(HashMap::new()),
        }
    }

    fn get_or_compile(&self, script: &str) -> PolicyResult<AST> {
        let mut hasher = DefaultHasher::new();
        script.hash(&mut hasher);
        let key = hasher.finish();

        if let Some(ast) = self
            .script_cache
            .read()
            .ok()
            .and_then(|cache| cache.get(&key).cloned())
        {
            return Ok(ast);
        }

        let ast = self
            .engine
            .compile(script)
            .map_err(|e| PolicyError::script(format!("compilation failed: {e}")))?;
        if let Ok(mut cache) = self.script_cache.write() {
            cache.insert(key, ast.clone());
        }
        Ok(ast)
    }

    /// Number of cached compiled scripts.
    #[must_use]
    pub fn cached_scripts(&self) -> usize {
        self.script_cache.read().map(|c| c.len()).unwrap_or(0)
    }
}

impl ScriptEvaluator for RhaiScriptEvaluator {
    fn evaluate(
        &self,
        script: &str,
        principal: &PrincipalContext,
        resource: &ResourceContext,
    ) -> PolicyResult<bool> {
        let ast = self.get_or_compile(script)?;

        let principal_value = rhai::serde::to_dynamic(principal)
            .map_err(|e| PolicyError::script(format!("failed to bind principal: {e}")))?;
        let resource_value = rhai::serde::to_dynamic(resource)
            .map_err(|e| PolicyError::script(format!("failed to bind resource: {e}")))?;

        let mut scope = Scope::new();
        scope.push_constant("principal", principal_value);
        scope.push_constant("resource", resource_value);

        let value = self
            .engine
            .eval_ast_with_scope::<Dynamic>(&mut scope, &ast)
            .map_err(|e| PolicyError::script(e.to_string()))?;

        value
            .as_bool()
            .map_err(|actual| PolicyError::script(format!("script returned {actual}, expected bool")))
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use warden_core::DataDomain;

    fn principal() -> PrincipalContext {
        PrincipalContext::builder(
            "alice@acme.com",
            "acme-com",
            DataDomain::new("acme.com", "111", "acme.com", 0, "alice@acme.com"),
        )
        .roles(["user"])
        .build()
    }

    fn resource() -> ResourceContext {
        ResourceContext::new("sales", "order", "view")
    }

    #[test]
    fn scripts_see_both_contexts() {
        let runtime = RhaiScriptEvaluator::default();
        assert!(
            runtime
                .evaluate(
                    r#"principal.userId == "alice@acme.com" && resource.action == "view""#,
                    &principal(),
                    &resource(),
                )
                .unwrap()
        );
        assert!(
            !runtime
                .evaluate(
                    r#"principal.dataDomain.tenantId == "other.com""#,
                    &principal(),
                    &resource(),
                )
                .unwrap()
        );
    }

    #[test]
    fn roles_are_bound_as_an_array() {
        let runtime = RhaiScriptEvaluator::default();
        assert!(
            runtime
                .evaluate(
                    r#"principal.roles.contains("user")"#,
                    &principal(),
                    &resource(),
                )
                .unwrap()
        );
    }

    #[test]
    fn compile_error_is_reported() {
        let runtime = RhaiScriptEvaluator::default();
        let err = runtime
            .evaluate("this is not rhai ===", &principal(), &resource())
            .unwrap_err();
        assert!(matches!(err, PolicyError::Script { .. }));
    }

    #[test]
    fn non_boolean_result_is_an_error() {
        let runtime = RhaiScriptEvaluator::default();
        let err = runtime
            .evaluate(r#""just a string""#, &principal(), &resource())
            .unwrap_err();
        assert!(matches!(err, PolicyError::Script { .. }));
    }

    #[test]
    fn runaway_scripts_hit_the_operation_limit() {
        let runtime = RhaiScriptEvaluator::new(ScriptConfig {
            max_operations: 100,
            ..ScriptConfig::default()
        });
        let err = runtime
            .evaluate(
                "let x = 0; while true { x += 1; }; x > 0",
                &principal(),
                &resource(),
            )
            .unwrap_err();
        assert!(matches!(err, PolicyError::Script { .. }));
    }

    #[test]
    fn compiled_scripts_are_cached() {
        let runtime = RhaiScriptEvaluator::default();
        let script = "resource.area == \"sales\"";
        runtime.evaluate(script, &principal(), &resource()).unwrap();
        runtime.evaluate(script, &principal(), &resource()).unwrap();
        assert_eq!(runtime.cached_scripts(), 1);
    }
}
