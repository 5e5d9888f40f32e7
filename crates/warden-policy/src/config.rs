//! Engine configuration.
//!
//! All fields have working defaults so `EngineConfig::default()` yields a
//! usable engine; hosts override through their own configuration layer and
//! deserialize this struct from it.

use serde::Deserialize;

/// Configuration for [`crate::engine::PolicyRuleEngine`].
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct EngineConfig {
    /// Realm loaded when the caller does not name one.
    pub default_realm: String,

    /// The platform superuser identity; always granted the security area.
    pub system_user_id: String,

    /// Identity under which unauthenticated callers evaluate.
    pub anonymous_user_id: String,

    /// Realm the system tenant lives in.
    pub system_realm: String,

    /// The system tenant id.
    pub system_tenant_id: String,

    /// The system account number.
    pub system_account_number: String,

    /// The system organization reference name.
    pub system_org_ref_name: String,

    /// Build the discrimination index on reload and use it to shrink the
    /// candidate rule set before authoritative matching.
    pub index_enabled: bool,

    /// Sandbox limits for condition scripts.
    pub script: ScriptConfig,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            default_realm: "system-com".to_string(),
            system_user_id: "system@system.com".to_string(),
            anonymous_user_id: "anonymous@system.com".to_string(),
            system_realm: "system-com".to_string(),
            system_tenant_id: "system.com".to_string(),
            system_account_number: "0000000000".to_string(),
            system_org_ref_name: "system.com".to_string(),
            index_enabled: false,
            script: ScriptConfig::default(),
        }
    }
}

/// Resource limits applied to the embedded script runtime.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ScriptConfig {
    /// Maximum abstract operations per evaluation; bounds runaway scripts.
    pub max_operations: u64,

    /// Maximum nested call depth.
    pub max_call_levels: usize,

    /// Maximum length of any string a script may build.
    pub max_string_size: usize,
}

impl Default for ScriptConfig {
    fn default() -> Self {
        Self {
            max_operations: 100_000,
            max_call_levels: 32,
            max_string_size: 10_000,
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
    fn defaults_describe_the_system_tenant() {
        let config = EngineConfig::default();
        assert_eq!(config.system_user_id, "system@system.com");
        assert_eq!(config.system_realm, "system-com");
        assert_eq!(config.system_tenant_id, "system.com");
        assert!(!config.index_enabled);
    }

    #[test]
    fn partial_documents_fill_in_defaults() {
        let config: EngineConfig = serde_json::from_str(
            r#"{"defaultRealm": "acme-com", "indexEnabled": true, "script": {"maxOperations": 500}}"#,
        )
        .unwrap();
        assert_eq!(config.default_realm, "acme-com");
        assert!(config.index_enabled);
        assert_eq!(config.script.max_operations, 500);
        assert_eq!(config.script.max_call_levels, 32);
        assert_eq!(config.system_user_id, "system@system.com");
    }
}
