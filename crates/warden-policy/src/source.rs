//! The persisted-policy source.
//!
//! Storage and administration of policies is out of scope for the engine;
//! it consumes them through [`PolicySource`] during `reload_from_repo` only.
//! [`InMemoryPolicySource`] is provided for embedders and tests.

use std::collections::HashMap;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;

use warden_core::Rule;

use crate::error::PolicyResult;

/// A persisted policy: a principal (user id or role) and its rules.
///
/// A rule whose own header identity is blank is indexed under
/// `principal_id`; a rule with neither is skipped at reload.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PolicyDocument {
    pub principal_id: String,
    #[serde(default)]
    pub rules: Vec<Rule>,
}

/// Read access to persisted policies, consumed only by the reload path.
#[async_trait]
pub trait PolicySource: Send + Sync {
    /// List every policy stored for `realm`.
    async fn list_policies(&self, realm: &str) -> PolicyResult<Vec<PolicyDocument>>;
}

/// A realm-keyed in-memory policy source.
#[derive(Debug, Default)]
pub struct InMemoryPolicySource {
    by_realm: RwLock<HashMap<String, Vec<PolicyDocument>>>,
}

impl InMemoryPolicySource {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a policy to a realm.
    pub async fn put(&self, realm: &str, policy: PolicyDocument) {
        self.by_realm
            .write()
            .await
            .entry(realm.to_string())
            .or_default()
            .push(policy);
    }

    /// Drop every policy in a realm.
    pub async fn clear(&self, realm: &str) {
        self.by_realm.write().await.remove(realm);
    }
}

#[async_trait]
impl PolicySource for InMemoryPolicySource {
    async fn list_policies(&self, realm: &str) -> PolicyResult<Vec<PolicyDocument>> {
        Ok(self
            .by_realm
            .read()
            .await
            .get(realm)
            .cloned()
            .unwrap_or_default())
    }
}

// =============================================================================
// Tests
// =============================================================================
