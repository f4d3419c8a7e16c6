use crate::oidc::types::Credential;
use serde_json::Value;

/// Scope accessors on a verified credential
impl Credential {
    /// Granted scopes, from the space-delimited `scope` claim or a `scp`/`scopes` array
    pub fn scopes(&self) -> Vec<String> {
        if !self.scope.trim().is_empty() {
            return self.scope.split_whitespace().map(|s| s.to_string()).collect();
        }

        ["scp", "scopes"]
            .iter()
            .find_map(|claim| match self.extra.get(*claim) {
                Some(Value::Array(scopes)) => Some(
                    scopes
                        .iter()
                        .filter_map(|s| s.as_str().map(str::to_string))
                        .collect(),
                ),
                _ => None,
            })
            .unwrap_or_default()
    }

    pub fn has_scope(&self, scope: &str) -> bool {
        self.scopes().iter().any(|s| s == scope)
    }

    pub fn has_all_scopes(&self, scopes: &[&str]) -> bool {
        let granted = self.scopes();
        scopes.iter().all(|&scope| granted.iter().any(|s| s == scope))
    }
}
