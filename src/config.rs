//! Configuration loading for the authorizer
//!
//! Settings come from an optional TOML file layered under the process
//! environment. Keys are flat and case-insensitive, so `USER_POOL_ID` in the
//! environment and `user_pool_id` in the file address the same value.
//!
//! # Example
//!
//! ```rust,ignore
//! use scope_authorizer::config::AuthorizerConfig;
//!
//! let config = AuthorizerConfig::load(Some("authorizer.toml"))?;
//! config.validate()?;
//! println!("issuer: {}", config.issuer_url());
//! ```

use crate::oidc::types::JwtValidationOptions;
use crate::policy::PolicyKeyShape;
use crate::retry::RetryConfig;
use crate::{AuthorizerError, Result};
use config::{Config, Environment, File, FileFormat};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Security scheme looked up in operation `security` requirements by default
pub const DEFAULT_SECURITY_SCHEME: &str = "oauth2ClientCredentials";

fn default_security_scheme() -> String {
    DEFAULT_SECURITY_SCHEME.to_string()
}

fn default_true() -> bool {
    true
}

fn default_jwks_cache_ttl_secs() -> u64 {
    3600
}

fn default_jwks_min_refresh_interval_secs() -> u64 {
    30
}

fn default_http_timeout_ms() -> u64 {
    3000
}

fn default_policy_lookup_timeout_ms() -> u64 {
    1000
}

fn default_retry_max_attempts() -> usize {
    3
}

fn default_retry_base_delay_ms() -> u64 {
    50
}

fn default_retry_max_delay_ms() -> u64 {
    1000
}

/// Root configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthorizerConfig {
    /// Region hosting the user pool (issuer region)
    pub aws_region: String,

    /// User pool identifier, the issuer's path component
    pub user_pool_id: String,

    /// Name of the table holding per-client allowed scopes
    pub client_scopes_table: String,

    /// Path to the OpenAPI document (YAML or JSON)
    pub api_spec_path: PathBuf,

    /// Security scheme whose scopes operations declare
    #[serde(default = "default_security_scheme")]
    pub security_scheme: String,

    /// Issuer URL override (defaults to the Cognito issuer for region/pool)
    #[serde(default)]
    pub issuer_url: Option<String>,

    /// JWKS URI override (defaults to `<issuer>/.well-known/jwks.json`)
    #[serde(default)]
    pub jwks_uri: Option<String>,

    /// Expected `aud` claim; audience is not checked when unset
    #[serde(default)]
    pub expected_audience: Option<String>,

    /// Require `token_use` to be `access`
    #[serde(default = "default_true")]
    pub validate_token_use: bool,

    /// Shape of the policy-store key
    #[serde(default)]
    pub policy_key: PolicyKeyShape,

    #[serde(default = "default_jwks_cache_ttl_secs")]
    pub jwks_cache_ttl_secs: u64,

    /// Minimum spacing between refetches triggered by unknown key ids
    #[serde(default = "default_jwks_min_refresh_interval_secs")]
    pub jwks_min_refresh_interval_secs: u64,

    #[serde(default = "default_http_timeout_ms")]
    pub http_timeout_ms: u64,

    #[serde(default = "default_policy_lookup_timeout_ms")]
    pub policy_lookup_timeout_ms: u64,

    #[serde(default = "default_retry_max_attempts")]
    pub retry_max_attempts: usize,

    #[serde(default = "default_retry_base_delay_ms")]
    pub retry_base_delay_ms: u64,

    #[serde(default = "default_retry_max_delay_ms")]
    pub retry_max_delay_ms: u64,

    /// Policy read-cache TTL; 0 disables the cache
    #[serde(default)]
    pub policy_cache_ttl_secs: u64,
}

impl AuthorizerConfig {
    /// Load configuration from an optional TOML file and the process environment
    pub fn load<P: AsRef<Path>>(path: Option<P>) -> Result<Self> {
        load_config(path.as_ref().map(|p| p.as_ref()), None)
    }

    /// Issuer URL tokens must carry in `iss`
    pub fn issuer_url(&self) -> String {
        match &self.issuer_url {
            Some(url) => url.trim_end_matches('/').to_string(),
            None => format!(
                "https://cognito-idp.{}.amazonaws.com/{}",
                self.aws_region, self.user_pool_id
            ),
        }
    }

    /// Location of the issuer's published key set
    pub fn jwks_uri(&self) -> String {
        self.jwks_uri
            .clone()
            .unwrap_or_else(|| format!("{}/.well-known/jwks.json", self.issuer_url()))
    }

    pub fn validation_options(&self) -> JwtValidationOptions {
        JwtValidationOptions {
            expected_audience: self.expected_audience.clone(),
            required_token_use: self.validate_token_use.then(|| "access".to_string()),
        }
    }

    pub fn retry_config(&self) -> RetryConfig {
        RetryConfig {
            max_attempts: self.retry_max_attempts,
            base_delay_ms: self.retry_base_delay_ms,
            max_delay_ms: self.retry_max_delay_ms,
        }
    }

    pub fn http_timeout(&self) -> Duration {
        Duration::from_millis(self.http_timeout_ms)
    }

    pub fn policy_lookup_timeout(&self) -> Duration {
        Duration::from_millis(self.policy_lookup_timeout_ms)
    }

    pub fn jwks_cache_ttl(&self) -> Duration {
        Duration::from_secs(self.jwks_cache_ttl_secs)
    }

    pub fn jwks_min_refresh_interval(&self) -> Duration {
        Duration::from_secs(self.jwks_min_refresh_interval_secs)
    }

    /// Policy cache TTL, or `None` when caching is disabled
    pub fn policy_cache_ttl(&self) -> Option<Duration> {
        (self.policy_cache_ttl_secs > 0).then(|| Duration::from_secs(self.policy_cache_ttl_secs))
    }

    /// Check required values and ranges; any failure is fatal at startup
    pub fn validate(&self) -> Result<()> {
        let required = [
            ("AWS_REGION", &self.aws_region),
            ("USER_POOL_ID", &self.user_pool_id),
            ("CLIENT_SCOPES_TABLE", &self.client_scopes_table),
            ("SECURITY_SCHEME", &self.security_scheme),
        ];
        for (name, value) in required {
            if value.trim().is_empty() {
                return Err(AuthorizerError::Config(format!("{} must not be empty", name)));
            }
        }

        if self.api_spec_path.as_os_str().is_empty() {
            return Err(AuthorizerError::Config("API_SPEC_PATH must not be empty".to_string()));
        }
        if !self.api_spec_path.is_file() {
            return Err(AuthorizerError::Config(format!(
                "API_SPEC_PATH does not point to a readable file: {}",
                self.api_spec_path.display()
            )));
        }

        if let Some(url) = &self.issuer_url {
            if !(url.starts_with("https://") || url.starts_with("http://")) {
                return Err(AuthorizerError::Config(format!("ISSUER_URL is not an http(s) URL: {}", url)));
            }
        }

        if self.jwks_cache_ttl_secs == 0 {
            return Err(AuthorizerError::Config("JWKS_CACHE_TTL_SECS must be positive".to_string()));
        }
        if self.retry_max_attempts == 0 {
            return Err(AuthorizerError::Config("RETRY_MAX_ATTEMPTS must be at least 1".to_string()));
        }
        if self.http_timeout_ms == 0 || self.policy_lookup_timeout_ms == 0 {
            return Err(AuthorizerError::Config("timeouts must be positive".to_string()));
        }

        Ok(())
    }
}

/// Load configuration from an optional TOML file and an environment map
///
/// When `env` is `None` the process environment is used. Environment values
/// override file values.
pub fn load_config(path: Option<&Path>, env: Option<HashMap<String, String>>) -> Result<AuthorizerConfig> {
    let mut builder = Config::builder();
    if let Some(path) = path {
        builder = builder.add_source(File::from(path).format(FileFormat::Toml).required(true));
    }
    builder = builder.add_source(Environment::default().source(env));

    builder
        .build()
        .and_then(|settings| settings.try_deserialize::<AuthorizerConfig>())
        .map_err(|e| AuthorizerError::Config(format!("Failed to load configuration: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn env(pairs: &[(&str, &str)]) -> Option<HashMap<String, String>> {
        Some(pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect())
    }

    fn spec_file() -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "paths: {{}}").unwrap();
        file
    }

    #[test]
    fn test_load_from_environment_with_defaults() {
        let spec = spec_file();
        let config = load_config(
            None,
            env(&[
                ("AWS_REGION", "eu-west-1"),
                ("USER_POOL_ID", "eu-west-1_abc"),
                ("CLIENT_SCOPES_TABLE", "client-scopes"),
                ("API_SPEC_PATH", spec.path().to_str().unwrap()),
            ]),
        )
        .unwrap();

        assert_eq!(config.aws_region, "eu-west-1");
        assert_eq!(config.security_scheme, DEFAULT_SECURITY_SCHEME);
        assert_eq!(config.policy_key, PolicyKeyShape::Client);
        assert_eq!(config.jwks_cache_ttl_secs, 3600);
        assert_eq!(config.retry_max_attempts, 3);
        assert!(config.validate_token_use);
        assert!(config.policy_cache_ttl().is_none());
        config.validate().unwrap();
    }

    #[test]
    fn test_derived_issuer_and_jwks_uri() {
        let spec = spec_file();
        let config = load_config(
            None,
            env(&[
                ("AWS_REGION", "us-east-1"),
                ("USER_POOL_ID", "us-east-1_Pool"),
                ("CLIENT_SCOPES_TABLE", "t"),
                ("API_SPEC_PATH", spec.path().to_str().unwrap()),
            ]),
        )
        .unwrap();

        assert_eq!(config.issuer_url(), "https://cognito-idp.us-east-1.amazonaws.com/us-east-1_Pool");
        assert_eq!(
            config.jwks_uri(),
            "https://cognito-idp.us-east-1.amazonaws.com/us-east-1_Pool/.well-known/jwks.json"
        );
    }

    #[test]
    fn test_file_values_overridden_by_environment() {
        let spec = spec_file();
        let mut file = NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"
aws_region = "us-west-2"
user_pool_id = "us-west-2_file"
client_scopes_table = "file-table"
api_spec_path = "{}"
policy_key = "client_and_api"
policy_cache_ttl_secs = 30
issuer_url = "http://localhost:9000/issuer/"
"#,
            spec.path().display()
        )
        .unwrap();

        let config = load_config(Some(file.path()), env(&[("CLIENT_SCOPES_TABLE", "env-table")])).unwrap();

        assert_eq!(config.user_pool_id, "us-west-2_file");
        assert_eq!(config.client_scopes_table, "env-table");
        assert_eq!(config.policy_key, PolicyKeyShape::ClientAndApi);
        assert_eq!(config.policy_cache_ttl(), Some(Duration::from_secs(30)));
        assert_eq!(config.issuer_url(), "http://localhost:9000/issuer");
        config.validate().unwrap();
    }

    #[test]
    fn test_missing_required_value_is_error() {
        let result = load_config(None, env(&[("AWS_REGION", "us-east-1")]));
        assert!(matches!(result, Err(AuthorizerError::Config(_))));
    }

    #[test]
    fn test_validate_rejects_missing_spec_file() {
        let config = load_config(
            None,
            env(&[
                ("AWS_REGION", "us-east-1"),
                ("USER_POOL_ID", "pool"),
                ("CLIENT_SCOPES_TABLE", "t"),
                ("API_SPEC_PATH", "/nonexistent/api.yaml"),
            ]),
        )
        .unwrap();

        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("API_SPEC_PATH"));
    }

    #[test]
    fn test_validate_rejects_blank_values_and_zero_attempts() {
        let spec = spec_file();
        let base = [
            ("AWS_REGION", "us-east-1"),
            ("USER_POOL_ID", "pool"),
            ("CLIENT_SCOPES_TABLE", "t"),
            ("API_SPEC_PATH", spec.path().to_str().unwrap()),
        ];

        let mut config = load_config(None, env(&base)).unwrap();
        config.user_pool_id = "  ".to_string();
        assert!(config.validate().is_err());

        let mut config = load_config(None, env(&base)).unwrap();
        config.retry_max_attempts = 0;
        assert!(config.validate().is_err());

        let mut config = load_config(None, env(&base)).unwrap();
        config.issuer_url = Some("ftp://issuer".to_string());
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validation_options_follow_token_use_flag() {
        let spec = spec_file();
        let config = load_config(
            None,
            env(&[
                ("AWS_REGION", "us-east-1"),
                ("USER_POOL_ID", "pool"),
                ("CLIENT_SCOPES_TABLE", "t"),
                ("API_SPEC_PATH", spec.path().to_str().unwrap()),
                ("VALIDATE_TOKEN_USE", "false"),
                ("EXPECTED_AUDIENCE", "my-api"),
            ]),
        )
        .unwrap();

        let options = config.validation_options();
        assert!(options.required_token_use.is_none());
        assert_eq!(options.expected_audience.as_deref(), Some("my-api"));
    }
}
