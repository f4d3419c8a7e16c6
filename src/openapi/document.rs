//! Serde model of the subset of an OpenAPI document the authorizer reads

use http::Method;
use indexmap::IndexMap;
use serde::Deserialize;
use std::path::Path;

use crate::{AuthorizerError, Result};

/// One security requirement object: scheme name to required scopes
pub type SecurityRequirement = IndexMap<String, Vec<String>>;

/// OpenAPI document; `paths` keeps declaration order
#[derive(Debug, Clone, Deserialize)]
pub struct ApiSpecDocument {
    #[serde(default)]
    pub openapi: Option<String>,
    #[serde(default)]
    pub info: Option<ApiInfo>,
    pub paths: IndexMap<String, PathItem>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ApiInfo {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub version: Option<String>,
}

/// Operations under one path template; other path-item keys are ignored
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PathItem {
    #[serde(default)]
    pub get: Option<Operation>,
    #[serde(default)]
    pub put: Option<Operation>,
    #[serde(default)]
    pub post: Option<Operation>,
    #[serde(default)]
    pub delete: Option<Operation>,
    #[serde(default)]
    pub options: Option<Operation>,
    #[serde(default)]
    pub head: Option<Operation>,
    #[serde(default)]
    pub patch: Option<Operation>,
    #[serde(default)]
    pub trace: Option<Operation>,
}

impl PathItem {
    /// Declared operations with their HTTP methods
    pub fn operations(&self) -> Vec<(Method, &Operation)> {
        [
            (Method::GET, &self.get),
            (Method::PUT, &self.put),
            (Method::POST, &self.post),
            (Method::DELETE, &self.delete),
            (Method::OPTIONS, &self.options),
            (Method::HEAD, &self.head),
            (Method::PATCH, &self.patch),
            (Method::TRACE, &self.trace),
        ]
        .into_iter()
        .filter_map(|(method, operation)| operation.as_ref().map(|op| (method, op)))
        .collect()
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Operation {
    #[serde(default)]
    pub operation_id: Option<String>,
    #[serde(default)]
    pub security: Option<Vec<SecurityRequirement>>,
}

impl Operation {
    /// Scopes required under `scheme`, empty when the operation does not name it
    ///
    /// When several requirement objects name the scheme, the last one wins.
    pub fn required_scopes(&self, scheme: &str) -> Vec<String> {
        self.security
            .iter()
            .flatten()
            .filter_map(|requirement| requirement.get(scheme))
            .last()
            .cloned()
            .unwrap_or_default()
    }
}

impl ApiSpecDocument {
    pub fn from_yaml_str(content: &str) -> Result<Self> {
        serde_yaml::from_str(content)
            .map_err(|e| AuthorizerError::SpecDocument(format!("Failed to parse YAML specification: {}", e)))
    }

    pub fn from_json_str(content: &str) -> Result<Self> {
        serde_json::from_str(content)
            .map_err(|e| AuthorizerError::SpecDocument(format!("Failed to parse JSON specification: {}", e)))
    }

    /// Load a document from disk; `.json` files are parsed as JSON, anything else as YAML
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            AuthorizerError::SpecDocument(format!("Failed to read specification {}: {}", path.display(), e))
        })?;

        let is_json = path
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| ext.eq_ignore_ascii_case("json"));
        if is_json {
            Self::from_json_str(&content)
        } else {
            Self::from_yaml_str(&content)
        }
    }
}
