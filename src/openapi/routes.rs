//! Route table: maps a request method and concrete path to the scopes its operation requires

use http::Method;
use regex::Regex;
use std::collections::HashMap;
use std::path::Path;
use tracing;

use crate::auth::AuthorizationError;
use crate::{AuthorizerError, Result};
use super::document::ApiSpecDocument;

/// Strip one trailing slash (except at root) and ensure a leading one
///
/// Only a single slash is dropped, so `/a//` keeps its empty segment.
pub fn normalize_path(path: &str) -> String {
    let trimmed = path.strip_suffix('/').unwrap_or(path);
    if trimmed.starts_with('/') {
        trimmed.to_string()
    } else {
        format!("/{}", trimmed)
    }
}

/// A path template such as `/account/{id}` compiled to an anchored pattern
///
/// Each `{name}` placeholder matches exactly one non-empty segment.
#[derive(Debug, Clone)]
pub struct PathTemplate {
    template: String,
    pattern: Regex,
    params: Vec<String>,
}

impl PathTemplate {
    pub fn parse(template: &str) -> Result<Self> {
        let template = normalize_path(template);
        let mut pattern = String::from("^");
        let mut params = Vec::new();
        let mut literal = String::new();
        let mut chars = template.chars();

        while let Some(c) = chars.next() {
            if c != '{' {
                literal.push(c);
                continue;
            }

            pattern.push_str(&regex::escape(&literal));
            literal.clear();

            let mut name = String::new();
            let mut closed = false;
            for c in chars.by_ref() {
                if c == '}' {
                    closed = true;
                    break;
                }
                name.push(c);
            }
            if !closed || name.is_empty() || name.contains('/') {
                return Err(AuthorizerError::SpecDocument(format!(
                    "Malformed path template: {}",
                    template
                )));
            }

            pattern.push_str("([^/]+)");
            params.push(name);
        }
        pattern.push_str(&regex::escape(&literal));
        pattern.push('$');

        let pattern = Regex::new(&pattern).map_err(|e| {
            AuthorizerError::SpecDocument(format!("Invalid path template {}: {}", template, e))
        })?;

        Ok(Self {
            template,
            pattern,
            params,
        })
    }

    pub fn template(&self) -> &str {
        &self.template
    }

    pub fn param_names(&self) -> &[String] {
        &self.params
    }

    /// Match a normalized concrete path, returning captured parameters
    pub fn captures(&self, path: &str) -> Option<HashMap<String, String>> {
        let captures = self.pattern.captures(path)?;
        Some(
            self.params
                .iter()
                .zip(captures.iter().skip(1))
                .filter_map(|(name, value)| value.map(|v| (name.clone(), v.as_str().to_string())))
                .collect(),
        )
    }

    pub fn is_match(&self, path: &str) -> bool {
        self.pattern.is_match(path)
    }

    /// Whether some concrete path could match both templates
    ///
    /// Segment-wise approximation: a segment holding a placeholder is treated as a wildcard.
    pub fn may_overlap(&self, other: &PathTemplate) -> bool {
        let ours: Vec<&str> = self.template.split('/').collect();
        let theirs: Vec<&str> = other.template.split('/').collect();
        ours.len() == theirs.len()
            && ours
                .iter()
                .zip(&theirs)
                .all(|(a, b)| a == b || a.contains('{') || b.contains('{'))
    }
}

#[derive(Debug, Clone)]
pub struct RouteOperation {
    pub method: Method,
    pub operation_id: Option<String>,
    pub required_scopes: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct RouteEntry {
    pub template: PathTemplate,
    pub operations: Vec<RouteOperation>,
}

impl RouteEntry {
    fn operation(&self, method: &Method) -> Option<&RouteOperation> {
        self.operations.iter().find(|op| &op.method == method)
    }
}

/// Result of resolving a request against the route table
#[derive(Debug, Clone)]
pub struct ResolvedRoute<'a> {
    pub template: &'a str,
    pub operation: &'a RouteOperation,
    pub params: HashMap<String, String>,
}

impl ResolvedRoute<'_> {
    pub fn required_scopes(&self) -> &[String] {
        &self.operation.required_scopes
    }

    pub fn operation_id(&self) -> Option<&str> {
        self.operation.operation_id.as_deref()
    }
}

/// Immutable route table, built once at startup in document order
#[derive(Debug, Clone)]
pub struct RouteTable {
    routes: Vec<RouteEntry>,
    security_scheme: String,
}

impl RouteTable {
    /// Build the table, reading required scopes under `security_scheme`
    pub fn from_document(document: &ApiSpecDocument, security_scheme: &str) -> Result<Self> {
        let mut routes: Vec<RouteEntry> = Vec::with_capacity(document.paths.len());

        for (template, item) in &document.paths {
            let template = PathTemplate::parse(template)?;
            let operations = item
                .operations()
                .into_iter()
                .map(|(method, op)| RouteOperation {
                    method,
                    operation_id: op.operation_id.clone(),
                    required_scopes: op.required_scopes(security_scheme),
                })
                .collect();

            for earlier in &routes {
                if earlier.template.may_overlap(&template) {
                    tracing::warn!(
                        first = earlier.template.template(),
                        second = template.template(),
                        "Path templates may overlap; the first declared route takes precedence"
                    );
                }
            }

            routes.push(RouteEntry { template, operations });
        }

        tracing::debug!(
            routes = routes.len(),
            scheme = security_scheme,
            "Built route table"
        );

        Ok(Self {
            routes,
            security_scheme: security_scheme.to_string(),
        })
    }

    pub fn load<P: AsRef<Path>>(path: P, security_scheme: &str) -> Result<Self> {
        let document = ApiSpecDocument::load(path)?;
        Self::from_document(&document, security_scheme)
    }

    pub fn security_scheme(&self) -> &str {
        &self.security_scheme
    }

    pub fn routes(&self) -> &[RouteEntry] {
        &self.routes
    }

    pub fn len(&self) -> usize {
        self.routes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }

    /// Find the operation for `method` on a concrete `path`
    ///
    /// Method comparison is case-insensitive. When more than one route
    /// matches, the first declared wins.
    pub fn resolve(
        &self,
        api_id: &str,
        method: &str,
        path: &str,
    ) -> std::result::Result<ResolvedRoute<'_>, AuthorizationError> {
        let not_found = || AuthorizationError::RouteNotFound {
            api_id: api_id.to_string(),
            method: method.to_string(),
            path: path.to_string(),
        };

        let parsed = Method::from_bytes(method.to_ascii_uppercase().as_bytes()).map_err(|_| not_found())?;
        let normalized = normalize_path(path);

        let mut matches = self.routes.iter().filter_map(|route| {
            route
                .operation(&parsed)
                .filter(|_| route.template.is_match(&normalized))
                .map(|op| (route, op))
        });

        let (route, operation) = matches.next().ok_or_else(not_found)?;

        let others: Vec<&str> = matches.map(|(r, _)| r.template.template()).collect();
        if !others.is_empty() {
            tracing::warn!(
                path = %normalized,
                chosen = route.template.template(),
                ignored = ?others,
                "Request path matches several routes"
            );
        }

        Ok(ResolvedRoute {
            template: route.template.template(),
            operation,
            params: route.template.captures(&normalized).unwrap_or_default(),
        })
    }
}
