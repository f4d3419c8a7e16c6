//! Declarative API specification: document model and route-to-scope resolution

pub mod document;
pub mod routes;

pub use document::{ApiSpecDocument, Operation, PathItem, SecurityRequirement};
pub use routes::{normalize_path, PathTemplate, ResolvedRoute, RouteEntry, RouteOperation, RouteTable};
