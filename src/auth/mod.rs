//! Authorization decision engine
//!
//! Takes a gateway TOKEN authorizer event through three stages and produces
//! an allow/deny decision for the invoked resource:
//!
//! - verify the bearer credential against the issuer's key set
//! - resolve the invoked method and path to the scopes its operation requires
//! - enforce those scopes against both the stored client policy and the token
//!
//! # Example
//!
//! ```ignore
//! use scope_authorizer::auth::{Authorizer, TokenAuthorizerEvent};
//!
//! let authorizer = Authorizer::from_config(&config, policies)?;
//! let event = TokenAuthorizerEvent::new("Bearer eyJ...", method_arn);
//! let decision = authorizer.authorize(&event).await;
//! println!("{}", serde_json::to_string(&decision)?);
//! ```

pub mod claims;
pub mod decision;
pub mod enforcer;
pub mod engine;
pub mod error;
pub mod target;

pub use decision::{AuthorizationDecision, Effect, PolicyDocument, Statement, UNKNOWN_PRINCIPAL};
pub use enforcer::{enforce, ScopeCheck};
pub use engine::Authorizer;
pub use error::{AuthorizationError, Stage};
pub use target::{InvocationTarget, TokenAuthorizerEvent};
