//! OIDC credential verification
//!
//! This module validates bearer tokens issued by an OIDC provider against
//! the provider's published (and locally cached) JSON Web Key Set.

pub mod types;
pub mod jwks;
pub mod verifier;

pub use types::*;
pub use jwks::*;
pub use verifier::*;
