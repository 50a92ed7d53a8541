//! Credential and token value objects.
//!
//! Everything that crosses a store boundary is defined here: the validated
//! endpoint key, the username/secret pair, refresh tokens and the OAuth result
//! handed over by the interactive collaborator.

pub mod endpoint;
pub mod model;

pub use endpoint::TargetEndpoint;
pub use model::{Credential, OAuthResult, Token, TokenKind};
