//! Service layer for the auth gateway.
//!
//! # Components
//!
//! - `identity_provider` - the provider seam, its error classification and a mock
//! - `cognito` - Cognito user pool implementation
//! - `user_service` - validated account operations used by handlers

pub mod cognito;
pub mod identity_provider;
pub mod user_service;

pub use cognito::CognitoIdentityProvider;
pub use identity_provider::{
    AuthTokens, IdentityProvider, IdpError, SignUpOutcome, UserAttribute, UserProfile,
};
pub use user_service::{NewUser, ProfileUpdate, UserService};
