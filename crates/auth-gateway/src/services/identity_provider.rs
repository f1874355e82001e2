//! Identity provider seam.
//!
//! Every account operation the gateway offers is exactly one call on
//! [`IdentityProvider`]. The production implementation talks to Cognito
//! (see [`crate::services::cognito`]); [`mock::MockIdentityProvider`] backs
//! tests.

use common::secret::SecretString;
use serde::Serialize;
use thiserror::Error;

/// A user attribute as the provider stores it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserAttribute {
    pub name: String,
    pub value: String,
}

impl UserAttribute {
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }

    pub fn email(value: impl Into<String>) -> Self {
        Self::new("email", value)
    }

    pub fn given_name(value: impl Into<String>) -> Self {
        Self::new("given_name", value)
    }

    pub fn family_name(value: impl Into<String>) -> Self {
        Self::new("family_name", value)
    }
}

/// Result of a successful sign-up.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignUpOutcome {
    /// Provider-assigned subject of the new user.
    pub user_sub: String,

    /// Whether the account is already confirmed.
    pub confirmed: bool,
}

/// Tokens returned by an authentication flow.
#[derive(Debug, Clone)]
pub struct AuthTokens {
    pub access_token: SecretString,

    /// Absent on refresh flows.
    pub refresh_token: Option<SecretString>,

    pub id_token: Option<SecretString>,

    /// Access token lifetime in seconds.
    pub expires_in: i32,
}

/// Profile of the authenticated user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserProfile {
    pub username: String,
    pub email: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
}

impl UserProfile {
    /// Build a profile from raw provider attributes.
    pub fn from_attributes(username: String, attributes: &[UserAttribute]) -> Self {
        let lookup = |name: &str| {
            attributes
                .iter()
                .find(|a| a.name == name)
                .map(|a| a.value.clone())
        };

        Self {
            username,
            email: lookup("email"),
            first_name: lookup("given_name"),
            last_name: lookup("family_name"),
        }
    }
}

/// Classified identity provider failure.
///
/// Message-carrying variants hold the provider's own message, which is what
/// clients see for 4xx outcomes.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum IdpError {
    #[error("{0}")]
    UserNotConfirmed(String),

    #[error("{0}")]
    NotAuthorized(String),

    #[error("{0}")]
    UserNotFound(String),

    #[error("{0}")]
    PasswordResetRequired(String),

    #[error("{0}")]
    UsernameExists(String),

    #[error("{0}")]
    CodeMismatch(String),

    #[error("{0}")]
    ExpiredCode(String),

    #[error("{0}")]
    InvalidPassword(String),

    #[error("{0}")]
    InvalidParameter(String),

    #[error("{0}")]
    LimitExceeded(String),

    #[error("{0}")]
    TooManyRequests(String),

    /// Transport failure, timeout or provider-side fault. The detail is for
    /// logs only.
    #[error("Identity provider unavailable")]
    Unavailable(String),

    #[error("{message}")]
    Other { code: String, message: String },
}

impl IdpError {
    /// Classify a provider error code (e.g. `UserNotFoundException`).
    pub fn from_code(code: &str, message: &str) -> Self {
        let message = if message.is_empty() {
            code.to_string()
        } else {
            message.to_string()
        };

        match code {
            "UserNotConfirmedException" => IdpError::UserNotConfirmed(message),
            "NotAuthorizedException" => IdpError::NotAuthorized(message),
            "UserNotFoundException" => IdpError::UserNotFound(message),
            "PasswordResetRequiredException" => IdpError::PasswordResetRequired(message),
            "UsernameExistsException" | "AliasExistsException" => {
                IdpError::UsernameExists(message)
            }
            "CodeMismatchException" => IdpError::CodeMismatch(message),
            "ExpiredCodeException" => IdpError::ExpiredCode(message),
            "InvalidPasswordException" => IdpError::InvalidPassword(message),
            "InvalidParameterException" => IdpError::InvalidParameter(message),
            "LimitExceededException" => IdpError::LimitExceeded(message),
            "TooManyRequestsException" | "TooManyFailedAttemptsException" => {
                IdpError::TooManyRequests(message)
            }
            "InternalErrorException" | "ServiceUnavailable" => IdpError::Unavailable(message),
            _ => IdpError::Other {
                code: code.to_string(),
                message,
            },
        }
    }

    /// Provider message (or internal detail for `Unavailable`).
    pub fn message(&self) -> &str {
        match self {
            IdpError::UserNotConfirmed(m)
            | IdpError::NotAuthorized(m)
            | IdpError::UserNotFound(m)
            | IdpError::PasswordResetRequired(m)
            | IdpError::UsernameExists(m)
            | IdpError::CodeMismatch(m)
            | IdpError::ExpiredCode(m)
            | IdpError::InvalidPassword(m)
            | IdpError::InvalidParameter(m)
            | IdpError::LimitExceeded(m)
            | IdpError::TooManyRequests(m)
            | IdpError::Unavailable(m) => m,
            IdpError::Other { message, .. } => message,
        }
    }

    /// Throttling by the provider (maps to 429).
    pub fn is_throttling(&self) -> bool {
        matches!(
            self,
            IdpError::LimitExceeded(_) | IdpError::TooManyRequests(_)
        )
    }

    /// Short label for metrics.
    pub fn as_label(&self) -> &'static str {
        match self {
            IdpError::UserNotConfirmed(_) => "user_not_confirmed",
            IdpError::NotAuthorized(_) => "not_authorized",
            IdpError::UserNotFound(_) => "user_not_found",
            IdpError::PasswordResetRequired(_) => "password_reset_required",
            IdpError::UsernameExists(_) => "username_exists",
            IdpError::CodeMismatch(_) => "code_mismatch",
            IdpError::ExpiredCode(_) => "expired_code",
            IdpError::InvalidPassword(_) => "invalid_password",
            IdpError::InvalidParameter(_) => "invalid_parameter",
            IdpError::LimitExceeded(_) => "limit_exceeded",
            IdpError::TooManyRequests(_) => "too_many_requests",
            IdpError::Unavailable(_) => "unavailable",
            IdpError::Other { .. } => "other",
        }
    }
}

/// Operations the gateway needs from the identity provider.
#[async_trait::async_trait]
pub trait IdentityProvider: Send + Sync {
    async fn sign_up(
        &self,
        username: &str,
        password: &SecretString,
        attributes: &[UserAttribute],
    ) -> Result<SignUpOutcome, IdpError>;

    async fn confirm_sign_up(&self, username: &str, code: &str) -> Result<(), IdpError>;

    async fn initiate_password_auth(
        &self,
        username: &str,
        password: &SecretString,
    ) -> Result<AuthTokens, IdpError>;

    /// `username` feeds the secret hash and must be the pool's internal
    /// username, which for email-as-username pools is the email.
    async fn initiate_refresh_auth(
        &self,
        username: &str,
        refresh_token: &SecretString,
    ) -> Result<AuthTokens, IdpError>;

    /// Profile of the user owning `access_token`.
    async fn get_user(&self, access_token: &SecretString) -> Result<UserProfile, IdpError>;

    async fn admin_update_user_attributes(
        &self,
        username: &str,
        attributes: &[UserAttribute],
    ) -> Result<(), IdpError>;

    async fn admin_reset_user_password(&self, username: &str) -> Result<(), IdpError>;

    async fn confirm_forgot_password(
        &self,
        username: &str,
        code: &str,
        password: &SecretString,
    ) -> Result<(), IdpError>;

    async fn admin_delete_user(&self, username: &str) -> Result<(), IdpError>;

    async fn resend_confirmation_code(&self, username: &str) -> Result<(), IdpError>;
}

/// Mock identity provider for tests.
pub mod mock {
    use super::*;
    use common::secret::ExposeSecret;
    use std::collections::HashMap;
    use std::sync::Mutex;

    /// One recorded call. Secrets are not recorded.
    #[derive(Debug, Clone, PartialEq, Eq)]
    pub enum IdpCall {
        SignUp {
            username: String,
            attributes: Vec<UserAttribute>,
        },
        ConfirmSignUp {
            username: String,
            code: String,
        },
        InitiatePasswordAuth {
            username: String,
        },
        InitiateRefreshAuth {
            username: String,
        },
        GetUser,
        AdminUpdateUserAttributes {
            username: String,
            attributes: Vec<UserAttribute>,
        },
        AdminResetUserPassword {
            username: String,
        },
        ConfirmForgotPassword {
            username: String,
            code: String,
        },
        AdminDeleteUser {
            username: String,
        },
        ResendConfirmationCode {
            username: String,
        },
    }

    impl IdpCall {
        /// Operation name, as used with [`MockIdentityProvider::fail_with`].
        pub fn operation(&self) -> &'static str {
            match self {
                IdpCall::SignUp { .. } => "sign_up",
                IdpCall::ConfirmSignUp { .. } => "confirm_sign_up",
                IdpCall::InitiatePasswordAuth { .. } => "initiate_password_auth",
                IdpCall::InitiateRefreshAuth { .. } => "initiate_refresh_auth",
                IdpCall::GetUser => "get_user",
                IdpCall::AdminUpdateUserAttributes { .. } => "admin_update_user_attributes",
                IdpCall::AdminResetUserPassword { .. } => "admin_reset_user_password",
                IdpCall::ConfirmForgotPassword { .. } => "confirm_forgot_password",
                IdpCall::AdminDeleteUser { .. } => "admin_delete_user",
                IdpCall::ResendConfirmationCode { .. } => "resend_confirmation_code",
            }
        }
    }

    /// Records calls and answers with canned data or scripted errors.
    pub struct MockIdentityProvider {
        calls: Mutex<Vec<IdpCall>>,
        failures: Mutex<HashMap<&'static str, IdpError>>,
        tokens: AuthTokens,
        profile: UserProfile,
        access_tokens_seen: Mutex<Vec<String>>,
    }

    impl MockIdentityProvider {
        /// Create a mock where every operation succeeds.
        pub fn succeeding() -> Self {
            Self {
                calls: Mutex::new(Vec::new()),
                failures: Mutex::new(HashMap::new()),
                tokens: AuthTokens {
                    access_token: SecretString::from("mock-access-token"),
                    refresh_token: Some(SecretString::from("mock-refresh-token")),
                    id_token: Some(SecretString::from("mock-id-token")),
                    expires_in: 3600,
                },
                profile: UserProfile {
                    username: "alice@example.com".to_string(),
                    email: Some("alice@example.com".to_string()),
                    first_name: Some("Alice".to_string()),
                    last_name: Some("Liddell".to_string()),
                },
                access_tokens_seen: Mutex::new(Vec::new()),
            }
        }

        /// Make `operation` fail with `error` until cleared.
        pub fn fail_with(&self, operation: &'static str, error: IdpError) {
            lock(&self.failures).insert(operation, error);
        }

        pub fn clear_failures(&self) {
            lock(&self.failures).clear();
        }

        pub fn calls(&self) -> Vec<IdpCall> {
            lock(&self.calls).clone()
        }

        pub fn call_count(&self) -> usize {
            lock(&self.calls).len()
        }

        pub fn last_call(&self) -> Option<IdpCall> {
            lock(&self.calls).last().cloned()
        }

        /// Access tokens passed to `get_user`, in order.
        pub fn access_tokens_seen(&self) -> Vec<String> {
            lock(&self.access_tokens_seen).clone()
        }

        fn record(&self, call: IdpCall) -> Result<(), IdpError> {
            let operation = call.operation();
            lock(&self.calls).push(call);
            match lock(&self.failures).get(operation) {
                Some(error) => Err(error.clone()),
                None => Ok(()),
            }
        }
    }

    impl Default for MockIdentityProvider {
        fn default() -> Self {
            Self::succeeding()
        }
    }

    fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
        mutex.lock().unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    #[async_trait::async_trait]
    impl IdentityProvider for MockIdentityProvider {
        async fn sign_up(
            &self,
            username: &str,
            _password: &SecretString,
            attributes: &[UserAttribute],
        ) -> Result<SignUpOutcome, IdpError> {
            self.record(IdpCall::SignUp {
                username: username.to_string(),
                attributes: attributes.to_vec(),
            })?;
            Ok(SignUpOutcome {
                user_sub: "00000000-0000-0000-0000-000000000001".to_string(),
                confirmed: false,
            })
        }

        async fn confirm_sign_up(&self, username: &str, code: &str) -> Result<(), IdpError> {
            self.record(IdpCall::ConfirmSignUp {
                username: username.to_string(),
                code: code.to_string(),
            })
        }

        async fn initiate_password_auth(
            &self,
            username: &str,
            _password: &SecretString,
        ) -> Result<AuthTokens, IdpError> {
            self.record(IdpCall::InitiatePasswordAuth {
                username: username.to_string(),
            })?;
            Ok(self.tokens.clone())
        }

        async fn initiate_refresh_auth(
            &self,
            username: &str,
            _refresh_token: &SecretString,
        ) -> Result<AuthTokens, IdpError> {
            self.record(IdpCall::InitiateRefreshAuth {
                username: username.to_string(),
            })?;
            let mut tokens = self.tokens.clone();
            tokens.refresh_token = None;
            Ok(tokens)
        }

        async fn get_user(&self, access_token: &SecretString) -> Result<UserProfile, IdpError> {
            lock(&self.access_tokens_seen).push(access_token.expose_secret().to_string());
            self.record(IdpCall::GetUser)?;
            Ok(self.profile.clone())
        }

        async fn admin_update_user_attributes(
            &self,
            username: &str,
            attributes: &[UserAttribute],
        ) -> Result<(), IdpError> {
            self.record(IdpCall::AdminUpdateUserAttributes {
                username: username.to_string(),
                attributes: attributes.to_vec(),
            })
        }

        async fn admin_reset_user_password(&self, username: &str) -> Result<(), IdpError> {
            self.record(IdpCall::AdminResetUserPassword {
                username: username.to_string(),
            })
        }

        async fn confirm_forgot_password(
            &self,
            username: &str,
            code: &str,
            _password: &SecretString,
        ) -> Result<(), IdpError> {
            self.record(IdpCall::ConfirmForgotPassword {
                username: username.to_string(),
                code: code.to_string(),
            })
        }

        async fn admin_delete_user(&self, username: &str) -> Result<(), IdpError> {
            self.record(IdpCall::AdminDeleteUser {
                username: username.to_string(),
            })
        }

        async fn resend_confirmation_code(&self, username: &str) -> Result<(), IdpError> {
            self.record(IdpCall::ResendConfirmationCode {
                username: username.to_string(),
            })
        }
    }

}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_from_code_classifies_known_codes() {
        let cases = [
            ("UserNotConfirmedException", "user_not_confirmed"),
            ("NotAuthorizedException", "not_authorized"),
            ("UserNotFoundException", "user_not_found"),
            ("PasswordResetRequiredException", "password_reset_required"),
            ("UsernameExistsException", "username_exists"),
            ("CodeMismatchException", "code_mismatch"),
            ("ExpiredCodeException", "expired_code"),
            ("InvalidPasswordException", "invalid_password"),
            ("InvalidParameterException", "invalid_parameter"),
            ("LimitExceededException", "limit_exceeded"),
            ("TooManyRequestsException", "too_many_requests"),
            ("InternalErrorException", "unavailable"),
        ];

        for (code, label) in cases {
            assert_eq!(IdpError::from_code(code, "msg").as_label(), label, "{code}");
        }
    }

    #[test]
    fn test_from_code_keeps_provider_message() {
        let err = IdpError::from_code("UsernameExistsException", "An account with the given email already exists.");

        assert_eq!(err.to_string(), "An account with the given email already exists.");
        assert_eq!(err.message(), "An account with the given email already exists.");
    }

    #[test]
    fn test_from_code_unknown_code_is_other() {
        let err = IdpError::from_code("ResourceNotFoundException", "");

        assert_eq!(
            err,
            IdpError::Other {
                code: "ResourceNotFoundException".to_string(),
                message: "ResourceNotFoundException".to_string(),
            }
        );
    }

    #[test]
    fn test_unavailable_display_hides_detail() {
        let err = IdpError::Unavailable("dispatch failure: connection refused".to_string());

        assert_eq!(err.to_string(), "Identity provider unavailable");
        assert!(!err.is_throttling());
    }

    #[test]
    fn test_throttling() {
        assert!(IdpError::LimitExceeded("x".to_string()).is_throttling());
        assert!(IdpError::TooManyRequests("x".to_string()).is_throttling());
        assert!(!IdpError::NotAuthorized("x".to_string()).is_throttling());
    }

    #[test]
    fn test_profile_from_attributes() {
        let profile = UserProfile::from_attributes(
            "alice".to_string(),
            &[
                UserAttribute::email("alice@example.com"),
                UserAttribute::given_name("Alice"),
                UserAttribute::new("sub", "u1"),
            ],
        );

        assert_eq!(profile.email.as_deref(), Some("alice@example.com"));
        assert_eq!(profile.first_name.as_deref(), Some("Alice"));
        assert!(profile.last_name.is_none());

        let json = serde_json::to_value(&profile).unwrap();
        assert_eq!(json["firstName"], "Alice");
        assert!(json["lastName"].is_null());
    }
}
