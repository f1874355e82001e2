//! Account operations.
//!
//! [`UserService`] is the one place account logic lives: it validates input,
//! delegates exactly one call to the [`IdentityProvider`], and records the
//! outcome. HTTP handlers only translate shapes.

use crate::services::identity_provider::{
    AuthTokens, IdentityProvider, IdpError, SignUpOutcome, UserAttribute, UserProfile,
};
use crate::observability::metrics::record_idp_request;
use common::secret::{ExposeSecret, SecretString};
use std::future::Future;
use std::sync::Arc;
use std::time::Instant;
use tracing::instrument;

/// Input for creating an account.
#[derive(Debug, Clone)]
pub struct NewUser {
    pub email: String,
    pub password: SecretString,
    pub first_name: String,
    pub last_name: String,
}

/// Profile fields a user may change on their own account.
#[derive(Debug, Clone)]
pub struct ProfileUpdate {
    pub first_name: String,
    pub last_name: String,
}

/// Validate the shape of an email address.
///
/// Deliberately loose: one `@`, non-empty local part, a dotted domain and no
/// whitespace. The provider is the authority on deliverability.
pub fn validate_email(email: &str) -> Result<(), IdpError> {
    let invalid = || IdpError::InvalidParameter("Invalid email address".to_string());

    if email.is_empty() || email.chars().any(char::is_whitespace) {
        return Err(invalid());
    }

    let (local, domain) = email.split_once('@').ok_or_else(invalid)?;
    if local.is_empty() || domain.contains('@') {
        return Err(invalid());
    }

    let mut labels = domain.split('.');
    let dotted = domain.contains('.') && labels.all(|label| !label.is_empty());
    if !dotted {
        return Err(invalid());
    }

    Ok(())
}

fn require(field: &str, value: &str) -> Result<(), IdpError> {
    if value.trim().is_empty() {
        return Err(IdpError::InvalidParameter(format!("{field} is required")));
    }
    Ok(())
}

fn require_secret(field: &str, value: &SecretString) -> Result<(), IdpError> {
    if value.expose_secret().is_empty() {
        return Err(IdpError::InvalidParameter(format!("{field} is required")));
    }
    Ok(())
}

/// Canonical interface for account operations.
#[derive(Clone)]
pub struct UserService {
    provider: Arc<dyn IdentityProvider>,
}

impl UserService {
    pub fn new(provider: Arc<dyn IdentityProvider>) -> Self {
        Self { provider }
    }

    /// Run one provider call, logging and recording its outcome.
    async fn call<T, F>(&self, operation: &'static str, fut: F) -> Result<T, IdpError>
    where
        F: Future<Output = Result<T, IdpError>>,
    {
        let start = Instant::now();
        let result = fut.await;
        let duration = start.elapsed();

        match &result {
            Ok(_) => {
                record_idp_request(operation, "success", duration);
                tracing::debug!(target: "authgw.services.user", operation, "Identity provider call succeeded");
            }
            Err(e) => {
                record_idp_request(operation, e.as_label(), duration);
                tracing::info!(
                    target: "authgw.services.user",
                    operation,
                    kind = e.as_label(),
                    "Identity provider call failed"
                );
            }
        }

        result
    }

    #[instrument(skip_all)]
    pub async fn create_user(&self, user: &NewUser) -> Result<SignUpOutcome, IdpError> {
        validate_email(&user.email)?;
        require_secret("password", &user.password)?;
        require("firstName", &user.first_name)?;
        require("lastName", &user.last_name)?;

        let attributes = [
            UserAttribute::email(&user.email),
            UserAttribute::given_name(&user.first_name),
            UserAttribute::family_name(&user.last_name),
        ];

        self.call(
            "sign_up",
            self.provider
                .sign_up(&user.email, &user.password, &attributes),
        )
        .await
    }

    #[instrument(skip_all)]
    pub async fn confirm_user(&self, email: &str, confirmation_code: &str) -> Result<(), IdpError> {
        validate_email(email)?;
        require("confirmationCode", confirmation_code)?;

        self.call(
            "confirm_sign_up",
            self.provider.confirm_sign_up(email, confirmation_code),
        )
        .await
    }

    #[instrument(skip_all)]
    pub async fn login(&self, email: &str, password: &SecretString) -> Result<AuthTokens, IdpError> {
        validate_email(email)?;
        require_secret("password", password)?;

        self.call(
            "initiate_password_auth",
            self.provider.initiate_password_auth(email, password),
        )
        .await
    }

    /// Exchange a refresh token for a new access token.
    ///
    /// `email` is needed only to compute the client secret hash.
    #[instrument(skip_all)]
    pub async fn refresh_token(
        &self,
        email: &str,
        refresh_token: &SecretString,
    ) -> Result<AuthTokens, IdpError> {
        validate_email(email)?;
        require_secret("refreshToken", refresh_token)?;

        self.call(
            "initiate_refresh_auth",
            self.provider.initiate_refresh_auth(email, refresh_token),
        )
        .await
    }

    /// Update the caller's own profile. `username` comes from verified claims.
    #[instrument(skip_all)]
    pub async fn update_attributes(
        &self,
        username: &str,
        update: &ProfileUpdate,
    ) -> Result<(), IdpError> {
        require("username", username)?;
        require("firstName", &update.first_name)?;
        require("lastName", &update.last_name)?;

        let attributes = [
            UserAttribute::given_name(&update.first_name),
            UserAttribute::family_name(&update.last_name),
        ];

        self.call(
            "admin_update_user_attributes",
            self.provider
                .admin_update_user_attributes(username, &attributes),
        )
        .await
    }

    #[instrument(skip_all)]
    pub async fn forgot_password(&self, email: &str) -> Result<(), IdpError> {
        validate_email(email)?;

        self.call(
            "admin_reset_user_password",
            self.provider.admin_reset_user_password(email),
        )
        .await
    }

    #[instrument(skip_all)]
    pub async fn confirm_forgot_password(
        &self,
        email: &str,
        code: &str,
        new_password: &SecretString,
    ) -> Result<(), IdpError> {
        validate_email(email)?;
        require("code", code)?;
        require_secret("password", new_password)?;

        self.call(
            "confirm_forgot_password",
            self.provider
                .confirm_forgot_password(email, code, new_password),
        )
        .await
    }

    /// Delete the caller's own account. `username` comes from verified claims.
    #[instrument(skip_all)]
    pub async fn delete_user(&self, username: &str) -> Result<(), IdpError> {
        require("username", username)?;

        self.call(
            "admin_delete_user",
            self.provider.admin_delete_user(username),
        )
        .await
    }

    #[instrument(skip_all)]
    pub async fn resend_confirmation_code(&self, email: &str) -> Result<(), IdpError> {
        validate_email(email)?;

        self.call(
            "resend_confirmation_code",
            self.provider.resend_confirmation_code(email),
        )
        .await
    }

    /// Profile of the user owning `access_token`.
    #[instrument(skip_all)]
    pub async fn get_user(&self, access_token: &SecretString) -> Result<UserProfile, IdpError> {
        require_secret("accessToken", access_token)?;

        self.call("get_user", self.provider.get_user(access_token))
            .await
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::services::identity_provider::mock::{IdpCall, MockIdentityProvider};

    fn service() -> (UserService, Arc<MockIdentityProvider>) {
        let mock = Arc::new(MockIdentityProvider::succeeding());
        (
            UserService::new(Arc::clone(&mock) as Arc<dyn IdentityProvider>),
            mock,
        )
    }

    fn new_user() -> NewUser {
        NewUser {
            email: "alice@example.com".to_string(),
            password: SecretString::from("Passw0rd!"),
            first_name: "Alice".to_string(),
            last_name: "Liddell".to_string(),
        }
    }

    #[test]
    fn test_validate_email() {
        for ok in ["a@b.co", "alice.smith+tag@mail.example.com"] {
            assert!(validate_email(ok).is_ok(), "{ok}");
        }
        for bad in [
            "",
            "alice",
            "@example.com",
            "alice@",
            "alice@localhost",
            "alice@example..com",
            "alice@@example.com",
            "al ice@example.com",
            "alice@example.com.",
        ] {
            assert!(validate_email(bad).is_err(), "{bad}");
        }
    }

    #[tokio::test]
    async fn test_create_user_sends_profile_attributes() {
        let (service, mock) = service();

        service.create_user(&new_user()).await.unwrap();

        assert_eq!(
            mock.calls(),
            vec![IdpCall::SignUp {
                username: "alice@example.com".to_string(),
                attributes: vec![
                    UserAttribute::email("alice@example.com"),
                    UserAttribute::given_name("Alice"),
                    UserAttribute::family_name("Liddell"),
                ],
            }]
        );
    }

    #[tokio::test]
    async fn test_invalid_input_never_reaches_provider() {
        let (service, mock) = service();

        let mut bad_email = new_user();
        bad_email.email = "not-an-email".to_string();
        let mut no_name = new_user();
        no_name.first_name = "   ".to_string();
        let mut no_password = new_user();
        no_password.password = SecretString::from("");

        for user in [bad_email, no_name, no_password] {
            let err = service.create_user(&user).await.unwrap_err();
            assert!(matches!(err, IdpError::InvalidParameter(_)));
        }
        assert!(service.confirm_user("alice@example.com", "").await.is_err());
        assert!(service.delete_user("").await.is_err());

        assert_eq!(mock.call_count(), 0);
    }

    #[tokio::test]
    async fn test_each_operation_is_one_provider_call() {
        let (service, mock) = service();
        let pw = SecretString::from("Passw0rd!");

        service.confirm_user("alice@example.com", "123456").await.unwrap();
        service.login("alice@example.com", &pw).await.unwrap();
        service
            .refresh_token("alice@example.com", &SecretString::from("r"))
            .await
            .unwrap();
        service
            .update_attributes(
                "alice-username",
                &ProfileUpdate {
                    first_name: "Al".to_string(),
                    last_name: "L".to_string(),
                },
            )
            .await
            .unwrap();
        service.forgot_password("alice@example.com").await.unwrap();
        service
            .confirm_forgot_password("alice@example.com", "654321", &pw)
            .await
            .unwrap();
        service.delete_user("alice-username").await.unwrap();
        service
            .resend_confirmation_code("alice@example.com")
            .await
            .unwrap();
        service
            .get_user(&SecretString::from("token"))
            .await
            .unwrap();

        let operations: Vec<_> = mock.calls().iter().map(IdpCall::operation).collect();
        assert_eq!(
            operations,
            vec![
                "confirm_sign_up",
                "initiate_password_auth",
                "initiate_refresh_auth",
                "admin_update_user_attributes",
                "admin_reset_user_password",
                "confirm_forgot_password",
                "admin_delete_user",
                "resend_confirmation_code",
                "get_user",
            ]
        );
    }

    #[tokio::test]
    async fn test_update_targets_given_username() {
        let (service, mock) = service();

        service
            .update_attributes(
                "caller-from-token",
                &ProfileUpdate {
                    first_name: "New".to_string(),
                    last_name: "Name".to_string(),
                },
            )
            .await
            .unwrap();

        assert_eq!(
            mock.last_call(),
            Some(IdpCall::AdminUpdateUserAttributes {
                username: "caller-from-token".to_string(),
                attributes: vec![
                    UserAttribute::given_name("New"),
                    UserAttribute::family_name("Name"),
                ],
            })
        );
    }

    #[tokio::test]
    async fn test_provider_errors_pass_through() {
        let (service, mock) = service();
        mock.fail_with(
            "initiate_password_auth",
            IdpError::UserNotFound("User does not exist.".to_string()),
        );

        let err = service
            .login("alice@example.com", &SecretString::from("pw"))
            .await
            .unwrap_err();

        assert_eq!(err, IdpError::UserNotFound("User does not exist.".to_string()));
    }
}
