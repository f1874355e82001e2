//! Cognito user pool implementation of [`IdentityProvider`].
//!
//! Client-side calls (sign-up, confirm, initiate-auth, forgot-password,
//! resend) carry a `SECRET_HASH` when the app client has a secret. Admin
//! calls are authorised by the process's AWS credentials instead.
//!
//! # Security
//!
//! - Passwords, refresh tokens and the client secret stay in `SecretString`
//!   until the SDK call is built
//! - SDK error detail is logged; only the provider's user-facing message is
//!   carried in [`IdpError`]

use crate::config::Config;
use crate::services::identity_provider::{
    AuthTokens, IdentityProvider, IdpError, SignUpOutcome, UserAttribute, UserProfile,
};
use aws_config::timeout::TimeoutConfig;
use aws_config::{BehaviorVersion, Region};
use aws_sdk_cognitoidentityprovider::error::{DisplayErrorContext, ProvideErrorMetadata, SdkError};
use aws_sdk_cognitoidentityprovider::types::{AttributeType, AuthFlowType, AuthenticationResultType};
use aws_sdk_cognitoidentityprovider::Client;
use base64::{engine::general_purpose::STANDARD, Engine};
use common::secret::{ExposeSecret, SecretString};
use ring::hmac;
use tracing::instrument;

/// Compute the Cognito secret hash for `username`.
///
/// `base64(HMAC-SHA256(key = client_secret, message = username ++ client_id))`
pub fn secret_hash(username: &str, client_id: &str, client_secret: &SecretString) -> String {
    let key = hmac::Key::new(hmac::HMAC_SHA256, client_secret.expose_secret().as_bytes());
    let mut ctx = hmac::Context::with_key(&key);
    ctx.update(username.as_bytes());
    ctx.update(client_id.as_bytes());
    STANDARD.encode(ctx.sign().as_ref())
}

/// Map an SDK failure onto [`IdpError`].
///
/// Transport failures and timeouts become `Unavailable`; service errors are
/// classified by their error code.
fn classify<E, R>(operation: &'static str, err: SdkError<E, R>) -> IdpError
where
    E: ProvideErrorMetadata + std::error::Error + 'static,
    R: std::fmt::Debug,
{
    let detail = DisplayErrorContext(&err).to_string();

    let classified = match &err {
        SdkError::TimeoutError(_) | SdkError::DispatchFailure(_) => IdpError::Unavailable(detail),
        _ => match err.code() {
            Some(code) => IdpError::from_code(code, err.message().unwrap_or_default()),
            None => IdpError::Unavailable(detail),
        },
    };

    match &classified {
        IdpError::Unavailable(detail) => {
            tracing::error!(target: "authgw.services.cognito", operation, error = %detail, "Cognito call failed");
        }
        other => {
            tracing::debug!(target: "authgw.services.cognito", operation, kind = other.as_label(), "Cognito rejected request");
        }
    }

    classified
}

fn to_sdk_attributes(attributes: &[UserAttribute]) -> Result<Vec<AttributeType>, IdpError> {
    attributes
        .iter()
        .map(|attr| {
            AttributeType::builder()
                .name(&attr.name)
                .value(&attr.value)
                .build()
                .map_err(|e| IdpError::InvalidParameter(e.to_string()))
        })
        .collect()
}

fn to_tokens(result: Option<&AuthenticationResultType>) -> Result<AuthTokens, IdpError> {
    let result = result.ok_or_else(|| IdpError::Other {
        code: "ChallengeRequired".to_string(),
        message: "Additional authentication challenge required".to_string(),
    })?;

    let access_token = result.access_token().ok_or_else(|| {
        IdpError::Unavailable("authentication result missing access token".to_string())
    })?;

    Ok(AuthTokens {
        access_token: SecretString::from(access_token.to_string()),
        refresh_token: result
            .refresh_token()
            .map(|t| SecretString::from(t.to_string())),
        id_token: result.id_token().map(|t| SecretString::from(t.to_string())),
        expires_in: result.expires_in(),
    })
}

/// Cognito-backed identity provider.
pub struct CognitoIdentityProvider {
    client: Client,
    user_pool_id: String,
    client_id: String,
    client_secret: Option<SecretString>,
}

impl CognitoIdentityProvider {
    pub fn new(
        client: Client,
        user_pool_id: String,
        client_id: String,
        client_secret: Option<SecretString>,
    ) -> Self {
        Self {
            client,
            user_pool_id,
            client_id,
            client_secret,
        }
    }

    /// Build an SDK client from the gateway configuration.
    ///
    /// Credentials come from the default AWS provider chain.
    pub async fn from_config(config: &Config) -> Self {
        let timeouts = TimeoutConfig::builder()
            .operation_timeout(config.idp_timeout)
            .build();

        let mut config_loader = aws_config::defaults(BehaviorVersion::latest())
            .region(Region::new(config.cognito_region.clone()))
            .timeout_config(timeouts);
        if let Some(ref endpoint) = config.cognito_endpoint_url {
            config_loader = config_loader.endpoint_url(endpoint);
        }
        let sdk_config = config_loader.load().await;

        Self::new(
            Client::new(&sdk_config),
            config.cognito_user_pool_id.clone(),
            config.cognito_client_id.clone(),
            config.cognito_client_secret.clone(),
        )
    }

    fn secret_hash_for(&self, username: &str) -> Option<String> {
        self.client_secret
            .as_ref()
            .map(|secret| secret_hash(username, &self.client_id, secret))
    }
}

#[async_trait::async_trait]
impl IdentityProvider for CognitoIdentityProvider {
    #[instrument(skip_all)]
    async fn sign_up(
        &self,
        username: &str,
        password: &SecretString,
        attributes: &[UserAttribute],
    ) -> Result<SignUpOutcome, IdpError> {
        let output = self
            .client
            .sign_up()
            .client_id(&self.client_id)
            .username(username)
            .password(password.expose_secret())
            .set_user_attributes(Some(to_sdk_attributes(attributes)?))
            .set_secret_hash(self.secret_hash_for(username))
            .send()
            .await
            .map_err(|e| classify("sign_up", e))?;

        Ok(SignUpOutcome {
            user_sub: output.user_sub().to_string(),
            confirmed: output.user_confirmed(),
        })
    }

    #[instrument(skip_all)]
    async fn confirm_sign_up(&self, username: &str, code: &str) -> Result<(), IdpError> {
        self.client
            .confirm_sign_up()
            .client_id(&self.client_id)
            .username(username)
            .confirmation_code(code)
            .set_secret_hash(self.secret_hash_for(username))
            .send()
            .await
            .map_err(|e| classify("confirm_sign_up", e))?;
        Ok(())
    }

    #[instrument(skip_all)]
    async fn initiate_password_auth(
        &self,
        username: &str,
        password: &SecretString,
    ) -> Result<AuthTokens, IdpError> {
        let mut request = self
            .client
            .initiate_auth()
            .client_id(&self.client_id)
            .auth_flow(AuthFlowType::UserPasswordAuth)
            .auth_parameters("USERNAME", username)
            .auth_parameters("PASSWORD", password.expose_secret());
        if let Some(hash) = self.secret_hash_for(username) {
            request = request.auth_parameters("SECRET_HASH", hash);
        }

        let output = request
            .send()
            .await
            .map_err(|e| classify("initiate_password_auth", e))?;

        to_tokens(output.authentication_result())
    }

    #[instrument(skip_all)]
    async fn initiate_refresh_auth(
        &self,
        username: &str,
        refresh_token: &SecretString,
    ) -> Result<AuthTokens, IdpError> {
        let mut request = self
            .client
            .initiate_auth()
            .client_id(&self.client_id)
            .auth_flow(AuthFlowType::RefreshTokenAuth)
            .auth_parameters("REFRESH_TOKEN", refresh_token.expose_secret());
        if let Some(hash) = self.secret_hash_for(username) {
            request = request.auth_parameters("SECRET_HASH", hash);
        }

        let output = request
            .send()
            .await
            .map_err(|e| classify("initiate_refresh_auth", e))?;

        to_tokens(output.authentication_result())
    }

    #[instrument(skip_all)]
    async fn get_user(&self, access_token: &SecretString) -> Result<UserProfile, IdpError> {
        let output = self
            .client
            .get_user()
            .access_token(access_token.expose_secret())
            .send()
            .await
            .map_err(|e| classify("get_user", e))?;

        let attributes: Vec<UserAttribute> = output
            .user_attributes()
            .iter()
            .filter_map(|attr| {
                attr.value()
                    .map(|value| UserAttribute::new(attr.name(), value))
            })
            .collect();

        Ok(UserProfile::from_attributes(
            output.username().to_string(),
            &attributes,
        ))
    }

    #[instrument(skip_all)]
    async fn admin_update_user_attributes(
        &self,
        username: &str,
        attributes: &[UserAttribute],
    ) -> Result<(), IdpError> {
        self.client
            .admin_update_user_attributes()
            .user_pool_id(&self.user_pool_id)
            .username(username)
            .set_user_attributes(Some(to_sdk_attributes(attributes)?))
            .send()
            .await
            .map_err(|e| classify("admin_update_user_attributes", e))?;
        Ok(())
    }

    #[instrument(skip_all)]
    async fn admin_reset_user_password(&self, username: &str) -> Result<(), IdpError> {
        self.client
            .admin_reset_user_password()
            .user_pool_id(&self.user_pool_id)
            .username(username)
            .send()
            .await
            .map_err(|e| classify("admin_reset_user_password", e))?;
        Ok(())
    }

    #[instrument(skip_all)]
    async fn confirm_forgot_password(
        &self,
        username: &str,
        code: &str,
        password: &SecretString,
    ) -> Result<(), IdpError> {
        self.client
            .confirm_forgot_password()
            .client_id(&self.client_id)
            .username(username)
            .confirmation_code(code)
            .password(password.expose_secret())
            .set_secret_hash(self.secret_hash_for(username))
            .send()
            .await
            .map_err(|e| classify("confirm_forgot_password", e))?;
        Ok(())
    }

    #[instrument(skip_all)]
    async fn admin_delete_user(&self, username: &str) -> Result<(), IdpError> {
        self.client
            .admin_delete_user()
            .user_pool_id(&self.user_pool_id)
            .username(username)
            .send()
            .await
            .map_err(|e| classify("admin_delete_user", e))?;
        Ok(())
    }

    #[instrument(skip_all)]
    async fn resend_confirmation_code(&self, username: &str) -> Result<(), IdpError> {
        self.client
            .resend_confirmation_code()
            .client_id(&self.client_id)
            .username(username)
            .set_secret_hash(self.secret_hash_for(username))
            .send()
            .await
            .map_err(|e| classify("resend_confirmation_code", e))?;
        Ok(())
    }
}
