use derive_more::Display;
use reqwest::header::CONTENT_TYPE;
use serde::Deserialize;
use serde_json::{Value as JsonValue, json};
use url::Url;

use crate::config::ClientConfig;
use crate::error::Error;
use crate::types::TokenSet;

const TARGET_PREFIX: &str = "AWSCognitoIdentityProviderService";
const AMZ_JSON: &str = "application/x-amz-json-1.1";

/// Categorized identity-provider failure.
#[derive(Debug, Clone, PartialEq, Eq, Display)]
#[non_exhaustive]
pub enum IdpErrorKind {
    #[display("not_authorized")]
    NotAuthorized,
    #[display("account_deactivated")]
    AccountDeactivated,
    #[display("user_not_confirmed")]
    UserNotConfirmed,
    #[display("user_not_found")]
    UserNotFound,
    #[display("password_reset_required")]
    PasswordResetRequired,
    #[display("new_password_required")]
    NewPasswordRequired,
    #[display("code_mismatch")]
    CodeMismatch,
    #[display("code_expired")]
    CodeExpired,
    #[display("invalid_password")]
    InvalidPassword,
    #[display("username_exists")]
    UsernameExists,
    #[display("invalid_parameter")]
    InvalidParameter,
    #[display("code_delivery_failure")]
    CodeDeliveryFailure,
    #[display("limit_exceeded")]
    LimitExceeded,
    #[display("unknown({_0})")]
    Unknown(String),
}

impl IdpErrorKind {
    /// Classify a provider error code such as `NotAuthorizedException`.
    ///
    /// Codes may arrive namespaced (`com.amazonaws...#CodeMismatchException`).
    /// `message` distinguishes a disabled account from bad credentials.
    #[must_use]
    pub fn classify(code: &str, message: &str) -> Self {
        let code = code.rsplit('#').next().unwrap_or(code);
        match code {
            "NotAuthorizedException" if message.contains("User is disabled") => {
                Self::AccountDeactivated
            }
            "NotAuthorizedException" => Self::NotAuthorized,
            "UserLambdaValidationException" | "InvalidUserPoolConfigurationException" => {
                Self::AccountDeactivated
            }
            "UserNotConfirmedException" => Self::UserNotConfirmed,
            "UserNotFoundException" => Self::UserNotFound,
            "PasswordResetRequiredException" => Self::PasswordResetRequired,
            "NEW_PASSWORD_REQUIRED" => Self::NewPasswordRequired,
            "CodeMismatchException" => Self::CodeMismatch,
            "ExpiredCodeException" => Self::CodeExpired,
            "InvalidPasswordException" => Self::InvalidPassword,
            "UsernameExistsException" => Self::UsernameExists,
            "InvalidParameterException" => Self::InvalidParameter,
            "CodeDeliveryFailureException" => Self::CodeDeliveryFailure,
            "LimitExceededException" | "TooManyRequestsException" => Self::LimitExceeded,
            other => Self::Unknown(other.to_owned()),
        }
    }

    /// Message suitable for showing on the login/sign-up surfaces.
    #[must_use]
    pub fn user_message(&self) -> &'static str {
        match self {
            Self::NotAuthorized => "Incorrect username or password.",
            Self::AccountDeactivated => "This account has been deactivated.",
            Self::UserNotConfirmed => "Your account is not confirmed yet. Check your email.",
            Self::UserNotFound => "No account exists with that username.",
            Self::PasswordResetRequired => {
                "A password reset is required. Use \"Forgot password\"."
            }
            Self::NewPasswordRequired => "A new password must be set. Contact an administrator.",
            Self::CodeMismatch => "The verification code is incorrect.",
            Self::CodeExpired => "The verification code has expired. Request a new one.",
            Self::InvalidPassword => "The password does not meet the password policy.",
            Self::UsernameExists => "That username is already taken.",
            Self::InvalidParameter => "Some of the submitted values are invalid.",
            Self::CodeDeliveryFailure => "The verification email could not be sent.",
            Self::LimitExceeded => "Too many attempts. Please try again later.",
            Self::Unknown(_) => "The request could not be completed. Please try again.",
        }
    }
}

/// Result of a sign-up request.
#[derive(Debug, Clone, Deserialize)]
#[non_exhaustive]
pub struct SignUpResult {
    #[serde(rename = "UserConfirmed", default)]
    pub user_confirmed: bool,
    #[serde(rename = "UserSub", default)]
    pub user_sub: Option<String>,
}

#[derive(Deserialize)]
struct InitiateAuthResponse {
    #[serde(rename = "AuthenticationResult", default)]
    authentication_result: Option<AuthenticationResult>,
    #[serde(rename = "ChallengeName", default)]
    challenge_name: Option<String>,
}

#[derive(Deserialize)]
struct AuthenticationResult {
    #[serde(rename = "IdToken", default)]
    id_token: String,
    #[serde(rename = "AccessToken", default)]
    access_token: String,
    #[serde(rename = "RefreshToken", default)]
    refresh_token: String,
}

#[derive(Deserialize)]
struct ProviderError {
    #[serde(rename = "__type", default)]
    kind: String,
    #[serde(alias = "Message", default)]
    message: String,
}

/// Client for the hosted identity provider.
///
/// Tokens come back as a canonical [`TokenSet`]; hand them to
/// [`SessionManager::establish`](crate::SessionManager::establish).
pub struct IdentityClient {
    endpoint: Url,
    client_id: String,
    verify_url: Option<Url>,
    http: reqwest::Client,
}

impl IdentityClient {
    #[must_use]
    pub fn new(config: &ClientConfig) -> Self {
        Self {
            endpoint: config.idp_endpoint().clone(),
            client_id: config.idp_client_id().to_owned(),
            verify_url: config.username_email_verify_url().cloned(),
            http: reqwest::Client::new(),
        }
    }

    /// Use a custom HTTP client (for connection pool reuse or testing).
    #[must_use]
    pub fn with_http_client(mut self, client: reqwest::Client) -> Self {
        self.http = client;
        self
    }

    /// Password sign-in.
    ///
    /// # Errors
    ///
    /// [`Error::Identity`] for provider rejections, including challenges
    /// such as `NEW_PASSWORD_REQUIRED` that this client cannot answer;
    /// [`Error::Http`] on network failure.
    pub async fn sign_in(&self, username: &str, password: &str) -> Result<TokenSet, Error> {
        let body = json!({
            "AuthFlow": "USER_PASSWORD_AUTH",
            "ClientId": self.client_id,
            "AuthParameters": { "USERNAME": username, "PASSWORD": password },
        });
        let response = self.request("InitiateAuth", &body).send().await?;
        Self::read_sign_in(response).await
    }

    async fn read_sign_in(response: reqwest::Response) -> Result<TokenSet, Error> {
        let response = Self::ensure_success(response, "InitiateAuth").await?;
        let response: InitiateAuthResponse = Self::read_json(response).await?;

        if let Some(result) = response.authentication_result {
            tracing::info!("Identity provider sign-in succeeded");
            return Ok(TokenSet::new(
                result.id_token,
                result.access_token,
                result.refresh_token,
            ));
        }

        let challenge = response.challenge_name.unwrap_or_default();
        tracing::warn!(challenge = %challenge, "Sign-in ended in an unsupported challenge");
        let kind = IdpErrorKind::classify(&challenge, "");
        Err(Error::Identity {
            message: kind.user_message().to_owned(),
            kind,
        })
    }

    /// Register a new account. A confirmation code is mailed to `email`.
    ///
    /// # Errors
    ///
    /// [`Error::Identity`] or [`Error::Http`].
    pub async fn sign_up(
        &self,
        username: &str,
        email: &str,
        password: &str,
    ) -> Result<SignUpResult, Error> {
        let body = json!({
            "ClientId": self.client_id,
            "Username": username,
            "Password": password,
            "UserAttributes": [{ "Name": "email", "Value": email }],
        });
        self.call("SignUp", &body).await
    }

    /// Confirm a registration with the mailed code.
    ///
    /// # Errors
    ///
    /// [`Error::Identity`] or [`Error::Http`].
    pub async fn confirm_sign_up(&self, username: &str, code: &str) -> Result<(), Error> {
        let body = json!({
            "ClientId": self.client_id,
            "Username": username,
            "ConfirmationCode": code,
        });
        self.call::<JsonValue>("ConfirmSignUp", &body).await?;
        Ok(())
    }

    /// # Errors
    ///
    /// [`Error::Identity`] or [`Error::Http`].
    pub async fn resend_confirmation_code(&self, username: &str) -> Result<(), Error> {
        let body = json!({ "ClientId": self.client_id, "Username": username });
        self.call::<JsonValue>("ResendConfirmationCode", &body).await?;
        Ok(())
    }

    /// Check that `username` belongs to `email` before starting a reset.
    ///
    /// Asks the backend configured with
    /// [`with_username_email_verify_url`](ClientConfig::with_username_email_verify_url).
    /// Without one there is nothing to check and the answer is `true`. A
    /// failed call, a non-2xx status or `{"valid": false}` is `false`.
    pub async fn verify_username_email(&self, username: &str, email: &str) -> bool {
        let Some(url) = &self.verify_url else {
            return true;
        };
        let request = self
            .http
            .post(url.clone())
            .json(&json!({ "username": username, "email": email }));
        match request.send().await {
            Ok(response) => Self::read_verification(response).await,
            Err(e) => {
                tracing::warn!(error = %e, "Username/email verification call failed");
                false
            }
        }
    }

    async fn read_verification(response: reqwest::Response) -> bool {
        if !response.status().is_success() {
            tracing::info!(status = response.status().as_u16(), "Username/email verification rejected");
            return false;
        }
        let body: JsonValue = response.json().await.unwrap_or_default();
        body.get("valid") != Some(&JsonValue::Bool(false))
    }

    /// Start a password reset; the provider mails a code.
    ///
    /// # Errors
    ///
    /// [`Error::Identity`] or [`Error::Http`].
    pub async fn forgot_password(&self, username: &str) -> Result<(), Error> {
        let body = json!({ "ClientId": self.client_id, "Username": username });
        self.call::<JsonValue>("ForgotPassword", &body).await?;
        Ok(())
    }

    /// Finish a password reset.
    ///
    /// # Errors
    ///
    /// [`Error::Identity`] or [`Error::Http`].
    pub async fn confirm_forgot_password(
        &self,
        username: &str,
        code: &str,
        new_password: &str,
    ) -> Result<(), Error> {
        let body = json!({
            "ClientId": self.client_id,
            "Username": username,
            "ConfirmationCode": code,
            "Password": new_password,
        });
        self.call::<JsonValue>("ConfirmForgotPassword", &body).await?;
        Ok(())
    }

    fn request(&self, operation: &str, body: &JsonValue) -> reqwest::RequestBuilder {
        self.http
            .post(self.endpoint.clone())
            .header("X-Amz-Target", format!("{TARGET_PREFIX}.{operation}"))
            .header(CONTENT_TYPE, AMZ_JSON)
            .body(body.to_string())
    }

    async fn call<T: serde::de::DeserializeOwned>(
        &self,
        operation: &'static str,
        body: &JsonValue,
    ) -> Result<T, Error> {
        let response = self.request(operation, body).send().await?;
        let response = Self::ensure_success(response, operation).await?;
        Self::read_json(response).await
    }

    async fn read_json<T: serde::de::DeserializeOwned>(
        response: reqwest::Response,
    ) -> Result<T, Error> {
        let bytes = response.bytes().await?;
        Ok(serde_json::from_slice(&bytes)?)
    }

    /// Returns the response on success, or the classified provider error.
    async fn ensure_success(
        response: reqwest::Response,
        operation: &'static str,
    ) -> Result<reqwest::Response, Error> {
        if response.status().is_success() {
            return Ok(response);
        }
        let status = response.status().as_u16();
        let body = response.text().await.unwrap_or_default();
        let parsed: ProviderError = serde_json::from_str(&body).unwrap_or(ProviderError {
            kind: String::new(),
            message: body,
        });

        let kind = IdpErrorKind::classify(&parsed.kind, &parsed.message);
        tracing::warn!(operation, status, kind = %kind, "Identity provider rejected request");
        let message = match kind {
            IdpErrorKind::Unknown(_) if !parsed.message.is_empty() => parsed.message,
            _ => kind.user_message().to_owned(),
        };
        Err(Error::Identity { kind, message })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client() -> IdentityClient {
        let config = ClientConfig::new("ap-northeast-2", "client-abc").unwrap();
        IdentityClient::new(&config)
    }

    fn response(status: u16, body: &str) -> reqwest::Response {
        http::Response::builder()
            .status(status)
            .body(body.to_owned())
            .unwrap()
            .into()
    }

    #[test]
    fn test_classify_codes() {
        assert_eq!(
            IdpErrorKind::classify("NotAuthorizedException", "Incorrect username or password."),
            IdpErrorKind::NotAuthorized
        );
        assert_eq!(
            IdpErrorKind::classify("NotAuthorizedException", "User is disabled."),
            IdpErrorKind::AccountDeactivated
        );
        assert_eq!(
            IdpErrorKind::classify("UserLambdaValidationException", ""),
            IdpErrorKind::AccountDeactivated
        );
        assert_eq!(
            IdpErrorKind::classify("ExpiredCodeException", ""),
            IdpErrorKind::CodeExpired
        );
        assert_eq!(
            IdpErrorKind::classify("NEW_PASSWORD_REQUIRED", ""),
            IdpErrorKind::NewPasswordRequired
        );
        assert_eq!(
            IdpErrorKind::classify("SomethingNew", ""),
            IdpErrorKind::Unknown("SomethingNew".into())
        );
    }

    #[test]
    fn test_classify_namespaced_code() {
        assert_eq!(
            IdpErrorKind::classify(
                "com.amazonaws.cognito.identity.idp.model#CodeMismatchException",
                ""
            ),
            IdpErrorKind::CodeMismatch
        );
    }

    #[test]
    fn test_request_shape() {
        let req = client()
            .request("InitiateAuth", &json!({ "ClientId": "client-abc" }))
            .build()
            .unwrap();

        assert_eq!(req.method(), reqwest::Method::POST);
        assert_eq!(
            req.url().as_str(),
            "https://cognito-idp.ap-northeast-2.amazonaws.com/"
        );
        assert_eq!(
            req.headers()["x-amz-target"],
            "AWSCognitoIdentityProviderService.InitiateAuth"
        );
        assert_eq!(req.headers()[CONTENT_TYPE], AMZ_JSON);
    }

    #[tokio::test]
    async fn test_sign_in_response_maps_to_token_set() {
        let body = r#"{"AuthenticationResult":{"IdToken":"i","AccessToken":"a","RefreshToken":"r","ExpiresIn":3600}}"#;
        let tokens = IdentityClient::read_sign_in(response(200, body)).await.unwrap();
        assert_eq!(tokens, TokenSet::new("i", "a", "r"));
    }

    #[tokio::test]
    async fn test_sign_in_challenge_is_identity_error() {
        let body = r#"{"ChallengeName":"NEW_PASSWORD_REQUIRED","Session":"abc"}"#;
        let err = IdentityClient::read_sign_in(response(200, body))
            .await
            .unwrap_err();

        match err {
            Error::Identity { kind, message } => {
                assert_eq!(kind, IdpErrorKind::NewPasswordRequired);
                assert_eq!(message, IdpErrorKind::NewPasswordRequired.user_message());
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_sign_in_disabled_account() {
        let body = r#"{"__type":"NotAuthorizedException","message":"User is disabled."}"#;
        let err = IdentityClient::read_sign_in(response(400, body))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            Error::Identity { kind: IdpErrorKind::AccountDeactivated, .. }
        ));
    }

    #[tokio::test]
    async fn test_verification_skipped_without_url() {
        assert!(client().verify_username_email("ann", "ann@example.com").await);
    }

    #[tokio::test]
    async fn test_verification_reads_valid_flag() {
        assert!(!IdentityClient::read_verification(response(200, r#"{"valid":false}"#)).await);
        assert!(IdentityClient::read_verification(response(200, r#"{"valid":true}"#)).await);
        assert!(IdentityClient::read_verification(response(200, "not json")).await);
        assert!(!IdentityClient::read_verification(response(404, "")).await);
    }

    #[tokio::test]
    async fn test_error_body_is_classified() {
        let response = response(
            400,
            r#"{"__type":"UserNotConfirmedException","message":"User is not confirmed."}"#,
        );
        let err = IdentityClient::ensure_success(response, "InitiateAuth")
            .await
            .unwrap_err();

        match err {
            Error::Identity { kind, message } => {
                assert_eq!(kind, IdpErrorKind::UserNotConfirmed);
                assert_eq!(message, IdpErrorKind::UserNotConfirmed.user_message());
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_unknown_error_keeps_provider_message() {
        let response = response(500, "upstream exploded");
        let err = IdentityClient::ensure_success(response, "SignUp")
            .await
            .unwrap_err();

        match err {
            Error::Identity { kind, message } => {
                assert_eq!(kind, IdpErrorKind::Unknown(String::new()));
                assert_eq!(message, "upstream exploded");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_success_passes_through() {
        let response: reqwest::Response = http::Response::builder()
            .status(200)
            .body("{}".to_owned())
            .unwrap()
            .into();
        assert!(IdentityClient::ensure_success(response, "ForgotPassword").await.is_ok());
    }
}
