use reqwest::Method;
use serde::Serialize;
use serde::de::DeserializeOwned;
use url::Url;

use super::{ApiClient, endpoint, ensure_success};
use crate::config::ClientConfig;
use crate::error::Error;
use crate::types::LossReason;

/// User service: profile management and account lifecycle.
///
/// Deleting or deactivating the account ends the local session too.
pub struct UserService {
    api: ApiClient,
    base: Url,
}

impl UserService {
    #[must_use]
    pub fn new(api: ApiClient, config: &ClientConfig) -> Self {
        Self::with_base_url(api, config.user_service_url().clone())
    }

    #[must_use]
    pub fn with_base_url(api: ApiClient, base: Url) -> Self {
        Self { api, base }
    }

    /// Register with the user service. Sent without session headers.
    ///
    /// # Errors
    ///
    /// [`Error::Remote`] or [`Error::Http`].
    pub async fn register<B: Serialize, T: DeserializeOwned>(
        &self,
        user: &B,
    ) -> Result<T, Error> {
        let req = self.register_request(user);
        self.api.send_json(req, "register").await
    }

    /// # Errors
    ///
    /// [`Error::Remote`] or [`Error::Http`].
    pub async fn my_profile<T: DeserializeOwned>(&self) -> Result<T, Error> {
        let req = self.api.request(Method::GET, self.me_url());
        self.api.send_json(req, "get profile").await
    }

    /// # Errors
    ///
    /// [`Error::Remote`] or [`Error::Http`].
    pub async fn update_profile<B: Serialize, T: DeserializeOwned>(
        &self,
        patch: &B,
    ) -> Result<T, Error> {
        let req = self.api.request(Method::PATCH, self.me_url()).json(patch);
        self.api.send_json(req, "update profile").await
    }

    /// # Errors
    ///
    /// [`Error::Remote`] or [`Error::Http`].
    pub async fn change_password<B: Serialize, T: DeserializeOwned>(
        &self,
        change: &B,
    ) -> Result<T, Error> {
        let req = self.api.request(Method::PATCH, self.me_url()).json(change);
        self.api.send_json(req, "change password").await
    }

    /// Delete the account, then sign out locally.
    ///
    /// # Errors
    ///
    /// [`Error::Remote`] or [`Error::Http`]; the session is kept on failure.
    pub async fn delete_account(&self) -> Result<(), Error> {
        let req = self.api.request(Method::DELETE, self.me_url());
        self.api.send_empty(req, "delete account").await?;
        self.api.session().sign_out();
        Ok(())
    }

    /// Deactivate the account, then clear the session and return to login
    /// with reason `account_deactivated`.
    ///
    /// # Errors
    ///
    /// [`Error::Remote`] or [`Error::Http`]; the session is kept on failure.
    pub async fn deactivate_account(&self) -> Result<(), Error> {
        let response = self.deactivate_request().send().await?;
        self.finish_deactivate(response).await
    }

    async fn finish_deactivate(&self, response: reqwest::Response) -> Result<(), Error> {
        ensure_success(response, "deactivate account").await?;
        tracing::info!("Account deactivated");
        self.api.session().handle_loss(LossReason::AccountDeactivated);
        Ok(())
    }

    /// Tell the user service we are leaving, then sign out locally.
    ///
    /// The local sign-out happens even when the remote call fails.
    pub async fn logout(&self) {
        let req = self
            .api
            .request(Method::POST, endpoint(&self.base, "auth/logout"));
        if let Err(e) = self.api.send_empty(req, "logout").await {
            tracing::warn!(error = %e, "Remote logout failed");
        }
        self.api.session().sign_out();
    }

    fn register_request<B: Serialize>(&self, user: &B) -> reqwest::RequestBuilder {
        self.api
            .anonymous_request(Method::POST, endpoint(&self.base, "auth/register"))
            .json(user)
    }

    fn me_url(&self) -> String {
        endpoint(&self.base, "users/me")
    }

    fn deactivate_request(&self) -> reqwest::RequestBuilder {
        self.api.request(
            Method::POST,
            endpoint(&self.base, "api/v1/users/me/deactivate"),
        )
    }
}
