use reqwest::Method;
use serde::Serialize;
use serde::de::DeserializeOwned;
use url::Url;

use super::{ApiClient, endpoint, require_id};
use crate::config::ClientConfig;
use crate::error::Error;

/// Comment listing filters. The comment service takes snake_case keys.
#[derive(Debug, Clone, Default, Serialize)]
pub struct CommentQuery {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub page: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub size: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sort_by: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sort_order: Option<String>,
}

/// Comment service. Every call needs a session token and fails with
/// [`Error::Unauthenticated`] before touching the network when there is none.
pub struct CommentService {
    api: ApiClient,
    base: Url,
}

impl CommentService {
    #[must_use]
    pub fn new(api: ApiClient, config: &ClientConfig) -> Self {
        Self::with_base_url(api, config.comment_service_url().clone())
    }

    #[must_use]
    pub fn with_base_url(api: ApiClient, base: Url) -> Self {
        Self { api, base }
    }

    /// # Errors
    ///
    /// [`Error::Unauthenticated`], [`Error::InvalidInput`], [`Error::Remote`] or [`Error::Http`].
    pub async fn create<B: Serialize, T: DeserializeOwned>(
        &self,
        post_id: &str,
        comment: &B,
    ) -> Result<T, Error> {
        let url = self.post_comments_url(post_id)?;
        let req = self.api.authed_request(Method::POST, url)?.json(comment);
        self.api.send_json(req, "create comment").await
    }

    /// # Errors
    ///
    /// [`Error::Unauthenticated`], [`Error::InvalidInput`], [`Error::Remote`] or [`Error::Http`].
    pub async fn list<T: DeserializeOwned>(
        &self,
        post_id: &str,
        query: &CommentQuery,
    ) -> Result<T, Error> {
        let req = self.list_request(post_id, query)?;
        self.api.send_json(req, "list comments").await
    }

    /// # Errors
    ///
    /// [`Error::Unauthenticated`], [`Error::InvalidInput`], [`Error::Remote`] or [`Error::Http`].
    pub async fn update<B: Serialize, T: DeserializeOwned>(
        &self,
        comment_id: &str,
        patch: &B,
    ) -> Result<T, Error> {
        let url = self.comment_url(comment_id, "")?;
        let req = self.api.authed_request(Method::PATCH, url)?.json(patch);
        self.api.send_json(req, "update comment").await
    }

    /// # Errors
    ///
    /// [`Error::Unauthenticated`], [`Error::InvalidInput`], [`Error::Remote`] or [`Error::Http`].
    pub async fn delete(&self, comment_id: &str) -> Result<(), Error> {
        let url = self.comment_url(comment_id, "")?;
        let req = self.api.authed_request(Method::DELETE, url)?;
        self.api.send_empty(req, "delete comment").await
    }

    /// Comments written by the signed-in user.
    ///
    /// # Errors
    ///
    /// [`Error::Unauthenticated`], [`Error::Remote`] or [`Error::Http`].
    pub async fn my_comments<T: DeserializeOwned>(
        &self,
        page: Option<u32>,
        size: Option<u32>,
    ) -> Result<T, Error> {
        let query = CommentQuery {
            page,
            size,
            ..CommentQuery::default()
        };
        let req = self
            .api
            .authed_request(Method::GET, endpoint(&self.base, "api/v1/comments/my"))?
            .query(&query);
        self.api.send_json(req, "my comments").await
    }

    /// Toggle the signed-in user's like on a comment.
    ///
    /// # Errors
    ///
    /// [`Error::Unauthenticated`], [`Error::InvalidInput`], [`Error::Remote`] or [`Error::Http`].
    pub async fn like<T: DeserializeOwned>(&self, comment_id: &str) -> Result<T, Error> {
        let url = self.comment_url(comment_id, "/like")?;
        let req = self.api.authed_request(Method::POST, url)?;
        self.api.send_json(req, "like comment").await
    }

    /// Same endpoint as [`like`](Self::like); the service toggles.
    ///
    /// # Errors
    ///
    /// [`Error::Unauthenticated`], [`Error::InvalidInput`], [`Error::Remote`] or [`Error::Http`].
    pub async fn unlike<T: DeserializeOwned>(&self, comment_id: &str) -> Result<T, Error> {
        let url = self.comment_url(comment_id, "/like")?;
        let req = self.api.authed_request(Method::POST, url)?;
        self.api.send_json(req, "unlike comment").await
    }

    /// # Errors
    ///
    /// [`Error::Unauthenticated`], [`Error::InvalidInput`], [`Error::Remote`] or [`Error::Http`].
    pub async fn like_status<T: DeserializeOwned>(&self, comment_id: &str) -> Result<T, Error> {
        let url = self.comment_url(comment_id, "/like/status")?;
        let req = self.api.authed_request(Method::GET, url)?;
        self.api.send_json(req, "comment like status").await
    }

    fn post_comments_url(&self, post_id: &str) -> Result<String, Error> {
        let post_id = require_id("post id", post_id)?;
        Ok(endpoint(&self.base, &format!("api/v1/posts/{post_id}/comments")))
    }

    fn comment_url(&self, comment_id: &str, suffix: &str) -> Result<String, Error> {
        let comment_id = require_id("comment id", comment_id)?;
        Ok(endpoint(
            &self.base,
            &format!("api/v1/comments/{comment_id}{suffix}"),
        ))
    }

    fn list_request(
        &self,
        post_id: &str,
        query: &CommentQuery,
    ) -> Result<reqwest::RequestBuilder, Error> {
        let url = self.post_comments_url(post_id)?;
        Ok(self.api.authed_request(Method::GET, url)?.query(query))
    }
}
