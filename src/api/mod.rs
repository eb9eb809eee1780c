//! REST wrappers for the board's post, comment and user services.
//!
//! Every call takes its headers from the session's
//! [`HeaderBuilder`](crate::HeaderBuilder). A 2xx response is success;
//! anything else becomes [`Error::Remote`] carrying the server's `message`
//! when the body has one. Nothing here retries or redirects: reacting to a
//! 401 is the caller's decision.
//!
//! Response bodies are deserialized into whatever the caller asks for,
//! `serde_json::Value` included.

mod comments;
mod posts;
mod users;

pub use comments::{CommentQuery, CommentService};
pub use posts::{ImageUpload, PostQuery, PostService, validate_image};
pub use users::UserService;

use http::HeaderMap;
use reqwest::Method;
use serde::de::DeserializeOwned;
use url::Url;

use crate::error::Error;
use crate::manager::SessionManager;

/// Shared HTTP plumbing for the service wrappers.
#[derive(Clone)]
pub struct ApiClient {
    http: reqwest::Client,
    session: SessionManager,
}

impl ApiClient {
    #[must_use]
    pub fn new(session: SessionManager) -> Self {
        Self {
            http: reqwest::Client::new(),
            session,
        }
    }

    /// Use a custom HTTP client (for timeouts, connection pool reuse or testing).
    #[must_use]
    pub fn with_http_client(mut self, client: reqwest::Client) -> Self {
        self.http = client;
        self
    }

    #[must_use]
    pub fn session(&self) -> &SessionManager {
        &self.session
    }

    /// Request carrying the session headers.
    pub(crate) fn request(&self, method: Method, url: String) -> reqwest::RequestBuilder {
        self.request_with(method, url, self.session.build_headers(&HeaderMap::new()))
    }

    pub(crate) fn request_with(
        &self,
        method: Method,
        url: String,
        headers: HeaderMap,
    ) -> reqwest::RequestBuilder {
        self.http.request(method, url).headers(headers)
    }

    /// Request without session headers, for calls made before signing in.
    pub(crate) fn anonymous_request(&self, method: Method, url: String) -> reqwest::RequestBuilder {
        self.http.request(method, url)
    }

    /// Like [`request`](Self::request), but refuses to build without a token.
    pub(crate) fn authed_request(
        &self,
        method: Method,
        url: String,
    ) -> Result<reqwest::RequestBuilder, Error> {
        if self.session.get_token().is_none() {
            tracing::warn!(url = %url, "Refusing to call without a session token");
            return Err(Error::Unauthenticated);
        }
        Ok(self.request(method, url))
    }

    pub(crate) async fn send_json<T: DeserializeOwned>(
        &self,
        request: reqwest::RequestBuilder,
        operation: &'static str,
    ) -> Result<T, Error> {
        let response = request.send().await?;
        let response = ensure_success(response, operation).await?;
        Ok(response.json::<T>().await?)
    }

    pub(crate) async fn send_empty(
        &self,
        request: reqwest::RequestBuilder,
        operation: &'static str,
    ) -> Result<(), Error> {
        let response = request.send().await?;
        ensure_success(response, operation).await?;
        Ok(())
    }
}

/// Joins `path` onto `base` without dropping the base's last segment.
pub(crate) fn endpoint(base: &Url, path: &str) -> String {
    format!(
        "{}/{}",
        base.as_str().trim_end_matches('/'),
        path.trim_start_matches('/')
    )
}

/// Rejects ids that would produce paths like `/posts//media`.
pub(crate) fn require_id<'a>(what: &str, id: &'a str) -> Result<&'a str, Error> {
    let trimmed = id.trim();
    if trimmed.is_empty() || trimmed == "null" || trimmed == "undefined" {
        return Err(Error::InvalidInput(format!("{what} is empty")));
    }
    Ok(trimmed)
}

/// Returns the response on 2xx, otherwise [`Error::Remote`].
pub(crate) async fn ensure_success(
    response: reqwest::Response,
    operation: &'static str,
) -> Result<reqwest::Response, Error> {
    if response.status().is_success() {
        return Ok(response);
    }
    let status = response.status().as_u16();
    let body = response.text().await.unwrap_or_default();
    let message = serde_json::from_str::<serde_json::Value>(&body)
        .ok()
        .and_then(|v| v.get("message")?.as_str().map(str::to_owned))
        .filter(|m| !m.is_empty())
        .unwrap_or_else(|| {
            if body.is_empty() {
                format!("HTTP {status}")
            } else {
                body
            }
        });

    tracing::error!(operation, status, message = %message, "Remote call failed");
    Err(Error::Remote {
        operation,
        status,
        message,
    })
}


#[cfg(test)]
mod tests {
    use http::header::{AUTHORIZATION, CONTENT_TYPE};

    use super::testing::{client, response};
    use super::*;

    #[test]
    fn test_endpoint_keeps_base_path() {
        let base: Url = "https://api.example.com/api/v1".parse().unwrap();
        assert_eq!(endpoint(&base, "/posts/3"), "https://api.example.com/api/v1/posts/3");

        let base: Url = "https://api.example.com/".parse().unwrap();
        assert_eq!(endpoint(&base, "users/me"), "https://api.example.com/users/me");
    }

    #[test]
    fn test_require_id() {
        assert_eq!(require_id("post id", " 42 ").unwrap(), "42");
        for bad in ["", "   ", "null", "undefined"] {
            assert!(matches!(require_id("post id", bad), Err(Error::InvalidInput(_))));
        }
    }

    #[test]
    fn test_request_carries_session_headers() {
        let (api, _) = client(true);
        let req = api
            .request(Method::GET, "https://api.example.com/posts".into())
            .build()
            .unwrap();
        assert_eq!(req.headers()[CONTENT_TYPE], "application/json");
        let auth = req.headers()[AUTHORIZATION].to_str().unwrap();
        assert!(auth.starts_with("Bearer "));
    }

    #[test]
    fn test_authed_request_requires_token() {
        let (api, nav) = client(false);
        let err = api
            .authed_request(Method::GET, "https://api.example.com/comments/my".into())
            .unwrap_err();
        assert!(matches!(err, Error::Unauthenticated));
        assert!(nav.redirects().is_empty());
    }

    #[tokio::test]
    async fn test_error_message_from_json_body() {
        let err = ensure_success(response(403, r#"{"message":"not your post"}"#), "update post")
            .await
            .unwrap_err();
        match err {
            Error::Remote {
                operation,
                status,
                message,
            } => {
                assert_eq!(operation, "update post");
                assert_eq!(status, 403);
                assert_eq!(message, "not your post");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_error_message_fallbacks() {
        let err = ensure_success(response(502, ""), "get post").await.unwrap_err();
        assert!(matches!(err, Error::Remote { ref message, .. } if message == "HTTP 502"));

        let err = ensure_success(response(500, "boom"), "get post").await.unwrap_err();
        assert!(matches!(err, Error::Remote { ref message, .. } if message == "boom"));
    }

    #[tokio::test]
    async fn test_unauthorized_is_flagged() {
        let err = ensure_success(response(401, "{}"), "my posts").await.unwrap_err();
        assert!(err.is_unauthorized());
    }
}
