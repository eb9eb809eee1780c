use http::header::CONTENT_TYPE;
use reqwest::Method;
use reqwest::multipart::{Form, Part};
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::json;
use url::Url;

use super::{ApiClient, endpoint, require_id};
use crate::config::ClientConfig;
use crate::error::Error;

const MAX_IMAGE_BYTES: usize = 5 * 1024 * 1024;
const ALLOWED_IMAGE_TYPES: [&str; 5] = [
    "image/jpeg",
    "image/jpg",
    "image/png",
    "image/gif",
    "image/webp",
];

/// Board listing filters. Unset fields are left out of the query string.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PostQuery {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub page: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub size: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub search: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sort_by: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sort_order: Option<String>,
}

/// An image attached to a post.
#[derive(Debug, Clone)]
pub struct ImageUpload {
    pub file_name: String,
    pub content_type: String,
    pub bytes: Vec<u8>,
}

/// Checks an image against the upload limits (5 MiB; jpeg, png, gif, webp).
///
/// # Errors
///
/// Returns [`Error::InvalidInput`] naming the violated limit.
pub fn validate_image(size: usize, content_type: &str) -> Result<(), Error> {
    if size > MAX_IMAGE_BYTES {
        return Err(Error::InvalidInput("image must be 5 MB or smaller".into()));
    }
    if !ALLOWED_IMAGE_TYPES.contains(&content_type) {
        return Err(Error::InvalidInput(format!(
            "unsupported image type {content_type} (jpg, jpeg, png, gif, webp)"
        )));
    }
    Ok(())
}

/// Post service: board listing, post CRUD, likes and media.
pub struct PostService {
    api: ApiClient,
    base: Url,
}

impl PostService {
    #[must_use]
    pub fn new(api: ApiClient, config: &ClientConfig) -> Self {
        Self::with_base_url(api, config.post_service_url().clone())
    }

    #[must_use]
    pub fn with_base_url(api: ApiClient, base: Url) -> Self {
        Self { api, base }
    }

    /// # Errors
    ///
    /// [`Error::Remote`] on a non-2xx answer, [`Error::Http`] on network failure.
    pub async fn create<B: Serialize, T: DeserializeOwned>(&self, post: &B) -> Result<T, Error> {
        let req = self
            .api
            .request(Method::POST, endpoint(&self.base, "posts"))
            .json(post);
        self.api.send_json(req, "create post").await
    }

    /// # Errors
    ///
    /// [`Error::Remote`] or [`Error::Http`].
    pub async fn list<T: DeserializeOwned>(&self, query: &PostQuery) -> Result<T, Error> {
        let req = self.list_request(query);
        self.api.send_json(req, "list posts").await
    }

    /// # Errors
    ///
    /// [`Error::InvalidInput`] for an empty id, [`Error::Remote`] or [`Error::Http`].
    pub async fn get<T: DeserializeOwned>(&self, post_id: &str) -> Result<T, Error> {
        let url = self.post_url(post_id, "")?;
        self.api
            .send_json(self.api.request(Method::GET, url), "get post")
            .await
    }

    /// # Errors
    ///
    /// [`Error::InvalidInput`], [`Error::Remote`] or [`Error::Http`].
    pub async fn update<B: Serialize, T: DeserializeOwned>(
        &self,
        post_id: &str,
        patch: &B,
    ) -> Result<T, Error> {
        let url = self.post_url(post_id, "")?;
        let req = self.api.request(Method::PATCH, url).json(patch);
        self.api.send_json(req, "update post").await
    }

    /// # Errors
    ///
    /// [`Error::InvalidInput`], [`Error::Remote`] or [`Error::Http`].
    pub async fn delete(&self, post_id: &str) -> Result<(), Error> {
        let url = self.post_url(post_id, "")?;
        self.api
            .send_empty(self.api.request(Method::DELETE, url), "delete post")
            .await
    }

    /// # Errors
    ///
    /// [`Error::InvalidInput`], [`Error::Remote`] or [`Error::Http`].
    pub async fn like<T: DeserializeOwned>(&self, post_id: &str) -> Result<T, Error> {
        let req = self.like_request(post_id, "like")?;
        self.api.send_json(req, "like post").await
    }

    /// # Errors
    ///
    /// [`Error::InvalidInput`], [`Error::Remote`] or [`Error::Http`].
    pub async fn unlike<T: DeserializeOwned>(&self, post_id: &str) -> Result<T, Error> {
        let req = self.like_request(post_id, "unlike")?;
        self.api.send_json(req, "unlike post").await
    }

    /// Posts written by the signed-in user.
    ///
    /// # Errors
    ///
    /// [`Error::Remote`] or [`Error::Http`].
    pub async fn my_posts<T: DeserializeOwned>(
        &self,
        page: Option<u32>,
        size: Option<u32>,
    ) -> Result<T, Error> {
        let query = PostQuery {
            page,
            size,
            ..PostQuery::default()
        };
        let req = self
            .api
            .request(Method::GET, endpoint(&self.base, "posts/my"))
            .query(&query);
        self.api.send_json(req, "my posts").await
    }

    /// Whether the signed-in user may upload media.
    ///
    /// # Errors
    ///
    /// [`Error::Remote`] or [`Error::Http`].
    pub async fn check_media_permissions<T: DeserializeOwned>(&self) -> Result<T, Error> {
        let req = self.api.request(
            Method::GET,
            endpoint(&self.base, "posts/media/check-permissions"),
        );
        self.api.send_json(req, "check media permissions").await
    }

    /// Attach an image to a post as `multipart/form-data`.
    ///
    /// # Errors
    ///
    /// [`Error::InvalidInput`] for an empty id or an image outside the
    /// limits, [`Error::Remote`] or [`Error::Http`].
    pub async fn upload_image<T: DeserializeOwned>(
        &self,
        post_id: &str,
        image: ImageUpload,
    ) -> Result<T, Error> {
        let req = self.upload_request(post_id, image)?;
        self.api.send_json(req, "upload image").await
    }

    /// # Errors
    ///
    /// [`Error::InvalidInput`], [`Error::Remote`] or [`Error::Http`].
    pub async fn delete_image<T: DeserializeOwned>(
        &self,
        post_id: &str,
        media_id: &str,
    ) -> Result<T, Error> {
        let media_id = require_id("media id", media_id)?;
        let url = self.post_url(post_id, &format!("/media/{media_id}"))?;
        self.api
            .send_json(self.api.request(Method::DELETE, url), "delete image")
            .await
    }

    fn post_url(&self, post_id: &str, suffix: &str) -> Result<String, Error> {
        let post_id = require_id("post id", post_id)?;
        Ok(endpoint(&self.base, &format!("posts/{post_id}{suffix}")))
    }

    fn list_request(&self, query: &PostQuery) -> reqwest::RequestBuilder {
        self.api
            .request(Method::GET, endpoint(&self.base, "posts"))
            .query(query)
    }

    fn like_request(&self, post_id: &str, action: &str) -> Result<reqwest::RequestBuilder, Error> {
        let url = self.post_url(post_id, "")?;
        Ok(self
            .api
            .request(Method::PATCH, url)
            .json(&json!({ "action": action })))
    }

    fn upload_request(
        &self,
        post_id: &str,
        image: ImageUpload,
    ) -> Result<reqwest::RequestBuilder, Error> {
        let url = self.post_url(post_id, "/media")?;
        validate_image(image.bytes.len(), &image.content_type)?;

        let file_name = if image.file_name.is_empty() {
            "upload.bin".to_owned()
        } else {
            image.file_name
        };
        let part = Part::bytes(image.bytes)
            .file_name(file_name)
            .mime_str(&image.content_type)?;
        let form = Form::new().part("file", part);

        // the multipart encoder writes its own Content-Type with the boundary
        let mut headers = self.api.session().build_headers(&http::HeaderMap::new());
        headers.remove(CONTENT_TYPE);

        Ok(self
            .api
            .request_with(Method::POST, url, headers)
            .multipart(form))
    }
}

#[cfg(test)]
mod tests {
    use http::header::AUTHORIZATION;

    use super::*;
    use crate::api::testing::client;

    fn service(signed_in: bool) -> PostService {
        let (api, _) = client(signed_in);
        PostService::with_base_url(api, "https://api.example.com/api/v1".parse().unwrap())
    }

    fn png(len: usize) -> ImageUpload {
        ImageUpload {
            file_name: "cat.png".into(),
            content_type: "image/png".into(),
            bytes: vec![0u8; len],
        }
    }

    #[test]
    fn test_validate_image_limits() {
        assert!(validate_image(1024, "image/png").is_ok());
        assert!(validate_image(MAX_IMAGE_BYTES, "image/webp").is_ok());
        assert!(validate_image(MAX_IMAGE_BYTES + 1, "image/png").is_err());
        assert!(validate_image(10, "application/pdf").is_err());
    }

    #[test]
    fn test_list_query_skips_unset_fields() {
        let query = PostQuery {
            page: Some(2),
            search: Some("rust async".into()),
            sort_by: Some("createdAt".into()),
            ..PostQuery::default()
        };
        let req = service(false).list_request(&query).build().unwrap();

        assert_eq!(
            req.url().as_str(),
            "https://api.example.com/api/v1/posts?page=2&search=rust+async&sortBy=createdAt"
        );
        assert!(!req.headers().contains_key(AUTHORIZATION));
    }

    #[test]
    fn test_like_sends_action() {
        let req = service(true).like_request("7", "unlike").unwrap().build().unwrap();
        assert_eq!(req.method(), Method::PATCH);
        assert_eq!(req.url().path(), "/api/v1/posts/7");
        let body = req.body().and_then(|b| b.as_bytes()).unwrap();
        assert_eq!(body, br#"{"action":"unlike"}"#);
    }

    #[test]
    fn test_upload_uses_multipart_content_type() {
        let req = service(true).upload_request("7", png(16)).unwrap().build().unwrap();

        assert_eq!(req.url().path(), "/api/v1/posts/7/media");
        let content_type = req.headers()[CONTENT_TYPE].to_str().unwrap();
        assert!(content_type.starts_with("multipart/form-data; boundary="));
        assert_eq!(req.headers().get_all(CONTENT_TYPE).iter().count(), 1);
        assert!(req.headers().contains_key(AUTHORIZATION));
    }

    #[test]
    fn test_upload_rejects_bad_input_before_sending() {
        let svc = service(true);
        assert!(matches!(
            svc.upload_request("null", png(16)),
            Err(Error::InvalidInput(_))
        ));
        assert!(matches!(
            svc.upload_request("7", png(MAX_IMAGE_BYTES + 1)),
            Err(Error::InvalidInput(_))
        ));
    }

    #[test]
    fn test_post_url_rejects_empty_id() {
        assert!(matches!(service(true).post_url(" ", ""), Err(Error::InvalidInput(_))));
        assert_eq!(
            service(true).post_url("9", "/media/3").unwrap(),
            "https://api.example.com/api/v1/posts/9/media/3"
        );
    }
}
