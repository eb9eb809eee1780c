use url::Url;

use crate::error::Error;

const DEFAULT_LOGIN_PATH: &str = "/login";
const DEFAULT_POST_SERVICE_URL: &str = "http://localhost:8082/api/v1";
const DEFAULT_COMMENT_SERVICE_URL: &str = "http://localhost:8083";
const DEFAULT_USER_SERVICE_URL: &str = "http://localhost:8081";

/// Board client configuration.
///
/// Required fields (`idp_region`, `idp_client_id`) are constructor
/// parameters. Everything else has a default and a `with_*` override.
///
/// Use [`from_env()`](ClientConfig::from_env) for convention-based setup.
#[derive(Debug, Clone)]
#[non_exhaustive]
pub struct ClientConfig {
    pub(crate) idp_region: String,
    pub(crate) idp_client_id: String,
    pub(crate) idp_endpoint: Url,
    pub(crate) post_service_url: Url,
    pub(crate) comment_service_url: Url,
    pub(crate) user_service_url: Url,
    pub(crate) login_path: String,
    pub(crate) username_email_verify_url: Option<Url>,
}

impl ClientConfig {
    /// # Errors
    ///
    /// Returns [`Error::Config`] if `region` does not form a valid endpoint host.
    pub fn new(region: impl Into<String>, client_id: impl Into<String>) -> Result<Self, Error> {
        let idp_region = region.into();
        let idp_endpoint = parse_url(
            "identity endpoint",
            &format!("https://cognito-idp.{idp_region}.amazonaws.com/"),
        )?;
        Ok(Self {
            idp_region,
            idp_client_id: client_id.into(),
            idp_endpoint,
            post_service_url: parse_url("post service", DEFAULT_POST_SERVICE_URL)?,
            comment_service_url: parse_url("comment service", DEFAULT_COMMENT_SERVICE_URL)?,
            user_service_url: parse_url("user service", DEFAULT_USER_SERVICE_URL)?,
            login_path: DEFAULT_LOGIN_PATH.into(),
            username_email_verify_url: None,
        })
    }

    /// Create config from environment variables.
    ///
    /// # Required env vars
    /// - `BOARD_IDP_REGION`: identity-provider region, e.g. `ap-northeast-2`
    /// - `BOARD_IDP_CLIENT_ID`: app client ID registered with the provider
    ///
    /// # Optional env vars
    /// - `BOARD_IDP_ENDPOINT`: override the identity-provider endpoint
    /// - `BOARD_POST_SERVICE_URL`, `BOARD_COMMENT_SERVICE_URL`, `BOARD_USER_SERVICE_URL`
    /// - `BOARD_LOGIN_PATH`: login entry point (default `/login`)
    /// - `BOARD_USERNAME_EMAIL_VERIFY_URL`: username/email check run before a
    ///   password reset (skipped when unset)
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if required env vars are missing or URLs are invalid.
    pub fn from_env() -> Result<Self, Error> {
        let region = std::env::var("BOARD_IDP_REGION")
            .map_err(|_| Error::Config("BOARD_IDP_REGION is required".into()))?;
        let client_id = std::env::var("BOARD_IDP_CLIENT_ID")
            .map_err(|_| Error::Config("BOARD_IDP_CLIENT_ID is required".into()))?;

        let mut config = Self::new(region, client_id)?;

        if let Ok(s) = std::env::var("BOARD_IDP_ENDPOINT") {
            config = config.with_idp_endpoint(parse_url("BOARD_IDP_ENDPOINT", &s)?);
        }
        if let Ok(s) = std::env::var("BOARD_POST_SERVICE_URL") {
            config = config.with_post_service_url(parse_url("BOARD_POST_SERVICE_URL", &s)?);
        }
        if let Ok(s) = std::env::var("BOARD_COMMENT_SERVICE_URL") {
            config = config.with_comment_service_url(parse_url("BOARD_COMMENT_SERVICE_URL", &s)?);
        }
        if let Ok(s) = std::env::var("BOARD_USER_SERVICE_URL") {
            config = config.with_user_service_url(parse_url("BOARD_USER_SERVICE_URL", &s)?);
        }
        if let Ok(path) = std::env::var("BOARD_LOGIN_PATH") {
            config = config.with_login_path(path);
        }
        if let Ok(s) = std::env::var("BOARD_USERNAME_EMAIL_VERIFY_URL") {
            config = config.with_username_email_verify_url(parse_url(
                "BOARD_USERNAME_EMAIL_VERIFY_URL",
                &s,
            )?);
        }

        Ok(config)
    }

    #[must_use]
    pub fn with_idp_endpoint(mut self, url: Url) -> Self {
        self.idp_endpoint = url;
        self
    }

    #[must_use]
    pub fn with_post_service_url(mut self, url: Url) -> Self {
        self.post_service_url = url;
        self
    }

    #[must_use]
    pub fn with_comment_service_url(mut self, url: Url) -> Self {
        self.comment_service_url = url;
        self
    }

    #[must_use]
    pub fn with_user_service_url(mut self, url: Url) -> Self {
        self.user_service_url = url;
        self
    }

    /// Login entry point the loss handler redirects to.
    #[must_use]
    pub fn with_login_path(mut self, path: impl Into<String>) -> Self {
        self.login_path = path.into();
        self
    }

    /// Backend endpoint that checks a username belongs to an email address.
    #[must_use]
    pub fn with_username_email_verify_url(mut self, url: Url) -> Self {
        self.username_email_verify_url = Some(url);
        self
    }

    #[must_use]
    pub fn idp_region(&self) -> &str {
        &self.idp_region
    }

    #[must_use]
    pub fn idp_client_id(&self) -> &str {
        &self.idp_client_id
    }

    #[must_use]
    pub fn idp_endpoint(&self) -> &Url {
        &self.idp_endpoint
    }

    #[must_use]
    pub fn post_service_url(&self) -> &Url {
        &self.post_service_url
    }

    #[must_use]
    pub fn comment_service_url(&self) -> &Url {
        &self.comment_service_url
    }

    #[must_use]
    pub fn user_service_url(&self) -> &Url {
        &self.user_service_url
    }

    #[must_use]
    pub fn login_path(&self) -> &str {
        &self.login_path
    }

    #[must_use]
    pub fn username_email_verify_url(&self) -> Option<&Url> {
        self.username_email_verify_url.as_ref()
    }
}

fn parse_url(what: &str, raw: &str) -> Result<Url, Error> {
    raw.parse()
        .map_err(|e| Error::Config(format!("{what}: {e}")))
}
