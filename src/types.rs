use std::fmt;
use std::str::FromStr;

use derive_more::{Display, From, Into};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value as JsonValue};

use crate::error::Error;

/// Identity-provider subject identifier (the `sub` claim).
///
/// Stable and unique per account. Collaborating services scope
/// "my posts" / "my comments" queries by this value.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, Display, From, Into)]
#[serde(transparent)]
pub struct SubjectId(pub String);

impl SubjectId {
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Bearer tokens issued by the identity provider.
///
/// Stored with snake_case keys only. The camelCase spellings some older
/// clients wrote are accepted when deserializing so a set can be normalized
/// at ingestion, but they are never produced.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenSet {
    #[serde(default, alias = "idToken")]
    pub id_token: String,
    #[serde(default, alias = "accessToken")]
    pub access_token: String,
    #[serde(default, alias = "refreshToken")]
    pub refresh_token: String,
}

impl TokenSet {
    #[must_use]
    pub fn new(
        id_token: impl Into<String>,
        access_token: impl Into<String>,
        refresh_token: impl Into<String>,
    ) -> Self {
        Self {
            id_token: id_token.into(),
            access_token: access_token.into(),
            refresh_token: refresh_token.into(),
        }
    }

    /// A set is usable when it carries an identity or an access token.
    #[must_use]
    pub fn is_usable(&self) -> bool {
        !self.id_token.is_empty() || !self.access_token.is_empty()
    }

    /// The token presented to remote services: `id_token` first, then `access_token`.
    #[must_use]
    pub fn bearer(&self) -> Option<&str> {
        [self.id_token.as_str(), self.access_token.as_str()]
            .into_iter()
            .find(|t| !t.is_empty())
    }
}

/// Profile derived from the identity token at login time.
///
/// Cached next to the [`TokenSet`] so views don't have to re-decode.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[non_exhaustive]
pub struct UserProfile {
    pub username: String,
    pub subject_id: SubjectId,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub raw_claims: Map<String, JsonValue>,
}

impl UserProfile {
    #[must_use]
    pub fn new(username: impl Into<String>, subject_id: SubjectId) -> Self {
        Self {
            username: username.into(),
            subject_id,
            email: None,
            raw_claims: Map::new(),
        }
    }

    #[must_use]
    pub fn with_email(mut self, email: impl Into<String>) -> Self {
        self.email = Some(email.into());
        self
    }

    #[must_use]
    pub fn with_raw_claims(mut self, claims: Map<String, JsonValue>) -> Self {
        self.raw_claims = claims;
        self
    }
}

/// Usability of the stored session, computed on demand and never persisted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Absent,
    Valid,
    Expired,
}

/// Reason code appended to the login redirect.
///
/// The login surface reads it back with
/// [`from_location`](Self::from_location) to explain why the user landed
/// there.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LossReason {
    SessionExpired,
    LoginRequired,
    AccountDeactivated,
}

impl LossReason {
    pub const ALL: [Self; 3] = [
        Self::SessionExpired,
        Self::LoginRequired,
        Self::AccountDeactivated,
    ];

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::SessionExpired => "session_expired",
            Self::LoginRequired => "login_required",
            Self::AccountDeactivated => "account_deactivated",
        }
    }

    #[must_use]
    pub fn from_code(code: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|r| r.as_str() == code)
    }

    /// Notice shown on the login page.
    #[must_use]
    pub fn user_message(self) -> &'static str {
        match self {
            Self::SessionExpired => "Your session has expired. Please sign in again.",
            Self::LoginRequired => "Please sign in to continue.",
            Self::AccountDeactivated => "This account has been deactivated.",
        }
    }

    /// Reads the `reason` query parameter of a login location such as
    /// `/login?reason=session_expired`. Unknown codes yield `None`.
    #[must_use]
    pub fn from_location(location: &str) -> Option<Self> {
        let before_fragment = location.split('#').next().unwrap_or_default();
        let (_, query) = before_fragment.split_once('?')?;
        url::form_urlencoded::parse(query.as_bytes())
            .find(|(key, _)| key == "reason")
            .and_then(|(_, code)| Self::from_code(&code))
    }
}

impl fmt::Display for LossReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LossReason {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_code(s).ok_or_else(|| Error::InvalidInput(format!("unknown loss reason: {s}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bearer_prefers_id_token() {
        let tokens = TokenSet::new("id", "access", "refresh");
        assert_eq!(tokens.bearer(), Some("id"));
    }

    #[test]
    fn test_bearer_falls_back_to_access_token() {
        let tokens = TokenSet::new("", "access", "refresh");
        assert_eq!(tokens.bearer(), Some("access"));
        assert!(tokens.is_usable());
    }

    #[test]
    fn test_refresh_only_set_is_not_usable() {
        let tokens = TokenSet::new("", "", "refresh");
        assert!(!tokens.is_usable());
        assert_eq!(tokens.bearer(), None);
    }

    #[test]
    fn test_token_set_accepts_camel_case_at_ingestion() {
        let json = r#"{"idToken":"a","accessToken":"b","refreshToken":"c"}"#;
        let tokens: TokenSet = serde_json::from_str(json).unwrap();
        assert_eq!(tokens, TokenSet::new("a", "b", "c"));

        let out = serde_json::to_string(&tokens).unwrap();
        assert_eq!(out, r#"{"id_token":"a","access_token":"b","refresh_token":"c"}"#);
    }

    #[test]
    fn test_token_set_missing_keys_default_to_empty() {
        let tokens: TokenSet = serde_json::from_str(r#"{"access_token":"b"}"#).unwrap();
        assert_eq!(tokens.id_token, "");
        assert_eq!(tokens.refresh_token, "");
        assert!(tokens.is_usable());
    }

    #[test]
    fn test_subject_id_is_transparent() {
        let id = SubjectId::from("abc-123".to_string());
        assert_eq!(serde_json::to_string(&id).unwrap(), "\"abc-123\"");
        assert_eq!(id.to_string(), "abc-123");
    }

    #[test]
    fn test_loss_reason_codes() {
        assert_eq!(LossReason::SessionExpired.as_str(), "session_expired");
        assert_eq!(LossReason::LoginRequired.to_string(), "login_required");
        assert_eq!(LossReason::AccountDeactivated.as_str(), "account_deactivated");
    }

    #[test]
    fn test_loss_reason_parses_codes() {
        for reason in LossReason::ALL {
            assert_eq!(reason.as_str().parse::<LossReason>().unwrap(), reason);
            assert_eq!(reason.to_string(), reason.as_str());
        }
        assert!(matches!("expired".parse::<LossReason>(), Err(Error::InvalidInput(_))));
    }

    #[test]
    fn test_loss_reason_from_location() {
        assert_eq!(
            LossReason::from_location("/login?reason=session_expired"),
            Some(LossReason::SessionExpired)
        );
        assert_eq!(
            LossReason::from_location("/login?next=%2Fwrite&reason=account_deactivated#top"),
            Some(LossReason::AccountDeactivated)
        );
        assert_eq!(LossReason::from_location("/login"), None);
        assert_eq!(LossReason::from_location("/login?reason=bogus"), None);
    }

    #[test]
    fn test_loss_reason_message() {
        let reason = LossReason::from_location("/login?reason=session_expired").unwrap();
        assert!(reason.user_message().contains("expired"));
    }
}
