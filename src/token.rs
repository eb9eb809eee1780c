use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use serde_json::{Map, Value as JsonValue};

/// Claims read from the payload segment of an identity token.
///
/// The token is parsed locally and **not** signature-checked. Tokens only
/// travel between the identity provider and this client over TLS, and the
/// services that receive them verify signatures themselves, so the client
/// treats the payload as informational.
#[derive(Debug, Clone, PartialEq)]
pub struct DecodedClaims {
    inner: Map<String, JsonValue>,
}

impl DecodedClaims {
    /// Subject identifier (`sub`).
    #[must_use]
    pub fn sub(&self) -> Option<&str> {
        self.str_claim("sub")
    }

    #[must_use]
    pub fn email(&self) -> Option<&str> {
        self.str_claim("email")
    }

    /// Expiry in epoch seconds. Fractional values are truncated.
    #[must_use]
    pub fn exp(&self) -> Option<i64> {
        let exp = self.inner.get("exp")?;
        exp.as_i64().or_else(|| exp.as_f64().map(|f| f as i64))
    }

    /// Provider-assigned username (`cognito:username`, or its underscore spelling).
    #[must_use]
    pub fn cognito_username(&self) -> Option<&str> {
        self.str_claim("cognito:username")
            .or_else(|| self.str_claim("cognito_username"))
    }

    #[must_use]
    pub fn username(&self) -> Option<&str> {
        self.str_claim("username")
    }

    /// Gets a claim value by key.
    #[must_use]
    pub fn get_claim(&self, key: &str) -> Option<&JsonValue> {
        self.inner.get(key)
    }

    #[must_use]
    pub fn as_map(&self) -> &Map<String, JsonValue> {
        &self.inner
    }

    #[must_use]
    pub fn into_map(self) -> Map<String, JsonValue> {
        self.inner
    }

    fn str_claim(&self, key: &str) -> Option<&str> {
        self.inner
            .get(key)
            .and_then(JsonValue::as_str)
            .filter(|s| !s.is_empty())
    }
}

/// Decodes the payload of a compact `header.payload.signature` token.
///
/// Returns `None` for anything malformed: a segment count other than three,
/// invalid base64url, or a payload that is not a JSON object.
#[must_use]
pub fn decode(token: &str) -> Option<DecodedClaims> {
    let parts: Vec<&str> = token.split('.').collect();
    if parts.len() != 3 {
        return None;
    }

    let payload = URL_SAFE_NO_PAD
        .decode(parts[1].trim_end_matches('='))
        .ok()?;

    match serde_json::from_slice::<JsonValue>(&payload).ok()? {
        JsonValue::Object(inner) => Some(DecodedClaims { inner }),
        _ => None,
    }
}

/// Whether `token` is expired at `now` (epoch seconds).
///
/// Fails closed: an undecodable token or one without `exp` counts as expired.
#[must_use]
pub fn is_expired_at(token: &str, now: i64) -> bool {
    match decode(token).and_then(|claims| claims.exp()) {
        Some(exp) => exp <= now,
        None => true,
    }
}

/// Whether `token` is expired against the system clock.
#[must_use]
pub fn is_expired(token: &str) -> bool {
    is_expired_at(token, now_unix())
}

pub(crate) fn now_unix() -> i64 {
    time::OffsetDateTime::now_utc().unix_timestamp()
}
