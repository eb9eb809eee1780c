use http::HeaderMap;
use http::header::{AUTHORIZATION, CONTENT_TYPE, HeaderValue};

use crate::session::SessionValidator;

/// Builds the header map every authenticated call uses.
///
/// `Content-Type: application/json` is always set. Callers sending a
/// multipart body must remove it themselves so the client can write the
/// boundary. Without a stored token the `Authorization` header is simply
/// left out and the remote service answers 401.
#[derive(Clone)]
pub struct HeaderBuilder {
    validator: SessionValidator,
}

impl HeaderBuilder {
    #[must_use]
    pub fn new(validator: SessionValidator) -> Self {
        Self { validator }
    }

    /// Headers with no caller additions.
    #[must_use]
    pub fn headers(&self) -> HeaderMap {
        self.build(&HeaderMap::new())
    }

    /// Headers with `extra` merged last; caller values replace ours.
    #[must_use]
    pub fn build(&self, extra: &HeaderMap) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        if let Some(token) = self.validator.current_token() {
            match HeaderValue::from_str(&format!("Bearer {token}")) {
                Ok(mut value) => {
                    value.set_sensitive(true);
                    headers.insert(AUTHORIZATION, value);
                }
                Err(_) => {
                    tracing::warn!("Stored token is not a valid header value; sending without Authorization");
                }
            }
        }

        for name in extra.keys() {
            headers.remove(name);
            for value in extra.get_all(name) {
                headers.append(name.clone(), value.clone());
            }
        }

        headers
    }
}
