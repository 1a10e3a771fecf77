//! Cookie persistence for canonical tokens.
//!
//! The cookie value is `payload.signature`, both base64url without padding.
//! The payload is JSON holding the token, the issue time and, unless the
//! cookie is a session cookie, the expiry. The signature is HMAC-SHA256 of
//! the encoded payload under the first configured key; any configured key is
//! accepted when reading so keys can rotate without logging everyone out.
use crate::config::{CsrfConfig, SigningKey};
use crate::error::Result;
use crate::token::CanonicalToken;
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use chrono::{DateTime, Utc};
use cookie::Cookie;
use hmac::{Hmac, Mac};
use http::{header, HeaderMap, HeaderValue};
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use std::sync::Arc;

type HmacSha256 = Hmac<Sha256>;

/// What was found in the request's token cookie.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Loaded {
    Found(CanonicalToken),
    Missing,
    /// Undecodable, wrongly signed or malformed.
    Invalid,
    Expired,
}

/// The token to use for this request, and the cookie to set if it is new.
#[derive(Debug)]
pub struct Ensured {
    pub token: CanonicalToken,
    pub loaded: Loaded,
    pub set_cookie: Option<HeaderValue>,
}

#[derive(Serialize, Deserialize)]
struct Payload {
    #[serde(rename = "tok")]
    token: String,
    #[serde(rename = "iat")]
    issued_at: i64,
    #[serde(rename = "exp", default, skip_serializing_if = "Option::is_none")]
    expires_at: Option<i64>,
}

#[derive(Clone, Debug)]
pub struct CookieStore {
    config: Arc<CsrfConfig>,
}

impl CookieStore {
    pub fn new(config: Arc<CsrfConfig>) -> Self {
        Self { config }
    }

    /// Reads the canonical token from the request cookies.
    pub fn load(&self, headers: &HeaderMap) -> Loaded {
        self.load_at(headers, Utc::now())
    }

    pub fn load_at(&self, headers: &HeaderMap, now: DateTime<Utc>) -> Loaded {
        match self.find_cookie(headers) {
            Some(value) => self.unseal(&value, now),
            None => Loaded::Missing,
        }
    }

    /// Builds the `Set-Cookie` header persisting `token`.
    pub fn save(&self, token: &CanonicalToken) -> Option<HeaderValue> {
        self.save_at(token, Utc::now())
    }

    pub fn save_at(&self, token: &CanonicalToken, now: DateTime<Utc>) -> Option<HeaderValue> {
        let sealed = self.seal(token, now)?;
        let mut cookie = Cookie::build((self.config.cookie_name.clone(), sealed))
            .secure(self.config.cookie_secure)
            .http_only(self.config.cookie_http_only)
            .same_site(self.config.cookie_same_site)
            .build();
        if self.config.max_age > 0 {
            cookie.set_max_age(cookie::time::Duration::seconds(self.config.max_age));
        }
        if let Some(domain) = &self.config.cookie_domain {
            cookie.set_domain(domain.clone());
        }
        if let Some(path) = &self.config.cookie_path {
            cookie.set_path(path.clone());
        }

        match HeaderValue::from_str(&cookie.to_string()) {
            Ok(value) => Some(value),
            Err(error) => {
                tracing::debug!(?error, "cookie is not a valid header value");
                None
            }
        }
    }

    /// Returns the stored token if it is usable, otherwise a new token along
    /// with the cookie persisting it.
    ///
    /// # Errors
    ///
    /// Returns [`Error::EntropySource`](crate::Error::EntropySource) when a
    /// new token is needed and cannot be generated.
    pub fn ensure(&self, headers: &HeaderMap) -> Result<Ensured> {
        let loaded = self.load(headers);
        if let Loaded::Found(token) = &loaded {
            return Ok(Ensured {
                token: token.clone(),
                loaded,
                set_cookie: None,
            });
        }

        let token = CanonicalToken::generate()?;
        let set_cookie = self.save(&token);
        tracing::trace!(previous = ?loaded, "issued new xsrf token");
        Ok(Ensured {
            token,
            loaded,
            set_cookie,
        })
    }

    fn find_cookie(&self, headers: &HeaderMap) -> Option<String> {
        headers
            .get_all(header::COOKIE)
            .into_iter()
            .filter_map(|value| value.to_str().ok())
            .flat_map(Cookie::split_parse)
            .filter_map(|cookie| match cookie {
                Ok(cookie) => Some(cookie),
                Err(error) => {
                    tracing::debug!(?error, "failed to parse cookie");
                    None
                }
            })
            .find(|cookie| cookie.name() == self.config.cookie_name)
            .map(|cookie| cookie.value_trimmed().to_string())
    }

    fn seal(&self, token: &CanonicalToken, now: DateTime<Utc>) -> Option<String> {
        let issued_at = now.timestamp();
        let payload = Payload {
            token: token.to_string(),
            issued_at,
            // A lifetime past the end of the clock never expires.
            expires_at: Some(self.config.max_age)
                .filter(|max_age| *max_age > 0)
                .and_then(|max_age| issued_at.checked_add(max_age)),
        };
        let json = match serde_json::to_vec(&payload) {
            Ok(json) => json,
            Err(error) => {
                tracing::debug!(?error, "failed to serialize cookie payload");
                return None;
            }
        };

        let encoded = URL_SAFE_NO_PAD.encode(json);
        let signature = sign(self.config.signing_key(), encoded.as_bytes())?;
        Some(format!("{}.{}", encoded, URL_SAFE_NO_PAD.encode(signature)))
    }

    fn unseal(&self, value: &str, now: DateTime<Utc>) -> Loaded {
        let Some((encoded, signature)) = value.split_once('.') else {
            tracing::debug!("cookie has no signature");
            return Loaded::Invalid;
        };
        let Ok(signature) = URL_SAFE_NO_PAD.decode(signature) else {
            tracing::debug!("cookie signature is not base64");
            return Loaded::Invalid;
        };

        let authentic = self
            .config
            .verifying_keys()
            .iter()
            .any(|key| verify(key, encoded.as_bytes(), &signature));
        if !authentic {
            tracing::debug!("cookie signature mismatch");
            return Loaded::Invalid;
        }

        let payload = URL_SAFE_NO_PAD
            .decode(encoded)
            .ok()
            .and_then(|json| serde_json::from_slice::<Payload>(&json).ok());
        let Some(payload) = payload else {
            tracing::debug!("cookie payload is malformed");
            return Loaded::Invalid;
        };
        let Ok(token) = CanonicalToken::try_from(payload.token.as_str()) else {
            tracing::debug!("cookie token is malformed");
            return Loaded::Invalid;
        };

        match payload.expires_at {
            Some(expires_at) if expires_at <= now.timestamp() => Loaded::Expired,
            _ => Loaded::Found(token),
        }
    }
}

fn sign(key: &SigningKey, data: &[u8]) -> Option<Vec<u8>> {
    let mut mac = HmacSha256::new_from_slice(key.as_bytes()).ok()?;
    mac.update(data);
    Some(mac.finalize().into_bytes().to_vec())
}

fn verify(key: &SigningKey, data: &[u8], signature: &[u8]) -> bool {
    let Ok(mut mac) = HmacSha256::new_from_slice(key.as_bytes()) else {
        return false;
    };
    mac.update(data);
    // `verify_slice` compares in constant time.
    mac.verify_slice(signature).is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use proptest::prelude::*;

    fn store(config: CsrfConfig) -> CookieStore {
        CookieStore::new(Arc::new(config))
    }

    fn config() -> CsrfConfig {
        CsrfConfig::new(vec![42; 32]).unwrap()
    }

    fn cookie_value(set_cookie: &HeaderValue) -> String {
        let cookie = Cookie::parse(set_cookie.to_str().unwrap().to_string()).unwrap();
        cookie.value().to_string()
    }

    fn request_with(name: &str, value: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(
            header::COOKIE,
            HeaderValue::from_str(&format!("theme=dark; {}={}", name, value)).unwrap(),
        );
        headers
    }

    #[test]
    fn missing_cookie() {
        assert_eq!(store(config()).load(&HeaderMap::new()), Loaded::Missing);
    }

    #[test]
    fn save_then_load() {
        let store = store(config());
        let token = CanonicalToken::generate().unwrap();
        let set_cookie = store.save(&token).unwrap();
        let headers = request_with("_csrf", &cookie_value(&set_cookie));
        assert_eq!(store.load(&headers), Loaded::Found(token));
    }

    #[test]
    fn cookie_attributes() {
        let store = store(
            config()
                .with_cookie_domain("example.com")
                .with_cookie_path("/app")
                .with_max_age(60),
        );
        let token = CanonicalToken::generate().unwrap();
        let set_cookie = store.save(&token).unwrap();
        let cookie = Cookie::parse(set_cookie.to_str().unwrap().to_string()).unwrap();
        assert_eq!(cookie.name(), "_csrf");
        assert_eq!(cookie.secure(), Some(true));
        assert_eq!(cookie.http_only(), Some(true));
        assert_eq!(cookie.same_site(), Some(cookie::SameSite::Strict));
        assert_eq!(cookie.path(), Some("/app"));
        assert_eq!(cookie.domain(), Some("example.com"));
        assert_eq!(cookie.max_age(), Some(cookie::time::Duration::seconds(60)));
    }

    #[test]
    fn session_cookie_never_expires() {
        let store = store(config().with_max_age(0));
        let token = CanonicalToken::generate().unwrap();
        let long_ago = Utc::now() - Duration::days(3650);
        let set_cookie = store.save_at(&token, long_ago).unwrap();
        assert!(!set_cookie.to_str().unwrap().contains("Max-Age"));
        let headers = request_with("_csrf", &cookie_value(&set_cookie));
        assert_eq!(store.load(&headers), Loaded::Found(token));
    }

    #[test]
    fn huge_max_age_never_expires() {
        let store = store(config().with_max_age(i64::MAX));
        let token = CanonicalToken::generate().unwrap();
        let set_cookie = store.save(&token).unwrap();
        let pair = set_cookie.to_str().unwrap().split(';').next().unwrap();
        let (_, value) = pair.split_once('=').unwrap();
        let headers = request_with("_csrf", value);
        assert_eq!(store.load(&headers), Loaded::Found(token.clone()));
        assert_eq!(
            store.load_at(&headers, Utc::now() + Duration::days(365 * 1000)),
            Loaded::Found(token)
        );
    }

    #[test]
    fn expired_cookie() {
        let store = store(config().with_max_age(60));
        let token = CanonicalToken::generate().unwrap();
        let issued = Utc::now() - Duration::seconds(61);
        let set_cookie = store.save_at(&token, issued).unwrap();
        let headers = request_with("_csrf", &cookie_value(&set_cookie));
        assert_eq!(store.load(&headers), Loaded::Expired);
        assert_eq!(
            store.load_at(&headers, issued + Duration::seconds(59)),
            Loaded::Found(token)
        );
    }

    #[test]
    fn garbage_cookie_is_invalid() {
        let store = store(config());
        for value in ["", "abc", "abc.def", "....", "e30.e30"] {
            assert_eq!(store.load(&request_with("_csrf", value)), Loaded::Invalid);
        }
    }

    #[test]
    fn foreign_key_is_invalid() {
        let token = CanonicalToken::generate().unwrap();
        let other = store(CsrfConfig::new(vec![7; 32]).unwrap());
        let set_cookie = other.save(&token).unwrap();
        let headers = request_with("_csrf", &cookie_value(&set_cookie));
        assert_eq!(store(config()).load(&headers), Loaded::Invalid);
    }

    #[test]
    fn rotated_key_still_verifies() {
        let old = SigningKey::new(vec![1; 32]).unwrap();
        let token = CanonicalToken::generate().unwrap();
        let set_cookie = store(CsrfConfig::with_key(old.clone()))
            .save(&token)
            .unwrap();
        let headers = request_with("_csrf", &cookie_value(&set_cookie));

        let rotated = store(config().with_previous_key(old));
        assert_eq!(rotated.load(&headers), Loaded::Found(token));
    }

    #[test]
    fn ensure_reuses_valid_cookie() {
        let store = store(config());
        let first = store.ensure(&HeaderMap::new()).unwrap();
        assert_eq!(first.loaded, Loaded::Missing);
        let set_cookie = first.set_cookie.unwrap();

        let headers = request_with("_csrf", &cookie_value(&set_cookie));
        let second = store.ensure(&headers).unwrap();
        assert_eq!(second.token, first.token);
        assert!(second.set_cookie.is_none());
    }

    #[test]
    fn ensure_replaces_invalid_cookie() {
        let store = store(config());
        let ensured = store.ensure(&request_with("_csrf", "nope")).unwrap();
        assert_eq!(ensured.loaded, Loaded::Invalid);
        assert!(ensured.set_cookie.is_some());
    }

    proptest! {
        #[test]
        fn any_altered_character_is_rejected(index in 0usize..512, replacement in "[A-Za-z0-9_.-]") {
            let store = store(config());
            let token = CanonicalToken::generate().unwrap();
            let value = cookie_value(&store.save(&token).unwrap());
            let index = index % value.len();
            let mut tampered = value.clone();
            tampered.replace_range(index..=index, &replacement);
            prop_assume!(tampered != value);
            let loaded = store.load(&request_with("_csrf", &tampered));
            prop_assert_eq!(loaded, Loaded::Invalid);
        }
    }
}
