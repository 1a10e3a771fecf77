use crate::config::CsrfConfig;
use crate::store::Loaded;
use crate::token::{CanonicalToken, MaskedToken};
use http::HeaderMap;

/// Why a request was rejected.
#[derive(thiserror::Error, Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Failure {
    #[error("CSRF token not found in request")]
    NoToken,
    #[error("CSRF token invalid")]
    BadToken,
    #[error("CSRF cookie not found in request")]
    NoCookie,
    #[error("CSRF cookie invalid")]
    BadCookie,
    #[error("CSRF cookie expired")]
    Expired,
    #[error("CSRF token could not be generated")]
    EntropySource,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Valid(CanonicalToken),
    Invalid(Failure),
}

impl Outcome {
    pub fn is_valid(&self) -> bool {
        matches!(self, Outcome::Valid(_))
    }

    pub fn failure(&self) -> Option<Failure> {
        match self {
            Outcome::Valid(_) => None,
            Outcome::Invalid(failure) => Some(*failure),
        }
    }
}

/// The url-encoded request body, as far as the caller could read it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Form<'a> {
    /// No body was read: the token header was sent or the content type is not
    /// url-encoded.
    Absent,
    Body(&'a [u8]),
    /// The body was larger than `max_form_bytes`.
    TooLarge,
}

/// Checks the masked token submitted with a request against the cookie.
///
/// The token is taken from the configured header, or failing that from the
/// configured field of `form`, an `application/x-www-form-urlencoded` body.
/// Cookie problems are reported before token problems.
pub fn validate(
    config: &CsrfConfig,
    headers: &HeaderMap,
    form: Form<'_>,
    loaded: &Loaded,
) -> Outcome {
    let stored = match loaded {
        Loaded::Found(token) => token,
        Loaded::Missing => return Outcome::Invalid(Failure::NoCookie),
        Loaded::Invalid => return Outcome::Invalid(Failure::BadCookie),
        Loaded::Expired => return Outcome::Invalid(Failure::Expired),
    };

    let submitted = match submitted_token(config, headers, form) {
        Ok(submitted) => submitted,
        Err(failure) => return Outcome::Invalid(failure),
    };

    let Ok(masked) = MaskedToken::try_from(submitted.as_str()) else {
        return Outcome::Invalid(Failure::BadToken);
    };
    match stored.verify(&masked) {
        Ok(()) => Outcome::Valid(stored.clone()),
        Err(_) => Outcome::Invalid(Failure::BadToken),
    }
}

/// Whether the token header carries a value. Blank values do not count,
/// values that are not visible ASCII do.
pub(crate) fn has_header_token(config: &CsrfConfig, headers: &HeaderMap) -> bool {
    headers
        .get(&config.header_name)
        .map(|value| value.to_str().map_or(true, |value| !value.trim().is_empty()))
        .unwrap_or(false)
}

/// Extracts the raw masked token, header first.
///
/// A header that cannot be decoded and a form that could not be read are
/// `BadToken`; nothing submitted at all is `NoToken`.
pub fn submitted_token(
    config: &CsrfConfig,
    headers: &HeaderMap,
    form: Form<'_>,
) -> Result<String, Failure> {
    if has_header_token(config, headers) {
        return headers
            .get(&config.header_name)
            .and_then(|value| value.to_str().ok())
            .map(|value| value.trim().to_string())
            .ok_or(Failure::BadToken);
    }

    let body = match form {
        Form::Absent => return Err(Failure::NoToken),
        Form::TooLarge => return Err(Failure::BadToken),
        Form::Body(body) => body,
    };
    let fields = serde_urlencoded::from_bytes::<Vec<(String, String)>>(body)
        .map_err(|_| Failure::BadToken)?;
    fields
        .into_iter()
        .find(|(name, _)| *name == config.field_name)
        .map(|(_, value)| value)
        .filter(|value| !value.is_empty())
        .ok_or(Failure::NoToken)
}

#[cfg(test)]
mod tests {
    use super::*;
    use http::HeaderValue;

    fn config() -> CsrfConfig {
        CsrfConfig::new(vec![5; 32]).unwrap()
    }

    fn headers_with(token: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert("x-csrf-token", HeaderValue::from_str(token).unwrap());
        headers
    }

    #[test]
    fn valid_header_token() {
        let stored = CanonicalToken::generate().unwrap();
        let masked = stored.mask().unwrap().to_string();
        let outcome = validate(
            &config(),
            &headers_with(&masked),
            Form::Absent,
            &Loaded::Found(stored.clone()),
        );
        assert_eq!(outcome, Outcome::Valid(stored));
    }

    #[test]
    fn valid_form_token() {
        let stored = CanonicalToken::generate().unwrap();
        let masked = stored.mask().unwrap().to_string();
        let body = format!("name=x&csrf_token={}&other=y", masked);
        let outcome = validate(
            &config(),
            &HeaderMap::new(),
            Form::Body(body.as_bytes()),
            &Loaded::Found(stored),
        );
        assert!(outcome.is_valid());
    }

    #[test]
    fn header_wins_over_form() {
        let stored = CanonicalToken::generate().unwrap();
        let good = stored.mask().unwrap().to_string();
        let body = format!("csrf_token={}", good);
        let outcome = validate(
            &config(),
            &headers_with("garbage"),
            Form::Body(body.as_bytes()),
            &Loaded::Found(stored),
        );
        assert_eq!(outcome.failure(), Some(Failure::BadToken));
    }

    #[test]
    fn missing_token() {
        let stored = CanonicalToken::generate().unwrap();
        let outcome = validate(
            &config(),
            &HeaderMap::new(),
            Form::Body(b"unrelated=1"),
            &Loaded::Found(stored),
        );
        assert_eq!(outcome.failure(), Some(Failure::NoToken));
    }

    #[test]
    fn mismatched_token() {
        let stored = CanonicalToken::generate().unwrap();
        let other = CanonicalToken::generate().unwrap().mask().unwrap();
        let outcome = validate(
            &config(),
            &headers_with(&other.to_string()),
            Form::Absent,
            &Loaded::Found(stored),
        );
        assert_eq!(outcome.failure(), Some(Failure::BadToken));
    }

    #[test]
    fn cookie_failures_take_precedence() {
        let masked = CanonicalToken::generate().unwrap().mask().unwrap();
        let headers = headers_with(&masked.to_string());
        for (loaded, failure) in [
            (Loaded::Missing, Failure::NoCookie),
            (Loaded::Invalid, Failure::BadCookie),
            (Loaded::Expired, Failure::Expired),
        ] {
            let outcome = validate(&config(), &headers, Form::Absent, &loaded);
            assert_eq!(outcome.failure(), Some(failure));
        }
    }

    #[test]
    fn custom_names() {
        let config = config()
            .with_header_name(http::HeaderName::from_static("x-xsrf"))
            .with_field_name("authenticity_token");
        let mut headers = HeaderMap::new();
        headers.insert("x-xsrf", HeaderValue::from_static("abc"));
        assert_eq!(
            submitted_token(&config, &headers, Form::Absent).as_deref(),
            Ok("abc")
        );
        assert_eq!(
            submitted_token(&config, &HeaderMap::new(), Form::Body(b"authenticity_token=def"))
                .as_deref(),
            Ok("def")
        );
    }

    #[test]
    fn undecodable_header_is_bad_token() {
        let stored = CanonicalToken::generate().unwrap();
        let mut headers = HeaderMap::new();
        headers.insert(
            "x-csrf-token",
            HeaderValue::from_bytes(b"\xffbogus").unwrap(),
        );
        assert!(has_header_token(&config(), &headers));
        let outcome = validate(&config(), &headers, Form::Absent, &Loaded::Found(stored));
        assert_eq!(outcome.failure(), Some(Failure::BadToken));
    }

    #[test]
    fn blank_header_falls_back_to_form() {
        let stored = CanonicalToken::generate().unwrap();
        let body = format!("csrf_token={}", stored.mask().unwrap());
        for blank in ["", "   "] {
            let headers = headers_with(blank);
            assert!(!has_header_token(&config(), &headers));
            let outcome = validate(
                &config(),
                &headers,
                Form::Body(body.as_bytes()),
                &Loaded::Found(stored.clone()),
            );
            assert!(outcome.is_valid());
        }
    }

    #[test]
    fn unreadable_form_is_bad_token() {
        let stored = CanonicalToken::generate().unwrap();
        let outcome = validate(
            &config(),
            &HeaderMap::new(),
            Form::TooLarge,
            &Loaded::Found(stored),
        );
        assert_eq!(outcome.failure(), Some(Failure::BadToken));
    }
}
