use crate::error::{Error, Result};
use cookie::SameSite;
use http::{HeaderName, Method, StatusCode};
use std::fmt;
use zeroize::{Zeroize, ZeroizeOnDrop};

/// Minimum length in bytes of a cookie signing key.
pub const MIN_KEY_LEN: usize = 32;

/// Twelve hours, in seconds.
pub const DEFAULT_MAX_AGE: i64 = 12 * 60 * 60;

/// Largest url-encoded body buffered to look for the token field, 64 KiB.
pub const DEFAULT_MAX_FORM_BYTES: usize = 64 * 1024;

/// A cookie signing key.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct SigningKey(Vec<u8>);

impl SigningKey {
    pub fn new(secret: impl Into<Vec<u8>>) -> Result<Self> {
        let secret = secret.into();
        if secret.len() < MIN_KEY_LEN {
            return Err(Error::KeyTooShort);
        }
        Ok(Self(secret))
    }

    /// Generates a random key of [`MIN_KEY_LEN`] bytes.
    pub fn generate() -> Result<Self> {
        crate::rng::generate(MIN_KEY_LEN).map(Self)
    }

    pub(crate) fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}

impl fmt::Debug for SigningKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SigningKey(..)")
    }
}

/// Middleware configuration.
///
/// Built once, then shared read-only by every request. Each `with_*` method
/// consumes the configuration and returns the changed copy, so setup reads as
/// a chain of transformations where a later call to the same setter replaces
/// the earlier value.
///
/// The error handler is not part of this type: it is generic over the request
/// and response bodies, so it is set on the layer with
/// [`CsrfLayer::error_handler`](crate::CsrfLayer::error_handler).
#[derive(Clone, Debug)]
pub struct CsrfConfig {
    /// The first key signs new cookies; all of them verify.
    pub(crate) keys: Vec<SigningKey>,

    /// Cookie lifetime in seconds. Zero or less issues a session cookie whose
    /// payload never expires.
    pub max_age: i64,

    pub cookie_name: String,

    /// Stored with a leading `.`, matching subdomains.
    pub cookie_domain: Option<String>,

    /// Unset leaves the browser default: the path the cookie was issued from.
    pub cookie_path: Option<String>,

    pub cookie_secure: bool,

    pub cookie_http_only: bool,

    pub cookie_same_site: SameSite,

    /// Request header carrying the masked token.
    pub header_name: HeaderName,

    /// Form field carrying the masked token when the header is absent.
    pub field_name: String,

    /// Methods exempt from validation.
    pub safe_methods: Vec<Method>,

    /// Path prefixes exempt from validation.
    pub exempt_paths: Vec<String>,

    /// Status used by the default error handler.
    pub rejection_status: StatusCode,

    /// Url-encoded bodies longer than this are not searched for the token
    /// field; the request is rejected with `BadToken`.
    pub max_form_bytes: usize,
}

impl CsrfConfig {
    /// Creates a configuration signing cookies with `secret`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::KeyTooShort`] if `secret` is shorter than
    /// [`MIN_KEY_LEN`].
    pub fn new(secret: impl Into<Vec<u8>>) -> Result<Self> {
        Ok(Self::with_key(SigningKey::new(secret)?))
    }

    pub fn with_key(key: SigningKey) -> Self {
        Self {
            keys: vec![key],
            max_age: DEFAULT_MAX_AGE,
            cookie_name: "_csrf".to_string(),
            cookie_domain: None,
            cookie_path: None,
            cookie_secure: true,
            cookie_http_only: true,
            cookie_same_site: SameSite::Strict,
            header_name: HeaderName::from_static("x-csrf-token"),
            field_name: "csrf_token".to_string(),
            safe_methods: vec![Method::GET, Method::HEAD, Method::OPTIONS, Method::TRACE],
            exempt_paths: Vec::new(),
            rejection_status: StatusCode::FORBIDDEN,
            max_form_bytes: DEFAULT_MAX_FORM_BYTES,
        }
    }

    /// Applies `options` in order.
    pub fn with_options<I>(self, options: I) -> Self
    where
        I: IntoIterator<Item = ConfigOption>,
    {
        options
            .into_iter()
            .fold(self, |config, option| option.apply(config))
    }

    pub fn with_max_age(mut self, seconds: i64) -> Self {
        self.max_age = seconds;
        self
    }

    pub fn with_cookie_name(mut self, name: impl Into<String>) -> Self {
        self.cookie_name = name.into();
        self
    }

    /// Sets the cookie domain. `"example.com"` is stored as `".example.com"`
    /// and an empty domain restores the host-only default.
    pub fn with_cookie_domain(mut self, domain: impl Into<String>) -> Self {
        let domain = domain.into();
        self.cookie_domain = match domain.as_str() {
            "" | "." => None,
            d if d.starts_with('.') => Some(domain),
            d => Some(format!(".{}", d)),
        };
        self
    }

    pub fn with_cookie_path(mut self, path: impl Into<String>) -> Self {
        self.cookie_path = Some(path.into());
        self
    }

    pub fn with_cookie_secure(mut self, secure: bool) -> Self {
        self.cookie_secure = secure;
        self
    }

    pub fn with_cookie_http_only(mut self, http_only: bool) -> Self {
        self.cookie_http_only = http_only;
        self
    }

    pub fn with_cookie_same_site(mut self, same_site: SameSite) -> Self {
        self.cookie_same_site = same_site;
        self
    }

    pub fn with_header_name(mut self, name: HeaderName) -> Self {
        self.header_name = name;
        self
    }

    pub fn with_field_name(mut self, name: impl Into<String>) -> Self {
        self.field_name = name.into();
        self
    }

    pub fn with_safe_methods(mut self, methods: Vec<Method>) -> Self {
        self.safe_methods = methods;
        self
    }

    pub fn with_exempt_paths(mut self, paths: Vec<String>) -> Self {
        self.exempt_paths = paths;
        self
    }

    pub fn with_rejection_status(mut self, status: StatusCode) -> Self {
        self.rejection_status = status;
        self
    }

    pub fn with_max_form_bytes(mut self, limit: usize) -> Self {
        self.max_form_bytes = limit;
        self
    }

    /// Keeps accepting cookies signed with `key` after rotating to a new one.
    pub fn with_previous_key(mut self, key: SigningKey) -> Self {
        self.keys.push(key);
        self
    }

    pub(crate) fn signing_key(&self) -> &SigningKey {
        // `keys` always holds the key the configuration was created with.
        &self.keys[0]
    }

    pub(crate) fn verifying_keys(&self) -> &[SigningKey] {
        &self.keys
    }

    pub(crate) fn is_safe(&self, method: &Method) -> bool {
        self.safe_methods.contains(method)
    }

    pub(crate) fn is_exempt(&self, path: &str) -> bool {
        self.exempt_paths
            .iter()
            .any(|prefix| path.starts_with(prefix.as_str()))
    }
}

/// A single configuration transformation, see [`crate::options`].
pub struct ConfigOption(Box<dyn FnOnce(CsrfConfig) -> CsrfConfig + Send>);

impl ConfigOption {
    pub fn new<F>(f: F) -> Self
    where
        F: FnOnce(CsrfConfig) -> CsrfConfig + Send + 'static,
    {
        Self(Box::new(f))
    }

    pub fn apply(self, config: CsrfConfig) -> CsrfConfig {
        (self.0)(config)
    }
}

impl fmt::Debug for ConfigOption {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("ConfigOption(..)")
    }
}
