//! Named configuration options.
//!
//! Each function returns a [`ConfigOption`] for
//! [`CsrfConfig::with_options`]. Options apply in order, so when two of them
//! set the same field the later one wins. [`CsrfConfig::new`] has already set
//! `Secure` and `HttpOnly` to `true` before any option runs; pass
//! [`secure(false)`](secure) or [`http_only(false)`](http_only) to override.
//!
//! ```
//! use xsrf_guard::{options, CsrfConfig};
//!
//! let config = CsrfConfig::new(vec![7; 32])
//!     .unwrap()
//!     .with_options([
//!         options::max_age(3600),
//!         options::domain("example.com"),
//!         options::secure(false),
//!         options::max_age(600),
//!     ]);
//!
//! assert_eq!(config.max_age, 600);
//! assert_eq!(config.cookie_domain.as_deref(), Some(".example.com"));
//! assert!(!config.cookie_secure);
//! assert!(config.cookie_http_only);
//! ```
//!
//! # Error handler
//!
//! There is no option for the error handler. It is generic over the request
//! and response body types, which a [`CsrfConfig`](crate::CsrfConfig) is not,
//! so it is set on the layer instead. It can read the failure reason and a
//! fresh masked token from the request:
//!
//! ```
//! use http::{Request, Response, StatusCode};
//! use http_body_util::Full;
//! use bytes::Bytes;
//! use xsrf_guard::{failure_reason, template_field, CsrfConfig, CsrfLayer};
//!
//! let layer = CsrfLayer::new(CsrfConfig::new(vec![7; 32]).unwrap()).error_handler(
//!     |req: Request<Full<Bytes>>| {
//!         let reason = failure_reason(&req).map(|f| f.to_string()).unwrap_or_default();
//!         let mut res = Response::new(format!("{}: {}", reason, template_field(&req)));
//!         *res.status_mut() = StatusCode::FORBIDDEN;
//!         res
//!     },
//! );
//! # drop(layer);
//! ```
use crate::config::{ConfigOption, SigningKey};
use cookie::SameSite;
use http::{HeaderName, Method, StatusCode};

/// Maximum age in seconds of the token cookie. Defaults to 12 hours.
pub fn max_age(seconds: i64) -> ConfigOption {
    ConfigOption::new(move |c| c.with_max_age(seconds))
}

/// Cookie domain. Defaults to the host of the request only (recommended).
///
/// This should be a hostname, not a URL. It is treated as prefixed with a `.`,
/// so `"example.com"` also matches `"www.example.com"`.
pub fn domain(domain: impl Into<String>) -> ConfigOption {
    let domain = domain.into();
    ConfigOption::new(move |c| c.with_cookie_domain(domain))
}

/// Cookie path. Defaults to the path the cookie was issued from.
pub fn path(path: impl Into<String>) -> ConfigOption {
    let path = path.into();
    ConfigOption::new(move |c| c.with_cookie_path(path))
}

/// `Secure` cookie flag. Defaults to `true`.
pub fn secure(secure: bool) -> ConfigOption {
    ConfigOption::new(move |c| c.with_cookie_secure(secure))
}

/// `HttpOnly` cookie flag. Defaults to `true`.
pub fn http_only(http_only: bool) -> ConfigOption {
    ConfigOption::new(move |c| c.with_cookie_http_only(http_only))
}

/// `SameSite` cookie attribute. Defaults to `Strict`.
pub fn same_site(same_site: SameSite) -> ConfigOption {
    ConfigOption::new(move |c| c.with_cookie_same_site(same_site))
}

pub fn cookie_name(name: impl Into<String>) -> ConfigOption {
    let name = name.into();
    ConfigOption::new(move |c| c.with_cookie_name(name))
}

/// Request header inspected for the masked token. Defaults to `X-CSRF-Token`.
pub fn request_header(name: HeaderName) -> ConfigOption {
    ConfigOption::new(move |c| c.with_header_name(name))
}

/// Form field inspected when the header is absent, and rendered by
/// [`template_field`](crate::template_field). Defaults to `csrf_token`.
pub fn field_name(name: impl Into<String>) -> ConfigOption {
    let name = name.into();
    ConfigOption::new(move |c| c.with_field_name(name))
}

pub fn safe_methods(methods: Vec<Method>) -> ConfigOption {
    ConfigOption::new(move |c| c.with_safe_methods(methods))
}

pub fn exempt_paths(paths: Vec<String>) -> ConfigOption {
    ConfigOption::new(move |c| c.with_exempt_paths(paths))
}

/// Status returned by the default error handler. Defaults to `403 Forbidden`.
pub fn rejection_status(status: StatusCode) -> ConfigOption {
    ConfigOption::new(move |c| c.with_rejection_status(status))
}

/// Largest url-encoded body searched for the token field. Defaults to 64 KiB.
pub fn max_form_bytes(limit: usize) -> ConfigOption {
    ConfigOption::new(move |c| c.with_max_form_bytes(limit))
}

pub fn previous_key(key: SigningKey) -> ConfigOption {
    ConfigOption::new(move |c| c.with_previous_key(key))
}
