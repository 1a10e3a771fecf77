//! Cross-site request forgery protection for services built on `http` and
//! [`tower`].
//!
//! Getting this right can be tricky. This crate pairs the token primitives
//! with a middleware that applies them, so that the pieces are hard to wire
//! together wrongly.
//!
//! # How it works
//!
//! - A [`CanonicalToken`] is issued once per client and stored in a signed
//!   cookie. It is created lazily, on the first request that arrives without a
//!   usable cookie, whatever its method.
//! - From this token a fresh [`MaskedToken`] is derived for every request and
//!   made available to handlers through [`masked_token`] and
//!   [`template_field`]. Any number of them validate against the same
//!   canonical token.
//! - The masked token should either be embedded in your HTML form, or sent via
//!   the `X-CSRF-Token` header (often the case for requests initiated in
//!   JavaScript).
//! - Requests with an unsafe method must return a masked token that unmasks to
//!   the cookie's token, otherwise they are handed to the [`ErrorHandler`],
//!   which can read the reason with [`failure_reason`].
//!
//! # Usage
//!
//! ```
//! use http::{Request, Response};
//! use std::convert::Infallible;
//! use tower::{service_fn, Layer};
//! use xsrf_guard::{masked_token, options, CsrfConfig, CsrfLayer};
//!
//! let config = CsrfConfig::new(b"a secret of at least thirty-two bytes".to_vec())
//!     .unwrap()
//!     .with_options([options::domain("example.com"), options::path("/")]);
//!
//! let service = CsrfLayer::new(config).layer(service_fn(
//!     |req: Request<http_body_util::Full<bytes::Bytes>>| async move {
//!         let token = masked_token(&req).unwrap_or_default().to_string();
//!         Ok::<_, Infallible>(Response::new(token))
//!     },
//! ));
//! # drop(service);
//! ```
//!
//! # Notes
//! - [`rand`](https://docs.rs/rand)'s `OsRng` provides the randomness. If it
//!   fails no token is issued and the request is rejected.
//! - Masked tokens use a one-time-pad xor-ed with the canonical token to
//!   protect against [BREACH](http://breachattack.com/).
//! - [`subtle`](https://docs.rs/subtle) and `hmac`'s `verify_slice` are used to
//!   protect against timing attacks.
//! - Cookies are signed with HMAC-SHA256, not encrypted. Additional keys can
//!   be configured to verify cookies signed before a key rotation.
//! - Session management, authentication and TLS are out of scope.

pub mod config;
pub mod context;
pub mod error;
pub mod middleware;
pub mod options;
pub mod protect;
pub mod rng;
pub mod store;
pub mod token;
pub mod validate;

pub use config::{ConfigOption, CsrfConfig, SigningKey};
pub use context::{failure_reason, field_name, masked_token, template_field, RequestContext};
pub use error::{Error, Result};
pub use middleware::{CsrfLayer, CsrfService, DefaultErrorHandler, ErrorHandler};
pub use protect::{Decision, Protect, Verdict};
pub use store::{CookieStore, Loaded};
pub use token::{unmask, CanonicalToken, MaskedToken};
pub use validate::{validate, Failure, Form, Outcome};
