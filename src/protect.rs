//! The per-request protection state machine.
//!
//! ```text
//! Unchecked --safe method / exempt path--> Bypassed --> Allowed
//!     |
//!     +--------------------------------> Validating --> Allowed | Rejected
//! ```
//!
//! Every request makes exactly one pass. A token cookie is issued whenever the
//! request carried no usable one, whichever terminal state is reached, and a
//! fresh masked token is produced for every request that gets that far.
use crate::config::CsrfConfig;
use crate::context::{IssuedToken, RequestContext};
use crate::store::CookieStore;
use crate::validate::{has_header_token, validate, Failure, Form, Outcome};
use http::{header, HeaderMap, HeaderValue, Method};
use std::sync::Arc;

/// Terminal state of a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    /// Safe method or exempt path, no validation ran.
    Bypassed,
    /// The submitted token matched the cookie.
    Allowed,
    Rejected(Failure),
}

impl Decision {
    pub fn is_rejected(&self) -> bool {
        matches!(self, Decision::Rejected(_))
    }
}

#[derive(Debug)]
pub struct Verdict {
    pub decision: Decision,
    /// Fresh masked token for the response. `None` only when token
    /// generation failed.
    pub masked: Option<String>,
    /// `Set-Cookie` value when a new canonical token was issued.
    pub set_cookie: Option<HeaderValue>,
    field_name: Arc<str>,
}

impl Verdict {
    /// Records the masked token and, when rejected, the failure reason.
    pub fn annotate<C: RequestContext>(&self, ctx: &mut C) {
        if let Some(masked) = &self.masked {
            ctx.insert(IssuedToken {
                masked: masked.clone(),
                field_name: self.field_name.clone(),
            });
        }
        if let Decision::Rejected(failure) = self.decision {
            ctx.insert(failure);
        }
    }

    /// Adds the token cookie, if any, and `Vary: Cookie` to the response.
    pub fn finish(&self, headers: &mut HeaderMap) {
        if let Some(set_cookie) = &self.set_cookie {
            headers.append(header::SET_COOKIE, set_cookie.clone());
        }
        headers.append(header::VARY, HeaderValue::from_static("cookie"));
    }
}

#[derive(Clone, Debug)]
pub struct Protect {
    config: Arc<CsrfConfig>,
    store: CookieStore,
    field_name: Arc<str>,
}

impl Protect {
    pub fn new(config: CsrfConfig) -> Self {
        let config = Arc::new(config);
        Self {
            store: CookieStore::new(config.clone()),
            field_name: Arc::from(config.field_name.as_str()),
            config,
        }
    }

    pub fn config(&self) -> &CsrfConfig {
        &self.config
    }

    pub fn store(&self) -> &CookieStore {
        &self.store
    }

    /// Whether the request will be validated rather than bypassed.
    pub fn needs_validation(&self, method: &Method, path: &str) -> bool {
        !self.config.is_safe(method) && !self.config.is_exempt(path)
    }

    /// Whether validation would have to look at the form body: the token
    /// header is absent or blank and the body is url-encoded.
    pub fn needs_form(&self, method: &Method, path: &str, headers: &HeaderMap) -> bool {
        self.needs_validation(method, path)
            && !has_header_token(&self.config, headers)
            && headers
                .get(header::CONTENT_TYPE)
                .and_then(|value| value.to_str().ok())
                .map(|value| {
                    value
                        .trim_start()
                        .to_ascii_lowercase()
                        .starts_with("application/x-www-form-urlencoded")
                })
                .unwrap_or(false)
    }

    /// Runs the state machine for one request.
    ///
    /// `form` is the url-encoded request body, when the caller read it.
    pub fn evaluate(
        &self,
        method: &Method,
        path: &str,
        headers: &HeaderMap,
        form: Form<'_>,
    ) -> Verdict {
        let (token, loaded, set_cookie) = match self.store.ensure(headers) {
            Ok(ensured) => (ensured.token, ensured.loaded, ensured.set_cookie),
            Err(error) => {
                tracing::error!(%error, "failed to issue xsrf token");
                return self.verdict(Decision::Rejected(Failure::EntropySource), None, None);
            }
        };

        let decision = if self.needs_validation(method, path) {
            match validate(&self.config, headers, form, &loaded) {
                Outcome::Valid(_) => Decision::Allowed,
                Outcome::Invalid(failure) => {
                    tracing::warn!(%method, path, %failure, "rejected request");
                    Decision::Rejected(failure)
                }
            }
        } else {
            Decision::Bypassed
        };

        match token.mask() {
            Ok(masked) => self.verdict(decision, Some(masked.to_string()), set_cookie),
            Err(error) => {
                tracing::error!(%error, "failed to mask xsrf token");
                self.verdict(Decision::Rejected(Failure::EntropySource), None, set_cookie)
            }
        }
    }

    fn verdict(
        &self,
        decision: Decision,
        masked: Option<String>,
        set_cookie: Option<HeaderValue>,
    ) -> Verdict {
        Verdict {
            decision,
            masked,
            set_cookie,
            field_name: self.field_name.clone(),
        }
    }
}
