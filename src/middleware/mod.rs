//! [`tower`] integration.
//!
//! [`CsrfLayer`] wraps any `Service<http::Request<B>>`. Requests that pass
//! reach the inner service with the masked token in their extensions;
//! rejected requests go to the [`ErrorHandler`] instead. Either way the
//! response gets the token cookie when a new one was issued.
//!
//! The token is read from the configured header. When the header is missing
//! and the body is `application/x-www-form-urlencoded`, the body is buffered,
//! searched for the configured field, and passed on unchanged.

pub use self::{
    handler::{DefaultErrorHandler, ErrorHandler},
    layer::CsrfLayer,
    service::CsrfService,
};

mod handler;
mod layer;
mod service;
