use crate::context::failure_reason;
use crate::validate::Failure;
use http::{header, HeaderValue, Request, Response, StatusCode};

/// Produces the response for a rejected request.
///
/// The request carries the rejection reason, see
/// [`failure_reason`](crate::failure_reason), and a freshly masked token when
/// one could be generated, see [`masked_token`](crate::masked_token).
///
/// Implemented for `Fn(Request<ReqBody>) -> Response<ResBody>` closures.
pub trait ErrorHandler<ReqBody, ResBody> {
    fn handle(&self, request: Request<ReqBody>) -> Response<ResBody>;
}

impl<F, ReqBody, ResBody> ErrorHandler<ReqBody, ResBody> for F
where
    F: Fn(Request<ReqBody>) -> Response<ResBody>,
{
    fn handle(&self, request: Request<ReqBody>) -> Response<ResBody> {
        self(request)
    }
}

/// Responds with the configured rejection status and a plain text reason,
/// e.g. `403 Forbidden` with `Forbidden - CSRF token invalid`.
///
/// Token generation failures get `500 Internal Server Error` instead.
#[derive(Clone, Copy, Debug)]
pub struct DefaultErrorHandler {
    status: StatusCode,
}

impl DefaultErrorHandler {
    pub fn new(status: StatusCode) -> Self {
        Self { status }
    }
}

impl Default for DefaultErrorHandler {
    fn default() -> Self {
        Self::new(StatusCode::FORBIDDEN)
    }
}

impl<ReqBody, ResBody> ErrorHandler<ReqBody, ResBody> for DefaultErrorHandler
where
    ResBody: From<String>,
{
    fn handle(&self, request: Request<ReqBody>) -> Response<ResBody> {
        let failure = failure_reason(&request).unwrap_or(Failure::BadToken);
        let status = match failure {
            Failure::EntropySource => StatusCode::INTERNAL_SERVER_ERROR,
            _ => self.status,
        };
        let text = format!(
            "{} - {}",
            status.canonical_reason().unwrap_or_else(|| status.as_str()),
            failure
        );

        let mut response = Response::new(ResBody::from(text));
        *response.status_mut() = status;
        response.headers_mut().insert(
            header::CONTENT_TYPE,
            HeaderValue::from_static("text/plain; charset=utf-8"),
        );
        response
    }
}
