use super::ErrorHandler;
use crate::protect::{Decision, Protect};
use crate::validate::Form;
use bytes::Bytes;
use futures::future::BoxFuture;
use http::{Request, Response};
use http_body::Body;
use http_body_util::{BodyExt, LengthLimitError, Limited};
use std::task::{self, Poll};
use tower::Service;

#[derive(Clone, Debug)]
pub struct CsrfService<S, H> {
    inner: S,
    protect: Protect,
    error_handler: H,
}

impl<S, H> CsrfService<S, H> {
    pub fn new(inner: S, protect: Protect, error_handler: H) -> Self {
        Self {
            inner,
            protect,
            error_handler,
        }
    }
}

impl<S, H, ReqBody, ResBody> Service<Request<ReqBody>> for CsrfService<S, H>
where
    S: Service<Request<ReqBody>, Response = Response<ResBody>> + Clone + Send + 'static,
    S::Future: Send + 'static,
    S::Error: Send + 'static,
    H: ErrorHandler<ReqBody, ResBody> + Clone + Send + 'static,
    ReqBody: Body + From<Bytes> + Send + 'static,
    ReqBody::Data: Send,
    ReqBody::Error: Into<Box<dyn std::error::Error + Send + Sync>>,
    ResBody: Send + 'static,
{
    type Error = S::Error;
    type Future = BoxFuture<'static, Result<Self::Response, Self::Error>>;
    type Response = S::Response;

    fn poll_ready(&mut self, cx: &mut task::Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, req: Request<ReqBody>) -> Self::Future {
        // The clone may not be ready, keep the one that was polled.
        let clone = self.inner.clone();
        let mut inner = std::mem::replace(&mut self.inner, clone);
        let protect = self.protect.clone();
        let error_handler = self.error_handler.clone();

        Box::pin(async move {
            let (parts, body) = req.into_parts();

            let (form, body) = if protect.needs_form(&parts.method, parts.uri.path(), &parts.headers)
            {
                let limit = protect.config().max_form_bytes;
                match Limited::new(body, limit).collect().await {
                    Ok(collected) => {
                        let bytes = collected.to_bytes();
                        (Buffered::Body(bytes.clone()), ReqBody::from(bytes))
                    }
                    Err(error) if error.is::<LengthLimitError>() => {
                        tracing::debug!(limit, "form body too large");
                        (Buffered::TooLarge, ReqBody::from(Bytes::new()))
                    }
                    Err(error) => {
                        tracing::debug!(%error, "failed to buffer form body");
                        (Buffered::Absent, ReqBody::from(Bytes::new()))
                    }
                }
            } else {
                (Buffered::Absent, body)
            };

            let verdict = protect.evaluate(
                &parts.method,
                parts.uri.path(),
                &parts.headers,
                form.as_form(),
            );

            let mut req = Request::from_parts(parts, body);
            verdict.annotate(req.extensions_mut());

            let mut response = match verdict.decision {
                Decision::Bypassed | Decision::Allowed => inner.call(req).await?,
                Decision::Rejected(_) => error_handler.handle(req),
            };
            verdict.finish(response.headers_mut());

            Ok(response)
        })
    }
}

enum Buffered {
    Absent,
    Body(Bytes),
    TooLarge,
}

impl Buffered {
    fn as_form(&self) -> Form<'_> {
        match self {
            Buffered::Absent => Form::Absent,
            Buffered::Body(bytes) => Form::Body(bytes),
            Buffered::TooLarge => Form::TooLarge,
        }
    }
}
