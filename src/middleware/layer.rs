use super::{CsrfService, DefaultErrorHandler};
use crate::config::CsrfConfig;
use crate::protect::Protect;
use tower::Layer;

#[derive(Clone, Debug)]
pub struct CsrfLayer<H = DefaultErrorHandler> {
    protect: Protect,
    error_handler: H,
}

impl CsrfLayer {
    #[must_use]
    pub fn new(config: CsrfConfig) -> Self {
        let error_handler = DefaultErrorHandler::new(config.rejection_status);
        Self {
            protect: Protect::new(config),
            error_handler,
        }
    }
}

impl<H> CsrfLayer<H> {
    /// Replaces the handler invoked for rejected requests.
    ///
    /// This is the only place the handler is configured; [`CsrfConfig`]
    /// holds no handler.
    #[must_use]
    pub fn error_handler<H2>(self, error_handler: H2) -> CsrfLayer<H2> {
        CsrfLayer {
            protect: self.protect,
            error_handler,
        }
    }
}

impl<S, H> Layer<S> for CsrfLayer<H>
where
    H: Clone,
{
    type Service = CsrfService<S, H>;

    fn layer(&self, inner: S) -> Self::Service {
        CsrfService::new(inner, self.protect.clone(), self.error_handler.clone())
    }
}
