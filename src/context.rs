//! Per-request values shared with downstream handlers.
//!
//! The middleware needs one capability from its host: somewhere to put a value
//! for the duration of a request and read it back later. [`RequestContext`]
//! is that capability, keyed by type. It is implemented for
//! [`http::Extensions`] and for [`http::Request`], which covers any framework
//! built on the `http` crate.
use crate::validate::Failure;
use http::{Extensions, Request};
use std::sync::Arc;

pub trait RequestContext {
    fn get<T>(&self) -> Option<&T>
    where
        T: Clone + Send + Sync + 'static;

    fn insert<T>(&mut self, value: T)
    where
        T: Clone + Send + Sync + 'static;
}

impl RequestContext for Extensions {
    fn get<T>(&self) -> Option<&T>
    where
        T: Clone + Send + Sync + 'static,
    {
        Extensions::get::<T>(self)
    }

    fn insert<T>(&mut self, value: T)
    where
        T: Clone + Send + Sync + 'static,
    {
        Extensions::insert(self, value);
    }
}

impl<B> RequestContext for Request<B> {
    fn get<T>(&self) -> Option<&T>
    where
        T: Clone + Send + Sync + 'static,
    {
        self.extensions().get::<T>()
    }

    fn insert<T>(&mut self, value: T)
    where
        T: Clone + Send + Sync + 'static,
    {
        self.extensions_mut().insert(value);
    }
}

/// The masked token issued for the current request.
#[derive(Clone, Debug)]
pub(crate) struct IssuedToken {
    pub(crate) masked: String,
    pub(crate) field_name: Arc<str>,
}

/// Returns the masked token to embed in the response, if one was issued.
pub fn masked_token<C: RequestContext>(ctx: &C) -> Option<&str> {
    ctx.get::<IssuedToken>().map(|t| t.masked.as_str())
}

/// Returns why the request was rejected. Only set on the error handler path.
pub fn failure_reason<C: RequestContext>(ctx: &C) -> Option<Failure> {
    ctx.get::<Failure>().copied()
}

/// Returns the configured form field name.
pub fn field_name<C: RequestContext>(ctx: &C) -> Option<&str> {
    ctx.get::<IssuedToken>().map(|t| &*t.field_name)
}

/// Renders a hidden `<input>` carrying the masked token, or an empty string
/// when no token was issued.
pub fn template_field<C: RequestContext>(ctx: &C) -> String {
    match ctx.get::<IssuedToken>() {
        Some(t) => format!(
            r#"<input type="hidden" name="{}" value="{}">"#,
            escape(&t.field_name),
            escape(&t.masked)
        ),
        None => String::new(),
    }
}

fn escape(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            c => out.push(c),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_context() {
        let req = Request::new(());
        assert_eq!(masked_token(&req), None);
        assert_eq!(failure_reason(&req), None);
        assert_eq!(field_name(&req), None);
        assert_eq!(template_field(&req), "");
    }

    #[test]
    fn reads_back_values() {
        let mut ext = Extensions::new();
        RequestContext::insert(
            &mut ext,
            IssuedToken {
                masked: "abc".to_string(),
                field_name: Arc::from("csrf_token"),
            },
        );
        RequestContext::insert(&mut ext, Failure::Expired);
        assert_eq!(masked_token(&ext), Some("abc"));
        assert_eq!(field_name(&ext), Some("csrf_token"));
        assert_eq!(failure_reason(&ext), Some(Failure::Expired));
        assert_eq!(
            template_field(&ext),
            r#"<input type="hidden" name="csrf_token" value="abc">"#
        );
    }

    #[test]
    fn template_field_escapes() {
        let mut req = Request::new(());
        RequestContext::insert(
            &mut req,
            IssuedToken {
                masked: "a".to_string(),
                field_name: Arc::from(r#""><script>"#),
            },
        );
        assert_eq!(
            template_field(&req),
            r#"<input type="hidden" name="&quot;&gt;&lt;script&gt;" value="a">"#
        );
    }
}
