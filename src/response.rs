//! Outgoing HTTP response type.
//!
//! Handlers do not build these directly; they return an
//! [`Outcome`](crate::Outcome) and the [`Kernel`](crate::Kernel) maps it to a
//! `Response`. That keeps every status decision in one place.

use bytes::Bytes;
use http_body_util::Full;
use tracing::error;

use crate::status::Status;

// ── ContentType ───────────────────────────────────────────────────────────────

/// Content-type values the kernel attaches to mapped responses.
#[derive(Clone, Copy, Debug)]
pub enum ContentType {
    Html, // text/html; charset=utf-8
    Json, // application/json
    Text, // text/plain; charset=utf-8
}

impl ContentType {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Html => "text/html; charset=utf-8",
            Self::Json => "application/json",
            Self::Text => "text/plain; charset=utf-8",
        }
    }
}

// ── Response ─────────────────────────────────────────────────────────────────

/// An outgoing HTTP response: status, headers and a fully buffered body.
#[derive(Clone, Debug)]
pub struct Response {
    pub(crate) body: Bytes,
    pub(crate) headers: Vec<(String, String)>,
    pub(crate) status: u16,
}

impl Response {
    /// A response with the given status, headers and body, as-is.
    pub fn new(status: impl Into<u16>, headers: Vec<(String, String)>, body: impl Into<Bytes>) -> Self {
        Self { body: body.into(), headers, status: status.into() }
    }

    /// `text/plain; charset=utf-8` with the given status.
    pub fn text(status: Status, body: impl Into<String>) -> Self {
        Self::new(
            status,
            vec![("content-type".to_owned(), ContentType::Text.as_str().to_owned())],
            body.into(),
        )
    }

    pub fn status(&self) -> u16 { self.status }
    pub fn headers(&self) -> &[(String, String)] { &self.headers }
    pub fn body(&self) -> &[u8] { &self.body }

    /// Case-insensitive header lookup.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// Body as UTF-8, lossily.
    pub fn text_body(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }

    /// Converts into the hyper/http representation. A header that is not a
    /// valid HTTP token degrades the whole response to a bare 500.
    pub(crate) fn into_inner(self) -> http::Response<Full<Bytes>> {
        let mut builder = http::Response::builder().status(self.status);
        for (name, value) in &self.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }
        builder.body(Full::new(self.body)).unwrap_or_else(|e| {
            error!("invalid response: {e}");
            let mut fallback = http::Response::new(Full::new(Bytes::new()));
            *fallback.status_mut() = http::StatusCode::INTERNAL_SERVER_ERROR;
            fallback
        })
    }
}
