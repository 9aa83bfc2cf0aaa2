//! Incoming HTTP request type.

use bytes::Bytes;
use http_body_util::BodyExt;
use http_body_util::combinators::UnsyncBoxBody;
use hyper::body::Body;

use crate::error::BoxError;

/// Type-erased request body, delivered by the transport as a sequence of
/// frames. Erasure keeps handlers independent of whether the bytes come
/// from a live hyper connection or an in-memory test body.
pub(crate) type ReqBody = UnsyncBoxBody<Bytes, BoxError>;

/// An incoming HTTP request.
pub struct Request {
    parts: http::request::Parts,
    body: ReqBody,
}

impl Request {
    pub(crate) fn from_http<B>(req: http::Request<B>) -> Self
    where
        B: Body<Data = Bytes> + Send + 'static,
        B::Error: Into<BoxError>,
    {
        let (parts, body) = req.into_parts();
        Self { parts, body: body.map_err(Into::into).boxed_unsync() }
    }

    pub fn method(&self) -> &http::Method {
        &self.parts.method
    }

    /// The request path, without the query string.
    pub fn path(&self) -> &str {
        self.parts.uri.path()
    }

    pub fn headers(&self) -> &http::HeaderMap {
        &self.parts.headers
    }

    /// Case-insensitive header lookup; `None` for absent or non-UTF-8 values.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.parts.headers.get(name).and_then(|v| v.to_str().ok())
    }

    /// Returns the first value of a query parameter, undecoded.
    ///
    /// For `/search?q=france`, `req.query("q")` returns `Some("france")`.
    pub fn query(&self, key: &str) -> Option<&str> {
        self.parts.uri.query()?.split('&').find_map(|pair| {
            let (k, v) = pair.split_once('=').unwrap_or((pair, ""));
            (k == key).then_some(v)
        })
    }

    /// Consumes the request, yielding the raw body stream.
    pub(crate) fn into_body(self) -> ReqBody {
        self.body
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use http_body_util::Full;

    fn get(uri: &str) -> Request {
        Request::from_http(
            http::Request::builder()
                .uri(uri)
                .header("x-trace", "abc")
                .body(Full::new(Bytes::new()))
                .unwrap(),
        )
    }

    #[test]
    fn path_excludes_query() {
        assert_eq!(get("/search?q=peru").path(), "/search");
    }

    #[test]
    fn query_returns_first_match() {
        let req = get("/search?q=peru&q=kenya&page=2");
        assert_eq!(req.query("q"), Some("peru"));
        assert_eq!(req.query("page"), Some("2"));
        assert_eq!(req.query("missing"), None);
    }

    #[test]
    fn bare_query_key_yields_empty_value() {
        assert_eq!(get("/search?q").query("q"), Some(""));
    }

    #[test]
    fn header_lookup_is_case_insensitive() {
        assert_eq!(get("/").header("X-Trace"), Some("abc"));
    }
}
