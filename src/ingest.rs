//! Guarded JSON body ingestion.
//!
//! [`read_json`] is the single entry point for routes that accept a JSON
//! body. It owns the hostile part of the request lifecycle (wrong content
//! type, oversized payload, mid-transfer disconnect, malformed JSON) and
//! resolves every invocation to exactly one [`Ingest`] case. It never
//! returns an error across its boundary.
//!
//! Ordering contract: the content-type gate runs before the first body
//! byte is polled, and the byte-budget check runs before each chunk is
//! appended, so the accumulation buffer can never outgrow the budget.

use std::pin::pin;

use bytes::Bytes;
use http::StatusCode;
use http_body_util::BodyExt;
use hyper::body::Body;
use serde_json::Value;
use tracing::debug;

use crate::request::Request;
use crate::response::Response;

/// Default body budget for JSON routes (1 MiB).
pub const DEFAULT_BODY_LIMIT: usize = 1024 * 1024;

/// Outcome of one ingestion attempt. Exactly one case per invocation.
pub enum Ingest {
    /// The pipeline already settled the exchange. The caller forwards this
    /// response untouched and performs no further work on the request.
    /// The connection carries a close advisory; when the peer vanished
    /// mid-transfer the response is an inert formality the transport
    /// discards.
    Handled(Response),
    /// The body was read cleanly but failed validation. The caller formats
    /// and writes the error itself; the connection stays reusable.
    Rejected {
        status: StatusCode,
        error: &'static str,
    },
    /// The parsed payload: any JSON type, object through `null`.
    Accepted(Value),
}

/// Reads and parses a JSON request body under a byte budget.
///
/// `max_bytes` must be positive. See [`Ingest`] for the outcome contract.
pub async fn read_json(req: Request, max_bytes: usize) -> Ingest {
    debug_assert!(max_bytes > 0, "body budget must be positive");

    // Fast rejection before any body byte is read.
    if !is_json(req.header("content-type")) {
        return Ingest::Handled(Response::error(StatusCode::UNSUPPORTED_MEDIA_TYPE).close());
    }

    collect(req.into_body(), max_bytes).await
}

/// Media-type match for `application/json`, ignoring parameters such as
/// `; charset=utf-8`. Case-insensitive. An absent header does not match.
fn is_json(content_type: Option<&str>) -> bool {
    content_type
        .and_then(|value| value.split(';').next())
        .is_some_and(|media| media.trim().eq_ignore_ascii_case("application/json"))
}

async fn collect<B>(body: B, max_bytes: usize) -> Ingest
where
    B: Body<Data = Bytes>,
    B::Error: std::fmt::Display,
{
    let mut body = pin!(body);
    let mut buf = Vec::with_capacity((body.size_hint().lower() as usize).min(max_bytes));
    let mut received = 0usize;

    while let Some(next) = body.as_mut().frame().await {
        let frame = match next {
            Ok(frame) => frame,
            Err(e) => {
                // The peer is gone; there is no one left to answer. Drop
                // the partial buffer, never attempt a partial parse.
                debug!("transport failed mid-body: {e}");
                return Ingest::Handled(Response::status(StatusCode::BAD_REQUEST).close());
            }
        };
        let Ok(chunk) = frame.into_data() else {
            // Trailers carry no payload bytes.
            continue;
        };
        if received + chunk.len() > max_bytes {
            // Budget check strictly precedes the append. Returning drops
            // the body stream, which aborts the remaining transfer.
            return Ingest::Handled(Response::error(StatusCode::PAYLOAD_TOO_LARGE).close());
        }
        received += chunk.len();
        buf.extend_from_slice(&chunk);
    }

    if buf.is_empty() {
        // A declared Content-Length of zero and a body that never arrived
        // are indistinguishable here, deliberately.
        return Ingest::Rejected { status: StatusCode::BAD_REQUEST, error: "Missing JSON body" };
    }

    match serde_json::from_slice(&buf) {
        Ok(value) => Ingest::Accepted(value),
        Err(_) => Ingest::Rejected { status: StatusCode::BAD_REQUEST, error: "Invalid JSON" },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;
    use std::pin::Pin;
    use std::task::{Context, Poll};

    use http_body_util::Full;
    use hyper::body::Frame;

    use crate::error::BoxError;

    /// Delivers a scripted sequence of chunks and transport errors, one
    /// frame per poll, the way a real socket would.
    struct ScriptBody {
        frames: VecDeque<Result<&'static [u8], &'static str>>,
    }

    impl ScriptBody {
        fn new(frames: impl IntoIterator<Item = Result<&'static [u8], &'static str>>) -> Self {
            Self { frames: frames.into_iter().collect() }
        }
    }

    impl Body for ScriptBody {
        type Data = Bytes;
        type Error = BoxError;

        fn poll_frame(
            self: Pin<&mut Self>,
            _cx: &mut Context<'_>,
        ) -> Poll<Option<Result<Frame<Bytes>, Self::Error>>> {
            Poll::Ready(self.get_mut().frames.pop_front().map(|step| {
                step.map(|chunk| Frame::data(Bytes::from_static(chunk)))
                    .map_err(BoxError::from)
            }))
        }
    }

    /// A body that must never be polled. Proves the content-type gate
    /// fires before ingestion touches the stream.
    struct UntouchableBody;

    impl Body for UntouchableBody {
        type Data = Bytes;
        type Error = BoxError;

        fn poll_frame(
            self: Pin<&mut Self>,
            _cx: &mut Context<'_>,
        ) -> Poll<Option<Result<Frame<Bytes>, Self::Error>>> {
            panic!("body polled despite content-type rejection");
        }
    }

    fn request_with_content_type<B>(content_type: Option<&str>, body: B) -> Request
    where
        B: Body<Data = Bytes> + Send + 'static,
        B::Error: Into<BoxError>,
    {
        let mut builder = http::Request::builder().method("POST").uri("/echo");
        if let Some(ct) = content_type {
            builder = builder.header("content-type", ct);
        }
        Request::from_http(builder.body(body).unwrap())
    }

    #[tokio::test]
    async fn accepts_single_chunk_object() {
        let body = ScriptBody::new([Ok(br#"{"a":1}"#.as_slice())]);
        match collect(body, 1024).await {
            Ingest::Accepted(value) => assert_eq!(value["a"], 1),
            _ => panic!("expected Accepted"),
        }
    }

    #[tokio::test]
    async fn reassembles_chunks_in_arrival_order() {
        let body = ScriptBody::new([
            Ok(br#"{"city":"#.as_slice()),
            Ok(br#""Lima","#.as_slice()),
            Ok(br#""n":2}"#.as_slice()),
        ]);
        match collect(body, 1024).await {
            Ingest::Accepted(value) => {
                assert_eq!(value["city"], "Lima");
                assert_eq!(value["n"], 2);
            }
            _ => panic!("expected Accepted"),
        }
    }

    #[tokio::test]
    async fn accepts_scalar_and_null_payloads() {
        match collect(ScriptBody::new([Ok(b"42".as_slice())]), 64).await {
            Ingest::Accepted(value) => assert_eq!(value, 42),
            _ => panic!("expected Accepted"),
        }
        match collect(ScriptBody::new([Ok(b"null".as_slice())]), 64).await {
            Ingest::Accepted(value) => assert!(value.is_null()),
            _ => panic!("expected Accepted"),
        }
    }

    #[tokio::test]
    async fn empty_stream_is_missing_body() {
        match collect(ScriptBody::new([]), 64).await {
            Ingest::Rejected { status, error } => {
                assert_eq!(status, StatusCode::BAD_REQUEST);
                assert_eq!(error, "Missing JSON body");
            }
            _ => panic!("expected Rejected"),
        }
    }

    #[tokio::test]
    async fn whitespace_body_is_invalid_not_missing() {
        match collect(ScriptBody::new([Ok(b"   \n\t ".as_slice())]), 64).await {
            Ingest::Rejected { error, .. } => assert_eq!(error, "Invalid JSON"),
            _ => panic!("expected Rejected"),
        }
    }

    #[tokio::test]
    async fn garbage_body_is_invalid() {
        match collect(ScriptBody::new([Ok(b"not json".as_slice())]), 64).await {
            Ingest::Rejected { status, error } => {
                assert_eq!(status, StatusCode::BAD_REQUEST);
                assert_eq!(error, "Invalid JSON");
            }
            _ => panic!("expected Rejected"),
        }
    }

    #[tokio::test]
    async fn cumulative_overflow_is_handled_with_close() {
        // Three 30-byte chunks against a 64-byte budget: the third chunk
        // trips the guard before it is appended.
        let chunk: &[u8] = &[b'x'; 30];
        let body = ScriptBody::new([Ok(chunk), Ok(chunk), Ok(chunk)]);
        match collect(body, 64).await {
            Ingest::Handled(res) => {
                assert_eq!(res.status, StatusCode::PAYLOAD_TOO_LARGE);
                assert_eq!(res.header("connection"), Some("close"));
            }
            _ => panic!("expected Handled"),
        }
    }

    #[tokio::test]
    async fn body_at_exact_budget_is_accepted() {
        let body = ScriptBody::new([Ok(br#"{"k":"vv"}"#.as_slice())]);
        match collect(body, 10).await {
            Ingest::Accepted(value) => assert_eq!(value["k"], "vv"),
            _ => panic!("expected Accepted"),
        }
    }

    #[tokio::test]
    async fn transport_error_mid_body_is_handled_silently() {
        let body = ScriptBody::new([Ok(br#"{"partial":"#.as_slice()), Err("connection reset")]);
        match collect(body, 1024).await {
            Ingest::Handled(res) => {
                // Inert terminal: nothing meaningful left to say to a
                // vanished peer.
                assert!(res.body.is_empty());
                assert_eq!(res.header("connection"), Some("close"));
            }
            _ => panic!("expected Handled"),
        }
    }

    #[tokio::test]
    async fn wrong_content_type_rejected_before_body_is_read() {
        let req = request_with_content_type(Some("text/plain"), UntouchableBody);
        match read_json(req, 1024).await {
            Ingest::Handled(res) => {
                assert_eq!(res.status, StatusCode::UNSUPPORTED_MEDIA_TYPE);
                assert_eq!(res.header("connection"), Some("close"));
            }
            _ => panic!("expected Handled"),
        }
    }

    #[tokio::test]
    async fn missing_content_type_rejected_before_body_is_read() {
        let req = request_with_content_type(None, UntouchableBody);
        match read_json(req, 1024).await {
            Ingest::Handled(res) => assert_eq!(res.status, StatusCode::UNSUPPORTED_MEDIA_TYPE),
            _ => panic!("expected Handled"),
        }
    }

    #[tokio::test]
    async fn content_type_parameters_and_casing_are_tolerated() {
        for ct in ["application/json; charset=utf-8", "APPLICATION/JSON", "Application/Json ; v=1"] {
            let req = request_with_content_type(
                Some(ct),
                Full::new(Bytes::from_static(br#"{"ok":true}"#)),
            );
            match read_json(req, 1024).await {
                Ingest::Accepted(value) => assert_eq!(value["ok"], true),
                _ => panic!("content type {ct:?} should have been accepted"),
            }
        }
    }

    #[test]
    fn media_type_match_ignores_parameters_but_not_suffixes() {
        assert!(is_json(Some("application/json")));
        assert!(is_json(Some("application/json;charset=utf-8")));
        assert!(!is_json(Some("application/json-patch+json")));
        assert!(!is_json(Some("text/json")));
        assert!(!is_json(None));
    }
}
