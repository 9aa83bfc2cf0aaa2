//! The service's route handlers and table.

use chrono::{SecondsFormat, Utc};
use http::StatusCode;
use serde::Serialize;
use serde_json::json;

use crate::ingest::{self, Ingest};
use crate::request::Request;
use crate::response::Response;
use crate::router::Router;

/// One searchable fact.
#[derive(Serialize)]
struct Fact {
    topic: &'static str,
    summary: &'static str,
}

const FACTS: [Fact; 4] = [
    Fact { topic: "france", summary: "The capital of France is Paris." },
    Fact { topic: "japan", summary: "The capital of Japan is Tokyo." },
    Fact { topic: "peru", summary: "The capital of Peru is Lima." },
    Fact { topic: "kenya", summary: "The capital of Kenya is Nairobi." },
];

/// The full route table.
pub fn app() -> Router {
    Router::new()
        .get("/", banner)
        .get("/health", health)
        .get("/time", time)
        .get("/search", search)
        .post("/echo", echo)
}

// GET /
pub async fn banner(_req: Request) -> Response {
    Response::text("Try: POST /echo with JSON\n")
}

// GET /health
pub async fn health(_req: Request) -> Response {
    json_ok(&json!({ "status": "ok" }))
}

// GET /time
pub async fn time(_req: Request) -> Response {
    let now = Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true);
    json_ok(&json!({ "now": now }))
}

// GET /search?q=<keyword>
//
// Case-insensitive substring scan over the fact table.
pub async fn search(req: Request) -> Response {
    let Some(q) = req.query("q").filter(|q| !q.is_empty()) else {
        return Response::builder().status(StatusCode::BAD_REQUEST).json(
            serde_json::to_vec(&json!({ "error": "Missing query parameter \"q\"" }))
                .unwrap_or_default(),
        );
    };

    let needle = q.to_ascii_lowercase();
    let results: Vec<&Fact> =
        FACTS.iter().filter(|fact| fact.topic.contains(needle.as_str())).collect();
    json_ok(&json!({ "query": q, "results": results }))
}

// POST /echo
//
// Reads a JSON body under the default budget and reflects the parsed
// payload.
pub async fn echo(req: Request) -> Response {
    match ingest::read_json(req, ingest::DEFAULT_BODY_LIMIT).await {
        Ingest::Handled(response) => response,
        Ingest::Rejected { status, error } => Response::builder()
            .status(status)
            .json(serde_json::to_vec(&json!({ "error": error })).unwrap_or_default()),
        Ingest::Accepted(payload) => json_ok(&json!({ "received": payload })),
    }
}

fn json_ok(value: &serde_json::Value) -> Response {
    Response::json(serde_json::to_vec(value).unwrap_or_default())
}
