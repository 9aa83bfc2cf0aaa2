//! # plinth
//!
//! A small JSON-over-HTTP service built around two pieces of discipline:
//! guarded body ingestion and a graceful drain.
//!
//! ## The contract
//!
//! Route matching and the bundled routes are deliberately boring: exact
//! paths, a linear scan over four records. The care lives where requests
//! can hurt you.
//!
//! - **Ingestion** ([`ingest`]): a JSON body is read chunk by chunk under
//!   a byte budget, with the content-type gate ahead of the first byte and
//!   the budget check ahead of every append. Wrong type, oversize, client
//!   disconnect, and malformed JSON each resolve to exactly one terminal
//!   outcome; nothing is ever written twice.
//! - **Drain** ([`Shutdown`], [`Server`]): SIGTERM/SIGINT stop the accept
//!   loop, new work is refused with `503`, in-flight work finishes, and a
//!   bounded deadline guarantees the process exits either way: status 0
//!   after a clean drain, status 1 when the deadline forces the issue.
//!
//! ## Quick start
//!
//! ```rust,no_run
//! use plinth::{Server, routes};
//!
//! #[tokio::main]
//! async fn main() {
//!     tracing_subscriber::fmt::init();
//!     Server::bind("0.0.0.0:3000")
//!         .serve(routes::app())
//!         .await
//!         .expect("server error");
//! }
//! ```
//!
//! Custom handlers are plain `async fn`s:
//!
//! ```rust,no_run
//! use plinth::ingest::{self, Ingest};
//! use plinth::{Request, Response, Router};
//!
//! async fn intake(req: Request) -> Response {
//!     match ingest::read_json(req, 64 * 1024).await {
//!         Ingest::Handled(response) => response,
//!         Ingest::Rejected { status, .. } => Response::status(status),
//!         Ingest::Accepted(payload) => {
//!             Response::json(serde_json::to_vec(&payload).unwrap_or_default())
//!         }
//!     }
//! }
//!
//! let app = Router::new().post("/intake", intake);
//! ```

mod error;
mod handler;
mod request;
mod response;
mod router;
mod server;
mod shutdown;

pub mod ingest;
pub mod routes;

pub use error::{BoxError, Error};
pub use handler::Handler;
pub use ingest::Ingest;
pub use request::Request;
pub use response::{IntoResponse, Response};
pub use router::Router;
pub use server::Server;
pub use shutdown::Shutdown;
