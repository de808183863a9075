//! # tsu-access-log
//!
//! HTTP access logging for the tsu framework: one structured JSON line per
//! request, with field-by-field opt-in and masking of sensitive parameters.
//!
//! The crate carries the small hyper-based host it plugs into (router,
//! server, request and response types) and a [`middleware`] chain with a
//! start hook and a terminal hook. The access log itself lives in
//! [`access_log`].
//!
//! ## Quick start
//!
//! ```rust,no_run
//! use tsu_access_log::{Request, Response, Router, Server, access_log};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), tsu_access_log::Error> {
//!     // Writes config/log/access.toml on first run; edit it or set
//!     // LOG_ACCESS_ENABLE=true to switch logging on.
//!     access_log::publish("config")?;
//!
//!     let app = Router::new().get("/users/{id}", get_user);
//!     let app = access_log::install(app, "config", "storage/logs")?;
//!
//!     Server::bind("0.0.0.0:3000").serve(app).await
//! }
//!
//! async fn get_user(req: Request) -> Response {
//!     let id = req.param("id").unwrap_or("unknown");
//!     Response::json(format!(r#"{{"id":"{id}"}}"#))
//! }
//! ```
//!
//! ## Collaborators
//!
//! [`AccessLog`](access_log::AccessLog) takes its clock and its output as
//! constructor arguments: any [`Timer`] and any [`LogSink`]. The defaults are
//! [`MonotonicTimer`] and [`FileSink`], which writes daily-rotated files under
//! `<root>/<directory>/`.

mod error;
mod handler;
mod memory;
mod request;
mod response;
mod router;
mod server;

pub mod logger;
pub mod middleware;
pub mod timer;

pub use error::Error;
pub use handler::Handler;
pub use logger::{FileSink, LogBatch, LogSink, MemorySink, TracingSink};
pub use middleware::access_log;
pub use middleware::{Completion, Middleware};
pub use request::Request;
pub use response::{IntoResponse, Response, ResponseStatus};
pub use router::Router;
pub use server::Server;
pub use timer::{MonotonicTimer, Stopwatch, Timer, TimerHandle};
