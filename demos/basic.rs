//! Access log demo: a couple of JSON endpoints with every record field on,
//! printed through `tracing` instead of written to files.
//!
//! Run with:
//!   RUST_LOG=info cargo run --example basic
//!
//! Try:
//!   curl http://localhost:3000/users/42
//!   curl -X POST http://localhost:3000/login \
//!        -H 'content-type: application/json' \
//!        -d '{"username":"alice","password":"hunter2"}'
//!   curl http://localhost:3000/healthz        # ignored, no record

use http::StatusCode;
use tsu_access_log::access_log::{AccessLog, AccessLogConfig};
use tsu_access_log::{MonotonicTimer, Request, Response, Router, Server, TracingSink};

#[tokio::main]
async fn main() -> Result<(), tsu_access_log::Error> {
    tracing_subscriber::fmt::init();

    let config = AccessLogConfig {
        enable: true,
        ignore_uri: vec!["^/healthz$".to_owned()],
        execution_time: true,
        memory_peak_usage: true,
        request_url: true,
        request_http_method: true,
        request_user_agent: true,
        request_ip_address: true,
        request_body: true,
        response_status: true,
        response_status_text: true,
        ..AccessLogConfig::default()
    };

    let app = Router::new()
        .get("/users/{id}", get_user)
        .post("/login", login)
        .get("/healthz", healthz)
        .layer(AccessLog::new(config, MonotonicTimer, TracingSink)?);

    Server::bind("0.0.0.0:3000").serve(app).await
}

async fn get_user(req: Request) -> Response {
    let id = req.param("id").unwrap_or("unknown");
    Response::json(format!(r#"{{"id":"{id}","name":"alice"}}"#))
}

// The password never reaches the log: it is in the default masking list.
async fn login(req: Request) -> Response {
    if req.body().is_empty() {
        return Response::status(StatusCode::BAD_REQUEST);
    }
    Response::builder()
        .status(StatusCode::FOUND)
        .header("location", "/home")
        .no_body()
}

async fn healthz(_req: Request) -> &'static str {
    "ok"
}
