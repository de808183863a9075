//! HTTP access logging.
//!
//! [`AccessLog`] writes one JSON line per request to a [`LogSink`]. What goes
//! into the line is decided field by field by [`AccessLogConfig`]; sensitive
//! body parameters are masked before anything leaves the process.
//!
//! ```rust,no_run
//! use tsu_access_log::{Router, Server, access_log};
//!
//! # async fn run() -> Result<(), tsu_access_log::Error> {
//! access_log::publish("config")?;
//! let app = access_log::install(Router::new(), "config", "storage/logs")?;
//! Server::bind("0.0.0.0:3000").serve(app).await
//! # }
//! ```
//!
//! A logged line with every field switched on:
//!
//! ```text
//! {"timestamp":"2026-10-16 09:30:00","execution_time":3.21,"memory_peak_usage":9437184,
//!  "request":{"url":"/login","http_method":"POST","user_agent":"curl/8.5","ip_address":"10.0.0.7",
//!  "body":{"username":"a","password":"********"}},"response":{"status":302,"status_text":"Found"}}
//! ```

mod config;
mod mask;
mod record;

use std::path::{Path, PathBuf};

use http::Extensions;
use regex::RegexSet;
use serde_json::Map;
use tracing::debug;

use crate::error::Error;
use crate::logger::{FileSink, LogBatch, LogSink};
use crate::memory;
use crate::middleware::Middleware;
use crate::request::Request;
use crate::response::ResponseStatus;
use crate::router::Router;
use crate::timer::{MonotonicTimer, Timer, TimerHandle};

pub use config::{AccessLogConfig, ENV_PREFIX, PUBLISHED_PATH, SECTION, publish};
pub use mask::mask;
pub use record::{AccessRecord, RequestRecord, ResponseRecord, TIMESTAMP_FORMAT};

/// Line template handed to the sink: the record is the whole line.
pub const LINE_FORMAT: &str = "%message%";

/// The access-log middleware.
///
/// Holds only immutable configuration and its collaborators; the per-request
/// timer lives in the request extensions.
pub struct AccessLog<T = MonotonicTimer, S = FileSink> {
    config: AccessLogConfig,
    ignore: RegexSet,
    timer: T,
    sink: S,
}

/// Extension slot for the running timer, private so no other middleware can
/// take or replace it.
#[derive(Clone)]
struct RequestTimer<H>(H);

impl<T: Timer, S: LogSink> AccessLog<T, S> {
    /// Compiles the ignore patterns; an invalid one is reported here, once,
    /// instead of on every request.
    pub fn new(config: AccessLogConfig, timer: T, sink: S) -> Result<Self, Error> {
        let ignore = RegexSet::new(&config.ignore_uri)?;
        Ok(Self { config, ignore, timer, sink })
    }

    pub fn config(&self) -> &AccessLogConfig {
        &self.config
    }

    /// Whether `req` gets a record: logging is on and no ignore pattern
    /// matches the request URI.
    pub fn is_enabled_for(&self, req: &Request) -> bool {
        self.config.enable && !self.ignore.is_match(req.request_uri())
    }

    /// Assembles the record for a finished request. Switched-off fields stay
    /// empty; the body is masked.
    pub fn record(&self, req: &Request, res: &dyn ResponseStatus, elapsed_ms: f64) -> AccessRecord {
        let c = &self.config;
        AccessRecord {
            timestamp: chrono::Local::now().format(TIMESTAMP_FORMAT).to_string(),
            execution_time: c.execution_time.then_some(elapsed_ms),
            memory_peak_usage: c.memory_peak_usage.then(memory::peak_usage).flatten(),
            request: RequestRecord {
                url: c.request_url.then(|| record::escape_html(req.request_uri())),
                http_method: c.request_http_method.then(|| req.method().to_string()),
                user_agent: c.request_user_agent.then(|| req.user_agent().unwrap_or_default().to_owned()),
                ip_address: c.request_ip_address.then(|| req.ip().to_string()),
                body: if c.request_body {
                    mask(req.input(), &c.masking_parameters, &c.masking_text)
                } else {
                    Map::new()
                },
            },
            response: ResponseRecord {
                status: c.response_status.then(|| res.status()),
                status_text: c.response_status_text.then(|| res.status_text().to_owned()),
            },
        }
    }

    fn emit(&self, record: &AccessRecord) -> Result<(), Error> {
        let mut batch = LogBatch::info();
        batch
            .set_directory(&self.config.directory)
            .set_format(LINE_FORMAT)
            .add(record)?;
        self.sink.flush(batch)
    }
}

impl<T: Timer, S: LogSink> Middleware for AccessLog<T, S> {
    fn on_request_start(&self, req: &Request, ext: &mut Extensions) {
        if !self.is_enabled_for(req) {
            return;
        }
        ext.insert(RequestTimer(self.timer.start()));
    }

    fn wants_completion(&self, req: &Request, _ext: &Extensions) -> bool {
        self.is_enabled_for(req)
    }

    /// # Panics
    ///
    /// Panics if the request was logged but its start hook never ran.
    fn on_request_complete(
        &self,
        req: &Request,
        res: &dyn ResponseStatus,
        ext: &mut Extensions,
    ) -> Result<(), Error> {
        if !self.is_enabled_for(req) {
            return Ok(());
        }

        let RequestTimer(mut timer) = ext
            .remove::<RequestTimer<T::Handle>>()
            .expect("access log completed a request it never started");
        timer.stop();

        let record = self.record(req, res, timer.elapsed_milliseconds());
        self.emit(&record)
    }
}

/// Loads `<config_dir>/log/access.toml` (plus env overrides), builds the
/// default file-backed [`AccessLog`] writing under `log_root`, and installs
/// it on `router`.
///
/// # Panics
///
/// Panics if an access log is already installed on `router`.
pub fn install(
    router: Router,
    config_dir: impl AsRef<Path>,
    log_root: impl Into<PathBuf>,
) -> Result<Router, Error> {
    let config = AccessLogConfig::load_published(config_dir)?;
    let sink = FileSink::new(log_root);
    debug!(
        enable = config.enable,
        root = %sink.root().display(),
        directory = %config.directory,
        "installing access log"
    );
    let middleware = AccessLog::new(config, MonotonicTimer, sink)?;
    Ok(router.layer(middleware))
}
