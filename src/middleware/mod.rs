//! Middleware layer.
//!
//! A middleware sees every request twice:
//!
//! 1. [`on_request_start`](Middleware::on_request_start) runs before the
//!    handler, in registration order.
//! 2. [`on_request_complete`](Middleware::on_request_complete) is the terminal
//!    hook. It runs after the response has been produced, in reverse
//!    registration order, off the response path.
//!
//! Anything a middleware needs to carry from the first hook to the second
//! goes into the per-request [`Extensions`], never into `self`: one instance
//! serves every in-flight request.
//!
//! Built-in middleware:
//! - [`access_log`] writes one structured record per request.

use std::sync::Arc;

use http::{Extensions, StatusCode};

use crate::error::Error;
use crate::request::Request;
use crate::response::ResponseStatus;

pub mod access_log;

pub trait Middleware: Send + Sync + 'static {
    fn on_request_start(&self, _req: &Request, _ext: &mut Extensions) {}

    /// Whether [`on_request_complete`](Middleware::on_request_complete) has
    /// anything to do for this request. Asked once, after the handler.
    ///
    /// Returning `false` leaves the middleware out of the request's
    /// [`Completion`]. When no middleware wants its terminal hook the server
    /// schedules nothing at all.
    fn wants_completion(&self, _req: &Request, _ext: &Extensions) -> bool {
        true
    }

    fn on_request_complete(
        &self,
        _req: &Request,
        _res: &dyn ResponseStatus,
        _ext: &mut Extensions,
    ) -> Result<(), Error> {
        Ok(())
    }
}

pub(crate) type SharedMiddleware = Arc<dyn Middleware>;

/// The deferred terminal hooks of one request.
///
/// Returned by [`Router::dispatch`](crate::Router::dispatch) next to the
/// response. The server runs it on the blocking pool once the response is on
/// its way; dropping it without running skips the terminal hooks.
#[must_use = "terminal hooks only run when the completion is run"]
pub struct Completion {
    request: Request,
    status: StatusCode,
    extensions: Extensions,
    chain: Vec<SharedMiddleware>,
}

impl Completion {
    pub(crate) fn new(
        request: Request,
        status: StatusCode,
        extensions: Extensions,
        chain: Vec<SharedMiddleware>,
    ) -> Self {
        Self { request, status, extensions, chain }
    }

    pub fn is_empty(&self) -> bool {
        self.chain.is_empty()
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }

    /// Runs every terminal hook, last registered first. A failing hook does
    /// not stop the ones after it; the first error is returned.
    pub fn run(mut self) -> Result<(), Error> {
        let mut first_err = None;
        for mw in self.chain.iter().rev() {
            if let Err(e) = mw.on_request_complete(&self.request, &self.status, &mut self.extensions) {
                first_err.get_or_insert(e);
            }
        }
        first_err.map_or(Ok(()), Err)
    }
}
