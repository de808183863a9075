//! Handler trait and type erasure.
//!
//! Every `async fn` is its own anonymous type, yet the router keeps all of
//! them in one tree per method. A tree holds a single value type, so each
//! handler is hidden behind `dyn ErasedHandler`:
//!
//! ```text
//! async fn hello(req: Request) -> Response { … }   ← user writes this
//!        ↓ router.get("/", hello)
//! hello.into_boxed_handler()                       ← Handler blanket impl
//!        ↓
//! Arc::new(FnHandler(hello))                       ← stored as BoxedHandler
//!        ↓ at request time
//! handler.call(req)                                ← one vtable call
//!        ↓
//! Box::pin(async { hello(req).await.into_response() })
//! ```
//!
//! Per request that is one `Arc` clone out of the tree and one virtual call,
//! both lost in the noise next to socket I/O.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use crate::request::Request;
use crate::response::{IntoResponse, Response};

/// A type-erased handler future.
///
/// Boxed because its size is unknown behind `dyn`, pinned because a future
/// may not move once polled. `Send + 'static` lets tokio run it on any worker.
pub(crate) type BoxFuture = Pin<Box<dyn Future<Output = Response> + Send + 'static>>;

/// Internal dispatch interface.
///
/// `#[doc(hidden)] pub` rather than `pub(crate)`: it shows up in the return
/// type of [`Handler::into_boxed_handler`], and a private type may not.
#[doc(hidden)]
pub trait ErasedHandler {
    fn call(&self, req: Request) -> BoxFuture;
}

/// Shared by every request that hits the route; cloning bumps a refcount.
#[doc(hidden)]
pub type BoxedHandler = Arc<dyn ErasedHandler + Send + Sync + 'static>;

/// Implemented for every `async fn(Request) -> impl IntoResponse`.
///
/// Never implemented by hand. The private `Sealed` supertrait means the
/// blanket impl below is the only one, so new methods can be added without
/// breaking downstream crates.
pub trait Handler: private::Sealed + Send + Sync + 'static {
    #[doc(hidden)]
    fn into_boxed_handler(self) -> BoxedHandler;
}

// Nameable inside this crate only, hence implementable inside it only.
mod private {
    pub trait Sealed {}
}

impl<F, Fut, R> private::Sealed for F
where
    F: Fn(Request) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = R> + Send + 'static,
    R: IntoResponse + Send + 'static,
{
}

impl<F, Fut, R> Handler for F
where
    F: Fn(Request) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = R> + Send + 'static,
    R: IntoResponse + Send + 'static,
{
    fn into_boxed_handler(self) -> BoxedHandler {
        Arc::new(FnHandler(self))
    }
}

/// Wraps a handler function so it can sit behind `dyn ErasedHandler`.
struct FnHandler<F>(F);

impl<F, Fut, R> ErasedHandler for FnHandler<F>
where
    F: Fn(Request) -> Fut + Send + Sync,
    Fut: Future<Output = R> + Send + 'static,
    R: IntoResponse + Send + 'static,
{
    fn call(&self, req: Request) -> BoxFuture {
        let fut = (self.0)(req);
        Box::pin(async move { fut.await.into_response() })
    }
}
