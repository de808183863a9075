//! Radix-tree request router and middleware chain.
//!
//! One tree per HTTP method, O(path-length) lookup. Middleware registered with
//! [`Router::layer`] wraps every request, matched or not.

use std::any::{TypeId, type_name};
use std::collections::HashMap;
use std::sync::Arc;

use http::{Extensions, Method, StatusCode};
use matchit::Router as MatchitRouter;

use crate::handler::{BoxedHandler, Handler};
use crate::middleware::{Completion, Middleware, SharedMiddleware};
use crate::request::Request;
use crate::response::Response;

/// The application router. Build it once at startup; pass it to
/// [`Server::serve`](crate::Server::serve).
pub struct Router {
    routes: HashMap<Method, MatchitRouter<BoxedHandler>>,
    chain: Vec<(TypeId, SharedMiddleware)>,
}

impl Router {
    pub fn new() -> Self {
        Self { routes: HashMap::new(), chain: Vec::new() }
    }

    /// Register a handler for a method + path pair. Path parameters use
    /// `{name}` syntax.
    ///
    /// # Panics
    ///
    /// Panics if the path is invalid or conflicts with an existing route.
    pub fn on(mut self, method: Method, path: &str, handler: impl Handler) -> Self {
        self.routes
            .entry(method)
            .or_default()
            .insert(path, handler.into_boxed_handler())
            .unwrap_or_else(|e| panic!("invalid route `{path}`: {e}"));
        self
    }

    pub fn get(self, path: &str, handler: impl Handler) -> Self {
        self.on(Method::GET, path, handler)
    }

    pub fn post(self, path: &str, handler: impl Handler) -> Self {
        self.on(Method::POST, path, handler)
    }

    pub fn put(self, path: &str, handler: impl Handler) -> Self {
        self.on(Method::PUT, path, handler)
    }

    pub fn delete(self, path: &str, handler: impl Handler) -> Self {
        self.on(Method::DELETE, path, handler)
    }

    /// Installs a middleware at the end of the chain.
    ///
    /// # Panics
    ///
    /// Panics if a middleware of the same type is already installed.
    pub fn layer<M: Middleware>(mut self, middleware: M) -> Self {
        let id = TypeId::of::<M>();
        if self.chain.iter().any(|(installed, _)| *installed == id) {
            panic!("middleware `{}` is already installed", type_name::<M>());
        }
        let middleware: SharedMiddleware = Arc::new(middleware);
        self.chain.push((id, middleware));
        self
    }

    pub fn has_layer<M: Middleware>(&self) -> bool {
        let id = TypeId::of::<M>();
        self.chain.iter().any(|(installed, _)| *installed == id)
    }

    /// Runs one request through the start hooks and its handler.
    ///
    /// The returned [`Completion`] carries the terminal hooks; the caller
    /// decides when (and on which thread) to run them.
    pub async fn dispatch(&self, mut req: Request) -> (Response, Completion) {
        let matched = self.lookup(req.method(), req.path());
        let handler = matched.map(|(handler, params)| {
            req.set_params(params);
            handler
        });

        let mut ext = Extensions::new();
        for (_, mw) in &self.chain {
            mw.on_request_start(&req, &mut ext);
        }

        let response = match handler {
            Some(handler) => handler.call(req.clone()).await,
            None => Response::status(StatusCode::NOT_FOUND),
        };

        let chain = self.chain.iter()
            .filter(|(_, mw)| mw.wants_completion(&req, &ext))
            .map(|(_, mw)| Arc::clone(mw))
            .collect();
        let completion = Completion::new(req, response.status_code(), ext, chain);
        (response, completion)
    }

    fn lookup(&self, method: &Method, path: &str) -> Option<(BoxedHandler, HashMap<String, String>)> {
        let tree = self.routes.get(method)?;
        let matched = tree.at(path).ok()?;
        let handler = Arc::clone(matched.value);
        let params = matched.params.iter()
            .map(|(k, v)| (k.to_owned(), v.to_owned()))
            .collect();
        Some((handler, params))
    }
}

impl Default for Router {
    fn default() -> Self { Self::new() }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use super::*;
    use crate::error::Error;
    use crate::request::test_request;
    use crate::response::ResponseStatus;

    async fn show_user(req: Request) -> String {
        format!("user {}", req.param("id").unwrap_or("?"))
    }

    type Journal = Arc<Mutex<Vec<String>>>;

    struct Recorder {
        name: &'static str,
        journal: Journal,
        fail: bool,
    }

    impl Middleware for Recorder {
        fn on_request_start(&self, req: &Request, _ext: &mut Extensions) {
            self.journal.lock().unwrap().push(format!("{} start {}", self.name, req.path()));
        }

        fn on_request_complete(
            &self,
            _req: &Request,
            res: &dyn ResponseStatus,
            _ext: &mut Extensions,
        ) -> Result<(), Error> {
            self.journal.lock().unwrap().push(format!("{} complete {}", self.name, res.status()));
            if self.fail {
                return Err(Error::Io(std::io::Error::other(self.name)));
            }
            Ok(())
        }
    }

    struct Second(Recorder);

    /// Only wants its terminal hook for paths under `/audit`.
    struct Auditor(Recorder);

    impl Middleware for Auditor {
        fn wants_completion(&self, req: &Request, _ext: &Extensions) -> bool {
            req.path().starts_with("/audit")
        }

        fn on_request_complete(
            &self,
            req: &Request,
            res: &dyn ResponseStatus,
            ext: &mut Extensions,
        ) -> Result<(), Error> {
            self.0.on_request_complete(req, res, ext)
        }
    }

    impl Middleware for Second {
        fn on_request_start(&self, req: &Request, ext: &mut Extensions) {
            self.0.on_request_start(req, ext);
        }

        fn on_request_complete(
            &self,
            req: &Request,
            res: &dyn ResponseStatus,
            ext: &mut Extensions,
        ) -> Result<(), Error> {
            self.0.on_request_complete(req, res, ext)
        }
    }

    #[tokio::test]
    async fn routes_with_params_and_404() {
        let router = Router::new().get("/users/{id}", show_user);

        let (res, completion) = router.dispatch(test_request("GET", "/users/42", &[], "")).await;
        assert_eq!(res.body(), b"user 42");
        assert!(completion.is_empty());

        let (res, completion) = router.dispatch(test_request("POST", "/users/42", &[], "")).await;
        assert_eq!(res.status_code(), StatusCode::NOT_FOUND);
        assert_eq!(completion.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn hooks_wrap_the_handler_in_onion_order() {
        let journal = Journal::default();
        let router = Router::new()
            .get("/users/{id}", show_user)
            .layer(Recorder { name: "outer", journal: journal.clone(), fail: false })
            .layer(Second(Recorder { name: "inner", journal: journal.clone(), fail: false }));

        let (_, completion) = router.dispatch(test_request("GET", "/users/1", &[], "")).await;
        assert_eq!(journal.lock().unwrap().len(), 2);
        completion.run().unwrap();

        assert_eq!(*journal.lock().unwrap(), [
            "outer start /users/1",
            "inner start /users/1",
            "inner complete 200",
            "outer complete 200",
        ]);
    }

    #[tokio::test]
    async fn every_terminal_hook_runs_and_first_error_wins() {
        let journal = Journal::default();
        let router = Router::new()
            .layer(Recorder { name: "outer", journal: journal.clone(), fail: true })
            .layer(Second(Recorder { name: "inner", journal: journal.clone(), fail: true }));

        let (_, completion) = router.dispatch(test_request("GET", "/missing", &[], "")).await;
        let err = completion.run().unwrap_err();

        assert_eq!(err.to_string(), "io: inner");
        assert_eq!(journal.lock().unwrap()[2..], ["inner complete 404", "outer complete 404"]);
    }

    #[tokio::test]
    async fn uninterested_middleware_is_left_out_of_the_completion() {
        let journal = Journal::default();
        let router = Router::new()
            .get("/users/{id}", show_user)
            .layer(Auditor(Recorder { name: "audit", journal: journal.clone(), fail: false }));

        let (_, completion) = router.dispatch(test_request("GET", "/users/1", &[], "")).await;
        assert!(completion.is_empty());
        completion.run().unwrap();
        assert!(journal.lock().unwrap().is_empty());

        let (_, completion) = router.dispatch(test_request("GET", "/audit/1", &[], "")).await;
        assert!(!completion.is_empty());
        completion.run().unwrap();
        assert_eq!(*journal.lock().unwrap(), ["audit complete 404"]);
    }

    #[test]
    #[should_panic(expected = "already installed")]
    fn installing_a_middleware_twice_panics() {
        let journal = Journal::default();
        let _ = Router::new()
            .layer(Recorder { name: "a", journal: journal.clone(), fail: false })
            .layer(Recorder { name: "b", journal, fail: false });
    }

    #[test]
    fn has_layer_reports_installed_types() {
        let router = Router::new().layer(Recorder { name: "a", journal: Journal::default(), fail: false });
        assert!(router.has_layer::<Recorder>());
        assert!(!router.has_layer::<Second>());
    }
}
