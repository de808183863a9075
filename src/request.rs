//! Incoming HTTP request type.

use std::collections::HashMap;
use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;

use bytes::Bytes;
use http::{HeaderMap, Method, Uri};
use serde_json::{Map, Value};

/// An incoming HTTP request with its body fully buffered.
///
/// Cloning is one atomic increment: the handler gets one handle, the
/// middleware chain keeps another for the terminal hooks.
#[derive(Clone)]
pub struct Request {
    inner: Arc<Inner>,
}

#[derive(Clone)]
struct Inner {
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    body: Bytes,
    params: HashMap<String, String>,
    remote_addr: SocketAddr,
}

impl Request {
    pub(crate) fn new(parts: http::request::Parts, body: Bytes, remote_addr: SocketAddr) -> Self {
        Self {
            inner: Arc::new(Inner {
                method: parts.method,
                uri: parts.uri,
                headers: parts.headers,
                body,
                params: HashMap::new(),
                remote_addr,
            }),
        }
    }

    /// Wraps an already-buffered request, e.g. to drive
    /// [`Router::dispatch`](crate::Router::dispatch) without a socket.
    pub fn from_http(req: http::Request<Bytes>, remote_addr: SocketAddr) -> Self {
        let (parts, body) = req.into_parts();
        Self::new(parts, body, remote_addr)
    }

    /// Route parameters are only known after lookup; at that point the
    /// request is still uniquely owned, so this does not copy.
    pub(crate) fn set_params(&mut self, params: HashMap<String, String>) {
        Arc::make_mut(&mut self.inner).params = params;
    }

    pub fn method(&self) -> &Method { &self.inner.method }
    pub fn uri(&self) -> &Uri { &self.inner.uri }
    pub fn path(&self) -> &str { self.inner.uri.path() }
    pub fn query(&self) -> Option<&str> { self.inner.uri.query() }
    pub fn headers(&self) -> &HeaderMap { &self.inner.headers }
    pub fn body(&self) -> &[u8] { &self.inner.body }
    pub fn remote_addr(&self) -> SocketAddr { self.inner.remote_addr }

    /// The raw request target: path plus query string, as sent.
    pub fn request_uri(&self) -> &str {
        self.inner.uri
            .path_and_query()
            .map_or_else(|| self.path(), |pq| pq.as_str())
    }

    /// IP address of the connected peer.
    pub fn ip(&self) -> IpAddr { self.inner.remote_addr.ip() }

    /// Case-insensitive header lookup. Non-UTF-8 values are treated as absent.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.inner.headers.get(name).and_then(|v| v.to_str().ok())
    }

    pub fn user_agent(&self) -> Option<&str> {
        self.header("user-agent")
    }

    /// Returns a named path parameter.
    ///
    /// For a route `/users/{id}`, `req.param("id")` on `/users/42` returns `Some("42")`.
    pub fn param(&self, key: &str) -> Option<&str> {
        self.inner.params.get(key).map(String::as_str)
    }

    /// All client input as one map: query-string parameters first, then the
    /// body when it is a JSON object or a url-encoded form. Body keys win on
    /// collision. Anything unparseable contributes nothing.
    pub fn input(&self) -> Map<String, Value> {
        let mut input = Map::new();

        if let Some(query) = self.query() {
            input.extend(form_pairs(query.as_bytes()));
        }

        let content_type = self.header("content-type").unwrap_or_default();
        if is_json(content_type) {
            if let Ok(Value::Object(body)) = serde_json::from_slice::<Value>(self.body()) {
                input.extend(body);
            }
        } else if content_type.starts_with("application/x-www-form-urlencoded") {
            input.extend(form_pairs(self.body()));
        }

        input
    }
}

fn is_json(content_type: &str) -> bool {
    let essence = content_type.split(';').next().unwrap_or_default().trim();
    essence == "application/json" || essence.ends_with("+json")
}

fn form_pairs(raw: &[u8]) -> impl Iterator<Item = (String, Value)> {
    serde_urlencoded::from_bytes::<Vec<(String, String)>>(raw)
        .unwrap_or_default()
        .into_iter()
        .map(|(k, v)| (k, Value::String(v)))
}

#[cfg(test)]
pub(crate) fn test_request(method: &str, uri: &str, headers: &[(&str, &str)], body: &str) -> Request {
    let mut builder = http::Request::builder().method(method).uri(uri);
    for (name, value) in headers {
        builder = builder.header(*name, *value);
    }
    let req = builder.body(Bytes::from(body.to_owned())).unwrap();
    Request::from_http(req, "203.0.113.7:52100".parse().unwrap())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn request_uri_keeps_query() {
        let req = test_request("GET", "/search?q=rust&page=2", &[], "");
        assert_eq!(req.request_uri(), "/search?q=rust&page=2");
        assert_eq!(req.path(), "/search");
    }

    #[test]
    fn header_lookup_ignores_case() {
        let req = test_request("GET", "/", &[("User-Agent", "curl/8.5")], "");
        assert_eq!(req.header("user-agent"), Some("curl/8.5"));
        assert_eq!(req.user_agent(), Some("curl/8.5"));
        assert_eq!(req.header("x-missing"), None);
    }

    #[test]
    fn ip_is_peer_address() {
        let req = test_request("GET", "/", &[], "");
        assert_eq!(req.ip().to_string(), "203.0.113.7");
    }

    #[test]
    fn input_merges_query_and_json_body() {
        let req = test_request(
            "POST",
            "/login?next=%2Fhome&username=query",
            &[("content-type", "application/json; charset=utf-8")],
            r#"{"username":"a","password":"secret"}"#,
        );
        let input = req.input();
        assert_eq!(Value::Object(input.clone()), json!({
            "next": "/home",
            "username": "a",
            "password": "secret",
        }));
        let keys: Vec<_> = input.keys().map(String::as_str).collect();
        assert_eq!(keys, ["next", "username", "password"]);
    }

    #[test]
    fn input_reads_form_body() {
        let req = test_request(
            "POST",
            "/login",
            &[("content-type", "application/x-www-form-urlencoded")],
            "username=a&password=s%20cret",
        );
        assert_eq!(Value::Object(req.input()), json!({"username": "a", "password": "s cret"}));
    }

    #[test]
    fn input_ignores_non_object_and_unknown_bodies() {
        let array = test_request("POST", "/", &[("content-type", "application/json")], "[1,2]");
        assert!(array.input().is_empty());

        let text = test_request("POST", "/", &[("content-type", "text/plain")], "a=b");
        assert!(text.input().is_empty());
    }
}
