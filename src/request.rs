//! The parsed inbound request.
//!
//! Built once per call and passed by reference through the whole dispatch.
//! The only lazily-computed part is the decoded body, which is memoised on
//! the request itself and therefore never outlives it.

use std::sync::OnceLock;

use percent_encoding::percent_decode_str;
use serde_json::{Map, Value};

use crate::format::{self, Format};
use crate::method::Method;

/// Content type assumed when the client sends none.
const DEFAULT_CONTENT_TYPE: &str = "application/x-www-form-urlencoded";

/// An inbound request, after method resolution and format negotiation.
#[derive(Debug)]
pub struct Request {
    method: Method,
    path: String,
    format: Format,
    query: Map<String, Value>,
    headers: Vec<(String, String)>,
    body: Vec<u8>,
    body_params: OnceLock<Map<String, Value>>,
}

impl Request {
    pub fn builder() -> RequestBuilder {
        RequestBuilder::default()
    }

    /// The resolved verb (see [`RequestBuilder::build`] for the precedence).
    pub fn method(&self) -> Method { self.method }

    /// Path with any recognised format suffix removed. Not normalised.
    pub fn path(&self) -> &str { &self.path }
    pub fn format(&self) -> Format { self.format }
    pub fn headers(&self) -> &[(String, String)] { &self.headers }
    pub fn body(&self) -> &[u8] { &self.body }

    /// Decoded query parameters in first-seen order; duplicate keys keep the
    /// last value.
    pub fn query(&self) -> &Map<String, Value> { &self.query }

    pub fn query_value(&self, name: &str) -> Option<&Value> {
        self.query.get(name)
    }

    /// Case-insensitive header lookup.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// Body parameters, decoded on first access according to the
    /// `content-type` header.
    pub fn body_params(&self) -> &Map<String, Value> {
        self.body_params.get_or_init(|| decode_body(self.header("content-type"), &self.body))
    }

    pub fn body_value(&self, name: &str) -> Option<&Value> {
        self.body_params().get(name).filter(|v| !v.is_null())
    }

    /// A body parameter, only when the body is form-encoded.
    fn form_value(&self, name: &str) -> Option<&Value> {
        let form = media_type(self.header("content-type")) == DEFAULT_CONTENT_TYPE;
        form.then(|| self.body_value(name)).flatten()
    }

    /// Whether the client asked the transport not to emit the real status.
    pub fn suppress_status_code(&self) -> bool {
        self.query.get("_suppress_status_code").is_some_and(is_truthy)
    }
}

/// Builder for [`Request`]. Used by the HTTP transport and by tests.
#[derive(Debug, Default)]
pub struct RequestBuilder {
    method: Option<String>,
    forced: Option<Method>,
    uri: String,
    headers: Vec<(String, String)>,
    body: Vec<u8>,
}

impl RequestBuilder {
    /// The method the transport reported.
    pub fn method(mut self, method: impl Into<String>) -> Self {
        self.method = Some(method.into());
        self
    }

    /// Pins the method; `_method` parameters and override headers are ignored.
    pub fn force_method(mut self, method: Method) -> Self {
        self.forced = Some(method);
        self
    }

    /// Path plus optional query string, e.g. `/login?username=peter`.
    pub fn uri(mut self, uri: impl Into<String>) -> Self {
        self.uri = uri.into();
        self
    }

    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    pub fn body(mut self, body: impl Into<Vec<u8>>) -> Self {
        self.body = body.into();
        self
    }

    /// Splits the URI, percent-decodes the path, negotiates the format and
    /// resolves the method.
    ///
    /// Method precedence: forced method, `_method` query parameter, `_method`
    /// in a form-encoded body, `X-HTTP-Method-Override` header, transport
    /// method. A JSON body's `_method` is ignored.
    /// Unknown verbs resolve to `get`.
    pub fn build(self) -> Request {
        let (raw_path, raw_query) = match self.uri.split_once('?') {
            Some((p, q)) => (p, q),
            None         => (self.uri.as_str(), ""),
        };
        let raw_path = percent_decode_str(raw_path).decode_utf8_lossy();
        let query = parse_query(raw_query);
        let accept = self.headers.iter()
            .find(|(k, _)| k.eq_ignore_ascii_case("accept"))
            .map(|(_, v)| v.as_str());
        let (format, path) = format::negotiate(accept, &raw_path, &query);

        let mut request = Request {
            method: Method::Get,
            path,
            format,
            query,
            headers: self.headers,
            body: self.body,
            body_params: OnceLock::new(),
        };

        request.method = match self.forced {
            Some(m) => m,
            None => {
                let requested = request.query_value("_method").and_then(Value::as_str)
                    .or_else(|| request.form_value("_method").and_then(Value::as_str))
                    .or_else(|| request.header("x-http-method-override"))
                    .or(self.method.as_deref())
                    .unwrap_or("get");
                Method::resolve(requested)
            }
        };
        request
    }
}

/// Standard form decoding of a query string; last value wins per key.
pub fn parse_query(raw: &str) -> Map<String, Value> {
    let pairs: Vec<(String, String)> = serde_urlencoded::from_str(raw).unwrap_or_default();
    let mut map = Map::new();
    for (k, v) in pairs {
        map.insert(k, Value::String(v));
    }
    map
}

/// Decodes a request body by content type.
///
/// Only the media type before `;` counts. A JSON body must be an object;
/// anything else decodes to an empty mapping, as does an unknown type.
pub fn decode_body(content_type: Option<&str>, raw: &[u8]) -> Map<String, Value> {
    match media_type(content_type).as_str() {
        "application/json" => match serde_json::from_slice(raw) {
            Ok(Value::Object(map)) => map,
            _                      => Map::new(),
        },
        DEFAULT_CONTENT_TYPE => std::str::from_utf8(raw).map(parse_query).unwrap_or_default(),
        _ => Map::new(),
    }
}

/// Lowercased media type before any `;` parameters.
fn media_type(content_type: Option<&str>) -> String {
    content_type
        .unwrap_or(DEFAULT_CONTENT_TYPE)
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase()
}

/// Loose truthiness for flag parameters: absent, empty, `"0"` and `"false"` are false.
fn is_truthy(v: &Value) -> bool {
    match v {
        Value::Null      => false,
        Value::Bool(b)   => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        Value::String(s) => !(s.is_empty() || s == "0" || s.eq_ignore_ascii_case("false")),
        Value::Array(a)  => !a.is_empty(),
        Value::Object(o) => !o.is_empty(),
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn method_precedence() {
        let req = Request::builder().method("PUT").uri("/x").build();
        assert_eq!(req.method(), Method::Put);

        let req = Request::builder()
            .method("POST")
            .header("X-HTTP-Method-Override", "DELETE")
            .uri("/x")
            .build();
        assert_eq!(req.method(), Method::Delete);

        let req = Request::builder()
            .method("POST")
            .header("content-type", "application/x-www-form-urlencoded")
            .body("_method=patch")
            .uri("/x")
            .build();
        assert_eq!(req.method(), Method::Patch);

        let req = Request::builder().method("POST").uri("/x?_method=head").body("_method=patch").build();
        assert_eq!(req.method(), Method::Head);

        let req = Request::builder()
            .method("POST")
            .header("content-type", "application/json")
            .body(r#"{"_method":"delete"}"#)
            .uri("/x")
            .build();
        assert_eq!(req.method(), Method::Post);

        let req = Request::builder().force_method(Method::Options).uri("/x?_method=head").build();
        assert_eq!(req.method(), Method::Options);

        let req = Request::builder().method("TRACE").uri("/x").build();
        assert_eq!(req.method(), Method::Get);

        let req = Request::builder().uri("/x").build();
        assert_eq!(req.method(), Method::Get);
    }

    #[test]
    fn query_is_decoded_last_value_wins() {
        let req = Request::builder().uri("/x?a=1&b=hello%20world&a=2").build();
        assert_eq!(req.query_value("a"), Some(&json!("2")));
        assert_eq!(req.query_value("b"), Some(&json!("hello world")));
        assert_eq!(req.query().keys().collect::<Vec<_>>(), ["a", "b"]);
    }

    #[test]
    fn body_is_decoded_once() {
        let req = Request::builder()
            .header("Content-Type", "application/json; charset=utf-8")
            .body(r#"{"username":"peter","age":3}"#)
            .uri("/login")
            .build();
        let first = req.body_params() as *const _;
        let second = req.body_params() as *const _;
        assert_eq!(first, second);
        assert_eq!(req.body_value("username"), Some(&json!("peter")));
        assert_eq!(req.body_value("age"), Some(&json!(3)));
    }

    #[test]
    fn body_decoding_by_content_type() {
        assert_eq!(decode_body(None, b"a=1&b=2").len(), 2);
        assert!(decode_body(Some("application/json"), b"[1,2]").is_empty());
        assert!(decode_body(Some("application/json"), b"{oops").is_empty());
        assert!(decode_body(Some("text/plain"), b"a=1").is_empty());
    }

    #[test]
    fn format_suffix_is_stripped_before_routing() {
        let req = Request::builder().uri("/stats/23.xml?x=1").build();
        assert_eq!(req.path(), "/stats/23");
        assert_eq!(req.format(), Format::Xml);
    }

    #[test]
    fn path_is_percent_decoded_before_routing() {
        let req = Request::builder().uri("/users/John%20Doe.json?q=a%20b").build();
        assert_eq!(req.path(), "/users/John Doe");
        assert_eq!(req.format(), Format::Json);
        assert_eq!(req.query_value("q"), Some(&json!("a b")));

        assert_eq!(Request::builder().uri("/caf%C3%A9").build().path(), "/café");
        assert_eq!(Request::builder().uri("/bad%FF").build().path(), "/bad\u{FFFD}");
    }

    #[test]
    fn suppress_flag() {
        assert!(Request::builder().uri("/?_suppress_status_code=1").build().suppress_status_code());
        assert!(!Request::builder().uri("/?_suppress_status_code=0").build().suppress_status_code());
        assert!(!Request::builder().uri("/").build().suppress_status_code());
    }
}
