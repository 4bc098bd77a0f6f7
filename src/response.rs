//! The response envelope and the encoded [`Response`].
//!
//! Every dispatch ends here. Success looks like `{"status": 200, "data": …}`,
//! failure like `{"status": 400, "error": "…", "message": "…"}`. `status` is
//! always the first key; clients depend on that ordering.

use serde_json::{Map, Value};

use crate::format::Format;
use crate::status::{Status, status_line};

/// A status code plus the keys that follow it.
#[derive(Clone, Debug, PartialEq)]
pub struct Envelope {
    status: u16,
    fields: Map<String, Value>,
}

impl Envelope {
    pub fn data(status: impl Into<u16>, data: Value) -> Self {
        let mut fields = Map::new();
        fields.insert("data".to_owned(), data);
        Self { status: status.into(), fields }
    }

    pub fn error(status: impl Into<u16>, kind: &str, message: &str) -> Self {
        let mut fields = Map::new();
        fields.insert("error".to_owned(), Value::from(kind));
        fields.insert("message".to_owned(), Value::from(message));
        Self { status: status.into(), fields }
    }

    /// Adds (or replaces) a field after the existing ones.
    pub fn with(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.fields.insert(key.to_owned(), value.into());
        self
    }

    pub fn status(&self) -> u16 {
        self.status
    }

    /// The wire payload: `status` first, then the fields in insertion order.
    /// A `status` field in the payload itself is dropped.
    pub fn to_value(&self) -> Value {
        let mut out = Map::with_capacity(self.fields.len() + 1);
        out.insert("status".to_owned(), Value::from(self.status));
        for (k, v) in &self.fields {
            if k != "status" {
                out.insert(k.clone(), v.clone());
            }
        }
        Value::Object(out)
    }

    pub fn encode(&self, format: Format) -> String {
        format.encoder().encode(&self.to_value())
    }
}

/// Re-keys `payload` with `status` first and encodes it.
pub fn wrap(status: u16, payload: Map<String, Value>, format: Format) -> String {
    Envelope { status, fields: payload }.encode(format)
}

/// An encoded envelope ready for a transport.
#[derive(Clone, Debug)]
pub struct Response {
    status: u16,
    body: String,
    format: Format,
    emit_status: bool,
}

impl Response {
    pub(crate) fn new(envelope: &Envelope, format: Format, emit_status: bool) -> Self {
        Self { status: envelope.status(), body: envelope.encode(format), format, emit_status }
    }

    /// The status inside the envelope.
    pub fn status(&self) -> u16 { self.status }
    pub fn body(&self) -> &str { &self.body }
    pub fn into_body(self) -> String { self.body }
    pub fn format(&self) -> Format { self.format }
    pub fn content_type(&self) -> &'static str { self.format.content_type() }

    /// Whether a live transport should send the envelope status instead of
    /// `200 OK`.
    pub fn emit_status(&self) -> bool { self.emit_status }

    /// The status a live transport sends.
    pub fn http_status(&self) -> u16 {
        if self.emit_status { self.status } else { Status::Ok.code() }
    }

    /// `"<code> <reason>"` for [`http_status`](Self::http_status).
    pub fn status_line(&self) -> String {
        status_line(self.http_status())
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn status_is_always_first() {
        let mut payload = Map::new();
        payload.insert("data".into(), json!("x"));
        payload.insert("status".into(), json!(999));
        let out = wrap(200, payload, Format::Json);
        assert_eq!(out, "{\n    \"status\": 200,\n    \"data\": \"x\"\n}");
    }

    #[test]
    fn round_trip_keeps_data() {
        let data = json!({"b": [1, 2], "a": null});
        let body = Envelope::data(Status::Ok, data.clone()).encode(Format::Json);
        let decoded: Value = serde_json::from_str(&body).unwrap();
        assert_eq!(decoded, json!({"status": 200, "data": data}));
        assert_eq!(decoded.as_object().unwrap().keys().next().unwrap(), "status");
    }

    #[test]
    fn error_envelope_with_debug_fields() {
        let env = Envelope::error(500u16, "Exception", "boom").with("line", 12);
        assert_eq!(env.to_value(), json!({"status": 500, "error": "Exception", "message": "boom", "line": 12}));
        let keys: Vec<String> = env.to_value().as_object().unwrap().keys().cloned().collect();
        assert_eq!(keys, ["status", "error", "message", "line"]);
    }

    #[test]
    fn transport_status() {
        let env = Envelope::error(Status::BadRequest, "RouteNotFoundException", "x");
        let emitted = Response::new(&env, Format::Json, true);
        assert_eq!(emitted.http_status(), 400);
        assert_eq!(emitted.status_line(), "400 Bad Request");

        let suppressed = Response::new(&env, Format::Xml, false);
        assert_eq!(suppressed.status(), 400);
        assert_eq!(suppressed.http_status(), 200);
        assert!(suppressed.body().starts_with("<?xml"));
    }
}
