//! Output formats: negotiation and the two built-in encoders.
//!
//! Negotiation runs once per request, before routing, in three passes where
//! each later pass overrides the earlier one:
//!
//! 1. an `Accept` header naming a known format code (skipped for `*/*`),
//! 2. a `.json` / `.xml` suffix on the path, which is then stripped,
//! 3. the `_format` query parameter.

use serde::Serialize;
use serde_json::ser::{PrettyFormatter, Serializer};
use serde_json::{Map, Value};

/// A negotiated output format.
#[derive(Clone, Copy, Debug, Default, Eq, Hash, PartialEq)]
pub enum Format {
    #[default]
    Json,
    Xml,
}

impl Format {
    /// Known formats in negotiation order.
    pub const ALL: [Format; 2] = [Self::Json, Self::Xml];

    pub fn code(self) -> &'static str {
        match self {
            Self::Json => "json",
            Self::Xml  => "xml",
        }
    }

    pub fn from_code(code: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|f| f.code() == code)
    }

    pub fn content_type(self) -> &'static str {
        match self {
            Self::Json => "application/json; charset=utf-8",
            Self::Xml  => "application/xml; charset=utf-8",
        }
    }

    pub fn encoder(self) -> &'static dyn Encoder {
        match self {
            Self::Json => &JsonEncoder,
            Self::Xml  => &XmlEncoder,
        }
    }
}

/// Picks the output format and returns it with the path, suffix removed.
///
/// ```rust
/// use baton::Format;
/// use baton::format::negotiate;
/// use serde_json::Map;
///
/// let (format, path) = negotiate(None, "/stats/23.xml", &Map::new());
/// assert_eq!(format, Format::Xml);
/// assert_eq!(path, "/stats/23");
/// ```
pub fn negotiate(accept: Option<&str>, path: &str, query: &Map<String, Value>) -> (Format, String) {
    let mut format = Format::default();

    if let Some(accept) = accept.filter(|a| !a.contains("*/*")) {
        if let Some(f) = Format::ALL.into_iter().find(|f| accept.contains(f.code())) {
            format = f;
        }
    }

    let mut stripped = path;
    if let Some((stem, suffix)) = path.rsplit_once('.') {
        let is_word = !suffix.is_empty() && suffix.chars().all(|c| c.is_ascii_alphanumeric() || c == '_');
        if is_word {
            if let Some(f) = Format::from_code(suffix) {
                format = f;
                stripped = stem;
            }
        }
    }

    if let Some(f) = query.get("_format").and_then(Value::as_str).and_then(Format::from_code) {
        format = f;
    }

    (format, stripped.to_owned())
}

/// Turns an envelope into the response body.
pub trait Encoder: Send + Sync {
    fn encode(&self, payload: &Value) -> String;
}

/// Pretty-printed JSON, four-space indent.
pub struct JsonEncoder;

impl Encoder for JsonEncoder {
    fn encode(&self, payload: &Value) -> String {
        let mut buf = Vec::new();
        let mut ser = Serializer::with_formatter(&mut buf, PrettyFormatter::with_indent(b"    "));
        // Writing a `Value` into a Vec has no failure mode.
        if payload.serialize(&mut ser).is_err() {
            return String::new();
        }
        String::from_utf8(buf).unwrap_or_default()
    }
}

/// XML tree rooted at `<response>`. Keys become tags, list entries and
/// numeric keys become `<parent-item>`, text is entity-escaped.
pub struct XmlEncoder;

impl Encoder for XmlEncoder {
    fn encode(&self, payload: &Value) -> String {
        let mut body = String::new();
        write_xml(&mut body, payload, "", 1);
        format!("<?xml version=\"1.0\"?>\n<response>\n{body}</response>\n")
    }
}

fn write_xml(out: &mut String, value: &Value, parent: &str, depth: usize) {
    match value {
        Value::Object(map) => {
            for (key, child) in map {
                let tag = if is_numeric_key(key) { format!("{parent}-item") } else { key.clone() };
                write_element(out, &tag, child, depth);
            }
        }
        Value::Array(items) => {
            let tag = format!("{parent}-item");
            for child in items {
                write_element(out, &tag, child, depth);
            }
        }
        Value::String(s)  => out.push_str(&escape(s)),
        Value::Number(n)  => out.push_str(&n.to_string()),
        Value::Bool(true) => out.push('1'),
        Value::Bool(false) | Value::Null => {}
    }
}

fn write_element(out: &mut String, tag: &str, value: &Value, depth: usize) {
    let tag = escape(tag);
    out.push_str(&"  ".repeat(depth));
    out.push('<');
    out.push_str(&tag);
    out.push('>');
    write_xml(out, value, &tag, depth + 1);
    out.push_str("</");
    out.push_str(&tag);
    out.push_str(">\n");
}

fn is_numeric_key(key: &str) -> bool {
    let digits = key.strip_prefix('-').unwrap_or(key);
    !digits.is_empty() && digits.bytes().all(|b| b.is_ascii_digit())
}

fn escape(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&'  => out.push_str("&amp;"),
            '<'  => out.push_str("&lt;"),
            '>'  => out.push_str("&gt;"),
            '"'  => out.push_str("&quot;"),
            '\'' => out.push_str("&#039;"),
            c    => out.push(c),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn query(pairs: &[(&str, &str)]) -> Map<String, Value> {
        pairs.iter().map(|(k, v)| ((*k).to_owned(), Value::from(*v))).collect()
    }

    #[test]
    fn later_passes_override_earlier_ones() {
        let (f, p) = negotiate(Some("application/xml"), "/users", &Map::new());
        assert_eq!((f, p.as_str()), (Format::Xml, "/users"));

        let (f, _) = negotiate(Some("text/html,*/*;q=0.8 xml"), "/users", &Map::new());
        assert_eq!(f, Format::Json);

        let (f, p) = negotiate(Some("application/xml"), "/users.json", &Map::new());
        assert_eq!((f, p.as_str()), (Format::Json, "/users"));

        let (f, p) = negotiate(None, "/users.json", &query(&[("_format", "xml")]));
        assert_eq!((f, p.as_str()), (Format::Xml, "/users"));
    }

    #[test]
    fn unknown_suffixes_stay_on_the_path() {
        let (f, p) = negotiate(None, "/files/report.pdf", &query(&[("_format", "yaml")]));
        assert_eq!((f, p.as_str()), (Format::Json, "/files/report.pdf"));
    }

    #[test]
    fn json_uses_four_space_indent() {
        let out = JsonEncoder.encode(&json!({"status": 200, "data": [1]}));
        assert_eq!(out, "{\n    \"status\": 200,\n    \"data\": [\n        1\n    ]\n}");
    }

    #[test]
    fn xml_tree() {
        let out = XmlEncoder.encode(&json!({
            "status": 200,
            "data": {"users": ["a&b", "c"], "ok": true, "none": null},
        }));
        let expected = "<?xml version=\"1.0\"?>\n<response>\n\
            \x20\x20<status>200</status>\n\
            \x20\x20<data>\x20\x20\x20\x20<users>\x20\x20\x20\x20\x20\x20<users-item>a&amp;b</users-item>\n\
            \x20\x20\x20\x20\x20\x20<users-item>c</users-item>\n\
            </users>\n\
            \x20\x20\x20\x20<ok>1</ok>\n\
            \x20\x20\x20\x20<none></none>\n\
            </data>\n\
            </response>\n";
        assert_eq!(out, expected);
    }
}
