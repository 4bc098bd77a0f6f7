//! HTTP status codes known to the envelope layer.
//!
//! The table is fixed: it is what a live transport uses to build the status
//! line. Codes outside it are still valid envelope statuses, they are simply
//! emitted without a reason phrase.
//!
//! ```rust
//! use baton::{status_line, Status};
//!
//! assert_eq!(u16::from(Status::BadRequest), 400);
//! assert_eq!(status_line(404), "404 Not Found");
//! assert_eq!(status_line(299), "299");
//! ```

/// Status codes with a standard reason phrase.
#[allow(clippy::enum_variant_names)]
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Status {
    // ── 1xx Informational ─────────────────────────────────────────────────────
    Continue,                     // 100
    SwitchingProtocols,           // 101

    // ── 2xx Success ───────────────────────────────────────────────────────────
    Ok,                           // 200
    Created,                      // 201
    Accepted,                     // 202
    NonAuthoritativeInformation,  // 203
    NoContent,                    // 204
    ResetContent,                 // 205
    PartialContent,               // 206

    // ── 3xx Redirection ───────────────────────────────────────────────────────
    MultipleChoices,              // 300
    MovedPermanently,             // 301
    Found,                        // 302
    SeeOther,                     // 303
    NotModified,                  // 304
    UseProxy,                     // 305
    TemporaryRedirect,            // 307

    // ── 4xx Client errors ─────────────────────────────────────────────────────
    BadRequest,                   // 400
    Unauthorized,                 // 401
    PaymentRequired,              // 402
    Forbidden,                    // 403
    NotFound,                     // 404
    MethodNotAllowed,             // 405
    NotAcceptable,                // 406
    ProxyAuthenticationRequired,  // 407
    RequestTimeout,               // 408
    Conflict,                     // 409
    Gone,                         // 410
    LengthRequired,               // 411
    PreconditionFailed,           // 412
    RequestEntityTooLarge,        // 413
    RequestUriTooLong,            // 414
    UnsupportedMediaType,         // 415
    RequestedRangeNotSatisfiable, // 416
    ExpectationFailed,            // 417

    // ── 5xx Server errors ─────────────────────────────────────────────────────
    InternalServerError,          // 500
    NotImplemented,               // 501
    BadGateway,                   // 502
    ServiceUnavailable,           // 503
    GatewayTimeout,               // 504
    HttpVersionNotSupported,      // 505
    BandwidthLimitExceeded,       // 509
}

const TABLE: [(Status, u16, &str); 41] = [
    (Status::Continue,                     100, "Continue"),
    (Status::SwitchingProtocols,           101, "Switching Protocols"),
    (Status::Ok,                           200, "OK"),
    (Status::Created,                      201, "Created"),
    (Status::Accepted,                     202, "Accepted"),
    (Status::NonAuthoritativeInformation,  203, "Non-Authoritative Information"),
    (Status::NoContent,                    204, "No Content"),
    (Status::ResetContent,                 205, "Reset Content"),
    (Status::PartialContent,               206, "Partial Content"),
    (Status::MultipleChoices,              300, "Multiple Choices"),
    (Status::MovedPermanently,             301, "Moved Permanently"),
    (Status::Found,                        302, "Found"),
    (Status::SeeOther,                     303, "See Other"),
    (Status::NotModified,                  304, "Not Modified"),
    (Status::UseProxy,                     305, "Use Proxy"),
    (Status::TemporaryRedirect,            307, "Temporary Redirect"),
    (Status::BadRequest,                   400, "Bad Request"),
    (Status::Unauthorized,                 401, "Unauthorized"),
    (Status::PaymentRequired,              402, "Payment Required"),
    (Status::Forbidden,                    403, "Forbidden"),
    (Status::NotFound,                     404, "Not Found"),
    (Status::MethodNotAllowed,             405, "Method Not Allowed"),
    (Status::NotAcceptable,                406, "Not Acceptable"),
    (Status::ProxyAuthenticationRequired,  407, "Proxy Authentication Required"),
    (Status::RequestTimeout,               408, "Request Timeout"),
    (Status::Conflict,                     409, "Conflict"),
    (Status::Gone,                         410, "Gone"),
    (Status::LengthRequired,               411, "Length Required"),
    (Status::PreconditionFailed,           412, "Precondition Failed"),
    (Status::RequestEntityTooLarge,        413, "Request Entity Too Large"),
    (Status::RequestUriTooLong,            414, "Request-URI Too Long"),
    (Status::UnsupportedMediaType,         415, "Unsupported Media Type"),
    (Status::RequestedRangeNotSatisfiable, 416, "Requested Range Not Satisfiable"),
    (Status::ExpectationFailed,            417, "Expectation Failed"),
    (Status::InternalServerError,          500, "Internal Server Error"),
    (Status::NotImplemented,               501, "Not Implemented"),
    (Status::BadGateway,                   502, "Bad Gateway"),
    (Status::ServiceUnavailable,           503, "Service Unavailable"),
    (Status::GatewayTimeout,               504, "Gateway Timeout"),
    (Status::HttpVersionNotSupported,      505, "HTTP Version Not Supported"),
    (Status::BandwidthLimitExceeded,       509, "Bandwidth Limit Exceeded"),
];

impl Status {
    /// Looks a numeric code up in the table.
    pub fn from_code(code: u16) -> Option<Self> {
        TABLE.iter().find(|(_, c, _)| *c == code).map(|(s, _, _)| *s)
    }

    pub fn code(self) -> u16 {
        self.entry().1
    }

    pub fn reason(self) -> &'static str {
        self.entry().2
    }

    fn entry(self) -> &'static (Status, u16, &'static str) {
        // Every variant has exactly one row.
        TABLE.iter().find(|(s, _, _)| *s == self).unwrap_or(&TABLE[0])
    }
}

impl From<Status> for u16 {
    fn from(s: Status) -> u16 {
        s.code()
    }
}

/// Formats `"<code> <reason>"`, or the bare code when it has no phrase.
pub fn status_line(code: u16) -> String {
    match Status::from_code(code) {
        Some(status) => format!("{code} {}", status.reason()),
        None         => code.to_string(),
    }
}
