//! Argument binding: from a declared signature and a request to [`Args`].
//!
//! Order of the produced list:
//!
//! 1. the HTTP verb, only for handlers registered under the any-method slot,
//! 2. every regex capture, consuming one leading declared parameter each,
//! 3. the remaining declared parameters, looked up by transformed name in the
//!    query, then the decoded body, then the declared default.

use std::borrow::Cow;

use serde_json::{Map, Value};

use crate::error::DispatchError;
use crate::handler::{Args, Param};
use crate::method::Method;
use crate::request::Request;

/// The one flag the `_` passthrough parameter never receives.
const SUPPRESS_FLAG: &str = "_suppress_status_code";

/// `pUsername` → `username`: a lowercase letter followed by an uppercase one
/// marks a prefixed name; the prefix is dropped and the next letter lowercased.
/// Any other name is used as is.
///
/// ```rust
/// use baton::binder::argument_name;
///
/// assert_eq!(argument_name("pUserName"), "userName");
/// assert_eq!(argument_name("username"), "username");
/// assert_eq!(argument_name("_"), "_");
/// ```
pub fn argument_name(name: &str) -> Cow<'_, str> {
    let mut chars = name.chars();
    match (chars.next(), chars.next()) {
        (Some(a), Some(b)) if a.is_ascii_lowercase() && b.is_ascii_uppercase() => {
            Cow::Owned(format!("{}{}", b.to_ascii_lowercase(), chars.as_str()))
        }
        _ => Cow::Borrowed(name),
    }
}

/// Produces the argument list for a handler.
///
/// `verb` is `Some` only for any-method handlers. Fails with
/// `MissingRequiredArgument` on the first required parameter found in
/// neither the query nor the body.
pub fn bind_parameters(
    params: &[Param],
    request: &Request,
    captures: Vec<String>,
    verb: Option<Method>,
) -> Result<Args, DispatchError> {
    let mut values = Vec::with_capacity(params.len() + 1);
    if let Some(verb) = verb {
        values.push(Value::from(verb.as_str()));
    }

    let consumed = captures.len();
    values.extend(captures.into_iter().map(Value::String));

    for param in params.iter().skip(consumed) {
        let name = argument_name(param.name());
        if name == "_" {
            values.push(Value::Object(passthrough(request)));
            continue;
        }

        let found = request.query_value(&name)
            .or_else(|| request.body_value(&name))
            .or(param.default());
        match found {
            Some(v) => values.push(v.clone()),
            None    => return Err(DispatchError::MissingRequiredArgument(name.into_owned())),
        }
    }

    Ok(Args::new(values))
}

/// All `_`-prefixed query parameters except the status-suppression flag.
fn passthrough(request: &Request) -> Map<String, Value> {
    request.query().iter()
        .filter(|(k, _)| k.starts_with('_') && k.as_str() != SUPPRESS_FLAG)
        .map(|(k, v)| (k.clone(), v.clone()))
        .collect()
}
