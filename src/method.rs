//! HTTP verbs as a typed enum, plus the route-table key that adds the
//! "any method" slot.
//!
//! Only the seven verbs a controller can be routed on are modelled. Anything
//! else arriving from a client resolves to `get` before routing starts.

use std::fmt;
use std::str::FromStr;

/// A routable HTTP verb.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum Method {
    Delete,
    Get,
    Head,
    Options,
    Patch,
    Post,
    Put,
}

impl Method {
    /// Every routable verb, in the order the self-description lists them.
    pub const ALL: [Method; 7] = [
        Self::Get,
        Self::Post,
        Self::Put,
        Self::Delete,
        Self::Head,
        Self::Options,
        Self::Patch,
    ];

    /// Returns the lowercase key used in route tables and member names (e.g. `"get"`).
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Delete  => "delete",
            Self::Get     => "get",
            Self::Head    => "head",
            Self::Options => "options",
            Self::Patch   => "patch",
            Self::Post    => "post",
            Self::Put     => "put",
        }
    }

    /// Resolves a client-supplied method string. Case-insensitive; unknown
    /// verbs fall back to `Get`.
    pub fn resolve(s: &str) -> Self {
        s.to_ascii_lowercase().parse().unwrap_or(Self::Get)
    }
}

/// Parses a lowercase verb (e.g. `"post"`).
impl FromStr for Method {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "delete"  => Ok(Self::Delete),
            "get"     => Ok(Self::Get),
            "head"    => Ok(Self::Head),
            "options" => Ok(Self::Options),
            "patch"   => Ok(Self::Patch),
            "post"    => Ok(Self::Post),
            "put"     => Ok(Self::Put),
            _         => Err(()),
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The method slot a handler is registered under.
///
/// `Any` is the fallback consulted when a pattern has no handler for the exact
/// verb. Member names starting with `all` are collected into it.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum MethodKey {
    Verb(Method),
    Any,
}

impl MethodKey {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Verb(m) => m.as_str(),
            Self::Any     => "_all_",
        }
    }

    /// Maps the leading token of a member name (`get`, `post`, ..., `all`).
    pub fn from_prefix(prefix: &str) -> Option<Self> {
        match prefix {
            "all" => Some(Self::Any),
            other => other.parse().ok().map(Self::Verb),
        }
    }
}

impl From<Method> for MethodKey {
    fn from(m: Method) -> Self {
        Self::Verb(m)
    }
}

impl fmt::Display for MethodKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolve_is_case_insensitive_and_defaults_to_get() {
        assert_eq!(Method::resolve("POST"), Method::Post);
        assert_eq!(Method::resolve("Patch"), Method::Patch);
        assert_eq!(Method::resolve("PROPFIND"), Method::Get);
        assert_eq!(Method::resolve(""), Method::Get);
    }

    #[test]
    fn member_prefixes() {
        assert_eq!(MethodKey::from_prefix("all"), Some(MethodKey::Any));
        assert_eq!(MethodKey::from_prefix("delete"), Some(MethodKey::Verb(Method::Delete)));
        assert_eq!(MethodKey::from_prefix("fetch"), None);
    }
}
