//! Per-mount route table.
//!
//! Patterns are kept in registration order, each with one handler per
//! [`MethodKey`]. Lookup is literal first, regex scan second; within the scan
//! the first pattern that matches *and* has a handler for the verb (or an
//! any-method fallback) wins. There is no specificity ranking.

use std::collections::HashMap;
use std::sync::Arc;

use crate::handler::{Callable, Controller};
use crate::method::{Method, MethodKey};
use crate::path::{self, Pattern};

/// What a route points at.
#[derive(Clone, Debug)]
pub enum Target {
    /// A member of the mount's controller, resolved at call time.
    Member(String),
    /// A free closure.
    Callable(Arc<Callable>),
}

/// Conversion into a [`Target`]: member names (`&str`, `String`) and
/// [`Callable`]s.
pub trait IntoTarget {
    fn into_target(self) -> Target;
}

impl IntoTarget for &str {
    fn into_target(self) -> Target { Target::Member(self.to_owned()) }
}

impl IntoTarget for String {
    fn into_target(self) -> Target { Target::Member(self) }
}

impl IntoTarget for Callable {
    fn into_target(self) -> Target { Target::Callable(Arc::new(self)) }
}

impl IntoTarget for Target {
    fn into_target(self) -> Target { self }
}

/// One pattern and its handlers.
#[derive(Clone, Debug)]
pub struct Route {
    pattern: Pattern,
    handlers: Vec<(MethodKey, Target)>,
}

impl Route {
    pub fn pattern(&self) -> &str {
        self.pattern.as_str()
    }

    /// Handlers in registration order.
    pub fn handlers(&self) -> &[(MethodKey, Target)] {
        &self.handlers
    }

    /// Regex captures when `path` matches the pattern.
    pub fn captures(&self, path: &str) -> Option<Vec<String>> {
        self.pattern.captures(path)
    }

    pub fn handler(&self, key: MethodKey) -> Option<&Target> {
        self.handlers.iter().find(|(k, _)| *k == key).map(|(_, t)| t)
    }

    /// Exact verb first, then the any-method slot.
    fn resolve(&self, method: Method) -> Option<(MethodKey, &Target)> {
        let exact = MethodKey::Verb(method);
        self.handler(exact)
            .map(|t| (exact, t))
            .or_else(|| self.handler(MethodKey::Any).map(|t| (MethodKey::Any, t)))
    }
}

/// A successful lookup.
#[derive(Debug)]
pub struct RouteMatch<'a> {
    pub target: &'a Target,
    /// Regex captures, group 0 excluded. Empty for literal hits.
    pub captures: Vec<String>,
    /// The slot the handler was found in.
    pub key: MethodKey,
    pub pattern: &'a str,
}

/// Which controller members convention routing skips.
#[derive(Clone, Debug, PartialEq)]
pub enum Exclude {
    /// Skip these member names.
    Members(Vec<String>),
    /// Disable collection entirely.
    All,
}

impl Exclude {
    fn skips(&self, member: &str) -> bool {
        match self {
            Self::All          => true,
            Self::Members(ms)  => ms.iter().any(|m| m == member),
        }
    }
}

impl Default for Exclude {
    /// Constructor-like members.
    fn default() -> Self {
        Self::Members(vec!["new".to_owned()])
    }
}

/// The route table of one mount.
#[derive(Clone, Debug, Default)]
pub struct RouteTable {
    routes: Vec<Route>,
    index: HashMap<String, usize>,
}

impl RouteTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `target` for `pattern` under `key`. Registering the same
    /// pattern and key again replaces the handler but keeps the pattern's
    /// original position.
    pub fn add_route(&mut self, pattern: &str, target: impl IntoTarget, key: impl Into<MethodKey>) -> &mut Self {
        let key = key.into();
        let target = target.into_target();
        let idx = match self.index.get(pattern) {
            Some(&idx) => idx,
            None => {
                self.routes.push(Route { pattern: Pattern::new(pattern), handlers: Vec::new() });
                self.index.insert(pattern.to_owned(), self.routes.len() - 1);
                self.routes.len() - 1
            }
        };
        let handlers = &mut self.routes[idx].handlers;
        match handlers.iter_mut().find(|(k, _)| *k == key) {
            Some(slot) => slot.1 = target,
            None       => handlers.push((key, target)),
        }
        self
    }

    /// Registers under the any-method slot.
    pub fn any(&mut self, pattern: &str, target: impl IntoTarget) -> &mut Self {
        self.add_route(pattern, target, MethodKey::Any)
    }

    pub fn get(&mut self, pattern: &str, target: impl IntoTarget) -> &mut Self {
        self.add_route(pattern, target, Method::Get)
    }

    pub fn post(&mut self, pattern: &str, target: impl IntoTarget) -> &mut Self {
        self.add_route(pattern, target, Method::Post)
    }

    pub fn put(&mut self, pattern: &str, target: impl IntoTarget) -> &mut Self {
        self.add_route(pattern, target, Method::Put)
    }

    pub fn patch(&mut self, pattern: &str, target: impl IntoTarget) -> &mut Self {
        self.add_route(pattern, target, Method::Patch)
    }

    pub fn delete(&mut self, pattern: &str, target: impl IntoTarget) -> &mut Self {
        self.add_route(pattern, target, Method::Delete)
    }

    pub fn head(&mut self, pattern: &str, target: impl IntoTarget) -> &mut Self {
        self.add_route(pattern, target, Method::Head)
    }

    pub fn options(&mut self, pattern: &str, target: impl IntoTarget) -> &mut Self {
        self.add_route(pattern, target, Method::Options)
    }

    /// Convention routing: registers every public, non-excluded controller
    /// member whose name starts with a verb token.
    ///
    /// `getMethodWithoutMetadata` → `get` on `method-without-metadata`;
    /// `get` alone → `get` on the mount root (`""`); `allItems` → any-method
    /// on `items`. Declared URLs replace the derived pattern; each of them
    /// maps to the same member under the same key.
    pub fn collect(&mut self, controller: &dyn Controller, exclude: &Exclude) -> &mut Self {
        if *exclude == Exclude::All {
            return self;
        }
        for member in controller.members() {
            if !member.is_public() || exclude.skips(member.name()) {
                continue;
            }
            let Some((key, remainder)) = split_member_name(member.name()) else {
                continue;
            };
            let urls = member.signature().urls();
            if urls.is_empty() {
                self.add_route(&path::camel_to_dashes(remainder), member.name(), key);
            } else {
                for url in urls {
                    self.add_route(url, member.name(), key);
                }
            }
        }
        self
    }

    /// Resolves `path` (mount-local, no leading slash) for `method`.
    pub fn find_route(&self, path: &str, method: Method) -> Option<RouteMatch<'_>> {
        if let Some(route) = self.index.get(path).map(|&idx| &self.routes[idx]) {
            if let Some((key, target)) = route.resolve(method) {
                return Some(RouteMatch { target, captures: Vec::new(), key, pattern: route.pattern() });
            }
        }

        self.routes.iter().find_map(|route| {
            let captures = route.pattern.captures(path)?;
            let (key, target) = route.resolve(method)?;
            Some(RouteMatch { target, captures, key, pattern: route.pattern() })
        })
    }

    pub fn routes(&self) -> &[Route] {
        &self.routes
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }
}

/// `postLogin` → (`post`, `Login`). The verb token is the leading run of
/// lowercase letters; the remainder must be empty or start uppercase.
fn split_member_name(name: &str) -> Option<(MethodKey, &str)> {
    let split = name.find(|c: char| !c.is_ascii_lowercase()).unwrap_or(name.len());
    let (prefix, remainder) = name.split_at(split);
    if !remainder.is_empty() && !remainder.starts_with(|c: char| c.is_ascii_uppercase()) {
        return None;
    }
    MethodKey::from_prefix(prefix).map(|key| (key, remainder))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handler::{Args, Member, Outcome, Signature, callable};

    struct Routes;

    impl Controller for Routes {
        fn members(&self) -> Vec<Member> {
            vec![
                Member::new("new", Signature::new()),
                Member::new("get", Signature::new()),
                Member::new("postLogin", Signature::new()),
                Member::new("getStats", Signature::new().url("stats/([0-9]+)").url("stats")),
                Member::new("getMethodWithoutMetadata", Signature::new()),
                Member::new("allItems", Signature::new()),
                Member::new("helper", Signature::new()),
                Member::new("get_raw", Signature::new()),
                Member::private("getSecret", Signature::new()),
            ]
        }

        fn invoke(&self, _member: &str, _args: Args) -> Option<Outcome> {
            None
        }
    }

    fn member(m: &RouteMatch<'_>) -> String {
        match m.target {
            Target::Member(name) => name.clone(),
            Target::Callable(_)  => "<callable>".into(),
        }
    }

    #[test]
    fn convention_patterns() {
        let mut table = RouteTable::new();
        table.collect(&Routes, &Exclude::default());

        let patterns: Vec<_> = table.routes().iter().map(Route::pattern).collect();
        assert_eq!(patterns, ["", "login", "stats/([0-9]+)", "stats", "method-without-metadata", "items"]);

        assert_eq!(member(&table.find_route("", Method::Get).unwrap()), "get");
        assert_eq!(member(&table.find_route("login", Method::Post).unwrap()), "postLogin");
        assert!(table.find_route("login", Method::Get).is_none());
        assert!(table.find_route("secret", Method::Get).is_none());
    }

    #[test]
    fn collection_is_deterministic() {
        let mut a = RouteTable::new();
        let mut b = RouteTable::new();
        a.collect(&Routes, &Exclude::default());
        b.collect(&Routes, &Exclude::default());
        let shape = |t: &RouteTable| {
            t.routes().iter()
                .map(|r| (r.pattern().to_owned(), r.handlers().iter().map(|(k, _)| *k).collect::<Vec<_>>()))
                .collect::<Vec<_>>()
        };
        assert_eq!(shape(&a), shape(&b));
    }

    #[test]
    fn wildcard_exclusion_disables_collection() {
        let mut table = RouteTable::new();
        table.collect(&Routes, &Exclude::All);
        assert!(table.is_empty());
    }

    #[test]
    fn literal_wins_over_earlier_regex() {
        let mut table = RouteTable::new();
        table.get("items/(.*)", "getAny").get("items/new", "getNew");

        let m = table.find_route("items/new", Method::Get).unwrap();
        assert_eq!(member(&m), "getNew");
        assert!(m.captures.is_empty());

        let m = table.find_route("items/7", Method::Get).unwrap();
        assert_eq!(member(&m), "getAny");
        assert_eq!(m.captures, ["7"]);
    }

    #[test]
    fn any_method_fallback() {
        let mut table = RouteTable::new();
        table.any("x", "allX").post("x", "postX");
        table.any("y/([a-z]+)", "allY");

        assert_eq!(table.find_route("x", Method::Post).unwrap().key, MethodKey::Verb(Method::Post));
        let m = table.find_route("x", Method::Delete).unwrap();
        assert_eq!((m.key, member(&m)), (MethodKey::Any, "allX".to_owned()));

        let m = table.find_route("y/abc", Method::Put).unwrap();
        assert_eq!(m.key, MethodKey::Any);
        assert_eq!(m.captures, ["abc"]);
    }

    #[test]
    fn regex_scan_skips_patterns_without_a_handler_for_the_verb() {
        let mut table = RouteTable::new();
        table.post("([a-z]+)", "postWord").get("(.+)", "getAnything");

        let m = table.find_route("abc", Method::Get).unwrap();
        assert_eq!(member(&m), "getAnything");
    }

    #[test]
    fn overlapping_regexes_resolve_by_registration_order() {
        let mut table = RouteTable::new();
        table.get("([a-z]+)", "getWord").get("(.+)", "getAnything");
        assert_eq!(member(&table.find_route("abc", Method::Get).unwrap()), "getWord");
        assert_eq!(member(&table.find_route("a1", Method::Get).unwrap()), "getAnything");

        let mut reversed = RouteTable::new();
        reversed.get("(.+)", "getAnything").get("([a-z]+)", "getWord");
        assert_eq!(member(&reversed.find_route("abc", Method::Get).unwrap()), "getAnything");
        assert_eq!(member(&reversed.find_route("a1", Method::Get).unwrap()), "getAnything");
    }

    #[test]
    fn re_registration_overwrites_in_place() {
        let mut table = RouteTable::new();
        table.get("a", "first").get("b", "other").get("a", callable(|_| "second"));

        assert_eq!(table.routes().len(), 2);
        assert_eq!(table.routes()[0].pattern(), "a");
        assert_eq!(member(&table.find_route("a", Method::Get).unwrap()), "<callable>");
    }
}
