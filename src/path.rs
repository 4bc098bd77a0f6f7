//! Path normalisation and pattern matching.
//!
//! A route pattern is stored twice: as the literal string it was registered
//! with (for exact lookups) and, when it compiles, as a regular expression
//! anchored at both ends. Literal lookups always run first; the regex scan is
//! the fallback.

use regex::Regex;

/// Ensures a single leading slash and strips one trailing slash.
/// The root stays `/`.
///
/// ```rust
/// use baton::path::normalize;
///
/// assert_eq!(normalize("/foo/"), "/foo");
/// assert_eq!(normalize("foo"), "/foo");
/// assert_eq!(normalize("/"), "/");
/// assert_eq!(normalize(""), "/");
/// ```
pub fn normalize(path: &str) -> String {
    if path == "/" || path.is_empty() {
        return "/".to_owned();
    }
    let trimmed = path.strip_suffix('/').unwrap_or(path);
    if trimmed.starts_with('/') {
        trimmed.to_owned()
    } else {
        format!("/{trimmed}")
    }
}

/// Exact, case-sensitive comparison.
pub fn match_literal(pattern: &str, path: &str) -> bool {
    pattern == path
}

/// Matches `path` against `^pattern$` and returns the captured groups,
/// group 0 excluded. Trailing groups that did not participate are dropped;
/// an earlier one captures `""`.
/// `None` when the pattern does not compile or does not match.
pub fn match_regex(pattern: &str, path: &str) -> Option<Vec<String>> {
    let re = compile(pattern)?;
    captures(&re, path)
}

/// `getMethodWithoutMetadata` → `method-without-metadata`. Only lowercase →
/// uppercase boundaries get a dash; the result is lowercased.
pub fn camel_to_dashes(name: &str) -> String {
    let mut out = String::with_capacity(name.len() + 4);
    let mut prev_lower = false;
    for c in name.chars() {
        if prev_lower && c.is_ascii_uppercase() {
            out.push('-');
        }
        prev_lower = c.is_ascii_lowercase();
        out.push(c.to_ascii_lowercase());
    }
    out
}

/// A registered route pattern.
#[derive(Clone, Debug)]
pub struct Pattern {
    raw: String,
    regex: Option<Regex>,
}

impl Pattern {
    pub fn new(raw: impl Into<String>) -> Self {
        let raw = raw.into();
        let regex = compile(&raw);
        Self { raw, regex }
    }

    pub fn as_str(&self) -> &str {
        &self.raw
    }

    pub fn matches_literal(&self, path: &str) -> bool {
        match_literal(&self.raw, path)
    }

    /// Captures for `path`, or `None` when the pattern is not a valid regex or
    /// does not match.
    pub fn captures(&self, path: &str) -> Option<Vec<String>> {
        captures(self.regex.as_ref()?, path)
    }
}

fn compile(pattern: &str) -> Option<Regex> {
    Regex::new(&format!("^(?:{pattern})$")).ok()
}

fn captures(re: &Regex, path: &str) -> Option<Vec<String>> {
    let caps = re.captures(path)?;
    let groups: Vec<_> = caps.iter().skip(1).collect();
    let used = groups.iter().rposition(Option::is_some).map_or(0, |last| last + 1);
    Some(
        groups.into_iter()
            .take(used)
            .map(|m| m.map_or_else(String::new, |m| m.as_str().to_owned()))
            .collect(),
    )
}
