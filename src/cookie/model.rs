// Sessiongate: Cookie data model
//
// Cookie values are session credentials. `Debug` never shows them, and
// nothing in this crate logs them.

use std::fmt;

/// A single session cookie, with the scope needed to re-inject it.
#[derive(Clone, PartialEq, Eq)]
pub struct Cookie {
    pub name: String,
    pub value: String,
    pub domain: String,
    pub path: String,
}

impl Cookie {
    /// A cookie scoped to `domain` at path `/`.
    pub fn new(name: impl Into<String>, value: impl Into<String>, domain: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
            domain: domain.into(),
            path: "/".to_string(),
        }
    }

    pub fn with_path(mut self, path: impl Into<String>) -> Self {
        self.path = path.into();
        self
    }

    /// Whether the cookie survives an encode/decode cycle unchanged:
    /// an RFC 6265 token name, a cookie-octet value, and a scope free of
    /// separators and surrounding whitespace.
    pub fn is_well_formed(&self) -> bool {
        !self.name.is_empty()
            && self.name.chars().all(is_token_char)
            && self.value.chars().all(is_cookie_octet)
            && is_clean_attribute(&self.domain)
            && is_clean_attribute(&self.path)
    }
}

fn is_token_char(c: char) -> bool {
    c.is_ascii_graphic() && !"()<>@,;:\\\"/[]?={}".contains(c)
}

fn is_cookie_octet(c: char) -> bool {
    matches!(c, '\x21' | '\x23'..='\x2b' | '\x2d'..='\x3a' | '\x3c'..='\x5b' | '\x5d'..='\x7e')
}

fn is_clean_attribute(s: &str) -> bool {
    s.trim() == s && !s.contains([';', '\n', '\r'])
}

impl fmt::Debug for Cookie {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Cookie")
            .field("name", &self.name)
            .field("value", &"[REDACTED]")
            .field("domain", &self.domain)
            .field("path", &self.path)
            .finish()
    }
}

/// An ordered cookie set. Order is kept as captured, since some servers care
/// about replay order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CookieSet(Vec<Cookie>);

impl CookieSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, cookie: Cookie) {
        self.0.push(cookie);
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Cookie> {
        self.0.iter()
    }

    pub fn get(&self, name: &str) -> Option<&Cookie> {
        self.0.iter().find(|c| c.name == name)
    }

    /// Parse a `Cookie:` request header (`a=1; b=2`), the form a web view's
    /// cookie jar reports for a URL. Every pair is scoped to `domain`, path `/`.
    /// Pairs without `=` or with an empty name are dropped.
    pub fn from_header(header: &str, domain: &str) -> Self {
        header
            .split(';')
            .filter_map(|pair| {
                let (name, value) = pair.trim().split_once('=')?;
                let name = name.trim();
                if name.is_empty() {
                    return None;
                }
                Some(Cookie::new(name, value.trim(), domain))
            })
            .collect()
    }

    /// Render the set as a `Cookie:` request header value.
    pub fn to_header(&self) -> String {
        self.0
            .iter()
            .map(|c| format!("{}={}", c.name, c.value))
            .collect::<Vec<_>>()
            .join("; ")
    }
}

impl FromIterator<Cookie> for CookieSet {
    fn from_iter<I: IntoIterator<Item = Cookie>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl IntoIterator for CookieSet {
    type Item = Cookie;
    type IntoIter = std::vec::IntoIter<Cookie>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

impl<'a> IntoIterator for &'a CookieSet {
    type Item = &'a Cookie;
    type IntoIter = std::slice::Iter<'a, Cookie>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

// ─── Tests ───────────────────────────────────────────────────────────────────
