// Sessiongate: Live Session Host
//
// The surface that actually uses the cookies (a web view, a headless client).
// The core only ever reads, injects, or wipes its jar through this interface.

use std::sync::Mutex;

use crate::cookie::{Cookie, CookieSet};

pub trait LiveSessionHost: Send + Sync {
    /// Cookies the live session currently holds for `domain`.
    fn current_cookies(&self, domain: &str) -> CookieSet;

    /// Add cookies to the live session.
    fn inject_cookies(&self, cookies: CookieSet);

    /// Drop every live cookie and any other per-session state, in one step.
    fn clear_live_session(&self);
}

/// RFC 6265 domain-match: `host` equals the cookie domain or is a subdomain
/// of it. A cookie with no domain matches only when asked for everything.
fn domain_matches(host: &str, cookie_domain: &str) -> bool {
    let cookie_domain = cookie_domain.trim_start_matches('.');
    if cookie_domain.is_empty() {
        return host.is_empty();
    }
    host.eq_ignore_ascii_case(cookie_domain)
        || host
            .to_ascii_lowercase()
            .ends_with(&format!(".{}", cookie_domain.to_ascii_lowercase()))
}

/// An in-process cookie jar. Backs the CLI's live session, and is the
/// reference host the lifecycle is tested against.
#[derive(Default)]
pub struct CookieJarHost {
    jar: Mutex<Vec<Cookie>>,
}

impl CookieJarHost {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every cookie in the jar, in insertion order.
    pub fn snapshot(&self) -> CookieSet {
        self.with_jar(|jar| jar.iter().cloned().collect())
    }

    pub fn is_empty(&self) -> bool {
        self.snapshot().is_empty()
    }

    fn with_jar<R>(&self, f: impl FnOnce(&mut Vec<Cookie>) -> R) -> R {
        // a panic elsewhere must not keep cookies from being cleared
        let mut jar = self.jar.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        f(&mut jar)
    }
}

impl LiveSessionHost for CookieJarHost {
    fn current_cookies(&self, domain: &str) -> CookieSet {
        self.with_jar(|jar| {
            jar.iter()
                .filter(|c| domain.is_empty() || domain_matches(domain, &c.domain))
                .cloned()
                .collect()
        })
    }

    fn inject_cookies(&self, cookies: CookieSet) {
        self.with_jar(|jar| {
            for cookie in cookies {
                // same name + scope replaces, like a browser jar
                jar.retain(|c| {
                    !(c.name == cookie.name && c.domain == cookie.domain && c.path == cookie.path)
                });
                jar.push(cookie);
            }
        });
    }

    fn clear_live_session(&self) {
        let removed = self.with_jar(|jar| std::mem::take(jar).len());
        tracing::debug!(removed, "Live cookie jar cleared");
    }
}

// ─── Tests ───────────────────────────────────────────────────────────────────
