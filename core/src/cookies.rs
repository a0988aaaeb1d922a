//! Minimal cookie storage standing in for the host platform's jar.
//!
//! Only name/value pairs are tracked. Domain and path attributes are
//! ignored because the client talks to a single base URL.

use std::collections::BTreeMap;

use crate::http::HttpResponse;

/// Name of the cookie whose value is echoed in the anti-forgery header.
pub const CSRF_COOKIE: &str = "csrftoken";

/// Name of the server's session cookie.
pub const SESSION_COOKIE: &str = "sessionid";

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CookieJar {
    cookies: BTreeMap<String, String>,
}

impl CookieJar {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.cookies.get(name).map(String::as_str)
    }

    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.cookies.insert(name.into(), value.into());
    }

    pub fn is_empty(&self) -> bool {
        self.cookies.is_empty()
    }

    pub fn clear(&mut self) {
        self.cookies.clear();
    }

    /// Apply every `set-cookie` header in `response`.
    pub fn absorb(&mut self, response: &HttpResponse) {
        for raw in response.header_values("set-cookie") {
            self.apply_set_cookie(raw);
        }
    }

    /// Apply one `Set-Cookie` value. Expired or emptied cookies are removed.
    pub fn apply_set_cookie(&mut self, raw: &str) {
        let mut parts = raw.split(';');
        let Some((name, value)) = parts.next().and_then(|pair| pair.split_once('=')) else {
            tracing::debug!(header = raw, "ignoring unparseable set-cookie");
            return;
        };
        let name = name.trim();
        if name.is_empty() {
            return;
        }
        let value = value.trim().trim_matches('"');

        let expired = parts.any(|attr| {
            let Some((key, val)) = attr.split_once('=') else {
                return false;
            };
            key.trim().eq_ignore_ascii_case("max-age")
                && val.trim().parse::<i64>().is_ok_and(|age| age <= 0)
        });

        if expired || value.is_empty() {
            self.cookies.remove(name);
        } else {
            self.cookies.insert(name.to_string(), value.to_string());
        }
    }

    /// Render the jar as a `Cookie` request header value, or `None` when
    /// there is nothing to send.
    pub fn header_value(&self) -> Option<String> {
        if self.cookies.is_empty() {
            return None;
        }
        let pairs: Vec<String> = self
            .cookies
            .iter()
            .map(|(name, value)| format!("{name}={value}"))
            .collect();
        Some(pairs.join("; "))
    }
}
