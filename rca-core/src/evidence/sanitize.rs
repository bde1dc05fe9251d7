//! Scrubs collector output before it is allowed into a pin's `raw_output`
//! or an error's `Display` text: no internal URLs, hostnames, ports, or
//! bearer tokens may cross a session boundary.

use regex::Regex;
use std::sync::OnceLock;

struct Patterns {
    url: Regex,
    host_port: Regex,
    bearer: Regex,
    basic_auth: Regex,
}

fn patterns() -> &'static Patterns {
    static PATTERNS: OnceLock<Patterns> = OnceLock::new();
    PATTERNS.get_or_init(|| Patterns {
        url: Regex::new(r#"https?://[^\s'"]+"#).expect("valid url pattern"),
        host_port: Regex::new(r"\b(?:[a-zA-Z0-9-]+\.)+[a-zA-Z]{2,}:\d{2,5}\b")
            .expect("valid host:port pattern"),
        bearer: Regex::new(r"(?i)bearer\s+[A-Za-z0-9._-]+").expect("valid bearer pattern"),
        basic_auth: Regex::new(r"(?i)(authorization|api[_-]?key|token)\s*[:=]\s*\S+")
            .expect("valid key=value secret pattern"),
    })
}

/// Scrubs collector text of internal URLs, host:port pairs, and
/// authorization material, replacing each with a fixed placeholder.
pub struct Sanitizer;

impl Sanitizer {
    /// Redact `text` in place of any URL, host:port, bearer token, or
    /// key=value secret it contains.
    pub fn scrub(text: &str) -> String {
        let p = patterns();
        let text = p.url.replace_all(text, "[redacted-url]");
        let text = p.bearer.replace_all(&text, "[redacted-token]");
        let text = p.basic_auth.replace_all(&text, "[redacted-secret]");
        p.host_port.replace_all(&text, "[redacted-host]").into_owned()
    }
}
