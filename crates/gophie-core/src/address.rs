// SPDX-License-Identifier: AGPL-3.0
// Gophie Core - Gopher addresses
//
// Parsing is lenient: anything that does not fit degrades to a default
// instead of failing.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Port used when an address does not name one
pub const DEFAULT_PORT: u16 = 70;

/// Scheme prefix of canonical addresses
pub const SCHEME: &str = "gopher://";

const EXTERNAL_MARKERS: [&str; 2] = ["/URL:", "URL:"];

/// Returns the external address encoded in a selector, if any
pub fn external_url(selector: &str) -> Option<&str> {
    EXTERNAL_MARKERS
        .iter()
        .find_map(|marker| selector.strip_prefix(marker))
}

/// Host, port and selector of a Gopher resource
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Address {
    pub host: String,
    pub port: u16,
    pub selector: String,
}

impl Default for Address {
    fn default() -> Self {
        Self {
            host: String::new(),
            port: DEFAULT_PORT,
            selector: "/".to_string(),
        }
    }
}

impl Address {
    pub fn new(host: impl Into<String>, port: u16, selector: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            port,
            selector: selector.into(),
        }
    }

    /// Address whose selector carries an absolute external URL
    pub fn external(url: &str) -> Self {
        Self {
            selector: format!("/URL:{}", url),
            ..Self::default()
        }
    }

    /// Parse `gopher://host[:port]/selector`, `host[:port]/selector` or an
    /// escaped external address
    pub fn parse(raw: &str) -> Self {
        let raw = raw.trim();

        if let Some(url) = external_url(raw) {
            return Self::external(url);
        }

        let rest = match strip_scheme(raw) {
            Some(rest) => rest,
            // Any other scheme is handed off as an external address
            None if has_scheme(raw) => return Self::external(raw),
            None => raw,
        };

        let (authority, selector) = match rest.find('/') {
            Some(index) => (&rest[..index], &rest[index..]),
            None => (rest, "/"),
        };
        let (host, port) = split_authority(authority);

        Self {
            host,
            port,
            selector: selector.to_string(),
        }
    }

    /// The external URL when the selector is an escape, otherwise None
    pub fn external_url(&self) -> Option<&str> {
        external_url(&self.selector)
    }

    pub fn is_external(&self) -> bool {
        self.external_url().is_some()
    }

    /// Reconstruct the address string; the default port is omitted
    pub fn to_canonical_string(&self) -> String {
        if let Some(url) = self.external_url() {
            return url.to_string();
        }
        compose(&self.host, self.port, &self.selector)
    }

    /// Address of a full-text search: the query follows the selector after a TAB
    pub fn with_query(&self, query: &str) -> Self {
        Self {
            selector: format!("{}\t{}", self.selector, query),
            ..self.clone()
        }
    }

    /// Request line sent to the server: selector + CRLF, one byte per character
    pub fn request_line(&self) -> Vec<u8> {
        let mut line: Vec<u8> = self
            .selector
            .chars()
            .map(|c| if c.is_ascii() { c as u8 } else { b'?' })
            .collect();
        line.extend_from_slice(b"\r\n");
        line
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_canonical_string())
    }
}

impl From<&str> for Address {
    fn from(raw: &str) -> Self {
        Self::parse(raw)
    }
}

/// Build `gopher://host[:port]/selector` with exactly one separating slash
pub(crate) fn compose(host: &str, port: u16, selector: &str) -> String {
    let mut result = String::from(SCHEME);
    if host.contains(':') {
        result.push('[');
        result.push_str(host);
        result.push(']');
    } else {
        result.push_str(host);
    }
    if port != DEFAULT_PORT {
        result.push(':');
        result.push_str(&port.to_string());
    }
    if !selector.starts_with('/') {
        result.push('/');
    }
    result.push_str(selector);
    result
}

fn strip_scheme(raw: &str) -> Option<&str> {
    let prefix = raw.get(..SCHEME.len())?;
    if prefix.eq_ignore_ascii_case(SCHEME) {
        Some(&raw[SCHEME.len()..])
    } else {
        None
    }
}

fn has_scheme(raw: &str) -> bool {
    raw.split_once("://")
        .map(|(scheme, _)| {
            !scheme.is_empty()
                && scheme
                    .chars()
                    .all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '-' | '.'))
        })
        .unwrap_or(false)
}

fn split_authority(authority: &str) -> (String, u16) {
    // Bracketed IPv6 literal
    if let Some(inner) = authority.strip_prefix('[') {
        if let Some((host, after)) = inner.split_once(']') {
            let port = after
                .strip_prefix(':')
                .map(parse_port)
                .unwrap_or(DEFAULT_PORT);
            return (host.to_string(), port);
        }
    }

    match authority.rsplit_once(':') {
        Some((host, port)) => (host.to_string(), parse_port(port)),
        None => (authority.to_string(), DEFAULT_PORT),
    }
}

pub(crate) fn parse_port(raw: &str) -> u16 {
    raw.trim().parse().unwrap_or(DEFAULT_PORT)
}
