// SPDX-License-Identifier: AGPL-3.0
// Gophie Core - Directory listing entries
//
// A listing line is `<code><display>\t<selector>\t<host>\t<port>`.
// Malformed lines never fail to parse; missing fields take defaults.

use crate::address::{self, Address, DEFAULT_PORT};
use crate::item_type::ItemKind;
use serde::{Deserialize, Serialize};

/// Extension assumed when a file name carries none
const FALLBACK_EXTENSION: &str = "txt";

/// One entry of a directory listing
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MenuEntry {
    pub kind: ItemKind,
    pub display_text: String,
    pub selector: String,
    pub host: String,
    pub port: u16,
}

impl Default for MenuEntry {
    fn default() -> Self {
        Self {
            kind: ItemKind::Unknown,
            display_text: String::new(),
            selector: String::new(),
            host: String::new(),
            port: DEFAULT_PORT,
        }
    }
}

/// What a host application should do when an entry is activated
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LinkTarget {
    /// Informational line without a destination
    None,
    /// Fetch and show as a page of the given kind
    Page { address: Address, kind: ItemKind },
    /// Binary content, handled by the download manager
    Download { address: Address },
    /// Full-text search; needs a query before fetching
    Search { address: Address },
    Telnet { host: String, port: u16 },
    Web(String),
    Mail(String),
}

impl MenuEntry {
    /// Parse a single listing line
    pub fn parse_line(raw: &str) -> Self {
        let line: String = raw.chars().filter(|c| *c != '\r' && *c != '\n').collect();

        let mut fields = line.split('\t');
        let first = fields.next().unwrap_or_default();

        let mut chars = first.chars();
        let kind = match chars.next() {
            Some(code) => ItemKind::from_code(code),
            None if line.is_empty() => return Self::default(),
            // Line starting with a TAB: no code and no display text
            None => ItemKind::Unknown,
        };

        let display_text = chars.as_str().to_string();
        let selector = fields.next().unwrap_or_default().trim().to_string();
        let host = fields.next().unwrap_or_default().trim().to_string();
        let port = fields
            .next()
            .map(address::parse_port)
            .unwrap_or(DEFAULT_PORT);

        Self {
            kind,
            display_text,
            selector,
            host,
            port,
        }
    }

    /// Entry pointing at an address, e.g. one typed in by the user
    pub fn from_address(address: &Address, kind: ItemKind) -> Self {
        let mut entry = Self {
            kind,
            display_text: String::new(),
            selector: address.selector.clone(),
            host: address.host.clone(),
            port: address.port,
        };
        entry.display_text = entry.file_name();
        entry
    }

    /// Canonical address string; escaped selectors yield their URL verbatim
    pub fn canonical_address(&self) -> String {
        match address::external_url(&self.selector) {
            Some(url) => url.to_string(),
            None => address::compose(&self.host, self.port, &self.selector),
        }
    }

    /// Address to request; the selector is sent exactly as listed
    pub fn address(&self) -> Address {
        Address::new(self.host.clone(), self.port, self.selector.clone())
    }

    /// Address of a search entry with the query attached
    pub fn search_address(&self, query: &str) -> Address {
        self.address().with_query(query)
    }

    /// Last path segment of the canonical address
    pub fn file_name(&self) -> String {
        let address = self.canonical_address();
        match address.rfind('/') {
            Some(index) if index > 0 => address[index + 1..].to_string(),
            _ => address,
        }
    }

    /// File name with the kind's default extension when it has none
    pub fn file_name_with_forced_ext(&self) -> String {
        let name = self.file_name();
        if name.contains('.') {
            name
        } else {
            format!("{}.{}", name, self.kind.extension())
        }
    }

    /// Extension of the file name, `txt` when there is none
    pub fn file_extension(&self) -> String {
        let name = self.file_name();
        match name.rfind('.') {
            Some(index) if index > 0 => name[index + 1..].to_string(),
            _ => FALLBACK_EXTENSION.to_string(),
        }
    }

    /// Classify the entry so a host knows how to open it
    pub fn link_target(&self) -> LinkTarget {
        if !self.kind.is_navigable() {
            return LinkTarget::None;
        }
        if self.kind.is_binary() {
            return LinkTarget::Download {
                address: self.address(),
            };
        }

        match self.kind {
            ItemKind::Search => LinkTarget::Search {
                address: self.address(),
            },
            ItemKind::Telnet | ItemKind::Telnet3270 | ItemKind::CcsoNameserver => {
                LinkTarget::Telnet {
                    host: self.host.clone(),
                    port: self.port,
                }
            }
            _ => {
                let target = self.canonical_address();
                if target.starts_with("http://") || target.starts_with("https://") {
                    LinkTarget::Web(target)
                } else if let Some(mail) = target.strip_prefix("mailto:") {
                    LinkTarget::Mail(mail.to_string())
                } else if address::external_url(&self.selector).is_some() {
                    // Unsupported external scheme, leave it to the host
                    LinkTarget::Web(target)
                } else {
                    LinkTarget::Page {
                        address: self.address(),
                        kind: self.kind,
                    }
                }
            }
        }
    }
}
