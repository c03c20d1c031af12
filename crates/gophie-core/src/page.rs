// SPDX-License-Identifier: AGPL-3.0
// Gophie Core - Fetched pages

use crate::address::Address;
use crate::item_type::ItemKind;
use crate::menu::MenuEntry;

/// Line that ends a directory listing
const LISTING_TERMINATOR: &str = ".";

/// Response of a single request, interpreted according to the kind that
/// was expected when it was requested
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Page {
    address: Address,
    content_type: ItemKind,
    raw: Vec<u8>,
    entries: Vec<MenuEntry>,
}

impl Page {
    pub fn new(raw: Vec<u8>, content_type: ItemKind, address: Address) -> Self {
        let entries = if content_type == ItemKind::Directory {
            parse_listing(&raw)
        } else {
            Vec::new()
        };

        Self {
            address,
            content_type,
            raw,
            entries,
        }
    }

    pub fn address(&self) -> &Address {
        &self.address
    }

    pub fn content_type(&self) -> ItemKind {
        self.content_type
    }

    pub fn is_listing(&self) -> bool {
        self.content_type == ItemKind::Directory
    }

    /// Raw response bytes
    pub fn raw(&self) -> &[u8] {
        &self.raw
    }

    pub fn byte_len(&self) -> usize {
        self.raw.len()
    }

    /// Listing entries in display order; empty for non-listing content
    pub fn entries(&self) -> &[MenuEntry] {
        &self.entries
    }

    /// Entry at a 1-based display position
    pub fn entry(&self, position: usize) -> Option<&MenuEntry> {
        position
            .checked_sub(1)
            .and_then(|index| self.entries.get(index))
    }

    /// Decoded text with one trailing terminator line removed
    pub fn text(&self) -> String {
        let text = String::from_utf8_lossy(&self.raw);
        for terminator in ["\r\n.\r\n", "\n.\n"] {
            if let Some(stripped) = text.strip_suffix(terminator) {
                return stripped.to_string();
            }
        }
        text.into_owned()
    }
}

/// Parse every listing line in order; blank and end-of-listing lines are
/// never entries
fn parse_listing(raw: &[u8]) -> Vec<MenuEntry> {
    let text = String::from_utf8_lossy(raw);
    text.lines()
        .map(|line| line.trim_end_matches('\r'))
        .filter(|line| !line.is_empty() && *line != LISTING_TERMINATOR)
        .map(MenuEntry::parse_line)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    const LISTING: &[u8] = b"iWelcome\t\terror.host\t1\r\n\
1Phlog\t/phlog\texample.org\t70\r\n\
\r\n\
0About\t/about.txt\texample.org\t70\r\n\
.\r\n";

    fn address() -> Address {
        Address::parse("gopher://example.org/")
    }

    #[test]
    fn test_listing_entries_in_order() {
        let page = Page::new(LISTING.to_vec(), ItemKind::Directory, address());
        assert!(page.is_listing());
        assert_eq!(page.entries().len(), 3);
        assert_eq!(page.entry(1).unwrap().display_text, "Welcome");
        assert_eq!(page.entry(2).unwrap().display_text, "Phlog");
        assert_eq!(page.entry(3).unwrap().display_text, "About");
        assert!(page.entry(0).is_none());
        assert!(page.entry(4).is_none());
    }

    #[test]
    fn test_terminator_never_parsed() {
        let page = Page::new(LISTING.to_vec(), ItemKind::Directory, address());
        assert!(page
            .entries()
            .iter()
            .all(|e| !(e.kind == ItemKind::Unknown && e.display_text.is_empty())));
        assert_eq!(page.entries().last().unwrap().selector, "/about.txt");
    }

    #[test]
    fn test_stray_dot_line_does_not_end_listing() {
        let raw = b"1A\t/a\th\t70\r\n.\r\n1B\t/b\th\t70\r\n.\r\n".to_vec();
        let page = Page::new(raw, ItemKind::Directory, address());
        let selectors: Vec<&str> = page.entries().iter().map(|e| e.selector.as_str()).collect();
        assert_eq!(selectors, vec!["/a", "/b"]);
    }

    #[test]
    fn test_listing_without_terminator() {
        let raw = b"1One\t/1\th\t70\n1Two\t/2\th\t70\n".to_vec();
        let page = Page::new(raw, ItemKind::Directory, address());
        assert_eq!(page.entries().len(), 2);
        assert_eq!(page.entry(2).unwrap().selector, "/2");
    }

    #[test]
    fn test_text_content_not_parsed() {
        let raw = b"Hello\r\nWorld\r\n.\r\n".to_vec();
        let page = Page::new(raw.clone(), ItemKind::TextFile, address());
        assert!(page.entries().is_empty());
        assert_eq!(page.raw(), raw.as_slice());
        assert_eq!(page.text(), "Hello\r\nWorld");
    }

    #[test]
    fn test_text_strips_terminator_once() {
        let page = Page::new(b"a\n.\n.\n".to_vec(), ItemKind::TextFile, address());
        assert_eq!(page.text(), "a\n.");

        let page = Page::new(b"no terminator".to_vec(), ItemKind::TextFile, address());
        assert_eq!(page.text(), "no terminator");
    }

    #[test]
    fn test_binary_content_kept_raw() {
        let raw = vec![0u8, 159, 146, 150, 255];
        let page = Page::new(raw.clone(), ItemKind::Binary, address());
        assert_eq!(page.raw(), raw.as_slice());
        assert_eq!(page.byte_len(), 5);
        assert_eq!(page.content_type(), ItemKind::Binary);
    }
}
