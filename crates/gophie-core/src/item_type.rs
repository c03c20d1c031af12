// SPDX-License-Identifier: AGPL-3.0
// Gophie Core - Item type registry
//
// Every listing entry starts with a single classification character.
// The table below maps those characters to a default file extension,
// a binary flag and a readable name.

use serde::{Deserialize, Serialize};

/// Classification of a Gopher item
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ItemKind {
    TextFile,
    Directory,
    CcsoNameserver,
    Error,
    BinHex,
    DosFile,
    Uuencoded,
    Search,
    Telnet,
    Binary,
    Mirror,
    Gif,
    Image,
    Telnet3270,
    Html,
    Information,
    Sound,
    Unknown,
}

/// Static description of one item kind
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KindInfo {
    pub kind: ItemKind,
    pub code: char,
    pub extension: &'static str,
    pub binary: bool,
    pub name: &'static str,
}

const fn info(
    kind: ItemKind,
    code: char,
    extension: &'static str,
    binary: bool,
    name: &'static str,
) -> KindInfo {
    KindInfo {
        kind,
        code,
        extension,
        binary,
        name,
    }
}

/// Catch-all entry for codes missing from the table
const UNKNOWN: KindInfo = info(ItemKind::Unknown, '?', "dat", false, "Unknown");

static REGISTRY: [KindInfo; 18] = [
    // Canonical types
    info(ItemKind::TextFile, '0', "txt", false, "Text file"),
    info(ItemKind::Directory, '1', "gophermap", false, "Gopher menu"),
    info(ItemKind::CcsoNameserver, '2', "ccso", false, "CCSO Nameserver"),
    info(ItemKind::Error, '3', "error", false, "Error code"),
    info(ItemKind::BinHex, '4', "hqx", true, "BinHex file (Macintosh)"),
    info(ItemKind::DosFile, '5', "dat", true, "DOS file"),
    info(ItemKind::Uuencoded, '6', "uue", true, "uuencoded file"),
    info(ItemKind::Search, '7', "txt", false, "Full-text search"),
    info(ItemKind::Telnet, '8', "txt", false, "Telnet"),
    info(ItemKind::Binary, '9', "dat", true, "Binary file"),
    info(ItemKind::Mirror, '+', "txt", false, "Mirror"),
    info(ItemKind::Gif, 'g', "gif", false, "GIF file"),
    info(ItemKind::Image, 'I', "jpg", false, "Image file"),
    info(ItemKind::Telnet3270, 'T', "txt", false, "Telnet 3270"),
    // Non-canonical types
    info(ItemKind::Html, 'h', "htm", false, "HTML file"),
    info(ItemKind::Information, 'i', "txt", false, "Information"),
    info(ItemKind::Sound, 's', "wav", true, "Sound file"),
    UNKNOWN,
];

/// All registered kinds in table order
pub fn registry() -> &'static [KindInfo] {
    &REGISTRY
}

impl ItemKind {
    /// Resolve a classification code, falling back to `Unknown`
    pub fn from_code(code: char) -> Self {
        REGISTRY
            .iter()
            .find(|entry| entry.code == code)
            .map(|entry| entry.kind)
            .unwrap_or(ItemKind::Unknown)
    }

    pub fn info(self) -> &'static KindInfo {
        REGISTRY
            .iter()
            .find(|entry| entry.kind == self)
            .unwrap_or(&UNKNOWN)
    }

    pub fn code(self) -> char {
        self.info().code
    }

    /// Default file extension for content of this kind
    pub fn extension(self) -> &'static str {
        self.info().extension
    }

    /// Binary content is downloaded rather than displayed
    pub fn is_binary(self) -> bool {
        self.info().binary
    }

    pub fn display_name(self) -> &'static str {
        self.info().name
    }

    /// Whether entries of this kind point anywhere
    pub fn is_navigable(self) -> bool {
        !matches!(self, ItemKind::Information | ItemKind::Error)
    }
}

impl std::fmt::Display for ItemKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.display_name())
    }
}
