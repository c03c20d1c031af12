// SPDX-License-Identifier: AGPL-3.0
// Gophie Core - Gopher client logic shared by all frontends
//
// This crate provides:
// - Address parsing and the item type registry
// - GopherTransport for fetching pages and downloading files
// - Page and MenuEntry for directory listings
// - DownloadManager with its observable download collection
// - NavigationHistory for back/forward navigation
//
// Rendering and user interaction live in the frontend crates.

pub mod address;
pub mod collection;
pub mod download;
pub mod events;
pub mod history;
pub mod item_type;
pub mod manager;
pub mod menu;
pub mod page;
pub mod transport;
pub mod types;

// Re-export commonly used items
pub use address::Address;
pub use collection::{CollectionEvent, DownloadCollection};
pub use download::{DownloadEvent, DownloadRecord, DownloadSnapshot, DownloadStatus};
pub use events::{ChannelListener, ListenerRegistry, SubscriptionId, TransportEvent};
pub use history::NavigationHistory;
pub use item_type::{ItemKind, KindInfo};
pub use manager::DownloadManager;
pub use menu::{LinkTarget, MenuEntry};
pub use page::Page;
pub use transport::{GopherTransport, Loaded, OperationHandle, Transport, TransportListener};
pub use types::{ClientError, ClientSettings, ErrorKind, GopherError};
