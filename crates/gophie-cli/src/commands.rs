// SPDX-License-Identifier: AGPL-3.0
// Gophie CLI - Command handlers
//
// This is the composition root: settings, transport and the download
// manager are created here and torn down before exit.

use crate::error::CliError;
use crate::{Cli, Command};
use gophie_core::{
    Address, ClientSettings, CollectionEvent, DownloadManager, DownloadRecord, DownloadStatus,
    GopherTransport, ItemKind, LinkTarget, MenuEntry, Page,
};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::runtime::Handle;

/// Run the selected subcommand
pub async fn run(cli: Cli) -> Result<(), CliError> {
    let mut settings = ClientSettings::default();
    if let Some(dir) = cli.download_dir {
        settings.download_dir = dir;
    }
    if let Some(home) = cli.home {
        settings.home_address = home;
    }

    match cli.command {
        Command::Fetch {
            address,
            kind,
            json,
        } => {
            let address = match address {
                Some(raw) => gopher_address(&raw)?,
                None => settings.home(),
            };
            let page = fetch(&address, ItemKind::from_code(kind)).await?;
            print_page(&page, json)
        }
        Command::Search {
            address,
            query,
            json,
        } => {
            let address = gopher_address(&address)?.with_query(&query);
            let page = fetch(&address, ItemKind::Directory).await?;
            print_page(&page, json)
        }
        Command::Download {
            address,
            output,
            json,
        } => {
            let address = gopher_address(&address)?;
            download(settings, address, output, json).await
        }
    }
}

fn gopher_address(raw: &str) -> Result<Address, CliError> {
    let address = Address::parse(raw);
    if address.is_external() {
        return Err(CliError::NotGopher(raw.to_string()));
    }
    Ok(address)
}

async fn fetch(address: &Address, kind: ItemKind) -> Result<Page, CliError> {
    let transport = GopherTransport::new(Handle::current());
    Ok(transport.fetch(address, kind, None).await?)
}

fn print_page(page: &Page, json: bool) -> Result<(), CliError> {
    if json {
        let value = if page.is_listing() {
            serde_json::json!({
                "address": page.address().to_canonical_string(),
                "entries": page.entries(),
            })
        } else {
            serde_json::json!({
                "address": page.address().to_canonical_string(),
                "contentType": page.content_type(),
                "text": page.text(),
            })
        };
        println!("{}", serde_json::to_string_pretty(&value)?);
        return Ok(());
    }

    if !page.is_listing() {
        if page.content_type().is_binary() {
            println!(
                "{} bytes of {}; use `gophie download` to save it",
                page.byte_len(),
                page.content_type().display_name()
            );
        } else {
            println!("{}", page.text());
        }
        return Ok(());
    }

    for (index, entry) in page.entries().iter().enumerate() {
        print_entry(index + 1, entry);
    }
    Ok(())
}

fn print_entry(position: usize, entry: &MenuEntry) {
    let target = match entry.link_target() {
        LinkTarget::None => {
            println!("      {}", entry.display_text);
            return;
        }
        LinkTarget::Telnet { host, port } => format!("telnet://{}:{}", host, port),
        LinkTarget::Web(url) => url,
        LinkTarget::Mail(mail) => format!("mailto:{}", mail),
        LinkTarget::Page { .. } | LinkTarget::Download { .. } | LinkTarget::Search { .. } => {
            entry.canonical_address()
        }
    };
    println!(
        "{:>4}. [{}] {}  <{}>",
        position,
        entry.kind.display_name(),
        entry.display_text,
        target
    );
}

async fn download(
    settings: ClientSettings,
    address: Address,
    output: Option<PathBuf>,
    json: bool,
) -> Result<(), CliError> {
    let manager = DownloadManager::new(settings, Handle::current())?;
    let entry = MenuEntry::from_address(&address, ItemKind::Binary);

    let (event_tx, event_rx) = async_channel::unbounded();
    let downloads = manager.downloads();
    downloads.subscribe(move |event| {
        let _ = event_tx.try_send(*event);
    });

    let record = match output {
        Some(path) => manager.start_to(entry, path)?,
        None => manager.start(entry).await?,
    };
    tracing::info!("Saving {} to {:?}", address, record.target());

    let result = tokio::select! {
        result = wait_for(&record, &event_rx, json) => result,
        _ = tokio::signal::ctrl_c() => {
            eprintln!();
            tracing::info!("Interrupted, cancelling downloads");
            Err(CliError::Interrupted)
        }
    };

    manager.shutdown().await;
    if json {
        println!("{}", serde_json::to_string_pretty(&record.snapshot())?);
    }
    result
}

/// Follow collection events until the record reaches a final state
async fn wait_for(
    record: &Arc<DownloadRecord>,
    events: &async_channel::Receiver<CollectionEvent>,
    quiet: bool,
) -> Result<(), CliError> {
    while !record.status().is_terminal() {
        match events.recv().await {
            Ok(CollectionEvent::RecordUpdated(id)) if id == record.id() => eprint!(
                "\r{} bytes ({} B/s)   ",
                record.bytes_loaded(),
                record.bytes_per_second()
            ),
            Ok(_) => {}
            Err(_) => break,
        }
    }
    eprintln!();

    match record.status() {
        DownloadStatus::Completed if quiet => Ok(()),
        DownloadStatus::Completed => {
            println!(
                "Saved {} bytes to {}",
                record.bytes_loaded(),
                record.target().display()
            );
            Ok(())
        }
        _ => {
            let reason = record
                .last_error()
                .map(|e| e.to_string())
                .unwrap_or_else(|| "download did not finish".to_string());
            Err(CliError::DownloadFailed(reason))
        }
    }
}
