// SPDX-License-Identifier: AGPL-3.0
// Gophie Core - Download manager
//
// Owns the download collection. Constructed once by the application and
// shut down explicitly; there is no global instance.

use crate::collection::DownloadCollection;
use crate::download::DownloadRecord;
use crate::menu::MenuEntry;
use crate::transport::{GopherTransport, Transport};
use crate::types::{ClientError, ClientSettings};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::fs::OpenOptions;
use tokio::runtime::Handle;
use uuid::Uuid;

/// Numbered variants tried before giving up on a file name
const MAX_NAME_ATTEMPTS: usize = 1000;

/// Starts, tracks and cancels downloads
pub struct DownloadManager {
    settings: ClientSettings,
    runtime: Handle,
    downloads: Arc<DownloadCollection>,
    shut_down: AtomicBool,
}

impl DownloadManager {
    pub fn new(settings: ClientSettings, runtime: Handle) -> Result<Self, ClientError> {
        settings.validate()?;
        tracing::info!(
            "Download manager ready, saving to {:?}",
            settings.download_dir
        );

        Ok(Self {
            settings,
            runtime,
            downloads: Arc::new(DownloadCollection::new()),
            shut_down: AtomicBool::new(false),
        })
    }

    pub fn settings(&self) -> &ClientSettings {
        &self.settings
    }

    pub fn downloads(&self) -> Arc<DownloadCollection> {
        self.downloads.clone()
    }

    pub fn is_shut_down(&self) -> bool {
        self.shut_down.load(Ordering::SeqCst)
    }

    /// Download an entry into the download directory.
    ///
    /// The file name comes from the entry; an existing file is never
    /// overwritten, a numbered name like `file (1).txt` is used instead.
    pub async fn start(&self, entry: MenuEntry) -> Result<Arc<DownloadRecord>, ClientError> {
        self.ensure_running()?;

        let dir = &self.settings.download_dir;
        tokio::fs::create_dir_all(dir).await.map_err(|e| {
            ClientError::FileIo(format!("Failed to create download dir {:?}: {}", dir, e))
        })?;

        let fallback = format!("download.{}", entry.kind.extension());
        let name = sanitize_file_name(&entry.file_name_with_forced_ext(), &fallback);
        let target = reserve_unique_path(dir, &name).await?;

        self.start_to(entry, target)
    }

    /// Download an entry to an explicit path, replacing any existing file
    pub fn start_to(
        &self,
        entry: MenuEntry,
        target: PathBuf,
    ) -> Result<Arc<DownloadRecord>, ClientError> {
        self.ensure_running()?;

        // One transport per record, so cancelling one never hits another
        let transport: Arc<dyn Transport> = Arc::new(GopherTransport::new(self.runtime.clone()));
        let record = DownloadRecord::new(entry, target, transport);
        self.downloads.add(record.clone());
        record.start();
        Ok(record)
    }

    /// Restart a finished or failed download
    pub fn retry(&self, id: Uuid) -> Result<Arc<DownloadRecord>, ClientError> {
        self.ensure_running()?;
        let record = self.record(id)?;
        record.start();
        Ok(record)
    }

    /// Stop a download and drop it from the collection. The file of an
    /// interrupted transfer is deleted; a completed file is kept.
    pub async fn cancel(&self, id: Uuid) -> Result<(), ClientError> {
        let record = self.record(id)?;
        record.cancel_and_wait().await;
        self.downloads.remove(id);

        // Also covers a record cancelled directly before reaching here
        if record.was_cancelled() {
            record.delete_file()?;
        }
        Ok(())
    }

    /// Remove every download that is not running; returns how many went
    pub fn clear_finished(&self) -> usize {
        self.downloads.clear_non_active().len()
    }

    /// Cancel all running downloads, delete their partial files and empty
    /// the collection. Later calls to `start` fail with `ShutDown`.
    pub async fn shutdown(&self) {
        if self.shut_down.swap(true, Ordering::SeqCst) {
            return;
        }

        let records = self.downloads.list();
        tracing::info!("Shutting down download manager ({} downloads)", records.len());

        for record in records {
            record.cancel_and_wait().await;
            if record.was_cancelled() {
                if let Err(e) = record.delete_file() {
                    tracing::warn!("{}", e);
                }
            }
        }
        self.downloads.clear();
    }

    fn record(&self, id: Uuid) -> Result<Arc<DownloadRecord>, ClientError> {
        self.downloads
            .get(id)
            .ok_or(ClientError::DownloadNotFound(id))
    }

    fn ensure_running(&self) -> Result<(), ClientError> {
        if self.is_shut_down() {
            Err(ClientError::ShutDown)
        } else {
            Ok(())
        }
    }
}

/// Turn an entry's file name into something safe to create locally.
///
/// Selectors may carry a search query after a TAB, backslashes or other
/// characters that are not valid in file names on every platform.
fn sanitize_file_name(name: &str, fallback: &str) -> String {
    let name = name.split('\t').next().unwrap_or_default();
    let last = name.rsplit(['/', '\\']).next().unwrap_or_default();
    let cleaned: String = last
        .chars()
        .map(|c| match c {
            ':' | '*' | '?' | '"' | '<' | '>' | '|' => '_',
            c if c.is_control() => '_',
            c => c,
        })
        .collect();

    let cleaned = cleaned.trim();
    if cleaned.is_empty() || cleaned.chars().all(|c| c == '.') {
        fallback.to_string()
    } else {
        cleaned.to_string()
    }
}

/// `name (n).ext`, numbering before the last extension
fn numbered_name(base_name: &str, index: usize) -> String {
    match base_name.rsplit_once('.') {
        Some((stem, ext)) if !stem.is_empty() => format!("{} ({}).{}", stem, index, ext),
        _ => format!("{} ({})", base_name, index),
    }
}

/// Create an empty file under the first free name and return its path
async fn reserve_unique_path(dir: &Path, base_name: &str) -> Result<PathBuf, ClientError> {
    for index in 0..MAX_NAME_ATTEMPTS {
        let candidate = if index == 0 {
            base_name.to_string()
        } else {
            numbered_name(base_name, index)
        };

        let path = dir.join(&candidate);
        match OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&path)
            .await
        {
            Ok(_) => return Ok(path),
            Err(e) if e.kind() == ErrorKind::AlreadyExists => continue,
            Err(e) => {
                return Err(ClientError::FileIo(format!(
                    "Failed to create {:?}: {}",
                    path, e
                )))
            }
        }
    }

    Err(ClientError::FileIo(format!(
        "Too many files named like {} in {:?}",
        base_name, dir
    )))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sanitize_file_name() {
        assert_eq!(sanitize_file_name("report.txt", "x.dat"), "report.txt");
        assert_eq!(sanitize_file_name("../../etc/passwd", "x.dat"), "passwd");
        assert_eq!(sanitize_file_name("dir\\win.exe", "x.dat"), "win.exe");
        assert_eq!(sanitize_file_name("  ", "x.dat"), "x.dat");
        assert_eq!(sanitize_file_name("..", "x.dat"), "x.dat");
    }

    #[test]
    fn test_sanitize_gopher_selector_characters() {
        assert_eq!(sanitize_file_name("search\tquery words", "x.dat"), "search");
        assert_eq!(sanitize_file_name("a:b?c.txt", "x.dat"), "a_b_c.txt");
        assert_eq!(sanitize_file_name("bell\u{7}.bin", "x.dat"), "bell_.bin");
    }

    #[test]
    fn test_numbered_name() {
        assert_eq!(numbered_name("a.tar.gz", 1), "a.tar (1).gz");
        assert_eq!(numbered_name(".hidden", 2), ".hidden (2)");
        assert_eq!(numbered_name("plain", 3), "plain (3)");
    }

    #[tokio::test]
    async fn test_reserve_unique_path_numbers_duplicates() {
        let dir = tempfile::tempdir().unwrap();

        let first = reserve_unique_path(dir.path(), "file.txt").await.unwrap();
        let second = reserve_unique_path(dir.path(), "file.txt").await.unwrap();
        let third = reserve_unique_path(dir.path(), "file.txt").await.unwrap();

        assert_eq!(first, dir.path().join("file.txt"));
        assert_eq!(second, dir.path().join("file (1).txt"));
        assert_eq!(third, dir.path().join("file (2).txt"));
        assert!(second.exists());
    }

    #[tokio::test]
    async fn test_invalid_settings_rejected() {
        let settings = ClientSettings {
            download_dir: PathBuf::new(),
            ..ClientSettings::default()
        };
        let result = DownloadManager::new(settings, Handle::current());
        assert!(matches!(result, Err(ClientError::InvalidConfig(_))));
    }

    #[tokio::test]
    async fn test_unknown_download() {
        let dir = tempfile::tempdir().unwrap();
        let settings = ClientSettings {
            download_dir: dir.path().to_path_buf(),
            ..ClientSettings::default()
        };
        let manager = DownloadManager::new(settings, Handle::current()).unwrap();

        let id = Uuid::new_v4();
        assert!(matches!(
            manager.retry(id),
            Err(ClientError::DownloadNotFound(missing)) if missing == id
        ));
        assert!(matches!(
            manager.cancel(id).await,
            Err(ClientError::DownloadNotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_start_after_shutdown_fails() {
        let dir = tempfile::tempdir().unwrap();
        let settings = ClientSettings {
            download_dir: dir.path().to_path_buf(),
            ..ClientSettings::default()
        };
        let manager = DownloadManager::new(settings, Handle::current()).unwrap();
        manager.shutdown().await;

        let entry = MenuEntry::parse_line("9File\t/f.bin\t127.0.0.1\t70");
        assert!(matches!(
            manager.start(entry).await,
            Err(ClientError::ShutDown)
        ));
        assert!(manager.is_shut_down());
    }
}
