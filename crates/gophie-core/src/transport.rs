// SPDX-License-Identifier: AGPL-3.0
// Gophie Core - Gopher transport
//
// One TCP connection per request: write the selector, read until the
// server closes the connection. EOF is the only end-of-response signal.
// The client resolves the host itself and tries every address it gets.

use crate::address::Address;
use crate::item_type::ItemKind;
use crate::page::Page;
use crate::types::GopherError;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tokio::{
    fs::File,
    io::{AsyncReadExt, AsyncWrite, AsyncWriteExt},
    net::{lookup_host, TcpStream},
    runtime::Handle,
    task::JoinHandle,
};
use tokio_util::sync::CancellationToken;

/// Size of a single read from the connection
pub const CHUNK_SIZE: usize = 16 * 1024;

/// Successful end of an operation
#[derive(Debug, Clone)]
pub enum Loaded {
    Page(Page),
    File { path: PathBuf, bytes: u64 },
}

/// Callbacks of a transport operation.
///
/// Callbacks run on the task doing the I/O. Exactly one of `on_loaded` and
/// `on_failed` is delivered per operation unless it was cancelled, in which
/// case neither is.
pub trait TransportListener: Send + Sync {
    /// Cumulative byte count after every chunk
    fn on_progress(&self, _address: &Address, _bytes: u64) {}

    fn on_loaded(&self, result: Loaded);

    fn on_failed(&self, error: GopherError, address: &Address);
}

/// Handle to a running asynchronous operation
#[derive(Debug)]
pub struct OperationHandle {
    token: CancellationToken,
    task: Option<JoinHandle<()>>,
}

impl OperationHandle {
    pub fn new(token: CancellationToken, task: Option<JoinHandle<()>>) -> Self {
        Self { token, task }
    }

    /// Stop the operation; no terminal callback will follow
    pub fn cancel(&self) {
        self.token.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    pub fn is_finished(&self) -> bool {
        self.task.as_ref().map_or(true, |task| task.is_finished())
    }

    /// Wait for the worker to exit, including callback delivery
    pub async fn finished(mut self) {
        if let Some(task) = self.task.take() {
            if let Err(e) = task.await {
                tracing::error!("Transport task ended abnormally: {}", e);
            }
        }
    }
}

/// Asynchronous operations of a transport
pub trait Transport: Send + Sync {
    /// Fetch a page on a separate task
    fn fetch_async(
        &self,
        address: Address,
        expected_kind: ItemKind,
        listener: Arc<dyn TransportListener>,
    ) -> OperationHandle;

    /// Stream a resource into `target` on a separate task
    fn download_async(
        &self,
        address: Address,
        target: PathBuf,
        listener: Arc<dyn TransportListener>,
    ) -> OperationHandle;

    /// Cancel the most recently started operation
    fn cancel(&self);
}

/// Why a transfer stopped early
enum Interrupted {
    Cancelled,
    Failed(GopherError),
}

impl From<GopherError> for Interrupted {
    fn from(err: GopherError) -> Self {
        Interrupted::Failed(err)
    }
}

impl From<std::io::Error> for Interrupted {
    fn from(err: std::io::Error) -> Self {
        Interrupted::Failed(err.into())
    }
}

/// Gopher client transport.
///
/// Only the most recently started operation is tracked for `cancel()`;
/// earlier overlapping operations keep running and can only be stopped
/// through their own `OperationHandle`.
pub struct GopherTransport {
    runtime: Handle,
    current: Mutex<Option<CancellationToken>>,
}

impl GopherTransport {
    pub fn new(runtime: Handle) -> Self {
        Self {
            runtime,
            current: Mutex::new(None),
        }
    }

    /// Fetch a page and wait for it.
    ///
    /// Dropping the returned future aborts the request.
    pub async fn fetch(
        &self,
        address: &Address,
        expected_kind: ItemKind,
        listener: Option<&dyn TransportListener>,
    ) -> Result<Page, GopherError> {
        let token = CancellationToken::new();
        let mut buffer = Vec::new();

        match transfer(address, &mut buffer, &token, listener).await {
            Ok(bytes) => {
                tracing::info!("Fetched {} ({} bytes)", address, bytes);
                Ok(Page::new(buffer, expected_kind, address.clone()))
            }
            Err(Interrupted::Failed(err)) => {
                tracing::warn!("Fetch failed ({}): {}", address, err);
                Err(err)
            }
            // The token above is never cancelled
            Err(Interrupted::Cancelled) => Err(GopherError::UserCancelled),
        }
    }

    /// Register a new operation as the one `cancel()` applies to
    fn track(&self) -> CancellationToken {
        let token = CancellationToken::new();
        *self.current.lock().unwrap() = Some(token.clone());
        token
    }
}

impl Transport for GopherTransport {
    fn fetch_async(
        &self,
        address: Address,
        expected_kind: ItemKind,
        listener: Arc<dyn TransportListener>,
    ) -> OperationHandle {
        let token = self.track();
        let task_token = token.clone();

        let task = self.runtime.spawn(async move {
            let mut buffer = Vec::new();
            let result = until_cancelled(
                &task_token,
                transfer(&address, &mut buffer, &task_token, Some(listener.as_ref())),
            )
            .await;

            match result {
                Ok(bytes) if !task_token.is_cancelled() => {
                    tracing::info!("Fetched {} ({} bytes)", address, bytes);
                    let page = Page::new(buffer, expected_kind, address);
                    listener.on_loaded(Loaded::Page(page));
                }
                Err(Interrupted::Failed(err)) if !task_token.is_cancelled() => {
                    tracing::warn!("Fetch failed ({}): {}", address, err);
                    listener.on_failed(err, &address);
                }
                _ => tracing::debug!("Fetch cancelled: {}", address),
            }
        });

        OperationHandle::new(token, Some(task))
    }

    fn download_async(
        &self,
        address: Address,
        target: PathBuf,
        listener: Arc<dyn TransportListener>,
    ) -> OperationHandle {
        let token = self.track();
        let task_token = token.clone();

        let task = self.runtime.spawn(async move {
            let result = until_cancelled(
                &task_token,
                download(&address, &target, &task_token, listener.as_ref()),
            )
            .await;

            match result {
                Ok(bytes) if !task_token.is_cancelled() => {
                    tracing::info!("Downloaded {} to {:?} ({} bytes)", address, target, bytes);
                    listener.on_loaded(Loaded::File {
                        path: target,
                        bytes,
                    });
                }
                Err(Interrupted::Failed(err)) => {
                    tracing::warn!("Download failed ({}): {}", address, err);
                    remove_partial_file(&target).await;
                    if !task_token.is_cancelled() {
                        listener.on_failed(err, &address);
                    }
                }
                // The owner of the download decides what happens to the file
                _ => tracing::debug!("Download cancelled: {}", address),
            }
        });

        OperationHandle::new(token, Some(task))
    }

    fn cancel(&self) {
        if let Some(token) = self.current.lock().unwrap().as_ref() {
            token.cancel();
        }
    }
}

/// Race an operation against its cancellation token
async fn until_cancelled<T, F>(token: &CancellationToken, operation: F) -> Result<T, Interrupted>
where
    F: std::future::Future<Output = Result<T, Interrupted>>,
{
    tokio::select! {
        biased;
        _ = token.cancelled() => Err(Interrupted::Cancelled),
        result = operation => result,
    }
}

async fn download(
    address: &Address,
    target: &Path,
    token: &CancellationToken,
    listener: &dyn TransportListener,
) -> Result<u64, Interrupted> {
    let mut file = File::create(target).await?;
    let bytes = transfer(address, &mut file, token, Some(listener)).await?;
    file.sync_all().await?;
    Ok(bytes)
}

/// Connect, send the request and copy the response into `sink`
async fn transfer<W>(
    address: &Address,
    sink: &mut W,
    token: &CancellationToken,
    listener: Option<&dyn TransportListener>,
) -> Result<u64, Interrupted>
where
    W: AsyncWrite + Unpin,
{
    let mut stream = connect(address).await?;
    stream.write_all(&address.request_line()).await?;
    stream.flush().await?;

    let mut chunk = vec![0u8; CHUNK_SIZE];
    let mut total: u64 = 0;

    loop {
        if token.is_cancelled() {
            return Err(Interrupted::Cancelled);
        }

        let read = stream.read(&mut chunk).await?;
        if read == 0 {
            break;
        }

        sink.write_all(&chunk[..read]).await?;
        total += read as u64;

        if !token.is_cancelled() {
            if let Some(listener) = listener {
                listener.on_progress(address, total);
            }
        }
    }

    sink.flush().await?;
    Ok(total)
}

/// Resolve the host and try each address in turn
async fn connect(address: &Address) -> Result<TcpStream, GopherError> {
    if address.host.is_empty() {
        return Err(GopherError::HostUnknown(format!(
            "no host in address {}",
            address
        )));
    }

    let candidates: Vec<_> = lookup_host((address.host.as_str(), address.port))
        .await
        .map_err(|e| GopherError::HostUnknown(format!("{}: {}", address.host, e)))?
        .collect();

    if candidates.is_empty() {
        return Err(GopherError::HostUnknown(format!(
            "{}: no IP addresses found",
            address.host
        )));
    }
    tracing::debug!("Resolved {} to {:?}", address.host, candidates);

    let mut last_error = None;
    for candidate in candidates {
        match TcpStream::connect(candidate).await {
            Ok(stream) => {
                tracing::debug!("Connected to {} for {}", candidate, address);
                return Ok(stream);
            }
            Err(e) => {
                tracing::debug!("Connection to {} failed: {}", candidate, e);
                last_error = Some(e);
            }
        }
    }

    Err(last_error.map(GopherError::from).unwrap_or_else(|| {
        GopherError::ConnectFailed(format!("{}:{}", address.host, address.port))
    }))
}

async fn remove_partial_file(target: &Path) {
    match tokio::fs::remove_file(target).await {
        Ok(()) => tracing::debug!("Removed partial download {:?}", target),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => tracing::warn!("Failed to remove partial download {:?}: {}", target, e),
    }
}
