// SPDX-License-Identifier: AGPL-3.0
// Gophie CLI - Error type

use gophie_core::{ClientError, GopherError};

#[derive(Debug, thiserror::Error)]
pub enum CliError {
    #[error(transparent)]
    Client(#[from] ClientError),

    #[error(transparent)]
    Network(#[from] GopherError),

    #[error("Failed to encode output: {0}")]
    Json(#[from] serde_json::Error),

    #[error("{0} is not a Gopher address")]
    NotGopher(String),

    #[error("Download failed: {0}")]
    DownloadFailed(String),

    #[error("Download interrupted")]
    Interrupted,
}
