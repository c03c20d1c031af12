// SPDX-License-Identifier: AGPL-3.0
// Gophie Core - Settings and error types

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use uuid::Uuid;

/// Client settings (frontend-agnostic)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClientSettings {
    /// Address loaded when the client starts
    #[serde(default = "default_home_address")]
    pub home_address: String,
    /// Directory downloads are written to
    #[serde(default = "default_download_dir")]
    pub download_dir: PathBuf,
}

fn default_home_address() -> String {
    "gopher://gopher.floodgap.com".to_string()
}

fn default_download_dir() -> PathBuf {
    directories::UserDirs::new()
        .and_then(|d| d.download_dir().map(|p| p.to_path_buf()))
        .unwrap_or_else(|| PathBuf::from("."))
}

impl Default for ClientSettings {
    fn default() -> Self {
        Self {
            home_address: default_home_address(),
            download_dir: default_download_dir(),
        }
    }
}

impl ClientSettings {
    /// Check the settings before handing them to a manager
    pub fn validate(&self) -> Result<(), ClientError> {
        if self.download_dir.as_os_str().is_empty() {
            return Err(ClientError::InvalidConfig(
                "download directory must not be empty".to_string(),
            ));
        }
        Ok(())
    }

    /// Parsed home address
    pub fn home(&self) -> crate::Address {
        crate::Address::parse(&self.home_address)
    }
}

/// Failure classification reported through the transport callbacks
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ErrorKind {
    ConnectFailed,
    HostUnknown,
    Timeout,
    Other,
    UserCancelled,
}

/// Errors crossing the transport boundary
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GopherError {
    #[error("Connection refused: {0}")]
    ConnectFailed(String),

    #[error("DNS resolution failed: {0}")]
    HostUnknown(String),

    #[error("Connection timed out: {0}")]
    Timeout(String),

    #[error("Network error: {0}")]
    Other(String),

    /// Never produced by the transport itself
    #[error("Cancelled by user")]
    UserCancelled,
}

impl GopherError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::ConnectFailed(_) => ErrorKind::ConnectFailed,
            Self::HostUnknown(_) => ErrorKind::HostUnknown,
            Self::Timeout(_) => ErrorKind::Timeout,
            Self::Other(_) => ErrorKind::Other,
            Self::UserCancelled => ErrorKind::UserCancelled,
        }
    }
}

impl From<std::io::Error> for GopherError {
    fn from(err: std::io::Error) -> Self {
        use std::io::ErrorKind as IoKind;

        match err.kind() {
            IoKind::ConnectionRefused => GopherError::ConnectFailed(err.to_string()),
            IoKind::TimedOut => GopherError::Timeout(err.to_string()),
            _ => GopherError::Other(err.to_string()),
        }
    }
}

/// Errors returned by the download manager
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error("Download not found: {0}")]
    DownloadNotFound(Uuid),

    #[error("Download manager has been shut down")]
    ShutDown,

    #[error("File I/O error: {0}")]
    FileIo(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error(transparent)]
    Network(#[from] GopherError),
}

impl From<std::io::Error> for ClientError {
    fn from(err: std::io::Error) -> Self {
        ClientError::FileIo(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_settings() {
        let settings = ClientSettings::default();
        assert_eq!(settings.home_address, "gopher://gopher.floodgap.com");
        assert!(!settings.download_dir.as_os_str().is_empty());
        assert!(settings.validate().is_ok());
    }

    #[test]
    fn test_settings_missing_fields_use_defaults() {
        let settings: ClientSettings =
            serde_json::from_str(r#"{"downloadDir": "/tmp/gopher"}"#).unwrap();
        assert_eq!(settings.download_dir, PathBuf::from("/tmp/gopher"));
        assert_eq!(settings.home_address, "gopher://gopher.floodgap.com");
        assert_eq!(settings.home().host, "gopher.floodgap.com");
    }

    #[test]
    fn test_empty_download_dir_is_invalid() {
        let settings = ClientSettings {
            download_dir: PathBuf::new(),
            ..ClientSettings::default()
        };
        assert!(matches!(
            settings.validate(),
            Err(ClientError::InvalidConfig(_))
        ));
    }

    #[test]
    fn test_io_error_mapping() {
        let refused = std::io::Error::from(std::io::ErrorKind::ConnectionRefused);
        assert_eq!(GopherError::from(refused).kind(), ErrorKind::ConnectFailed);

        let timed_out = std::io::Error::from(std::io::ErrorKind::TimedOut);
        assert_eq!(GopherError::from(timed_out).kind(), ErrorKind::Timeout);

        let reset = std::io::Error::from(std::io::ErrorKind::ConnectionReset);
        assert_eq!(GopherError::from(reset).kind(), ErrorKind::Other);
    }
}
