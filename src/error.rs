//! Error types shared by the picker core.

use thiserror::Error;

/// Failures while turning a user-selected file into a displayed raster.
#[derive(Debug, Error)]
pub enum LoadError {
    /// The selected or dropped file is not an image.
    #[error("not an image file: {0}")]
    InvalidFileType(String),

    /// The bytes could not be decoded as an image.
    #[error("image decode failed: {0}")]
    DecodeFailure(#[from] image::ImageError),

    /// The file itself could not be read.
    #[error("file read failed: {0}")]
    ReadFailure(#[from] std::io::Error),
}

impl LoadError {
    /// Message-catalog key for the alert shown to the user.
    pub fn alert_key(&self) -> &'static str {
        match self {
            LoadError::InvalidFileType(_) => "alert.invalid_file_type",
            LoadError::DecodeFailure(_) => "alert.decode_failed",
            LoadError::ReadFailure(_) => "alert.read_failed",
        }
    }
}

/// Failures of the key-value persistence substrate.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("storage I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The write would exceed the store's capacity.
    #[error("storage quota exceeded: {needed} bytes needed, {quota} available")]
    QuotaExceeded { needed: usize, quota: usize },

    /// Key contains characters the backend cannot store.
    #[error("invalid storage key: {0}")]
    InvalidKey(String),
}

/// Failures reading or writing the persisted history records.
#[derive(Debug, Error)]
pub enum HistoryError {
    #[error("history storage failed: {0}")]
    Storage(#[from] StorageError),

    /// A stored record is not valid JSON for its list.
    #[error("history record '{key}' is corrupt: {source}")]
    Corrupt {
        key: &'static str,
        source: serde_json::Error,
    },

    #[error("history encode failed: {0}")]
    Encode(#[source] serde_json::Error),
}

/// Failures writing to the system clipboard.
#[derive(Debug, Error)]
pub enum ClipboardError {
    #[error("clipboard unavailable: {0}")]
    Unavailable(String),

    #[error("clipboard write failed: {0}")]
    Write(String),
}
