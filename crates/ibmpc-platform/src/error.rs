use std::path::PathBuf;

use thiserror::Error;

/// Host-side failures while bringing the chipset up.
///
/// Nothing the guest does produces one of these; guest misprogramming is absorbed by the device
/// models.
#[derive(Debug, Error)]
pub enum ChipsetError {
    #[error("failed to read config {path}: {source}")]
    ConfigIo {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed config: {0}")]
    ConfigParse(#[from] serde_json::Error),

    #[error("invalid config: {0}")]
    InvalidConfig(String),

    #[error("host timer unavailable: {0}")]
    HostTimer(String),
}

pub type Result<T, E = ChipsetError> = std::result::Result<T, E>;
