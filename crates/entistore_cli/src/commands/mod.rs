//! CLI command implementations.

pub mod compact;
pub mod dump;
pub mod inspect;
pub mod verify;

use entistore_storage::{LogMapStore, LogStoreConfig};
use std::path::Path;

/// Opens an existing log without creating one.
pub fn open_existing(path: &Path) -> Result<LogMapStore, Box<dyn std::error::Error>> {
    if !path.exists() {
        return Err(format!("No log found at {:?}", path).into());
    }
    Ok(LogMapStore::open(
        path,
        LogStoreConfig::default().create_if_missing(false),
    )?)
}
