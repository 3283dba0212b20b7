//! Dump command implementation.

use entistore_codec::Envelope;
use entistore_storage::{LogMapStore, StorageAdapter};
use std::io::{self, Write};
use std::path::Path;

/// Runs the dump command.
pub fn run(
    path: &Path,
    limit: Option<usize>,
    entity_type: Option<&str>,
) -> Result<(), Box<dyn std::error::Error>> {
    let store = super::open_existing(path)?;
    let stdout = io::stdout();
    let mut out = stdout.lock();
    let printed = dump(&store, &mut out, limit, entity_type)?;
    tracing::debug!(printed, "dump finished");
    Ok(())
}

/// Writes each matching envelope as one JSON line, returning how many
/// were written. Undecodable entries are skipped with a warning.
pub fn dump(
    store: &LogMapStore,
    out: &mut dyn Write,
    limit: Option<usize>,
    entity_type: Option<&str>,
) -> Result<usize, Box<dyn std::error::Error>> {
    let mut printed = 0;
    for item in store.scan_all()? {
        if limit.is_some_and(|limit| printed >= limit) {
            break;
        }
        let bytes = item?;
        let envelope = match Envelope::decode(&bytes) {
            Ok(envelope) => envelope,
            Err(e) => {
                tracing::warn!(error = %e, "skipping undecodable entry");
                continue;
            }
        };
        if entity_type.is_some_and(|t| t != envelope.entity_type) {
            continue;
        }
        writeln!(out, "{}", envelope.to_json()?)?;
        printed += 1;
    }
    Ok(printed)
}
