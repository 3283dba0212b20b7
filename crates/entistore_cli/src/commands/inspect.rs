//! Inspect command implementation.

use entistore_codec::{Envelope, EnvelopeFormat};
use entistore_storage::{LogMapStore, StorageAdapter};
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::Path;

/// Log inspection result.
#[derive(Debug, Default, Serialize)]
pub struct InspectResult {
    /// Log path.
    pub path: String,
    /// File size in bytes.
    pub file_size: u64,
    /// Entries written since the last compaction.
    pub written_records: usize,
    /// Live entities.
    pub live_entities: usize,
    /// Entries no longer holding live state.
    pub dead_records: usize,
    /// Envelopes stored as JSON.
    pub json_envelopes: usize,
    /// Envelopes stored as CBOR.
    pub cbor_envelopes: usize,
    /// Entries that could not be decoded.
    pub undecodable: usize,
    /// Live entities per type.
    pub types: BTreeMap<String, usize>,
}

/// Runs the inspect command.
pub fn run(path: &Path, format: &str) -> Result<(), Box<dyn std::error::Error>> {
    let store = super::open_existing(path)?;
    let result = inspect(&store)?;

    match format {
        "json" => println!("{}", serde_json::to_string_pretty(&result)?),
        _ => print_text(&result),
    }
    Ok(())
}

/// Collects statistics for an open log.
pub fn inspect(store: &LogMapStore) -> Result<InspectResult, Box<dyn std::error::Error>> {
    let stats = store.stats();
    let mut result = InspectResult {
        path: store.path().display().to_string(),
        file_size: stats.file_size,
        written_records: stats.written_records,
        live_entities: stats.live_entities,
        dead_records: stats.dead_records(),
        ..InspectResult::default()
    };

    for item in store.scan_all()? {
        let bytes = item?;
        match EnvelopeFormat::detect(&bytes) {
            Some(EnvelopeFormat::Json) => result.json_envelopes += 1,
            Some(EnvelopeFormat::Cbor) => result.cbor_envelopes += 1,
            None => {}
        }
        match Envelope::decode(&bytes) {
            Ok(envelope) => *result.types.entry(envelope.entity_type).or_insert(0) += 1,
            Err(_) => result.undecodable += 1,
        }
    }
    Ok(result)
}

fn print_text(result: &InspectResult) {
    println!("EntiStore Log Inspection");
    println!("========================");
    println!("Path:             {}", result.path);
    println!("File size:        {} bytes", result.file_size);
    println!("Written records:  {}", result.written_records);
    println!("Live entities:    {}", result.live_entities);
    println!("Dead records:     {}", result.dead_records);
    println!(
        "Envelopes:        {} json, {} cbor",
        result.json_envelopes, result.cbor_envelopes
    );
    if result.undecodable > 0 {
        println!("Undecodable:      {}", result.undecodable);
    }
    if !result.types.is_empty() {
        println!();
        println!("Entity types:");
        for (name, count) in &result.types {
            println!("  {:<24} {}", name, count);
        }
    }
}
