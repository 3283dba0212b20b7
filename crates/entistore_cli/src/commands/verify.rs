//! Verify command implementation.

use entistore_codec::Envelope;
use entistore_storage::{LogMapStore, StorageAdapter};
use std::collections::HashSet;
use std::path::Path;

/// Verification result.
#[derive(Debug, Default)]
pub struct VerifyResult {
    /// Entries checked.
    pub checked: usize,
    /// Problems found, one line each.
    pub problems: Vec<String>,
}

impl VerifyResult {
    /// Whether no problem was found.
    pub fn is_ok(&self) -> bool {
        self.problems.is_empty()
    }
}

/// Runs the verify command.
pub fn run(path: &Path) -> Result<(), Box<dyn std::error::Error>> {
    let store = super::open_existing(path)?;
    println!("Verifying log at {:?}", path);

    let result = verify(&store)?;
    println!("  Entries checked: {}", result.checked);
    for problem in &result.problems {
        println!("  ERROR: {}", problem);
    }

    if result.is_ok() {
        println!("Verification passed.");
        Ok(())
    } else {
        Err(format!("Verification failed with {} problem(s)", result.problems.len()).into())
    }
}

/// Decodes every entry, checking identities are present and unique.
pub fn verify(store: &LogMapStore) -> Result<VerifyResult, Box<dyn std::error::Error>> {
    let mut result = VerifyResult::default();
    let mut seen = HashSet::new();

    for (i, item) in store.scan_all()?.enumerate() {
        result.checked += 1;
        let bytes = match item {
            Ok(bytes) => bytes,
            Err(e) => {
                result.problems.push(format!("entry {i}: unreadable: {e}"));
                continue;
            }
        };
        match Envelope::decode(&bytes) {
            Ok(envelope) if envelope.identity.trim().is_empty() => {
                result.problems.push(format!("entry {i}: blank identity"));
            }
            Ok(envelope) => {
                if !seen.insert(envelope.identity.clone()) {
                    result
                        .problems
                        .push(format!("entry {i}: duplicate identity '{}'", envelope.identity));
                }
            }
            Err(e) => result.problems.push(format!("entry {i}: {e}")),
        }
    }
    Ok(result)
}
