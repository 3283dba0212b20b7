//! Compact command implementation.

use std::path::Path;

/// Runs the compact command.
pub fn run(path: &Path, dry_run: bool) -> Result<(), Box<dyn std::error::Error>> {
    let store = super::open_existing(path)?;
    let stats = store.stats();

    println!("Compacting log at {:?}", path);
    if dry_run {
        println!("(dry run - no changes will be made)");
    }
    println!();
    println!("Compaction Analysis:");
    println!("  Written records: {}", stats.written_records);
    println!("  Live entities:   {}", stats.live_entities);
    println!("  Dead records:    {}", stats.dead_records());
    println!("  Size before:     {} bytes", stats.file_size);

    if dry_run {
        return Ok(());
    }

    let result = store.compact()?;
    println!("  Size after:      {} bytes", result.bytes_after);
    println!(
        "  Space saved:     {} bytes ({:.1}%)",
        result.bytes_before.saturating_sub(result.bytes_after),
        if result.bytes_before > 0 {
            (result.bytes_before.saturating_sub(result.bytes_after) as f64
                / result.bytes_before as f64)
                * 100.0
        } else {
            0.0
        }
    );
    println!();
    println!("Compaction complete.");
    Ok(())
}
