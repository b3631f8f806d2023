//! Transformations producing new collection files.

use crate::error::Result;
use crate::store::{collection_name, write_records};
use crate::types::Record;
use std::collections::HashSet;
use std::num::NonZeroUsize;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Result of merging two collections.
#[derive(Clone, Debug, Default)]
pub struct MergeOutcome {
    pub records: Vec<Record>,
    /// Ids from the second collection that were already present.
    pub skipped: Vec<String>,
}

/// Append `second` to `first`, dropping records whose id is already taken.
///
/// Records without an id are always kept.
pub fn merge_records(first: Vec<Record>, second: Vec<Record>) -> MergeOutcome {
    let mut seen: HashSet<String> = first.iter().filter_map(Record::id_key).collect();
    let mut outcome = MergeOutcome {
        records: first,
        skipped: Vec::new(),
    };

    for record in second {
        match record.id_key() {
            Some(id) if !seen.insert(id.clone()) => {
                warn!(id = %id, "skipping duplicate id during merge");
                outcome.skipped.push(id);
            }
            _ => outcome.records.push(record),
        }
    }

    outcome
}

/// Chunks of at most `size` records, in order.
pub fn split_records(records: &[Record], size: NonZeroUsize) -> impl Iterator<Item = &[Record]> {
    records.chunks(size.get())
}

/// Write `records` as `<stem>_<k>.json` files (k from 1) into `out_dir`.
///
/// Returns the written paths. An empty collection writes nothing.
pub fn write_chunks(
    source: &Path,
    records: &[Record],
    size: NonZeroUsize,
    out_dir: &Path,
) -> Result<Vec<PathBuf>> {
    std::fs::create_dir_all(out_dir)?;
    let stem = collection_name(source);

    let mut written = Vec::new();
    for (k, chunk) in split_records(records, size).enumerate() {
        let path = out_dir.join(format!("{}_{}.json", stem, k + 1));
        write_records(&path, chunk, true)?;
        written.push(path);
    }

    info!(
        source = %source.display(),
        chunks = written.len(),
        "split collection"
    );
    Ok(written)
}

/// Render a collection as YAML.
pub fn to_yaml(records: &[Record]) -> Result<String> {
    Ok(serde_yaml::to_string(records)?)
}
