use crate::error::StoreError;
use crate::models::{ListingId, ListingRecord};
use crate::store::RecordStore;
use std::collections::HashMap;
use tracing::{debug, info};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReconcileSummary {
    pub inserted: usize,
    pub replaced: usize,
    /// Records dropped because a later record in the same batch had the same id.
    pub duplicates_in_batch: usize,
}

/// Keeps the last record for each id, in order of first appearance.
pub fn dedupe_batch(batch: Vec<ListingRecord>) -> (Vec<ListingRecord>, usize) {
    let mut positions: HashMap<ListingId, usize> = HashMap::new();
    let mut unique: Vec<ListingRecord> = Vec::with_capacity(batch.len());
    let mut duplicates = 0;

    for record in batch {
        match positions.get(&record.id) {
            Some(&index) => {
                debug!("Listing {} appears more than once, keeping the later one", record.id);
                unique[index] = record;
                duplicates += 1;
            }
            None => {
                positions.insert(record.id.clone(), unique.len());
                unique.push(record);
            }
        }
    }

    (unique, duplicates)
}

/// Merges a freshly extracted batch into the store. Afterwards every id in
/// the batch has exactly one stored record, holding the batch's values.
/// Running it again with the same batch leaves the store unchanged.
pub fn reconcile<S: RecordStore + ?Sized>(
    batch: Vec<ListingRecord>,
    store: &mut S,
) -> Result<ReconcileSummary, StoreError> {
    let (records, duplicates_in_batch) = dedupe_batch(batch);

    let mut summary = ReconcileSummary {
        duplicates_in_batch,
        ..ReconcileSummary::default()
    };
    for record in &records {
        if store.get(&record.id)?.is_some() {
            summary.replaced += 1;
        } else {
            summary.inserted += 1;
        }
    }

    store.replace_batch(&records)?;

    info!(
        "Reconciled {} listings: {} new, {} replaced",
        records.len(),
        summary.inserted,
        summary.replaced
    );
    Ok(summary)
}
