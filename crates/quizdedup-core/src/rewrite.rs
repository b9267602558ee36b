use std::collections::{BTreeSet, HashMap};

use serde::Serialize;
use tracing::{debug, warn};

use crate::models::QuizRecord;
use crate::resolution::{FieldMerge, merge_best_fields};

/// Old key → new id for every surviving record, in collection order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct IdMap {
    entries: Vec<(u64, u64)>,
}

impl IdMap {
    pub fn translate(&self, old: u64) -> Option<u64> {
        self.entries
            .iter()
            .find(|(from, _)| *from == old)
            .map(|(_, to)| *to)
    }

    pub fn iter(&self) -> impl Iterator<Item = (u64, u64)> + '_ {
        self.entries.iter().copied()
    }

    /// Only the entries whose id actually changed.
    pub fn changed(&self) -> impl Iterator<Item = (u64, u64)> + '_ {
        self.iter().filter(|(from, to)| from != to)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MergeOutcome {
    pub keeper: u64,
    pub loser: u64,
    pub fields: Vec<&'static str>,
}

/// Result of one rewrite pass.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Rewrite {
    pub records: Vec<QuizRecord>,
    pub renumbered: IdMap,
    pub removed: Vec<QuizRecord>,
    pub merged: Vec<MergeOutcome>,
}

/// Apply `merges`, drop every record whose key is in `removals`, and
/// renumber the survivors to `1..=N` in their original order.
///
/// The input is left untouched.
pub fn rewrite(records: &[QuizRecord], removals: &BTreeSet<u64>, merges: &[FieldMerge]) -> Rewrite {
    let mut working: Vec<QuizRecord> = records.to_vec();
    let positions: HashMap<u64, usize> = records
        .iter()
        .enumerate()
        .map(|(idx, record)| (record.key_at(idx), idx))
        .collect();

    let mut merged = Vec::with_capacity(merges.len());
    for merge in merges {
        let (Some(&keeper_idx), Some(&loser_idx)) =
            (positions.get(&merge.keeper), positions.get(&merge.loser))
        else {
            warn!(keeper = merge.keeper, loser = merge.loser, "merge names a missing record, skipped");
            continue;
        };
        let loser = records[loser_idx].clone();
        let fields = merge_best_fields(&mut working[keeper_idx], &loser);
        debug!(keeper = merge.keeper, loser = merge.loser, ?fields, "merged fields");
        merged.push(MergeOutcome {
            keeper: merge.keeper,
            loser: merge.loser,
            fields,
        });
    }

    let mut survivors = Vec::with_capacity(working.len());
    let mut removed = Vec::new();
    let mut entries = Vec::with_capacity(working.len());

    for (idx, mut record) in working.into_iter().enumerate() {
        let key = record.key_at(idx);
        if removals.contains(&key) {
            removed.push(record);
            continue;
        }
        let new_id = survivors.len() as u64 + 1;
        record.id = Some(new_id);
        entries.push((key, new_id));
        survivors.push(record);
    }

    Rewrite {
        records: survivors,
        renumbered: IdMap { entries },
        removed,
        merged,
    }
}
