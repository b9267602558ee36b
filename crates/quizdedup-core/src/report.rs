use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;

use serde::Serialize;
use tracing::warn;

use crate::finder::{DuplicatePair, find_duplicates};
use crate::models::{Difficulty, QuizRecord};

const UNDEFINED: &str = "não definido";

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CountEntry {
    pub label: String,
    pub count: usize,
    pub percent: f64,
}

/// Statistics over a final collection plus the duplicates that still
/// score above the verification threshold.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Report {
    pub total: usize,
    pub by_type: Vec<CountEntry>,
    pub by_difficulty: Vec<CountEntry>,
    pub by_category: Vec<CountEntry>,
    pub needs_review: Vec<u64>,
    pub verification_threshold: f64,
    pub remaining: Vec<DuplicatePair>,
    /// Records with more options than the configured maximum.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub over_option_limit: Vec<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_options: Option<usize>,
    #[serde(skip)]
    listing_limit: usize,
}

impl Report {
    pub fn build(records: &[QuizRecord], verification_threshold: f64) -> Self {
        let total = records.len();
        let mut by_type: BTreeMap<String, usize> = BTreeMap::new();
        let mut by_category: BTreeMap<String, usize> = BTreeMap::new();
        let mut by_difficulty: BTreeMap<Option<Difficulty>, usize> = BTreeMap::new();
        let mut needs_review = Vec::new();

        for (idx, record) in records.iter().enumerate() {
            let kind = record
                .kind
                .as_ref()
                .map_or_else(|| UNDEFINED.to_string(), |k| k.to_string());
            *by_type.entry(kind).or_default() += 1;

            let category = record
                .category
                .clone()
                .unwrap_or_else(|| UNDEFINED.to_string());
            *by_category.entry(category).or_default() += 1;

            *by_difficulty.entry(record.difficulty.clone()).or_default() += 1;

            if record.needs_review() {
                needs_review.push(record.key_at(idx));
            }
        }

        let mut difficulty_entries: Vec<CountEntry> = Difficulty::ALL
            .into_iter()
            .map(|d| {
                let count = by_difficulty.get(&Some(d.clone())).copied().unwrap_or(0);
                entry(d.label(), count, total)
            })
            .collect();
        for (difficulty, &count) in &by_difficulty {
            if let Some(other @ Difficulty::Other(_)) = difficulty {
                difficulty_entries.push(entry(other.label(), count, total));
            }
        }
        if let Some(&undefined) = by_difficulty.get(&None) {
            difficulty_entries.push(entry(UNDEFINED, undefined, total));
        }

        Self {
            total,
            by_type: to_entries(by_type, total),
            by_difficulty: difficulty_entries,
            by_category: to_entries(by_category, total),
            needs_review,
            verification_threshold,
            remaining: find_duplicates(records, verification_threshold),
            over_option_limit: Vec::new(),
            max_options: None,
            listing_limit: 10,
        }
    }

    /// Flag records in `records` carrying more than `max_options` options.
    pub fn with_option_limit(mut self, records: &[QuizRecord], max_options: usize) -> Self {
        self.over_option_limit = records
            .iter()
            .enumerate()
            .filter(|(_, record)| record.options.as_ref().is_some_and(|o| o.len() > max_options))
            .map(|(idx, record)| record.key_at(idx))
            .collect();
        if !self.over_option_limit.is_empty() {
            warn!(
                count = self.over_option_limit.len(),
                max_options, "records exceed the option limit; run normalize to trim them"
            );
        }
        self.max_options = Some(max_options);
        self
    }

    /// How many remaining pairs the text rendering lists.
    pub fn with_listing_limit(mut self, limit: usize) -> Self {
        self.listing_limit = limit;
        self
    }

    pub fn converged(&self) -> bool {
        self.remaining.is_empty()
    }
}

fn percent(count: usize, total: usize) -> f64 {
    if total == 0 {
        return 0.0;
    }
    count as f64 * 100.0 / total as f64
}

fn entry(label: &str, count: usize, total: usize) -> CountEntry {
    CountEntry {
        label: label.to_string(),
        count,
        percent: percent(count, total),
    }
}

fn to_entries(counts: BTreeMap<String, usize>, total: usize) -> Vec<CountEntry> {
    counts
        .into_iter()
        .map(|(label, count)| entry(&label, count, total))
        .collect()
}

impl fmt::Display for Report {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Total questions: {}", self.total)?;

        writeln!(f, "\nBy type:")?;
        for e in &self.by_type {
            writeln!(f, "  {}: {}", e.label, e.count)?;
        }

        writeln!(f, "\nBy difficulty:")?;
        for e in &self.by_difficulty {
            writeln!(f, "  {}: {} ({:.1}%)", e.label, e.count, e.percent)?;
        }

        writeln!(f, "\nBy category:")?;
        for e in &self.by_category {
            writeln!(f, "  {}: {} ({:.1}%)", e.label, e.count, e.percent)?;
        }

        if !self.needs_review.is_empty() {
            let ids: Vec<String> = self.needs_review.iter().map(u64::to_string).collect();
            writeln!(f, "\nNeed manual review: {}", ids.join(", "))?;
        }

        if let Some(max) = self.max_options
            && !self.over_option_limit.is_empty()
        {
            let ids: Vec<String> = self.over_option_limit.iter().map(u64::to_string).collect();
            writeln!(f, "\nMore than {max} options: {}", ids.join(", "))?;
        }

        if self.remaining.is_empty() {
            writeln!(
                f,
                "\nNo duplicates left above {:.0}% similarity.",
                self.verification_threshold
            )?;
        } else {
            writeln!(
                f,
                "\n{} pairs still above {:.0}% similarity:",
                self.remaining.len(),
                self.verification_threshold
            )?;
            for pair in self.remaining.iter().take(self.listing_limit) {
                writeln!(f, "  ID {} vs ID {}: {:.1}%", pair.first, pair.second, pair.score)?;
            }
            if self.remaining.len() > self.listing_limit {
                writeln!(f, "  ... and {} more", self.remaining.len() - self.listing_limit)?;
            }
        }
        Ok(())
    }
}

/// Counts for one rewrite pass.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RunSummary {
    pub original: usize,
    pub removed: usize,
    pub merged: usize,
    pub skipped: usize,
    pub remaining: usize,
    pub reduction_pct: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub backup_path: Option<PathBuf>,
}

impl RunSummary {
    pub fn new(original: usize, removed: usize, merged: usize, skipped: usize) -> Self {
        Self {
            original,
            removed,
            merged,
            skipped,
            remaining: original.saturating_sub(removed),
            reduction_pct: percent(removed, original),
            backup_path: None,
        }
    }

    pub fn with_backup(mut self, path: PathBuf) -> Self {
        self.backup_path = Some(path);
        self
    }
}

impl fmt::Display for RunSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "  Original questions:  {}", self.original)?;
        writeln!(f, "  Removed duplicates:  {}", self.removed)?;
        writeln!(f, "  Merged into keepers: {}", self.merged)?;
        if self.skipped > 0 {
            writeln!(f, "  Skipped decisions:   {}", self.skipped)?;
        }
        writeln!(f, "  Final questions:     {}", self.remaining)?;
        writeln!(f, "  Reduction:           {:.1}%", self.reduction_pct)?;
        if let Some(path) = &self.backup_path {
            writeln!(f, "  Backup saved to:     {}", path.display())?;
        }
        Ok(())
    }
}
