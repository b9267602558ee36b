use std::collections::{BTreeSet, HashMap, HashSet};
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::error::{QuizError, Result};
use crate::models::QuizRecord;
use crate::similarity::similarity;

/// How far the current score of a pair may fall from the score recorded
/// with its resolution before the entry is treated as stale.
pub const SCORE_TOLERANCE: f64 = 15.0;

/// What to do with the losing record of a curated duplicate pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Action {
    /// Remove the loser; the keeper is left untouched.
    #[serde(rename = "drop", alias = "remover", alias = "remove")]
    Drop,
    /// Copy the loser's better free-text fields onto the keeper, then remove it.
    #[serde(rename = "merge", alias = "mesclar", alias = "merge_then_drop")]
    MergeThenDrop,
}

impl std::fmt::Display for Action {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Drop => write!(f, "drop"),
            Self::MergeThenDrop => write!(f, "merge"),
        }
    }
}

/// One operator decision: `loser` goes away, `keeper` survives.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Resolution {
    pub loser: u64,
    pub keeper: u64,
    #[serde(default = "default_action")]
    pub action: Action,
    /// Similarity observed when the decision was made. When present, the
    /// entry is skipped if the current texts no longer score close to it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub similarity: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
}

fn default_action() -> Action {
    Action::Drop
}

impl Resolution {
    pub fn new(loser: u64, keeper: u64, action: Action) -> Self {
        Self {
            loser,
            keeper,
            action,
            similarity: None,
            note: None,
        }
    }
}

/// A record to flag for manual review. The record's content is never changed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReviewRequest {
    pub id: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

/// Curated decisions file:
///
/// ```toml
/// [[resolution]]
/// loser = 151
/// keeper = 130
/// action = "drop"
///
/// [[review]]
/// id = 92
/// reason = "contraindication looks wrong"
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ResolutionList {
    #[serde(default, rename = "resolution")]
    pub resolutions: Vec<Resolution>,
    #[serde(default, rename = "review")]
    pub reviews: Vec<ReviewRequest>,
}

impl ResolutionList {
    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(QuizError::Config(format!(
                "resolutions file not found: {}",
                path.display()
            )));
        }
        let contents = std::fs::read_to_string(path)?;
        Ok(toml::from_str(&contents)?)
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        let toml_str = toml::to_string_pretty(self)?;
        std::fs::write(path, toml_str)?;
        Ok(())
    }

    pub fn is_empty(&self) -> bool {
        self.resolutions.is_empty() && self.reviews.is_empty()
    }
}

/// Why a resolution entry was not applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "id", rename_all = "snake_case")]
pub enum Conflict {
    UnknownId(u64),
    SelfPair,
    KeeperAlreadyRemoved,
    LoserIsKeeper,
    AlreadyRemoved,
    ScoreMismatch,
}

impl std::fmt::Display for Conflict {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::UnknownId(id) => write!(f, "id {id} does not exist"),
            Self::SelfPair => write!(f, "loser and keeper are the same record"),
            Self::KeeperAlreadyRemoved => {
                write!(f, "keeper is already scheduled for removal")
            }
            Self::LoserIsKeeper => write!(f, "loser is already a keeper for another pair"),
            Self::AlreadyRemoved => write!(f, "loser is already scheduled for removal"),
            Self::ScoreMismatch => {
                write!(f, "texts no longer match the recorded similarity")
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SkippedResolution {
    pub resolution: Resolution,
    pub conflict: Conflict,
}

/// Keeper receives the better free-text fields of loser.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct FieldMerge {
    pub keeper: u64,
    pub loser: u64,
}

/// Removal and merge sets derived from a resolution list.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ResolutionPlan {
    pub removals: BTreeSet<u64>,
    pub merges: Vec<FieldMerge>,
    pub applied: Vec<Resolution>,
    pub skipped: Vec<SkippedResolution>,
}

impl ResolutionPlan {
    pub fn is_empty(&self) -> bool {
        self.removals.is_empty() && self.merges.is_empty()
    }
}

/// Turns curated decisions into a conflict-free plan.
///
/// The policy never decides which record is better; it only validates the
/// decisions it is given and knows how to merge once told.
#[derive(Debug, Clone, Default)]
pub struct ResolutionPolicy {
    resolutions: Vec<Resolution>,
}

impl ResolutionPolicy {
    pub fn new(resolutions: Vec<Resolution>) -> Self {
        Self { resolutions }
    }

    pub fn plan(&self, records: &[QuizRecord]) -> ResolutionPlan {
        let known: HashMap<u64, &QuizRecord> = records
            .iter()
            .enumerate()
            .map(|(idx, record)| (record.key_at(idx), record))
            .collect();

        let mut plan = ResolutionPlan::default();
        let mut keepers: HashSet<u64> = HashSet::new();

        for resolution in &self.resolutions {
            if let Some(conflict) = check_conflict(resolution, &known, &plan.removals, &keepers) {
                warn!(
                    loser = resolution.loser,
                    keeper = resolution.keeper,
                    "skipping resolution: {conflict}"
                );
                plan.skipped.push(SkippedResolution {
                    resolution: resolution.clone(),
                    conflict,
                });
                continue;
            }

            plan.removals.insert(resolution.loser);
            keepers.insert(resolution.keeper);
            if resolution.action == Action::MergeThenDrop {
                plan.merges.push(FieldMerge {
                    keeper: resolution.keeper,
                    loser: resolution.loser,
                });
            }
            plan.applied.push(resolution.clone());
        }

        info!(
            removals = plan.removals.len(),
            merges = plan.merges.len(),
            skipped = plan.skipped.len(),
            "resolution plan ready"
        );
        plan
    }
}

fn check_conflict(
    resolution: &Resolution,
    known: &HashMap<u64, &QuizRecord>,
    removals: &BTreeSet<u64>,
    keepers: &HashSet<u64>,
) -> Option<Conflict> {
    if resolution.loser == resolution.keeper {
        return Some(Conflict::SelfPair);
    }
    for id in [resolution.loser, resolution.keeper] {
        if !known.contains_key(&id) {
            return Some(Conflict::UnknownId(id));
        }
    }
    if removals.contains(&resolution.keeper) {
        return Some(Conflict::KeeperAlreadyRemoved);
    }
    if keepers.contains(&resolution.loser) {
        return Some(Conflict::LoserIsKeeper);
    }
    if removals.contains(&resolution.loser) {
        return Some(Conflict::AlreadyRemoved);
    }
    if let Some(recorded) = resolution.similarity
        && let (Some(loser), Some(keeper)) = (known.get(&resolution.loser), known.get(&resolution.keeper))
        && loser.has_text()
        && keeper.has_text()
    {
        let actual = similarity(&loser.question_text, &keeper.question_text);
        if (actual - recorded).abs() > SCORE_TOLERANCE {
            warn!(
                loser = resolution.loser,
                keeper = resolution.keeper,
                recorded,
                actual,
                "pair no longer scores as recorded; were the ids renumbered?"
            );
            return Some(Conflict::ScoreMismatch);
        }
    }
    None
}

/// Copy `explanation` and `hint` from `loser` when they are longer than
/// the keeper's. Returns the names of the fields that changed.
pub fn merge_best_fields(keeper: &mut QuizRecord, loser: &QuizRecord) -> Vec<&'static str> {
    let mut changed = Vec::new();
    if prefer_longer(&mut keeper.explanation, &loser.explanation) {
        changed.push("justificativa");
    }
    if prefer_longer(&mut keeper.hint, &loser.hint) {
        changed.push("dica");
    }
    changed
}

fn prefer_longer(target: &mut Option<String>, incoming: &Option<String>) -> bool {
    let Some(incoming_value) = incoming.as_deref() else {
        return false;
    };
    let current_len = target.as_deref().map_or(0, |s| s.chars().count());
    if incoming_value.chars().count() > current_len {
        *target = Some(incoming_value.to_string());
        return true;
    }
    false
}

/// Set `review_flag` on every requested record. Returns the keys flagged.
pub fn apply_reviews(records: &mut [QuizRecord], reviews: &[ReviewRequest]) -> Vec<u64> {
    let mut flagged = Vec::new();
    for request in reviews {
        let target = records
            .iter_mut()
            .enumerate()
            .find(|(idx, record)| record.key_at(*idx) == request.id);
        match target {
            Some((_, record)) => {
                record.review_flag = Some(true);
                flagged.push(request.id);
                info!(id = request.id, reason = ?request.reason, "flagged for review");
            }
            None => warn!(id = request.id, "review request for unknown id skipped"),
        }
    }
    flagged
}
