//! End-to-end passes over a database file: dedup rewrite, normalization,
//! and read-only scans.

use std::path::PathBuf;

use serde::Serialize;
use tracing::info;

use crate::config::AppConfig;
use crate::error::{QuizError, Result};
use crate::finder::{DuplicateFinder, DuplicatePair};
use crate::models::QuizRecord;
use crate::normalize::{NormalizeReport, Normalizer};
use crate::report::{Report, RunSummary};
use crate::resolution::{ResolutionList, ResolutionPlan, ResolutionPolicy, apply_reviews};
use crate::rewrite::{Rewrite, rewrite};
use crate::storage::{self, LoadedDatabase};

/// What the operator is asked to approve before anything is written.
pub struct Preview<'a> {
    pub records: &'a [QuizRecord],
    pub candidates: &'a [DuplicatePair],
    pub plan: &'a ResolutionPlan,
}

impl Preview<'_> {
    pub fn question(&self, key: u64) -> Option<&QuizRecord> {
        self.records
            .iter()
            .enumerate()
            .find(|(idx, record)| record.key_at(*idx) == key)
            .map(|(_, record)| record)
    }
}

/// Asks whether a destructive rewrite may proceed. Blocks until answered.
pub trait Confirm {
    fn confirm(&mut self, preview: &Preview<'_>) -> Result<bool>;
}

/// Never asks; used by the non-interactive flow.
pub struct AssumeYes;

impl Confirm for AssumeYes {
    fn confirm(&mut self, _preview: &Preview<'_>) -> Result<bool> {
        Ok(true)
    }
}

/// Interpret a typed answer. Anything but an explicit yes is a refusal.
pub fn is_affirmative(answer: &str) -> bool {
    matches!(
        answer.trim().to_lowercase().as_str(),
        "s" | "sim" | "y" | "yes"
    )
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    Applied,
    DryRun,
    Aborted,
    NothingToDo,
}

#[derive(Debug, Clone, Serialize)]
pub struct DedupRun {
    pub status: RunStatus,
    pub candidates: Vec<DuplicatePair>,
    pub plan: ResolutionPlan,
    pub flagged: Vec<u64>,
    pub rewrite: Rewrite,
    pub summary: RunSummary,
    pub report: Report,
}

impl DedupRun {
    pub fn written(&self) -> bool {
        self.status == RunStatus::Applied
    }
}

pub struct DedupSession<'a> {
    config: &'a AppConfig,
    resolutions: ResolutionList,
    dry_run: bool,
}

impl<'a> DedupSession<'a> {
    pub fn new(config: &'a AppConfig, resolutions: ResolutionList) -> Self {
        Self {
            config,
            resolutions,
            dry_run: false,
        }
    }

    pub fn with_dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    /// Load, plan, confirm, back up, rewrite and save.
    ///
    /// Nothing is written unless `confirm` approves. The backup is written
    /// in full before the database file is replaced.
    pub fn run(&self, confirm: &mut dyn Confirm) -> Result<DedupRun> {
        let backup = checked_backup_path(self.config)?;
        let db = storage::load(self.config.database_path())?;

        let candidates = DuplicateFinder::new()
            .with_threshold(self.config.dedup.detection_threshold)
            .find(&db.records);
        info!(pairs = candidates.len(), "duplicate candidates found");

        let plan = ResolutionPolicy::new(self.resolutions.resolutions.clone()).plan(&db.records);
        let mut working = db.records.clone();
        let flagged = apply_reviews(&mut working, &self.resolutions.reviews);
        let rewrite = rewrite(&working, &plan.removals, &plan.merges);

        let report = Report::build(&rewrite.records, self.config.dedup.verification_threshold)
            .with_option_limit(&rewrite.records, self.config.normalize.max_options)
            .with_listing_limit(self.config.dedup.listing_limit);
        let summary = RunSummary::new(
            db.records.len(),
            rewrite.removed.len(),
            rewrite.merged.len(),
            plan.skipped.len(),
        );

        let unchanged =
            plan.is_empty() && flagged.is_empty() && rewrite.renumbered.changed().next().is_none();

        let status = if unchanged {
            RunStatus::NothingToDo
        } else if self.dry_run {
            RunStatus::DryRun
        } else {
            let preview = Preview {
                records: &db.records,
                candidates: &candidates,
                plan: &plan,
            };
            if confirm.confirm(&preview)? {
                commit(&db, &backup, &rewrite.records)?;
                RunStatus::Applied
            } else {
                info!("rewrite declined, nothing written");
                RunStatus::Aborted
            }
        };

        let summary = if status == RunStatus::Applied {
            summary.with_backup(backup)
        } else {
            summary
        };

        Ok(DedupRun {
            status,
            candidates,
            plan,
            flagged,
            rewrite,
            summary,
            report,
        })
    }
}

fn checked_backup_path(config: &AppConfig) -> Result<PathBuf> {
    let backup = config.backup_path();
    if backup == config.database_path() {
        return Err(QuizError::BackupPathConflict(backup));
    }
    Ok(backup)
}

/// Backup first; the database file is only replaced once the backup is
/// complete.
fn commit(db: &LoadedDatabase, backup: &std::path::Path, records: &[QuizRecord]) -> Result<()> {
    storage::write_backup(backup, db)?;
    storage::save(&db.path, records)
}

#[derive(Debug, Clone, Serialize)]
pub struct NormalizeRun {
    pub status: RunStatus,
    pub changes: NormalizeReport,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub backup_path: Option<PathBuf>,
}

/// Fold field aliases, fill difficulty/category defaults and clean up
/// type-specific fields, then write the result back.
pub fn normalize_file(config: &AppConfig, dry_run: bool) -> Result<NormalizeRun> {
    let backup = checked_backup_path(config)?;
    let db = storage::load(config.database_path())?;
    let mut records = db.records.clone();
    let changes = Normalizer::from_config(&config.normalize).normalize(&mut records);

    // Field names may have been rewritten even when no value changed.
    let rewritten = storage::to_pretty_json(&records)? != db.raw;

    let status = if changes.changed.is_empty() && !rewritten {
        RunStatus::NothingToDo
    } else if dry_run {
        RunStatus::DryRun
    } else {
        commit(&db, &backup, &records)?;
        RunStatus::Applied
    };

    Ok(NormalizeRun {
        status,
        changes,
        backup_path: (status == RunStatus::Applied).then_some(backup),
    })
}

/// Duplicate pairs in the database at `threshold`, without changing it.
pub fn scan_file(config: &AppConfig, threshold: f64) -> Result<(Vec<QuizRecord>, Vec<DuplicatePair>)> {
    let db = storage::load(config.database_path())?;
    let pairs = DuplicateFinder::new().with_threshold(threshold).find(&db.records);
    Ok((db.records, pairs))
}

pub fn report_file(config: &AppConfig, threshold: f64) -> Result<Report> {
    let db = storage::load(config.database_path())?;
    Ok(Report::build(&db.records, threshold)
        .with_option_limit(&db.records, config.normalize.max_options)
        .with_listing_limit(config.dedup.listing_limit))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resolution::{Action, Resolution, ReviewRequest};
    use std::fs;
    use tempfile::TempDir;

    const DATABASE: &str = r#"[
  {"id": 1, "pergunta": "Qual é o mecanismo de ação dos beta-2 agonistas?", "justificativa": "curta"},
  {"id": 2, "pergunta": "Quais os efeitos adversos locais dos corticosteroides inalados?"},
  {"id": 3, "pergunta": "Como prevenir a candidíase oral associada a corticosteroides inalados?", "justificativa": "Enxágue."},
  {"id": 4, "pergunta": "Qual a principal vantagem dos antagonistas de leucotrienos?"},
  {"id": 5, "pergunta": "Como prevenir a candidíase oral associada aos corticosteroides inalados?", "justificativa": "Enxaguar a boca após o uso do inalador."}
]"#;

    struct Answer(bool, usize);

    impl Confirm for Answer {
        fn confirm(&mut self, preview: &Preview<'_>) -> Result<bool> {
            self.1 += 1;
            assert!(preview.question(5).is_some());
            Ok(self.0)
        }
    }

    fn setup() -> (TempDir, AppConfig) {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("quiz_database.json");
        fs::write(&path, DATABASE).unwrap();
        let mut config = AppConfig::default();
        config.set_database_path(path);
        (dir, config)
    }

    fn drop_five() -> ResolutionList {
        ResolutionList {
            resolutions: vec![Resolution::new(5, 3, Action::Drop)],
            reviews: vec![],
        }
    }

    #[test]
    fn test_declined_prompt_leaves_files_untouched() {
        let (_dir, config) = setup();
        let backup = config.backup_path();
        fs::write(&backup, "previous backup").unwrap();

        let mut answer = Answer(false, 0);
        let run = DedupSession::new(&config, drop_five()).run(&mut answer).unwrap();

        assert_eq!(answer.1, 1);
        assert_eq!(run.status, RunStatus::Aborted);
        assert_eq!(fs::read_to_string(config.database_path()).unwrap(), DATABASE);
        assert_eq!(fs::read_to_string(&backup).unwrap(), "previous backup");
    }

    #[test]
    fn test_applied_run_writes_backup_then_dense_database() {
        let (_dir, config) = setup();

        let run = DedupSession::new(&config, drop_five())
            .run(&mut AssumeYes)
            .unwrap();

        assert_eq!(run.status, RunStatus::Applied);
        assert_eq!(run.candidates.len(), 1);
        assert_eq!((run.candidates[0].first, run.candidates[0].second), (3, 5));
        assert_eq!(fs::read_to_string(config.backup_path()).unwrap(), DATABASE);

        let saved = storage::load(config.database_path()).unwrap().records;
        let ids: Vec<u64> = saved.iter().filter_map(|r| r.id).collect();
        assert_eq!(ids, vec![1, 2, 3, 4]);
        assert!(saved.iter().all(|r| !r.question_text.contains("associada aos")));
        assert_eq!(run.summary.remaining, 4);
        assert!(run.report.converged());
    }

    #[test]
    fn test_merge_then_drop_keeps_longer_explanation() {
        let (_dir, config) = setup();
        let resolutions = ResolutionList {
            resolutions: vec![Resolution::new(5, 3, Action::MergeThenDrop)],
            reviews: vec![ReviewRequest { id: 4, reason: None }],
        };

        let run = DedupSession::new(&config, resolutions).run(&mut AssumeYes).unwrap();

        let saved = storage::load(config.database_path()).unwrap().records;
        assert_eq!(
            saved[2].explanation.as_deref(),
            Some("Enxaguar a boca após o uso do inalador.")
        );
        assert!(saved[3].needs_review());
        assert_eq!(run.flagged, vec![4]);
    }

    #[test]
    fn test_dry_run_and_nothing_to_do_do_not_write() {
        let (_dir, config) = setup();

        let run = DedupSession::new(&config, drop_five())
            .with_dry_run(true)
            .run(&mut AssumeYes)
            .unwrap();
        assert_eq!(run.status, RunStatus::DryRun);
        assert_eq!(run.rewrite.records.len(), 4);

        let run = DedupSession::new(&config, ResolutionList::default())
            .run(&mut AssumeYes)
            .unwrap();
        assert_eq!(run.status, RunStatus::NothingToDo);

        assert!(!config.backup_path().exists());
        assert_eq!(fs::read_to_string(config.database_path()).unwrap(), DATABASE);
    }

    #[test]
    fn test_conflicting_entries_are_skipped_and_rest_applied() {
        let (_dir, config) = setup();
        let resolutions = ResolutionList {
            resolutions: vec![
                Resolution::new(5, 3, Action::Drop),
                Resolution::new(3, 1, Action::Drop),
                Resolution::new(42, 1, Action::Drop),
            ],
            reviews: vec![],
        };

        let run = DedupSession::new(&config, resolutions).run(&mut AssumeYes).unwrap();

        assert_eq!(run.plan.skipped.len(), 2);
        assert_eq!(run.summary.removed, 1);
        assert_eq!(run.summary.skipped, 2);
    }

    #[test]
    fn test_backup_path_equal_to_database_is_rejected() {
        let (_dir, mut config) = setup();
        config.database.backup_path = Some(config.database_path().to_path_buf());

        let err = DedupSession::new(&config, drop_five())
            .run(&mut AssumeYes)
            .unwrap_err();
        assert!(matches!(err, QuizError::BackupPathConflict(_)));
        assert_eq!(fs::read_to_string(config.database_path()).unwrap(), DATABASE);
    }

    #[test]
    fn test_backup_failure_leaves_database_untouched() {
        let (dir, mut config) = setup();
        config.database.backup_path = Some(dir.path().join("missing").join("backup.json"));

        let err = DedupSession::new(&config, drop_five())
            .run(&mut AssumeYes)
            .unwrap_err();

        assert!(matches!(err, QuizError::BackupFailed { .. }));
        assert_eq!(fs::read_to_string(config.database_path()).unwrap(), DATABASE);
    }

    #[test]
    fn test_dedup_keeps_record_layout() {
        let (_dir, config) = setup();
        fs::write(
            config.database_path(),
            r#"[
  {"pergunta": "Qual o uso do omeprazol?", "fonte": "aula", "id": 1, "dica": null},
  {"pergunta": "", "id": 2},
  {"pergunta": "Qual o uso do omeprazol??", "id": 3, "dificuldade": "intermediario"}
]"#,
        )
        .unwrap();
        let resolutions = ResolutionList {
            resolutions: vec![Resolution::new(1, 3, Action::Drop)],
            reviews: vec![],
        };

        let run = DedupSession::new(&config, resolutions).run(&mut AssumeYes).unwrap();
        assert_eq!(run.status, RunStatus::Applied);

        let saved: serde_json::Value =
            serde_json::from_str(&fs::read_to_string(config.database_path()).unwrap()).unwrap();
        assert_eq!(
            saved,
            serde_json::json!([
                {"pergunta": "", "id": 1},
                {"pergunta": "Qual o uso do omeprazol??", "id": 2, "dificuldade": "intermediario"}
            ])
        );
        let keys: Vec<&str> = saved[1].as_object().unwrap().keys().map(String::as_str).collect();
        assert_eq!(keys, vec!["pergunta", "id", "dificuldade"]);
    }

    #[test]
    fn test_report_flags_records_over_option_limit() {
        let (_dir, config) = setup();
        fs::write(
            config.database_path(),
            r#"[{"id": 1, "pergunta": "Qual?", "opcoes": ["A", "B", "C", "D", "E"]}]"#,
        )
        .unwrap();

        let report = report_file(&config, 85.0).unwrap();

        assert_eq!(report.over_option_limit, vec![1]);
    }

    #[test]
    fn test_malformed_database_aborts_before_any_write() {
        let (_dir, config) = setup();
        fs::write(config.database_path(), "[{\"id\": 1,").unwrap();

        let err = DedupSession::new(&config, drop_five())
            .run(&mut AssumeYes)
            .unwrap_err();
        assert!(matches!(err, QuizError::Malformed { .. }));
        assert!(!config.backup_path().exists());
    }

    #[test]
    fn test_normalize_file_fills_defaults_and_backs_up() {
        let (_dir, config) = setup();

        let run = normalize_file(&config, false).unwrap();

        assert_eq!(run.status, RunStatus::Applied);
        assert_eq!(run.changes.changed.len(), 5);
        assert_eq!(fs::read_to_string(config.backup_path()).unwrap(), DATABASE);
        let saved = storage::load(config.database_path()).unwrap().records;
        assert!(saved.iter().all(|r| r.difficulty.is_some() && r.category.is_some()));

        let again = normalize_file(&config, false).unwrap();
        assert_eq!(again.status, RunStatus::NothingToDo);
    }

    #[test]
    fn test_affirmative_answers() {
        assert!(is_affirmative("s"));
        assert!(is_affirmative(" SIM\n"));
        assert!(is_affirmative("y"));
        assert!(!is_affirmative("n"));
        assert!(!is_affirmative(""));
        assert!(!is_affirmative("talvez"));
    }

    #[test]
    fn test_scan_and_report_are_read_only() {
        let (_dir, config) = setup();

        let (records, pairs) = scan_file(&config, 80.0).unwrap();
        assert_eq!(records.len(), 5);
        assert_eq!(pairs.len(), 1);

        let report = report_file(&config, 85.0).unwrap();
        assert_eq!(report.remaining.len(), 1);
        assert_eq!(fs::read_to_string(config.database_path()).unwrap(), DATABASE);
    }
}
