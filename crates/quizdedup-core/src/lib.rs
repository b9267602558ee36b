//! quizdedup core: quiz records, similarity scoring, duplicate resolution
//! and dense renumbering of a JSON quiz database.

pub mod classifier;
pub mod config;
pub mod error;
pub mod finder;
pub mod models;
pub mod normalize;
pub mod report;
pub mod resolution;
pub mod rewrite;
pub mod session;
pub mod similarity;
pub mod storage;

pub use classifier::{DifficultyClassifier, KeywordClassifier};
pub use config::AppConfig;
pub use error::{ExitCode, QuizError, Result};
pub use finder::{DuplicateFinder, DuplicatePair, find_duplicates};
pub use models::*;
pub use normalize::{NormalizeReport, Normalizer};
pub use report::{Report, RunSummary};
pub use resolution::{
    Action, Conflict, Resolution, ResolutionList, ResolutionPlan, ResolutionPolicy, ReviewRequest,
};
pub use rewrite::{IdMap, Rewrite, rewrite};
pub use session::{AssumeYes, Confirm, DedupRun, DedupSession, Preview, RunStatus};
pub use similarity::similarity;
