//! Record normalization: field-name aliases, type-specific cleanup and
//! documented defaults for difficulty and category.

use serde::Serialize;
use serde_json::{Map, Value};
use tracing::warn;

use crate::classifier::DifficultyClassifier;
use crate::config::NormalizeConfig;
use crate::models::{QuestionType, QuizRecord};

/// Canonical field name and the names it may arrive under from other sources.
/// When both are present the canonical one wins.
pub const FIELD_ALIASES: &[(&str, &[&str])] = &[
    ("pergunta", &["question"]),
    ("tipo", &["type"]),
    ("opcoes", &["options"]),
    ("resposta_correta", &["correct_answer"]),
    ("justificativa", &["explanation"]),
    ("dica", &["hint"]),
    ("topico", &["topic"]),
    ("subtopico", &["subtopic"]),
    ("dificuldade", &["difficulty"]),
    ("categoria", &["category"]),
];

fn canonical_name(key: &str) -> Option<&'static str> {
    FIELD_ALIASES
        .iter()
        .find(|(canonical, aliases)| *canonical == key || aliases.contains(&key))
        .map(|(canonical, _)| *canonical)
}

/// Rename aliased keys to their canonical name, keeping first-seen order.
pub fn canonicalize_fields(object: &Map<String, Value>) -> Map<String, Value> {
    let mut out = Map::with_capacity(object.len());
    for (key, value) in object {
        match canonical_name(key) {
            Some(canonical) => {
                if out.contains_key(canonical) {
                    continue;
                }
                let chosen = object.get(canonical).unwrap_or(value);
                out.insert(canonical.to_string(), chosen.clone());
            }
            None => {
                out.insert(key.clone(), value.clone());
            }
        }
    }
    out
}

/// Changes applied to a single record.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RecordChange {
    pub id: u64,
    pub changes: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct NormalizeReport {
    pub records: usize,
    pub changed: Vec<RecordChange>,
}

impl NormalizeReport {
    pub fn change_count(&self) -> usize {
        self.changed.iter().map(|c| c.changes.len()).sum()
    }
}

pub struct Normalizer<'a> {
    config: &'a NormalizeConfig,
    classifier: &'a dyn DifficultyClassifier,
}

impl<'a> Normalizer<'a> {
    pub fn new(config: &'a NormalizeConfig, classifier: &'a dyn DifficultyClassifier) -> Self {
        Self { config, classifier }
    }

    /// Uses the keyword classifier configured in `config`.
    pub fn from_config(config: &'a NormalizeConfig) -> Self {
        Self::new(config, &config.classifier)
    }

    pub fn normalize(&self, records: &mut [QuizRecord]) -> NormalizeReport {
        let mut report = NormalizeReport {
            records: records.len(),
            changed: Vec::new(),
        };

        for (idx, record) in records.iter_mut().enumerate() {
            let changes = self.normalize_record(record);
            if !changes.is_empty() {
                report.changed.push(RecordChange {
                    id: record.key_at(idx),
                    changes,
                });
            }
        }

        report
    }

    fn normalize_record(&self, record: &mut QuizRecord) -> Vec<String> {
        let mut changes = Vec::new();

        if record.kind == Some(QuestionType::TrueFalse) {
            if record.options.take().is_some() {
                changes.push("removed options from true/false item".to_string());
            }
            if let Some(answer) = record.correct_answer.as_mut() {
                let expanded = match answer.trim() {
                    "V" | "v" => Some("Verdadeiro"),
                    "F" | "f" => Some("Falso"),
                    _ => None,
                };
                if let Some(expanded) = expanded {
                    changes.push(format!("answer {answer} -> {expanded}"));
                    *answer = expanded.to_string();
                }
            }
        }

        if let Some(options) = record.options.as_mut()
            && options.len() > self.config.max_options
        {
            warn!(
                id = ?record.id,
                from = options.len(),
                to = self.config.max_options,
                "truncating options"
            );
            changes.push(format!(
                "options reduced from {} to {}",
                options.len(),
                self.config.max_options
            ));
            options.truncate(self.config.max_options);
        }

        if record.difficulty.is_none() {
            let difficulty = self.classifier.classify(record);
            changes.push(format!("difficulty set to {difficulty}"));
            record.difficulty = Some(difficulty);
        }

        if record.category.is_none() {
            changes.push(format!("category set to {}", self.config.default_category));
            record.category = Some(self.config.default_category.clone());
        }

        changes
    }
}
