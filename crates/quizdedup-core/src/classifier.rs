use serde::{Deserialize, Serialize};

use crate::models::{Difficulty, QuestionType, QuizRecord};

/// Assigns a difficulty to records that arrive without one.
pub trait DifficultyClassifier {
    fn classify(&self, record: &QuizRecord) -> Difficulty;
}

/// Keyword heuristic: clinical cases are hard, true/false items are easy
/// unless they mention a hard topic, other items follow keyword presence.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct KeywordClassifier {
    pub hard_keywords: Vec<String>,
    pub easy_keywords: Vec<String>,
}

impl Default for KeywordClassifier {
    fn default() -> Self {
        let hard = [
            "caso clínico",
            "paciente",
            "dose",
            "interação",
            "metabolismo",
            "cyp",
            "farmacocinética",
            "janela terapêutica",
            "biodisponibilidade",
            "clearance",
            "meia-vida",
            "ajuste de dose",
            "insuficiência",
            "contraindicação absoluta",
            "monitorização",
            "toxicidade",
        ];
        let easy = [
            "qual é o principal",
            "define-se",
            "característica principal",
            "principal função",
            "principal objetivo",
        ];
        Self {
            hard_keywords: hard.iter().map(|k| k.to_string()).collect(),
            easy_keywords: easy.iter().map(|k| k.to_string()).collect(),
        }
    }
}

impl KeywordClassifier {
    fn mentions_any(text: &str, keywords: &[String]) -> bool {
        keywords
            .iter()
            .any(|keyword| text.contains(keyword.to_lowercase().as_str()))
    }
}

impl DifficultyClassifier for KeywordClassifier {
    fn classify(&self, record: &QuizRecord) -> Difficulty {
        let question = record.question_text.to_lowercase();
        let explanation = record
            .explanation
            .as_deref()
            .unwrap_or_default()
            .to_lowercase();
        let hard_topic = Self::mentions_any(&question, &self.hard_keywords)
            || Self::mentions_any(&explanation, &self.hard_keywords);

        match record.kind {
            Some(QuestionType::ClinicalCase) => Difficulty::Hard,
            Some(QuestionType::TrueFalse) if hard_topic => Difficulty::Medium,
            Some(QuestionType::TrueFalse) => Difficulty::Easy,
            _ if hard_topic => Difficulty::Hard,
            _ if Self::mentions_any(&question, &self.easy_keywords) => Difficulty::Easy,
            _ => Difficulty::Medium,
        }
    }
}
