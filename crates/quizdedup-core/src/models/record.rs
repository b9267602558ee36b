use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

use super::{Difficulty, QuestionType};

/// One quiz item as stored in the database file.
///
/// Keys not modeled here are kept in `extra`. A record read with
/// [`QuizRecord::from_object`] also remembers the object it came from, so
/// [`QuizRecord::to_object`] writes back the same key order and leaves
/// untouched values (nulls included) byte-for-byte alone.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct QuizRecord {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<u64>,

    #[serde(
        rename = "pergunta",
        default,
        deserialize_with = "null_as_empty",
        skip_serializing_if = "String::is_empty"
    )]
    pub question_text: String,

    #[serde(rename = "tipo", default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<QuestionType>,

    #[serde(rename = "opcoes", default, skip_serializing_if = "Option::is_none")]
    pub options: Option<Vec<String>>,

    #[serde(
        rename = "resposta_correta",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub correct_answer: Option<String>,

    #[serde(
        rename = "justificativa",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub explanation: Option<String>,

    #[serde(rename = "dica", default, skip_serializing_if = "Option::is_none")]
    pub hint: Option<String>,

    #[serde(rename = "topico", default, skip_serializing_if = "Option::is_none")]
    pub topic: Option<String>,

    #[serde(rename = "subtopico", default, skip_serializing_if = "Option::is_none")]
    pub subtopic: Option<String>,

    #[serde(rename = "dificuldade", default, skip_serializing_if = "Option::is_none")]
    pub difficulty: Option<Difficulty>,

    #[serde(rename = "categoria", default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,

    #[serde(rename = "needs_review", default, skip_serializing_if = "Option::is_none")]
    pub review_flag: Option<bool>,

    #[serde(flatten)]
    pub extra: Map<String, Value>,

    #[serde(skip)]
    source: Map<String, Value>,
}

fn null_as_empty<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    Ok(Option::<String>::deserialize(deserializer)?.unwrap_or_default())
}

fn into_object(value: Value) -> Map<String, Value> {
    match value {
        Value::Object(object) => object,
        _ => Map::new(),
    }
}

impl QuizRecord {
    pub fn new(id: u64, question_text: impl Into<String>) -> Self {
        Self {
            id: Some(id),
            question_text: question_text.into(),
            ..Default::default()
        }
    }

    /// Parse one database object, remembering it for [`Self::to_object`].
    pub fn from_object(object: Map<String, Value>) -> serde_json::Result<Self> {
        let mut record: Self = serde_json::from_value(Value::Object(object.clone()))?;
        record.source = object;
        Ok(record)
    }

    /// The record as a JSON object ready to be written.
    ///
    /// Keys from the source object keep their position. A key keeps its
    /// source value unless the record changed it; keys the record cleared
    /// are dropped; keys the record gained go last.
    pub fn to_object(&self) -> serde_json::Result<Map<String, Value>> {
        let current = into_object(serde_json::to_value(self)?);
        if self.source.is_empty() {
            return Ok(current);
        }
        let loaded: Self = serde_json::from_value(Value::Object(self.source.clone()))?;
        let loaded = into_object(serde_json::to_value(&loaded)?);

        let mut out = Map::with_capacity(current.len().max(self.source.len()));
        for (key, original) in &self.source {
            match (current.get(key), loaded.get(key)) {
                (Some(now), Some(before)) if now == before => {
                    out.insert(key.clone(), original.clone());
                }
                (Some(now), _) => {
                    out.insert(key.clone(), now.clone());
                }
                (None, Some(_)) => {}
                // Null or empty in the source and still unset.
                (None, None) => {
                    out.insert(key.clone(), original.clone());
                }
            }
        }
        for (key, value) in current {
            if !out.contains_key(&key) {
                out.insert(key, value);
            }
        }
        Ok(out)
    }

    /// Stable key of the record at `index`: its id, or its 1-based
    /// position when the id is missing.
    pub fn key_at(&self, index: usize) -> u64 {
        self.id.unwrap_or(index as u64 + 1)
    }

    /// Whether the record takes part in similarity comparison.
    pub fn has_text(&self) -> bool {
        !self.question_text.trim().is_empty()
    }

    pub fn needs_review(&self) -> bool {
        self.review_flag.unwrap_or(false)
    }

    /// First `max_chars` characters of the question, for listings.
    pub fn preview(&self, max_chars: usize) -> String {
        let mut preview: String = self.question_text.chars().take(max_chars).collect();
        if self.question_text.chars().count() > max_chars {
            preview.push_str("...");
        }
        preview
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_deserialize_canonical_fields() {
        let json = r#"{
            "id": 7,
            "pergunta": "Qual é o mecanismo dos beta-2 agonistas?",
            "tipo": "multipla_escolha",
            "opcoes": ["A", "B", "C", "D"],
            "resposta_correta": "A",
            "justificativa": "Ativam receptores beta-2.",
            "dificuldade": "médio",
            "fonte": "aula 3"
        }"#;
        let record: QuizRecord = serde_json::from_str(json).unwrap();
        assert_eq!(record.id, Some(7));
        assert_eq!(record.kind, Some(QuestionType::MultipleChoice));
        assert_eq!(record.options.as_ref().map(Vec::len), Some(4));
        assert_eq!(record.difficulty, Some(Difficulty::Medium));
        assert_eq!(record.extra.get("fonte"), Some(&Value::from("aula 3")));
    }

    #[test]
    fn test_missing_question_is_empty_and_not_written() {
        let record: QuizRecord = serde_json::from_str(r#"{"id": 3, "dica": "x"}"#).unwrap();
        assert!(!record.has_text());

        let out = serde_json::to_value(&record).unwrap();
        assert!(out.get("pergunta").is_none());
        assert_eq!(out.get("dica"), Some(&Value::from("x")));
    }

    #[test]
    fn test_null_question_loads_as_empty() {
        let record: QuizRecord = serde_json::from_str(r#"{"id": 3, "pergunta": null}"#).unwrap();
        assert_eq!(record.question_text, "");
        assert!(!record.has_text());
    }

    fn object(value: Value) -> Map<String, Value> {
        into_object(value)
    }

    #[test]
    fn test_to_object_keeps_source_order_and_nulls() {
        let source = object(serde_json::json!({
            "pergunta": "abc",
            "tipo": "multiple_choice",
            "fonte": "aula",
            "id": 4,
            "dica": null,
            "dificuldade": "medium"
        }));
        let mut record = QuizRecord::from_object(source).unwrap();
        record.id = Some(2);
        record.explanation = Some("nova".to_string());

        let out = record.to_object().unwrap();

        let keys: Vec<&str> = out.keys().map(String::as_str).collect();
        assert_eq!(
            keys,
            vec!["pergunta", "tipo", "fonte", "id", "dica", "dificuldade", "justificativa"]
        );
        assert_eq!(out["id"], Value::from(2));
        assert_eq!(out["dica"], Value::Null);
        assert_eq!(out["tipo"], Value::from("multiple_choice"));
        assert_eq!(out["dificuldade"], Value::from("medium"));
    }

    #[test]
    fn test_to_object_drops_cleared_fields() {
        let source = object(serde_json::json!({"id": 1, "opcoes": ["V", "F"], "pergunta": ""}));
        let mut record = QuizRecord::from_object(source).unwrap();
        record.options = None;

        let out = record.to_object().unwrap();

        assert!(out.get("opcoes").is_none());
        assert_eq!(out["pergunta"], Value::from(""));
    }

    #[test]
    fn test_key_falls_back_to_position() {
        let mut record = QuizRecord::new(10, "text");
        assert_eq!(record.key_at(0), 10);
        record.id = None;
        assert_eq!(record.key_at(4), 5);
    }

    #[test]
    fn test_preview_truncates_on_char_boundary() {
        let record = QuizRecord::new(1, "Supressão do eixo HPA");
        assert_eq!(record.preview(9), "Supressão...");
        assert_eq!(record.preview(100), "Supressão do eixo HPA");
    }
}
