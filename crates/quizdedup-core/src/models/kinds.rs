use serde::{Deserialize, Serialize};

/// Question type tag (`tipo`).
///
/// Canonical spellings are the Portuguese ones stored in the database;
/// English spellings from older sources are accepted and canonicalized.
/// Unknown tags are kept as-is.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum QuestionType {
    MultipleChoice,
    TrueFalse,
    ClinicalCase,
    Other(String),
}

impl QuestionType {
    pub fn as_str(&self) -> &str {
        match self {
            Self::MultipleChoice => "multipla_escolha",
            Self::TrueFalse => "verdadeiro_falso",
            Self::ClinicalCase => "caso_clinico",
            Self::Other(tag) => tag,
        }
    }

    pub fn parse(tag: &str) -> Self {
        match tag.trim() {
            "multipla_escolha" | "multiple_choice" => Self::MultipleChoice,
            "verdadeiro_falso" | "true_false" => Self::TrueFalse,
            "caso_clinico" | "clinical_case" => Self::ClinicalCase,
            other => Self::Other(other.to_string()),
        }
    }
}

impl From<String> for QuestionType {
    fn from(tag: String) -> Self {
        Self::parse(&tag)
    }
}

impl From<QuestionType> for String {
    fn from(kind: QuestionType) -> Self {
        kind.as_str().to_string()
    }
}

impl std::fmt::Display for QuestionType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Difficulty tier (`dificuldade`).
///
/// Unaccented and English spellings are accepted in any case. Values
/// outside the three tiers are kept as-is so they can be counted.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Difficulty {
    Easy,
    Medium,
    Hard,
    Other(String),
}

impl Difficulty {
    pub const ALL: [Difficulty; 3] = [Self::Easy, Self::Medium, Self::Hard];

    pub fn as_str(&self) -> &str {
        match self {
            Self::Easy => "fácil",
            Self::Medium => "médio",
            Self::Hard => "difícil",
            Self::Other(tag) => tag,
        }
    }

    /// Capitalized label for reports.
    pub fn label(&self) -> &str {
        match self {
            Self::Easy => "Fácil",
            Self::Medium => "Médio",
            Self::Hard => "Difícil",
            Self::Other(tag) => tag,
        }
    }

    pub fn parse(tag: &str) -> Self {
        tag.parse()
            .unwrap_or_else(|_| Self::Other(tag.trim().to_string()))
    }
}

impl std::fmt::Display for Difficulty {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Strict parse: only the three tiers.
impl std::str::FromStr for Difficulty {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "fácil" | "facil" | "easy" => Ok(Self::Easy),
            "médio" | "medio" | "medium" => Ok(Self::Medium),
            "difícil" | "dificil" | "hard" => Ok(Self::Hard),
            _ => Err(format!("Invalid difficulty: {s}")),
        }
    }
}

impl From<String> for Difficulty {
    fn from(tag: String) -> Self {
        Self::parse(&tag)
    }
}

impl From<Difficulty> for String {
    fn from(difficulty: Difficulty) -> Self {
        difficulty.as_str().to_string()
    }
}
