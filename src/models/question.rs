use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::utils::flexible::deserialize_tags;

pub const MIN_OPTIONS: usize = 2;
pub const MAX_OPTIONS: usize = 4;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Difficulty {
    Easy,
    Medium,
    Hard,
}

impl FromStr for Difficulty {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "easy" => Ok(Difficulty::Easy),
            "medium" => Ok(Difficulty::Medium),
            "hard" => Ok(Difficulty::Hard),
            other => Err(format!("Unknown difficulty level: {}", other)),
        }
    }
}

impl TryFrom<String> for Difficulty {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Difficulty> for String {
    fn from(value: Difficulty) -> Self {
        value.to_string()
    }
}

impl fmt::Display for Difficulty {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Difficulty::Easy => "Easy",
            Difficulty::Medium => "Medium",
            Difficulty::Hard => "Hard",
        })
    }
}

/// Bloom's taxonomy level, L1 (Remembering) through L6 (Creating).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum BloomLevel {
    Remembering,
    Understanding,
    Applying,
    Analyzing,
    Evaluating,
    Creating,
}

impl BloomLevel {
    pub const ALL: [BloomLevel; 6] = [
        BloomLevel::Remembering,
        BloomLevel::Understanding,
        BloomLevel::Applying,
        BloomLevel::Analyzing,
        BloomLevel::Evaluating,
        BloomLevel::Creating,
    ];

    pub fn number(&self) -> u8 {
        *self as u8 + 1
    }

    pub fn code(&self) -> String {
        format!("L{}", self.number())
    }

    pub fn name(&self) -> &'static str {
        match self {
            BloomLevel::Remembering => "Remembering",
            BloomLevel::Understanding => "Understanding",
            BloomLevel::Applying => "Applying",
            BloomLevel::Analyzing => "Analyzing",
            BloomLevel::Evaluating => "Evaluating",
            BloomLevel::Creating => "Creating",
        }
    }

    /// Label used by the generator endpoint, e.g. `"L3 - Applying"`.
    pub fn label(&self) -> String {
        format!("{} - {}", self.code(), self.name())
    }
}

impl FromStr for BloomLevel {
    type Err = String;

    /// Accepts `L3`, `3`, `Applying`, `Apply` and `L3 - Applying`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        let head = trimmed.split(" - ").next().unwrap_or(trimmed).trim();
        let lower = head.to_ascii_lowercase();
        let digits = lower.strip_prefix('l').unwrap_or(&lower);
        if let Ok(n) = digits.parse::<usize>() {
            if (1..=6).contains(&n) {
                return Ok(BloomLevel::ALL[n - 1]);
            }
        }
        BloomLevel::ALL
            .iter()
            .find(|level| {
                let name = level.name().to_ascii_lowercase();
                name == lower || (lower.len() >= 4 && name.starts_with(&lower))
            })
            .copied()
            .ok_or_else(|| format!("Unknown Bloom's level: {}", trimmed))
    }
}

impl TryFrom<String> for BloomLevel {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<BloomLevel> for String {
    fn from(value: BloomLevel) -> Self {
        value.label()
    }
}

impl fmt::Display for BloomLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.label())
    }
}

/// A saved multiple-choice question. Built through
/// [`QuestionDraft::validate`](crate::services::question_service::QuestionDraft::validate)
/// so the correct answer is always one of the options.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Question {
    #[serde(default, alias = "_id", alias = "question_id")]
    pub id: String,
    pub question: String,
    pub options: Vec<String>,
    #[serde(rename = "correctAnswer", alias = "answer", alias = "correct_answer")]
    pub correct_answer: String,
    #[serde(rename = "level", alias = "difficulty")]
    pub difficulty: Difficulty,
    #[serde(rename = "blooms", alias = "bloomsLevel")]
    pub blooms: BloomLevel,
    #[serde(default, deserialize_with = "deserialize_tags")]
    pub tags: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub explanation: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bloom_level_accepts_codes_and_names() {
        assert_eq!("L1".parse::<BloomLevel>().unwrap(), BloomLevel::Remembering);
        assert_eq!("6".parse::<BloomLevel>().unwrap(), BloomLevel::Creating);
        assert_eq!("Applying".parse::<BloomLevel>().unwrap(), BloomLevel::Applying);
        assert_eq!("L4 - Analyzing".parse::<BloomLevel>().unwrap(), BloomLevel::Analyzing);
        assert_eq!("understand".parse::<BloomLevel>().unwrap(), BloomLevel::Understanding);
        assert!("L7".parse::<BloomLevel>().is_err());
        assert_eq!(BloomLevel::Understanding.label(), "L2 - Understanding");
    }

    #[test]
    fn question_deserializes_backend_shape() {
        let q: Question = serde_json::from_value(serde_json::json!({
            "_id": "q1",
            "question": "2 + 2?",
            "options": ["3", "4"],
            "answer": "4",
            "level": "easy",
            "blooms": "L1",
            "tags": "math, basics"
        }))
        .unwrap();
        assert_eq!(q.id, "q1");
        assert_eq!(q.difficulty, Difficulty::Easy);
        assert_eq!(q.tags, vec!["math", "basics"]);
    }
}
