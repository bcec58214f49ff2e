use serde::{Deserialize, Serialize};
use validator::{Validate, ValidationError};

use crate::models::question::Question;

pub const MAX_TOPIC_LEN: usize = 50;

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct LevelCount {
    pub level: String,
    #[validate(range(min = 1, max = 10, message = "Each level can have at most 10 questions"))]
    pub count: u32,
}

/// Body of `POST /api/mcq/api/generate-questions/`.
#[derive(Debug, Clone, Serialize, Validate)]
#[validate(schema(function = "validate_distribution_total"))]
pub struct GenerateQuestionsPayload {
    #[validate(length(min = 1, max = 50, message = "Topic is required"))]
    pub topic: String,
    #[validate(length(min = 1, max = 50, message = "Subtopic is required"))]
    pub subtopic: String,
    #[validate(range(min = 1, max = 60, message = "Number of questions must be between 1 and 60"))]
    pub num_questions: u32,
    pub question_type: String,
    #[validate(length(min = 1, message = "Select at least one Bloom's level"), nested)]
    pub level_distribution: Vec<LevelCount>,
}

fn validate_distribution_total(payload: &GenerateQuestionsPayload) -> Result<(), ValidationError> {
    let sum: u32 = payload.level_distribution.iter().map(|l| l.count).sum();
    if sum == payload.num_questions {
        return Ok(());
    }
    Err(ValidationError::new("level_distribution").with_message(
        format!(
            "The sum of questions ({}) must equal the total number of questions ({})",
            sum, payload.num_questions
        )
        .into(),
    ))
}

#[derive(Debug, Clone, Deserialize)]
pub struct GeneratedQuestion {
    pub question: String,
    #[serde(default)]
    pub options: Vec<String>,
    #[serde(default, alias = "correctAnswer")]
    pub answer: String,
    #[serde(default)]
    pub level: Option<String>,
    #[serde(default)]
    pub blooms: Option<String>,
    #[serde(default, deserialize_with = "crate::utils::flexible::deserialize_tags")]
    pub tags: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GeneratedQuestions {
    #[serde(default)]
    pub questions: Vec<GeneratedQuestion>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct QuestionBank {
    #[serde(default)]
    pub questions: Vec<Question>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SaveQuestionsPayload<'a> {
    pub questions: &'a [Question],
}
