use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use tracing::{info, warn};
use uuid::Uuid;

use crate::dto::question_dto::{
    GenerateQuestionsPayload, GeneratedQuestion, GeneratedQuestions, LevelCount, QuestionBank,
    SaveQuestionsPayload, MAX_TOPIC_LEN,
};
use crate::error::{Error, Result};
use crate::models::question::{BloomLevel, Difficulty, Question, MAX_OPTIONS, MIN_OPTIONS};
use crate::services::api_client::ApiClient;
use crate::services::listing_service::{
    available_blooms, available_tags, normalize_library, QuestionBankFilter,
};
use crate::storage::SessionCache;
use crate::utils::flexible::split_tags;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum QuestionError {
    #[error("Question is required.")]
    MissingText,
    #[error("At least two choices are required.")]
    TooFewChoices,
    #[error("Options must be unique. Duplicate options are not allowed.")]
    DuplicateOptions,
    #[error("Difficulty level is required.")]
    MissingDifficulty,
    #[error("Blooms level is required.")]
    MissingBlooms,
    #[error("Correct answer is required.")]
    MissingAnswer,
    #[error("Tags are required.")]
    MissingTags,
    #[error("correct answer must be one of the options")]
    AnswerNotAnOption,
    #[error("You can have a maximum of 4 options.")]
    TooManyOptions,
    #[error("You must have at least 2 options.")]
    MinimumOptions,
    #[error("Save the question before finishing.")]
    UnsavedEdit,
    #[error("Please save at least one question before finishing.")]
    EmptySection,
    #[error("Question not found.")]
    UnknownQuestion,
}

/// Question under construction in the editor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuestionDraft {
    pub id: Option<String>,
    pub question: String,
    pub options: Vec<String>,
    pub correct_answer: Option<String>,
    pub difficulty: Option<Difficulty>,
    pub blooms: Option<BloomLevel>,
    pub tags: Vec<String>,
    pub explanation: Option<String>,
}

impl Default for QuestionDraft {
    fn default() -> Self {
        Self {
            id: None,
            question: String::new(),
            options: vec![String::new(); MIN_OPTIONS],
            correct_answer: None,
            difficulty: None,
            blooms: None,
            tags: Vec::new(),
            explanation: None,
        }
    }
}

impl From<&Question> for QuestionDraft {
    fn from(q: &Question) -> Self {
        Self {
            id: Some(q.id.clone()).filter(|id| !id.is_empty()),
            question: q.question.clone(),
            options: q.options.clone(),
            correct_answer: Some(q.correct_answer.clone()),
            difficulty: Some(q.difficulty),
            blooms: Some(q.blooms),
            tags: q.tags.clone(),
            explanation: q.explanation.clone(),
        }
    }
}

impl QuestionDraft {
    pub fn add_option(&mut self) -> std::result::Result<(), QuestionError> {
        if self.options.len() >= MAX_OPTIONS {
            return Err(QuestionError::TooManyOptions);
        }
        self.options.push(String::new());
        Ok(())
    }

    /// Removing the option that was marked correct clears the answer.
    pub fn remove_option(&mut self, index: usize) -> std::result::Result<(), QuestionError> {
        if self.options.len() <= MIN_OPTIONS {
            return Err(QuestionError::MinimumOptions);
        }
        if index >= self.options.len() {
            return Ok(());
        }
        let removed = self.options.remove(index);
        if self.correct_answer.as_deref() == Some(removed.as_str()) {
            self.correct_answer = None;
        }
        Ok(())
    }

    /// Editing the text of the correct option keeps it correct.
    pub fn set_option(&mut self, index: usize, text: impl Into<String>) {
        let text = text.into();
        if let Some(slot) = self.options.get_mut(index) {
            if self.correct_answer.as_deref() == Some(slot.as_str()) {
                self.correct_answer = Some(text.clone());
            }
            *slot = text;
        }
    }

    pub fn set_tags(&mut self, joined: &str) {
        self.tags = split_tags(joined);
    }

    /// Checks the draft in the order the editor reports problems and builds
    /// the saved question.
    pub fn validate(&self) -> std::result::Result<Question, QuestionError> {
        let text = self.question.trim();
        if text.is_empty() {
            return Err(QuestionError::MissingText);
        }

        let options: Vec<String> = self
            .options
            .iter()
            .map(|o| o.trim().to_string())
            .filter(|o| !o.is_empty())
            .collect();
        if options.len() < MIN_OPTIONS {
            return Err(QuestionError::TooFewChoices);
        }
        if options.len() > MAX_OPTIONS {
            return Err(QuestionError::TooManyOptions);
        }
        let mut seen = HashSet::new();
        if !options.iter().all(|o| seen.insert(o.to_lowercase())) {
            return Err(QuestionError::DuplicateOptions);
        }

        let difficulty = self.difficulty.ok_or(QuestionError::MissingDifficulty)?;
        let blooms = self.blooms.ok_or(QuestionError::MissingBlooms)?;

        let answer = self
            .correct_answer
            .as_deref()
            .map(str::trim)
            .filter(|a| !a.is_empty())
            .ok_or(QuestionError::MissingAnswer)?;
        if !options.iter().any(|o| o == answer) {
            return Err(QuestionError::AnswerNotAnOption);
        }

        if self.tags.iter().all(|t| t.trim().is_empty()) {
            return Err(QuestionError::MissingTags);
        }

        Ok(Question {
            id: self.id.clone().unwrap_or_else(|| Uuid::new_v4().to_string()),
            question: text.to_string(),
            correct_answer: answer.to_string(),
            options,
            difficulty,
            blooms,
            tags: self.tags.iter().map(|t| t.trim().to_string()).filter(|t| !t.is_empty()).collect(),
            explanation: self.explanation.clone().filter(|e| !e.trim().is_empty()),
        })
    }
}

/// Questions authored for one section, plus the edit cursor.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct QuestionSection {
    questions: Vec<Question>,
    editing: Option<usize>,
    dirty: bool,
}

impl QuestionSection {
    pub fn new(questions: Vec<Question>) -> Self {
        Self {
            questions,
            editing: None,
            dirty: false,
        }
    }

    pub fn questions(&self) -> &[Question] {
        &self.questions
    }

    pub fn len(&self) -> usize {
        self.questions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.questions.is_empty()
    }

    pub fn editing(&self) -> Option<usize> {
        self.editing
    }

    /// Loads a saved question into a draft and moves the cursor onto it.
    pub fn begin_edit(&mut self, index: usize) -> Option<QuestionDraft> {
        let draft = self.questions.get(index).map(QuestionDraft::from)?;
        self.editing = Some(index);
        Some(draft)
    }

    pub fn mark_dirty(&mut self) {
        self.dirty = true;
    }

    /// Replaces the question under the cursor, or appends a new one.
    pub fn save(&mut self, draft: &QuestionDraft) -> std::result::Result<&Question, QuestionError> {
        let question = draft.validate()?;
        let index = match self.editing.take() {
            Some(index) if index < self.questions.len() => {
                self.questions[index] = question;
                index
            }
            _ => {
                self.questions.push(question);
                self.questions.len() - 1
            }
        };
        self.dirty = false;
        Ok(&self.questions[index])
    }

    /// Deleting before the cursor shifts it; deleting the edited question
    /// drops the cursor.
    pub fn delete(&mut self, index: usize) -> std::result::Result<Question, QuestionError> {
        if index >= self.questions.len() {
            return Err(QuestionError::UnknownQuestion);
        }
        let removed = self.questions.remove(index);
        self.editing = match self.editing {
            Some(cur) if cur == index => {
                self.dirty = false;
                None
            }
            Some(cur) if cur > index => Some(cur - 1),
            other => other,
        };
        Ok(removed)
    }

    pub fn finish(&self) -> std::result::Result<&[Question], QuestionError> {
        if self.dirty {
            return Err(QuestionError::UnsavedEdit);
        }
        if self.questions.is_empty() {
            return Err(QuestionError::EmptySection);
        }
        Ok(&self.questions)
    }
}

/// Input of the question generator form.
#[derive(Debug, Clone, Default)]
pub struct GenerationRequest {
    pub topic: String,
    pub subtopic: String,
    pub num_questions: u32,
    pub question_type: String,
    pub levels: Vec<(BloomLevel, u32)>,
}

fn truncate_chars(s: &str, max: usize) -> String {
    s.trim().chars().take(max).collect()
}

impl GenerationRequest {
    pub fn into_payload(self) -> Result<GenerateQuestionsPayload> {
        let payload = GenerateQuestionsPayload {
            topic: truncate_chars(&self.topic, MAX_TOPIC_LEN),
            subtopic: truncate_chars(&self.subtopic, MAX_TOPIC_LEN),
            num_questions: self.num_questions,
            question_type: if self.question_type.trim().is_empty() {
                "Multiple Choice".to_string()
            } else {
                self.question_type
            },
            level_distribution: self
                .levels
                .into_iter()
                .map(|(level, count)| LevelCount {
                    level: level.label(),
                    count,
                })
                .collect(),
        };
        crate::utils::validation::validate(&payload)?;
        Ok(payload)
    }
}

impl GeneratedQuestion {
    /// Generated items arrive without an id and sometimes without levels.
    pub fn into_draft(self) -> QuestionDraft {
        QuestionDraft {
            id: None,
            question: self.question,
            options: self.options,
            correct_answer: Some(self.answer).filter(|a| !a.is_empty()),
            difficulty: self.level.and_then(|l| l.parse().ok()),
            blooms: self.blooms.and_then(|b| b.parse().ok()),
            tags: self.tags,
            explanation: None,
        }
    }
}

pub const IMPORT_COLUMNS: [&str; 9] = [
    "Question",
    "Option1",
    "Option2",
    "Option3",
    "Option4",
    "Correct_Answer",
    "Level",
    "Tags",
    "Blooms",
];

const REQUIRED_IMPORT_COLUMNS: [&str; 6] =
    ["Question", "Option1", "Option2", "Correct_Answer", "Level", "Blooms"];

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SkippedRow {
    /// 1-based sheet row, counting the header.
    pub row: usize,
    pub reason: String,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct ImportReport {
    pub questions: Vec<Question>,
    pub skipped: Vec<SkippedRow>,
}

/// Parses an uploaded sheet. The first row is the header; column order is
/// free but every required column must be present.
pub fn import_rows(rows: &[Vec<String>]) -> Result<ImportReport> {
    let Some((header, body)) = rows.split_first() else {
        return Err(Error::BadRequest("The uploaded sheet is empty.".into()));
    };
    let index: HashMap<&str, usize> = header
        .iter()
        .enumerate()
        .map(|(i, name)| (name.trim(), i))
        .collect();

    let missing: Vec<&str> = REQUIRED_IMPORT_COLUMNS
        .iter()
        .filter(|col| !index.contains_key(*col))
        .copied()
        .collect();
    if !missing.is_empty() {
        return Err(Error::BadRequest(format!(
            "Missing required columns: {}",
            missing.join(", ")
        )));
    }

    let mut report = ImportReport::default();
    for (offset, row) in body.iter().enumerate() {
        let cell = |col: &str| {
            index
                .get(col)
                .and_then(|&i| row.get(i))
                .map(|v| v.trim().to_string())
                .unwrap_or_default()
        };
        if row.iter().all(|c| c.trim().is_empty()) {
            continue;
        }

        let row_no = offset + 2;
        let mut draft = QuestionDraft {
            question: cell("Question"),
            options: ["Option1", "Option2", "Option3", "Option4"]
                .iter()
                .map(|&c| cell(c))
                .filter(|o| !o.is_empty())
                .collect(),
            correct_answer: Some(cell("Correct_Answer")),
            tags: split_tags(&cell("Tags")),
            ..Default::default()
        };
        // Sheets without tags fall back to the level so the row is not lost.
        if draft.tags.is_empty() {
            draft.tags = vec![cell("Level")];
        }

        let parsed = cell("Level")
            .parse::<Difficulty>()
            .and_then(|d| cell("Blooms").parse::<BloomLevel>().map(|b| (d, b)));
        match parsed {
            Ok((difficulty, blooms)) => {
                draft.difficulty = Some(difficulty);
                draft.blooms = Some(blooms);
            }
            Err(reason) => {
                report.skipped.push(SkippedRow { row: row_no, reason });
                continue;
            }
        }

        match draft.validate() {
            Ok(q) => report.questions.push(q),
            Err(e) => report.skipped.push(SkippedRow {
                row: row_no,
                reason: e.to_string(),
            }),
        }
    }

    if !report.skipped.is_empty() {
        warn!(skipped = report.skipped.len(), imported = report.questions.len(), "question import skipped rows");
    }
    Ok(report)
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QuestionLibrary {
    pub questions: Vec<Question>,
    pub available_tags: Vec<String>,
    pub available_blooms: Vec<BloomLevel>,
    pub total: usize,
}

/// Question endpoints. All calls carry the contest token obtained when the
/// test was created.
#[derive(Clone)]
pub struct QuestionService {
    api: ApiClient,
    session: SessionCache,
}

impl QuestionService {
    pub fn new(api: ApiClient, session: SessionCache) -> Self {
        Self { api, session }
    }

    async fn contest_token(&self) -> Result<String> {
        self.session
            .contest_token()
            .await
            .ok_or_else(|| Error::Unauthorized("No contest token. Create or open a test first.".into()))
    }

    pub async fn fetch_all(&self) -> Result<Vec<Question>> {
        let token = self.contest_token().await?;
        let bank: QuestionBank = self
            .api
            .request(reqwest::Method::GET, "/api/fetch-all-questions/")?
            .bearer(token)
            .send("Failed to fetch questions")
            .await?;
        Ok(bank.questions)
    }

    /// The bank as the library view shows it: untagged questions tagged
    /// "No tags", then filtered, with the sidebar's tag and level choices
    /// taken from the whole bank.
    pub async fn library(&self, filter: &QuestionBankFilter) -> Result<QuestionLibrary> {
        let bank = normalize_library(self.fetch_all().await?);
        Ok(QuestionLibrary {
            questions: filter.apply(&bank),
            available_tags: available_tags(&bank),
            available_blooms: available_blooms(&bank),
            total: bank.len(),
        })
    }

    pub async fn generate(&self, request: GenerationRequest) -> Result<Vec<QuestionDraft>> {
        let payload = request.into_payload()?;
        info!(topic = %payload.topic, count = payload.num_questions, "requesting generated questions");
        let generated: GeneratedQuestions = self
            .api
            .post(
                "/api/mcq/api/generate-questions/",
                &payload,
                "Failed to generate questions",
            )
            .await?;
        Ok(generated
            .questions
            .into_iter()
            .map(GeneratedQuestion::into_draft)
            .collect())
    }

    pub async fn save(&self, questions: &[Question]) -> Result<()> {
        if questions.is_empty() {
            return Err(QuestionError::EmptySection.into());
        }
        let token = self.contest_token().await?;
        self.api
            .request(reqwest::Method::POST, "/api/mcq/save-questions/")?
            .bearer(token)
            .json(&SaveQuestionsPayload { questions })
            .send_empty("Failed to save questions")
            .await?;
        info!(count = questions.len(), "questions saved");
        Ok(())
    }

    pub async fn delete(&self, question_id: &str) -> Result<()> {
        let token = self.contest_token().await?;
        self.api
            .request(
                reqwest::Method::DELETE,
                &format!("/api/mcq/delete-question/{}/", question_id),
            )?
            .bearer(token)
            .send_empty("Failed to delete question")
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn draft() -> QuestionDraft {
        QuestionDraft {
            question: "Capital of France?".into(),
            options: vec!["Paris".into(), "Lyon".into()],
            correct_answer: Some("Paris".into()),
            difficulty: Some(Difficulty::Easy),
            blooms: Some(BloomLevel::Remembering),
            tags: vec!["geo".into()],
            ..Default::default()
        }
    }

    #[test]
    fn option_count_is_bounded() {
        let mut d = draft();
        assert_eq!(d.remove_option(0), Err(QuestionError::MinimumOptions));
        d.add_option().unwrap();
        d.add_option().unwrap();
        assert_eq!(d.add_option(), Err(QuestionError::TooManyOptions));
    }

    #[test]
    fn removing_correct_option_clears_answer() {
        let mut d = draft();
        d.add_option().unwrap();
        d.set_option(2, "Nice");
        d.remove_option(0).unwrap();
        assert_eq!(d.correct_answer, None);
        assert_eq!(d.validate(), Err(QuestionError::MissingAnswer));
    }

    #[test]
    fn renaming_correct_option_follows_answer() {
        let mut d = draft();
        d.set_option(0, "Paris ");
        assert_eq!(d.correct_answer.as_deref(), Some("Paris "));
        assert_eq!(d.validate().unwrap().correct_answer, "Paris");
    }

    #[test]
    fn duplicate_options_are_rejected() {
        let mut d = draft();
        d.options = vec!["Paris".into(), "paris".into()];
        assert_eq!(d.validate(), Err(QuestionError::DuplicateOptions));
    }

    #[test]
    fn section_delete_keeps_cursor_consistent() {
        let mut section = QuestionSection::default();
        for text in ["a?", "b?", "c?"] {
            let mut d = draft();
            d.question = text.into();
            section.save(&d).unwrap();
        }
        section.begin_edit(2).unwrap();
        section.delete(0).unwrap();
        assert_eq!(section.editing(), Some(1));
        section.delete(1).unwrap();
        assert_eq!(section.editing(), None);
        assert_eq!(section.len(), 1);
    }

    #[test]
    fn finish_requires_saved_questions() {
        let mut section = QuestionSection::default();
        assert_eq!(section.finish().unwrap_err(), QuestionError::EmptySection);
        section.save(&draft()).unwrap();
        section.mark_dirty();
        assert_eq!(section.finish().unwrap_err(), QuestionError::UnsavedEdit);
    }
}
