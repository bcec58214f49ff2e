use chrono::{DateTime, DurationRound, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Duration;

use crate::dto::test_dto::{SaveAssessmentPayload, UpdateAssessmentPayload};
use crate::error::{Error, Result};
use crate::models::test::{
    AssessmentOverview, ResultVisibility, TestConfiguration, TestDuration, TimingType,
};

pub const NOTICE_REQUIRED: &str = "Please fill in all required fields before proceeding.";
pub const NOTICE_START_IN_PAST: &str = "Assessment start time cannot be in the past.";
pub const NOTICE_END_BEFORE_START: &str = "Assessment end time must be greater than start time.";
pub const NOTICE_END_IN_PAST: &str = "Registration end time should be greater than the current time.";
pub const NOTICE_DURATION_TOO_LONG: &str =
    "Duration is greater than the time difference between assessment start and end times.";

/// How long the success notice stays up before the caller navigates away.
pub const REDIRECT_DELAY: Duration = Duration::from_secs(2);

const MAX_PASS_PERCENTAGE: i64 = 100;
const MAX_HOURS: i64 = 23;
const MAX_MINUTES: i64 = 59;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Field {
    Name,
    Description,
    RegistrationStart,
    RegistrationEnd,
    Guidelines,
    TotalMarks,
    Questions,
    Duration,
    PassPercentage,
    ResultVisibility,
    FullScreenModeCount,
    FaceDetectionCount,
    NoiseDetectionCount,
}

impl Field {
    fn required_message(&self) -> &'static str {
        match self {
            Field::Name => "Assessment name is required.",
            Field::Description => "Description is required.",
            Field::RegistrationStart => "Start date is required.",
            Field::RegistrationEnd => "End date is required.",
            Field::Guidelines => "Guidelines are required.",
            Field::TotalMarks => "Total marks are required.",
            Field::Questions => "Number of questions is required.",
            Field::Duration => "Duration is required.",
            Field::PassPercentage => "Pass percentage is required.",
            Field::ResultVisibility => "Result visibility is required.",
            Field::FullScreenModeCount => "Allowed full screen exits are required.",
            Field::FaceDetectionCount => "Allowed face detection violations are required.",
            Field::NoiseDetectionCount => "Allowed noise detection violations are required.",
        }
    }
}

/// Per-field validation messages, ordered by field.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldErrors(BTreeMap<Field, String>);

impl FieldErrors {
    pub fn insert(&mut self, field: Field, message: impl Into<String>) {
        self.0.insert(field, message.into());
    }

    fn require(&mut self, field: Field, present: bool) {
        if !present {
            self.insert(field, field.required_message());
        }
    }

    pub fn remove(&mut self, field: Field) -> Option<String> {
        self.0.remove(&field)
    }

    pub fn get(&self, field: Field) -> Option<&str> {
        self.0.get(&field).map(String::as_str)
    }

    pub fn contains(&self, field: Field) -> bool {
        self.0.contains_key(&field)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&Field, &String)> {
        self.0.iter()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum WizardStep {
    Overview,
    Configuration,
    Submitted,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum WizardMode {
    Create,
    Edit { test_id: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ShuffleType {
    #[default]
    None,
    Questions,
    Options,
    Both,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Proctoring {
    FullScreen,
    FaceDetection,
    NoiseDetection,
}

impl Proctoring {
    fn count_field(&self) -> Field {
        match self {
            Proctoring::FullScreen => Field::FullScreenModeCount,
            Proctoring::FaceDetection => Field::FaceDetectionCount,
            Proctoring::NoiseDetection => Field::NoiseDetectionCount,
        }
    }
}

fn filled(s: &str) -> bool {
    !s.trim().is_empty()
}

fn truncate_to_minute(t: DateTime<Utc>) -> DateTime<Utc> {
    t.duration_trunc(chrono::Duration::minutes(1)).unwrap_or(t)
}

/// Two-step form for creating or editing an MCQ assessment.
///
/// `next` only advances when the current step validates; failures are kept
/// in [`errors`](Self::errors) and returned as [`Error::Form`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssessmentWizard {
    mode: WizardMode,
    step: WizardStep,
    overview: AssessmentOverview,
    configuration: TestConfiguration,
    errors: FieldErrors,
    initial: Option<(AssessmentOverview, TestConfiguration)>,
}

impl AssessmentWizard {
    /// Blank create form with the start seeded to the current minute.
    pub fn create(now: DateTime<Utc>) -> Self {
        let overview = AssessmentOverview {
            registration_start: Some(truncate_to_minute(now)),
            ..Default::default()
        };
        Self {
            mode: WizardMode::Create,
            step: WizardStep::Overview,
            overview,
            configuration: TestConfiguration::default(),
            errors: FieldErrors::default(),
            initial: None,
        }
    }

    pub fn edit(
        test_id: impl Into<String>,
        overview: AssessmentOverview,
        configuration: TestConfiguration,
    ) -> Self {
        Self {
            mode: WizardMode::Edit {
                test_id: test_id.into(),
            },
            step: WizardStep::Overview,
            initial: Some((overview.clone(), configuration.clone())),
            overview,
            configuration,
            errors: FieldErrors::default(),
        }
    }

    pub fn mode(&self) -> &WizardMode {
        &self.mode
    }

    pub fn step(&self) -> WizardStep {
        self.step
    }

    pub fn overview(&self) -> &AssessmentOverview {
        &self.overview
    }

    pub fn configuration(&self) -> &TestConfiguration {
        &self.configuration
    }

    pub fn errors(&self) -> &FieldErrors {
        &self.errors
    }

    pub fn is_edit(&self) -> bool {
        matches!(self.mode, WizardMode::Edit { .. })
    }

    // Overview setters

    pub fn set_name(&mut self, name: impl Into<String>) {
        self.overview.name = name.into();
        self.errors.remove(Field::Name);
    }

    pub fn set_description(&mut self, description: impl Into<String>) {
        self.overview.description = description.into();
        self.errors.remove(Field::Description);
    }

    pub fn set_registration_start(&mut self, start: Option<DateTime<Utc>>) {
        self.overview.registration_start = start;
        self.errors.remove(Field::RegistrationStart);
    }

    pub fn set_registration_end(&mut self, end: Option<DateTime<Utc>>) {
        self.overview.registration_end = end;
        self.errors.remove(Field::RegistrationEnd);
    }

    pub fn set_guidelines(&mut self, guidelines: impl Into<String>) {
        self.overview.guidelines = guidelines.into();
        self.errors.remove(Field::Guidelines);
    }

    pub fn set_section_details(&mut self, sectioned: bool) {
        self.overview.section_details = sectioned;
    }

    pub fn set_timing_type(&mut self, timing: TimingType) {
        self.overview.timing_type = timing;
    }

    // Configuration setters

    pub fn set_total_marks(&mut self, marks: Option<u32>) {
        self.configuration.total_marks = marks;
        self.errors.remove(Field::TotalMarks);
    }

    pub fn set_questions(&mut self, questions: Option<u32>) {
        self.configuration.questions = questions;
        self.errors.remove(Field::Questions);
    }

    /// Hours are clamped to 0..=23 and minutes to 0..=59.
    pub fn set_duration(&mut self, hours: i64, minutes: i64) {
        self.configuration.duration = TestDuration {
            hours: hours.clamp(0, MAX_HOURS) as u32,
            minutes: minutes.clamp(0, MAX_MINUTES) as u32,
        };
        self.errors.remove(Field::Duration);
    }

    /// Clamped to 0..=100.
    pub fn set_pass_percentage(&mut self, percentage: i64) {
        self.configuration.pass_percentage = Some(percentage.clamp(0, MAX_PASS_PERCENTAGE) as u32);
        self.errors.remove(Field::PassPercentage);
    }

    pub fn set_result_visibility(&mut self, visibility: Option<ResultVisibility>) {
        self.configuration.result_visibility = visibility;
        self.errors.remove(Field::ResultVisibility);
    }

    pub fn set_shuffle(&mut self, shuffle: ShuffleType) {
        self.configuration.shuffle_questions =
            matches!(shuffle, ShuffleType::Questions | ShuffleType::Both);
        self.configuration.shuffle_options =
            matches!(shuffle, ShuffleType::Options | ShuffleType::Both);
    }

    pub fn shuffle_type(&self) -> ShuffleType {
        match (
            self.configuration.shuffle_questions,
            self.configuration.shuffle_options,
        ) {
            (true, true) => ShuffleType::Both,
            (true, false) => ShuffleType::Questions,
            (false, true) => ShuffleType::Options,
            (false, false) => ShuffleType::None,
        }
    }

    fn proctoring_slots(&mut self, kind: Proctoring) -> (&mut bool, &mut Option<u32>) {
        let c = &mut self.configuration;
        match kind {
            Proctoring::FullScreen => (&mut c.full_screen_mode, &mut c.full_screen_mode_count),
            Proctoring::FaceDetection => (&mut c.face_detection, &mut c.face_detection_count),
            Proctoring::NoiseDetection => (&mut c.noise_detection, &mut c.noise_detection_count),
        }
    }

    /// Switching a flag on seeds its allowed-violation count to 1;
    /// switching it off clears the count.
    pub fn toggle_proctoring(&mut self, kind: Proctoring, enabled: bool) {
        let (flag, count) = self.proctoring_slots(kind);
        *flag = enabled;
        *count = enabled.then_some(1);
        self.errors.remove(kind.count_field());
    }

    pub fn set_violation_count(&mut self, kind: Proctoring, allowed: Option<u32>) {
        let (_, count) = self.proctoring_slots(kind);
        *count = allowed;
        self.errors.remove(kind.count_field());
    }

    pub fn set_device_restriction(&mut self, enabled: bool) {
        self.configuration.device_restriction = enabled;
    }

    pub fn set_generate_certificate(&mut self, enabled: bool) {
        self.configuration.generate_certificate = enabled;
    }

    // Validation

    fn window_minutes(&self) -> Option<i64> {
        match (self.overview.registration_start, self.overview.registration_end) {
            (Some(start), Some(end)) => Some((end - start).num_minutes()),
            _ => None,
        }
    }

    /// Required fields first; date ordering is only checked once they are
    /// filled in, and reported as the notice.
    pub fn validate_overview(&self, now: DateTime<Utc>) -> (FieldErrors, Option<&'static str>) {
        let o = &self.overview;
        let mut errors = FieldErrors::default();
        errors.require(Field::Name, filled(&o.name));
        errors.require(Field::Description, filled(&o.description));
        if self.is_edit() {
            errors.require(Field::RegistrationStart, o.registration_start.is_some());
        }
        errors.require(Field::RegistrationEnd, o.registration_end.is_some());
        errors.require(Field::Guidelines, filled(&o.guidelines));
        if !errors.is_empty() {
            return (errors, Some(NOTICE_REQUIRED));
        }

        let now = truncate_to_minute(now);
        let notice = match (self.is_edit(), o.registration_start, o.registration_end) {
            (false, Some(start), _) if start < now => {
                errors.insert(Field::RegistrationStart, NOTICE_START_IN_PAST);
                Some(NOTICE_START_IN_PAST)
            }
            (_, Some(start), Some(end)) if end <= start => {
                errors.insert(Field::RegistrationEnd, NOTICE_END_BEFORE_START);
                Some(NOTICE_END_BEFORE_START)
            }
            (_, _, Some(end)) if end <= now => {
                errors.insert(Field::RegistrationEnd, NOTICE_END_IN_PAST);
                Some(NOTICE_END_IN_PAST)
            }
            _ => None,
        };
        (errors, notice)
    }

    pub fn validate_configuration(&self) -> (FieldErrors, Option<&'static str>) {
        let c = &self.configuration;
        let mut errors = FieldErrors::default();

        if !self.overview.section_details {
            errors.require(Field::TotalMarks, c.total_marks.unwrap_or(0) > 0);
            errors.require(Field::Questions, c.questions.unwrap_or(0) > 0);
            errors.require(Field::Duration, !c.duration.is_zero());
        }
        errors.require(Field::PassPercentage, c.pass_percentage.unwrap_or(0) > 0);
        errors.require(Field::ResultVisibility, c.result_visibility.is_some());

        errors.require(
            Field::FullScreenModeCount,
            !c.full_screen_mode || c.full_screen_mode_count.unwrap_or(0) > 0,
        );
        errors.require(
            Field::FaceDetectionCount,
            !c.face_detection || c.face_detection_count.unwrap_or(0) > 0,
        );
        errors.require(
            Field::NoiseDetectionCount,
            !c.noise_detection || c.noise_detection_count.unwrap_or(0) > 0,
        );

        let too_long = self
            .window_minutes()
            .map_or(false, |window| c.duration.total_minutes() > window);
        if too_long {
            errors.insert(Field::Duration, NOTICE_DURATION_TOO_LONG);
            return (errors, Some(NOTICE_DURATION_TOO_LONG));
        }

        let notice = (!errors.is_empty()).then_some(NOTICE_REQUIRED);
        (errors, notice)
    }

    /// Advances one step if the current one validates.
    pub fn next(&mut self, now: DateTime<Utc>) -> Result<WizardStep> {
        let (errors, notice) = match self.step {
            WizardStep::Overview => self.validate_overview(now),
            WizardStep::Configuration => self.validate_configuration(),
            WizardStep::Submitted => return Ok(self.step),
        };
        if let Some(notice) = notice {
            self.errors = errors.clone();
            return Err(Error::Form {
                notice: notice.to_string(),
                fields: errors,
            });
        }

        self.errors = FieldErrors::default();
        if self.step == WizardStep::Overview {
            self.step = WizardStep::Configuration;
        }
        Ok(self.step)
    }

    pub fn previous(&mut self) -> WizardStep {
        if self.step == WizardStep::Configuration {
            self.step = WizardStep::Overview;
        }
        self.step
    }

    /// Runs both gates; used right before submitting.
    pub fn validate_all(&mut self, now: DateTime<Utc>) -> Result<()> {
        for (errors, notice) in [self.validate_overview(now), self.validate_configuration()] {
            if let Some(notice) = notice {
                self.errors = errors.clone();
                return Err(Error::Form {
                    notice: notice.to_string(),
                    fields: errors,
                });
            }
        }
        Ok(())
    }

    /// Edit forms whose content matches what was loaded are not re-sent.
    pub fn has_changed(&self) -> bool {
        match &self.initial {
            Some((overview, configuration)) => {
                overview != &self.overview || configuration != &self.configuration
            }
            None => true,
        }
    }

    pub fn save_payload(&self, contest_id: impl Into<String>) -> SaveAssessmentPayload {
        SaveAssessmentPayload {
            contest_id: contest_id.into(),
            assessment_overview: self.overview.clone(),
            test_configuration: self.configuration.clone(),
        }
    }

    pub fn update_payload(&self) -> UpdateAssessmentPayload {
        UpdateAssessmentPayload {
            assessment_overview: self.overview.clone(),
            test_configuration: self.configuration.clone(),
        }
    }

    /// Called once the server accepted the form. Returns how long to keep
    /// the success notice up before redirecting.
    pub fn mark_submitted(&mut self) -> Duration {
        self.step = WizardStep::Submitted;
        self.initial = Some((self.overview.clone(), self.configuration.clone()));
        REDIRECT_DELAY
    }
}
