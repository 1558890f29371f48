use serde::{Deserialize, Serialize};
use chrono::{DateTime, Utc};

use crate::accessibility::Preferences;

/// Learner's self-reported recall after flipping a card.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Recall {
    /// "Got it!"
    Confident,
    /// "Need practice"
    NeedsPractice,
}

impl Recall {
    pub fn from_recalled(recalled: bool) -> Self {
        if recalled {
            Recall::Confident
        } else {
            Recall::NeedsPractice
        }
    }

    /// SM-2 quality score. The UI only offers two buttons, so only 5 and 2 occur.
    pub fn quality(self) -> u8 {
        match self {
            Recall::Confident => 5,
            Recall::NeedsPractice => 2,
        }
    }
}

/// Scheduling record for one (learner, item) pair.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReviewState {
    pub learner_id: String,
    pub item_id: String,
    pub easiness_factor: f64,
    pub interval_days: u32,
    pub review_count: u32,
    // None until the first review; enrolled cards start without one.
    pub last_reviewed_at: Option<DateTime<Utc>>,
    pub next_review_at: DateTime<Utc>,
    pub confidence_level: Option<u8>,
}

impl ReviewState {
    /// Fresh state for a card that has been enrolled but never reviewed. Due immediately.
    pub fn enrolled(learner_id: String, item_id: String, now: DateTime<Utc>) -> Self {
        Self {
            learner_id,
            item_id,
            easiness_factor: crate::srs::INITIAL_EASINESS,
            interval_days: 1,
            review_count: 0,
            last_reviewed_at: None,
            next_review_at: now,
            confidence_level: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Profile {
    pub learner_id: String,
    pub experience_points: u32,
    pub level: u32,
    pub preferences: Preferences,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BadgeRequirement {
    LessonsCompleted,
}

impl BadgeRequirement {
    pub fn as_str(self) -> &'static str {
        match self {
            BadgeRequirement::LessonsCompleted => "lessons_completed",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "lessons_completed" => Some(BadgeRequirement::LessonsCompleted),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Badge {
    pub id: String,
    pub name: String,
    pub description: String,
    pub icon: String,
    pub requirement: BadgeRequirement,
    pub requirement_value: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QuizKind {
    Lesson,
    Module,
    Course,
}

impl QuizKind {
    pub fn as_str(self) -> &'static str {
        match self {
            QuizKind::Lesson => "lesson",
            QuizKind::Module => "module",
            QuizKind::Course => "course",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "lesson" => Some(QuizKind::Lesson),
            "module" => Some(QuizKind::Module),
            "course" => Some(QuizKind::Course),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuizAttempt {
    pub id: uuid::Uuid,
    pub learner_id: String,
    pub quiz_id: String,
    pub quiz_kind: QuizKind,
    pub score: u32,
    pub passed: bool,
    pub attempt_number: u32,
    pub time_taken_seconds: u32,
    pub attempted_at: DateTime<Utc>,
}

/// Payload sent when a learner finishes a lesson.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct LessonCompletion {
    /// Seconds spent in this session. Added to whatever is already recorded.
    #[serde(default)]
    pub time_spent_seconds: u32,
    /// Flashcards attached to the lesson; enrolled on completion.
    #[serde(default)]
    pub flashcard_ids: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct QuizSubmission {
    pub quiz_id: String,
    pub quiz_kind: QuizKind,
    pub earned_points: u32,
    pub total_points: u32,
    pub passing_score: u32,
    #[serde(default)]
    pub time_taken_seconds: u32,
}
