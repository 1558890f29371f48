use std::sync::Arc;
use serde::Serialize;

use crate::accessibility::{PreferenceCommand, Preferences};
use crate::clock::Clock;
use crate::db::Db;
use crate::models::{Badge, LessonCompletion, QuizAttempt, QuizSubmission, Recall, ReviewState};
use crate::rewards::{self, LevelProgress};
use crate::srs::{self, DueOrder, ReviewStats};

pub const DEFAULT_DUE_LIMIT: usize = 20;

#[derive(Debug, Serialize)]
pub struct ProfileSummary {
    pub learner_id: String,
    #[serde(flatten)]
    pub progress: LevelProgress,
    pub preferences: Preferences,
    pub badges: Vec<Badge>,
    pub flashcards: ReviewStats,
    pub time_spent_seconds: u64,
}

#[derive(Debug, Serialize)]
pub struct LessonOutcome {
    pub newly_completed: bool,
    pub xp_earned: u32,
    #[serde(flatten)]
    pub progress: LevelProgress,
    pub new_badges: Vec<Badge>,
    pub enrolled: u64,
    pub time_spent_seconds: u32,
}

#[derive(Debug, Serialize)]
pub struct QuizOutcome {
    pub attempt: QuizAttempt,
    pub xp_earned: u32,
    #[serde(flatten)]
    pub progress: LevelProgress,
}

/// Application service. Owns the injected storage client and clock; everything
/// else it calls is pure.
pub struct App {
    pub db: Db,
    clock: Arc<dyn Clock>,
}

impl App {
    pub fn new(db: Db, clock: Arc<dyn Clock>) -> Self {
        Self { db, clock }
    }

    pub async fn review(&self, learner_id: &str, item_id: &str, recall: Recall) -> anyhow::Result<ReviewState> {
        let now = self.clock.now();
        self.db.review_item(learner_id, item_id, recall, now).await
    }

    pub async fn review_state(&self, learner_id: &str, item_id: &str) -> anyhow::Result<Option<ReviewState>> {
        self.db.get_review_state(learner_id, item_id).await
    }

    pub async fn due_items(&self, learner_id: &str, order: DueOrder, limit: usize) -> anyhow::Result<Vec<ReviewState>> {
        let states = self.db.review_states(learner_id).await?;
        let due = srs::select_due_items(states, self.clock.now());
        Ok(srs::arrange_due_items(due, order, limit, &mut rand::thread_rng()))
    }

    pub async fn enroll(&self, learner_id: &str, item_ids: &[String]) -> anyhow::Result<u64> {
        self.db.enroll_items(learner_id, item_ids, self.clock.now()).await
    }

    pub async fn profile(&self, learner_id: &str) -> anyhow::Result<ProfileSummary> {
        let now = self.clock.now();
        let profile = self.db.get_or_create_profile(learner_id, now).await?;
        let badges = self.db.earned_badges(learner_id).await?;
        let flashcards = srs::review_stats(&self.db.review_states(learner_id).await?, now);
        let time_spent_seconds = self.db.total_time_spent(learner_id).await?;

        Ok(ProfileSummary {
            learner_id: profile.learner_id,
            progress: LevelProgress::from_xp(profile.experience_points),
            preferences: profile.preferences,
            badges,
            flashcards,
            time_spent_seconds,
        })
    }

    pub async fn review_stats(&self, learner_id: &str) -> anyhow::Result<ReviewStats> {
        let states = self.db.review_states(learner_id).await?;
        Ok(srs::review_stats(&states, self.clock.now()))
    }

    pub async fn preferences(&self, learner_id: &str) -> anyhow::Result<Preferences> {
        let profile = self.db.get_or_create_profile(learner_id, self.clock.now()).await?;
        Ok(profile.preferences)
    }

    /// Applies one preference command and persists the result.
    pub async fn apply_preference(&self, learner_id: &str, command: PreferenceCommand) -> anyhow::Result<Preferences> {
        let now = self.clock.now();
        let current = self.db.get_or_create_profile(learner_id, now).await?.preferences;
        let updated = current.apply(&command);
        self.db.save_preferences(learner_id, &updated, now).await?;
        log::debug!("Preferences for {} after {:?}", learner_id, command);
        Ok(updated)
    }

    /// Completes a lesson. Status, XP, enrolment and badges commit together.
    pub async fn complete_lesson(
        &self,
        learner_id: &str,
        lesson_id: &str,
        completion: &LessonCompletion,
    ) -> anyhow::Result<LessonOutcome> {
        let record = self
            .db
            .record_lesson_completion(learner_id, lesson_id, completion, self.clock.now())
            .await?;

        if record.newly_completed {
            log::info!(
                "{} completed lesson {} (+{} XP, {} new badge(s), {} card(s) enrolled)",
                learner_id, lesson_id, record.xp_earned, record.new_badges.len(), record.enrolled
            );
        }

        Ok(LessonOutcome {
            newly_completed: record.newly_completed,
            xp_earned: record.xp_earned,
            progress: LevelProgress::from_xp(record.experience_points),
            new_badges: record.new_badges,
            enrolled: record.enrolled,
            time_spent_seconds: record.time_spent_seconds,
        })
    }

    pub async fn submit_quiz(&self, learner_id: &str, submission: &QuizSubmission) -> anyhow::Result<QuizOutcome> {
        let grade = rewards::grade_quiz(
            submission.earned_points,
            submission.total_points,
            submission.passing_score,
        );

        let record = self
            .db
            .record_quiz_attempt(learner_id, submission, grade, self.clock.now())
            .await?;

        Ok(QuizOutcome {
            attempt: record.attempt,
            xp_earned: record.xp_earned,
            progress: LevelProgress::from_xp(record.experience_points),
        })
    }

    pub async fn quiz_attempts(&self, learner_id: &str) -> anyhow::Result<Vec<QuizAttempt>> {
        self.db.quiz_attempts(learner_id).await
    }
}

#[cfg(test)]
#[path = "app_tests.rs"]
mod app_tests;
