use sqlx::{sqlite::{SqlitePool, SqlitePoolOptions, SqliteConnectOptions, SqliteConnection, SqliteJournalMode, SqliteRow, SqliteSynchronous}, ConnectOptions, Row};
use chrono::{DateTime, Utc};
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;

use crate::accessibility::Preferences;
use crate::data::BADGE_DATA;
use crate::models::{Badge, BadgeRequirement, LessonCompletion, Profile, QuizAttempt, QuizKind, QuizSubmission, Recall, ReviewState};
use crate::rewards::{self, QuizGrade};
use crate::srs;

fn clamp_u32(v: i64) -> u32 {
    v.clamp(0, u32::MAX as i64) as u32
}

impl<'r> sqlx::FromRow<'r, SqliteRow> for ReviewState {
    fn from_row(row: &'r SqliteRow) -> Result<Self, sqlx::Error> {
        let learner_id: String = row.try_get("learner_id")?;
        let item_id: String = row.try_get("item_id")?;

        // SQLite stores NaN as NULL.
        let easiness_factor: Option<f64> = row.try_get("easiness_factor")?;
        let interval_days: i64 = row.try_get("interval_days")?;
        let review_count: i64 = row.try_get("review_count")?;

        let last_reviewed_at: Option<DateTime<Utc>> = row.try_get("last_reviewed_at")?;
        let next_review_at: DateTime<Utc> = row.try_get("next_review_at")?;
        let confidence_level: Option<i64> = row.try_get("confidence_level")?;

        Ok(ReviewState {
            learner_id,
            item_id,
            easiness_factor: easiness_factor.unwrap_or(srs::INITIAL_EASINESS).max(srs::MIN_EASINESS),
            interval_days: clamp_u32(interval_days).max(1),
            review_count: clamp_u32(review_count),
            last_reviewed_at,
            next_review_at,
            confidence_level: confidence_level.map(|q| q.clamp(0, 5) as u8),
        })
    }
}

impl<'r> sqlx::FromRow<'r, SqliteRow> for Profile {
    fn from_row(row: &'r SqliteRow) -> Result<Self, sqlx::Error> {
        let learner_id: String = row.try_get("learner_id")?;
        let experience_points: i64 = row.try_get("experience_points")?;
        let raw_preferences: String = row.try_get("preferences")?;

        let preferences = serde_json::from_str(&raw_preferences).unwrap_or_else(|e| {
            log::warn!("Unreadable preferences for {}, using defaults: {}", learner_id, e);
            Preferences::default()
        });

        let experience_points = clamp_u32(experience_points);
        Ok(Profile {
            learner_id,
            experience_points,
            level: rewards::level_for(experience_points),
            preferences,
        })
    }
}

impl<'r> sqlx::FromRow<'r, SqliteRow> for Badge {
    fn from_row(row: &'r SqliteRow) -> Result<Self, sqlx::Error> {
        let requirement_type: String = row.try_get("requirement_type")?;
        let requirement = BadgeRequirement::parse(&requirement_type).ok_or_else(|| {
            sqlx::Error::ColumnDecode {
                index: "requirement_type".to_string(),
                source: format!("unknown badge requirement '{}'", requirement_type).into(),
            }
        })?;
        let requirement_value: i64 = row.try_get("requirement_value")?;

        Ok(Badge {
            id: row.try_get("id")?,
            name: row.try_get("name")?,
            description: row.try_get("description")?,
            icon: row.try_get("icon")?,
            requirement,
            requirement_value: clamp_u32(requirement_value),
        })
    }
}

impl<'r> sqlx::FromRow<'r, SqliteRow> for QuizAttempt {
    fn from_row(row: &'r SqliteRow) -> Result<Self, sqlx::Error> {
        let raw_id: String = row.try_get("id")?;
        let id = uuid::Uuid::parse_str(&raw_id).map_err(|e| sqlx::Error::ColumnDecode {
            index: "id".to_string(),
            source: Box::new(e),
        })?;
        let raw_kind: String = row.try_get("quiz_kind")?;
        let quiz_kind = QuizKind::parse(&raw_kind).ok_or_else(|| sqlx::Error::ColumnDecode {
            index: "quiz_kind".to_string(),
            source: format!("unknown quiz kind '{}'", raw_kind).into(),
        })?;

        let score: i64 = row.try_get("score")?;
        let attempt_number: i64 = row.try_get("attempt_number")?;
        let time_taken: i64 = row.try_get("time_taken")?;

        Ok(QuizAttempt {
            id,
            learner_id: row.try_get("learner_id")?,
            quiz_id: row.try_get("quiz_id")?,
            quiz_kind,
            score: clamp_u32(score),
            passed: row.try_get("passed")?,
            attempt_number: clamp_u32(attempt_number),
            time_taken_seconds: clamp_u32(time_taken),
            attempted_at: row.try_get("attempted_at")?,
        })
    }
}

/// Result of recording a lesson completion.
#[derive(Debug)]
pub struct LessonRecord {
    pub newly_completed: bool,
    pub xp_earned: u32,
    pub experience_points: u32,
    /// Total time on this lesson across sessions.
    pub time_spent_seconds: u32,
    pub new_badges: Vec<Badge>,
    pub enrolled: u64,
}

#[derive(Debug)]
pub struct QuizRecord {
    pub attempt: QuizAttempt,
    pub xp_earned: u32,
    pub experience_points: u32,
}

/// Storage client. Cheap to clone; clones share the pool and the writer lock.
#[derive(Clone)]
pub struct Db {
    pool: SqlitePool,
    // Held for every write. SQLite has a single writer, and a deferred transaction
    // that upgrades from read to write after another connection committed fails with
    // SQLITE_BUSY_SNAPSHOT straight away instead of waiting out the busy timeout.
    writer: Arc<Mutex<()>>,
}

impl Db {
    pub async fn connect(url: &str, max_connections: u32) -> anyhow::Result<Self> {
        let options = SqliteConnectOptions::from_str(url)?
            .journal_mode(SqliteJournalMode::Wal)
            .synchronous(SqliteSynchronous::Normal)
            .busy_timeout(Duration::from_secs(5))
            .log_statements(log::LevelFilter::Trace);

        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections)
            .connect_with(options)
            .await?;

        Self::with_pool(pool).await
    }

    /// Private in-memory database. One connection, never recycled, or the data vanishes.
    #[cfg(test)]
    pub async fn in_memory() -> anyhow::Result<Self> {
        let options = SqliteConnectOptions::from_str("sqlite::memory:")?;
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(options)
            .await?;

        Self::with_pool(pool).await
    }

    async fn with_pool(pool: SqlitePool) -> anyhow::Result<Self> {
        let db = Db { pool, writer: Arc::new(Mutex::new(())) };
        db.migrate().await?;
        db.seed_database_if_empty().await?;
        Ok(db)
    }

    async fn migrate(&self) -> anyhow::Result<()> {
        let statements = [
            r#"
            CREATE TABLE IF NOT EXISTS review_states (
                learner_id TEXT NOT NULL,
                item_id TEXT NOT NULL,
                easiness_factor REAL DEFAULT 2.5,
                interval_days INTEGER NOT NULL DEFAULT 1,
                review_count INTEGER NOT NULL DEFAULT 0,
                last_reviewed_at DATETIME,
                next_review_at DATETIME NOT NULL,
                confidence_level INTEGER,
                PRIMARY KEY (learner_id, item_id)
            )
            "#,
            r#"
            CREATE TABLE IF NOT EXISTS profiles (
                learner_id TEXT PRIMARY KEY,
                experience_points INTEGER NOT NULL DEFAULT 0,
                level INTEGER NOT NULL DEFAULT 1,
                preferences TEXT NOT NULL DEFAULT '{}',
                created_at DATETIME NOT NULL
            )
            "#,
            r#"
            CREATE TABLE IF NOT EXISTS lesson_progress (
                learner_id TEXT NOT NULL,
                lesson_id TEXT NOT NULL,
                status TEXT NOT NULL,
                time_spent INTEGER NOT NULL DEFAULT 0,
                completed_at DATETIME,
                PRIMARY KEY (learner_id, lesson_id)
            )
            "#,
            r#"
            CREATE TABLE IF NOT EXISTS badges (
                id TEXT PRIMARY KEY,
                name TEXT NOT NULL,
                description TEXT NOT NULL,
                icon TEXT NOT NULL,
                requirement_type TEXT NOT NULL,
                requirement_value INTEGER NOT NULL
            )
            "#,
            r#"
            CREATE TABLE IF NOT EXISTS learner_badges (
                learner_id TEXT NOT NULL,
                badge_id TEXT NOT NULL REFERENCES badges(id),
                earned_at DATETIME NOT NULL,
                PRIMARY KEY (learner_id, badge_id)
            )
            "#,
            r#"
            CREATE TABLE IF NOT EXISTS quiz_attempts (
                id TEXT PRIMARY KEY,
                learner_id TEXT NOT NULL,
                quiz_id TEXT NOT NULL,
                quiz_kind TEXT NOT NULL,
                score INTEGER NOT NULL,
                passed BOOLEAN NOT NULL,
                attempt_number INTEGER NOT NULL,
                time_taken INTEGER NOT NULL DEFAULT 0,
                attempted_at DATETIME NOT NULL
            )
            "#,
        ];

        for statement in statements {
            sqlx::query(statement).execute(&self.pool).await?;
        }

        // Databases created before quiz timing was recorded. Fails harmlessly once the column exists.
        let _ = sqlx::query("ALTER TABLE quiz_attempts ADD COLUMN time_taken INTEGER NOT NULL DEFAULT 0")
            .execute(&self.pool)
            .await;

        Ok(())
    }

    async fn seed_database_if_empty(&self) -> anyhow::Result<()> {
        let _writer = self.writer.lock().await;
        let count: i64 = sqlx::query_scalar("SELECT count(*) FROM badges")
            .fetch_one(&self.pool)
            .await?;

        if count == 0 {
            for badge in BADGE_DATA {
                sqlx::query(
                    "INSERT OR IGNORE INTO badges (id, name, description, icon, requirement_type, requirement_value) VALUES (?, ?, ?, ?, ?, ?)"
                )
                .bind(badge.id)
                .bind(badge.name)
                .bind(badge.description)
                .bind(badge.icon)
                .bind(BadgeRequirement::LessonsCompleted.as_str())
                .bind(badge.lessons_required as i64)
                .execute(&self.pool)
                .await?;
            }
            log::info!("Seeded {} badges", BADGE_DATA.len());
        }
        Ok(())
    }

    // --- Review states ---

    pub async fn get_review_state(&self, learner_id: &str, item_id: &str) -> anyhow::Result<Option<ReviewState>> {
        let state = sqlx::query_as::<_, ReviewState>(
            "SELECT * FROM review_states WHERE learner_id = ? AND item_id = ?"
        )
        .bind(learner_id)
        .bind(item_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(state)
    }

    pub async fn review_states(&self, learner_id: &str) -> anyhow::Result<Vec<ReviewState>> {
        let states = sqlx::query_as::<_, ReviewState>(
            "SELECT * FROM review_states WHERE learner_id = ?"
        )
        .bind(learner_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(states)
    }

    /// Read, schedule and write back one review inside a single transaction.
    pub async fn review_item(
        &self,
        learner_id: &str,
        item_id: &str,
        recall: Recall,
        now: DateTime<Utc>,
    ) -> anyhow::Result<ReviewState> {
        let _writer = self.writer.lock().await;
        let mut tx = self.pool.begin().await?;

        let prior = sqlx::query_as::<_, ReviewState>(
            "SELECT * FROM review_states WHERE learner_id = ? AND item_id = ?"
        )
        .bind(learner_id)
        .bind(item_id)
        .fetch_optional(&mut *tx)
        .await?;

        let next = srs::schedule_next_review(learner_id, item_id, prior.as_ref(), recall, now);
        write_review_state(&mut *tx, &next).await?;

        tx.commit().await?;

        log::debug!(
            "Reviewed {}/{}: quality {}, next in {} day(s)",
            learner_id, item_id, recall.quality(), next.interval_days
        );
        Ok(next)
    }

    /// Creates fresh states for items the learner has not seen yet. Returns how many were new.
    pub async fn enroll_items(&self, learner_id: &str, item_ids: &[String], now: DateTime<Utc>) -> anyhow::Result<u64> {
        let _writer = self.writer.lock().await;
        let mut tx = self.pool.begin().await?;
        let enrolled = insert_enrolled(&mut *tx, learner_id, item_ids, now).await?;
        tx.commit().await?;
        Ok(enrolled)
    }

    // --- Profiles ---

    pub async fn get_or_create_profile(&self, learner_id: &str, now: DateTime<Utc>) -> anyhow::Result<Profile> {
        if let Some(profile) = self.find_profile(learner_id).await? {
            return Ok(profile);
        }

        {
            let _writer = self.writer.lock().await;
            let mut conn = self.pool.acquire().await?;
            ensure_profile(&mut *conn, learner_id, now).await?;
        }

        let profile = self
            .find_profile(learner_id)
            .await?
            .ok_or_else(|| anyhow::anyhow!("profile for {} vanished after insert", learner_id))?;
        Ok(profile)
    }

    async fn find_profile(&self, learner_id: &str) -> anyhow::Result<Option<Profile>> {
        let profile = sqlx::query_as::<_, Profile>("SELECT * FROM profiles WHERE learner_id = ?")
            .bind(learner_id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(profile)
    }

    pub async fn save_preferences(&self, learner_id: &str, preferences: &Preferences, now: DateTime<Utc>) -> anyhow::Result<()> {
        let encoded = serde_json::to_string(preferences)?;
        let _writer = self.writer.lock().await;
        sqlx::query(
            r#"
            INSERT INTO profiles (learner_id, experience_points, level, preferences, created_at)
            VALUES (?, 0, 1, ?, ?)
            ON CONFLICT(learner_id) DO UPDATE SET preferences = excluded.preferences
            "#
        )
        .bind(learner_id)
        .bind(encoded)
        .bind(now)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    // --- Lessons ---

    /// Records a finished lesson session in one transaction: accumulated time,
    /// completion status, first-completion XP, flashcard enrolment and badges.
    /// Repeating a completed lesson only adds time.
    pub async fn record_lesson_completion(
        &self,
        learner_id: &str,
        lesson_id: &str,
        completion: &LessonCompletion,
        now: DateTime<Utc>,
    ) -> anyhow::Result<LessonRecord> {
        let _writer = self.writer.lock().await;
        let mut tx = self.pool.begin().await?;
        ensure_profile(&mut *tx, learner_id, now).await?;

        let status: Option<String> = sqlx::query_scalar(
            "SELECT status FROM lesson_progress WHERE learner_id = ? AND lesson_id = ?"
        )
        .bind(learner_id)
        .bind(lesson_id)
        .fetch_optional(&mut *tx)
        .await?;
        let newly_completed = status.as_deref() != Some("completed");

        let time_spent: i64 = sqlx::query_scalar(
            r#"
            INSERT INTO lesson_progress (learner_id, lesson_id, status, time_spent, completed_at)
            VALUES (?, ?, 'completed', ?, ?)
            ON CONFLICT(learner_id, lesson_id) DO UPDATE SET
                status = 'completed',
                time_spent = lesson_progress.time_spent + excluded.time_spent,
                completed_at = COALESCE(lesson_progress.completed_at, excluded.completed_at)
            RETURNING time_spent
            "#
        )
        .bind(learner_id)
        .bind(lesson_id)
        .bind(completion.time_spent_seconds as i64)
        .bind(now)
        .fetch_one(&mut *tx)
        .await?;

        let xp_earned = if newly_completed { rewards::LESSON_XP } else { 0 };
        let experience_points = add_experience(&mut *tx, learner_id, xp_earned).await?;
        let enrolled = insert_enrolled(&mut *tx, learner_id, &completion.flashcard_ids, now).await?;

        let completed: i64 = sqlx::query_scalar(
            "SELECT count(*) FROM lesson_progress WHERE learner_id = ? AND status = 'completed'"
        )
        .bind(learner_id)
        .fetch_one(&mut *tx)
        .await?;
        let catalogue = sqlx::query_as::<_, Badge>("SELECT * FROM badges ORDER BY requirement_value ASC, id ASC")
            .fetch_all(&mut *tx)
            .await?;
        let held: Vec<String> = sqlx::query_scalar("SELECT badge_id FROM learner_badges WHERE learner_id = ?")
            .bind(learner_id)
            .fetch_all(&mut *tx)
            .await?;
        let new_badges: Vec<Badge> = rewards::newly_earned(&catalogue, &held, clamp_u32(completed))
            .into_iter()
            .cloned()
            .collect();
        grant_badges(&mut *tx, learner_id, &new_badges, now).await?;

        tx.commit().await?;

        Ok(LessonRecord {
            newly_completed,
            xp_earned,
            experience_points,
            time_spent_seconds: clamp_u32(time_spent),
            new_badges,
            enrolled,
        })
    }

    /// Seconds spent across all of a learner's lessons.
    pub async fn total_time_spent(&self, learner_id: &str) -> anyhow::Result<u64> {
        let total: i64 = sqlx::query_scalar(
            "SELECT COALESCE(SUM(time_spent), 0) FROM lesson_progress WHERE learner_id = ?"
        )
        .bind(learner_id)
        .fetch_one(&self.pool)
        .await?;
        Ok(total.max(0) as u64)
    }

    // --- Badges ---

    pub async fn earned_badges(&self, learner_id: &str) -> anyhow::Result<Vec<Badge>> {
        let badges = sqlx::query_as::<_, Badge>(
            r#"
            SELECT b.* FROM badges b
            JOIN learner_badges lb ON lb.badge_id = b.id
            WHERE lb.learner_id = ?
            ORDER BY lb.earned_at ASC, b.requirement_value ASC
            "#
        )
        .bind(learner_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(badges)
    }

    // --- Quizzes ---

    /// Stores a graded attempt and credits its XP in the same transaction.
    pub async fn record_quiz_attempt(
        &self,
        learner_id: &str,
        submission: &QuizSubmission,
        grade: QuizGrade,
        now: DateTime<Utc>,
    ) -> anyhow::Result<QuizRecord> {
        let _writer = self.writer.lock().await;
        let mut tx = self.pool.begin().await?;
        ensure_profile(&mut *tx, learner_id, now).await?;

        let previous: i64 = sqlx::query_scalar(
            "SELECT count(*) FROM quiz_attempts WHERE learner_id = ? AND quiz_id = ?"
        )
        .bind(learner_id)
        .bind(&submission.quiz_id)
        .fetch_one(&mut *tx)
        .await?;

        let attempt = QuizAttempt {
            id: uuid::Uuid::new_v4(),
            learner_id: learner_id.to_string(),
            quiz_id: submission.quiz_id.clone(),
            quiz_kind: submission.quiz_kind,
            score: grade.score,
            passed: grade.passed,
            attempt_number: clamp_u32(previous) + 1,
            time_taken_seconds: submission.time_taken_seconds,
            attempted_at: now,
        };

        sqlx::query(
            "INSERT INTO quiz_attempts (id, learner_id, quiz_id, quiz_kind, score, passed, attempt_number, time_taken, attempted_at) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)"
        )
        .bind(attempt.id.to_string())
        .bind(&attempt.learner_id)
        .bind(&attempt.quiz_id)
        .bind(attempt.quiz_kind.as_str())
        .bind(attempt.score as i64)
        .bind(attempt.passed)
        .bind(attempt.attempt_number as i64)
        .bind(attempt.time_taken_seconds as i64)
        .bind(attempt.attempted_at)
        .execute(&mut *tx)
        .await?;

        let xp_earned = rewards::quiz_xp(attempt.quiz_kind, attempt.passed);
        let experience_points = add_experience(&mut *tx, learner_id, xp_earned).await?;

        tx.commit().await?;
        Ok(QuizRecord { attempt, xp_earned, experience_points })
    }

    /// Attempt history, newest first.
    pub async fn quiz_attempts(&self, learner_id: &str) -> anyhow::Result<Vec<QuizAttempt>> {
        let attempts = sqlx::query_as::<_, QuizAttempt>(
            "SELECT * FROM quiz_attempts WHERE learner_id = ? ORDER BY attempted_at DESC, attempt_number DESC"
        )
        .bind(learner_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(attempts)
    }
}

/// Inserts a default profile if the learner has none.
async fn ensure_profile(conn: &mut SqliteConnection, learner_id: &str, now: DateTime<Utc>) -> anyhow::Result<()> {
    let defaults = serde_json::to_string(&Preferences::default())?;
    let created = sqlx::query(
        "INSERT OR IGNORE INTO profiles (learner_id, experience_points, level, preferences, created_at) VALUES (?, 0, 1, ?, ?)"
    )
    .bind(learner_id)
    .bind(defaults)
    .bind(now)
    .execute(conn)
    .await?;

    if created.rows_affected() > 0 {
        log::info!("Created profile for learner {}", learner_id);
    }
    Ok(())
}

/// Credits XP and refreshes the stored level. Returns the new total.
async fn add_experience(conn: &mut SqliteConnection, learner_id: &str, xp: u32) -> anyhow::Result<u32> {
    let total: i64 = sqlx::query_scalar(
        "UPDATE profiles SET experience_points = experience_points + ? WHERE learner_id = ? RETURNING experience_points"
    )
    .bind(xp as i64)
    .bind(learner_id)
    .fetch_one(&mut *conn)
    .await?;

    let total = clamp_u32(total);
    sqlx::query("UPDATE profiles SET level = ? WHERE learner_id = ?")
        .bind(rewards::level_for(total) as i64)
        .bind(learner_id)
        .execute(&mut *conn)
        .await?;
    Ok(total)
}

async fn insert_enrolled(
    conn: &mut SqliteConnection,
    learner_id: &str,
    item_ids: &[String],
    now: DateTime<Utc>,
) -> anyhow::Result<u64> {
    let mut enrolled = 0;
    for item_id in item_ids {
        let state = ReviewState::enrolled(learner_id.to_string(), item_id.clone(), now);
        let result = sqlx::query(
            "INSERT OR IGNORE INTO review_states (learner_id, item_id, easiness_factor, interval_days, review_count, last_reviewed_at, next_review_at, confidence_level) VALUES (?, ?, ?, ?, ?, ?, ?, ?)"
        )
        .bind(&state.learner_id)
        .bind(&state.item_id)
        .bind(state.easiness_factor)
        .bind(state.interval_days as i64)
        .bind(state.review_count as i64)
        .bind(state.last_reviewed_at)
        .bind(state.next_review_at)
        .bind(state.confidence_level.map(|q| q as i64))
        .execute(&mut *conn)
        .await?;
        enrolled += result.rows_affected();
    }
    Ok(enrolled)
}

async fn grant_badges(conn: &mut SqliteConnection, learner_id: &str, badges: &[Badge], now: DateTime<Utc>) -> anyhow::Result<()> {
    for badge in badges {
        sqlx::query("INSERT OR IGNORE INTO learner_badges (learner_id, badge_id, earned_at) VALUES (?, ?, ?)")
            .bind(learner_id)
            .bind(&badge.id)
            .bind(now)
            .execute(&mut *conn)
            .await?;
    }
    Ok(())
}

async fn write_review_state(conn: &mut SqliteConnection, state: &ReviewState) -> anyhow::Result<()> {
    sqlx::query(
        r#"
        INSERT INTO review_states (learner_id, item_id, easiness_factor, interval_days, review_count, last_reviewed_at, next_review_at, confidence_level)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?)
        ON CONFLICT(learner_id, item_id) DO UPDATE SET
            easiness_factor = excluded.easiness_factor,
            interval_days = excluded.interval_days,
            review_count = excluded.review_count,
            last_reviewed_at = excluded.last_reviewed_at,
            next_review_at = excluded.next_review_at,
            confidence_level = excluded.confidence_level
        "#
    )
    .bind(&state.learner_id)
    .bind(&state.item_id)
    .bind(state.easiness_factor)
    .bind(state.interval_days as i64)
    .bind(state.review_count as i64)
    .bind(state.last_reviewed_at)
    .bind(state.next_review_at)
    .bind(state.confidence_level.map(|q| q as i64))
    .execute(conn)
    .await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn day0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 1, 9, 0, 0).unwrap()
    }

    #[tokio::test]
    async fn test_review_round_trips_through_storage() {
        let db = Db::in_memory().await.unwrap();
        assert!(db.get_review_state("ana", "card-1").await.unwrap().is_none());

        let first = db.review_item("ana", "card-1", Recall::Confident, day0()).await.unwrap();
        assert_eq!(first.review_count, 1);

        let stored = db.get_review_state("ana", "card-1").await.unwrap().unwrap();
        assert_eq!(stored, first);

        let later = day0() + Duration::days(1);
        let second = db.review_item("ana", "card-1", Recall::Confident, later).await.unwrap();
        assert_eq!(second.interval_days, 6);
        assert_eq!(second.review_count, 2);
        assert_eq!(db.get_review_state("ana", "card-1").await.unwrap().unwrap(), second);
    }

    #[tokio::test]
    async fn test_states_are_keyed_per_learner() {
        let db = Db::in_memory().await.unwrap();
        db.review_item("ana", "card-1", Recall::Confident, day0()).await.unwrap();
        db.review_item("ben", "card-1", Recall::NeedsPractice, day0()).await.unwrap();

        assert_eq!(db.review_states("ana").await.unwrap().len(), 1);
        let ben = db.get_review_state("ben", "card-1").await.unwrap().unwrap();
        assert_eq!(ben.confidence_level, Some(2));
    }

    #[tokio::test]
    async fn test_enroll_does_not_overwrite_progress() {
        let db = Db::in_memory().await.unwrap();
        let reviewed = db.review_item("ana", "card-1", Recall::Confident, day0()).await.unwrap();

        let items = vec!["card-1".to_string(), "card-2".to_string()];
        assert_eq!(db.enroll_items("ana", &items, day0()).await.unwrap(), 1);
        assert_eq!(db.enroll_items("ana", &items, day0()).await.unwrap(), 0);

        assert_eq!(db.get_review_state("ana", "card-1").await.unwrap().unwrap(), reviewed);
        let fresh = db.get_review_state("ana", "card-2").await.unwrap().unwrap();
        assert_eq!(fresh.review_count, 0);
        assert_eq!(fresh.last_reviewed_at, None);
        assert_eq!(fresh.next_review_at, day0());
    }

    #[tokio::test]
    async fn test_corrupted_row_is_clamped_on_read() {
        let db = Db::in_memory().await.unwrap();
        sqlx::query(
            "INSERT INTO review_states (learner_id, item_id, easiness_factor, interval_days, review_count, next_review_at) VALUES ('ana', 'bad', 0.2, -7, -3, ?)"
        )
        .bind(day0())
        .execute(&db.pool)
        .await
        .unwrap();

        let state = db.get_review_state("ana", "bad").await.unwrap().unwrap();
        assert_eq!(state.easiness_factor, srs::MIN_EASINESS);
        assert_eq!(state.interval_days, 1);
        assert_eq!(state.review_count, 0);
    }

    #[tokio::test]
    async fn test_profile_preferences_and_xp() {
        let db = Db::in_memory().await.unwrap();
        let profile = db.get_or_create_profile("ana", day0()).await.unwrap();
        assert_eq!(profile.experience_points, 0);
        assert_eq!(profile.level, 1);
        assert_eq!(profile.preferences, Preferences::default());

        let prefs = Preferences { dark_mode: true, ..Preferences::default() };
        db.save_preferences("ana", &prefs, day0()).await.unwrap();

        let grade = QuizGrade { score: 90, passed: true };
        let record = db.record_quiz_attempt("ana", &quiz("final", QuizKind::Course), grade, day0()).await.unwrap();
        assert_eq!(record.xp_earned, 100);
        assert_eq!(record.experience_points, 100);

        let reloaded = db.get_or_create_profile("ana", day0()).await.unwrap();
        assert_eq!(reloaded.experience_points, 100);
        assert_eq!(reloaded.level, 2);
        assert!(reloaded.preferences.dark_mode);
    }

    fn lesson(seconds: u32, cards: &[&str]) -> LessonCompletion {
        LessonCompletion {
            time_spent_seconds: seconds,
            flashcard_ids: cards.iter().map(|c| c.to_string()).collect(),
        }
    }

    fn quiz(quiz_id: &str, quiz_kind: QuizKind) -> QuizSubmission {
        QuizSubmission {
            quiz_id: quiz_id.to_string(),
            quiz_kind,
            earned_points: 0,
            total_points: 10,
            passing_score: 70,
            time_taken_seconds: 0,
        }
    }

    #[tokio::test]
    async fn test_lesson_completion_awards_once_and_accumulates_time() {
        let db = Db::in_memory().await.unwrap();
        let first = db.record_lesson_completion("ana", "lesson-1", &lesson(300, &["c1", "c2"]), day0()).await.unwrap();
        assert!(first.newly_completed);
        assert_eq!(first.xp_earned, rewards::LESSON_XP);
        assert_eq!(first.experience_points, 20);
        assert_eq!(first.time_spent_seconds, 300);
        assert_eq!(first.enrolled, 2);
        assert_eq!(first.new_badges.len(), 1);

        let again = db.record_lesson_completion("ana", "lesson-1", &lesson(60, &["c1"]), day0()).await.unwrap();
        assert!(!again.newly_completed);
        assert_eq!(again.xp_earned, 0);
        assert_eq!(again.experience_points, 20);
        assert_eq!(again.time_spent_seconds, 360);
        assert_eq!(again.enrolled, 0);
        assert!(again.new_badges.is_empty());

        db.record_lesson_completion("ana", "lesson-2", &lesson(45, &[]), day0()).await.unwrap();
        assert_eq!(db.total_time_spent("ana").await.unwrap(), 405);
        assert_eq!(db.total_time_spent("ben").await.unwrap(), 0);
        assert_eq!(db.earned_badges("ana").await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_badges_follow_completed_lesson_count() {
        let db = Db::in_memory().await.unwrap();
        let mut earned = Vec::new();
        for n in 1..=5 {
            let record = db
                .record_lesson_completion("ana", &format!("lesson-{}", n), &LessonCompletion::default(), day0())
                .await
                .unwrap();
            earned.extend(record.new_badges.into_iter().map(|b| b.requirement_value));
        }
        assert_eq!(earned, vec![1, 3, 5]);
        assert_eq!(db.earned_badges("ana").await.unwrap().len(), 3);
        assert!(db.earned_badges("ben").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_quiz_attempts_are_numbered_and_timed() {
        let db = Db::in_memory().await.unwrap();
        let grade = QuizGrade { score: 40, passed: false };
        let timed = QuizSubmission { time_taken_seconds: 95, ..quiz("quiz-1", QuizKind::Lesson) };
        let first = db.record_quiz_attempt("ana", &timed, grade, day0()).await.unwrap();
        let second = db.record_quiz_attempt("ana", &quiz("quiz-1", QuizKind::Lesson), grade, day0() + Duration::minutes(5)).await.unwrap();
        let other = db.record_quiz_attempt("ana", &quiz("quiz-2", QuizKind::Course), grade, day0() + Duration::minutes(9)).await.unwrap();

        assert_eq!(first.attempt.attempt_number, 1);
        assert_eq!(second.attempt.attempt_number, 2);
        assert_eq!(other.attempt.attempt_number, 1);
        assert_ne!(first.attempt.id, second.attempt.id);
        assert_eq!(first.xp_earned, 0);

        let history = db.quiz_attempts("ana").await.unwrap();
        assert_eq!(history.len(), 3);
        assert_eq!(history[0], other.attempt);
        assert_eq!(history[2], first.attempt);
        assert_eq!(history[2].time_taken_seconds, 95);
    }

    // The pool below opens several real connections, unlike the single in-memory one.
    async fn file_db(dir: &tempfile::TempDir) -> Db {
        let url = format!("sqlite://{}?mode=rwc", dir.path().join("pathfinder.db").display());
        Db::connect(&url, 8).await.unwrap()
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_reviews_of_distinct_items_all_commit() {
        let dir = tempfile::tempdir().unwrap();
        let db = file_db(&dir).await;

        let handles: Vec<_> = (0..40)
            .map(|n| {
                let db = db.clone();
                tokio::spawn(async move {
                    db.review_item("ana", &format!("card-{}", n), Recall::Confident, day0()).await
                })
            })
            .collect();
        for handle in handles {
            handle.await.unwrap().unwrap();
        }

        let states = db.review_states("ana").await.unwrap();
        assert_eq!(states.len(), 40);
        assert!(states.iter().all(|s| s.review_count == 1));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_reviews_of_one_item_are_serialised() {
        let dir = tempfile::tempdir().unwrap();
        let db = file_db(&dir).await;

        let handles: Vec<_> = (0..25)
            .map(|_| {
                let db = db.clone();
                tokio::spawn(async move { db.review_item("ana", "card-1", Recall::Confident, day0()).await })
            })
            .collect();
        for handle in handles {
            handle.await.unwrap().unwrap();
        }

        // Every review read the previous one's write, so none were lost.
        let state = db.get_review_state("ana", "card-1").await.unwrap().unwrap();
        assert_eq!(state.review_count, 25);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_lessons_credit_all_xp() {
        let dir = tempfile::tempdir().unwrap();
        let db = file_db(&dir).await;

        let handles: Vec<_> = (0..40)
            .map(|n| {
                let db = db.clone();
                tokio::spawn(async move {
                    db.record_lesson_completion("ana", &format!("lesson-{}", n), &lesson(30, &[]), day0()).await
                })
            })
            .collect();
        for handle in handles {
            handle.await.unwrap().unwrap();
        }

        let profile = db.get_or_create_profile("ana", day0()).await.unwrap();
        assert_eq!(profile.experience_points, 40 * rewards::LESSON_XP);
        assert_eq!(db.total_time_spent("ana").await.unwrap(), 40 * 30);
        assert_eq!(db.earned_badges("ana").await.unwrap().len(), BADGE_DATA.len());
    }
}
