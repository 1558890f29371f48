use super::*;
use crate::accessibility::{TextSize, Theme};
use crate::clock::{Clock, FixedClock};
use crate::models::QuizKind;
use chrono::{Duration, TimeZone, Utc};

async fn test_app() -> (App, Arc<FixedClock>) {
    let clock = Arc::new(FixedClock::at(Utc.with_ymd_and_hms(2024, 3, 1, 9, 0, 0).unwrap()));
    let db = Db::in_memory().await.unwrap();
    (App::new(db, clock.clone()), clock)
}

#[tokio::test]
async fn test_review_uses_injected_clock() {
    let (app, clock) = test_app().await;
    let start = clock.now();

    let first = app.review("ana", "card-1", Recall::Confident).await.unwrap();
    assert_eq!(first.last_reviewed_at, Some(start));
    assert_eq!(first.next_review_at, start + Duration::days(1));

    clock.advance(Duration::days(1));
    let second = app.review("ana", "card-1", Recall::Confident).await.unwrap();
    assert_eq!(second.interval_days, 6);

    clock.advance(Duration::days(6));
    let third = app.review("ana", "card-1", Recall::Confident).await.unwrap();
    assert_eq!(third.interval_days, 16);

    let lapse = app.review("ana", "card-1", Recall::NeedsPractice).await.unwrap();
    assert_eq!(lapse.interval_days, 1);
    assert_eq!(lapse.review_count, 4);
}

#[tokio::test]
async fn test_due_items_follow_the_clock() {
    let (app, clock) = test_app().await;
    app.review("ana", "card-1", Recall::Confident).await.unwrap();
    app.review("ana", "card-2", Recall::Confident).await.unwrap();
    clock.advance(Duration::days(1));
    app.review("ana", "card-2", Recall::Confident).await.unwrap();

    let due = app.due_items("ana", DueOrder::Overdue, 20).await.unwrap();
    let ids: Vec<_> = due.iter().map(|s| s.item_id.as_str()).collect();
    assert_eq!(ids, vec!["card-1"]);

    clock.advance(Duration::days(30));
    assert_eq!(app.due_items("ana", DueOrder::Shuffled, 20).await.unwrap().len(), 2);
    assert_eq!(app.due_items("ana", DueOrder::Overdue, 1).await.unwrap().len(), 1);
    assert!(app.due_items("ben", DueOrder::Overdue, 20).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_preference_commands_persist() {
    let (app, _clock) = test_app().await;
    assert_eq!(app.preferences("ana").await.unwrap(), Preferences::default());

    app.apply_preference("ana", PreferenceCommand::ToggleDarkMode).await.unwrap();
    app.apply_preference("ana", PreferenceCommand::SetTheme(Theme::EasyRead)).await.unwrap();
    let last = app
        .apply_preference("ana", PreferenceCommand::SetTextSize(TextSize::Large))
        .await
        .unwrap();

    let stored = app.preferences("ana").await.unwrap();
    assert_eq!(stored, last);
    assert!(stored.dark_mode);
    assert_eq!(stored.theme, Theme::EasyRead);
    assert_eq!(stored.text_size, TextSize::Large);
}

#[tokio::test]
async fn test_lesson_completion_awards_once_and_enrolls_cards() {
    let (app, _clock) = test_app().await;
    let completion = LessonCompletion {
        time_spent_seconds: 420,
        flashcard_ids: vec!["ada-1".to_string(), "ada-2".to_string()],
    };

    let outcome = app.complete_lesson("ana", "lesson-ada", &completion).await.unwrap();
    assert!(outcome.newly_completed);
    assert_eq!(outcome.xp_earned, 20);
    assert_eq!(outcome.time_spent_seconds, 420);
    assert_eq!(outcome.progress.experience_points, 20);
    assert_eq!(outcome.enrolled, 2);
    let badge_ids: Vec<_> = outcome.new_badges.iter().map(|b| b.id.as_str()).collect();
    assert_eq!(badge_ids, vec!["first-steps"]);

    // Enrolled cards are due straight away.
    assert_eq!(app.due_items("ana", DueOrder::Overdue, 20).await.unwrap().len(), 2);

    let again = app.complete_lesson("ana", "lesson-ada", &completion).await.unwrap();
    assert!(!again.newly_completed);
    assert_eq!(again.xp_earned, 0);
    assert_eq!(again.progress.experience_points, 20);
    assert_eq!(again.enrolled, 0);
    assert!(again.new_badges.is_empty());
    assert_eq!(again.time_spent_seconds, 840);
    assert_eq!(app.profile("ana").await.unwrap().time_spent_seconds, 840);
}

#[tokio::test]
async fn test_badges_unlock_with_lesson_count() {
    let (app, _clock) = test_app().await;
    let mut unlocked = Vec::new();
    for n in 1..=3 {
        let outcome = app
            .complete_lesson("ana", &format!("lesson-{}", n), &LessonCompletion::default())
            .await
            .unwrap();
        unlocked.extend(outcome.new_badges.into_iter().map(|b| b.id));
    }
    assert_eq!(unlocked, vec!["first-steps".to_string(), "getting-started".to_string()]);

    let summary = app.profile("ana").await.unwrap();
    assert_eq!(summary.badges.len(), 2);
    assert_eq!(summary.progress.experience_points, 60);
    assert_eq!(summary.progress.level, 1);
    assert_eq!(summary.progress.xp_to_next_level, 40);
}

#[tokio::test]
async fn test_quiz_submission_awards_xp_when_passed() {
    let (app, _clock) = test_app().await;
    let failed = QuizSubmission {
        quiz_id: "quiz-rights".to_string(),
        quiz_kind: QuizKind::Course,
        earned_points: 3,
        total_points: 10,
        passing_score: 70,
        time_taken_seconds: 240,
    };
    let outcome = app.submit_quiz("ana", &failed).await.unwrap();
    assert!(!outcome.attempt.passed);
    assert_eq!(outcome.attempt.time_taken_seconds, 240);
    assert_eq!(outcome.attempt.score, 30);
    assert_eq!(outcome.xp_earned, 0);

    let passed = QuizSubmission { earned_points: 9, ..failed };
    let outcome = app.submit_quiz("ana", &passed).await.unwrap();
    assert!(outcome.attempt.passed);
    assert_eq!(outcome.attempt.attempt_number, 2);
    assert_eq!(outcome.xp_earned, 100);
    assert_eq!(outcome.progress.level, 2);

    let history = app.quiz_attempts("ana").await.unwrap();
    assert_eq!(history.len(), 2);
    assert!(history.iter().all(|a| a.time_taken_seconds == 240));
    assert_eq!(app.profile("ana").await.unwrap().progress.experience_points, 100);
}

#[tokio::test]
async fn test_profile_reports_flashcard_stats() {
    let (app, clock) = test_app().await;
    let summary = app.profile("ana").await.unwrap();
    assert_eq!(summary.flashcards.total, 0);
    assert_eq!(summary.flashcards.due_now, 0);
    assert_eq!(summary.progress.level, 1);

    app.review("ana", "card-1", Recall::NeedsPractice).await.unwrap();
    app.review("ana", "card-2", Recall::Confident).await.unwrap();
    app.enroll("ana", &["card-3".to_string()]).await.unwrap();

    let stats = app.review_stats("ana").await.unwrap();
    assert_eq!(stats.total, 3);
    assert_eq!(stats.mastered, 1);
    assert_eq!(stats.learning, 1);
    assert_eq!(stats.new, 1);
    assert_eq!(stats.total_reviews, 2);
    assert_eq!(stats.due_now, 1);

    clock.advance(Duration::days(1));
    assert_eq!(app.profile("ana").await.unwrap().flashcards.due_now, 3);
}
