use crate::models::{Recall, ReviewState};
use chrono::{DateTime, Duration, Utc};
use rand::seq::SliceRandom;
use rand::Rng;
use serde::{Deserialize, Serialize};

pub const INITIAL_EASINESS: f64 = 2.5;
pub const MIN_EASINESS: f64 = 1.3;
/// 100 years. Keeps `now + interval` inside the representable range.
pub const MAX_INTERVAL_DAYS: u32 = 36_500;

/// Computes the next scheduling state for one card after a review.
///
/// Simplified SM-2:
/// - First review ever (no prior state): interval 1 day, ease 2.5.
/// - Otherwise EF' = EF + (0.1 - (5 - q) * (0.08 + (5 - q) * 0.02)), floored at 1.3.
/// - q >= 3: interval 1 after zero reviews, 6 after one, then round(interval * EF').
/// - q < 3: interval resets to 1 day (lapse).
///
/// `now` is supplied by the caller; this function never reads the system clock.
pub fn schedule_next_review(
    learner_id: &str,
    item_id: &str,
    prior: Option<&ReviewState>,
    recall: Recall,
    now: DateTime<Utc>,
) -> ReviewState {
    let quality = recall.quality();

    let Some(prior) = prior else {
        return ReviewState {
            learner_id: learner_id.to_string(),
            item_id: item_id.to_string(),
            easiness_factor: INITIAL_EASINESS,
            interval_days: 1,
            review_count: 1,
            last_reviewed_at: Some(now),
            next_review_at: days_after(now, 1),
            confidence_level: Some(quality),
        };
    };

    let ease = sanitize_easiness(prior.easiness_factor);
    let interval = prior.interval_days.max(1);

    let new_ease = next_easiness(ease, quality);
    let new_interval = if quality >= 3 {
        match prior.review_count {
            0 => 1,
            1 => 6,
            _ => scale_interval(interval, new_ease),
        }
    } else {
        1
    };
    let new_interval = saturate_interval(now, new_interval);

    ReviewState {
        learner_id: learner_id.to_string(),
        item_id: item_id.to_string(),
        easiness_factor: new_ease,
        interval_days: new_interval,
        review_count: prior.review_count.saturating_add(1),
        last_reviewed_at: Some(now),
        next_review_at: days_after(now, new_interval),
        confidence_level: Some(quality),
    }
}

/// Keeps the states whose next review is at or before `now`, in input order.
pub fn select_due_items(states: Vec<ReviewState>, now: DateTime<Utc>) -> Vec<ReviewState> {
    states
        .into_iter()
        .filter(|s| s.next_review_at <= now)
        .collect()
}

pub fn next_easiness(ease: f64, quality: u8) -> f64 {
    let q = quality.min(5) as f64;
    let new_ef = ease + (0.1 - (5.0 - q) * (0.08 + (5.0 - q) * 0.02));
    new_ef.max(MIN_EASINESS)
}

/// Corrupted rows (NaN, zero, negative) must not poison the schedule.
fn sanitize_easiness(ease: f64) -> f64 {
    if ease.is_finite() {
        ease.max(MIN_EASINESS)
    } else {
        INITIAL_EASINESS
    }
}

fn scale_interval(interval: u32, ease: f64) -> u32 {
    let scaled = (interval as f64 * ease).round();
    if scaled >= MAX_INTERVAL_DAYS as f64 {
        MAX_INTERVAL_DAYS
    } else {
        (scaled as u32).max(1)
    }
}

/// Shortens `days` so that `start + days` is still a representable timestamp.
/// Only matters for clocks near the end of chrono's range; the interval cap covers the rest.
fn saturate_interval(start: DateTime<Utc>, days: u32) -> u32 {
    let headroom = DateTime::<Utc>::MAX_UTC.signed_duration_since(start).num_days();
    days.min(headroom.clamp(1, MAX_INTERVAL_DAYS as i64) as u32)
}

/// `start + days`. After `saturate_interval` this only saturates when less than
/// one day of calendar is left, where no interval of 1 or more fits anyway.
fn days_after(start: DateTime<Utc>, days: u32) -> DateTime<Utc> {
    start
        .checked_add_signed(Duration::days(days as i64))
        .unwrap_or(DateTime::<Utc>::MAX_UTC)
}

/// Flashcard statistics for one learner, as shown on the study settings page.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReviewStats {
    pub total: usize,
    /// Confidence 4 or 5.
    pub mastered: usize,
    /// Confidence 2 or 3.
    pub learning: usize,
    /// Confidence below 2, or never reviewed.
    pub new: usize,
    pub total_reviews: u64,
    pub average_easiness: f64,
    pub due_now: usize,
}

pub fn review_stats(states: &[ReviewState], now: DateTime<Utc>) -> ReviewStats {
    let mut stats = ReviewStats {
        total: states.len(),
        mastered: 0,
        learning: 0,
        new: 0,
        total_reviews: 0,
        average_easiness: INITIAL_EASINESS,
        due_now: 0,
    };

    let mut ease_sum = 0.0;
    for state in states {
        match state.confidence_level.unwrap_or(0) {
            4.. => stats.mastered += 1,
            2..=3 => stats.learning += 1,
            _ => stats.new += 1,
        }
        stats.total_reviews += state.review_count as u64;
        ease_sum += sanitize_easiness(state.easiness_factor);
        if state.next_review_at <= now {
            stats.due_now += 1;
        }
    }

    if !states.is_empty() {
        stats.average_easiness = ease_sum / states.len() as f64;
    }
    stats
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DueOrder {
    /// Most overdue first.
    #[default]
    Overdue,
    /// Interleaved practice.
    Shuffled,
}

/// Orders a due queue and truncates it to `limit`.
pub fn arrange_due_items<R: Rng + ?Sized>(
    mut items: Vec<ReviewState>,
    order: DueOrder,
    limit: usize,
    rng: &mut R,
) -> Vec<ReviewState> {
    match order {
        DueOrder::Overdue => items.sort_by(|a, b| {
            a.next_review_at
                .cmp(&b.next_review_at)
                .then_with(|| a.item_id.cmp(&b.item_id))
        }),
        DueOrder::Shuffled => items.shuffle(rng),
    }
    items.truncate(limit);
    items
}
