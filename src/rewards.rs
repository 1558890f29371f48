use crate::models::{Badge, BadgeRequirement, QuizKind};
use serde::Serialize;

pub const LESSON_XP: u32 = 20;
pub const QUIZ_XP: u32 = 50;
pub const COURSE_QUIZ_XP: u32 = 100;
pub const XP_PER_LEVEL: u32 = 100;

pub fn quiz_xp(kind: QuizKind, passed: bool) -> u32 {
    if !passed {
        return 0;
    }
    match kind {
        QuizKind::Course => COURSE_QUIZ_XP,
        QuizKind::Lesson | QuizKind::Module => QUIZ_XP,
    }
}

/// Level 1 covers 0..100 XP, level 2 covers 100..200, and so on.
pub fn level_for(xp: u32) -> u32 {
    xp / XP_PER_LEVEL + 1
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct LevelProgress {
    pub experience_points: u32,
    pub level: u32,
    pub xp_to_next_level: u32,
}

impl LevelProgress {
    pub fn from_xp(xp: u32) -> Self {
        Self {
            experience_points: xp,
            level: level_for(xp),
            xp_to_next_level: XP_PER_LEVEL - xp % XP_PER_LEVEL,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QuizGrade {
    pub score: u32,
    pub passed: bool,
}

/// Percentage score rounded to the nearest point. An empty quiz scores 0.
pub fn grade_quiz(earned_points: u32, total_points: u32, passing_score: u32) -> QuizGrade {
    let score = if total_points == 0 {
        0
    } else {
        let earned = earned_points.min(total_points) as f64;
        (earned / total_points as f64 * 100.0).round() as u32
    };
    QuizGrade {
        score,
        passed: score >= passing_score,
    }
}

/// Badges whose requirement is met and that the learner does not already hold.
pub fn newly_earned<'a>(
    catalogue: &'a [Badge],
    held: &[String],
    lessons_completed: u32,
) -> Vec<&'a Badge> {
    catalogue
        .iter()
        .filter(|b| !held.iter().any(|id| id == &b.id))
        .filter(|b| match b.requirement {
            BadgeRequirement::LessonsCompleted => b.requirement_value <= lessons_completed,
        })
        .collect()
}
