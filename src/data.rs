pub struct BadgeSeed {
    pub id: &'static str,
    pub name: &'static str,
    pub description: &'static str,
    pub icon: &'static str,
    pub lessons_required: u32,
}

pub const BADGE_DATA: &[BadgeSeed] = &[
    BadgeSeed { id: "first-steps", name: "First Steps", description: "Complete your first lesson", icon: "👣", lessons_required: 1 },
    BadgeSeed { id: "getting-started", name: "Getting Started", description: "Complete 3 lessons", icon: "🌱", lessons_required: 3 },
    BadgeSeed { id: "rights-learner", name: "Rights Learner", description: "Complete 5 lessons", icon: "📘", lessons_required: 5 },
    BadgeSeed { id: "advocate", name: "Advocate", description: "Complete 10 lessons", icon: "📣", lessons_required: 10 },
    BadgeSeed { id: "champion", name: "Champion", description: "Complete 25 lessons", icon: "🏆", lessons_required: 25 },
];
