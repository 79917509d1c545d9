// Seed content for the social, leaderboard and analytics screens

use crate::auth::avatar_url;
use crate::models::{
    ChatMessage, Group, LeaderboardEntry, LeaderboardUser, SubjectPerformance, Trend, UserProfile,
};
use chrono::{Duration, Utc};

pub fn demo_user() -> UserProfile {
    UserProfile {
        id: "u1".into(),
        name: "Alex Johnson".into(),
        email: "alex.j@example.com".into(),
        avatar: avatar_url("Alex"),
        level: 12,
        points: 4520,
        streak: 7,
        badges: vec!["🔥 Streak Master".into(), "📚 Science Whiz".into()],
    }
}

pub fn groups() -> Vec<Group> {
    let g = |id: &str, name: &str, description: &str, member_count, category: &str| Group {
        id: id.into(),
        name: name.into(),
        description: description.into(),
        member_count,
        category: category.into(),
    };
    vec![
        g("g1", "Biology Squad", "AP Bio Exam Prep", 12, "Science"),
        g("g2", "Calculus Club", "Derivatives & Integrals", 8, "Math"),
        g("g3", "History Buffs", "World War II Focus", 24, "History"),
    ]
}

pub fn leaderboard() -> Vec<LeaderboardEntry> {
    [
        ("Sarah Chen", "Sarah", 15420, Trend::Same),
        ("Mike Ross", "Mike", 14200, Trend::Up),
        ("Alex Johnson", "Alex", 12100, Trend::Down),
        ("Jessica Day", "Jessica", 9800, Trend::Up),
        ("Tom Haverford", "Tom", 8500, Trend::Down),
    ]
    .into_iter()
    .zip(1..)
    .map(|((name, seed, points, trend), rank)| LeaderboardEntry {
        rank,
        user: LeaderboardUser {
            name: name.into(),
            avatar: avatar_url(seed),
        },
        points,
        trend,
    })
    .collect()
}

pub fn subject_performance() -> Vec<SubjectPerformance> {
    [
        ("Mathematics", 85, 12),
        ("Biology", 92, 8),
        ("History", 68, 15),
        ("Physics", 74, 5),
        ("Computer Science", 95, 20),
    ]
    .into_iter()
    .map(|(subject, score, quizzes_taken)| SubjectPerformance {
        subject: subject.into(),
        score,
        quizzes_taken,
    })
    .collect()
}

pub fn group_messages() -> Vec<ChatMessage> {
    let now = Utc::now();
    let m = |id: &str, sender: &str, name: &str, text: &str, mins_ago| ChatMessage {
        id: id.into(),
        sender_id: sender.into(),
        sender_name: name.into(),
        text: text.into(),
        timestamp: now - Duration::minutes(mins_ago),
        is_ai: false,
    };
    vec![
        m("m1", "u2", "Sarah", "Has anyone reviewed the Krebs cycle notes?", 60),
        m("m2", "u3", "Mike", "Yes! I just uploaded a summary PDF.", 55),
        m("m3", "u1", "Alex", "Thanks Mike, that will be super helpful for the quiz.", 10),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn leaderboard_is_ranked_by_points() {
        let board = leaderboard();
        assert_eq!(board.iter().map(|e| e.rank).collect::<Vec<_>>(), vec![1, 2, 3, 4, 5]);
        assert!(board.windows(2).all(|w| w[0].points >= w[1].points));
    }

    #[test]
    fn seed_messages_are_chronological() {
        let msgs = group_messages();
        assert!(msgs.windows(2).all(|w| w[0].timestamp < w[1].timestamp));
        assert!(groups().iter().all(|g| g.member_count > 0));
        assert!(subject_performance().iter().all(|s| s.score <= 100));
    }
}
