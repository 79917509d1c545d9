use crate::models::{Question, QuizData, UserAnswer};

/// Rounded percentage; an empty quiz scores 0.
pub fn score_percentage(correct: usize, total: usize) -> u32 {
    if total == 0 {
        return 0;
    }
    (correct as f64 / total as f64 * 100.0).round() as u32
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    Outstanding,
    Great,
    Good,
    KeepPracticing,
}

impl Verdict {
    pub fn for_score(pct: u32) -> Self {
        match pct {
            90.. => Verdict::Outstanding,
            70..=89 => Verdict::Great,
            50..=69 => Verdict::Good,
            _ => Verdict::KeepPracticing,
        }
    }

    pub fn message(&self) -> &'static str {
        match self {
            Verdict::Outstanding => "Outstanding! You've mastered this.",
            Verdict::Great => "Great job! You're well on your way.",
            Verdict::Good => "Good effort. Review the weak spots!",
            Verdict::KeepPracticing => "Keep practicing. Learning takes time!",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct QuizSummary {
    pub quiz: QuizData,
    pub answers: Vec<UserAnswer>,
}

impl QuizSummary {
    pub fn new(quiz: QuizData, answers: Vec<UserAnswer>) -> Self {
        Self { quiz, answers }
    }

    pub fn correct_count(&self) -> usize {
        self.answers.iter().filter(|a| a.is_correct).count()
    }

    pub fn total_count(&self) -> usize {
        self.quiz.questions.len()
    }

    pub fn score_percentage(&self) -> u32 {
        score_percentage(self.correct_count(), self.total_count())
    }

    pub fn verdict(&self) -> Verdict {
        Verdict::for_score(self.score_percentage())
    }

    /// Each question with the answer given to it, if any.
    pub fn review(&self) -> impl Iterator<Item = (&Question, Option<&UserAnswer>)> {
        self.quiz.questions.iter().map(|q| {
            let answer = self.answers.iter().find(|a| a.question_id == q.id);
            (q, answer)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::quiz_session::tests::quiz;

    #[test]
    fn percentage_boundaries() {
        assert_eq!(score_percentage(7, 10), 70);
        assert_eq!(score_percentage(0, 10), 0);
        assert_eq!(score_percentage(10, 10), 100);
        assert_eq!(score_percentage(2, 3), 67);
        assert_eq!(score_percentage(0, 0), 0);
    }

    #[test]
    fn verdict_tiers() {
        assert_eq!(Verdict::for_score(100), Verdict::Outstanding);
        assert_eq!(Verdict::for_score(90), Verdict::Outstanding);
        assert_eq!(Verdict::for_score(89), Verdict::Great);
        assert_eq!(Verdict::for_score(70), Verdict::Great);
        assert_eq!(Verdict::for_score(50), Verdict::Good);
        assert_eq!(Verdict::for_score(49), Verdict::KeepPracticing);
    }

    #[test]
    fn summary_counts_against_every_question() {
        let answers = vec![
            UserAnswer { question_id: 1, selected_option: "B".into(), is_correct: true },
            UserAnswer { question_id: 2, selected_option: "A".into(), is_correct: false },
        ];
        let s = QuizSummary::new(quiz(4), answers);
        assert_eq!(s.correct_count(), 1);
        assert_eq!(s.total_count(), 4);
        assert_eq!(s.score_percentage(), 25);
        assert_eq!(s.verdict().message(), "Keep practicing. Learning takes time!");

        let review: Vec<_> = s.review().collect();
        assert_eq!(review.len(), 4);
        assert_eq!(review[1].1.map(|a| a.selected_option.as_str()), Some("A"));
        assert!(review[3].1.is_none());
    }
}
