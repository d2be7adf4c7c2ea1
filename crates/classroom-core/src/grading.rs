//! Score arithmetic shared by grade posting, quiz scoring and reports.

use crate::types::QuizQuestion;

/// Score as a percentage of `max`, rounded to one decimal place.
///
/// Returns `None` when `max` is not positive.
pub fn percentage(score: f64, max: f64) -> Option<f64> {
    if max <= 0.0 || !score.is_finite() || !max.is_finite() {
        return None;
    }
    Some((score / max * 1000.0).round() / 10.0)
}

/// Letter grade for a percentage: A ≥ 90, B ≥ 80, C ≥ 70, D ≥ 60, else F.
pub fn letter_grade(percentage: f64) -> &'static str {
    match percentage {
        p if p >= 90.0 => "A",
        p if p >= 80.0 => "B",
        p if p >= 70.0 => "C",
        p if p >= 60.0 => "D",
        _ => "F",
    }
}

/// Total points available in a quiz.
pub fn max_quiz_score(questions: &[QuizQuestion]) -> f64 {
    questions.iter().map(|q| q.points).sum()
}

/// Sum of points for correctly answered questions. Missing and surplus
/// answers score nothing.
pub fn score_quiz(questions: &[QuizQuestion], answers: &[Option<usize>]) -> f64 {
    questions
        .iter()
        .zip(answers.iter())
        .filter(|(question, answer)| **answer == Some(question.correct_option))
        .map(|(question, _)| question.points)
        .sum()
}
