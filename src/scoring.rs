//! Quiz scoring: pure function from (questions, answers) to a result summary.

use serde::{Deserialize, Serialize};

use crate::catalog;
use crate::domain::{Achievement, AnswerValue, QuizQuestion};

/// Four-tier feedback band. Boundaries are inclusive lower bounds at 90/75/60.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum FeedbackTier {
  Outstanding,
  Great,
  GoodEffort,
  KeepLearning,
}

impl FeedbackTier {
  pub fn for_score(score: f64) -> Self {
    if score >= 90.0 {
      FeedbackTier::Outstanding
    } else if score >= 75.0 {
      FeedbackTier::Great
    } else if score >= 60.0 {
      FeedbackTier::GoodEffort
    } else {
      FeedbackTier::KeepLearning
    }
  }

  pub fn message(&self) -> &'static str {
    match self {
      FeedbackTier::Outstanding => "Outstanding! You have an excellent understanding of this topic.",
      FeedbackTier::Great => "Great job! You have a good grasp of the material.",
      FeedbackTier::GoodEffort => "Good effort! Keep practicing to strengthen your understanding.",
      FeedbackTier::KeepLearning => "Keep learning! Review the lesson and try again to improve your score.",
    }
  }
}

#[derive(Clone, Debug, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct QuizResult {
  pub total_questions: usize,
  pub correct_answers: usize,
  pub incorrect_answers: usize,
  /// Full precision; round only for display.
  pub score: f64,
  pub tier: FeedbackTier,
  pub feedback: String,
}

impl QuizResult {
  pub fn rounded_score(&self) -> u32 {
    self.score.round() as u32
  }
}

/// Scores `answers` against `questions` position by position. Missing or `None` answers
/// count as incorrect; equality is strict (`Index(1)` != `Text("1")`).
pub fn score_quiz(questions: &[QuizQuestion], answers: &[Option<AnswerValue>]) -> QuizResult {
  let total = questions.len();
  let correct = questions
    .iter()
    .enumerate()
    .filter(|(i, q)| matches!(answers.get(*i), Some(Some(a)) if *a == q.correct_answer))
    .count();
  let score = if total == 0 { 0.0 } else { correct as f64 / total as f64 * 100.0 };
  let tier = FeedbackTier::for_score(score);
  QuizResult {
    total_questions: total,
    correct_answers: correct,
    incorrect_answers: total - correct,
    score,
    tier,
    feedback: tier.message().to_string(),
  }
}

/// Achievement earned by a result, if any: ≥80 quiz master, else ≥50 quiz completed.
pub fn achievement_for(result: &QuizResult) -> Option<Achievement> {
  if result.score >= 80.0 {
    Some(catalog::quiz_master())
  } else if result.score >= 50.0 {
    Some(catalog::quiz_completed())
  } else {
    None
  }
}
