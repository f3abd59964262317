//! Answer checking: case- and whitespace-insensitive exact match.

use serde::Serialize;

use crate::domain::{Exercise, Question, QuestionType, Score, StudentAnswer};
use crate::util::normalize_answer;

pub fn is_correct(question: &Question, answer: &str) -> bool {
  normalize_answer(&question.correct_answer) == normalize_answer(answer)
}

/// The submitted answer for `question_id`, or "" when the student skipped it.
pub fn answer_for<'a>(answers: &'a [StudentAnswer], question_id: &str) -> &'a str {
  answers
    .iter()
    .find(|a| a.question_id == question_id)
    .map(|a| a.answer.as_str())
    .unwrap_or("")
}

/// Every question counts towards `total`; unanswered ones are simply wrong.
pub fn score(questions: &[Question], answers: &[StudentAnswer]) -> Score {
  let correct = questions
    .iter()
    .filter(|q| is_correct(q, answer_for(answers, &q.id)))
    .count();
  Score { correct, total: questions.len() }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReviewItem {
  pub question_id: String,
  #[serde(rename = "type")]
  pub kind: QuestionType,
  pub question_text: String,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub options: Option<Vec<String>>,
  pub student_answer: String,
  pub correct_answer: String,
  pub is_correct: bool,
}

pub fn review_items(exercise: &Exercise, answers: &[StudentAnswer]) -> Vec<ReviewItem> {
  exercise
    .questions
    .iter()
    .map(|q| {
      let given = answer_for(answers, &q.id);
      ReviewItem {
        question_id: q.id.clone(),
        kind: q.kind,
        question_text: q.question_text.clone(),
        options: q.options.clone(),
        student_answer: given.to_string(),
        correct_answer: q.correct_answer.clone(),
        is_correct: is_correct(q, given),
      }
    })
    .collect()
}
