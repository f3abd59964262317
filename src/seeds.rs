//! Built-in content that keeps the app usable without an API key.

use crate::domain::{ExerciseDraft, QuestionDraft, QuestionType, Subject};

/// Fixed draft returned by extraction when Gemini is not configured.
pub fn mock_exercise_draft() -> ExerciseDraft {
  ExerciseDraft {
    title: "Bài tập Toán Vui".into(),
    subject: Subject::Toan,
    questions: vec![
      QuestionDraft {
        kind: QuestionType::FillInTheBlank,
        question_text: "2 + 2 = ?".into(),
        options: None,
        correct_answer: "4".into(),
      },
      QuestionDraft {
        kind: QuestionType::FillInTheBlank,
        question_text: "5 x 3 = ?".into(),
        options: None,
        correct_answer: "15".into(),
      },
      QuestionDraft {
        kind: QuestionType::MultipleChoice,
        question_text: "Hình nào là hình vuông?".into(),
        options: Some(vec!["A".into(), "B".into(), "C".into(), "D".into()]),
        correct_answer: "A".into(),
      },
    ],
  }
}
