//! Domain models: subjects, question kinds, exercises and the student's answers.
//!
//! Field names and enum literals follow the browser document format
//! (camelCase, Vietnamese subject names) so stored collections stay portable.

use base64::{engine::general_purpose::STANDARD, Engine as _};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// School subject an exercise is filed under.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Subject {
  #[serde(rename = "Toán")]
  Toan,
  #[serde(rename = "Tiếng Việt")]
  TiengViet,
  #[serde(rename = "Tiếng Anh")]
  TiengAnh,
  #[serde(rename = "Khác")]
  Khac,
}

impl Subject {
  /// Dashboard display order.
  pub const ALL: [Subject; 4] = [Subject::Toan, Subject::TiengViet, Subject::TiengAnh, Subject::Khac];

  pub fn label(&self) -> &'static str {
    match self {
      Subject::Toan => "Toán",
      Subject::TiengViet => "Tiếng Việt",
      Subject::TiengAnh => "Tiếng Anh",
      Subject::Khac => "Khác",
    }
  }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum QuestionType {
  /// Single-select from `options`.
  MultipleChoice,
  /// Free text typed by the student.
  FillInTheBlank,
}

impl QuestionType {
  pub fn literal(&self) -> &'static str {
    match self {
      QuestionType::MultipleChoice => "MULTIPLE_CHOICE",
      QuestionType::FillInTheBlank => "FILL_IN_THE_BLANK",
    }
  }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Question {
  pub id: String,
  #[serde(rename = "type")]
  pub kind: QuestionType,
  pub question_text: String,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub options: Option<Vec<String>>,
  pub correct_answer: String,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub image_url: Option<String>,
}

/// The uploaded sheet, kept inline so the review screen can show it next to the answers.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OriginalFile {
  pub data_url: String,
  pub name: String,
  #[serde(rename = "type")]
  pub mime_type: String,
}

impl OriginalFile {
  pub fn from_bytes(name: &str, mime_type: &str, bytes: &[u8]) -> Self {
    Self {
      data_url: format!("data:{};base64,{}", mime_type, STANDARD.encode(bytes)),
      name: name.to_string(),
      mime_type: mime_type.to_string(),
    }
  }

  /// Decode the base64 payload of `data_url`. None when the URL is not a base64 data URL.
  pub fn decode(&self) -> Option<Vec<u8>> {
    let rest = self.data_url.strip_prefix("data:")?;
    let (_, payload) = rest.split_once(";base64,")?;
    STANDARD.decode(payload).ok()
  }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Exercise {
  pub id: String,
  pub title: String,
  pub subject: Subject,
  pub questions: Vec<Question>,
  pub created_at: DateTime<Utc>,
  pub original_file: OriginalFile,
}

impl Exercise {
  /// Stamp a validated draft with a fresh id, timestamp and per-question ids.
  pub fn from_draft(draft: ExerciseDraft, original_file: OriginalFile) -> Self {
    let questions = draft
      .questions
      .into_iter()
      .enumerate()
      .map(|(i, q)| Question {
        id: format!("q-{}", i + 1),
        kind: q.kind,
        question_text: q.question_text,
        options: q.options,
        correct_answer: q.correct_answer,
        image_url: None,
      })
      .collect();

    Self {
      id: format!("ex-{}", Uuid::new_v4()),
      title: draft.title,
      subject: draft.subject,
      questions,
      created_at: Utc::now(),
      original_file,
    }
  }

  pub fn question(&self, id: &str) -> Option<&Question> {
    self.questions.iter().find(|q| q.id == id)
  }
}

/// Extraction output: an exercise minus id, timestamp and file.
#[derive(Clone, Debug, PartialEq)]
pub struct ExerciseDraft {
  pub title: String,
  pub subject: Subject,
  pub questions: Vec<QuestionDraft>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct QuestionDraft {
  pub kind: QuestionType,
  pub question_text: String,
  pub options: Option<Vec<String>>,
  pub correct_answer: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StudentAnswer {
  pub question_id: String,
  pub answer: String,
}

impl StudentAnswer {
  pub fn empty(question_id: &str) -> Self {
    Self { question_id: question_id.to_string(), answer: String::new() }
  }
}

/// Derived from a submission; never persisted.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct Score {
  pub correct: usize,
  pub total: usize,
}

impl Score {
  /// Whole attempt as a percentage; 0 for an exercise without questions.
  pub fn percentage(&self) -> f64 {
    if self.total == 0 {
      0.0
    } else {
      self.correct as f64 / self.total as f64 * 100.0
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn subject_serializes_as_vietnamese_literal() {
    assert_eq!(serde_json::to_string(&Subject::TiengViet).unwrap(), "\"Tiếng Việt\"");
    let s: Subject = serde_json::from_str("\"Khác\"").unwrap();
    assert_eq!(s, Subject::Khac);
    assert!(serde_json::from_str::<Subject>("\"Math\"").is_err());
  }

  #[test]
  fn question_uses_browser_field_names() {
    let q = Question {
      id: "q-1".into(),
      kind: QuestionType::FillInTheBlank,
      question_text: "2 + 2 = ?".into(),
      options: None,
      correct_answer: "4".into(),
      image_url: None,
    };
    let v = serde_json::to_value(&q).unwrap();
    assert_eq!(v["type"], "FILL_IN_THE_BLANK");
    assert_eq!(v["questionText"], "2 + 2 = ?");
    assert_eq!(v["correctAnswer"], "4");
    assert!(v.get("options").is_none());
  }

  #[test]
  fn original_file_data_url_decodes_back() {
    let f = OriginalFile::from_bytes("sheet.png", "image/png", b"\x89PNG");
    assert!(f.data_url.starts_with("data:image/png;base64,"));
    assert_eq!(f.decode().unwrap(), b"\x89PNG");

    let broken = OriginalFile { data_url: "not a data url".into(), ..f };
    assert!(broken.decode().is_none());
  }

  #[test]
  fn from_draft_assigns_positional_question_ids() {
    let draft = ExerciseDraft {
      title: "Cộng trừ".into(),
      subject: Subject::Toan,
      questions: vec![
        QuestionDraft { kind: QuestionType::FillInTheBlank, question_text: "1 + 1".into(), options: None, correct_answer: "2".into() },
        QuestionDraft { kind: QuestionType::FillInTheBlank, question_text: "2 + 1".into(), options: None, correct_answer: "3".into() },
      ],
    };
    let ex = Exercise::from_draft(draft, OriginalFile::from_bytes("a.pdf", "application/pdf", b"%PDF"));
    assert!(ex.id.starts_with("ex-"));
    let ids: Vec<_> = ex.questions.iter().map(|q| q.id.as_str()).collect();
    assert_eq!(ids, ["q-1", "q-2"]);
    assert!(ex.question("q-2").is_some());
  }

  #[test]
  fn percentage_of_empty_exercise_is_zero() {
    assert_eq!(Score { correct: 0, total: 0 }.percentage(), 0.0);
    assert_eq!(Score { correct: 1, total: 4 }.percentage(), 25.0);
  }
}
