//! File → exercise draft through Gemini structured output.
//!
//! The response is parsed into loose DTOs and then validated into an
//! `ExerciseDraft`. Anything off-schema is a `Schema` error; the caller never
//! sees a half-built draft.

use base64::{engine::general_purpose::STANDARD, Engine as _};
use serde::Deserialize;
use serde_json::json;
use tracing::{error, info, instrument, warn};

use crate::config::Prompts;
use crate::domain::{ExerciseDraft, OriginalFile, QuestionDraft, QuestionType, Subject};
use crate::error::ExtractionError;
use crate::gemini::{Gemini, InlineData};
use crate::seeds::mock_exercise_draft;
use crate::util::normalize_answer;

/// A file as received from the upload form.
#[derive(Clone, Debug)]
pub struct UploadedFile {
  pub name: String,
  pub mime_type: String,
  pub bytes: Vec<u8>,
}

impl UploadedFile {
  pub fn is_supported(&self) -> bool {
    self.mime_type.starts_with("image/") || self.mime_type == "application/pdf"
  }

  pub fn to_original_file(&self) -> OriginalFile {
    OriginalFile::from_bytes(&self.name, &self.mime_type, &self.bytes)
  }

  fn to_inline_data(&self) -> InlineData {
    InlineData { mime_type: self.mime_type.clone(), data: STANDARD.encode(&self.bytes) }
  }
}

/// Output schema sent with every extraction request.
pub fn exercise_schema() -> serde_json::Value {
  let subjects: Vec<&str> = Subject::ALL.iter().map(|s| s.label()).collect();
  let kinds = [QuestionType::MultipleChoice.literal(), QuestionType::FillInTheBlank.literal()];
  json!({
    "type": "OBJECT",
    "properties": {
      "title": {
        "type": "STRING",
        "description": "Tiêu đề ngắn gọn, phù hợp cho bài tập, viết bằng Tiếng Việt."
      },
      "subject": {
        "type": "STRING",
        "enum": subjects,
        "description": "Môn học của bài tập."
      },
      "questions": {
        "type": "ARRAY",
        "description": "Các câu hỏi trong bài tập, theo thứ tự xuất hiện.",
        "items": {
          "type": "OBJECT",
          "properties": {
            "questionText": { "type": "STRING", "description": "Nội dung đầy đủ của câu hỏi." },
            "type": {
              "type": "STRING",
              "enum": kinds,
              "description": "MULTIPLE_CHOICE cho trắc nghiệm, FILL_IN_THE_BLANK cho điền vào chỗ trống."
            },
            "options": {
              "type": "ARRAY",
              "items": { "type": "STRING" },
              "description": "Các lựa chọn của câu trắc nghiệm. Bỏ trống với loại câu hỏi khác."
            },
            "correctAnswer": { "type": "STRING", "description": "Đáp án đúng." }
          },
          "required": ["questionText", "type", "correctAnswer"]
        }
      }
    },
    "required": ["title", "subject", "questions"]
  })
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawExercise {
  title: String,
  subject: Subject,
  questions: Vec<RawQuestion>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawQuestion {
  question_text: String,
  #[serde(rename = "type")]
  kind: QuestionType,
  #[serde(default)]
  options: Option<Vec<String>>,
  correct_answer: String,
}

/// Strictly parse and validate the service's JSON text.
pub fn parse_exercise_draft(text: &str) -> Result<ExerciseDraft, ExtractionError> {
  let raw: RawExercise = serde_json::from_str(text.trim())
    .map_err(|e| ExtractionError::schema(format!("response is not a valid exercise: {e}")))?;

  let title = raw.title.trim().to_string();
  if title.is_empty() {
    return Err(ExtractionError::schema("title is blank"));
  }

  let mut questions = Vec::with_capacity(raw.questions.len());
  for (i, q) in raw.questions.into_iter().enumerate() {
    let n = i + 1;
    let question_text = q.question_text.trim().to_string();
    if question_text.is_empty() {
      return Err(ExtractionError::schema(format!("question {n} has no text")));
    }

    let options = match q.kind {
      QuestionType::MultipleChoice => {
        let options: Vec<String> = q
          .options
          .unwrap_or_default()
          .into_iter()
          .filter(|o| !o.trim().is_empty())
          .collect();
        if options.is_empty() {
          return Err(ExtractionError::schema(format!("multiple-choice question {n} has no options")));
        }
        let expected = normalize_answer(&q.correct_answer);
        if !options.iter().any(|o| normalize_answer(o) == expected) {
          return Err(ExtractionError::schema(format!(
            "correct answer of question {n} is not one of its options"
          )));
        }
        Some(options)
      }
      QuestionType::FillInTheBlank => None,
    };

    questions.push(QuestionDraft { kind: q.kind, question_text, options, correct_answer: q.correct_answer });
  }

  Ok(ExerciseDraft { title, subject: raw.subject, questions })
}

/// Turn an uploaded file into a draft. Without a client the fixed mock draft is returned.
#[instrument(level = "info", skip(gemini, prompts, file), fields(name = %file.name, mime = %file.mime_type, size = file.bytes.len(), ai = gemini.is_some()))]
pub async fn extract_exercise(
  gemini: Option<&Gemini>,
  prompts: &Prompts,
  file: &UploadedFile,
) -> Result<ExerciseDraft, ExtractionError> {
  if !file.is_supported() {
    warn!(target: "exercise", mime = %file.mime_type, "Rejected unsupported upload");
    return Err(ExtractionError::UnsupportedFile { mime: file.mime_type.clone() });
  }

  let Some(gemini) = gemini else {
    info!(target: "exercise", "No API key configured; returning mock exercise");
    return Ok(mock_exercise_draft());
  };

  let text = gemini
    .generate_json_for_file(file.to_inline_data(), &prompts.extraction, exercise_schema())
    .await
    .map_err(|e| {
      error!(target: "exercise", error = %e, "Extraction call failed");
      ExtractionError::from(e)
    })?;

  match parse_exercise_draft(&text) {
    Ok(draft) => {
      info!(target: "exercise", title = %draft.title, subject = draft.subject.label(), questions = draft.questions.len(), "Exercise extracted");
      Ok(draft)
    }
    Err(e) => {
      error!(target: "exercise", error = %e, response_len = text.len(), "Extraction output rejected");
      Err(e)
    }
  }
}
