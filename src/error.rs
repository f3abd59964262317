//! Error types, one enum per boundary.
//!
//! Only `ExtractionError` is meant to reach the user. Storage and encouragement
//! failures are logged and degraded by their callers.

use crate::session::View;

/// Failure talking to the Gemini API.
#[derive(Debug, thiserror::Error)]
pub enum GeminiError {
  #[error("Gemini request failed: {0}")]
  Http(#[from] reqwest::Error),

  #[error("Gemini HTTP {status}: {message}")]
  Api { status: u16, message: String },

  #[error("Gemini returned no usable content")]
  EmptyResponse,

  #[error("Gemini JSON parse error: {0}")]
  Json(#[from] serde_json::Error),
}

pub const EXTRACTION_RETRY_MESSAGE: &str = "Không thể tạo bài tập từ tệp đã tải lên. Vui lòng thử lại.";
pub const UNSUPPORTED_FILE_MESSAGE: &str = "Chỉ hỗ trợ file ảnh hoặc PDF.";

#[derive(Debug, thiserror::Error)]
pub enum ExtractionError {
  #[error("unsupported file type '{mime}'")]
  UnsupportedFile { mime: String },

  #[error(transparent)]
  Service(#[from] GeminiError),

  #[error("extraction output violates schema: {0}")]
  Schema(String),
}

impl ExtractionError {
  /// Text shown on the create screen.
  pub fn user_message(&self) -> &'static str {
    match self {
      ExtractionError::UnsupportedFile { .. } => UNSUPPORTED_FILE_MESSAGE,
      ExtractionError::Service(_) | ExtractionError::Schema(_) => EXTRACTION_RETRY_MESSAGE,
    }
  }

  pub fn schema(message: impl Into<String>) -> Self {
    ExtractionError::Schema(message.into())
  }
}

#[derive(Debug, thiserror::Error)]
pub enum StorageError {
  #[error("storage I/O error: {0}")]
  Io(#[from] std::io::Error),

  #[error("invalid storage key '{0}'")]
  InvalidKey(String),
}

/// A rejected session event. The session is left exactly as it was.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SessionError {
  #[error("'{event}' is not allowed in view {view:?}")]
  InvalidTransition { view: View, event: &'static str },

  #[error("no exercise with id '{0}'")]
  UnknownExercise(String),

  #[error("active exercise has no question '{0}'")]
  UnknownQuestion(String),

  #[error("no active exercise")]
  NoActiveExercise,

  #[error("an extraction is already in progress")]
  ExtractionPending,

  #[error("result of extraction attempt {0} arrived after it was cancelled or replaced")]
  StaleExtraction(u64),

  #[error("exercise id '{0}' already exists")]
  DuplicateExercise(String),

  #[error("{what} is not available in view {view:?}")]
  NotAvailable { view: View, what: &'static str },
}

/// Errors crossing the core-logic / HTTP boundary.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
  #[error(transparent)]
  Session(#[from] SessionError),

  #[error(transparent)]
  Extraction(#[from] ExtractionError),

  #[error("Vui lòng chọn một file ảnh hoặc PDF!")]
  MissingFile,

  #[error("extraction task ended unexpectedly: {0}")]
  ExtractionAborted(String),

  #[error("no stored file for exercise '{0}'")]
  FileNotFound(String),

  #[error("stored file for exercise '{0}' is not a valid data URL")]
  CorruptFile(String),
}
