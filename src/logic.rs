//! Core behaviours behind the HTTP handlers.
//!
//! This includes:
//!   - creating an exercise from an upload (extraction bracketed by session events)
//!   - praise for the current score
//!   - review data for the submitted attempt
//!   - the original file of an exercise
//!   - dashboard grouping by subject

use std::sync::Arc;

use tracing::{error, info, instrument, warn};

use crate::domain::{Exercise, Subject};
use crate::encouragement::{encourage, Encouragement};
use crate::error::{AppError, SessionError, EXTRACTION_RETRY_MESSAGE};
use crate::extraction::{extract_exercise, UploadedFile};
use crate::protocol::{ReviewOut, ScoreOut, SessionOut};
use crate::scoring::review_items;
use crate::session::{Event, View};
use crate::state::AppState;

/// Non-empty subject groups in dashboard order.
pub fn group_by_subject(exercises: &[Exercise]) -> Vec<(Subject, Vec<&Exercise>)> {
  Subject::ALL
    .iter()
    .map(|&subject| (subject, exercises.iter().filter(|e| e.subject == subject).collect::<Vec<_>>()))
    .filter(|(_, list)| !list.is_empty())
    .collect()
}

/// Extract an exercise from `upload` and add it to the collection.
///
/// The session is marked busy without holding its lock. The extraction runs as
/// its own task, so it settles even if the caller goes away; a cancelled
/// attempt's result is discarded by the session.
#[instrument(level = "info", skip(state, upload), fields(name = %upload.name, mime = %upload.mime_type, size = upload.bytes.len()))]
pub async fn create_exercise(state: &Arc<AppState>, upload: UploadedFile) -> Result<SessionOut, AppError> {
  let attempt = state.begin_extraction().await?;

  match tokio::spawn(run_extraction(state.clone(), attempt, upload)).await {
    Ok(result) => result,
    Err(e) => {
      error!(target: "exercise", attempt, error = %e, "Extraction task did not finish");
      let message = EXTRACTION_RETRY_MESSAGE.to_string();
      if let Err(se) = state.dispatch(Event::ExtractionFailed { attempt, message }).await {
        warn!(target: "exercise", attempt, error = %se, "Could not record extraction failure");
      }
      Err(AppError::ExtractionAborted(e.to_string()))
    }
  }
}

#[instrument(level = "debug", skip(state, upload))]
async fn run_extraction(state: Arc<AppState>, attempt: u64, upload: UploadedFile) -> Result<SessionOut, AppError> {
  match extract_exercise(state.gemini.as_ref(), &state.config.prompts, &upload).await {
    Ok(draft) => {
      let exercise = Exercise::from_draft(draft, upload.to_original_file());
      info!(target: "exercise", attempt, id = %exercise.id, title = %exercise.title, questions = exercise.questions.len(), "Exercise created");
      Ok(state.dispatch(Event::ExtractionSucceeded { attempt, exercise }).await?)
    }
    Err(e) => {
      let message = e.user_message().to_string();
      if let Err(se) = state.dispatch(Event::ExtractionFailed { attempt, message }).await {
        warn!(target: "exercise", attempt, error = %se, "Could not record extraction failure");
      }
      Err(e.into())
    }
  }
}

#[instrument(level = "info", skip(state))]
pub async fn current_encouragement(state: &AppState) -> Result<Encouragement, AppError> {
  let score = {
    let s = state.session.read().await;
    match (s.view, s.score) {
      (View::Results | View::ReviewExercise, Some(score)) => score,
      (view, _) => return Err(SessionError::NotAvailable { view, what: "encouragement" }.into()),
    }
  };
  Ok(encourage(state.gemini.as_ref(), &state.config.prompts, &state.config.student_name, score).await)
}

#[instrument(level = "info", skip(state))]
pub async fn current_review(state: &AppState) -> Result<ReviewOut, AppError> {
  let s = state.session.read().await;
  match (s.view, &s.active, &s.submitted, s.score) {
    (View::ReviewExercise, Some(exercise), Some(answers), Some(score)) => Ok(ReviewOut {
      exercise_id: exercise.id.clone(),
      title: exercise.title.clone(),
      file_name: exercise.original_file.name.clone(),
      file_type: exercise.original_file.mime_type.clone(),
      score: ScoreOut::from(score),
      items: review_items(exercise, answers),
    }),
    (view, ..) => Err(SessionError::NotAvailable { view, what: "review" }.into()),
  }
}

/// MIME type and bytes of the sheet an exercise was built from.
#[instrument(level = "info", skip(state))]
pub async fn original_file(state: &AppState, exercise_id: &str) -> Result<(String, Vec<u8>), AppError> {
  let s = state.session.read().await;
  let exercise = s
    .exercise(exercise_id)
    .or_else(|| s.active.as_deref().filter(|e| e.id == exercise_id))
    .ok_or_else(|| AppError::FileNotFound(exercise_id.to_string()))?;
  let bytes = exercise
    .original_file
    .decode()
    .ok_or_else(|| AppError::CorruptFile(exercise_id.to_string()))?;
  Ok((exercise.original_file.mime_type.clone(), bytes))
}

#[cfg(test)]
mod tests {
  use std::time::Duration;

  use axum::http::StatusCode;

  use super::*;
  use crate::config::AppConfig;
  use crate::gemini::{stub, Gemini};
  use crate::storage::MemoryBlobStore;

  fn offline_state() -> (Arc<AppState>, Arc<MemoryBlobStore>) {
    state_with(None)
  }

  fn state_with(gemini: Option<Gemini>) -> (Arc<AppState>, Arc<MemoryBlobStore>) {
    let store = Arc::new(MemoryBlobStore::default());
    (Arc::new(AppState::from_parts(AppConfig::default(), store.clone(), gemini)), store)
  }

  fn png() -> UploadedFile {
    UploadedFile { name: "bai.png".into(), mime_type: "image/png".into(), bytes: b"png-bytes".to_vec() }
  }

  #[tokio::test]
  async fn offline_upload_creates_mock_exercise_and_persists() {
    let (state, store) = offline_state();
    state.dispatch(Event::CreateNew).await.unwrap();

    let out = create_exercise(&state, png()).await.unwrap();
    assert_eq!(out.view, View::Dashboard);
    assert_eq!(out.subjects.len(), 1);
    assert_eq!(out.subjects[0].subject, Subject::Toan);
    assert_eq!(out.subjects[0].exercises[0].question_count, 3);
    assert!(store.raw("minhDangExercises").unwrap().contains("Bài tập Toán Vui"));
  }

  #[tokio::test]
  async fn unsupported_upload_records_message_and_keeps_collection() {
    let (state, store) = offline_state();
    state.dispatch(Event::CreateNew).await.unwrap();

    let bad = UploadedFile { mime_type: "text/plain".into(), ..png() };
    let err = create_exercise(&state, bad).await.unwrap_err();
    assert!(matches!(err, AppError::Extraction(_)));

    let snap = state.snapshot().await;
    assert_eq!(snap.view, View::CreateExercise);
    assert!(!snap.extracting);
    assert!(snap.extraction_error.is_some());
    assert!(store.raw("minhDangExercises").is_none());
  }

  #[tokio::test]
  async fn upload_outside_create_screen_is_rejected() {
    let (state, _) = offline_state();
    let err = create_exercise(&state, png()).await.unwrap_err();
    assert!(matches!(err, AppError::Session(SessionError::InvalidTransition { .. })));
  }

  #[tokio::test]
  async fn review_and_encouragement_follow_the_attempt() {
    let (state, _) = offline_state();
    state.dispatch(Event::CreateNew).await.unwrap();
    create_exercise(&state, png()).await.unwrap();
    let id = state.session.read().await.exercises[0].id.clone();

    assert!(current_encouragement(&state).await.is_err());

    state.dispatch(Event::Start(id.clone())).await.unwrap();
    state
      .dispatch(Event::Answer { question_id: "q-1".into(), answer: "4".into() })
      .await
      .unwrap();
    state
      .dispatch(Event::Answer { question_id: "q-3".into(), answer: "A".into() })
      .await
      .unwrap();
    let out = state.dispatch(Event::Finish).await.unwrap();
    let score = out.score.unwrap();
    assert_eq!((score.correct, score.total), (2, 3));

    let praise = current_encouragement(&state).await.unwrap();
    assert!(!praise.text.is_empty());
    assert!(current_review(&state).await.is_err());

    state.dispatch(Event::Review).await.unwrap();
    let review = current_review(&state).await.unwrap();
    assert_eq!(review.exercise_id, id);
    let flags: Vec<bool> = review.items.iter().map(|i| i.is_correct).collect();
    assert_eq!(flags, [true, false, true]);
  }

  #[tokio::test]
  async fn original_file_round_trips_upload_bytes() {
    let (state, _) = offline_state();
    state.dispatch(Event::CreateNew).await.unwrap();
    create_exercise(&state, png()).await.unwrap();
    let id = state.session.read().await.exercises[0].id.clone();

    let (mime, bytes) = original_file(&state, &id).await.unwrap();
    assert_eq!(mime, "image/png");
    assert_eq!(bytes, b"png-bytes");
    assert!(matches!(original_file(&state, "ex-404").await, Err(AppError::FileNotFound(_))));
  }

  #[tokio::test]
  async fn extraction_settles_after_caller_is_dropped() {
    let gemini = stub::serve(StatusCode::OK, stub::exercise_reply(), Duration::from_millis(300)).await;
    let (state, store) = state_with(Some(gemini));
    state.dispatch(Event::CreateNew).await.unwrap();

    let dropped = tokio::time::timeout(Duration::from_millis(50), create_exercise(&state, png())).await;
    assert!(dropped.is_err());
    assert!(state.snapshot().await.extracting);

    for _ in 0..100 {
      if !state.snapshot().await.extracting {
        break;
      }
      tokio::time::sleep(Duration::from_millis(20)).await;
    }
    let snap = state.snapshot().await;
    assert_eq!(snap.view, View::Dashboard);
    assert!(!snap.extracting);
    assert_eq!(snap.subjects[0].exercises[0].title, "Phép cộng");
    assert!(store.raw("minhDangExercises").unwrap().contains("Phép cộng"));
  }

  #[tokio::test]
  async fn hung_extraction_can_be_cancelled_and_retried() {
    let gemini = stub::serve(StatusCode::OK, stub::exercise_reply(), Duration::from_secs(3600)).await;
    let (state, _) = state_with(Some(gemini));
    state.dispatch(Event::CreateNew).await.unwrap();

    let dropped = tokio::time::timeout(Duration::from_millis(50), create_exercise(&state, png())).await;
    assert!(dropped.is_err());

    let out = state.dispatch(Event::Cancel).await.unwrap();
    assert_eq!(out.view, View::Dashboard);
    assert!(!out.extracting);

    state.dispatch(Event::CreateNew).await.unwrap();
    assert_eq!(state.begin_extraction().await.unwrap(), 2);
  }

  #[tokio::test]
  async fn non_conforming_reply_keeps_collection() {
    let reply = stub::text_reply("Tôi không đọc được ảnh này.");
    let (state, store) = state_with(Some(stub::serve(StatusCode::OK, reply, Duration::ZERO).await));
    state.dispatch(Event::CreateNew).await.unwrap();

    let err = create_exercise(&state, png()).await.unwrap_err();
    assert!(matches!(err, AppError::Extraction(_)));
    let snap = state.snapshot().await;
    assert_eq!(snap.view, View::CreateExercise);
    assert_eq!(snap.extraction_error.as_deref(), Some(EXTRACTION_RETRY_MESSAGE));
    assert!(snap.subjects.is_empty());
    assert!(store.raw("minhDangExercises").is_none());
  }

  #[test]
  fn groups_skip_empty_subjects_and_keep_order() {
    use crate::domain::OriginalFile;
    let make = |id: &str, subject| Exercise {
      id: id.into(),
      title: id.into(),
      subject,
      questions: vec![],
      created_at: chrono::Utc::now(),
      original_file: OriginalFile::from_bytes("f", "image/png", b""),
    };
    let list = vec![make("a", Subject::Khac), make("b", Subject::Toan), make("c", Subject::Khac)];
    let groups = group_by_subject(&list);
    let order: Vec<_> = groups.iter().map(|(s, l)| (*s, l.len())).collect();
    assert_eq!(order, [(Subject::Toan, 1), (Subject::Khac, 2)]);
  }
}
