//! Exercise lifecycle state machine.
//!
//! `Session` is a plain value. `Session::apply` is a pure reducer: it returns
//! the next session plus the side effect the caller must perform, or a
//! `SessionError` when the event is not allowed. A rejected event never
//! changes anything.
//!
//! ```text
//! Dashboard --create_new--> CreateExercise --extraction ok--> Dashboard (+persist)
//!                                          --cancel--------> Dashboard (drops a pending attempt)
//! Dashboard --start(id)--> DoExercise --finish--> Results --review--> ReviewExercise
//! Dashboard --delete(id)--> Dashboard (+persist)
//! Results | ReviewExercise --back--> Dashboard
//! ```
//!
//! Each extraction is numbered when it starts. A result is only accepted for
//! the attempt that is still pending; anything else is `StaleExtraction`.

use std::sync::Arc;

use serde::Serialize;

use crate::domain::{Exercise, Score, StudentAnswer};
use crate::error::SessionError;
use crate::scoring;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum View {
  #[default]
  Dashboard,
  CreateExercise,
  DoExercise,
  Results,
  ReviewExercise,
}

#[derive(Clone, Debug)]
pub enum Event {
  CreateNew,
  /// The upload was submitted; the create screen is now busy.
  ExtractionStarted,
  ExtractionSucceeded { attempt: u64, exercise: Exercise },
  /// `message` is shown on the create screen.
  ExtractionFailed { attempt: u64, message: String },
  Cancel,
  Start(String),
  Delete(String),
  Answer { question_id: String, answer: String },
  Finish,
  Review,
  Back,
}

impl Event {
  pub fn name(&self) -> &'static str {
    match self {
      Event::CreateNew => "create_new",
      Event::ExtractionStarted => "extraction_started",
      Event::ExtractionSucceeded { .. } => "extraction_succeeded",
      Event::ExtractionFailed { .. } => "extraction_failed",
      Event::Cancel => "cancel",
      Event::Start(_) => "start",
      Event::Delete(_) => "delete",
      Event::Answer { .. } => "answer",
      Event::Finish => "finish",
      Event::Review => "review",
      Event::Back => "back",
    }
  }
}

/// What the caller has to do after adopting the new session.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Effect {
  None,
  /// Write `session.exercises` to the blob store.
  Persist,
}

#[derive(Clone, Debug)]
pub struct Transition {
  pub session: Session,
  pub effect: Effect,
}

#[derive(Clone, Debug, Default)]
pub struct Session {
  pub view: View,
  /// Shared with every copy of the session; cloned only when it changes.
  pub exercises: Arc<Vec<Exercise>>,
  pub active: Option<Arc<Exercise>>,
  /// In-progress answers during DoExercise, frozen into `submitted` on finish.
  pub answers: Vec<StudentAnswer>,
  pub submitted: Option<Vec<StudentAnswer>>,
  pub score: Option<Score>,
  pub extracting: bool,
  /// Number of the latest extraction attempt.
  pub attempt: u64,
  pub extraction_error: Option<String>,
}

impl Session {
  pub fn new(exercises: Vec<Exercise>) -> Self {
    Self { exercises: Arc::new(exercises), ..Self::default() }
  }

  pub fn exercise(&self, id: &str) -> Option<&Exercise> {
    self.exercises.iter().find(|e| e.id == id)
  }

  fn is_pending(&self, attempt: u64) -> bool {
    self.view == View::CreateExercise && self.extracting && self.attempt == attempt
  }

  pub fn apply(&self, event: Event) -> Result<Transition, SessionError> {
    let mut next = self.clone();
    let mut effect = Effect::None;

    match (self.view, event) {
      (_, Event::ExtractionSucceeded { attempt, .. } | Event::ExtractionFailed { attempt, .. })
        if !self.is_pending(attempt) =>
      {
        return Err(SessionError::StaleExtraction(attempt));
      }

      (View::Dashboard, Event::CreateNew) => {
        next.view = View::CreateExercise;
        next.extracting = false;
        next.extraction_error = None;
      }

      (View::CreateExercise, Event::ExtractionStarted) => {
        if self.extracting {
          return Err(SessionError::ExtractionPending);
        }
        next.extracting = true;
        next.attempt = self.attempt + 1;
        next.extraction_error = None;
      }

      (View::CreateExercise, Event::ExtractionSucceeded { exercise, .. }) => {
        if self.exercise(&exercise.id).is_some() {
          return Err(SessionError::DuplicateExercise(exercise.id));
        }
        Arc::make_mut(&mut next.exercises).push(exercise);
        next.view = View::Dashboard;
        next.extracting = false;
        next.extraction_error = None;
        effect = Effect::Persist;
      }

      (View::CreateExercise, Event::ExtractionFailed { message, .. }) => {
        next.extracting = false;
        next.extraction_error = Some(message);
      }

      // A pending attempt keeps running; its result will be stale.
      (View::CreateExercise, Event::Cancel) => {
        next.view = View::Dashboard;
        next.extracting = false;
        next.extraction_error = None;
      }

      (View::Dashboard, Event::Start(id)) => {
        let exercise = self
          .exercise(&id)
          .cloned()
          .map(Arc::new)
          .ok_or(SessionError::UnknownExercise(id))?;
        next.answers = exercise
          .questions
          .iter()
          .map(|q| StudentAnswer::empty(&q.id))
          .collect();
        next.active = Some(exercise);
        next.submitted = None;
        next.score = None;
        next.view = View::DoExercise;
      }

      // Unknown ids leave the collection as is; it is persisted either way.
      (View::Dashboard, Event::Delete(id)) => {
        if self.exercise(&id).is_some() {
          Arc::make_mut(&mut next.exercises).retain(|e| e.id != id);
        }
        effect = Effect::Persist;
      }

      (View::DoExercise, Event::Answer { question_id, answer }) => {
        let active = self.active.as_ref().ok_or(SessionError::NoActiveExercise)?;
        if active.question(&question_id).is_none() {
          return Err(SessionError::UnknownQuestion(question_id));
        }
        match next.answers.iter_mut().find(|a| a.question_id == question_id) {
          Some(slot) => slot.answer = answer,
          None => next.answers.push(StudentAnswer { question_id, answer }),
        }
      }

      (View::DoExercise, Event::Finish) => {
        let active = self.active.as_ref().ok_or(SessionError::NoActiveExercise)?;
        next.score = Some(scoring::score(&active.questions, &self.answers));
        next.submitted = Some(self.answers.clone());
        next.view = View::Results;
      }

      (View::Results, Event::Review) => {
        next.view = View::ReviewExercise;
      }

      (View::Results | View::ReviewExercise, Event::Back) => {
        next.view = View::Dashboard;
        next.active = None;
        next.answers.clear();
        next.submitted = None;
        next.score = None;
      }

      (view, event) => {
        return Err(SessionError::InvalidTransition { view, event: event.name() });
      }
    }

    Ok(Transition { session: next, effect })
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::domain::{OriginalFile, Question, QuestionType, Subject};

  fn question(id: &str, correct: &str) -> Question {
    Question {
      id: id.into(),
      kind: QuestionType::FillInTheBlank,
      question_text: format!("{id}?"),
      options: None,
      correct_answer: correct.into(),
      image_url: None,
    }
  }

  fn exercise(id: &str) -> Exercise {
    Exercise {
      id: id.into(),
      title: "Bài tập Toán Vui".into(),
      subject: Subject::Toan,
      questions: vec![question("q-1", "4"), question("q-2", "15"), question("q-3", "A")],
      created_at: chrono::Utc::now(),
      original_file: OriginalFile::from_bytes("de.png", "image/png", b"png"),
    }
  }

  fn step(s: &Session, e: Event) -> Session {
    s.apply(e).unwrap().session
  }

  fn answer(s: &Session, q: &str, a: &str) -> Session {
    step(s, Event::Answer { question_id: q.into(), answer: a.into() })
  }

  #[test]
  fn starts_on_dashboard() {
    let s = Session::new(vec![exercise("ex-1")]);
    assert_eq!(s.view, View::Dashboard);
    assert!(s.active.is_none());
  }

  #[test]
  fn create_then_extract_appends_and_persists() {
    let s = step(&Session::default(), Event::CreateNew);
    assert_eq!(s.view, View::CreateExercise);

    let s = step(&s, Event::ExtractionStarted);
    assert!(s.extracting);

    assert_eq!(s.attempt, 1);

    let t = s.apply(Event::ExtractionSucceeded { attempt: 1, exercise: exercise("ex-1") }).unwrap();
    assert_eq!(t.effect, Effect::Persist);
    assert_eq!(t.session.view, View::Dashboard);
    assert_eq!(t.session.exercises.len(), 1);
    assert!(!t.session.extracting);
  }

  #[test]
  fn second_extraction_while_pending_is_rejected() {
    let s = step(&step(&Session::default(), Event::CreateNew), Event::ExtractionStarted);
    assert_eq!(s.apply(Event::ExtractionStarted).unwrap_err(), SessionError::ExtractionPending);
  }

  #[test]
  fn cancel_drops_pending_extraction() {
    let s = step(&step(&Session::default(), Event::CreateNew), Event::ExtractionStarted);
    let s = step(&s, Event::Cancel);
    assert_eq!(s.view, View::Dashboard);
    assert!(!s.extracting);

    // The abandoned call settles later and is ignored.
    let late = s.apply(Event::ExtractionSucceeded { attempt: 1, exercise: exercise("ex-1") });
    assert_eq!(late.unwrap_err(), SessionError::StaleExtraction(1));

    let s = step(&step(&s, Event::CreateNew), Event::ExtractionStarted);
    assert_eq!(s.attempt, 2);
    let late = s.apply(Event::ExtractionFailed { attempt: 1, message: "x".into() });
    assert_eq!(late.unwrap_err(), SessionError::StaleExtraction(1));
    assert!(s.extracting);

    let t = s.apply(Event::ExtractionSucceeded { attempt: 2, exercise: exercise("ex-2") }).unwrap();
    let ids: Vec<_> = t.session.exercises.iter().map(|e| e.id.as_str()).collect();
    assert_eq!(ids, ["ex-2"]);
  }

  #[test]
  fn result_without_started_attempt_is_stale() {
    let s = step(&Session::default(), Event::CreateNew);
    let err = s.apply(Event::ExtractionFailed { attempt: 0, message: "x".into() }).unwrap_err();
    assert_eq!(err, SessionError::StaleExtraction(0));
  }

  #[test]
  fn failed_extraction_stays_on_create_with_message() {
    let s = step(&step(&Session::default(), Event::CreateNew), Event::ExtractionStarted);
    let t = s.apply(Event::ExtractionFailed { attempt: 1, message: "thử lại".into() }).unwrap();
    assert_eq!(t.effect, Effect::None);
    assert_eq!(t.session.view, View::CreateExercise);
    assert_eq!(t.session.extraction_error.as_deref(), Some("thử lại"));
    assert!(!t.session.extracting);
    assert!(t.session.exercises.is_empty());

    // Retry is allowed after a failure.
    assert!(t.session.apply(Event::ExtractionStarted).is_ok());
  }

  #[test]
  fn cancel_returns_to_dashboard() {
    let s = step(&step(&Session::default(), Event::CreateNew), Event::Cancel);
    assert_eq!(s.view, View::Dashboard);
  }

  #[test]
  fn duplicate_exercise_id_is_rejected() {
    let s = step(&Session::new(vec![exercise("ex-1")]), Event::CreateNew);
    let s = step(&s, Event::ExtractionStarted);
    let err = s.apply(Event::ExtractionSucceeded { attempt: 1, exercise: exercise("ex-1") }).unwrap_err();
    assert_eq!(err, SessionError::DuplicateExercise("ex-1".into()));
  }

  #[test]
  fn start_unknown_id_stays_on_dashboard() {
    let s = Session::new(vec![exercise("ex-1")]);
    let err = s.apply(Event::Start("ex-404".into())).unwrap_err();
    assert_eq!(err, SessionError::UnknownExercise("ex-404".into()));
    assert_eq!(s.view, View::Dashboard);
  }

  #[test]
  fn start_creates_one_empty_answer_per_question() {
    let s = step(&Session::new(vec![exercise("ex-1")]), Event::Start("ex-1".into()));
    assert_eq!(s.view, View::DoExercise);
    assert_eq!(s.active.as_ref().map(|e| e.id.as_str()), Some("ex-1"));
    let ids: Vec<_> = s.answers.iter().map(|a| a.question_id.as_str()).collect();
    assert_eq!(ids, ["q-1", "q-2", "q-3"]);
    assert!(s.answers.iter().all(|a| a.answer.is_empty()));
  }

  #[test]
  fn delete_removes_one_and_persists() {
    let s = Session::new(vec![exercise("ex-1"), exercise("ex-2")]);
    let t = s.apply(Event::Delete("ex-1".into())).unwrap();
    assert_eq!(t.effect, Effect::Persist);
    let ids: Vec<_> = t.session.exercises.iter().map(|e| e.id.as_str()).collect();
    assert_eq!(ids, ["ex-2"]);
  }

  #[test]
  fn delete_unknown_id_is_persisted_noop() {
    let s = Session::new(vec![exercise("ex-1")]);
    let t = s.apply(Event::Delete("ex-404".into())).unwrap();
    assert_eq!(t.effect, Effect::Persist);
    assert_eq!(t.session.exercises, s.exercises);
    assert!(Arc::ptr_eq(&t.session.exercises, &s.exercises));
  }

  #[test]
  fn two_right_one_blank_scores_two_of_three() {
    let s = step(&Session::new(vec![exercise("ex-1")]), Event::Start("ex-1".into()));
    let s = answer(&s, "q-1", "4");
    let s = answer(&s, "q-2", " 15 ");
    let s = step(&s, Event::Finish);
    assert_eq!(s.view, View::Results);
    assert_eq!(s.score, Some(Score { correct: 2, total: 3 }));
    assert_eq!(s.submitted.as_ref().map(Vec::len), Some(3));
  }

  #[test]
  fn answering_shares_collection_and_active_exercise() {
    let s = step(&Session::new(vec![exercise("ex-1")]), Event::Start("ex-1".into()));
    let next = answer(&s, "q-1", "4");
    assert!(Arc::ptr_eq(&next.exercises, &s.exercises));
    assert!(Arc::ptr_eq(next.active.as_ref().unwrap(), s.active.as_ref().unwrap()));
  }

  #[test]
  fn finishing_unanswered_still_reaches_results() {
    let s = step(&Session::new(vec![exercise("ex-1")]), Event::Start("ex-1".into()));
    let s = step(&s, Event::Finish);
    assert_eq!(s.view, View::Results);
    assert_eq!(s.score, Some(Score { correct: 0, total: 3 }));
  }

  #[test]
  fn finish_without_active_exercise_is_rejected() {
    let s = Session { view: View::DoExercise, ..Session::default() };
    assert_eq!(s.apply(Event::Finish).unwrap_err(), SessionError::NoActiveExercise);
  }

  #[test]
  fn answer_for_unknown_question_is_rejected() {
    let s = step(&Session::new(vec![exercise("ex-1")]), Event::Start("ex-1".into()));
    let err = s
      .apply(Event::Answer { question_id: "q-9".into(), answer: "x".into() })
      .unwrap_err();
    assert_eq!(err, SessionError::UnknownQuestion("q-9".into()));
  }

  #[test]
  fn answers_are_frozen_at_submission() {
    let s = step(&Session::new(vec![exercise("ex-1")]), Event::Start("ex-1".into()));
    let s = step(&answer(&s, "q-1", "4"), Event::Finish);
    let err = s
      .apply(Event::Answer { question_id: "q-1".into(), answer: "5".into() })
      .unwrap_err();
    assert!(matches!(err, SessionError::InvalidTransition { view: View::Results, event: "answer" }));
  }

  #[test]
  fn review_then_back_clears_attempt() {
    let s = step(&Session::new(vec![exercise("ex-1")]), Event::Start("ex-1".into()));
    let s = step(&step(&s, Event::Finish), Event::Review);
    assert_eq!(s.view, View::ReviewExercise);

    let s = step(&s, Event::Back);
    assert_eq!(s.view, View::Dashboard);
    assert!(s.active.is_none());
    assert!(s.answers.is_empty());
    assert!(s.submitted.is_none());
    assert!(s.score.is_none());
    assert_eq!(s.exercises.len(), 1);
  }

  #[test]
  fn back_from_results_goes_home() {
    let s = step(&Session::new(vec![exercise("ex-1")]), Event::Start("ex-1".into()));
    let s = step(&step(&s, Event::Finish), Event::Back);
    assert_eq!(s.view, View::Dashboard);
  }

  #[test]
  fn events_outside_their_view_are_rejected() {
    let s = Session::default();
    for e in [Event::Finish, Event::Review, Event::Back, Event::Cancel, Event::ExtractionStarted] {
      let name = e.name();
      assert_eq!(
        s.apply(e).unwrap_err(),
        SessionError::InvalidTransition { view: View::Dashboard, event: name }
      );
    }
  }
}
