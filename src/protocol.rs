//! Public protocol structs for the HTTP API (serde ready).
//! Keep this small and stable to evolve backend and frontend independently.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::{Exercise, QuestionType, Score, StudentAnswer, Subject};
use crate::scoring::ReviewItem;
use crate::session::{Event, Session, View};

/// UI events the browser can send. Extraction events are driven by the upload endpoint.
#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientEvent {
    CreateNew,
    Cancel,
    Start {
        #[serde(rename = "exerciseId")]
        exercise_id: String,
    },
    Delete {
        #[serde(rename = "exerciseId")]
        exercise_id: String,
    },
    Answer {
        #[serde(rename = "questionId")]
        question_id: String,
        answer: String,
    },
    Finish,
    Review,
    Back,
}

impl From<ClientEvent> for Event {
    fn from(e: ClientEvent) -> Self {
        match e {
            ClientEvent::CreateNew => Event::CreateNew,
            ClientEvent::Cancel => Event::Cancel,
            ClientEvent::Start { exercise_id } => Event::Start(exercise_id),
            ClientEvent::Delete { exercise_id } => Event::Delete(exercise_id),
            ClientEvent::Answer { question_id, answer } => Event::Answer { question_id, answer },
            ClientEvent::Finish => Event::Finish,
            ClientEvent::Review => Event::Review,
            ClientEvent::Back => Event::Back,
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionOut {
    pub view: View,
    pub subjects: Vec<SubjectGroupOut>,
    pub active_exercise: Option<ActiveExerciseOut>,
    pub answers: Vec<StudentAnswer>,
    pub score: Option<ScoreOut>,
    pub extracting: bool,
    pub extraction_error: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct SubjectGroupOut {
    pub subject: Subject,
    pub exercises: Vec<ExerciseSummaryOut>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExerciseSummaryOut {
    pub id: String,
    pub title: String,
    pub subject: Subject,
    pub question_count: usize,
    pub created_at: DateTime<Utc>,
}

/// Exercise as shown while answering: no correct answers.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ActiveExerciseOut {
    pub id: String,
    pub title: String,
    pub subject: Subject,
    pub file_name: String,
    pub file_type: String,
    pub questions: Vec<QuestionOut>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QuestionOut {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: QuestionType,
    pub question_text: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub options: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ScoreOut {
    pub correct: usize,
    pub total: usize,
    pub percentage: f64,
}

impl From<Score> for ScoreOut {
    fn from(s: Score) -> Self {
        ScoreOut { correct: s.correct, total: s.total, percentage: s.percentage() }
    }
}

pub fn summary_out(e: &Exercise) -> ExerciseSummaryOut {
    ExerciseSummaryOut {
        id: e.id.clone(),
        title: e.title.clone(),
        subject: e.subject,
        question_count: e.questions.len(),
        created_at: e.created_at,
    }
}

pub fn active_out(e: &Exercise) -> ActiveExerciseOut {
    ActiveExerciseOut {
        id: e.id.clone(),
        title: e.title.clone(),
        subject: e.subject,
        file_name: e.original_file.name.clone(),
        file_type: e.original_file.mime_type.clone(),
        questions: e
            .questions
            .iter()
            .map(|q| QuestionOut {
                id: q.id.clone(),
                kind: q.kind,
                question_text: q.question_text.clone(),
                options: q.options.clone(),
                image_url: q.image_url.clone(),
            })
            .collect(),
    }
}

/// Snapshot of the whole session for the UI.
pub fn session_out(s: &Session) -> SessionOut {
    SessionOut {
        view: s.view,
        subjects: crate::logic::group_by_subject(&s.exercises)
            .into_iter()
            .map(|(subject, list)| SubjectGroupOut {
                subject,
                exercises: list.into_iter().map(summary_out).collect(),
            })
            .collect(),
        active_exercise: s.active.as_deref().map(active_out),
        answers: s.answers.clone(),
        score: s.score.map(ScoreOut::from),
        extracting: s.extracting,
        extraction_error: s.extraction_error.clone(),
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EncouragementOut {
    pub text: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReviewOut {
    pub exercise_id: String,
    pub title: String,
    pub file_name: String,
    pub file_type: String,
    pub score: ScoreOut,
    pub items: Vec<ReviewItem>,
}

#[derive(Debug, Serialize)]
pub struct ErrorOut {
    pub error: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthOut {
    pub ok: bool,
    pub ai_enabled: bool,
}
