//! Application state: the session, its blob store, config and optional Gemini client.
//!
//! This module owns:
//!   - the current `Session` behind a single write lock
//!   - the blob store the exercise collection is persisted to
//!   - the config (prompts, praise lines, storage key, limits)
//!   - optional Gemini client
//!
//! Every state change goes through `dispatch`, which runs the reducer and
//! performs its persistence effect before releasing the lock.

use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, info, instrument, warn};

use crate::config::{load_app_config_from_env, AppConfig};
use crate::error::SessionError;
use crate::gemini::Gemini;
use crate::protocol::{session_out, SessionOut};
use crate::session::{Effect, Event, Session};
use crate::storage::{load_exercises, save_exercises, BlobStore, FileBlobStore};

pub struct AppState {
    pub session: RwLock<Session>,
    pub store: Arc<dyn BlobStore>,
    pub gemini: Option<Gemini>,
    pub config: AppConfig,
}

impl AppState {
    /// Build state from env: load config, open the file store, load exercises, init Gemini.
    #[instrument(level = "info", skip_all)]
    pub fn new() -> Self {
        let config = load_app_config_from_env();
        let store = FileBlobStore::new(&config.storage.data_dir);
        info!(target: "baitap_backend", data_dir = %store.root().display(), key = %config.storage.key, "Using file blob store");

        let gemini = Gemini::from_env();
        if let Some(g) = &gemini {
            info!(target: "baitap_backend", base_url = %g.base_url, model = %g.model, image_model = ?g.image_model, "Gemini enabled.");
        } else {
            info!(target: "baitap_backend", "Gemini disabled (no GEMINI_API_KEY). Using mock extraction and canned praise.");
        }

        Self::from_parts(config, Arc::new(store), gemini)
    }

    pub fn from_parts(config: AppConfig, store: Arc<dyn BlobStore>, gemini: Option<Gemini>) -> Self {
        let exercises = load_exercises(store.as_ref(), &config.storage.key);
        info!(target: "exercise", count = exercises.len(), "Startup exercise inventory");
        Self {
            session: RwLock::new(Session::new(exercises)),
            store,
            gemini,
            config,
        }
    }

    /// Apply one event. On rejection the session is untouched.
    pub async fn dispatch(&self, event: Event) -> Result<SessionOut, SessionError> {
        self.dispatch_with(event, session_out).await
    }

    /// Enter the busy state and return the number of the new attempt.
    pub async fn begin_extraction(&self) -> Result<u64, SessionError> {
        self.dispatch_with(Event::ExtractionStarted, |s| s.attempt).await
    }

    /// Apply `event`, persist if asked to, and read `view` from the new session before the lock is released.
    #[instrument(level = "debug", skip(self, event, view), fields(event = event.name()))]
    async fn dispatch_with<T>(&self, event: Event, view: impl FnOnce(&Session) -> T) -> Result<T, SessionError> {
        let mut guard = self.session.write().await;
        let name = event.name();
        let from = guard.view;

        match guard.apply(event) {
            Ok(transition) => {
                if transition.effect == Effect::Persist {
                    save_exercises(self.store.as_ref(), &self.config.storage.key, &transition.session.exercises);
                }
                *guard = transition.session;
                debug!(target: "exercise", event = name, ?from, to = ?guard.view, "Session transition");
                Ok(view(&*guard))
            }
            Err(e) => {
                warn!(target: "exercise", event = name, view = ?from, error = %e, "Session event rejected");
                Err(e)
            }
        }
    }

    pub async fn snapshot(&self) -> SessionOut {
        session_out(&*self.session.read().await)
    }
}
