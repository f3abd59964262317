//! Praise after an attempt. Never fails: every error path ends in a canned phrase.

use rand::seq::SliceRandom;
use tracing::{error, info, instrument};

use crate::config::Prompts;
use crate::domain::Score;
use crate::gemini::{Gemini, InlineData};
use crate::util::fill_template;

#[derive(Clone, Debug, PartialEq)]
pub struct Encouragement {
  pub text: String,
  pub image: Option<InlineData>,
}

impl Encouragement {
  fn text_only(text: String) -> Self {
    Self { text, image: None }
  }
}

pub fn encouragement_prompt(prompts: &Prompts, student_name: &str, score: Score) -> String {
  let correct = score.correct.to_string();
  let total = score.total.to_string();
  let percentage = format!("{:.0}", score.percentage());
  fill_template(
    &prompts.encouragement_template,
    &[("name", student_name), ("correct", &correct), ("total", &total), ("percentage", &percentage)],
  )
}

/// A random configured praise line, or the failure phrase if none are configured.
pub fn fallback_praise(prompts: &Prompts, student_name: &str) -> String {
  match prompts.fallback_praises.choose(&mut rand::thread_rng()) {
    Some(line) => fill_template(line, &[("name", student_name)]),
    None => prompts.failure_praise.clone(),
  }
}

#[instrument(level = "info", skip(gemini, prompts, student_name), fields(correct = score.correct, total = score.total, ai = gemini.is_some()))]
pub async fn encourage(gemini: Option<&Gemini>, prompts: &Prompts, student_name: &str, score: Score) -> Encouragement {
  let Some(gemini) = gemini else {
    return Encouragement::text_only(fallback_praise(prompts, student_name));
  };

  let prompt = encouragement_prompt(prompts, student_name, score);
  match gemini.generate_text_and_image(&prompt).await {
    Ok(reply) => {
      info!(target: "exercise", text_len = reply.text.len(), has_image = reply.image.is_some(), "Encouragement generated");
      Encouragement { text: reply.text, image: reply.image }
    }
    Err(e) => {
      error!(target: "exercise", error = %e, "Encouragement failed; using fallback phrase");
      Encouragement::text_only(prompts.failure_praise.clone())
    }
  }
}
