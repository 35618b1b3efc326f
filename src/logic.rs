//! Core behaviors shared by both HTTP and WebSocket handlers.
//!
//! This includes:
//!   - Applying client commands to a session's wizard
//!   - Key validation before a credential is stored
//!   - Lesson/quiz generation through the selected provider (lock released meanwhile)
//!   - Quiz scoring and achievement notifications
//!   - Stateless one-shot generation/scoring used by the plain HTTP endpoints

use tracing::{debug, error, info, instrument, warn};

use crate::catalog::{self, custom_topic};
use crate::content::{self, quiz_len, ContentRequest};
use crate::domain::{Achievement, LessonContent, ProviderKind, QuizQuestion, Subject, Topic};
use crate::error::{ContentError, WizardError};
use crate::protocol::{ClientMessage, ContentIn, ContentOut, CustomTopicIn, ServerMessage};
use crate::providers::{validate_api_key, Provider};
use crate::scoring::{achievement_for, score_quiz};
use crate::state::AppState;
use crate::wizard::{ContentInputs, Step, WizardState};

type Replies = Result<Vec<ServerMessage>, WizardError>;

fn state_msg(w: &WizardState) -> ServerMessage {
  ServerMessage::State { state: w.snapshot() }
}

/// Records `a` and queues the one-time notification if it is new.
fn unlock(w: &mut WizardState, a: Achievement, out: &mut Vec<ServerMessage>) {
  if let Some(achievement) = w.record_achievement(a) {
    info!(target: "wizard", id = %achievement.id, "Achievement unlocked");
    out.push(ServerMessage::AchievementUnlocked { achievement });
  }
}

/// Dispatches one client command for `session`. Failures become a single `error` message.
#[instrument(level = "info", skip(state, msg), fields(%session))]
pub async fn handle_message(state: &AppState, session: &str, msg: ClientMessage) -> Vec<ServerMessage> {
  debug!(target: "wizard", kind = msg.kind(), "Client message");
  let res: Replies = match msg {
    ClientMessage::Ping => Ok(vec![ServerMessage::Pong]),
    ClientMessage::GetState => state.with_session(session, |w| Ok(vec![state_msg(w)])).await,

    ClientMessage::SetProfile { student } => {
      state.with_session(session, |w| {
        w.set_profile(student)?;
        if let Some(p) = w.profile() {
          info!(target: "wizard", age = p.age, grade = p.grade, interests = p.interests.len(), "Profile set");
        }
        let mut out = Vec::new();
        unlock(w, catalog::profile_created(), &mut out);
        out.push(state_msg(w));
        Ok(out)
      }).await
    }

    ClientMessage::SelectSubject { subject_id } => {
      let subject = state.catalog.subject(&subject_id).cloned()
        .ok_or(WizardError::UnknownSubject(subject_id));
      match subject {
        Ok(subject) => state.with_session(session, |w| {
          let name = subject.name.clone();
          w.set_subject(subject)?;
          let mut out = Vec::new();
          unlock(w, catalog::subject_selected(&name), &mut out);
          out.push(state_msg(w));
          Ok(out)
        }).await,
        Err(e) => Err(e),
      }
    }

    ClientMessage::SelectTopic { topic_id } => {
      let catalog = &state.catalog;
      state.with_session(session, |w| {
        let subject = w.subject().ok_or(WizardError::Incomplete("subject"))?;
        let topic = catalog.topic(&subject.id, &topic_id).cloned()
          .ok_or_else(|| WizardError::UnknownTopic { subject: subject.id.clone(), topic: topic_id.clone() })?;
        choose_topic(w, topic)
      }).await
    }

    ClientMessage::CustomTopic { name, description, difficulty } => {
      state.with_session(session, |w| {
        let subject = w.subject().ok_or(WizardError::Incomplete("subject"))?;
        let topic = custom_topic(&subject.id, &name, description.as_deref(), difficulty)
          .ok_or_else(|| WizardError::InvalidTopic(format!("'{}' has no usable characters", name.trim())))?;
        choose_topic(w, topic)
      }).await
    }

    ClientMessage::SubmitApiKey { provider, api_key } => submit_api_key(state, session, provider, &api_key).await,

    ClientMessage::RemoveApiKey { provider } => {
      state.with_session(session, |w| {
        let removed = w.remove_credential(provider);
        info!(target: "wizard", %provider, removed, "API key removed");
        Ok(vec![state_msg(w)])
      }).await
    }

    ClientMessage::SetActiveProvider { provider } => {
      state.with_session(session, |w| {
        w.set_active_provider(provider)?;
        Ok(vec![state_msg(w)])
      }).await
    }

    ClientMessage::GenerateLesson => session_lesson(state, session).await,

    ClientMessage::StartQuiz => {
      state.with_session(session, |w| {
        w.start_quiz()?;
        Ok(vec![state_msg(w)])
      }).await
    }

    ClientMessage::GenerateQuiz { number_of_questions } => session_quiz(state, session, quiz_len(number_of_questions)).await,

    ClientMessage::SubmitQuiz { answers } => {
      state.with_session(session, |w| {
        if w.step() != Step::Quiz {
          return Err(WizardError::InvalidTransition { from: w.step(), action: "submit a quiz" });
        }
        let questions = w.quiz().ok_or(WizardError::NoQuiz)?;
        let result = score_quiz(questions, &answers);
        info!(target: "wizard", score = result.rounded_score(), correct = result.correct_answers, total = result.total_questions, "Quiz scored");
        let earned = achievement_for(&result);
        let mut out = vec![ServerMessage::QuizResult { result }];
        if let Some(a) = earned {
          unlock(w, a, &mut out);
        }
        out.push(state_msg(w));
        Ok(out)
      }).await
    }

    ClientMessage::Back => {
      state.with_session(session, |w| {
        let step = w.back()?;
        debug!(target: "wizard", %step, "Stepped back");
        Ok(vec![state_msg(w)])
      }).await
    }

    ClientMessage::Reset => {
      state.with_session(session, |w| {
        w.reset();
        info!(target: "wizard", kept_achievements = w.achievements().len(), "Wizard reset");
        Ok(vec![state_msg(w)])
      }).await
    }
  };

  res.unwrap_or_else(|e| {
    warn!(target: "wizard", error = %e, "Command rejected");
    vec![ServerMessage::Error { message: e.to_string() }]
  })
}

fn choose_topic(w: &mut WizardState, topic: Topic) -> Replies {
  let name = topic.name.clone();
  w.set_topic(topic)?;
  debug!(target: "wizard", topic = ?w.topic().map(|t| t.id.as_str()), "Topic chosen");
  let mut out = Vec::new();
  unlock(w, catalog::topic_selected(&name), &mut out);
  out.push(state_msg(w));
  Ok(out)
}

/// Validates the key against the provider, then stores it and makes it active.
/// From the api-key step this also advances to the lesson.
async fn submit_api_key(state: &AppState, session: &str, provider: ProviderKind, api_key: &str) -> Replies {
  // Fail on unknown sessions before spending a request.
  state.with_session(session, |_| Ok(())).await?;

  if !validate_api_key(&state.http, &state.config, provider, api_key).await {
    warn!(target: "wizard", %provider, "API key rejected");
    return Ok(vec![ServerMessage::KeyRejected {
      provider,
      message: "Invalid API key. Please check and try again.".into(),
    }]);
  }

  state.with_session(session, |w| {
    w.add_credential(provider, api_key)?;
    w.set_active_provider(provider)?;
    let mut out = Vec::new();
    if w.step() == Step::ApiKey {
      w.accept_key()?;
    }
    unlock(w, catalog::api_connected(provider.display_name()), &mut out);
    out.push(state_msg(w));
    Ok(out)
  }).await
}

/// True while the session is still on `step` with the subject and topic `inputs` were taken from.
/// Results that resolve after the learner navigated away are dropped.
fn still_current(w: &WizardState, step: Step, inputs: &ContentInputs) -> bool {
  w.step() == step
    && w.subject().is_some_and(|s| s.id == inputs.subject.id)
    && w.topic().is_some_and(|t| t.id == inputs.topic.id && t.subject_id == inputs.topic.subject_id)
}

/// Copies generation inputs out of the session after checking the step.
async fn inputs_for(state: &AppState, session: &str, step: Step, action: &'static str) -> Result<Result<ContentInputs, ContentError>, WizardError> {
  state.with_session(session, |w| {
    if w.step() != step {
      return Err(WizardError::InvalidTransition { from: w.step(), action });
    }
    match w.content_inputs() {
      Ok(inputs) => Ok(Ok(inputs)),
      Err(WizardError::MissingCredential(_)) => Ok(Err(ContentError::MissingApiKey)),
      Err(e) => Err(e),
    }
  }).await
}

async fn session_lesson(state: &AppState, session: &str) -> Replies {
  let inputs = match inputs_for(state, session, Step::Lesson, "generate a lesson").await? {
    Ok(inputs) => inputs,
    Err(e) => return Ok(vec![ServerMessage::Lesson(Err::<content::Generated<LessonContent>, _>(e).into())]),
  };

  let res = generate_lesson_for(state, &inputs).await;
  let ok = res.is_ok();
  let topic_name = inputs.topic.name.clone();

  state.with_session(session, |w| {
    if !still_current(w, Step::Lesson, &inputs) {
      debug!(target: "wizard", step = %w.step(), "Discarding lesson for a step the learner left");
      return Ok(vec![state_msg(w)]);
    }
    let mut out = vec![ServerMessage::Lesson(res.into())];
    if ok {
      unlock(w, catalog::first_lesson(&topic_name), &mut out);
    }
    out.push(state_msg(w));
    Ok(out)
  }).await
}

async fn session_quiz(state: &AppState, session: &str, count: usize) -> Replies {
  let inputs = match inputs_for(state, session, Step::Quiz, "generate a quiz").await? {
    Ok(inputs) => inputs,
    Err(e) => return Ok(vec![ServerMessage::Quiz(Err::<content::Generated<Vec<QuizQuestion>>, _>(e).into())]),
  };

  let res = generate_quiz_for(state, &inputs, count).await;

  state.with_session(session, |w| {
    if !still_current(w, Step::Quiz, &inputs) {
      debug!(target: "wizard", step = %w.step(), "Discarding quiz for a step the learner left");
      return Ok(vec![state_msg(w)]);
    }
    if let Ok(g) = &res {
      w.set_quiz(g.content.clone());
    }
    Ok(vec![ServerMessage::Quiz(res.into()), state_msg(w)])
  }).await
}

async fn generate_lesson_for(state: &AppState, inputs: &ContentInputs) -> Result<content::Generated<LessonContent>, ContentError> {
  let provider = Provider::new(inputs.provider, &inputs.api_key, &state.config, state.http.clone())?;
  debug!(target: "content", provider = %provider.kind(), topic = %inputs.topic.id, "Generating lesson");
  let req = ContentRequest { student: &inputs.student, subject: &inputs.subject, topic: &inputs.topic };
  content::generate_lesson(&provider, &state.config.prompts, req).await.map_err(|e| {
    error!(target: "content", provider = %inputs.provider, error = %e, "Lesson generation failed");
    e
  })
}

async fn generate_quiz_for(state: &AppState, inputs: &ContentInputs, count: usize) -> Result<content::Generated<Vec<QuizQuestion>>, ContentError> {
  let provider = Provider::new(inputs.provider, &inputs.api_key, &state.config, state.http.clone())?;
  let req = ContentRequest { student: &inputs.student, subject: &inputs.subject, topic: &inputs.topic };
  content::generate_quiz(&provider, &state.config.prompts, req, count).await.map_err(|e| {
    error!(target: "content", provider = %inputs.provider, error = %e, "Quiz generation failed");
    e
  })
}

// -------- Stateless one-shot helpers (plain HTTP API) --------

fn resolve_topic(state: &AppState, subject_id: &str, topic_id: Option<&str>, custom: Option<&CustomTopicIn>) -> Result<(Subject, Topic), WizardError> {
  let subject = state.catalog.subject(subject_id).cloned()
    .ok_or_else(|| WizardError::UnknownSubject(subject_id.to_string()))?;
  let topic = match (topic_id, custom) {
    (Some(id), _) => state.catalog.topic(subject_id, id).cloned()
      .ok_or_else(|| WizardError::UnknownTopic { subject: subject_id.to_string(), topic: id.to_string() })?,
    (None, Some(c)) => custom_topic(subject_id, &c.name, c.description.as_deref(), c.difficulty)
      .ok_or_else(|| WizardError::InvalidTopic(format!("'{}' has no usable characters", c.name.trim())))?,
    (None, None) => return Err(WizardError::Incomplete("topic")),
  };
  Ok((subject, topic))
}

fn one_shot_inputs(state: &AppState, body: ContentIn) -> Result<ContentInputs, WizardError> {
  let student = body.student.normalized();
  student.validate().map_err(WizardError::InvalidProfile)?;
  let (subject, topic) = resolve_topic(state, &body.subject_id, body.topic_id.as_deref(), body.custom_topic.as_ref())?;
  Ok(ContentInputs { student, subject, topic, provider: body.provider, api_key: body.api_key })
}

/// Lesson for a fully specified request. Bad inputs are `Err`; provider failures are inside `ContentOut`.
#[instrument(level = "info", skip(state, body), fields(provider = %body.provider, subject = %body.subject_id))]
pub async fn one_shot_lesson(state: &AppState, body: ContentIn) -> Result<ContentOut<LessonContent>, WizardError> {
  let inputs = one_shot_inputs(state, body)?;
  Ok(generate_lesson_for(state, &inputs).await.into())
}

#[instrument(level = "info", skip(state, body), fields(provider = %body.provider, subject = %body.subject_id))]
pub async fn one_shot_quiz(state: &AppState, body: ContentIn) -> Result<ContentOut<Vec<QuizQuestion>>, WizardError> {
  let count = quiz_len(body.number_of_questions);
  let inputs = one_shot_inputs(state, body)?;
  Ok(generate_quiz_for(state, &inputs, count).await.into())
}
