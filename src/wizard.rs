//! Session-scoped wizard state: current step, selections, credentials, achievements.
//!
//! Step changes go through one transition table (`Step::next`). Each setter validates its
//! own inputs and checks the transition before mutating, so a rejected call leaves the
//! state untouched.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::domain::{Achievement, ProviderKind, QuizQuestion, StudentProfile, Subject, Topic};
use crate::error::WizardError;

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "camelCase")]
pub enum Step {
  #[default]
  Onboarding,
  Subject,
  Topic,
  ApiKey,
  Lesson,
  Quiz,
}

impl fmt::Display for Step {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(match self {
      Step::Onboarding => "onboarding",
      Step::Subject => "subject",
      Step::Topic => "topic",
      Step::ApiKey => "apiKey",
      Step::Lesson => "lesson",
      Step::Quiz => "quiz",
    })
  }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Transition {
  ProfileSet,
  SubjectChosen,
  TopicChosen,
  KeyAccepted,
  QuizStarted,
  Back,
  Reset,
}

impl Transition {
  fn verb(&self) -> &'static str {
    match self {
      Transition::ProfileSet => "set the profile",
      Transition::SubjectChosen => "choose a subject",
      Transition::TopicChosen => "choose a topic",
      Transition::KeyAccepted => "accept an API key",
      Transition::QuizStarted => "start the quiz",
      Transition::Back => "go back",
      Transition::Reset => "reset",
    }
  }
}

impl Step {
  /// The transition table. `None` means the move is not allowed from this step.
  pub fn next(self, t: Transition) -> Option<Step> {
    use Step::*;
    use Transition::*;
    match (self, t) {
      (_, Reset) => Some(Onboarding),
      (Onboarding, ProfileSet) => Some(Subject),
      (Subject | Topic, SubjectChosen) => Some(Topic),
      (Topic | ApiKey, TopicChosen) => Some(ApiKey),
      (ApiKey, KeyAccepted) => Some(Lesson),
      (Lesson, QuizStarted) => Some(Quiz),
      (Subject, Back) => Some(Onboarding),
      (Topic, Back) => Some(Subject),
      (ApiKey, Back) => Some(Topic),
      (Lesson, Back) => Some(Topic),
      (Quiz, Back) => Some(Lesson),
      _ => None,
    }
  }
}

/// Inputs a generation call needs, cloned out so no lock is held during the request.
#[derive(Clone, Debug)]
pub struct ContentInputs {
  pub student: StudentProfile,
  pub subject: Subject,
  pub topic: Topic,
  pub provider: ProviderKind,
  pub api_key: String,
}

#[derive(Clone, Debug, Default)]
pub struct WizardState {
  step: Step,
  profile: Option<StudentProfile>,
  subject: Option<Subject>,
  topic: Option<Topic>,
  credentials: BTreeMap<ProviderKind, String>,
  active_provider: Option<ProviderKind>,
  achievements: Vec<Achievement>,
  quiz: Option<Vec<QuizQuestion>>,
}

/// Serializable view of a session. Never contains secrets.
#[derive(Clone, Debug, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct WizardSnapshot {
  pub step: Step,
  pub student: Option<StudentProfile>,
  pub subject: Option<Subject>,
  pub topic: Option<Topic>,
  pub providers: Vec<ProviderKind>,
  pub active_provider: Option<ProviderKind>,
  pub achievements: Vec<Achievement>,
  pub quiz_questions: usize,
}

impl WizardState {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn step(&self) -> Step {
    self.step
  }

  pub fn profile(&self) -> Option<&StudentProfile> {
    self.profile.as_ref()
  }

  pub fn subject(&self) -> Option<&Subject> {
    self.subject.as_ref()
  }

  pub fn topic(&self) -> Option<&Topic> {
    self.topic.as_ref()
  }

  pub fn achievements(&self) -> &[Achievement] {
    &self.achievements
  }

  fn target(&self, t: Transition) -> Result<Step, WizardError> {
    self.step.next(t).ok_or(WizardError::InvalidTransition { from: self.step, action: t.verb() })
  }

  /// Validates and stores the profile, moving onboarding → subject.
  pub fn set_profile(&mut self, profile: StudentProfile) -> Result<(), WizardError> {
    let next = self.target(Transition::ProfileSet)?;
    let profile = profile.normalized();
    profile.validate().map_err(WizardError::InvalidProfile)?;
    self.profile = Some(profile);
    self.step = next;
    Ok(())
  }

  /// Stores the subject (dropping a topic from another subject), moving to the topic step.
  pub fn set_subject(&mut self, subject: Subject) -> Result<(), WizardError> {
    let next = self.target(Transition::SubjectChosen)?;
    if self.topic.as_ref().is_some_and(|t| t.subject_id != subject.id) {
      self.topic = None;
    }
    self.subject = Some(subject);
    self.step = next;
    Ok(())
  }

  /// Stores a topic belonging to the selected subject, moving to the api-key step.
  pub fn set_topic(&mut self, topic: Topic) -> Result<(), WizardError> {
    let next = self.target(Transition::TopicChosen)?;
    let subject = self.subject.as_ref().ok_or(WizardError::Incomplete("subject"))?;
    if topic.subject_id != subject.id {
      return Err(WizardError::UnknownTopic { subject: subject.id.clone(), topic: topic.id });
    }
    self.topic = Some(topic);
    self.quiz = None;
    self.step = next;
    Ok(())
  }

  /// Adds or replaces the key for `kind`. The first stored key becomes active.
  pub fn add_credential(&mut self, kind: ProviderKind, key: &str) -> Result<(), WizardError> {
    let key = key.trim();
    if key.is_empty() {
      return Err(WizardError::MissingCredential(kind.to_string()));
    }
    self.credentials.insert(kind, key.to_string());
    if self.active_provider.is_none() {
      self.active_provider = Some(kind);
    }
    Ok(())
  }

  /// Removes the key for `kind`; if it was active, another stored key (if any) takes over.
  pub fn remove_credential(&mut self, kind: ProviderKind) -> bool {
    let removed = self.credentials.remove(&kind).is_some();
    if self.active_provider == Some(kind) {
      self.active_provider = self.credentials.keys().next().copied();
    }
    removed
  }

  pub fn set_active_provider(&mut self, kind: ProviderKind) -> Result<(), WizardError> {
    if !self.has_credential(kind) {
      return Err(WizardError::MissingCredential(kind.to_string()));
    }
    self.active_provider = Some(kind);
    Ok(())
  }

  pub fn has_credential(&self, kind: ProviderKind) -> bool {
    self.credentials.contains_key(&kind)
  }

  pub fn active_credential(&self) -> Option<(ProviderKind, &str)> {
    let kind = self.active_provider?;
    self.credentials.get(&kind).map(|k| (kind, k.as_str()))
  }

  /// api-key → lesson; requires a stored key for the active provider.
  pub fn accept_key(&mut self) -> Result<(), WizardError> {
    let next = self.target(Transition::KeyAccepted)?;
    if self.active_credential().is_none() {
      return Err(WizardError::MissingCredential("the active provider".into()));
    }
    self.step = next;
    Ok(())
  }

  /// lesson → quiz. Any previous quiz is discarded.
  pub fn start_quiz(&mut self) -> Result<(), WizardError> {
    self.step = self.target(Transition::QuizStarted)?;
    self.quiz = None;
    Ok(())
  }

  pub fn set_quiz(&mut self, questions: Vec<QuizQuestion>) {
    self.quiz = Some(questions);
  }

  pub fn quiz(&self) -> Option<&[QuizQuestion]> {
    self.quiz.as_deref()
  }

  pub fn back(&mut self) -> Result<Step, WizardError> {
    self.step = self.target(Transition::Back)?;
    Ok(self.step)
  }

  /// Records an achievement once. Returns it only the first time its id is seen, which is
  /// the caller's cue to notify the learner.
  pub fn record_achievement(&mut self, achievement: Achievement) -> Option<Achievement> {
    if self.achievements.iter().any(|a| a.id == achievement.id) {
      return None;
    }
    self.achievements.push(achievement.clone());
    Some(achievement)
  }

  /// Back to onboarding with no profile, subject or topic. Credentials and achievements stay.
  pub fn reset(&mut self) {
    self.profile = None;
    self.subject = None;
    self.topic = None;
    self.quiz = None;
    self.step = Step::Onboarding;
  }

  /// Everything a lesson/quiz request needs, or the first missing piece.
  pub fn content_inputs(&self) -> Result<ContentInputs, WizardError> {
    let student = self.profile.clone().ok_or(WizardError::Incomplete("profile"))?;
    let subject = self.subject.clone().ok_or(WizardError::Incomplete("subject"))?;
    let topic = self.topic.clone().ok_or(WizardError::Incomplete("topic"))?;
    let (provider, key) = self.active_credential()
      .ok_or_else(|| WizardError::MissingCredential("the active provider".into()))?;
    Ok(ContentInputs { student, subject, topic, provider, api_key: key.to_string() })
  }

  pub fn snapshot(&self) -> WizardSnapshot {
    WizardSnapshot {
      step: self.step,
      student: self.profile.clone(),
      subject: self.subject.clone(),
      topic: self.topic.clone(),
      providers: self.credentials.keys().copied().collect(),
      active_provider: self.active_provider,
      achievements: self.achievements.clone(),
      quiz_questions: self.quiz.as_ref().map_or(0, Vec::len),
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::catalog::{self, Catalog};

  fn profile() -> StudentProfile {
    StudentProfile { name: "Ada".into(), age: 10, grade: 5, interests: vec!["robots".into()] }
  }

  /// Walks a fresh wizard to the lesson step with a Gemini key.
  fn at_lesson() -> WizardState {
    let cat = Catalog::builtin();
    let mut w = WizardState::new();
    w.set_profile(profile()).unwrap();
    w.set_subject(cat.subject("math").unwrap().clone()).unwrap();
    w.set_topic(cat.topic("math", "fractions").unwrap().clone()).unwrap();
    w.add_credential(ProviderKind::Gemini, "g-key").unwrap();
    w.accept_key().unwrap();
    w
  }

  #[test]
  fn happy_path_walks_every_step() {
    let mut w = at_lesson();
    assert_eq!(w.step(), Step::Lesson);
    w.start_quiz().unwrap();
    assert_eq!(w.step(), Step::Quiz);
    assert_eq!(w.back().unwrap(), Step::Lesson);
  }

  #[test]
  fn transition_table_rejects_illegal_moves() {
    assert_eq!(Step::Onboarding.next(Transition::KeyAccepted), None);
    assert_eq!(Step::Onboarding.next(Transition::Back), None);
    assert_eq!(Step::Quiz.next(Transition::ProfileSet), None);
    assert_eq!(Step::Lesson.next(Transition::Back), Some(Step::Topic));
    for s in [Step::Onboarding, Step::Subject, Step::Topic, Step::ApiKey, Step::Lesson, Step::Quiz] {
      assert_eq!(s.next(Transition::Reset), Some(Step::Onboarding));
    }

    let mut w = WizardState::new();
    let err = w.start_quiz().unwrap_err();
    assert_eq!(err, WizardError::InvalidTransition { from: Step::Onboarding, action: "start the quiz" });
    assert_eq!(w.step(), Step::Onboarding);
  }

  #[test]
  fn invalid_profile_leaves_state_untouched() {
    let mut w = WizardState::new();
    let err = w.set_profile(StudentProfile { age: 30, ..profile() }).unwrap_err();
    assert!(matches!(err, WizardError::InvalidProfile(_)));
    assert_eq!(w.step(), Step::Onboarding);
    assert!(w.profile().is_none());
  }

  #[test]
  fn topic_must_belong_to_selected_subject() {
    let cat = Catalog::builtin();
    let mut w = WizardState::new();
    w.set_profile(profile()).unwrap();
    w.set_subject(cat.subject("math").unwrap().clone()).unwrap();
    let err = w.set_topic(cat.topic("science", "plants").unwrap().clone()).unwrap_err();
    assert!(matches!(err, WizardError::UnknownTopic { .. }));
    assert_eq!(w.step(), Step::Topic);
  }

  #[test]
  fn accept_key_requires_credential() {
    let cat = Catalog::builtin();
    let mut w = WizardState::new();
    w.set_profile(profile()).unwrap();
    w.set_subject(cat.subject("art").unwrap().clone()).unwrap();
    w.set_topic(cat.topic("art", "colors").unwrap().clone()).unwrap();
    assert!(matches!(w.accept_key(), Err(WizardError::MissingCredential(_))));
    assert!(matches!(w.add_credential(ProviderKind::OpenAi, "  "), Err(WizardError::MissingCredential(_))));
    w.add_credential(ProviderKind::OpenAi, "o-key").unwrap();
    w.accept_key().unwrap();
    assert_eq!(w.step(), Step::Lesson);
  }

  #[test]
  fn credentials_switch_active_on_removal() {
    let mut w = WizardState::new();
    w.add_credential(ProviderKind::OpenAi, "o").unwrap();
    w.add_credential(ProviderKind::Gemini, "g").unwrap();
    assert_eq!(w.active_credential(), Some((ProviderKind::OpenAi, "o")));
    w.set_active_provider(ProviderKind::Gemini).unwrap();
    assert!(w.remove_credential(ProviderKind::Gemini));
    assert_eq!(w.active_credential(), Some((ProviderKind::OpenAi, "o")));
    assert!(!w.remove_credential(ProviderKind::Gemini));
    assert!(w.set_active_provider(ProviderKind::Gemini).is_err());
  }

  #[test]
  fn achievement_recording_is_idempotent() {
    let mut w = WizardState::new();
    assert!(w.record_achievement(catalog::profile_created()).is_some());
    assert!(w.record_achievement(catalog::profile_created()).is_none());
    assert_eq!(w.achievements().len(), 1);
  }

  #[test]
  fn reset_keeps_credentials_and_achievements() {
    let mut w = at_lesson();
    w.record_achievement(catalog::quiz_master());
    w.reset();
    assert_eq!(w.step(), Step::Onboarding);
    assert!(w.profile().is_none() && w.subject().is_none() && w.topic().is_none());
    assert!(w.has_credential(ProviderKind::Gemini));
    assert_eq!(w.active_credential(), Some((ProviderKind::Gemini, "g-key")));
    assert_eq!(w.achievements().len(), 1);
  }

  #[test]
  fn snapshot_hides_secrets() {
    let w = at_lesson();
    let json = serde_json::to_string(&w.snapshot()).unwrap();
    assert!(json.contains("\"step\":\"lesson\""));
    assert!(json.contains("\"providers\":[\"gemini\"]"));
    assert!(!json.contains("g-key"));
  }

  #[test]
  fn content_inputs_reports_first_gap() {
    let w = WizardState::new();
    assert_eq!(w.content_inputs().unwrap_err(), WizardError::Incomplete("profile"));
    let inputs = at_lesson().content_inputs().unwrap();
    assert_eq!(inputs.topic.id, "fractions");
    assert_eq!(inputs.api_key, "g-key");
  }
}
