//! Domain models: learner profile, catalog entries, providers, lesson + quiz content.
//!
//! Wire names are camelCase to match what the front-end and the model prompts use.

use serde::{Deserialize, Serialize};

/// The two supported text-generation backends.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
  /// Google Gemini (`generateContent`, key in query string).
  Gemini,
  /// OpenAI-compatible chat completions (bearer token).
  #[serde(rename = "openai")]
  OpenAi,
}

impl ProviderKind {
  pub fn as_str(&self) -> &'static str {
    match self {
      ProviderKind::Gemini => "gemini",
      ProviderKind::OpenAi => "openai",
    }
  }

  pub fn display_name(&self) -> &'static str {
    match self {
      ProviderKind::Gemini => "Gemini AI",
      ProviderKind::OpenAi => "OpenAI",
    }
  }
}

impl std::fmt::Display for ProviderKind {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.write_str(self.as_str())
  }
}

/// Learner profile collected at onboarding.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct StudentProfile {
  pub name: String,
  pub age: u8,
  pub grade: u8,
  pub interests: Vec<String>,
}

pub const MIN_AGE: u8 = 5;
pub const MAX_AGE: u8 = 18;
pub const MIN_GRADE: u8 = 1;
pub const MAX_GRADE: u8 = 12;

impl StudentProfile {
  /// Trims the name and interests and drops duplicate/blank interests.
  pub fn normalized(mut self) -> Self {
    self.name = self.name.trim().to_string();
    let mut seen: Vec<String> = Vec::with_capacity(self.interests.len());
    for i in self.interests.drain(..) {
      let t = i.trim().to_string();
      if !t.is_empty() && !seen.contains(&t) {
        seen.push(t);
      }
    }
    self.interests = seen;
    self
  }

  /// Checks presence and ranges. Returns a human-readable reason on failure.
  pub fn validate(&self) -> Result<(), String> {
    if self.name.trim().is_empty() {
      return Err("Please enter your name".into());
    }
    if !(MIN_AGE..=MAX_AGE).contains(&self.age) {
      return Err(format!("Age must be between {MIN_AGE} and {MAX_AGE}"));
    }
    if !(MIN_GRADE..=MAX_GRADE).contains(&self.grade) {
      return Err(format!("Grade must be between {MIN_GRADE} and {MAX_GRADE}"));
    }
    if self.interests.is_empty() {
      return Err("Please add at least one interest".into());
    }
    if self.interests.iter().any(|i| i.trim().is_empty()) {
      return Err("Interests cannot be blank".into());
    }
    for (idx, i) in self.interests.iter().enumerate() {
      if self.interests[..idx].contains(i) {
        return Err(format!("Duplicate interest '{i}'"));
      }
    }
    Ok(())
  }

  /// First interest; profiles are validated non-empty before use.
  pub fn primary_interest(&self) -> &str {
    self.interests.first().map(String::as_str).unwrap_or("learning")
  }
}

/// Static catalog subject.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct Subject {
  pub id: String,
  pub name: String,
  pub description: String,
  pub icon: String,
  pub color: String,
}

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum Difficulty {
  #[default]
  Beginner,
  Intermediate,
  Advanced,
}

impl Difficulty {
  pub fn as_str(&self) -> &'static str {
    match self {
      Difficulty::Beginner => "beginner",
      Difficulty::Intermediate => "intermediate",
      Difficulty::Advanced => "advanced",
    }
  }
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Topic {
  pub id: String,
  pub subject_id: String,
  pub name: String,
  #[serde(default)]
  pub description: String,
  #[serde(default)]
  pub difficulty: Difficulty,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct Achievement {
  pub id: String,
  pub title: String,
  pub description: String,
  pub icon: String,
}

// ---------------------------------------------------------------------------
// Lesson content
// ---------------------------------------------------------------------------

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Default)]
#[serde(rename_all = "camelCase")]
pub struct LessonContent {
  pub title: String,
  pub introduction: String,
  pub sections: Vec<LessonSection>,
  pub summary: String,
  pub related_topics: Vec<String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub worksheets: Option<Vec<Worksheet>>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub images: Option<Vec<LessonImage>>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub interactive_exercises: Option<Vec<InteractiveExercise>>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub videos: Option<Vec<VideoReference>>,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct LessonSection {
  pub title: String,
  pub content: String,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub example: Option<String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub activity: Option<LessonActivity>,
}

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ActivityKind {
  Question,
  Exercise,
  Experiment,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct LessonActivity {
  #[serde(rename = "type")]
  pub kind: ActivityKind,
  pub description: String,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub solution: Option<String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub hints: Option<Vec<String>>,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct Worksheet {
  pub title: String,
  pub problems: Vec<WorksheetProblem>,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct WorksheetProblem {
  pub question: String,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub answer: Option<String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub difficulty: Option<Difficulty>,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct LessonImage {
  pub description: String,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub url: Option<String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub alt: Option<String>,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct InteractiveExercise {
  pub title: String,
  pub description: String,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub instructions: Option<String>,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct VideoReference {
  pub title: String,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub description: Option<String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub url: Option<String>,
}

// ---------------------------------------------------------------------------
// Quiz
// ---------------------------------------------------------------------------

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum QuestionKind {
  MultipleChoice,
  TrueFalse,
  ShortAnswer,
}

/// Either an option index (multiple choice) or a literal answer.
/// Equality is strict: `Index(1)` never equals `Text("1")`.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(untagged)]
pub enum AnswerValue {
  Index(u64),
  Text(String),
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct QuizQuestion {
  #[serde(default)]
  pub id: String,
  #[serde(rename = "type")]
  pub kind: QuestionKind,
  pub question: String,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub options: Option<Vec<String>>,
  pub correct_answer: AnswerValue,
  pub explanation: String,
}

impl QuizQuestion {
  /// Shape check beyond field presence: multiple-choice needs options and an in-range index.
  pub fn check_shape(&self) -> Result<(), String> {
    if self.kind == QuestionKind::MultipleChoice {
      let opts = self.options.as_ref().filter(|o| !o.is_empty())
        .ok_or_else(|| format!("question '{}' has no options", self.id))?;
      match &self.correct_answer {
        AnswerValue::Index(i) if (*i as usize) < opts.len() => {}
        AnswerValue::Index(i) => return Err(format!("question '{}' answer index {} out of range", self.id, i)),
        AnswerValue::Text(_) => return Err(format!("question '{}' needs an index answer", self.id)),
      }
    }
    Ok(())
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn profile() -> StudentProfile {
    StudentProfile { name: "Ada".into(), age: 10, grade: 5, interests: vec!["robots".into()] }
  }

  #[test]
  fn profile_validation_enforces_ranges() {
    assert!(profile().validate().is_ok());
    assert!(StudentProfile { age: 4, ..profile() }.validate().is_err());
    assert!(StudentProfile { age: 19, ..profile() }.validate().is_err());
    assert!(StudentProfile { grade: 0, ..profile() }.validate().is_err());
    assert!(StudentProfile { grade: 13, ..profile() }.validate().is_err());
    assert!(StudentProfile { name: "  ".into(), ..profile() }.validate().is_err());
    assert!(StudentProfile { interests: vec![], ..profile() }.validate().is_err());
    assert!(StudentProfile { interests: vec!["a".into(), "a".into()], ..profile() }.validate().is_err());
  }

  #[test]
  fn normalized_dedups_and_trims_interests() {
    let p = StudentProfile {
      name: " Ada ".into(),
      interests: vec![" robots".into(), "robots ".into(), "".into(), "space".into()],
      ..profile()
    }
    .normalized();
    assert_eq!(p.name, "Ada");
    assert_eq!(p.interests, vec!["robots".to_string(), "space".to_string()]);
  }

  #[test]
  fn answer_values_decode_strictly() {
    let idx: AnswerValue = serde_json::from_str("2").unwrap();
    let txt: AnswerValue = serde_json::from_str("\"2\"").unwrap();
    assert_eq!(idx, AnswerValue::Index(2));
    assert_eq!(txt, AnswerValue::Text("2".into()));
    assert_ne!(idx, txt);
  }

  #[test]
  fn multiple_choice_shape_is_checked() {
    let mut q = QuizQuestion {
      id: "1".into(),
      kind: QuestionKind::MultipleChoice,
      question: "?".into(),
      options: Some(vec!["a".into(), "b".into()]),
      correct_answer: AnswerValue::Index(1),
      explanation: "b".into(),
    };
    assert!(q.check_shape().is_ok());
    q.correct_answer = AnswerValue::Index(2);
    assert!(q.check_shape().is_err());
    q.options = None;
    assert!(q.check_shape().is_err());
  }

  #[test]
  fn provider_kind_wire_names() {
    assert_eq!(serde_json::to_string(&ProviderKind::OpenAi).unwrap(), "\"openai\"");
    assert_eq!(serde_json::from_str::<ProviderKind>("\"gemini\"").unwrap(), ProviderKind::Gemini);
  }
}
