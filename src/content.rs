//! Content request adapter: prompt construction, strict parsing, fallback policy.
//!
//! Flow:
//! 1) Fill the lesson/quiz template with the learner, subject and topic.
//! 2) Ask the selected provider for text (errors here are surfaced to the caller).
//! 3) Parse the first balanced JSON object/array out of the text into the typed schema.
//! 4) If parsing fails, substitute the deterministic fallback for the same inputs.
//! 5) Post-process (placeholder images, quiz ids).

use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{info, instrument, warn};

use crate::catalog::placeholder_image_url;
use crate::config::Prompts;
use crate::domain::{LessonContent, QuizQuestion, StudentProfile, Subject, Topic};
use crate::error::ContentResult;
use crate::fallback::{fallback_lesson, fallback_quiz};
use crate::providers::TextGenerator;
use crate::util::{fill_template, first_balanced_span, trunc_for_log};

pub const DEFAULT_QUIZ_QUESTIONS: usize = 5;
pub const MAX_QUIZ_QUESTIONS: usize = 20;

const LESSON_SCHEMA: &str = r#"{
  "title": string,
  "introduction": string,
  "sections": [{
    "title": string,
    "content": string,
    "example": string (optional),
    "activity": { "type": "question" | "exercise" | "experiment", "description": string, "solution": string (optional), "hints": [string] (optional) } (optional)
  }],
  "summary": string,
  "relatedTopics": [string],
  "worksheets": [{ "title": string, "problems": [{ "question": string, "answer": string (optional), "difficulty": "beginner" | "intermediate" | "advanced" (optional) }] }] (optional),
  "images": [{ "description": string, "url": string (optional), "alt": string (optional) }] (optional),
  "interactiveExercises": [{ "title": string, "description": string, "instructions": string (optional) }] (optional),
  "videos": [{ "title": string, "description": string (optional), "url": string (optional) }] (optional)
}"#;

const QUIZ_SCHEMA: &str = r#"[{
  "id": string,
  "type": "multiple-choice" | "true-false" | "short-answer",
  "question": string,
  "options": [string] (required for multiple-choice and true-false),
  "correctAnswer": number (option index, multiple-choice) | string (otherwise),
  "explanation": string
}]"#;

/// Everything a generation call is about.
#[derive(Clone, Copy, Debug)]
pub struct ContentRequest<'a> {
  pub student: &'a StudentProfile,
  pub subject: &'a Subject,
  pub topic: &'a Topic,
}

/// Where the returned content came from.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ContentSource {
  Provider,
  Fallback,
}

#[derive(Clone, Debug, PartialEq)]
pub struct Generated<T> {
  pub content: T,
  pub source: ContentSource,
}

/// Result of decoding model text. Failure carries the reason for logging only.
#[derive(Debug, PartialEq)]
pub enum ParseOutcome<T> {
  Parsed(T),
  ParseFailed(String),
}

/// Quiz length actually requested: default when absent, clamped to 1..=20.
pub fn quiz_len(requested: Option<usize>) -> usize {
  requested.unwrap_or(DEFAULT_QUIZ_QUESTIONS).clamp(1, MAX_QUIZ_QUESTIONS)
}

fn template_pairs<'a>(req: &'a ContentRequest<'a>, interests: &'a str) -> Vec<(&'static str, &'a str)> {
  vec![
    ("name", req.student.name.as_str()),
    ("interests", interests),
    ("subject", req.subject.name.as_str()),
    ("topic", req.topic.name.as_str()),
    ("topic_description", req.topic.description.as_str()),
    ("difficulty", req.topic.difficulty.as_str()),
  ]
}

pub fn lesson_prompt(prompts: &Prompts, req: &ContentRequest<'_>) -> String {
  let interests = req.student.interests.join(", ");
  let age = req.student.age.to_string();
  let grade = req.student.grade.to_string();
  let mut pairs = template_pairs(req, &interests);
  pairs.extend([("age", age.as_str()), ("grade", grade.as_str()), ("schema", LESSON_SCHEMA)]);
  fill_template(&prompts.lesson_template, &pairs)
}

pub fn quiz_prompt(prompts: &Prompts, req: &ContentRequest<'_>, count: usize) -> String {
  let interests = req.student.interests.join(", ");
  let age = req.student.age.to_string();
  let grade = req.student.grade.to_string();
  let count = count.to_string();
  let mut pairs = template_pairs(req, &interests);
  pairs.extend([
    ("age", age.as_str()),
    ("grade", grade.as_str()),
    ("count", count.as_str()),
    ("schema", QUIZ_SCHEMA),
  ]);
  fill_template(&prompts.quiz_template, &pairs)
}

fn parse_span<T: DeserializeOwned>(text: &str, open: char, close: char) -> ParseOutcome<T> {
  let Some(span) = first_balanced_span(text, open, close) else {
    return ParseOutcome::ParseFailed(format!("no balanced {open}{close} span in model text"));
  };
  match serde_json::from_str::<T>(span) {
    Ok(v) => ParseOutcome::Parsed(v),
    Err(e) => ParseOutcome::ParseFailed(format!("schema mismatch: {e}")),
  }
}

/// Strict lesson decoding: required fields must be present and there must be a section.
pub fn parse_lesson(text: &str) -> ParseOutcome<LessonContent> {
  match parse_span::<LessonContent>(text, '{', '}') {
    ParseOutcome::Parsed(l) if l.sections.is_empty() => ParseOutcome::ParseFailed("lesson has no sections".into()),
    other => other,
  }
}

/// Strict quiz decoding: non-empty array of well-shaped questions.
pub fn parse_quiz(text: &str) -> ParseOutcome<Vec<QuizQuestion>> {
  match parse_span::<Vec<QuizQuestion>>(text, '[', ']') {
    ParseOutcome::Parsed(qs) if qs.is_empty() => ParseOutcome::ParseFailed("quiz has no questions".into()),
    ParseOutcome::Parsed(qs) => match qs.iter().try_for_each(QuizQuestion::check_shape) {
      Ok(()) => ParseOutcome::Parsed(qs),
      Err(e) => ParseOutcome::ParseFailed(e),
    },
    failed => failed,
  }
}

/// Gives every image without a usable URL the subject placeholder.
pub fn apply_placeholder_images(lesson: &mut LessonContent, subject_id: &str) {
  if let Some(images) = lesson.images.as_mut() {
    for img in images.iter_mut() {
      let missing = img.url.as_deref().map_or(true, |u| u.trim().is_empty());
      if missing {
        img.url = Some(placeholder_image_url(subject_id).to_string());
      }
    }
  }
}

fn assign_question_ids(questions: &mut [QuizQuestion]) {
  for (i, q) in questions.iter_mut().enumerate() {
    if q.id.trim().is_empty() {
      q.id = (i + 1).to_string();
    }
  }
}

/// Generate a lesson. Provider/transport errors propagate; unparseable text does not.
#[instrument(
  level = "info",
  skip(generator, prompts, req),
  fields(subject = %req.subject.id, topic = %req.topic.id, grade = req.student.grade)
)]
pub async fn generate_lesson<G>(generator: &G, prompts: &Prompts, req: ContentRequest<'_>) -> ContentResult<Generated<LessonContent>>
where
  G: TextGenerator + ?Sized,
{
  let prompt = lesson_prompt(prompts, &req);
  let text = generator.generate(&prompt).await?;

  let (mut content, source) = match parse_lesson(&text) {
    ParseOutcome::Parsed(l) => (l, ContentSource::Provider),
    ParseOutcome::ParseFailed(reason) => {
      warn!(target: "content", %reason, preview = %trunc_for_log(&text, 80), "Lesson text unparseable; using fallback lesson");
      (fallback_lesson(req.student, req.subject, req.topic), ContentSource::Fallback)
    }
  };
  apply_placeholder_images(&mut content, &req.subject.id);

  info!(target: "content", ?source, sections = content.sections.len(), title = %trunc_for_log(&content.title, 40), "Lesson ready");
  Ok(Generated { content, source })
}

/// Generate `count` quiz questions (see `quiz_len`). Same error/fallback policy as lessons.
#[instrument(level = "info", skip(generator, prompts, req), fields(subject = %req.subject.id, topic = %req.topic.id))]
pub async fn generate_quiz<G>(generator: &G, prompts: &Prompts, req: ContentRequest<'_>, count: usize) -> ContentResult<Generated<Vec<QuizQuestion>>>
where
  G: TextGenerator + ?Sized,
{
  let prompt = quiz_prompt(prompts, &req, count);
  let text = generator.generate(&prompt).await?;

  let (mut content, source) = match parse_quiz(&text) {
    ParseOutcome::Parsed(qs) => (qs, ContentSource::Provider),
    ParseOutcome::ParseFailed(reason) => {
      warn!(target: "content", %reason, preview = %trunc_for_log(&text, 80), "Quiz text unparseable; using fallback quiz");
      (fallback_quiz(req.student, req.topic, count), ContentSource::Fallback)
    }
  };
  assign_question_ids(&mut content);

  info!(target: "content", ?source, questions = content.len(), "Quiz ready");
  Ok(Generated { content, source })
}

#[cfg(test)]
mod tests {
  use super::*;
  use async_trait::async_trait;
  use serde_json::json;

  use crate::catalog::Catalog;
  use crate::domain::{AnswerValue, QuestionKind};
  use crate::error::ContentError;

  /// Replies with a canned result and remembers the last prompt.
  struct Canned {
    reply: ContentResult<String>,
    last_prompt: std::sync::Mutex<Option<String>>,
  }

  impl Canned {
    fn ok(text: impl Into<String>) -> Self {
      Self { reply: Ok(text.into()), last_prompt: Default::default() }
    }
    fn err(e: ContentError) -> Self {
      Self { reply: Err(e), last_prompt: Default::default() }
    }
  }

  #[async_trait]
  impl TextGenerator for Canned {
    async fn generate(&self, prompt: &str) -> ContentResult<String> {
      *self.last_prompt.lock().unwrap() = Some(prompt.to_string());
      self.reply.clone()
    }
    async fn validate_key(&self) -> bool { true }
  }

  fn fixtures() -> (StudentProfile, Subject, Topic) {
    let cat = Catalog::builtin();
    let student = StudentProfile { name: "Ada".into(), age: 11, grade: 6, interests: vec!["robots".into(), "chess".into()] };
    (student, cat.subject("math").unwrap().clone(), cat.topic("math", "fractions").unwrap().clone())
  }

  fn lesson_json() -> serde_json::Value {
    json!({
      "title": "Fractions with Robots",
      "introduction": "Robots share batteries.",
      "sections": [
        {"title": "Halves", "content": "Split in two.", "example": "1/2 of 8 is 4",
         "activity": {"type": "exercise", "description": "Split 6", "solution": "3", "hints": ["divide"]}},
        {"title": "Quarters", "content": "Split in four."}
      ],
      "summary": "Done.",
      "relatedTopics": ["Decimals"],
      "worksheets": [{"title": "Practice", "problems": [{"question": "1/4 of 8?", "answer": "2", "difficulty": "beginner"}]}],
      "images": [{"description": "pie", "alt": "pie chart"}, {"description": "bar", "url": "https://img/bar.png"}],
      "videos": [{"title": "Fractions 101"}]
    })
  }

  #[test]
  fn prompts_embed_learner_and_schema() {
    let (s, sub, t) = fixtures();
    let req = ContentRequest { student: &s, subject: &sub, topic: &t };
    let p = lesson_prompt(&Prompts::default(), &req);
    for needle in ["Ada", "11 year old", "grade 6", "robots, chess", "Fractions", "Mathematics", "4-6 sections", "relatedTopics"] {
      assert!(p.contains(needle), "lesson prompt missing {needle}");
    }
    let q = quiz_prompt(&Prompts::default(), &req, 7);
    assert!(q.contains("exactly 7 questions"));
    assert!(q.contains("correctAnswer"));
    assert!(!q.contains("{count}"));
  }

  #[test]
  fn quiz_len_defaults_and_clamps() {
    assert_eq!(quiz_len(None), 5);
    assert_eq!(quiz_len(Some(0)), 1);
    assert_eq!(quiz_len(Some(50)), 20);
    assert_eq!(quiz_len(Some(8)), 8);
  }

  #[test]
  fn parse_lesson_rejects_partial_objects() {
    assert!(matches!(parse_lesson(r#"{"title": "x", "introduction": "y"}"#), ParseOutcome::ParseFailed(_)));
    let no_sections = r#"{"title":"t","introduction":"i","sections":[],"summary":"s","relatedTopics":[]}"#;
    assert!(matches!(parse_lesson(no_sections), ParseOutcome::ParseFailed(_)));
    assert!(matches!(parse_lesson("just prose"), ParseOutcome::ParseFailed(_)));
  }

  #[test]
  fn parse_quiz_rejects_bad_shapes() {
    let bad_index = r#"[{"id":"1","type":"multiple-choice","question":"q","options":["a"],"correctAnswer":3,"explanation":"e"}]"#;
    assert!(matches!(parse_quiz(bad_index), ParseOutcome::ParseFailed(_)));
    assert!(matches!(parse_quiz("[]"), ParseOutcome::ParseFailed(_)));
    let ok = r#"Here you go: [{"type":"true-false","question":"q","options":["True","False"],"correctAnswer":"True","explanation":"e"}]"#;
    assert!(matches!(parse_quiz(ok), ParseOutcome::Parsed(ref v) if v.len() == 1));
  }

  #[tokio::test]
  async fn well_formed_lesson_round_trips() {
    let (s, sub, t) = fixtures();
    let text = format!("Here is your lesson:\n```json\n{}\n```", lesson_json());
    let gen = Canned::ok(text);
    let out = generate_lesson(&gen, &Prompts::default(), ContentRequest { student: &s, subject: &sub, topic: &t }).await.unwrap();

    assert_eq!(out.source, ContentSource::Provider);
    let mut expected: LessonContent = serde_json::from_value(lesson_json()).unwrap();
    apply_placeholder_images(&mut expected, "math");
    assert_eq!(out.content, expected);
    assert_eq!(out.content.title, "Fractions with Robots");
    assert_eq!(out.content.sections[0].activity.as_ref().unwrap().hints, Some(vec!["divide".to_string()]));

    let images = out.content.images.unwrap();
    assert_eq!(images[0].url.as_deref(), Some(placeholder_image_url("math")));
    assert_eq!(images[1].url.as_deref(), Some("https://img/bar.png"));
  }

  #[tokio::test]
  async fn unparseable_lesson_falls_back_deterministically() {
    let (s, sub, t) = fixtures();
    let req = ContentRequest { student: &s, subject: &sub, topic: &t };
    let gen = Canned::ok("I'm sorry, I can't produce JSON today.");
    let a = generate_lesson(&gen, &Prompts::default(), req).await.unwrap();
    let b = generate_lesson(&gen, &Prompts::default(), req).await.unwrap();
    assert_eq!(a.source, ContentSource::Fallback);
    assert_eq!(a, b);
    assert_eq!(a.content, fallback_lesson(&s, &sub, &t));
  }

  #[tokio::test]
  async fn provider_errors_are_surfaced_not_replaced() {
    let (s, sub, t) = fixtures();
    let req = ContentRequest { student: &s, subject: &sub, topic: &t };
    let gen = Canned::err(ContentError::Http { status: 500, message: "boom".into() });
    let err = generate_lesson(&gen, &Prompts::default(), req).await.unwrap_err();
    assert_eq!(err, ContentError::Http { status: 500, message: "boom".into() });
    let err = generate_quiz(&gen, &Prompts::default(), req, 5).await.unwrap_err();
    assert!(matches!(err, ContentError::Http { status: 500, .. }));
  }

  #[tokio::test]
  async fn quiz_round_trips_and_fills_missing_ids() {
    let (s, sub, t) = fixtures();
    let text = json!([
      {"type": "multiple-choice", "question": "1/2 + 1/2?", "options": ["1", "2"], "correctAnswer": 0, "explanation": "one whole"},
      {"id": "b", "type": "short-answer", "question": "Name a fraction", "correctAnswer": "1/3", "explanation": "any"}
    ])
    .to_string();
    let gen = Canned::ok(text);
    let out = generate_quiz(&gen, &Prompts::default(), ContentRequest { student: &s, subject: &sub, topic: &t }, 2).await.unwrap();
    assert_eq!(out.source, ContentSource::Provider);
    assert_eq!(out.content[0].id, "1");
    assert_eq!(out.content[0].correct_answer, AnswerValue::Index(0));
    assert_eq!(out.content[1].id, "b");
    assert_eq!(out.content[1].kind, QuestionKind::ShortAnswer);
    assert!(gen.last_prompt.lock().unwrap().as_deref().unwrap().contains("exactly 2 questions"));
  }

  #[tokio::test]
  async fn unparseable_quiz_falls_back() {
    let (s, sub, t) = fixtures();
    let gen = Canned::ok("{ not an array }");
    let out = generate_quiz(&gen, &Prompts::default(), ContentRequest { student: &s, subject: &sub, topic: &t }, 5).await.unwrap();
    assert_eq!(out.source, ContentSource::Fallback);
    assert_eq!(out.content, fallback_quiz(&s, &t, 5));
  }

  #[tokio::test]
  async fn end_to_end_through_gemini_mock() {
    use crate::config::AppConfig;
    use crate::domain::ProviderKind;
    use crate::providers::Provider;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    let server = MockServer::start().await;
    Mock::given(method("POST"))
      .and(path("/v1beta/models/gemini-1.5-flash:generateContent"))
      .respond_with(ResponseTemplate::new(200).set_body_json(json!({
        "candidates": [{"content": {"parts": [{"text": lesson_json().to_string()}]}}]
      })))
      .mount(&server)
      .await;

    let mut cfg = AppConfig::default();
    cfg.providers.gemini.base_url = server.uri();
    let provider = Provider::new(ProviderKind::Gemini, "k", &cfg, reqwest::Client::builder().no_proxy().build().unwrap()).unwrap();
    let (s, sub, t) = fixtures();
    let out = generate_lesson(&provider, &cfg.prompts, ContentRequest { student: &s, subject: &sub, topic: &t }).await.unwrap();
    assert_eq!(out.source, ContentSource::Provider);
    assert_eq!(out.content.related_topics, vec!["Decimals".to_string()]);
  }
}
