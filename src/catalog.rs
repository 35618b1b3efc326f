//! Static reference data: subjects, topics, achievements and placeholder images.
//!
//! The built-in catalog guarantees the wizard is usable without any config file.
//! Extra topics can be appended from TOML (see `config::TopicCfg`).

use std::collections::HashMap;

use tracing::warn;

use crate::config::TopicCfg;
use crate::domain::{Achievement, Difficulty, Subject, Topic};
use crate::util::slugify;

/// Subject + topic lookup tables.
#[derive(Clone, Debug)]
pub struct Catalog {
  subjects: Vec<Subject>,
  topics: HashMap<String, Vec<Topic>>,
}

impl Catalog {
  pub fn builtin() -> Self {
    let mut topics: HashMap<String, Vec<Topic>> = HashMap::new();
    for t in builtin_topics() {
      topics.entry(t.subject_id.clone()).or_default().push(t);
    }
    Self { subjects: builtin_subjects(), topics }
  }

  /// Built-in catalog plus config topics. Topics for unknown subjects or with ids that are
  /// already taken are skipped with a warning.
  pub fn with_extra_topics(extra: &[TopicCfg]) -> Self {
    let mut cat = Self::builtin();
    for cfg in extra {
      if cat.subject(&cfg.subject_id).is_none() {
        warn!(target: "learniverse", subject = %cfg.subject_id, name = %cfg.name, "Skipping config topic: unknown subject");
        continue;
      }
      let id = cfg.id.clone().unwrap_or_else(|| slugify(&cfg.name));
      if id.is_empty() || cat.topic(&cfg.subject_id, &id).is_some() {
        warn!(target: "learniverse", subject = %cfg.subject_id, %id, "Skipping config topic: empty or duplicate id");
        continue;
      }
      cat.topics.entry(cfg.subject_id.clone()).or_default().push(Topic {
        id,
        subject_id: cfg.subject_id.clone(),
        name: cfg.name.clone(),
        description: cfg.description.clone().unwrap_or_default(),
        difficulty: cfg.difficulty.unwrap_or_default(),
      });
    }
    cat
  }

  pub fn subjects(&self) -> &[Subject] {
    &self.subjects
  }

  pub fn subject(&self, id: &str) -> Option<&Subject> {
    self.subjects.iter().find(|s| s.id == id)
  }

  pub fn topics_for(&self, subject_id: &str) -> &[Topic] {
    self.topics.get(subject_id).map(Vec::as_slice).unwrap_or(&[])
  }

  pub fn topic(&self, subject_id: &str, topic_id: &str) -> Option<&Topic> {
    self.topics_for(subject_id).iter().find(|t| t.id == topic_id)
  }
}

/// A learner-authored topic. Returns `None` when the name has no usable characters.
pub fn custom_topic(subject_id: &str, name: &str, description: Option<&str>, difficulty: Option<Difficulty>) -> Option<Topic> {
  let name = name.trim();
  let id = slugify(name);
  if id.is_empty() {
    return None;
  }
  Some(Topic {
    id,
    subject_id: subject_id.to_string(),
    name: name.to_string(),
    description: description.map(str::trim).unwrap_or_default().to_string(),
    difficulty: difficulty.unwrap_or_default(),
  })
}

fn subject(id: &str, name: &str, description: &str, icon: &str, color: &str) -> Subject {
  Subject { id: id.into(), name: name.into(), description: description.into(), icon: icon.into(), color: color.into() }
}

fn builtin_subjects() -> Vec<Subject> {
  vec![
    subject("math", "Mathematics", "Numbers, patterns, and problem-solving", "Calculator", "pink"),
    subject("science", "Science", "Discover how the world works", "Microscope", "blue"),
    subject("english", "English", "Reading, writing, and communication", "BookOpen", "purple"),
    subject("history", "History", "Explore the past and its impact", "Globe", "amber"),
    subject("art", "Art", "Express yourself through creativity", "Palette", "green"),
    subject("music", "Music", "Explore rhythm, melody, and sound", "Music", "teal"),
    subject("coding", "Coding", "Learn to program and build apps", "Code", "indigo"),
  ]
}

fn topic(subject_id: &str, id: &str, name: &str, description: &str, difficulty: Difficulty) -> Topic {
  Topic { id: id.into(), subject_id: subject_id.into(), name: name.into(), description: description.into(), difficulty }
}

fn builtin_topics() -> Vec<Topic> {
  use Difficulty::*;
  vec![
    topic("math", "fractions", "Fractions", "Understanding parts of a whole", Beginner),
    topic("math", "algebra", "Basic Algebra", "Introduction to variables and equations", Intermediate),
    topic("science", "plants", "Plant Life Cycles", "How plants grow, reproduce, and survive", Beginner),
    topic("science", "solarsystem", "The Solar System", "Exploring the planets and our sun", Intermediate),
    topic("english", "grammar", "Grammar Fundamentals", "Building blocks of effective writing", Beginner),
    topic("english", "poetry", "Introduction to Poetry", "Understanding rhythm, rhyme, and meaning", Intermediate),
    topic("history", "ancient", "Ancient Civilizations", "Exploring early human societies", Beginner),
    topic("history", "revolutions", "Industrial Revolution", "How technology changed the world", Intermediate),
    topic("art", "colors", "Color Theory", "Understanding how colors work together", Beginner),
    topic("art", "drawing", "Basic Drawing Techniques", "Learn to sketch and shade", Intermediate),
    topic("music", "rhythm", "Rhythm Basics", "Understanding beats and timing", Beginner),
    topic("music", "instruments", "Musical Instruments", "Exploring different types of instruments", Intermediate),
    topic("coding", "algorithms", "Intro to Algorithms", "Step-by-step problem solving", Beginner),
    topic("coding", "webdev", "Web Development Basics", "Creating simple websites", Intermediate),
  ]
}

// --- Placeholder images ---

const PLACEHOLDER_MATH: &str = "https://placehold.co/600x400/fce7f3/db2777?text=Mathematics";
const PLACEHOLDER_SCIENCE: &str = "https://placehold.co/600x400/dbeafe/2563eb?text=Science";
const PLACEHOLDER_ENGLISH: &str = "https://placehold.co/600x400/f3e8ff/9333ea?text=English";
const PLACEHOLDER_HISTORY: &str = "https://placehold.co/600x400/fef3c7/d97706?text=History";
const PLACEHOLDER_GENERAL: &str = "https://placehold.co/600x400/e2e8f0/1e293b?text=Learniverse";

/// Image URL used for lesson images the model returned without one.
pub fn placeholder_image_url(subject_id: &str) -> &'static str {
  match subject_id {
    "math" => PLACEHOLDER_MATH,
    "science" => PLACEHOLDER_SCIENCE,
    "english" => PLACEHOLDER_ENGLISH,
    "history" => PLACEHOLDER_HISTORY,
    _ => PLACEHOLDER_GENERAL,
  }
}

// --- Achievements ---

fn achievement(id: &str, title: &str, description: String, icon: &str) -> Achievement {
  Achievement { id: id.into(), title: title.into(), description, icon: icon.into() }
}

pub fn profile_created() -> Achievement {
  achievement("profile-created", "Profile Created", "You created your student profile!".into(), "🎓")
}

pub fn subject_selected(subject_name: &str) -> Achievement {
  achievement("subject-selected", "Subject Explorer", format!("You selected your first subject: {subject_name}!"), "📚")
}

pub fn topic_selected(topic_name: &str) -> Achievement {
  achievement("topic-selected", "Topic Navigator", format!("You selected your first topic: {topic_name}!"), "📝")
}

pub fn api_connected(provider: &str) -> Achievement {
  achievement("api-connected", "AI Connected", format!("You connected to {provider}!"), "🤖")
}

pub fn first_lesson(topic_name: &str) -> Achievement {
  achievement("first-lesson", "First Lesson Completed", format!("You completed your first lesson on {topic_name}!"), "📘")
}

pub fn quiz_master() -> Achievement {
  achievement("quiz-master", "Quiz Master", "You scored 80% or higher on a quiz!".into(), "🏆")
}

pub fn quiz_completed() -> Achievement {
  achievement("quiz-completed", "Quiz Completed", "You completed your first quiz!".into(), "✅")
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn every_subject_has_two_builtin_topics() {
    let cat = Catalog::builtin();
    assert_eq!(cat.subjects().len(), 7);
    for s in cat.subjects() {
      assert_eq!(cat.topics_for(&s.id).len(), 2, "subject {}", s.id);
    }
    assert_eq!(cat.topic("math", "fractions").map(|t| t.name.as_str()), Some("Fractions"));
    assert!(cat.topic("math", "plants").is_none());
  }

  #[test]
  fn extra_topics_are_appended_and_filtered() {
    let extra = vec![
      TopicCfg { id: None, subject_id: "science".into(), name: "Volcanoes & Lava".into(), description: None, difficulty: Some(Difficulty::Advanced) },
      TopicCfg { id: Some("fractions".into()), subject_id: "math".into(), name: "Dup".into(), description: None, difficulty: None },
      TopicCfg { id: None, subject_id: "cooking".into(), name: "Bread".into(), description: None, difficulty: None },
    ];
    let cat = Catalog::with_extra_topics(&extra);
    let t = cat.topic("science", "volcanoes-lava").expect("added");
    assert_eq!(t.difficulty, Difficulty::Advanced);
    assert_eq!(cat.topics_for("math").len(), 2);
    assert!(cat.topics_for("cooking").is_empty());
  }

  #[test]
  fn custom_topic_derives_slug() {
    let t = custom_topic("science", "  Black Holes! ", None, None).expect("topic");
    assert_eq!(t.id, "black-holes");
    assert_eq!(t.name, "Black Holes!");
    assert_eq!(t.difficulty, Difficulty::Beginner);
    assert!(custom_topic("science", "?!", None, None).is_none());
  }

  #[test]
  fn placeholder_table_has_five_urls() {
    let urls: std::collections::HashSet<_> = ["math", "science", "english", "history", "art", "music", "coding", "x"]
      .iter()
      .map(|s| placeholder_image_url(s))
      .collect();
    assert_eq!(urls.len(), 5);
  }
}
