//! Deterministic lesson/quiz content built purely from the request tuple.
//!
//! Used when the provider answered but its text could not be parsed into the schema.
//! Same inputs always give the same content; no network, no randomness.

use crate::domain::{
  ActivityKind, AnswerValue, LessonActivity, LessonContent, LessonImage, LessonSection, QuestionKind,
  QuizQuestion, StudentProfile, Subject, Topic, Worksheet, WorksheetProblem,
};
use crate::catalog::placeholder_image_url;

pub const FALLBACK_QUIZ_LEN: usize = 5;

pub fn fallback_lesson(student: &StudentProfile, subject: &Subject, topic: &Topic) -> LessonContent {
  let t = &topic.name;
  let interest = student.primary_interest();
  let all_interests = student.interests.join(", ");
  let application = if student.interests.iter().any(|i| i.eq_ignore_ascii_case("science")) {
    "developing new technologies"
  } else {
    "designing video games"
  };

  LessonContent {
    title: format!("Understanding {t}"),
    introduction: format!(
      "Welcome {}! Today we're going to learn about {t} in {}. Since you enjoy {interest}, we'll include some connections to that as we explore this fascinating topic.",
      student.name, subject.name
    ),
    sections: vec![
      LessonSection {
        title: "The Basics".into(),
        content: format!(
          "Let's start with the fundamental concepts of {t}. This is perfect for your grade {} level and will build on what you already know.",
          student.grade
        ),
        example: Some(format!(
          "For example, think about when you're enjoying {interest} - you actually use ideas from {t} without even realizing it!"
        )),
        activity: Some(LessonActivity {
          kind: ActivityKind::Question,
          description: format!("Can you identify how {t} might appear in your everyday life?"),
          solution: None,
          hints: Some(vec![format!("Think about a normal day and where {interest} fits in.")]),
        }),
      },
      LessonSection {
        title: "Key Principles".into(),
        content: format!("Now that we understand the basics, let's explore some key principles of {t} that are appropriate for your age group."),
        example: Some(format!("Imagine you're explaining {t} to a friend who has never heard of it before. What would you say?")),
        activity: Some(LessonActivity {
          kind: ActivityKind::Exercise,
          description: format!("Try drawing a diagram that shows how {t} works."),
          solution: None,
          hints: None,
        }),
      },
      LessonSection {
        title: "Real-World Applications".into(),
        content: format!("{t} isn't just a theoretical concept - it has many practical applications in the world around us!"),
        example: Some(format!("Scientists and engineers use {t} to solve problems like {application}.")),
        activity: Some(LessonActivity {
          kind: ActivityKind::Experiment,
          description: format!("Let's do a simple experiment to demonstrate {t} in action!"),
          solution: Some(format!("The result should show that {t} works exactly as we've discussed.")),
          hints: None,
        }),
      },
      LessonSection {
        title: "Putting It Together".into(),
        content: format!("Let's connect everything we've learned about {t} and see how the pieces fit."),
        example: None,
        activity: Some(LessonActivity {
          kind: ActivityKind::Question,
          description: format!("Write two sentences that explain {t} in your own words."),
          solution: None,
          hints: None,
        }),
      },
    ],
    summary: format!(
      "Great job exploring {t} today! We've covered the basics, key principles, and real-world applications. Remember that {t} connects to many of your interests like {all_interests}."
    ),
    related_topics: vec!["Advanced concepts".into(), "Historical development".into(), "Future trends".into()],
    worksheets: Some(vec![Worksheet {
      title: format!("{t} Practice"),
      problems: vec![
        WorksheetProblem { question: format!("Describe {t} in one sentence."), answer: None, difficulty: Some(topic.difficulty) },
        WorksheetProblem { question: format!("Give one example of {t} connected to {interest}."), answer: None, difficulty: Some(topic.difficulty) },
      ],
    }]),
    images: Some(vec![LessonImage {
      description: format!("An illustration of {t}"),
      url: Some(placeholder_image_url(&subject.id).to_string()),
      alt: Some(t.clone()),
    }]),
    interactive_exercises: None,
    videos: None,
  }
}

pub fn fallback_quiz(student: &StudentProfile, topic: &Topic, count: usize) -> Vec<QuizQuestion> {
  let t = &topic.name;
  let interest = student.primary_interest();
  let grade = student.grade;
  let mc = |id: &str, question: String, options: Vec<String>, answer: u64, explanation: String| QuizQuestion {
    id: id.into(),
    kind: QuestionKind::MultipleChoice,
    question,
    options: Some(options),
    correct_answer: AnswerValue::Index(answer),
    explanation,
  };

  let questions = vec![
    mc(
      "1",
      format!("What is one of the key principles of {t}?"),
      vec![
        "It only exists in theory".into(),
        "It has many practical applications".into(),
        "It was discovered recently".into(),
        "It is only used by adults".into(),
      ],
      1,
      format!("{t} has many practical applications in the real world, as we learned in the lesson."),
    ),
    QuizQuestion {
      id: "2".into(),
      kind: QuestionKind::TrueFalse,
      question: format!("True or False: {t} is connected to {interest}."),
      options: Some(vec!["True".into(), "False".into()]),
      correct_answer: AnswerValue::Text("True".into()),
      explanation: format!("Yes, {t} connects to {interest} as we saw in our examples."),
    },
    QuizQuestion {
      id: "3".into(),
      kind: QuestionKind::ShortAnswer,
      question: format!("Name one way you might use {t} in your everyday life."),
      options: None,
      correct_answer: AnswerValue::Text("Various answers possible".into()),
      explanation: format!(
        "There are many correct answers here! You might use {t} when you're enjoying {}.",
        student.interests.join(" or ")
      ),
    },
    mc(
      "4",
      format!("Which of these is NOT a section we covered in our lesson about {t}?"),
      vec!["The Basics".into(), "Key Principles".into(), "Advanced Mathematics".into(), "Real-World Applications".into()],
      2,
      "We covered The Basics, Key Principles, and Real-World Applications, but not Advanced Mathematics.".into(),
    ),
    mc(
      "5",
      "What grade level is this lesson designed for?".into(),
      vec![
        format!("Grade {}", grade.saturating_sub(1)),
        format!("Grade {grade}"),
        format!("Grade {}", grade + 1),
        format!("Grade {}", grade + 2),
      ],
      1,
      format!("This lesson was specially designed for your grade level, Grade {grade}."),
    ),
  ];

  questions.into_iter().take(count.clamp(1, FALLBACK_QUIZ_LEN)).collect()
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::catalog::Catalog;

  fn student() -> StudentProfile {
    StudentProfile { name: "Ada".into(), age: 10, grade: 5, interests: vec!["robots".into(), "space".into()] }
  }

  #[test]
  fn fallback_lesson_is_deterministic_and_personal() {
    let cat = Catalog::builtin();
    let subject = cat.subject("science").unwrap();
    let topic = cat.topic("science", "plants").unwrap();
    let a = fallback_lesson(&student(), subject, topic);
    let b = fallback_lesson(&student(), subject, topic);
    assert_eq!(a, b);
    assert_eq!(a.title, "Understanding Plant Life Cycles");
    assert!(a.introduction.contains("Ada") && a.introduction.contains("robots"));
    assert!(a.sections.len() >= 4);
    assert!(a.images.as_ref().unwrap().iter().all(|i| i.url.is_some()));
  }

  #[test]
  fn fallback_quiz_is_well_shaped_and_truncated() {
    let cat = Catalog::builtin();
    let topic = cat.topic("math", "fractions").unwrap();
    let full = fallback_quiz(&student(), topic, 5);
    assert_eq!(full.len(), 5);
    assert!(full.iter().all(|q| q.check_shape().is_ok()));
    assert_eq!(fallback_quiz(&student(), topic, 3).len(), 3);
    assert_eq!(fallback_quiz(&student(), topic, 10).len(), 5);
    assert_eq!(fallback_quiz(&student(), topic, 0).len(), 1);
  }

  #[test]
  fn grade_one_does_not_underflow() {
    let cat = Catalog::builtin();
    let topic = cat.topic("math", "fractions").unwrap();
    let s = StudentProfile { grade: 1, ..student() };
    let q = &fallback_quiz(&s, topic, 5)[4];
    assert_eq!(q.options.as_ref().unwrap()[0], "Grade 0");
  }
}
