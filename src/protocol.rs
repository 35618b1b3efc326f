//! Public protocol structs for WebSocket and HTTP endpoints (serde ready).
//! Keep this small and stable to evolve backend and frontend independently.

use serde::{Deserialize, Serialize};

use crate::content::{ContentSource, Generated};
use crate::domain::{Achievement, AnswerValue, Difficulty, ProviderKind, QuizQuestion, StudentProfile};
use crate::error::ContentResult;
use crate::scoring::QuizResult;
use crate::wizard::WizardSnapshot;

/// Commands a client sends for its session (WebSocket frames or HTTP session messages).
#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    Ping,
    GetState,
    SetProfile {
        student: StudentProfile,
    },
    SelectSubject {
        #[serde(rename = "subjectId")]
        subject_id: String,
    },
    SelectTopic {
        #[serde(rename = "topicId")]
        topic_id: String,
    },
    CustomTopic {
        name: String,
        #[serde(default)]
        description: Option<String>,
        #[serde(default)]
        difficulty: Option<Difficulty>,
    },
    SubmitApiKey {
        provider: ProviderKind,
        #[serde(rename = "apiKey")]
        api_key: String,
    },
    RemoveApiKey {
        provider: ProviderKind,
    },
    SetActiveProvider {
        provider: ProviderKind,
    },
    GenerateLesson,
    StartQuiz,
    GenerateQuiz {
        #[serde(default, rename = "numberOfQuestions")]
        number_of_questions: Option<usize>,
    },
    SubmitQuiz {
        answers: Vec<Option<AnswerValue>>,
    },
    Back,
    Reset,
}

impl ClientMessage {
    /// Wire tag, for logging without payloads (keys never reach the logs).
    pub fn kind(&self) -> &'static str {
        match self {
            ClientMessage::Ping => "ping",
            ClientMessage::GetState => "get_state",
            ClientMessage::SetProfile { .. } => "set_profile",
            ClientMessage::SelectSubject { .. } => "select_subject",
            ClientMessage::SelectTopic { .. } => "select_topic",
            ClientMessage::CustomTopic { .. } => "custom_topic",
            ClientMessage::SubmitApiKey { .. } => "submit_api_key",
            ClientMessage::RemoveApiKey { .. } => "remove_api_key",
            ClientMessage::SetActiveProvider { .. } => "set_active_provider",
            ClientMessage::GenerateLesson => "generate_lesson",
            ClientMessage::StartQuiz => "start_quiz",
            ClientMessage::GenerateQuiz { .. } => "generate_quiz",
            ClientMessage::SubmitQuiz { .. } => "submit_quiz",
            ClientMessage::Back => "back",
            ClientMessage::Reset => "reset",
        }
    }
}

/// Messages the server sends back. One command can yield several (e.g. content + achievement + state).
#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    Pong,
    State {
        state: WizardSnapshot,
    },
    Lesson(ContentOut<crate::domain::LessonContent>),
    Quiz(ContentOut<Vec<QuizQuestion>>),
    QuizResult {
        result: QuizResult,
    },
    AchievementUnlocked {
        achievement: Achievement,
    },
    KeyRejected {
        provider: ProviderKind,
        message: String,
    },
    Error {
        message: String,
    },
}

/// `{content}` on success, `{content, error}` when the request failed.
/// A fallback substitution is a success (`source = "fallback"`), never an error.
#[derive(Debug, Serialize)]
pub struct ContentOut<T> {
    pub content: T,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source: Option<ContentSource>,
}

impl<T: Default> From<ContentResult<Generated<T>>> for ContentOut<T> {
    fn from(res: ContentResult<Generated<T>>) -> Self {
        match res {
            Ok(g) => ContentOut { content: g.content, error: None, source: Some(g.source) },
            Err(e) => ContentOut { content: T::default(), error: Some(e.to_string()), source: None },
        }
    }
}

//
// HTTP request/response DTOs
//

#[derive(Serialize)]
pub struct HealthOut {
    pub ok: bool,
}

#[derive(Debug, Deserialize)]
pub struct ValidateKeyIn {
    pub provider: ProviderKind,
    #[serde(rename = "apiKey", default)]
    pub api_key: String,
}
#[derive(Serialize)]
pub struct ValidateKeyOut {
    pub valid: bool,
}

#[derive(Debug, Deserialize)]
pub struct CustomTopicIn {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub difficulty: Option<Difficulty>,
}

/// Stateless generation request: everything the wizard would otherwise supply.
#[derive(Debug, Deserialize)]
pub struct ContentIn {
    pub provider: ProviderKind,
    #[serde(rename = "apiKey", default)]
    pub api_key: String,
    pub student: StudentProfile,
    #[serde(rename = "subjectId")]
    pub subject_id: String,
    #[serde(rename = "topicId", default)]
    pub topic_id: Option<String>,
    #[serde(rename = "customTopic", default)]
    pub custom_topic: Option<CustomTopicIn>,
    #[serde(rename = "numberOfQuestions", default)]
    pub number_of_questions: Option<usize>,
}

#[derive(Debug, Deserialize)]
pub struct ScoreIn {
    pub questions: Vec<QuizQuestion>,
    pub answers: Vec<Option<AnswerValue>>,
}

#[derive(Serialize)]
pub struct SessionOut {
    #[serde(rename = "sessionId")]
    pub session_id: String,
    pub state: WizardSnapshot,
}

#[derive(Serialize)]
pub struct ErrorOut {
    pub error: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::LessonContent;
    use crate::error::ContentError;

    #[test]
    fn client_messages_parse_from_tagged_json() {
        let m: ClientMessage = serde_json::from_str(r#"{"type":"submit_api_key","provider":"openai","apiKey":"k"}"#).unwrap();
        assert!(matches!(m, ClientMessage::SubmitApiKey { provider: ProviderKind::OpenAi, ref api_key } if api_key == "k"));

        let m: ClientMessage = serde_json::from_str(r#"{"type":"submit_quiz","answers":[1,"True",null]}"#).unwrap();
        match m {
            ClientMessage::SubmitQuiz { answers } => assert_eq!(
                answers,
                vec![Some(AnswerValue::Index(1)), Some(AnswerValue::Text("True".into())), None]
            ),
            other => panic!("unexpected {other:?}"),
        }

        let m: ClientMessage = serde_json::from_str(r#"{"type":"generate_quiz"}"#).unwrap();
        assert!(matches!(m, ClientMessage::GenerateQuiz { number_of_questions: None }));
    }

    #[test]
    fn content_out_error_shape() {
        let out: ContentOut<LessonContent> = Err(ContentError::MissingApiKey).into();
        let v = serde_json::to_value(ServerMessage::Lesson(out)).unwrap();
        assert_eq!(v["type"], "lesson");
        assert_eq!(v["error"], "API key is required");
        assert!(v.get("source").is_none());
        assert_eq!(v["content"]["sections"], serde_json::json!([]));
    }

    #[test]
    fn content_out_success_has_no_error_field() {
        let out: ContentOut<Vec<QuizQuestion>> = Ok(Generated { content: vec![], source: ContentSource::Fallback }).into();
        let v = serde_json::to_value(&out).unwrap();
        assert!(v.get("error").is_none());
        assert_eq!(v["source"], "fallback");
    }
}
