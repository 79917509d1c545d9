use crate::models::{ChatMessage, Difficulty};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use serde_with::skip_serializing_none;

pub const SYSTEM_INSTRUCTION: &str = "\
You are an expert Quiz Preparation Assistant designed to help students master any subject.
Your goal is to generate high-quality quizzes based on user requests and provided reference materials (documents, slides, videos).

**Question Quality Criteria:**
- Generate questions with 4 options.
- Ensure only ONE correct answer per question.
- Make distractors (wrong options) plausible but clearly incorrect.
- Avoid \"All of the above\" or \"None of the above\" unless pedagogically valuable.
- Match difficulty to specified level.
- Questions must be unambiguous and grammatically correct.
- Educational Value: Test understanding, not just memorization.
- **Reference Material:** If files or video links are provided, prioritize generating questions derived directly from that content.

**Output:**
You must output a strictly structured JSON object adhering to the schema provided.
";

pub const CHAT_SYSTEM_INSTRUCTION: &str = "\
You are a friendly and encouraging AI Tutor called \"MindForge AI\".
You help students study, explain complex topics, and can generate mini-questions on the fly.
Keep responses concise, helpful, and motivating. Use emojis occasionally.
If a user asks for a quiz, suggest they use the \"Create Quiz\" feature for a full experience, but you can provide 1-2 example questions in chat.
";

pub const QUESTION_FIELDS: [&str; 7] = [
    "id",
    "text",
    "options",
    "correctAnswer",
    "explanation",
    "difficulty",
    "topicTag",
];

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct InlineData {
    pub data: String, // base64
    pub mime_type: String,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(untagged)]
pub enum Part {
    Text {
        text: String,
    },
    Inline {
        #[serde(rename = "inlineData")]
        inline_data: InlineData,
    },
}

impl Part {
    pub fn text(t: impl Into<String>) -> Self {
        Part::Text { text: t.into() }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Default)]
pub struct Contents {
    pub parts: Vec<Part>,
}

#[skip_serializing_none]
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Default)]
#[serde(rename_all = "camelCase")]
pub struct GenerationSettings {
    pub system_instruction: Option<String>,
    pub response_mime_type: Option<String>,
    pub response_schema: Option<Value>,
}

/// Body accepted by the gateway: `{model, contents, config}`.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct GatewayRequest {
    pub model: String,
    pub contents: Contents,
    pub config: GenerationSettings,
}

#[derive(Debug, Clone, PartialEq)]
pub struct QuizRequest {
    pub prompt: String,
    pub schema: Value,
    pub files: Vec<InlineData>,
}

impl QuizRequest {
    pub fn into_gateway_request(self, model: &str) -> GatewayRequest {
        let mut parts = vec![Part::text(self.prompt)];
        parts.extend(
            self.files
                .into_iter()
                .map(|inline_data| Part::Inline { inline_data }),
        );
        GatewayRequest {
            model: model.to_string(),
            contents: Contents { parts },
            config: GenerationSettings {
                system_instruction: Some(SYSTEM_INSTRUCTION.into()),
                response_mime_type: Some("application/json".into()),
                response_schema: Some(self.schema),
            },
        }
    }
}

/// Response shape the generator is told to produce.
pub fn quiz_schema() -> Value {
    json!({
        "type": "OBJECT",
        "properties": {
            "title": {
                "type": "STRING",
                "description": "A creative and relevant title for the quiz"
            },
            "estimatedTimeMinutes": {
                "type": "NUMBER",
                "description": "Estimated time to complete in minutes"
            },
            "questions": {
                "type": "ARRAY",
                "items": {
                    "type": "OBJECT",
                    "properties": {
                        "id": { "type": "INTEGER" },
                        "text": { "type": "STRING" },
                        "options": { "type": "ARRAY", "items": { "type": "STRING" } },
                        "correctAnswer": {
                            "type": "STRING",
                            "description": "Must match exactly one of the strings in the options array"
                        },
                        "explanation": {
                            "type": "STRING",
                            "description": "Explanation of correct answer and why distractors are wrong"
                        },
                        "difficulty": { "type": "STRING" },
                        "topicTag": { "type": "STRING" }
                    },
                    "required": QUESTION_FIELDS
                }
            }
        },
        "required": ["title", "questions", "estimatedTimeMinutes"]
    })
}

pub fn build_quiz_request(
    topic: &str,
    difficulty: Difficulty,
    count: u32,
    files: Vec<InlineData>,
    video_link: Option<&str>,
) -> QuizRequest {
    let mut prompt = format!(
        "Create a {difficulty} level quiz about \"{topic}\".\nGenerate exactly {count} multiple-choice questions.\n"
    );

    if let Some(link) = video_link.map(str::trim).filter(|l| !l.is_empty()) {
        prompt.push_str(&format!(
            "\nReference Material (Video): Please use the content associated with this video link as a key source for the questions: {link}\n"
        ));
    }

    if !files.is_empty() {
        prompt.push_str(
            "\nReference Material (Documents): Please analyse the attached documents (PDF, Slides, Text) and generate questions specifically testing the knowledge contained within them.\n",
        );
    }

    prompt.push_str(
        "\nFor each question provide:
1. The question text.
2. 4 distinct options.
3. The exact text of the correct option.
4. A detailed explanation (2-4 sentences) explaining why the answer is correct and briefly why others are wrong.
5. A specific subtopic tag.
",
    );

    QuizRequest {
        prompt,
        schema: quiz_schema(),
        files,
    }
}

/// Free-form tutor turn: system line, transcript, then the new message.
pub fn build_chat_request(model: &str, history: &[ChatMessage], message: &str) -> GatewayRequest {
    let mut parts = Vec::with_capacity(history.len() + 2);
    parts.push(Part::text(format!("System: {CHAT_SYSTEM_INSTRUCTION}")));
    parts.extend(
        history
            .iter()
            .map(|m| Part::text(format!("{}: {}", m.sender_name, m.text))),
    );
    parts.push(Part::text(format!("User: {message}")));

    GatewayRequest {
        model: model.to_string(),
        contents: Contents { parts },
        config: GenerationSettings::default(),
    }
}
