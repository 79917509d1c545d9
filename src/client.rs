use crate::config::DEFAULT_MODEL;
use crate::models::{ChatMessage, QuizData};
use crate::prompt::{build_chat_request, build_quiz_request, GatewayRequest};
use crate::setup::QuizConfig;
use crate::validation::{validate_quiz, ValidationError};
use serde::Deserialize;
use thiserror::Error;

pub const CHAT_FALLBACK: &str = "I'm having trouble connecting right now. Please try again.";

#[derive(Error, Debug)]
pub enum ClientError {
    #[error("{0}")]
    Gateway(String),
    #[error("No response generated from Gemini.")]
    EmptyResponse,
    #[error(transparent)]
    Transport(#[from] reqwest::Error),
    #[error(transparent)]
    Invalid(#[from] ValidationError),
}

#[derive(Deserialize, Debug, Default)]
struct GatewayReply {
    #[serde(default)]
    text: Option<String>,
    #[serde(default)]
    error: Option<String>,
}

/// Posts payloads to the gateway endpoint.
#[derive(Debug, Clone)]
pub struct GatewayClient {
    http: reqwest::Client,
    endpoint: String,
}

impl GatewayClient {
    pub fn new(http: reqwest::Client, endpoint: impl Into<String>) -> Self {
        Self {
            http,
            endpoint: endpoint.into(),
        }
    }

    /// Returns the relayed `text`, or the gateway's `error` message.
    pub async fn call(&self, payload: &GatewayRequest) -> Result<String, ClientError> {
        let res = self.http.post(&self.endpoint).json(payload).send().await?;
        let status = res.status();
        if !status.is_success() {
            let reply: GatewayReply = res.json().await.unwrap_or_default();
            let msg = reply
                .error
                .unwrap_or_else(|| format!("Server error: {}", status.as_u16()));
            return Err(ClientError::Gateway(msg));
        }
        let reply: GatewayReply = res.json().await?;
        match reply.text {
            Some(t) if !t.is_empty() => Ok(t),
            _ => Err(ClientError::EmptyResponse),
        }
    }
}

/// Quiz generation and tutor chat on top of [`GatewayClient`].
#[derive(Debug, Clone)]
pub struct QuizGenerator {
    gateway: GatewayClient,
    model: String,
}

impl QuizGenerator {
    pub fn new(gateway: GatewayClient) -> Self {
        Self {
            gateway,
            model: DEFAULT_MODEL.into(),
        }
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    pub async fn generate(&self, config: &QuizConfig) -> Result<QuizData, ClientError> {
        let files = config.files.iter().map(|f| f.to_inline()).collect();
        let payload = build_quiz_request(
            &config.topic,
            config.difficulty,
            config.question_count,
            files,
            config.video(),
        )
        .into_gateway_request(&self.model);

        let text = self.gateway.call(&payload).await.map_err(|e| {
            tracing::error!(error=%e, topic = %config.topic, "quiz generation failed");
            e
        })?;
        let quiz = validate_quiz(&text, Some(config.question_count as usize)).map_err(|e| {
            tracing::error!(error=%e, "generated quiz rejected");
            e
        })?;
        tracing::info!(title = %quiz.title, questions = quiz.questions.len(), "quiz generated");
        Ok(quiz)
    }

    /// Never fails: connection trouble becomes a canned tutor reply.
    pub async fn chat(&self, history: &[ChatMessage], message: &str) -> String {
        let payload = build_chat_request(&self.model, history, message);
        match self.gateway.call(&payload).await {
            Ok(text) => text,
            Err(e) => {
                tracing::warn!(error=%e, "tutor chat failed");
                CHAT_FALLBACK.into()
            }
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::gateway::{self, tests::{state, StubModel}};
    use crate::models::Difficulty;
    use crate::validation::tests::quiz_json;
    use tokio::net::TcpListener;

    /// Serves a stub-backed gateway on a loopback port.
    pub(crate) async fn spawn_gateway(key: Option<&str>, model: StubModel) -> QuizGenerator {
        let app = gateway::router("/api/gemini", state(key, model));
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move { axum::serve(listener, app).await.unwrap() });
        QuizGenerator::new(GatewayClient::new(
            reqwest::Client::new(),
            format!("http://{addr}/api/gemini"),
        ))
    }

    fn photosynthesis() -> QuizConfig {
        QuizConfig {
            difficulty: Difficulty::Intermediate,
            question_count: 5,
            ..QuizConfig::new("Photosynthesis")
        }
    }

    #[tokio::test]
    async fn generates_a_validated_quiz() {
        let gen = spawn_gateway(Some("k"), StubModel::ok(quiz_json(5).to_string())).await;
        let quiz = gen.generate(&photosynthesis()).await.unwrap();
        assert_eq!(quiz.questions.len(), 5);
        for q in &quiz.questions {
            assert_eq!(q.options.iter().filter(|o| **o == q.correct_answer).count(), 1);
        }
    }

    #[tokio::test]
    async fn gateway_error_message_is_propagated() {
        let gen = spawn_gateway(None, StubModel::ok("unused")).await;
        match gen.generate(&photosynthesis()).await {
            Err(ClientError::Gateway(msg)) => assert_eq!(msg, "Server configuration error"),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[tokio::test]
    async fn empty_or_invalid_output_is_an_error() {
        let gen = spawn_gateway(Some("k"), StubModel::ok("")).await;
        assert!(matches!(gen.generate(&photosynthesis()).await, Err(ClientError::EmptyResponse)));

        let gen = spawn_gateway(Some("k"), StubModel::ok(quiz_json(3).to_string())).await;
        assert!(matches!(gen.generate(&photosynthesis()).await, Err(ClientError::Invalid(_))));
    }

    #[tokio::test]
    async fn chat_falls_back_on_failure() {
        let gen = spawn_gateway(Some("k"), StubModel::ok("Osmosis is diffusion of water.")).await;
        assert_eq!(gen.chat(&[], "What is osmosis?").await, "Osmosis is diffusion of water.");

        let gen = spawn_gateway(Some("k"), StubModel::failing("boom")).await;
        assert_eq!(gen.chat(&[], "hello").await, CHAT_FALLBACK);
    }
}
