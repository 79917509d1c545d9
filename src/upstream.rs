use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use serde::Deserialize;
use serde_json::{json, Map, Value};
use std::future::Future;
use thiserror::Error;

// model ids look like `gemini-2.5-flash`
const MODEL_SEGMENT: &AsciiSet = &NON_ALPHANUMERIC.remove(b'-').remove(b'.').remove(b'_');

#[derive(Error, Debug)]
pub enum UpstreamError {
    #[error("{0}")]
    Provider(String),
    #[error("{0}")]
    Transport(#[from] reqwest::Error),
    #[error("unreadable upstream response: {0}")]
    Decode(#[from] serde_json::Error),
}

/// A relayed call: whatever the client sent, already split into its parts.
#[derive(Debug, Clone, PartialEq)]
pub struct GenerateCall {
    pub model: String,
    pub contents: Value,
    pub config: Value,
}

/// The hosted generative model behind the gateway.
pub trait GenerativeModel: Send + Sync + 'static {
    fn generate(
        &self,
        api_key: &str,
        call: GenerateCall,
    ) -> impl Future<Output = Result<String, UpstreamError>> + Send;
}

/// REST client for the Gemini `generateContent` endpoint.
#[derive(Debug, Clone)]
pub struct GeminiClient {
    http: reqwest::Client,
    base_url: String,
}

impl GeminiClient {
    pub fn new(http: reqwest::Client, base_url: impl Into<String>) -> Self {
        Self {
            http,
            base_url: base_url.into(),
        }
    }

    fn endpoint(&self, model: &str) -> String {
        format!(
            "{}/v1beta/models/{}:generateContent",
            self.base_url,
            utf8_percent_encode(model, MODEL_SEGMENT)
        )
    }
}

impl GenerativeModel for GeminiClient {
    async fn generate(&self, api_key: &str, call: GenerateCall) -> Result<String, UpstreamError> {
        let url = self.endpoint(&call.model);
        let body = provider_body(call.contents, call.config);

        let res = self
            .http
            .post(url)
            .header("x-goog-api-key", api_key)
            .json(&body)
            .send()
            .await?;

        let status = res.status();
        let text = res.text().await?;
        if !status.is_success() {
            tracing::warn!(%status, "upstream rejected generation");
            return Err(UpstreamError::Provider(failure_message(status, &text)));
        }
        let payload: Value = serde_json::from_str(&text)?;
        Ok(response_text(&payload))
    }
}

/// The provider's `error.message` when the body carries one, else the status
/// and whatever the body said.
fn failure_message(status: reqwest::StatusCode, body: &str) -> String {
    let provider = serde_json::from_str::<Value>(body)
        .ok()
        .and_then(|v| v["error"]["message"].as_str().map(str::to_owned));
    if let Some(msg) = provider {
        return msg;
    }
    let body = body.trim();
    if body.is_empty() {
        format!("upstream returned {status}")
    } else {
        format!("upstream returned {status}: {body}")
    }
}

/// Normalises the SDK-style `{contents, config}` pair into the REST body.
pub fn provider_body(contents: Value, config: Value) -> Value {
    let contents = match contents {
        Value::Array(items) => Value::Array(items),
        Value::String(text) => json!([{ "role": "user", "parts": [{ "text": text }] }]),
        Value::Null => json!([]),
        Value::Object(mut obj) => {
            obj.entry("role").or_insert_with(|| json!("user"));
            json!([Value::Object(obj)])
        }
        other => json!([{ "role": "user", "parts": [{ "text": other.to_string() }] }]),
    };

    let mut body = Map::new();
    body.insert("contents".into(), contents);

    let mut generation = Map::new();
    if let Value::Object(cfg) = config {
        for (k, v) in cfg {
            match k.as_str() {
                "systemInstruction" => {
                    let si = match v {
                        Value::String(text) => json!({ "parts": [{ "text": text }] }),
                        other => other,
                    };
                    body.insert("systemInstruction".into(), si);
                }
                "tools" | "toolConfig" | "safetySettings" => {
                    body.insert(k, v);
                }
                _ => {
                    generation.insert(k, v);
                }
            }
        }
    }
    if !generation.is_empty() {
        body.insert("generationConfig".into(), Value::Object(generation));
    }
    Value::Object(body)
}

#[derive(Deserialize)]
struct TextPart {
    #[serde(default)]
    text: Option<String>,
}

/// Text of the first candidate; empty when the model produced none.
pub fn response_text(payload: &Value) -> String {
    payload["candidates"][0]["content"]["parts"]
        .as_array()
        .map(|parts| {
            parts
                .iter()
                .filter_map(|p| serde_json::from_value::<TextPart>(p.clone()).ok())
                .filter_map(|p| p.text)
                .collect::<String>()
        })
        .unwrap_or_default()
}
