use axum::{
    body::Bytes,
    extract::State,
    response::{IntoResponse, Response},
    routing::post,
    Json, Router,
};
use http::{
    header::{ACCESS_CONTROL_ALLOW_HEADERS, ACCESS_CONTROL_ALLOW_ORIGIN},
    StatusCode,
};
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;
use thiserror::Error;

use crate::upstream::{GenerateCall, GenerativeModel, UpstreamError};

pub struct GatewayState<M> {
    pub api_key: Option<String>,
    pub default_model: String,
    pub model: M,
}

#[derive(Error, Debug)]
pub enum GatewayError {
    #[error("Server configuration error")]
    Configuration,
    #[error("{0}")]
    Body(#[from] serde_json::Error),
    #[error("{0}")]
    Upstream(#[from] UpstreamError),
    #[error("Method Not Allowed")]
    MethodNotAllowed,
}

impl IntoResponse for GatewayError {
    fn into_response(self) -> Response {
        match self {
            GatewayError::MethodNotAllowed => {
                (StatusCode::METHOD_NOT_ALLOWED, self.to_string()).into_response()
            }
            e => (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({ "error": e.to_string() })),
            )
                .into_response(),
        }
    }
}

#[derive(Deserialize, Debug)]
struct RelayReq {
    #[serde(default)]
    model: Option<String>,
    #[serde(default)]
    contents: Value,
    #[serde(default)]
    config: Value,
}

pub fn router<M: GenerativeModel>(path: &str, state: GatewayState<M>) -> Router {
    Router::new()
        .route(
            path,
            post(relay::<M>)
                .options(preflight)
                .fallback(method_not_allowed),
        )
        .with_state(Arc::new(state))
}

async fn relay<M: GenerativeModel>(
    State(state): State<Arc<GatewayState<M>>>,
    body: Bytes,
) -> Result<Response, GatewayError> {
    // credential first: nothing is parsed or forwarded without it
    let Some(api_key) = state.api_key.as_deref() else {
        tracing::error!("API_KEY is missing from the environment");
        return Err(GatewayError::Configuration);
    };

    let req: RelayReq = serde_json::from_slice(&body).map_err(e500)?;
    let model = req
        .model
        .filter(|m| !m.trim().is_empty())
        .unwrap_or_else(|| state.default_model.clone());

    tracing::info!(%model, bytes = body.len(), "relaying generation request");
    let text = state
        .model
        .generate(
            api_key,
            GenerateCall {
                model,
                contents: req.contents,
                config: req.config,
            },
        )
        .await
        .map_err(e500)?;

    Ok(([(ACCESS_CONTROL_ALLOW_ORIGIN, "*")], Json(json!({ "text": text }))).into_response())
}

async fn preflight() -> impl IntoResponse {
    (
        [
            (ACCESS_CONTROL_ALLOW_ORIGIN, "*"),
            (ACCESS_CONTROL_ALLOW_HEADERS, "Content-Type"),
        ],
        "ok",
    )
}

async fn method_not_allowed() -> GatewayError {
    GatewayError::MethodNotAllowed
}

// --- helpers ---
fn e500<E: Into<GatewayError> + std::fmt::Display>(e: E) -> GatewayError {
    tracing::error!(error=%e, "generation failed");
    e.into()
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use axum::body::{to_bytes, Body};
    use http::Request;
    use std::sync::Mutex;
    use tower::ServiceExt;

    /// Canned upstream that remembers the last call it saw.
    pub(crate) struct StubModel {
        reply: Result<String, String>,
        pub(crate) last: Mutex<Option<GenerateCall>>,
    }

    impl StubModel {
        pub(crate) fn ok(text: impl Into<String>) -> Self {
            Self { reply: Ok(text.into()), last: Mutex::new(None) }
        }

        pub(crate) fn failing(msg: impl Into<String>) -> Self {
            Self { reply: Err(msg.into()), last: Mutex::new(None) }
        }
    }

    impl GenerativeModel for StubModel {
        async fn generate(&self, _api_key: &str, call: GenerateCall) -> Result<String, UpstreamError> {
            *self.last.lock().unwrap() = Some(call);
            self.reply.clone().map_err(UpstreamError::Provider)
        }
    }

    pub(crate) fn state(key: Option<&str>, model: StubModel) -> GatewayState<StubModel> {
        GatewayState {
            api_key: key.map(str::to_owned),
            default_model: "gemini-2.5-flash".into(),
            model,
        }
    }

    async fn send(app: Router, method: &str, body: &str) -> (StatusCode, http::HeaderMap, String) {
        let req = Request::builder()
            .method(method)
            .uri("/api/gemini")
            .header("content-type", "application/json")
            .body(Body::from(body.to_owned()))
            .unwrap();
        let res = app.oneshot(req).await.unwrap();
        let status = res.status();
        let headers = res.headers().clone();
        let bytes = to_bytes(res.into_body(), usize::MAX).await.unwrap();
        (status, headers, String::from_utf8(bytes.to_vec()).unwrap())
    }

    #[tokio::test]
    async fn missing_credential_is_a_500_with_error_field() {
        let app = router("/api/gemini", state(None, StubModel::ok("never")));
        let (status, _, body) = send(app, "POST", r#"{"model":"m","contents":{},"config":{}}"#).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        let v: Value = serde_json::from_str(&body).unwrap();
        assert_eq!(v["error"], "Server configuration error");
    }

    #[tokio::test]
    async fn credential_is_checked_before_body() {
        let app = router("/api/gemini", state(None, StubModel::ok("never")));
        let (status, _, body) = send(app, "POST", "not json").await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert!(body.contains("Server configuration error"));
    }

    #[tokio::test]
    async fn options_is_answered_with_cors_headers() {
        let app = router("/api/gemini", state(None, StubModel::ok("never")));
        let (status, headers, body) = send(app, "OPTIONS", "garbage").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(headers[ACCESS_CONTROL_ALLOW_ORIGIN], "*");
        assert_eq!(headers[ACCESS_CONTROL_ALLOW_HEADERS], "Content-Type");
        assert_eq!(body, "ok");
    }

    #[tokio::test]
    async fn other_methods_are_405() {
        for method in ["GET", "PUT", "DELETE"] {
            let app = router("/api/gemini", state(Some("k"), StubModel::ok("x")));
            let (status, _, body) = send(app, method, "").await;
            assert_eq!(status, StatusCode::METHOD_NOT_ALLOWED, "{method}");
            assert_eq!(body, "Method Not Allowed");
        }
    }

    #[tokio::test]
    async fn success_relays_text() {
        let st = state(Some("k"), StubModel::ok("{\"title\":\"t\"}"));
        let app = Router::new().merge(router("/api/gemini", st));
        let (status, headers, body) =
            send(app, "POST", r#"{"contents":{"parts":[{"text":"hi"}]},"config":{}}"#).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(headers[ACCESS_CONTROL_ALLOW_ORIGIN], "*");
        let v: Value = serde_json::from_str(&body).unwrap();
        assert_eq!(v["text"], "{\"title\":\"t\"}");
    }

    #[tokio::test]
    async fn forwards_model_and_payload_untouched() {
        let st = Arc::new(state(Some("k"), StubModel::ok("x")));
        let res = relay(
            State(st.clone()),
            Bytes::from_static(br#"{"model":"gemini-pro","contents":{"parts":[]},"config":{"temperature":0.2}}"#),
        )
        .await
        .unwrap();
        assert_eq!(res.status(), StatusCode::OK);
        let call = st.model.last.lock().unwrap().clone().unwrap();
        assert_eq!(call.model, "gemini-pro");
        assert_eq!(call.config["temperature"], 0.2);
        assert_eq!(call.contents, json!({ "parts": [] }));

        relay(State(st.clone()), Bytes::from_static(br#"{"model":"","contents":{}}"#))
            .await
            .unwrap();
        let call = st.model.last.lock().unwrap().clone().unwrap();
        assert_eq!(call.model, "gemini-2.5-flash");
        assert_eq!(call.config, Value::Null);
    }

    #[tokio::test]
    async fn upstream_failure_is_surfaced_verbatim() {
        let app = router("/api/gemini", state(Some("k"), StubModel::failing("quota exceeded")));
        let (status, _, body) = send(app, "POST", r#"{"model":"m","contents":{},"config":{}}"#).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        let v: Value = serde_json::from_str(&body).unwrap();
        assert_eq!(v["error"], "quota exceeded");
    }

    #[tokio::test]
    async fn malformed_body_is_a_500() {
        let app = router("/api/gemini", state(Some("k"), StubModel::ok("x")));
        let (status, _, body) = send(app, "POST", "{").await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert!(serde_json::from_str::<Value>(&body).unwrap()["error"].is_string());
    }
}
