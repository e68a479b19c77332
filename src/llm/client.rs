//! Chat completion client with a cancelling timeout watchdog.

use std::time::Duration;

use anyhow::Context;
use reqwest::header::CONTENT_TYPE;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use super::conversation::Conversation;
use super::types::{ApiErrorBody, ChatCompletion, ChatRequest, Message};
use crate::config::Settings;
use crate::error::{Error, Result};

/// Chat client for an OpenAI-compatible completion endpoint.
pub struct ChatClient {
    http: reqwest::Client, // Shared connection pool
    print_json: bool,      // Echo raw response payloads
}

impl ChatClient {
    /// Create a new chat client.
    ///
    /// # Arguments
    /// * `print_json` - Print every raw response body before decoding it
    ///
    /// # Errors
    /// Returns an error if the HTTP client cannot be built (e.g. TLS backend failure).
    pub fn new(print_json: bool) -> anyhow::Result<Self> {
        let http = reqwest::Client::builder().build().context("Failed to create HTTP client")?;
        Ok(Self { http, print_json })
    }

    /// Send a question with the whole conversation as context.
    ///
    /// The user turn is appended before the request is sent. On success the first answer is
    /// appended as well, so the conversation grows by two turns. A timeout removes the user turn
    /// again so a resubmission does not duplicate it; other failures leave it in place.
    ///
    /// # Arguments
    /// * `conversation` - History to send and update
    /// * `question` - The user's question
    /// * `settings` - Endpoint, credentials, model, temperature and timeout
    ///
    /// # Errors
    /// [`Error::Timeout`], [`Error::Network`], [`Error::Api`] or [`Error::Parse`].
    pub async fn dispatch(&self, conversation: &mut Conversation, question: &str, settings: &Settings) -> Result<ChatCompletion> {
        conversation.push(Message::user(with_language_hint(question, &settings.language)));

        let request = ChatRequest { model: settings.model.clone(), messages: conversation.messages().to_vec(), temperature: settings.temperature };
        debug!("Sending {} message(s) to {} ({})", request.messages.len(), settings.api_url, request.model);

        let cancel = CancellationToken::new();
        let _watchdog = Watchdog::start(settings.timeout, cancel.clone());

        let send = self
            .http
            .post(&settings.api_url)
            .bearer_auth(&settings.api_key)
            .header(CONTENT_TYPE, "application/json")
            .json(&request)
            .send();

        let outcome = tokio::select! {
            _ = cancel.cancelled() => None,
            result = async {
                match send.await {
                    Ok(response) => response.text().await,
                    Err(e) => Err(e),
                }
            } => Some(result),
        };

        let body = match outcome {
            None => {
                warn!("Request cancelled after {}s", settings.timeout);
                conversation.rollback_user_turn();
                return Err(Error::Timeout);
            }
            Some(Err(e)) => return Err(Error::from(e)),
            Some(Ok(body)) => body,
        };

        if self.print_json {
            println!("\r\nJSON: {}", body);
        }

        let completion = decode_response(&body)?;
        debug!(
            "Completion {} ({}, model {}, created {}): {} prompt + {} completion = {} tokens",
            completion.id, completion.object, completion.model, completion.created, completion.usage.prompt_tokens, completion.usage.completion_tokens, completion.usage.total_tokens
        );
        if let Some(choice) = completion.choices.first() {
            debug!("Choice {} finished: {}", choice.index, choice.finish_reason.as_deref().unwrap_or("unknown"));
            conversation.push(choice.message.clone());
        }
        Ok(completion)
    }
}

/// Decode a response body into a completion with at least one choice.
fn decode_response(body: &str) -> Result<ChatCompletion> {
    let completion: ChatCompletion = serde_json::from_str(body).map_err(|e| {
        debug!("Response is not a completion: {}", e);
        Error::Parse(body.to_string())
    })?;

    if completion.choices.is_empty() {
        let message = match serde_json::from_str::<ApiErrorBody>(body) {
            Ok(payload) => {
                let detail = payload.error;
                debug!("API error type {:?}, param {:?}, code {:?}", detail.kind, detail.param, detail.code);
                detail.message
            }
            Err(_) => body.to_string(),
        };
        return Err(Error::Api(message));
    }

    Ok(completion)
}

/// Ask the model to answer in the narration language.
fn with_language_hint(question: &str, language: &str) -> String {
    format!("{} (You must answer in \"{}\")", question.trim(), language)
}

/// Countdown task that cancels the in-flight request when it reaches zero.
/// Aborted when dropped, so it never outlives the request it guards.
struct Watchdog {
    handle: JoinHandle<()>,
}

impl Watchdog {
    fn start(timeout_secs: u64, cancel: CancellationToken) -> Self {
        let handle = tokio::spawn(async move {
            let mut remaining = timeout_secs;
            loop {
                if remaining == 0 {
                    debug!("Watchdog expired, cancelling request");
                    cancel.cancel();
                    return;
                }
                tokio::time::sleep(Duration::from_secs(1)).await;
                remaining -= 1;
            }
        });
        Self { handle }
    }
}

impl Drop for Watchdog {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::Router;
    use axum::http::{HeaderMap, StatusCode};
    use axum::routing::post;
    use serde_json::{Value, json};
    use tokio::net::TcpListener;

    async fn serve(router: Router) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });
        format!("http://{}/v1/chat/completions", addr)
    }

    fn settings_for(api_url: String, timeout: u64) -> Settings {
        Settings { api_url, api_key: "sk-test".to_string(), timeout, ..Settings::default() }
    }

    /// Answers with the bearer token and the number of messages received.
    async fn echo_handler(headers: HeaderMap, axum::Json(body): axum::Json<Value>) -> axum::Json<Value> {
        let auth = headers.get("authorization").and_then(|v| v.to_str().ok()).unwrap_or_default().to_string();
        let count = body["messages"].as_array().map(|m| m.len()).unwrap_or(0);
        axum::Json(json!({
            "id": "chatcmpl-1",
            "object": "chat.completion",
            "created": 1680000000,
            "model": body["model"],
            "usage": {"prompt_tokens": 1, "completion_tokens": 1, "total_tokens": 2},
            "choices": [{"message": {"role": "assistant", "content": format!("{} {}", auth, count)}, "finish_reason": "stop", "index": 0}]
        }))
    }

    #[tokio::test]
    async fn test_successful_dispatch_appends_two_turns() {
        let url = serve(Router::new().route("/v1/chat/completions", post(echo_handler))).await;
        let client = ChatClient::new(false).unwrap();
        let settings = settings_for(url, 5);
        let mut conversation = Conversation::new();

        let completion = client.dispatch(&mut conversation, "What weighs more?", &settings).await.unwrap();
        assert_eq!(completion.answer(), Some("Bearer sk-test 1"));
        assert_eq!(conversation.len(), 2);
        assert_eq!(conversation.messages()[0].content, "What weighs more? (You must answer in \"en-us\")");

        // The second request carries the previous turns as context.
        let completion = client.dispatch(&mut conversation, "Why?", &settings).await.unwrap();
        assert_eq!(completion.answer(), Some("Bearer sk-test 3"));
        assert_eq!(conversation.len(), 4);
    }

    #[tokio::test]
    async fn test_timeout_rolls_back_user_turn() {
        let router = Router::new().route(
            "/v1/chat/completions",
            post(|| async {
                tokio::time::sleep(Duration::from_secs(10)).await;
                "late"
            }),
        );
        let url = serve(router).await;
        let client = ChatClient::new(false).unwrap();
        let settings = settings_for(url, 1);
        let mut conversation = Conversation::new();
        conversation.push(Message::user("earlier"));
        conversation.push(Message::assistant("reply"));

        let started = std::time::Instant::now();
        let err = client.dispatch(&mut conversation, "slow question", &settings).await.unwrap_err();
        assert!(matches!(err, Error::Timeout));
        assert!(started.elapsed() < Duration::from_secs(5));
        assert_eq!(conversation.len(), 2);
        assert_eq!(conversation.messages()[1], Message::assistant("reply"));
    }

    #[tokio::test]
    async fn test_api_error_payload_is_surfaced() {
        let router = Router::new().route(
            "/v1/chat/completions",
            post(|| async {
                (
                    StatusCode::UNAUTHORIZED,
                    axum::Json(json!({"error": {"message": "Incorrect API key provided", "type": "invalid_request_error", "param": null, "code": "invalid_api_key"}})),
                )
            }),
        );
        let url = serve(router).await;
        let client = ChatClient::new(false).unwrap();
        let mut conversation = Conversation::new();

        let err = client.dispatch(&mut conversation, "hello", &settings_for(url, 5)).await.unwrap_err();
        match err {
            Error::Api(message) => assert_eq!(message, "Incorrect API key provided"),
            other => panic!("unexpected error: {:?}", other),
        }
        // No rollback outside timeouts.
        assert_eq!(conversation.len(), 1);
    }

    #[tokio::test]
    async fn test_malformed_body_is_parse_error() {
        let url = serve(Router::new().route("/v1/chat/completions", post(|| async { "<html>bad gateway</html>" }))).await;
        let client = ChatClient::new(false).unwrap();
        let mut conversation = Conversation::new();

        let err = client.dispatch(&mut conversation, "hello", &settings_for(url, 5)).await.unwrap_err();
        match err {
            Error::Parse(raw) => assert_eq!(raw, "<html>bad gateway</html>"),
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_connection_refused_is_network_error() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let client = ChatClient::new(false).unwrap();
        let mut conversation = Conversation::new();
        let err = client.dispatch(&mut conversation, "hello", &settings_for(format!("http://{}/", addr), 5)).await.unwrap_err();
        assert!(matches!(err, Error::Network(_)));
        assert_eq!(conversation.len(), 1);
    }

    #[test]
    fn test_empty_choices_without_error_schema_reports_raw_body() {
        let err = decode_response(r#"{"choices":[]}"#).unwrap_err();
        match err {
            Error::Api(message) => assert_eq!(message, r#"{"choices":[]}"#),
            other => panic!("unexpected error: {:?}", other),
        }
    }
}
