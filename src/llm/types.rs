//! Chat completion wire types.

use serde::{Deserialize, Serialize};

/// Author of a conversation turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

/// A single conversation turn.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: String,
}

impl Message {
    pub fn user(content: impl Into<String>) -> Self {
        Self { role: Role::User, content: content.into() }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self { role: Role::Assistant, content: content.into() }
    }
}

/// Request body for the chat completion endpoint, built fresh for every turn from a snapshot of
/// the conversation.
#[derive(Debug, Clone, Serialize)]
pub struct ChatRequest {
    pub model: String,
    pub messages: Vec<Message>,
    pub temperature: f32,
}

/// Token accounting reported by the API.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Usage {
    #[serde(default)]
    pub prompt_tokens: u32,
    #[serde(default)]
    pub completion_tokens: u32,
    #[serde(default)]
    pub total_tokens: u32,
}

/// One answer candidate.
#[derive(Debug, Clone, Deserialize)]
pub struct Choice {
    pub message: Message,
    #[serde(default)]
    pub finish_reason: Option<String>,
    #[serde(default)]
    pub index: u32,
}

/// Successful chat completion payload.
///
/// Every field is optional on the wire so that an error payload still decodes, with an empty
/// choice list, and can then be re-read as an [`ApiErrorBody`].
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ChatCompletion {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub object: String,
    #[serde(default)]
    pub created: i64,
    #[serde(default)]
    pub model: String,
    #[serde(default)]
    pub usage: Usage,
    #[serde(default)]
    pub choices: Vec<Choice>,
}

impl ChatCompletion {
    /// Content of the first choice.
    pub fn answer(&self) -> Option<&str> {
        self.choices.first().map(|c| c.message.content.as_str())
    }
}

/// Error payload: `{"error": {...}}`.
#[derive(Debug, Clone, Deserialize)]
pub struct ApiErrorBody {
    pub error: ApiErrorDetail,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ApiErrorDetail {
    pub message: String,
    #[serde(default, rename = "type")]
    pub kind: Option<String>,
    #[serde(default)]
    pub param: Option<String>,
    #[serde(default)]
    pub code: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_serializes_lowercase_roles() {
        let request = ChatRequest {
            model: "gpt-3.5-turbo".to_string(),
            messages: vec![Message::user("hi"), Message::assistant("hello")],
            temperature: 0.5,
        };
        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["model"], "gpt-3.5-turbo");
        assert_eq!(json["messages"][0]["role"], "user");
        assert_eq!(json["messages"][1]["role"], "assistant");
        assert_eq!(json["temperature"], 0.5);
    }

    #[test]
    fn test_error_payload_decodes_as_empty_completion() {
        let body = r#"{"error":{"message":"Incorrect API key","type":"invalid_request_error","param":null,"code":"invalid_api_key"}}"#;
        let completion: ChatCompletion = serde_json::from_str(body).unwrap();
        assert!(completion.choices.is_empty());

        let error: ApiErrorBody = serde_json::from_str(body).unwrap();
        assert_eq!(error.error.message, "Incorrect API key");
        assert_eq!(error.error.kind.as_deref(), Some("invalid_request_error"));
        assert_eq!(error.error.code.as_deref(), Some("invalid_api_key"));
        assert!(error.error.param.is_none());
    }

    #[test]
    fn test_completion_answer() {
        let body = r#"{"id":"chatcmpl-1","object":"chat.completion","created":1680000000,"model":"gpt-3.5-turbo",
            "usage":{"prompt_tokens":10,"completion_tokens":5,"total_tokens":15},
            "choices":[{"message":{"role":"assistant","content":"Both weigh the same."},"finish_reason":"stop","index":0}]}"#;
        let completion: ChatCompletion = serde_json::from_str(body).unwrap();
        assert_eq!(completion.answer(), Some("Both weigh the same."));
        assert_eq!(completion.usage.total_tokens, 15);
        assert_eq!(completion.choices[0].finish_reason.as_deref(), Some("stop"));
    }

    #[test]
    fn test_completion_metadata_is_decoded() {
        let body = r#"{"id":"chatcmpl-7","object":"chat.completion","created":1680000123,"model":"gpt-4o",
            "usage":{"prompt_tokens":12,"completion_tokens":7,"total_tokens":19},
            "choices":[{"message":{"role":"assistant","content":"a"},"index":1}]}"#;
        let completion: ChatCompletion = serde_json::from_str(body).unwrap();
        assert_eq!(completion.id, "chatcmpl-7");
        assert_eq!(completion.object, "chat.completion");
        assert_eq!(completion.created, 1680000123);
        assert_eq!(completion.model, "gpt-4o");
        assert_eq!((completion.usage.prompt_tokens, completion.usage.completion_tokens), (12, 7));
        assert_eq!(completion.choices[0].index, 1);
        assert!(completion.choices[0].finish_reason.is_none());
    }
}
