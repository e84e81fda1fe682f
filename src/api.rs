use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: String,
}

impl Message {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}

/// Request body for the chat endpoint: the full conversation so far.
#[derive(Debug, Serialize, Deserialize)]
pub struct ChatRequest {
    pub messages: Vec<Message>,
}

/// One streamed completion chunk. Every field is defaulted so payloads that
/// omit any part of the `choices[0].delta.content` path still deserialize;
/// fields we don't know about are ignored.
#[derive(Debug, Default, Deserialize)]
pub(crate) struct StreamChunk {
    #[serde(default)]
    pub(crate) choices: Vec<StreamChoice>,
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct StreamChoice {
    #[serde(default)]
    pub(crate) delta: StreamDelta,
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct StreamDelta {
    #[serde(default)]
    pub(crate) content: Option<String>,
}

impl StreamChunk {
    /// The first choice's content delta, if any.
    pub(crate) fn delta_content(self) -> Option<String> {
        self.choices.into_iter().next()?.delta.content
    }
}

/// Body of a non-success response from the chat endpoint.
#[derive(Debug, Default, Deserialize)]
pub(crate) struct ErrorBody {
    #[serde(default)]
    pub(crate) error: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn roles_serialize_lowercase() {
        let json = serde_json::to_string(&Message::user("hi")).unwrap();
        assert_eq!(json, r#"{"role":"user","content":"hi"}"#);
        let json = serde_json::to_string(&Message::assistant("")).unwrap();
        assert_eq!(json, r#"{"role":"assistant","content":""}"#);
    }

    #[test]
    fn chunk_extracts_first_choice_delta() {
        let chunk: StreamChunk = serde_json::from_str(
            r#"{"id":"x","model":"m","choices":[{"index":0,"delta":{"content":"Hel"},"finish_reason":null}]}"#,
        )
        .unwrap();
        assert_eq!(chunk.delta_content().as_deref(), Some("Hel"));
    }

    #[test]
    fn chunk_tolerates_missing_pieces() {
        let chunk: StreamChunk = serde_json::from_str(r#"{"choices":[]}"#).unwrap();
        assert_eq!(chunk.delta_content(), None);

        let chunk: StreamChunk = serde_json::from_str(r#"{"choices":[{"delta":{}}]}"#).unwrap();
        assert_eq!(chunk.delta_content(), None);

        let chunk: StreamChunk =
            serde_json::from_str(r#"{"choices":[{"finish_reason":"stop"}]}"#).unwrap();
        assert_eq!(chunk.delta_content(), None);

        let chunk: StreamChunk = serde_json::from_str(r#"{}"#).unwrap();
        assert_eq!(chunk.delta_content(), None);
    }

    #[test]
    fn error_body_tolerates_any_shape() {
        let body: ErrorBody = serde_json::from_str(r#"{"error":"rate limited"}"#).unwrap();
        assert_eq!(body.error.as_deref(), Some("rate limited"));

        let body: ErrorBody = serde_json::from_str(r#"{}"#).unwrap();
        assert_eq!(body.error, None);
    }
}
