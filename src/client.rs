use crate::api::{ChatRequest, ErrorBody, Message};
use crate::turn::TurnDecoder;
use futures::{Stream, StreamExt};
use reqwest::{Client as HttpClient, Response};
use std::error::Error;
use std::future::Future;
use std::pin::pin;

/// Shown in place of a reply when a turn fails for any reason.
pub(crate) const FALLBACK_ERROR_TEXT: &str =
    "Sorry, I encountered an error. Please try again.";

pub struct ClientConfig {
    pub base_url: String,
}

#[derive(Clone)]
pub struct ChatClient {
    base_url: String,
    http: HttpClient,
}

type ClientResult<T> = Result<T, Box<dyn Error + Send + Sync>>;

/// Lifecycle of one in-flight turn.
enum TurnState {
    AwaitingHeaders,
    Streaming(Response),
    Done,
    Failed,
}

impl ChatClient {
    pub fn new(config: ClientConfig) -> Self {
        Self {
            base_url: normalize_base_url(&config.base_url),
            http: HttpClient::new(),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Runs one chat turn: appends the user message, sends the whole
    /// conversation, and streams the reply into a new assistant message.
    ///
    /// `publish` is called with a fresh snapshot of the conversation after
    /// every state change: the appended user message, the empty assistant
    /// message once the stream opens, and each applied content delta.
    ///
    /// Failures never escape as errors. A failed turn ends with a fixed
    /// fallback assistant message instead, so callers see the same
    /// conversation shape either way.
    pub async fn send_turn<F, Fut>(
        &self,
        mut conversation: Vec<Message>,
        user_text: String,
        mut publish: F,
    ) -> Vec<Message>
    where
        F: FnMut(Vec<Message>) -> Fut,
        Fut: Future<Output = ()>,
    {
        conversation.push(Message::user(user_text));
        publish(conversation.clone()).await;

        let mut state = TurnState::AwaitingHeaders;
        loop {
            state = match state {
                TurnState::AwaitingHeaders => match self.open_stream(&conversation).await {
                    Ok(response) => TurnState::Streaming(response),
                    Err(_) => TurnState::Failed,
                },
                TurnState::Streaming(response) => {
                    // Turn started: the assistant message exists before any
                    // delta arrives, and only its content changes from here.
                    conversation.push(Message::assistant(""));
                    publish(conversation.clone()).await;
                    match consume_stream(response.bytes_stream(), &mut conversation, &mut publish)
                        .await
                    {
                        Ok(()) => TurnState::Done,
                        Err(_) => TurnState::Failed,
                    }
                }
                TurnState::Done => break,
                TurnState::Failed => {
                    conversation.push(Message::assistant(FALLBACK_ERROR_TEXT));
                    publish(conversation.clone()).await;
                    break;
                }
            };
        }

        conversation
    }

    /// Sends the conversation and checks the response status. On a
    /// non-success status the error body is decoded if possible; an
    /// unreadable or unrecognized body falls back to a generic description.
    async fn open_stream(&self, conversation: &[Message]) -> ClientResult<Response> {
        let request = ChatRequest {
            messages: conversation.to_vec(),
        };
        let response = self
            .http
            .post(format!("{}/v1/chat", self.base_url))
            .json(&request)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let detail = response
                .json::<ErrorBody>()
                .await
                .ok()
                .and_then(|body| body.error)
                .unwrap_or_else(|| "failed to get response".to_string());
            return Err(format!("chat request failed: {} - {}", status, detail).into());
        }

        Ok(response)
    }
}

/// Drives the byte stream through the framing and decode stages, extending
/// the last conversation entry and publishing a snapshot for every applied
/// delta. Chunks are processed strictly in arrival order; reassembly of
/// split lines and split JSON payloads depends on it.
async fn consume_stream<S, B, E, F, Fut>(
    stream: S,
    conversation: &mut Vec<Message>,
    publish: &mut F,
) -> ClientResult<()>
where
    S: Stream<Item = Result<B, E>>,
    B: AsRef<[u8]>,
    E: Into<Box<dyn Error + Send + Sync>>,
    F: FnMut(Vec<Message>) -> Fut,
    Fut: Future<Output = ()>,
{
    let mut stream = pin!(stream);
    let mut decoder = TurnDecoder::new();

    while let Some(chunk) = stream.next().await {
        let chunk = chunk.map_err(Into::into)?;
        for delta in decoder.feed(chunk.as_ref()) {
            if let Some(last) = conversation.last_mut() {
                last.content.push_str(&delta);
            }
            publish(conversation.clone()).await;
        }
    }

    // Stream closed: the assistant message stays exactly as last published,
    // even if no delta ever arrived.
    Ok(())
}

fn normalize_base_url(value: &str) -> String {
    value.trim_end_matches('/').to_string()
}
