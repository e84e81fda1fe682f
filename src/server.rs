use crate::api::{ChatRequest, Message, Role};
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::routing::post;
use axum::Json;
use std::convert::Infallible;
use std::error::Error;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;

/// Local mock backend speaking the same streaming protocol as the real
/// health-chat endpoint: `data:` lines carrying completion chunks, closed by
/// a `[DONE]` sentinel. Useful for development and end-to-end testing
/// without network access.
pub struct ServerConfig {
    pub listen: String,
}

type ServerResult<T> = Result<T, Box<dyn Error + Send + Sync>>;

pub async fn run(config: ServerConfig) -> ServerResult<()> {
    let listener = tokio::net::TcpListener::bind(&config.listen).await?;
    println!("mock chat server listening on http://{}", config.listen);
    axum::serve(listener, router()).await?;

    Ok(())
}

pub(crate) fn router() -> axum::Router {
    axum::Router::new().route("/v1/chat", post(chat))
}

async fn chat(
    Json(request): Json<ChatRequest>,
) -> Sse<ReceiverStream<Result<Event, Infallible>>> {
    let reply = canned_reply(&request.messages);

    let (tx, rx) = mpsc::channel(16);
    tokio::spawn(async move {
        let _ = tx.send(Ok(Event::default().comment("keep-alive"))).await;
        for piece in word_deltas(&reply) {
            let chunk = serde_json::json!({
                "choices": [{ "index": 0, "delta": { "content": piece } }]
            });
            if tx.send(Ok(Event::default().data(chunk.to_string()))).await.is_err() {
                return;
            }
            tokio::time::sleep(Duration::from_millis(30)).await;
        }
        let _ = tx.send(Ok(Event::default().data("[DONE]"))).await;
    });

    Sse::new(ReceiverStream::new(rx)).keep_alive(
        KeepAlive::new()
            .interval(Duration::from_secs(15))
            .text("keep-alive"),
    )
}

fn canned_reply(messages: &[Message]) -> String {
    let last_user = messages
        .iter()
        .rev()
        .find(|message| message.role == Role::User)
        .map(|message| message.content.trim())
        .unwrap_or("");

    if last_user.is_empty() {
        return "Hello! I'm your health assistant. How can I help you today?".to_string();
    }

    format!(
        "You asked about \"{}\". I can share general wellness information, but \
         for anything urgent please contact your care team through the portal.",
        last_user
    )
}

/// Splits a reply into word-sized deltas, keeping the separating spaces so
/// the concatenation reproduces the reply exactly.
fn word_deltas(reply: &str) -> impl Iterator<Item = &str> {
    reply.split_inclusive(' ')
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn word_deltas_reassemble_exactly() {
        let reply = "two words  and spaces";
        let joined: String = word_deltas(reply).collect();
        assert_eq!(joined, reply);
    }

    #[test]
    fn canned_reply_echoes_last_user_message() {
        let messages = vec![
            Message::user("first"),
            Message::assistant("reply"),
            Message::user("blood pressure"),
        ];
        assert!(canned_reply(&messages).contains("blood pressure"));
        assert!(canned_reply(&[]).contains("health assistant"));
    }
}
