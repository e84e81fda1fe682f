mod api;
mod client;
mod server;
mod sse;
mod turn;
mod ui;

use clap::{Parser, Subcommand};
use client::{ChatClient, ClientConfig};

const DEFAULT_BASE_URL: &str = "http://127.0.0.1:8787";

#[derive(Parser)]
#[command(name = "arogya", about = "Streaming chat client for the health assistant")]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Chat with the health assistant in the terminal (default).
    Chat {
        /// Base URL of the chat backend.
        #[arg(long, env = "AROGYA_CHAT_URL", default_value = DEFAULT_BASE_URL)]
        base_url: String,
    },
    /// Run a local mock backend that speaks the streaming protocol.
    Serve {
        /// Address to listen on.
        #[arg(long, env = "AROGYA_LISTEN", default_value = "127.0.0.1:8787")]
        listen: String,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    dotenvy::dotenv().ok();

    let cli = Cli::parse();
    let command = cli.command.unwrap_or_else(|| Command::Chat {
        base_url: std::env::var("AROGYA_CHAT_URL").unwrap_or_else(|_| DEFAULT_BASE_URL.to_string()),
    });

    match command {
        Command::Chat { base_url } => {
            let chat_client = ChatClient::new(ClientConfig { base_url });
            ui::run_tui(chat_client)
        }
        Command::Serve { listen } => server::run(server::ServerConfig { listen }).await,
    }
}
