use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use folio::client::conversation::Conversation;
use folio::client::history::ConversationStore;
use folio::client::storage::FileStore;
use folio::client::{ChatClient, ClientError, StreamOutcome, DEFAULT_API_URL};

const DEFAULT_CHAT_DIR: &str = ".folio-chat";

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("folio=warn")))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let api_url = std::env::var("FOLIO_API_URL").unwrap_or_else(|_| DEFAULT_API_URL.to_string());
    let chat_dir = std::env::var("FOLIO_CHAT_DIR")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from(DEFAULT_CHAT_DIR));

    let store = ConversationStore::new(Arc::new(
        FileStore::open(&chat_dir)
            .with_context(|| format!("opening chat directory {}", chat_dir.display()))?,
    ));
    let client = ChatClient::new(api_url.clone())?;

    let mut conversation = resume(&store)?;
    println!("Connected to {api_url}. Commands: /new, /suggest, /quit. Ctrl-C stops an answer.");
    if !conversation.messages.is_empty() {
        println!(
            "Resumed conversation with {} messages.",
            conversation.messages.len()
        );
    }

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        prompt("> ")?;
        let line = tokio::select! {
            line = lines.next_line() => line?,
            _ = tokio::signal::ctrl_c() => None,
        };
        let Some(line) = line else { break };
        let input = line.trim();

        match input {
            "" => continue,
            "/quit" => break,
            "/new" => {
                conversation = Conversation::with_id(store.create()?);
                println!("Started a new conversation.");
            }
            "/suggest" => match client.suggestions(&conversation.history_entries()).await {
                Ok(questions) => {
                    for question in questions {
                        println!("  - {question}");
                    }
                }
                Err(e) => eprintln!("Could not fetch suggestions: {e}"),
            },
            text => {
                answer(&client, &mut conversation, text).await;
                store.save(&conversation.id, &conversation.messages)?;
            }
        }
    }

    println!("Bye.");
    Ok(())
}

fn resume(store: &ConversationStore) -> Result<Conversation> {
    let conversation = match store.current_id()? {
        Some(id) => Conversation {
            messages: store.load(&id)?,
            id,
        },
        None => Conversation::with_id(store.create()?),
    };
    Ok(conversation)
}

async fn answer(client: &ChatClient, conversation: &mut Conversation, text: &str) {
    let cancel = CancellationToken::new();
    let stopper = cancel.clone();
    let watcher = tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            stopper.cancel();
        }
    });

    let result = client
        .send(conversation, text, &cancel, |piece| {
            print!("{piece}");
            let _ = std::io::stdout().flush();
        })
        .await;
    watcher.abort();
    println!();

    match result {
        Ok(StreamOutcome::Completed) => {}
        Ok(StreamOutcome::Cancelled) => println!("[stopped]"),
        Ok(StreamOutcome::Interrupted) => {
            println!("[connection closed before the answer finished]")
        }
        Ok(StreamOutcome::Failed(reason)) => println!("[answer failed: {reason}]"),
        Err(ClientError::Cancelled) => println!("[stopped]"),
        Err(ClientError::Api {
            message,
            retry_after: Some(secs),
            ..
        }) => eprintln!("{message} Try again in {secs}s."),
        Err(e) => eprintln!("Request failed: {e}"),
    }
}

fn prompt(text: &str) -> Result<()> {
    print!("{text}");
    std::io::stdout().flush()?;
    Ok(())
}
