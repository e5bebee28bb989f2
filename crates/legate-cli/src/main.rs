use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use legate_cli::cli::{ChatArgs, Cli, Command};
use legate_cli::config::Settings;
use legate_cli::functions;
use legate_core::{AssistantParams, Conversation, FunctionRegistry, Message};
use legate_openai::{AssistantTool, AssistantsClient, OpenAIClient};
use legate_store::ThreadStore;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env file
    dotenvy::dotenv().ok();

    let cli = Cli::parse();

    let settings = Settings::load()
        .map_err(|e| anyhow::anyhow!("Failed to load configuration: {}", e))?;

    init_logging(&settings);

    match cli.command {
        Command::Chat(args) => chat(&settings, args).await,
    }
}

async fn chat(settings: &Settings, args: ChatArgs) -> anyhow::Result<()> {
    let client: Arc<dyn AssistantsClient> =
        Arc::new(OpenAIClient::new(settings.openai_api_key.clone())?);

    let mut registry = FunctionRegistry::new();
    functions::register_builtins(&mut registry);
    let registry = Arc::new(registry);

    let store = Arc::new(ThreadStore::new(&settings.data_path));

    let params = AssistantParams {
        model: settings.model.clone(),
        tools: registry
            .schemas_by_tag(functions::DEFAULT_TAG)
            .into_iter()
            .map(AssistantTool::function)
            .collect(),
        ..AssistantParams::default()
    };

    let builder = Conversation::builder(Arc::clone(&client), Arc::clone(&registry))
        .with_store(Arc::clone(&store))
        .with_assistant_name(settings.assistant_name.clone())
        .with_assistant_params(params)
        .with_poll_interval(Duration::from_millis(settings.poll_interval_ms))
        .with_max_polls(settings.max_polls);

    let mut conversation = if args.continue_conversation {
        match store.most_recent_thread().await? {
            Some(thread_id) => {
                tracing::info!("Continuing conversation on thread {}", thread_id);
                builder.resume(&thread_id).await?
            }
            None => {
                println!("No existing conversation found. Starting a new one.");
                builder.create().await?
            }
        }
    } else {
        builder.create().await?
    };

    tracing::info!("Using assistant {}", conversation.assistant().id);
    conversation.send_message(&args.prompt).await?;

    let reply = conversation.last_message().await?;
    print_message(&reply)
}

/// Print the first content part: text verbatim, anything else as raw JSON.
fn print_message(message: &Message) -> anyhow::Result<()> {
    match message.content.first() {
        Some(part) => match &part.text {
            Some(text) if part.is_text() => println!("{}", text.value),
            _ => println!("{}", serde_json::to_string(part)?),
        },
        None => println!(),
    }
    Ok(())
}

fn init_logging(settings: &Settings) {
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&settings.log_level))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    // Logs go to stderr; stdout carries only the assistant's reply.
    let registry = tracing_subscriber::registry().with(env_filter);

    match settings.log_format.as_str() {
        "json" => {
            registry
                .with(
                    tracing_subscriber::fmt::layer()
                        .json()
                        .with_writer(std::io::stderr),
                )
                .init();
        }
        _ => {
            registry
                .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
                .init();
        }
    }
}
