//! Interactive console front-end for the assistant core.
//!
//! Reads messages line by line, answers with the same SSE framing the HTTP
//! boundary would forward, and prints the decoded events. With `--stub` the
//! generative service is replaced by a canned provider, so routing and
//! directive processing can be exercised offline.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use tokio::io::{AsyncBufReadExt, BufReader};

use sidekick::streaming::{data_payloads, DONE_SENTINEL};
use sidekick::{
    AssistantConfig, AssistantEvent, AssistantReply, AssistantService, ChatModelProvider,
    InMemoryActionExecutor, InMemoryTranscriptSink, OpenAiChatModel, RequestContext,
    StubChatModel,
};

#[derive(Parser)]
#[command(name = "sidekick-chat")]
#[command(version)]
#[command(about = "Console chat client for the Sidekick assistant core")]
struct Cli {
    /// TOML configuration file; defaults apply when omitted.
    #[arg(long)]
    config: Option<PathBuf>,

    #[arg(long, default_value = "local-user")]
    user_id: String,

    #[arg(long, default_value = "personal")]
    workspace_id: String,

    /// Use the canned stub provider instead of a live model endpoint.
    #[arg(long)]
    stub: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt::init();
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => AssistantConfig::load(path)
            .with_context(|| format!("loading {}", path.display()))?,
        None => AssistantConfig::default(),
    };

    let provider: Arc<dyn ChatModelProvider> = if cli.stub {
        Arc::new(StubChatModel::from_deltas(&[
            "Это локальный заглушечный ответ. ",
            "Подключите модель, чтобы получить настоящий.",
        ]))
    } else {
        Arc::new(OpenAiChatModel::from_config(config.model.clone()).context("model provider")?)
    };

    let executor = Arc::new(InMemoryActionExecutor::new());
    let transcript = Arc::new(InMemoryTranscriptSink::new());
    let service = AssistantService::new(config, provider, executor, transcript);
    let _sweeper = service.spawn_limiter_sweeper();

    println!("sidekick-chat ready; empty line exits");
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        let Some(line) = lines.next_line().await? else {
            break;
        };
        let text = line.trim();
        if text.is_empty() {
            break;
        }

        let ctx = RequestContext::new(cli.user_id.clone(), cli.workspace_id.clone());
        match service.handle_message(text, ctx).await {
            Ok(AssistantReply::Stream(mut rx)) => {
                while let Some(frame) = rx.recv().await {
                    render_frame(&frame);
                }
                println!();
            }
            Ok(AssistantReply::RateLimited(decision)) => {
                println!(
                    "[rate limited: retry in {}ms, limit {}/window]",
                    decision.reset_ms, decision.limit
                );
            }
            Err(err) if err.is_circuit_open() => {
                println!("[assistant temporarily unavailable: {err}]");
            }
            Err(err) => {
                eprintln!("error: {err}");
            }
        }
    }

    Ok(())
}

fn render_frame(frame: &str) {
    for payload in data_payloads(frame.trim_end()) {
        if payload == DONE_SENTINEL {
            continue;
        }
        match serde_json::from_str::<AssistantEvent>(&payload) {
            Ok(AssistantEvent::Delta { content }) => print!("{content}"),
            Ok(AssistantEvent::Navigation { target }) => println!("\n[navigate -> {target}]"),
            Ok(AssistantEvent::Refresh { scope }) => println!("\n[refresh {scope}]"),
            Ok(AssistantEvent::Error { message }) => println!("\n[stream error: {message}]"),
            Err(_) => {} // passthrough control frames stay silent on the console
        }
    }
}
