//! Echo Bot Example
//!
//! Replies to every text message with the same text, answers `/ping`, and
//! greets new chat members.
//!
//! # Usage
//!
//! ```bash
//! # long polling
//! FERROGRAM_BOT__TOKEN=123:abc cargo run --package echo-bot
//!
//! # webhook on port 8443
//! cargo run --package echo-bot -- --token 123:abc --webhook --port 8443
//! ```

use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;
use ferrogram::prelude::*;
use serde_json::json;
use tracing::{error, info};

#[derive(Debug, Parser)]
#[command(name = "echo-bot", about = "A simple echo bot built on ferrogram")]
struct Args {
    /// Bot token. Overrides `bot.token` from configuration.
    #[arg(long, env = "BOT_TOKEN")]
    token: Option<String>,

    /// Configuration file (TOML).
    #[arg(long)]
    config: Option<PathBuf>,

    /// Receive updates by webhook instead of long polling.
    #[arg(long)]
    webhook: bool,

    /// Webhook port. Overrides `webhook.port`.
    #[arg(long)]
    port: Option<u16>,
}

/// Logs every update, then continues the chain.
async fn log_update(ctx: std::sync::Arc<Context>) -> anyhow::Result<()> {
    info!(
        update_id = ctx.update_id(),
        kind = %ctx.kind(),
        sender = ?ctx.sender_id(),
        "Update received"
    );
    Ok(())
}

async fn reply(ctx: &Context, text: &str) -> anyhow::Result<()> {
    ctx.call(
        "sendMessage",
        json!({ "chat_id": ctx.chat_id(), "text": text }),
    )
    .await?;
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let mut builder = Bot::builder();
    if let Some(path) = &args.config {
        builder = builder.config_file(path);
    }
    if let Some(token) = args.token {
        builder = builder.token(token);
    }

    let mut config = builder.load_config()?;
    if let Some(port) = args.port {
        config.webhook.port = port;
    }
    let _guard = logging::init_from_config(&config.logging);

    let bot = Bot::from_config(config)?;

    bot.use_middleware(tap(log_update));

    bot.on(
        UpdateKind::Message,
        handler(|ctx| async move {
            match ctx.text() {
                Some("/ping") => reply(&ctx, "Pong!").await,
                Some(text) => reply(&ctx, text).await,
                None => Ok(()),
            }
        }),
    )?;

    bot.on(
        UpdateKind::NewChatMembers,
        handler(|ctx| async move {
            let names: Vec<String> = ctx
                .payload()
                .get("new_chat_members")
                .and_then(|members| members.as_array())
                .into_iter()
                .flatten()
                .filter_map(|member| member.get("first_name")?.as_str().map(str::to_owned))
                .collect();
            if !names.is_empty() {
                reply(&ctx, &format!("Welcome, {}!", names.join(", "))).await?;
            }
            Ok::<_, anyhow::Error>(())
        }),
    )?;

    bot.catch(|ctx, err| async move {
        error!(update_id = ctx.update_id(), error = %err, "Handler failed");
    });

    if args.webhook {
        bot.run_webhook().await?;
    } else {
        bot.run_polling(PollingOptions::new()).await?;
    }

    Ok(())
}
