//! Telegram command surface for Vapord.
//!
//! One task per incoming update, dispatched by teloxide. Domain errors are
//! turned into user-visible replies; everything else is logged with the
//! request id and answered generically.

use crate::config::Settings;
use crate::orchestrator::Orchestrator;
use std::sync::Arc;
use teloxide::prelude::*;
use teloxide::types::{ChatAction, InputFile, UserId};
use teloxide::utils::command::BotCommands;
use tracing::{error, info, warn};

type HandlerResult = Result<(), Box<dyn std::error::Error + Send + Sync>>;

const HELP_TEXT: &str = "\u{1F334} Ｗｅｌｃｏｍｅ ｔｏ Ｖａｐｏｒｄ. \u{1F334}\n\n\
    ＨＯＷ ＴＯ ＵＳＥ:\n\
    \u{1F4BF} /vapor song name\n\
    \u{1F4F9} /vapor YouTube URL";

const WORKING_TEXT: &str = "\u{1F334} ＷＯＲＫＩＮＧ．．．\n\
    This can take a bit more than a minute. Sit back and relax.";

#[derive(BotCommands, Clone)]
#[command(rename_rule = "lowercase")]
pub enum Command {
    #[command(description = "show usage")]
    Start,
    #[command(description = "show usage")]
    Help,
    #[command(description = "turn a song name or YouTube link into a vaporwave clip")]
    Vapor(String),
    #[command(description = "liveness check (admin only)")]
    Test,
    #[command(description = "clear the cache and restart (admin only)")]
    Restart,
}

/// Run the bot until the process is stopped.
pub async fn run(settings: Settings, orchestrator: Arc<Orchestrator>) {
    let bot = Bot::from_env();

    let handler = Update::filter_message()
        .branch(
            dptree::entry()
                .filter_command::<Command>()
                .endpoint(handle_command),
        )
        .branch(dptree::endpoint(handle_other));

    Dispatcher::builder(bot, handler)
        .dependencies(dptree::deps![Arc::new(settings), orchestrator])
        .enable_ctrlc_handler()
        .build()
        .dispatch()
        .await;
}

async fn handle_command(
    bot: Bot,
    msg: Message,
    cmd: Command,
    settings: Arc<Settings>,
    orchestrator: Arc<Orchestrator>,
) -> HandlerResult {
    match cmd {
        Command::Start | Command::Help => {
            bot.send_message(msg.chat.id, HELP_TEXT).await?;
        }
        Command::Vapor(query) => {
            handle_vapor(bot, msg, query, settings, orchestrator).await?;
        }
        Command::Test => {
            if let Some(admin) = authorized_admin(&settings, &msg) {
                bot.send_message(
                    UserId(admin),
                    "\u{1F334} Vapord is ONLINE.",
                )
                .await?;
            }
        }
        Command::Restart => {
            if authorized_admin(&settings, &msg).is_some() {
                bot.send_message(msg.chat.id, "Bot is restarting...").await?;
                match orchestrator.cache().clear() {
                    Ok(removed) => info!("Restart requested, cleared {} files", removed),
                    Err(e) => error!("Restart requested, cache clear failed: {}", e),
                }
                // The process supervisor is expected to bring the bot back.
                std::process::exit(0);
            }
        }
    }

    Ok(())
}

async fn handle_vapor(
    bot: Bot,
    msg: Message,
    query: String,
    settings: Arc<Settings>,
    orchestrator: Arc<Orchestrator>,
) -> HandlerResult {
    let request_id = i64::from(msg.id.0);
    let username = msg
        .from()
        .and_then(|u| u.username.as_deref())
        .unwrap_or("unknown");
    info!("[{}] {} has requested {:?}", request_id, username, query);

    if query.trim().chars().count() < settings.bot.min_query_length {
        bot.send_message(msg.chat.id, "\u{1F4BF} ＥＲＲＯＲ.\nI need a bigger query!")
            .await?;
        return Ok(());
    }

    bot.send_message(msg.chat.id, WORKING_TEXT).await?;
    bot.send_chat_action(msg.chat.id, ChatAction::UploadVoice)
        .await?;

    match orchestrator.handle_request(request_id, &query).await {
        Ok(delivery) => {
            info!("[{}] Sending audio", request_id);
            bot.send_audio(msg.chat.id, InputFile::file(delivery.path))
                .await?;

            if let Some(size_mb) = delivery.cache_warning_mb {
                warn_admin_about_cache(&bot, &settings, size_mb).await;
            }
        }
        Err(err) if err.is_user_facing() => {
            error!("[{}] ERROR: {}", request_id, err);
            bot.send_message(msg.chat.id, format!("\u{1F4BF} ＥＲＲＯＲ.\n{}", err))
                .await?;
        }
        Err(err) => {
            error!("[{}] ERROR: {}", request_id, err);
            bot.send_message(
                msg.chat.id,
                "\u{1F4BF} ＥＲＲＯＲ.\nSomething went wrong. Try again later.",
            )
            .await?;
        }
    }

    Ok(())
}

/// Reply to unrecognized commands; other chatter is ignored.
async fn handle_other(bot: Bot, msg: Message) -> HandlerResult {
    if msg.text().is_some_and(|t| t.starts_with('/')) {
        bot.send_message(
            msg.chat.id,
            "\u{1F4BF} ＥＲＲＯＲ.\nThis is not a valid command. Use /help to find out more.",
        )
        .await?;
    }
    Ok(())
}

/// Returns the sender's id when they are on the admin allow-list.
/// Unauthorized attempts are logged and get no reply.
fn authorized_admin(settings: &Settings, msg: &Message) -> Option<u64> {
    let user_id = msg.from().map(|u| u.id.0)?;

    if settings.bot.admin_ids.contains(&user_id) {
        Some(user_id)
    } else {
        warn!("Unauthorized access denied for {}", user_id);
        None
    }
}

/// Advisory only: the cache is never evicted automatically.
async fn warn_admin_about_cache(bot: &Bot, settings: &Settings, size_mb: u64) {
    let Some(admin) = settings.bot.admin_ids.first() else {
        return;
    };

    info!("Warning admin about cache size ({}MB)", size_mb);
    let text = format!(
        "\u{1F4BF} Cache is over {}MB ({}MB)! Bot needs a cleanup.",
        settings.cache.warn_threshold_mb, size_mb
    );

    if let Err(e) = bot.send_message(UserId(*admin), text).await {
        error!("Failed to notify admin: {}", e);
    }
}
