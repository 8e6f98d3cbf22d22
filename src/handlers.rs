//! Telegram update handlers and the dispatch tree.
//!
//! Callback payloads are opaque string-prefixed tokens (`watch_<id>`,
//! `next_<page>`, `prev_<page>`) routed by one globally-registered dispatch
//! tree; nothing is re-registered per request. Pagination keeps no session
//! state: the query is re-parsed out of the displayed message and the match
//! set re-derived on every page turn.

use std::sync::Arc;
use std::time::Duration;

use teloxide::dispatching::UpdateHandler;
use teloxide::prelude::*;
use teloxide::types::{
    InlineKeyboardButton, InlineKeyboardMarkup, InputFile, MaybeInaccessibleMessage, MessageId,
    Recipient,
};
use teloxide::utils::command::BotCommands;

use crate::auth::{Action, AllowList};
use crate::catalog::{NewVideo, VideoCatalog};
use crate::config::BotConfig;
use crate::errors::BotError;
use crate::ingest::{ingest, IngestOutcome};
use crate::normalize::{branded, normalize};
use crate::pagination::{extract_query, keyboard, paginate, result_text};
use crate::rewrite::{rewrite_all, CaptionRewriter};
use crate::search::Pattern;

const TRY_AGAIN_CATALOG: &str = "Failed to search for videos. Please try again later.";

#[derive(BotCommands, Clone)]
#[command(rename_rule = "lowercase", description = "These commands are supported:")]
pub enum Command {
    #[command(description = "Show the welcome message.")]
    Start,
    #[command(description = "Displays this help message.")]
    Help,
    #[command(description = "Show how many videos are stored.")]
    Total,
    #[command(description = "Rewrite every stored caption with the AI formatter.")]
    RewriteCaptions,
}

/// The complete dispatch tree, registered once at startup.
pub fn schema() -> UpdateHandler<BotError> {
    dptree::entry()
        .branch(Update::filter_message().filter_command::<Command>().endpoint(handle_command))
        .branch(
            Update::filter_message()
                .filter(|msg: Message| {
                    msg.video().is_some()
                        || msg.reply_to_message().map(|r| r.video().is_some()).unwrap_or(false)
                })
                .endpoint(handle_video),
        )
        .branch(
            Update::filter_message()
                .filter(|msg: Message| msg.text().is_some())
                .endpoint(handle_search),
        )
        .branch(Update::filter_callback_query().endpoint(handle_callback))
}

/// Deletes a bot-sent message after `delay`. Fire-and-forget: a failure
/// (e.g. the user already deleted it) is logged, never retried.
pub fn schedule_delete(bot: Bot, chat_id: ChatId, message_id: MessageId, delay: Duration) {
    tokio::spawn(async move {
        tokio::time::sleep(delay).await;
        if let Err(err) = bot.delete_message(chat_id, message_id).await {
            log::warn!("failed to delete ephemeral message {}: {err}", message_id.0);
        }
    });
}

async fn handle_command(
    bot: Bot,
    msg: Message,
    cmd: Command,
    catalog: Arc<VideoCatalog>,
    allow_list: Arc<AllowList>,
    rewriter: Option<Arc<CaptionRewriter>>,
    config: Arc<BotConfig>,
) -> Result<(), BotError> {
    match cmd {
        Command::Start => send_welcome(&bot, &msg, &config).await?,
        Command::Help => {
            bot.send_message(msg.chat.id, Command::descriptions().to_string()).await?;
        }
        Command::Total => match catalog.count().await {
            Ok(count) => {
                bot.send_message(msg.chat.id, format!("There are {count} videos stored.")).await?;
            }
            Err(err) => {
                log::error!("failed to count videos: {err}");
                bot.send_message(msg.chat.id, TRY_AGAIN_CATALOG).await?;
            }
        },
        Command::RewriteCaptions => {
            handle_rewrite_captions(&bot, &msg, &catalog, &allow_list, rewriter.as_deref())
                .await?;
        }
    }
    Ok(())
}

// --- /start ---

const ADD_TO_GROUP_URL: &str = "http://t.me/movie_cast_bot?startgroup=true";
const CHANNEL_LINKS: [(&str, &str); 4] = [
    ("JOIN OUR SERIES CHANNEL", "https://t.me/moviecastseriess"),
    ("JOIN OUR BACKUP CHANNEL", "https://t.me/moviecastback"),
    ("JOIN OUR CHAT CHANNEL", "https://t.me/filmpurchat1"),
    ("JOIN OUR MAIN CHANNEL", "https://t.me/moviecastmovie"),
];

fn welcome_keyboard() -> InlineKeyboardMarkup {
    let mut rows = vec![vec![InlineKeyboardButton::url(
        "+ Add me to your group +",
        reqwest::Url::parse(ADD_TO_GROUP_URL).expect("static url"),
    )]];
    for (label, link) in CHANNEL_LINKS {
        rows.push(vec![InlineKeyboardButton::url(
            label,
            reqwest::Url::parse(link).expect("static url"),
        )]);
    }
    InlineKeyboardMarkup::new(rows)
}

/// The bot's own profile photo, if it has one. A transport fault here only
/// downgrades the welcome to plain text.
async fn fetch_bot_photo(bot: &Bot) -> Result<Option<String>, teloxide::RequestError> {
    let me = bot.get_me().await?;
    let photos = bot.get_user_profile_photos(me.id).limit(1).await?;
    Ok(photos.photos.first().and_then(|sizes| sizes.first()).map(|photo| photo.file.id.clone()))
}

async fn send_welcome(bot: &Bot, msg: &Message, config: &BotConfig) -> Result<(), BotError> {
    let first_name = msg
        .from
        .as_ref()
        .map(|user| user.first_name.clone())
        .unwrap_or_else(|| "user".to_string());
    let greeting = format!("HELLO {first_name}, I AM A MOVIE BOT. ADD ME TO YOUR MOVIE CHAT GROUP.");

    let photo = match fetch_bot_photo(bot).await {
        Ok(photo) => photo,
        Err(err) => {
            log::warn!("failed to fetch bot profile photo: {err}");
            None
        }
    };

    let sent = match photo {
        Some(file_id) => {
            bot.send_photo(msg.chat.id, InputFile::file_id(file_id))
                .caption(greeting)
                .reply_markup(welcome_keyboard())
                .await?
        }
        None => {
            bot.send_message(msg.chat.id, greeting).reply_markup(welcome_keyboard()).await?
        }
    };
    schedule_delete(bot.clone(), msg.chat.id, sent.id, config.ephemeral_ttl);
    Ok(())
}

// --- Caption search ---

async fn handle_search(
    bot: Bot,
    msg: Message,
    catalog: Arc<VideoCatalog>,
    config: Arc<BotConfig>,
) -> Result<(), BotError> {
    let Some(text) = msg.text() else { return Ok(()) };

    if let (Some(channel), Some(user)) = (&config.force_sub_channel, msg.from.as_ref()) {
        match is_channel_member(&bot, channel, user.id).await {
            Ok(true) => {}
            Ok(false) => {
                prompt_subscribe(&bot, &msg, channel).await?;
                return Ok(());
            }
            // Fail open: a broken lookup must not lock everyone out.
            Err(err) => log::warn!("membership lookup in {channel} failed: {err}"),
        }
    }

    let pattern = match Pattern::build(text) {
        Ok(pattern) => pattern,
        Err(_) => {
            bot.send_message(msg.chat.id, "Please enter a valid movie name.").await?;
            return Ok(());
        }
    };

    let matches = match catalog.search(&pattern).await {
        Ok(matches) => matches,
        Err(err) => {
            log::error!("failed to search for videos: {err}");
            bot.send_message(msg.chat.id, TRY_AGAIN_CATALOG).await?;
            return Ok(());
        }
    };

    if matches.is_empty() {
        bot.send_message(
            msg.chat.id,
            format!("No movie found with matching name '{}'.", pattern.text()),
        )
        .await?;
        return Ok(());
    }

    let Some(page) = paginate(&matches, 1) else { return Ok(()) };
    let sent = bot
        .send_message(msg.chat.id, result_text(pattern.text(), &page))
        .reply_markup(keyboard(&page))
        .await?;
    schedule_delete(bot, msg.chat.id, sent.id, config.ephemeral_ttl);
    Ok(())
}

async fn is_channel_member(
    bot: &Bot,
    channel: &str,
    user: UserId,
) -> Result<bool, teloxide::RequestError> {
    let member =
        bot.get_chat_member(Recipient::ChannelUsername(channel.to_string()), user).await?;
    Ok(member.kind.is_present())
}

async fn prompt_subscribe(bot: &Bot, msg: &Message, channel: &str) -> Result<(), BotError> {
    let text = format!("Join {channel} to use this bot, then send your movie name again.");
    let link = format!("https://t.me/{}", channel.trim_start_matches('@'));
    let request = bot.send_message(msg.chat.id, text);
    match reqwest::Url::parse(&link) {
        Ok(url) => {
            request
                .reply_markup(InlineKeyboardMarkup::new([[InlineKeyboardButton::url(
                    "JOIN CHANNEL",
                    url,
                )]]))
                .await?;
        }
        Err(_) => {
            request.await?;
        }
    }
    Ok(())
}

// --- Video ingest ---

async fn handle_video(
    bot: Bot,
    msg: Message,
    catalog: Arc<VideoCatalog>,
    allow_list: Arc<AllowList>,
) -> Result<(), BotError> {
    // Either a video with a caption, or a text reply to a video.
    let (video, raw_caption) = match (msg.video(), msg.caption()) {
        (Some(video), Some(caption)) => (video, caption),
        _ => match (msg.reply_to_message().and_then(|reply| reply.video()), msg.text()) {
            (Some(video), Some(caption)) => (video, caption),
            _ => {
                bot.send_message(
                    msg.chat.id,
                    "To save a video, either:\n\
                     1. Send a video with a caption.\n\
                     2. Reply to a video with the caption you want to use.",
                )
                .await?;
                return Ok(());
            }
        },
    };

    if normalize(raw_caption).is_empty() {
        bot.send_message(msg.chat.id, "Please provide a caption for the video.").await?;
        return Ok(());
    }

    let submission = NewVideo {
        file_id: video.file.id.clone(),
        file_unique_id: video.file.unique_id.clone(),
        caption: raw_caption.to_string(),
        size_bytes: i64::from(video.file.size),
    };
    let submitter = msg.from.as_ref().and_then(|user| user.username.as_deref());

    match ingest(&catalog, submission).await {
        Ok(IngestOutcome::Stored(record)) => {
            log::info!("stored video {}: {}", record.id, record.caption);
            bot.send_message(msg.chat.id, "✅ Video saved.").await?;
        }
        Ok(IngestOutcome::Duplicate) => {
            log::info!("dropped duplicate video submission");
            if allow_list.permits(submitter, Action::ReceiveDuplicateAck) {
                bot.send_message(msg.chat.id, "This video already exists in the catalog.")
                    .await?;
            }
        }
        Err(err) => {
            log::error!("failed to store video: {err}");
            bot.send_message(msg.chat.id, "Failed to save the video. Please try again later.")
                .await?;
        }
    }
    Ok(())
}

// --- Callbacks ---

async fn handle_callback(
    bot: Bot,
    q: CallbackQuery,
    catalog: Arc<VideoCatalog>,
) -> Result<(), BotError> {
    if let Some(data) = q.data.clone() {
        if let Some(raw_id) = data.strip_prefix("watch_") {
            handle_watch(&bot, &q, &catalog, raw_id).await?;
        } else if let Some(raw_page) = data.strip_prefix("next_") {
            handle_page_turn(&bot, &q, &catalog, raw_page, 1).await?;
        } else if let Some(raw_page) = data.strip_prefix("prev_") {
            handle_page_turn(&bot, &q, &catalog, raw_page, -1).await?;
        }
    }
    bot.answer_callback_query(q.id).await?;
    Ok(())
}

fn callback_chat(q: &CallbackQuery) -> ChatId {
    q.message.as_ref().map(|m| m.chat().id).unwrap_or(ChatId(q.from.id.0 as i64))
}

async fn handle_watch(
    bot: &Bot,
    q: &CallbackQuery,
    catalog: &VideoCatalog,
    raw_id: &str,
) -> Result<(), BotError> {
    let chat_id = callback_chat(q);
    let Ok(id) = raw_id.parse::<i64>() else {
        bot.send_message(chat_id, "Video not found.").await?;
        return Ok(());
    };
    match catalog.find_by_id(id).await {
        Ok(Some(video)) => {
            bot.send_video(chat_id, InputFile::file_id(video.file_id))
                .caption(branded(&video.caption))
                .await?;
        }
        Ok(None) => {
            bot.send_message(chat_id, "Video not found.").await?;
        }
        Err(err) => {
            log::error!("failed to load video {id}: {err}");
            bot.send_message(chat_id, "Failed to load the video. Please try again later.")
                .await?;
        }
    }
    Ok(())
}

async fn handle_page_turn(
    bot: &Bot,
    q: &CallbackQuery,
    catalog: &VideoCatalog,
    raw_page: &str,
    step: i64,
) -> Result<(), BotError> {
    let Some(MaybeInaccessibleMessage::Regular(message)) = q.message.as_ref() else {
        return Ok(());
    };
    let Some(query) = message.text().and_then(extract_query) else { return Ok(()) };
    let Ok(current) = raw_page.parse::<i64>() else { return Ok(()) };
    let target = current + step;
    if target < 1 {
        return Ok(());
    }
    let Ok(pattern) = Pattern::build(query) else { return Ok(()) };

    let matches = match catalog.search(&pattern).await {
        Ok(matches) => matches,
        Err(err) => {
            log::error!("failed to re-run search for page turn: {err}");
            return Ok(());
        }
    };

    // The match set is re-derived from the live catalog, so this page can
    // differ from what the old page numbers were computed against.
    let Some(page) = paginate(&matches, target as usize) else { return Ok(()) };
    bot.edit_message_text(message.chat.id, message.id, result_text(pattern.text(), &page))
        .reply_markup(keyboard(&page))
        .await?;
    Ok(())
}

async fn handle_rewrite_captions(
    bot: &Bot,
    msg: &Message,
    catalog: &VideoCatalog,
    allow_list: &AllowList,
    rewriter: Option<&CaptionRewriter>,
) -> Result<(), BotError> {
    let submitter = msg.from.as_ref().and_then(|user| user.username.as_deref());
    if !allow_list.permits(submitter, Action::RewriteCaptions) {
        bot.send_message(msg.chat.id, "You are not allowed to do that.").await?;
        return Ok(());
    }
    let Some(rewriter) = rewriter else {
        bot.send_message(msg.chat.id, "Caption rewriting is not configured.").await?;
        return Ok(());
    };

    bot.send_message(msg.chat.id, "Rewriting captions, this can take a while...").await?;
    match rewrite_all(catalog, rewriter).await {
        Ok(summary) => {
            bot.send_message(
                msg.chat.id,
                format!("Rewrote {} of {} captions.", summary.rewritten, summary.total),
            )
            .await?;
        }
        Err(err) => {
            log::error!("bulk caption rewrite failed to read the catalog: {err}");
            bot.send_message(msg.chat.id, TRY_AGAIN_CATALOG).await?;
        }
    }
    Ok(())
}
