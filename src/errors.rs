/// Errors a handler can propagate to the dispatcher.
///
/// Only faults that leave the user without a reply end up here; everything
/// with a defined user-facing message (empty query, not-found, duplicate) is
/// answered inline and never becomes a `BotError`.
#[derive(Debug, thiserror::Error)]
pub enum BotError {
    #[error("telegram request failed: {0}")]
    Telegram(#[from] teloxide::RequestError),
    #[error("catalog query failed: {0}")]
    Catalog(#[from] sqlx::Error),
}
