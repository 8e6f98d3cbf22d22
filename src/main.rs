use std::sync::Arc;

use teloxide::prelude::*;

use movie_cast_bot::auth::AllowList;
use movie_cast_bot::catalog::VideoCatalog;
use movie_cast_bot::config::BotConfig;
use movie_cast_bot::handlers;
use movie_cast_bot::rewrite::CaptionRewriter;

#[tokio::main]
async fn main() {
    dotenv::dotenv().ok();
    pretty_env_logger::init();
    log::info!("Starting movie cast bot...");

    let bot = Bot::from_env();
    let config = Arc::new(BotConfig::from_env());
    let catalog = Arc::new(
        VideoCatalog::connect(&config.database_url)
            .await
            .expect("failed to open the video catalog"),
    );
    let allow_list = Arc::new(AllowList::from_env());
    let rewriter = CaptionRewriter::from_env().map(Arc::new);
    if rewriter.is_none() {
        log::info!("caption rewriting is not configured (REWRITE_API_URL unset)");
    }

    Dispatcher::builder(bot, handlers::schema())
        .dependencies(dptree::deps![catalog, allow_list, rewriter, config])
        .enable_ctrlc_handler()
        .build()
        .dispatch()
        .await;
}
