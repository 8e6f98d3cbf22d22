//! Optional AI caption formatting over the whole catalog.
//!
//! The external API is rate limited, so the bulk pass is a sequential loop
//! with a fixed one-second delay between items. One item's failure never
//! stops the loop; the summary is always reported.

use std::env;
use std::time::Duration;

use serde::Serialize;
use serde_json::Value;

use crate::catalog::VideoCatalog;
use crate::normalize::normalize;

/// Fixed delay between consecutive items honoring the external rate limit.
pub const ITEM_DELAY: Duration = Duration::from_secs(1);

const DEFAULT_MODEL: &str = "gpt-4o-mini";

const SYSTEM_PROMPT: &str = "You reformat Telegram movie captions. \
Return only the cleaned caption text with the title and year, nothing else.";

#[derive(Debug, thiserror::Error)]
pub enum RewriteError {
    #[error("rewrite request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("rewrite response carried no caption text")]
    MalformedResponse,
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: [ChatMessage<'a>; 2],
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

/// Client for an OpenAI-style chat completion endpoint.
pub struct CaptionRewriter {
    http: reqwest::Client,
    api_url: String,
    api_key: String,
    model: String,
}

impl CaptionRewriter {
    pub fn new(
        api_url: impl Into<String>,
        api_key: impl Into<String>,
        model: impl Into<String>,
    ) -> Self {
        Self {
            http: reqwest::Client::new(),
            api_url: api_url.into(),
            api_key: api_key.into(),
            model: model.into(),
        }
    }

    /// `None` when `REWRITE_API_URL`/`REWRITE_API_KEY` are not configured;
    /// the bot then runs without the rewrite command doing anything.
    pub fn from_env() -> Option<Self> {
        let api_url = env::var("REWRITE_API_URL").ok()?;
        let api_key = env::var("REWRITE_API_KEY").ok()?;
        let model = env::var("REWRITE_MODEL").unwrap_or_else(|_| DEFAULT_MODEL.to_string());
        Some(Self::new(api_url, api_key, model))
    }

    pub async fn rewrite(&self, caption: &str) -> Result<String, RewriteError> {
        let request = ChatRequest {
            model: &self.model,
            messages: [
                ChatMessage { role: "system", content: SYSTEM_PROMPT },
                ChatMessage { role: "user", content: caption },
            ],
        };
        let response: Value = self
            .http
            .post(&self.api_url)
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;
        let text = response["choices"][0]["message"]["content"]
            .as_str()
            .map(str::trim)
            .filter(|text| !text.is_empty())
            .ok_or(RewriteError::MalformedResponse)?;
        Ok(text.to_string())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RewriteSummary {
    pub rewritten: usize,
    pub total: usize,
}

/// Walks the whole catalog, rewriting and re-normalizing each caption.
pub async fn rewrite_all(
    catalog: &VideoCatalog,
    rewriter: &CaptionRewriter,
) -> sqlx::Result<RewriteSummary> {
    let records = catalog.all().await?;
    let total = records.len();
    let mut rewritten = 0;

    for (index, record) in records.into_iter().enumerate() {
        // The rate limit constrains consecutive requests; the first item and
        // the summary reply wait on nothing.
        if index > 0 {
            tokio::time::sleep(ITEM_DELAY).await;
        }
        match rewriter.rewrite(&record.caption).await {
            Ok(text) => {
                let caption = normalize(&text);
                if caption.is_empty() {
                    log::warn!(
                        "rewrite produced an empty caption for video {}, keeping the old one",
                        record.id
                    );
                } else {
                    match catalog.update_caption(record.id, &caption).await {
                        Ok(()) => rewritten += 1,
                        Err(err) => log::error!(
                            "failed to store rewritten caption for video {}: {err}",
                            record.id
                        ),
                    }
                }
            }
            Err(err) => log::error!("caption rewrite failed for video {}: {err}", record.id),
        }
    }

    Ok(RewriteSummary { rewritten, total })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{NewVideo, VideoCatalog};
    use tokio::time::Instant;

    fn unreachable_rewriter() -> CaptionRewriter {
        // Nothing listens on the discard port, so every rewrite fails fast.
        CaptionRewriter::new("http://127.0.0.1:9/v1/chat/completions", "test-key", "test-model")
    }

    async fn seeded_catalog(count: usize) -> VideoCatalog {
        let catalog = VideoCatalog::connect("sqlite::memory:").await.expect("in-memory catalog");
        for i in 0..count {
            catalog
                .insert(NewVideo {
                    file_id: format!("file{i}"),
                    file_unique_id: format!("unique{i}"),
                    caption: format!("Escape Plan part {i}"),
                    size_bytes: 1,
                })
                .await
                .expect("seed insert");
        }
        catalog
    }

    #[tokio::test]
    async fn bulk_pass_sleeps_between_items_not_after_the_last() {
        let catalog = seeded_catalog(2).await;
        let started = Instant::now();

        let summary =
            rewrite_all(&catalog, &unreachable_rewriter()).await.expect("summary despite failures");

        assert_eq!(summary, RewriteSummary { rewritten: 0, total: 2 });
        let elapsed = started.elapsed();
        assert!(elapsed >= ITEM_DELAY, "expected one inter-item delay, got {elapsed:?}");
        assert!(elapsed < ITEM_DELAY * 2, "no delay after the final item, got {elapsed:?}");
    }

    #[tokio::test]
    async fn empty_catalog_reports_immediately() {
        let catalog = seeded_catalog(0).await;
        let started = Instant::now();

        let summary = rewrite_all(&catalog, &unreachable_rewriter()).await.expect("summary");

        assert_eq!(summary, RewriteSummary { rewritten: 0, total: 0 });
        assert!(started.elapsed() < ITEM_DELAY, "nothing to throttle");
    }
}
