//! Slices a match set into fixed-size pages and renders the inline keyboard
//! for one page. No pagination state is kept server-side: the original query
//! is recovered from the rendered message text and the match set re-derived
//! on every page turn.

use teloxide::types::{InlineKeyboardButton, InlineKeyboardMarkup};

use crate::catalog::VideoRecord;

pub const PAGE_SIZE: usize = 8;

/// Button labels keep captions at most this many characters.
const LABEL_CAPTION_CHARS: usize = 30;

pub fn total_pages(match_count: usize) -> usize {
    match_count.div_ceil(PAGE_SIZE)
}

/// One renderable page of a match set.
#[derive(Debug)]
pub struct Page<'a> {
    pub items: &'a [VideoRecord],
    pub number: usize,
    pub total: usize,
    pub match_count: usize,
}

impl Page<'_> {
    pub fn has_prev(&self) -> bool {
        self.number > 1
    }

    pub fn has_next(&self) -> bool {
        self.number < self.total
    }
}

/// Slices `matches` down to the requested page.
///
/// Out-of-range requests (page 0, past the end, or an empty match set) are
/// rejected with `None`; callers treat that as a no-op rather than rendering
/// an out-of-range slice.
pub fn paginate(matches: &[VideoRecord], page: usize) -> Option<Page<'_>> {
    let total = total_pages(matches.len());
    if page < 1 || page > total {
        return None;
    }
    let start = (page - 1) * PAGE_SIZE;
    let end = (start + PAGE_SIZE).min(matches.len());
    Some(Page { items: &matches[start..end], number: page, total, match_count: matches.len() })
}

pub fn bytes_to_mb(bytes: i64) -> String {
    if bytes == 0 {
        return "0 MB".to_string();
    }
    format!("{:.2} MB", bytes as f64 / (1024.0 * 1024.0))
}

pub fn truncate_caption(caption: &str) -> String {
    if caption.chars().count() <= LABEL_CAPTION_CHARS {
        return caption.to_string();
    }
    let head: String = caption.chars().take(LABEL_CAPTION_CHARS - 3).collect();
    format!("{head}...")
}

fn item_label(video: &VideoRecord) -> String {
    let caption = truncate_caption(&video.caption);
    if video.size_bytes > 0 {
        format!("[{}] {}", bytes_to_mb(video.size_bytes), caption)
    } else {
        caption
    }
}

/// One callback button per item, plus a Prev/Next row when applicable.
pub fn keyboard(page: &Page<'_>) -> InlineKeyboardMarkup {
    let mut rows: Vec<Vec<InlineKeyboardButton>> = page
        .items
        .iter()
        .map(|video| {
            vec![InlineKeyboardButton::callback(item_label(video), format!("watch_{}", video.id))]
        })
        .collect();

    let mut navigation = Vec::new();
    if page.has_prev() {
        navigation.push(InlineKeyboardButton::callback("Prev", format!("prev_{}", page.number)));
    }
    if page.has_next() {
        navigation.push(InlineKeyboardButton::callback("Next", format!("next_{}", page.number)));
    }
    if !navigation.is_empty() {
        rows.push(navigation);
    }

    InlineKeyboardMarkup::new(rows)
}

/// The message text above the keyboard. The quoted query is load-bearing:
/// [`extract_query`] recovers it on the next page turn.
pub fn result_text(query: &str, page: &Page<'_>) -> String {
    let found =
        format!("Found {} videos matching '{}'. Select one to watch:", page.match_count, query);
    if page.number == 1 {
        found
    } else {
        format!("Page {}/{}: {}", page.number, page.total, found)
    }
}

/// Recovers the query from a rendered result message. Safe because the
/// displayed query is the cleaned form, which cannot contain quotes.
pub fn extract_query(message_text: &str) -> Option<&str> {
    message_text.split('\'').nth(1)
}
