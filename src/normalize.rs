//! Caption normalization, applied to stored captions on ingest and reused
//! by the bulk caption rewriter before anything is written back.

/// The promotional handle every other mention collapses into.
pub const CANONICAL_HANDLE: &str = "@moviecastback";

/// Filler terms ignored when building a query pattern.
pub const STOPWORDS: &[&str] = &["movies", "webseries"];

fn is_canonical(token: &str) -> bool {
    token.eq_ignore_ascii_case(CANONICAL_HANDLE)
}

fn is_mention(token: &str) -> bool {
    token.starts_with('@') && token.len() > 1
}

/// Normalizes a raw caption into its stored/searchable form.
///
/// Drops URL tokens, strips everything except word characters, whitespace,
/// `@` and `.`, turns dots into spaces, collapses whitespace, and collapses
/// all mentions into a single [`CANONICAL_HANDLE`]. Idempotent:
/// `normalize(normalize(x)) == normalize(x)`.
pub fn normalize(raw: &str) -> String {
    let without_urls: String = raw
        .split_whitespace()
        .filter(|token| !token.contains("://"))
        .collect::<Vec<_>>()
        .join(" ");

    let filtered: String = without_urls
        .chars()
        .map(|c| if c == '.' { ' ' } else { c })
        .filter(|c| c.is_alphanumeric() || *c == '_' || *c == '@' || c.is_whitespace())
        .collect();

    let canonical_present = filtered.split_whitespace().any(is_canonical);

    let mut substituted = false;
    let mut words: Vec<&str> = Vec::new();
    for token in filtered.split_whitespace() {
        if is_mention(token) {
            if is_canonical(token) {
                // Already carries the promotional handle; keep it verbatim.
                words.push(token);
            } else if !canonical_present && !substituted {
                substituted = true;
                words.push(CANONICAL_HANDLE);
            }
            // Every other mention is dropped.
        } else {
            words.push(token);
        }
    }
    words.join(" ")
}

/// Delivery-time decoration: captions leaving the bot always advertise the
/// promotional handle. Not part of the stored form.
pub fn branded(caption: &str) -> String {
    if caption.split_whitespace().any(is_mention) {
        caption.to_string()
    } else {
        format!("{caption}\n\nJᴏɪɴ ➥「 {CANONICAL_HANDLE} 」")
    }
}
