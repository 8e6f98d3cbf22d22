//! Authorization policy for role-gated behavior, injected at startup instead
//! of inline username comparisons.

use std::env;

/// Capabilities the policy can grant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    /// Hear an explicit "already exists" reply on a duplicate upload.
    /// Everyone else is silently dropped to keep upload channels quiet.
    ReceiveDuplicateAck,
    /// Run the bulk AI caption rewrite.
    RewriteCaptions,
}

/// The default submitter identities when `ADMIN_USERNAMES` is unset.
pub const DEFAULT_ADMINS: [&str; 2] = ["moviecastadmin", "moviecastuploads"];

#[derive(Debug, Clone)]
pub struct AllowList {
    usernames: Vec<String>,
}

impl AllowList {
    pub fn new(usernames: impl IntoIterator<Item = String>) -> Self {
        Self {
            usernames: usernames
                .into_iter()
                .map(|u| u.trim().trim_start_matches('@').to_string())
                .filter(|u| !u.is_empty())
                .collect(),
        }
    }

    /// Reads `ADMIN_USERNAMES` (comma-separated) or falls back to the
    /// built-in pair.
    pub fn from_env() -> Self {
        match env::var("ADMIN_USERNAMES") {
            Ok(raw) => Self::new(raw.split(',').map(str::to_string)),
            Err(_) => Self::new(DEFAULT_ADMINS.iter().map(|u| u.to_string())),
        }
    }

    /// Whether `username` may perform `action`. Anonymous submitters (no
    /// username) are never permitted. Every capability is currently granted
    /// by the same list; the action keeps call sites explicit.
    pub fn permits(&self, username: Option<&str>, _action: Action) -> bool {
        username
            .map(|name| {
                let name = name.trim_start_matches('@');
                self.usernames.iter().any(|allowed| allowed.eq_ignore_ascii_case(name))
            })
            .unwrap_or(false)
    }
}
