use std::ops::Range;
use std::sync::LazyLock;

use regex::Regex;

use crate::model::chat::ChatMessage;
use crate::model::user::User;

/// `.` and `-` only join word characters, so sentence punctuation after a
/// mention is not part of it
static MENTION_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"@([\p{L}\p{N}_]+(?:[.\-][\p{L}\p{N}_]+)*)").expect("valid mention regex")
});

/// A window of the newest messages of a channel
#[derive(Debug)]
pub struct ChatPage<'a> {
    /// Oldest first
    pub messages: Vec<&'a ChatMessage>,
    /// Older messages exist beyond this window
    pub has_more: bool,
}

/// Messages of one channel, oldest first
pub fn channel_messages<'a>(messages: &'a [ChatMessage], channel_id: &str) -> Vec<&'a ChatMessage> {
    let mut result: Vec<&ChatMessage> = messages
        .iter()
        .filter(|m| m.channel_id == channel_id)
        .collect();
    result.sort_by(|a, b| a.timestamp.cmp(&b.timestamp).then_with(|| a.id.cmp(&b.id)));
    result
}

/// The newest `loaded` messages, in chronological order
pub fn page<'a>(messages: &[&'a ChatMessage], loaded: usize) -> ChatPage<'a> {
    let start = messages.len().saturating_sub(loaded);
    ChatPage {
        messages: messages[start..].to_vec(),
        has_more: start > 0,
    }
}

/// Window size after one more "load more", capped at what exists
pub fn load_more(loaded: usize, page_size: usize, total: usize) -> usize {
    (loaded + page_size).min(total)
}

/// Byte ranges of every `@mention` token in the text
pub fn mention_spans(text: &str) -> Vec<Range<usize>> {
    MENTION_RE.find_iter(text).map(|m| m.start()..m.end()).collect()
}

fn mention_key(s: &str) -> String {
    s.chars()
        .filter(|c| !c.is_whitespace())
        .flat_map(char::to_lowercase)
        .collect()
}

/// Users mentioned in the text. A mention matches a user's id or their
/// name with spaces removed, ignoring case. Each user appears once.
pub fn extract_mentions<'a>(text: &str, users: &'a [User]) -> Vec<&'a User> {
    let mut found: Vec<&User> = Vec::new();
    for cap in MENTION_RE.captures_iter(text) {
        let token = mention_key(&cap[1]);
        if let Some(user) = users
            .iter()
            .find(|u| mention_key(&u.id) == token || mention_key(&u.name) == token)
            && !found.iter().any(|f| f.id == user.id)
        {
            found.push(user);
        }
    }
    found
}

/// Add `user_id`'s reaction, or remove it if already present.
/// Returns true when the reaction was added.
pub fn toggle_reaction(message: &mut ChatMessage, emoji: &str, user_id: &str) -> bool {
    let users = message.reactions.entry(emoji.to_string()).or_default();
    if let Some(pos) = users.iter().position(|u| u == user_id) {
        users.remove(pos);
        if users.is_empty() {
            message.reactions.shift_remove(emoji);
        }
        false
    } else {
        users.push(user_id.to_string());
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::user::Role;
    use chrono::{Duration, TimeZone, Utc};
    use indexmap::IndexMap;

    fn messages(n: usize) -> Vec<ChatMessage> {
        let t0 = Utc.with_ymd_and_hms(2025, 3, 1, 9, 0, 0).unwrap();
        (0..n)
            .map(|i| ChatMessage {
                id: format!("m{:02}", i),
                channel_id: if i % 2 == 0 { "general" } else { "edits" }.into(),
                author: "ana".into(),
                text: format!("message {}", i),
                timestamp: t0 + Duration::minutes(i as i64),
                reactions: IndexMap::new(),
            })
            .rev()
            .collect()
    }

    fn users() -> Vec<User> {
        vec![
            User {
                id: "ana".into(),
                name: "Ana Souza".into(),
                role: Role::Admin,
            },
            User {
                id: "bm".into(),
                name: "Bruno Mattos".into(),
                role: Role::Assistant,
            },
        ]
    }

    #[test]
    fn channel_is_chronological() {
        let all = messages(6);
        let general = channel_messages(&all, "general");
        let ids: Vec<_> = general.iter().map(|m| m.id.as_str()).collect();
        assert_eq!(ids, vec!["m00", "m02", "m04"]);
    }

    #[test]
    fn paging_keeps_newest() {
        let all = messages(20);
        let general = channel_messages(&all, "general");
        assert_eq!(general.len(), 10);

        let first = page(&general, 4);
        let ids: Vec<_> = first.messages.iter().map(|m| m.id.as_str()).collect();
        assert_eq!(ids, vec!["m12", "m14", "m16", "m18"]);
        assert!(first.has_more);

        let loaded = load_more(4, 4, general.len());
        assert_eq!(loaded, 8);
        let loaded = load_more(loaded, 4, general.len());
        assert_eq!(loaded, 10);
        let all_page = page(&general, loaded);
        assert_eq!(all_page.messages.len(), 10);
        assert!(!all_page.has_more);
    }

    #[test]
    fn oversized_window_is_whole_channel() {
        let all = messages(3);
        let general = channel_messages(&all, "general");
        let p = page(&general, 50);
        assert_eq!(p.messages.len(), 2);
        assert!(!p.has_more);
    }

    #[test]
    fn mentions_by_id_or_compact_name() {
        let users = users();
        let found = extract_mentions("ping @AnaSouza and @bm, also @bm again", &users);
        let ids: Vec<_> = found.iter().map(|u| u.id.as_str()).collect();
        assert_eq!(ids, vec!["ana", "bm"]);

        assert!(extract_mentions("mail me at x @ y, @nobody", &users).is_empty());
    }

    #[test]
    fn trailing_punctuation_ends_mention() {
        let users = users();
        let found = extract_mentions("thanks @ana. Next up: @bm-", &users);
        let ids: Vec<_> = found.iter().map(|u| u.id.as_str()).collect();
        assert_eq!(ids, vec!["ana", "bm"]);

        let text = "see @ana.souza, then @bm.";
        let spans = mention_spans(text);
        assert_eq!(&text[spans[0].clone()], "@ana.souza");
        assert_eq!(&text[spans[1].clone()], "@bm");
    }

    #[test]
    fn mention_spans_cover_tokens() {
        let text = "hi @ana!";
        let spans = mention_spans(text);
        assert_eq!(spans, vec![3..7]);
        assert_eq!(&text[spans[0].clone()], "@ana");
    }

    #[test]
    fn reactions_toggle() {
        let mut msg = messages(1).remove(0);
        assert!(toggle_reaction(&mut msg, "👍", "ana"));
        assert!(toggle_reaction(&mut msg, "👍", "bm"));
        assert_eq!(msg.reactions["👍"], vec!["ana", "bm"]);

        assert!(!toggle_reaction(&mut msg, "👍", "ana"));
        assert_eq!(msg.reactions["👍"], vec!["bm"]);
        assert!(!toggle_reaction(&mut msg, "👍", "bm"));
        assert!(msg.reactions.is_empty());
    }
}
