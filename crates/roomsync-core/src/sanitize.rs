//! Plain-text sanitization for user supplied strings.
//!
//! Normalizes line endings, trims, strips invisible or hostile code points
//! and caps the length in characters.

use unicode_general_category::{GeneralCategory, get_general_category};

/// Maximum user name length in characters.
pub const MAX_USER_NAME_LEN: usize = 32;
/// Maximum room name length in characters.
pub const MAX_ROOM_NAME_LEN: usize = 64;
/// Maximum chat message length in characters.
pub const MAX_CHAT_MESSAGE_LEN: usize = 2000;
/// Maximum clipboard text length in characters.
pub const MAX_CLIPBOARD_TEXT_LEN: usize = 4000;
/// Maximum invite message length in characters.
pub const MAX_INVITE_MESSAGE_LEN: usize = 280;

/// Sanitize `input` and truncate to `max_len` characters (0 = no cap).
///
/// Removes control characters except LF and TAB, format characters
/// (zero-width, bidi overrides), private-use code points and Unicode
/// non-characters.
pub fn plain_text(input: &str, max_len: usize) -> String {
    let normalized = input.replace("\r\n", "\n").replace('\r', "\n");

    let cleaned = normalized.trim().chars().filter(|&c| !is_stripped(c));

    if max_len > 0 { cleaned.take(max_len).collect() } else { cleaned.collect() }
}

/// Sanitize a user name.
pub fn user_name(name: &str) -> String {
    plain_text(name, MAX_USER_NAME_LEN)
}

/// Sanitize a room name.
pub fn room_name(name: &str) -> String {
    plain_text(name, MAX_ROOM_NAME_LEN)
}

/// Sanitize a chat message.
pub fn chat_message(message: &str) -> String {
    plain_text(message, MAX_CHAT_MESSAGE_LEN)
}

/// Sanitize clipboard text.
pub fn clipboard_text(text: &str) -> String {
    plain_text(text, MAX_CLIPBOARD_TEXT_LEN)
}

/// Sanitize an invite message.
pub fn invite_message(message: &str) -> String {
    plain_text(message, MAX_INVITE_MESSAGE_LEN)
}

fn is_stripped(c: char) -> bool {
    if c == '\n' || c == '\t' {
        return false;
    }

    match get_general_category(c) {
        GeneralCategory::Control | GeneralCategory::Format | GeneralCategory::PrivateUse => true,
        _ => is_non_character(u32::from(c)),
    }
}

fn is_non_character(cp: u32) -> bool {
    (0xFDD0..=0xFDEF).contains(&cp) || cp & 0xFFFE == 0xFFFE
}
