//! Text helpers shared by the bot layer.

use unicode_segmentation::UnicodeSegmentation;

/// Telegram's hard limit on message length.
pub const MAX_MESSAGE_LEN: usize = 4096;

/// Splits a long message into parts that fit within Telegram's limit.
///
/// Splits at line boundaries where possible; a single line longer than
/// `max_length` is split by grapheme clusters so multi-byte characters
/// never get cut in half. Parts come back in order and concatenate to
/// the original text (modulo the trimmed trailing newlines).
#[must_use]
pub fn split_message(message: &str, max_length: usize) -> Vec<String> {
    if message.is_empty() {
        return Vec::new();
    }
    if message.len() <= max_length {
        return vec![message.to_string()];
    }

    let mut parts = Vec::new();
    let mut current = String::new();

    for line in message.lines() {
        if line.len() > max_length {
            if !current.is_empty() {
                parts.push(current.trim_end().to_string());
                current.clear();
            }
            let mut chunk = String::new();
            for grapheme in line.graphemes(true) {
                if chunk.len() + grapheme.len() > max_length {
                    parts.push(chunk.clone());
                    chunk.clear();
                }
                chunk.push_str(grapheme);
            }
            if !chunk.is_empty() {
                current.push_str(&chunk);
                current.push('\n');
            }
            continue;
        }

        if current.len() + line.len() + 1 > max_length && !current.is_empty() {
            parts.push(current.trim_end().to_string());
            current.clear();
        }
        current.push_str(line);
        current.push('\n');
    }

    if !current.is_empty() {
        parts.push(current.trim_end().to_string());
    }

    parts
}
