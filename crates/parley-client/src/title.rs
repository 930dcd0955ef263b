/// Longest title kept verbatim; longer ones are cut and suffixed.
pub const TITLE_MAX_CHARS: usize = 50;

const ELLIPSIS: &str = "...";
const UNTITLED: &str = "New Chat";

/// Title for a chat, taken from its first user message.
///
/// Counts characters, not bytes, so multi-byte text is never split inside a
/// character.
pub fn derive_title(first_message: &str) -> String {
    let source = first_message.trim();
    if source.is_empty() {
        return UNTITLED.to_owned();
    }
    match source.char_indices().nth(TITLE_MAX_CHARS) {
        Some((cut, _)) => format!("{}{ELLIPSIS}", source[..cut].trim_end()),
        None => source.to_owned(),
    }
}
