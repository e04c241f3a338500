// Outbound message rendering for Telegram's MarkdownV2 parse mode.

use crate::constants::{ELLIPSIS, MAX_MESSAGE_CHARS};
use crate::Recipe;

const RESERVED: &[char] = &[
    '\\', '_', '*', '[', ']', '(', ')', '~', '`', '>', '#', '+', '-', '=', '|', '{', '}', '.', '!',
];

/// Escapes every MarkdownV2 reserved character with a backslash.
pub fn escape_markdown_v2(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        if RESERVED.contains(&c) {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

/// Renders a recipe as a bold title followed by its description.
pub fn format_recipe(recipe: &Recipe) -> String {
    let body = format!(
        "*{}*\n\n{}",
        escape_markdown_v2(&recipe.title),
        escape_markdown_v2(&recipe.description)
    );
    truncate_message(&body)
}

/// Limits a message to `MAX_MESSAGE_CHARS` characters, ending it with an ellipsis when cut.
pub fn truncate_message(text: &str) -> String {
    if text.chars().count() <= MAX_MESSAGE_CHARS {
        return text.to_string();
    }

    let mut cut: String = text.chars().take(MAX_MESSAGE_CHARS - 1).collect();

    // An odd run of trailing backslashes means we split an escape pair.
    let trailing = cut.chars().rev().take_while(|c| *c == '\\').count();
    if trailing % 2 == 1 {
        cut.pop();
    }

    cut.push(ELLIPSIS);
    cut
}
