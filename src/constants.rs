// Fixed defaults and compiled patterns shared across the bot.
// Runtime settings (tokens, keys, model) live in `config` and are passed in explicitly.

use regex::Regex;

pub const DEFAULT_ENDPOINT: &str = "https://openrouter.ai/api/v1/responses";
// Free-tier friendly default; override with OPENROUTER_MODEL.
pub const DEFAULT_MODEL: &str = "google/gemma-2-9b-it";
pub const DEFAULT_TELEGRAM_API: &str = "https://api.telegram.org";

pub const TEMPERATURE: f64 = 0.2;
pub const MAX_OUTPUT_TOKENS: u32 = 300;

pub const MIN_RECIPES: u32 = 1;
pub const MAX_RECIPES: u32 = 3;

/// Telegram rejects messages over 4096 characters; keep a margin.
pub const MAX_MESSAGE_CHARS: usize = 4000;
pub const ELLIPSIS: char = '…';

pub const USER_AGENT: &str = concat!("recipe-bot/", env!("CARGO_PKG_VERSION"));

lazy_static::lazy_static! {
    // Spanish cardinals, checked in this order. "un" is last among the 1s so
    // "una"/"uno" are tried first; the word boundary keeps "un" from matching "una".
    pub static ref CARDINAL_WORDS: Vec<(Regex, u32)> = [
        ("uno", 1),
        ("una", 1),
        ("un", 1),
        ("dos", 2),
        ("tres", 3),
        ("cuatro", 4),
        ("cinco", 5),
    ]
    .iter()
    .map(|(word, value)| {
        let pattern = format!(r"\b{}\b", regex::escape(word));
        (Regex::new(&pattern).expect("cardinal word pattern is valid"), *value)
    })
    .collect();

    pub static ref NUMERAL: Regex = Regex::new(r"\b([1-9][0-9]?)\b").expect("numeral pattern is valid");
}
