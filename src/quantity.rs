use rand::Rng;

use crate::constants::{CARDINAL_WORDS, MAX_RECIPES, MIN_RECIPES, NUMERAL};

/// Extracts how many recipes the user asked for, or 0 when the text doesn't say.
///
/// Spelled-out Spanish cardinals win over digits. Among words, the first entry of
/// the word table that appears anywhere in the text is returned, regardless of
/// where it occurs. Digits are limited to one or two (1-99).
pub fn parse_requested_count(text: &str) -> u32 {
    if text.trim().is_empty() {
        return 0;
    }

    let lower = text.to_lowercase();

    for (pattern, value) in CARDINAL_WORDS.iter() {
        if pattern.is_match(&lower) {
            return *value;
        }
    }

    NUMERAL
        .captures(&lower)
        .and_then(|caps| caps.get(1))
        .and_then(|m| m.as_str().parse().ok())
        .unwrap_or(0)
}

/// How the final count relates to what the user asked for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CountNote {
    /// Nothing requested; a random count was picked.
    Defaulted,
    /// Requested more than the maximum.
    Capped { requested: u32 },
    /// Requested less than the minimum.
    Raised,
    AsRequested,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CountDecision {
    pub count: u32,
    pub note: CountNote,
}

impl CountDecision {
    /// Acknowledgment sent to the chat before generation starts.
    pub fn ack_message(&self) -> String {
        match self.note {
            CountNote::Defaulted => format!(
                "Recibí tus ingredientes. Generando {} receta(s)...",
                self.count
            ),
            CountNote::Capped { requested } => format!(
                "Pediste {} recetas. Generaré un máximo de {} recetas.",
                requested, MAX_RECIPES
            ),
            CountNote::Raised => format!(
                "Cantidad solicitada inválida. Generaré {} receta.",
                MIN_RECIPES
            ),
            CountNote::AsRequested => {
                format!("Generaré {} receta(s) como pediste.", self.count)
            }
        }
    }
}

/// Applies the count policy to a parsed request (0 meaning unspecified).
pub fn resolve_count<R: Rng>(requested: u32, rng: &mut R) -> CountDecision {
    if requested == 0 {
        return CountDecision {
            count: rng.gen_range(MIN_RECIPES..=MAX_RECIPES),
            note: CountNote::Defaulted,
        };
    }

    if requested > MAX_RECIPES {
        CountDecision {
            count: MAX_RECIPES,
            note: CountNote::Capped { requested },
        }
    } else if requested < MIN_RECIPES {
        CountDecision {
            count: MIN_RECIPES,
            note: CountNote::Raised,
        }
    } else {
        CountDecision {
            count: requested,
            note: CountNote::AsRequested,
        }
    }
}

/// Clamps any count into the supported range.
pub fn clamp_count(count: u32) -> u32 {
    count.clamp(MIN_RECIPES, MAX_RECIPES)
}
