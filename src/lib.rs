pub mod bot;
pub mod config;
pub mod constants;
pub mod extract;
pub mod format;
pub mod generation;
pub mod quantity;
pub mod telegram;
pub mod web_server;

use serde::{Deserialize, Deserializer, Serialize};

/// One cooking suggestion returned by the model.
///
/// Missing or `null` text fields default to empty strings and scalar values are
/// read as their text, rather than failing the whole batch; unknown fields are
/// ignored.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Recipe {
    #[serde(default, deserialize_with = "lenient_text")]
    pub title: String,
    #[serde(default, deserialize_with = "lenient_text")]
    pub description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_prompt: Option<String>,
}

impl Recipe {
    pub fn new(title: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            description: description.into(),
            image_prompt: None,
        }
    }
}

fn lenient_text<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    let value = serde_json::Value::deserialize(deserializer)?;
    Ok(extract::value_as_text(&value))
}
