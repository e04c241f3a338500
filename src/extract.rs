//! Recovery of recipes from free-form model responses.
//!
//! Models are asked for a bare JSON array but routinely wrap it in prose, so the
//! parsing here is deliberately lenient: find the model's text inside whatever
//! envelope the provider returned, then slice out the outermost `[...]`.

use serde_json::Value;
use thiserror::Error;
use tracing::debug;

use crate::Recipe;

#[derive(Debug, Error)]
#[error("could not extract a JSON recipe array from the model output: {raw}")]
pub struct ParseError {
    /// The model text the extraction was attempted on.
    pub raw: String,
}

/// Turns a raw response body into recipes.
pub trait RecipeExtractor: Send + Sync {
    fn extract(&self, response_body: &str) -> Result<Vec<Recipe>, ParseError>;
}

/// Bracket-slicing extractor for providers that return recipes as loose text.
#[derive(Debug, Default, Clone, Copy)]
pub struct TolerantJsonExtractor;

impl RecipeExtractor for TolerantJsonExtractor {
    fn extract(&self, response_body: &str) -> Result<Vec<Recipe>, ParseError> {
        let model_text = extract_model_text(response_body);
        parse_recipes(&model_text)
    }
}

/// Finds the generated text inside a provider response.
///
/// Looks at `output[0].content[*]`, `output[0].text`, `generated_text`, `result`
/// and a bare JSON string, in that order. Anything else (including a body that
/// isn't JSON at all) is returned unchanged.
pub fn extract_model_text(response_body: &str) -> String {
    let root: Value = match serde_json::from_str(response_body) {
        Ok(root) => root,
        Err(e) => {
            debug!("Response body is not JSON ({}), using it as model text", e);
            return response_body.to_string();
        }
    };

    if let Some(first) = root
        .get("output")
        .and_then(Value::as_array)
        .and_then(|output| output.first())
    {
        if let Some(parts) = first.get("content").and_then(Value::as_array) {
            let joined: String = parts.iter().filter_map(content_part_text).collect();
            let joined = joined.trim();
            if !joined.is_empty() {
                return joined.to_string();
            }
        }
        if let Some(text) = first.get("text") {
            return value_as_text(text);
        }
    }

    if let Some(text) = root.get("generated_text") {
        return value_as_text(text);
    }
    if let Some(text) = root.get("result") {
        return value_as_text(text);
    }
    if let Value::String(text) = &root {
        return text.clone();
    }

    response_body.to_string()
}

fn content_part_text(part: &Value) -> Option<String> {
    if let Some(text) = part.get("text") {
        return Some(value_as_text(text));
    }
    if let Value::String(text) = part {
        return Some(text.clone());
    }
    match (part.get("type"), part.get("content")) {
        (Some(_), Some(Value::String(content))) => Some(content.clone()),
        _ => None,
    }
}

// Scalars render as their JSON text; containers and null render empty.
pub(crate) fn value_as_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Null | Value::Array(_) | Value::Object(_) => String::new(),
    }
}

/// Parses recipes out of model text.
///
/// The span from the first `[` to the last `]` is parsed as an array. Without such
/// a span the whole text is tried as a single recipe object.
pub fn parse_recipes(model_text: &str) -> Result<Vec<Recipe>, ParseError> {
    let parse_error = || ParseError {
        raw: model_text.to_string(),
    };

    match (model_text.find('['), model_text.rfind(']')) {
        (Some(start), Some(end)) if end > start => {
            serde_json::from_str::<Vec<Recipe>>(&model_text[start..=end]).map_err(|e| {
                debug!("Bracketed span is not a recipe array: {}", e);
                parse_error()
            })
        }
        _ => serde_json::from_str::<Recipe>(model_text.trim())
            .map(|recipe| vec![recipe])
            .map_err(|e| {
                debug!("Model text is not a single recipe object: {}", e);
                parse_error()
            }),
    }
}
