//! Decoding provider replies into extraction results.

use serde::Deserialize;
use serde_json::{Map, Value};

use super::{ExtractionError, Result};
use crate::records::ExtractionResult;

/// The subset of a chat-completions response the relay reads.
#[derive(Debug, Deserialize)]
struct ChatCompletion {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: Option<ChoiceMessage>,
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
    content: Option<MessageContent>,
    refusal: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum MessageContent {
    Text(String),
    Parts(Vec<ContentPart>),
}

#[derive(Debug, Deserialize)]
struct ContentPart {
    #[serde(rename = "type")]
    kind: String,
    text: Option<String>,
}

/// Pull the text of the first choice out of a chat-completions response body.
///
/// Any deviation from `choices[0].message.content` being non-empty text is reported as
/// [`ExtractionError::UnexpectedShape`], including refusals and empty choice lists.
pub fn decode_reply(body: &str) -> Result<String> {
    let completion: ChatCompletion = serde_json::from_str(body)
        .map_err(|e| ExtractionError::UnexpectedShape(format!("response is not a chat completion ({e}): {body}")))?;

    if completion.choices.len() > 1 {
        tracing::debug!(choices = completion.choices.len(), "Provider returned several choices, using the first");
    }

    let choice = completion
        .choices
        .into_iter()
        .next()
        .ok_or_else(|| ExtractionError::UnexpectedShape("response has no choices".to_string()))?;

    let message = choice.message.ok_or_else(|| {
        ExtractionError::UnexpectedShape(format!(
            "first choice has no message (finish_reason: {})",
            choice.finish_reason.as_deref().unwrap_or("none")
        ))
    })?;

    if let Some(refusal) = message.refusal.filter(|r| !r.is_empty()) {
        return Err(ExtractionError::UnexpectedShape(format!("model refused: {refusal}")));
    }

    let text = match message.content {
        Some(MessageContent::Text(text)) => text,
        Some(MessageContent::Parts(parts)) => parts
            .into_iter()
            .filter(|part| part.kind == "text")
            .filter_map(|part| part.text)
            .collect::<Vec<_>>()
            .join(""),
        None => String::new(),
    };

    if text.trim().is_empty() {
        return Err(ExtractionError::UnexpectedShape("reply has no text content".to_string()));
    }

    Ok(text)
}

/// Remove a surrounding markdown code fence (```` ```json ```` or bare ```` ``` ````), if any.
pub fn strip_code_fence(text: &str) -> &str {
    let mut text = text.trim();
    if let Some(rest) = text.strip_prefix("```") {
        // Drop the info string (e.g. `json`) up to the end of the opening line
        text = match rest.find('\n') {
            Some(newline) if rest[..newline].trim().chars().all(|c| c.is_ascii_alphanumeric()) => &rest[newline + 1..],
            _ => match rest.get(..4) {
                Some(label) if label.eq_ignore_ascii_case("json") => &rest[4..],
                _ => rest,
            },
        };
    }
    if let Some(rest) = text.trim_end().strip_suffix("```") {
        text = rest;
    }
    text.trim()
}

/// Parse a model reply into an extraction result.
///
/// On failure the error carries the whole reply, unmodified, for diagnosis.
pub fn parse_extraction(reply: &str) -> Result<ExtractionResult> {
    let cleaned = strip_code_fence(reply);
    let fields: Map<String, Value> = serde_json::from_str(cleaned).map_err(|source| ExtractionError::InvalidJson {
        raw: reply.to_string(),
        source,
    })?;
    Ok(ExtractionResult::new(fields))
}
