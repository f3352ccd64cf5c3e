//! Prompt assembly for the generation endpoints, plus the post-processing
//! applied to model replies before they reach the caller.

use assistant_core::model::{ChatTurn, TranslateMessage, WeatherSnapshot};

/// Sentinel the extraction prompt asks for when no place is mentioned.
const NO_CITY_SENTINEL: &str = "NONE";

pub fn city_extraction_prompt(query: &str) -> String {
    format!(
        "Extract the city or place name the user is asking about from the \
         message below. Answer with the bare name only, no punctuation and no \
         explanation. If no city or place is mentioned, answer exactly \
         {NO_CITY_SENTINEL}.\n\nMessage: {query}"
    )
}

pub fn chat_system_prompt(
    weather: Option<&WeatherSnapshot>,
    history: &[ChatTurn],
    language: &str,
) -> String {
    let mut prompt = String::from(
        "You are a friendly assistant for a weather chat application. \
         Answer questions using the weather data provided and keep replies \
         short and conversational.\n\n",
    );

    match weather.and_then(|w| serde_json::to_string(w).ok()) {
        Some(json) => {
            prompt.push_str("Current weather:\n");
            prompt.push_str(&json);
            prompt.push('\n');
        }
        None => prompt.push_str("No weather data is available for this conversation.\n"),
    }

    if !history.is_empty() {
        prompt.push_str("\nConversation so far:\n");
        for turn in history {
            prompt.push_str(turn.role.transcript_label());
            prompt.push_str(": ");
            prompt.push_str(&turn.text);
            prompt.push('\n');
        }
    }

    prompt.push_str(&format!("\nReply in {language}."));
    prompt
}

pub fn translation_prompt(messages: &[TranslateMessage], target_lang_name: &str) -> String {
    let mut prompt = format!(
        "Translate each of the following messages into {target_lang_name}. \
         Return a single JSON object mapping each message id to its \
         translation, with no other text.\n\n"
    );
    for message in messages {
        prompt.push_str(&message.id);
        prompt.push_str(": ");
        prompt.push_str(&message.text);
        prompt.push('\n');
    }
    prompt
}

/// Clean up a city-extraction reply: trim, strip one layer of surrounding
/// quotes, and map the sentinel or an empty reply to `None`.
pub fn normalize_city_reply(reply: &str) -> Option<String> {
    let trimmed = reply
        .trim()
        .trim_matches(|c: char| {
            matches!(c, '"' | '\'' | '\u{201c}' | '\u{201d}' | '\u{2018}' | '\u{2019}')
        })
        .trim();

    if trimmed.is_empty() || trimmed.eq_ignore_ascii_case(NO_CITY_SENTINEL) {
        None
    } else {
        Some(trimmed.to_string())
    }
}
