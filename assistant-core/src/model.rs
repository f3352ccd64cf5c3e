use serde::{Deserialize, Serialize};

/// Where to look the weather up. Exactly one form is ever present.
#[derive(Debug, Clone, PartialEq)]
pub enum LocationQuery {
    /// Free-form city name, e.g. "Tokyo" or "Paris,FR".
    City(String),
    Coords { lat: f64, lon: f64 },
}

/// Compact forecast summary shaped for the front-end. Derived per request,
/// never persisted.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WeatherSnapshot {
    pub location: String,
    /// Current temperature in °C, rounded to the nearest integer.
    pub temperature: i32,
    pub condition: String,
    pub humidity: u8,
    /// Wind speed in km/h, rounded.
    pub wind_kmh: i32,
    pub is_day: bool,
    /// Up to five entries, one per distinct day, in upstream order.
    pub forecast: Vec<DailyForecast>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DailyForecast {
    /// Localized weekday label, e.g. "Tuesday" or "mardi".
    pub day: String,
    pub temperature: i32,
    pub condition: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    User,
    Assistant,
}

impl ChatRole {
    pub fn transcript_label(self) -> &'static str {
        match self {
            ChatRole::User => "User",
            ChatRole::Assistant => "Assistant",
        }
    }
}

/// One prior turn of the conversation, sent by the front-end so the server
/// can rebuild a transcript. Nothing is stored between requests.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatTurn {
    pub role: ChatRole,
    pub text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<String>,
}

/// A message handed to the translation endpoint; `id` keys the result map.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TranslateMessage {
    pub id: String,
    pub text: String,
}

/// One call to the language-model upstream.
#[derive(Debug, Clone)]
pub struct GenerationRequest {
    pub prompt: String,
    pub system_instruction: Option<String>,
    /// Ask the upstream to constrain its reply to machine-parseable JSON.
    pub json_output: bool,
}

impl GenerationRequest {
    pub fn new(prompt: impl Into<String>) -> Self {
        Self { prompt: prompt.into(), system_instruction: None, json_output: false }
    }

    pub fn with_system_instruction(mut self, instruction: impl Into<String>) -> Self {
        self.system_instruction = Some(instruction.into());
        self
    }

    pub fn with_json_output(mut self) -> Self {
        self.json_output = true;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn snapshot_serializes_camel_case() {
        let snapshot = WeatherSnapshot {
            location: "Tokyo, JP".into(),
            temperature: 21,
            condition: "light rain".into(),
            humidity: 64,
            wind_kmh: 12,
            is_day: true,
            forecast: vec![DailyForecast {
                day: "Tuesday".into(),
                temperature: 22,
                condition: "clear sky".into(),
            }],
        };

        let json = serde_json::to_value(&snapshot).expect("snapshot must serialize");
        assert_eq!(json["windKmh"], 12);
        assert_eq!(json["isDay"], true);
        assert_eq!(json["forecast"][0]["day"], "Tuesday");
    }

    #[test]
    fn chat_role_round_trips_lowercase() {
        let turn: ChatTurn =
            serde_json::from_str(r#"{"role":"assistant","text":"hi"}"#).expect("turn must parse");
        assert_eq!(turn.role, ChatRole::Assistant);
        assert_eq!(turn.role.transcript_label(), "Assistant");
        assert!(turn.timestamp.is_none());
    }

    #[test]
    fn generation_request_builder() {
        let req = GenerationRequest::new("translate this")
            .with_system_instruction("be terse")
            .with_json_output();

        assert_eq!(req.prompt, "translate this");
        assert_eq!(req.system_instruction.as_deref(), Some("be terse"));
        assert!(req.json_output);
    }
}
