//! Endpoint handlers and their request/response shapes.
//!
//! Handlers validate input, call one of the two upstream clients through the
//! shared [`AppState`], and map domain errors onto HTTP statuses. No state
//! outlives a request.

use std::sync::Arc;

use actix_web::{HttpResponse, web};
use chrono::Utc;
use serde::Deserialize;
use serde_json::json;

use assistant_core::{
    ChatTurn, Error, GenerationRequest, LocationQuery, TextGenerator, TranslateMessage,
    WeatherProvider, WeatherSnapshot,
};

use crate::prompts;

const DEFAULT_LANG: &str = "en";

/// Upstream clients shared by all handlers, injected once at startup.
pub struct AppState {
    pub weather: Arc<dyn WeatherProvider>,
    pub genai: Arc<dyn TextGenerator>,
}

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.route("/health", web::get().to(health))
        .route("/api/weather", web::get().to(weather_get))
        .route("/api/weather", web::post().to(weather_post))
        .route("/api/extract-city", web::post().to(extract_city))
        .route("/api/chat", web::post().to(chat))
        .route("/api/translate", web::post().to(translate))
        .default_service(web::route().to(not_found));
}

/// Log the failure detail, answer with the generic message only.
fn error_response(err: &Error) -> HttpResponse {
    log::warn!("request failed: {err:?}");
    let body = json!({ "error": err.to_string() });
    match err {
        Error::InvalidRequest(_) => HttpResponse::BadRequest().json(body),
        Error::NotFound => HttpResponse::NotFound().json(body),
        Error::UpstreamUnavailable(_) | Error::GenerationFailed(_) => {
            HttpResponse::InternalServerError().json(body)
        }
    }
}

async fn health() -> HttpResponse {
    HttpResponse::Ok().json(json!({
        "status": "ok",
        "timestamp": Utc::now().to_rfc3339(),
    }))
}

async fn not_found() -> HttpResponse {
    HttpResponse::NotFound().json(json!({ "error": "not found" }))
}

/// Accepted as query parameters on GET and as a JSON body on POST.
#[derive(Debug, Default, Deserialize)]
pub struct WeatherParams {
    city: Option<String>,
    /// Alias for `city` kept for older front-end builds.
    q: Option<String>,
    lat: Option<f64>,
    lon: Option<f64>,
    lang: Option<String>,
}

impl WeatherParams {
    fn location(&self) -> Result<LocationQuery, Error> {
        if let Some(city) = self.city.as_deref().or(self.q.as_deref()) {
            let city = city.trim();
            if !city.is_empty() {
                return Ok(LocationQuery::City(city.to_string()));
            }
        }
        if let (Some(lat), Some(lon)) = (self.lat, self.lon) {
            return Ok(LocationQuery::Coords { lat, lon });
        }
        Err(Error::InvalidRequest("missing city or coordinates".into()))
    }

    fn lang(&self) -> &str {
        self.lang.as_deref().map(str::trim).filter(|l| !l.is_empty()).unwrap_or(DEFAULT_LANG)
    }
}

async fn weather_get(state: web::Data<AppState>, params: web::Query<WeatherParams>) -> HttpResponse {
    lookup_weather(&state, &params).await
}

async fn weather_post(state: web::Data<AppState>, params: web::Json<WeatherParams>) -> HttpResponse {
    lookup_weather(&state, &params).await
}

async fn lookup_weather(state: &AppState, params: &WeatherParams) -> HttpResponse {
    // Validation happens before any upstream call.
    let location = match params.location() {
        Ok(location) => location,
        Err(err) => return error_response(&err),
    };

    match state.weather.fetch(&location, params.lang()).await {
        Ok(snapshot) => HttpResponse::Ok().json(snapshot),
        Err(err) => error_response(&err),
    }
}

#[derive(Debug, Deserialize)]
pub struct ExtractCityBody {
    query: Option<String>,
    /// Alias for `query`.
    text: Option<String>,
}

async fn extract_city(
    state: web::Data<AppState>,
    body: web::Json<ExtractCityBody>,
) -> HttpResponse {
    let query = body.query.as_deref().or(body.text.as_deref()).map(str::trim).unwrap_or("");
    if query.is_empty() {
        return error_response(&Error::InvalidRequest("missing query text".into()));
    }

    let request = GenerationRequest::new(prompts::city_extraction_prompt(query));
    match state.genai.generate(&request).await {
        // A "no city" verdict is a valid answer, not an error.
        Ok(reply) => {
            let city = reply.as_deref().and_then(prompts::normalize_city_reply);
            HttpResponse::Ok().json(json!({ "city": city }))
        }
        Err(err) => error_response(&err),
    }
}

#[derive(Debug, Deserialize)]
pub struct ChatBody {
    message: Option<String>,
    weather: Option<WeatherSnapshot>,
    history: Option<Vec<ChatTurn>>,
    language: Option<String>,
}

async fn chat(state: web::Data<AppState>, body: web::Json<ChatBody>) -> HttpResponse {
    let message = body.message.as_deref().map(str::trim).unwrap_or("");
    if message.is_empty() {
        return error_response(&Error::InvalidRequest("missing message".into()));
    }

    let language =
        body.language.as_deref().map(str::trim).filter(|l| !l.is_empty()).unwrap_or(DEFAULT_LANG);
    let system = prompts::chat_system_prompt(
        body.weather.as_ref(),
        body.history.as_deref().unwrap_or(&[]),
        language,
    );

    let request = GenerationRequest::new(message).with_system_instruction(system);
    match state.genai.generate(&request).await {
        Ok(Some(text)) => HttpResponse::Ok().json(json!({ "text": text })),
        Ok(None) => {
            error_response(&Error::GenerationFailed("upstream returned no candidate".into()))
        }
        Err(err) => error_response(&err),
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TranslateBody {
    #[serde(default)]
    messages: Vec<TranslateMessage>,
    target_lang_name: Option<String>,
}

async fn translate(state: web::Data<AppState>, body: web::Json<TranslateBody>) -> HttpResponse {
    if body.messages.is_empty() {
        return error_response(&Error::InvalidRequest("no messages to translate".into()));
    }
    let target =
        body.target_lang_name.as_deref().map(str::trim).filter(|t| !t.is_empty()).unwrap_or("");
    if target.is_empty() {
        return error_response(&Error::InvalidRequest("missing target language".into()));
    }

    let request = GenerationRequest::new(prompts::translation_prompt(&body.messages, target))
        .with_json_output();
    match state.genai.generate(&request).await {
        Ok(Some(reply)) => match serde_json::from_str::<serde_json::Value>(&reply) {
            // The mapping is relayed as-is; its shape is the caller's concern.
            Ok(mapping) => HttpResponse::Ok().json(mapping),
            Err(e) => error_response(&Error::GenerationFailed(format!(
                "unparseable structured reply: {e}"
            ))),
        },
        Ok(None) => {
            error_response(&Error::GenerationFailed("upstream returned no candidate".into()))
        }
        Err(err) => error_response(&err),
    }
}
