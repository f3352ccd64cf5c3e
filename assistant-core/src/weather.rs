use async_trait::async_trait;
use chrono::{DateTime, Locale, Utc};
use reqwest::{Client, StatusCode};
use serde::Deserialize;

use crate::{
    error::{Error, Result},
    model::{DailyForecast, LocationQuery, WeatherSnapshot},
};

const DEFAULT_BASE_URL: &str = "https://api.openweathermap.org";

/// Maximum number of distinct days kept in the forecast summary.
const FORECAST_DAYS: usize = 5;

#[async_trait]
pub trait WeatherProvider: Send + Sync + std::fmt::Debug {
    async fn fetch(&self, query: &LocationQuery, lang: &str) -> Result<WeatherSnapshot>;
}

/// Client for the OpenWeather 5-day/3-hour forecast endpoint.
#[derive(Debug, Clone)]
pub struct OpenWeatherClient {
    api_key: Option<String>,
    base_url: String,
    http: Client,
}

impl OpenWeatherClient {
    pub fn new(api_key: Option<String>) -> Self {
        Self {
            api_key,
            base_url: DEFAULT_BASE_URL.to_string(),
            http: Client::new(),
        }
    }

    /// Point the client at a different upstream, e.g. a local stub in tests.
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    async fn fetch_forecast(&self, query: &LocationQuery, lang: &str) -> Result<FcResponse> {
        let Some(api_key) = self.api_key.as_deref() else {
            log::error!("weather lookup attempted without WEATHER_API_KEY configured");
            return Err(Error::UpstreamUnavailable("WEATHER_API_KEY is not configured".into()));
        };

        let url = format!("{}/data/2.5/forecast", self.base_url);

        let mut params: Vec<(&str, String)> = vec![
            ("appid", api_key.to_string()),
            ("units", "metric".to_string()),
            ("lang", lang.to_string()),
        ];
        match query {
            LocationQuery::City(name) => params.push(("q", name.clone())),
            LocationQuery::Coords { lat, lon } => {
                params.push(("lat", lat.to_string()));
                params.push(("lon", lon.to_string()));
            }
        }

        let res = self.http.get(&url).query(&params).send().await.map_err(|e| {
            log::warn!("weather forecast request failed to send: {e}");
            Error::UpstreamUnavailable(format!("request failed: {e}"))
        })?;

        let status = res.status();
        let body = res.text().await.map_err(|e| {
            log::warn!("failed to read weather forecast response body: {e}");
            Error::UpstreamUnavailable(format!("unreadable response body: {e}"))
        })?;

        if status == StatusCode::NOT_FOUND {
            log::info!("weather upstream reported location not found: {query:?}");
            return Err(Error::NotFound);
        }
        if !status.is_success() {
            log::warn!(
                "weather forecast request failed with status {status}: {}",
                truncate_body(&body)
            );
            return Err(Error::UpstreamUnavailable(format!("upstream status {status}")));
        }

        serde_json::from_str(&body).map_err(|e| {
            log::warn!("failed to parse weather forecast JSON: {e}: {}", truncate_body(&body));
            Error::UpstreamUnavailable(format!("malformed forecast payload: {e}"))
        })
    }
}

#[async_trait]
impl WeatherProvider for OpenWeatherClient {
    async fn fetch(&self, query: &LocationQuery, lang: &str) -> Result<WeatherSnapshot> {
        let parsed = self.fetch_forecast(query, lang).await?;
        snapshot_from_forecast(&parsed, locale_for(lang))
    }
}

#[derive(Debug, Deserialize)]
struct FcMain {
    temp: f64,
    humidity: u8,
}

#[derive(Debug, Deserialize)]
struct FcWeather {
    description: String,
}

#[derive(Debug, Deserialize)]
struct FcWind {
    speed: f64,
}

#[derive(Debug, Deserialize)]
struct FcSys {
    /// Period of day: "d" for day, "n" for night.
    pod: Option<String>,
}

#[derive(Debug, Deserialize)]
struct FcEntry {
    dt: i64,
    main: FcMain,
    weather: Vec<FcWeather>,
    wind: FcWind,
    sys: Option<FcSys>,
}

#[derive(Debug, Deserialize)]
struct FcCity {
    name: String,
    country: Option<String>,
}

#[derive(Debug, Deserialize)]
struct FcResponse {
    list: Vec<FcEntry>,
    city: FcCity,
}

/// Normalize the raw forecast list into the snapshot the front-end consumes.
///
/// The first list entry stands in for "current" conditions; the daily summary
/// keeps the first entry seen for each distinct weekday label, in order, up
/// to five days.
fn snapshot_from_forecast(parsed: &FcResponse, locale: Locale) -> Result<WeatherSnapshot> {
    let current = parsed
        .list
        .first()
        .ok_or_else(|| Error::UpstreamUnavailable("forecast response contained no data".into()))?;

    let mut forecast: Vec<DailyForecast> = Vec::new();
    for entry in &parsed.list {
        let Some(label) = weekday_label(entry.dt, locale) else {
            continue;
        };
        if forecast.iter().any(|d| d.day == label) {
            continue;
        }
        forecast.push(DailyForecast {
            day: label,
            temperature: entry.main.temp.round() as i32,
            condition: condition_of(entry),
        });
        if forecast.len() == FORECAST_DAYS {
            break;
        }
    }

    let location = match parsed.city.country.as_deref() {
        Some(country) => format!("{}, {}", parsed.city.name, country),
        None => parsed.city.name.clone(),
    };

    Ok(WeatherSnapshot {
        location,
        temperature: current.main.temp.round() as i32,
        condition: condition_of(current),
        humidity: current.main.humidity,
        wind_kmh: wind_kmh(current.wind.speed),
        is_day: is_day(current),
        forecast,
    })
}

fn condition_of(entry: &FcEntry) -> String {
    entry
        .weather
        .first()
        .map(|w| w.description.clone())
        .unwrap_or_else(|| "Unknown".to_string())
}

/// `kmh = round(ms * 3.6)`
fn wind_kmh(meters_per_second: f64) -> i32 {
    (meters_per_second * 3.6).round() as i32
}

fn is_day(entry: &FcEntry) -> bool {
    match entry.sys.as_ref().and_then(|s| s.pod.as_deref()) {
        Some(pod) => pod.starts_with('d'),
        // Missing period-of-day code defaults to day.
        None => true,
    }
}

fn weekday_label(ts: i64, locale: Locale) -> Option<String> {
    let dt: DateTime<Utc> = DateTime::from_timestamp(ts, 0)?;
    Some(dt.format_localized("%A", locale).to_string())
}

/// Map a front-end language code (optionally with a region subtag) to a
/// chrono locale for weekday labels. Unknown codes fall back to English.
fn locale_for(lang: &str) -> Locale {
    let primary = lang.split(['-', '_']).next().unwrap_or(lang);
    match primary.to_ascii_lowercase().as_str() {
        "de" => Locale::de_DE,
        "es" => Locale::es_ES,
        "fr" => Locale::fr_FR,
        "it" => Locale::it_IT,
        "ja" => Locale::ja_JP,
        "ko" => Locale::ko_KR,
        "nl" => Locale::nl_NL,
        "pl" => Locale::pl_PL,
        "pt" => Locale::pt_PT,
        "ru" => Locale::ru_RU,
        "tr" => Locale::tr_TR,
        "uk" => Locale::uk_UA,
        "zh" => Locale::zh_CN,
        _ => Locale::en_US,
    }
}

fn truncate_body(body: &str) -> String {
    const MAX: usize = 200;
    if body.len() > MAX { format!("{}...", &body[..MAX]) } else { body.to_string() }
}
