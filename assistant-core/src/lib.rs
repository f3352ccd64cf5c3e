//! Core library for the weather assistant backend.
//!
//! This crate defines:
//! - Configuration handling (environment-sourced, immutable after startup)
//! - The upstream weather client and its forecast normalization
//! - The upstream language-model client with retry/backoff
//! - Shared domain models and error kinds
//!
//! It is used by `assistant-server`, but can also be reused by other binaries
//! or services.

pub mod config;
pub mod error;
pub mod genai;
pub mod model;
pub mod weather;

pub use config::Config;
pub use error::{Error, Result};
pub use genai::{GeminiClient, RetryPolicy, TextGenerator};
pub use model::{
    ChatRole, ChatTurn, DailyForecast, GenerationRequest, LocationQuery, TranslateMessage,
    WeatherSnapshot,
};
pub use weather::{OpenWeatherClient, WeatherProvider};
