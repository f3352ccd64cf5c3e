//! HTTP entry point for the weather assistant backend.
//!
//! This crate focuses on:
//! - Loading configuration and constructing the upstream clients
//! - Wiring routes, CORS, and request logging
//! - Mapping domain errors onto HTTP responses

use std::sync::Arc;

use actix_cors::Cors;
use actix_web::middleware::Logger;
use actix_web::{App, HttpServer, http::header, web};
use anyhow::Context;
use clap::Parser;

use assistant_core::{Config, GeminiClient, OpenWeatherClient};

use crate::routes::AppState;

mod prompts;
mod routes;

/// Command-line overrides for the environment configuration.
#[derive(Debug, Parser)]
#[command(name = "assistant-server", version, about = "Weather assistant backend")]
struct Args {
    /// Listen port; overrides the PORT environment variable.
    #[arg(long)]
    port: Option<u16>,

    /// Interface to bind; overrides the HOST environment variable.
    #[arg(long)]
    bind: Option<String>,
}

#[actix_web::main]
async fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();
    let mut config = Config::from_env();
    if let Some(port) = args.port {
        config.port = port;
    }
    if let Some(bind) = args.bind {
        config.host = bind;
    }

    // Missing keys are not fatal at startup; the affected endpoints fail
    // when invoked.
    if config.weather_api_key.is_none() {
        log::warn!("WEATHER_API_KEY is not set; weather lookups will fail");
    }
    if config.gemini_api_key.is_none() {
        log::warn!("GEMINI_API_KEY is not set; generation endpoints will fail");
    }

    let state = web::Data::new(AppState {
        weather: Arc::new(OpenWeatherClient::new(config.weather_api_key.clone())),
        genai: Arc::new(GeminiClient::new(config.gemini_api_key.clone())),
    });

    log::info!("listening on {}:{}", config.host, config.port);

    HttpServer::new(move || {
        // The browser front-end may be served from anywhere.
        let cors = Cors::default()
            .allow_any_origin()
            .allowed_methods(vec!["GET", "POST"])
            .allowed_headers(vec![header::CONTENT_TYPE])
            .max_age(3600);

        App::new()
            .wrap(Logger::default())
            .wrap(cors)
            .app_data(state.clone())
            .app_data(web::JsonConfig::default().limit(256 * 1024))
            .configure(routes::configure)
    })
    .bind(config.bind_addr())
    .with_context(|| format!("failed to bind {}:{}", config.host, config.port))?
    .run()
    .await
    .context("server terminated abnormally")
}
