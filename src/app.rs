use std::{sync::Arc, time::Duration};

use axum::{
  http::{
    header::{
      ACCESS_CONTROL_ALLOW_HEADERS, ACCESS_CONTROL_ALLOW_METHODS,
      ACCESS_CONTROL_ALLOW_ORIGIN,
    },
    HeaderValue,
  },
  response::IntoResponse,
  routing::get,
  Router,
};
use tower_http::{set_header::SetResponseHeaderLayer, trace::TraceLayer};

use crate::{
  config::Config,
  extractor::{Extractor, Ytdlp},
  fetch,
  transcoder::{Ffmpeg, Transcoder},
};

#[derive(Clone)]
pub struct AppState {
  pub extractor: Arc<dyn Extractor>,
  pub transcoder: Arc<dyn Transcoder>,
  pub request_timeout: Duration,
}

impl AppState {
  pub fn from_config(config: &Config) -> Self {
    Self {
      extractor: Arc::new(Ytdlp::new(config)),
      transcoder: Arc::new(Ffmpeg::new(&config.ffmpeg_path)),
      request_timeout: config.request_timeout,
    }
  }
}

pub fn router(state: AppState) -> Router {
  Router::new()
    .route("/", get(fetch::fetch).options(fetch::preflight))
    .route("/api/youtube", get(fetch::fetch).options(fetch::preflight))
    .route("/health", get(health))
    .layer(TraceLayer::new_for_http())
    // every response is allowed cross-origin, errors included
    .layer(SetResponseHeaderLayer::overriding(
      ACCESS_CONTROL_ALLOW_ORIGIN,
      HeaderValue::from_static("*"),
    ))
    .layer(SetResponseHeaderLayer::overriding(
      ACCESS_CONTROL_ALLOW_METHODS,
      HeaderValue::from_static("GET, OPTIONS"),
    ))
    .layer(SetResponseHeaderLayer::overriding(
      ACCESS_CONTROL_ALLOW_HEADERS,
      HeaderValue::from_static("Content-Type"),
    ))
    .with_state(state)
}

async fn health() -> impl IntoResponse {
  "ok".to_owned()
}
