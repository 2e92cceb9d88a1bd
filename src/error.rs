use axum::{
  http::StatusCode,
  response::{IntoResponse, Response},
  Json,
};
use serde_json::json;
use tracing::{error, warn};

pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
  #[error("YouTube URL is required")]
  MissingUrl,
  #[error("Invalid YouTube URL: {0}")]
  InvalidUrl(&'static str),
  #[error("Invalid type specified")]
  InvalidType,
  #[error("Invalid format specified")]
  InvalidFormat,
  #[error("Invalid query: {0}")]
  BadQuery(String),

  #[error("extraction failed: {0}")]
  Extraction(String),
  #[error("transcoding failed: {0}")]
  Transcoding(String),
  #[error("upstream produced no data")]
  EmptyStream,
  #[error("request timed out")]
  Timeout,

  #[error("failed to spawn {0}: {1}")]
  Spawn(&'static str, #[source] std::io::Error),
  #[error("io error: {0}")]
  Io(#[from] std::io::Error),
  #[error("background task failed: {0}")]
  Join(#[from] tokio::task::JoinError),
}

impl Error {
  pub fn status(&self) -> StatusCode {
    match self {
      Error::MissingUrl
      | Error::InvalidUrl(_)
      | Error::InvalidType
      | Error::InvalidFormat
      | Error::BadQuery(_) => StatusCode::BAD_REQUEST,
      _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
  }

  // the message shown to the client. server-side details only go to the log.
  pub(crate) fn public_message(&self) -> String {
    match self {
      Error::Extraction(_) | Error::EmptyStream => {
        "Unable to fetch the video; it may be restricted or the URL is wrong."
          .to_string()
      }
      Error::Transcoding(_) => {
        "Unable to convert the audio stream.".to_string()
      }
      Error::Timeout => "The request took too long to complete.".to_string(),
      Error::Spawn(..) | Error::Io(_) | Error::Join(_) => {
        "Unknown server error.".to_string()
      }
      client => client.to_string(),
    }
  }
}

impl IntoResponse for Error {
  fn into_response(self) -> Response {
    let status = self.status();
    if status.is_client_error() {
      warn!("rejected request: {}", self);
    } else {
      error!("request failed: {}", self);
    }

    let body = Json(json!({ "error": self.public_message() }));
    (status, body).into_response()
  }
}
