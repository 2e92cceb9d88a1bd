use axum::{
  body::StreamBody,
  extract::{rejection::QueryRejection, Query, State},
  http::{
    header::{CONTENT_DISPOSITION, CONTENT_TYPE},
    HeaderValue, StatusCode,
  },
  response::{IntoResponse, Response},
  Json,
};
use tokio::time::Instant;
use tracing::info;

use crate::{
  app::AppState,
  attachment::{content_disposition, sanitize_filename},
  extractor::StreamKind,
  request::{FetchParams, FetchRequest, MediaKind, Operation},
  transcoder::AudioTarget,
  util::{prime, ByteStream},
  video_url::VideoId,
  Error, Result,
};

#[axum::debug_handler(state = AppState)]
pub async fn fetch(
  State(state): State<AppState>,
  query: Result<Query<FetchParams>, QueryRejection>,
) -> Result<Response> {
  let deadline = Instant::now() + state.request_timeout;
  let Query(params) = query.map_err(|e| Error::BadQuery(e.body_text()))?;
  let request = FetchRequest::parse(params)?;
  info!("fetching {} ({:?})", request.video, request.operation);

  // covers everything up to the response head; the body carries the
  // same deadline on its own
  tokio::time::timeout_at(deadline, respond(&state, request, deadline))
    .await
    .unwrap_or(Err(Error::Timeout))
}

pub async fn preflight() -> StatusCode {
  StatusCode::OK
}

async fn respond(
  state: &AppState,
  request: FetchRequest,
  deadline: Instant,
) -> Result<Response> {
  let FetchRequest { video, operation } = request;

  match operation {
    Operation::Info => {
      let metadata = state.extractor.metadata(&video).await?;
      Ok(Json(metadata).into_response())
    }
    Operation::Download(kind) => download(state, &video, kind, deadline).await,
  }
}

async fn download(
  state: &AppState,
  video: &VideoId,
  kind: MediaKind,
  deadline: Instant,
) -> Result<Response> {
  let metadata = state.extractor.metadata(video).await?;
  let stem = sanitize_filename(&metadata.title, kind.fallback_name());

  let stream = match kind {
    MediaKind::Video => {
      state.extractor.stream(video, StreamKind::AudioVideo).await?
    }
    MediaKind::Audio => {
      let audio = state.extractor.stream(video, StreamKind::AudioOnly).await?;
      state
        .transcoder
        .transcode(audio, AudioTarget::MP3_128K)
        .await?
    }
  };

  // nothing is sent until the chain has produced its first chunk, so
  // failures up to here still get a JSON error
  let stream = prime(stream).await?;

  let label = format!("{}.{}", video, kind.extension());
  let body = ByteStream::new(stream, label).deadline(deadline);
  let headers = [
    (CONTENT_TYPE, HeaderValue::from_static(kind.mime_type())),
    (CONTENT_DISPOSITION, content_disposition(&stem, kind.extension())),
  ];

  Ok((headers, StreamBody::new(body)).into_response())
}
