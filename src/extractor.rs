mod ytdlp;

use async_trait::async_trait;
use serde::Serialize;

use crate::{util::MediaStream, video_url::VideoId, Result};

pub use ytdlp::Ytdlp;

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct VideoMetadata {
  pub title: String,
  pub author: String,
  /// Highest resolution thumbnail available.
  pub thumbnail: String,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StreamKind {
  /// A single pre-muxed format carrying both tracks, best quality.
  AudioVideo,
  /// Best audio-only format.
  AudioOnly,
}

#[async_trait]
pub trait Extractor: Send + Sync {
  async fn metadata(&self, video: &VideoId) -> Result<VideoMetadata>;

  async fn stream(
    &self,
    video: &VideoId,
    kind: StreamKind,
  ) -> Result<MediaStream>;
}
