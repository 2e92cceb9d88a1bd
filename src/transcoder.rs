mod ffmpeg;

use async_trait::async_trait;

use crate::{util::MediaStream, Result};

pub use ffmpeg::Ffmpeg;

/// Output settings of an audio transcode.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct AudioTarget {
  pub bitrate_kbps: u32,
  /// ffmpeg muxer name.
  pub format: &'static str,
}

impl AudioTarget {
  pub const MP3_128K: AudioTarget = AudioTarget {
    bitrate_kbps: 128,
    format: "mp3",
  };
}

#[async_trait]
pub trait Transcoder: Send + Sync {
  /// Re-encodes `input`. The returned stream owns `input`: dropping it
  /// stops both.
  async fn transcode(
    &self,
    input: MediaStream,
    target: AudioTarget,
  ) -> Result<MediaStream>;
}
