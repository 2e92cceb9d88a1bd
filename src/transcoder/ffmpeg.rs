use std::{path::PathBuf, process::Stdio};

use async_trait::async_trait;
use tokio::process::Command;
use tracing::debug;

use crate::{
  util::{ChildStream, MediaStream},
  Error, Result,
};

use super::{AudioTarget, Transcoder};

// requires ffmpeg executable to be in PATH (or FFMPEG_PATH).
pub struct Ffmpeg {
  program: PathBuf,
}

impl Ffmpeg {
  pub fn new(program: impl Into<PathBuf>) -> Self {
    Self {
      program: program.into(),
    }
  }

  fn command(&self, target: AudioTarget) -> Command {
    let mut cmd = Command::new(&self.program);
    cmd
      .arg("-hide_banner")
      .arg("-loglevel")
      .arg("error")
      .arg("-i")
      .arg("pipe:0")
      .arg("-vn")
      .arg("-b:a")
      .arg(format!("{}k", target.bitrate_kbps))
      .arg("-f")
      .arg(target.format)
      .arg("pipe:1")
      .stdin(Stdio::piped());
    cmd
  }
}

#[async_trait]
impl Transcoder for Ffmpeg {
  async fn transcode(
    &self,
    input: MediaStream,
    target: AudioTarget,
  ) -> Result<MediaStream> {
    debug!(
      "transcoding to {} at {}k",
      target.format, target.bitrate_kbps
    );

    ChildStream::spawn("ffmpeg", self.command(target), Error::Transcoding)?
      .feed(input)?
      .into_stream()
  }
}
