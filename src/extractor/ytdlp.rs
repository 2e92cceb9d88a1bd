use std::{path::PathBuf, process::Stdio, sync::Arc};

use async_trait::async_trait;
use serde::Deserialize;
use tokio::{
  process::Command,
  sync::{OwnedSemaphorePermit, Semaphore},
};
use tracing::info;

use crate::{
  config::Config,
  util::{redact_proxy, ChildStream, MediaStream},
  video_url::VideoId,
  Error, Result,
};

use super::{Extractor, StreamKind, VideoMetadata};

// run yt-dlp command line for both metadata and media.
// requires yt-dlp executable to be in PATH (or YTDLP_PATH).
pub struct Ytdlp {
  program: PathBuf,
  proxy: Option<String>,
  // ensure only a limited set of ytdlp processes at a time
  permits: Arc<Semaphore>,
}

#[derive(Deserialize)]
struct YtdlpInfo {
  title: Option<String>,
  uploader: Option<String>,
  channel: Option<String>,
  uploader_id: Option<String>,
  // sorted from worst to best
  #[serde(default)]
  thumbnails: Vec<Thumbnail>,
  thumbnail: Option<String>,
}

#[derive(Deserialize)]
struct Thumbnail {
  url: String,
}

impl Ytdlp {
  pub fn new(config: &Config) -> Self {
    if let Some(proxy) = &config.ytdlp_proxy {
      info!("yt-dlp using proxy: {}", redact_proxy(proxy));
    }

    Self {
      program: config.ytdlp_path.clone(),
      proxy: config.ytdlp_proxy.clone(),
      permits: Arc::new(Semaphore::new(config.ytdlp_concurrency)),
    }
  }

  fn command(&self) -> Command {
    let mut cmd = Command::new(&self.program);
    cmd.stdin(Stdio::null()).arg("--no-playlist");
    if let Some(proxy) = &self.proxy {
      cmd.arg("--proxy").arg(proxy);
    }
    cmd
  }

  async fn permit(&self) -> Result<OwnedSemaphorePermit> {
    self
      .permits
      .clone()
      .acquire_owned()
      .await
      .map_err(|_| Error::Extraction("yt-dlp pool closed".into()))
  }
}

impl StreamKind {
  fn format_selector(self) -> &'static str {
    match self {
      // pre-merged formats only; mp4 preferred
      StreamKind::AudioVideo => "b[ext=mp4]/b",
      StreamKind::AudioOnly => "ba/b",
    }
  }
}

#[async_trait]
impl Extractor for Ytdlp {
  async fn metadata(&self, video: &VideoId) -> Result<VideoMetadata> {
    let mut cmd = self.command();
    cmd
      .arg("--dump-single-json")
      .arg("--skip-download")
      .arg(video.watch_url())
      .kill_on_drop(true);

    let guard = self.permit().await?;
    let output = cmd.output().await.map_err(|e| Error::Spawn("yt-dlp", e))?;
    drop(guard);

    if !output.status.success() {
      let stderr = String::from_utf8_lossy(&output.stderr);
      let reason = stderr
        .lines()
        .rev()
        .find(|line| !line.trim().is_empty())
        .unwrap_or("no output");
      return Err(Error::Extraction(format!(
        "yt-dlp exited with {} for {}: {}",
        output.status, video, reason
      )));
    }

    let info: YtdlpInfo = serde_json::from_slice(&output.stdout)
      .map_err(|e| Error::Extraction(format!("bad yt-dlp output: {e}")))?;
    info.try_into()
  }

  async fn stream(
    &self,
    video: &VideoId,
    kind: StreamKind,
  ) -> Result<MediaStream> {
    info!("streaming {} as {:?}", video, kind);

    let mut cmd = self.command();
    cmd
      .arg("-f")
      .arg(kind.format_selector())
      .arg("--no-part")
      .arg("--no-progress")
      .arg("-o")
      .arg("-")
      .arg(video.watch_url());

    let permit = self.permit().await?;
    ChildStream::spawn("yt-dlp", cmd, Error::Extraction)?
      .hold(permit)
      .into_stream()
  }
}

impl TryFrom<YtdlpInfo> for VideoMetadata {
  type Error = Error;

  fn try_from(info: YtdlpInfo) -> Result<Self> {
    let title = info
      .title
      .ok_or_else(|| Error::Extraction("video has no title".into()))?;
    let author = info
      .uploader
      .or(info.channel)
      .or(info.uploader_id)
      .ok_or_else(|| Error::Extraction("video has no author".into()))?;
    let thumbnail = info
      .thumbnails
      .into_iter()
      .last()
      .map(|t| t.url)
      .or(info.thumbnail)
      .ok_or_else(|| Error::Extraction("video has no thumbnail".into()))?;

    Ok(Self {
      title,
      author,
      thumbnail,
    })
  }
}

#[cfg(test)]
mod tests {
  use std::{io::Write, os::unix::fs::PermissionsExt, path::Path};

  use futures::StreamExt;

  use super::*;

  fn info(json: &str) -> Result<VideoMetadata> {
    serde_json::from_str::<YtdlpInfo>(json).unwrap().try_into()
  }

  #[test]
  fn test_metadata_picks_last_thumbnail() {
    let meta = info(
      r#"{
        "title": "Never Gonna Give You Up",
        "uploader": "Rick Astley",
        "channel": "RickAstleyVEVO",
        "thumbnails": [
          {"url": "https://i.ytimg.com/vi/x/default.jpg", "preference": -10},
          {"url": "https://i.ytimg.com/vi/x/hqdefault.jpg", "preference": -5},
          {"url": "https://i.ytimg.com/vi/x/maxresdefault.jpg", "preference": 0}
        ],
        "thumbnail": "https://i.ytimg.com/vi/x/hqdefault.jpg",
        "duration": 213
      }"#,
    )
    .unwrap();

    assert_eq!(meta.title, "Never Gonna Give You Up");
    assert_eq!(meta.author, "Rick Astley");
    assert_eq!(meta.thumbnail, "https://i.ytimg.com/vi/x/maxresdefault.jpg");
  }

  #[test]
  fn test_metadata_fallbacks() {
    let meta = info(
      r#"{"title": "t", "channel": "c", "thumbnail": "https://img/t.jpg"}"#,
    )
    .unwrap();
    assert_eq!(meta.author, "c");
    assert_eq!(meta.thumbnail, "https://img/t.jpg");

    assert!(matches!(
      info(r#"{"title": "t", "uploader": "u"}"#),
      Err(Error::Extraction(_))
    ));
    assert!(matches!(
      info(r#"{"thumbnail": "https://img/t.jpg"}"#),
      Err(Error::Extraction(_))
    ));
    assert!(matches!(
      info(r#"{"title": "t", "thumbnails": [{"url": "a"}]}"#),
      Err(Error::Extraction(_))
    ));
  }

  // a stand-in for yt-dlp: prints a metadata document, or the selected
  // format as the "media" payload.
  const FAKE_YTDLP: &str = r#"#!/bin/sh
case "$*" in
  *dQw4w9WgXcQ*) ;;
  *) echo "ERROR: [youtube] Video unavailable" >&2; exit 1 ;;
esac
case "$*" in
  *--dump-single-json*)
    printf '{"title":"Song","uploader":"Band",'
    printf '"thumbnails":[{"url":"a"},{"url":"b"}]}'
    ;;
  *)
    printf 'media:%s' "$3"
    ;;
esac
"#;

  fn fake_ytdlp(dir: &Path) -> Ytdlp {
    let path = dir.join("yt-dlp");
    {
      let mut file = std::fs::File::create(&path).unwrap();
      file.write_all(FAKE_YTDLP.as_bytes()).unwrap();
      file
        .set_permissions(std::fs::Permissions::from_mode(0o755))
        .unwrap();
    }

    Ytdlp::new(&Config {
      ytdlp_path: path,
      ..Config::default()
    })
  }

  #[tokio::test]
  async fn test_metadata_from_process() {
    let dir = tempfile::tempdir().unwrap();
    let ytdlp = fake_ytdlp(dir.path());

    let video = VideoId::from_id("dQw4w9WgXcQ").unwrap();
    let meta = ytdlp.metadata(&video).await.unwrap();
    assert_eq!(meta.title, "Song");
    assert_eq!(meta.thumbnail, "b");

    let missing = VideoId::from_id("aaaaaaaaaaa").unwrap();
    match ytdlp.metadata(&missing).await {
      Err(Error::Extraction(msg)) => assert!(msg.contains("Video unavailable")),
      other => panic!("unexpected: {other:?}"),
    }
  }

  #[tokio::test]
  async fn test_stream_selects_format() {
    let dir = tempfile::tempdir().unwrap();
    let ytdlp = fake_ytdlp(dir.path());
    let video = VideoId::from_id("dQw4w9WgXcQ").unwrap();

    for (kind, expected) in [
      (StreamKind::AudioVideo, "media:b[ext=mp4]/b"),
      (StreamKind::AudioOnly, "media:ba/b"),
    ] {
      let stream = ytdlp.stream(&video, kind).await.unwrap();
      let body: Vec<u8> = stream
        .map(|chunk| chunk.unwrap().to_vec())
        .concat()
        .await;
      assert_eq!(String::from_utf8(body).unwrap(), expected);
    }
  }
}
