use serde::Deserialize;

use crate::{video_url::VideoId, Error, Result};

/// Raw query string of the fetch endpoint.
///
/// Two shapes are accepted: `type=info|mp4|mp3`, and
/// `type=download&format=mp4|mp3`. Both normalise into [`Operation`].
#[derive(Debug, Default, Deserialize)]
pub struct FetchParams {
  pub url: Option<String>,
  #[serde(rename = "type")]
  pub kind: Option<String>,
  pub format: Option<String>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MediaKind {
  /// Audio+video container, passed through untouched.
  Video,
  /// Audio only, re-encoded to mp3.
  Audio,
}

impl MediaKind {
  fn from_format(format: &str) -> Option<Self> {
    match format {
      "mp4" => Some(MediaKind::Video),
      "mp3" => Some(MediaKind::Audio),
      _ => None,
    }
  }

  pub fn extension(self) -> &'static str {
    match self {
      MediaKind::Video => "mp4",
      MediaKind::Audio => "mp3",
    }
  }

  pub fn mime_type(self) -> &'static str {
    match self {
      MediaKind::Video => "video/mp4",
      MediaKind::Audio => "audio/mpeg",
    }
  }

  pub fn fallback_name(self) -> &'static str {
    match self {
      MediaKind::Video => "video",
      MediaKind::Audio => "audio",
    }
  }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Operation {
  Info,
  Download(MediaKind),
}

#[derive(Debug)]
pub struct FetchRequest {
  pub video: VideoId,
  pub operation: Operation,
}

impl FetchRequest {
  // url is checked before type so a bad url is always a 400, whatever
  // operation was asked for.
  pub fn parse(params: FetchParams) -> Result<Self> {
    let url = params
      .url
      .as_deref()
      .map(str::trim)
      .filter(|url| !url.is_empty())
      .ok_or(Error::MissingUrl)?;
    let video = VideoId::from_url(url)?;

    let operation = match params.kind.as_deref() {
      Some("info") => Operation::Info,
      Some("download") => params
        .format
        .as_deref()
        .and_then(MediaKind::from_format)
        .map(Operation::Download)
        .ok_or(Error::InvalidFormat)?,
      Some(other) => MediaKind::from_format(other)
        .map(Operation::Download)
        .ok_or(Error::InvalidType)?,
      None => return Err(Error::InvalidType),
    };

    Ok(Self { video, operation })
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  const URL: &str = "https://www.youtube.com/watch?v=dQw4w9WgXcQ";

  fn params(
    url: Option<&str>,
    kind: Option<&str>,
    format: Option<&str>,
  ) -> FetchParams {
    FetchParams {
      url: url.map(Into::into),
      kind: kind.map(Into::into),
      format: format.map(Into::into),
    }
  }

  fn operation(kind: Option<&str>, format: Option<&str>) -> Result<Operation> {
    FetchRequest::parse(params(Some(URL), kind, format)).map(|r| r.operation)
  }

  #[test]
  fn test_both_query_shapes() {
    use MediaKind::*;

    assert_eq!(operation(Some("info"), None).unwrap(), Operation::Info);
    assert_eq!(
      operation(Some("mp4"), None).unwrap(),
      Operation::Download(Video)
    );
    assert_eq!(
      operation(Some("mp3"), None).unwrap(),
      Operation::Download(Audio)
    );
    assert_eq!(
      operation(Some("download"), Some("mp4")).unwrap(),
      Operation::Download(Video)
    );
    assert_eq!(
      operation(Some("download"), Some("mp3")).unwrap(),
      Operation::Download(Audio)
    );
    // format only matters for the download shape
    assert_eq!(
      operation(Some("mp3"), Some("mp4")).unwrap(),
      Operation::Download(Audio)
    );
  }

  #[test]
  fn test_invalid_operation() {
    assert!(matches!(operation(None, None), Err(Error::InvalidType)));
    assert!(matches!(operation(Some("flac"), None), Err(Error::InvalidType)));
    assert!(matches!(
      operation(Some("download"), None),
      Err(Error::InvalidFormat)
    ));
    assert!(matches!(
      operation(Some("download"), Some("wav")),
      Err(Error::InvalidFormat)
    ));
  }

  #[test]
  fn test_url_is_checked_first() {
    for kind in [None, Some("info"), Some("mp4"), Some("bogus")] {
      let missing = FetchRequest::parse(params(None, kind, None));
      assert!(matches!(missing, Err(Error::MissingUrl)));

      let blank = FetchRequest::parse(params(Some("  "), kind, None));
      assert!(matches!(blank, Err(Error::MissingUrl)));

      let invalid =
        FetchRequest::parse(params(Some("https://example.com"), kind, None));
      assert!(matches!(invalid, Err(Error::InvalidUrl(_))));
    }
  }
}
