use std::{fmt, sync::LazyLock};

use regex::Regex;
use url::Url;

use crate::{Error, Result};

// hosts where the id is carried by the `v` query parameter
const QUERY_HOSTS: &[&str] = &[
  "youtube.com",
  "www.youtube.com",
  "m.youtube.com",
  "music.youtube.com",
  "gaming.youtube.com",
];

// path prefixes on (www.)youtube.com where the id is the next segment
const PATH_PREFIXES: &[&str] = &["embed", "v", "shorts", "live"];

const ID_LEN: usize = 11;

static ID_REGEX: LazyLock<Regex> =
  LazyLock::new(|| Regex::new(r"^[A-Za-z0-9_-]{11}$").unwrap());

/// A validated YouTube video id.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct VideoId(String);

impl VideoId {
  /// Accepts the YouTube URL shapes understood by `ytdl`'s validator
  /// and extracts the video id from them.
  pub fn from_url(input: &str) -> Result<Self> {
    let url: Url = input
      .trim()
      .parse()
      .map_err(|_| Error::InvalidUrl("not a valid URL"))?;

    if !matches!(url.scheme(), "http" | "https") {
      return Err(Error::InvalidUrl("unsupported scheme"));
    }

    let host = url
      .host_str()
      .ok_or(Error::InvalidUrl("missing host"))?
      .to_ascii_lowercase();

    let query_id = url
      .query_pairs()
      .find_map(|(k, v)| (k == "v").then(|| v.into_owned()));

    let segments: Vec<&str> =
      url.path_segments().map(|s| s.collect()).unwrap_or_default();

    let id = match host.as_str() {
      "youtu.be" => query_id.or_else(|| first_segment(&segments, 0)),
      "youtube.com" | "www.youtube.com"
        if segments
          .first()
          .is_some_and(|seg| PATH_PREFIXES.contains(seg)) =>
      {
        query_id.or_else(|| first_segment(&segments, 1))
      }
      host if QUERY_HOSTS.contains(&host) => query_id,
      _ => return Err(Error::InvalidUrl("not a YouTube domain")),
    };

    let id = id.ok_or(Error::InvalidUrl("no video id found"))?;
    Self::from_id(&id)
  }

  pub fn from_id(id: &str) -> Result<Self> {
    let id: String = id.chars().take(ID_LEN).collect();
    if !ID_REGEX.is_match(&id) {
      return Err(Error::InvalidUrl("malformed video id"));
    }
    Ok(Self(id))
  }

  /// The canonical watch URL handed to the extractor.
  pub fn watch_url(&self) -> String {
    format!("https://www.youtube.com/watch?v={}", self.0)
  }
}

impl fmt::Display for VideoId {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(&self.0)
  }
}

fn first_segment(segments: &[&str], index: usize) -> Option<String> {
  segments
    .get(index)
    .filter(|seg| !seg.is_empty())
    .map(|seg| seg.to_string())
}
