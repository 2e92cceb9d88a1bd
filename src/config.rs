use std::{net::SocketAddr, path::PathBuf, str::FromStr, time::Duration};

use anyhow::{Context, Result};

const DEFAULT_BIND_ADDR: &str = "0.0.0.0:8080";
const DEFAULT_YTDLP_CONCURRENCY: usize = 8;
const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 60;

/// Process-wide settings, read once at startup and shared read-only with
/// every request.
#[derive(Clone, Debug)]
pub struct Config {
  pub bind_addr: SocketAddr,
  pub ytdlp_path: PathBuf,
  pub ffmpeg_path: PathBuf,
  pub ytdlp_proxy: Option<String>,
  /// Upper bound of yt-dlp processes alive at the same time.
  pub ytdlp_concurrency: usize,
  /// Wall-clock budget of a whole request, streaming included.
  pub request_timeout: Duration,
}

impl Default for Config {
  fn default() -> Self {
    Self {
      bind_addr: DEFAULT_BIND_ADDR.parse().expect("hard-coded address"),
      ytdlp_path: PathBuf::from("yt-dlp"),
      ffmpeg_path: PathBuf::from("ffmpeg"),
      ytdlp_proxy: None,
      ytdlp_concurrency: DEFAULT_YTDLP_CONCURRENCY,
      request_timeout: Duration::from_secs(DEFAULT_REQUEST_TIMEOUT_SECS),
    }
  }
}

impl Config {
  pub fn from_env() -> Result<Self> {
    Self::from_lookup(|key| std::env::var(key).ok())
  }

  fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
    let mut config = Config::default();

    if let Some(addr) = parse_var(&lookup, "BIND_ADDR")? {
      config.bind_addr = addr;
    }
    if let Some(path) = lookup("YTDLP_PATH") {
      config.ytdlp_path = path.into();
    }
    if let Some(path) = lookup("FFMPEG_PATH") {
      config.ffmpeg_path = path.into();
    }
    config.ytdlp_proxy = lookup("YTDLP_PROXY").filter(|s| !s.is_empty());
    if let Some(n) = parse_var(&lookup, "YTDLP_CONCURRENCY")? {
      anyhow::ensure!(n > 0, "YTDLP_CONCURRENCY must be positive");
      config.ytdlp_concurrency = n;
    }
    if let Some(secs) = parse_var(&lookup, "REQUEST_TIMEOUT_SECS")? {
      anyhow::ensure!(secs > 0, "REQUEST_TIMEOUT_SECS must be positive");
      config.request_timeout = Duration::from_secs(secs);
    }

    Ok(config)
  }
}

fn parse_var<T>(
  lookup: &impl Fn(&str) -> Option<String>,
  key: &str,
) -> Result<Option<T>>
where
  T: FromStr,
  T::Err: std::error::Error + Send + Sync + 'static,
{
  lookup(key)
    .map(|value| {
      value
        .parse::<T>()
        .with_context(|| format!("invalid value for {key}: {value:?}"))
    })
    .transpose()
}

#[cfg(test)]
mod tests {
  use std::collections::HashMap;

  use super::*;

  fn config_of(vars: &[(&str, &str)]) -> Result<Config> {
    let vars: HashMap<String, String> = vars
      .iter()
      .map(|(k, v)| (k.to_string(), v.to_string()))
      .collect();
    Config::from_lookup(|key| vars.get(key).cloned())
  }

  #[test]
  fn test_defaults() {
    let config = config_of(&[]).unwrap();
    assert_eq!(config.bind_addr.port(), 8080);
    assert_eq!(config.ytdlp_path, PathBuf::from("yt-dlp"));
    assert_eq!(config.ffmpeg_path, PathBuf::from("ffmpeg"));
    assert_eq!(config.ytdlp_proxy, None);
    assert_eq!(config.request_timeout, Duration::from_secs(60));
  }

  #[test]
  fn test_overrides() {
    let config = config_of(&[
      ("BIND_ADDR", "127.0.0.1:3000"),
      ("FFMPEG_PATH", "/opt/ffmpeg/bin/ffmpeg"),
      ("YTDLP_PROXY", "socks5://127.0.0.1:1080"),
      ("YTDLP_CONCURRENCY", "2"),
      ("REQUEST_TIMEOUT_SECS", "15"),
    ])
    .unwrap();

    assert_eq!(config.bind_addr.to_string(), "127.0.0.1:3000");
    assert_eq!(config.ffmpeg_path, PathBuf::from("/opt/ffmpeg/bin/ffmpeg"));
    assert_eq!(
      config.ytdlp_proxy.as_deref(),
      Some("socks5://127.0.0.1:1080")
    );
    assert_eq!(config.ytdlp_concurrency, 2);
    assert_eq!(config.request_timeout, Duration::from_secs(15));
  }

  #[test]
  fn test_invalid_values() {
    assert!(config_of(&[("REQUEST_TIMEOUT_SECS", "soon")]).is_err());
    assert!(config_of(&[("YTDLP_CONCURRENCY", "0")]).is_err());
    assert!(config_of(&[("BIND_ADDR", "localhost")]).is_err());
  }
}
