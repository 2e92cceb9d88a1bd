use std::sync::LazyLock;

use bytes::Bytes;
use futures::stream::BoxStream;
use regex::Regex;

mod byte_stream;
mod child_stream;

pub use byte_stream::{prime, ByteStream};
pub use child_stream::ChildStream;

use crate::Result;

/// An owned byte stream. Dropping it tears down everything feeding it.
pub type MediaStream = BoxStream<'static, Result<Bytes>>;

// used to remove cred info from proxy url before printing
static AUTH_REGEX: LazyLock<Regex> =
  LazyLock::new(|| Regex::new(r"//[^:/@]+(:[^@]+)?@").unwrap());

pub fn redact_proxy(proxy: &str) -> String {
  AUTH_REGEX.replace(proxy, "//<REDACTED>@").into_owned()
}
